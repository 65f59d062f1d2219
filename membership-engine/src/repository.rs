use crate::{error::*, models::*};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Storage interface for projects and their membership rows.
///
/// `transfer_leadership` is the one multi-row write: implementations must
/// apply both role flips and the manager pointer update atomically.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create_project(&self, project: &Project) -> Result<()>;

    async fn find_project(&self, id: Uuid) -> Result<Option<Project>>;

    /// Delete a project and cascade-delete its membership rows.
    async fn delete_project(&self, id: Uuid) -> Result<()>;

    async fn add_member(&self, member: &ProjectMember) -> Result<()>;

    async fn find_member(&self, project_id: Uuid, user_id: Uuid) -> Result<Option<ProjectMember>>;

    async fn members_of(&self, project_id: Uuid) -> Result<Vec<ProjectMember>>;

    async fn update_member_role(&self, member_id: Uuid, role: ProjectRole) -> Result<()>;

    async fn remove_member(&self, member_id: Uuid) -> Result<()>;

    /// Atomically demote one member row to editor, promote the other to
    /// leader, and repoint the project's manager at the promoted user.
    async fn transfer_leadership(
        &self,
        project_id: Uuid,
        demote_member_id: Uuid,
        promote_member_id: Uuid,
        new_manager_id: Uuid,
    ) -> Result<()>;
}

/// Storage interface for groups and their membership rows.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn create_group(&self, group: &Group) -> Result<()>;

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>>;

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Group>>;

    /// Delete a group and cascade-delete its membership rows.
    async fn delete_group(&self, id: Uuid) -> Result<()>;

    async fn add_member(&self, member: &GroupMember) -> Result<()>;

    async fn find_member(&self, group_id: Uuid, user_id: Uuid) -> Result<Option<GroupMember>>;

    async fn members_of(&self, group_id: Uuid) -> Result<Vec<GroupMember>>;

    async fn memberships_of_user(&self, user_id: Uuid) -> Result<Vec<GroupMember>>;

    async fn update_member_status(&self, member_id: Uuid, status: MemberStatus) -> Result<()>;

    async fn remove_member(&self, member_id: Uuid) -> Result<()>;

    /// Atomically flip the two member rows' roles and repoint the group's
    /// authoritative leader field at the promoted user.
    async fn transfer_leadership(
        &self,
        group_id: Uuid,
        demote_member_id: Uuid,
        promote_member_id: Uuid,
        new_leader_id: Uuid,
    ) -> Result<()>;
}

/// Read-only view of the external identity store. Consumed, never mutated.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, id: Uuid) -> Result<bool>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Uuid>>;
}

/// In-memory project repository for testing and development
pub struct InMemoryProjectRepository {
    projects: Arc<DashMap<Uuid, Project>>,
    members: Arc<DashMap<Uuid, ProjectMember>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self {
            projects: Arc::new(DashMap::new()),
            members: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryProjectRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn create_project(&self, project: &Project) -> Result<()> {
        self.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn find_project(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.projects.get(&id).map(|entry| entry.value().clone()))
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        self.projects.remove(&id);
        self.members.retain(|_, member| member.project_id != id);
        Ok(())
    }

    async fn add_member(&self, member: &ProjectMember) -> Result<()> {
        self.members.insert(member.id, member.clone());
        Ok(())
    }

    async fn find_member(&self, project_id: Uuid, user_id: Uuid) -> Result<Option<ProjectMember>> {
        Ok(self
            .members
            .iter()
            .find(|entry| {
                entry.value().project_id == project_id && entry.value().user_id == user_id
            })
            .map(|entry| entry.value().clone()))
    }

    async fn members_of(&self, project_id: Uuid) -> Result<Vec<ProjectMember>> {
        Ok(self
            .members
            .iter()
            .filter(|entry| entry.value().project_id == project_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_member_role(&self, member_id: Uuid, role: ProjectRole) -> Result<()> {
        match self.members.get_mut(&member_id) {
            Some(mut entry) => {
                entry.value_mut().role = role;
                Ok(())
            }
            None => Err(MembershipError::NotFound("project member".to_string())),
        }
    }

    async fn remove_member(&self, member_id: Uuid) -> Result<()> {
        self.members.remove(&member_id);
        Ok(())
    }

    async fn transfer_leadership(
        &self,
        project_id: Uuid,
        demote_member_id: Uuid,
        promote_member_id: Uuid,
        new_manager_id: Uuid,
    ) -> Result<()> {
        // Validate all three records up front so the writes below cannot
        // partially apply.
        if !self.members.contains_key(&demote_member_id)
            || !self.members.contains_key(&promote_member_id)
            || !self.projects.contains_key(&project_id)
        {
            return Err(MembershipError::NotFound(
                "project leadership transfer target".to_string(),
            ));
        }

        if let Some(mut entry) = self.members.get_mut(&demote_member_id) {
            entry.value_mut().role = ProjectRole::Editor;
        }
        if let Some(mut entry) = self.members.get_mut(&promote_member_id) {
            entry.value_mut().role = ProjectRole::Leader;
        }
        if let Some(mut entry) = self.projects.get_mut(&project_id) {
            entry.value_mut().manager_id = new_manager_id;
        }
        Ok(())
    }
}

/// In-memory group repository for testing and development
pub struct InMemoryGroupRepository {
    groups: Arc<DashMap<Uuid, Group>>,
    members: Arc<DashMap<Uuid, GroupMember>>,
}

impl InMemoryGroupRepository {
    pub fn new() -> Self {
        Self {
            groups: Arc::new(DashMap::new()),
            members: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryGroupRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroupRepository for InMemoryGroupRepository {
    async fn create_group(&self, group: &Group) -> Result<()> {
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>> {
        Ok(self.groups.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_invite_code(&self, code: &str) -> Result<Option<Group>> {
        Ok(self
            .groups
            .iter()
            .find(|entry| entry.value().invite_code == code)
            .map(|entry| entry.value().clone()))
    }

    async fn delete_group(&self, id: Uuid) -> Result<()> {
        self.groups.remove(&id);
        self.members.retain(|_, member| member.group_id != id);
        Ok(())
    }

    async fn add_member(&self, member: &GroupMember) -> Result<()> {
        self.members.insert(member.id, member.clone());
        Ok(())
    }

    async fn find_member(&self, group_id: Uuid, user_id: Uuid) -> Result<Option<GroupMember>> {
        Ok(self
            .members
            .iter()
            .find(|entry| entry.value().group_id == group_id && entry.value().user_id == user_id)
            .map(|entry| entry.value().clone()))
    }

    async fn members_of(&self, group_id: Uuid) -> Result<Vec<GroupMember>> {
        Ok(self
            .members
            .iter()
            .filter(|entry| entry.value().group_id == group_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn memberships_of_user(&self, user_id: Uuid) -> Result<Vec<GroupMember>> {
        Ok(self
            .members
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_member_status(&self, member_id: Uuid, status: MemberStatus) -> Result<()> {
        match self.members.get_mut(&member_id) {
            Some(mut entry) => {
                entry.value_mut().status = status;
                Ok(())
            }
            None => Err(MembershipError::NotFound("group member".to_string())),
        }
    }

    async fn remove_member(&self, member_id: Uuid) -> Result<()> {
        self.members.remove(&member_id);
        Ok(())
    }

    async fn transfer_leadership(
        &self,
        group_id: Uuid,
        demote_member_id: Uuid,
        promote_member_id: Uuid,
        new_leader_id: Uuid,
    ) -> Result<()> {
        if !self.members.contains_key(&demote_member_id)
            || !self.members.contains_key(&promote_member_id)
            || !self.groups.contains_key(&group_id)
        {
            return Err(MembershipError::NotFound(
                "group leadership transfer target".to_string(),
            ));
        }

        if let Some(mut entry) = self.members.get_mut(&demote_member_id) {
            entry.value_mut().role = GroupRole::Member;
        }
        if let Some(mut entry) = self.members.get_mut(&promote_member_id) {
            entry.value_mut().role = GroupRole::Leader;
        }
        if let Some(mut entry) = self.groups.get_mut(&group_id) {
            entry.value_mut().leader_id = new_leader_id;
        }
        Ok(())
    }
}

/// In-memory user directory for testing and development
pub struct InMemoryUserDirectory {
    users: Arc<DashMap<Uuid, String>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
        }
    }

    /// Register a user and return the generated id.
    pub fn add_user(&self, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.users.insert(id, email.to_string());
        id
    }
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn user_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.users.contains_key(&id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value() == email)
            .map(|entry| *entry.key()))
    }
}
