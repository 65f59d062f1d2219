use crate::{
    error::*,
    models::*,
    repository::{ProjectRepository, UserDirectory},
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Project membership workflow.
///
/// Projects have no invitation states: a membership row is effective the
/// moment it is created, and removal deletes the row outright (no rejected
/// tombstones, unlike groups). At most one explicit leader row may exist;
/// leadership moves only through `transfer_leadership`.
pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    users: Arc<dyn UserDirectory>,
}

impl ProjectService {
    pub fn new(projects: Arc<dyn ProjectRepository>, users: Arc<dyn UserDirectory>) -> Self {
        Self { projects, users }
    }

    /// Create a project and the owner's leader convenience row.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: Uuid,
    ) -> Result<Project> {
        if !self.users.user_exists(owner_id).await? {
            return Err(MembershipError::NotFound("user".to_string()));
        }

        let project = Project::new(name, description, owner_id);
        self.projects.create_project(&project).await?;

        let owner_row = ProjectMember::new(project.id, owner_id, ProjectRole::Leader);
        self.projects.add_member(&owner_row).await?;

        info!(project_id = %project.id, owner_id = %owner_id, "project created");
        Ok(project)
    }

    /// Add a member. Leaders and editors may add; at most one explicit
    /// leader row may exist, so a second leader is rejected and callers are
    /// pointed at leadership transfer.
    pub async fn add_member(
        &self,
        project_id: Uuid,
        actor_id: Uuid,
        target: InviteTarget,
        role: ProjectRole,
    ) -> Result<ProjectMember> {
        let project = self.require_project(project_id).await?;
        self.require_at_least(&project, actor_id, ProjectRole::Editor, "add members")
            .await?;

        let target_id = match target {
            InviteTarget::UserId(id) => {
                if !self.users.user_exists(id).await? {
                    return Err(MembershipError::NotFound("user to add".to_string()));
                }
                id
            }
            InviteTarget::Email(ref email) => self
                .users
                .find_user_by_email(email)
                .await?
                .ok_or_else(|| MembershipError::NotFound("user to add".to_string()))?,
        };

        if self.projects.find_member(project_id, target_id).await?.is_some() {
            return Err(MembershipError::Conflict(
                "user is already a project member".to_string(),
            ));
        }

        if role == ProjectRole::Leader {
            self.reject_second_leader(project_id, None).await?;
        }

        let member = ProjectMember::new(project_id, target_id, role);
        self.projects.add_member(&member).await?;

        info!(project_id = %project_id, user_id = %target_id, role = %role, "project member added");
        Ok(member)
    }

    /// Add several members with the same role in one call. All preconditions
    /// are checked before the first write.
    pub async fn add_members(
        &self,
        project_id: Uuid,
        actor_id: Uuid,
        user_ids: &[Uuid],
        role: ProjectRole,
    ) -> Result<Vec<ProjectMember>> {
        let project = self.require_project(project_id).await?;
        self.require_at_least(&project, actor_id, ProjectRole::Editor, "add members")
            .await?;

        for user_id in user_ids {
            if !self.users.user_exists(*user_id).await? {
                return Err(MembershipError::NotFound("user to add".to_string()));
            }
            if self.projects.find_member(project_id, *user_id).await?.is_some() {
                return Err(MembershipError::Conflict(
                    "user is already a project member".to_string(),
                ));
            }
        }

        if role == ProjectRole::Leader {
            self.reject_second_leader(project_id, None).await?;
        }

        let mut added = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let member = ProjectMember::new(project_id, *user_id, role);
            self.projects.add_member(&member).await?;
            added.push(member);
        }

        info!(project_id = %project_id, count = added.len(), role = %role, "project members added");
        Ok(added)
    }

    /// Change a member's role. Leader only; promoting to leader while
    /// another leader row exists is rejected.
    pub async fn update_member_role(
        &self,
        project_id: Uuid,
        actor_id: Uuid,
        member_user_id: Uuid,
        new_role: ProjectRole,
    ) -> Result<()> {
        let project = self.require_project(project_id).await?;
        self.require_at_least(&project, actor_id, ProjectRole::Leader, "change member roles")
            .await?;

        let member = self
            .projects
            .find_member(project_id, member_user_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("project member".to_string()))?;

        if new_role == ProjectRole::Leader {
            self.reject_second_leader(project_id, Some(member.id)).await?;
        }

        self.projects.update_member_role(member.id, new_role).await?;
        info!(project_id = %project_id, user_id = %member_user_id, role = %new_role,
            "project member role updated");
        Ok(())
    }

    /// Remove a member's row. Leaders and editors may remove.
    pub async fn remove_member(
        &self,
        project_id: Uuid,
        actor_id: Uuid,
        member_user_id: Uuid,
    ) -> Result<()> {
        let project = self.require_project(project_id).await?;
        self.require_at_least(&project, actor_id, ProjectRole::Editor, "remove members")
            .await?;

        let member = self
            .projects
            .find_member(project_id, member_user_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("project member".to_string()))?;

        self.projects.remove_member(member.id).await?;
        info!(project_id = %project_id, user_id = %member_user_id, "project member removed");
        Ok(())
    }

    /// Hand project leadership over. The actor's row drops to editor, the
    /// target's row becomes leader, and the manager pointer follows, all in
    /// one atomic store operation.
    pub async fn transfer_leadership(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        new_leader_id: Uuid,
    ) -> Result<()> {
        self.require_project(project_id).await?;

        let current = self
            .projects
            .find_member(project_id, actor_id)
            .await?
            .filter(|m| m.role == ProjectRole::Leader)
            .ok_or_else(|| {
                warn!(project_id = %project_id, actor_id = %actor_id,
                    "leadership transfer attempted by non-leader");
                MembershipError::Forbidden(
                    "only the current leader can transfer leadership".to_string(),
                )
            })?;

        let target = self
            .projects
            .find_member(project_id, new_leader_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("project member".to_string()))?;

        self.projects
            .transfer_leadership(project_id, current.id, target.id, new_leader_id)
            .await?;

        info!(project_id = %project_id, new_leader_id = %new_leader_id,
            "project leadership transferred");
        Ok(())
    }

    /// Delete the project, cascading all membership rows. Leader only.
    pub async fn delete(&self, actor_id: Uuid, project_id: Uuid) -> Result<()> {
        let project = self.require_project(project_id).await?;
        self.require_at_least(&project, actor_id, ProjectRole::Leader, "delete the project")
            .await?;

        self.projects.delete_project(project_id).await?;
        info!(project_id = %project_id, "project deleted");
        Ok(())
    }

    pub async fn members_of(&self, project_id: Uuid) -> Result<Vec<ProjectMember>> {
        self.require_project(project_id).await?;
        self.projects.members_of(project_id).await
    }

    async fn require_project(&self, project_id: Uuid) -> Result<Project> {
        self.projects
            .find_project(project_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("project".to_string()))
    }

    /// Effective role with the ownership override applied: the owner counts
    /// as leader even without an explicit row.
    async fn effective_role(&self, project: &Project, user_id: Uuid) -> Result<Option<ProjectRole>> {
        let explicit = self
            .projects
            .find_member(project.id, user_id)
            .await?
            .map(|m| m.role);
        let override_role = (project.owner_id == user_id).then_some(ProjectRole::Leader);

        Ok(match (override_role, explicit) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        })
    }

    async fn require_at_least(
        &self,
        project: &Project,
        actor_id: Uuid,
        floor: ProjectRole,
        action: &str,
    ) -> Result<()> {
        let role = self.effective_role(project, actor_id).await?;
        match role {
            Some(r) if r >= floor => Ok(()),
            _ => {
                warn!(project_id = %project.id, actor_id = %actor_id, action,
                    "project role check failed");
                Err(MembershipError::Forbidden(format!(
                    "insufficient role to {action}"
                )))
            }
        }
    }

    async fn reject_second_leader(
        &self,
        project_id: Uuid,
        allow_member_id: Option<Uuid>,
    ) -> Result<()> {
        let members = self.projects.members_of(project_id).await?;
        let other_leader = members
            .iter()
            .any(|m| m.role == ProjectRole::Leader && Some(m.id) != allow_member_id);
        if other_leader {
            return Err(MembershipError::Conflict(
                "project already has a leader; use leadership transfer instead".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryProjectRepository, InMemoryUserDirectory};

    fn setup() -> (ProjectService, Arc<InMemoryProjectRepository>, Arc<InMemoryUserDirectory>) {
        let projects = Arc::new(InMemoryProjectRepository::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let service = ProjectService::new(projects.clone(), users.clone());
        (service, projects, users)
    }

    #[tokio::test]
    async fn test_create_writes_owner_leader_row() {
        let (service, projects, users) = setup();
        let owner = users.add_user("own@example.com");

        let project = service.create("apollo", Some("moonshot"), owner).await.unwrap();

        let row = projects.find_member(project.id, owner).await.unwrap().unwrap();
        assert_eq!(row.role, ProjectRole::Leader);
        assert_eq!(project.manager_id, owner);
    }

    #[tokio::test]
    async fn test_add_member_by_email() {
        let (service, projects, users) = setup();
        let owner = users.add_user("own@example.com");
        let viewer = users.add_user("vee@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(
                project.id,
                owner,
                InviteTarget::Email("vee@example.com".to_string()),
                ProjectRole::Viewer,
            )
            .await
            .unwrap();

        let row = projects.find_member(project.id, viewer).await.unwrap().unwrap();
        assert_eq!(row.role, ProjectRole::Viewer);
    }

    #[tokio::test]
    async fn test_duplicate_member_is_conflict() {
        let (service, _, users) = setup();
        let owner = users.add_user("own@example.com");
        let viewer = users.add_user("vee@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(project.id, owner, InviteTarget::UserId(viewer), ProjectRole::Viewer)
            .await
            .unwrap();
        let result = service
            .add_member(project.id, owner, InviteTarget::UserId(viewer), ProjectRole::Editor)
            .await;
        assert!(matches!(result, Err(MembershipError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_second_leader_row_is_conflict() {
        let (service, _, users) = setup();
        let owner = users.add_user("own@example.com");
        let other = users.add_user("oth@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        let result = service
            .add_member(project.id, owner, InviteTarget::UserId(other), ProjectRole::Leader)
            .await;
        assert!(matches!(result, Err(MembershipError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_viewer_cannot_add_members() {
        let (service, _, users) = setup();
        let owner = users.add_user("own@example.com");
        let viewer = users.add_user("vee@example.com");
        let other = users.add_user("oth@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(project.id, owner, InviteTarget::UserId(viewer), ProjectRole::Viewer)
            .await
            .unwrap();
        let result = service
            .add_member(project.id, viewer, InviteTarget::UserId(other), ProjectRole::Viewer)
            .await;
        assert!(matches!(result, Err(MembershipError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_editor_can_add_members() {
        let (service, _, users) = setup();
        let owner = users.add_user("own@example.com");
        let editor = users.add_user("edi@example.com");
        let other = users.add_user("oth@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(project.id, owner, InviteTarget::UserId(editor), ProjectRole::Editor)
            .await
            .unwrap();
        service
            .add_member(project.id, editor, InviteTarget::UserId(other), ProjectRole::Viewer)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_members_batch_is_all_or_nothing() {
        let (service, projects, users) = setup();
        let owner = users.add_user("own@example.com");
        let a = users.add_user("a@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        // Second id is unknown, so nothing may be written.
        let result = service
            .add_members(project.id, owner, &[a, Uuid::new_v4()], ProjectRole::Viewer)
            .await;
        assert!(matches!(result, Err(MembershipError::NotFound(_))));
        assert!(projects.find_member(project.id, a).await.unwrap().is_none());

        let added = service
            .add_members(project.id, owner, &[a], ProjectRole::Viewer)
            .await
            .unwrap();
        assert_eq!(added.len(), 1);
    }

    #[tokio::test]
    async fn test_update_member_role_guards_single_leader() {
        let (service, _, users) = setup();
        let owner = users.add_user("own@example.com");
        let editor = users.add_user("edi@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(project.id, owner, InviteTarget::UserId(editor), ProjectRole::Editor)
            .await
            .unwrap();

        // Owner's own row is still the leader row.
        let result = service
            .update_member_role(project.id, owner, editor, ProjectRole::Leader)
            .await;
        assert!(matches!(result, Err(MembershipError::Conflict(_))));

        service
            .update_member_role(project.id, owner, editor, ProjectRole::Viewer)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transfer_leadership_invariant() {
        let (service, projects, users) = setup();
        let owner = users.add_user("own@example.com");
        let editor = users.add_user("edi@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(project.id, owner, InviteTarget::UserId(editor), ProjectRole::Editor)
            .await
            .unwrap();
        service.transfer_leadership(owner, project.id, editor).await.unwrap();

        // Exactly one leader row remains and it belongs to the new leader.
        let members = projects.members_of(project.id).await.unwrap();
        let leaders: Vec<_> = members
            .iter()
            .filter(|m| m.role == ProjectRole::Leader)
            .collect();
        assert_eq!(leaders.len(), 1);
        assert_eq!(leaders[0].user_id, editor);

        let old_row = projects.find_member(project.id, owner).await.unwrap().unwrap();
        assert_eq!(old_row.role, ProjectRole::Editor);

        let project = projects.find_project(project.id).await.unwrap().unwrap();
        assert_eq!(project.manager_id, editor);
    }

    #[tokio::test]
    async fn test_transfer_requires_leader_row() {
        let (service, _, users) = setup();
        let owner = users.add_user("own@example.com");
        let editor = users.add_user("edi@example.com");
        let viewer = users.add_user("vee@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(project.id, owner, InviteTarget::UserId(editor), ProjectRole::Editor)
            .await
            .unwrap();
        service
            .add_member(project.id, owner, InviteTarget::UserId(viewer), ProjectRole::Viewer)
            .await
            .unwrap();

        let result = service.transfer_leadership(editor, project.id, viewer).await;
        assert!(matches!(result, Err(MembershipError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_remove_member_deletes_row() {
        let (service, projects, users) = setup();
        let owner = users.add_user("own@example.com");
        let viewer = users.add_user("vee@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(project.id, owner, InviteTarget::UserId(viewer), ProjectRole::Viewer)
            .await
            .unwrap();
        service.remove_member(project.id, owner, viewer).await.unwrap();

        // Project rows are deleted outright, no tombstone, so the user can
        // simply be re-added.
        assert!(projects.find_member(project.id, viewer).await.unwrap().is_none());
        service
            .add_member(project.id, owner, InviteTarget::UserId(viewer), ProjectRole::Viewer)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_project_requires_leader() {
        let (service, projects, users) = setup();
        let owner = users.add_user("own@example.com");
        let viewer = users.add_user("vee@example.com");
        let project = service.create("apollo", None, owner).await.unwrap();

        service
            .add_member(project.id, owner, InviteTarget::UserId(viewer), ProjectRole::Viewer)
            .await
            .unwrap();

        let result = service.delete(viewer, project.id).await;
        assert!(matches!(result, Err(MembershipError::Forbidden(_))));

        service.delete(owner, project.id).await.unwrap();
        assert!(projects.find_project(project.id).await.unwrap().is_none());
        assert!(projects.members_of(project.id).await.unwrap().is_empty());
    }
}
