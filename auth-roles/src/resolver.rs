use crate::{check::RoleLevel, error::*};
use async_trait::async_trait;
use membership_engine::{
    GroupRepository, GroupRole, MemberStatus, ProjectRepository, ProjectRole,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Resolves a user's effective role on one kind of resource.
///
/// The two resource trees (project, group) are structurally the same:
/// an authoritative owner/leader field that always wins, plus explicit
/// membership rows. Each tree implements this trait once and the shared
/// hierarchy logic lives in [`ResourceAuthorizer`].
#[async_trait]
pub trait RoleSource: Send + Sync {
    type Role: RoleLevel;

    /// Effective role after the ownership override, or `None` when the user
    /// has no standing. Fails with `NotFound` when the resource is missing.
    async fn resolve(&self, resource_id: Uuid, user_id: Uuid) -> Result<Option<Self::Role>>;
}

/// Generic role check over one resource tree; instantiated once per tree.
pub struct ResourceAuthorizer<S> {
    source: S,
}

impl<S: RoleSource> ResourceAuthorizer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn resolve(&self, resource_id: Uuid, user_id: Uuid) -> Result<Option<S::Role>> {
        self.source.resolve(resource_id, user_id).await
    }

    /// True when the user's effective role satisfies the required set.
    pub async fn check(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        required: &[S::Role],
    ) -> Result<bool> {
        let effective = self.source.resolve(resource_id, user_id).await?;
        Ok(crate::check::check_role(effective, required))
    }
}

/// Project-tree role source. The owner is always treated as leader, with or
/// without an explicit membership row; `effective = max(override, explicit)`.
pub struct ProjectRoles {
    repository: Arc<dyn ProjectRepository>,
}

impl ProjectRoles {
    pub fn new(repository: Arc<dyn ProjectRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl RoleSource for ProjectRoles {
    type Role = ProjectRole;

    async fn resolve(&self, project_id: Uuid, user_id: Uuid) -> Result<Option<ProjectRole>> {
        let project = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("project".to_string()))?;

        let explicit = self
            .repository
            .find_member(project_id, user_id)
            .await?
            .map(|m| m.role);
        let override_role = (project.owner_id == user_id).then_some(ProjectRole::Leader);

        let effective = match (override_role, explicit) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        debug!(project_id = %project_id, user_id = %user_id, role = ?effective,
            "resolved project role");
        Ok(effective)
    }
}

/// Group-tree role source. The group's leader field is authoritative, and
/// only `accepted` rows grant a role; pending and rejected rows grant none.
pub struct GroupRoles {
    repository: Arc<dyn GroupRepository>,
}

impl GroupRoles {
    pub fn new(repository: Arc<dyn GroupRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl RoleSource for GroupRoles {
    type Role = GroupRole;

    async fn resolve(&self, group_id: Uuid, user_id: Uuid) -> Result<Option<GroupRole>> {
        let group = self
            .repository
            .find_group(group_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("group".to_string()))?;

        let explicit = self
            .repository
            .find_member(group_id, user_id)
            .await?
            .filter(|m| m.status == MemberStatus::Accepted)
            .map(|m| m.role);
        let override_role = (group.leader_id == user_id).then_some(GroupRole::Leader);

        let effective = match (override_role, explicit) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        debug!(group_id = %group_id, user_id = %user_id, role = ?effective,
            "resolved group role");
        Ok(effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membership_engine::{
        Group, GroupMember, InMemoryGroupRepository, InMemoryProjectRepository, Project,
        ProjectMember,
    };

    #[tokio::test]
    async fn test_owner_is_leader_without_a_row() {
        let repo = Arc::new(InMemoryProjectRepository::new());
        let owner = Uuid::new_v4();
        let project = Project::new("apollo", None, owner);
        repo.create_project(&project).await.unwrap();

        let roles = ProjectRoles::new(repo);
        let role = roles.resolve(project.id, owner).await.unwrap();
        assert_eq!(role, Some(ProjectRole::Leader));
    }

    #[tokio::test]
    async fn test_owner_override_beats_explicit_row() {
        let repo = Arc::new(InMemoryProjectRepository::new());
        let owner = Uuid::new_v4();
        let project = Project::new("apollo", None, owner);
        repo.create_project(&project).await.unwrap();

        // Even a stray viewer row for the owner does not demote them.
        let row = ProjectMember::new(project.id, owner, ProjectRole::Viewer);
        repo.add_member(&row).await.unwrap();

        let roles = ProjectRoles::new(repo);
        let role = roles.resolve(project.id, owner).await.unwrap();
        assert_eq!(role, Some(ProjectRole::Leader));
    }

    #[tokio::test]
    async fn test_non_member_resolves_to_none() {
        let repo = Arc::new(InMemoryProjectRepository::new());
        let project = Project::new("apollo", None, Uuid::new_v4());
        repo.create_project(&project).await.unwrap();

        let roles = ProjectRoles::new(repo);
        let role = roles.resolve(project.id, Uuid::new_v4()).await.unwrap();
        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn test_missing_project_is_not_found() {
        let repo = Arc::new(InMemoryProjectRepository::new());
        let roles = ProjectRoles::new(repo);

        let result = roles.resolve(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pending_and_rejected_rows_grant_no_group_role() {
        let repo = Arc::new(InMemoryGroupRepository::new());
        let leader = Uuid::new_v4();
        let group = Group::new("alpha", None, leader, "AB12CD".to_string());
        repo.create_group(&group).await.unwrap();

        let roles = GroupRoles::new(repo.clone());

        for status in [
            MemberStatus::PendingInvite,
            MemberStatus::PendingApproval,
            MemberStatus::Rejected,
        ] {
            let user = Uuid::new_v4();
            let row = GroupMember::new(group.id, user, GroupRole::Member, status);
            repo.add_member(&row).await.unwrap();
            assert_eq!(roles.resolve(group.id, user).await.unwrap(), None);
        }

        let user = Uuid::new_v4();
        let row = GroupMember::new(group.id, user, GroupRole::Member, MemberStatus::Accepted);
        repo.add_member(&row).await.unwrap();
        assert_eq!(
            roles.resolve(group.id, user).await.unwrap(),
            Some(GroupRole::Member)
        );
    }

    #[tokio::test]
    async fn test_group_leader_field_is_authoritative() {
        let repo = Arc::new(InMemoryGroupRepository::new());
        let leader = Uuid::new_v4();
        let group = Group::new("alpha", None, leader, "AB12CD".to_string());
        repo.create_group(&group).await.unwrap();

        let roles = GroupRoles::new(repo);
        assert_eq!(
            roles.resolve(group.id, leader).await.unwrap(),
            Some(GroupRole::Leader)
        );
    }
}
