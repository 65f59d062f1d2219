use crate::{
    error::*,
    resolver::{GroupRoles, ProjectRoles, ResourceAuthorizer},
};
use membership_engine::{GroupRepository, GroupRole, ProjectRepository, ProjectRole};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A role in a hierarchy with one top role that short-circuits every check.
pub trait RoleLevel: Copy + PartialEq + fmt::Display + Send + Sync + 'static {
    /// The role that passes any required set unconditionally.
    const TOP: Self;
}

impl RoleLevel for ProjectRole {
    const TOP: Self = ProjectRole::Leader;
}

impl RoleLevel for GroupRole {
    const TOP: Self = GroupRole::Leader;
}

/// Core role check: no role never passes, the top role always passes, and
/// anything else passes only by set membership.
pub fn check_role<R: RoleLevel>(effective: Option<R>, required: &[R]) -> bool {
    match effective {
        None => false,
        Some(role) if role == R::TOP => true,
        Some(role) => required.contains(&role),
    }
}

/// Permission checks over both resource trees, plus the convenience
/// predicates the feature modules call.
pub struct PermissionChecker {
    projects: ResourceAuthorizer<ProjectRoles>,
    groups: ResourceAuthorizer<GroupRoles>,
}

impl PermissionChecker {
    pub fn new(projects: Arc<dyn ProjectRepository>, groups: Arc<dyn GroupRepository>) -> Self {
        Self {
            projects: ResourceAuthorizer::new(ProjectRoles::new(projects)),
            groups: ResourceAuthorizer::new(GroupRoles::new(groups)),
        }
    }

    pub async fn resolve_project_role(
        &self,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProjectRole>> {
        self.projects.resolve(project_id, user_id).await
    }

    pub async fn resolve_group_role(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<GroupRole>> {
        self.groups.resolve(group_id, user_id).await
    }

    pub async fn check_project_permission(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        required: &[ProjectRole],
    ) -> Result<bool> {
        self.projects.check(project_id, user_id, required).await
    }

    pub async fn check_group_permission(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        required: &[GroupRole],
    ) -> Result<bool> {
        self.groups.check(group_id, user_id, required).await
    }

    // Project predicates.

    pub async fn can_edit_project(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_project_permission(project_id, user_id, &[ProjectRole::Leader])
            .await
    }

    pub async fn can_delete_project(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_project_permission(project_id, user_id, &[ProjectRole::Leader])
            .await
    }

    pub async fn can_manage_members(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_project_permission(project_id, user_id, &[ProjectRole::Leader])
            .await
    }

    pub async fn can_edit_task(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_project_permission(
            project_id,
            user_id,
            &[ProjectRole::Leader, ProjectRole::Editor],
        )
        .await
    }

    pub async fn can_delete_task(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_project_permission(
            project_id,
            user_id,
            &[ProjectRole::Leader, ProjectRole::Editor],
        )
        .await
    }

    pub async fn can_edit_column(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_project_permission(
            project_id,
            user_id,
            &[ProjectRole::Leader, ProjectRole::Editor],
        )
        .await
    }

    /// Task-status updates go beyond the plain hierarchy: leaders and
    /// editors always may, viewers only when assigned to the task.
    pub async fn can_update_task_status(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        task_assignee_ids: &[Uuid],
    ) -> Result<bool> {
        let role = self.resolve_project_role(project_id, user_id).await?;
        Ok(match role {
            Some(ProjectRole::Leader) | Some(ProjectRole::Editor) => true,
            Some(ProjectRole::Viewer) => task_assignee_ids.contains(&user_id),
            None => false,
        })
    }

    pub async fn is_project_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.resolve_project_role(project_id, user_id).await?.is_some())
    }

    // Group predicates.

    pub async fn can_edit_group(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_group_permission(group_id, user_id, &[GroupRole::Leader])
            .await
    }

    pub async fn can_delete_group(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_group_permission(group_id, user_id, &[GroupRole::Leader])
            .await
    }

    pub async fn can_invite_members(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_group_permission(group_id, user_id, &[GroupRole::Leader])
            .await
    }

    pub async fn can_manage_group_members(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.check_group_permission(group_id, user_id, &[GroupRole::Leader])
            .await
    }

    pub async fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.resolve_group_role(group_id, user_id).await?.is_some())
    }
}
