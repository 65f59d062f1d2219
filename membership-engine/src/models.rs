use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role a user can hold on a project.
///
/// Variants are ordered from least to most privileged so that the ownership
/// override is a plain `max()` over the total order `leader > editor > viewer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Viewer,
    Editor,
    Leader,
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Viewer => write!(f, "viewer"),
            Self::Editor => write!(f, "editor"),
            Self::Leader => write!(f, "leader"),
        }
    }
}

/// Role a user can hold in a group, ordered `leader > member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Member,
    Leader,
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Leader => write!(f, "leader"),
        }
    }
}

/// Invitation status of a group membership row.
///
/// Only `Accepted` grants an effective role. `Accepted` and `Rejected` are
/// terminal: a user has to be re-invited (or re-request) to get a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    /// Created by a leader-initiated invite; waits on the target user.
    PendingInvite,
    /// Created by join-by-code; waits on the group leader.
    PendingApproval,
    Accepted,
    Rejected,
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingInvite => write!(f, "pending_invite"),
            Self::PendingApproval => write!(f, "pending_approval"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A project. The owner is immutable after creation; the manager pointer
/// tracks the current leader and moves on leadership transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub manager_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: &str, description: Option<&str>, owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id,
            manager_id: owner_id,
            created_at: Utc::now(),
        }
    }
}

/// Membership row joining a user to a project. Unique per (project, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: ProjectRole,
    pub joined_at: DateTime<Utc>,
}

impl ProjectMember {
    pub fn new(project_id: Uuid, user_id: Uuid, role: ProjectRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

/// A group. The `leader_id` field is the authoritative leader; member rows
/// with a leader role are only guaranteed consistent with it at creation
/// time and after an explicit transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub leader_id: Uuid,
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: &str, description: Option<&str>, leader_id: Uuid, invite_code: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            leader_id,
            invite_code,
            created_at: Utc::now(),
        }
    }
}

/// Membership row joining a user to a group. Unique per (group, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: GroupRole,
    pub status: MemberStatus,
    pub joined_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn new(group_id: Uuid, user_id: Uuid, role: GroupRole, status: MemberStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            user_id,
            role,
            status,
            joined_at: Utc::now(),
        }
    }
}

/// Target of a leader-initiated invite: either a known user id or an email
/// to be resolved against the external identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteTarget {
    UserId(Uuid),
    Email(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_order_puts_leader_on_top() {
        assert!(ProjectRole::Leader > ProjectRole::Editor);
        assert!(ProjectRole::Editor > ProjectRole::Viewer);
        assert!(GroupRole::Leader > GroupRole::Member);
    }

    #[test]
    fn new_project_points_manager_at_owner() {
        let owner = Uuid::new_v4();
        let project = Project::new("launch", None, owner);
        assert_eq!(project.owner_id, owner);
        assert_eq!(project.manager_id, owner);
    }
}
