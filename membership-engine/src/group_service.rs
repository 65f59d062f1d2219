use crate::{
    error::*,
    invite_code::{generate_unique_code, InviteCodeSource},
    models::*,
    repository::{GroupRepository, UserDirectory},
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Group membership workflow.
///
/// Every operation validates its preconditions before touching the store, so
/// a failed call leaves the membership rows unmodified. The status machine
/// is `pending_invite`/`pending_approval` -> `accepted`/`rejected`, with
/// `accepted` and `rejected` terminal; rejected rows are kept as historical
/// records while leave/removal delete the row.
pub struct GroupService {
    groups: Arc<dyn GroupRepository>,
    users: Arc<dyn UserDirectory>,
    codes: Arc<dyn InviteCodeSource>,
}

impl GroupService {
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        users: Arc<dyn UserDirectory>,
        codes: Arc<dyn InviteCodeSource>,
    ) -> Self {
        Self { groups, users, codes }
    }

    /// Create a group with a unique invite code and the leader's own
    /// accepted membership row.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        leader_id: Uuid,
    ) -> Result<Group> {
        if !self.users.user_exists(leader_id).await? {
            return Err(MembershipError::NotFound("user".to_string()));
        }

        let code = generate_unique_code(self.groups.as_ref(), self.codes.as_ref()).await?;
        let group = Group::new(name, description, leader_id, code);
        self.groups.create_group(&group).await?;

        let leader_row =
            GroupMember::new(group.id, leader_id, GroupRole::Leader, MemberStatus::Accepted);
        self.groups.add_member(&leader_row).await?;

        info!(group_id = %group.id, leader_id = %leader_id, "group created");
        Ok(group)
    }

    /// Leader-initiated invite. Creates a `pending_invite` row the target
    /// must accept or reject. Returns the group's invite code.
    pub async fn invite(
        &self,
        leader_id: Uuid,
        group_id: Uuid,
        target: InviteTarget,
    ) -> Result<String> {
        let group = self.require_group(group_id).await?;
        self.require_leader(&group, leader_id, "only the group leader can invite members")?;

        let target_id = match target {
            InviteTarget::UserId(id) => {
                if !self.users.user_exists(id).await? {
                    return Err(MembershipError::NotFound("user to invite".to_string()));
                }
                id
            }
            InviteTarget::Email(ref email) => self
                .users
                .find_user_by_email(email)
                .await?
                .ok_or_else(|| MembershipError::NotFound("user to invite".to_string()))?,
        };

        if self.groups.find_member(group_id, target_id).await?.is_some() {
            return Err(MembershipError::Conflict(
                "user already belongs to the group or has a pending request".to_string(),
            ));
        }

        let row = GroupMember::new(
            group_id,
            target_id,
            GroupRole::Member,
            MemberStatus::PendingInvite,
        );
        self.groups.add_member(&row).await?;

        info!(group_id = %group_id, user_id = %target_id, "invite sent");
        Ok(group.invite_code)
    }

    /// User-initiated join via invite code. Creates a `pending_approval` row
    /// the leader must approve or reject. Returns the group id.
    pub async fn join_by_code(&self, user_id: Uuid, code: &str) -> Result<Uuid> {
        let normalized = code.trim().to_uppercase();
        let group = self
            .groups
            .find_by_invite_code(&normalized)
            .await?
            .ok_or_else(|| MembershipError::NotFound("invite code".to_string()))?;

        if self.groups.find_member(group.id, user_id).await?.is_some() {
            return Err(MembershipError::Conflict(
                "user already belongs to the group or has a pending request".to_string(),
            ));
        }

        let row = GroupMember::new(
            group.id,
            user_id,
            GroupRole::Member,
            MemberStatus::PendingApproval,
        );
        self.groups.add_member(&row).await?;

        info!(group_id = %group.id, user_id = %user_id, "join request created");
        Ok(group.id)
    }

    pub async fn accept_invite(&self, group_id: Uuid, user_id: Uuid) -> Result<()> {
        self.settle_invite(group_id, user_id, MemberStatus::Accepted).await
    }

    pub async fn reject_invite(&self, group_id: Uuid, user_id: Uuid) -> Result<()> {
        self.settle_invite(group_id, user_id, MemberStatus::Rejected).await
    }

    async fn settle_invite(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        outcome: MemberStatus,
    ) -> Result<()> {
        let member = self
            .groups
            .find_member(group_id, user_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("invite".to_string()))?;

        if member.status != MemberStatus::PendingInvite {
            warn!(group_id = %group_id, user_id = %user_id, status = %member.status,
                "attempt to settle an already processed invite");
            return Err(MembershipError::Forbidden(
                "invite already processed".to_string(),
            ));
        }

        self.groups.update_member_status(member.id, outcome).await?;
        info!(group_id = %group_id, user_id = %user_id, outcome = %outcome, "invite settled");
        Ok(())
    }

    pub async fn approve_join_request(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        leader_id: Uuid,
    ) -> Result<()> {
        self.settle_join_request(group_id, user_id, leader_id, MemberStatus::Accepted)
            .await
    }

    pub async fn reject_join_request(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        leader_id: Uuid,
    ) -> Result<()> {
        self.settle_join_request(group_id, user_id, leader_id, MemberStatus::Rejected)
            .await
    }

    async fn settle_join_request(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        leader_id: Uuid,
        outcome: MemberStatus,
    ) -> Result<()> {
        let group = self.require_group(group_id).await?;
        self.require_leader(&group, leader_id, "only the group leader can settle join requests")?;

        let member = self
            .groups
            .find_member(group_id, user_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("join request".to_string()))?;

        if member.status != MemberStatus::PendingApproval {
            return Err(MembershipError::Forbidden(
                "join request already processed".to_string(),
            ));
        }

        self.groups.update_member_status(member.id, outcome).await?;
        info!(group_id = %group_id, user_id = %user_id, outcome = %outcome, "join request settled");
        Ok(())
    }

    /// A member leaves the group. The leader cannot leave; the group has to
    /// be dissolved instead.
    pub async fn leave(&self, user_id: Uuid, group_id: Uuid) -> Result<()> {
        let member = self
            .groups
            .find_member(group_id, user_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("membership".to_string()))?;

        if member.role == GroupRole::Leader {
            return Err(MembershipError::Forbidden(
                "the group leader cannot leave; dissolve the group instead".to_string(),
            ));
        }

        self.groups.remove_member(member.id).await?;
        info!(group_id = %group_id, user_id = %user_id, "member left group");
        Ok(())
    }

    pub async fn remove_member(
        &self,
        leader_id: Uuid,
        group_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<()> {
        let group = self.require_group(group_id).await?;
        self.require_leader(&group, leader_id, "only the group leader can remove members")?;

        let member = self
            .groups
            .find_member(group_id, target_user_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("member".to_string()))?;

        if member.role == GroupRole::Leader {
            return Err(MembershipError::Forbidden(
                "the group leader cannot be removed".to_string(),
            ));
        }

        self.groups.remove_member(member.id).await?;
        info!(group_id = %group_id, user_id = %target_user_id, "member removed from group");
        Ok(())
    }

    /// Hand group leadership to an accepted member. Flips the two member
    /// rows and the group's leader field in one atomic store operation.
    pub async fn transfer_leadership(
        &self,
        leader_id: Uuid,
        group_id: Uuid,
        new_leader_id: Uuid,
    ) -> Result<()> {
        let group = self.require_group(group_id).await?;
        self.require_leader(&group, leader_id, "only the group leader can transfer leadership")?;

        if leader_id == new_leader_id {
            return Err(MembershipError::Conflict(
                "user is already the group leader".to_string(),
            ));
        }

        let target = self
            .groups
            .find_member(group_id, new_leader_id)
            .await?
            .filter(|m| m.status == MemberStatus::Accepted)
            .ok_or_else(|| {
                MembershipError::NotFound("accepted membership for the chosen user".to_string())
            })?;

        let current = self
            .groups
            .find_member(group_id, leader_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("current leader membership".to_string()))?;

        self.groups
            .transfer_leadership(group_id, current.id, target.id, new_leader_id)
            .await?;

        info!(group_id = %group_id, new_leader_id = %new_leader_id, "group leadership transferred");
        Ok(())
    }

    /// Dissolve the group, cascading all membership rows.
    pub async fn dissolve(&self, leader_id: Uuid, group_id: Uuid) -> Result<()> {
        let group = self.require_group(group_id).await?;
        self.require_leader(&group, leader_id, "only the group leader can dissolve the group")?;

        self.groups.delete_group(group_id).await?;
        info!(group_id = %group_id, "group dissolved");
        Ok(())
    }

    /// Invites still waiting on the given user.
    pub async fn pending_invites(&self, user_id: Uuid) -> Result<Vec<GroupMember>> {
        let memberships = self.groups.memberships_of_user(user_id).await?;
        Ok(memberships
            .into_iter()
            .filter(|m| m.status == MemberStatus::PendingInvite)
            .collect())
    }

    pub async fn members_of(&self, group_id: Uuid) -> Result<Vec<GroupMember>> {
        self.require_group(group_id).await?;
        self.groups.members_of(group_id).await
    }

    async fn require_group(&self, group_id: Uuid) -> Result<Group> {
        self.groups
            .find_group(group_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound("group".to_string()))
    }

    fn require_leader(&self, group: &Group, actor_id: Uuid, reason: &str) -> Result<()> {
        if group.leader_id != actor_id {
            warn!(group_id = %group.id, actor_id = %actor_id, "group leader check failed");
            return Err(MembershipError::Forbidden(reason.to_string()));
        }
        Ok(())
    }
}
