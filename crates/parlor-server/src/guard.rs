//! Membership and authorization rules for group mutations.
//!
//! Every check here is pure: callers load the group and the actor's
//! membership row inside the same store closure that performs the write, so
//! the decision and the write see one consistent snapshot.

use parlor_shared::constants::PERMISSION_MANAGE_CHAT;
use parlor_shared::{GroupRole, Principal};
use parlor_store::{Group, GroupMember};

use crate::error::ServerError;

/// Where an actor stands in one group.
///
/// `Left` is terminal: a user who left (or was removed) cannot be re-added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipState {
    NotMember,
    Member,
    Admin,
    Left,
}

impl MembershipState {
    pub fn of(member: Option<&GroupMember>) -> Self {
        match member {
            None => MembershipState::NotMember,
            Some(m) if !m.is_active() => MembershipState::Left,
            Some(m) if m.role == GroupRole::Admin => MembershipState::Admin,
            Some(_) => MembershipState::Member,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, MembershipState::Member | MembershipState::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    View,
    PostMessage,
    MarkRead,
    Leave,
    UpdateDetails,
    ManageMembers,
    ChangeRole,
    Delete,
    Restore,
    HardDelete,
}

impl GroupAction {
    /// Actions open to every active member.
    fn is_member_action(&self) -> bool {
        matches!(
            self,
            GroupAction::PostMessage | GroupAction::MarkRead | GroupAction::Leave
        )
    }
}

/// Group admins and holders of the global manage permission.
pub fn is_privileged(principal: &Principal, state: MembershipState) -> bool {
    state == MembershipState::Admin || principal.has_permission(PERMISSION_MANAGE_CHAT)
}

/// Decide whether `principal` may perform `action` on `group`.
///
/// Authorization is checked before the group's lifecycle state, so an
/// outsider learns nothing about whether a group was deleted.
pub fn authorize(
    principal: &Principal,
    group: &Group,
    member: Option<&GroupMember>,
    action: GroupAction,
) -> Result<MembershipState, ServerError> {
    let state = MembershipState::of(member);
    let privileged = is_privileged(principal, state);

    match action {
        GroupAction::View => {
            // Read path: mask existence instead of returning Forbidden.
            if !(state.is_active() || privileged) || (group.is_deleted() && !privileged) {
                return Err(ServerError::not_found("Group not found"));
            }
            return Ok(state);
        }
        a if a.is_member_action() => {
            if !state.is_active() {
                return Err(ServerError::forbidden("Not an active member of this group"));
            }
        }
        _ => {
            if !privileged {
                return Err(ServerError::forbidden("Group admin rights required"));
            }
        }
    }

    match (action, group.is_deleted()) {
        (GroupAction::Restore, false) => Err(ServerError::conflict("Group is not deleted")),
        (GroupAction::Restore | GroupAction::HardDelete, _) => Ok(state),
        (_, true) => Err(ServerError::conflict("Group is deleted")),
        (_, false) => Ok(state),
    }
}

/// Reject a change that would leave the group without an active admin.
///
/// `active_admins` is the count before the change.
pub fn ensure_admin_floor(target: &GroupMember, active_admins: u64) -> Result<(), ServerError> {
    if target.is_active_admin() && active_admins <= 1 {
        return Err(ServerError::conflict(
            "A group must keep at least one admin; promote another member first",
        ));
    }
    Ok(())
}

/// Whether `user` may be added given their existing membership row.
pub fn ensure_addable(existing: Option<&GroupMember>) -> Result<(), ServerError> {
    match MembershipState::of(existing) {
        MembershipState::NotMember => Ok(()),
        MembershipState::Left => Err(ServerError::conflict("User has left this group")),
        MembershipState::Member | MembershipState::Admin => {
            Err(ServerError::conflict("User is already a member"))
        }
    }
}

/// The target of a member operation must be an active member.
pub fn active_target(existing: Option<GroupMember>) -> Result<GroupMember, ServerError> {
    existing
        .filter(GroupMember::is_active)
        .ok_or_else(|| ServerError::not_found("Member not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parlor_shared::{GroupId, UserId};

    fn group(deleted: bool) -> Group {
        let now = Utc::now();
        Group {
            id: GroupId::new(),
            name: "g".into(),
            description: None,
            avatar: None,
            creator_id: UserId::new(),
            created_at: now,
            updated_at: now,
            deleted_at: deleted.then_some(now),
        }
    }

    fn member(group: &Group, user: UserId, role: GroupRole, left: bool) -> GroupMember {
        let mut m = GroupMember::new(group.id, user, role, Utc::now());
        if left {
            m.left_at = Some(Utc::now());
        }
        m
    }

    #[test]
    fn test_state_machine_classification() {
        let g = group(false);
        let user = UserId::new();
        assert_eq!(MembershipState::of(None), MembershipState::NotMember);
        assert_eq!(
            MembershipState::of(Some(&member(&g, user, GroupRole::Member, false))),
            MembershipState::Member
        );
        assert_eq!(
            MembershipState::of(Some(&member(&g, user, GroupRole::Admin, false))),
            MembershipState::Admin
        );
        assert_eq!(
            MembershipState::of(Some(&member(&g, user, GroupRole::Admin, true))),
            MembershipState::Left
        );
    }

    #[test]
    fn test_members_may_post_but_not_administer() {
        let g = group(false);
        let p = Principal::new(UserId::new());
        let m = member(&g, p.id, GroupRole::Member, false);

        assert!(authorize(&p, &g, Some(&m), GroupAction::PostMessage).is_ok());
        assert!(authorize(&p, &g, Some(&m), GroupAction::Leave).is_ok());
        for action in [
            GroupAction::ManageMembers,
            GroupAction::ChangeRole,
            GroupAction::UpdateDetails,
            GroupAction::Delete,
        ] {
            assert!(matches!(
                authorize(&p, &g, Some(&m), action),
                Err(ServerError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn test_left_members_lose_everything() {
        let g = group(false);
        let p = Principal::new(UserId::new());
        let m = member(&g, p.id, GroupRole::Admin, true);

        assert!(matches!(
            authorize(&p, &g, Some(&m), GroupAction::PostMessage),
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&p, &g, Some(&m), GroupAction::ManageMembers),
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&p, &g, Some(&m), GroupAction::View),
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn test_manage_permission_without_membership() {
        let g = group(false);
        let p = Principal::new(UserId::new()).with_permission(PERMISSION_MANAGE_CHAT);

        assert!(authorize(&p, &g, None, GroupAction::ManageMembers).is_ok());
        assert!(authorize(&p, &g, None, GroupAction::View).is_ok());
        // Posting still needs membership.
        assert!(matches!(
            authorize(&p, &g, None, GroupAction::PostMessage),
            Err(ServerError::Forbidden(_))
        ));
    }

    #[test]
    fn test_deleted_group_accepts_only_restore_and_hard_delete() {
        let g = group(true);
        let p = Principal::new(UserId::new());
        let admin = member(&g, p.id, GroupRole::Admin, false);

        assert!(authorize(&p, &g, Some(&admin), GroupAction::Restore).is_ok());
        assert!(authorize(&p, &g, Some(&admin), GroupAction::HardDelete).is_ok());
        for action in [
            GroupAction::PostMessage,
            GroupAction::UpdateDetails,
            GroupAction::ManageMembers,
            GroupAction::Delete,
        ] {
            assert!(matches!(
                authorize(&p, &g, Some(&admin), action),
                Err(ServerError::Conflict(_))
            ));
        }

        let plain = Principal::new(UserId::new());
        let m = member(&g, plain.id, GroupRole::Member, false);
        assert!(matches!(
            authorize(&plain, &g, Some(&m), GroupAction::Restore),
            Err(ServerError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&plain, &g, Some(&m), GroupAction::View),
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn test_restore_requires_deleted_group() {
        let g = group(false);
        let p = Principal::new(UserId::new()).with_permission(PERMISSION_MANAGE_CHAT);
        assert!(matches!(
            authorize(&p, &g, None, GroupAction::Restore),
            Err(ServerError::Conflict(_))
        ));
    }

    #[test]
    fn test_outsider_view_is_masked() {
        let g = group(false);
        let p = Principal::new(UserId::new());
        assert!(matches!(
            authorize(&p, &g, None, GroupAction::View),
            Err(ServerError::NotFound(_))
        ));
    }

    #[test]
    fn test_admin_floor() {
        let g = group(false);
        let admin = member(&g, UserId::new(), GroupRole::Admin, false);
        let plain = member(&g, UserId::new(), GroupRole::Member, false);

        assert!(matches!(
            ensure_admin_floor(&admin, 1),
            Err(ServerError::Conflict(_))
        ));
        assert!(ensure_admin_floor(&admin, 2).is_ok());
        assert!(ensure_admin_floor(&plain, 1).is_ok());
    }

    #[test]
    fn test_left_is_absorbing_for_adds() {
        let g = group(false);
        let user = UserId::new();
        assert!(ensure_addable(None).is_ok());
        assert!(matches!(
            ensure_addable(Some(&member(&g, user, GroupRole::Member, true))),
            Err(ServerError::Conflict(_))
        ));
        assert!(matches!(
            ensure_addable(Some(&member(&g, user, GroupRole::Member, false))),
            Err(ServerError::Conflict(_))
        ));
    }
}
