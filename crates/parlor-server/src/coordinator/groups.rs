use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parlor_shared::constants::{MAX_AVATAR_LEN, MAX_GROUP_DESCRIPTION_LEN, MAX_GROUP_NAME_LEN};
use parlor_shared::{validate, ConversationTarget, GroupId, GroupRole, Principal, UserId};
use parlor_store::{now, Group, GroupMember, Message};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{load_group_for, Coordinator, Page};
use crate::error::ServerError;
use crate::fanout::Audience;
use crate::guard::{self, GroupAction};
use crate::protocol::ServerEvent;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Initial members besides the creator.
    #[serde(default)]
    pub member_ids: Vec<UserId>,
}

/// Absent fields stay as they are; a blank description or avatar clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMember {
    pub user_id: UserId,
    #[serde(default)]
    pub role: Option<GroupRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRole {
    pub role: GroupRole,
}

/// A group with its membership rows, active and left.
#[derive(Debug, Clone, Serialize)]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<GroupMember>,
}

/// Result of marking a whole conversation read.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRead {
    pub target: ConversationTarget,
    pub count: usize,
    pub read_at: DateTime<Utc>,
}

impl Coordinator {
    pub async fn create_group(
        &self,
        principal: &Principal,
        req: CreateGroup,
    ) -> Result<GroupDetails, ServerError> {
        let name = validate::required_text("name", &req.name, MAX_GROUP_NAME_LEN)?;
        let description = validate::optional_text(
            "description",
            req.description.as_deref(),
            MAX_GROUP_DESCRIPTION_LEN,
        )?;
        let avatar = validate::optional_text("avatar", req.avatar.as_deref(), MAX_AVATAR_LEN)?;

        let at = now();
        let group = Group {
            id: GroupId::new(),
            name,
            description,
            avatar,
            creator_id: principal.id,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        };

        let mut members = vec![GroupMember::new(group.id, principal.id, GroupRole::Admin, at)];
        let mut seen = HashSet::from([principal.id]);
        for user in req.member_ids {
            if seen.insert(user) {
                members.push(GroupMember::new(group.id, user, GroupRole::Member, at));
            }
        }

        let details = GroupDetails { group, members };
        let row = details.clone();
        self.persist("create_group", move |db| {
            db.create_group(&row.group, &row.members)?;
            Ok(())
        })
        .await?;

        info!(
            group = %details.group.id,
            creator = %principal.id,
            members = details.members.len(),
            "Group created"
        );

        let audience = Audience::users(details.members.iter().map(|m| m.user_id));
        self.publish(
            &[],
            vec![(
                audience,
                ServerEvent::GroupUpdated {
                    group: details.group.clone(),
                },
            )],
        )
        .await;

        Ok(details)
    }

    pub async fn list_my_groups(&self, principal: &Principal) -> Result<Vec<Group>, ServerError> {
        let user = principal.id;
        self.query(move |db| Ok(db.list_groups_for_member(user)?)).await
    }

    pub async fn get_group(
        &self,
        principal: &Principal,
        group_id: GroupId,
    ) -> Result<GroupDetails, ServerError> {
        let principal = principal.clone();
        self.query(move |db| {
            let (group, _) = load_group_for(db, &principal, group_id, GroupAction::View)?;
            let members = db.list_members(group_id)?;
            Ok(GroupDetails { group, members })
        })
        .await
    }

    pub async fn update_group(
        &self,
        principal: &Principal,
        group_id: GroupId,
        req: UpdateGroup,
    ) -> Result<Group, ServerError> {
        let name = req
            .name
            .as_deref()
            .map(|n| validate::required_text("name", n, MAX_GROUP_NAME_LEN))
            .transpose()?;
        let description = req
            .description
            .as_deref()
            .map(|d| validate::optional_text("description", Some(d), MAX_GROUP_DESCRIPTION_LEN))
            .transpose()?;
        let avatar = req
            .avatar
            .as_deref()
            .map(|a| validate::optional_text("avatar", Some(a), MAX_AVATAR_LEN))
            .transpose()?;

        let actor = principal.clone();
        let (group, members) = self
            .persist("update_group", move |db| {
                let (mut group, _) =
                    load_group_for(db, &actor, group_id, GroupAction::UpdateDetails)?;
                if let Some(name) = name {
                    group.name = name;
                }
                if let Some(description) = description {
                    group.description = description;
                }
                if let Some(avatar) = avatar {
                    group.avatar = avatar;
                }
                group.updated_at = now();
                db.update_group_details(&group)?;
                Ok((group, db.active_member_ids(group_id)?))
            })
            .await?;

        info!(group = %group_id, actor = %principal.id, "Group updated");

        self.publish(
            &[],
            vec![(
                Audience::users(members),
                ServerEvent::GroupUpdated {
                    group: group.clone(),
                },
            )],
        )
        .await;

        Ok(group)
    }

    /// Soft delete. Members keep their rows; the group stops counting
    /// toward unread totals until restored.
    pub async fn delete_group(
        &self,
        principal: &Principal,
        group_id: GroupId,
    ) -> Result<(), ServerError> {
        let actor = principal.clone();
        let members = self
            .persist("delete_group", move |db| {
                load_group_for(db, &actor, group_id, GroupAction::Delete)?;
                let members = db.active_member_ids(group_id)?;
                db.soft_delete_group(group_id, now())?;
                Ok(members)
            })
            .await?;

        info!(group = %group_id, actor = %principal.id, "Group soft-deleted");

        self.publish(
            &members,
            vec![(Audience::users(members.clone()), ServerEvent::GroupDeleted { group_id })],
        )
        .await;

        Ok(())
    }

    pub async fn restore_group(
        &self,
        principal: &Principal,
        group_id: GroupId,
    ) -> Result<Group, ServerError> {
        let actor = principal.clone();
        let (group, members) = self
            .persist("restore_group", move |db| {
                load_group_for(db, &actor, group_id, GroupAction::Restore)?;
                db.restore_group(group_id, now())?;
                Ok((db.get_group(group_id)?, db.active_member_ids(group_id)?))
            })
            .await?;

        info!(group = %group_id, actor = %principal.id, "Group restored");

        self.publish(
            &members,
            vec![(
                Audience::users(members.clone()),
                ServerEvent::GroupRestored {
                    group: group.clone(),
                },
            )],
        )
        .await;

        Ok(group)
    }

    /// Irreversible. Messages, receipts and memberships go with the group.
    pub async fn hard_delete_group(
        &self,
        principal: &Principal,
        group_id: GroupId,
    ) -> Result<(), ServerError> {
        let actor = principal.clone();
        let members = self
            .persist("hard_delete_group", move |db| {
                load_group_for(db, &actor, group_id, GroupAction::HardDelete)?;
                let members = db.active_member_ids(group_id)?;
                db.hard_delete_group(group_id)?;
                Ok(members)
            })
            .await?;

        info!(group = %group_id, actor = %principal.id, "Group permanently deleted");

        self.publish(
            &members,
            vec![(
                Audience::users(members.clone()),
                ServerEvent::GroupHardDeleted { group_id },
            )],
        )
        .await;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    pub async fn add_member(
        &self,
        principal: &Principal,
        group_id: GroupId,
        req: AddMember,
    ) -> Result<GroupMember, ServerError> {
        let actor = principal.clone();
        let (member, members) = self
            .persist("add_member", move |db| {
                load_group_for(db, &actor, group_id, GroupAction::ManageMembers)?;
                guard::ensure_addable(db.get_member(group_id, req.user_id)?.as_ref())?;

                let member = GroupMember::new(
                    group_id,
                    req.user_id,
                    req.role.unwrap_or(GroupRole::Member),
                    now(),
                );
                db.add_member(&member)?;
                Ok((member, db.active_member_ids(group_id)?))
            })
            .await?;

        info!(
            group = %group_id,
            user = %member.user_id,
            role = %member.role,
            actor = %principal.id,
            "Member added"
        );

        self.publish(
            &[member.user_id],
            vec![(
                Audience::users(members),
                ServerEvent::MemberAdded {
                    group_id,
                    member: member.clone(),
                },
            )],
        )
        .await;

        Ok(member)
    }

    pub async fn remove_member(
        &self,
        principal: &Principal,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<(), ServerError> {
        let actor = principal.clone();
        let remaining = self
            .persist("remove_member", move |db| {
                load_group_for(db, &actor, group_id, GroupAction::ManageMembers)?;
                let target = guard::active_target(db.get_member(group_id, user_id)?)?;
                guard::ensure_admin_floor(&target, db.count_active_admins(group_id)?)?;
                db.mark_member_left(group_id, user_id, now())?;
                Ok(db.active_member_ids(group_id)?)
            })
            .await?;

        info!(group = %group_id, user = %user_id, actor = %principal.id, "Member removed");

        self.publish(
            &[user_id],
            vec![(
                Audience::users(remaining).with(user_id),
                ServerEvent::MemberRemoved {
                    group_id,
                    user_id,
                    voluntary: false,
                },
            )],
        )
        .await;

        Ok(())
    }

    pub async fn change_member_role(
        &self,
        principal: &Principal,
        group_id: GroupId,
        user_id: UserId,
        req: ChangeRole,
    ) -> Result<GroupMember, ServerError> {
        let actor = principal.clone();
        let role = req.role;
        let (member, members) = self
            .persist("change_member_role", move |db| {
                load_group_for(db, &actor, group_id, GroupAction::ChangeRole)?;
                let mut target = guard::active_target(db.get_member(group_id, user_id)?)?;
                if role != GroupRole::Admin {
                    guard::ensure_admin_floor(&target, db.count_active_admins(group_id)?)?;
                }
                db.set_member_role(group_id, user_id, role)?;
                target.role = role;
                Ok((target, db.active_member_ids(group_id)?))
            })
            .await?;

        info!(
            group = %group_id,
            user = %user_id,
            role = %role,
            actor = %principal.id,
            "Member role changed"
        );

        self.publish(
            &[],
            vec![(
                Audience::users(members),
                ServerEvent::MemberRoleChanged {
                    group_id,
                    user_id,
                    role,
                },
            )],
        )
        .await;

        Ok(member)
    }

    pub async fn leave_group(
        &self,
        principal: &Principal,
        group_id: GroupId,
    ) -> Result<(), ServerError> {
        let actor = principal.clone();
        let user_id = principal.id;
        let remaining = self
            .persist("leave_group", move |db| {
                load_group_for(db, &actor, group_id, GroupAction::Leave)?;
                let me = guard::active_target(db.get_member(group_id, user_id)?)?;
                guard::ensure_admin_floor(&me, db.count_active_admins(group_id)?)?;
                db.mark_member_left(group_id, user_id, now())?;
                Ok(db.active_member_ids(group_id)?)
            })
            .await?;

        info!(group = %group_id, user = %user_id, "Member left");

        self.publish(
            &[user_id],
            vec![(
                Audience::users(remaining).with(user_id),
                ServerEvent::MemberRemoved {
                    group_id,
                    user_id,
                    voluntary: true,
                },
            )],
        )
        .await;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Group conversation
    // -----------------------------------------------------------------------

    pub async fn list_group_messages(
        &self,
        principal: &Principal,
        group_id: GroupId,
        page: Page,
    ) -> Result<Vec<Message>, ServerError> {
        let principal = principal.clone();
        self.query(move |db| {
            load_group_for(db, &principal, group_id, GroupAction::View)?;
            Ok(db.list_group_messages(group_id, page.limit(), page.offset())?)
        })
        .await
    }

    /// Mark every message in the group read for the caller.
    pub async fn mark_group_read(
        &self,
        principal: &Principal,
        group_id: GroupId,
    ) -> Result<BulkRead, ServerError> {
        let actor = principal.clone();
        let read_at = now();
        let (count, members) = self
            .persist("mark_group_read", move |db| {
                load_group_for(db, &actor, group_id, GroupAction::MarkRead)?;
                let count = db.mark_group_read(group_id, actor.id, read_at)?;
                Ok((count, db.active_member_ids(group_id)?))
            })
            .await?;

        let result = BulkRead {
            target: ConversationTarget::Group(group_id),
            count,
            read_at,
        };

        if count > 0 {
            self.publish(
                &[principal.id],
                vec![(
                    Audience::users(members),
                    ServerEvent::ConversationRead {
                        target: result.target,
                        reader_id: principal.id,
                        count,
                        read_at,
                    },
                )],
            )
            .await;
        }

        Ok(result)
    }
}
