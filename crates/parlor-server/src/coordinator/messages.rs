use parlor_shared::constants::{MAX_MESSAGE_LEN, PERMISSION_MANAGE_CHAT};
use parlor_shared::{
    validate, ConversationTarget, GroupId, MessageId, Principal, UserId, ValidationError,
};
use parlor_store::{now, Database, Message, MessageKind, StoreError};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{load_group_for, BulkRead, Coordinator, Page};
use crate::error::ServerError;
use crate::fanout::Audience;
use crate::guard::{GroupAction, MembershipState};
use crate::protocol::ServerEvent;
use crate::read_state::{self, ReadReceipt, ReadTracker};

/// Exactly one of `recipient_id` / `group_id` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    #[serde(default)]
    pub recipient_id: Option<UserId>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<MessageId>,
}

/// Whether the caller has read a message.
#[derive(Debug, Clone, Serialize)]
pub struct ReadStatus {
    pub message_id: MessageId,
    pub reader_id: UserId,
    pub read: bool,
}

/// Everyone taking part in the message's conversation.
fn participants(db: &Database, message: &Message) -> Result<Vec<UserId>, ServerError> {
    match &message.kind {
        MessageKind::Direct { recipient_id, .. } => Ok(vec![message.sender_id, *recipient_id]),
        MessageKind::Group { group_id } => Ok(db.active_member_ids(*group_id)?),
    }
}

fn check_parent(db: &Database, message: &Message) -> Result<(), ServerError> {
    let Some(parent_id) = message.parent_id else {
        return Ok(());
    };
    let invalid = || ValidationError::Invalid {
        field: "parent_id",
        reason: "must reference a live message in the same conversation".to_string(),
    };

    match db.get_message(parent_id) {
        Ok(parent)
            if !parent.is_deleted()
                && parent.same_conversation(message.sender_id, &message.target()) =>
        {
            Ok(())
        }
        Ok(_) | Err(StoreError::NotFound) => Err(invalid().into()),
        Err(e) => Err(e.into()),
    }
}

impl Coordinator {
    pub async fn send_message(
        &self,
        principal: &Principal,
        req: SendMessage,
    ) -> Result<Message, ServerError> {
        let target = ConversationTarget::from_parts(req.recipient_id, req.group_id)?;
        if target.recipient_id() == Some(principal.id) {
            return Err(ValidationError::SelfRecipient.into());
        }
        let content = validate::required_text("content", &req.content, MAX_MESSAGE_LEN)?;
        let message = Message::new(principal.id, target, content, req.parent_id, now());

        let actor = principal.clone();
        let row = message.clone();
        let members = self
            .persist("send_message", move |db| {
                let members = match row.target() {
                    ConversationTarget::Direct(recipient) => vec![recipient],
                    ConversationTarget::Group(group_id) => {
                        load_group_for(db, &actor, group_id, GroupAction::PostMessage)?;
                        db.active_member_ids(group_id)?
                    }
                };
                check_parent(db, &row)?;
                db.insert_message(&row)?;
                Ok(members)
            })
            .await?;

        info!(
            message = %message.id,
            sender = %principal.id,
            target = ?message.target(),
            "Message sent"
        );

        let audience = Audience::members_except(members, principal.id);
        self.publish(
            audience.user_ids(),
            vec![(
                audience.clone(),
                ServerEvent::MessageSent {
                    message: message.clone(),
                },
            )],
        )
        .await;

        Ok(message)
    }

    pub async fn mark_message_read(
        &self,
        principal: &Principal,
        message_id: MessageId,
    ) -> Result<ReadReceipt, ServerError> {
        let reader = principal.clone();
        let (receipt, audience) = self
            .persist("mark_message_read", move |db| {
                let receipt = read_state::mark_message_read(db, message_id, &reader, now())?;
                let audience = if receipt.changed() {
                    participants(db, &receipt.message)?
                } else {
                    Vec::new()
                };
                Ok((receipt, audience))
            })
            .await?;

        if receipt.changed() {
            self.publish(
                &[principal.id],
                vec![(
                    Audience::users(audience),
                    ServerEvent::MessageRead {
                        message_id,
                        target: receipt.message.target(),
                        reader_id: principal.id,
                        is_read: true,
                        read_at: receipt.read_at,
                    },
                )],
            )
            .await;
        }

        Ok(receipt)
    }

    pub async fn read_status(
        &self,
        principal: &Principal,
        message_id: MessageId,
    ) -> Result<ReadStatus, ServerError> {
        let viewer = principal.clone();
        self.query(move |db| {
            let message = read_state::live_message(db, message_id)?;
            match message.target() {
                ConversationTarget::Direct(recipient) => {
                    if viewer.id != recipient && viewer.id != message.sender_id {
                        return Err(ServerError::not_found("Message not found"));
                    }
                }
                ConversationTarget::Group(group_id) => {
                    load_group_for(db, &viewer, group_id, GroupAction::View)?;
                }
            }
            let read = ReadTracker::for_message(&message).is_read_by(db, &message, viewer.id)?;
            Ok(ReadStatus {
                message_id,
                reader_id: viewer.id,
                read,
            })
        })
        .await
    }

    /// Direct messages between the caller and `peer`, newest first.
    pub async fn list_direct_thread(
        &self,
        principal: &Principal,
        peer: UserId,
        page: Page,
    ) -> Result<Vec<Message>, ServerError> {
        let me = principal.id;
        self.query(move |db| Ok(db.list_direct_thread(me, peer, page.limit(), page.offset())?))
            .await
    }

    /// Mark everything `peer` sent the caller as read.
    pub async fn mark_direct_thread_read(
        &self,
        principal: &Principal,
        peer: UserId,
    ) -> Result<BulkRead, ServerError> {
        let me = principal.id;
        let read_at = now();
        let count = self
            .persist("mark_direct_thread_read", move |db| {
                Ok(db.mark_direct_thread_read(me, peer, read_at)?)
            })
            .await?;

        let result = BulkRead {
            target: ConversationTarget::Direct(peer),
            count,
            read_at,
        };

        if count > 0 {
            self.publish(
                &[me],
                vec![(
                    Audience::users([me, peer]),
                    ServerEvent::ConversationRead {
                        target: result.target,
                        reader_id: me,
                        count,
                        read_at,
                    },
                )],
            )
            .await;
        }

        Ok(result)
    }

    /// Soft delete by the author, an admin of the message's group, or a
    /// chat manager.
    pub async fn delete_message(
        &self,
        principal: &Principal,
        message_id: MessageId,
    ) -> Result<(), ServerError> {
        let actor = principal.clone();
        let (target, audience) = self
            .persist("delete_message", move |db| {
                let message = read_state::live_message(db, message_id)?;
                let manager = actor.has_permission(PERMISSION_MANAGE_CHAT);

                if let Some(group_id) = message.group_id() {
                    let group = db.get_group(group_id)?;
                    let state = MembershipState::of(db.get_member(group_id, actor.id)?.as_ref());
                    let allowed = manager
                        || message.sender_id == actor.id
                        || state == MembershipState::Admin;
                    if !allowed {
                        return Err(ServerError::forbidden("Cannot delete this message"));
                    }
                    if group.is_deleted() {
                        return Err(ServerError::conflict("Group is deleted"));
                    }
                } else if !(manager || message.sender_id == actor.id) {
                    return Err(ServerError::forbidden("Cannot delete this message"));
                }

                let audience = participants(db, &message)?;
                db.soft_delete_message(message_id, now())?;
                Ok((message.target(), audience))
            })
            .await?;

        info!(message = %message_id, actor = %principal.id, "Message deleted");

        self.publish(
            &audience,
            vec![(
                Audience::users(audience.clone()),
                ServerEvent::MessageDeleted {
                    message_id,
                    target,
                    permanent: false,
                },
            )],
        )
        .await;

        Ok(())
    }

    /// Remove a message for good, soft-deleted or not. Chat managers only.
    pub async fn hard_delete_message(
        &self,
        principal: &Principal,
        message_id: MessageId,
    ) -> Result<(), ServerError> {
        if !principal.has_permission(PERMISSION_MANAGE_CHAT) {
            return Err(ServerError::forbidden("Permanent deletion requires chat management rights"));
        }

        let (target, audience) = self
            .persist("hard_delete_message", move |db| {
                let message = match db.get_message(message_id) {
                    Ok(message) => message,
                    Err(StoreError::NotFound) => {
                        return Err(ServerError::not_found("Message not found"))
                    }
                    Err(e) => return Err(e.into()),
                };
                let audience = participants(db, &message)?;
                db.hard_delete_message(message_id)?;
                Ok((message.target(), audience))
            })
            .await?;

        info!(message = %message_id, actor = %principal.id, "Message permanently deleted");

        self.publish(
            &audience,
            vec![(
                Audience::users(audience.clone()),
                ServerEvent::MessageDeleted {
                    message_id,
                    target,
                    permanent: true,
                },
            )],
        )
        .await;

        Ok(())
    }
}
