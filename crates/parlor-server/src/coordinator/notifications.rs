use parlor_shared::constants::{
    MAX_NOTE_BODY_LEN, MAX_NOTIFICATION_TITLE_LEN, PERMISSION_MANAGE_NOTIFICATIONS,
};
use parlor_shared::{validate, NotificationId, Principal, UserId, ValidationError};
use parlor_store::{now, Notification, NotificationKind, StoreError};
use serde::Deserialize;
use tracing::info;

use super::{Coordinator, Page};
use crate::error::ServerError;
use crate::fanout::Audience;
use crate::protocol::ServerEvent;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotification {
    /// Defaults to the caller. Must be absent for system-wide notifications.
    #[serde(default)]
    pub owner_id: Option<UserId>,
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl Coordinator {
    /// Notifications in the caller's visibility tier, newest first.
    pub async fn list_notifications(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<Vec<Notification>, ServerError> {
        let scope = self.unread.scope_for(principal.id);
        self.query(move |db| Ok(db.list_notifications(scope, page.limit(), page.offset())?))
            .await
    }

    pub async fn create_notification(
        &self,
        principal: &Principal,
        req: CreateNotification,
    ) -> Result<Notification, ServerError> {
        let title = validate::required_text("title", &req.title, MAX_NOTIFICATION_TITLE_LEN)?;
        let body = validate::optional_text("body", req.body.as_deref(), MAX_NOTE_BODY_LEN)?;
        let manager = principal.has_permission(PERMISSION_MANAGE_NOTIFICATIONS);

        let owner_id = if req.kind.is_system() {
            if !manager {
                return Err(ServerError::forbidden(
                    "System-wide notifications require notification management rights",
                ));
            }
            if req.owner_id.is_some() {
                return Err(ValidationError::Invalid {
                    field: "owner_id",
                    reason: "system-wide notifications have no owner".to_string(),
                }
                .into());
            }
            None
        } else {
            let owner = req.owner_id.unwrap_or(principal.id);
            if owner != principal.id && !manager {
                return Err(ServerError::forbidden(
                    "Cannot create notifications for other users",
                ));
            }
            Some(owner)
        };

        let notification = Notification {
            id: NotificationId::new(),
            owner_id,
            kind: req.kind,
            title,
            body,
            is_read: false,
            read_at: None,
            created_at: now(),
        };

        let row = notification.clone();
        self.persist("create_notification", move |db| {
            db.insert_notification(&row)?;
            Ok(())
        })
        .await?;

        info!(
            notification = %notification.id,
            kind = %notification.kind,
            actor = %principal.id,
            "Notification created"
        );

        // System-wide notifications are only visible to the curator.
        let recipient = owner_id.or(self.unread.curator());
        if let Some(recipient) = recipient {
            self.publish(
                &[recipient],
                vec![(
                    Audience::user(recipient),
                    ServerEvent::NotificationCreated {
                        notification: notification.clone(),
                    },
                )],
            )
            .await;
        }

        Ok(notification)
    }

    /// Mark one notification read. Notifications outside the caller's tier
    /// are reported as missing.
    pub async fn mark_notification_read(
        &self,
        principal: &Principal,
        notification_id: NotificationId,
    ) -> Result<Notification, ServerError> {
        let scope = self.unread.scope_for(principal.id);
        let (notification, changed) = self
            .persist("mark_notification_read", move |db| {
                let missing = || ServerError::not_found("Notification not found");
                let current = match db.get_notification(notification_id) {
                    Ok(n) if scope.can_see(&n) => n,
                    Ok(_) | Err(StoreError::NotFound) => return Err(missing()),
                    Err(e) => return Err(e.into()),
                };
                if current.is_read {
                    return Ok((current, false));
                }
                db.mark_notification_read(notification_id, now())?;
                Ok((db.get_notification(notification_id)?, true))
            })
            .await?;

        if changed {
            self.publish(&[principal.id], Vec::new()).await;
        }

        Ok(notification)
    }

    /// Mark everything in the caller's tier read and return the refreshed
    /// list. Only the curator's call reaches system-wide notifications.
    pub async fn mark_all_notifications_read(
        &self,
        principal: &Principal,
    ) -> Result<Vec<Notification>, ServerError> {
        let scope = self.unread.scope_for(principal.id);
        let (changed, notifications) = self
            .persist("mark_all_notifications_read", move |db| {
                let changed = db.mark_all_notifications_read(scope, now())?;
                Ok((changed, db.all_notifications(scope)?))
            })
            .await?;

        info!(user = %principal.id, changed, "Notifications marked read");

        // The list depends on the viewer's tier, so only the actor gets it.
        self.publish(
            &[principal.id],
            vec![(
                Audience::user(principal.id),
                ServerEvent::NotificationsRefreshed {
                    notifications: notifications.clone(),
                },
            )],
        )
        .await;

        Ok(notifications)
    }
}
