//! Per-user unread counters.

use parlor_shared::UserId;
use parlor_store::{NotificationScope, SharedDatabase};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Derived on demand, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCounters {
    pub messages: u64,
    pub notifications: u64,
    pub contact_requests: u64,
}

#[derive(Clone)]
pub struct UnreadAggregator {
    db: SharedDatabase,
    curator: Option<UserId>,
}

impl UnreadAggregator {
    pub fn new(db: SharedDatabase, curator: Option<UserId>) -> Self {
        Self { db, curator }
    }

    /// Which notification tier `user` sees.
    pub fn scope_for(&self, user: UserId) -> NotificationScope {
        NotificationScope::for_viewer(user, self.curator)
    }

    pub fn curator(&self) -> Option<UserId> {
        self.curator
    }

    /// Recount all three categories for `user` in one store call, so the
    /// three numbers come from the same snapshot.
    pub async fn counts_for(&self, user: UserId) -> Result<UnreadCounters, ServerError> {
        let scope = self.scope_for(user);

        self.db
            .run(move |db| -> Result<UnreadCounters, ServerError> {
                Ok(UnreadCounters {
                    messages: db.count_unread_messages(user)?,
                    notifications: db.count_unread_notifications(scope)?,
                    contact_requests: db.count_unread_contact_requests()?,
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_shared::{ContactRequestId, ConversationTarget, NotificationId};
    use parlor_store::{now, ContactRequest, Database, Message, Notification, NotificationKind};

    #[tokio::test]
    async fn test_counts_cover_all_three_categories() {
        let curator = UserId::new();
        let user = UserId::new();
        let db = Database::open_in_memory().unwrap();

        db.insert_message(&Message::new(
            UserId::new(),
            ConversationTarget::Direct(user),
            "hi".into(),
            None,
            now(),
        ))
        .unwrap();
        db.insert_notification(&Notification {
            id: NotificationId::new(),
            owner_id: None,
            kind: NotificationKind::System,
            title: "maintenance".into(),
            body: None,
            is_read: false,
            read_at: None,
            created_at: now(),
        })
        .unwrap();
        db.insert_contact_request(&ContactRequest {
            id: ContactRequestId::new(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            message: "hello".into(),
            is_read: false,
            read_at: None,
            created_at: now(),
            deleted_at: None,
        })
        .unwrap();

        let aggregator = UnreadAggregator::new(SharedDatabase::new(db), Some(curator));

        let counts = aggregator.counts_for(user).await.unwrap();
        assert_eq!(
            counts,
            UnreadCounters {
                messages: 1,
                notifications: 0,
                contact_requests: 1,
            }
        );

        let curated = aggregator.counts_for(curator).await.unwrap();
        assert_eq!(curated.messages, 0);
        assert_eq!(curated.notifications, 1);
    }
}
