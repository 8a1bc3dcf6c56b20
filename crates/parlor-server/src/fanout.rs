//! Best-effort event delivery.
//!
//! Conversation events are addressed to each active member's personal room
//! rather than a shared group room, so a member removed mid-session stops
//! receiving group traffic immediately, whatever rooms their socket joined.

use parlor_shared::{Room, UserId};
use tracing::{debug, warn};

use crate::protocol::ServerEvent;
use crate::registry::{DeliveryReport, SessionRegistry};

/// Who receives an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audience {
    users: Vec<UserId>,
}

impl Audience {
    pub fn user(user: UserId) -> Self {
        Self { users: vec![user] }
    }

    pub fn users(users: impl IntoIterator<Item = UserId>) -> Self {
        let mut users: Vec<UserId> = users.into_iter().collect();
        users.sort();
        users.dedup();
        Self { users }
    }

    /// Every listed member except `excluded` (usually the actor).
    pub fn members_except(members: impl IntoIterator<Item = UserId>, excluded: UserId) -> Self {
        Self::users(members.into_iter().filter(|m| *m != excluded))
    }

    pub fn with(mut self, user: UserId) -> Self {
        if !self.users.contains(&user) {
            self.users.push(user);
            self.users.sort();
        }
        self
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.users
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.users.iter().copied().map(Room::User).collect()
    }
}

#[derive(Clone)]
pub struct Fanout {
    registry: SessionRegistry,
}

impl Fanout {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Deliver `event` to `audience`. Never fails: a committed mutation
    /// stays committed whether or not anyone hears about it.
    pub async fn emit(&self, audience: &Audience, event: &ServerEvent) -> DeliveryReport {
        if audience.is_empty() {
            return DeliveryReport::default();
        }

        match self.registry.deliver(&audience.rooms(), event).await {
            Ok(report) => {
                if report.dropped > 0 {
                    warn!(
                        event = event.name(),
                        dropped = report.dropped,
                        "Fanout dropped frames for slow sessions"
                    );
                }
                debug!(
                    event = event.name(),
                    users = audience.user_ids().len(),
                    sessions = report.delivered,
                    "Fanout delivered"
                );
                report
            }
            Err(e) => {
                warn!(event = event.name(), error = %e, "Fanout failed; mutation stands");
                DeliveryReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_shared::Principal;

    #[test]
    fn test_members_except_drops_actor_and_duplicates() {
        let a = UserId::new();
        let b = UserId::new();
        let audience = Audience::members_except([a, b, b], a);
        assert_eq!(audience.user_ids(), &[b]);
        assert_eq!(audience.rooms(), vec![Room::User(b)]);
    }

    #[test]
    fn test_with_adds_once() {
        let a = UserId::new();
        let audience = Audience::user(a).with(a);
        assert_eq!(audience.user_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_emit_targets_personal_rooms() {
        let registry = SessionRegistry::new(8);
        let fanout = Fanout::new(registry.clone());
        let a = UserId::new();
        let b = UserId::new();
        let (_sa, mut rx_a) = registry.register(Principal::new(a)).await;
        let (_sb, mut rx_b) = registry.register(Principal::new(b)).await;

        let event = ServerEvent::Error {
            message: "x".into(),
        };
        let report = fanout.emit(&Audience::user(b), &event).await;
        assert_eq!(report.delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_emit_to_nobody_is_fine() {
        let fanout = Fanout::new(SessionRegistry::new(8));
        let event = ServerEvent::Error {
            message: "x".into(),
        };
        assert_eq!(
            fanout.emit(&Audience::users([]), &event).await,
            DeliveryReport::default()
        );
    }
}
