//! Mutation/sync coordination.
//!
//! Every state-changing operation runs the same sequence:
//!
//! 1. validate input shape (no store access, no side effects),
//! 2. authorize and persist inside one store closure, bounded by the
//!    mutation timeout,
//! 3. recompute unread counters for every affected user,
//! 4. fan out domain events, then the fresh counters.
//!
//! Steps 3 and 4 only run after the write committed, and their failures are
//! logged rather than returned.

mod contact;
mod groups;
mod messages;
mod notifications;


use std::time::Duration;

use parlor_shared::{validate, GroupId, Principal, Room, UserId};
use parlor_store::{Database, Group, SharedDatabase, StoreError};
use serde::Deserialize;
use tracing::warn;

use crate::error::ServerError;
use crate::fanout::{Audience, Fanout};
use crate::guard::{self, GroupAction, MembershipState};
use crate::protocol::ServerEvent;
use crate::registry::SessionRegistry;
use crate::unread::{UnreadAggregator, UnreadCounters};

pub use contact::SubmitContactRequest;
pub use groups::{AddMember, BulkRead, ChangeRole, CreateGroup, GroupDetails, UpdateGroup};
pub use messages::{ReadStatus, SendMessage};
pub use notifications::CreateNotification;

/// Listing window from `?limit=&offset=`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Page {
    pub fn limit(&self) -> u32 {
        validate::page_size(self.limit)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct Coordinator {
    db: SharedDatabase,
    unread: UnreadAggregator,
    fanout: Fanout,
    mutation_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        db: SharedDatabase,
        registry: SessionRegistry,
        curator: Option<UserId>,
        mutation_timeout: Duration,
    ) -> Self {
        Self {
            unread: UnreadAggregator::new(db.clone(), curator),
            fanout: Fanout::new(registry),
            db,
            mutation_timeout,
        }
    }

    pub fn unread(&self) -> &UnreadAggregator {
        &self.unread
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.fanout.registry()
    }

    /// Rooms a freshly connected session should join besides its personal
    /// room.
    pub async fn group_rooms_for(&self, user: UserId) -> Result<Vec<Room>, ServerError> {
        let groups = self
            .db
            .run(move |db| db.active_group_ids_for(user).map_err(ServerError::from))
            .await?;
        Ok(groups.into_iter().map(Room::Group).collect())
    }

    // -----------------------------------------------------------------------
    // Sequencing helpers
    // -----------------------------------------------------------------------

    /// Run an authorize-and-write closure under the mutation timeout.
    ///
    /// On timeout the closure keeps running to completion on the blocking
    /// pool; whatever it commits stays committed.
    async fn persist<T, F>(&self, op: &'static str, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> Result<T, ServerError> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(self.mutation_timeout, self.db.run(f)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout_ms = self.mutation_timeout.as_millis() as u64, "Mutation timed out");
                Err(ServerError::Timeout(format!("{op} did not complete in time")))
            }
        }
    }

    /// Read-only store access.
    async fn query<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> Result<T, ServerError> + Send + 'static,
        T: Send + 'static,
    {
        self.db.run(f).await
    }

    async fn recompute(&self, users: &[UserId]) -> Vec<(UserId, UnreadCounters)> {
        let mut counts = Vec::with_capacity(users.len());
        for user in users {
            match self.unread.counts_for(*user).await {
                Ok(c) => counts.push((*user, c)),
                Err(e) => warn!(user = %user, error = %e, "Could not recompute unread counts"),
            }
        }
        counts
    }

    /// Steps 3 and 4: recompute counters for `affected`, deliver `events`,
    /// then push each affected user's counters to their personal room.
    async fn publish(&self, affected: &[UserId], events: Vec<(Audience, ServerEvent)>) {
        let counts = self.recompute(affected).await;

        for (audience, event) in &events {
            self.fanout.emit(audience, event).await;
        }
        for (user, counts) in counts {
            self.fanout
                .emit(&Audience::user(user), &ServerEvent::UnreadCounts { counts })
                .await;
        }
    }
}

/// Load a group and authorize `action` on it. Runs inside a store closure.
pub(crate) fn load_group_for(
    db: &Database,
    principal: &Principal,
    group_id: GroupId,
    action: GroupAction,
) -> Result<(Group, MembershipState), ServerError> {
    let group = match db.get_group(group_id) {
        Ok(group) => group,
        Err(StoreError::NotFound) => return Err(ServerError::not_found("Group not found")),
        Err(e) => return Err(e.into()),
    };
    let member = db.get_member(group_id, principal.id)?;
    let state = guard::authorize(principal, &group, member.as_ref(), action)?;
    Ok((group, state))
}
