//! Async access to the store.
//!
//! rusqlite connections are blocking and not `Sync`, so the async server
//! never touches [`Database`] directly. It clones a [`SharedDatabase`] and
//! hands it closures, which run one at a time on tokio's blocking pool.

use std::sync::{Arc, Mutex};

use crate::database::Database;
use crate::error::StoreError;

/// Cloneable handle to a single serialized connection.
///
/// Every closure passed to [`SharedDatabase::run`] holds the connection
/// exclusively for its whole duration, so a read-check-write sequence inside
/// one closure cannot interleave with another request.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn run<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Database) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let joined = tokio::task::spawn_blocking(move || {
            let mut db = inner
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))?;
            f(&mut *db)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "store task failed");
                Err(StoreError::Unavailable(e.to_string()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_closure_result() {
        let shared = SharedDatabase::new(Database::open_in_memory().unwrap());
        let version: u32 = shared
            .run(|db| {
                db.conn()
                    .pragma_query_value(None, "user_version", |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .await
            .unwrap();
        assert_eq!(version, crate::migrations::CURRENT_VERSION);
    }

    #[tokio::test]
    async fn closure_errors_propagate() {
        let shared = SharedDatabase::new(Database::open_in_memory().unwrap());
        let result: Result<(), StoreError> = shared.run(|_| Err(StoreError::NotFound)).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
