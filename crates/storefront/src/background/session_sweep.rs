//! Periodic removal of expired sessions.
//!
//! Expired sessions are already rejected on lookup; this job only reclaims
//! their storage. The first sweep runs one interval after start, then on a
//! fixed interval until cancelled.

use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::Store;
use crate::services::tokens::EntropySource;
use crate::state::AppState;

/// Run the session sweep loop.
///
/// Sweep failures are logged and the loop keeps going. Runs until `cancel`
/// is triggered.
pub async fn run<S, E>(state: AppState<S, E>, interval: Duration, cancel: CancellationToken)
where
    S: Store,
    E: EntropySource,
{
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Session sweep job started"
    );

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("Session sweep job stopping");
                break;
            }
            _ = ticker.tick() => {
                match state.sessions().sweep_expired(Utc::now()).await {
                    Ok(0) => tracing::debug!("Session sweep: nothing to remove"),
                    Ok(removed) => tracing::debug!(removed, "Session sweep: removed expired sessions"),
                    Err(e) => tracing::error!(error = %e, "Session sweep: cleanup failed"),
                }
            }
        }
    }
}

/// A spawned session sweep task.
pub struct SessionSweeper {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionSweeper {
    /// Spawn the sweep loop on the current runtime.
    #[must_use]
    pub fn spawn<S, E>(state: AppState<S, E>, interval: Duration) -> Self
    where
        S: Store + 'static,
        E: EntropySource + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(state, interval, cancel.clone()));
        Self { cancel, task }
    }

    /// Token that stops the loop when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the loop and wait for the task to finish.
    ///
    /// # Errors
    ///
    /// Returns the `JoinError` if the task panicked.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.task.await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use pennyshop_core::{CsrfToken, SessionId, Username};

    use super::*;
    use crate::config::{HashingConfig, LedgerConfig, SessionConfig};
    use crate::db::{MemoryStore, SessionStore, UserStore};
    use crate::models::NewSession;
    use crate::services::auth::CredentialHasher;
    use crate::services::tokens::TokenGenerator;

    fn state(store: MemoryStore) -> AppState<MemoryStore> {
        let hasher = CredentialHasher::new(&HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        AppState::new(
            store,
            hasher,
            TokenGenerator::os(),
            SessionConfig::default(),
            LedgerConfig::default(),
        )
    }

    async fn insert_expired(store: &MemoryStore) {
        let user = store
            .create_user(&Username::parse("test_user").unwrap(), "hash")
            .await
            .unwrap();
        store
            .insert_session(NewSession {
                id: SessionId::from("expired"),
                csrf_token: CsrfToken::from("csrf"),
                user_id: user.id,
                source_addr: None,
                expires_at: Utc::now() - TimeDelta::minutes(1),
            })
            .await
            .unwrap();
    }

    async fn wait_for_sessions(store: &MemoryStore, expected: usize) -> bool {
        for _ in 0..100 {
            if store.session_count().await.unwrap() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_sweeps_on_interval() {
        let store = MemoryStore::new();
        insert_expired(&store).await;

        let sweeper = SessionSweeper::spawn(state(store.clone()), Duration::from_millis(20));
        assert!(wait_for_sessions(&store, 0).await);
        sweeper.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_loop() {
        let store = MemoryStore::new();
        insert_expired(&store).await;
        store.fail_sweeps(true);

        let sweeper = SessionSweeper::spawn(state(store.clone()), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.session_count().await.unwrap(), 1);

        store.fail_sweeps(false);
        assert!(wait_for_sessions(&store, 0).await);
        sweeper.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let store = MemoryStore::new();
        insert_expired(&store).await;

        let sweeper = SessionSweeper::spawn(state(store.clone()), Duration::from_secs(24 * 60 * 60));
        tokio::time::timeout(Duration::from_secs(1), sweeper.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.session_count().await.unwrap(), 1);
    }
}
