mod availability;
mod bookings;
mod conflict;
mod error;
mod membership;
mod queries;
mod settlement;

pub use availability::{lesson_slots, SLOT_MINUTES};
pub use conflict::{find_conflict, ConflictCheck};
pub use error::EngineError;
pub use settlement::schedule_confirmation;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::repo::{RepoError, SnapshotRepository};

// ── Coalescing snapshot writer ───────────────────────────────────

pub(super) enum PersistCommand {
    Write {
        snapshot: Snapshot,
        response: oneshot::Sender<Result<(), RepoError>>,
    },
}

/// Background task that owns the repository and batches writes.
/// 1. Block until the first snapshot arrives.
/// 2. Drain all immediately queued snapshots — only the newest can matter,
///    since each one is the full state.
/// 3. Write once.
/// 4. Respond to every waiter with the write's result.
async fn persist_loop(repo: Box<dyn SnapshotRepository>, mut rx: mpsc::Receiver<PersistCommand>) {
    while let Some(PersistCommand::Write { mut snapshot, response }) = rx.recv().await {
        let mut waiters = vec![response];
        while let Ok(PersistCommand::Write { snapshot: newer, response }) = rx.try_recv() {
            snapshot = newer;
            waiters.push(response);
        }

        metrics::histogram!(crate::observability::SNAPSHOT_COALESCED_WRITES)
            .record(waiters.len() as f64);
        let write_start = std::time::Instant::now();
        let result = repo.store(&snapshot).await;
        metrics::histogram!(crate::observability::SNAPSHOT_WRITE_DURATION_SECONDS)
            .record(write_start.elapsed().as_secs_f64());

        for tx in waiters {
            let _ = tx.send(result.clone());
        }
    }
}

/// The booking/availability engine. One instance owns all entity state in a
/// single-writer container; callers receive it by explicit injection, there
/// is no ambient instance.
pub struct Engine {
    /// Live state — same shape as the durable snapshot.
    pub(super) state: RwLock<Snapshot>,
    pub(super) persist_tx: mpsc::Sender<PersistCommand>,
    pub notify: Arc<NotifyHub>,
    /// Scheduled pending→confirmed settlements, keyed by booking id.
    pub(super) settlements: DashMap<BookingId, JoinHandle<()>>,
}

impl Engine {
    /// Recover the last consistent snapshot from `repo` and start the
    /// background snapshot writer.
    pub async fn new(
        repo: Box<dyn SnapshotRepository>,
        notify: Arc<NotifyHub>,
    ) -> Result<Self, EngineError> {
        let state = repo
            .load()
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?
            .unwrap_or_default();
        let (persist_tx, persist_rx) = mpsc::channel(256);
        tokio::spawn(persist_loop(repo, persist_rx));

        Ok(Self {
            state: RwLock::new(state),
            persist_tx,
            notify,
            settlements: DashMap::new(),
        })
    }

    /// Write a snapshot through the background writer and wait for the
    /// result. Every mutation goes through here before it becomes visible.
    async fn persist(&self, snapshot: Snapshot) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.persist_tx
            .send(PersistCommand::Write { snapshot, response: tx })
            .await
            .map_err(|_| EngineError::Storage("snapshot writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("snapshot writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// Persist `next` write-ahead, then publish it as the live state.
    /// On a failed write nothing is published — multi-entity operations
    /// are all-or-nothing by construction.
    pub(super) async fn commit(
        &self,
        state: &mut Snapshot,
        next: Snapshot,
    ) -> Result<(), EngineError> {
        self.persist(next.clone()).await?;
        *state = next;
        Ok(())
    }

    // ── Directory (fed by the Auth collaborator) ─────────────────

    /// Insert or replace a user record.
    pub async fn register_user(&self, user: UserRecord) -> Result<(), EngineError> {
        if user.id.is_nil() {
            return Err(EngineError::Validation("missing user id"));
        }
        if user.name.len() > crate::limits::MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("user name too long"));
        }
        let mut state = self.state.write().await;
        let mut next = state.clone();
        match next.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => next.users.push(user),
        }
        self.commit(&mut state, next).await
    }

    /// Record which user the session is acting as, or clear it.
    pub async fn set_current_user(&self, user_id: Option<UserId>) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        next.current_user = match user_id {
            None => None,
            Some(id) => Some(
                next.users
                    .iter()
                    .find(|u| u.id == id)
                    .cloned()
                    .ok_or(EngineError::NotFound(id))?,
            ),
        };
        self.commit(&mut state, next).await
    }
}
