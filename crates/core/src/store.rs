//! Storage seams and in-memory backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{Error, Result, StoreErrorCode};
use crate::events::Event;
use crate::session::{Session, SessionKey, SessionUpdate};

/// Append-only raw event storage.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: &Event) -> Result<()>;

    /// Delete events older than `cutoff`. Returns rows removed when known.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Session rollup storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Atomic find-or-create-and-update for one event.
    async fn apply(&self, update: &SessionUpdate) -> Result<()>;

    async fn get(&self, key: &SessionKey) -> Result<Option<Session>>;

    /// Delete sessions that started before `cutoff`.
    async fn purge_started_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Consumes one injected failure, if any are pending.
fn take_failure(pending: &AtomicU32) -> bool {
    pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Raw events kept in a vector.
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<Event>>,
    failures: AtomicU32,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` inserts fail.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: &Event) -> Result<()> {
        if take_failure(&self.failures) {
            return Err(Error::storage(
                StoreErrorCode::EventWrite,
                "injected event store failure",
            ));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| e.timestamp >= cutoff);
        Ok((before - events.len()) as u64)
    }
}

/// Sessions in a map. The map lock is the atomic upsert primitive.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, Session>>,
    failures: AtomicU32,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` upserts fail.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn apply(&self, update: &SessionUpdate) -> Result<()> {
        if take_failure(&self.failures) {
            return Err(Error::storage(
                StoreErrorCode::SessionWrite,
                "injected session store failure",
            ));
        }
        let mut sessions = self.sessions.lock();
        let key = update.key();
        let next = update.fold(sessions.remove(&key));
        sessions.insert(key, next);
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<Session>> {
        Ok(self.sessions.lock().get(key).cloned())
    }

    async fn purge_started_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.start_time >= cutoff);
        Ok((before - sessions.len()) as u64)
    }
}
