//! Shared application state and the in-process session registry

use chrono::{DateTime, Duration, Utc};
use graphrag_common::config::AppConfig;
use graphrag_common::errors::{AppError, Result};
use graphrag_common::metrics;
use graphrag_context::{RagAgent, Session};
use graphrag_search::StoreCatalog;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub agent: Arc<RagAgent>,
    pub catalog: Arc<dyn StoreCatalog>,
    pub sessions: Arc<SessionRegistry>,
}

struct Entry {
    session: Arc<Mutex<Session>>,
    last_seen: std::sync::Mutex<DateTime<Utc>>,
}

impl Entry {
    fn last_seen(&self) -> DateTime<Utc> {
        match self.last_seen.lock() {
            Ok(seen) => *seen,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn touch(&self, now: DateTime<Utc>) {
        match self.last_seen.lock() {
            Ok(mut seen) => *seen = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// Idle past `ttl` and not serving a query
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_seen() > ttl && self.session.try_lock().is_ok()
    }
}

/// Live sessions, each behind its own lock so queries within a session run
/// one at a time while different sessions proceed independently
pub struct SessionRegistry {
    entries: RwLock<HashMap<Uuid, Arc<Entry>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self) -> Session {
        let session = Session::new();
        let snapshot = session.clone();
        let entry = Entry {
            session: Arc::new(Mutex::new(session)),
            last_seen: std::sync::Mutex::new(Utc::now()),
        };

        let mut entries = self.entries.write().await;
        entries.insert(snapshot.id, Arc::new(entry));
        metrics::record_sessions(entries.len());
        info!(session_id = %snapshot.id, "Session created");
        snapshot
    }

    /// Look up a live session, refreshing its idle timer
    pub async fn get(&self, id: Uuid) -> Result<Arc<Mutex<Session>>> {
        let now = Utc::now();
        let entry = self.entries.read().await.get(&id).cloned();

        match entry {
            Some(entry) if !entry.is_expired(self.ttl, now) => {
                entry.touch(now);
                Ok(entry.session.clone())
            }
            Some(_) => {
                self.remove(id).await;
                Err(AppError::SessionNotFound { id: id.to_string() })
            }
            None => Err(AppError::SessionNotFound { id: id.to_string() }),
        }
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(&id).is_some();
        metrics::record_sessions(entries.len());
        removed
    }

    /// Drop idle sessions; returns how many were removed
    pub async fn expire_idle(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.ttl, now));
        let removed = before - entries.len();

        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Expired idle sessions");
        }
        metrics::record_sessions(entries.len());
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
