//! Per-client composer sessions
//!
//! Every client gets its own [`WordComposer`] keyed by the `x-session-id`
//! header. Sessions are created lazily, capped at `max_sessions`, and dropped
//! either explicitly or by the idle sweep. The `default` session used by
//! header-less requests does not count against the cap.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, Timestamp};
use crate::composer::{ComposerConfig, WordComposer};
use crate::config::SessionSettings;

const MAX_ID_LEN: usize = 64;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("invalid session id {0:?}: expected 1-64 characters of [A-Za-z0-9_-]")]
    InvalidId(String),

    #[error("session limit reached ({limit} active)")]
    TooMany { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub const DEFAULT: &'static str = "default";

    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(SessionError::InvalidId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Session {
    id: SessionId,
    composer: Mutex<WordComposer>,
    created_at: DateTime<Utc>,
    /// Clock reading of the last request, in nanoseconds
    last_active: AtomicU64,
}

impl Session {
    fn new(id: SessionId, config: ComposerConfig, now: Timestamp) -> Self {
        Self {
            id,
            composer: Mutex::new(WordComposer::new(config, now)),
            created_at: Utc::now(),
            last_active: AtomicU64::new(to_nanos(now)),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Every composer operation for this session goes through this lock
    pub fn composer(&self) -> &Mutex<WordComposer> {
        &self.composer
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> Timestamp {
        Timestamp::from_duration(Duration::from_nanos(
            self.last_active.load(Ordering::Relaxed),
        ))
    }

    pub fn touch(&self, now: Timestamp) {
        self.last_active.fetch_max(to_nanos(now), Ordering::Relaxed);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("last_active", &self.last_active())
            .finish()
    }
}

fn to_nanos(at: Timestamp) -> u64 {
    u64::try_from(at.as_duration().as_nanos()).unwrap_or(u64::MAX)
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    config: ComposerConfig,
    clock: Arc<dyn Clock>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(config: ComposerConfig, clock: Arc<dyn Clock>, settings: &SessionSettings) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            clock,
            max_sessions: settings.max_sessions.max(1),
            idle_timeout: settings.idle_timeout(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Look up a session, creating it on first use
    pub async fn get_or_create(&self, id: &SessionId) -> Result<Arc<Session>, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;

        if let Some(session) = sessions.get(id) {
            session.touch(now);
            return Ok(Arc::clone(session));
        }

        if !id.is_default() {
            let named = sessions.keys().filter(|k| !k.is_default()).count();
            if named >= self.max_sessions {
                return Err(SessionError::TooMany {
                    limit: self.max_sessions,
                });
            }
        }

        let session = Arc::new(Session::new(id.clone(), self.config, now));
        sessions.insert(id.clone(), Arc::clone(&session));
        debug!(session = %id, active = sessions.len(), "session started");
        Ok(session)
    }

    /// Existing session only; `None` if it was never started or already ended
    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        let now = self.clock.now();
        let sessions = self.sessions.lock().await;
        sessions.get(id).map(|session| {
            session.touch(now);
            Arc::clone(session)
        })
    }

    /// Drop a session; returns whether it existed
    pub async fn end(&self, id: &SessionId) -> bool {
        let removed = self.sessions.lock().await.remove(id).is_some();
        if removed {
            debug!(session = %id, "session ended");
        }
        removed
    }

    /// Remove sessions idle for longer than the timeout; returns how many
    pub async fn prune_idle(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.saturating_since(s.last_active()) <= self.idle_timeout);
        let pruned = before - sessions.len();
        if pruned > 0 {
            info!(pruned, active = sessions.len(), "pruned idle sessions");
        }
        pruned
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
