//! Service readiness - single atomic source of truth for the health endpoint
//!
//! The service starts `Uninitialized`, becomes `Ready` once the vision
//! collaborators are installed, and moves to `ShuttingDown` when a shutdown
//! signal arrives. Transitions only move forward.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};

/// Lifecycle phase of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Readiness {
    /// Collaborators still loading
    Uninitialized = 0,
    /// Serving predictions
    Ready = 1,
    /// Draining connections, no longer reporting healthy
    ShuttingDown = 2,
}

impl From<u8> for Readiness {
    fn from(v: u8) -> Self {
        match v {
            0 => Readiness::Uninitialized,
            1 => Readiness::Ready,
            _ => Readiness::ShuttingDown,
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Uninitialized => write!(f, "uninitialized"),
            Readiness::Ready => write!(f, "ready"),
            Readiness::ShuttingDown => write!(f, "shutting-down"),
        }
    }
}

/// Shared service state
///
/// Pass `Arc<ServiceState>` to anything that needs to observe or drive the
/// lifecycle.
pub struct ServiceState {
    readiness: AtomicU8,
    started_at: DateTime<Utc>,
}

impl ServiceState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            readiness: AtomicU8::new(Readiness::Uninitialized as u8),
            started_at: Utc::now(),
        })
    }

    pub fn readiness(&self) -> Readiness {
        Readiness::from(self.readiness.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    /// Uninitialized -> Ready. Returns false if the service already left the
    /// uninitialized phase (e.g. shutdown started while loading).
    pub fn mark_ready(&self) -> bool {
        self.readiness
            .compare_exchange(
                Readiness::Uninitialized as u8,
                Readiness::Ready as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Any phase -> ShuttingDown
    pub fn begin_shutdown(&self) {
        self.readiness
            .store(Readiness::ShuttingDown as u8, Ordering::SeqCst);
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceState")
            .field("readiness", &self.readiness())
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Type alias for shared state
pub type SharedState = Arc<ServiceState>;
