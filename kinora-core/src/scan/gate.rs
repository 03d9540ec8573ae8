use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::types::MediaKind;

/// The only failures a scan trigger observes synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanTriggerError {
    #[error("{0} scan already in progress")]
    AlreadyRunning(MediaKind),

    #[error("{0} library directory is not configured")]
    NotConfigured(MediaKind),

    #[error("scan service is shutting down")]
    ShuttingDown,
}

/// At most one running scan per media kind, plus the writer lock every
/// kind's batch write phase shares.
#[derive(Debug, Default)]
pub struct ScanGate {
    movies: AtomicBool,
    music: AtomicBool,
    writer: Arc<Mutex<()>>,
}

impl ScanGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Never blocks. The returned permit reopens the gate when dropped.
    pub fn try_begin(self: &Arc<Self>, kind: MediaKind) -> Result<ScanPermit, ScanTriggerError> {
        self.flag(kind)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScanTriggerError::AlreadyRunning(kind))?;
        Ok(ScanPermit {
            gate: Arc::clone(self),
            kind,
        })
    }

    pub fn is_scanning(&self, kind: MediaKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    pub fn writer_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.writer)
    }

    fn flag(&self, kind: MediaKind) -> &AtomicBool {
        match kind {
            MediaKind::Movies => &self.movies,
            MediaKind::Music => &self.music,
        }
    }
}

/// Held for the lifetime of one scan.
#[derive(Debug)]
pub struct ScanPermit {
    gate: Arc<ScanGate>,
    kind: MediaKind,
}

impl ScanPermit {
    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

impl Drop for ScanPermit {
    fn drop(&mut self) {
        self.gate.flag(self.kind).store(false, Ordering::Release);
    }
}
