//! Pending-sync outbox: submissions that failed on network or server errors
//! are retained with an explicit sync tag instead of being dropped, and can
//! be replayed later.

use crate::api::attendance::CreateAttendance;
use crate::workflow::client::{AttendanceApi, SubmitOutcome};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncState {
    Synced,
    PendingSync,
}

#[derive(Debug)]
pub struct OutboxEntry {
    pub record: CreateAttendance,
    pub state: SyncState,
}

/// Per-session queue of unsynced submissions. Nothing here is shared between
/// sessions; the backend's uniqueness constraint arbitrates concurrent marks.
#[derive(Debug, Default)]
pub struct Outbox {
    entries: Vec<OutboxEntry>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pending(&mut self, record: CreateAttendance) {
        self.entries.push(OutboxEntry {
            record,
            state: SyncState::PendingSync,
        });
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == SyncState::PendingSync)
            .count()
    }

    pub fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    /// Replay every pending entry. A duplicate rejection counts as resolved:
    /// the record already exists server-side, so retrying again would only
    /// ever fail the same way. Returns the number of entries resolved.
    pub async fn retry(&mut self, api: &dyn AttendanceApi) -> usize {
        let mut resolved = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.state == SyncState::PendingSync)
        {
            match api.create(&entry.record).await {
                SubmitOutcome::Submitted | SubmitOutcome::Duplicate(_) => {
                    entry.state = SyncState::Synced;
                    resolved += 1;
                }
                SubmitOutcome::Failed(_) => {}
            }
        }
        if resolved > 0 {
            info!(resolved, "outbox replay synced pending attendance");
        }
        resolved
    }
}
