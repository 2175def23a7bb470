//! Acquisition counters

use serde::Serialize;
use std::fmt;

/// Counters kept across the lifetime of one engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Frames handed to the engine while acquiring
    pub frames_seen: u64,
    /// Frames that passed the filter
    pub frames_accepted: u64,
    /// Candidate slots claimed
    pub candidates: u64,
    pub locks: u64,
    pub desyncs: u64,
    pub integrity_failures: u64,
    pub hops: u64,
    /// Acquisitions restarted after a rejected password
    pub restarts: u64,
}

impl fmt::Display for LinkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frames: {} seen, {} accepted | Candidates: {} | Locks: {} | Desyncs: {} | Integrity failures: {} | Hops: {} | Restarts: {}",
            self.frames_seen,
            self.frames_accepted,
            self.candidates,
            self.locks,
            self.desyncs,
            self.integrity_failures,
            self.hops,
            self.restarts
        )
    }
}
