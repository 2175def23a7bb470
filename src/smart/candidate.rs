//! Sender candidate tracking
//!
//! Several unrelated stations transmit on the same channel. Every address pair
//! that sends a lock marker gets a slot; the slot advances only while the
//! following frames land at the exact sequence offsets and lengths of the
//! preamble. The first pair to complete the preamble is the sender.

use tracing::{debug, info, trace};

use super::consts::{
    length_offset, seq_delta, CANDIDATE_SLOTS, LOCK_MARKER, PREAMBLE, PREAMBLE_LENGTH_SLOT,
    PREAMBLE_MATCH,
};
use super::frame::{AddressPair, Observation};

/// One tracked address pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderCandidate {
    pub addresses: AddressPair,
    /// Consecutive preamble entries matched; 0 means the slot is free
    pub progress: u8,
    /// Sequence number of the lock marker the progress is measured from
    pub anchor: Option<u16>,
    /// Length offset seen in the don't-care preamble slot
    pub length_hint: Option<u16>,
}

impl SenderCandidate {
    pub fn is_free(&self) -> bool {
        self.progress == 0
    }

    fn claim(&mut self, obs: &Observation) {
        *self = Self {
            addresses: obs.addresses,
            progress: 1,
            anchor: Some(obs.sequence),
            length_hint: None,
        };
    }

    fn release(&mut self) {
        *self = Self::default();
    }
}

fn is_lock_marker(length: u16) -> bool {
    length_offset(length) == Some(LOCK_MARKER)
}

fn preamble_matches(delta: u16, length: u16) -> bool {
    match PREAMBLE.get(delta as usize) {
        Some(None) => true,
        Some(Some(expected)) => length_offset(length) == Some(*expected),
        None => false,
    }
}

/// Result of feeding one frame to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Frame did not touch any candidate
    Ignored,
    /// A candidate was claimed, advanced, re-anchored or released
    Updated,
    /// A candidate completed the preamble
    Locked(SenderCandidate),
}

/// Fixed pool of sender candidates
#[derive(Debug, Clone)]
pub struct CandidateTracker {
    slots: [SenderCandidate; CANDIDATE_SLOTS],
    claimed: u64,
}

impl CandidateTracker {
    pub fn new() -> Self {
        Self {
            slots: [SenderCandidate::default(); CANDIDATE_SLOTS],
            claimed: 0,
        }
    }

    /// Feed one accepted frame through the preamble state machine
    pub fn observe(&mut self, obs: &Observation) -> TrackOutcome {
        let existing = self
            .slots
            .iter()
            .position(|c| !c.is_free() && c.addresses == obs.addresses);

        let index = match existing {
            Some(index) => index,
            None => {
                if !is_lock_marker(obs.length) {
                    return TrackOutcome::Ignored;
                }
                let Some(free) = self.slots.iter().position(SenderCandidate::is_free) else {
                    trace!("candidate pool full, ignoring {}", obs.addresses);
                    return TrackOutcome::Ignored;
                };
                self.slots[free].claim(obs);
                self.claimed += 1;
                debug!("new candidate {} in slot {}", obs.addresses, free);
                return TrackOutcome::Updated;
            }
        };

        let slot = &mut self.slots[index];
        let Some(anchor) = slot.anchor else {
            // Occupied slots always carry an anchor; treat a missing one as a fresh start
            if is_lock_marker(obs.length) {
                slot.claim(obs);
            } else {
                slot.release();
            }
            return TrackOutcome::Updated;
        };

        let delta = seq_delta(obs.sequence, anchor);

        if delta == slot.progress as u16 && preamble_matches(delta, obs.length) {
            if delta == PREAMBLE_LENGTH_SLOT {
                slot.length_hint = length_offset(obs.length);
            }
            slot.progress += 1;
            trace!("candidate {} progress {}", slot.addresses, slot.progress);

            if slot.progress >= PREAMBLE_MATCH {
                let sender = *slot;
                info!("locked sender {} (anchor seq {})", sender.addresses, anchor);
                self.reset();
                return TrackOutcome::Locked(sender);
            }
            return TrackOutcome::Updated;
        }

        if is_lock_marker(obs.length) {
            slot.claim(obs);
        } else {
            trace!("candidate {} lost preamble at delta {}", slot.addresses, delta);
            slot.release();
        }
        TrackOutcome::Updated
    }

    /// Drop every candidate
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.release();
        }
    }

    pub fn active(&self) -> usize {
        self.slots.iter().filter(|c| !c.is_free()).count()
    }

    pub fn get(&self, addresses: &AddressPair) -> Option<&SenderCandidate> {
        self.slots
            .iter()
            .find(|c| !c.is_free() && c.addresses == *addresses)
    }

    /// Candidates claimed since creation
    pub fn claimed(&self) -> u64 {
        self.claimed
    }
}

impl Default for CandidateTracker {
    fn default() -> Self {
        Self::new()
    }
}
