//! Deadline-based timer service for the host loop

use std::time::{Duration, Instant};

use crate::hal::{TimerEvent, TimerHandle, TimerService};

#[derive(Debug, Clone, Copy)]
struct Entry {
    handle: TimerHandle,
    event: TimerEvent,
    deadline: Instant,
    period: Option<Duration>,
}

/// Timers checked by polling from the host loop
#[derive(Debug, Default)]
pub struct HostTimers {
    next: u64,
    entries: Vec<Entry>,
}

impl HostTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn arm_at(&mut self, deadline: Instant, event: TimerEvent, period: Option<Duration>) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        self.entries.push(Entry {
            handle,
            event,
            deadline,
            period,
        });
        handle
    }

    /// Remove expired one-shots, reschedule expired periodic timers, and
    /// return their events in deadline order
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut due: Vec<(Instant, TimerEvent)> = Vec::new();
        self.entries.retain_mut(|entry| {
            if entry.deadline > now {
                return true;
            }
            due.push((entry.deadline, entry.event));
            match entry.period {
                Some(period) => {
                    entry.deadline = now + period;
                    true
                }
                None => false,
            }
        });
        due.sort_by_key(|(deadline, _)| *deadline);
        due.into_iter().map(|(_, event)| event).collect()
    }

    /// Time until the earliest deadline
    pub fn next_due(&self, now: Instant) -> Option<Duration> {
        self.entries
            .iter()
            .map(|e| e.deadline.saturating_duration_since(now))
            .min()
    }

    pub fn armed(&self) -> usize {
        self.entries.len()
    }
}

impl TimerService for HostTimers {
    fn arm_one_shot(&mut self, after: Duration, event: TimerEvent) -> TimerHandle {
        self.arm_at(Instant::now() + after, event, None)
    }

    fn arm_periodic(&mut self, every: Duration, event: TimerEvent) -> TimerHandle {
        self.arm_at(Instant::now() + every, event, Some(every))
    }

    fn disarm(&mut self, handle: TimerHandle) {
        self.entries.retain(|e| e.handle != handle);
    }
}
