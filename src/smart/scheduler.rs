//! Channel dwell and hop order

use std::time::Duration;

use tracing::trace;

use super::consts::{DEFAULT_START_CHANNEL, HOP_ORDER};
use crate::hal::{TimerEvent, TimerHandle, TimerService};

/// Channel that follows `current` in the hop table
pub fn next_channel(current: u8) -> u8 {
    match HOP_ORDER.iter().position(|&ch| ch == current) {
        Some(i) => HOP_ORDER[(i + 1) % HOP_ORDER.len()],
        None => DEFAULT_START_CHANNEL,
    }
}

/// Current channel plus its dwell timer
#[derive(Debug)]
pub struct ChannelScheduler {
    channel: u8,
    dwell: Duration,
    timer: Option<TimerHandle>,
}

impl ChannelScheduler {
    pub fn new(channel: u8, dwell: Duration) -> Self {
        Self {
            channel,
            dwell,
            timer: None,
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// (Re)start the dwell timer for the current channel
    pub fn arm<T: TimerService>(&mut self, timers: &mut T) {
        self.cancel(timers);
        self.timer = Some(timers.arm_one_shot(self.dwell, TimerEvent::ChannelDwell));
        trace!("dwell armed on channel {} for {:?}", self.channel, self.dwell);
    }

    pub fn cancel<T: TimerService>(&mut self, timers: &mut T) {
        if let Some(handle) = self.timer.take() {
            timers.disarm(handle);
        }
    }

    /// Move to the next channel; the caller retunes the radio and re-arms
    pub fn advance(&mut self) -> u8 {
        self.channel = next_channel(self.channel);
        self.channel
    }
}
