//! In-memory collaborators for engine tests

use std::time::Duration;

use crate::hal::{
    OperatingMode, RadioCapture, StationStack, StationStatus, TimerEvent, TimerHandle, TimerService,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Monitor(bool),
    Channel(u8),
    Mode(OperatingMode),
}

#[derive(Debug)]
pub struct MockRadio {
    pub calls: Vec<RadioCall>,
    pub monitoring: bool,
    pub channel: u8,
    pub mode: OperatingMode,
}

impl MockRadio {
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            calls: Vec::new(),
            monitoring: false,
            channel: 0,
            mode,
        }
    }
}

impl RadioCapture for MockRadio {
    fn enable_monitor_mode(&mut self) {
        self.monitoring = true;
        self.calls.push(RadioCall::Monitor(true));
    }

    fn disable_monitor_mode(&mut self) {
        self.monitoring = false;
        self.calls.push(RadioCall::Monitor(false));
    }

    fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
        self.calls.push(RadioCall::Channel(channel));
    }

    fn operating_mode(&self) -> OperatingMode {
        self.mode
    }

    fn set_operating_mode(&mut self, mode: OperatingMode) {
        self.mode = mode;
        self.calls.push(RadioCall::Mode(mode));
    }
}

#[derive(Debug)]
pub struct MockStation {
    pub status: StationStatus,
    pub applied: Option<(Vec<u8>, Vec<u8>)>,
    pub connects: u32,
    pub disconnects: u32,
    pub auto_reconnect: Option<bool>,
}

impl MockStation {
    pub fn new() -> Self {
        Self {
            status: StationStatus::Idle,
            applied: None,
            connects: 0,
            disconnects: 0,
            auto_reconnect: None,
        }
    }
}

impl StationStack for MockStation {
    fn apply_credentials(&mut self, ssid: &[u8], password: &[u8]) {
        self.applied = Some((ssid.to_vec(), password.to_vec()));
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }

    fn connect(&mut self) {
        self.connects += 1;
    }

    fn status(&self) -> StationStatus {
        self.status
    }

    fn set_auto_reconnect(&mut self, enabled: bool) {
        self.auto_reconnect = Some(enabled);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub handle: TimerHandle,
    pub event: TimerEvent,
    pub period: Duration,
    pub repeating: bool,
}

#[derive(Debug, Default)]
pub struct MockTimers {
    next: u64,
    pub armed: Vec<ArmedTimer>,
}

impl MockTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self, event: TimerEvent) -> bool {
        self.armed.iter().any(|t| t.event == event)
    }

    /// Simulate expiry: one-shot timers are consumed
    pub fn fire(&mut self, event: TimerEvent) -> bool {
        let Some(pos) = self.armed.iter().position(|t| t.event == event) else {
            return false;
        };
        if !self.armed[pos].repeating {
            self.armed.remove(pos);
        }
        true
    }

    fn arm(&mut self, period: Duration, event: TimerEvent, repeating: bool) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        self.armed.push(ArmedTimer {
            handle,
            event,
            period,
            repeating,
        });
        handle
    }
}

impl TimerService for MockTimers {
    fn arm_one_shot(&mut self, after: Duration, event: TimerEvent) -> TimerHandle {
        self.arm(after, event, false)
    }

    fn arm_periodic(&mut self, every: Duration, event: TimerEvent) -> TimerHandle {
        self.arm(every, event, true)
    }

    fn disarm(&mut self, handle: TimerHandle) {
        self.armed.retain(|t| t.handle != handle);
    }
}
