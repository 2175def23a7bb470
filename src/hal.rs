//! Interfaces to the radio, the station network stack and the timer service
//!
//! The engine owns one implementation of each. Radio frames and timer expiry
//! are pushed into the engine by the host (`SmartLink::on_frame`,
//! `SmartLink::on_timer`) rather than through registered callbacks, so there
//! is no global callback table and no shared mutable state.

use std::time::Duration;

/// Radio operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Null,
    Station,
    SoftAp,
    StationAp,
}

impl OperatingMode {
    /// Whether a station interface exists in this mode
    pub fn has_station(self) -> bool {
        matches!(self, Self::Station | Self::StationAp)
    }
}

/// Link-layer capture control
pub trait RadioCapture {
    /// Start delivering raw frames to the host (promiscuous/monitor mode)
    fn enable_monitor_mode(&mut self);

    /// Stop delivering raw frames
    fn disable_monitor_mode(&mut self);

    /// Tune the receiver
    fn set_channel(&mut self, channel: u8);

    fn operating_mode(&self) -> OperatingMode;

    fn set_operating_mode(&mut self, mode: OperatingMode);
}

/// Connection status reported by the station stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStatus {
    Idle,
    Connecting,
    ConnectFail,
    NoApFound,
    WrongPassword,
    GotIp,
}

/// Station-side network stack
pub trait StationStack {
    fn apply_credentials(&mut self, ssid: &[u8], password: &[u8]);

    fn disconnect(&mut self);

    fn connect(&mut self);

    fn status(&self) -> StationStatus;

    fn set_auto_reconnect(&mut self, enabled: bool);
}

/// Opaque handle for an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// What an expiring timer means to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerEvent {
    /// Dwell time on the current channel is over
    ChannelDwell,
    /// Time to query the station status
    StatusPoll,
}

/// Millisecond timer scheduling
pub trait TimerService {
    fn arm_one_shot(&mut self, after: Duration, event: TimerEvent) -> TimerHandle;

    fn arm_periodic(&mut self, every: Duration, event: TimerEvent) -> TimerHandle;

    /// Disarming an expired or unknown handle is a no-op
    fn disarm(&mut self, handle: TimerHandle);
}
