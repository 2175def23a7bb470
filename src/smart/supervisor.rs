//! Connection supervision after credentials are applied

use std::time::Duration;

use tracing::{debug, info, warn};

use super::types::DecodedCredentials;
use crate::hal::{RadioCapture, StationStack, StationStatus, TimerEvent, TimerHandle, TimerService};

/// Where the supervised connection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Credentials decoded by acquisition; a wrong password restarts it
    Acquisition,
    /// Connection configured elsewhere
    Manual,
}

/// Decision taken on one status poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Connected,
    Waiting,
    Retrying,
    RestartAcquisition,
    Stopped,
}

/// Poll loop state
#[derive(Debug)]
pub struct ConnectionSupervisor {
    origin: Origin,
    pending: Option<DecodedCredentials>,
    timer: Option<TimerHandle>,
    polls: u64,
}

impl ConnectionSupervisor {
    /// Arm the periodic status poll
    pub fn start<T: TimerService>(
        origin: Origin,
        pending: Option<DecodedCredentials>,
        every: Duration,
        timers: &mut T,
    ) -> Self {
        let timer = timers.arm_periodic(every, TimerEvent::StatusPoll);
        debug!("station poll armed every {:?} ({:?})", every, origin);
        Self {
            origin,
            pending,
            timer: Some(timer),
            polls: 0,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn pending(&self) -> Option<&DecodedCredentials> {
        self.pending.as_ref()
    }

    pub fn take_pending(&mut self) -> Option<DecodedCredentials> {
        self.pending.take()
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Query the station once and apply the retry policy
    pub fn poll<R: RadioCapture, S: StationStack>(&mut self, radio: &R, station: &mut S) -> PollOutcome {
        self.polls += 1;

        if !radio.operating_mode().has_station() {
            debug!("no station interface, stopping poll");
            return PollOutcome::Stopped;
        }

        match station.status() {
            StationStatus::GotIp => {
                info!("station connected after {} polls", self.polls);
                PollOutcome::Connected
            }
            StationStatus::Connecting => {
                debug!("station connecting");
                PollOutcome::Waiting
            }
            StationStatus::Idle => {
                station.set_auto_reconnect(true);
                Self::reconnect(station, StationStatus::Idle)
            }
            status @ (StationStatus::ConnectFail | StationStatus::NoApFound) => {
                Self::reconnect(station, status)
            }
            StationStatus::WrongPassword => match self.origin {
                Origin::Acquisition => {
                    warn!("access point rejected the password, restarting acquisition");
                    PollOutcome::RestartAcquisition
                }
                Origin::Manual => {
                    debug!("wrong password on manual connection, stopping poll");
                    PollOutcome::Stopped
                }
            },
        }
    }

    fn reconnect<S: StationStack>(station: &mut S, status: StationStatus) -> PollOutcome {
        debug!("station {:?}, reconnecting", status);
        station.disconnect();
        station.connect();
        PollOutcome::Retrying
    }

    pub fn stop<T: TimerService>(&mut self, timers: &mut T) {
        if let Some(handle) = self.timer.take() {
            timers.disarm(handle);
        }
    }
}
