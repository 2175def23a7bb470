//! Acquisition engine - ties the filter, tracker, decoder, validator,
//! channel scheduler and connection supervisor together.
//!
//! The host drives it from three single-threaded event sources:
//! 1. every captured frame goes to [`SmartLink::on_frame`]
//! 2. the channel dwell timer goes to [`SmartLink::on_timer`]
//! 3. the station poll timer goes to [`SmartLink::on_timer`]
//!
//! Each call runs to completion and never blocks.

use std::mem;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::candidate::{CandidateTracker, TrackOutcome};
use super::consts::{CHANNEL_DWELL_MS, MAX_CHANNEL, MIN_CHANNEL, STATION_POLL_MS};
use super::decoder::{DecodeEvent, FieldDecoder, LockedSender};
use super::frame;
use super::integrity;
use super::scheduler::ChannelScheduler;
use super::stats::LinkStats;
use super::supervisor::{ConnectionSupervisor, Origin, PollOutcome};
use super::types::DecodedCredentials;
use crate::error::{LinkError, LinkResult};
use crate::hal::{OperatingMode, RadioCapture, StationStack, TimerEvent, TimerService};

/// Invoked once when the station gets an address.
///
/// Carries the decoded credentials when the connection came from acquisition.
pub type SuccessCallback = Box<dyn FnOnce(Option<&DecodedCredentials>)>;

/// Timing knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    pub dwell: Duration,
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            dwell: Duration::from_millis(CHANNEL_DWELL_MS),
            poll_interval: Duration::from_millis(STATION_POLL_MS),
        }
    }
}

#[derive(Debug)]
enum Phase {
    Searching(CandidateTracker),
    Locked(Box<FieldDecoder>),
}

#[derive(Debug)]
struct Acquisition {
    scheduler: ChannelScheduler,
    phase: Phase,
    saved_mode: OperatingMode,
}

#[derive(Debug)]
enum LinkState {
    Idle,
    Acquiring(Acquisition),
    Supervising(ConnectionSupervisor),
}

/// Credential acquisition engine
pub struct SmartLink<R, S, T> {
    radio: R,
    station: S,
    timers: T,
    config: LinkConfig,
    state: LinkState,
    on_success: Option<SuccessCallback>,
    channel: u8,
    stats: LinkStats,
}

impl<R: RadioCapture, S: StationStack, T: TimerService> SmartLink<R, S, T> {
    pub fn new(radio: R, station: S, timers: T, config: LinkConfig) -> Self {
        Self {
            radio,
            station,
            timers,
            config,
            state: LinkState::Idle,
            on_success: None,
            channel: MIN_CHANNEL,
            stats: LinkStats::default(),
        }
    }

    /// Start acquisition on `channel`.
    ///
    /// A running acquisition is not restarted. A running supervision loop is
    /// torn down first. Passing `None` keeps a previously registered callback.
    pub fn begin(&mut self, channel: u8, on_success: Option<SuccessCallback>) -> LinkResult<()> {
        if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
            return Err(LinkError::InvalidChannel(channel));
        }
        if let LinkState::Acquiring(_) = self.state {
            return Err(LinkError::AlreadyRunning);
        }
        if let LinkState::Supervising(mut sup) = mem::replace(&mut self.state, LinkState::Idle) {
            sup.stop(&mut self.timers);
        }
        if on_success.is_some() {
            self.on_success = on_success;
        }
        self.start_acquisition(channel);
        Ok(())
    }

    /// Stop everything and release all acquisition state. Safe to repeat.
    pub fn end(&mut self) {
        match mem::replace(&mut self.state, LinkState::Idle) {
            LinkState::Acquiring(mut acq) => {
                acq.scheduler.cancel(&mut self.timers);
                self.radio.disable_monitor_mode();
                self.radio.set_channel(acq.scheduler.channel());
                self.restore_mode(acq.saved_mode);
                info!("acquisition stopped on channel {}", acq.scheduler.channel());
            }
            LinkState::Supervising(mut sup) => {
                sup.stop(&mut self.timers);
                info!("station supervision stopped");
            }
            LinkState::Idle => {}
        }
        self.on_success = None;
    }

    /// Supervise a connection configured outside acquisition
    pub fn supervise(&mut self) -> LinkResult<()> {
        match mem::replace(&mut self.state, LinkState::Idle) {
            LinkState::Acquiring(acq) => {
                self.state = LinkState::Acquiring(acq);
                return Err(LinkError::AlreadyRunning);
            }
            LinkState::Supervising(mut sup) => sup.stop(&mut self.timers),
            LinkState::Idle => {}
        }
        self.state = LinkState::Supervising(ConnectionSupervisor::start(
            Origin::Manual,
            None,
            self.config.poll_interval,
            &mut self.timers,
        ));
        Ok(())
    }

    fn start_acquisition(&mut self, channel: u8) {
        let saved_mode = self.radio.operating_mode();
        if saved_mode.has_station() {
            self.station.set_auto_reconnect(false);
            self.station.disconnect();
        }

        info!("acquisition starting on channel {}", channel);
        self.channel = channel;
        self.radio.set_channel(channel);

        let mut scheduler = ChannelScheduler::new(channel, self.config.dwell);
        scheduler.arm(&mut self.timers);
        self.state = LinkState::Acquiring(Acquisition {
            scheduler,
            phase: Phase::Searching(CandidateTracker::new()),
            saved_mode,
        });
        self.radio.enable_monitor_mode();
    }

    fn restore_mode(&mut self, saved: OperatingMode) -> OperatingMode {
        let target = match saved {
            OperatingMode::Null => OperatingMode::Station,
            mode => mode,
        };
        self.radio.set_operating_mode(target);
        self.radio.operating_mode()
    }

    /// Feed one raw capture buffer and its reported length
    pub fn on_frame(&mut self, buf: &[u8], len: u16) {
        let LinkState::Acquiring(acq) = &mut self.state else {
            return;
        };
        self.stats.frames_seen += 1;

        let Some(obs) = frame::filter(buf, len) else {
            return;
        };
        self.stats.frames_accepted += 1;

        let mut decoded = None;
        match &mut acq.phase {
            Phase::Searching(tracker) => {
                let claimed_before = tracker.claimed();
                let outcome = tracker.observe(&obs);
                self.stats.candidates += tracker.claimed() - claimed_before;

                if let TrackOutcome::Locked(candidate) = outcome {
                    acq.scheduler.cancel(&mut self.timers);
                    self.stats.locks += 1;
                    info!(
                        "sender {} locked on channel {}",
                        candidate.addresses,
                        acq.scheduler.channel()
                    );
                    acq.phase = Phase::Locked(Box::new(FieldDecoder::new(
                        LockedSender::from_candidate(&candidate),
                    )));
                }
            }
            Phase::Locked(decoder) => match decoder.observe(&obs) {
                DecodeEvent::Desync => self.stats.desyncs += 1,
                DecodeEvent::Complete => {
                    decoded = Self::validate(decoder, &mut self.stats);
                }
                DecodeEvent::Accepted | DecodeEvent::Ignored => {}
            },
        }

        if let Some((ssid, password, sender)) = decoded {
            let credentials = DecodedCredentials {
                ssid,
                password,
                channel: self.channel,
                sender,
            };
            self.finish(credentials);
        }
    }

    fn validate(
        decoder: &mut FieldDecoder,
        stats: &mut LinkStats,
    ) -> Option<(Vec<u8>, Vec<u8>, frame::AddressPair)> {
        let sender = decoder.sender().addresses;
        let (ssid_len, ssid_buf, password_len, password_buf) = decoder.split_mut()?;

        let ssid = integrity::decode(ssid_buf, ssid_len);
        let password = integrity::decode(password_buf, password_len);
        match (ssid, password) {
            (Ok(ssid), Ok(password)) => Some((ssid, password, sender)),
            (ssid, password) => {
                stats.integrity_failures += 1;
                if let Err(e) = ssid {
                    debug!("ssid rejected: {}", e);
                }
                if let Err(e) = password {
                    debug!("password rejected: {}", e);
                }
                None
            }
        }
    }

    fn finish(&mut self, credentials: DecodedCredentials) {
        let LinkState::Acquiring(mut acq) = mem::replace(&mut self.state, LinkState::Idle) else {
            return;
        };
        acq.scheduler.cancel(&mut self.timers);
        self.radio.disable_monitor_mode();
        self.radio.set_channel(self.channel);
        let mode = self.restore_mode(acq.saved_mode);

        info!(
            "credentials decoded: ssid {:?} ({} bytes), password {} bytes, channel {}",
            credentials.ssid_lossy(),
            credentials.ssid.len(),
            credentials.password.len(),
            credentials.channel
        );

        if !mode.has_station() {
            warn!("radio mode {:?} has no station interface, not connecting", mode);
            return;
        }

        self.station
            .apply_credentials(&credentials.ssid, &credentials.password);
        self.station.set_auto_reconnect(true);
        self.station.disconnect();
        self.station.connect();

        self.state = LinkState::Supervising(ConnectionSupervisor::start(
            Origin::Acquisition,
            Some(credentials),
            self.config.poll_interval,
            &mut self.timers,
        ));
    }

    /// Handle an expired timer
    pub fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::ChannelDwell => self.hop(),
            TimerEvent::StatusPoll => self.poll_station(),
        }
    }

    fn hop(&mut self) {
        let LinkState::Acquiring(acq) = &mut self.state else {
            return;
        };
        if let Phase::Locked(_) = acq.phase {
            trace!("dwell expiry after lock ignored");
            return;
        }

        self.radio.disable_monitor_mode();
        let channel = acq.scheduler.advance();
        info!("switch to channel {}", channel);
        self.channel = channel;
        self.radio.set_channel(channel);

        // Address pairs and sequence numbers are only meaningful per channel
        acq.phase = Phase::Searching(CandidateTracker::new());
        acq.scheduler.arm(&mut self.timers);
        self.stats.hops += 1;
        self.radio.enable_monitor_mode();
    }

    fn poll_station(&mut self) {
        let LinkState::Supervising(sup) = &mut self.state else {
            return;
        };

        match sup.poll(&self.radio, &mut self.station) {
            PollOutcome::Waiting | PollOutcome::Retrying => {}
            PollOutcome::Connected => {
                sup.stop(&mut self.timers);
                let credentials = sup.take_pending();
                self.state = LinkState::Idle;
                if let Some(callback) = self.on_success.take() {
                    callback(credentials.as_ref());
                }
            }
            PollOutcome::RestartAcquisition => {
                sup.stop(&mut self.timers);
                self.state = LinkState::Idle;
                self.stats.restarts += 1;
                self.start_acquisition(self.channel);
            }
            PollOutcome::Stopped => {
                sup.stop(&mut self.timers);
                self.state = LinkState::Idle;
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, LinkState::Idle)
    }

    pub fn is_acquiring(&self) -> bool {
        matches!(self.state, LinkState::Acquiring(_))
    }

    pub fn is_supervising(&self) -> bool {
        matches!(self.state, LinkState::Supervising(_))
    }

    /// Current (or last) acquisition channel
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn candidates(&self) -> Option<&CandidateTracker> {
        match &self.state {
            LinkState::Acquiring(Acquisition {
                phase: Phase::Searching(tracker),
                ..
            }) => Some(tracker),
            _ => None,
        }
    }

    pub fn decoder(&self) -> Option<&FieldDecoder> {
        match &self.state {
            LinkState::Acquiring(Acquisition {
                phase: Phase::Locked(decoder),
                ..
            }) => Some(decoder),
            _ => None,
        }
    }

    pub fn locked_sender(&self) -> Option<&LockedSender> {
        self.decoder().map(FieldDecoder::sender)
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn station(&self) -> &S {
        &self.station
    }

    pub fn station_mut(&mut self) -> &mut S {
        &mut self.station
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }
}
