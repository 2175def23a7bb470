//! Station stack stand-in for running the engine off-device

use std::cell::Cell;

use tracing::{debug, info};

use crate::hal::{StationStack, StationStatus};

/// Reports `GotIp` after a fixed number of polls, or `WrongPassword` when the
/// applied password differs from the one it expects
#[derive(Debug)]
pub struct SimulatedStation {
    connect_polls: u32,
    expected_password: Option<Vec<u8>>,
    credentials: Option<(Vec<u8>, Vec<u8>)>,
    connecting: bool,
    auto_reconnect: bool,
    polls: Cell<u32>,
}

impl SimulatedStation {
    pub fn new(connect_polls: u32, expected_password: Option<Vec<u8>>) -> Self {
        Self {
            connect_polls,
            expected_password,
            credentials: None,
            connecting: false,
            auto_reconnect: false,
            polls: Cell::new(0),
        }
    }

    pub fn credentials(&self) -> Option<&(Vec<u8>, Vec<u8>)> {
        self.credentials.as_ref()
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }
}

impl StationStack for SimulatedStation {
    fn apply_credentials(&mut self, ssid: &[u8], password: &[u8]) {
        info!("station config: ssid {:?}", String::from_utf8_lossy(ssid));
        self.credentials = Some((ssid.to_vec(), password.to_vec()));
    }

    fn disconnect(&mut self) {
        self.connecting = false;
    }

    fn connect(&mut self) {
        debug!("station connect");
        self.connecting = true;
        self.polls.set(0);
    }

    fn status(&self) -> StationStatus {
        if !self.connecting {
            return StationStatus::Idle;
        }
        let Some((_, password)) = &self.credentials else {
            return StationStatus::NoApFound;
        };

        let polls = self.polls.get() + 1;
        self.polls.set(polls);
        if polls < self.connect_polls {
            return StationStatus::Connecting;
        }
        match &self.expected_password {
            Some(expected) if expected != password => StationStatus::WrongPassword,
            _ => StationStatus::GotIp,
        }
    }

    fn set_auto_reconnect(&mut self, enabled: bool) {
        self.auto_reconnect = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_until_connect() {
        let station = SimulatedStation::new(1, None);
        assert_eq!(station.status(), StationStatus::Idle);
    }

    #[test]
    fn test_connects_after_polls() {
        let mut station = SimulatedStation::new(3, None);
        station.apply_credentials(b"net", b"pw");
        station.set_auto_reconnect(true);
        station.connect();
        assert_eq!(station.credentials(), Some(&(b"net".to_vec(), b"pw".to_vec())));
        assert!(station.auto_reconnect());
        assert_eq!(station.status(), StationStatus::Connecting);
        assert_eq!(station.status(), StationStatus::Connecting);
        assert_eq!(station.status(), StationStatus::GotIp);
    }

    #[test]
    fn test_wrong_password() {
        let mut station = SimulatedStation::new(1, Some(b"right".to_vec()));
        station.apply_credentials(b"net", b"wrong");
        station.connect();
        assert_eq!(station.status(), StationStatus::WrongPassword);

        station.apply_credentials(b"net", b"right");
        station.disconnect();
        station.connect();
        assert_eq!(station.status(), StationStatus::GotIp);
    }

    #[test]
    fn test_connect_without_credentials() {
        let mut station = SimulatedStation::new(1, None);
        station.connect();
        assert_eq!(station.status(), StationStatus::NoApFound);
    }
}
