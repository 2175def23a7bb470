//! Configuration loaded from environment variables

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::host::CaptureSource;
use crate::smart::consts::{CHANNEL_DWELL_MS, DEFAULT_START_CHANNEL, STATION_POLL_MS};
use crate::smart::LinkConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Channel acquisition starts on
    pub start_channel: u8,

    /// Dwell time per channel in milliseconds
    pub dwell_ms: u64,

    /// Station status poll interval in milliseconds
    pub poll_ms: u64,

    /// Replay capture lines from this file
    pub capture_file: Option<PathBuf>,

    /// Read capture lines from this shell command's stdout
    pub capture_command: Option<String>,

    /// Synthetic sender credentials
    pub synth_ssid: Option<String>,
    pub synth_password: Option<String>,

    /// Channel the synthetic sender transmits on
    pub synth_channel: u8,

    /// Polls before the simulated station reports an address
    pub station_connect_polls: u32,

    /// Password the simulated station accepts (any when unset)
    pub station_password: Option<String>,

    /// Statistics log interval in seconds
    pub stats_interval_secs: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            start_channel: env_parse("SMART_START_CHANNEL", DEFAULT_START_CHANNEL),

            dwell_ms: env_parse("SMART_DWELL_MS", CHANNEL_DWELL_MS),

            poll_ms: env_parse("SMART_POLL_MS", STATION_POLL_MS),

            capture_file: std::env::var("CAPTURE_FILE").ok().map(PathBuf::from),

            capture_command: std::env::var("CAPTURE_COMMAND").ok(),

            synth_ssid: std::env::var("SYNTH_SSID").ok(),

            synth_password: std::env::var("SYNTH_PASSWORD").ok(),

            synth_channel: env_parse("SYNTH_CHANNEL", DEFAULT_START_CHANNEL),

            station_connect_polls: env_parse("STATION_CONNECT_POLLS", 2),

            station_password: std::env::var("STATION_PASSWORD").ok(),

            stats_interval_secs: env_parse("STATS_INTERVAL_SECS", 10),
        }
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            dwell: Duration::from_millis(self.dwell_ms),
            poll_interval: Duration::from_millis(self.poll_ms),
        }
    }

    /// Pick the capture source: file, then command, then synthetic sender
    pub fn capture_source(&self) -> Result<CaptureSource> {
        if let Some(path) = &self.capture_file {
            return Ok(CaptureSource::File(path.clone()));
        }
        if let Some(command) = &self.capture_command {
            return Ok(CaptureSource::Command(command.clone()));
        }

        let ssid = self.synth_ssid.clone().unwrap_or_else(|| "smartlink-demo".to_string());
        let password = match (&self.synth_ssid, &self.synth_password) {
            (_, Some(password)) => password.clone(),
            (None, None) => "provisioned".to_string(),
            (Some(_), None) => bail!("SYNTH_SSID is set but SYNTH_PASSWORD is not"),
        };
        Ok(CaptureSource::Synthetic {
            ssid,
            password,
            channel: self.synth_channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            start_channel: 6,
            dwell_ms: 500,
            poll_ms: 100,
            capture_file: None,
            capture_command: None,
            synth_ssid: None,
            synth_password: None,
            synth_channel: 3,
            station_connect_polls: 1,
            station_password: None,
            stats_interval_secs: 10,
        }
    }

    #[test]
    fn test_link_config_durations() {
        let link = config().link_config();
        assert_eq!(link.dwell, Duration::from_millis(500));
        assert_eq!(link.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_capture_source_precedence() {
        let mut cfg = config();
        cfg.capture_command = Some("cat frames.txt".to_string());
        assert_eq!(
            cfg.capture_source().unwrap(),
            CaptureSource::Command("cat frames.txt".to_string())
        );

        cfg.capture_file = Some(PathBuf::from("frames.txt"));
        assert_eq!(
            cfg.capture_source().unwrap(),
            CaptureSource::File(PathBuf::from("frames.txt"))
        );
    }

    #[test]
    fn test_synthetic_source_needs_password() {
        let mut cfg = config();
        assert!(matches!(
            cfg.capture_source().unwrap(),
            CaptureSource::Synthetic { channel: 3, .. }
        ));

        cfg.synth_ssid = Some("office".to_string());
        assert!(cfg.capture_source().is_err());

        cfg.synth_password = Some("hunter22".to_string());
        assert_eq!(
            cfg.capture_source().unwrap(),
            CaptureSource::Synthetic {
                ssid: "office".to_string(),
                password: "hunter22".to_string(),
                channel: 3,
            }
        );
    }
}
