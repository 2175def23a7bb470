//! SmartLink host - drives the acquisition engine from a capture source
//!
//! Reads frames from a replay file, a capture command or a synthetic sender,
//! runs them through the engine, and prints a JSON report once the station
//! is connected with the decoded credentials.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use smartlink::config::Config;
use smartlink::host::{HostTimers, ReplayCapture, SimulatedStation};
use smartlink::{DecodedCredentials, LinkStats, SmartLink};

/// How long one loop iteration waits for a frame
const FRAME_WAIT: Duration = Duration::from_millis(20);

/// Printed once provisioning succeeds
#[derive(Debug, Serialize)]
struct ProvisionReport {
    timestamp: String,
    ssid: String,
    password_len: usize,
    channel: u8,
    sender: String,
    stats: LinkStats,
}

impl ProvisionReport {
    fn new(creds: &DecodedCredentials, stats: LinkStats) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            ssid: creds.ssid_lossy(),
            password_len: creds.password.len(),
            channel: creds.channel,
            sender: creds.sender.to_string(),
            stats,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("===========================================");
    info!("   SmartLink - Wi-Fi provisioning");
    info!("   frame-length credential decoder");
    info!("===========================================");

    let config = Config::from_env();

    info!("Configuration:");
    info!("  Start channel: {}", config.start_channel);
    info!("  Channel dwell: {} ms", config.dwell_ms);
    info!("  Station poll: {} ms", config.poll_ms);
    info!("  Connect polls: {}", config.station_connect_polls);

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    let worker_config = config.clone();
    let mut engine = tokio::task::spawn_blocking(move || run_engine(worker_config, worker_stop));

    let report = tokio::select! {
        result = &mut engine => result.context("engine task failed")??,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, stopping...");
            stop.store(true, Ordering::SeqCst);
            engine.await.context("engine task failed")??
        }
    };

    match report {
        Some(report) => {
            println!("{}", serde_json::to_string(&report)?);
            info!("Provisioning complete");
        }
        None => warn!("Stopped without provisioning"),
    }
    Ok(())
}

/// Engine loop (runs on the blocking pool)
fn run_engine(config: Config, stop: Arc<AtomicBool>) -> Result<Option<ProvisionReport>> {
    let mut radio = ReplayCapture::new(config.capture_source()?);
    radio.start()?;

    let station = SimulatedStation::new(
        config.station_connect_polls,
        config.station_password.clone().map(String::into_bytes),
    );
    let mut link = SmartLink::new(radio, station, HostTimers::new(), config.link_config());

    let (done_tx, done_rx) = crossbeam_channel::bounded::<DecodedCredentials>(1);
    link.begin(
        config.start_channel,
        Some(Box::new(move |creds: Option<&DecodedCredentials>| {
            if let Some(creds) = creds {
                if let Err(e) = done_tx.try_send(creds.clone()) {
                    warn!("Failed to hand over decoded credentials: {}", e);
                }
            }
        })),
    )
    .context("Failed to start acquisition")?;

    info!("===========================================");
    info!("  Listening on channel {}...", link.channel());
    info!("  Press Ctrl+C to stop.");
    info!("===========================================");

    let stats_every = Duration::from_secs(config.stats_interval_secs.max(1));
    let mut last_stats = Instant::now();
    let mut source_open = true;

    while !stop.load(Ordering::SeqCst) {
        if let Ok(creds) = done_rx.try_recv() {
            let report = ProvisionReport::new(&creds, *link.stats());
            link.end();
            return Ok(Some(report));
        }
        if link.is_idle() {
            error!("Engine stopped without a connection");
            break;
        }

        if source_open {
            match link.radio().next_frame(FRAME_WAIT) {
                Ok(Some(frame)) => link.on_frame(&frame.data, frame.length),
                Ok(None) => {}
                Err(e) => {
                    warn!("{:#}", e);
                    source_open = false;
                }
            }
        } else if link.is_supervising() {
            let wait = link
                .timers()
                .next_due(Instant::now())
                .map_or(FRAME_WAIT, |d| d.min(FRAME_WAIT));
            thread::sleep(wait);
        } else {
            info!("Capture source exhausted before credentials were decoded");
            break;
        }

        for event in link.timers_mut().take_due(Instant::now()) {
            link.on_timer(event);
        }

        if last_stats.elapsed() >= stats_every {
            let capture = link.radio().stats();
            info!(
                "[Link] Channel {} | {} | Capture dropped: {}",
                link.channel(),
                link.stats(),
                capture.frames_dropped.load(Ordering::Relaxed)
            );
            last_stats = Instant::now();
        }
    }

    link.end();
    info!("Shutdown complete. {}", link.stats());
    Ok(None)
}
