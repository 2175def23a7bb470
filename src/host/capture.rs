//! Frame capture from a replay file, a spawned command or a synthetic sender
//!
//! A dedicated thread reads the source and pushes frames into a bounded
//! channel; the engine loop pulls them with [`ReplayCapture::next_frame`].
//! Frames only reach the engine while monitor mode is on and the frame's
//! channel matches the tuned one, which is how a real radio behaves.
//!
//! Line format, one frame per line:
//!
//! ```text
//! # comment
//! <channel> <reported length> <capture buffer as hex>
//! ```

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::hal::{OperatingMode, RadioCapture};
use crate::smart::encoder::round_frames;
use crate::smart::{AddressPair, RadioFrame};

const QUEUE_DEPTH: usize = 1000;

/// Pause between synthetic frames
const SYNTH_FRAME_GAP: Duration = Duration::from_millis(1);

/// Where captured frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Replay capture lines from a file
    File(PathBuf),
    /// Read capture lines from `sh -c <command>`
    Command(String),
    /// Generate rounds for the given credentials, mixed with unrelated traffic
    Synthetic {
        ssid: String,
        password: String,
        channel: u8,
    },
}

/// One captured buffer as handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub channel: u8,
    pub length: u16,
    pub data: Vec<u8>,
}

impl CapturedFrame {
    pub fn from_radio(channel: u8, frame: &RadioFrame) -> Self {
        Self {
            channel,
            length: frame.length,
            data: frame.to_capture(),
        }
    }

    /// Render in the replay line format
    pub fn to_line(&self) -> String {
        format!("{} {} {}", self.channel, self.length, hex::encode(&self.data))
    }
}

/// Parse one capture line. Blank and comment-only lines yield `None`.
pub fn parse_capture_line(line: &str) -> Result<Option<CapturedFrame>> {
    let line = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let mut fields = line.split_whitespace();
    let Some(channel) = fields.next() else {
        return Ok(None);
    };

    let channel: u8 = channel.parse().context("bad channel field")?;
    let length: u16 = fields
        .next()
        .context("missing length field")?
        .parse()
        .context("bad length field")?;
    let data = hex::decode(fields.next().context("missing frame bytes")?)
        .context("frame bytes are not hex")?;
    if fields.next().is_some() {
        bail!("trailing fields");
    }

    Ok(Some(CapturedFrame {
        channel,
        length,
        data,
    }))
}

/// Statistics for capture (atomic for thread-safe access)
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub lines_read: AtomicU64,
    pub parse_errors: AtomicU64,
    pub frames_queued: AtomicU64,
    pub frames_delivered: AtomicU64,
    /// Frames arriving while not monitoring or on another channel
    pub frames_dropped: AtomicU64,
}

impl CaptureStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// Host radio: capture thread plus the monitor/channel/mode state the
/// engine controls
pub struct ReplayCapture {
    source: CaptureSource,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    frame_rx: Option<Receiver<CapturedFrame>>,
    monitoring: bool,
    channel: u8,
    mode: OperatingMode,
}

impl ReplayCapture {
    pub fn new(source: CaptureSource) -> Self {
        Self {
            source,
            running: Arc::new(AtomicBool::new(false)),
            stats: CaptureStats::new(),
            frame_rx: None,
            monitoring: false,
            channel: 0,
            mode: OperatingMode::Station,
        }
    }

    /// Spawn the capture thread
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            bail!("capture already running");
        }
        info!("Starting capture from {:?}", self.source);

        let (frame_tx, frame_rx) = bounded::<CapturedFrame>(QUEUE_DEPTH);

        let source = self.source.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();

        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                if let Err(e) = run_capture(source, &running, &stats, frame_tx) {
                    error!("Capture error: {:#}", e);
                }
                running.store(false, Ordering::SeqCst);
            })
            .context("Failed to spawn capture thread")?;

        self.frame_rx = Some(frame_rx);
        Ok(())
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping capture...");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &Arc<CaptureStats> {
        &self.stats
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Wait up to `timeout` for the next frame the radio would deliver.
    ///
    /// `Ok(None)` on timeout or when the frame was dropped; an error once the
    /// source is exhausted.
    pub fn next_frame(&self, timeout: Duration) -> Result<Option<CapturedFrame>> {
        let rx = self.frame_rx.as_ref().context("capture not started")?;
        match rx.recv_timeout(timeout) {
            Ok(frame) => {
                if !self.monitoring || frame.channel != self.channel {
                    self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
                self.stats.frames_delivered.fetch_add(1, Ordering::Relaxed);
                Ok(Some(frame))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => bail!("capture source closed"),
        }
    }
}

impl RadioCapture for ReplayCapture {
    fn enable_monitor_mode(&mut self) {
        debug!("monitor mode on");
        self.monitoring = true;
    }

    fn disable_monitor_mode(&mut self) {
        debug!("monitor mode off");
        self.monitoring = false;
    }

    fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
    }

    fn operating_mode(&self) -> OperatingMode {
        self.mode
    }

    fn set_operating_mode(&mut self, mode: OperatingMode) {
        debug!("operating mode {:?}", mode);
        self.mode = mode;
    }
}

impl Drop for ReplayCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture loop (runs in dedicated thread)
fn run_capture(
    source: CaptureSource,
    running: &AtomicBool,
    stats: &CaptureStats,
    frame_tx: Sender<CapturedFrame>,
) -> Result<()> {
    match source {
        CaptureSource::File(path) => {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open capture file {}", path.display()))?;
            read_lines(BufReader::new(file), running, stats, &frame_tx);
            info!("Capture file {} exhausted", path.display());
        }
        CaptureSource::Command(command) => {
            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(&command)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            info!("Executing: {:?}", cmd);

            let mut child = cmd
                .spawn()
                .with_context(|| format!("Failed to spawn capture command `{}`", command))?;
            let stdout = child
                .stdout
                .take()
                .context("Failed to capture command stdout")?;

            if let Some(stderr) = child.stderr.take() {
                thread::spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(std::result::Result::ok) {
                        if !line.trim().is_empty() {
                            info!("[capture] {}", line.trim());
                        }
                    }
                });
            }

            read_lines(BufReader::new(stdout), running, stats, &frame_tx);
            let _ = child.kill();
            let _ = child.wait();
            info!("Capture command finished");
        }
        CaptureSource::Synthetic {
            ssid,
            password,
            channel,
        } => synthesize(&ssid, &password, channel, running, stats, &frame_tx)?,
    }
    Ok(())
}

fn read_lines<B: BufRead>(
    reader: B,
    running: &AtomicBool,
    stats: &CaptureStats,
    frame_tx: &Sender<CapturedFrame>,
) {
    for (number, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Capture read failed: {}", e);
                break;
            }
        };
        stats.lines_read.fetch_add(1, Ordering::Relaxed);

        match parse_capture_line(&line) {
            Ok(Some(frame)) => {
                if frame_tx.send(frame).is_err() {
                    break;
                }
                stats.frames_queued.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {}
            Err(e) => {
                stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                debug!("line {}: {:#}", number + 1, e);
            }
        }
    }
}

/// Transmit rounds for one sender, interleaved with a chatty neighbour
fn synthesize(
    ssid: &str,
    password: &str,
    channel: u8,
    running: &AtomicBool,
    stats: &CaptureStats,
    frame_tx: &Sender<CapturedFrame>,
) -> Result<()> {
    let sender = AddressPair::new([0x02, 0x5a, 0x11, 0x00, 0x00, 0x01], [0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb]);
    let neighbour = AddressPair::new([0x02, 0x5a, 0x22, 0x00, 0x00, 0x02], [0xa0, 0xb1, 0xc2, 0xd3, 0xe4, 0xf5]);

    let mut sender_seq: u16 = 0x100;
    let mut neighbour_seq: u16 = 0x800;
    let mut noise_len: u16 = 300;

    info!(
        "Synthetic sender {} on channel {}: ssid {:?}",
        sender, channel, ssid
    );

    while running.load(Ordering::SeqCst) {
        let round = round_frames(sender, sender_seq, ssid.as_bytes(), password.as_bytes())
            .context("synthetic credentials cannot be encoded")?;
        sender_seq = sender_seq.wrapping_add(round.len() as u16);

        for (i, frame) in round.iter().enumerate() {
            if !running.load(Ordering::SeqCst) {
                return Ok(());
            }
            let mut batch = vec![CapturedFrame::from_radio(channel, frame)];
            if i % 2 == 0 {
                noise_len = 64 + (noise_len * 7 + 13) % 1400;
                neighbour_seq = neighbour_seq.wrapping_add(1);
                batch.push(CapturedFrame::from_radio(
                    channel,
                    &RadioFrame::qos_data(neighbour, neighbour_seq, noise_len),
                ));
            }
            for frame in batch {
                if frame_tx.send(frame).is_err() {
                    return Ok(());
                }
                stats.frames_queued.fetch_add(1, Ordering::Relaxed);
            }
            thread::sleep(SYNTH_FRAME_GAP);
        }
    }
    Ok(())
}
