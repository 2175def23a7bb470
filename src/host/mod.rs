//! Host-side collaborators for running the engine as a process

mod capture;
mod station;
mod timers;

pub use capture::{parse_capture_line, CaptureSource, CaptureStats, CapturedFrame, ReplayCapture};
pub use station::SimulatedStation;
pub use timers::HostTimers;
