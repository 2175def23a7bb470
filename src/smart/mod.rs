//! SmartLink credential acquisition
//!
//! Data flow:
//!
//! ```text
//! capture buffer -> frame::filter -> CandidateTracker -> FieldDecoder
//!                                                          |
//!                                    integrity::decode <---+
//!                                          |
//!                          StationStack + ConnectionSupervisor
//! ```

pub mod candidate;
pub mod consts;
pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod frame;
pub mod integrity;
pub mod nibble;
pub mod scheduler;
pub mod stats;
pub mod supervisor;
pub mod types;

#[cfg(test)]
mod testing;

pub use engine::{LinkConfig, SmartLink, SuccessCallback};
pub use frame::{AddressPair, RadioFrame};
pub use stats::LinkStats;
pub use types::DecodedCredentials;
