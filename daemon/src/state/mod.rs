//! Status state machine module
//!
//! Two modes:
//! - Live: submitted tracks are mirrored into the profile status
//! - Suspended: a fixed placeholder is shown, tracks are ignored
//!
//! The mode survives restarts through the flag store.

mod machine;
mod store;

pub use machine::{StatusManager, StatusMode, StatusSettings, StatusSnapshot, SubmitOutcome};
pub use store::FlagStore;
