//! Operator console
//!
//! Reads operator commands line by line and drives the status manager
//! through the same enable/disable operations as the HTTP toggle.

mod bridge;
mod commands;
mod listener;

pub use bridge::CommandBridge;
pub use listener::ConsoleListener;
