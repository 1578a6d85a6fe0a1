//! HTTP ingestion endpoint for now-playing updates and mode toggles

mod protocol;
mod server;

pub use server::{ManagerSlot, Server};
