//! Profile text updater
//!
//! Abstracts the capability that sets the chat account's visible "about"
//! text. The state machine only ever talks to the [`ProfileUpdater`] trait.

mod http;

use async_trait::async_trait;
use tracing::info;

pub use http::HttpProfileUpdater;

/// Errors reported by a profile updater
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("profile endpoint rejected update with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sets the account's status text
#[async_trait]
pub trait ProfileUpdater: Send + Sync {
    async fn set_about(&self, text: &str) -> Result<(), ProfileError>;
}

/// Updater used when no profile endpoint is configured; only logs
#[derive(Debug, Default)]
pub struct DryRunUpdater;

#[async_trait]
impl ProfileUpdater for DryRunUpdater {
    async fn set_about(&self, text: &str) -> Result<(), ProfileError> {
        info!(about = %text, "dry run: profile text not sent");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Recording updater for tests

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Records every call and optionally fails or stalls
    #[derive(Debug, Default)]
    pub struct RecordingUpdater {
        calls: Mutex<Vec<String>>,
        failing: AtomicBool,
        delay: Option<Duration>,
    }

    impl RecordingUpdater {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every call sleeps for `delay` before returning
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProfileUpdater for RecordingUpdater {
        async fn set_about(&self, text: &str) -> Result<(), ProfileError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.lock().unwrap().push(text.to_string());
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProfileError::Rejected {
                    status: 503,
                    body: "simulated failure".into(),
                });
            }
            Ok(())
        }
    }
}
