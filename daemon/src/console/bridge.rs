//! Executes operator commands against the status manager

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::state::{StatusManager, StatusMode, SubmitOutcome};

use super::commands::{OperatorCommand, HELP_TEXT};

/// Turns operator command lines into status manager operations
pub struct CommandBridge {
    manager: Arc<StatusManager>,
}

impl CommandBridge {
    pub fn new(manager: Arc<StatusManager>) -> Self {
        Self { manager }
    }

    /// Process command lines until the channel closes
    pub async fn run(&self, mut command_rx: mpsc::Receiver<String>) {
        info!("command bridge started");

        while let Some(line) = command_rx.recv().await {
            if let Some(reply) = self.handle(&line).await {
                info!(command = %line.trim(), "{}", reply);
            }
        }

        info!("command bridge stopped");
    }

    /// Execute one command line and return the reply, if any
    pub async fn handle(&self, line: &str) -> Option<String> {
        let command = match OperatorCommand::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "rejected operator command");
                return Some(e.to_string());
            }
        };

        let reply = match command {
            OperatorCommand::Enable => {
                self.manager.enable().await;
                match self.manager.replay().await {
                    Some(SubmitOutcome::Failed(e)) => {
                        format!("live music status enabled, but the current track could not be shown: {}", e)
                    }
                    _ => "live music status enabled".to_string(),
                }
            }
            OperatorCommand::Disable => {
                self.manager.disable().await;
                format!(
                    "live music status disabled, placeholder {:?} set",
                    self.manager.settings().placeholder
                )
            }
            OperatorCommand::Status => self.status_text().await,
            OperatorCommand::Help => HELP_TEXT.to_string(),
        };

        Some(reply)
    }

    async fn status_text(&self) -> String {
        let snapshot = self.manager.snapshot().await;
        let mode = match snapshot.mode {
            StatusMode::Live => "live",
            StatusMode::Suspended => "suspended",
        };
        format!(
            "music: {}, displayed: {}, last track: {}",
            mode,
            snapshot.displayed.as_deref().unwrap_or("-"),
            snapshot.last_track.as_deref().unwrap_or("-"),
        )
    }
}
