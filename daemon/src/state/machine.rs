//! Core status state machine
//!
//! Reconciles track submissions and operator enable/disable requests into
//! a single displayed profile status. Every decision, the outbound profile
//! call it leads to, and the commit of the resulting state happen under one
//! async mutex, so concurrent callers are strictly serialized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::events::StatusEvent;
use crate::profile::ProfileUpdater;

use super::store::FlagStore;

/// Minimum spacing between two outbound calls carrying the same track
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(30);

/// Hard limit of the profile "about" field, in characters
pub const MAX_ABOUT_CHARS: usize = 70;

/// Whether submitted tracks are mirrored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    /// Tracks are mirrored, subject to debouncing
    Live,
    /// Placeholder is shown, tracks are ignored
    Suspended,
}

impl StatusMode {
    fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::Live
        } else {
            Self::Suspended
        }
    }
}

impl std::fmt::Display for StatusMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusMode::Live => write!(f, "Live"),
            StatusMode::Suspended => write!(f, "Suspended"),
        }
    }
}

/// Result of submitting (or replaying) a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Profile text was updated
    Applied,
    /// Same track inside the debounce window, no call made
    Debounced,
    /// Mirroring is suspended; only the placeholder was enforced
    Suspended,
    /// Profile updater failed, state left unchanged
    Failed(String),
}

/// Fixed texts used when building the profile status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSettings {
    /// Shown while suspended
    pub placeholder: String,
    /// Marker put in front of every track title
    pub prefix: String,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            placeholder: "олег".to_string(),
            prefix: "🎵Сейчас играет:\n ".to_string(),
        }
    }
}

/// Point-in-time view of the manager, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub mode: StatusMode,
    pub displayed: Option<String>,
    pub last_track: Option<String>,
    pub placeholder_confirmed: bool,
    pub secs_since_live_update: Option<u64>,
}

/// Mutable state, only touched while holding the manager lock
#[derive(Debug)]
struct ManagerState {
    mode: StatusMode,
    /// Raw track text in live mode, placeholder in suspended mode
    displayed: Option<String>,
    last_live_update: Option<Instant>,
    /// Latest submitted track, recorded in both modes
    last_track: Option<String>,
    /// Updater acknowledged the placeholder since entering suspended mode
    placeholder_confirmed: bool,
}

/// The status manager
pub struct StatusManager {
    state: Mutex<ManagerState>,
    /// Lock-free mirror of `state.mode == Live`
    live: AtomicBool,
    settings: StatusSettings,
    store: FlagStore,
    updater: Arc<dyn ProfileUpdater>,
    event_tx: broadcast::Sender<StatusEvent>,
}

impl StatusManager {
    /// Create a manager seeded from the persisted flag
    ///
    /// No profile call is made; use [`StatusManager::restore`] at startup.
    pub fn new(
        settings: StatusSettings,
        store: FlagStore,
        updater: Arc<dyn ProfileUpdater>,
        event_tx: broadcast::Sender<StatusEvent>,
    ) -> Self {
        let mode = StatusMode::from_enabled(store.load());

        Self {
            state: Mutex::new(ManagerState {
                mode,
                displayed: None,
                last_live_update: None,
                last_track: None,
                placeholder_confirmed: false,
            }),
            live: AtomicBool::new(mode == StatusMode::Live),
            settings,
            store,
            updater,
            event_tx,
        }
    }

    /// Create a manager and, if it comes up suspended, apply the placeholder
    pub async fn restore(
        settings: StatusSettings,
        store: FlagStore,
        updater: Arc<dyn ProfileUpdater>,
        event_tx: broadcast::Sender<StatusEvent>,
    ) -> Self {
        let manager = Self::new(settings, store, updater, event_tx);

        {
            let mut state = manager.state.lock().await;
            info!(mode = %state.mode, flag_file = ?manager.store.path(), "status manager restored");
            if state.mode == StatusMode::Suspended {
                manager.enforce_placeholder(&mut state).await;
            }
        }

        manager
    }

    /// Current mode without waiting on the state lock
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> &StatusSettings {
        &self.settings
    }

    /// Submit a track title; an empty title clears the status
    pub async fn submit_track(&self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        let mut state = self.state.lock().await;
        state.last_track = Some(text.to_string());
        self.submit_locked(&mut state, text).await
    }

    /// Re-submit the most recently received track
    ///
    /// Returns `None` if no track has been received yet.
    pub async fn replay(&self) -> Option<SubmitOutcome> {
        let mut state = self.state.lock().await;
        let track = state.last_track.clone()?;
        Some(self.submit_locked(&mut state, &track).await)
    }

    /// Switch to live mode
    ///
    /// Clears the debounce clock so the next submitted track is applied
    /// immediately. Makes no profile call itself.
    pub async fn enable(&self) {
        let mut state = self.state.lock().await;
        if state.mode == StatusMode::Live {
            debug!("enable ignored, already live");
            return;
        }

        self.transition_to(&mut state, StatusMode::Live);
        state.last_live_update = None;
        self.persist(true);
    }

    /// Switch to suspended mode and show the placeholder
    ///
    /// The transition commits before the profile call and is kept even if
    /// that call fails.
    pub async fn disable(&self) {
        let mut state = self.state.lock().await;
        if state.mode == StatusMode::Suspended {
            if state.placeholder_confirmed {
                debug!("disable ignored, already suspended");
            } else {
                self.enforce_placeholder(&mut state).await;
            }
            return;
        }

        self.transition_to(&mut state, StatusMode::Suspended);
        state.displayed = Some(self.settings.placeholder.clone());
        state.placeholder_confirmed = false;
        self.persist(false);

        let placeholder = self.settings.placeholder.clone();
        match self.updater.set_about(&placeholder).await {
            Ok(()) => {
                state.placeholder_confirmed = true;
                info!("live status suspended, placeholder applied");
                self.emit(StatusEvent::StatusApplied { about: placeholder });
            }
            Err(e) => {
                error!(error = %e, "failed to apply placeholder");
                self.emit(StatusEvent::UpdateFailed {
                    about: placeholder,
                    error: e.to_string(),
                });
            }
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock().await;
        StatusSnapshot {
            mode: state.mode,
            displayed: state.displayed.clone(),
            last_track: state.last_track.clone(),
            placeholder_confirmed: state.placeholder_confirmed,
            secs_since_live_update: state.last_live_update.map(|t| t.elapsed().as_secs()),
        }
    }

    async fn submit_locked(&self, state: &mut ManagerState, text: &str) -> SubmitOutcome {
        match state.mode {
            StatusMode::Suspended => {
                debug!(track = %text, "track ignored while suspended");
                self.enforce_placeholder(state).await;
                SubmitOutcome::Suspended
            }
            StatusMode::Live => self.apply_live(state, text).await,
        }
    }

    async fn apply_live(&self, state: &mut ManagerState, text: &str) -> SubmitOutcome {
        let recently_updated = state
            .last_live_update
            .map_or(false, |at| at.elapsed() < DEBOUNCE_WINDOW);

        if recently_updated && state.displayed.as_deref() == Some(text) {
            debug!(track = %text, "update debounced");
            return SubmitOutcome::Debounced;
        }

        let about = format_about(&self.settings.prefix, text);
        match self.updater.set_about(&about).await {
            Ok(()) => {
                state.displayed = Some(text.to_string());
                state.last_live_update = Some(Instant::now());
                info!(track = %text, "profile status updated");
                self.emit(StatusEvent::StatusApplied { about });
                SubmitOutcome::Applied
            }
            Err(e) => {
                warn!(track = %text, error = %e, "profile status update failed");
                let error = e.to_string();
                self.emit(StatusEvent::UpdateFailed {
                    about,
                    error: error.clone(),
                });
                SubmitOutcome::Failed(error)
            }
        }
    }

    /// Apply the placeholder unless it is already confirmed on the profile
    async fn enforce_placeholder(&self, state: &mut ManagerState) {
        let placeholder = &self.settings.placeholder;
        if state.placeholder_confirmed && state.displayed.as_deref() == Some(placeholder.as_str()) {
            return;
        }

        match self.updater.set_about(placeholder).await {
            Ok(()) => {
                state.displayed = Some(placeholder.clone());
                state.placeholder_confirmed = true;
                info!("placeholder enforced");
                self.emit(StatusEvent::StatusApplied {
                    about: placeholder.clone(),
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to enforce placeholder");
                self.emit(StatusEvent::UpdateFailed {
                    about: placeholder.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn transition_to(&self, state: &mut ManagerState, new_mode: StatusMode) {
        let old_mode = state.mode;
        state.mode = new_mode;
        self.live.store(new_mode == StatusMode::Live, Ordering::SeqCst);

        info!(from = %old_mode, to = %new_mode, "status mode transition");
        self.emit(StatusEvent::ModeChanged {
            from: old_mode,
            to: new_mode,
        });
    }

    fn persist(&self, enabled: bool) {
        if let Err(e) = self.store.save(enabled) {
            error!(error = %e, "failed to persist mode flag");
        }
    }

    fn emit(&self, event: StatusEvent) {
        debug!(%event, "emitting status event");
        let _ = self.event_tx.send(event);
    }
}

/// Build the outbound profile text for a track
///
/// An empty track clears the status. The result never exceeds
/// [`MAX_ABOUT_CHARS`] characters.
pub fn format_about(prefix: &str, track: &str) -> String {
    if track.is_empty() {
        return String::new();
    }
    prefix.chars().chain(track.chars()).take(MAX_ABOUT_CHARS).collect()
}
