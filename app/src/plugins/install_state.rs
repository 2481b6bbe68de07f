//! Install State Machine - single source of truth for the plugin install dialog
//!
//! State diagram:
//! ```text
//! Idle ──Open──> Loading ──FetchSucceeded──> Ready ──ConfirmInstall──> Downloading
//!                  │  ▲                                                   │
//!       FetchFailed│  │Retry                               Progress(installing)
//!                  ▼  │                                                   ▼
//!                 Error <──Progress(failed) / InvocationFailed──── Installing
//!                                                                         │
//!                                           Progress(completed) ──> Completed
//! ```
//!
//! `Close` returns every state except Downloading/Installing to Idle and
//! clears all session data. A `failed` progress event reaches Error from any
//! non-idle state.

use std::sync::Mutex;

use super::{InstallProgress, InstallStage, ReleaseInfo};

/// Events that can trigger state transitions
#[derive(Debug, Clone, PartialEq, strum::Display)]
pub enum InstallEvent {
    /// Dialog opened
    Open,
    /// Release metadata arrived
    FetchSucceeded(ReleaseInfo),
    /// Release metadata lookup failed
    FetchFailed(String),
    /// User confirmed the install
    ConfirmInstall,
    /// Progress notification from the event channel
    Progress(InstallProgress),
    /// The install command itself was rejected
    InvocationFailed(String),
    /// User asked to try again after an error
    Retry,
    /// Dialog closed
    Close,
}

/// Actions the dialog should perform after a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    /// Request release metadata
    FetchReleaseInfo,
    /// Invoke the install command
    InvokeInstall,
    /// Start the completion timer
    ScheduleCompletion,
    /// Drop the subscription and any pending completion
    Teardown,
}

/// Install dialog states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum InstallState {
    #[default]
    Idle,
    Loading,
    Ready,
    Downloading,
    Installing,
    Completed,
    Error,
}

impl InstallState {
    /// An install is running and cannot be abandoned
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Downloading | Self::Installing)
    }
}

/// Result of a successful state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// State changed
    Changed {
        from: InstallState,
        to: InstallState,
        action: Option<InstallAction>,
    },
    /// Event was accepted but state didn't change (data may have been updated)
    Unchanged,
}

/// Reason a transition was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{attempted_event} event rejected in {current_state} state")]
pub struct TransitionRejection {
    pub current_state: InstallState,
    pub attempted_event: &'static str,
}

/// Everything the dialog shows, as of one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallView {
    pub state: InstallState,
    pub release: Option<ReleaseInfo>,
    pub progress: Option<InstallProgress>,
    pub error: Option<String>,
}

impl InstallView {
    /// Progress bar width in percent, always within 0..=100.
    pub fn progress_percent(&self) -> f64 {
        let fraction = self.progress.as_ref().map_or(0.0, |p| p.progress);
        let percent = fraction * 100.0;
        if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        }
    }

    /// Human-readable artifact size (e.g. "716.8 KB").
    pub fn formatted_file_size(&self) -> Option<String> {
        self.release
            .as_ref()
            .map(|r| format_file_size(r.file_size_bytes))
    }

    /// Close is suppressed while an install is running.
    pub fn can_close(&self) -> bool {
        !self.state.is_in_flight()
    }

    pub fn can_confirm(&self) -> bool {
        self.state == InstallState::Ready && self.release.is_some()
    }

    /// Line of status text for the current state.
    pub fn status_text(&self) -> String {
        match self.state {
            InstallState::Idle => String::new(),
            InstallState::Loading => "Fetching release information...".to_string(),
            InstallState::Ready => match &self.release {
                Some(r) => format!("Version {} ({})", r.version, format_file_size(r.file_size_bytes)),
                None => String::new(),
            },
            InstallState::Downloading | InstallState::Installing | InstallState::Completed => self
                .progress
                .as_ref()
                .map(|p| p.message.clone())
                .unwrap_or_default(),
            InstallState::Error => self.error.clone().unwrap_or_default(),
        }
    }
}

/// Format a byte count the way the install dialog displays it.
pub fn format_file_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let value = bytes as f64;
    if value < KB {
        format!("{} B", bytes)
    } else if value < MB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{:.1} MB", value / MB)
    }
}

/// Thread-safe install state manager
#[derive(Debug, Default)]
pub struct InstallStateManager {
    view: Mutex<InstallView>,
}

impl InstallStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state (read-only, thread-safe)
    pub fn current(&self) -> InstallState {
        self.view.lock().unwrap().state
    }

    /// Snapshot of everything the dialog displays
    pub fn view(&self) -> InstallView {
        self.view.lock().unwrap().clone()
    }

    /// Attempt a state transition based on an event
    ///
    /// This is the ONLY way to change state - ensures all transitions are valid.
    pub fn transition(&self, event: InstallEvent) -> Result<TransitionResult, TransitionRejection> {
        let mut view = self.view.lock().unwrap();
        let current = view.state;

        let Some((new_state, action)) = compute_transition(current, &event) else {
            return Err(TransitionRejection {
                current_state: current,
                attempted_event: event_name(&event),
            });
        };

        apply_payload(&mut view, event);

        if new_state == current {
            return Ok(TransitionResult::Unchanged);
        }

        view.state = new_state;
        Ok(TransitionResult::Changed {
            from: current,
            to: new_state,
            action,
        })
    }
}

/// Pure function: compute what transition should happen (if any)
/// Returns None if the transition is invalid
fn compute_transition(
    current: InstallState,
    event: &InstallEvent,
) -> Option<(InstallState, Option<InstallAction>)> {
    use InstallAction as A;
    use InstallState as S;

    match (current, event) {
        // Close is accepted everywhere except while an install is running
        (S::Idle, InstallEvent::Close) => Some((S::Idle, None)),
        (s, InstallEvent::Close) if s.is_in_flight() => None,
        (_, InstallEvent::Close) => Some((S::Idle, Some(A::Teardown))),

        (S::Idle, InstallEvent::Open) => Some((S::Loading, Some(A::FetchReleaseInfo))),

        (S::Loading, InstallEvent::FetchSucceeded(_)) => Some((S::Ready, None)),
        (S::Loading, InstallEvent::FetchFailed(_)) => Some((S::Error, None)),

        (S::Ready, InstallEvent::ConfirmInstall) => {
            Some((S::Downloading, Some(A::InvokeInstall)))
        }

        (S::Error, InstallEvent::Retry) => Some((S::Loading, Some(A::FetchReleaseInfo))),

        // The command call only matters while the event stream has not finished
        (s, InstallEvent::InvocationFailed(_)) if s.is_in_flight() => Some((S::Error, None)),

        (s, InstallEvent::Progress(p)) => match (s, p.stage) {
            (S::Idle, _) => None,
            (_, InstallStage::Failed) => Some((S::Error, None)),

            (S::Downloading, InstallStage::Downloading) => Some((S::Downloading, None)),
            (S::Downloading | S::Installing, InstallStage::Installing) => {
                Some((S::Installing, None))
            }
            (S::Downloading | S::Installing, InstallStage::Completed) => {
                Some((S::Completed, Some(A::ScheduleCompletion)))
            }
            (S::Completed, InstallStage::Completed) => Some((S::Completed, None)),
            _ => None,
        },

        _ => None,
    }
}

/// Store the data an accepted event carries.
fn apply_payload(view: &mut InstallView, event: InstallEvent) {
    match event {
        InstallEvent::Open | InstallEvent::Retry => {
            view.release = None;
            view.progress = None;
            view.error = None;
        }
        InstallEvent::Close => *view = InstallView::default(),
        InstallEvent::FetchSucceeded(release) => view.release = Some(release),
        InstallEvent::FetchFailed(message) | InstallEvent::InvocationFailed(message) => {
            view.error = Some(message)
        }
        InstallEvent::ConfirmInstall => {
            view.progress = None;
            view.error = None;
        }
        InstallEvent::Progress(progress) => {
            if progress.stage == InstallStage::Failed {
                view.error = Some(progress.message.clone());
            }
            view.progress = Some(progress);
        }
    }
}

fn event_name(event: &InstallEvent) -> &'static str {
    match event {
        InstallEvent::Open => "Open",
        InstallEvent::FetchSucceeded(_) => "FetchSucceeded",
        InstallEvent::FetchFailed(_) => "FetchFailed",
        InstallEvent::ConfirmInstall => "ConfirmInstall",
        InstallEvent::Progress(p) => match p.stage {
            InstallStage::Downloading => "Progress(downloading)",
            InstallStage::Installing => "Progress(installing)",
            InstallStage::Completed => "Progress(completed)",
            InstallStage::Failed => "Progress(failed)",
        },
        InstallEvent::InvocationFailed(_) => "InvocationFailed",
        InstallEvent::Retry => "Retry",
        InstallEvent::Close => "Close",
    }
}
