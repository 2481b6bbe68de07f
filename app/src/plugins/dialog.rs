//! Install dialog controller.
//!
//! Owns one [`InstallStateManager`] and performs the actions its transitions
//! return: release lookups and install calls go through a [`CommandGateway`],
//! progress arrives on the event channel. Every `open` starts a new session;
//! results and events from an older session are dropped. Leaving `completed`
//! cancels the pending completion.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use textlingo_event_channel::{Event, EventChannel, Subscription};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{
    InstallAction, InstallEvent, InstallProgress, InstallState, InstallStateManager, InstallView,
    TransitionResult,
};
use crate::commands::CommandGateway;

/// How long the `completed` state stays visible before the completion
/// callback runs and the dialog closes itself
pub const COMPLETION_DELAY: Duration = Duration::from_millis(1500);

/// Called once per session after a successful install
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync>;

/// Per-open data; replaced wholesale on every open
#[derive(Default)]
struct Session {
    id: u64,
    plugin_name: String,
    release_repo: String,
    subscription: Option<Subscription>,
    completion: Option<CancellationToken>,
}

impl Session {
    fn teardown(&mut self) {
        self.subscription = None;
        if let Some(token) = self.completion.take() {
            token.cancel();
        }
    }
}

struct Inner<G> {
    gateway: Arc<G>,
    events: EventChannel,
    runtime: Handle,
    completion_delay: Duration,
    state: InstallStateManager,
    /// Also serializes transitions against session changes
    session: Mutex<Session>,
    /// Latest callback, read when the completion timer fires
    on_complete: Arc<Mutex<Option<CompletionCallback>>>,
}

/// Drives a single plugin install dialog.
///
/// Must be created inside a Tokio runtime. Dropping the dialog unsubscribes
/// from the event channel and cancels a pending completion; an install that is
/// already running keeps going in the backend.
pub struct InstallDialog<G: CommandGateway> {
    inner: Arc<Inner<G>>,
}

impl<G: CommandGateway> InstallDialog<G> {
    pub fn new(gateway: G, events: EventChannel) -> Self {
        Self::with_completion_delay(gateway, events, COMPLETION_DELAY)
    }

    pub fn with_completion_delay(gateway: G, events: EventChannel, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway: Arc::new(gateway),
                events,
                runtime: Handle::current(),
                completion_delay: delay,
                state: InstallStateManager::new(),
                session: Mutex::new(Session::default()),
                on_complete: Arc::new(Mutex::new(None)),
            }),
        }
    }

    /// Open the dialog for `plugin_name` and fetch the latest release of
    /// `release_repo`. Returns false if the dialog is already open.
    pub fn open(&self, plugin_name: &str, release_repo: &str) -> bool {
        self.inner.open(plugin_name, release_repo)
    }

    /// Start installing the fetched release. Only valid in `ready`.
    pub fn confirm_install(&self) -> bool {
        self.inner.dispatch_current(InstallEvent::ConfirmInstall)
    }

    /// Re-run the release lookup after an error.
    pub fn retry(&self) -> bool {
        self.inner.dispatch_current(InstallEvent::Retry)
    }

    /// Close and reset the dialog.
    ///
    /// Returns false, leaving everything untouched, while an install is
    /// downloading or installing.
    pub fn close(&self) -> bool {
        self.inner.dispatch_current(InstallEvent::Close)
    }

    /// Replace the completion callback. The callback in place when the
    /// completion timer fires is the one that runs.
    pub fn set_on_complete<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.on_complete.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn state(&self) -> InstallState {
        self.inner.state.current()
    }

    pub fn view(&self) -> InstallView {
        self.inner.state.view()
    }
}

impl<G: CommandGateway> Drop for InstallDialog<G> {
    fn drop(&mut self) {
        self.inner.session.lock().unwrap().teardown();
    }
}

impl<G: CommandGateway> Inner<G> {
    fn open(self: &Arc<Self>, plugin_name: &str, release_repo: &str) -> bool {
        let mut session = self.session.lock().unwrap();
        if self.state.current() != InstallState::Idle {
            warn!("Install dialog is already open for '{}'", session.plugin_name);
            return false;
        }

        let id = session.id + 1;
        session.teardown();
        *session = Session {
            id,
            plugin_name: plugin_name.to_string(),
            release_repo: release_repo.to_string(),
            subscription: Some(self.subscribe(id)),
            completion: None,
        };
        info!("Install dialog opened for '{}' ({})", plugin_name, release_repo);

        self.apply(&mut session, InstallEvent::Open)
    }

    fn subscribe(self: &Arc<Self>, session_id: u64) -> Subscription {
        let weak = Arc::downgrade(self);
        InstallProgress::listen(&self.events, move |progress| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(session_id, InstallEvent::Progress(progress));
            }
        })
    }

    /// Apply a user event to whatever session is current
    fn dispatch_current(self: &Arc<Self>, event: InstallEvent) -> bool {
        let mut session = self.session.lock().unwrap();
        self.apply(&mut session, event)
    }

    /// Apply an asynchronous event produced for `session_id`
    fn dispatch(self: &Arc<Self>, session_id: u64, event: InstallEvent) -> bool {
        let mut session = self.session.lock().unwrap();
        if session.id != session_id {
            debug!("Dropping {} from stale session {}", event, session_id);
            return false;
        }
        self.apply(&mut session, event)
    }

    fn apply(self: &Arc<Self>, session: &mut Session, event: InstallEvent) -> bool {
        match self.state.transition(event) {
            Ok(TransitionResult::Changed { from, to, action }) => {
                debug!("Install dialog: {} -> {}", from, to);
                if from == InstallState::Completed {
                    if let Some(token) = session.completion.take() {
                        token.cancel();
                    }
                }
                if let Some(action) = action {
                    self.execute_action(action, session);
                }
                true
            }
            Ok(TransitionResult::Unchanged) => true,
            Err(rejection) => {
                warn!("{}", rejection);
                false
            }
        }
    }

    /// Execute action returned by the state machine
    fn execute_action(self: &Arc<Self>, action: InstallAction, session: &mut Session) {
        match action {
            InstallAction::FetchReleaseInfo => self.spawn_fetch(session),
            InstallAction::InvokeInstall => self.spawn_install(session),
            InstallAction::ScheduleCompletion => self.schedule_completion(session),
            InstallAction::Teardown => {
                info!("Install dialog closed for '{}'", session.plugin_name);
                session.teardown();
            }
        }
    }

    fn spawn_fetch(self: &Arc<Self>, session: &Session) {
        let weak = Arc::downgrade(self);
        let gateway = self.gateway.clone();
        let release_repo = session.release_repo.clone();
        let session_id = session.id;

        self.runtime.spawn(async move {
            let result = gateway.get_plugin_release_info(release_repo).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let event = match result {
                Ok(release) => InstallEvent::FetchSucceeded(release),
                Err(message) => InstallEvent::FetchFailed(message),
            };
            inner.dispatch(session_id, event);
        });
    }

    fn spawn_install(self: &Arc<Self>, session: &Session) {
        let Some(release) = self.state.view().release else {
            return;
        };

        let weak = Arc::downgrade(self);
        let gateway = self.gateway.clone();
        let plugin_name = session.plugin_name.clone();
        let session_id = session.id;

        self.runtime.spawn(async move {
            let result = gateway
                .install_plugin(release.download_url, plugin_name, release.sha256)
                .await;

            // The event stream reports the outcome; a rejection only matters
            // while no terminal event has arrived yet.
            if let Err(message) = result {
                if let Some(inner) = weak.upgrade() {
                    inner.dispatch(session_id, InstallEvent::InvocationFailed(message));
                }
            }
        });
    }

    fn schedule_completion(self: &Arc<Self>, session: &mut Session) {
        if session.completion.is_some() {
            return;
        }

        let token = CancellationToken::new();
        session.completion = Some(token.clone());

        // Arm the timer now so the delay counts from entering `completed`
        let sleep = {
            let _guard = self.runtime.enter();
            tokio::time::sleep(self.completion_delay)
        };
        let on_complete = self.on_complete.clone();
        let weak = Arc::downgrade(self);
        let session_id = session.id;

        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Pending completion cancelled");
                }
                _ = sleep => {
                    let callback = on_complete.lock().unwrap().clone();
                    if let Some(callback) = callback {
                        callback();
                    }
                    if let Some(inner) = weak.upgrade() {
                        inner.dispatch(session_id, InstallEvent::Close);
                    }
                }
            }
        });
    }
}
