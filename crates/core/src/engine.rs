//! Toggle Engine - owns the profile state and reacts to user input
//!
//! All input (tray clicks, menu items, global hotkeys) arrives as an
//! [`EngineEvent`] on the control thread and is handled by [`ToggleEngine::handle`].
//! The engine is the only writer of the profile state, the monitor selection
//! and the pending notification; the tray surface only ever sees a
//! [`TrayStatus`] snapshot published after a change.
//!
//! Transitions:
//!
//! | state     | event                          | outcome      | next state |
//! |-----------|--------------------------------|--------------|------------|
//! | Default   | ToggleRequested                | success      | Corrected  |
//! | Corrected | ToggleRequested                | success      | Default    |
//! | any       | ProfileRequested(kind)         | success      | kind's     |
//! | any       | Toggle/ProfileRequested        | any failure  | unchanged  |

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::executor::{ExecutionOutcome, ProfileApplier, ProfileKind};
use crate::hotkey::HotkeyRegistrar;
use crate::monitor::{MonitorCatalog, MonitorSelection};
use crate::notify::{Notification, NotificationDebouncer, NotificationSink};
use crate::settings::{Preferences, SettingsStore, StartupChange, StartupRegistration};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const PROFILE_CHANGED_TITLE: &str = "Profile Changed";
pub const ERROR_TITLE: &str = "Error";
pub const HOTKEY_FAILED_TITLE: &str = "Hotkey Registration Failed";
pub const STARTUP_CHANGED_TITLE: &str = "Startup Setting Changed";
pub const REGISTRY_ERROR_TITLE: &str = "Registry Error";

/// Calibration state currently loaded on the displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileState {
    #[default]
    Default,
    Corrected,
}

impl ProfileState {
    /// The request a plain toggle makes from this state
    pub fn toggle_kind(self) -> ProfileKind {
        match self {
            ProfileState::Default => ProfileKind::ToCorrected,
            ProfileState::Corrected => ProfileKind::ToDefault,
        }
    }

    /// State reached once `kind` has been applied successfully
    pub fn reached_by(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::ToCorrected => ProfileState::Corrected,
            ProfileKind::ToDefault => ProfileState::Default,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProfileState::Default => ProfileKind::ToDefault.profile_name(),
            ProfileState::Corrected => ProfileKind::ToCorrected.profile_name(),
        }
    }
}

impl fmt::Display for ProfileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Left click on the tray icon
    ToggleRequested,
    /// A hotkey or an explicit menu item
    ProfileRequested(ProfileKind),
    MonitorSelectionChanged(MonitorSelection),
    NotificationsToggled(bool),
    RunAtStartupToggled(bool),
    Shutdown,
}

impl EngineEvent {
    /// Whether handling this event runs the calibration tool
    pub fn requests_execution(&self) -> bool {
        matches!(
            self,
            EngineEvent::ToggleRequested | EngineEvent::ProfileRequested(_)
        )
    }
}

/// What handling an event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Dropped because the engine has shut down
    Ignored,
    /// Preferences or status changed, nothing was executed
    Updated,
    /// The calibration tool ran; the outcome has been applied
    Executed,
    /// The engine has shut down
    Stopped,
}

/// Snapshot handed to the tray after every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayStatus {
    pub state: ProfileState,
    pub selection: MonitorSelection,
    pub tooltip: String,
    pub notifications_enabled: bool,
    pub run_at_startup: bool,
}

/// The visible side: icon, tooltip, menu checks, balloons and alerts
pub trait TraySurface {
    fn show_notification(&mut self, notification: &Notification);
    /// Blocking dialog, used for errors the user must acknowledge
    fn show_alert(&mut self, title: &str, message: &str);
    fn update_status(&mut self, status: &TrayStatus);
    /// Remove the icon before the process exits
    fn hide(&mut self);
}

/// External collaborators the engine drives
pub struct Collaborators {
    pub applier: Box<dyn ProfileApplier>,
    pub settings: Box<dyn SettingsStore>,
    pub startup: Box<dyn StartupRegistration>,
    pub hotkeys: Box<dyn HotkeyRegistrar>,
    pub surface: Box<dyn TraySurface>,
    pub clock: Box<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub notification_delay: Duration,
    pub apply_on_startup: bool,
}

impl From<&AppConfig> for EngineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            notification_delay: config.notification_delay(),
            apply_on_startup: config.apply_on_startup,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Routes due notifications to the surface, honouring the user's toggle
struct SurfaceSink<'a> {
    surface: &'a mut Box<dyn TraySurface>,
    enabled: bool,
}

impl NotificationSink for SurfaceSink<'_> {
    fn notifications_enabled(&self) -> bool {
        self.enabled
    }

    fn show(&mut self, notification: &Notification) {
        self.surface.show_notification(notification);
    }
}

/// Events waiting for the engine, oldest first
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<EngineEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: EngineEvent) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    /// Queue events that arrived while the calibration tool was running.
    /// Toggle and profile requests are discarded; events queued earlier are
    /// left alone. Returns how many were discarded.
    pub fn extend_after_execution(&mut self, arrived: impl IntoIterator<Item = EngineEvent>) -> usize {
        let mut dropped = 0;
        for event in arrived {
            if event.requests_execution() {
                dropped += 1;
            } else {
                self.events.push_back(event);
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Extend<EngineEvent> for EventQueue {
    fn extend<I: IntoIterator<Item = EngineEvent>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

pub struct ToggleEngine {
    state: ProfileState,
    selection: MonitorSelection,
    notifications_enabled: bool,
    run_at_startup: bool,
    catalog: MonitorCatalog,
    applier: Box<dyn ProfileApplier>,
    prefs: Preferences,
    startup: Box<dyn StartupRegistration>,
    hotkeys: Box<dyn HotkeyRegistrar>,
    surface: Box<dyn TraySurface>,
    clock: Box<dyn Clock>,
    debouncer: NotificationDebouncer,
    options: EngineOptions,
    shut_down: bool,
}

impl ToggleEngine {
    /// Build the engine in the `Default` state with preferences loaded from
    /// the store. Nothing is registered or executed until [`start`](Self::start).
    pub fn new(catalog: MonitorCatalog, parts: Collaborators, options: EngineOptions) -> Self {
        let prefs = Preferences::new(parts.settings);
        let selection = prefs.selection();
        let notifications_enabled = prefs.notifications_enabled();
        let run_at_startup = parts.startup.is_enabled();

        if let MonitorSelection::Display(n) = selection {
            if !catalog.contains(n) {
                warn!("Saved monitor {} not found, profile changes will target all monitors", n);
            }
        }

        Self {
            state: ProfileState::Default,
            selection,
            notifications_enabled,
            run_at_startup,
            catalog,
            applier: parts.applier,
            prefs,
            startup: parts.startup,
            hotkeys: parts.hotkeys,
            surface: parts.surface,
            clock: parts.clock,
            debouncer: NotificationDebouncer::new(options.notification_delay),
            options,
            shut_down: false,
        }
    }

    /// Publish the initial status, run apply-on-startup if configured, then
    /// register the global hotkeys. Registration comes last so that a
    /// failure warning is the notification that survives the debounce.
    pub fn start(&mut self) {
        self.publish_status();

        if self.options.apply_on_startup {
            self.request(ProfileKind::ToCorrected);
        }

        let mut failed = Vec::new();
        for status in self.hotkeys.register() {
            if status.registered {
                info!("Registered {} hotkey for {}", status.chord, status.binding);
            } else {
                warn!("Could not register {} hotkey for {}", status.chord, status.binding);
                failed.push(status.chord);
            }
        }

        // One notification for all failures, a second would replace the first
        let message = match failed.as_slice() {
            [] => return,
            [chord] => format!(
                "Could not register {} hotkey. It may be in use by another application.",
                chord
            ),
            chords => format!(
                "Could not register {} hotkeys. They may be in use by another application.",
                chords.join(" and ")
            ),
        };
        self.queue(Notification::warning(HOTKEY_FAILED_TITLE, message));
    }

    pub fn handle(&mut self, event: EngineEvent) -> Dispatch {
        if self.shut_down {
            debug!("Ignoring {:?} after shutdown", event);
            return Dispatch::Ignored;
        }

        match event {
            EngineEvent::ToggleRequested => self.request(self.state.toggle_kind()),
            EngineEvent::ProfileRequested(kind) => self.request(kind),
            EngineEvent::MonitorSelectionChanged(selection) => {
                info!("Monitor selection changed to {}", selection);
                self.selection = selection;
                self.prefs.set_selection(selection);
                self.publish_status();
                Dispatch::Updated
            }
            EngineEvent::NotificationsToggled(enabled) => {
                info!("Notifications enabled: {}", enabled);
                self.notifications_enabled = enabled;
                self.prefs.set_notifications_enabled(enabled);
                self.publish_status();
                Dispatch::Updated
            }
            EngineEvent::RunAtStartupToggled(enabled) => {
                self.set_run_at_startup(enabled);
                Dispatch::Updated
            }
            EngineEvent::Shutdown => {
                self.shutdown();
                Dispatch::Stopped
            }
        }
    }

    /// Handle every queued event in order. After each execution `collect` is
    /// asked for the events that arrived while the tool ran; profile requests
    /// among them are dropped, everything else is queued behind the rest.
    ///
    /// Returns false once the engine has stopped or `collect` returns `None`.
    pub fn drain<F>(&mut self, queue: &mut EventQueue, mut collect: F) -> bool
    where
        F: FnMut(&ToggleEngine) -> Option<Vec<EngineEvent>>,
    {
        while let Some(event) = queue.pop() {
            match self.handle(event) {
                Dispatch::Stopped => return false,
                Dispatch::Executed => {
                    let Some(arrived) = collect(self) else {
                        return false;
                    };
                    let dropped = queue.extend_after_execution(arrived);
                    if dropped > 0 {
                        debug!("Dropped {} request(s) received during execution", dropped);
                    }
                }
                Dispatch::Updated | Dispatch::Ignored => {}
            }
        }
        !self.shut_down
    }

    /// Debounce timer callback; returns true if a notification was shown
    pub fn tick(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        let now = self.clock.now();
        let mut sink = SurfaceSink {
            surface: &mut self.surface,
            enabled: self.notifications_enabled,
        };
        self.debouncer.tick(now, &mut sink)
    }

    /// When [`tick`](Self::tick) next has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.shut_down {
            None
        } else {
            self.debouncer.next_deadline()
        }
    }

    /// Unregister hotkeys, drop the pending notification and hide the icon.
    /// Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.hotkeys.unregister();
        self.debouncer.cancel();
        self.surface.hide();
        info!("Toggle engine shut down");
    }

    pub fn status(&self) -> TrayStatus {
        TrayStatus {
            state: self.state,
            selection: self.selection,
            tooltip: format!(
                "HDR Gamma Fix: {}{}",
                self.state.label(),
                self.catalog.scope_text(self.selection)
            ),
            notifications_enabled: self.notifications_enabled,
            run_at_startup: self.run_at_startup,
        }
    }

    pub fn state(&self) -> ProfileState {
        self.state
    }

    pub fn selection(&self) -> MonitorSelection {
        self.selection
    }

    pub fn catalog(&self) -> &MonitorCatalog {
        &self.catalog
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    pub fn pending_notification(&self) -> Option<&Notification> {
        self.debouncer.pending()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Blocks until every target monitor has been attempted
    fn request(&mut self, kind: ProfileKind) -> Dispatch {
        let outcome = self.applier.apply(kind, self.selection, &self.catalog);
        self.apply_outcome(kind, &outcome);
        Dispatch::Executed
    }

    fn apply_outcome(&mut self, kind: ProfileKind, outcome: &ExecutionOutcome) {
        let scope = self.catalog.scope_text(self.selection);

        if outcome.is_success() {
            let previous = self.state;
            self.state = ProfileState::reached_by(kind);
            info!("Profile changed: {} -> {}{}", previous, self.state, scope);
            self.publish_status();

            let message = match kind {
                ProfileKind::ToCorrected => format!("Applied sRGB to Gamma profile{}", scope),
                ProfileKind::ToDefault => format!("Reverted to Default profile{}", scope),
            };
            self.queue(Notification::info(PROFILE_CHANGED_TITLE, message));
            return;
        }

        if let Some(ref fatal) = outcome.fatal_error {
            let message = fatal.to_string();
            error!("Could not {}: {}", kind, message);
            self.surface.show_alert(ERROR_TITLE, &message);
            self.queue(Notification::error(ERROR_TITLE, message));
            return;
        }

        warn!(
            "Could not {}: monitors {:?} failed, state stays {}",
            kind, outcome.failed_monitors, self.state
        );
        self.queue(Notification::error(
            ERROR_TITLE,
            format!(
                "Could not {} on {} of {} monitor(s)",
                kind,
                outcome.failed_monitors.len(),
                outcome.attempted()
            ),
        ));
    }

    fn set_run_at_startup(&mut self, enabled: bool) {
        match self.startup.set_enabled(enabled) {
            Ok(StartupChange::Enabled) => {
                self.run_at_startup = true;
                self.queue(Notification::info(
                    STARTUP_CHANGED_TITLE,
                    "Application will now run at Windows startup.",
                ));
            }
            Ok(StartupChange::Disabled) => {
                self.run_at_startup = false;
                self.queue(Notification::info(
                    STARTUP_CHANGED_TITLE,
                    "Application will no longer run at Windows startup.",
                ));
            }
            Ok(StartupChange::Unchanged) => {
                self.run_at_startup = enabled;
            }
            Err(e) => {
                warn!("Could not update run at startup: {}", e);
                self.run_at_startup = self.startup.is_enabled();
                self.queue(Notification::error(
                    REGISTRY_ERROR_TITLE,
                    format!("Failed to update startup setting: {}", e),
                ));
            }
        }
        self.publish_status();
    }

    fn queue(&mut self, notification: Notification) {
        let now = self.clock.now();
        self.debouncer.queue(notification, now);
    }

    fn publish_status(&mut self) {
        let status = self.status();
        self.surface.update_status(&status);
    }
}
