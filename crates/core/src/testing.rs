//! Test doubles shared by the unit tests

use crate::clock::Clock;
use crate::engine::{TraySurface, TrayStatus};
use crate::error::{ProcessError, SettingsError};
use crate::executor::{resolve_targets, ExecutionOutcome, ProfileApplier, ProfileKind};
use crate::hotkey::{BindingStatus, HotkeyBinding, HotkeyRegistrar};
use crate::monitor::{MonitorCatalog, MonitorSelection};
use crate::notify::{Notification, NotificationSink};
use crate::process::{Invocation, ProcessRunner};
use crate::settings::{SettingsStore, StartupChange, StartupRegistration};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

type RunFn = Box<dyn Fn(&Invocation) -> Result<Option<i32>, ProcessError>>;
type CaptureFn = Box<dyn Fn(&Invocation) -> Result<String, ProcessError>>;

/// Records every invocation; exits 0 and prints nothing unless told otherwise
pub struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    run: RunFn,
    capture: CaptureFn,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            run: Box::new(|_| Ok(Some(0))),
            capture: Box::new(|_| Ok(String::new())),
        }
    }

    pub fn with_run(
        mut self,
        run: impl Fn(&Invocation) -> Result<Option<i32>, ProcessError> + 'static,
    ) -> Self {
        self.run = Box::new(run);
        self
    }

    pub fn with_capture(
        mut self,
        capture: impl Fn(&Invocation) -> Result<String, ProcessError> + 'static,
    ) -> Self {
        self.capture = Box::new(capture);
        self
    }

    pub fn with_output(self, output: &str) -> Self {
        let output = output.to_string();
        self.with_capture(move |_| Ok(output.clone()))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, invocation: &Invocation, _timeout: Duration) -> Result<Option<i32>, ProcessError> {
        self.calls.lock().push(invocation.clone());
        (self.run)(invocation)
    }

    fn capture(&self, invocation: &Invocation, _timeout: Duration) -> Result<String, ProcessError> {
        self.calls.lock().push(invocation.clone());
        (self.capture)(invocation)
    }
}

/// The display number passed after `-d`, if any
pub fn display_arg(invocation: &Invocation) -> Option<u32> {
    let mut args = invocation.args.iter();
    while let Some(arg) = args.next() {
        if arg == "-d" {
            return args.next()?.to_str()?.parse().ok();
        }
    }
    None
}

pub struct RecordingSink {
    pub shown: Vec<Notification>,
    enabled: bool,
}

impl RecordingSink {
    pub fn enabled() -> Self {
        Self {
            shown: Vec::new(),
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            shown: Vec::new(),
            enabled: false,
        }
    }
}

impl NotificationSink for RecordingSink {
    fn notifications_enabled(&self) -> bool {
        self.enabled
    }

    fn show(&mut self, notification: &Notification) {
        self.shown.push(notification.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StoredValue {
    Int(i32),
    Bool(bool),
}

/// In-memory store; clones share the same values
#[derive(Clone, Default)]
pub struct MemorySettingsStore {
    values: Arc<Mutex<HashMap<String, StoredValue>>>,
    broken: bool,
}

impl MemorySettingsStore {
    /// Every read and write fails
    pub fn broken() -> Self {
        Self {
            values: Arc::default(),
            broken: true,
        }
    }

    pub fn put_i32(&self, key: &str, value: i32) {
        self.values.lock().insert(key.to_string(), StoredValue::Int(value));
    }

    pub fn put_bool(&self, key: &str, value: bool) {
        self.values.lock().insert(key.to_string(), StoredValue::Bool(value));
    }

    pub fn raw_i32(&self, key: &str) -> Option<i32> {
        match self.values.lock().get(key) {
            Some(StoredValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn raw_bool(&self, key: &str) -> Option<bool> {
        match self.values.lock().get(key) {
            Some(StoredValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.broken {
            Err(SettingsError::Unavailable("store is broken".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_i32(&self, key: &str) -> Result<Option<i32>, SettingsError> {
        self.check()?;
        match self.values.lock().get(key) {
            None => Ok(None),
            Some(StoredValue::Int(n)) => Ok(Some(*n)),
            Some(_) => Err(SettingsError::InvalidValue { key: key.to_string() }),
        }
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), SettingsError> {
        self.check()?;
        self.put_i32(key, value);
        Ok(())
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, SettingsError> {
        self.check()?;
        match self.values.lock().get(key) {
            None => Ok(None),
            Some(StoredValue::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(SettingsError::InvalidValue { key: key.to_string() }),
        }
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<(), SettingsError> {
        self.check()?;
        self.put_bool(key, value);
        Ok(())
    }
}

/// Clock that only moves when told to
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Succeeds on every target unless an outcome has been queued
#[derive(Clone, Default)]
pub struct ScriptedApplier {
    calls: Arc<Mutex<Vec<(ProfileKind, MonitorSelection)>>>,
    outcomes: Arc<Mutex<VecDeque<ExecutionOutcome>>>,
}

impl ScriptedApplier {
    pub fn push_outcome(&self, outcome: ExecutionOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(ProfileKind, MonitorSelection)> {
        self.calls.lock().clone()
    }
}

impl ProfileApplier for ScriptedApplier {
    fn apply(
        &self,
        kind: ProfileKind,
        selection: MonitorSelection,
        catalog: &MonitorCatalog,
    ) -> ExecutionOutcome {
        self.calls.lock().push((kind, selection));
        self.outcomes.lock().pop_front().unwrap_or_else(|| ExecutionOutcome {
            succeeded_monitors: resolve_targets(selection, catalog).into_iter().collect(),
            ..ExecutionOutcome::default()
        })
    }
}

#[derive(Default)]
struct SurfaceLog {
    notifications: Vec<Notification>,
    alerts: Vec<(String, String)>,
    statuses: Vec<TrayStatus>,
    hide_calls: usize,
}

#[derive(Clone, Default)]
pub struct RecordingSurface {
    log: Arc<Mutex<SurfaceLog>>,
}

impl RecordingSurface {
    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().notifications.clone()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.log.lock().alerts.clone()
    }

    pub fn statuses(&self) -> Vec<TrayStatus> {
        self.log.lock().statuses.clone()
    }

    pub fn last_status(&self) -> Option<TrayStatus> {
        self.log.lock().statuses.last().cloned()
    }

    pub fn hide_calls(&self) -> usize {
        self.log.lock().hide_calls
    }
}

impl TraySurface for RecordingSurface {
    fn show_notification(&mut self, notification: &Notification) {
        self.log.lock().notifications.push(notification.clone());
    }

    fn show_alert(&mut self, title: &str, message: &str) {
        self.log
            .lock()
            .alerts
            .push((title.to_string(), message.to_string()));
    }

    fn update_status(&mut self, status: &TrayStatus) {
        self.log.lock().statuses.push(status.clone());
    }

    fn hide(&mut self) {
        self.log.lock().hide_calls += 1;
    }
}

#[derive(Clone)]
pub struct FakeHotkeys {
    statuses: Vec<BindingStatus>,
    counts: Arc<Mutex<(usize, usize)>>,
}

impl FakeHotkeys {
    pub fn all_registered() -> Self {
        Self::with_statuses(
            HotkeyBinding::ALL
                .iter()
                .zip(["Alt+F1", "Alt+F2"])
                .map(|(&binding, chord)| BindingStatus {
                    binding,
                    chord: chord.to_string(),
                    registered: true,
                })
                .collect(),
        )
    }

    pub fn with_statuses(statuses: Vec<BindingStatus>) -> Self {
        Self {
            statuses,
            counts: Arc::default(),
        }
    }

    pub fn register_calls(&self) -> usize {
        self.counts.lock().0
    }

    pub fn unregister_calls(&self) -> usize {
        self.counts.lock().1
    }
}

impl HotkeyRegistrar for FakeHotkeys {
    fn register(&mut self) -> Vec<BindingStatus> {
        self.counts.lock().0 += 1;
        self.statuses.clone()
    }

    fn unregister(&mut self) {
        self.counts.lock().1 += 1;
    }
}

#[derive(Default)]
pub struct FakeStartup {
    enabled: bool,
}

impl StartupRegistration for FakeStartup {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<StartupChange, SettingsError> {
        let change = match (self.enabled, enabled) {
            (false, true) => StartupChange::Enabled,
            (true, false) => StartupChange::Disabled,
            _ => StartupChange::Unchanged,
        };
        self.enabled = enabled;
        Ok(change)
    }
}
