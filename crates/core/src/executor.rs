//! Profile Executor - applies a calibration profile to monitors
//!
//! Runs the calibration tool once per target monitor, strictly one after the
//! other, and folds the per-monitor results into a single [`ExecutionOutcome`].
//! A failing monitor never stops the remaining ones.

use crate::config::AppConfig;
use crate::error::ExecutionError;
use crate::locator::ToolLocator;
use crate::monitor::{MonitorCatalog, MonitorSelection};
use crate::process::{Invocation, ProcessRunner};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reference bound on a single tool invocation
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Which direction a profile change goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    /// Load the correction curve
    ToCorrected,
    /// Clear the calibration back to linear
    ToDefault,
}

impl ProfileKind {
    /// Name of the profile this kind ends up in
    pub fn profile_name(self) -> &'static str {
        match self {
            ProfileKind::ToCorrected => "sRGB to Gamma",
            ProfileKind::ToDefault => "Default",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::ToCorrected => write!(f, "apply {}", self.profile_name()),
            ProfileKind::ToDefault => write!(f, "revert to {}", self.profile_name()),
        }
    }
}

/// File names and limits used when invoking the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub calibration_tool: String,
    /// Curve file loaded by `ToCorrected`, resolved next to the tool
    pub calibration_file: String,
    pub apply_script: String,
    pub revert_script: String,
    pub timeout: Duration,
}

impl ToolSettings {
    pub fn script_for(&self, kind: ProfileKind) -> &str {
        match kind {
            ProfileKind::ToCorrected => &self.apply_script,
            ProfileKind::ToDefault => &self.revert_script,
        }
    }
}

impl From<&AppConfig> for ToolSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            calibration_tool: config.calibration_tool.clone(),
            calibration_file: config.calibration_file.clone(),
            apply_script: config.apply_script.clone(),
            revert_script: config.revert_script.clone(),
            timeout: config.tool_timeout(),
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Aggregated result of one `apply` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub succeeded_monitors: BTreeSet<u32>,
    pub failed_monitors: BTreeSet<u32>,
    /// Set only when nothing could be run at all
    pub fatal_error: Option<ExecutionError>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.fatal_error.is_none() && self.failed_monitors.is_empty()
    }

    /// Number of monitors the call targeted
    pub fn attempted(&self) -> usize {
        self.succeeded_monitors.len() + self.failed_monitors.len()
    }

    fn record(&mut self, display_number: u32, succeeded: bool) {
        if succeeded {
            self.succeeded_monitors.insert(display_number);
        } else {
            self.failed_monitors.insert(display_number);
        }
    }
}

/// Applies a profile to the selected monitors
pub trait ProfileApplier {
    fn apply(
        &self,
        kind: ProfileKind,
        selection: MonitorSelection,
        catalog: &MonitorCatalog,
    ) -> ExecutionOutcome;
}

/// Display numbers a selection resolves to. A selection that no longer
/// matches any monitor falls back to all of them.
pub fn resolve_targets(selection: MonitorSelection, catalog: &MonitorCatalog) -> Vec<u32> {
    match selection {
        MonitorSelection::All => catalog.display_numbers(),
        MonitorSelection::Display(n) if catalog.contains(n) => vec![n],
        MonitorSelection::Display(n) => {
            warn!("Monitor {} is no longer present, applying to all monitors", n);
            catalog.display_numbers()
        }
    }
}

/// [`ProfileApplier`] backed by the external calibration tool
pub struct ProfileExecutor {
    locator: ToolLocator,
    runner: Arc<dyn ProcessRunner>,
    tools: ToolSettings,
}

impl ProfileExecutor {
    pub fn new(locator: ToolLocator, runner: Arc<dyn ProcessRunner>, tools: ToolSettings) -> Self {
        Self {
            locator,
            runner,
            tools,
        }
    }

    /// Command line for one monitor:
    /// `<tool> -d <n> <calfile>` to apply, `<tool> -d <n> -c` to clear
    pub fn monitor_invocation(&self, kind: ProfileKind, tool: &Path, display_number: u32) -> Invocation {
        let working_dir = tool
            .parent()
            .unwrap_or_else(|| self.locator.base_dir())
            .to_path_buf();

        let invocation = Invocation::new(tool)
            .arg("-d")
            .arg(display_number.to_string());

        let invocation = match kind {
            ProfileKind::ToCorrected => {
                invocation.arg(working_dir.join(&self.tools.calibration_file))
            }
            ProfileKind::ToDefault => invocation.arg("-c"),
        };

        invocation.current_dir(working_dir)
    }

    fn apply_per_monitor(&self, kind: ProfileKind, tool: &Path, targets: &[u32]) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome::default();

        for &display_number in targets {
            let invocation = self.monitor_invocation(kind, tool, display_number);
            let succeeded = self.invoke(&invocation, &format!("Monitor {}", display_number));
            outcome.record(display_number, succeeded);
        }

        outcome
    }

    /// Legacy path: a single script with no per-monitor targeting
    fn apply_script(&self, script: &Path, targets: &[u32]) -> ExecutionOutcome {
        info!("Calibration tool missing, running {}", script.display());

        let mut invocation = Invocation::new(script);
        if let Some(dir) = script.parent() {
            invocation = invocation.current_dir(dir);
        }

        let succeeded = self.invoke(&invocation, "Fallback script");
        let mut outcome = ExecutionOutcome::default();
        for &display_number in targets {
            outcome.record(display_number, succeeded);
        }
        outcome
    }

    fn invoke(&self, invocation: &Invocation, target: &str) -> bool {
        debug!(
            "Invoking {} {} ({})",
            invocation.program.display(),
            invocation.args_display(),
            target
        );

        match self.runner.run(invocation, self.tools.timeout) {
            Ok(Some(0)) => true,
            Ok(Some(code)) => {
                warn!("{}: tool exited with code {}", target, code);
                false
            }
            Ok(None) => {
                warn!("{}: tool terminated without exit code", target);
                false
            }
            Err(e) => {
                warn!("{}: {}", target, e);
                false
            }
        }
    }
}

impl ProfileApplier for ProfileExecutor {
    fn apply(
        &self,
        kind: ProfileKind,
        selection: MonitorSelection,
        catalog: &MonitorCatalog,
    ) -> ExecutionOutcome {
        let targets = resolve_targets(selection, catalog);
        info!("Request to {} on {:?}", kind, targets);

        if let Some(tool) = self.locator.find_tool(&self.tools.calibration_tool) {
            return self.apply_per_monitor(kind, &tool, &targets);
        }

        let script_name = self.tools.script_for(kind);
        if let Some(script) = self.locator.find_script(script_name) {
            return self.apply_script(&script, &targets);
        }

        let mut searched = self.locator.tool_candidates(&self.tools.calibration_tool);
        searched.extend(self.locator.script_candidates(script_name));
        error!(
            "Neither {} nor {} found, searched {:?}",
            self.tools.calibration_tool, script_name, searched
        );

        ExecutionOutcome {
            succeeded_monitors: BTreeSet::new(),
            failed_monitors: targets.into_iter().collect(),
            fatal_error: Some(ExecutionError::ToolNotFound {
                tool: self.tools.calibration_tool.clone(),
                searched,
            }),
        }
    }
}
