//! Monitor discovery
//!
//! The calibration tool prints its display list as part of its usage text,
//! one line per display:
//!
//! ```text
//!     1 = 'DISPLAY1, at 0, 0, width 2560, height 1440 (Primary Display)'
//!     2 = 'DISPLAY2, at 2560, 0, width 1920, height 1080'
//! ```
//!
//! [`MonitorCatalog::discover`] runs the tool, parses those lines and degrades
//! to a single synthetic primary monitor whenever anything goes wrong.

use crate::locator::ToolLocator;
use crate::process::{Invocation, ProcessRunner};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Flag that makes the tool print its usage text, including the display list
pub const DISCOVERY_FLAG: &str = "-?";

static LISTING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*=\s*'([^']+)'").expect("listing pattern is valid"));

/// A display addressable by the calibration tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    /// Index understood by the tool's `-d` flag
    pub display_number: u32,
    pub display_name: String,
    pub is_usable: bool,
}

impl Monitor {
    pub fn new(display_number: u32, display_name: impl Into<String>, is_usable: bool) -> Self {
        Self {
            display_number,
            display_name: display_name.into(),
            is_usable,
        }
    }

    /// The entry used when nothing could be discovered
    pub fn fallback() -> Self {
        Self::new(1, "Primary Monitor", true)
    }
}

/// Which monitors a profile change targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorSelection {
    /// Every monitor in the catalog
    #[default]
    All,
    /// A single display number
    Display(u32),
}

impl MonitorSelection {
    /// Persisted value meaning "all monitors"
    pub const ALL_RAW: i32 = -1;

    /// Decode a persisted value; anything not positive means all monitors
    pub fn from_raw(raw: i32) -> Self {
        if raw > 0 {
            MonitorSelection::Display(raw as u32)
        } else {
            MonitorSelection::All
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            MonitorSelection::All => Self::ALL_RAW,
            MonitorSelection::Display(n) => i32::try_from(n).unwrap_or(Self::ALL_RAW),
        }
    }
}

impl fmt::Display for MonitorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorSelection::All => write!(f, "all monitors"),
            MonitorSelection::Display(n) => write!(f, "monitor {}", n),
        }
    }
}

/// Ordered, never-empty list of discovered monitors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorCatalog {
    monitors: Vec<Monitor>,
}

impl MonitorCatalog {
    /// Build from parsed monitors, substituting the fallback if there are none
    pub fn new(monitors: Vec<Monitor>) -> Self {
        if monitors.is_empty() {
            Self::fallback()
        } else {
            Self { monitors }
        }
    }

    pub fn fallback() -> Self {
        Self {
            monitors: vec![Monitor::fallback()],
        }
    }

    /// Run the tool's listing and parse it. Never fails.
    pub fn discover(
        locator: &ToolLocator,
        runner: &dyn ProcessRunner,
        tool_name: &str,
        timeout: Duration,
    ) -> Self {
        let Some(tool) = locator.find_tool(tool_name) else {
            warn!(
                "{} not found under {}, assuming a single monitor",
                tool_name,
                locator.base_dir().display()
            );
            return Self::fallback();
        };

        let mut invocation = Invocation::new(&tool).arg(DISCOVERY_FLAG);
        if let Some(dir) = tool.parent() {
            invocation = invocation.current_dir(dir);
        }

        match runner.capture(&invocation, timeout) {
            Ok(output) => {
                let catalog = Self::from_listing(&output);
                info!("Discovered {} monitor(s)", catalog.len());
                catalog
            }
            Err(e) => {
                warn!("Monitor discovery failed, assuming a single monitor: {}", e);
                Self::fallback()
            }
        }
    }

    pub fn from_listing(output: &str) -> Self {
        let monitors = parse_listing(output);
        if monitors.is_empty() {
            debug!("No monitor lines in discovery output");
        }
        Self::new(monitors)
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn iter(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.iter()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn get(&self, display_number: u32) -> Option<&Monitor> {
        self.monitors
            .iter()
            .find(|m| m.display_number == display_number)
    }

    pub fn contains(&self, display_number: u32) -> bool {
        self.get(display_number).is_some()
    }

    pub fn display_numbers(&self) -> Vec<u32> {
        self.monitors.iter().map(|m| m.display_number).collect()
    }

    /// The monitor a selection points at, if it is still present
    pub fn resolve(&self, selection: MonitorSelection) -> Option<&Monitor> {
        match selection {
            MonitorSelection::All => None,
            MonitorSelection::Display(n) => self.get(n),
        }
    }

    /// Suffix used in tooltips and notifications, e.g. ` (All Monitors)`.
    /// A stale selection executes against every monitor, so it reads as such.
    pub fn scope_text(&self, selection: MonitorSelection) -> String {
        match self.resolve(selection) {
            Some(monitor) => format!(" ({})", monitor.display_name),
            None => " (All Monitors)".to_string(),
        }
    }
}

/// Parse the tool's display listing. Unrecognised lines are skipped, as are
/// zero and repeated display numbers.
pub fn parse_listing(output: &str) -> Vec<Monitor> {
    let mut seen = HashSet::new();
    let mut monitors = Vec::new();

    for line in output.lines() {
        let Some(caps) = LISTING_LINE.captures(line.trim()) else {
            continue;
        };

        let Ok(number) = caps[1].parse::<i32>() else {
            debug!("Skipping listing line with out-of-range number: {}", line.trim());
            continue;
        };
        if number <= 0 || !seen.insert(number) {
            continue;
        }

        let description = &caps[2];
        let mut display_name = format!("Monitor {}", number);
        if description.contains("Primary") {
            display_name.push_str(" (Primary)");
        }

        monitors.push(Monitor::new(number as u32, display_name, true));
    }

    monitors
}
