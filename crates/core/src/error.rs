//! Error types for the core library
//!
//! Process, execution and settings failures each get their own enum so the
//! engine can tell a per-monitor failure from a missing tool.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure while spawning or waiting on an external process
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The process could not be started at all
    #[error("Failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process did not exit within its bound and was killed
    #[error("{} did not finish within {timeout:?}", program.display())]
    TimedOut { program: PathBuf, timeout: Duration },

    /// Waiting on the child failed
    #[error("Failed to wait on {}: {source}", program.display())]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading captured output failed
    #[error("Failed to read output of {}: {source}", program.display())]
    Output {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure that aborts a whole profile application
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Neither the calibration tool nor the fallback script exists
    #[error("Could not find {tool}")]
    ToolNotFound { tool: String, searched: Vec<PathBuf> },
}

/// Failure of the preference store
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings store unavailable: {0}")]
    Unavailable(String),

    #[error("Setting {key} holds a value of the wrong type")]
    InvalidValue { key: String },
}
