//! Global shortcut bindings
//!
//! The OS-facing registration lives in the runner; the engine only sees the
//! [`HotkeyRegistrar`] seam so registration failures flow through the same
//! notification path as everything else.

use crate::executor::ProfileKind;
use std::fmt;

/// Identity of a global shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyBinding {
    /// Switch to the corrected profile
    ApplyCorrected,
    /// Switch back to the default profile
    RevertDefault,
}

impl HotkeyBinding {
    pub const ALL: [HotkeyBinding; 2] = [HotkeyBinding::ApplyCorrected, HotkeyBinding::RevertDefault];

    pub fn profile_kind(self) -> ProfileKind {
        match self {
            HotkeyBinding::ApplyCorrected => ProfileKind::ToCorrected,
            HotkeyBinding::RevertDefault => ProfileKind::ToDefault,
        }
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotkeyBinding::ApplyCorrected => write!(f, "apply corrected"),
            HotkeyBinding::RevertDefault => write!(f, "revert to default"),
        }
    }
}

/// Result of registering one binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingStatus {
    pub binding: HotkeyBinding,
    /// Human readable chord, e.g. `Alt+F1`
    pub chord: String,
    pub registered: bool,
}

pub trait HotkeyRegistrar {
    /// Register both bindings with the OS, reporting each one separately
    fn register(&mut self) -> Vec<BindingStatus>;

    /// Release every registration. Safe to call repeatedly or before `register`.
    fn unregister(&mut self);
}

