//! HDR Gamma Fix Core Library
//!
//! Everything that does not need a window: monitor discovery, the calibration
//! tool invocation, notification debouncing, preferences and the toggle engine.
//!
//! Architecture:
//! - Runner process owns the tray icon, global hotkeys and the message loop
//! - Runner feeds `engine::EngineEvent`s to the `ToggleEngine` on one thread
//! - The engine reaches the OS only through the traits defined here

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod hotkey;
pub mod locator;
pub mod monitor;
pub mod notify;
pub mod process;
pub mod settings;

#[cfg(test)]
mod testing;

pub use engine::{EngineEvent, ProfileState, ToggleEngine};
pub use executor::ProfileKind;
pub use monitor::{MonitorCatalog, MonitorSelection};
