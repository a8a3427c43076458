//! Tray icon, context menu and user-facing messages
//!
//! The tray never changes state on its own: menu clicks are translated into
//! engine events, and the icon, tooltip and check marks are redrawn from the
//! `TrayStatus` the engine publishes afterwards.

use anyhow::{anyhow, Result};
use hdr_gamma_fix_core::engine::{EngineEvent, ProfileState, TrayStatus, TraySurface};
use hdr_gamma_fix_core::executor::ProfileKind;
use hdr_gamma_fix_core::monitor::{MonitorCatalog, MonitorSelection};
use hdr_gamma_fix_core::notify::{Notification, Severity};
use rfd::{MessageButtons, MessageDialog, MessageLevel};
use std::path::{Path, PathBuf};
use tray_icon::menu::{CheckMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem, Submenu};
use tray_icon::{Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};

const ICON_SIZE: u32 = 32;
const RESOURCES_DIR: &str = "Resources";

/// Load an .ico next to the executable, falling back to a solid square
fn load_icon(file_name: &str, fallback_rgba: [u8; 4]) -> Result<Icon> {
    let path = resource_path(file_name);

    match decode_icon(&path) {
        Ok(icon) => return Ok(icon),
        Err(e) => tracing::warn!("Using fallback for {}: {}", path.display(), e),
    }

    let icon_rgba: Vec<u8> = (0..ICON_SIZE * ICON_SIZE)
        .flat_map(|_| fallback_rgba)
        .collect();
    Icon::from_rgba(icon_rgba, ICON_SIZE, ICON_SIZE)
        .map_err(|e| anyhow!("Failed to create fallback icon: {:?}", e))
}

fn resource_path(file_name: &str) -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(RESOURCES_DIR)
        .join(file_name)
}

fn decode_icon(path: &Path) -> Result<Icon> {
    let icon_data = std::fs::read(path).map_err(|e| anyhow!("Failed to read icon: {}", e))?;

    // Decode with image crate
    let img = image::load_from_memory(&icon_data)
        .map_err(|e| anyhow!("Failed to decode icon: {}", e))?;

    let img = img.resize_exact(ICON_SIZE, ICON_SIZE, image::imageops::FilterType::Lanczos3);
    let rgba = img.to_rgba8();

    Icon::from_rgba(rgba.into_raw(), ICON_SIZE, ICON_SIZE)
        .map_err(|e| anyhow!("Failed to create icon from image: {:?}", e))
}

/// Left click on the icon toggles
pub fn click_event(event: &TrayIconEvent) -> Option<EngineEvent> {
    match event {
        TrayIconEvent::Click {
            button: MouseButton::Left,
            button_state: MouseButtonState::Up,
            ..
        } => Some(EngineEvent::ToggleRequested),
        _ => None,
    }
}

/// Menu ids, detached from the menu so the message loop can map clicks
/// after the tray itself has been handed to the engine
#[derive(Debug, Clone)]
pub struct MenuIds {
    pub apply: MenuId,
    pub revert: MenuId,
    pub run_at_startup: MenuId,
    pub all_monitors: MenuId,
    pub monitors: Vec<(MenuId, u32)>,
    pub notifications: MenuId,
    pub exit: MenuId,
}

impl MenuIds {
    /// Check items flip relative to the engine's status, not the menu's own
    /// check mark, which Windows toggles before we see the click
    pub fn event_for(&self, id: &MenuId, status: &TrayStatus) -> Option<EngineEvent> {
        if *id == self.apply {
            Some(EngineEvent::ProfileRequested(ProfileKind::ToCorrected))
        } else if *id == self.revert {
            Some(EngineEvent::ProfileRequested(ProfileKind::ToDefault))
        } else if *id == self.run_at_startup {
            Some(EngineEvent::RunAtStartupToggled(!status.run_at_startup))
        } else if *id == self.notifications {
            Some(EngineEvent::NotificationsToggled(!status.notifications_enabled))
        } else if *id == self.all_monitors {
            Some(EngineEvent::MonitorSelectionChanged(MonitorSelection::All))
        } else if *id == self.exit {
            Some(EngineEvent::Shutdown)
        } else {
            self.monitors
                .iter()
                .find(|(item_id, _)| item_id == id)
                .map(|&(_, n)| EngineEvent::MonitorSelectionChanged(MonitorSelection::Display(n)))
        }
    }
}

/// Labels for the two profile items, e.g. `Alt+F1`
pub struct MenuLabels<'a> {
    pub apply_chord: &'a str,
    pub revert_chord: &'a str,
}

pub struct TrayManager {
    tray_icon: TrayIcon,
    default_icon: Icon,
    corrected_icon: Icon,
    startup_item: CheckMenuItem,
    notifications_item: CheckMenuItem,
    all_monitors_item: CheckMenuItem,
    monitor_items: Vec<(u32, CheckMenuItem)>,
    ids: MenuIds,
}

impl TrayManager {
    pub fn new(catalog: &MonitorCatalog, labels: MenuLabels<'_>) -> Result<Self> {
        tracing::info!("Creating tray icon");

        let default_icon = load_icon("DefaultIcon.ico", [0x80, 0x80, 0x80, 0xFF])?;
        let corrected_icon = load_icon("GammaIcon.ico", [0xFF, 0x8C, 0x00, 0xFF])?;

        // Create context menu (appears on right-click)
        let menu = Menu::new();
        let apply_item = MenuItem::new(
            format!("Apply sRGB to Gamma ({})", labels.apply_chord),
            true,
            None,
        );
        let revert_item = MenuItem::new(
            format!("Revert to Default ({})", labels.revert_chord),
            true,
            None,
        );
        let startup_item = CheckMenuItem::new("Run at Startup", true, false, None);

        let monitor_menu = Submenu::new("Apply to Monitor", true);
        let all_monitors_item = CheckMenuItem::new("All Monitors", true, true, None);
        monitor_menu
            .append(&all_monitors_item)
            .map_err(|e| anyhow!("Failed to add monitor item: {}", e))?;
        monitor_menu
            .append(&PredefinedMenuItem::separator())
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;

        let mut monitor_items = Vec::with_capacity(catalog.len());
        for monitor in catalog.iter() {
            let item = CheckMenuItem::new(&monitor.display_name, monitor.is_usable, false, None);
            monitor_menu
                .append(&item)
                .map_err(|e| anyhow!("Failed to add monitor item: {}", e))?;
            monitor_items.push((monitor.display_number, item));
        }

        let notifications_item = CheckMenuItem::new("Show Notifications", true, true, None);
        let exit_item = MenuItem::new("Exit", true, None);

        menu.append(&apply_item)
            .map_err(|e| anyhow!("Failed to add apply item: {}", e))?;
        menu.append(&revert_item)
            .map_err(|e| anyhow!("Failed to add revert item: {}", e))?;
        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
        menu.append(&startup_item)
            .map_err(|e| anyhow!("Failed to add startup item: {}", e))?;
        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
        menu.append(&monitor_menu)
            .map_err(|e| anyhow!("Failed to add monitor submenu: {}", e))?;
        menu.append(&notifications_item)
            .map_err(|e| anyhow!("Failed to add notifications item: {}", e))?;
        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
        menu.append(&exit_item)
            .map_err(|e| anyhow!("Failed to add exit item: {}", e))?;

        // Store menu IDs for event handling
        let ids = MenuIds {
            apply: apply_item.id().clone(),
            revert: revert_item.id().clone(),
            run_at_startup: startup_item.id().clone(),
            all_monitors: all_monitors_item.id().clone(),
            monitors: monitor_items
                .iter()
                .map(|(n, item)| (item.id().clone(), *n))
                .collect(),
            notifications: notifications_item.id().clone(),
            exit: exit_item.id().clone(),
        };

        let tray_icon = TrayIconBuilder::new()
            .with_tooltip("HDR Gamma Fix")
            .with_icon(default_icon.clone())
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| anyhow!("Failed to create tray icon: {}", e))?;

        tracing::info!("Tray icon created with {} monitor entries", monitor_items.len());

        Ok(Self {
            tray_icon,
            default_icon,
            corrected_icon,
            startup_item,
            notifications_item,
            all_monitors_item,
            monitor_items,
            ids,
        })
    }

    pub fn menu_ids(&self) -> MenuIds {
        self.ids.clone()
    }
}

impl TraySurface for TrayManager {
    fn show_notification(&mut self, notification: &Notification) {
        let timeout = match notification.severity {
            Severity::Info => notify_rust::Timeout::Milliseconds(3000),
            Severity::Warning | Severity::Error => notify_rust::Timeout::Milliseconds(5000),
        };
        if let Err(e) = notify_rust::Notification::new()
            .summary(&notification.title)
            .body(&notification.message)
            .timeout(timeout)
            .show()
        {
            tracing::warn!("Failed to show notification: {}", e);
        }
    }

    fn show_alert(&mut self, title: &str, message: &str) {
        let _ = MessageDialog::new()
            .set_level(MessageLevel::Error)
            .set_title(title)
            .set_description(message)
            .set_buttons(MessageButtons::Ok)
            .show();
    }

    fn update_status(&mut self, status: &TrayStatus) {
        let icon = match status.state {
            ProfileState::Default => self.default_icon.clone(),
            ProfileState::Corrected => self.corrected_icon.clone(),
        };
        if let Err(e) = self.tray_icon.set_icon(Some(icon)) {
            tracing::warn!("Failed to update tray icon: {}", e);
        }
        let _ = self.tray_icon.set_tooltip(Some(&status.tooltip));

        self.startup_item.set_checked(status.run_at_startup);
        self.notifications_item.set_checked(status.notifications_enabled);
        self.all_monitors_item
            .set_checked(status.selection == MonitorSelection::All);
        for (n, item) in &self.monitor_items {
            item.set_checked(status.selection == MonitorSelection::Display(*n));
        }
    }

    fn hide(&mut self) {
        if let Err(e) = self.tray_icon.set_visible(false) {
            tracing::warn!("Failed to hide tray icon: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> MenuIds {
        MenuIds {
            apply: MenuId::new("apply"),
            revert: MenuId::new("revert"),
            run_at_startup: MenuId::new("startup"),
            all_monitors: MenuId::new("all"),
            monitors: vec![(MenuId::new("m1"), 1), (MenuId::new("m2"), 2)],
            notifications: MenuId::new("notifications"),
            exit: MenuId::new("exit"),
        }
    }

    fn status() -> TrayStatus {
        TrayStatus {
            state: ProfileState::Default,
            selection: MonitorSelection::All,
            tooltip: "HDR Gamma Fix: Default (All Monitors)".to_string(),
            notifications_enabled: true,
            run_at_startup: false,
        }
    }

    #[test]
    fn test_profile_items_are_directional() {
        let ids = ids();
        assert_eq!(
            ids.event_for(&MenuId::new("apply"), &status()),
            Some(EngineEvent::ProfileRequested(ProfileKind::ToCorrected))
        );
        assert_eq!(
            ids.event_for(&MenuId::new("revert"), &status()),
            Some(EngineEvent::ProfileRequested(ProfileKind::ToDefault))
        );
    }

    #[test]
    fn test_check_items_flip_engine_status() {
        let ids = ids();
        assert_eq!(
            ids.event_for(&MenuId::new("notifications"), &status()),
            Some(EngineEvent::NotificationsToggled(false))
        );
        assert_eq!(
            ids.event_for(&MenuId::new("startup"), &status()),
            Some(EngineEvent::RunAtStartupToggled(true))
        );
    }

    #[test]
    fn test_monitor_items_and_exit() {
        let ids = ids();
        assert_eq!(
            ids.event_for(&MenuId::new("m2"), &status()),
            Some(EngineEvent::MonitorSelectionChanged(MonitorSelection::Display(2)))
        );
        assert_eq!(
            ids.event_for(&MenuId::new("all"), &status()),
            Some(EngineEvent::MonitorSelectionChanged(MonitorSelection::All))
        );
        assert_eq!(
            ids.event_for(&MenuId::new("exit"), &status()),
            Some(EngineEvent::Shutdown)
        );
        assert_eq!(ids.event_for(&MenuId::new("other"), &status()), None);
    }
}
