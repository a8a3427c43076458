//! HDRGammaFix - System Tray Process
//!
//! This process manages:
//! - System tray icon with context menu (right-click) and toggle (left-click)
//! - Global hotkeys for the two profiles
//! - The toggle engine, driven from the Win32 message loop on one thread

#![windows_subsystem = "windows"]
#![cfg_attr(not(windows), allow(dead_code))]

mod hotkeys;
mod logging;
#[cfg(windows)]
mod registry;
mod tray;

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    app::run()
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("HDRGammaFix only runs on Windows")
}

#[cfg(windows)]
mod app {
    use crate::hotkeys::{HotkeyDispatcher, HotkeyRouter};
    use crate::registry::{RegistrySettingsStore, RunKeyStartup};
    use crate::tray::{self, MenuIds, MenuLabels, TrayManager};
    use crate::logging;
    use anyhow::{Context, Result};
    use crossbeam_channel::Receiver;
    use global_hotkey::GlobalHotKeyEvent;
    use hdr_gamma_fix_core::clock::SystemClock;
    use hdr_gamma_fix_core::config;
    use hdr_gamma_fix_core::engine::{
        Collaborators, EngineEvent, EngineOptions, EventQueue, ToggleEngine,
    };
    use hdr_gamma_fix_core::executor::{ProfileExecutor, ToolSettings};
    use hdr_gamma_fix_core::hotkey::HotkeyBinding;
    use hdr_gamma_fix_core::locator::ToolLocator;
    use hdr_gamma_fix_core::monitor::MonitorCatalog;
    use hdr_gamma_fix_core::process::{ProcessRunner, SystemProcessRunner};
    use hdr_gamma_fix_core::settings::{
        JsonSettingsStore, NoStartupRegistration, SettingsStore, StartupRegistration,
    };
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tray_icon::menu::MenuEvent;
    use tray_icon::TrayIconEvent;
    use windows::Win32::UI::WindowsAndMessaging::*;

    /// Upper bound on the loop sleep
    const POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Everything that turns into engine events
    struct EventSources {
        tray_rx: Receiver<TrayIconEvent>,
        menu_rx: Receiver<MenuEvent>,
        hotkey_rx: Receiver<GlobalHotKeyEvent>,
        menu_ids: MenuIds,
        hotkeys: HotkeyRouter,
    }

    impl EventSources {
        fn collect(&self, engine: &ToggleEngine) -> Vec<EngineEvent> {
            let status = engine.status();
            let mut events = Vec::new();

            for event in self.tray_rx.try_iter() {
                events.extend(tray::click_event(&event));
            }
            for event in self.menu_rx.try_iter() {
                events.extend(self.menu_ids.event_for(&event.id, &status));
            }
            for event in self.hotkey_rx.try_iter() {
                events.extend(self.hotkeys.event_for(&event));
            }

            events
        }
    }

    pub fn run() -> Result<()> {
        let app_config = config::load_config();
        let _log_guard = logging::init(app_config.debug_logging);

        tracing::info!("HDRGammaFix starting...");

        // First run: leave an editable config.json behind
        if matches!(config::config_path(), Ok(path) if !path.exists()) {
            if let Err(e) = config::save_config(&app_config) {
                tracing::warn!("Could not write default config: {}", e);
            }
        }

        let locator = ToolLocator::for_current_exe();
        let process_runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner);

        let catalog = MonitorCatalog::discover(
            &locator,
            process_runner.as_ref(),
            &app_config.calibration_tool,
            app_config.discovery_timeout(),
        );
        tracing::info!("Discovered {} monitor(s)", catalog.len());

        let dispatcher = HotkeyDispatcher::new(&app_config.apply_hotkey, &app_config.revert_hotkey);
        let router = dispatcher.router();

        let tray = TrayManager::new(
            &catalog,
            MenuLabels {
                apply_chord: dispatcher.chord_text(HotkeyBinding::ApplyCorrected),
                revert_chord: dispatcher.chord_text(HotkeyBinding::RevertDefault),
            },
        )
        .context("Failed to create tray manager")?;
        let menu_ids = tray.menu_ids();

        let sources = install_event_handlers(menu_ids, router);

        let executor = ProfileExecutor::new(
            locator,
            process_runner,
            ToolSettings::from(&app_config),
        );

        let mut engine = ToggleEngine::new(
            catalog,
            Collaborators {
                applier: Box::new(executor),
                settings: open_settings_store(),
                startup: open_startup_registration(),
                hotkeys: Box::new(dispatcher),
                surface: Box::new(tray),
                clock: Box::new(SystemClock),
            },
            EngineOptions::from(&app_config),
        );

        engine.start();

        tracing::info!("Engine started, entering message loop");
        run_message_loop(&mut engine, &sources);

        engine.shutdown();
        tracing::info!("HDRGammaFix exiting");
        Ok(())
    }

    fn install_event_handlers(menu_ids: MenuIds, hotkeys: HotkeyRouter) -> EventSources {
        let (tray_tx, tray_rx) = crossbeam_channel::unbounded();
        let (menu_tx, menu_rx) = crossbeam_channel::unbounded();
        let (hotkey_tx, hotkey_rx) = crossbeam_channel::unbounded();

        TrayIconEvent::set_event_handler(Some(move |event| {
            tracing::debug!("Tray event: {:?}", event);
            let _ = tray_tx.send(event);
        }));

        MenuEvent::set_event_handler(Some(move |event| {
            tracing::debug!("Menu event: {:?}", event);
            let _ = menu_tx.send(event);
        }));

        GlobalHotKeyEvent::set_event_handler(Some(move |event| {
            tracing::debug!("Hotkey event: {:?}", event);
            let _ = hotkey_tx.send(event);
        }));

        EventSources {
            tray_rx,
            menu_rx,
            hotkey_rx,
            menu_ids,
            hotkeys,
        }
    }

    /// Registry first, then a JSON file in the data directory
    fn open_settings_store() -> Box<dyn SettingsStore> {
        match RegistrySettingsStore::open() {
            Ok(store) => return Box::new(store),
            Err(e) => tracing::warn!("Registry settings unavailable: {}", e),
        }
        match JsonSettingsStore::in_data_dir() {
            Ok(store) => {
                tracing::info!("Using settings file {}", store.path().display());
                Box::new(store)
            }
            Err(e) => {
                tracing::warn!("Data directory unavailable, keeping settings in the temp directory: {}", e);
                Box::new(JsonSettingsStore::open(
                    std::env::temp_dir().join("HDRGammaFix-settings.json"),
                ))
            }
        }
    }

    fn open_startup_registration() -> Box<dyn StartupRegistration> {
        match RunKeyStartup::for_current_exe() {
            Ok(startup) => Box::new(startup),
            Err(e) => {
                tracing::warn!("Run at startup unavailable: {}", e);
                Box::new(NoStartupRegistration)
            }
        }
    }

    /// Pump pending Win32 messages. Returns false once WM_QUIT arrives.
    fn pump_messages() -> bool {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    tracing::info!("WM_QUIT received, exiting");
                    return false;
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        true
    }

    fn run_message_loop(engine: &mut ToggleEngine, sources: &EventSources) {
        let mut pending = EventQueue::default();

        loop {
            // Pump Windows messages (required for tray icon and hotkey events)
            if !pump_messages() {
                return;
            }

            pending.extend(sources.collect(engine));

            // Messages that queued up while the tool ran are pumped right after it
            let running = engine.drain(&mut pending, |engine| {
                pump_messages().then(|| sources.collect(engine))
            });
            if !running {
                return;
            }

            engine.tick();

            // Sleep until the debounce deadline, never longer than the poll interval
            let sleep = engine
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .map_or(POLL_INTERVAL, |until| until.min(POLL_INTERVAL));
            std::thread::sleep(sleep);
        }
    }
}
