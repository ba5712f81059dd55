//! Process-wide application state
//!
//! [`ApplicationContext`] is built once by the bootstrap and shared as an
//! `Arc` with the loader, the forwarding listener and the shell. It owns the
//! resolved paths and one [`ConfigSlot`] per configuration document.

use std::path::Path;
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::backup::backup_file_weekly;
use crate::cli::ProcessMode;
use crate::config::{
    ApplicationConfig, HotkeysConfig, SettingsDocument, TaskSettings, UploadersConfig,
    save_document,
};
use crate::core::gate::LoadGate;
use crate::paths::PersonalPaths;
use crate::utils::error::AppResult;

/// A configuration document together with the gate announcing it.
///
/// The document is published before the gate opens, so an open gate always
/// means the document can be read. Consumers never see a half-loaded value.
#[derive(Debug)]
pub struct ConfigSlot<T> {
    document: OnceLock<RwLock<T>>,
    gate: LoadGate,
}

impl<T> Default for ConfigSlot<T> {
    fn default() -> Self {
        Self {
            document: OnceLock::new(),
            gate: LoadGate::new(),
        }
    }
}

impl<T> ConfigSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the loaded document and open the gate.
    ///
    /// Returns `false` if a document had already been published; the first
    /// one wins.
    pub fn publish(&self, document: T) -> bool {
        let fresh = self.document.set(RwLock::new(document)).is_ok();
        self.gate.set();
        fresh
    }

    pub fn gate(&self) -> &LoadGate {
        &self.gate
    }

    pub fn is_loaded(&self) -> bool {
        self.gate.is_set()
    }

    pub fn get(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.document
            .get()
            .map(|lock| lock.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get_mut(&self) -> Option<RwLockWriteGuard<'_, T>> {
        self.document
            .get()
            .map(|lock| lock.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Block until the document is published.
    pub fn wait(&self) -> RwLockReadGuard<'_, T> {
        loop {
            self.gate.wait();
            if let Some(document) = self.get() {
                return document;
            }
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<RwLockReadGuard<'_, T>> {
        if self.gate.wait_timeout(timeout) {
            self.get()
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub struct ApplicationContext {
    app_name: String,
    mode: ProcessMode,
    paths: PersonalPaths,
    started: Instant,
    pub settings: ConfigSlot<ApplicationConfig>,
    pub uploaders_config: ConfigSlot<UploadersConfig>,
    pub hotkeys_config: ConfigSlot<HotkeysConfig>,
}

impl ApplicationContext {
    pub fn new(app_name: impl Into<String>, mode: ProcessMode, paths: PersonalPaths) -> Self {
        Self {
            app_name: app_name.into(),
            mode,
            paths,
            started: Instant::now(),
            settings: ConfigSlot::new(),
            uploaders_config: ConfigSlot::new(),
            hotkeys_config: ConfigSlot::new(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn mode(&self) -> &ProcessMode {
        &self.mode
    }

    pub fn paths(&self) -> &PersonalPaths {
        &self.paths
    }

    pub fn is_portable(&self) -> bool {
        self.paths.is_portable()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// `ShotKeeper 0.1.141 Portable`; the patch number is left out when zero.
    pub fn title(&self) -> String {
        let mut title = format!(
            "{} {}.{}",
            self.app_name,
            env!("CARGO_PKG_VERSION_MAJOR"),
            env!("CARGO_PKG_VERSION_MINOR")
        );
        let patch = env!("CARGO_PKG_VERSION_PATCH");
        if patch != "0" {
            title.push('.');
            title.push_str(patch);
        }
        if self.is_portable() {
            title.push_str(" Portable");
        }
        title
    }

    /// Task settings new jobs start from, once program settings are loaded.
    pub fn default_task_settings(&self) -> Option<TaskSettings> {
        self.settings.get().map(|s| s.default_task_settings.clone())
    }

    /// Write every loaded document back to disk.
    ///
    /// All three documents are attempted; the first failure is returned.
    pub fn save_settings(&self) -> AppResult<()> {
        let results = [
            save_slot(&self.settings, self.paths.application_config_file_path().as_deref()),
            save_slot(&self.uploaders_config, self.paths.uploaders_config_file_path().as_deref()),
            save_slot(&self.hotkeys_config, self.paths.hotkeys_config_file_path().as_deref()),
        ];
        results.into_iter().collect()
    }

    /// Weekly snapshots of the three documents and the history file.
    pub fn backup_settings(&self) {
        let backup_folder = self.paths.backup_folder();
        let sources = [
            self.paths.application_config_file_path(),
            self.paths.hotkeys_config_file_path(),
            self.paths.uploaders_config_file_path(),
            self.paths.history_file_path(),
        ];

        for source in sources {
            if let Err(e) = backup_file_weekly(source.as_deref(), backup_folder.as_deref()) {
                error!("Backup failed: {}", e);
            }
        }
    }
}

fn save_slot<T: SettingsDocument>(slot: &ConfigSlot<T>, path: Option<&Path>) -> AppResult<()> {
    if path.is_none() {
        return Ok(());
    }

    let mut document = slot.get_mut();
    match document.as_deref_mut() {
        Some(document) => *document.application_version_mut() = crate::VERSION.to_string(),
        None => debug!("{} was never loaded, not saving", T::FILE_NAME),
    }

    match save_document(document.as_deref(), path) {
        Ok(()) => {
            if document.is_some() {
                info!("{} saved", T::FILE_NAME);
            }
            Ok(())
        }
        Err(e) => {
            error!("Failed to save {}: {}", T::FILE_NAME, e);
            Err(e)
        }
    }
}
