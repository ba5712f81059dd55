//! Personal path resolution
//!
//! Every piece of persisted state lives below one *personal path*. Where that
//! directory is depends on the process mode: beside the executable in
//! portable mode, wherever `PersonalPath.cfg` points when that side-car file
//! exists, or in the user's documents folder otherwise. In sandbox mode there
//! is no personal path at all and every derived path is `None`.

use chrono::{DateTime, Local};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cli::ProcessMode;
use crate::config::{
    APPLICATION_CONFIG_FILENAME, ApplicationConfig, HOTKEYS_CONFIG_FILENAME,
    UPLOADERS_CONFIG_FILENAME,
};
use crate::utils::error::{AppError, AppResult};
use crate::utils::time_format::month_stamp;

pub const PERSONAL_PATH_CONFIG_FILENAME: &str = "PersonalPath.cfg";
pub const HISTORY_FILENAME: &str = "History.xml";
pub const LOGS_FOLDER_NAME: &str = "Logs";
pub const BACKUP_FOLDER_NAME: &str = "Backup";
pub const SCREENSHOTS_FOLDER_NAME: &str = "Screenshots";
pub const SCREEN_RECORDER_CACHE_FILENAME: &str = "ScreenRecorder.avi";

/// Computes the personal path from the process mode and the side-car pointer file.
#[derive(Debug, Clone)]
pub struct PathResolver {
    app_name: String,
    startup_dir: PathBuf,
    documents_dir: PathBuf,
}

impl PathResolver {
    pub fn new(
        app_name: impl Into<String>,
        startup_dir: impl Into<PathBuf>,
        documents_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            startup_dir: startup_dir.into(),
            documents_dir: documents_dir.into(),
        }
    }

    /// Resolver for the running executable and the current user.
    pub fn from_env(app_name: impl Into<String>) -> AppResult<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| AppError::System(format!("Failed to locate executable: {}", e)))?;
        let startup_dir = exe
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| AppError::System("Executable has no parent directory".to_string()))?;
        let documents_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self::new(app_name, startup_dir, documents_dir))
    }

    pub fn default_personal_path(&self) -> PathBuf {
        self.documents_dir.join(&self.app_name)
    }

    pub fn portable_personal_path(&self) -> PathBuf {
        self.startup_dir.join(&self.app_name)
    }

    pub fn personal_path_config(&self) -> PathBuf {
        self.startup_dir.join(PERSONAL_PATH_CONFIG_FILENAME)
    }

    /// Contents of the pointer file, trimmed; empty when the file is absent.
    pub fn read_personal_path_config(&self) -> AppResult<String> {
        let config = self.personal_path_config();
        if !config.exists() {
            return Ok(String::new());
        }

        let bytes = std::fs::read(&config).map_err(|e| {
            AppError::Io(format!("Failed to read {}: {}", config.display(), e))
        })?;
        let content = String::from_utf8_lossy(&bytes);
        if matches!(content, Cow::Owned(_)) {
            warn!("{} is not valid UTF-8, invalid bytes replaced", config.display());
        }

        Ok(content.trim_start_matches('\u{feff}').trim().to_string())
    }

    /// Persist an operator-chosen personal path.
    ///
    /// An empty `path` clears the customisation, but never creates the file
    /// just to store nothing.
    pub fn write_personal_path_config(&self, path: &str) -> AppResult<()> {
        let config = self.personal_path_config();
        if path.is_empty() && !config.exists() {
            return Ok(());
        }

        std::fs::write(&config, path)
            .map_err(|e| AppError::Io(format!("Failed to write {}: {}", config.display(), e)))
    }

    pub fn resolve(&self, mode: &ProcessMode) -> AppResult<PersonalPaths> {
        if mode.sandbox {
            debug!("Sandbox mode, persistence disabled");
            return Ok(PersonalPaths::sandbox(&self.app_name));
        }

        let portable_path = normalize_lexically(&self.portable_personal_path());
        let (personal_path, portable) = if mode.portable {
            (portable_path, true)
        } else {
            let custom = self.read_personal_path_config()?;
            if custom.is_empty() {
                (self.default_personal_path(), false)
            } else {
                let custom = std::path::absolute(&custom).map_err(|e| {
                    AppError::Io(format!("Invalid personal path '{}': {}", custom, e))
                })?;
                let custom = normalize_lexically(&custom);
                let portable = paths_equal_ignore_case(&custom, &portable_path);
                (custom, portable)
            }
        };

        if !personal_path.exists() {
            std::fs::create_dir_all(&personal_path).map_err(|e| {
                AppError::Io(format!("Failed to create {}: {}", personal_path.display(), e))
            })?;
            info!("Created personal folder {}", personal_path.display());
        }

        Ok(PersonalPaths {
            app_name: self.app_name.clone(),
            personal_path: Some(personal_path),
            portable,
        })
    }
}

/// Drop `.` segments and fold `..` into its parent without touching the disk.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

fn paths_equal_ignore_case(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| {
        p.to_string_lossy()
            .trim_end_matches(['/', '\\'])
            .to_lowercase()
    };
    normalize(a) == normalize(b)
}

/// The resolved personal path and everything derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalPaths {
    app_name: String,
    personal_path: Option<PathBuf>,
    portable: bool,
}

impl PersonalPaths {
    pub fn sandbox(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            personal_path: None,
            portable: false,
        }
    }

    pub fn personal_path(&self) -> Option<&Path> {
        self.personal_path.as_deref()
    }

    /// Effective portability, including an upgrade from the pointer file.
    pub fn is_portable(&self) -> bool {
        self.portable
    }

    pub fn is_sandbox(&self) -> bool {
        self.personal_path.is_none()
    }

    fn join(&self, name: &str) -> Option<PathBuf> {
        self.personal_path.as_ref().map(|p| p.join(name))
    }

    pub fn application_config_file_path(&self) -> Option<PathBuf> {
        self.join(APPLICATION_CONFIG_FILENAME)
    }

    pub fn uploaders_config_file_path(&self) -> Option<PathBuf> {
        self.join(UPLOADERS_CONFIG_FILENAME)
    }

    pub fn hotkeys_config_file_path(&self) -> Option<PathBuf> {
        self.join(HOTKEYS_CONFIG_FILENAME)
    }

    pub fn history_file_path(&self) -> Option<PathBuf> {
        self.join(HISTORY_FILENAME)
    }

    pub fn log_folder(&self) -> Option<PathBuf> {
        self.join(LOGS_FOLDER_NAME)
    }

    pub fn log_file_name(&self, now: &DateTime<Local>) -> String {
        format!("{}-Log-{}.txt", self.app_name, month_stamp(now))
    }

    pub fn log_file_path(&self, now: &DateTime<Local>) -> Option<PathBuf> {
        self.log_folder().map(|folder| folder.join(self.log_file_name(now)))
    }

    pub fn backup_folder(&self) -> Option<PathBuf> {
        self.join(BACKUP_FOLDER_NAME)
    }

    pub fn screen_recorder_cache_file_path(&self) -> Option<PathBuf> {
        self.join(SCREEN_RECORDER_CACHE_FILENAME)
    }

    pub fn screenshots_parent_folder(
        &self,
        settings: Option<&ApplicationConfig>,
    ) -> Option<PathBuf> {
        self.personal_path.as_ref()?;

        match settings {
            Some(s) if s.use_custom_screenshots_path && !s.custom_screenshots_path.is_empty() => {
                Some(PathBuf::from(&s.custom_screenshots_path))
            }
            _ => self.join(SCREENSHOTS_FOLDER_NAME),
        }
    }

    /// Screenshots parent folder plus the dated sub folder from settings.
    pub fn screenshots_path(
        &self,
        settings: &ApplicationConfig,
        now: &DateTime<Local>,
    ) -> Option<PathBuf> {
        let parent = self.screenshots_parent_folder(Some(settings))?;
        let mut sub_folder = String::new();
        if write!(sub_folder, "{}", now.format(&settings.save_image_sub_folder_pattern)).is_err() {
            sub_folder = settings.save_image_sub_folder_pattern.clone();
        }
        Some(parent.join(sub_folder))
    }
}
