use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::utils::error::{AppError, AppResult};

pub const APPLICATION_CONFIG_FILENAME: &str = "ApplicationConfig.json";
pub const UPLOADERS_CONFIG_FILENAME: &str = "UploadersConfig.json";
pub const HOTKEYS_CONFIG_FILENAME: &str = "HotkeysConfig.json";

/// A configuration document persisted as one JSON file under the personal path.
///
/// `load` never fails for a missing or malformed file: both fall back to the
/// default document. Only genuine I/O failures (permissions, locked files)
/// come back as [`AppError::ConfigIo`]. A `None` path means persistence is
/// disabled (sandbox mode).
pub trait SettingsDocument: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// File name under the personal path
    const FILE_NAME: &'static str;

    /// Version of the program that last wrote this document
    fn application_version_mut(&mut self) -> &mut String;

    fn load(path: Option<&Path>) -> AppResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} not found at {}, using defaults", Self::FILE_NAME, path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::ConfigIo(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        match Self::parse(&content) {
            Ok(document) => Ok(document),
            Err(e) => {
                warn!("{}, using defaults", e);
                Ok(Self::default())
            }
        }
    }

    fn parse(content: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(content).map_err(|e| {
            AppError::ConfigParse(format!("Failed to parse {}: {}", Self::FILE_NAME, e))
        })
    }

    /// Serialize to a sibling temp file and rename it over `path`.
    fn save(&self, path: Option<&Path>) -> AppResult<()> {
        let Some(path) = path else {
            return Ok(());
        };

        let data = serde_json::to_vec_pretty(self).map_err(|e| {
            AppError::System(format!("Failed to serialize {}: {}", Self::FILE_NAME, e))
        })?;

        let config_io = |e: std::io::Error| {
            AppError::ConfigIo(format!("Failed to write {}: {}", path.display(), e))
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(config_io)?;
        }

        let tmp = path.with_file_name(format!(
            ".{}.{}.tmp",
            Self::FILE_NAME,
            uuid::Uuid::new_v4().simple()
        ));
        let written = (|| {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()
        })();
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(config_io(e));
        }

        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            config_io(e)
        })?;

        debug!("Saved {} to {}", Self::FILE_NAME, path.display());
        Ok(())
    }
}

/// Save `document` to `path`; a missing document or path is a no-op.
pub fn save_document<T: SettingsDocument>(
    document: Option<&T>,
    path: Option<&Path>,
) -> AppResult<()> {
    match document {
        Some(document) => document.save(path),
        None => Ok(()),
    }
}

fn current_version() -> String {
    crate::VERSION.to_string()
}

/// Program settings. Loaded first because the default task settings live here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub application_version: String,
    pub first_time_run: bool,
    pub show_tray: bool,
    pub use_custom_screenshots_path: bool,
    pub custom_screenshots_path: String,
    pub save_image_sub_folder_pattern: String,
    pub default_task_settings: TaskSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub after_capture_tasks: Vec<String>,
    pub after_upload_tasks: Vec<String>,
    pub image_destination: String,
    pub file_destination: String,
}

/// Credentials and endpoints of the upload backends. Opaque to the bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadersConfig {
    pub application_version: String,
    pub custom_uploaders: Vec<CustomUploader>,
    pub selected_custom_uploader: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomUploader {
    pub name: String,
    pub request_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeysConfig {
    pub application_version: String,
    pub hotkeys: Vec<HotkeySetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySetting {
    pub chord: String,
    pub job: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            application_version: current_version(),
            first_time_run: true,
            show_tray: true,
            use_custom_screenshots_path: false,
            custom_screenshots_path: String::new(),
            save_image_sub_folder_pattern: "%Y-%m".to_string(),
            default_task_settings: TaskSettings::default(),
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            after_capture_tasks: vec![
                "CopyImageToClipboard".to_string(),
                "SaveImageToFile".to_string(),
            ],
            after_upload_tasks: vec!["CopyUrlToClipboard".to_string()],
            image_destination: "Imgur".to_string(),
            file_destination: "Dropbox".to_string(),
        }
    }
}

impl Default for UploadersConfig {
    fn default() -> Self {
        Self {
            application_version: current_version(),
            custom_uploaders: Vec::new(),
            selected_custom_uploader: 0,
        }
    }
}

impl Default for HotkeysConfig {
    fn default() -> Self {
        Self {
            application_version: current_version(),
            hotkeys: vec![
                HotkeySetting {
                    chord: "PrintScreen".to_string(),
                    job: "PrintScreen".to_string(),
                },
                HotkeySetting {
                    chord: "Alt+PrintScreen".to_string(),
                    job: "ActiveWindow".to_string(),
                },
                HotkeySetting {
                    chord: "Ctrl+PrintScreen".to_string(),
                    job: "RectangleRegion".to_string(),
                },
            ],
        }
    }
}

impl SettingsDocument for ApplicationConfig {
    const FILE_NAME: &'static str = APPLICATION_CONFIG_FILENAME;

    fn application_version_mut(&mut self) -> &mut String {
        &mut self.application_version
    }
}

impl SettingsDocument for UploadersConfig {
    const FILE_NAME: &'static str = UPLOADERS_CONFIG_FILENAME;

    fn application_version_mut(&mut self) -> &mut String {
        &mut self.application_version
    }
}

impl SettingsDocument for HotkeysConfig {
    const FILE_NAME: &'static str = HOTKEYS_CONFIG_FILENAME;

    fn application_version_mut(&mut self) -> &mut String {
        &mut self.application_version
    }
}
