use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::utils::error::{AppError, AppResult};
use crate::utils::time_format::week_stamp;

/// Copy `source` into `backup_folder` unless this week's copy already exists.
///
/// The week is taken from the source's last-write time. Returns the path of
/// the backup that was written, or `None` when nothing had to be done.
pub fn backup_file_weekly(
    source: Option<&Path>,
    backup_folder: Option<&Path>,
) -> AppResult<Option<PathBuf>> {
    let (Some(source), Some(backup_folder)) = (source, backup_folder) else {
        return Ok(None);
    };

    let modified = match std::fs::metadata(source) {
        Ok(metadata) if metadata.is_file() => metadata.modified()?,
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    backup_file_weekly_at(source, backup_folder, &DateTime::<Local>::from(modified))
}

/// Same as [`backup_file_weekly`] with an explicit timestamp for the source.
pub fn backup_file_weekly_at(
    source: &Path,
    backup_folder: &Path,
    timestamp: &DateTime<Local>,
) -> AppResult<Option<PathBuf>> {
    if !source.is_file() {
        return Ok(None);
    }

    let target = backup_folder.join(weekly_backup_file_name(source, timestamp)?);
    if target.exists() {
        debug!("Weekly backup {} already exists", target.display());
        return Ok(None);
    }

    std::fs::create_dir_all(backup_folder).map_err(|e| {
        AppError::Io(format!("Failed to create {}: {}", backup_folder.display(), e))
    })?;
    std::fs::copy(source, &target).map_err(|e| {
        AppError::Io(format!(
            "Failed to back up {} to {}: {}",
            source.display(),
            target.display(),
            e
        ))
    })?;

    info!("Backed up {} to {}", source.display(), target.display());
    Ok(Some(target))
}

/// `ApplicationConfig-2024-W07.json` for `ApplicationConfig.json`.
pub fn weekly_backup_file_name(source: &Path, timestamp: &DateTime<Local>) -> AppResult<String> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .ok_or_else(|| AppError::System(format!("No file name in {}", source.display())))?;

    let extension = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    Ok(format!("{}-{}{}", stem, week_stamp(timestamp), extension))
}
