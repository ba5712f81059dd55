//! Seams between the bootstrap and its collaborators
//!
//! The window toolkit and the fault dialog live outside this crate. The
//! bootstrap only talks to them through these traits.

use std::path::Path;

use crate::reporter::Fault;
use crate::utils::error::AppResult;

/// The main window as far as the bootstrap is concerned.
///
/// Implementations are called from the UI thread (`run`, `dispose_folder_watchers`)
/// and from the forwarding listener (everything else), so they must marshal
/// onto their own UI thread where the toolkit requires it.
pub trait Shell: Send + Sync {
    /// Whether the window has finished constructing and can take commands
    fn is_ready(&self) -> bool;

    fn is_visible(&self) -> bool;

    fn is_tray_icon_visible(&self) -> bool;

    fn set_tray_icon_visible(&self, visible: bool);

    /// Show, restore and focus the main window
    fn show_activate(&self);

    /// Handle arguments forwarded by a later launch
    fn use_command_line_args(&self, args: &[String]);

    /// Main run loop. Returns when the operator quits.
    fn run(&self) -> AppResult<()>;

    /// Stop any folder watchers before settings are persisted.
    fn dispose_folder_watchers(&self) {}
}

/// Shows an unhandled fault to the operator and blocks until dismissed.
pub trait FaultPresenter: Send + Sync {
    fn present(&self, fault: &Fault, log_file: Option<&Path>, issues_url: &str);
}
