//! Single-instance arbitration
//!
//! The first process to take the application's named lock becomes the
//! primary instance and keeps the lock until it exits. Any later launch fails
//! to take it, hands its command line to the primary over the loopback
//! channel and terminates without touching configuration or UI.

pub mod channel;

use single_instance::SingleInstance;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::traits::Shell;
use crate::utils::error::AppResult;

/// How long a forwarded batch waits for the main window to become ready
pub const FORWARD_READY_TIMEOUT: Duration = Duration::from_millis(5000);
/// Poll interval while waiting for the main window
pub const FORWARD_READY_POLL: Duration = Duration::from_millis(10);
/// How long a secondary launch looks for the primary's endpoint
pub const FORWARD_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// The main window once it has been built. The endpoint opens before the
/// window exists, so early batches find this empty and wait.
pub type ShellSlot = OnceLock<Arc<dyn Shell>>;

pub enum InstanceRole {
    Primary(PrimaryInstance),
    Secondary,
}

impl InstanceRole {
    pub fn is_primary(&self) -> bool {
        matches!(self, InstanceRole::Primary(_))
    }
}

/// Decides which role this process plays.
#[derive(Debug, Clone)]
pub struct InstanceArbiter {
    app_id: String,
    runtime_dir: PathBuf,
}

impl InstanceArbiter {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self::with_runtime_dir(app_id, std::env::temp_dir())
    }

    /// Arbiter whose endpoint (and, on macOS, lock) files live in `runtime_dir`.
    pub fn with_runtime_dir(app_id: impl Into<String>, runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_id: app_id.into(),
            runtime_dir: runtime_dir.into(),
        }
    }

    pub fn endpoint_file(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.endpoint", self.app_id))
    }

    // macOS locks a file at the given path; Linux and Windows take a plain name.
    fn lock_name(&self) -> String {
        if cfg!(target_os = "macos") {
            self.runtime_dir
                .join(format!("{}.lock", self.app_id))
                .to_string_lossy()
                .into_owned()
        } else {
            self.app_id.clone()
        }
    }

    /// Take the primary role unless another process already holds it.
    ///
    /// With `multi_instance` no lock is taken and the process is always
    /// primary, without a forwarding endpoint.
    pub fn acquire(&self, multi_instance: bool) -> InstanceRole {
        if multi_instance {
            debug!("Multi-instance run, skipping arbitration");
            return InstanceRole::Primary(PrimaryInstance {
                lock: None,
                endpoint_file: None,
                listening: false,
            });
        }

        match SingleInstance::new(&self.lock_name()) {
            Ok(lock) if lock.is_single() => InstanceRole::Primary(PrimaryInstance {
                lock: Some(lock),
                endpoint_file: Some(self.endpoint_file()),
                listening: false,
            }),
            Ok(_) => InstanceRole::Secondary,
            Err(e) => {
                // A failed acquisition counts as losing the race.
                warn!("Instance lock unavailable ({:?}), deferring to running instance", e);
                InstanceRole::Secondary
            }
        }
    }

    /// Hand `args` to the primary instance.
    pub async fn forward(&self, args: &[String], wait: Duration) -> AppResult<()> {
        channel::send(&self.endpoint_file(), args, wait).await
    }
}

/// Held by the primary for its whole lifetime.
pub struct PrimaryInstance {
    lock: Option<SingleInstance>,
    endpoint_file: Option<PathBuf>,
    listening: bool,
}

impl PrimaryInstance {
    /// Whether this process holds the named lock
    pub fn is_exclusive(&self) -> bool {
        self.lock.is_some()
    }

    pub fn endpoint_file(&self) -> Option<&Path> {
        self.endpoint_file.as_deref()
    }

    /// Start receiving forwarded command lines on the current runtime.
    ///
    /// Returns `None` for a multi-instance run, which has no endpoint.
    pub async fn listen<F, Fut>(&mut self, on_args: F) -> AppResult<Option<JoinHandle<()>>>
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(endpoint_file) = &self.endpoint_file else {
            return Ok(None);
        };

        let listener = channel::bind(endpoint_file).await?;
        self.listening = true;
        Ok(Some(tokio::spawn(channel::serve(listener, on_args))))
    }
}

impl Drop for PrimaryInstance {
    fn drop(&mut self) {
        if let (true, Some(endpoint_file)) = (self.listening, &self.endpoint_file) {
            let _ = std::fs::remove_file(endpoint_file);
        }
    }
}

/// Wait until the shell reports ready, polling every `poll` for at most `timeout`.
pub async fn wait_for_ready(shell: &dyn Shell, timeout: Duration, poll: Duration) -> bool {
    let started = Instant::now();
    while started.elapsed() < timeout {
        if shell.is_ready() {
            return true;
        }
        tokio::time::sleep(poll).await;
    }
    shell.is_ready()
}

/// Apply a forwarded batch to the main window. Best effort: if the window
/// is not ready in time the batch is dropped.
///
/// Returns whether the batch was applied.
pub async fn forward_to_shell(
    shell: Arc<dyn Shell>,
    args: Vec<String>,
    timeout: Duration,
    poll: Duration,
) -> bool {
    if !wait_for_ready(shell.as_ref(), timeout, poll).await {
        debug!(
            "Main window not ready after {} ms, dropping forwarded arguments",
            timeout.as_millis()
        );
        return false;
    }

    if args.is_empty() {
        if shell.is_tray_icon_visible() {
            // A tray icon created during login can stay invisible until toggled.
            shell.set_tray_icon_visible(false);
            shell.set_tray_icon_visible(true);
        }
        shell.show_activate();
    } else if shell.is_visible() {
        shell.show_activate();
    }

    info!("Applying {} forwarded argument(s)", args.len());
    shell.use_command_line_args(&args);
    true
}

/// Like [`forward_to_shell`], for a window that may still be under
/// construction. Building and becoming ready share the one `timeout`.
pub async fn forward_to_pending_shell(
    slot: Arc<ShellSlot>,
    args: Vec<String>,
    timeout: Duration,
    poll: Duration,
) -> bool {
    let started = Instant::now();
    let shell = loop {
        if let Some(shell) = slot.get() {
            break Arc::clone(shell);
        }
        if started.elapsed() >= timeout {
            debug!(
                "Main window not built after {} ms, dropping forwarded arguments",
                timeout.as_millis()
            );
            return false;
        }
        tokio::time::sleep(poll).await;
    };

    forward_to_shell(shell, args, timeout.saturating_sub(started.elapsed()), poll).await
}
