//! Console stand-in for the main window
//!
//! Used by the bundled binary: it has no window or tray icon of its own, it
//! just reports forwarded command lines and runs until Ctrl-C.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tracing::info;

use crate::core::context::ApplicationContext;
use crate::core::traits::Shell;
use crate::utils::error::{AppError, AppResult};
use crate::utils::output::OutputStyle;

pub struct HeadlessShell {
    ctx: Arc<ApplicationContext>,
    runtime: Handle,
    ready: AtomicBool,
    visible: AtomicBool,
    tray_visible: AtomicBool,
    received: Mutex<Vec<Vec<String>>>,
}

impl HeadlessShell {
    pub fn new(ctx: Arc<ApplicationContext>, runtime: Handle) -> Self {
        Self {
            ctx,
            runtime,
            ready: AtomicBool::new(false),
            visible: AtomicBool::new(false),
            tray_visible: AtomicBool::new(true),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Every batch handed over by later launches, oldest first
    pub fn received(&self) -> Vec<Vec<String>> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Shell for HeadlessShell {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    fn is_tray_icon_visible(&self) -> bool {
        self.tray_visible.load(Ordering::Acquire)
    }

    fn set_tray_icon_visible(&self, visible: bool) {
        self.tray_visible.store(visible, Ordering::Release);
    }

    fn show_activate(&self) {
        self.visible.store(true, Ordering::Release);
        eprintln!("{}", OutputStyle::info(&format!("{} activated", self.ctx.title())));
    }

    fn use_command_line_args(&self, args: &[String]) {
        if !args.is_empty() {
            eprintln!("{} {}", OutputStyle::label("Received:"), args.join(" "));
        }
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args.to_vec());
    }

    fn run(&self) -> AppResult<()> {
        if !self.ctx.mode().silent {
            if let Some(settings) = self.ctx.settings.get() {
                if settings.first_time_run {
                    eprintln!(
                        "{}",
                        OutputStyle::success(&format!("Welcome to {}!", self.ctx.app_name()))
                    );
                }
            }
        }
        if let Some(mut settings) = self.ctx.settings.get_mut() {
            settings.first_time_run = false;
        }

        self.ready.store(true, Ordering::Release);
        info!("{} ready, press Ctrl-C to quit", self.ctx.title());

        let result = self.runtime.block_on(tokio::signal::ctrl_c());
        self.ready.store(false, Ordering::Release);
        result.map_err(|e| AppError::System(format!("Failed to wait for Ctrl-C: {}", e)))
    }
}
