//! Startup and shutdown sequencing
//!
//! [`Bootstrap::run`] is the whole life of the process: decide the instance
//! role, resolve paths, start logging and fault reporting, load settings in
//! the background while the shell is built, run the shell, then persist and
//! back up settings.

use chrono::Local;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, error, info, warn};

use crate::cli::Invocation;
use crate::core::context::ApplicationContext;
use crate::core::loader::LoadCoordinator;
use crate::core::traits::{FaultPresenter, Shell};
use crate::instance::{
    FORWARD_CONNECT_TIMEOUT, FORWARD_READY_POLL, FORWARD_READY_TIMEOUT, InstanceArbiter,
    InstanceRole, ShellSlot, forward_to_pending_shell,
};
use crate::logging;
use crate::paths::PathResolver;
use crate::reporter::{ConsolePresenter, ErrorReporter};
use crate::utils::error::{AppError, AppResult, report_error};

pub const APP_NAME: &str = "ShotKeeper";
pub const APP_ID: &str = "shotkeeper-0f6c2e57-instance";
pub const ISSUES_URL: &str = "https://github.com/shotkeeper/shotkeeper/issues";

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub app_name: String,
    /// System-wide identity used for the single-instance lock
    pub app_id: String,
    pub issues_url: String,
    pub ready_timeout: Duration,
    pub ready_poll: Duration,
    pub connect_timeout: Duration,
    pub install_fault_handlers: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            app_id: APP_ID.to_string(),
            issues_url: ISSUES_URL.to_string(),
            ready_timeout: FORWARD_READY_TIMEOUT,
            ready_poll: FORWARD_READY_POLL,
            connect_timeout: FORWARD_CONNECT_TIMEOUT,
            install_fault_handlers: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another instance was running; the arguments were handed to it.
    Forwarded,
    /// The shell's run loop returned and settings were persisted.
    Finished,
}

pub struct Bootstrap {
    options: BootstrapOptions,
    resolver: Option<PathResolver>,
    arbiter: Option<InstanceArbiter>,
    presenter: Option<Arc<dyn FaultPresenter>>,
}

impl Bootstrap {
    pub fn new(options: BootstrapOptions) -> Self {
        Self {
            options,
            resolver: None,
            arbiter: None,
            presenter: None,
        }
    }

    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_arbiter(mut self, arbiter: InstanceArbiter) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn FaultPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Run the application with `args` (program name excluded).
    ///
    /// `make_shell` builds the main window while settings are still loading;
    /// it runs on the calling thread, which is treated as the UI thread.
    pub fn run<F>(self, args: Vec<String>, make_shell: F) -> AppResult<RunOutcome>
    where
        F: FnOnce(Arc<ApplicationContext>, Handle) -> Arc<dyn Shell>,
    {
        let started = Instant::now();
        let Bootstrap {
            options,
            resolver,
            arbiter,
            presenter,
        } = self;

        let command_line = args.join(" ");
        let invocation = Invocation::parse(args)?;
        let mode = invocation.mode;
        let runtime = build_runtime()?;

        let arbiter = arbiter.unwrap_or_else(|| InstanceArbiter::new(&options.app_id));
        let mut primary = match arbiter.acquire(mode.multi_instance) {
            InstanceRole::Primary(primary) => primary,
            InstanceRole::Secondary => {
                let forwarded = runtime
                    .block_on(arbiter.forward(&invocation.passthrough, options.connect_timeout));
                if let Err(e) = forwarded {
                    report_error(&e);
                }
                return Ok(RunOutcome::Forwarded);
            }
        };

        // Listen before the window exists; early batches wait for it to be built.
        let shell_slot: Arc<ShellSlot> = Arc::new(OnceLock::new());
        let sink = Arc::clone(&shell_slot);
        let (ready_timeout, ready_poll) = (options.ready_timeout, options.ready_poll);
        let listening = runtime.block_on(primary.listen(move |args| {
            let slot = Arc::clone(&sink);
            async move {
                forward_to_pending_shell(slot, args, ready_timeout, ready_poll).await;
            }
        }));

        let resolver = match resolver {
            Some(resolver) => resolver,
            None => PathResolver::from_env(&options.app_name)?,
        };
        let paths = resolver.resolve(&mode)?;

        let log = logging::init(paths.log_file_path(&Local::now()).as_deref());
        if !log.is_installed() {
            debug!("A log subscriber was already installed, keeping it");
        }
        if options.install_fault_handlers {
            let presenter = presenter.unwrap_or_else(|| {
                Arc::new(ConsolePresenter::new(&options.app_name)) as Arc<dyn FaultPresenter>
            });
            Arc::new(ErrorReporter::new(
                log.log_file().map(|p| p.to_path_buf()),
                &options.issues_url,
                presenter,
            ))
            .install();
        }

        let ctx = Arc::new(ApplicationContext::new(&options.app_name, mode, paths));
        info!("{} started", ctx.title());
        info!("Operating system: {} {}", std::env::consts::OS, std::env::consts::ARCH);
        info!("Command line: {}", command_line);
        match ctx.paths().personal_path() {
            Some(path) => info!("Personal path: {}", path.display()),
            None => info!("Personal path: none (sandbox)"),
        }
        if let Err(e) = listening {
            warn!("Not accepting forwarded arguments: {}", e);
        }

        let loader = LoadCoordinator::start(Arc::clone(&ctx), runtime.handle());

        debug!("Main window init started");
        let shell = make_shell(Arc::clone(&ctx), runtime.handle().clone());
        debug!("Main window init finished");
        let _ = shell_slot.set(Arc::clone(&shell));

        if !ctx.settings.is_loaded() {
            debug!("Waiting for program settings");
            ctx.settings.gate().wait();
        }
        info!("Startup time: {} ms", started.elapsed().as_millis());

        let run_result = shell.run();
        if let Err(e) = &run_result {
            error!("Main loop ended with error: {}", e);
        }

        shell.dispose_folder_watchers();
        if let Err(e) = ctx.save_settings() {
            error!("Saving settings failed: {}", e);
        }
        ctx.backup_settings();
        info!("{} closing after {} s", options.app_name, ctx.uptime().as_secs());

        drop(loader);
        runtime.shutdown_timeout(Duration::from_secs(1));
        drop(primary);
        log.flush();

        run_result.map(|()| RunOutcome::Finished)
    }
}

fn build_runtime() -> AppResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("shotkeeper-worker")
        .enable_all()
        .build()
        .map_err(|e| AppError::System(format!("Failed to start worker runtime: {}", e)))
}
