//! Last-resort reporting of unhandled faults
//!
//! A panic on any thread ends up in [`ErrorReporter::on_error`]: the fault is
//! written to the log, then shown to the operator through a
//! [`FaultPresenter`] that blocks until dismissed. Nothing is recovered;
//! the operator is expected to restart the program.

use std::backtrace::Backtrace;
use std::fmt;
use std::io::{BufRead, IsTerminal};
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;

use crate::core::traits::FaultPresenter;
use crate::utils::output::{OutputStyle, print_field};

/// An unhandled failure captured from a panic.
#[derive(Debug, Clone)]
pub struct Fault {
    pub message: String,
    pub location: Option<String>,
    pub thread: String,
    pub backtrace: String,
}

impl Fault {
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        Self {
            message,
            location: info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
            thread: std::thread::current()
                .name()
                .unwrap_or("<unnamed>")
                .to_string(),
            backtrace: Backtrace::force_capture().to_string(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread '{}' panicked", self.thread)?;
        if let Some(location) = &self.location {
            write!(f, " at {}", location)?;
        }
        write!(f, ": {}", self.message)
    }
}

pub struct ErrorReporter {
    log_file: Option<PathBuf>,
    issues_url: String,
    presenter: Arc<dyn FaultPresenter>,
}

impl ErrorReporter {
    pub fn new(
        log_file: Option<PathBuf>,
        issues_url: impl Into<String>,
        presenter: Arc<dyn FaultPresenter>,
    ) -> Self {
        Self {
            log_file,
            issues_url: issues_url.into(),
            presenter,
        }
    }

    /// Route panics from every thread to [`Self::on_error`].
    pub fn install(self: Arc<Self>) {
        std::panic::set_hook(Box::new(move |info| {
            let fault = Fault::from_panic(info);
            self.on_error(&fault);
        }));
    }

    pub fn on_error(&self, fault: &Fault) {
        error!("Unhandled fault: {}\n{}", fault, fault.backtrace);
        self.presenter
            .present(fault, self.log_file.as_deref(), &self.issues_url);
    }
}

/// Prints the report to stderr and waits for Enter when attached to a terminal.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    app_name: String,
}

impl ConsolePresenter {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

impl FaultPresenter for ConsolePresenter {
    fn present(&self, fault: &Fault, log_file: Option<&Path>, issues_url: &str) {
        eprintln!();
        eprintln!("{}", OutputStyle::title(&format!("{} has stopped working", self.app_name)));
        eprintln!("{}", OutputStyle::header("================================"));
        eprintln!("{}", OutputStyle::error(&fault.to_string()));
        eprintln!();
        eprintln!("{}", OutputStyle::muted(&fault.backtrace));
        let log_line = match log_file {
            Some(path) => OutputStyle::path(&path.display().to_string()),
            None => OutputStyle::muted("not saved (sandbox)"),
        };
        print_field("Log file", &log_line.to_string());
        print_field("Report issues", issues_url);

        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            eprintln!();
            eprintln!("{}", OutputStyle::info("Press Enter to close."));
            let mut line = String::new();
            let _ = stdin.lock().read_line(&mut line);
        }
    }
}
