use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory log sink used when there is nowhere to write (sandbox mode).
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemoryLog {
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

pub struct MemoryLogWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MemoryLog {
    type Writer = MemoryLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MemoryLogWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Keeps the log writer alive; dropping it (or calling `flush`) drains pending lines to disk.
pub struct LogHandle {
    log_file: Option<PathBuf>,
    memory: Option<MemoryLog>,
    guard: Option<WorkerGuard>,
    installed: bool,
}

impl LogHandle {
    /// The file this run logs to; `None` for a memory-only log.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn memory(&self) -> Option<&MemoryLog> {
        self.memory.as_ref()
    }

    /// Whether this handle's subscriber became the global default.
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn flush(mut self) {
        self.guard.take();
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, appending to `log_file` when given.
///
/// Falls back to the in-memory log if the file cannot be opened. A second
/// call in the same process leaves the first subscriber in place.
pub fn init(log_file: Option<&Path>) -> LogHandle {
    if let Some(path) = log_file {
        match open_appender(path) {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let installed = tracing_subscriber::fmt()
                    .with_env_filter(env_filter())
                    .with_ansi(false)
                    .with_writer(writer)
                    .try_init()
                    .is_ok();
                return LogHandle {
                    log_file: Some(path.to_path_buf()),
                    memory: None,
                    guard: Some(guard),
                    installed,
                };
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path.display(), e);
            }
        }
    }

    let memory = MemoryLog::default();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(memory.clone())
        .try_init()
        .is_ok();

    LogHandle {
        log_file: None,
        memory: Some(memory),
        guard: None,
        installed,
    }
}

fn open_appender(path: &Path) -> io::Result<RollingFileAppender> {
    let folder = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;

    std::fs::create_dir_all(folder)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(folder)
        .map_err(io::Error::other)
}
