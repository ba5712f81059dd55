//! Loopback channel carrying forwarded command lines to the primary instance
//!
//! The primary binds an ephemeral port on 127.0.0.1 and publishes it in an
//! endpoint file. A later launch reads the file, connects, writes one JSON
//! line and disconnects.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::utils::error::{AppError, AppResult};

/// Largest accepted message; a command line never gets near this.
const MAX_MESSAGE_BYTES: u64 = 256 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedArgs {
    pub args: Vec<String>,
}

/// Bind the loopback listener and publish its port in `endpoint_file`.
pub async fn bind(endpoint_file: &Path) -> AppResult<TcpListener> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .map_err(|e| AppError::Instance(format!("Failed to bind forwarding endpoint: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| AppError::Instance(format!("Failed to read endpoint address: {}", e)))?
        .port();

    write_endpoint_file(endpoint_file, port).await?;
    debug!("Forwarding endpoint listening on port {}", port);
    Ok(listener)
}

async fn write_endpoint_file(endpoint_file: &Path, port: u16) -> AppResult<()> {
    let tmp = tmp_path(endpoint_file);
    tokio::fs::write(&tmp, format!("{}\n", port))
        .await
        .map_err(|e| AppError::Instance(format!("Failed to write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, endpoint_file).await.map_err(|e| {
        AppError::Instance(format!("Failed to publish {}: {}", endpoint_file.display(), e))
    })
}

fn tmp_path(endpoint_file: &Path) -> PathBuf {
    let mut name = endpoint_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    endpoint_file.with_file_name(name)
}

/// Accept connections forever, handing each batch to `on_args` on its own task.
pub async fn serve<F, Fut>(listener: TcpListener, on_args: F)
where
    F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let on_args = Arc::new(on_args);
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Forwarding endpoint accept failed: {}", e);
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                continue;
            }
        };

        let on_args = Arc::clone(&on_args);
        tokio::spawn(async move {
            match read_message(stream).await {
                Ok(message) => {
                    debug!("Received {} forwarded argument(s)", message.args.len());
                    on_args(message.args).await;
                }
                Err(e) => warn!("Discarding forwarded message: {}", e),
            }
        });
    }
}

async fn read_message(stream: TcpStream) -> AppResult<ForwardedArgs> {
    let mut reader = BufReader::new(stream.take(MAX_MESSAGE_BYTES));
    let mut line = String::new();

    tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| AppError::Instance("Timed out reading forwarded message".to_string()))?
        .map_err(|e| AppError::Instance(format!("Failed to read forwarded message: {}", e)))?;

    serde_json::from_str(line.trim_end())
        .map_err(|e| AppError::Instance(format!("Malformed forwarded message: {}", e)))
}

/// Send `args` to the primary, waiting up to `wait` for its endpoint to appear.
pub async fn send(endpoint_file: &Path, args: &[String], wait: Duration) -> AppResult<()> {
    let deadline = Instant::now() + wait;
    let mut stream = loop {
        match connect(endpoint_file).await {
            Ok(stream) => break stream,
            Err(e) if Instant::now() >= deadline => {
                debug!("Giving up on forwarding: {}", e);
                return Err(AppError::ForwardingTimeout(wait.as_millis() as u64));
            }
            Err(_) => tokio::time::sleep(CONNECT_RETRY_INTERVAL).await,
        }
    };

    let mut payload = serde_json::to_vec(&ForwardedArgs { args: args.to_vec() })
        .map_err(|e| AppError::System(format!("Failed to encode arguments: {}", e)))?;
    payload.push(b'\n');

    stream
        .write_all(&payload)
        .await
        .map_err(|e| AppError::Instance(format!("Failed to forward arguments: {}", e)))?;
    stream.shutdown().await.ok();
    Ok(())
}

async fn connect(endpoint_file: &Path) -> AppResult<TcpStream> {
    let content = tokio::fs::read_to_string(endpoint_file)
        .await
        .map_err(|e| {
            AppError::Instance(format!("No endpoint at {}: {}", endpoint_file.display(), e))
        })?;
    let port: u16 = content
        .trim()
        .parse()
        .map_err(|e| AppError::Instance(format!("Bad endpoint file content: {}", e)))?;

    TcpStream::connect(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
        .await
        .map_err(|e| AppError::Instance(format!("Failed to connect to port {}: {}", port, e)))
}
