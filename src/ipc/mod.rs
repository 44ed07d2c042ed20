//! IPC (Inter-Process Communication) via Unix sockets
//!
//! Carries UI requests (compact mode, auto-hide, activity, store access) into the
//! dock daemon. Uses length-prefixed JSON over Unix domain sockets.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use tracing::debug;

mod messages;
pub use messages::{DockRequest, DockResponse, DockStatus};

/// Maximum message size (1 MB) to prevent DoS via memory exhaustion
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Client connection to the dock daemon
pub struct DockClient {
    pub(crate) stream: UnixStream,
}

impl DockClient {
    /// Connect to a daemon socket
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .context(format!("Failed to connect to dock daemon at {}", path.display()))?;
        Ok(Self { stream })
    }

    pub fn send_request(&mut self, req: &DockRequest) -> Result<()> {
        write_message(&mut self.stream, req)
    }

    /// Receive response (blocking)
    pub fn recv_response(&mut self) -> Result<DockResponse> {
        read_message(&mut self.stream)
    }

    /// Send request and wait for response
    pub fn request(&mut self, req: DockRequest) -> Result<DockResponse> {
        self.send_request(&req)?;
        self.recv_response()
    }
}

/// Server side of one accepted connection
pub struct DockConnection {
    stream: UnixStream,
}

impl DockConnection {
    /// Receive request (blocking)
    pub fn recv_request(&mut self) -> Result<DockRequest> {
        read_message(&mut self.stream)
    }

    pub fn send_response(&mut self, resp: &DockResponse) -> Result<()> {
        write_message(&mut self.stream, resp)
    }
}

/// Server listener for the dock daemon
pub struct DockServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl DockServer {
    /// Create server and bind to a socket path
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        // Remove stale socket if exists
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;

        // Owner only
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        debug!(socket = %socket_path.display(), "IPC socket bound");
        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept incoming connection (blocking)
    pub fn accept(&self) -> Result<DockConnection> {
        let (stream, _addr) = self.listener.accept()
            .context("Failed to accept IPC connection")?;
        Ok(DockConnection { stream })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for DockServer {
    fn drop(&mut self) {
        // Clean up socket file
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Write length-prefixed message to stream
fn write_message<T: Serialize>(stream: &mut impl Write, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE));
    }

    // u32 little-endian length prefix
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;
    stream
        .write_all(&json)
        .context("Failed to write message payload")?;
    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
fn read_message<T: for<'de> Deserialize<'de>>(stream: &mut impl Read) -> Result<T> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;

    serde_json::from_slice(&json_buf).context("Failed to deserialize message from JSON")
}
