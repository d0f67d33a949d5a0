//! Unix-socket command server.
//!
//! Binds a Unix stream socket in non-blocking mode so the event loop can
//! poll it next to the display connection.  Each accepted connection carries
//! exactly one request line; the server dispatches it, writes back the
//! status as a native-endian `i32` and closes the connection.
//!
//! # Wire format
//!
//! ```text
//! client -> server:  change_ws 2\n         (at most IPC_BUF_SIZE bytes)
//! server -> client:  00 00 00 00           (i32, native endian)
//! ```

use super::dispatch::{CommandTable, IpcError};
use super::{IPC_BUF_SIZE, IPC_READ_TIMEOUT};
use crate::traits::CommandSink;
use log::{debug, info, warn};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

/// Errors produced by the socket server.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("failed to bind {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A listening command socket.  The socket file is removed on drop.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Bind `path`, replacing a stale socket file if one is left over.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self, SocketError> {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(|source| SocketError::Bind {
            path: path.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        info!("listening on {}", path.display());
        Ok(Self { listener, path })
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve a single pending connection.
    ///
    /// Returns `Ok(false)` when nobody is waiting or the connection could
    /// not be accepted.  Problems with one client's connection are logged
    /// and do not fail the server; only a broken listening socket does.
    pub fn serve_one<S: CommandSink>(
        &self,
        table: &CommandTable,
        sink: &mut S,
    ) -> Result<bool, SocketError> {
        let mut stream = match self.listener.accept() {
            Ok((stream, _)) => stream,
            Err(e) => return accept_failed(e),
        };
        debug!("client connected");
        let status = match read_request(&mut stream) {
            Ok(line) => table.dispatch(&line, sink),
            Err(e) => {
                warn!("bad request: {}", e);
                e.code()
            }
        };
        if let Err(e) = stream.write_all(&status.to_ne_bytes()) {
            warn!("failed to reply to client: {}", e);
        }
        debug!("client served with status {}", status);
        Ok(true)
    }
}

impl AsRawFd for IpcServer {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Classify an `accept` failure.  Aborted connections and descriptor
/// exhaustion are transient; an unusable listener is not.
fn accept_failed(e: std::io::Error) -> Result<bool, SocketError> {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::Interrupted => Ok(false),
        _ => match e.raw_os_error() {
            Some(libc::EBADF) | Some(libc::EINVAL) | Some(libc::ENOTSOCK) | Some(libc::EFAULT) => {
                Err(e.into())
            }
            _ => {
                warn!("failed to accept connection: {}", e);
                Ok(false)
            }
        },
    }
}

/// Read one request line of at most [`IPC_BUF_SIZE`] bytes.
fn read_request(stream: &mut UnixStream) -> Result<String, IpcError> {
    stream.set_nonblocking(false).map_err(|_| IpcError::Syntax)?;
    stream
        .set_read_timeout(Some(IPC_READ_TIMEOUT))
        .map_err(|_| IpcError::Syntax)?;

    let mut buf = Vec::with_capacity(IPC_BUF_SIZE);
    let mut chunk = [0u8; 256];
    loop {
        let n = match stream.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => return Err(IpcError::Syntax),
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.iter().position(|&b| b == b'\n') {
            buf.truncate(end);
            break;
        }
        if buf.len() > IPC_BUF_SIZE {
            return Err(IpcError::Syntax);
        }
    }
    if buf.is_empty() || buf.len() > IPC_BUF_SIZE {
        return Err(IpcError::Syntax);
    }
    String::from_utf8(buf).map_err(|_| IpcError::Syntax)
}

//  Tests
