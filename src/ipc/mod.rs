//! Command socket.
//!
//! External tools (a hotkey daemon, scripts, `opwm-msg`) connect to a Unix
//! socket, send one command line and read back a status code.  The
//! [`dispatch`] module maps lines to [`Command`](crate::command::Command)s;
//! [`listener`] owns the socket.

pub mod dispatch;
pub mod listener;

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest request line accepted, in bytes.
pub const IPC_BUF_SIZE: usize = 1024;

/// How long a connected client may take to send its line.
pub const IPC_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// `$XDG_RUNTIME_DIR/opwm.sock`, or a per-user path under `/tmp`.
pub fn default_socket_path() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) => PathBuf::from(dir).join("opwm.sock"),
        None => {
            let uid = unsafe { libc::getuid() };
            std::env::temp_dir().join(format!("opwm-{}.sock", uid))
        }
    }
}

/// Send one command line and wait for its status code.
pub fn send_command(path: impl AsRef<Path>, line: &str) -> std::io::Result<i32> {
    let mut stream = UnixStream::connect(path)?;
    stream.write_all(line.trim_end().as_bytes())?;
    stream.write_all(b"\n")?;
    let _ = stream.shutdown(std::net::Shutdown::Write);
    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply)?;
    Ok(i32::from_ne_bytes(reply))
}
