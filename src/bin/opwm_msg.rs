//! Command-line client for the opwm command socket.
//!
//! Joins its arguments into one command line, sends it and exits with the
//! status code the window manager returns.
//!
//! ```text
//! opwm-msg change_ws 3
//! opwm-msg spawn alacritty -e htop
//! ```

use opwm::ipc::{default_socket_path, send_command};
use std::path::PathBuf;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: opwm-msg <command> [args...]");
        std::process::exit(2);
    }

    let path = std::env::var_os("OPWM_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(default_socket_path);

    match send_command(&path, &args.join(" ")) {
        Ok(status) => std::process::exit(status),
        Err(e) => {
            log::error!("failed to talk to {}: {}", path.display(), e);
            eprintln!("opwm-msg: {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
