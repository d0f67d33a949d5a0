//! Entry point for the **opwm** window manager.
//!
//! Connects to the X server, binds the command socket and runs the event
//! loop on the main thread.  Status lines are printed to stdout from a
//! small background thread so a bar can read them from a pipe.

use log::{error, info, warn};
use opwm::config::Config;
use opwm::event_loop;
use opwm::ipc::default_socket_path;
use opwm::ipc::dispatch::CommandTable;
use opwm::ipc::listener::IpcServer;
use opwm::manager::{Manager, Shutdown};
use opwm::spawn::ignore_child_exits;
use opwm::traits::Status;
use opwm::x11::X11Backend;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::sync::mpsc;

/// Resolve the config directory (`$XDG_CONFIG_HOME/opwm`).
fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("opwm")
}

/// `--config <path>` if given, otherwise `$XDG_CONFIG_HOME/opwm/config.json`.
fn config_path() -> PathBuf {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return PathBuf::from(path);
            }
        }
    }
    config_dir().join("config.json")
}

/// Load the config, falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_path();
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no usable config ({}), using defaults", e);
            Config::default()
        }
    }
}

/// Print every status snapshot as one line on stdout.
fn spawn_status_printer(rx: mpsc::Receiver<Status>) {
    std::thread::spawn(move || {
        let stdout = std::io::stdout();
        for status in rx {
            let mut out = stdout.lock();
            if writeln!(out, "{}", status).and_then(|_| out.flush()).is_err() {
                warn!("stdout closed, no longer printing status");
                break;
            }
        }
    });
}

fn main() {
    env_logger::init();

    let config = load_config();
    let socket_path = config.socket_path.clone().unwrap_or_else(default_socket_path);

    let backend = match X11Backend::connect() {
        Ok(b) => b,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    ignore_child_exits();

    let server = match IpcServer::bind(&socket_path) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let (status_tx, status_rx) = mpsc::channel();
    spawn_status_printer(status_rx);

    let mut manager = Manager::new(backend, config);
    manager.set_status_channel(status_tx);

    let table = CommandTable::default();
    let outcome = manager
        .start()
        .map_err(event_loop::LoopError::from)
        .and_then(|()| event_loop::run(&mut manager, &server, &table));

    if let Err(e) = manager.teardown() {
        warn!("teardown incomplete: {}", e);
    }
    drop(server);

    if let Err(e) = outcome {
        error!("{}", e);
        std::process::exit(1);
    }

    match manager.shutdown() {
        Some(Shutdown::Restart) => {
            info!("restarting");
            let err = match std::env::current_exe() {
                Ok(exe) => std::process::Command::new(exe)
                    .args(std::env::args_os().skip(1))
                    .exec(),
                Err(e) => e,
            };
            error!("restart failed: {}", err);
            std::process::exit(1);
        }
        Some(Shutdown::Quit(status)) => std::process::exit(status),
        None => std::process::exit(0),
    }
}
