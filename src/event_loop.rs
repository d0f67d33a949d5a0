//! The single-threaded main loop.
//!
//! One blocking `poll(2)` waits on the display connection and the command
//! socket.  Every pending window event is handled to completion before the
//! loop serves at most one IPC connection and waits again, so no two
//! operations on the [`Manager`] ever overlap.

use crate::ipc::dispatch::CommandTable;
use crate::ipc::listener::{IpcServer, SocketError};
use crate::manager::{Manager, WmError};
use crate::traits::{EventSource, WindowSystem};
use log::{debug, info, warn};
use std::io;
use std::os::fd::{AsRawFd, RawFd};

/// Errors that end the main loop.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// The display connection failed.
    #[error("event source error: {0}")]
    Events(String),
    #[error(transparent)]
    Manager(#[from] WmError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),
}

fn events<E: std::fmt::Display>(e: E) -> LoopError {
    LoopError::Events(e.to_string())
}

/// Run until the manager records a shutdown reason.
///
/// Only a failure to read events from or flush the display connection is
/// fatal.  A failure while handling one event is logged and the loop moves
/// on; a failing IPC command only affects the status code its caller
/// receives.
pub fn run<B>(manager: &mut Manager<B>, server: &IpcServer, table: &CommandTable) -> Result<(), LoopError>
where
    B: WindowSystem + EventSource,
{
    let fds = [manager.window_system().raw_fd(), server.as_raw_fd()];
    info!("entering main loop");
    while manager.is_running() {
        // The connection may already hold queued events that will never
        // make its descriptor readable, so drain before every wait.
        let pending = manager.window_system().poll_events().map_err(events)?;
        for event in pending {
            debug!("event {:?}", event);
            if let Err(e) = manager.handle_event(event) {
                warn!("failed to handle event: {}", e);
            }
        }
        manager.window_system().flush().map_err(events)?;
        if !manager.is_running() {
            break;
        }

        let ready = wait_readable(&fds).map_err(LoopError::Poll)?;
        if ready[1] {
            server.serve_one(table, manager)?;
            manager.window_system().flush().map_err(events)?;
        }
    }
    info!("leaving main loop: {:?}", manager.shutdown());
    Ok(())
}

/// Block until at least one descriptor is readable (or hung up).
fn wait_readable(fds: &[RawFd]) -> io::Result<Vec<bool>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();
    loop {
        let n = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, -1) };
        if n >= 0 {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
    Ok(pollfds
        .iter()
        .map(|p| p.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
        .collect())
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Rect, WindowId};
    use crate::config::Config;
    use crate::ipc::send_command;
    use crate::manager::Shutdown;
    use crate::traits::{ConfigureChanges, WindowEvent};
    use std::cell::RefCell;
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("opwm-loop-{}-{}.sock", std::process::id(), id))
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fake backend: {0}")]
    struct FakeError(&'static str);

    /// A backend whose descriptor is always readable and whose events come
    /// from a queue filled by the test.
    struct FakeBackend {
        queue: RefCell<Vec<WindowEvent>>,
        mapped: RefCell<Vec<WindowId>>,
        fail_polls: bool,
        /// Windows whose class query fails as if they were already gone.
        vanished: Vec<WindowId>,
        readable: UnixStream,
        _peer: UnixStream,
    }

    impl FakeBackend {
        fn new(queue: Vec<WindowEvent>) -> Self {
            let (readable, mut peer) = UnixStream::pair().unwrap();
            peer.write_all(b"x").unwrap();
            Self {
                queue: RefCell::new(queue),
                mapped: RefCell::new(Vec::new()),
                fail_polls: false,
                vanished: Vec::new(),
                readable,
                _peer: peer,
            }
        }
    }

    impl WindowSystem for FakeBackend {
        type Error = FakeError;

        fn screen_size(&self) -> (u16, u16) {
            (800, 600)
        }
        fn map_window(&self, w: WindowId) -> Result<(), FakeError> {
            self.mapped.borrow_mut().push(w);
            Ok(())
        }
        fn unmap_window(&self, _: WindowId) -> Result<(), FakeError> {
            Ok(())
        }
        fn configure_window(&self, _: WindowId, _: Rect, _: u16) -> Result<(), FakeError> {
            Ok(())
        }
        fn forward_configure(&self, _: WindowId, _: ConfigureChanges) -> Result<(), FakeError> {
            Ok(())
        }
        fn raise_window(&self, _: WindowId) -> Result<(), FakeError> {
            Ok(())
        }
        fn set_border_color(&self, _: WindowId, _: u32) -> Result<(), FakeError> {
            Ok(())
        }
        fn focus_window(&self, _: Option<WindowId>) -> Result<(), FakeError> {
            Ok(())
        }
        fn close_window(&self, _: WindowId) -> Result<(), FakeError> {
            Ok(())
        }
        fn window_class(&self, w: WindowId) -> Result<Option<String>, FakeError> {
            if self.vanished.contains(&w) {
                return Err(FakeError("BadWindow"));
            }
            Ok(None)
        }
        fn top_level_windows(&self) -> Result<Vec<WindowId>, FakeError> {
            Ok(Vec::new())
        }
        fn set_desktop_hints(&self, _: u32, _: u32) -> Result<(), FakeError> {
            Ok(())
        }
        fn set_workarea(&self, _: Rect) -> Result<(), FakeError> {
            Ok(())
        }
        fn set_window_state(&self, _: WindowId, _: bool, _: bool) -> Result<(), FakeError> {
            Ok(())
        }
    }

    impl EventSource for FakeBackend {
        type Error = FakeError;

        fn raw_fd(&self) -> RawFd {
            self.readable.as_raw_fd()
        }
        fn poll_events(&self) -> Result<Vec<WindowEvent>, FakeError> {
            if self.fail_polls {
                return Err(FakeError("connection lost"));
            }
            Ok(std::mem::take(&mut *self.queue.borrow_mut()))
        }
        fn flush(&self) -> Result<(), FakeError> {
            Ok(())
        }
    }

    #[test]
    fn events_are_handled_and_quit_ends_the_loop() {
        let backend = FakeBackend::new(vec![
            WindowEvent::MapRequest {
                window: WindowId(1),
                transient: false,
            },
            WindowEvent::MapRequest {
                window: WindowId(2),
                transient: false,
            },
        ]);
        let mut manager = Manager::new(backend, Config::default());
        let path = tmp_socket_path();
        let server = IpcServer::bind(&path).unwrap();

        let client = thread::spawn(move || send_command(&path, "quit 3").unwrap());
        run(&mut manager, &server, &CommandTable::default()).unwrap();

        assert_eq!(client.join().unwrap(), 0);
        assert_eq!(manager.shutdown(), Some(Shutdown::Quit(3)));
        assert_eq!(manager.workspaces().current().len(), 2);
        assert_eq!(
            *manager.window_system().mapped.borrow(),
            vec![WindowId(1), WindowId(2)]
        );
    }

    #[test]
    fn failing_event_does_not_stop_the_loop() {
        let mut backend = FakeBackend::new(vec![
            WindowEvent::MapRequest {
                window: WindowId(1),
                transient: false,
            },
            WindowEvent::Destroyed(WindowId(1)),
            WindowEvent::MapRequest {
                window: WindowId(2),
                transient: false,
            },
        ]);
        backend.vanished.push(WindowId(1));
        let mut manager = Manager::new(backend, Config::default());
        let path = tmp_socket_path();
        let server = IpcServer::bind(&path).unwrap();

        let client = thread::spawn(move || send_command(&path, "quit 0").unwrap());
        run(&mut manager, &server, &CommandTable::default()).unwrap();

        assert_eq!(client.join().unwrap(), 0);
        assert_eq!(manager.shutdown(), Some(Shutdown::Quit(0)));
        let managed: Vec<_> = manager.workspaces().current().clients().iter().map(|c| c.window).collect();
        assert_eq!(managed, vec![WindowId(2)]);
    }

    #[test]
    fn lost_connection_is_fatal() {
        let mut backend = FakeBackend::new(Vec::new());
        backend.fail_polls = true;
        let mut manager = Manager::new(backend, Config::default());
        let server = IpcServer::bind(tmp_socket_path()).unwrap();

        let err = run(&mut manager, &server, &CommandTable::default()).unwrap_err();
        assert!(matches!(err, LoopError::Events(_)), "{err}");
    }

    #[test]
    fn wait_reports_only_readable_descriptors() {
        let (a, mut a_peer) = UnixStream::pair().unwrap();
        let (b, _b_peer) = UnixStream::pair().unwrap();
        a_peer.write_all(b"ping").unwrap();
        let ready = wait_readable(&[a.as_raw_fd(), b.as_raw_fd()]).unwrap();
        assert_eq!(ready, vec![true, false]);
    }
}
