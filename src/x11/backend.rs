//! [`WindowSystem`] and [`EventSource`] backed by an X11 connection.
//!
//! The backend claims `SubstructureRedirect` on the root window, so it is
//! the window manager for as long as the connection lives.  Requests are
//! buffered by `x11rb` and pushed out by [`EventSource::flush`], which the
//! event loop calls once per iteration.

use crate::client::{Rect, WindowId};
use crate::traits::{ConfigureChanges, EventSource, StateAction, WindowEvent, WindowSystem};
use log::{debug, info, warn};
use std::os::fd::{AsRawFd, RawFd};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::CURRENT_TIME;

/// Urgency bit in the `WM_HINTS` flags word.
const URGENCY_HINT: u32 = 1 << 8;

x11rb::atom_manager! {
    /// Atoms interned once at startup.
    pub Atoms: AtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        UTF8_STRING,
        _NET_SUPPORTED,
        _NET_SUPPORTING_WM_CHECK,
        _NET_WM_NAME,
        _NET_WM_STATE,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_STATE_DEMANDS_ATTENTION,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_CURRENT_DESKTOP,
        _NET_NUMBER_OF_DESKTOPS,
        _NET_WORKAREA,
        _NET_ACTIVE_WINDOW,
    }
}

/// Errors that can occur when talking to the X server.
#[derive(Debug, thiserror::Error)]
#[error("x11 error: {0}")]
pub struct X11Error(String);

fn x11<E: std::fmt::Display>(e: E) -> X11Error {
    X11Error(e.to_string())
}

/// A reply, or `None` when the server answered with a protocol error.
///
/// Windows may vanish between an event and the query about them, so a
/// protocol error only means the window is gone.  A broken connection
/// stays an error.
fn reply_or_gone<T>(reply: Result<T, ReplyError>) -> Result<Option<T>, X11Error> {
    match reply {
        Ok(r) => Ok(Some(r)),
        Err(ReplyError::X11Error(e)) => {
            debug!("request failed: {:?}", e);
            Ok(None)
        }
        Err(e) => Err(x11(e)),
    }
}

/// X11-backed window system.
pub struct X11Backend {
    conn: RustConnection,
    root: Window,
    screen: (u16, u16),
    atoms: Atoms,
    /// Child of the root advertised through `_NET_SUPPORTING_WM_CHECK`.
    check_window: Window,
}

impl X11Backend {
    /// Connect to `$DISPLAY` and become its window manager.
    ///
    /// Fails if another window manager already holds the root window.
    pub fn connect() -> Result<Self, X11Error> {
        let (conn, screen_num) =
            RustConnection::connect(None).map_err(|e| X11Error(format!("connect: {}", e)))?;
        let (root, screen) = {
            let s = conn
                .setup()
                .roots
                .get(screen_num)
                .ok_or_else(|| X11Error(format!("no screen {}", screen_num)))?;
            (s.root, (s.width_in_pixels, s.height_in_pixels))
        };
        let atoms = Atoms::new(&conn).map_err(x11)?.reply().map_err(x11)?;

        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::STRUCTURE_NOTIFY
            | EventMask::PROPERTY_CHANGE;
        conn.change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(mask))
            .map_err(x11)?
            .check()
            .map_err(|_| X11Error("another window manager is already running".into()))?;

        let check_window = conn.generate_id().map_err(x11)?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            check_window,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )
        .map_err(x11)?;

        let backend = Self {
            conn,
            root,
            screen,
            atoms,
            check_window,
        };
        backend.advertise()?;
        backend.conn.flush().map_err(x11)?;
        info!("managing root {:#x} ({}x{})", root, screen.0, screen.1);
        Ok(backend)
    }

    /// Publish the EWMH hints that identify a compliant window manager.
    fn advertise(&self) -> Result<(), X11Error> {
        let a = &self.atoms;
        let supported = [
            a._NET_SUPPORTED,
            a._NET_SUPPORTING_WM_CHECK,
            a._NET_WM_NAME,
            a._NET_WM_STATE,
            a._NET_WM_STATE_FULLSCREEN,
            a._NET_WM_STATE_DEMANDS_ATTENTION,
            a._NET_CURRENT_DESKTOP,
            a._NET_NUMBER_OF_DESKTOPS,
            a._NET_WORKAREA,
            a._NET_ACTIVE_WINDOW,
        ];
        self.conn
            .change_property32(PropMode::REPLACE, self.root, a._NET_SUPPORTED, AtomEnum::ATOM, &supported)
            .map_err(x11)?;
        for w in [self.root, self.check_window] {
            self.conn
                .change_property32(
                    PropMode::REPLACE,
                    w,
                    a._NET_SUPPORTING_WM_CHECK,
                    AtomEnum::WINDOW,
                    &[self.check_window],
                )
                .map_err(x11)?;
        }
        self.conn
            .change_property8(PropMode::REPLACE, self.check_window, a._NET_WM_NAME, a.UTF8_STRING, b"opwm")
            .map_err(x11)?;
        Ok(())
    }

    /// First 32-bit values of `property` on `window`, empty when unset or
    /// when the window no longer exists.
    fn property32(
        &self,
        window: Window,
        property: impl Into<Atom>,
        type_: impl Into<Atom>,
        len: u32,
    ) -> Result<Vec<u32>, X11Error> {
        let cookie = self
            .conn
            .get_property(false, window, property, type_, 0, len)
            .map_err(x11)?;
        Ok(reply_or_gone(cookie.reply())?
            .and_then(|reply| reply.value32().map(|v| v.collect()))
            .unwrap_or_default())
    }

    fn supports_delete(&self, window: Window) -> Result<bool, X11Error> {
        let protocols = self.property32(window, self.atoms.WM_PROTOCOLS, AtomEnum::ATOM, 32)?;
        Ok(protocols.contains(&self.atoms.WM_DELETE_WINDOW))
    }

    fn is_transient(&self, window: Window) -> Result<bool, X11Error> {
        let parent = self.property32(window, AtomEnum::WM_TRANSIENT_FOR, AtomEnum::WINDOW, 1)?;
        Ok(parent.first().is_some_and(|&p| p != x11rb::NONE))
    }

    fn is_dock(&self, window: Window) -> Result<bool, X11Error> {
        let types = self.property32(window, self.atoms._NET_WM_WINDOW_TYPE, AtomEnum::ATOM, 32)?;
        Ok(types.contains(&self.atoms._NET_WM_WINDOW_TYPE_DOCK))
    }

    fn is_urgent(&self, window: Window) -> Result<bool, X11Error> {
        let hints = self.property32(window, AtomEnum::WM_HINTS, AtomEnum::WM_HINTS, 9)?;
        Ok(hints.first().is_some_and(|&flags| flags & URGENCY_HINT != 0))
    }

    /// Turn one X event into the manager's vocabulary.
    fn translate(&self, event: Event) -> Result<Option<WindowEvent>, X11Error> {
        let translated = match event {
            Event::MapRequest(e) => {
                if self.is_dock(e.window)? {
                    debug!("mapping dock {:#x} unmanaged", e.window);
                    self.conn.map_window(e.window).map_err(x11)?;
                    return Ok(None);
                }
                self.conn
                    .change_window_attributes(
                        e.window,
                        &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
                    )
                    .map_err(x11)?;
                Some(WindowEvent::MapRequest {
                    window: WindowId(e.window),
                    transient: self.is_transient(e.window)?,
                })
            }
            Event::DestroyNotify(e) => Some(WindowEvent::Destroyed(WindowId(e.window))),
            Event::ConfigureRequest(e) => {
                let mask = u16::from(e.value_mask);
                let set = |flag: ConfigWindow| mask & u16::from(flag) != 0;
                Some(WindowEvent::ConfigureRequest {
                    window: WindowId(e.window),
                    changes: ConfigureChanges {
                        x: set(ConfigWindow::X).then_some(clamp_coord(e.x)),
                        y: set(ConfigWindow::Y).then_some(clamp_coord(e.y)),
                        width: set(ConfigWindow::WIDTH).then_some(e.width),
                        height: set(ConfigWindow::HEIGHT).then_some(e.height),
                        border: set(ConfigWindow::BORDER_WIDTH).then_some(e.border_width),
                    },
                })
            }
            Event::ClientMessage(e) => self.translate_message(&e),
            Event::PropertyNotify(e) if e.atom == u32::from(AtomEnum::WM_HINTS) => {
                Some(WindowEvent::UrgencyChanged {
                    window: WindowId(e.window),
                    urgent: self.is_urgent(e.window)?,
                })
            }
            Event::Error(e) => {
                warn!("x11 request error: {:?}", e);
                None
            }
            _ => None,
        };
        Ok(translated)
    }

    fn translate_message(&self, e: &ClientMessageEvent) -> Option<WindowEvent> {
        let data = e.data.as_data32();
        let a = &self.atoms;
        if e.type_ == a._NET_WM_STATE {
            if data[1] != a._NET_WM_STATE_FULLSCREEN && data[2] != a._NET_WM_STATE_FULLSCREEN {
                return None;
            }
            let action = state_action(data[0])?;
            Some(WindowEvent::FullscreenRequest {
                window: WindowId(e.window),
                action,
            })
        } else if e.type_ == a._NET_CURRENT_DESKTOP {
            Some(WindowEvent::DesktopRequest(data[0]))
        } else if e.type_ == a._NET_ACTIVE_WINDOW {
            Some(WindowEvent::ActivateRequest(WindowId(e.window)))
        } else {
            debug!("ignoring client message {} for {:#x}", e.type_, e.window);
            None
        }
    }
}

impl WindowSystem for X11Backend {
    type Error = X11Error;

    fn screen_size(&self) -> (u16, u16) {
        self.screen
    }

    fn map_window(&self, window: WindowId) -> Result<(), X11Error> {
        self.conn.map_window(window.0).map_err(x11)?;
        Ok(())
    }

    fn unmap_window(&self, window: WindowId) -> Result<(), X11Error> {
        self.conn.unmap_window(window.0).map_err(x11)?;
        Ok(())
    }

    fn configure_window(&self, window: WindowId, geometry: Rect, border: u16) -> Result<(), X11Error> {
        let aux = ConfigureWindowAux::new()
            .x(i32::from(geometry.x))
            .y(i32::from(geometry.y))
            .width(u32::from(geometry.w.max(1)))
            .height(u32::from(geometry.h.max(1)))
            .border_width(u32::from(border));
        self.conn.configure_window(window.0, &aux).map_err(x11)?;
        Ok(())
    }

    fn forward_configure(&self, window: WindowId, changes: ConfigureChanges) -> Result<(), X11Error> {
        let mut aux = ConfigureWindowAux::new();
        aux.x = changes.x.map(i32::from);
        aux.y = changes.y.map(i32::from);
        aux.width = changes.width.map(u32::from);
        aux.height = changes.height.map(u32::from);
        aux.border_width = changes.border.map(u32::from);
        self.conn.configure_window(window.0, &aux).map_err(x11)?;
        Ok(())
    }

    fn raise_window(&self, window: WindowId) -> Result<(), X11Error> {
        let aux = ConfigureWindowAux::new().stack_mode(StackMode::ABOVE);
        self.conn.configure_window(window.0, &aux).map_err(x11)?;
        Ok(())
    }

    fn set_border_color(&self, window: WindowId, color: u32) -> Result<(), X11Error> {
        let aux = ChangeWindowAttributesAux::new().border_pixel(color);
        self.conn.change_window_attributes(window.0, &aux).map_err(x11)?;
        Ok(())
    }

    fn focus_window(&self, window: Option<WindowId>) -> Result<(), X11Error> {
        match window {
            Some(w) => {
                self.conn
                    .set_input_focus(InputFocus::POINTER_ROOT, w.0, CURRENT_TIME)
                    .map_err(x11)?;
                self.conn
                    .change_property32(
                        PropMode::REPLACE,
                        self.root,
                        self.atoms._NET_ACTIVE_WINDOW,
                        AtomEnum::WINDOW,
                        &[w.0],
                    )
                    .map_err(x11)?;
            }
            None => {
                self.conn
                    .set_input_focus(InputFocus::POINTER_ROOT, self.root, CURRENT_TIME)
                    .map_err(x11)?;
                self.conn
                    .delete_property(self.root, self.atoms._NET_ACTIVE_WINDOW)
                    .map_err(x11)?;
            }
        }
        Ok(())
    }

    fn close_window(&self, window: WindowId) -> Result<(), X11Error> {
        if self.supports_delete(window.0)? {
            let event = ClientMessageEvent {
                response_type: CLIENT_MESSAGE_EVENT,
                format: 32,
                sequence: 0,
                window: window.0,
                type_: self.atoms.WM_PROTOCOLS,
                data: ClientMessageData::from([self.atoms.WM_DELETE_WINDOW, CURRENT_TIME, 0, 0, 0]),
            };
            self.conn
                .send_event(false, window.0, EventMask::NO_EVENT, event)
                .map_err(x11)?;
            debug!("sent WM_DELETE_WINDOW to {}", window);
        } else {
            self.conn.kill_client(window.0).map_err(x11)?;
            debug!("killed client of {}", window);
        }
        Ok(())
    }

    fn window_class(&self, window: WindowId) -> Result<Option<String>, X11Error> {
        let cookie = self
            .conn
            .get_property(false, window.0, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 256)
            .map_err(x11)?;
        Ok(reply_or_gone(cookie.reply())?.and_then(|reply| parse_wm_class(&reply.value)))
    }

    fn top_level_windows(&self) -> Result<Vec<WindowId>, X11Error> {
        let tree = self.conn.query_tree(self.root).map_err(x11)?.reply().map_err(x11)?;
        Ok(tree
            .children
            .into_iter()
            .filter(|&w| w != self.check_window)
            .map(WindowId)
            .collect())
    }

    fn set_desktop_hints(&self, current: u32, count: u32) -> Result<(), X11Error> {
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms._NET_NUMBER_OF_DESKTOPS,
                AtomEnum::CARDINAL,
                &[count],
            )
            .map_err(x11)?;
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms._NET_CURRENT_DESKTOP,
                AtomEnum::CARDINAL,
                &[current],
            )
            .map_err(x11)?;
        Ok(())
    }

    fn set_workarea(&self, area: Rect) -> Result<(), X11Error> {
        let value = [
            u32::from(area.x),
            u32::from(area.y),
            u32::from(area.w),
            u32::from(area.h),
        ];
        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms._NET_WORKAREA,
                AtomEnum::CARDINAL,
                &value,
            )
            .map_err(x11)?;
        Ok(())
    }

    fn set_window_state(&self, window: WindowId, fullscreen: bool, urgent: bool) -> Result<(), X11Error> {
        let states = state_atoms(
            self.atoms._NET_WM_STATE_FULLSCREEN,
            self.atoms._NET_WM_STATE_DEMANDS_ATTENTION,
            fullscreen,
            urgent,
        );
        self.conn
            .change_property32(PropMode::REPLACE, window.0, self.atoms._NET_WM_STATE, AtomEnum::ATOM, &states)
            .map_err(x11)?;
        Ok(())
    }
}

impl EventSource for X11Backend {
    type Error = X11Error;

    fn raw_fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }

    fn poll_events(&self) -> Result<Vec<WindowEvent>, X11Error> {
        let mut events = Vec::new();
        while let Some(event) = self.conn.poll_for_event().map_err(x11)? {
            if let Some(translated) = self.translate(event)? {
                events.push(translated);
            }
        }
        Ok(events)
    }

    fn flush(&self) -> Result<(), X11Error> {
        self.conn.flush().map_err(x11)?;
        Ok(())
    }
}

//  Property helpers

/// The class part of a `WM_CLASS` value (`instance\0class\0`), falling back
/// to the instance when no class is present.
fn parse_wm_class(raw: &[u8]) -> Option<String> {
    let mut parts = raw
        .split(|&b| b == 0)
        .filter(|p| !p.is_empty())
        .map(|p| String::from_utf8_lossy(p).into_owned());
    let instance = parts.next()?;
    Some(parts.next().unwrap_or(instance))
}

/// `_NET_WM_STATE` client message action codes.
fn state_action(code: u32) -> Option<StateAction> {
    match code {
        0 => Some(StateAction::Remove),
        1 => Some(StateAction::Add),
        2 => Some(StateAction::Toggle),
        _ => None,
    }
}

fn state_atoms(fullscreen_atom: Atom, urgent_atom: Atom, fullscreen: bool, urgent: bool) -> Vec<Atom> {
    let mut states = Vec::with_capacity(2);
    if fullscreen {
        states.push(fullscreen_atom);
    }
    if urgent {
        states.push(urgent_atom);
    }
    states
}

fn clamp_coord(v: i16) -> u16 {
    v.max(0) as u16
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wm_class_prefers_class_over_instance() {
        assert_eq!(parse_wm_class(b"navigator\0Firefox\0").as_deref(), Some("Firefox"));
        assert_eq!(parse_wm_class(b"xterm\0").as_deref(), Some("xterm"));
        assert_eq!(parse_wm_class(b""), None);
    }

    #[test]
    fn wm_state_actions() {
        assert_eq!(state_action(0), Some(StateAction::Remove));
        assert_eq!(state_action(1), Some(StateAction::Add));
        assert_eq!(state_action(2), Some(StateAction::Toggle));
        assert_eq!(state_action(3), None);
    }

    #[test]
    fn state_list_holds_only_set_states() {
        assert!(state_atoms(10, 20, false, false).is_empty());
        assert_eq!(state_atoms(10, 20, true, false), vec![10]);
        assert_eq!(state_atoms(10, 20, true, true), vec![10, 20]);
    }

    #[test]
    fn replies_pass_through() {
        assert_eq!(reply_or_gone(Ok::<u32, ReplyError>(7)).unwrap(), Some(7));
    }

    #[test]
    fn broken_connection_is_still_an_error() {
        let reply: Result<u32, ReplyError> =
            Err(ReplyError::ConnectionError(x11rb::errors::ConnectionError::UnknownError));
        assert!(reply_or_gone(reply).is_err());
    }

    #[test]
    fn negative_request_coordinates_clamp_to_zero() {
        assert_eq!(clamp_coord(-40), 0);
        assert_eq!(clamp_coord(12), 12);
    }
}
