//! Core traits that decouple opwm from the windowing system and from the
//! transports that deliver commands.
//!
//! The [`Manager`](crate::manager::Manager) only talks to a
//! [`WindowSystem`]; the event loop additionally needs an [`EventSource`]
//! to learn about new and vanished windows.  The X11 backend in
//! [`x11`](crate::x11) implements both; tests use recording doubles.

use crate::client::{Rect, WindowId};
use crate::command::Command;
use crate::grammar::Mode;
use crate::layout::LayoutKind;
use std::fmt;
use std::os::fd::RawFd;

/// Operations the window manager issues against the windowing system.
///
/// Every call is a request; none of them blocks on user interaction.
pub trait WindowSystem {
    /// The error type produced by this backend.
    type Error: std::error::Error + Send + 'static;

    /// Screen size in pixels as `(width, height)`.
    fn screen_size(&self) -> (u16, u16);

    fn map_window(&self, window: WindowId) -> Result<(), Self::Error>;

    fn unmap_window(&self, window: WindowId) -> Result<(), Self::Error>;

    /// Move and resize `window` and set its border width.
    fn configure_window(&self, window: WindowId, geometry: Rect, border: u16) -> Result<(), Self::Error>;

    /// Apply exactly the fields an unmanaged window asked for.
    fn forward_configure(&self, window: WindowId, changes: ConfigureChanges) -> Result<(), Self::Error>;

    fn raise_window(&self, window: WindowId) -> Result<(), Self::Error>;

    fn set_border_color(&self, window: WindowId, color: u32) -> Result<(), Self::Error>;

    /// Give input focus to `window`, or to nothing.
    fn focus_window(&self, window: Option<WindowId>) -> Result<(), Self::Error>;

    /// Politely ask `window` to close, killing its client if it does not
    /// support the close protocol.
    fn close_window(&self, window: WindowId) -> Result<(), Self::Error>;

    /// The class name the window's program advertises, if any.
    fn window_class(&self, window: WindowId) -> Result<Option<String>, Self::Error>;

    /// Every child of the root window, managed or not.
    fn top_level_windows(&self) -> Result<Vec<WindowId>, Self::Error>;

    /// Publish the current desktop (0-based) and the number of desktops.
    fn set_desktop_hints(&self, current: u32, count: u32) -> Result<(), Self::Error>;

    /// Publish the usable work area.
    fn set_workarea(&self, area: Rect) -> Result<(), Self::Error>;

    /// Publish a window's fullscreen and attention state.
    fn set_window_state(&self, window: WindowId, fullscreen: bool, urgent: bool) -> Result<(), Self::Error>;
}

/// How a client asks for a boolean window state to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    /// Resolve the action against the current value.
    pub fn apply(self, current: bool) -> bool {
        match self {
            StateAction::Remove => false,
            StateAction::Add => true,
            StateAction::Toggle => !current,
        }
    }
}

/// The fields a configure request actually sets; `None` fields keep their
/// current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigureChanges {
    pub x: Option<u16>,
    pub y: Option<u16>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub border: Option<u16>,
}

impl ConfigureChanges {
    /// Every geometry field set, border untouched.
    pub fn geometry(rect: Rect) -> Self {
        Self {
            x: Some(rect.x),
            y: Some(rect.y),
            width: Some(rect.w),
            height: Some(rect.h),
            border: None,
        }
    }

    /// Overlay the requested fields on `rect`.
    pub fn apply_to(&self, rect: Rect) -> Rect {
        Rect {
            x: self.x.unwrap_or(rect.x),
            y: self.y.unwrap_or(rect.y),
            w: self.width.unwrap_or(rect.w),
            h: self.height.unwrap_or(rect.h),
        }
    }
}

/// Window-system notifications the manager reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// A new top-level window wants to be shown.
    MapRequest { window: WindowId, transient: bool },
    /// A window went away.
    Destroyed(WindowId),
    /// A window asked for a new geometry.
    ConfigureRequest {
        window: WindowId,
        changes: ConfigureChanges,
    },
    FullscreenRequest { window: WindowId, action: StateAction },
    UrgencyChanged { window: WindowId, urgent: bool },
    /// A pager asked to switch to desktop `n` (0-based).
    DesktopRequest(u32),
    /// A pager asked to focus a window.
    ActivateRequest(WindowId),
}

/// A pollable stream of [`WindowEvent`]s.
pub trait EventSource {
    type Error: std::error::Error + Send + 'static;

    /// File descriptor that becomes readable when events may be waiting.
    fn raw_fd(&self) -> RawFd;

    /// Drain every event that is already available without blocking.
    fn poll_events(&self) -> Result<Vec<WindowEvent>, Self::Error>;

    /// Push buffered requests to the server.
    fn flush(&self) -> Result<(), Self::Error>;
}

/// Something that executes [`Command`]s; the IPC dispatcher's target.
pub trait CommandSink {
    type Error: std::error::Error;

    fn execute(&mut self, cmd: Command) -> Result<(), Self::Error>;
}

//  Status

/// A snapshot of the state a status bar shows.
///
/// Rendered as `mode:layout:workspace:state:count`, one line per change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub mode: Mode,
    pub layout: LayoutKind,
    pub workspace: usize,
    pub grammar_state: usize,
    pub clients: usize,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.mode.index(),
            self.layout.index(),
            self.workspace,
            self.grammar_state,
            self.clients
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_action_resolves() {
        assert!(!StateAction::Remove.apply(true));
        assert!(StateAction::Add.apply(false));
        assert!(StateAction::Toggle.apply(false));
        assert!(!StateAction::Toggle.apply(true));
    }

    #[test]
    fn configure_changes_overlay_only_set_fields() {
        let base = Rect::new(10, 20, 300, 200);
        let changes = ConfigureChanges {
            width: Some(640),
            border: Some(3),
            ..ConfigureChanges::default()
        };
        assert_eq!(changes.apply_to(base), Rect::new(10, 20, 640, 200));
        assert_eq!(ConfigureChanges::default().apply_to(base), base);
        assert_eq!(ConfigureChanges::geometry(Rect::new(1, 2, 3, 4)).apply_to(base), Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn status_line_format() {
        let s = Status {
            mode: Mode::Focus,
            layout: LayoutKind::HStack,
            workspace: 3,
            grammar_state: 0,
            clients: 4,
        };
        assert_eq!(s.to_string(), "1:2:3:0:4");
    }
}
