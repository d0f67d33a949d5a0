//! The managed-window model.
//!
//! A [`Client`] is created when the window system reports a new top-level
//! window and lives in exactly one place at a time: a workspace's client
//! list, the delete register, or the scratchpad.  Moving a client between
//! those places moves the value; it is never shared.

use bitflags::bitflags;
use std::fmt;

/// Opaque window handle, unique across all workspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An axis-aligned rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Whether the two rectangles share any pixel.
    pub fn overlaps(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let (ax2, ay2) = (self.x as u32 + self.w as u32, self.y as u32 + self.h as u32);
        let (bx2, by2) = (other.x as u32 + other.w as u32, other.y as u32 + other.h as u32);
        (self.x as u32) < bx2 && (other.x as u32) < ax2 && (self.y as u32) < by2 && (other.y as u32) < ay2
    }
}

bitflags! {
    /// Per-client state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientFlags: u8 {
        const FULLSCREEN = 1 << 0;
        const FLOATING = 1 << 1;
        const TRANSIENT = 1 << 2;
        const URGENT = 1 << 3;
    }
}

/// A window managed by opwm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub window: WindowId,
    /// Last geometry assigned by the layout engine or by a floating
    /// move/resize.
    pub geometry: Rect,
    /// Gap kept around this client when tiled.
    pub gap: u16,
    pub flags: ClientFlags,
}

impl Client {
    /// A client with zero geometry and no flags set.
    pub fn new(window: WindowId, gap: u16) -> Self {
        Self {
            window,
            geometry: Rect::default(),
            gap,
            flags: ClientFlags::empty(),
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.flags.contains(ClientFlags::FULLSCREEN)
    }

    pub fn is_floating(&self) -> bool {
        self.flags.contains(ClientFlags::FLOATING)
    }

    pub fn is_transient(&self) -> bool {
        self.flags.contains(ClientFlags::TRANSIENT)
    }

    pub fn is_urgent(&self) -> bool {
        self.flags.contains(ClientFlags::URGENT)
    }

    /// Whether the layout engine positions this client.
    ///
    /// Floating, fullscreen and transient clients keep their own geometry.
    pub fn is_tiled(&self) -> bool {
        !self
            .flags
            .intersects(ClientFlags::FLOATING | ClientFlags::FULLSCREEN | ClientFlags::TRANSIENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_is_tiled() {
        let c = Client::new(WindowId(7), 3);
        assert!(c.is_tiled());
        assert_eq!(c.gap, 3);
        assert_eq!(c.geometry, Rect::default());
    }

    #[test]
    fn floating_fullscreen_and_transient_are_not_tiled() {
        for flag in [ClientFlags::FLOATING, ClientFlags::FULLSCREEN, ClientFlags::TRANSIENT] {
            let mut c = Client::new(WindowId(1), 0);
            c.flags.insert(flag);
            assert!(!c.is_tiled(), "{flag:?} should not be tiled");
        }
    }

    #[test]
    fn urgent_client_is_still_tiled() {
        let mut c = Client::new(WindowId(1), 0);
        c.flags.insert(ClientFlags::URGENT);
        assert!(c.is_urgent());
        assert!(c.is_tiled());
    }

    #[test]
    fn adjacent_rects_do_not_overlap() {
        let a = Rect::new(0, 0, 100, 50);
        let b = Rect::new(100, 0, 100, 50);
        let c = Rect::new(50, 25, 100, 50);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn window_id_displays_as_hex() {
        assert_eq!(WindowId(0x1c00007).to_string(), "0x1c00007");
    }
}
