//! X11 backend.
//!
//! Provides the [`WindowSystem`](crate::traits::WindowSystem) and
//! [`EventSource`](crate::traits::EventSource) implementations on top of an
//! `x11rb` connection.  Nothing outside this module should reference X11
//! directly.

pub mod backend;

pub use backend::{X11Backend, X11Error};
