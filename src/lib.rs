//! **opwm**: a tiling window manager driven by vi-style commands.
//!
//! Commands arrive as text over a Unix socket and follow an
//! operator/count/motion grammar borrowed from modal editors: `op_kill`,
//! `count 2`, `motion c` removes two clients into a delete register, and
//! `paste` puts them back.
//!
//! # Architecture
//!
//! The crate is organised around a few core traits:
//!
//! * [`traits::WindowSystem`]: the requests the manager issues (map,
//!   configure, focus, hints) so the logic is not coupled to X11.
//! * [`traits::EventSource`]: the pollable stream of window events the
//!   main loop drains.
//! * [`traits::CommandSink`]: the target the IPC dispatcher drives.
//!
//! [`manager::Manager`] owns all state; [`event_loop::run`] multiplexes the
//! display connection and the [`ipc`] socket on one thread.  The concrete
//! backend lives in [`x11`] behind the default `x11` feature.

pub mod client;
pub mod command;
pub mod config;
pub mod event_loop;
pub mod grammar;
pub mod ipc;
pub mod layout;
pub mod manager;
pub mod register;
pub mod spawn;
pub mod traits;
pub mod workspace;
#[cfg(feature = "x11")]
pub mod x11;
