//! The orchestrator that ties workspaces, layouts, the operator grammar and
//! the windowing system together.
//!
//! [`Manager`] owns every piece of window-manager state.  It reacts to
//! [`Command`]s (from IPC) and [`WindowEvent`]s (from the windowing system)
//! by updating that state and issuing calls to the [`WindowSystem`] trait.
//!
//! Requests that make no sense in the current state (an out-of-range
//! workspace, a resize that would leave the valid range, a motion with no
//! operator) are logged and ignored; they are not errors.  Only failures of
//! the windowing system itself or of process launching surface as
//! [`WmError`].

use crate::client::{Client, ClientFlags, Rect, WindowId};
use crate::command::{Command, TeleportLocation};
use crate::config::Config;
use crate::grammar::{Grammar, Invocation, Mode, Operator, Scope};
use crate::layout::{self, LayoutKind, LayoutParams};
use crate::register::DeleteRegister;
use crate::spawn::{spawn_detached, SpawnError};
use crate::traits::{CommandSink, ConfigureChanges, Status, WindowEvent, WindowSystem};
use crate::workspace::Workspaces;
use log::{debug, info, warn};
use std::sync::mpsc;

/// Possible errors from the manager.
#[derive(Debug, thiserror::Error)]
pub enum WmError {
    /// The windowing system rejected a request.
    #[error("window system error: {0}")]
    WindowSystem(String),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

fn backend<E: std::fmt::Display>(e: E) -> WmError {
    WmError::WindowSystem(e.to_string())
}

/// Why the main loop should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Exit with the given status.
    Quit(i32),
    /// Re-execute the binary in place.
    Restart,
}

/// Owns the window-manager state and drives a [`WindowSystem`].
///
/// # Typical usage
///
/// ```ignore
/// let backend = X11Backend::connect()?;
/// let mut manager = Manager::new(backend, Config::default());
/// manager.start()?;
/// manager.handle(Command::ChangeWorkspace(2))?;
/// ```
pub struct Manager<W: WindowSystem> {
    wm: W,
    config: Config,
    workspaces: Workspaces,
    grammar: Grammar,
    mode: Mode,
    register: DeleteRegister,
    scratchpad: Option<Client>,
    last_layout: LayoutKind,
    shutdown: Option<Shutdown>,
    status_tx: Option<mpsc::Sender<Status>>,
    last_status: Option<Status>,
}

impl<W: WindowSystem> Manager<W> {
    pub fn new(wm: W, config: Config) -> Self {
        let workspaces = Workspaces::new(
            config.workspaces,
            config.default_workspace,
            config.workspace_defaults(),
        );
        let register =
            DeleteRegister::new(config.register.capacity, config.register.merge_consecutive);
        let last_layout = config.layout;
        Self {
            wm,
            config,
            workspaces,
            grammar: Grammar::new(),
            mode: Mode::default(),
            register,
            scratchpad: None,
            last_layout,
            shutdown: None,
            status_tx: None,
            last_status: None,
        }
    }

    /// Attach a status channel.  A [`Status`] is sent whenever the mode,
    /// layout, workspace, grammar state or client count changes.
    pub fn set_status_channel(&mut self, tx: mpsc::Sender<Status>) {
        self.status_tx = Some(tx);
    }

    /// Publish the initial desktop hints and status.
    pub fn start(&mut self) -> Result<(), WmError> {
        info!(
            "starting on workspace {} of {}",
            self.workspaces.current_index(),
            self.workspaces.count()
        );
        self.publish_desktop()?;
        self.publish_workarea()?;
        self.emit_status();
        Ok(())
    }

    //  Accessors

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspaces(&self) -> &Workspaces {
        &self.workspaces
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn register(&self) -> &DeleteRegister {
        &self.register
    }

    pub fn scratchpad(&self) -> Option<&Client> {
        self.scratchpad.as_ref()
    }

    pub fn window_system(&self) -> &W {
        &self.wm
    }

    /// Set once `quit` or `restart` has been handled.
    pub fn shutdown(&self) -> Option<Shutdown> {
        self.shutdown
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_none()
    }

    pub fn status(&self) -> Status {
        let ws = self.workspaces.current();
        Status {
            mode: self.mode,
            layout: ws.layout,
            workspace: self.workspaces.current_index(),
            grammar_state: self.grammar.state().index(),
            clients: ws.len(),
        }
    }

    /// Process a single [`Command`].
    ///
    /// If the windowing system fails part-way, the state already updated is
    /// kept; the error is returned for the caller to log.
    pub fn handle(&mut self, cmd: Command) -> Result<(), WmError> {
        let result = self.dispatch(cmd);
        self.emit_status();
        result
    }

    fn dispatch(&mut self, cmd: Command) -> Result<(), WmError> {
        match cmd {
            Command::ChangeWorkspace(n) => match usize::try_from(n) {
                Ok(index) => self.change_ws(index),
                Err(_) => {
                    debug!("ignoring switch to workspace {}", n);
                    Ok(())
                }
            },
            Command::FocusNextWorkspace => self.change_ws(self.workspaces.wrap(1)),
            Command::FocusPrevWorkspace => self.change_ws(self.workspaces.wrap(-1)),
            Command::FocusLastWorkspace => self.change_ws(self.workspaces.last_index()),
            Command::CurrentToWorkspace(n) => match usize::try_from(n) {
                Ok(index) => self.current_to_ws(index),
                Err(_) => {
                    debug!("ignoring move to workspace {}", n);
                    Ok(())
                }
            },
            Command::FocusUrgent => self.focus_urgent(),
            Command::ToggleBar => self.toggle_bar(),

            Command::FocusNextClient => self.focus_by(1, true),
            Command::FocusPrevClient => self.focus_by(1, false),
            Command::MoveCurrentUp => self.move_current_by(1, true),
            Command::MoveCurrentDown => self.move_current_by(1, false),
            Command::MakeMaster => self.make_master(),
            Command::ToggleFloat => self.toggle_float(),
            Command::ToggleFullscreen => match self.workspaces.current().current_client() {
                Some(c) => {
                    let (window, on) = (c.window, !c.is_fullscreen());
                    self.set_fullscreen(window, on)
                }
                None => Ok(()),
            },
            Command::ResizeFloatWidth(dw) => self.adjust_float(|r| match r.w as i32 + dw {
                w if w <= 0 => false,
                w => {
                    r.w = clamp_u16(w);
                    true
                }
            }),
            Command::ResizeFloatHeight(dh) => self.adjust_float(|r| match r.h as i32 + dh {
                h if h <= 0 => false,
                h => {
                    r.h = clamp_u16(h);
                    true
                }
            }),
            Command::MoveFloatX(dx) => self.adjust_float(|r| {
                r.x = clamp_u16(r.x as i32 + dx);
                true
            }),
            Command::MoveFloatY(dy) => self.adjust_float(|r| {
                r.y = clamp_u16(r.y as i32 + dy);
                true
            }),
            Command::Teleport(idx) => match TeleportLocation::from_index(idx) {
                Some(location) => self.teleport(location),
                None => {
                    debug!("ignoring unknown teleport location {}", idx);
                    Ok(())
                }
            },
            Command::SendToScratchpad => self.send_to_scratchpad(),
            Command::GetFromScratchpad => self.get_from_scratchpad(),

            Command::ChangeLayout(idx) => match LayoutKind::from_index(idx) {
                Some(layout) => self.change_layout(layout),
                None => {
                    debug!("ignoring unknown layout {}", idx);
                    Ok(())
                }
            },
            Command::NextLayout => self.change_layout(self.workspaces.current().layout.next()),
            Command::PrevLayout => self.change_layout(self.workspaces.current().layout.prev()),
            Command::LastLayout => self.change_layout(self.last_layout),
            Command::ResizeMaster(percent) => self.resize_master(percent),

            Command::ChangeMode(idx) => {
                match Mode::from_index(idx) {
                    Some(mode) if mode != self.mode => {
                        info!("mode {} -> {}", self.mode, mode);
                        self.mode = mode;
                    }
                    _ => debug!("ignoring mode change to {}", idx),
                }
                Ok(())
            }
            Command::Operator(op) => {
                debug!("operator {}", op);
                self.grammar.select_operator(op);
                Ok(())
            }
            Command::Count(n) => {
                if !self.grammar.set_count(n) {
                    debug!("ignoring count {} in state {:?}", n, self.grammar.state());
                }
                Ok(())
            }
            Command::Motion(token) => match self.grammar.motion(&token) {
                Some(invocation) => self.run_operator(invocation),
                None => {
                    debug!("ignoring motion {:?} in state {:?}", token, self.grammar.state());
                    Ok(())
                }
            },
            Command::Paste => self.paste(),

            Command::Spawn(argv) => {
                spawn_detached(&argv)?;
                Ok(())
            }
            Command::Quit(status) => {
                info!("quit requested with status {}", status);
                self.shutdown = Some(Shutdown::Quit(status));
                Ok(())
            }
            Command::Restart => {
                info!("restart requested");
                self.shutdown = Some(Shutdown::Restart);
                Ok(())
            }
        }
    }

    /// React to a notification from the windowing system.
    pub fn handle_event(&mut self, event: WindowEvent) -> Result<(), WmError> {
        let result = match event {
            WindowEvent::MapRequest { window, transient } => self.manage(window, transient),
            WindowEvent::Destroyed(window) => self.unmanage(window),
            WindowEvent::ConfigureRequest { window, changes } => {
                self.configure_request(window, changes)
            }
            WindowEvent::FullscreenRequest { window, action } => {
                match self.workspaces.find(window) {
                    Some((_, c)) => {
                        let on = action.apply(c.is_fullscreen());
                        self.set_fullscreen(window, on)
                    }
                    None => Ok(()),
                }
            }
            WindowEvent::UrgencyChanged { window, urgent } => self.set_urgent(window, urgent),
            WindowEvent::DesktopRequest(n) => self.change_ws((n as usize).saturating_add(1)),
            WindowEvent::ActivateRequest(window) => self.activate(window),
        };
        self.emit_status();
        result
    }

    /// Close every top-level window and release all state.
    pub fn teardown(&mut self) -> Result<(), WmError> {
        info!("tearing down");
        let windows = self.wm.top_level_windows().map_err(backend)?;
        for window in windows {
            if let Err(e) = self.wm.close_window(window) {
                warn!("failed to close {}: {}", window, e);
            }
        }
        self.wm.focus_window(None).map_err(backend)?;
        let held = self.register.drain().len();
        if held > 0 {
            debug!("released {} client(s) from the delete register", held);
        }
        self.scratchpad = None;
        for (_, ws) in self.workspaces.iter_mut() {
            ws.take_all();
        }
        Ok(())
    }

    //  Status

    fn emit_status(&mut self) {
        let status = self.status();
        if self.last_status == Some(status) {
            return;
        }
        self.last_status = Some(status);
        debug!("status {}", status);
        if let Some(tx) = &self.status_tx {
            let _ = tx.send(status);
        }
    }

    fn publish_desktop(&self) -> Result<(), WmError> {
        let current = (self.workspaces.current_index() - 1) as u32;
        let count = self.workspaces.count() as u32;
        self.wm.set_desktop_hints(current, count).map_err(backend)
    }

    fn publish_workarea(&self) -> Result<(), WmError> {
        let area = self.usable_area(self.workspaces.current().bar_height);
        self.wm.set_workarea(area).map_err(backend)
    }

    //  Geometry and drawing

    /// The screen minus a bar of `bar_height`.
    fn usable_area(&self, bar_height: u16) -> Rect {
        let (sw, sh) = self.wm.screen_size();
        let bar = bar_height.min(sh);
        let y = if self.config.bar.bottom { 0 } else { bar };
        Rect::new(0, y, sw, sh - bar)
    }

    fn screen(&self) -> Rect {
        let (sw, sh) = self.wm.screen_size();
        Rect::new(0, 0, sw, sh)
    }

    /// Recompute tiled geometry on the current workspace and redraw it.
    fn arrange(&mut self) -> Result<(), WmError> {
        let ws = self.workspaces.current();
        let params = LayoutParams {
            kind: ws.layout,
            area: self.usable_area(ws.bar_height),
            master_ratio: ws.master_ratio,
            border: self.config.border.width,
            zoom_gap: self.config.zoom_gap,
        };
        let gaps: Vec<u16> = ws.clients().iter().filter(|c| c.is_tiled()).map(|c| c.gap).collect();
        let mut cells = layout::arrange(&params, &gaps).into_iter();
        for client in self.workspaces.current_mut().clients_mut() {
            if client.is_tiled() {
                if let Some(rect) = cells.next() {
                    client.geometry = rect;
                }
            }
        }
        debug!("arranged {} tiled client(s) as {}", gaps.len(), params.kind);
        self.draw_clients()
    }

    fn draw_clients(&self) -> Result<(), WmError> {
        let screen = self.screen();
        let border = self.config.border.width;
        for c in self.workspaces.current().clients() {
            if c.is_fullscreen() {
                self.wm.configure_window(c.window, screen, 0).map_err(backend)?;
            } else {
                self.wm.configure_window(c.window, c.geometry, border).map_err(backend)?;
            }
        }
        self.restack()
    }

    /// Raise floating clients over tiled ones and fullscreen over all.
    fn restack(&self) -> Result<(), WmError> {
        let ws = self.workspaces.current();
        let current = ws.current_client();
        if let Some(c) = current {
            if c.is_tiled() && ws.layout == LayoutKind::Zoom {
                self.wm.raise_window(c.window).map_err(backend)?;
            }
        }
        let floating = |c: &&Client| !c.is_tiled() && !c.is_fullscreen();
        for c in ws.clients().iter().filter(floating) {
            if Some(c.window) != ws.current() {
                self.wm.raise_window(c.window).map_err(backend)?;
            }
        }
        if let Some(c) = current.filter(floating) {
            self.wm.raise_window(c.window).map_err(backend)?;
        }
        for c in ws.clients().iter().filter(|c| c.is_fullscreen()) {
            self.wm.raise_window(c.window).map_err(backend)?;
        }
        Ok(())
    }

    fn paint_borders(&self) -> Result<(), WmError> {
        let colors = &self.config.border;
        let ws = self.workspaces.current();
        for c in ws.clients() {
            let color = if Some(c.window) == ws.current() {
                colors.focus
            } else if c.is_urgent() {
                colors.urgent
            } else if Some(c.window) == ws.prev_focus() {
                colors.prev_focus
            } else {
                colors.unfocus
            };
            self.wm.set_border_color(c.window, color.0).map_err(backend)?;
        }
        Ok(())
    }

    //  Focus

    /// Focus `window` on the current workspace, or clear the focus.
    fn focus_client(&mut self, window: Option<WindowId>) -> Result<(), WmError> {
        let ws = self.workspaces.current_mut();
        if !ws.set_current(window) {
            debug!("{:?} is not on the current workspace", window);
            return Ok(());
        }
        let cleared = ws.current_client_mut().filter(|c| c.is_urgent()).map(|c| {
            c.flags.remove(ClientFlags::URGENT);
            (c.window, c.is_fullscreen())
        });
        if let Some((w, fullscreen)) = cleared {
            self.wm.set_window_state(w, fullscreen, false).map_err(backend)?;
        }
        self.paint_borders()?;
        self.restack()?;
        self.wm
            .focus_window(self.workspaces.current().current())
            .map_err(backend)
    }

    /// Re-apply the current workspace's focus to the windowing system.
    fn refresh_focus(&mut self) -> Result<(), WmError> {
        let current = self.workspaces.current().current();
        self.focus_client(current)
    }

    fn focus_by(&mut self, count: usize, forward: bool) -> Result<(), WmError> {
        let ws = self.workspaces.current();
        let Some(mut target) = ws.current().or_else(|| ws.head()) else {
            return Ok(());
        };
        for _ in 0..count {
            let step = if forward { ws.next(target) } else { ws.prev(target) };
            match step {
                Some(w) => target = w,
                None => break,
            }
        }
        if Some(target) == ws.current() {
            return Ok(());
        }
        self.focus_client(Some(target))
    }

    /// The focused client and up to `count - 1` successors, wrapping.
    fn clients_from_current(&self, count: usize) -> Vec<WindowId> {
        let ws = self.workspaces.current();
        let Some(start) = ws.current() else {
            return Vec::new();
        };
        let wanted = count.min(ws.len());
        let mut out = vec![start];
        let mut at = start;
        while out.len() < wanted {
            match ws.next(at) {
                Some(w) => {
                    out.push(w);
                    at = w;
                }
                None => break,
            }
        }
        out
    }

    /// The current workspace and up to `count - 1` following ones, wrapping.
    fn workspaces_from_current(&self, count: usize) -> Vec<usize> {
        let n = count.min(self.workspaces.count());
        (0..n).map(|i| self.workspaces.wrap(i as i64)).collect()
    }

    //  Workspaces

    fn change_ws(&mut self, index: usize) -> Result<(), WmError> {
        let old = self.workspaces.current_index();
        if !self.workspaces.select(index) {
            debug!("ignoring switch to workspace {}", index);
            return Ok(());
        }
        info!("workspace {} -> {}", old, index);
        for c in self.workspaces.current().clients() {
            self.wm.map_window(c.window).map_err(backend)?;
        }
        if let Some(prev) = self.workspaces.get(old) {
            for c in prev.clients() {
                self.wm.unmap_window(c.window).map_err(backend)?;
            }
        }
        self.publish_desktop()?;
        self.publish_workarea()?;
        self.arrange()?;
        self.refresh_focus()
    }

    fn current_to_ws(&mut self, target: usize) -> Result<(), WmError> {
        if target == self.workspaces.current_index() || !self.workspaces.is_valid(target) {
            debug!("ignoring move to workspace {}", target);
            return Ok(());
        }
        let ws = self.workspaces.current_mut();
        let Some(window) = ws.current() else {
            return Ok(());
        };
        let Some(client) = ws.remove(window, true) else {
            return Ok(());
        };
        info!("moving {} to workspace {}", window, target);
        if let Some(dest) = self.workspaces.get_mut(target) {
            dest.push(client);
            dest.set_current(Some(window));
        }
        self.wm.unmap_window(window).map_err(backend)?;
        if self.config.follow_move {
            self.change_ws(target)
        } else {
            self.arrange()?;
            self.refresh_focus()
        }
    }

    fn focus_urgent(&mut self) -> Result<(), WmError> {
        let found = self.workspaces.iter().find_map(|(index, ws)| {
            ws.clients()
                .iter()
                .find(|c| c.is_urgent())
                .map(|c| (index, c.window))
        });
        let Some((index, window)) = found else {
            debug!("no urgent client");
            return Ok(());
        };
        if index != self.workspaces.current_index() {
            self.change_ws(index)?;
        }
        self.focus_client(Some(window))
    }

    fn toggle_bar(&mut self) -> Result<(), WmError> {
        let configured = self.config.bar.height;
        if configured == 0 {
            debug!("no bar configured");
            return Ok(());
        }
        let ws = self.workspaces.current_mut();
        ws.bar_height = if ws.bar_height == 0 { configured } else { 0 };
        info!("bar height {}", ws.bar_height);
        self.publish_workarea()?;
        self.arrange()
    }

    fn activate(&mut self, window: WindowId) -> Result<(), WmError> {
        let Some((index, _)) = self.workspaces.find(window) else {
            debug!("ignoring activation of unmanaged {}", window);
            return Ok(());
        };
        if index != self.workspaces.current_index() {
            self.change_ws(index)?;
        }
        self.focus_client(Some(window))
    }

    //  Clients

    fn move_current_by(&mut self, count: usize, up: bool) -> Result<(), WmError> {
        let ws = self.workspaces.current_mut();
        let Some(window) = ws.current() else {
            return Ok(());
        };
        let mut moved = false;
        for _ in 0..count {
            let step = if up { ws.move_up(window) } else { ws.move_down(window) };
            if !step {
                break;
            }
            moved = true;
        }
        if moved {
            self.arrange()?;
        }
        Ok(())
    }

    fn make_master(&mut self) -> Result<(), WmError> {
        let ws = self.workspaces.current_mut();
        if !ws.layout.is_stack() || ws.len() < 2 {
            return Ok(());
        }
        let Some(window) = ws.current() else {
            return Ok(());
        };
        if ws.head() == Some(window) {
            return Ok(());
        }
        while ws.move_up(window) {}
        info!("{} is now master", window);
        self.arrange()?;
        self.refresh_focus()
    }

    /// A `w`×`h` rectangle centred in the current workspace's usable area.
    fn centered(&self, w: u16, h: u16) -> Rect {
        let area = self.usable_area(self.workspaces.current().bar_height);
        Rect::new(
            area.x + area.w.saturating_sub(w) / 2,
            area.y + area.h.saturating_sub(h) / 2,
            w,
            h,
        )
    }

    fn toggle_float(&mut self) -> Result<(), WmError> {
        let Some(c) = self.workspaces.current().current_client() else {
            return Ok(());
        };
        if c.is_transient() {
            debug!("{} is transient and always floats", c.window);
            return Ok(());
        }
        let centre = self.centered(c.geometry.w, c.geometry.h);
        let center_floating = self.config.center_floating;
        let Some(c) = self.workspaces.current_mut().current_client_mut() else {
            return Ok(());
        };
        c.flags.toggle(ClientFlags::FLOATING);
        if c.is_floating() && center_floating {
            c.geometry = centre;
        }
        info!("{} floating: {}", c.window, c.is_floating());
        self.arrange()
    }

    /// Apply `change` to the focused floating client's geometry.  `change`
    /// returns `false` to reject the edit.
    fn adjust_float(&mut self, change: impl FnOnce(&mut Rect) -> bool) -> Result<(), WmError> {
        let border = self.config.border.width;
        let Some(c) = self.workspaces.current_mut().current_client_mut() else {
            return Ok(());
        };
        if !c.is_floating() || c.is_fullscreen() {
            return Ok(());
        }
        let mut geometry = c.geometry;
        if !change(&mut geometry) {
            debug!("ignoring floating resize of {}", c.window);
            return Ok(());
        }
        c.geometry = geometry;
        let window = c.window;
        self.wm
            .configure_window(window, geometry, border)
            .map_err(backend)
    }

    fn teleport(&mut self, location: TeleportLocation) -> Result<(), WmError> {
        let area = self.usable_area(self.workspaces.current().bar_height);
        let border2 = i32::from(self.config.border.width) * 2;
        let (ax, ay, aw, ah) = (
            i32::from(area.x),
            i32::from(area.y),
            i32::from(area.w),
            i32::from(area.h),
        );
        let Some(c) = self.workspaces.current_mut().current_client_mut() else {
            return Ok(());
        };
        if !c.is_floating() || c.is_transient() {
            return Ok(());
        }
        let (g, w, h) = (
            i32::from(c.gap),
            i32::from(c.geometry.w),
            i32::from(c.geometry.h),
        );
        let left = ax + g;
        let hcenter = ax + (aw - w) / 2;
        let right = ax + aw - w - g - border2;
        let top = ay + g;
        let vcenter = ay + (ah - h) / 2;
        let bottom = ay + ah - h - g - border2;
        let (x, y) = match location {
            TeleportLocation::TopLeft => (left, top),
            TeleportLocation::TopCenter => (hcenter, top),
            TeleportLocation::TopRight => (right, top),
            TeleportLocation::Center => (hcenter, vcenter),
            TeleportLocation::BottomLeft => (left, bottom),
            TeleportLocation::BottomCenter => (hcenter, bottom),
            TeleportLocation::BottomRight => (right, bottom),
        };
        c.geometry.x = clamp_u16(x);
        c.geometry.y = clamp_u16(y);
        debug!("teleported {} to {:?}", c.window, location);
        self.draw_clients()
    }

    fn set_fullscreen(&mut self, window: WindowId, on: bool) -> Result<(), WmError> {
        let current = self.workspaces.current_index();
        let Some((index, c)) = self.workspaces.find_mut(window) else {
            return Ok(());
        };
        if c.is_fullscreen() == on {
            return Ok(());
        }
        c.flags.set(ClientFlags::FULLSCREEN, on);
        let urgent = c.is_urgent();
        info!("{} fullscreen: {}", window, on);
        self.wm.set_window_state(window, on, urgent).map_err(backend)?;
        if index == current {
            self.arrange()?;
        }
        Ok(())
    }

    fn set_urgent(&mut self, window: WindowId, urgent: bool) -> Result<(), WmError> {
        let current = self.workspaces.current_index();
        let focused = self.workspaces.current().current();
        let Some((index, c)) = self.workspaces.find_mut(window) else {
            return Ok(());
        };
        if urgent && index == current && focused == Some(window) {
            debug!("{} is focused, not marking urgent", window);
            return Ok(());
        }
        if c.is_urgent() == urgent {
            return Ok(());
        }
        c.flags.set(ClientFlags::URGENT, urgent);
        let fullscreen = c.is_fullscreen();
        info!("{} urgent: {}", window, urgent);
        self.wm.set_window_state(window, fullscreen, urgent).map_err(backend)?;
        if index == current {
            self.paint_borders()?;
        }
        Ok(())
    }

    //  Scratchpad

    fn send_to_scratchpad(&mut self) -> Result<(), WmError> {
        if self.scratchpad.is_some() {
            debug!("scratchpad is occupied");
            return Ok(());
        }
        let ws = self.workspaces.current_mut();
        let Some(window) = ws.current() else {
            return Ok(());
        };
        let Some(client) = ws.remove(window, true) else {
            return Ok(());
        };
        info!("{} sent to the scratchpad", window);
        self.scratchpad = Some(client);
        self.wm.unmap_window(window).map_err(backend)?;
        self.arrange()?;
        self.refresh_focus()
    }

    fn get_from_scratchpad(&mut self) -> Result<(), WmError> {
        let Some(mut client) = self.scratchpad.take() else {
            debug!("scratchpad is empty");
            return Ok(());
        };
        client.flags.insert(ClientFlags::FLOATING);
        client.geometry = self.centered(self.config.scratchpad.width, self.config.scratchpad.height);
        let window = client.window;
        info!("{} taken from the scratchpad", window);
        self.workspaces.current_mut().push(client);
        self.wm.map_window(window).map_err(backend)?;
        self.arrange()?;
        self.focus_client(Some(window))
    }

    //  Layouts

    fn change_layout(&mut self, layout: LayoutKind) -> Result<(), WmError> {
        let ws = self.workspaces.current_mut();
        if ws.layout == layout {
            return Ok(());
        }
        info!("layout {} -> {}", ws.layout, layout);
        self.last_layout = ws.layout;
        ws.layout = layout;
        self.arrange()?;
        self.refresh_focus()
    }

    fn resize_master(&mut self, percent: i32) -> Result<(), WmError> {
        let ws = self.workspaces.current_mut();
        if !ws.layout.is_stack() {
            debug!("master ratio has no effect in {}", ws.layout);
            return Ok(());
        }
        match layout::adjust_master_ratio(ws.master_ratio, percent) {
            Some(ratio) => {
                debug!("master ratio {:.2} -> {:.2}", ws.master_ratio, ratio);
                ws.master_ratio = ratio;
                self.arrange()
            }
            None => {
                debug!("ignoring master resize by {}%", percent);
                Ok(())
            }
        }
    }

    //  Operators

    fn run_operator(&mut self, invocation: Invocation) -> Result<(), WmError> {
        let Invocation {
            operator,
            scope,
            count,
        } = invocation;
        let count = count as usize;
        info!("{} {} x{}", operator, scope, count);
        match (operator, scope) {
            (Operator::Kill, Scope::Client) => self.kill_clients(count),
            (Operator::Kill, Scope::Workspace) => self.kill_workspaces(count),
            (Operator::Close, Scope::Client) => {
                let targets = self.clients_from_current(count);
                self.close_windows(&targets)
            }
            (Operator::Close, Scope::Workspace) => {
                let targets: Vec<WindowId> = self
                    .workspaces_from_current(count)
                    .into_iter()
                    .filter_map(|i| self.workspaces.get(i))
                    .flat_map(|ws| ws.clients().iter().map(|c| c.window))
                    .collect();
                self.close_windows(&targets)
            }
            (Operator::MoveUp, Scope::Client) => self.move_current_by(count, true),
            (Operator::MoveDown, Scope::Client) => self.move_current_by(count, false),
            (Operator::MoveUp, Scope::Workspace) => self.move_workspace(count, true),
            (Operator::MoveDown, Scope::Workspace) => self.move_workspace(count, false),
            (Operator::FocusUp, Scope::Client) => self.focus_by(count, false),
            (Operator::FocusDown, Scope::Client) => self.focus_by(count, true),
            (Operator::FocusUp, Scope::Workspace) => {
                self.change_ws(self.workspaces.wrap(-(count as i64)))
            }
            (Operator::FocusDown, Scope::Workspace) => {
                self.change_ws(self.workspaces.wrap(count as i64))
            }
            (Operator::ShrinkGaps, Scope::Client) => self.change_client_gaps(count, false),
            (Operator::GrowGaps, Scope::Client) => self.change_client_gaps(count, true),
            (Operator::ShrinkGaps, Scope::Workspace) => self.change_workspace_gaps(count, false),
            (Operator::GrowGaps, Scope::Workspace) => self.change_workspace_gaps(count, true),
        }
    }

    fn kill_clients(&mut self, count: usize) -> Result<(), WmError> {
        if self.workspaces.current().current().is_none() {
            return Ok(());
        }
        if !self.register.can_accept() {
            warn!("delete register is full, kill ignored");
            return Ok(());
        }
        let group = self.workspaces.current_mut().take_from_current(count);
        let visible = group.iter().map(|c| c.window).collect();
        self.stash(group, visible)
    }

    fn kill_workspaces(&mut self, count: usize) -> Result<(), WmError> {
        if !self.register.can_accept() {
            warn!("delete register is full, kill ignored");
            return Ok(());
        }
        let current = self.workspaces.current_index();
        let mut group = Vec::new();
        let mut visible = Vec::new();
        for index in self.workspaces_from_current(count) {
            if let Some(ws) = self.workspaces.get_mut(index) {
                let taken = ws.take_all();
                if index == current {
                    visible.extend(taken.iter().map(|c| c.window));
                }
                group.extend(taken);
            }
        }
        if group.is_empty() {
            return Ok(());
        }
        self.stash(group, visible)
    }

    /// Push a cut group onto the register and hide its `visible` windows.
    fn stash(&mut self, group: Vec<Client>, visible: Vec<WindowId>) -> Result<(), WmError> {
        let n = group.len();
        if let Err(full) = self.register.push(group) {
            warn!("{}, restoring clients", full);
            self.workspaces.current_mut().splice_after_current(full.group);
            return Ok(());
        }
        info!("cut {} client(s), register holds {} group(s)", n, self.register.len());
        for window in visible {
            self.wm.unmap_window(window).map_err(backend)?;
        }
        self.arrange()?;
        self.refresh_focus()
    }

    fn paste(&mut self) -> Result<(), WmError> {
        let Some(group) = self.register.pop() else {
            warn!("delete register is empty, nothing to paste");
            return Ok(());
        };
        let windows: Vec<WindowId> = group.iter().map(|c| c.window).collect();
        info!("pasting {} client(s)", windows.len());
        self.workspaces.current_mut().splice_after_current(group);
        for window in windows {
            self.wm.map_window(window).map_err(backend)?;
        }
        self.arrange()?;
        self.refresh_focus()
    }

    fn close_windows(&self, windows: &[WindowId]) -> Result<(), WmError> {
        for &window in windows {
            info!("closing {}", window);
            self.wm.close_window(window).map_err(backend)?;
        }
        Ok(())
    }

    /// Carry the current workspace's clients `count` workspaces up (towards
    /// 1) or down, following them.
    fn move_workspace(&mut self, count: usize, up: bool) -> Result<(), WmError> {
        for _ in 0..count {
            let current = self.workspaces.current_index();
            let target = self.workspaces.wrap(if up { -1 } else { 1 });
            let Some((from, to)) = self.workspaces.pair_mut(current, target) else {
                break;
            };
            from.swap_contents(to);
            self.change_ws(target)?;
        }
        Ok(())
    }

    fn change_client_gaps(&mut self, count: usize, grow: bool) -> Result<(), WmError> {
        let step = self.config.op_gap_size;
        let targets = self.clients_from_current(count);
        let ws = self.workspaces.current_mut();
        for window in targets {
            if let Some(c) = ws.get_mut(window) {
                c.gap = step_gap(c.gap, step, grow);
            }
        }
        self.arrange()
    }

    fn change_workspace_gaps(&mut self, count: usize, grow: bool) -> Result<(), WmError> {
        let step = self.config.op_gap_size;
        for index in self.workspaces_from_current(count) {
            if let Some(ws) = self.workspaces.get_mut(index) {
                ws.gap = step_gap(ws.gap, step, grow);
                for c in ws.clients_mut() {
                    c.gap = step_gap(c.gap, step, grow);
                }
            }
        }
        self.arrange()
    }

    //  Window-system events

    fn manage(&mut self, window: WindowId, transient: bool) -> Result<(), WmError> {
        let known = self.workspaces.find(window).is_some()
            || self.scratchpad.as_ref().is_some_and(|c| c.window == window);
        if known {
            debug!("{} is already managed", window);
            return Ok(());
        }
        let class = self.wm.window_class(window).map_err(backend)?;
        let rule = class
            .as_deref()
            .and_then(|name| self.config.rule_for(name))
            .cloned()
            .unwrap_or_default();
        let current = self.workspaces.current_index();
        let target = if self.workspaces.is_valid(rule.workspace) {
            rule.workspace
        } else {
            current
        };
        let floating = transient || rule.floating;
        let spawn = self.centered(self.config.float_spawn_width, self.config.float_spawn_height);

        let Some(client) = self.workspaces.create_in(target, window) else {
            return Ok(());
        };
        if transient {
            client.flags.insert(ClientFlags::TRANSIENT);
        }
        if floating {
            client.flags.insert(ClientFlags::FLOATING);
            client.geometry = spawn;
        }
        if rule.fullscreen {
            client.flags.insert(ClientFlags::FULLSCREEN);
        }
        info!(
            "managing {} ({}) on workspace {}",
            window,
            class.as_deref().unwrap_or("?"),
            target
        );
        if rule.fullscreen {
            self.wm.set_window_state(window, true, false).map_err(backend)?;
        }
        if let Some(ws) = self.workspaces.get_mut(target) {
            ws.set_current(Some(window));
        }

        if target == current {
            self.wm.map_window(window).map_err(backend)?;
            self.arrange()?;
            self.focus_client(Some(window))
        } else if rule.follow {
            self.change_ws(target)
        } else {
            Ok(())
        }
    }

    fn unmanage(&mut self, window: WindowId) -> Result<(), WmError> {
        if let Some((index, _)) = self.workspaces.remove(window, true) {
            info!("{} is gone", window);
            if index == self.workspaces.current_index() {
                self.arrange()?;
                self.refresh_focus()?;
            }
        } else if self.register.remove(window).is_some() {
            debug!("dropped {} from the delete register", window);
        } else if self.scratchpad.as_ref().is_some_and(|c| c.window == window) {
            debug!("dropped {} from the scratchpad", window);
            self.scratchpad = None;
        }
        Ok(())
    }

    fn configure_request(&mut self, window: WindowId, changes: ConfigureChanges) -> Result<(), WmError> {
        let current = self.workspaces.current_index();
        let screen = self.screen();
        let border = self.config.border.width;
        match self.workspaces.find_mut(window) {
            Some((index, c)) if c.is_floating() && !c.is_fullscreen() => {
                c.geometry = changes.apply_to(c.geometry);
                if index == current {
                    self.wm.configure_window(window, c.geometry, border).map_err(backend)?;
                }
            }
            Some((index, c)) => {
                // Managed geometry wins; answer with what the window already has.
                if index == current {
                    let (rect, width) = if c.is_fullscreen() {
                        (screen, 0)
                    } else {
                        (c.geometry, border)
                    };
                    self.wm.configure_window(window, rect, width).map_err(backend)?;
                }
            }
            None => {
                self.wm.forward_configure(window, changes).map_err(backend)?;
            }
        }
        Ok(())
    }
}

impl<W: WindowSystem> CommandSink for Manager<W> {
    type Error = WmError;

    fn execute(&mut self, cmd: Command) -> Result<(), WmError> {
        self.handle(cmd)
    }
}

fn clamp_u16(v: i32) -> u16 {
    v.clamp(0, i32::from(u16::MAX)) as u16
}

fn step_gap(gap: u16, step: u16, grow: bool) -> u16 {
    if grow {
        gap.saturating_add(step)
    } else {
        gap.saturating_sub(step)
    }
}

//  Tests
