//! Workspaces and the client registry.
//!
//! A [`Workspace`] owns its clients in an ordered `Vec`.  Focus is tracked
//! by [`WindowId`] rather than by position, so reordering never moves the
//! focus to a different client and removal clears or re-targets it
//! explicitly.  [`Workspaces`] holds the fixed set of workspaces created at
//! startup, numbered from 1.

use crate::client::{Client, WindowId};
use crate::layout::LayoutKind;

/// Per-workspace defaults taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkspaceDefaults {
    pub layout: LayoutKind,
    pub master_ratio: f64,
    pub bar_height: u16,
    pub gap: u16,
}

/// An independent virtual desktop.
#[derive(Debug, Clone)]
pub struct Workspace {
    clients: Vec<Client>,
    current: Option<WindowId>,
    prev_focus: Option<WindowId>,
    pub layout: LayoutKind,
    /// Kept inside the open interval `(0.1, 1.0)`.
    pub master_ratio: f64,
    pub bar_height: u16,
    /// Gap given to clients created on this workspace.
    pub gap: u16,
}

impl Workspace {
    pub fn new(defaults: WorkspaceDefaults) -> Self {
        Self {
            clients: Vec::new(),
            current: None,
            prev_focus: None,
            layout: defaults.layout,
            master_ratio: defaults.master_ratio,
            bar_height: defaults.bar_height,
            gap: defaults.gap,
        }
    }

    //  Accessors

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn clients_mut(&mut self) -> &mut [Client] {
        &mut self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn head(&self) -> Option<WindowId> {
        self.clients.first().map(|c| c.window)
    }

    /// The focused client's window, if any.
    pub fn current(&self) -> Option<WindowId> {
        self.current
    }

    /// The client focused before the current one, if it is still here.
    pub fn prev_focus(&self) -> Option<WindowId> {
        self.prev_focus
    }

    pub fn current_client(&self) -> Option<&Client> {
        self.current.and_then(|w| self.get(w))
    }

    pub fn current_client_mut(&mut self) -> Option<&mut Client> {
        let w = self.current?;
        self.get_mut(w)
    }

    pub fn position(&self, window: WindowId) -> Option<usize> {
        self.clients.iter().position(|c| c.window == window)
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.position(window).is_some()
    }

    pub fn get(&self, window: WindowId) -> Option<&Client> {
        self.clients.iter().find(|c| c.window == window)
    }

    pub fn get_mut(&mut self, window: WindowId) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| c.window == window)
    }

    //  Mutation

    /// Append a client to the end of the list.
    pub fn push(&mut self, client: Client) {
        self.clients.push(client);
    }

    /// Point the focus at `window`.
    ///
    /// Returns `false` and changes nothing if `window` is not on this
    /// workspace.  `None` clears the focus.
    pub fn set_current(&mut self, window: Option<WindowId>) -> bool {
        if let Some(w) = window {
            if !self.contains(w) {
                return false;
            }
        }
        if self.current != window {
            self.prev_focus = self.current;
        }
        self.current = window;
        true
    }

    /// Unlink `window` from the list and hand the client back.
    ///
    /// With `refocus`, focus moves to the predecessor, else the successor,
    /// else nowhere.  Without it, focus is only cleared if it pointed at
    /// the removed client.
    pub fn remove(&mut self, window: WindowId, refocus: bool) -> Option<Client> {
        let idx = self.position(window)?;
        let client = self.clients.remove(idx);
        if self.prev_focus == Some(window) {
            self.prev_focus = None;
        }
        if refocus {
            let next = if idx > 0 {
                self.clients.get(idx - 1)
            } else {
                self.clients.get(idx)
            };
            self.current = next.map(|c| c.window);
        } else if self.current == Some(window) {
            self.current = None;
        }
        Some(client)
    }

    /// Swap `window` with its predecessor.  No-op at the head.
    pub fn move_up(&mut self, window: WindowId) -> bool {
        match self.position(window) {
            Some(idx) if idx > 0 => {
                self.clients.swap(idx, idx - 1);
                true
            }
            _ => false,
        }
    }

    /// Swap `window` with its successor.  No-op at the tail.
    pub fn move_down(&mut self, window: WindowId) -> bool {
        match self.position(window) {
            Some(idx) if idx + 1 < self.clients.len() => {
                self.clients.swap(idx, idx + 1);
                true
            }
            _ => false,
        }
    }

    /// The client after `window`, wrapping to the head.
    pub fn next(&self, window: WindowId) -> Option<WindowId> {
        let idx = self.position(window)?;
        let next = (idx + 1) % self.clients.len();
        Some(self.clients[next].window)
    }

    /// The client before `window`, wrapping to the tail.
    pub fn prev(&self, window: WindowId) -> Option<WindowId> {
        let idx = self.position(window)?;
        let len = self.clients.len();
        Some(self.clients[(idx + len - 1) % len].window)
    }

    /// Remove up to `count` clients starting at the focused one and walking
    /// forward (wrapping).  Focus ends on the predecessor of the first
    /// removed client, as if each had been removed with refocus.
    pub fn take_from_current(&mut self, count: usize) -> Vec<Client> {
        let mut taken = Vec::new();
        let Some(start) = self.current else {
            return taken;
        };
        let Some(mut idx) = self.position(start) else {
            return taken;
        };
        while taken.len() < count && !self.clients.is_empty() {
            if idx >= self.clients.len() {
                idx = 0;
            }
            taken.push(self.clients.remove(idx));
        }
        if let Some(prev) = self.prev_focus {
            if !self.contains(prev) {
                self.prev_focus = None;
            }
        }
        self.current = if self.clients.is_empty() {
            None
        } else {
            let i = idx.min(self.clients.len()).saturating_sub(1);
            Some(self.clients[i].window)
        };
        taken
    }

    /// Remove every client, leaving the workspace empty.
    pub fn take_all(&mut self) -> Vec<Client> {
        self.current = None;
        self.prev_focus = None;
        std::mem::take(&mut self.clients)
    }

    /// Insert `group` right after the focused client (or as the whole list
    /// when the workspace is empty) and focus the group's last client.
    ///
    /// Returns `false` and keeps the workspace untouched if `group` is
    /// empty.
    pub fn splice_after_current(&mut self, group: Vec<Client>) -> bool {
        let Some(last) = group.last().map(|c| c.window) else {
            return false;
        };
        let at = self
            .current
            .and_then(|w| self.position(w))
            .map(|i| i + 1)
            .unwrap_or(self.clients.len());
        self.clients.splice(at..at, group);
        self.set_current(Some(last));
        true
    }

    /// Exchange client lists and focus with `other`.
    pub fn swap_contents(&mut self, other: &mut Workspace) {
        std::mem::swap(&mut self.clients, &mut other.clients);
        std::mem::swap(&mut self.current, &mut other.current);
        std::mem::swap(&mut self.prev_focus, &mut other.prev_focus);
    }
}

/// The fixed set of workspaces, indexed from 1.
#[derive(Debug, Clone)]
pub struct Workspaces {
    spaces: Vec<Workspace>,
    current: usize,
    last: usize,
}

impl Workspaces {
    /// Create `count` workspaces (at least one) and make `initial` current,
    /// falling back to 1 if it is out of range.
    pub fn new(count: usize, initial: usize, defaults: WorkspaceDefaults) -> Self {
        let count = count.max(1);
        let initial = if (1..=count).contains(&initial) { initial } else { 1 };
        Self {
            spaces: (0..count).map(|_| Workspace::new(defaults)).collect(),
            current: initial,
            last: initial,
        }
    }

    pub fn count(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_valid(&self, index: usize) -> bool {
        (1..=self.spaces.len()).contains(&index)
    }

    /// Index of the current workspace.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Index of the previously current workspace.
    pub fn last_index(&self) -> usize {
        self.last
    }

    pub fn current(&self) -> &Workspace {
        &self.spaces[self.current - 1]
    }

    pub fn current_mut(&mut self) -> &mut Workspace {
        &mut self.spaces[self.current - 1]
    }

    pub fn get(&self, index: usize) -> Option<&Workspace> {
        index.checked_sub(1).and_then(|i| self.spaces.get(i))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Workspace> {
        index.checked_sub(1).and_then(|i| self.spaces.get_mut(i))
    }

    /// Mutable access to two distinct workspaces at once.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> Option<(&mut Workspace, &mut Workspace)> {
        if a == b || !self.is_valid(a) || !self.is_valid(b) {
            return None;
        }
        let (lo, hi) = (a.min(b) - 1, a.max(b) - 1);
        let (left, right) = self.spaces.split_at_mut(hi);
        let (first, second) = (&mut left[lo], &mut right[0]);
        Some(if a < b { (first, second) } else { (second, first) })
    }

    /// Make `index` current, remembering the old one.  Returns `false` for an
    /// invalid or already-current index.
    pub fn select(&mut self, index: usize) -> bool {
        if !self.is_valid(index) || index == self.current {
            return false;
        }
        self.last = self.current;
        self.current = index;
        true
    }

    /// Wrap an offset from the current workspace into `[1, N]`.
    pub fn wrap(&self, offset: i64) -> usize {
        let n = self.spaces.len() as i64;
        ((self.current as i64 - 1 + offset).rem_euclid(n) + 1) as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Workspace)> {
        self.spaces.iter().enumerate().map(|(i, ws)| (i + 1, ws))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Workspace)> {
        self.spaces.iter_mut().enumerate().map(|(i, ws)| (i + 1, ws))
    }

    //  Client registry

    /// Build a client for `window` and append it to the current workspace.
    pub fn create(&mut self, window: WindowId) -> &mut Client {
        let ws = self.current_mut();
        ws.push(Client::new(window, ws.gap));
        let last = ws.len() - 1;
        &mut ws.clients_mut()[last]
    }

    /// Like [`create`](Self::create) but on workspace `index`.
    pub fn create_in(&mut self, index: usize, window: WindowId) -> Option<&mut Client> {
        let ws = self.get_mut(index)?;
        ws.push(Client::new(window, ws.gap));
        let last = ws.len() - 1;
        Some(&mut ws.clients_mut()[last])
    }

    /// Find the workspace holding `window`.
    pub fn find(&self, window: WindowId) -> Option<(usize, &Client)> {
        self.iter()
            .find_map(|(idx, ws)| ws.get(window).map(|c| (idx, c)))
    }

    pub fn find_mut(&mut self, window: WindowId) -> Option<(usize, &mut Client)> {
        self.iter_mut()
            .find_map(|(idx, ws)| ws.get_mut(window).map(|c| (idx, c)))
    }

    /// Remove `window` from whichever workspace holds it.
    pub fn remove(&mut self, window: WindowId, refocus: bool) -> Option<(usize, Client)> {
        let (idx, _) = self.find(window)?;
        let ws = self.get_mut(idx)?;
        ws.remove(window, refocus).map(|c| (idx, c))
    }
}

//  Tests
