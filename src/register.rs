//! The delete register: a bounded LIFO of cut client groups.
//!
//! A kill moves clients out of a workspace and pushes them here as one
//! group; a paste pops the most recent group back into a workspace.  The
//! register owns the clients in between.
//!
//! Policy:
//!
//! * Each kill pushes one group.  With `merge_consecutive` enabled, kills
//!   that follow each other with no paste in between extend the top group
//!   instead, so a single paste restores all of them.
//! * A full register rejects the new group.  The caller checks
//!   [`DeleteRegister::can_accept`] before removing anything, so a
//!   rejected kill leaves every client where it was.

use crate::client::{Client, WindowId};

/// Returned when pushing onto a full register.  Carries the group back.
#[derive(Debug, thiserror::Error)]
#[error("delete register is full ({capacity} groups)")]
pub struct RegisterFull {
    pub capacity: usize,
    pub group: Vec<Client>,
}

#[derive(Debug, Clone)]
pub struct DeleteRegister {
    groups: Vec<Vec<Client>>,
    capacity: usize,
    merge_consecutive: bool,
    /// The top group may still be extended by the next kill.
    open: bool,
}

impl DeleteRegister {
    pub fn new(capacity: usize, merge_consecutive: bool) -> Self {
        Self {
            groups: Vec::with_capacity(capacity),
            capacity,
            merge_consecutive,
            open: false,
        }
    }

    /// Number of groups held.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the next [`push`](Self::push) would succeed.
    pub fn can_accept(&self) -> bool {
        self.merges() || self.groups.len() < self.capacity
    }

    fn merges(&self) -> bool {
        self.merge_consecutive && self.open && !self.groups.is_empty()
    }

    /// Push a group, or extend the top one when merging.
    ///
    /// An empty group is accepted and ignored.
    pub fn push(&mut self, mut group: Vec<Client>) -> Result<(), RegisterFull> {
        if group.is_empty() {
            return Ok(());
        }
        if self.merges() {
            if let Some(top) = self.groups.last_mut() {
                top.append(&mut group);
                return Ok(());
            }
        }
        if self.groups.len() >= self.capacity {
            return Err(RegisterFull {
                capacity: self.capacity,
                group,
            });
        }
        self.groups.push(group);
        self.open = true;
        Ok(())
    }

    /// Pop the most recent group.
    pub fn pop(&mut self) -> Option<Vec<Client>> {
        self.open = false;
        self.groups.pop()
    }

    /// Look at the most recent group without removing it.
    pub fn peek(&self) -> Option<&[Client]> {
        self.groups.last().map(Vec::as_slice)
    }

    /// Take `window` out of whichever group holds it, dropping the group if
    /// it becomes empty.
    pub fn remove(&mut self, window: WindowId) -> Option<Client> {
        let (g, i) = self.groups.iter().enumerate().find_map(|(g, group)| {
            group.iter().position(|c| c.window == window).map(|i| (g, i))
        })?;
        let client = self.groups[g].remove(i);
        if self.groups[g].is_empty() {
            self.groups.remove(g);
            if g == self.groups.len() {
                self.open = false;
            }
        }
        Some(client)
    }

    /// Remove every held client, oldest group first.
    pub fn drain(&mut self) -> Vec<Client> {
        self.open = false;
        self.groups.drain(..).flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(ids: &[u32]) -> Vec<Client> {
        ids.iter().map(|&id| Client::new(WindowId(id), 0)).collect()
    }

    fn ids(group: &[Client]) -> Vec<u32> {
        group.iter().map(|c| c.window.0).collect()
    }

    #[test]
    fn pop_returns_most_recent_group() {
        let mut reg = DeleteRegister::new(3, false);
        reg.push(group(&[1, 2])).unwrap();
        reg.push(group(&[3])).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(ids(&reg.pop().unwrap()), vec![3]);
        assert_eq!(ids(&reg.pop().unwrap()), vec![1, 2]);
        assert!(reg.pop().is_none());
    }

    #[test]
    fn pop_on_empty_is_harmless() {
        let mut reg = DeleteRegister::new(2, false);
        assert!(reg.pop().is_none());
        assert!(reg.is_empty());
        assert!(reg.can_accept());
    }

    #[test]
    fn full_register_rejects_and_returns_group() {
        let mut reg = DeleteRegister::new(1, false);
        reg.push(group(&[1])).unwrap();
        assert!(!reg.can_accept());
        let err = reg.push(group(&[2])).unwrap_err();
        assert_eq!(ids(&err.group), vec![2]);
        assert_eq!(reg.len(), 1);
        assert_eq!(ids(reg.peek().unwrap()), vec![1]);
    }

    #[test]
    fn zero_capacity_accepts_nothing() {
        let mut reg = DeleteRegister::new(0, true);
        assert!(!reg.can_accept());
        assert!(reg.push(group(&[1])).is_err());
    }

    #[test]
    fn merging_extends_top_until_paste() {
        let mut reg = DeleteRegister::new(1, true);
        reg.push(group(&[1])).unwrap();
        assert!(reg.can_accept());
        reg.push(group(&[2, 3])).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(ids(&reg.pop().unwrap()), vec![1, 2, 3]);
        reg.push(group(&[4])).unwrap();
        assert_eq!(ids(reg.peek().unwrap()), vec![4]);
    }

    #[test]
    fn pop_closes_the_top_group() {
        let mut reg = DeleteRegister::new(3, true);
        reg.push(group(&[1])).unwrap();
        reg.push(group(&[2])).unwrap();
        reg.pop();
        reg.push(group(&[5])).unwrap();
        reg.push(group(&[6])).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(ids(reg.peek().unwrap()), vec![5, 6]);
    }

    #[test]
    fn empty_group_is_ignored() {
        let mut reg = DeleteRegister::new(1, false);
        reg.push(Vec::new()).unwrap();
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_drops_emptied_groups() {
        let mut reg = DeleteRegister::new(3, false);
        reg.push(group(&[1])).unwrap();
        reg.push(group(&[2, 3])).unwrap();
        assert_eq!(reg.remove(WindowId(1)).map(|c| c.window), Some(WindowId(1)));
        assert_eq!(reg.len(), 1);
        reg.remove(WindowId(2));
        assert_eq!(ids(reg.peek().unwrap()), vec![3]);
        assert!(reg.remove(WindowId(9)).is_none());
    }

    #[test]
    fn drain_empties_everything() {
        let mut reg = DeleteRegister::new(3, false);
        reg.push(group(&[1])).unwrap();
        reg.push(group(&[2, 3])).unwrap();
        assert_eq!(ids(&reg.drain()), vec![1, 2, 3]);
        assert!(reg.is_empty());
    }
}
