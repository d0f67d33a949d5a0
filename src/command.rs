//! Commands shared by every input path.
//!
//! A [`Command`] describes one thing the window manager can be asked to do.
//! The IPC dispatcher produces them from text lines; the
//! [`Manager`](crate::manager::Manager) consumes them.  Index arguments are
//! kept as raw integers here because range checks belong to the manager,
//! which ignores out-of-range values instead of failing.

use crate::grammar::Operator;

/// Fixed anchor points a floating client can be teleported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeleportLocation {
    TopLeft,
    TopCenter,
    TopRight,
    Center,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl TeleportLocation {
    pub const ALL: [TeleportLocation; 7] = [
        TeleportLocation::TopLeft,
        TeleportLocation::TopCenter,
        TeleportLocation::TopRight,
        TeleportLocation::Center,
        TeleportLocation::BottomLeft,
        TeleportLocation::BottomCenter,
        TeleportLocation::BottomRight,
    ];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}

/// Every action the window manager can perform on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    //  Workspaces
    /// Switch to workspace `n` (1-based).
    ChangeWorkspace(i32),
    FocusNextWorkspace,
    FocusPrevWorkspace,
    /// Jump back to the previously active workspace.
    FocusLastWorkspace,
    /// Move the focused client to workspace `n`.
    CurrentToWorkspace(i32),
    /// Focus the first client flagged urgent, switching workspace if needed.
    FocusUrgent,
    ToggleBar,

    //  Clients
    FocusNextClient,
    FocusPrevClient,
    MoveCurrentUp,
    MoveCurrentDown,
    /// Bubble the focused client to the head of a stack layout.
    MakeMaster,
    ToggleFloat,
    ToggleFullscreen,
    ResizeFloatWidth(i32),
    ResizeFloatHeight(i32),
    MoveFloatX(i32),
    MoveFloatY(i32),
    /// Teleport the focused floating client to a [`TeleportLocation`] index.
    Teleport(i32),
    SendToScratchpad,
    GetFromScratchpad,

    //  Layouts
    ChangeLayout(i32),
    NextLayout,
    PrevLayout,
    LastLayout,
    /// Grow (positive) or shrink (negative) the master ratio by a percentage.
    ResizeMaster(i32),

    //  Grammar
    ChangeMode(i32),
    Operator(Operator),
    Count(u32),
    Motion(String),
    /// Pop the delete register into the current workspace.
    Paste,

    //  Process
    /// Launch a program, detached.
    Spawn(Vec<String>),
    /// Stop with the given exit status.
    Quit(i32),
    /// Stop and re-execute in place.
    Restart,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teleport_indices() {
        assert_eq!(TeleportLocation::from_index(0), Some(TeleportLocation::TopLeft));
        assert_eq!(TeleportLocation::from_index(3), Some(TeleportLocation::Center));
        assert_eq!(TeleportLocation::from_index(6), Some(TeleportLocation::BottomRight));
        assert_eq!(TeleportLocation::from_index(7), None);
        assert_eq!(TeleportLocation::from_index(-2), None);
    }

    #[test]
    fn command_equality() {
        assert_eq!(Command::ChangeWorkspace(2), Command::ChangeWorkspace(2));
        assert_ne!(Command::ChangeWorkspace(2), Command::CurrentToWorkspace(2));
        assert_eq!(
            Command::Spawn(vec!["xterm".into()]),
            Command::Spawn(vec!["xterm".into()])
        );
        assert_ne!(Command::Operator(Operator::Kill), Command::Operator(Operator::Close));
    }
}
