//! Interaction modes and the operator/count/motion grammar.
//!
//! Commands follow the vi pattern `operator [count] motion`: the operator
//! picks the action, the count repeats it and the motion picks whether it
//! applies to clients or to workspaces.  [`Grammar`] only tracks where in
//! that sentence the user is; it returns an [`Invocation`] when the
//! sentence is complete and leaves running it to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interaction mode.  Selects which external key table is active; the
/// core only stores and reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    Focus,
    Floating,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Normal, Mode::Focus, Mode::Floating];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::Focus => write!(f, "focus"),
            Mode::Floating => write!(f, "floating"),
        }
    }
}

/// What a completed command acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Workspace,
    Client,
}

impl Scope {
    /// Parse a motion token: `w`/`workspace` or `c`/`client`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "w" | "workspace" => Some(Scope::Workspace),
            "c" | "client" => Some(Scope::Client),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Workspace => write!(f, "workspace"),
            Scope::Client => write!(f, "client"),
        }
    }
}

/// Actions that take a scope and a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Cut into the delete register.
    Kill,
    /// Ask the windows to close.
    Close,
    MoveUp,
    MoveDown,
    FocusUp,
    FocusDown,
    ShrinkGaps,
    GrowGaps,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Kill => "kill",
            Operator::Close => "close",
            Operator::MoveUp => "move_up",
            Operator::MoveDown => "move_down",
            Operator::FocusUp => "focus_up",
            Operator::FocusDown => "focus_down",
            Operator::ShrinkGaps => "shrink_gaps",
            Operator::GrowGaps => "grow_gaps",
        };
        f.write_str(name)
    }
}

/// Where in an `operator [count] motion` sentence the grammar is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrammarState {
    #[default]
    AwaitingOperator,
    AwaitingCount,
    AwaitingMotion,
}

impl GrammarState {
    pub fn index(self) -> usize {
        match self {
            GrammarState::AwaitingOperator => 0,
            GrammarState::AwaitingCount => 1,
            GrammarState::AwaitingMotion => 2,
        }
    }
}

/// A completed command, ready to run exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub operator: Operator,
    pub scope: Scope,
    pub count: u32,
}

/// Operator/count/motion parser state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    state: GrammarState,
    count: u32,
    operator: Option<Operator>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self {
            state: GrammarState::AwaitingOperator,
            count: 1,
            operator: None,
        }
    }
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GrammarState {
        self.state
    }

    /// The pending repeat count (always at least 1).
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn operator(&self) -> Option<Operator> {
        self.operator
    }

    /// Select an operator and wait for a count or a motion.
    ///
    /// Selecting a new operator mid-sentence replaces the old one.
    pub fn select_operator(&mut self, operator: Operator) {
        self.operator = Some(operator);
        self.state = GrammarState::AwaitingCount;
    }

    /// Supply an explicit count.
    ///
    /// Only accepted right after an operator; returns `false` and changes
    /// nothing otherwise, or if `count` is zero.
    pub fn set_count(&mut self, count: u32) -> bool {
        if self.state != GrammarState::AwaitingCount || count == 0 {
            return false;
        }
        self.count = count;
        self.state = GrammarState::AwaitingMotion;
        true
    }

    /// Feed a motion token.
    ///
    /// A recognised token with an operator pending completes the sentence:
    /// the invocation is returned and the grammar resets to idle with a
    /// count of 1.  An unrecognised token, or a motion with no operator
    /// pending, returns `None` and leaves the state untouched.
    pub fn motion(&mut self, token: &str) -> Option<Invocation> {
        let scope = Scope::from_token(token)?;
        let operator = match self.state {
            GrammarState::AwaitingOperator => return None,
            GrammarState::AwaitingCount | GrammarState::AwaitingMotion => self.operator?,
        };
        let invocation = Invocation {
            operator,
            scope,
            count: self.count,
        };
        self.reset();
        Some(invocation)
    }

    /// Drop any half-entered sentence.
    pub fn reset(&mut self) {
        self.state = GrammarState::AwaitingOperator;
        self.count = 1;
        self.operator = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_with_count_one() {
        let g = Grammar::new();
        assert_eq!(g.state(), GrammarState::AwaitingOperator);
        assert_eq!(g.count(), 1);
        assert_eq!(g.operator(), None);
    }

    #[test]
    fn explicit_count_reaches_the_operator_once() {
        let mut g = Grammar::new();
        g.select_operator(Operator::Kill);
        assert!(g.set_count(3));
        assert_eq!(g.state(), GrammarState::AwaitingMotion);
        let inv = g.motion("c").expect("should dispatch");
        assert_eq!(
            inv,
            Invocation {
                operator: Operator::Kill,
                scope: Scope::Client,
                count: 3
            }
        );
        assert_eq!(g.state(), GrammarState::AwaitingOperator);
        assert_eq!(g.count(), 1);
        assert_eq!(g.motion("c"), None, "sentence must not dispatch twice");
    }

    #[test]
    fn operator_then_motion_defaults_count_to_one() {
        let mut short = Grammar::new();
        short.select_operator(Operator::FocusDown);
        let a = short.motion("w");

        let mut long = Grammar::new();
        long.select_operator(Operator::FocusDown);
        long.set_count(1);
        let b = long.motion("w");

        assert_eq!(a, b);
        assert_eq!(a.map(|i| i.count), Some(1));
        assert_eq!(short, long);
    }

    #[test]
    fn unrecognised_motion_changes_nothing() {
        let mut g = Grammar::new();
        g.select_operator(Operator::MoveUp);
        let before = g.clone();
        assert_eq!(g.motion("x"), None);
        assert_eq!(g, before);
        assert_eq!(g.state(), GrammarState::AwaitingCount);

        g.set_count(4);
        let before = g.clone();
        assert_eq!(g.motion("q"), None);
        assert_eq!(g, before);
        assert_eq!(g.motion("w").map(|i| i.count), Some(4));
    }

    #[test]
    fn motion_without_operator_is_ignored() {
        let mut g = Grammar::new();
        assert_eq!(g.motion("c"), None);
        assert_eq!(g, Grammar::new());
    }

    #[test]
    fn count_outside_counting_state_is_ignored() {
        let mut g = Grammar::new();
        assert!(!g.set_count(5));
        assert_eq!(g.count(), 1);

        g.select_operator(Operator::GrowGaps);
        assert!(!g.set_count(0));
        assert!(g.set_count(2));
        assert!(!g.set_count(7));
        assert_eq!(g.count(), 2);
    }

    #[test]
    fn new_operator_replaces_pending_one() {
        let mut g = Grammar::new();
        g.select_operator(Operator::Kill);
        g.select_operator(Operator::Close);
        assert_eq!(g.motion("client").map(|i| i.operator), Some(Operator::Close));
    }

    #[test]
    fn long_motion_tokens_are_accepted() {
        assert_eq!(Scope::from_token("workspace"), Some(Scope::Workspace));
        assert_eq!(Scope::from_token(" c "), Some(Scope::Client));
        assert_eq!(Scope::from_token("cw"), None);
    }

    #[test]
    fn mode_indices() {
        assert_eq!(Mode::from_index(0), Some(Mode::Normal));
        assert_eq!(Mode::from_index(2), Some(Mode::Floating));
        assert_eq!(Mode::from_index(3), None);
        assert_eq!(Mode::from_index(-1), None);
    }
}
