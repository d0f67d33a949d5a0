//! Text command table.
//!
//! A request is one line: a command name followed by whitespace-separated
//! arguments.  The [`CommandTable`] maps each name to a [`CommandHandler`]
//! that validates the arguments and builds a [`Command`]; the command is
//! then run against a [`CommandSink`] and the outcome reduced to a status
//! code.
//!
//! ```text
//! change_ws 3
//! op_kill
//! count 2
//! motion c
//! spawn xterm -e htop
//! ```

use crate::command::Command;
use crate::grammar::Operator;
use crate::traits::CommandSink;
use log::{debug, warn};
use std::collections::HashMap;

/// Status code for a command that ran.
pub const STATUS_OK: i32 = 0;

/// Why a request was refused.  Each variant has a stable status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IpcError {
    #[error("malformed request")]
    Syntax,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("too many arguments")]
    TooManyArgs,
    #[error("too few arguments")]
    TooFewArgs,
    #[error("{0:?} is not an integer")]
    NotAnInt(String),
    #[error("{value} is below the minimum {min}")]
    TooSmall { value: i64, min: i64 },
    #[error("{value} is above the maximum {max}")]
    TooLarge { value: i64, max: i64 },
    #[error("command failed: {0}")]
    Failed(String),
}

impl IpcError {
    pub fn code(&self) -> i32 {
        match self {
            IpcError::Syntax => 1,
            IpcError::UnknownCommand(_) => 2,
            IpcError::TooManyArgs => 3,
            IpcError::TooFewArgs => 4,
            IpcError::NotAnInt(_) => 5,
            IpcError::TooSmall { .. } => 6,
            IpcError::TooLarge { .. } => 7,
            IpcError::Failed(_) => 8,
        }
    }
}

/// Turns the arguments of one request into a [`Command`].
pub trait CommandHandler {
    fn build(&self, args: &[&str]) -> Result<Command, IpcError>;
}

impl<F> CommandHandler for F
where
    F: Fn(&[&str]) -> Result<Command, IpcError>,
{
    fn build(&self, args: &[&str]) -> Result<Command, IpcError> {
        self(args)
    }
}

/// Pin a closure to the handler signature.
pub fn handler<F>(f: F) -> F
where
    F: Fn(&[&str]) -> Result<Command, IpcError>,
{
    f
}

/// A handler for a command that takes no arguments.
pub fn nullary(cmd: Command) -> impl CommandHandler {
    handler(move |args| {
        if !args.is_empty() {
            return Err(IpcError::TooManyArgs);
        }
        Ok(cmd.clone())
    })
}

/// A handler for a command that takes one integer in `min..=max`.
pub fn unary_int(min: i64, max: i64, build: fn(i32) -> Command) -> impl CommandHandler {
    handler(move |args| {
        let value = single(args)?;
        let n: i64 = value
            .parse()
            .map_err(|_| IpcError::NotAnInt(value.to_string()))?;
        if n < min {
            return Err(IpcError::TooSmall { value: n, min });
        }
        if n > max {
            return Err(IpcError::TooLarge { value: n, max });
        }
        i32::try_from(n)
            .map(build)
            .map_err(|_| IpcError::TooLarge { value: n, max: i64::from(i32::MAX) })
    })
}

fn single<'a>(args: &[&'a str]) -> Result<&'a str, IpcError> {
    match args {
        [] => Err(IpcError::TooFewArgs),
        [value] => Ok(value),
        _ => Err(IpcError::TooManyArgs),
    }
}

const ANY: (i64, i64) = (i32::MIN as i64, i32::MAX as i64);

/// Command name to handler.
pub struct CommandTable {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandTable {
    /// A table with no commands.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Bind `name` to `handler`, replacing any previous binding.
    pub fn register(&mut self, name: &'static str, handler: impl CommandHandler + 'static) {
        self.handlers.insert(name, Box::new(handler));
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Parse one request line.
    pub fn parse(&self, line: &str) -> Result<Command, IpcError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(IpcError::Syntax)?;
        let args: Vec<&str> = words.collect();
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| IpcError::UnknownCommand(name.to_string()))?;
        handler.build(&args)
    }

    /// Parse `line`, run it against `sink` and return the status code.
    pub fn dispatch<S: CommandSink>(&self, line: &str, sink: &mut S) -> i32 {
        let cmd = match self.parse(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("rejected {:?}: {}", line.trim(), e);
                return e.code();
            }
        };
        debug!("ipc {:?}", cmd);
        match sink.execute(cmd) {
            Ok(()) => STATUS_OK,
            Err(e) => {
                let err = IpcError::Failed(e.to_string());
                warn!("{}", err);
                err.code()
            }
        }
    }
}

impl Default for CommandTable {
    /// Every built-in command.
    fn default() -> Self {
        let mut t = Self::empty();
        let (lo, hi) = ANY;

        t.register("change_ws", unary_int(lo, hi, Command::ChangeWorkspace));
        t.register("focus_next_ws", nullary(Command::FocusNextWorkspace));
        t.register("focus_prev_ws", nullary(Command::FocusPrevWorkspace));
        t.register("focus_last_ws", nullary(Command::FocusLastWorkspace));
        t.register("current_to_ws", unary_int(lo, hi, Command::CurrentToWorkspace));
        t.register("focus_urgent", nullary(Command::FocusUrgent));
        t.register("toggle_bar", nullary(Command::ToggleBar));

        t.register("focus_next_client", nullary(Command::FocusNextClient));
        t.register("focus_prev_client", nullary(Command::FocusPrevClient));
        t.register("move_current_up", nullary(Command::MoveCurrentUp));
        t.register("move_current_down", nullary(Command::MoveCurrentDown));
        t.register("make_master", nullary(Command::MakeMaster));
        t.register("toggle_float", nullary(Command::ToggleFloat));
        t.register("toggle_fullscreen", nullary(Command::ToggleFullscreen));
        t.register("resize_float_width", unary_int(lo, hi, Command::ResizeFloatWidth));
        t.register("resize_float_height", unary_int(lo, hi, Command::ResizeFloatHeight));
        t.register("move_float_x", unary_int(lo, hi, Command::MoveFloatX));
        t.register("move_float_y", unary_int(lo, hi, Command::MoveFloatY));
        t.register("teleport_client", unary_int(0, 6, Command::Teleport));
        t.register("send_to_scratchpad", nullary(Command::SendToScratchpad));
        t.register("get_from_scratchpad", nullary(Command::GetFromScratchpad));

        t.register("change_layout", unary_int(0, 3, Command::ChangeLayout));
        t.register("next_layout", nullary(Command::NextLayout));
        t.register("prev_layout", nullary(Command::PrevLayout));
        t.register("last_layout", nullary(Command::LastLayout));
        t.register("resize_master", unary_int(-100, 100, Command::ResizeMaster));

        t.register("change_mode", unary_int(0, 2, Command::ChangeMode));
        t.register("op_kill", nullary(Command::Operator(Operator::Kill)));
        t.register("op_close", nullary(Command::Operator(Operator::Close)));
        t.register("op_move_up", nullary(Command::Operator(Operator::MoveUp)));
        t.register("op_move_down", nullary(Command::Operator(Operator::MoveDown)));
        t.register("op_focus_up", nullary(Command::Operator(Operator::FocusUp)));
        t.register("op_focus_down", nullary(Command::Operator(Operator::FocusDown)));
        t.register("op_shrink_gaps", nullary(Command::Operator(Operator::ShrinkGaps)));
        t.register("op_grow_gaps", nullary(Command::Operator(Operator::GrowGaps)));
        t.register(
            "count",
            unary_int(1, hi, |n| Command::Count(n.unsigned_abs())),
        );
        t.register(
            "motion",
            handler(|args| single(args).map(|token| Command::Motion(token.to_string()))),
        );
        t.register("paste", nullary(Command::Paste));

        t.register(
            "spawn",
            handler(|args| {
                if args.is_empty() {
                    return Err(IpcError::TooFewArgs);
                }
                Ok(Command::Spawn(args.iter().map(|a| a.to_string()).collect()))
            }),
        );
        t.register("quit", unary_int(0, 255, Command::Quit));
        t.register("restart", nullary(Command::Restart));
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("sink refused")]
    struct SinkErr;

    #[derive(Default)]
    struct RecordingSink {
        commands: Vec<Command>,
        fail: bool,
    }

    impl CommandSink for RecordingSink {
        type Error = SinkErr;

        fn execute(&mut self, cmd: Command) -> Result<(), SinkErr> {
            if self.fail {
                return Err(SinkErr);
            }
            self.commands.push(cmd);
            Ok(())
        }
    }

    #[test]
    fn parses_commands_with_arguments() {
        let t = CommandTable::default();
        assert_eq!(t.parse("change_ws 3"), Ok(Command::ChangeWorkspace(3)));
        assert_eq!(t.parse("  resize_master   -5 \n"), Ok(Command::ResizeMaster(-5)));
        assert_eq!(t.parse("op_kill"), Ok(Command::Operator(Operator::Kill)));
        assert_eq!(t.parse("count 4"), Ok(Command::Count(4)));
        assert_eq!(t.parse("motion w"), Ok(Command::Motion("w".into())));
        assert_eq!(
            t.parse("spawn xterm -e top"),
            Ok(Command::Spawn(vec!["xterm".into(), "-e".into(), "top".into()]))
        );
    }

    #[test]
    fn argument_errors_have_distinct_codes() {
        let t = CommandTable::default();
        let code = |line: &str| t.parse(line).unwrap_err().code();
        assert_eq!(code(""), 1);
        assert_eq!(code("   "), 1);
        assert_eq!(code("launch_missiles"), 2);
        assert_eq!(code("paste now"), 3);
        assert_eq!(code("change_ws 1 2"), 3);
        assert_eq!(code("change_ws"), 4);
        assert_eq!(code("spawn"), 4);
        assert_eq!(code("change_ws two"), 5);
        assert_eq!(code("count 0"), 6);
        assert_eq!(code("change_layout 4"), 7);
        assert_eq!(code("change_ws 99999999999"), 7);
    }

    #[test]
    fn dispatch_runs_valid_commands() {
        let t = CommandTable::default();
        let mut sink = RecordingSink::default();
        assert_eq!(t.dispatch("focus_next_ws\n", &mut sink), STATUS_OK);
        assert_eq!(t.dispatch("quit 2", &mut sink), STATUS_OK);
        assert_eq!(sink.commands, vec![Command::FocusNextWorkspace, Command::Quit(2)]);
    }

    #[test]
    fn rejected_requests_do_not_reach_the_sink() {
        let t = CommandTable::default();
        let mut sink = RecordingSink::default();
        assert_eq!(t.dispatch("nope", &mut sink), 2);
        assert_eq!(t.dispatch("change_ws x", &mut sink), 5);
        assert!(sink.commands.is_empty());
    }

    #[test]
    fn sink_failure_maps_to_failed() {
        let t = CommandTable::default();
        let mut sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        assert_eq!(t.dispatch("spawn true", &mut sink), 8);
    }

    #[test]
    fn custom_handlers_can_be_registered() {
        let mut t = CommandTable::empty();
        t.register("hello", nullary(Command::Restart));
        assert_eq!(t.names(), vec!["hello"]);
        assert_eq!(t.parse("hello"), Ok(Command::Restart));
        assert_eq!(t.parse("change_ws 1").unwrap_err().code(), 2);
    }

    #[test]
    fn default_table_covers_every_command_family() {
        let names = CommandTable::default().names();
        for name in ["change_ws", "toggle_float", "change_layout", "op_grow_gaps", "paste", "spawn", "restart"] {
            assert!(names.contains(&name), "missing {name}");
        }
    }
}
