//! Detached process launching.
//!
//! Programs are started in their own session and never waited on.  The
//! standard library reports a failed `exec` through `spawn`, so a missing
//! program surfaces as a [`SpawnError`] instead of vanishing in the child.

use log::info;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("empty command line")]
    Empty,
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Launch `argv[0]` with the remaining arguments and return immediately.
pub fn spawn_detached(argv: &[String]) -> Result<(), SpawnError> {
    let (program, args) = argv.split_first().ok_or(SpawnError::Empty)?;
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());

    unsafe {
        command.pre_exec(|| match libc::setsid() {
            -1 => Err(std::io::Error::last_os_error()),
            _ => Ok(()),
        });
    }

    let child = command.spawn().map_err(|source| SpawnError::Launch {
        program: program.clone(),
        source,
    })?;
    info!("spawned {} (pid {})", program, child.id());
    Ok(())
}

/// Stop the kernel from keeping exited children around as zombies.
pub fn ignore_child_exits() {
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_argv_is_rejected() {
        assert!(matches!(spawn_detached(&[]), Err(SpawnError::Empty)));
    }

    #[test]
    fn missing_program_is_reported() {
        let argv = vec!["/nonexistent/definitely-not-a-program".to_string()];
        match spawn_detached(&argv) {
            Err(SpawnError::Launch { program, .. }) => {
                assert_eq!(program, "/nonexistent/definitely-not-a-program")
            }
            other => panic!("expected launch error, got {other:?}"),
        }
    }

    #[test]
    fn existing_program_launches() {
        let argv = vec!["true".to_string()];
        spawn_detached(&argv).unwrap();
    }
}
