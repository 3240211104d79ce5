//! External command execution
//!
//! Every process multicerti starts (nginx syntax check, service manager,
//! certbot) goes through [`CommandRunner`], so the deployment pipeline can be
//! driven by a fake in tests. Commands run synchronously with inherited
//! stdio and no timeout.

use std::process::Command;
use thiserror::Error;

/// External command failures
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Empty command line")]
    Empty,

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}", describe_code(*.code))]
    Failed { command: String, code: Option<i32> },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

impl CommandError {
    /// Failure for `argv` exiting with `code`
    pub fn failed(argv: &[String], code: Option<i32>) -> Self {
        CommandError::Failed {
            command: argv.join(" "),
            code,
        }
    }
}

/// Runs a command line to completion
pub trait CommandRunner {
    /// Run `argv` (program first). `Ok` only on a zero exit status.
    fn run(&self, argv: &[String]) -> Result<(), CommandError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[String]) -> Result<(), CommandError> {
        (**self).run(argv)
    }
}

/// Runs commands as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<(), CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
        let command = argv.join(" ");
        tracing::info!("▶️ {}", command);

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| CommandError::Spawn {
                command: command.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            tracing::debug!("`{}` exited with {:?}", command, status.code());
            Err(CommandError::Failed {
                command,
                code: status.code(),
            })
        }
    }
}
