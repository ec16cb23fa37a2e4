use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::board::ProblemBoard;
use crate::command::grammar::Command;
use crate::command::os::OsCommandRunner;
use crate::error::{CommandError, GraderError};
use crate::grader::{GradingSurface, Problem, UNSPECIFIED_PROBLEM};
use crate::session::terminal::Terminal;

pub const USAGE: &str = "==== HELP ====
Type \"[File Path]\" to submit file to grader.
Type \"[Problem Number]\" to view compiler message.
Type \"[Problem Number] [File Path]\" to submit file to correspond problem.
Type \"-p [Problem Number] -f [File Path]\" to do the same with flags.
Type \"logout\" to logout
Type nothing to refresh";

/// Who issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Typed by the logged-in user
    Foreground,
    /// Injected by the administrator through the registry sheet
    Background,
}

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Text(String),
    /// The command must run in the foreground instead; carries the command text.
    ForegroundRequested(String),
    InvalidCommand,
    LogoutRequested,
    NoOp,
}

/// Executes commands against the grading site and the local OS.
///
/// Shared by the foreground session and the poller. Every grading site call
/// goes through one gate, so a background submission waits for an in-flight
/// foreground call instead of interleaving with it on the same login session.
pub struct CommandExecutor {
    grader: Arc<dyn GradingSurface>,
    gate: Mutex<()>,
    os: OsCommandRunner,
    terminal: Arc<dyn Terminal>,
}

impl CommandExecutor {
    pub fn new(
        grader: Arc<dyn GradingSurface>,
        os: OsCommandRunner,
        terminal: Arc<dyn Terminal>,
    ) -> Self {
        Self {
            grader,
            gate: Mutex::new(()),
            os,
            terminal,
        }
    }

    pub async fn fetch_problems(&self) -> Result<Vec<Problem>, GraderError> {
        let _gate = self.gate.lock().await;
        self.grader.problems().await
    }

    /// Entry point for commands read from the registry sheet: `os` and `bg`
    /// run here, anything else must run as a foreground command.
    pub async fn execute_remote(
        &self,
        text: &str,
        board: &ProblemBoard,
    ) -> Result<Outcome, CommandError> {
        match Command::parse_with(text, |_| false) {
            Command::Os(_) | Command::Background(_) => {
                self.execute(text, Origin::Background, board).await
            }
            _ => Ok(Outcome::ForegroundRequested(text.trim().to_string())),
        }
    }

    pub async fn execute(
        &self,
        text: &str,
        origin: Origin,
        board: &ProblemBoard,
    ) -> Result<Outcome, CommandError> {
        let mut origin = origin;
        let mut command = Command::parse(text);
        while let Command::Background(rest) = command {
            origin = Origin::Background;
            command = Command::parse(&rest);
        }
        tracing::debug!(?origin, ?command, "Executing command");

        match command {
            Command::Os(shell) => Ok(Outcome::Text(self.os.run(&shell).await?)),
            Command::Help => match origin {
                Origin::Background => Ok(Outcome::ForegroundRequested("help".to_string())),
                Origin::Foreground => {
                    self.terminal.print(USAGE);
                    Ok(Outcome::NoOp)
                }
            },
            Command::Logout => Ok(Outcome::LogoutRequested),
            Command::Refresh | Command::Background(_) => Ok(Outcome::NoOp),
            Command::ViewMessage(number) => {
                let problem = board.problem(number)?;
                let Some(link) = &problem.compiler_msg else {
                    return Ok(Outcome::Text("No compiler message yet".to_string()));
                };
                let message = {
                    let _gate = self.gate.lock().await;
                    self.grader.compiler_message(link).await?
                };
                Ok(Outcome::Text(match origin {
                    Origin::Foreground => message.render(),
                    Origin::Background => message.render_compact(),
                }))
            }
            Command::Submit { problem, file } => {
                if !board.accept.accepts(&file) {
                    return Err(CommandError::FileRejected(file));
                }
                let (problem_id, notice) = match problem {
                    Some(number) => {
                        let problem = board.problem(number)?;
                        (
                            problem.id,
                            format!(
                                "Submitting file \"{}\" to problem \"{}\"...",
                                file, problem.name
                            ),
                        )
                    }
                    None => (
                        UNSPECIFIED_PROBLEM,
                        format!("Submitting file \"{}\"...", file),
                    ),
                };
                {
                    let _gate = self.gate.lock().await;
                    self.grader.submit(problem_id, Path::new(&file)).await?;
                }
                tracing::info!(?origin, problem_id, file, "Submission sent");
                Ok(Outcome::Text(notice))
            }
            Command::Invalid(reason) => {
                tracing::debug!(?origin, reason, "Invalid command");
                Ok(Outcome::InvalidCommand)
            }
        }
    }
}

/// Print a foreground result on the user's terminal.
pub fn show_foreground_result(terminal: &dyn Terminal, result: &Result<Outcome, CommandError>) {
    match result {
        Ok(Outcome::Text(text)) => terminal.print(text),
        Ok(Outcome::InvalidCommand) => terminal.print("Invalid command. Type \"help\" for help."),
        Ok(Outcome::ForegroundRequested(_) | Outcome::LogoutRequested | Outcome::NoOp) => {}
        Err(e) => terminal.print(&e.to_string()),
    }
}
