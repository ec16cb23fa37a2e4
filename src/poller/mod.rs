//! Background command poller.
//!
//! One poller is bound to one session row. It performs the row's login
//! bookkeeping, applies the one-time admin remark, then every `interval`
//! reads the row's `Command` cell, executes it and writes the result into
//! `Command Response`.
//!
//! Delivery is at-least-once: the command cell is replaced with a
//! `;Run on <time>` marker only after execution, and the leading `;` makes
//! the marker read as empty on the next cycle. A cycle with nothing pending
//! writes nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::board::{ProblemBoard, SharedBoard};
use crate::command::executor::{show_foreground_result, CommandExecutor, Origin, Outcome};
use crate::error::StoreError;
use crate::registry::{timestamp, CommandCells, LoginRecord, SessionRegistry};
use crate::session::terminal::Terminal;

/// Administrator annotations start at the first `;` of the command cell.
pub const ANNOTATION_MARKER: char = ';';

/// Backoff between failed login bookkeeping attempts.
const BOOKKEEPING_RETRY: Duration = Duration::from_secs(1);

/// Extra time `stop()` grants the task beyond one poll interval.
const STOP_GRACE: Duration = Duration::from_secs(2);

pub const RESPONSE_NOT_READY: &str = "Command is not ready";
pub const RESPONSE_FOREGROUND: &str = "Run as foreground";
pub const RESPONSE_LOGOUT: &str = "Logout";
pub const RESPONSE_INVALID: &str = "Invalid command.";

/// Command text with any administrator annotation removed.
pub fn strip_annotation(command: &str) -> &str {
    match command.find(ANNOTATION_MARKER) {
        Some(idx) => &command[..idx],
        None => command,
    }
}

/// Responses never contain `=`, so the store cannot read them as formulas.
pub fn sanitize_response(text: &str) -> String {
    text.replace('=', "-")
}

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Username no longer present in the registry.
    UserMissing,
    /// Nothing pending; no writes.
    Idle,
    /// A command was pending before the first board was published.
    NotReady,
    Executed { response: String },
}

/// Background poller for one session row.
pub struct CommandPoller {
    username: String,
    registry: SessionRegistry,
    executor: Arc<CommandExecutor>,
    board: SharedBoard,
    terminal: Arc<dyn Terminal>,
    interval: Duration,
    admin_remark: Option<String>,
    running: CancellationToken,
    quit: CancellationToken,
}

impl CommandPoller {
    /// `shutdown` is the process-wide token; cancelling it stops the poller.
    pub fn new(
        username: impl Into<String>,
        registry: SessionRegistry,
        executor: Arc<CommandExecutor>,
        board: SharedBoard,
        terminal: Arc<dyn Terminal>,
        interval: Duration,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            username: username.into(),
            registry,
            executor,
            board,
            terminal,
            interval,
            admin_remark: None,
            running: shutdown.child_token(),
            quit: CancellationToken::new(),
        }
    }

    /// Remark written once, before the first command cycle.
    pub fn with_admin_remark(mut self, remark: Option<String>) -> Self {
        self.admin_remark = remark;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Claim or reuse the user's row and record this login.
    pub async fn record_login(&self) -> Result<LoginRecord, StoreError> {
        let row = self.registry.find_or_create_row(&self.username).await?;
        self.registry.record_login(row, &self.username).await
    }

    /// Run one poll cycle.
    pub async fn poll_once(&self) -> Result<CycleReport, StoreError> {
        let Some(row) = self.registry.locate_row(&self.username).await? else {
            tracing::debug!(username = %self.username, "User not in registry, skipping cycle");
            return Ok(CycleReport::UserMissing);
        };

        let cells = self.registry.read_command(row).await?;
        let command = strip_annotation(&cells.command).trim().to_string();
        if command.is_empty() {
            return Ok(CycleReport::Idle);
        }

        let Some(board) = self.board.current() else {
            // Leave the command in place; it runs once a board is published.
            self.registry
                .write_command_cells(
                    row,
                    &CommandCells {
                        command: cells.command,
                        response: RESPONSE_NOT_READY.to_string(),
                    },
                )
                .await?;
            return Ok(CycleReport::NotReady);
        };

        tracing::info!(username = %self.username, row, command = %command, "Executing remote command");
        let response = match self.executor.execute_remote(&command, &board).await {
            Ok(Outcome::Text(text)) => text,
            Ok(Outcome::NoOp) => String::new(),
            Ok(Outcome::InvalidCommand) => RESPONSE_INVALID.to_string(),
            Ok(Outcome::LogoutRequested) => {
                self.request_quit();
                RESPONSE_LOGOUT.to_string()
            }
            Ok(Outcome::ForegroundRequested(text)) => {
                if self.run_foreground(&text, &board).await {
                    self.request_quit();
                    RESPONSE_LOGOUT.to_string()
                } else {
                    RESPONSE_FOREGROUND.to_string()
                }
            }
            Err(e) => e.to_string(),
        };
        let response = sanitize_response(&response);

        self.registry
            .write_command_cells(
                row,
                &CommandCells {
                    command: format!("{}Run on {}", ANNOTATION_MARKER, timestamp()),
                    response: response.clone(),
                },
            )
            .await?;
        Ok(CycleReport::Executed { response })
    }

    /// Execute a delegated command as if the user typed it, then redraw the
    /// board and prompt. Returns true when it asked to log out.
    async fn run_foreground(&self, text: &str, board: &ProblemBoard) -> bool {
        let result = self.executor.execute(text, Origin::Foreground, board).await;
        show_foreground_result(self.terminal.as_ref(), &result);
        if matches!(result, Ok(Outcome::LogoutRequested)) {
            return true;
        }
        self.terminal.print(&board.render(&self.username));
        self.terminal.write("> ");
        false
    }

    fn request_quit(&self) {
        tracing::info!(username = %self.username, "Logout requested by administrator");
        self.quit.cancel();
        self.running.cancel();
    }

    /// Start the background task.
    pub fn spawn(self) -> PollerHandle {
        let poller = Arc::new(self);
        let task = tokio::spawn(Arc::clone(&poller).run());
        PollerHandle {
            poller,
            stopped: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(self: Arc<Self>) {
        loop {
            let attempt = tokio::select! {
                _ = self.running.cancelled() => return,
                result = self.record_login() => result,
            };
            match attempt {
                Ok(record) => {
                    tracing::debug!(username = %self.username, row = record.row, "Login bookkeeping done");
                    break;
                }
                Err(e) => {
                    tracing::warn!(username = %self.username, error = %e, "Login bookkeeping failed, retrying");
                    tokio::select! {
                        _ = self.running.cancelled() => return,
                        _ = tokio::time::sleep(BOOKKEEPING_RETRY) => {}
                    }
                }
            }
        }

        if let Some(remark) = &self.admin_remark {
            match self.registry.set_remark(&self.username, remark).await {
                Ok(true) => tracing::info!(username = %self.username, "Admin remark applied"),
                Ok(false) => tracing::warn!(username = %self.username, "Admin remark skipped, no row"),
                Err(e) => tracing::warn!(username = %self.username, error = %e, "Admin remark failed"),
            }
        }

        while !self.running.is_cancelled() {
            let started = Instant::now();

            // A started cycle always finishes so its response gets written.
            match self.poll_once().await {
                Ok(report) => tracing::debug!(username = %self.username, ?report, "Poll cycle done"),
                Err(e) => tracing::warn!(username = %self.username, error = %e, "Poll cycle failed"),
            }

            tokio::select! {
                _ = self.running.cancelled() => break,
                _ = tokio::time::sleep_until(started + self.interval) => {}
            }
        }
        tracing::debug!(username = %self.username, "Poller stopped");
    }
}

/// Owner's handle on a spawned poller. `stop()` is idempotent and may be
/// called from any task.
pub struct PollerHandle {
    poller: Arc<CommandPoller>,
    stopped: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollerHandle {
    /// Whether the administrator asked this session to log out.
    pub fn quit_requested(&self) -> bool {
        self.poller.quit.is_cancelled()
    }

    /// Token cancelled when the administrator asks for logout.
    pub fn quit_signal(&self) -> CancellationToken {
        self.poller.quit.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.poller.running.is_cancelled()
    }

    /// Write the logout notice, cancel the task and wait for it to finish.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let poller = &self.poller;
        let notice = format!("Logout on {}", timestamp());
        match poller.registry.set_remark(&poller.username, &notice).await {
            Ok(_) => tracing::info!(username = %poller.username, "Logout recorded"),
            Err(e) => tracing::warn!(username = %poller.username, error = %e, "Failed to record logout"),
        }
        poller.running.cancel();

        let task = self.task.lock().await.take();
        if let Some(mut task) = task {
            let grace = poller.interval + STOP_GRACE;
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                tracing::warn!(username = %poller.username, "Poller did not stop in time, aborting");
                task.abort();
            }
        }
    }
}
