//! Session coordinator: one login from policy resolution to logout.
//!
//! ```text
//! ResolvingPolicy -> AwaitingCredentials <-> Authenticating -> Active -> ShuttingDown -> Terminated
//!        |                    |
//!        +--(disabled)--------+--(exam user not in roster, interrupt)--> Terminated
//! ```
//!
//! While `Active` the coordinator fetches problems, publishes them to the
//! poller through the [`SharedBoard`], and handles one foreground command per
//! iteration. It leaves `Active` on logout, an administrator quit, an
//! interrupt, end of input, or a fatal error, and always stops its poller.

pub mod terminal;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::board::{ProblemBoard, SharedBoard};
use crate::command::executor::{show_foreground_result, CommandExecutor, Origin, Outcome};
use crate::command::OsCommandRunner;
use crate::config::{AdminOptions, RelayConfig};
use crate::error::{RelayError, Result, StoreError};
use crate::grader::{GradingSurface, LoginOutcome};
use crate::poller::{CommandPoller, PollerHandle};
use crate::policy::{AcceptPattern, LoginMode, PolicyConfig};
use crate::registry::SessionRegistry;
use crate::store::TabularStore;

use self::terminal::Terminal;

/// Wait before a session restarts after the store was unreachable.
pub const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Wait before refetching problems after a grading site failure.
const FETCH_RETRY: Duration = Duration::from_secs(1);

/// Wait before rereading the roster after the grader rejected its password.
pub const ROSTER_RETRY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    ResolvingPolicy,
    AwaitingCredentials,
    Authenticating,
    Active,
    ShuttingDown,
    Terminated,
}

/// How a session ended, as seen by the process loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// Done; the process may exit.
    Finished,
    /// The store could not be reached; start a new session.
    Restart,
}

/// Why `Active` ended.
enum ActiveExit {
    Logout,
    Fatal(String),
}

pub struct SessionCoordinator {
    config: RelayConfig,
    admin: AdminOptions,
    store: Arc<dyn TabularStore>,
    grader: Arc<dyn GradingSurface>,
    terminal: Arc<dyn Terminal>,
    shutdown: CancellationToken,
    session_id: Uuid,
    states: Vec<SessionState>,
}

impl SessionCoordinator {
    pub fn new(
        config: RelayConfig,
        store: Arc<dyn TabularStore>,
        grader: Arc<dyn GradingSurface>,
        terminal: Arc<dyn Terminal>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            admin: AdminOptions::default(),
            store,
            grader,
            terminal,
            shutdown,
            session_id: Uuid::new_v4(),
            states: Vec::new(),
        }
    }

    pub fn with_admin_options(mut self, admin: AdminOptions) -> Self {
        self.admin = admin;
        self
    }

    /// Every state entered so far, in order.
    pub fn states(&self) -> &[SessionState] {
        &self.states
    }

    pub fn state(&self) -> Option<SessionState> {
        self.states.last().copied()
    }

    fn enter(&mut self, state: SessionState) {
        tracing::debug!(?state, "Session state");
        self.states.push(state);
    }

    /// Drive one session for `username` to completion.
    pub async fn run(&mut self, username: &str) -> SessionExit {
        let span = tracing::info_span!("session", id = %self.session_id, username);
        self.run_session(username).instrument(span).await
    }

    async fn run_session(&mut self, username: &str) -> SessionExit {
        self.enter(SessionState::ResolvingPolicy);
        let policy = match self.load_policy().await {
            Ok(policy) => policy,
            Err(RelayError::Store(e)) => {
                tracing::warn!(error = %e, "Store unreachable");
                if self.config.verbose {
                    self.terminal.print(&format!("Store error! {}", e));
                } else {
                    self.terminal
                        .print("Unexpected error occurred. Maybe internet connection failed?");
                }
                self.terminal.print("Retry in 5 seconds");
                tokio::select! {
                    _ = self.shutdown.cancelled() => {}
                    _ = tokio::time::sleep(RESTART_DELAY) => {}
                }
                self.enter(SessionState::Terminated);
                return if self.shutdown.is_cancelled() {
                    SessionExit::Finished
                } else {
                    SessionExit::Restart
                };
            }
            Err(e) => return self.terminate(&e.user_message(self.config.verbose)),
        };

        let (mode, pattern) = policy.resolve_for_user(username);
        tracing::info!(%mode, accept = pattern, "Policy resolved");
        let accept = match AcceptPattern::compile(pattern) {
            Ok(accept) => accept,
            Err(e) => return self.terminate(&e.user_message(self.config.verbose)),
        };
        if !mode.allows_login() {
            return self.terminate(
                "Exam relay is disabled right now. Please contact grader administrator.",
            );
        }

        if let Some(exit) = self.authenticate(username, mode, policy).await {
            return exit;
        }

        self.enter(SessionState::Active);
        let executor = Arc::new(CommandExecutor::new(
            Arc::clone(&self.grader),
            OsCommandRunner::new(self.config.os_commands.clone()),
            Arc::clone(&self.terminal),
        ));
        let board = SharedBoard::new();
        let poller = CommandPoller::new(
            username,
            SessionRegistry::new(Arc::clone(&self.store), self.config.registry.clone()),
            Arc::clone(&executor),
            board.clone(),
            Arc::clone(&self.terminal),
            self.config.poll_interval,
            &self.shutdown,
        )
        .with_admin_remark(self.admin.remark.clone())
        .spawn();
        self.terminal.clear();

        let exit = self
            .active_loop(username, &executor, &board, &accept, &poller)
            .await;

        self.enter(SessionState::ShuttingDown);
        match exit {
            ActiveExit::Logout => self.terminal.print("Logging out..."),
            ActiveExit::Fatal(message) => {
                tracing::error!(error = %message, "Session failed");
                self.terminal.print(&format!("Fatal error: {}", message));
            }
        }
        poller.stop().await;
        self.enter(SessionState::Terminated);
        SessionExit::Finished
    }

    /// Read the policy sheet after checking both worksheets exist.
    async fn load_policy(&self) -> Result<PolicyConfig> {
        let sheets = match self.store.sheet_names().await {
            Ok(sheets) => sheets,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RelayError::configuration(
                    "infosheet",
                    format!("Spreadsheet is not found: {}", e),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        let has = |name: &str| sheets.iter().any(|s| s == name);
        if !has(&self.config.policy_sheet) {
            return Err(RelayError::configuration(
                "contest",
                format!("Worksheet \"{}\" is not found", self.config.policy_sheet),
            ));
        }
        if !has(&self.config.registry.sheet) {
            return Err(RelayError::configuration(
                "log",
                format!("Worksheet \"{}\" is not found", self.config.registry.sheet),
            ));
        }
        let rows = self.store.read_all(&self.config.policy_sheet).await?;
        Ok(PolicyConfig::resolve(&rows))
    }

    /// Credential loop. `None` means the login was accepted.
    ///
    /// Retries are unlimited. In exam mode the roster is reread before each
    /// retry so an administrator can correct the password meanwhile.
    async fn authenticate(
        &mut self,
        username: &str,
        mode: LoginMode,
        mut policy: PolicyConfig,
    ) -> Option<SessionExit> {
        loop {
            self.enter(SessionState::AwaitingCredentials);
            let password = match mode {
                LoginMode::Exam => match policy.password_for(username) {
                    Some(password) => password.to_string(),
                    None if self.config.verbose => {
                        return Some(self.terminate("User is not found in user list"));
                    }
                    None => return Some(self.terminate("User not found.")),
                },
                _ => {
                    let prompt = tokio::select! {
                        _ = self.shutdown.cancelled() => None,
                        read = self.terminal.read_password("Password: ") => Some(read),
                    };
                    match prompt {
                        Some(Ok(password)) => password,
                        Some(Err(e)) => {
                            return Some(self.terminate(&format!("Fatal error: {}", e)));
                        }
                        None => return Some(self.terminate("Interrupted")),
                    }
                }
            };

            self.enter(SessionState::Authenticating);
            self.terminal.print("Logging into grader...");
            match self.grader.login(username, &password).await {
                Ok(LoginOutcome::Accepted) => {
                    tracing::info!("Logged into grader");
                    return None;
                }
                Ok(LoginOutcome::WrongPassword) => {
                    tracing::info!("Wrong password");
                    self.terminal.print("Wrong password");
                    if mode == LoginMode::Exam {
                        let interrupted = tokio::select! {
                            _ = self.shutdown.cancelled() => true,
                            _ = tokio::time::sleep(ROSTER_RETRY) => false,
                        };
                        if interrupted {
                            return Some(self.terminate("Interrupted"));
                        }
                        match self.load_policy().await {
                            Ok(reloaded) => policy = reloaded,
                            Err(e) => tracing::warn!(error = %e, "Roster reload failed, keeping previous roster"),
                        }
                    }
                }
                Err(e) => return Some(self.terminate(&format!("Grader Error! {}", e))),
            }
        }
    }

    async fn active_loop(
        &self,
        username: &str,
        executor: &CommandExecutor,
        board: &SharedBoard,
        accept: &AcceptPattern,
        poller: &PollerHandle,
    ) -> ActiveExit {
        let quit = poller.quit_signal();
        loop {
            let fetched = tokio::select! {
                _ = quit.cancelled() => return ActiveExit::Logout,
                _ = self.shutdown.cancelled() => return ActiveExit::Logout,
                fetched = executor.fetch_problems() => fetched,
            };
            let problems = match fetched {
                Ok(problems) => problems,
                Err(e) => {
                    tracing::warn!(error = %e, "Problem fetch failed, retrying");
                    self.terminal.print(&format!("Grader Error! {}", e));
                    tokio::select! {
                        _ = quit.cancelled() => return ActiveExit::Logout,
                        _ = self.shutdown.cancelled() => return ActiveExit::Logout,
                        _ = tokio::time::sleep(FETCH_RETRY) => {}
                    }
                    continue;
                }
            };

            let current = Arc::new(ProblemBoard::new(problems, accept.clone()));
            board.publish(Arc::clone(&current));
            self.terminal.print(&current.render(username));

            if poller.quit_requested() {
                return ActiveExit::Logout;
            }

            let line = tokio::select! {
                _ = quit.cancelled() => return ActiveExit::Logout,
                _ = self.shutdown.cancelled() => return ActiveExit::Logout,
                line = self.terminal.read_line("> ") => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => return ActiveExit::Logout,
                Err(e) => return ActiveExit::Fatal(e.to_string()),
            };

            self.terminal.clear();
            let result = executor.execute(&line, Origin::Foreground, &current).await;
            show_foreground_result(self.terminal.as_ref(), &result);
            if matches!(result, Ok(Outcome::LogoutRequested)) || poller.quit_requested() {
                return ActiveExit::Logout;
            }
        }
    }

    fn terminate(&mut self, message: &str) -> SessionExit {
        self.terminal.print(message);
        self.enter(SessionState::Terminated);
        SessionExit::Finished
    }
}
