use std::process::Stdio;

use tokio::process::Command;

use crate::config::OsCommandPolicy;
use crate::error::CommandError;

/// Runs `os <cmd>` text on the local machine.
///
/// Unrestricted commands run through `sh -c` with the session's privileges
/// and working directory. Allowlisted commands never reach a shell: the text
/// is split on whitespace and the allowed program is executed directly, so
/// operators such as `&&`, `|` or `$(...)` are plain arguments.
#[derive(Debug, Clone, Default)]
pub struct OsCommandRunner {
    policy: OsCommandPolicy,
}

impl OsCommandRunner {
    pub fn new(policy: OsCommandPolicy) -> Self {
        Self { policy }
    }

    fn check(&self, shell_text: &str) -> Result<(), CommandError> {
        match &self.policy {
            OsCommandPolicy::Unrestricted => Ok(()),
            OsCommandPolicy::Disabled => Err(CommandError::OsDisabled),
            OsCommandPolicy::Allowlist(allowed) => {
                let program = OsCommandPolicy::program_of(shell_text);
                if allowed.iter().any(|a| a == program) {
                    Ok(())
                } else {
                    Err(CommandError::OsNotAllowed(program.to_string()))
                }
            }
        }
    }

    fn command(&self, shell_text: &str) -> Command {
        match &self.policy {
            OsCommandPolicy::Allowlist(_) => {
                let mut words = shell_text.split_whitespace();
                let mut command = Command::new(words.next().unwrap_or_default());
                command.args(words);
                command
            }
            _ => {
                let mut command = Command::new("sh");
                command.arg("-c").arg(shell_text);
                command
            }
        }
    }

    /// Run `shell_text` and return its standard output, trimmed.
    pub async fn run(&self, shell_text: &str) -> Result<String, CommandError> {
        self.check(shell_text)?;
        tracing::info!(command = shell_text, "Running OS command");

        let result = self
            .command(shell_text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        Self::process_output(shell_text, result)
    }

    fn process_output(
        shell_text: &str,
        result: Result<std::process::Output, std::io::Error>,
    ) -> Result<String, CommandError> {
        match result {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
                let exit_code = output.status.code();
                if output.status.success() {
                    tracing::info!(command = shell_text, exit_code = ?exit_code, "OS command completed");
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    tracing::warn!(
                        command = shell_text,
                        exit_code = ?exit_code,
                        stderr = %stderr.trim(),
                        "OS command exited with failure"
                    );
                }
                Ok(stdout)
            }
            Err(e) => {
                tracing::error!(command = shell_text, error = %e, "OS command could not start");
                Err(CommandError::Os(e.to_string()))
            }
        }
    }
}
