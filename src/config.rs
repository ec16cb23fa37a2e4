use std::path::PathBuf;
use std::time::Duration;

/// Which local OS commands remote administrators may run through `os <cmd>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OsCommandPolicy {
    /// Any shell text runs as-is.
    #[default]
    Unrestricted,
    /// `os` commands are refused.
    Disabled,
    /// Only commands whose program name (first word) is listed may run.
    Allowlist(Vec<String>),
}

impl OsCommandPolicy {
    /// Program name a shell line would start, used for allowlist checks.
    pub fn program_of(shell_text: &str) -> &str {
        shell_text.split_whitespace().next().unwrap_or("")
    }
}

/// Registry bookkeeping switches.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Name of the worksheet holding one row per username.
    pub sheet: String,
    /// When the stored login count is not a number, write the corruption
    /// notice into `remark`, replacing whatever the administrator put there.
    /// When false the notice is only logged.
    pub overwrite_remark_on_corrupt_count: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sheet: "Logs".to_string(),
            overwrite_remark_on_corrupt_count: true,
        }
    }
}

/// Configuration for a single relay process.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// JSON document backing the shared tabular store
    pub store_path: PathBuf,
    /// Worksheet holding login mode, accept pattern, overrides and roster
    pub policy_sheet: String,
    pub registry: RegistryConfig,
    /// Base URL of the grading website
    pub grader_url: String,
    /// Period of the background command poller
    pub poll_interval: Duration,
    pub os_commands: OsCommandPolicy,
    /// Show detailed error messages instead of administrator codes
    pub verbose: bool,
    /// Prompt for administrator options before logging in
    pub admin: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("exam-relay.json"),
            policy_sheet: "Contest Type".to_string(),
            registry: RegistryConfig::default(),
            grader_url: "http://grader.eng.src.ku.ac.th".to_string(),
            poll_interval: Duration::from_secs(5),
            os_commands: OsCommandPolicy::default(),
            verbose: false,
            admin: false,
        }
    }
}

impl RelayConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_os_commands(mut self, policy: OsCommandPolicy) -> Self {
        self.os_commands = policy;
        self
    }
}

/// Options an administrator supplies at startup with `--admin`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminOptions {
    /// Written once into the session's `remark` cell before polling starts
    pub remark: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_config_default() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.policy_sheet, "Contest Type");
        assert_eq!(cfg.registry.sheet, "Logs");
        assert!(cfg.registry.overwrite_remark_on_corrupt_count);
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.os_commands, OsCommandPolicy::Unrestricted);
        assert!(!cfg.verbose);
        assert!(!cfg.admin);
    }

    #[test]
    fn relay_config_builders() {
        let cfg = RelayConfig::default()
            .with_poll_interval(Duration::from_millis(20))
            .with_os_commands(OsCommandPolicy::Disabled);
        assert_eq!(cfg.poll_interval, Duration::from_millis(20));
        assert_eq!(cfg.os_commands, OsCommandPolicy::Disabled);
    }

    #[test]
    fn program_of_takes_first_word() {
        assert_eq!(OsCommandPolicy::program_of("  ls -la /tmp"), "ls");
        assert_eq!(OsCommandPolicy::program_of(""), "");
    }
}
