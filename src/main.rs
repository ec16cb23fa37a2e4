use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use exam_relay::config::{AdminOptions, OsCommandPolicy, RegistryConfig, RelayConfig};
use exam_relay::grader::http::HttpGrader;
use exam_relay::session::terminal::{StdTerminal, Terminal};
use exam_relay::session::{SessionCoordinator, SessionExit};
use exam_relay::shutdown::install_shutdown_handler;
use exam_relay::store::JsonFileStore;

#[derive(Parser, Debug)]
#[command(name = "exam-relay")]
#[command(version)]
#[command(about = "Exam session client remotely controlled through a shared spreadsheet")]
struct Args {
    /// Enable administrator special commands
    #[arg(short, long)]
    admin: bool,

    /// Show all messages in detail
    #[arg(short, long)]
    verbose: bool,

    /// Username to pre-enter
    username: Option<String>,

    /// Path of the shared spreadsheet document
    #[arg(long, default_value = "exam-relay.json")]
    store: PathBuf,

    /// Worksheet holding the login policy
    #[arg(long, default_value = "Contest Type")]
    policy_sheet: String,

    /// Worksheet holding one row per session
    #[arg(long, default_value = "Logs")]
    registry_sheet: String,

    /// Base URL of the grading website
    #[arg(long, default_value = "http://grader.eng.src.ku.ac.th")]
    grader_url: String,

    /// Seconds between command polls
    #[arg(long, default_value = "5")]
    poll_interval: u64,

    /// Which `os` commands remote administrators may run
    #[arg(long, default_value = "unrestricted")]
    os_commands: OsCommandMode,

    /// Programs allowed with --os-commands allowlist (comma-separated)
    #[arg(long, value_delimiter = ',')]
    allow: Vec<String>,

    /// Keep the administrator remark when the stored login count is corrupt
    #[arg(long)]
    keep_remark_on_corrupt_count: bool,
}

#[derive(Debug, Clone, ValueEnum)]
enum OsCommandMode {
    Unrestricted,
    Disabled,
    Allowlist,
}

impl Args {
    fn relay_config(&self) -> RelayConfig {
        let os_commands = match self.os_commands {
            OsCommandMode::Unrestricted => OsCommandPolicy::Unrestricted,
            OsCommandMode::Disabled => OsCommandPolicy::Disabled,
            OsCommandMode::Allowlist => OsCommandPolicy::Allowlist(self.allow.clone()),
        };
        RelayConfig {
            store_path: self.store.clone(),
            policy_sheet: self.policy_sheet.clone(),
            registry: RegistryConfig {
                sheet: self.registry_sheet.clone(),
                overwrite_remark_on_corrupt_count: !self.keep_remark_on_corrupt_count,
            },
            grader_url: self.grader_url.clone(),
            poll_interval: Duration::from_secs(self.poll_interval),
            os_commands,
            verbose: self.verbose,
            admin: self.admin,
        }
    }
}

/// Option line typed at the hidden administrator prompt.
#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct AdminArgs {
    /// Remark written into the session row once
    #[arg(short, long)]
    remark: Option<String>,
}

async fn read_admin_options(
    terminal: &dyn Terminal,
) -> Result<AdminOptions, Box<dyn std::error::Error>> {
    let line = terminal.read_password("> ").await?;
    let parsed = AdminArgs::try_parse_from(line.split_whitespace())?;
    Ok(AdminOptions {
        remark: parsed.remark,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.relay_config();
    let shutdown = install_shutdown_handler()?;
    let terminal: Arc<dyn Terminal> = Arc::new(StdTerminal);
    let store = Arc::new(JsonFileStore::new(config.store_path.clone()));
    let mut username = args.username.clone();

    while !shutdown.is_cancelled() {
        let admin = if config.admin {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                admin = read_admin_options(terminal.as_ref()) => admin?,
            }
        } else {
            AdminOptions::default()
        };

        let name = match username.clone() {
            Some(name) => {
                terminal.print(&format!("User: {}", name));
                name
            }
            None => tokio::select! {
                _ = shutdown.cancelled() => break,
                line = terminal.read_line("User: ") => line?.unwrap_or_default(),
            },
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            break;
        }
        username = Some(name.clone());

        terminal.print(if config.verbose {
            "Opening spreadsheet..."
        } else {
            "Please wait..."
        });

        let grader = Arc::new(HttpGrader::new(&config.grader_url)?);
        let mut session = SessionCoordinator::new(
            config.clone(),
            store.clone(),
            grader,
            terminal.clone(),
            shutdown.clone(),
        )
        .with_admin_options(admin);

        match session.run(&name).await {
            SessionExit::Finished => break,
            SessionExit::Restart => {
                tracing::info!(username = %name, "Restarting session");
            }
        }
    }

    Ok(())
}
