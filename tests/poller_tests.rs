
use std::sync::Arc;
use std::time::Duration;

use exam_relay::board::SharedBoard;
use exam_relay::command::{CommandExecutor, OsCommandRunner};
use exam_relay::config::{OsCommandPolicy, RegistryConfig};
use exam_relay::poller::{CommandPoller, CycleReport, RESPONSE_FOREGROUND, RESPONSE_LOGOUT};
use exam_relay::poller::PollerHandle;
use exam_relay::registry::{
    SessionRegistry, COL_COMMAND, COL_LOGIN_COUNT, COL_REMARK, COL_RESPONSE, HEADERS,
};
use exam_relay::store::MemoryStore;
use test_harness::{
    sample_board, sample_problems, wait_until, ScriptedGrader, ScriptedTerminal, REGISTRY_SHEET,
};
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_millis(20);
const PATIENCE: Duration = Duration::from_secs(3);

struct Fixture {
    store: Arc<MemoryStore>,
    board: SharedBoard,
    terminal: Arc<ScriptedTerminal>,
    shutdown: CancellationToken,
}

impl Fixture {
    /// Registry with a row for alice holding `command`.
    fn new(command: &str) -> Self {
        let store = Arc::new(MemoryStore::new().with_sheet(
            REGISTRY_SHEET,
            vec![HEADERS.to_vec(), vec!["alice", "1", "", "", command, ""]],
        ));
        Self {
            store,
            board: SharedBoard::new(),
            terminal: Arc::new(ScriptedTerminal::new(&[], &[])),
            shutdown: CancellationToken::new(),
        }
    }

    fn poller(&self, username: &str) -> CommandPoller {
        let grader = Arc::new(ScriptedGrader::new("secret", sample_problems(5)));
        let executor = Arc::new(CommandExecutor::new(
            grader,
            OsCommandRunner::new(OsCommandPolicy::Unrestricted),
            self.terminal.clone(),
        ));
        CommandPoller::new(
            username,
            SessionRegistry::new(self.store.clone(), RegistryConfig::default()),
            executor,
            self.board.clone(),
            self.terminal.clone(),
            INTERVAL,
            &self.shutdown,
        )
    }

    fn publish(&self) {
        self.board.publish(Arc::new(sample_board(5)));
    }

    async fn cell(&self, col: usize) -> String {
        self.store.cell(REGISTRY_SHEET, 2, col).await
    }

    /// Wait until row 2's `col` satisfies `check`.
    async fn wait_for_cell(&self, col: usize, check: impl Fn(&str) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + PATIENCE;
        loop {
            if check(&self.cell(col).await) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn set_command(&self, command: &str) {
        use exam_relay::store::{Cell, TabularStore};
        self.store
            .write_cells(REGISTRY_SHEET, &[Cell::new(2, COL_COMMAND, command)])
            .await
            .unwrap();
    }
}

async fn wait_stopped(handle: &PollerHandle) -> bool {
    wait_until(PATIENCE, || {
        let stopped = !handle.is_running();
        async move { stopped }
    })
    .await
}

#[tokio::test]
async fn test_annotation_only_command_produces_no_writes() {
    let f = Fixture::new(";Run on 01/01/2026 10:00:00");
    f.publish();
    let poller = f.poller("alice");

    for _ in 0..3 {
        assert_eq!(poller.poll_once().await.unwrap(), CycleReport::Idle);
    }
    assert_eq!(f.store.write_count(), 0);
}

#[tokio::test]
async fn test_command_waits_until_board_is_published() {
    let f = Fixture::new("os echo hi");
    let poller = f.poller("alice");

    assert_eq!(poller.poll_once().await.unwrap(), CycleReport::NotReady);
    assert_eq!(f.cell(COL_COMMAND).await, "os echo hi");
    assert_eq!(f.cell(COL_RESPONSE).await, "Command is not ready");

    f.publish();
    assert_eq!(
        poller.poll_once().await.unwrap(),
        CycleReport::Executed {
            response: "hi".to_string()
        }
    );
}

#[tokio::test]
async fn test_response_is_sanitized_and_command_marked() {
    let f = Fixture::new("os echo score = 10");
    f.publish();
    let poller = f.poller("alice");

    let report = poller.poll_once().await.unwrap();
    assert_eq!(
        report,
        CycleReport::Executed {
            response: "score - 10".to_string()
        }
    );
    assert_eq!(f.cell(COL_RESPONSE).await, "score - 10");
    assert!(f.cell(COL_COMMAND).await.starts_with(";Run on "));

    // The marker reads as no pending command.
    let writes = f.store.write_count();
    assert_eq!(poller.poll_once().await.unwrap(), CycleReport::Idle);
    assert_eq!(f.store.write_count(), writes);
}

#[tokio::test]
async fn test_inline_annotation_is_stripped_before_execution() {
    let f = Fixture::new("os echo hi ;ask alice to check");
    f.publish();
    let poller = f.poller("alice");

    poller.poll_once().await.unwrap();
    assert_eq!(f.cell(COL_RESPONSE).await, "hi");
}

#[tokio::test]
async fn test_command_errors_are_reported_as_text() {
    let f = Fixture::new("bg 99");
    f.publish();
    let poller = f.poller("alice");

    poller.poll_once().await.unwrap();
    assert_eq!(
        f.cell(COL_RESPONSE).await,
        "Problem number 99 exceeds total problems (5)"
    );
}

#[tokio::test]
async fn test_invalid_background_command() {
    let f = Fixture::new("bg no-such-file.c");
    f.publish();
    let poller = f.poller("alice");

    poller.poll_once().await.unwrap();
    assert_eq!(f.cell(COL_RESPONSE).await, "Invalid command.");
}

#[tokio::test]
async fn test_foreground_command_runs_once_in_foreground() {
    let f = Fixture::new("help");
    f.publish();
    let poller = f.poller("alice");

    poller.poll_once().await.unwrap();

    assert_eq!(f.cell(COL_RESPONSE).await, RESPONSE_FOREGROUND);
    assert!(f.terminal.printed("==== HELP ===="));
    assert!(f.terminal.printed("==== [alice] "));
    assert!(f.terminal.output().ends_with("> "));
}

#[tokio::test]
async fn test_missing_user_skips_cycle() {
    let f = Fixture::new("os echo hi");
    f.publish();
    let poller = f.poller("zoe");

    assert_eq!(poller.poll_once().await.unwrap(), CycleReport::UserMissing);
    assert_eq!(f.store.write_count(), 0);
}

#[tokio::test]
async fn test_background_logout_sets_quit() {
    let f = Fixture::new("bg logout");
    f.publish();
    let handle = f.poller("alice").spawn();

    assert!(f.wait_for_cell(COL_RESPONSE, |v| v == RESPONSE_LOGOUT).await);
    assert!(wait_stopped(&handle).await);
    assert!(handle.quit_requested());
    assert!(handle.quit_signal().is_cancelled());

    handle.stop().await;
    assert!(f.cell(COL_REMARK).await.starts_with("Logout on "));
}

#[tokio::test]
async fn test_delegated_logout_sets_quit() {
    let f = Fixture::new("logout");
    f.publish();
    let handle = f.poller("alice").spawn();

    assert!(f.wait_for_cell(COL_RESPONSE, |v| v == RESPONSE_LOGOUT).await);
    assert!(handle.quit_requested());
    handle.stop().await;
}

#[tokio::test]
async fn test_spawn_records_login_and_admin_remark() {
    let f = Fixture::new("");
    let handle = f
        .poller("alice")
        .with_admin_remark(Some("seat 12".to_string()))
        .spawn();

    assert!(f.wait_for_cell(COL_REMARK, |v| v == "seat 12").await);
    assert_eq!(f.cell(COL_LOGIN_COUNT).await, "2");
    handle.stop().await;
}

#[tokio::test]
async fn test_store_failures_are_swallowed() {
    let f = Fixture::new("");
    f.publish();
    let handle = f.poller("alice").spawn();
    assert!(f.wait_for_cell(COL_LOGIN_COUNT, |v| v == "2").await);

    f.store.set_offline(true);
    tokio::time::sleep(INTERVAL * 5).await;
    assert!(handle.is_running());

    f.store.set_offline(false);
    f.set_command("os echo back").await;
    assert!(f.wait_for_cell(COL_RESPONSE, |v| v == "back").await);
    handle.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let f = Fixture::new("");
    let handle = f.poller("alice").spawn();
    assert!(f.wait_for_cell(COL_LOGIN_COUNT, |v| v == "2").await);

    handle.stop().await;
    let writes = f.store.write_count();
    handle.stop().await;

    assert!(!handle.is_running());
    assert!(!handle.quit_requested());
    assert_eq!(f.store.write_count(), writes);
    assert!(f.cell(COL_REMARK).await.starts_with("Logout on "));
}

#[tokio::test]
async fn test_shutdown_token_stops_poller() {
    let f = Fixture::new("");
    let handle = f.poller("alice").spawn();

    f.shutdown.cancel();
    assert!(wait_stopped(&handle).await);
    handle.stop().await;
}
