
use std::sync::Arc;

use exam_relay::config::RegistryConfig;
use exam_relay::registry::{
    CommandCells, LoginCount, SessionRegistry, COL_COMMAND, COL_LAST_LOGIN, COL_LOGIN_COUNT,
    COL_REMARK, COL_RESPONSE, COL_USER, HEADERS,
};
use exam_relay::store::MemoryStore;
use test_harness::REGISTRY_SHEET;

fn registry_over(store: &Arc<MemoryStore>) -> SessionRegistry {
    SessionRegistry::new(store.clone(), RegistryConfig::default())
}

fn store_with(rows: Vec<Vec<&str>>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_sheet(REGISTRY_SHEET, rows))
}

#[tokio::test]
async fn test_row_assignment_first_match_or_first_gap() {
    let store = store_with(vec![
        HEADERS.to_vec(),
        vec!["alice"],
        vec!["bob"],
        vec![""],
    ]);
    let registry = registry_over(&store);

    assert_eq!(registry.find_or_create_row("carol").await.unwrap(), 4);
    assert_eq!(registry.find_or_create_row("bob").await.unwrap(), 3);
    assert_eq!(registry.find_or_create_row("alice").await.unwrap(), 2);
}

#[tokio::test]
async fn test_row_assignment_appends_after_last_row() {
    let store = store_with(vec![HEADERS.to_vec(), vec!["alice"]]);
    let registry = registry_over(&store);
    assert_eq!(registry.find_or_create_row("bob").await.unwrap(), 3);

    let empty = Arc::new(MemoryStore::new().with_sheet(REGISTRY_SHEET, Vec::<Vec<&str>>::new()));
    assert_eq!(registry_over(&empty).find_or_create_row("bob").await.unwrap(), 2);
}

#[tokio::test]
async fn test_gap_before_match_is_claimed() {
    // Scan stops at the first empty key; later rows are never reached.
    let store = store_with(vec![HEADERS.to_vec(), vec!["alice"], vec![""], vec!["bob"]]);
    let registry = registry_over(&store);
    assert_eq!(registry.find_or_create_row("bob").await.unwrap(), 3);
}

#[tokio::test]
async fn test_record_login_on_fresh_sheet_writes_headers() {
    let store = Arc::new(MemoryStore::new().with_sheet(REGISTRY_SHEET, Vec::<Vec<&str>>::new()));
    let registry = registry_over(&store);

    let row = registry.find_or_create_row("carol").await.unwrap();
    let record = registry.record_login(row, "carol").await.unwrap();

    assert_eq!(record.row, 2);
    assert_eq!(record.login_count, LoginCount::First);
    for (idx, label) in HEADERS.iter().enumerate() {
        assert_eq!(store.cell(REGISTRY_SHEET, 1, idx + 1).await, *label);
    }
    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_USER).await, "carol");
    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_LOGIN_COUNT).await, "1");
    assert_eq!(
        store.cell(REGISTRY_SHEET, 2, COL_LAST_LOGIN).await,
        record.last_login
    );
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn test_login_count_increments() {
    let store = store_with(vec![HEADERS.to_vec(), vec!["alice", "3", "", "keep me"]]);
    let registry = registry_over(&store);

    let record = registry.record_login(2, "alice").await.unwrap();

    assert_eq!(record.login_count, LoginCount::Incremented(4));
    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_LOGIN_COUNT).await, "4");
    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_REMARK).await, "keep me");
    assert!(!record.remark_overwritten);
}

#[tokio::test]
async fn test_corrupt_login_count_resets_and_writes_remark() {
    let store = store_with(vec![
        HEADERS.to_vec(),
        vec!["alice", "abc", "", "admin note"],
    ]);
    let registry = registry_over(&store);

    let record = registry.record_login(2, "alice").await.unwrap();

    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_LOGIN_COUNT).await, "1");
    let remark = store.cell(REGISTRY_SHEET, 2, COL_REMARK).await;
    assert!(!remark.is_empty());
    assert_eq!(remark, "Invalid: abc");
    assert!(record.remark_overwritten);
}

#[tokio::test]
async fn test_corrupt_count_can_keep_admin_remark() {
    let store = store_with(vec![
        HEADERS.to_vec(),
        vec!["alice", "abc", "", "admin note"],
    ]);
    let registry = SessionRegistry::new(
        store.clone(),
        RegistryConfig {
            overwrite_remark_on_corrupt_count: false,
            ..RegistryConfig::default()
        },
    );

    let record = registry.record_login(2, "alice").await.unwrap();

    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_LOGIN_COUNT).await, "1");
    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_REMARK).await, "admin note");
    assert!(!record.remark_overwritten);
    assert!(record.login_count.corruption_notice().is_some());
}

#[tokio::test]
async fn test_existing_header_labels_are_kept() {
    let store = store_with(vec![vec!["Student"], vec!["alice", "1"]]);
    let registry = registry_over(&store);

    registry.record_login(2, "alice").await.unwrap();

    assert_eq!(store.cell(REGISTRY_SHEET, 1, COL_USER).await, "Student");
    assert_eq!(store.cell(REGISTRY_SHEET, 1, COL_RESPONSE).await, "Command Response");
}

#[tokio::test]
async fn test_command_cells_round_trip_in_one_batch() {
    let store = store_with(vec![
        HEADERS.to_vec(),
        vec!["alice", "1", "", "", "os ls", "old"],
    ]);
    let registry = registry_over(&store);

    let cells = registry.read_command(2).await.unwrap();
    assert_eq!(cells.command, "os ls");
    assert_eq!(cells.response, "old");

    let before = store.write_count();
    registry
        .write_command_cells(
            2,
            &CommandCells {
                command: ";done".to_string(),
                response: "new".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(store.write_count(), before + 1);
    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_COMMAND).await, ";done");
    assert_eq!(store.cell(REGISTRY_SHEET, 2, COL_RESPONSE).await, "new");
}

#[tokio::test]
async fn test_set_remark_follows_moved_row() {
    let store = store_with(vec![HEADERS.to_vec(), vec!["alice"], vec!["bob"]]);
    let registry = registry_over(&store);

    assert_eq!(registry.locate_row("bob").await.unwrap(), Some(3));
    assert!(registry.set_remark("bob", "hello").await.unwrap());
    assert_eq!(store.cell(REGISTRY_SHEET, 3, COL_REMARK).await, "hello");

    assert_eq!(registry.locate_row("zoe").await.unwrap(), None);
    assert!(!registry.set_remark("zoe", "hello").await.unwrap());
}
