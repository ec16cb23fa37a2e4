//! Session registry: one row per username in the registry sheet.
//!
//! Row 1 holds the header labels. Rows are assumed contiguous: scanning
//! column 1 from row 2, the first cell equal to the username is that user's
//! row, and otherwise the first empty cell is claimed. Gaps after populated
//! rows are never reclaimed.
//!
//! There is no locking. Two processes logging in as the same user race on
//! claim and update, and the last batch write wins.

use std::sync::Arc;

use chrono::Local;

use crate::config::RegistryConfig;
use crate::error::StoreError;
use crate::store::{Cell, CellRef, TabularStore};

pub const COL_USER: usize = 1;
pub const COL_LOGIN_COUNT: usize = 2;
pub const COL_LAST_LOGIN: usize = 3;
pub const COL_REMARK: usize = 4;
pub const COL_COMMAND: usize = 5;
pub const COL_RESPONSE: usize = 6;

pub const HEADERS: [&str; 6] = [
    "User",
    "Number of Logins",
    "Last Login",
    "Remark",
    "Command",
    "Command Response",
];

pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// First row that can hold a session.
const FIRST_SESSION_ROW: usize = 2;

/// Local wall-clock time in the registry's display format.
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// How the stored login count was turned into the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginCount {
    /// Cell was empty; this is the first login.
    First,
    Incremented(u64),
    /// Cell held something that is not a count; reset to 1.
    Corrupt { previous: String },
}

impl LoginCount {
    pub fn next(stored: &str) -> Self {
        let stored = stored.trim();
        if stored.is_empty() {
            return LoginCount::First;
        }
        match stored.parse::<u64>() {
            Ok(n) => LoginCount::Incremented(n.saturating_add(1)),
            Err(_) => LoginCount::Corrupt {
                previous: stored.to_string(),
            },
        }
    }

    pub fn value(&self) -> u64 {
        match self {
            LoginCount::Incremented(n) => *n,
            LoginCount::First | LoginCount::Corrupt { .. } => 1,
        }
    }

    /// Notice recorded when the stored count was unusable.
    pub fn corruption_notice(&self) -> Option<String> {
        match self {
            LoginCount::Corrupt { previous } => Some(format!("Invalid: {}", previous)),
            _ => None,
        }
    }
}

/// Result of login bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRecord {
    pub row: usize,
    pub login_count: LoginCount,
    pub last_login: String,
    /// Whether the corruption notice replaced the administrator's remark.
    pub remark_overwritten: bool,
}

/// Pending command cells of a session row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCells {
    pub command: String,
    pub response: String,
}

/// Registry sheet access bound to one store.
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn TabularStore>,
    config: RegistryConfig,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn TabularStore>, config: RegistryConfig) -> Self {
        Self { store, config }
    }

    pub fn sheet(&self) -> &str {
        &self.config.sheet
    }

    /// Row already owned by `username`, or the first empty row to claim.
    pub async fn find_or_create_row(&self, username: &str) -> Result<usize, StoreError> {
        let users = self.store.read_column(self.sheet(), COL_USER).await?;
        let row = users
            .iter()
            .enumerate()
            .skip(FIRST_SESSION_ROW - 1)
            .find(|(_, value)| value.is_empty() || value.as_str() == username)
            .map(|(idx, _)| idx + 1)
            .unwrap_or_else(|| users.len().max(FIRST_SESSION_ROW - 1) + 1);
        tracing::debug!(username, row, "Session row assigned");
        Ok(row)
    }

    /// Current row of `username`, rescanning the whole column. Tolerates rows
    /// being inserted or removed by hand between calls.
    pub async fn locate_row(&self, username: &str) -> Result<Option<usize>, StoreError> {
        let users = self.store.read_column(self.sheet(), COL_USER).await?;
        Ok(users
            .iter()
            .enumerate()
            .skip(FIRST_SESSION_ROW - 1)
            .find(|(_, value)| value.as_str() == username)
            .map(|(idx, _)| idx + 1))
    }

    /// Start-of-session bookkeeping for `row`: header labels, username, login
    /// count and timestamp, applied in one batch write after one range read.
    ///
    /// An unparsable login count resets to 1. Its corruption notice replaces
    /// the row's remark when `overwrite_remark_on_corrupt_count` is set.
    pub async fn record_login(
        &self,
        row: usize,
        username: &str,
    ) -> Result<LoginRecord, StoreError> {
        let cells = self
            .store
            .read_range(
                self.sheet(),
                CellRef::new(1, 1),
                CellRef::new(row, HEADERS.len()),
            )
            .await?;

        let mut writes = Vec::new();
        let mut login_count = LoginCount::First;
        let last_login = timestamp();

        for cell in cells.iter().filter(|c| c.row == 1 || c.row == row) {
            if cell.row == 1 {
                let label = HEADERS[cell.col - 1];
                if cell.value.is_empty() {
                    writes.push(Cell::new(1, cell.col, label));
                }
                continue;
            }
            match cell.col {
                COL_USER if cell.value.is_empty() => {
                    writes.push(Cell::new(row, COL_USER, username));
                }
                COL_LOGIN_COUNT => {
                    login_count = LoginCount::next(&cell.value);
                    writes.push(Cell::new(
                        row,
                        COL_LOGIN_COUNT,
                        login_count.value().to_string(),
                    ));
                }
                COL_LAST_LOGIN => {
                    writes.push(Cell::new(row, COL_LAST_LOGIN, last_login.clone()));
                }
                _ => {}
            }
        }

        let mut remark_overwritten = false;
        if let Some(notice) = login_count.corruption_notice() {
            if self.config.overwrite_remark_on_corrupt_count {
                writes.push(Cell::new(row, COL_REMARK, notice.clone()));
                remark_overwritten = true;
            }
            tracing::warn!(username, row, notice = %notice, "Login count was corrupt, reset to 1");
        }

        self.store.write_cells(self.sheet(), &writes).await?;
        tracing::info!(username, row, login_count = login_count.value(), "Login recorded");

        Ok(LoginRecord {
            row,
            login_count,
            last_login,
            remark_overwritten,
        })
    }

    /// Overwrite the remark of `username`'s row. Returns false when the user
    /// has no row.
    pub async fn set_remark(&self, username: &str, remark: &str) -> Result<bool, StoreError> {
        let Some(row) = self.locate_row(username).await? else {
            return Ok(false);
        };
        self.store
            .write_cells(self.sheet(), &[Cell::new(row, COL_REMARK, remark)])
            .await?;
        Ok(true)
    }

    pub async fn read_command(&self, row: usize) -> Result<CommandCells, StoreError> {
        let cells = self
            .store
            .read_range(
                self.sheet(),
                CellRef::new(row, COL_COMMAND),
                CellRef::new(row, COL_RESPONSE),
            )
            .await?;
        let value_at = |col: usize| {
            cells
                .iter()
                .find(|c| c.col == col)
                .map(|c| c.value.clone())
                .unwrap_or_default()
        };
        Ok(CommandCells {
            command: value_at(COL_COMMAND),
            response: value_at(COL_RESPONSE),
        })
    }

    /// Write both command cells in one batch.
    pub async fn write_command_cells(
        &self,
        row: usize,
        cells: &CommandCells,
    ) -> Result<(), StoreError> {
        self.store
            .write_cells(
                self.sheet(),
                &[
                    Cell::new(row, COL_COMMAND, cells.command.clone()),
                    Cell::new(row, COL_RESPONSE, cells.response.clone()),
                ],
            )
            .await
    }
}
