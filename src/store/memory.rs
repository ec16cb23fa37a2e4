use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{Cell, CellRef, Grid, TabularStore};

/// In-process tabular store.
///
/// Counts batch writes so callers can observe whether a poll cycle touched
/// the store, and can be switched offline to simulate network failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sheets: RwLock<HashMap<String, Grid>>,
    writes: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add or replace a sheet.
    pub fn with_sheet<R, C>(mut self, name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.sheets
            .get_mut()
            .insert(name.to_string(), Grid::from_rows(rows));
        self
    }

    pub async fn insert_sheet(&self, name: &str, grid: Grid) {
        self.sheets.write().await.insert(name.to_string(), grid);
    }

    /// Snapshot of a sheet, empty if absent.
    pub async fn sheet(&self, name: &str) -> Grid {
        self.sheets
            .read()
            .await
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Text of one cell, empty if absent.
    pub async fn cell(&self, sheet: &str, row: usize, col: usize) -> String {
        self.sheet(sheet).await.get(CellRef::new(row, col)).to_string()
    }

    /// Number of `write_cells` batches applied so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// While offline every operation fails with an I/O error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "store offline",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn sheet_names(&self) -> Result<Vec<String>, StoreError> {
        self.check_online()?;
        let mut names: Vec<String> = self.sheets.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn read_all(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
        self.check_online()?;
        let sheets = self.sheets.read().await;
        let grid = sheets
            .get(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        Ok(grid.populated_rows())
    }

    async fn read_column(&self, sheet: &str, col: usize) -> Result<Vec<String>, StoreError> {
        self.check_online()?;
        let sheets = self.sheets.read().await;
        let grid = sheets
            .get(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        Ok(grid.column(col))
    }

    async fn read_range(
        &self,
        sheet: &str,
        from: CellRef,
        to: CellRef,
    ) -> Result<Vec<Cell>, StoreError> {
        self.check_online()?;
        let sheets = self.sheets.read().await;
        let grid = sheets
            .get(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        grid.range(from, to)
    }

    async fn write_cells(&self, sheet: &str, cells: &[Cell]) -> Result<(), StoreError> {
        self.check_online()?;
        let mut sheets = self.sheets.write().await;
        let grid = sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        grid.write(cells)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(sheet, cells = cells.len(), "Batch write applied");
        Ok(())
    }
}
