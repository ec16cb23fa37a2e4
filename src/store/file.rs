use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::StoreError;
use crate::store::{Cell, CellRef, Grid, TabularStore};

/// On-disk layout: `{"sheets": {"Logs": [["User", ...], ...]}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    sheets: BTreeMap<String, Grid>,
}

/// Tabular store kept as a JSON document on a path every session can reach
/// (for example a network share).
///
/// Each operation reads the whole document; writes rewrite it through a
/// temporary file and a rename so readers never observe a torn document.
/// Concurrent writers still race: the last rename wins.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<Document, StoreError> {
        let bytes = fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, doc: &Document) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn grid(&self, sheet: &str) -> Result<Grid, StoreError> {
        self.load()
            .await?
            .sheets
            .remove(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))
    }

    /// Create or replace a whole sheet. Used to seed a fresh document.
    pub async fn put_sheet(&self, sheet: &str, grid: Grid) -> Result<(), StoreError> {
        let mut doc = match self.load().await {
            Ok(doc) => doc,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Document::default()
            }
            Err(e) => return Err(e),
        };
        doc.sheets.insert(sheet.to_string(), grid);
        self.save(&doc).await
    }
}

#[async_trait]
impl TabularStore for JsonFileStore {
    async fn sheet_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load().await?.sheets.into_keys().collect())
    }

    async fn read_all(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.grid(sheet).await?.populated_rows())
    }

    async fn read_column(&self, sheet: &str, col: usize) -> Result<Vec<String>, StoreError> {
        Ok(self.grid(sheet).await?.column(col))
    }

    async fn read_range(
        &self,
        sheet: &str,
        from: CellRef,
        to: CellRef,
    ) -> Result<Vec<Cell>, StoreError> {
        self.grid(sheet).await?.range(from, to)
    }

    async fn write_cells(&self, sheet: &str, cells: &[Cell]) -> Result<(), StoreError> {
        let mut doc = self.load().await?;
        let grid = doc
            .sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::SheetNotFound(sheet.to_string()))?;
        grid.write(cells)?;
        self.save(&doc).await?;
        tracing::debug!(path = %self.path.display(), sheet, cells = cells.len(), "Store document rewritten");
        Ok(())
    }
}
