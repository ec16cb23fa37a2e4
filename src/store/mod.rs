//! Remote tabular store abstraction.
//!
//! The store is a set of named sheets, each a grid of text cells addressed
//! 1-based by `(row, col)`. It offers no transactions, no notifications and
//! no compare-and-swap: every higher layer works with whole-range reads
//! followed by one batch write, and the last writer wins on overlapping cells.
//!
//! # Components
//!
//! - [`TabularStore`]: the operations the relay consumes
//! - [`MemoryStore`]: in-process store (tests, embedding)
//! - [`JsonFileStore`]: store kept as a JSON document on a shared path

pub mod file;
pub mod grid;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;

pub use file::JsonFileStore;
pub use grid::Grid;
pub use memory::MemoryStore;

/// 1-based cell address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// A1 notation, e.g. `(12, 6)` -> `F12`, `(3, 27)` -> `AA3`.
    pub fn a1(&self) -> String {
        let mut col = self.col;
        let mut letters = Vec::new();
        while col > 0 {
            col -= 1;
            letters.push((b'A' + (col % 26) as u8) as char);
            col /= 26;
        }
        letters.reverse();
        let letters: String = letters.into_iter().collect();
        format!("{}{}", letters, self.row)
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.a1())
    }
}

/// A cell together with its address, as returned by range reads and
/// accepted by batch writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

impl Cell {
    pub fn new(row: usize, col: usize, value: impl Into<String>) -> Self {
        Self {
            row,
            col,
            value: value.into(),
        }
    }
}

/// Operations consumed from the shared store.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Names of all sheets in the document.
    async fn sheet_names(&self) -> Result<Vec<String>, StoreError>;

    /// Every populated row of a sheet, each as its list of cell texts.
    async fn read_all(&self, sheet: &str) -> Result<Vec<Vec<String>>, StoreError>;

    /// Values of one column from row 1 down to the last populated row.
    async fn read_column(&self, sheet: &str, col: usize) -> Result<Vec<String>, StoreError>;

    /// Row-major cells of the rectangle `from..=to`; missing cells read as empty.
    async fn read_range(
        &self,
        sheet: &str,
        from: CellRef,
        to: CellRef,
    ) -> Result<Vec<Cell>, StoreError>;

    /// Write all cells in one batch.
    async fn write_cells(&self, sheet: &str, cells: &[Cell]) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_single_letters() {
        assert_eq!(CellRef::new(1, 1).a1(), "A1");
        assert_eq!(CellRef::new(12, 6).a1(), "F12");
        assert_eq!(CellRef::new(7, 26).a1(), "Z7");
    }

    #[test]
    fn a1_double_letters() {
        assert_eq!(CellRef::new(3, 27).a1(), "AA3");
        assert_eq!(CellRef::new(1, 52).a1(), "AZ1");
        assert_eq!(CellRef::new(1, 53).a1(), "BA1");
    }
}
