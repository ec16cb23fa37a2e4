use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{Cell, CellRef};

/// Ragged text grid backing one sheet. Row and column indices are 1-based at
/// the API and 0-based in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Cell text, empty when outside the stored extent.
    pub fn get(&self, at: CellRef) -> &str {
        if at.row == 0 || at.col == 0 {
            return "";
        }
        self.rows
            .get(at.row - 1)
            .and_then(|r| r.get(at.col - 1))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Rows up to the last one holding any non-empty cell, each trimmed of
    /// trailing empty cells.
    pub fn populated_rows(&self) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                let len = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
                row[..len].to_vec()
            })
            .collect();
        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        rows
    }

    pub fn column(&self, col: usize) -> Vec<String> {
        if col == 0 {
            return Vec::new();
        }
        let mut values: Vec<String> = self
            .rows
            .iter()
            .map(|row| row.get(col - 1).cloned().unwrap_or_default())
            .collect();
        while values.last().is_some_and(|v| v.is_empty()) {
            values.pop();
        }
        values
    }

    pub fn range(&self, from: CellRef, to: CellRef) -> Result<Vec<Cell>, StoreError> {
        for at in [from, to] {
            if at.row == 0 || at.col == 0 {
                return Err(StoreError::OutOfBounds {
                    row: at.row,
                    col: at.col,
                });
            }
        }
        let (top, bottom) = (from.row.min(to.row), from.row.max(to.row));
        let (left, right) = (from.col.min(to.col), from.col.max(to.col));

        let mut cells = Vec::with_capacity((bottom - top + 1) * (right - left + 1));
        for row in top..=bottom {
            for col in left..=right {
                cells.push(Cell::new(row, col, self.get(CellRef::new(row, col))));
            }
        }
        Ok(cells)
    }

    /// Apply a batch of writes, growing the grid as needed.
    pub fn write(&mut self, cells: &[Cell]) -> Result<(), StoreError> {
        for cell in cells {
            if cell.row == 0 || cell.col == 0 {
                return Err(StoreError::OutOfBounds {
                    row: cell.row,
                    col: cell.col,
                });
            }
        }
        for cell in cells {
            if self.rows.len() < cell.row {
                self.rows.resize_with(cell.row, Vec::new);
            }
            let row = &mut self.rows[cell.row - 1];
            if row.len() < cell.col {
                row.resize_with(cell.col, String::new);
            }
            row[cell.col - 1] = cell.value.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_trims_trailing_empties() {
        let grid = Grid::from_rows(vec![vec!["User", "x"], vec!["alice"], vec![""], vec![]]);
        assert_eq!(grid.column(1), vec!["User", "alice"]);
        assert_eq!(grid.column(2), vec!["x"]);
    }

    #[test]
    fn range_fills_missing_cells_with_empty_text() {
        let grid = Grid::from_rows(vec![vec!["a", "b"]]);
        let cells = grid.range(CellRef::new(1, 1), CellRef::new(2, 3)).unwrap();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[1], Cell::new(1, 2, "b"));
        assert_eq!(cells[5], Cell::new(2, 3, ""));
    }

    #[test]
    fn write_grows_grid() {
        let mut grid = Grid::new();
        grid.write(&[Cell::new(3, 2, "x")]).unwrap();
        assert_eq!(grid.get(CellRef::new(3, 2)), "x");
        assert_eq!(grid.populated_rows(), vec![vec![], vec![], vec!["".to_string(), "x".to_string()]]);
    }

    #[test]
    fn write_rejects_zero_index() {
        let mut grid = Grid::new();
        assert!(grid.write(&[Cell::new(0, 1, "x")]).is_err());
    }
}
