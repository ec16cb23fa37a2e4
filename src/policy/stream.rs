use std::collections::VecDeque;

/// Prefix marking a cell as an administrator comment.
pub const COMMENT_PREFIX: char = ';';

/// Row-major token stream over a policy sheet.
///
/// Rows are padded to the sheet's row width, so a blank row yields
/// `row_width` empty tokens. Comment cells are dropped before the parser sees
/// them and do not count as empties.
#[derive(Debug, Clone)]
pub struct CellStream {
    tokens: VecDeque<String>,
    row_width: usize,
}

impl CellStream {
    pub fn from_rows(rows: &[Vec<String>]) -> Self {
        let row_width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let tokens = rows
            .iter()
            .flat_map(|row| {
                row.iter()
                    .cloned()
                    .chain(std::iter::repeat(String::new()).take(row_width - row.len()))
            })
            .filter(|cell| !cell.starts_with(COMMENT_PREFIX))
            .collect();
        Self { tokens, row_width }
    }

    /// Stream over cells that are already flattened.
    pub fn from_cells<I, S>(cells: I, row_width: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = cells
            .into_iter()
            .map(Into::into)
            .filter(|cell: &String| !cell.starts_with(COMMENT_PREFIX))
            .collect();
        Self { tokens, row_width }
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn peek(&self) -> Option<&str> {
        self.tokens.front().map(String::as_str)
    }
}

impl Iterator for CellStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.tokens.pop_front()
    }
}
