//! Remote tabular store boundary.
mod google;
mod memory;

pub use google::GoogleSheets;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::errors::AppResult;
use crate::types::COLUMNS;

/// Rows currently in the target sheet, header split off when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetContents {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl SheetContents {
    pub fn from_values(values: Vec<Vec<String>>) -> Self {
        let mut rows = values.into_iter().filter(|row| !is_blank(row));
        let first = rows.next();
        match first {
            Some(row) if is_header(&row) => Self {
                header: Some(row),
                rows: rows.collect(),
            },
            Some(row) => Self {
                header: None,
                rows: std::iter::once(row).chain(rows).collect(),
            },
            None => Self::default(),
        }
    }

    /// True when the sheet holds neither a header nor data.
    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.rows.is_empty()
    }
}

pub fn is_header(row: &[String]) -> bool {
    row.len() == COLUMNS.len()
        && row
            .iter()
            .zip(COLUMNS)
            .all(|(cell, name)| cell.trim().eq_ignore_ascii_case(name))
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Every row in the sheet, read in full.
    async fn read_rows(&self) -> AppResult<SheetContents>;

    /// Appends the batch as one operation and returns the number of rows written.
    async fn append_rows(&self, rows: &[Vec<String>]) -> AppResult<usize>;
}
