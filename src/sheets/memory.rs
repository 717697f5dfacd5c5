use std::sync::Mutex;

use async_trait::async_trait;

use super::{RowStore, SheetContents};
use crate::errors::{AppError, AppResult};

/// In-process sheet. Appends land at the end, exactly as given.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<Vec<Vec<String>>>,
    appends: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: Vec<Vec<String>>) -> Self {
        Self {
            values: Mutex::new(values),
            appends: Mutex::new(0),
        }
    }

    pub fn values(&self) -> AppResult<Vec<Vec<String>>> {
        self.values
            .lock()
            .map(|v| v.clone())
            .map_err(|_| AppError::Unexpected("memory store lock poisoned".into()))
    }

    /// Number of append operations performed, including empty ones.
    pub fn append_calls(&self) -> usize {
        self.appends.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn read_rows(&self) -> AppResult<SheetContents> {
        Ok(SheetContents::from_values(self.values()?))
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> AppResult<usize> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| AppError::Unexpected("memory store lock poisoned".into()))?;
        values.extend(rows.iter().cloned());
        if let Ok(mut n) = self.appends.lock() {
            *n += 1;
        }
        Ok(rows.len())
    }
}
