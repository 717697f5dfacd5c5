use std::env;

use crate::cli::Cli;
use crate::errors::{AppError, AppResult};
use crate::gmail::MessageQuery;
use crate::sync::DuplicatePolicy;

/// Google Sheets rejects cells longer than this many characters.
pub const SHEETS_CELL_LIMIT: usize = 50_000;

pub const SPREADSHEET_ENV: &str = "INBOXSHEET_SPREADSHEET_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub sheet: String,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub query: MessageQuery,
    /// 0 means the preview is not cut.
    pub body_length: usize,
    pub content_limit: usize,
    /// `None` selects preview-only mode.
    pub target: Option<SheetTarget>,
    pub duplicate_policy: DuplicatePolicy,
}

impl RunSettings {
    pub fn from_cli(cli: &Cli) -> AppResult<Self> {
        let spreadsheet_id = cli
            .spreadsheet_id
            .clone()
            .or_else(|| env::var(SPREADSHEET_ENV).ok())
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        Self::build(cli, spreadsheet_id)
    }

    fn build(cli: &Cli, spreadsheet_id: Option<String>) -> AppResult<Self> {
        if cli.max_messages == 0 {
            return Err(AppError::Config("max-messages must be at least 1".into()));
        }
        if cli.content_limit == 0 || cli.content_limit >= SHEETS_CELL_LIMIT {
            return Err(AppError::Config(format!(
                "content-limit must be between 1 and {}",
                SHEETS_CELL_LIMIT - 1
            )));
        }
        if cli.sheet.trim().is_empty() {
            return Err(AppError::Config("sheet name must not be empty".into()));
        }

        let query = cli
            .query
            .as_ref()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        Ok(Self {
            query: MessageQuery {
                label: cli.label.clone(),
                query,
                max_messages: cli.max_messages,
            },
            body_length: cli.body_length,
            content_limit: cli.content_limit,
            target: spreadsheet_id.map(|spreadsheet_id| SheetTarget {
                spreadsheet_id,
                sheet: cli.sheet.clone(),
            }),
            duplicate_policy: if cli.keep_intra_run_duplicates {
                DuplicatePolicy::KeepBoth
            } else {
                DuplicatePolicy::Collapse
            },
        })
    }
}
