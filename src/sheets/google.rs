use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::{RowStore, SheetContents};
use crate::api::read_json;
use crate::errors::{AppError, AppResult};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const LAST_COLUMN: char = 'F';

/// Google Sheets v4 values API for one tab of one spreadsheet.
pub struct GoogleSheets {
    http: reqwest::Client,
    access_token: String,
    spreadsheet_id: String,
    sheet: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendBody<'a> {
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: Option<UpdateSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSummary {
    updated_rows: Option<usize>,
    updated_range: Option<String>,
}

impl GoogleSheets {
    pub fn new(access_token: &str, spreadsheet_id: &str, sheet: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet: sheet.to_string(),
        }
    }

    fn range(&self) -> String {
        format!("'{}'!A:{LAST_COLUMN}", self.sheet.replace('\'', "''"))
    }

    fn values_url(&self, suffix: &str) -> AppResult<Url> {
        let mut url = Url::parse(SHEETS_API)
            .map_err(|e| AppError::Unexpected(format!("sheets base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Unexpected("sheets base url cannot hold a path".into()))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{suffix}", self.range()));
        Ok(url)
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RowStore for GoogleSheets {
    async fn read_rows(&self) -> AppResult<SheetContents> {
        let url = self.values_url("")?;
        let res = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "FORMATTED_VALUE"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Network(format!("sheets read request failed: {e}")))?;
        let range: ValueRange = read_json(res, "sheets read").await?;

        let values: Vec<Vec<String>> = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        debug!(sheet = %self.sheet, rows = values.len(), "Read sheet values");
        Ok(SheetContents::from_values(values))
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> AppResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let url = self.values_url(":append")?;
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&AppendBody {
                major_dimension: "ROWS",
                values: rows,
            })
            .send()
            .await
            .map_err(|e| AppError::Network(format!("sheets append request failed: {e}")))?;
        let parsed: AppendResponse = read_json(res, "sheets append").await?;

        let updates = parsed.updates.ok_or_else(|| {
            AppError::Unexpected("sheets append response carried no update summary".into())
        })?;
        let written = updates.updated_rows.unwrap_or(0);
        info!(
            sheet = %self.sheet,
            rows = written,
            range = updates.updated_range.as_deref().unwrap_or("?"),
            "Appended rows"
        );
        Ok(written)
    }
}
