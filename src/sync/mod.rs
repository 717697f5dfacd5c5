//! Deduplicating synchronization of candidate rows into the remote sheet.
//!
//! Identity is content-addressed: a row is "already present" when the digest
//! of its canonical cell values matches the digest of a row already in the
//! sheet. The existing set is recomputed from the sheet on every run and is
//! never cached.
use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::rows::truncate_chars;
use crate::sheets::RowStore;
use crate::types::{format_sent_date, header_cells, Row, COLUMNS};

const SENT_DATE_COLUMN: usize = 0;
const CONTENT_COLUMN: usize = 5;

const NAIVE_DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S UTC",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

// Spreadsheet serial days are counted from 1899-12-30; 2958465 is 9999-12-31.
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RowIdentity(String);

impl RowIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes `RowIdentity` values. Existing and candidate rows must go through
/// the same digester, otherwise equal rows hash apart.
#[derive(Clone, Copy, Debug)]
pub struct RowDigester {
    content_limit: usize,
}

impl RowDigester {
    pub fn new(content_limit: usize) -> Self {
        Self { content_limit }
    }

    pub fn digest_row(&self, row: &Row) -> RowIdentity {
        self.digest_cells(&row.to_cells())
    }

    /// Digest of a row as read back from the store. Missing trailing cells count as empty.
    pub fn digest_cells<S: AsRef<str>>(&self, cells: &[S]) -> RowIdentity {
        let mut hasher = Sha256::new();
        for column in 0..COLUMNS.len() {
            let raw = cells.get(column).map(|c| c.as_ref()).unwrap_or("");
            let canonical = self.canonical_cell(column, raw);
            hasher.update((canonical.len() as u64).to_be_bytes());
            hasher.update(canonical.as_bytes());
        }
        RowIdentity(format!("{:x}", hasher.finalize()))
    }

    fn canonical_cell(&self, column: usize, raw: &str) -> String {
        let normalized = raw.replace("\r\n", "\n");
        let cell = normalized.trim();
        match column {
            SENT_DATE_COLUMN => canonical_sent_date(cell),
            CONTENT_COLUMN => truncate_chars(cell, self.content_limit).trim_end().to_string(),
            _ => cell.to_string(),
        }
    }
}

fn canonical_sent_date(cell: &str) -> String {
    parse_sent_date(cell)
        .map(|d| format_sent_date(&d))
        .unwrap_or_else(|| cell.to_string())
}

/// Parses the date forms a spreadsheet may hand back for a sent date cell.
pub fn parse_sent_date(cell: &str) -> Option<DateTime<Utc>> {
    if cell.is_empty() {
        return None;
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(cell) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(cell) {
        return Some(date.with_timezone(&Utc));
    }
    cell.parse::<f64>().ok().and_then(serial_to_datetime)
}

fn serial_to_datetime(serial: f64) -> Option<DateTime<Utc>> {
    if !(1.0..=MAX_SERIAL_DAY).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    Some((epoch + Duration::seconds(seconds)).and_utc())
}

/// Identities of every row in the sheet at the start of the run. Read-only.
#[derive(Debug, Default)]
pub struct ExistingRowSet {
    ids: HashSet<RowIdentity>,
}

impl ExistingRowSet {
    pub fn from_rows(digester: &RowDigester, rows: &[Vec<String>]) -> Self {
        Self {
            ids: rows.iter().map(|row| digester.digest_cells(row)).collect(),
        }
    }

    pub fn contains(&self, id: &RowIdentity) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// What to do with identical candidates produced within the same run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Append the first occurrence only.
    #[default]
    Collapse,
    /// Check each candidate against the pre-run set only.
    KeepBoth,
}

#[derive(Debug, Default)]
pub struct SyncPlan {
    pub novel: Vec<Row>,
    pub skipped_existing: usize,
    pub skipped_in_run: usize,
    pub skipped_blank: usize,
}

/// Filters candidates down to novel rows, preserving candidate order.
pub fn plan_appends(
    existing: &ExistingRowSet,
    digester: &RowDigester,
    candidates: Vec<Row>,
    policy: DuplicatePolicy,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let mut accepted: HashSet<RowIdentity> = HashSet::new();

    for row in candidates {
        // The store drops blank rows on read, so they could never be recognized again.
        if row.is_blank() {
            debug!("Candidate has no cell values; not appending");
            plan.skipped_blank += 1;
            continue;
        }
        let id = digester.digest_row(&row);
        if existing.contains(&id) {
            debug!(identity = %id, "Candidate already on sheet");
            plan.skipped_existing += 1;
            continue;
        }
        if policy == DuplicatePolicy::Collapse && !accepted.insert(id) {
            plan.skipped_in_run += 1;
            continue;
        }
        plan.novel.push(row);
    }
    plan
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub candidates: usize,
    pub existing: usize,
    pub skipped_existing: usize,
    pub skipped_in_run: usize,
    pub skipped_blank: usize,
    pub appended: usize,
    pub header_written: bool,
}

pub struct SheetSynchronizer<'a, S: RowStore + ?Sized> {
    store: &'a S,
    digester: RowDigester,
    policy: DuplicatePolicy,
}

impl<'a, S: RowStore + ?Sized> SheetSynchronizer<'a, S> {
    pub fn new(store: &'a S, content_limit: usize, policy: DuplicatePolicy) -> Self {
        Self {
            store,
            digester: RowDigester::new(content_limit),
            policy,
        }
    }

    /// Read the sheet, diff, and append novel rows in one batch.
    ///
    /// A failed read aborts before anything is written. A rejected or partial
    /// append is reported with the rows that were attempted and never retried.
    pub async fn sync(&self, candidates: Vec<Row>) -> AppResult<SyncReport> {
        let contents = self.store.read_rows().await.map_err(|e| match e {
            AppError::AuthExpired => AppError::AuthExpired,
            other => AppError::ExistingRows(other.to_string()),
        })?;
        let existing = ExistingRowSet::from_rows(&self.digester, &contents.rows);
        let candidate_count = candidates.len();
        info!(
            existing = existing.len(),
            candidates = candidate_count,
            "Computed existing row identities"
        );

        let plan = plan_appends(&existing, &self.digester, candidates, self.policy);
        let mut report = SyncReport {
            candidates: candidate_count,
            existing: existing.len(),
            skipped_existing: plan.skipped_existing,
            skipped_in_run: plan.skipped_in_run,
            skipped_blank: plan.skipped_blank,
            appended: 0,
            header_written: false,
        };
        if plan.novel.is_empty() {
            return Ok(report);
        }

        let header_written = contents.is_empty();
        let mut batch = Vec::with_capacity(plan.novel.len() + 1);
        if header_written {
            batch.push(header_cells());
        }
        batch.extend(plan.novel.iter().map(Row::to_cells));

        let written = self
            .store
            .append_rows(&batch)
            .await
            .map_err(|e| append_error(&plan.novel, e.to_string()))?;
        if written != batch.len() {
            warn!(expected = batch.len(), written, "Partial append");
            return Err(append_error(
                &plan.novel,
                format!("store reported {written} of {} row(s) written", batch.len()),
            ));
        }

        report.appended = plan.novel.len();
        report.header_written = header_written;
        Ok(report)
    }
}

fn append_error(rows: &[Row], reason: String) -> AppError {
    let label = |row: Option<&Row>| {
        row.map(|r| r.sent_date.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "(no date)".to_string())
    };
    AppError::Append {
        attempted: rows.len(),
        first: label(rows.first()),
        last: label(rows.last()),
        reason,
    }
}
