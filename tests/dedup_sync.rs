use async_trait::async_trait;

use inboxsheet::errors::{AppError, AppResult};
use inboxsheet::sheets::{MemoryStore, RowStore, SheetContents};
use inboxsheet::sync::{
    plan_appends, DuplicatePolicy, ExistingRowSet, RowDigester, SheetSynchronizer,
};
use inboxsheet::types::{header_cells, Row};

fn row(date: &str, name: &str, content: &str) -> Row {
    Row {
        sent_date: date.to_string(),
        name: name.to_string(),
        address: String::new(),
        email1: String::new(),
        email2: String::new(),
        content: content.to_string(),
    }
}

fn row_a() -> Row {
    row("2024-03-05 14:07:09 UTC", "Ann", "first body")
}

fn row_b() -> Row {
    row("2024-03-05 15:00:00 UTC", "Ben", "second body")
}

fn row_c() -> Row {
    row("2024-03-06 09:00:00 UTC", "Cat", "third body")
}

fn sheet_with(rows: &[Row]) -> MemoryStore {
    let mut values = vec![header_cells()];
    values.extend(rows.iter().map(Row::to_cells));
    MemoryStore::with_values(values)
}

#[test]
fn digest_is_stable_across_digesters() {
    let a = RowDigester::new(5000).digest_row(&row_a());
    let b = RowDigester::new(5000).digest_row(&row_a());
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
}

#[test]
fn distinct_rows_have_distinct_digests() {
    let digester = RowDigester::new(5000);
    let base = row_a();
    let mut variants = vec![base.clone()];
    for column in 0..6 {
        let mut cells = base.to_cells();
        cells[column].push('x');
        variants.push(Row {
            sent_date: cells[0].clone(),
            name: cells[1].clone(),
            address: cells[2].clone(),
            email1: cells[3].clone(),
            email2: cells[4].clone(),
            content: cells[5].clone(),
        });
    }

    let ids: std::collections::HashSet<_> =
        variants.iter().map(|r| digester.digest_row(r)).collect();
    assert_eq!(ids.len(), variants.len());
}

#[test]
fn candidates_already_present_are_dropped_in_order() {
    let digester = RowDigester::new(5000);
    let existing =
        ExistingRowSet::from_rows(&digester, &[row_a().to_cells(), row_b().to_cells()]);

    let plan = plan_appends(
        &existing,
        &digester,
        vec![row_a(), row_c()],
        DuplicatePolicy::Collapse,
    );
    assert_eq!(plan.novel, vec![row_c()]);
    assert_eq!(plan.skipped_existing, 1);
}

#[test]
fn reformatted_dates_and_short_rows_match_existing() {
    let digester = RowDigester::new(5000);
    let mut candidate = row("2024-03-05 14:07:09 UTC", "Ann", "");
    candidate.email2 = "ann@example.com".into();

    // Read back with an ISO date and without the empty trailing Content cell.
    let stored = vec![
        "2024-03-05T14:07:09Z".to_string(),
        "Ann ".to_string(),
        String::new(),
        String::new(),
        "ann@example.com".to_string(),
    ];
    assert_eq!(digester.digest_cells(&stored), digester.digest_row(&candidate));
}

#[test]
fn content_is_compared_under_the_current_limit() {
    let digester = RowDigester::new(10);
    let stored = row("2024-03-05 14:07:09 UTC", "Ann", "0123456789 and more text");
    let candidate = row("2024-03-05 14:07:09 UTC", "Ann", "0123456789");
    assert_eq!(digester.digest_row(&stored), digester.digest_row(&candidate));
}

#[test]
fn intra_run_duplicates_follow_policy() {
    let digester = RowDigester::new(5000);
    let existing = ExistingRowSet::default();

    let collapsed = plan_appends(
        &existing,
        &digester,
        vec![row_a(), row_b(), row_a()],
        DuplicatePolicy::Collapse,
    );
    assert_eq!(collapsed.novel, vec![row_a(), row_b()]);
    assert_eq!(collapsed.skipped_in_run, 1);

    let kept = plan_appends(
        &existing,
        &digester,
        vec![row_a(), row_b(), row_a()],
        DuplicatePolicy::KeepBoth,
    );
    assert_eq!(kept.novel, vec![row_a(), row_b(), row_a()]);
    assert_eq!(kept.skipped_in_run, 0);
}

#[tokio::test]
async fn empty_sheet_gets_header_and_all_rows_in_order() {
    let store = MemoryStore::new();
    let sync = SheetSynchronizer::new(&store, 5000, DuplicatePolicy::Collapse);

    let report = sync
        .sync(vec![row_a(), row_b(), row_c()])
        .await
        .expect("sync");

    assert_eq!(report.appended, 3);
    assert!(report.header_written);
    assert_eq!(
        store.values().expect("values"),
        vec![
            header_cells(),
            row_a().to_cells(),
            row_b().to_cells(),
            row_c().to_cells(),
        ]
    );
}

#[tokio::test]
async fn only_novel_rows_are_appended() {
    let store = sheet_with(&[row_a(), row_b()]);
    let sync = SheetSynchronizer::new(&store, 5000, DuplicatePolicy::Collapse);

    let report = sync.sync(vec![row_a(), row_c()]).await.expect("sync");

    assert_eq!(report.existing, 2);
    assert_eq!(report.skipped_existing, 1);
    assert_eq!(report.appended, 1);
    assert!(!report.header_written);
    let values = store.values().expect("values");
    assert_eq!(values.len(), 4);
    assert_eq!(values[3], row_c().to_cells());
}

#[tokio::test]
async fn second_run_appends_nothing() {
    let store = MemoryStore::new();
    let sync = SheetSynchronizer::new(&store, 5000, DuplicatePolicy::Collapse);

    sync.sync(vec![row_a(), row_b()]).await.expect("first");
    let report = sync.sync(vec![row_a(), row_b()]).await.expect("second");

    assert_eq!(report.appended, 0);
    assert_eq!(report.skipped_existing, 2);
    assert_eq!(store.append_calls(), 1);
    assert_eq!(store.values().expect("values").len(), 3);
}

struct UnreadableStore;

#[async_trait]
impl RowStore for UnreadableStore {
    async fn read_rows(&self) -> AppResult<SheetContents> {
        Err(AppError::Network("503 backend unavailable".into()))
    }

    async fn append_rows(&self, _rows: &[Vec<String>]) -> AppResult<usize> {
        panic!("append must not run after a failed read");
    }
}

#[tokio::test]
async fn failed_read_aborts_before_append() {
    let sync = SheetSynchronizer::new(&UnreadableStore, 5000, DuplicatePolicy::Collapse);

    let err = sync.sync(vec![row_a()]).await.unwrap_err();
    assert!(matches!(err, AppError::ExistingRows(_)), "{err}");
}

struct ShortWriteStore;

#[async_trait]
impl RowStore for ShortWriteStore {
    async fn read_rows(&self) -> AppResult<SheetContents> {
        Ok(SheetContents::from_values(vec![header_cells()]))
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> AppResult<usize> {
        Ok(rows.len() - 1)
    }
}

#[tokio::test]
async fn partial_append_is_reported_with_attempted_rows() {
    let sync = SheetSynchronizer::new(&ShortWriteStore, 5000, DuplicatePolicy::Collapse);

    let err = sync.sync(vec![row_a(), row_c()]).await.unwrap_err();
    match err {
        AppError::Append {
            attempted,
            first,
            last,
            ..
        } => {
            assert_eq!(attempted, 2);
            assert_eq!(first, row_a().sent_date);
            assert_eq!(last, row_c().sent_date);
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn blank_row() -> Row {
    row("", "", "")
}

#[tokio::test]
async fn blank_candidates_are_never_appended() {
    let store = MemoryStore::new();
    let sync = SheetSynchronizer::new(&store, 5000, DuplicatePolicy::Collapse);

    let first = sync
        .sync(vec![row_a(), blank_row()])
        .await
        .expect("first");
    assert_eq!(first.appended, 1);
    assert_eq!(first.skipped_blank, 1);

    let second = sync
        .sync(vec![row_a(), blank_row()])
        .await
        .expect("second");
    assert_eq!(second.appended, 0);
    assert_eq!(second.skipped_existing, 1);
    assert_eq!(second.skipped_blank, 1);
    assert_eq!(
        store.values().expect("values"),
        vec![header_cells(), row_a().to_cells()]
    );
}

#[test]
fn whitespace_only_rows_count_as_blank() {
    let plan = plan_appends(
        &ExistingRowSet::default(),
        &RowDigester::new(5000),
        vec![row(" ", "", "\n")],
        DuplicatePolicy::KeepBoth,
    );
    assert!(plan.novel.is_empty());
    assert_eq!(plan.skipped_blank, 1);
}

#[tokio::test]
async fn header_only_sheet_gets_rows_without_a_second_header() {
    let store = MemoryStore::with_values(vec![header_cells()]);
    let sync = SheetSynchronizer::new(&store, 5000, DuplicatePolicy::Collapse);

    let report = sync.sync(vec![row_a(), row_b()]).await.expect("sync");

    assert_eq!(report.existing, 0);
    assert_eq!(report.appended, 2);
    assert!(!report.header_written);
    let values = store.values().expect("values");
    assert_eq!(
        values,
        vec![header_cells(), row_a().to_cells(), row_b().to_cells()]
    );
    assert_eq!(values.iter().filter(|r| **r == header_cells()).count(), 1);
}
