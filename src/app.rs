use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::RunSettings;
use crate::decode::decode_message;
use crate::errors::AppResult;
use crate::extract::Extractor;
use crate::gmail::{GmailClient, MessageSource};
use crate::oauth::{authorize_with_scopes, default_scopes};
use crate::rows::{truncate_chars, RowBuilder};
use crate::sheets::{GoogleSheets, RowStore};
use crate::sync::{SheetSynchronizer, SyncReport};
use crate::types::{Message, Row};

const TOKEN_KEY: &str = "default";

#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub message_id: String,
    pub row: Row,
    pub matched: bool,
    pub has_body: bool,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct RunOutcome {
    pub processed: usize,
    pub unmatched: usize,
    /// `None` in preview-only mode.
    pub sync: Option<SyncReport>,
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = RunSettings::from_cli(&cli).context("invalid options")?;
    let token = authorize_with_scopes(&default_scopes(), TOKEN_KEY)
        .await
        .context("authorizing with Google")?;

    let source = GmailClient::new(&token);
    let outcome = match &settings.target {
        Some(target) => {
            let sheets = GoogleSheets::new(&token, &target.spreadsheet_id, &target.sheet);
            run_pipeline(&source, Some(&sheets), &settings).await
        }
        None => run_pipeline::<_, GoogleSheets>(&source, None, &settings).await,
    }
    .context("run aborted; the sheet was not modified unless an append was reported")?;

    info!(
        processed = outcome.processed,
        unmatched = outcome.unmatched,
        "Run finished"
    );
    Ok(())
}

/// Source -> decode -> extract -> rows, then (with a store) dedup and append.
pub async fn run_pipeline<M, S>(
    source: &M,
    store: Option<&S>,
    settings: &RunSettings,
) -> AppResult<RunOutcome>
where
    M: MessageSource + ?Sized,
    S: RowStore + ?Sized,
{
    let messages = source.fetch(&settings.query).await?;
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    println!("Message IDs: {ids:?}");

    let processed = process_messages(
        &messages,
        &Extractor::default(),
        &RowBuilder::new(settings.content_limit),
    );
    for item in &processed {
        print_preview(item, settings.body_length);
    }

    let unmatched = processed.iter().filter(|p| !p.matched).count();
    if unmatched > 0 {
        warn!(unmatched, "Some messages did not match the form layout");
    }
    let mut outcome = RunOutcome {
        processed: processed.len(),
        unmatched,
        sync: None,
    };

    let Some(store) = store else {
        info!("No spreadsheet configured; preview only");
        return Ok(outcome);
    };
    if processed.is_empty() {
        println!("No messages fetched; nothing to sync.");
        return Ok(outcome);
    }

    let rows: Vec<Row> = processed.into_iter().map(|p| p.row).collect();
    let synchronizer =
        SheetSynchronizer::new(store, settings.content_limit, settings.duplicate_policy);
    let report = synchronizer.sync(rows).await?;

    if report.skipped_existing > 0 {
        println!(
            "Skipping {} row(s) already on sheet.",
            report.skipped_existing
        );
    }
    if report.skipped_in_run > 0 {
        println!(
            "Skipping {} duplicate row(s) from this run.",
            report.skipped_in_run
        );
    }
    if report.skipped_blank > 0 {
        println!(
            "Skipping {} message(s) with no date and no content.",
            report.skipped_blank
        );
    }
    println!("{}", append_summary(&report));
    outcome.sync = Some(report);
    Ok(outcome)
}

/// Closing line of a sync run.
pub fn append_summary(report: &SyncReport) -> String {
    if report.appended > 0 {
        format!("Appended {} row(s) to the sheet.", report.appended)
    } else if report.skipped_existing == report.candidates {
        "All fetched messages already exist on the sheet; nothing to append.".to_string()
    } else {
        "No new rows to append.".to_string()
    }
}

/// One row per message, matched or not.
pub fn process_messages(
    messages: &[Message],
    extractor: &Extractor,
    builder: &RowBuilder,
) -> Vec<ProcessedMessage> {
    messages
        .iter()
        .map(|message| {
            let body = decode_message(message);
            let extraction = extractor.extract(&body.text);
            let row = builder.build(message, &body, &extraction);
            ProcessedMessage {
                message_id: message.id.clone(),
                matched: extraction.matched(),
                has_body: body.has_body,
                row,
                text: body.text,
            }
        })
        .collect()
}

/// Console preview of a body; `limit` 0 disables the cut.
pub fn preview(text: &str, limit: usize) -> String {
    if limit == 0 || text.chars().count() <= limit {
        text.to_string()
    } else {
        format!("{}...", truncate_chars(text, limit))
    }
}

fn print_preview(item: &ProcessedMessage, body_length: usize) {
    let status = if item.matched { "matched" } else { "unmatched" };
    let date = if item.row.sent_date.is_empty() {
        "unknown date"
    } else {
        item.row.sent_date.as_str()
    };
    println!("[{status}] {} ({date})", item.message_id);
    if item.has_body {
        println!("[plain]: {}", preview(&item.text, body_length));
    } else {
        println!("No body found for message.");
    }
}
