use clap::Parser;

/// Fetch messages by label, extract form fields, and append new rows to a sheet.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    /// Gmail label name (or id) to read messages from.
    #[arg(long, default_value = "INBOX")]
    pub label: String,

    /// Extra Gmail search expression applied within the label.
    #[arg(long)]
    pub query: Option<String>,

    /// Maximum number of messages to fetch.
    #[arg(long, default_value_t = 10, value_name = "N")]
    pub max_messages: u32,

    /// Max characters of body text printed per message (0 = no limit).
    #[arg(long, default_value_t = 200, value_name = "N")]
    pub body_length: usize,

    /// Spreadsheet to append rows to. Without it the run only previews.
    #[arg(long, value_name = "ID")]
    pub spreadsheet_id: Option<String>,

    /// Sheet (tab) name within the spreadsheet.
    #[arg(long, default_value = "Sheet1", value_name = "NAME")]
    pub sheet: String,

    /// Max characters of content per cell written to the sheet.
    #[arg(long, default_value_t = 5000, value_name = "N")]
    pub content_limit: usize,

    /// Append identical rows extracted in the same run once per message.
    #[arg(long)]
    pub keep_intra_run_duplicates: bool,
}
