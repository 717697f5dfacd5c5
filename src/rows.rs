use crate::decode::DecodedBody;
use crate::extract::Extraction;
use crate::types::{format_sent_date, Message, Row};

/// Hard character cut. Never splits a UTF-8 sequence.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub struct RowBuilder {
    content_limit: usize,
}

impl RowBuilder {
    pub fn new(content_limit: usize) -> Self {
        Self { content_limit }
    }

    pub fn build(&self, message: &Message, body: &DecodedBody, extraction: &Extraction) -> Row {
        let sent_date = message
            .sent_date
            .or(body.date_header)
            .map(|d| format_sent_date(&d))
            .unwrap_or_default();
        let record = &extraction.record;

        Row {
            sent_date,
            name: record.name.clone(),
            address: record.address.clone(),
            email1: record.email1.clone(),
            email2: record.email2.clone(),
            content: truncate_chars(&body.text, self.content_limit),
        }
    }
}
