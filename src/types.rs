use chrono::{DateTime, Utc};

/// Header of the target sheet. Column count and order are fixed.
pub const COLUMNS: [&str; 6] = ["Sent Date", "Name", "Address", "Email 1", "Email 2", "Content"];

pub const SENT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Transfer encoding of `Message::raw_body` as delivered by the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyEncoding {
    /// RFC 4648 url-safe base64 wrapping a full RFC 822 message (Gmail `format=raw`).
    Base64Url,
    /// Raw RFC 822 bytes.
    Rfc822,
}

#[derive(Clone, Debug)]
pub struct Message {
    pub id: String,
    pub sent_date: Option<DateTime<Utc>>,
    pub raw_body: Vec<u8>,
    pub body_encoding: BodyEncoding,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedRecord {
    pub name: String,
    pub address: String,
    pub email1: String,
    pub email2: String,
}

impl ExtractedRecord {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.address.is_empty()
            && self.email1.is_empty()
            && self.email2.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub sent_date: String,
    pub name: String,
    pub address: String,
    pub email1: String,
    pub email2: String,
    pub content: String,
}

impl Row {
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.sent_date.clone(),
            self.name.clone(),
            self.address.clone(),
            self.email1.clone(),
            self.email2.clone(),
            self.content.clone(),
        ]
    }

    /// True when every cell is empty or whitespace. Such rows read back as nothing.
    pub fn is_blank(&self) -> bool {
        [
            &self.sent_date,
            &self.name,
            &self.address,
            &self.email1,
            &self.email2,
            &self.content,
        ]
        .iter()
        .all(|cell| cell.trim().is_empty())
    }
}

pub fn header_cells() -> Vec<String> {
    COLUMNS.iter().map(|c| c.to_string()).collect()
}

pub fn format_sent_date(date: &DateTime<Utc>) -> String {
    date.format(SENT_DATE_FORMAT).to_string()
}
