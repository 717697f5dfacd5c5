use chrono::{TimeZone, Utc};

use inboxsheet::decode::DecodedBody;
use inboxsheet::extract::Extractor;
use inboxsheet::rows::{truncate_chars, RowBuilder};
use inboxsheet::types::{BodyEncoding, Message, COLUMNS};

fn message(sent: Option<(i32, u32, u32)>) -> Message {
    Message {
        id: "m-1".into(),
        sent_date: sent.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 8, 30, 0).unwrap()),
        raw_body: Vec::new(),
        body_encoding: BodyEncoding::Rfc822,
    }
}

fn body(text: &str) -> DecodedBody {
    DecodedBody {
        text: text.to_string(),
        date_header: None,
        has_body: !text.is_empty(),
    }
}

#[test]
fn content_is_cut_at_the_limit() {
    let text = "0123456789abcdef";
    let extraction = Extractor::default().extract(text);

    for limit in [1, 5, 16, 100] {
        let row = RowBuilder::new(limit).build(&message(None), &body(text), &extraction);
        assert_eq!(row.content.chars().count(), text.len().min(limit));
        assert!(text.starts_with(&row.content));
    }
}

#[test]
fn truncation_counts_characters_not_bytes() {
    assert_eq!(truncate_chars("ééééé", 3), "ééé");
    assert_eq!(truncate_chars("ab", 3), "ab");
    assert_eq!(truncate_chars("abc", 0), "");
}

#[test]
fn unmatched_message_still_produces_a_row() {
    let text = "Nothing structured here.";
    let extraction = Extractor::default().extract(text);
    let row = RowBuilder::new(5000).build(&message(Some((2024, 1, 2))), &body(text), &extraction);

    assert!(!extraction.matched());
    assert_eq!(row.name, "");
    assert_eq!(row.address, "");
    assert_eq!(row.email1, "");
    assert_eq!(row.email2, "");
    assert_eq!(row.content, text);
}

#[test]
fn cells_follow_the_fixed_column_order() {
    let text = "Name: Jane Address: 1 Main St Email: j@x.io Email: k@y.io";
    let extraction = Extractor::default().extract(text);
    let row = RowBuilder::new(5000).build(&message(Some((2024, 1, 2))), &body(text), &extraction);

    let cells = row.to_cells();
    assert_eq!(cells.len(), COLUMNS.len());
    assert_eq!(
        cells[..5],
        [
            "2024-01-02 08:30:00 UTC",
            "Jane",
            "1 Main St",
            "j@x.io",
            "k@y.io"
        ]
    );
    assert_eq!(cells[5], text);
}

#[test]
fn sent_date_falls_back_to_date_header() {
    let mut decoded = body("hi");
    decoded.date_header = Some(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap());
    let extraction = Extractor::default().extract("hi");

    let row = RowBuilder::new(10).build(&message(None), &decoded, &extraction);
    assert_eq!(row.sent_date, "2023-12-31 23:59:59 UTC");

    let row = RowBuilder::new(10).build(&message(Some((2024, 6, 1))), &decoded, &extraction);
    assert_eq!(row.sent_date, "2024-06-01 08:30:00 UTC");

    let row = RowBuilder::new(10).build(&message(None), &body("hi"), &extraction);
    assert_eq!(row.sent_date, "");
}
