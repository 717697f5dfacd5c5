//! Body decoding: turns a raw message payload into plain text.
//!
//! Decoding never fails the run. Anything that cannot be decoded degrades to
//! best-effort text (or an empty string) for that message only.
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};
use html2text::from_read;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::types::{BodyEncoding, Message};

// Gmail emits url-safe base64 with or without padding depending on the endpoint.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub text: String,
    /// `Date:` header of the message, used when the source has no sent date.
    pub date_header: Option<DateTime<Utc>>,
    /// False when the message had no text or html part at all.
    pub has_body: bool,
}

pub fn decode_message(message: &Message) -> DecodedBody {
    let raw = match message.body_encoding {
        BodyEncoding::Rfc822 => message.raw_body.clone(),
        BodyEncoding::Base64Url => {
            let compact: Vec<u8> = message
                .raw_body
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            match URL_SAFE_LENIENT.decode(compact) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(message = %message.id, error = %e, "Malformed base64 body; treating as empty");
                    return DecodedBody::default();
                }
            }
        }
    };
    decode_rfc822(&raw)
}

pub fn decode_rfc822(raw: &[u8]) -> DecodedBody {
    let parsed = match mailparse::parse_mail(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Unparsable MIME message; using raw bytes");
            let text = String::from_utf8_lossy(raw).trim().to_string();
            return DecodedBody {
                has_body: !text.is_empty(),
                text,
                date_header: None,
            };
        }
    };

    let date_header = parsed
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

    let text = if let Some(part) = find_leaf(&parsed, "text/plain") {
        Some(normalize_plain(&part_text(part)))
    } else {
        find_leaf(&parsed, "text/html").map(|part| html_to_text(&part_text(part)))
    };

    DecodedBody {
        has_body: text.is_some(),
        text: text.unwrap_or_default(),
        date_header,
    }
}

/// Depth-first search for the first non-attachment leaf of the given type.
fn find_leaf<'b, 'a>(part: &'b ParsedMail<'a>, mimetype: &str) -> Option<&'b ParsedMail<'a>> {
    if part.subparts.is_empty() {
        let is_attachment =
            part.get_content_disposition().disposition == DispositionType::Attachment;
        if !is_attachment && part.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
            return Some(part);
        }
        return None;
    }
    part.subparts
        .iter()
        .find_map(|sub| find_leaf(sub, mimetype))
}

fn part_text(part: &ParsedMail) -> String {
    match part.get_body() {
        Ok(body) => body,
        Err(e) => {
            warn!(mimetype = %part.ctype.mimetype, error = %e, "Body part decoding failed; using raw bytes");
            part.get_body_raw()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        }
    }
}

fn normalize_plain(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

pub fn html_to_text(html: &str) -> String {
    let rendered = from_read(html.as_bytes(), 120).unwrap_or_default();
    collapse_whitespace(&rendered)
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}
