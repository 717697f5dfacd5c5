//! Field extraction from decoded message text.
//!
//! Rules are tried in priority order; the first one that matches wins. A
//! message no rule recognizes still yields an (empty) record, flagged as
//! unmatched.
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::decode::collapse_whitespace;
use crate::types::ExtractedRecord;

const EMAIL: &str = r"[A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,}";

static FORM_LAYOUT: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"(?is)\bname\s*:\s*(?P<name>.+?)\s*\baddress\s*:\s*(?P<address>.+?)\s*\be-?mail(?:\s+address)?\s*(?:1|one)?\s*:\s*(?P<email1>{EMAIL}).*?\be-?mail(?:\s+address)?\s*(?:2|two)?\s*:\s*(?P<email2>{EMAIL})"
    );
    Regex::new(&pattern).expect("valid form layout regex")
});

pub trait ExtractionRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, text: &str) -> Option<ExtractedRecord>;
}

/// The labeled form: `Name:`, `Address:`, then two email fields, in that order.
pub struct FormLayoutRule;

impl ExtractionRule for FormLayoutRule {
    fn name(&self) -> &'static str {
        "form-layout"
    }

    fn apply(&self, text: &str) -> Option<ExtractedRecord> {
        let caps = FORM_LAYOUT.captures(text)?;
        Some(ExtractedRecord {
            name: field(&caps, "name"),
            address: field(&caps, "address"),
            email1: field(&caps, "email1"),
            email2: field(&caps, "email2"),
        })
    }
}

fn field(caps: &Captures, group: &str) -> String {
    caps.name(group)
        .map(|m| collapse_whitespace(m.as_str()))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub record: ExtractedRecord,
    /// Name of the rule that matched; `None` when the message was not recognized.
    pub rule: Option<&'static str>,
}

impl Extraction {
    pub fn matched(&self) -> bool {
        self.rule.is_some()
    }
}

pub struct Extractor {
    rules: Vec<Box<dyn ExtractionRule>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(vec![Box::new(FormLayoutRule)])
    }
}

impl Extractor {
    pub fn new(rules: Vec<Box<dyn ExtractionRule>>) -> Self {
        Self { rules }
    }

    pub fn extract(&self, text: &str) -> Extraction {
        for rule in &self.rules {
            if let Some(record) = rule.apply(text) {
                return Extraction {
                    record,
                    rule: Some(rule.name()),
                };
            }
        }
        Extraction {
            record: ExtractedRecord::default(),
            rule: None,
        }
    }
}
