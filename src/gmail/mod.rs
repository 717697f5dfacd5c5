//! Gmail REST v1 message source.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::read_json;
use crate::errors::{AppError, AppResult};
use crate::types::{BodyEncoding, Message};

const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const MAX_PAGE_SIZE: u32 = 500;

#[derive(Clone, Debug)]
pub struct MessageQuery {
    /// Label name or id.
    pub label: String,
    /// Optional Gmail search expression applied on top of the label.
    pub query: Option<String>,
    pub max_messages: u32,
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Messages matching the query, in provider order, at most `max_messages`.
    async fn fetch(&self, query: &MessageQuery) -> AppResult<Vec<Message>>;
}

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct Label {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageStub>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    internal_date: Option<String>,
    #[serde(default)]
    raw: String,
}

pub struct GmailClient {
    http: reqwest::Client,
    access_token: String,
}

impl GmailClient {
    pub fn new(access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.to_string(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        what: &str,
    ) -> AppResult<T> {
        let res = self
            .http
            .get(format!("{GMAIL_API}/{path}"))
            .bearer_auth(&self.access_token)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("{what} request failed: {e}")))?;
        read_json(res, what).await
    }

    async fn resolve_label(&self, label: &str) -> AppResult<String> {
        let list: LabelList = self.get("labels", &[], "gmail labels").await?;
        list.labels
            .into_iter()
            .find(|l| l.name == label || l.id == label)
            .map(|l| {
                info!(label = %label, id = %l.id, "Resolved label");
                l.id
            })
            .ok_or_else(|| AppError::LabelNotFound(label.to_string()))
    }

    async fn list_ids(&self, label_id: &str, query: &MessageQuery) -> AppResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while (ids.len() as u32) < query.max_messages {
            let remaining = query.max_messages - ids.len() as u32;
            let mut params = vec![
                ("labelIds", label_id.to_string()),
                ("maxResults", remaining.min(MAX_PAGE_SIZE).to_string()),
            ];
            if let Some(q) = &query.query {
                params.push(("q", q.clone()));
            }
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: MessageList = self.get("messages", &params, "gmail list").await?;
            ids.extend(page.messages.into_iter().map(|m| m.id));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        ids.truncate(query.max_messages as usize);
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> AppResult<Message> {
        let raw: RawMessage = self
            .get(
                &format!("messages/{id}"),
                &[("format", "raw".to_string())],
                "gmail get",
            )
            .await?;
        Ok(Message {
            sent_date: raw.internal_date.as_deref().and_then(parse_internal_date),
            id: raw.id,
            raw_body: raw.raw.into_bytes(),
            body_encoding: BodyEncoding::Base64Url,
        })
    }
}

/// `internalDate` is epoch milliseconds as a decimal string.
pub fn parse_internal_date(value: &str) -> Option<DateTime<Utc>> {
    let millis = value.trim().parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis)
}

#[async_trait]
impl MessageSource for GmailClient {
    async fn fetch(&self, query: &MessageQuery) -> AppResult<Vec<Message>> {
        let label_id = self.resolve_label(&query.label).await?;
        let ids = self.list_ids(&label_id, query).await?;
        info!(label = %query.label, count = ids.len(), "Listed messages");

        let mut messages = Vec::with_capacity(ids.len());
        for id in &ids {
            let message = self.get_message(id).await?;
            debug!(message = %message.id, bytes = message.raw_body.len(), "Fetched message");
            messages.push(message);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_date_is_epoch_millis() {
        let date = parse_internal_date("1735732800000").expect("date");
        assert_eq!(date.to_rfc3339(), "2025-01-01T12:00:00+00:00");
        assert!(parse_internal_date("not-a-number").is_none());
    }

    #[test]
    fn raw_message_deserializes() {
        let json = r#"{"id":"18c","threadId":"18c","internalDate":"1735732800000","raw":"SGk"}"#;
        let raw: RawMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(raw.id, "18c");
        assert_eq!(raw.raw, "SGk");
    }
}
