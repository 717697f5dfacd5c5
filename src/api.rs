//! Shared response handling for the Google REST endpoints.
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::{AppError, AppResult};

const MAX_ERROR_BODY: usize = 200;

pub(crate) async fn read_json<T: DeserializeOwned>(res: Response, what: &str) -> AppResult<T> {
    let status = res.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AppError::AuthExpired);
    }
    let body = res
        .text()
        .await
        .map_err(|e| AppError::Network(format!("{what}: reading response failed: {e}")))?;
    if !status.is_success() {
        return Err(AppError::Network(format!(
            "{what} failed with status {status}: {}",
            redact(&body)
        )));
    }
    serde_json::from_str(&body).map_err(|e| AppError::Unexpected(format!("{what}: decode: {e}")))
}

fn redact(body: &str) -> String {
    let compact = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() > MAX_ERROR_BODY {
        let cut: String = compact.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    } else {
        compact
    }
}
