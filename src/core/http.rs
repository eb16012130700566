use std::time::Duration;

use reqwest::{
    header::{
        HeaderMap,
        HeaderValue,
        USER_AGENT,
    },
    Client,
    Response,
};

use crate::core::SyncError;

pub fn http_client(timeout: Duration, headers: HeaderMap) -> Result<Client, SyncError> {
    let mut headers = headers;
    headers.insert(USER_AGENT, HeaderValue::from_static("notion2anki/0.1 (+reqwest)"));

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| SyncError::Custom(format!("HTTP client build failed: {e}")))
}

/// Turns a non-2xx response into an error carrying the body, which is where
/// both APIs explain what went wrong.
pub async fn ensure_success(resp: Response) -> Result<Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Custom(format!("HTTP error {} from {}: {}", status, url, body.trim())))
}
