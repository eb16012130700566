use async_trait::async_trait;
use reqwest::{
    header::{
        HeaderMap,
        HeaderName,
        HeaderValue,
        AUTHORIZATION,
    },
    Client,
};
use serde_json::Value;

use crate::{
    core::{
        http::http_client,
        models::Field,
        schema::{
            raw_text,
            RawRecord,
        },
        store::SourceStore,
        SyncError,
    },
    settings::SyncSettings,
};

pub mod types;

use types::{
    ErrorBody,
    Page,
    QueryRequest,
    QueryResponse,
};

const API_BASE: &str = "https://api.notion.com/v1";

pub struct NotionClient {
    client: Client,
    endpoint: String,
    cell_id_label: String,
}

impl NotionClient {
    pub fn new(settings: &SyncSettings) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", settings.notion_secret))
            .map_err(|_| SyncError::Config("NOTION_SECRET is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        let version = HeaderValue::from_str(&settings.notion_version)
            .map_err(|_| SyncError::Config("NOTION_VERSION is not a valid header value".into()))?;
        headers.insert(HeaderName::from_static("notion-version"), version);

        Ok(Self {
            client: http_client(settings.request_timeout(), headers)?,
            endpoint: format!("{}/databases/{}/query", API_BASE, settings.notion_database_id),
            cell_id_label: settings.schema.label(Field::CellId).to_string(),
        })
    }

    async fn query(&self, start_cursor: Option<String>) -> Result<QueryResponse, SyncError> {
        let body = QueryRequest { start_cursor, page_size: Some(100) };
        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|e| format!("{} ({})", e.message, e.code))
                .unwrap_or(text);
            return Err(SyncError::Notion(format!("{}: {}", status, message)));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl SourceStore for NotionClient {
    async fn fetch_all_records(&self) -> Result<Vec<RawRecord>, SyncError> {
        let mut records = Vec::new();
        let mut cursor = None;
        let mut pages = 0;

        loop {
            let response = self.query(cursor.take()).await?;
            pages += 1;
            records.extend(
                response.results.iter().map(|page| page_to_record(page, &self.cell_id_label)),
            );

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => break,
            }
        }

        log::info!("Fetched {} rows from Notion in {} pages", records.len(), pages);
        Ok(records)
    }
}

/// Flattens a database page into a raw row, the page id becoming the cell id.
pub fn page_to_record(page: &Page, cell_id_label: &str) -> RawRecord {
    let mut record = RawRecord::new();
    record.insert(cell_id_label.to_string(), Value::String(page.id.clone()));
    for (name, property) in &page.properties {
        let content = property_content(property).map(Value::String).unwrap_or(Value::Null);
        record.insert(name.clone(), content);
    }
    record
}

/// Reads the content of a property, whatever its type. Unknown types fall back to
/// the plain value stored under the type's key.
pub fn property_content(property: &Value) -> Option<String> {
    let kind = property.get("type")?.as_str()?;
    let inner = property.get(kind)?;

    match kind {
        "title" | "rich_text" => {
            let text: String = inner
                .as_array()?
                .iter()
                .filter_map(|fragment| fragment.get("plain_text").and_then(Value::as_str))
                .collect();
            non_empty(text)
        }
        "select" | "status" => {
            inner.get("name").and_then(Value::as_str).and_then(|s| non_empty(s.to_string()))
        }
        "multi_select" => {
            let names: Vec<&str> = inner
                .as_array()?
                .iter()
                .filter_map(|option| option.get("name").and_then(Value::as_str))
                .collect();
            non_empty(names.join(", "))
        }
        "date" => inner.get("start").and_then(Value::as_str).map(str::to_string),
        "formula" => property_content(inner),
        _ => match inner {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => raw_text(inner),
            _ => None,
        },
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
