use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    time::Duration,
};

use reqwest::{
    header::HeaderMap,
    Client,
};
use serde::Deserialize;
use serde_json::{
    json,
    Map,
    Value,
};
use tokio::time::sleep;

use super::types::{
    ApiResponse,
    Card,
    Deck,
    NewNote,
    Note,
};
use crate::core::{
    http::{
        ensure_success,
        http_client,
    },
    SyncError,
};

/// AnkiConnect speaks version 6 of its protocol on a single endpoint.
pub struct AnkiClient {
    client: Client,
    url: String,
}

impl AnkiClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self { client: http_client(timeout, HeaderMap::new())?, url: url.to_string() })
    }

    async fn make_request<T: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        params: Option<Value>,
    ) -> Result<ApiResponse<T>, SyncError> {
        let mut body = Map::new();
        body.insert("action".to_string(), Value::String(action.to_string()));
        body.insert("version".to_string(), Value::Number((6).into()));

        if let Some(params) = params {
            body.insert("params".to_string(), params);
        }

        let response = self.client.post(&self.url).json(&body).send().await?;
        let response: ApiResponse<T> = ensure_success(response).await?.json().await?;

        Ok(response)
    }

    pub async fn get_version(&self) -> Result<u32, SyncError> {
        let response: ApiResponse<u32> = self.make_request("version", None).await?;
        response.into_result("version")
    }

    /// Polls until AnkiConnect answers, since Anki may still be starting.
    pub async fn wait_awake(&self, wait: Duration, max_attempts: u32) -> Result<u32, SyncError> {
        let mut last_error = None;
        for attempt in 1..=max_attempts {
            match self.get_version().await {
                Ok(version) => {
                    log::info!("AnkiConnect is online. Version: {}", version);
                    return Ok(version);
                }
                Err(err) => {
                    log::warn!(
                        "AnkiConnect attempt {} of {} failed. Retrying in {:?}... Error: {}",
                        attempt,
                        max_attempts,
                        wait,
                        err
                    );
                    last_error = Some(err);
                    if attempt < max_attempts {
                        sleep(wait).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| SyncError::Anki("AnkiConnect is not reachable".into())))
    }

    pub async fn get_deck_ids(&self) -> Result<Vec<Deck>, SyncError> {
        let response: ApiResponse<HashMap<String, u64>> =
            self.make_request("deckNamesAndIds", None).await?;

        Ok(response
            .into_result("deckNamesAndIds")?
            .into_iter()
            .map(|(name, id)| Deck { name, id })
            .collect())
    }

    pub async fn get_note_ids(&self, query: &str) -> Result<Vec<u64>, SyncError> {
        let params = json!({ "query": query });
        let response: ApiResponse<Vec<u64>> = self.make_request("findNotes", Some(params)).await?;
        Ok(response.check("findNotes")?.unwrap_or_default())
    }

    pub async fn get_notes(&self, note_ids: &[u64]) -> Result<Vec<Note>, SyncError> {
        if note_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "notes": note_ids });
        let response: ApiResponse<Vec<Note>> = self.make_request("notesInfo", Some(params)).await?;
        Ok(response.check("notesInfo")?.unwrap_or_default())
    }

    pub async fn get_cards(&self, card_ids: &[u64]) -> Result<Vec<Card>, SyncError> {
        if card_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = json!({ "cards": card_ids });
        let response: ApiResponse<Vec<Card>> = self.make_request("cardsInfo", Some(params)).await?;
        Ok(response.check("cardsInfo")?.unwrap_or_default())
    }

    pub async fn create_deck(&self, name: &str) -> Result<u64, SyncError> {
        let params = json!({ "deck": name });
        let response: ApiResponse<u64> = self.make_request("createDeck", Some(params)).await?;
        response.into_result("createDeck")
    }

    pub async fn delete_notes(&self, note_ids: &[u64]) -> Result<(), SyncError> {
        let params = json!({ "notes": note_ids });
        let response: ApiResponse<Value> = self.make_request("deleteNotes", Some(params)).await?;
        response.check("deleteNotes").map(|_| ())
    }

    pub async fn update_note_fields(
        &self,
        note_id: u64,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), SyncError> {
        let params = json!({ "note": { "id": note_id, "fields": fields } });
        let response: ApiResponse<Value> =
            self.make_request("updateNoteFields", Some(params)).await?;
        response.check("updateNoteFields").map(|_| ())
    }

    /// Returned unchecked: a rejected batch is retried note by note by the caller.
    pub async fn add_notes(
        &self,
        notes: &[NewNote],
    ) -> Result<ApiResponse<Vec<Option<u64>>>, SyncError> {
        let params = json!({ "notes": notes });
        self.make_request("addNotes", Some(params)).await
    }

    pub async fn add_note(&self, note: &NewNote) -> Result<u64, SyncError> {
        let params = json!({ "note": note });
        let response: ApiResponse<u64> = self.make_request("addNote", Some(params)).await?;
        response.into_result("addNote")
    }
}
