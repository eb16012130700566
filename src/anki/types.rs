use std::collections::{
    BTreeMap,
    HashMap,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::core::SyncError;

#[derive(Debug, Clone)]
pub struct Deck {
    pub name: String,
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NoteField {
    pub value: String,
    pub order: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub note_id: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub fields: HashMap<String, NoteField>,
    pub model_name: String,
    #[serde(default)]
    pub cards: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub card_id: u64,
    pub deck_name: String,
    pub note: u64,
}

/// Payload of `addNote`/`addNotes`.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub deck_name: String,
    pub model_name: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub options: NoteOptions,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteOptions {
    pub allow_duplicate: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Fails on a reported error, tolerates a null result.
    pub fn check(self, action: &str) -> Result<Option<T>, SyncError> {
        match self.error {
            Some(error) => Err(SyncError::Anki(format!("{}: {}", action, error))),
            None => Ok(self.result),
        }
    }

    pub fn into_result(self, action: &str) -> Result<T, SyncError> {
        self.check(action)?
            .ok_or_else(|| SyncError::Anki(format!("{}: no result returned", action)))
    }
}
