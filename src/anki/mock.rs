use std::{
    collections::{
        BTreeMap,
        HashSet,
    },
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::State,
    routing::post,
    Json,
    Router,
};
use serde_json::{
    json,
    Map,
    Value,
};
use tokio::{
    net::TcpListener,
    sync::Mutex,
};

use crate::core::{
    models::WordRecord,
    schema::Schema,
};

const CELL_ID: &str = "cell id";

#[derive(Debug, Clone)]
pub struct MockNote {
    pub id: u64,
    pub deck: String,
    pub fields: BTreeMap<String, String>,
}

impl MockNote {
    pub fn cell_id(&self) -> &str {
        self.fields.get(CELL_ID).map(String::as_str).unwrap_or_default()
    }
}

/// AnkiConnect stand-in holding a collection in memory.
#[derive(Debug, Default)]
pub struct MockAnki {
    pub notes: Vec<MockNote>,
    pub decks: Vec<(String, u64)>,
    pub calls: Vec<String>,
    /// `addNotes` answers with an error instead of per-note ids.
    pub reject_bulk: bool,
    /// With `reject_bulk`, the notes are created before the error is reported.
    pub bulk_adds_before_rejecting: bool,
    /// Cell ids whose `addNote` never answers.
    pub stalled: HashSet<String>,
    next_id: u64,
}

pub type SharedAnki = Arc<Mutex<MockAnki>>;

impl MockAnki {
    pub fn add_deck(&mut self, name: &str) -> u64 {
        self.next_id += 1;
        self.decks.push((name.to_string(), self.next_id));
        self.next_id
    }

    /// Stores `record` the way the sync writes it, with the default labels.
    pub fn add_word(&mut self, deck: &str, record: &WordRecord) -> u64 {
        let schema = Schema::default();
        let fields = schema.columns().into_iter().map(str::to_string);
        self.insert(deck, fields.zip(record.values()).collect())
    }

    pub fn cell_ids(&self) -> Vec<&str> {
        self.notes.iter().map(MockNote::cell_id).collect()
    }

    fn insert(&mut self, deck: &str, fields: BTreeMap<String, String>) -> u64 {
        self.next_id += 1;
        self.notes.push(MockNote { id: self.next_id, deck: deck.to_string(), fields });
        self.next_id
    }

    fn insert_payload(&mut self, note: &Value) -> u64 {
        let deck = note["deckName"].as_str().unwrap_or_default().to_string();
        self.insert(&deck, text_map(&note["fields"]))
    }

    fn respond(&mut self, action: &str, params: &Value) -> Value {
        match action {
            "version" => ok(json!(6)),
            "deckNamesAndIds" => {
                let decks: Map<String, Value> =
                    self.decks.iter().map(|(name, id)| (name.clone(), json!(id))).collect();
                ok(Value::Object(decks))
            }
            "findNotes" => {
                let query = params["query"].as_str().unwrap_or_default();
                let ids: Vec<u64> = match queried_cell_id(query) {
                    Some(cell_id) => self
                        .notes
                        .iter()
                        .filter(|note| note.cell_id() == cell_id)
                        .map(|note| note.id)
                        .collect(),
                    None => self.notes.iter().map(|note| note.id).collect(),
                };
                ok(json!(ids))
            }
            "notesInfo" => {
                let wanted = ids(&params["notes"]);
                let notes: Vec<Value> = self
                    .notes
                    .iter()
                    .filter(|note| wanted.contains(&note.id))
                    .map(|note| {
                        let fields: Map<String, Value> = note
                            .fields
                            .iter()
                            .map(|(name, value)| {
                                (name.clone(), json!({ "value": value, "order": 0 }))
                            })
                            .collect();
                        json!({
                            "noteId": note.id,
                            "modelName": "Notion Vocabulary",
                            "tags": [],
                            "fields": fields,
                            "cards": [note.id]
                        })
                    })
                    .collect();
                ok(json!(notes))
            }
            "cardsInfo" => {
                let wanted = ids(&params["cards"]);
                let cards: Vec<Value> = self
                    .notes
                    .iter()
                    .filter(|note| wanted.contains(&note.id))
                    .map(|note| {
                        json!({ "cardId": note.id, "deckName": note.deck, "note": note.id })
                    })
                    .collect();
                ok(json!(cards))
            }
            "deleteNotes" => {
                let doomed = ids(&params["notes"]);
                self.notes.retain(|note| !doomed.contains(&note.id));
                ok(Value::Null)
            }
            "updateNoteFields" => {
                let id = params["note"]["id"].as_u64().unwrap_or_default();
                let fields = text_map(&params["note"]["fields"]);
                match self.notes.iter_mut().find(|note| note.id == id) {
                    Some(note) => {
                        note.fields.extend(fields);
                        ok(Value::Null)
                    }
                    None => failed("note was not found"),
                }
            }
            "addNotes" => {
                let notes = params["notes"].as_array().cloned().unwrap_or_default();
                if self.reject_bulk {
                    if self.bulk_adds_before_rejecting {
                        for note in &notes {
                            self.insert_payload(note);
                        }
                    }
                    return failed("cannot create note because it is a duplicate");
                }
                let ids: Vec<u64> = notes.iter().map(|note| self.insert_payload(note)).collect();
                ok(json!(ids))
            }
            "addNote" => ok(json!(self.insert_payload(&params["note"]))),
            "createDeck" => {
                let name = params["deck"].as_str().unwrap_or_default().to_string();
                ok(json!(self.add_deck(&name)))
            }
            other => failed(&format!("unsupported action {}", other)),
        }
    }
}

/// Serves `anki` on a free local port, returning its URL.
pub async fn serve(anki: MockAnki) -> (String, SharedAnki) {
    let shared = Arc::new(Mutex::new(anki));
    let app = Router::new().route("/", post(handle)).with_state(shared.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (url, shared)
}

async fn handle(State(anki): State<SharedAnki>, Json(body): Json<Value>) -> Json<Value> {
    let action = body["action"].as_str().unwrap_or_default().to_string();
    let params = body.get("params").cloned().unwrap_or(Value::Null);

    let cell_id = params["note"]["fields"][CELL_ID].as_str().unwrap_or_default().to_string();
    let stall = {
        let mut anki = anki.lock().await;
        if action == "addNote" {
            anki.calls.push(format!("addNote:{}", cell_id));
            anki.stalled.contains(&cell_id)
        } else {
            anki.calls.push(action.clone());
            false
        }
    };
    if stall {
        tokio::time::sleep(Duration::from_secs(30)).await;
        return Json(failed("stalled"));
    }

    let reply = anki.lock().await.respond(&action, &params);
    Json(reply)
}

fn ok(result: Value) -> Value {
    json!({ "result": result, "error": null })
}

fn failed(error: &str) -> Value {
    json!({ "result": null, "error": error })
}

fn ids(value: &Value) -> Vec<u64> {
    value.as_array().map(|ids| ids.iter().filter_map(Value::as_u64).collect()).unwrap_or_default()
}

fn text_map(value: &Value) -> BTreeMap<String, String> {
    value
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .map(|(name, v)| (name.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Reads the value of a `"cell id:<value>"` term out of a search query.
fn queried_cell_id(query: &str) -> Option<String> {
    let rest = query.split(&format!("\"{}:", CELL_ID)).nth(1)?;
    let mut value = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.extend(chars.next()),
            '"' => break,
            c => value.push(c),
        }
    }
    Some(value)
}
