use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    time::{
        Duration,
        Instant,
    },
};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::{
    core::{
        models::{
            Field,
            Group,
            TargetSnapshot,
            TargetWord,
            WordRecord,
        },
        schema::{
            RawRecord,
            Schema,
        },
        store::{
            bounded,
            BatchOutcome,
            TargetStore,
        },
        SyncError,
    },
    settings::SyncSettings,
};

pub mod api;
pub mod types;

#[cfg(test)]
mod mock;

use api::AnkiClient;
use types::{
    Deck,
    NewNote,
    Note,
    NoteOptions,
};

/// The course as an Anki deck tree: one sub-deck per level, numbered from 1.
pub struct AnkiStore {
    api: AnkiClient,
    schema: Schema,
    course_deck: String,
    level_name: String,
    note_type: String,
    next_level: u32,
    /// Bound on each single-note retry after a rejected bulk add.
    mutation_timeout: Duration,
}

impl AnkiStore {
    pub fn new(settings: &SyncSettings) -> Result<Self, SyncError> {
        Ok(Self {
            api: AnkiClient::new(&settings.anki_connect_url, settings.request_timeout())?,
            schema: settings.schema.clone(),
            course_deck: settings.course_deck.clone(),
            level_name: settings.level_name.clone(),
            note_type: settings.note_type.clone(),
            next_level: 1,
            mutation_timeout: settings.mutation_timeout(),
        })
    }

    pub fn api(&self) -> &AnkiClient {
        &self.api
    }

    fn level_deck(&self, number: u32) -> String {
        format!("{}::{} {}", self.course_deck, self.level_name, number)
    }

    fn level_pattern(&self) -> Result<Regex, SyncError> {
        level_pattern(&self.course_deck, &self.level_name)
    }

    fn note_fields(&self, record: &WordRecord) -> BTreeMap<String, String> {
        self.schema.columns().into_iter().map(str::to_string).zip(record.values()).collect()
    }

    fn new_note(&self, record: &WordRecord, deck_name: &str) -> NewNote {
        NewNote {
            deck_name: deck_name.to_string(),
            model_name: self.note_type.clone(),
            fields: self.note_fields(record),
            tags: note_tags(record.tags.as_deref()),
            options: NoteOptions { allow_duplicate: true },
        }
    }

    async fn find_cell_id(&self, cell_id: &str) -> Result<Vec<u64>, SyncError> {
        let query = format!(
            "{} {}",
            search_term("deck", &self.course_deck),
            search_term(self.schema.label(Field::CellId), cell_id)
        );
        self.api.get_note_ids(&query).await
    }

    async fn notes_with_cell_id(&self, cell_id: &str) -> Result<Vec<u64>, SyncError> {
        let ids = self.find_cell_id(cell_id).await?;
        if ids.is_empty() {
            return Err(SyncError::NotFound(cell_id.to_string()));
        }
        Ok(ids)
    }

    /// Adds one note unless the course already holds its cell id, which happens when
    /// AnkiConnect created part of a batch before rejecting it.
    async fn add_missing(&self, note: &NewNote, cell_id: &str) -> Result<(), SyncError> {
        if !self.find_cell_id(cell_id).await?.is_empty() {
            log::debug!("Note {} is already on the course", cell_id);
            return Ok(());
        }
        self.api.add_note(note).await.map(|_| ())
    }
}

#[async_trait]
impl TargetStore for AnkiStore {
    async fn fetch_all(&mut self) -> Result<TargetSnapshot, SyncError> {
        let start = Instant::now();
        let pattern = self.level_pattern()?;

        let mut levels: Vec<(u32, Deck)> = self
            .api
            .get_deck_ids()
            .await?
            .into_iter()
            .filter_map(|deck| level_number(&pattern, &deck.name).map(|n| (n, deck)))
            .collect();
        levels.sort_by_key(|(number, _)| *number);
        self.next_level = levels.last().map_or(1, |(number, _)| number + 1);

        let note_ids = self.api.get_note_ids(&search_term("deck", &self.course_deck)).await?;
        let notes = self.api.get_notes(&note_ids).await?;
        let card_ids: Vec<u64> = notes.iter().flat_map(|note| note.cards.iter().copied()).collect();
        let deck_of_note: HashMap<u64, String> = self
            .api
            .get_cards(&card_ids)
            .await?
            .into_iter()
            .map(|card| (card.note, card.deck_name))
            .collect();

        let mut occupancy: HashMap<&str, usize> = HashMap::new();
        let mut words = Vec::with_capacity(notes.len());
        for note in &notes {
            let Some(level) = deck_of_note.get(&note.note_id) else {
                log::warn!("Note {} has no card, skipping it", note.note_id);
                continue;
            };
            *occupancy.entry(level.as_str()).or_default() += 1;

            match self.schema.parse_row(&note_to_raw(note)) {
                Some(record) => words.push(TargetWord { record, level: level.clone() }),
                None => log::warn!("Note {} does not carry a syncable word", note.note_id),
            }
        }

        let groups = levels
            .into_iter()
            .map(|(_, deck)| Group {
                occupancy: occupancy.get(deck.name.as_str()).copied().unwrap_or(0),
                id: deck.id.to_string(),
                name: deck.name,
            })
            .collect();

        log::debug!("Anki fetch took {:?}", start.elapsed());
        Ok(TargetSnapshot { words, groups })
    }

    async fn delete(&mut self, cell_id: &str) -> Result<(), SyncError> {
        let ids = self.notes_with_cell_id(cell_id).await?;
        self.api.delete_notes(&ids).await
    }

    async fn update(&mut self, record: &WordRecord) -> Result<(), SyncError> {
        let ids = self.notes_with_cell_id(&record.cell_id).await?;
        let fields = self.note_fields(record);
        for id in ids {
            self.api.update_note_fields(id, &fields).await?;
        }
        Ok(())
    }

    async fn add_batch(
        &mut self,
        records: &[WordRecord],
        group: &Group,
    ) -> Result<BatchOutcome, SyncError> {
        let notes: Vec<NewNote> =
            records.iter().map(|record| self.new_note(record, &group.name)).collect();

        let response = self.api.add_notes(&notes).await?;
        match (response.error, response.result) {
            (None, Some(ids)) => Ok(ids
                .into_iter()
                .map(|id| match id {
                    Some(_) => Ok(()),
                    None => Err(SyncError::Anki("Anki refused the note".to_string())),
                })
                .collect()),
            (error, _) => {
                log::warn!(
                    "addNotes rejected the batch ({}), adding one note at a time",
                    error.unwrap_or_default()
                );
                let mut outcome = Vec::with_capacity(notes.len());
                for (note, record) in notes.iter().zip(records) {
                    let added = self.add_missing(note, &record.cell_id);
                    outcome.push(bounded(self.mutation_timeout, "add", added).await);
                }
                Ok(outcome)
            }
        }
    }

    async fn create_group(&mut self) -> Result<Group, SyncError> {
        let name = self.level_deck(self.next_level);
        let id = self.api.create_deck(&name).await?;
        self.next_level += 1;
        log::info!("Created level deck '{}'", name);
        Ok(Group { id: id.to_string(), name, occupancy: 0 })
    }
}

/// Matches the level sub-decks of a course, capturing the level number.
pub fn level_pattern(course_deck: &str, level_name: &str) -> Result<Regex, SyncError> {
    let pattern =
        format!(r"^{}::{}\s+(\d+)$", regex::escape(course_deck), regex::escape(level_name));
    Regex::new(&pattern).map_err(|e| SyncError::Config(format!("bad level deck pattern: {e}")))
}

pub fn level_number(pattern: &Regex, deck_name: &str) -> Option<u32> {
    pattern.captures(deck_name)?.get(1)?.as_str().parse().ok()
}

/// Quotes a `field:value` search so spaces and wildcards are taken literally.
pub fn search_term(field: &str, value: &str) -> String {
    let escape = |text: &str, specials: &[char]| {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            if specials.contains(&c) {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    };
    format!(
        "\"{}:{}\"",
        escape(field, &['\\', '"', ':', '*', '_']),
        escape(value, &['\\', '"', '*', '_'])
    )
}

/// Anki tags cannot hold spaces.
fn note_tags(tags: Option<&str>) -> Vec<String> {
    tags.unwrap_or_default()
        .split(',')
        .map(|tag| tag.trim().replace(' ', "_"))
        .filter(|tag| !tag.is_empty())
        .collect()
}

pub fn note_to_raw(note: &Note) -> RawRecord {
    note.fields
        .iter()
        .map(|(name, field)| (name.clone(), Value::String(field.value.clone())))
        .collect()
}
