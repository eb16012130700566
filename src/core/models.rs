use std::borrow::Cow;

use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Term,
    Translation,
    Definition,
    Example,
    ExampleTranslation,
    PartOfSpeech,
    Gender,
    Tags,
    Model,
    DateModified,
    CellId,
}

impl Field {
    /// Canonical column order. The target side inserts rows positionally in this order.
    pub const ALL: [Field; 11] = [
        Field::Term,
        Field::Translation,
        Field::Definition,
        Field::Example,
        Field::ExampleTranslation,
        Field::PartOfSpeech,
        Field::Gender,
        Field::Tags,
        Field::Model,
        Field::DateModified,
        Field::CellId,
    ];

    pub fn default_label(&self) -> &'static str {
        match self {
            Field::Term => "French",
            Field::Translation => "English",
            Field::Definition => "Définition",
            Field::Example => "Example",
            Field::ExampleTranslation => "Example Translation",
            Field::PartOfSpeech => "Part of Speech",
            Field::Gender => "Gender",
            Field::Tags => "Tags",
            Field::Model => "Model",
            Field::DateModified => "date modified",
            Field::CellId => "cell id",
        }
    }
}

/// One vocabulary entry as the knowledge base describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub term: String,
    pub translation: Option<String>,
    pub definition: Option<String>,
    pub example: Option<String>,
    pub example_translation: Option<String>,
    pub part_of_speech: Option<String>,
    pub gender: Option<String>,
    pub tags: Option<String>,
    pub model: Option<String>,
    pub date_modified: DateTime<Utc>,
    pub cell_id: String,
}

impl WordRecord {
    pub fn new(term: &str, cell_id: &str, date_modified: DateTime<Utc>) -> Self {
        Self {
            term: term.to_string(),
            translation: None,
            definition: None,
            example: None,
            example_translation: None,
            part_of_speech: None,
            gender: None,
            tags: None,
            model: None,
            date_modified,
            cell_id: cell_id.to_string(),
        }
    }

    pub fn get(&self, field: Field) -> Option<Cow<'_, str>> {
        fn text(value: &Option<String>) -> Option<Cow<'_, str>> {
            value.as_deref().map(Cow::Borrowed)
        }

        match field {
            Field::Term => Some(Cow::Borrowed(&self.term)),
            Field::Translation => text(&self.translation),
            Field::Definition => text(&self.definition),
            Field::Example => text(&self.example),
            Field::ExampleTranslation => text(&self.example_translation),
            Field::PartOfSpeech => text(&self.part_of_speech),
            Field::Gender => text(&self.gender),
            Field::Tags => text(&self.tags),
            Field::Model => text(&self.model),
            Field::DateModified => Some(Cow::Owned(format_timestamp(&self.date_modified))),
            Field::CellId => Some(Cow::Borrowed(&self.cell_id)),
        }
    }

    /// Positional serialization in canonical order, missing values as empty strings.
    pub fn values(&self) -> Vec<String> {
        Field::ALL
            .iter()
            .map(|field| self.get(*field).map(|v| v.into_owned()).unwrap_or_default())
            .collect()
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A record as found on the target, tagged with the level it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetWord {
    pub record: WordRecord,
    pub level: String,
}

/// Capacity-bounded container of words on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub occupancy: usize,
}

impl Group {
    pub fn remaining(&self, capacity: usize) -> usize {
        capacity.saturating_sub(self.occupancy)
    }
}

/// Everything currently on the target, with groups in their display order.
#[derive(Debug, Clone, Default)]
pub struct TargetSnapshot {
    pub words: Vec<TargetWord>,
    pub groups: Vec<Group>,
}

impl TargetSnapshot {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
