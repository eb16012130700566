use std::collections::BTreeMap;

use chrono::{
    DateTime,
    NaiveDate,
    NaiveDateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};

use super::{
    models::{
        Field,
        WordRecord,
    },
    SyncError,
};

/// A record as it arrives from either store: column label to loosely typed value.
pub type RawRecord = Map<String, Value>;

pub const DEFAULT_REQUIRED: [Field; 4] =
    [Field::Term, Field::Translation, Field::DateModified, Field::CellId];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub labels: BTreeMap<Field, String>,
    #[serde(default = "default_required")]
    pub required: Vec<Field>,
}

fn default_required() -> Vec<Field> {
    DEFAULT_REQUIRED.to_vec()
}

impl Default for Schema {
    fn default() -> Self {
        Self { labels: BTreeMap::new(), required: default_required() }
    }
}

impl Schema {
    pub fn label(&self, field: Field) -> &str {
        self.labels.get(&field).map(String::as_str).unwrap_or_else(|| field.default_label())
    }

    /// Labels in canonical column order.
    pub fn columns(&self) -> Vec<&str> {
        Field::ALL.iter().map(|field| self.label(*field)).collect()
    }

    pub fn is_required(&self, field: Field) -> bool {
        // term, timestamp and cell id drive every comparison and can never be optional
        matches!(field, Field::Term | Field::DateModified | Field::CellId)
            || self.required.contains(&field)
    }

    /// Validates either a single record (JSON object) or a collection of records.
    pub fn validate(&self, input: &Value) -> Result<Vec<WordRecord>, SyncError> {
        match input {
            Value::Object(row) => Ok(self.parse_row(row).into_iter().collect()),
            Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::Object(row) => rows.push(row),
                        other => {
                            return Err(SyncError::InvalidInputType(format!(
                                "item {} is {}, expected a record",
                                index,
                                type_name(other)
                            )))
                        }
                    }
                }
                Ok(rows.into_iter().filter_map(|row| self.parse_row(row)).collect())
            }
            other => Err(SyncError::InvalidInputType(format!(
                "got {}, expected a record or a list of records",
                type_name(other)
            ))),
        }
    }

    /// Keeps the rows carrying every required field, in input order.
    pub fn validate_rows(&self, rows: &[RawRecord]) -> Vec<WordRecord> {
        rows.iter().filter_map(|row| self.parse_row(row)).collect()
    }

    /// Projects a raw row onto the canonical fields. Unknown columns are ignored.
    pub fn parse_row(&self, row: &RawRecord) -> Option<WordRecord> {
        let text = |field: Field| row.get(self.label(field)).and_then(raw_text);

        for field in Field::ALL {
            if self.is_required(field) && text(field).is_none() {
                log::debug!(
                    "Dropping record {:?}: missing '{}'",
                    text(Field::Term),
                    self.label(field)
                );
                return None;
            }
        }

        let raw_date = text(Field::DateModified)?;
        let Some(date_modified) = parse_timestamp(&raw_date) else {
            log::warn!(
                "Dropping record {:?}: unreadable timestamp '{}'",
                text(Field::Term),
                raw_date
            );
            return None;
        };

        Some(WordRecord {
            term: text(Field::Term)?,
            translation: text(Field::Translation),
            definition: text(Field::Definition),
            example: text(Field::Example),
            example_translation: text(Field::ExampleTranslation),
            part_of_speech: text(Field::PartOfSpeech),
            gender: text(Field::Gender),
            tags: text(Field::Tags),
            model: text(Field::Model),
            date_modified,
            cell_id: text(Field::CellId)?,
        })
    }

    /// Inverse of `parse_row`, keyed by this schema's labels.
    pub fn to_raw(&self, record: &WordRecord) -> RawRecord {
        Field::ALL
            .iter()
            .map(|field| {
                let value = record
                    .get(*field)
                    .map(|v| Value::String(v.into_owned()))
                    .unwrap_or(Value::Null);
                (self.label(*field).to_string(), value)
            })
            .collect()
    }
}

/// Flattens a loosely typed cell into text. Blank text counts as missing.
pub fn raw_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(raw_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a record",
    }
}
