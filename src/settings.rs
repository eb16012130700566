use std::{
    path::PathBuf,
    time::Duration,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    core::{
        schema::Schema,
        SyncError,
    },
    persistence::{
        get_logs_dir,
        load_json_or_default,
    },
};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    #[serde(skip_serializing)]
    pub notion_secret: String,
    pub notion_database_id: String,
    pub notion_version: String,
    pub anki_connect_url: String,
    /// Deck holding the course. Levels are its sub-decks.
    pub course_deck: String,
    /// Display name of a level, numbered after it ("Level 3").
    pub level_name: String,
    pub note_type: String,
    pub level_word_limit: usize,
    pub request_timeout_secs: u64,
    pub mutation_timeout_ms: u64,
    pub log_dir: Option<PathBuf>,
    pub schema: Schema,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            notion_secret: String::new(),
            notion_database_id: String::new(),
            notion_version: "2022-06-28".to_string(),
            anki_connect_url: "http://localhost:8765/".to_string(),
            course_deck: "Notion Vocabulary".to_string(),
            level_name: "Level".to_string(),
            note_type: "Notion Vocabulary".to_string(),
            level_word_limit: 20,
            request_timeout_secs: 10,
            mutation_timeout_ms: 15_000,
            log_dir: None,
            schema: Schema::default(),
        }
    }
}

impl SyncSettings {
    /// Settings file from the app data directory, overridden by the environment.
    pub fn load() -> Result<Self, SyncError> {
        let mut settings: SyncSettings = load_json_or_default(SETTINGS_FILE);
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), SyncError> {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(value) = text("NOTION_SECRET") {
            self.notion_secret = value;
        }
        if let Some(value) = text("NOTION_DATABASE_ID") {
            self.notion_database_id = value;
        }
        if let Some(value) = text("NOTION_VERSION") {
            self.notion_version = value;
        }
        if let Some(value) = text("ANKI_CONNECT_URL") {
            self.anki_connect_url = value;
        }
        if let Some(value) = text("COURSE_DECK") {
            self.course_deck = value;
        }
        if let Some(value) = text("LEVEL_NAME") {
            self.level_name = value;
        }
        if let Some(value) = text("NOTE_TYPE") {
            self.note_type = value;
        }
        if let Some(value) = text("LEVEL_WORD_LIMIT") {
            self.level_word_limit = parse_number("LEVEL_WORD_LIMIT", &value)?;
        }
        if let Some(value) = text("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = text("MUTATION_TIMEOUT_MS") {
            self.mutation_timeout_ms = parse_number("MUTATION_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = text("SYNC_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(value));
        }

        Ok(())
    }

    /// Checks what every run needs.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.level_word_limit == 0 {
            return Err(SyncError::Config("LEVEL_WORD_LIMIT must be at least 1".to_string()));
        }
        if self.mutation_timeout_ms == 0 || self.request_timeout_secs == 0 {
            return Err(SyncError::Config("timeouts must be greater than zero".to_string()));
        }
        if self.mutation_timeout() <= self.request_timeout() {
            return Err(SyncError::Config(
                "MUTATION_TIMEOUT_MS must be longer than REQUEST_TIMEOUT_SECS".to_string(),
            ));
        }
        if self.course_deck.is_empty() || self.level_name.is_empty() {
            return Err(SyncError::Config("course deck and level name cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Checks what talking to Notion needs on top of `validate`.
    pub fn require_credentials(&self) -> Result<(), SyncError> {
        self.validate()?;
        if self.notion_secret.is_empty() {
            return Err(SyncError::Config("NOTION_SECRET is not set".to_string()));
        }
        if self.notion_database_id.is_empty() {
            return Err(SyncError::Config("NOTION_DATABASE_ID is not set".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_millis(self.mutation_timeout_ms)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(get_logs_dir)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SyncError> {
    value
        .parse()
        .map_err(|_| SyncError::Config(format!("{} must be a whole number, got '{}'", key, value)))
}
