use std::{
    collections::HashSet,
    time::Duration,
};

use async_trait::async_trait;
use chrono::{
    DateTime,
    TimeZone,
    Utc,
};

use super::{
    models::{
        Group,
        TargetSnapshot,
        TargetWord,
        WordRecord,
    },
    store::{
        BatchOutcome,
        TargetStore,
    },
    SyncError,
};

pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, day, 12, 0, 0).unwrap()
}

pub fn word(term: &str, cell_id: &str, modified_on: u32) -> WordRecord {
    let mut record = WordRecord::new(term, cell_id, day(modified_on));
    record.translation = Some(format!("{}-en", term));
    record
}

/// In-memory course with scriptable failures.
#[derive(Debug, Default)]
pub struct FakeStore {
    pub words: Vec<TargetWord>,
    pub groups: Vec<Group>,
    /// Cell ids whose mutation reports a timeout.
    pub timeouts: HashSet<String>,
    /// Cell ids whose mutation fails outright.
    pub failing: HashSet<String>,
    pub refuse_groups: bool,
    pub unreachable: bool,
    /// Makes `add_batch` hang longer than any test timeout.
    pub stall_batches: bool,
    pub calls: Vec<String>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `records` in one level per chunk of `capacity`.
    pub fn seeded(records: Vec<WordRecord>, capacity: usize) -> Self {
        let mut store = Self::new();
        for chunk in records.chunks(capacity.max(1)) {
            let group = store.push_group();
            for record in chunk {
                store.place(record.clone(), group);
            }
        }
        store
    }

    pub fn push_group(&mut self) -> usize {
        let number = self.groups.len() + 1;
        self.groups.push(Group {
            id: number.to_string(),
            name: format!("Level {}", number),
            occupancy: 0,
        });
        self.groups.len() - 1
    }

    pub fn place(&mut self, record: WordRecord, group: usize) {
        self.groups[group].occupancy += 1;
        self.words.push(TargetWord { record, level: self.groups[group].name.clone() });
    }

    pub fn cell_ids(&self) -> Vec<&str> {
        self.words.iter().map(|w| w.record.cell_id.as_str()).collect()
    }

    fn scripted_failure(&self, cell_id: &str, action: &str) -> Result<(), SyncError> {
        if self.timeouts.contains(cell_id) {
            return Err(SyncError::Timeout {
                action: action.to_string(),
                limit: Duration::from_secs(5),
            });
        }
        if self.failing.contains(cell_id) {
            return Err(SyncError::Custom(format!("{} rejected {}", action, cell_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl TargetStore for FakeStore {
    async fn fetch_all(&mut self) -> Result<TargetSnapshot, SyncError> {
        self.calls.push("fetch_all".to_string());
        if self.unreachable {
            return Err(SyncError::Anki("connection refused".to_string()));
        }
        Ok(TargetSnapshot { words: self.words.clone(), groups: self.groups.clone() })
    }

    async fn delete(&mut self, cell_id: &str) -> Result<(), SyncError> {
        self.calls.push(format!("delete:{}", cell_id));
        self.scripted_failure(cell_id, "delete")?;

        let before = self.words.len();
        let mut removed_from = Vec::new();
        self.words.retain(|w| {
            let keep = w.record.cell_id != cell_id;
            if !keep {
                removed_from.push(w.level.clone());
            }
            keep
        });
        for level in removed_from {
            if let Some(group) = self.groups.iter_mut().find(|g| g.name == level) {
                group.occupancy -= 1;
            }
        }

        if self.words.len() == before {
            return Err(SyncError::NotFound(cell_id.to_string()));
        }
        Ok(())
    }

    async fn update(&mut self, record: &WordRecord) -> Result<(), SyncError> {
        self.calls.push(format!("update:{}", record.cell_id));
        self.scripted_failure(&record.cell_id, "update")?;

        let mut found = false;
        for existing in self.words.iter_mut().filter(|w| w.record.cell_id == record.cell_id) {
            existing.record = record.clone();
            found = true;
        }
        if !found {
            return Err(SyncError::NotFound(record.cell_id.clone()));
        }
        Ok(())
    }

    async fn add_batch(
        &mut self,
        records: &[WordRecord],
        group: &Group,
    ) -> Result<BatchOutcome, SyncError> {
        self.calls.push(format!("add_batch:{}:{}", group.id, records.len()));
        if self.stall_batches {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }

        let index = self
            .groups
            .iter()
            .position(|g| g.id == group.id)
            .ok_or_else(|| SyncError::Custom(format!("unknown level {}", group.id)))?;

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let outcome = self.scripted_failure(&record.cell_id, "add").and_then(|_| {
                if self.words.iter().any(|w| w.record.cell_id == record.cell_id) {
                    Err(SyncError::Custom("already in the course".to_string()))
                } else {
                    Ok(())
                }
            });
            if outcome.is_ok() {
                self.place(record.clone(), index);
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn create_group(&mut self) -> Result<Group, SyncError> {
        self.calls.push("create_group".to_string());
        if self.refuse_groups {
            return Err(SyncError::Anki("no level template in this course".to_string()));
        }
        let index = self.push_group();
        Ok(self.groups[index].clone())
    }

    async fn save_changes(&mut self) -> Result<(), SyncError> {
        self.calls.push("save_changes".to_string());
        Ok(())
    }
}
