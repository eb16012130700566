use std::{
    fmt,
    fs::{
        self,
        File,
        OpenOptions,
    },
    io::ErrorKind,
    path::{
        Path,
        PathBuf,
    },
};

use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;

use super::SyncError;

const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    DuplicateDrop,
    Delete,
    Update,
    Add,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::DuplicateDrop => "duplicate_drop",
            Action::Delete => "delete",
            Action::Update => "update",
            Action::Add => "add",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            Action::DuplicateDrop => "Dropped",
            Action::Delete => "Deleted",
            Action::Update => "Updated",
            Action::Add => "Added",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one action on one word. Field order is the column order on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRow {
    pub term: String,
    #[serde(rename = "cell id")]
    pub cell_id: String,
    pub action: Action,
    pub success: bool,
    pub error: Option<String>,
}

impl LedgerRow {
    pub fn succeeded(term: &str, cell_id: &str, action: Action) -> Self {
        Self {
            term: term.to_string(),
            cell_id: cell_id.to_string(),
            action,
            success: true,
            error: None,
        }
    }

    pub fn failed(term: &str, cell_id: &str, action: Action, error: impl Into<String>) -> Self {
        Self {
            term: term.to_string(),
            cell_id: cell_id.to_string(),
            action,
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn from_outcome(
        term: &str,
        cell_id: &str,
        action: Action,
        outcome: Result<(), SyncError>,
    ) -> Self {
        match outcome {
            Ok(()) => Self::succeeded(term, cell_id, action),
            Err(e) => Self::failed(term, cell_id, action, e.to_string()),
        }
    }
}

/// Append-only record of everything a run attempted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
}

impl Ledger {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn push(&mut self, row: LedgerRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn for_action(&self, action: Action) -> impl Iterator<Item = &LedgerRow> {
        self.rows.iter().filter(move |row| row.action == action)
    }

    pub fn find(&self, cell_id: &str, action: Action) -> Option<&LedgerRow> {
        self.for_action(action).find(|row| row.cell_id == cell_id)
    }

    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats::default();
        for row in &self.rows {
            stats.record(row);
        }
        stats
    }

    /// Writes the ledger as `results_<timestamp>.csv` under `dir`, never replacing a file.
    /// A run finishing in the same second as an earlier one gets a numbered name.
    pub fn persist(&self, dir: &Path, timestamp: DateTime<Utc>) -> Result<PathBuf, SyncError> {
        fs::create_dir_all(dir)?;
        let (path, file) = create_ledger_file(dir, timestamp)?;

        let mut writer = csv::Writer::from_writer(file);
        if self.rows.is_empty() {
            writer.write_record(["term", "cell id", "action", "success", "error"])?;
        }
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(path)
    }

    /// Console summary for one phase: which terms went through and which did not.
    pub fn print_summary(&self, action: Action) {
        let (done, failed): (Vec<&LedgerRow>, Vec<&LedgerRow>) =
            self.for_action(action).partition(|row| row.success);
        if done.is_empty() && failed.is_empty() {
            return;
        }

        if action == Action::DuplicateDrop {
            println!("Duplicate words from Notion (case insensitive):");
            println!("**We kept the most recent one**");
            for row in &done {
                println!("{}", row.term);
            }
            println!("{}\n", "-".repeat(10));
            return;
        }

        if !done.is_empty() {
            println!("{} words on the course:", action.past_tense());
            for row in &done {
                println!("{}", row.term);
            }
        }
        if !failed.is_empty() {
            println!("Not {} words on the course:", action.past_tense().to_lowercase());
            for row in &failed {
                println!("{}: {}", row.term, row.error.as_deref().unwrap_or("unknown error"));
            }
        }
        println!("{}\n", "-".repeat(10));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub duplicates: ActionCounts,
    pub deleted: ActionCounts,
    pub updated: ActionCounts,
    pub added: ActionCounts,
}

impl LedgerStats {
    fn record(&mut self, row: &LedgerRow) {
        let counts = match row.action {
            Action::DuplicateDrop => &mut self.duplicates,
            Action::Delete => &mut self.deleted,
            Action::Update => &mut self.updated,
            Action::Add => &mut self.added,
        };
        if row.success {
            counts.succeeded += 1;
        } else {
            counts.failed += 1;
        }
    }

    pub fn failures(&self) -> usize {
        self.duplicates.failed + self.deleted.failed + self.updated.failed + self.added.failed
    }
}

fn create_ledger_file(
    dir: &Path,
    timestamp: DateTime<Utc>,
) -> Result<(PathBuf, File), SyncError> {
    let stamp = timestamp.format("%Y-%m-%d_%H-%M-%S").to_string();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = match attempt {
            0 => format!("results_{}.csv", stamp),
            n => format!("results_{}_{}.csv", stamp, n),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(SyncError::Custom(format!(
        "no free ledger file name for {} in {}",
        stamp,
        dir.display()
    )))
}
