use std::{
    future::Future,
    time::Duration,
};

use async_trait::async_trait;

use super::{
    models::{
        Group,
        TargetSnapshot,
        WordRecord,
    },
    schema::RawRecord,
    SyncError,
};

/// Per-record outcomes of a bulk insertion, in the order the records were submitted.
pub type BatchOutcome = Vec<Result<(), SyncError>>;

/// The knowledge base the course is synced from.
#[async_trait]
pub trait SourceStore {
    /// Every row of the knowledge base, following pagination until exhausted.
    async fn fetch_all_records(&self) -> Result<Vec<RawRecord>, SyncError>;
}

/// Write access to the flashcard course.
///
/// A run holds exactly one store and drives it one call at a time.
#[async_trait]
pub trait TargetStore: Send {
    /// Every word on the course with the level it belongs to, plus the levels in display order.
    async fn fetch_all(&mut self) -> Result<TargetSnapshot, SyncError>;

    /// Removes every word carrying `cell_id`. The course tolerates repeated ids, so
    /// success means no occurrence is left, not just the first one.
    async fn delete(&mut self, cell_id: &str) -> Result<(), SyncError>;

    /// Overwrites every field of the word(s) carrying `record.cell_id`.
    async fn update(&mut self, record: &WordRecord) -> Result<(), SyncError>;

    /// Inserts `records` into `group` as one operation. A bulk insertion may partially
    /// fail, so one outcome is reported per record.
    async fn add_batch(
        &mut self,
        records: &[WordRecord],
        group: &Group,
    ) -> Result<BatchOutcome, SyncError>;

    /// Appends an empty level after the existing ones.
    async fn create_group(&mut self) -> Result<Group, SyncError>;

    /// Commits pending edits for stores that buffer them.
    async fn save_changes(&mut self) -> Result<(), SyncError> {
        Ok(())
    }
}

/// Runs one collaborator call with an upper bound on how long it may block.
pub async fn bounded<T, F>(limit: Duration, action: &str, call: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, SyncError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout { action: action.to_string(), limit }),
    }
}
