use std::{
    collections::HashSet,
    path::PathBuf,
    time::Instant,
};

use chrono::{
    DateTime,
    Utc,
};

use super::{
    batching::allocate_and_add,
    duplicates::drop_duplicates_case_insensitive,
    ledger::{
        Action,
        Ledger,
        LedgerRow,
        LedgerStats,
    },
    models::{
        TargetWord,
        WordRecord,
    },
    relational::{
        anti_join,
        semi_join,
    },
    schema::RawRecord,
    store::{
        bounded,
        TargetStore,
    },
    SyncError,
};
use crate::settings::SyncSettings;

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub ledger: Ledger,
    /// `None` when the run stopped before touching the course.
    pub ledger_path: Option<PathBuf>,
    pub stats: LedgerStats,
}

/// How the validated knowledge base relates to the course.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    pub deleted: Vec<TargetWord>,
    pub updated: Vec<WordRecord>,
    pub added: Vec<WordRecord>,
}

/// Classifies deduplicated source words against the course, keyed on cell id.
///
/// Only words modified after the newest word already on the course can be new or
/// changed. Among those, ids the course knows are updates and the rest are additions.
pub fn plan_sync(source: &[WordRecord], target: &[TargetWord]) -> SyncPlan {
    if target.is_empty() {
        return SyncPlan { added: source.to_vec(), ..SyncPlan::default() };
    }

    let target_key = |w: &TargetWord| w.record.cell_id.clone();
    let source_key = |r: &WordRecord| r.cell_id.clone();

    // the course may hold the same id more than once, one delete clears them all
    let mut seen = HashSet::new();
    let deleted: Vec<TargetWord> = anti_join(target, source, target_key, source_key)
        .into_iter()
        .filter(|w| seen.insert(w.record.cell_id.clone()))
        .collect();

    let most_recent = target.iter().map(|w| w.record.date_modified).max();
    let candidates: Vec<WordRecord> = source
        .iter()
        .filter(|r| most_recent.map_or(true, |newest| r.date_modified > newest))
        .cloned()
        .collect();

    let updated = semi_join(&candidates, target, source_key, target_key);
    let added = anti_join(&candidates, &updated, source_key, source_key);

    SyncPlan { deleted, updated, added }
}

/// One full pass: validate, deduplicate, delete, update, add, then write the ledger.
///
/// Item failures only land in the ledger. Failing to read the course or to create a
/// level aborts the run, after the ledger gathered so far has been written.
pub async fn run_sync<S: TargetStore>(
    store: &mut S,
    source: &[RawRecord],
    settings: &SyncSettings,
) -> Result<SyncReport, SyncError> {
    let started = Instant::now();
    let run_at = Utc::now();
    let limit = settings.mutation_timeout();

    let mut records = settings.schema.validate_rows(source);
    if records.is_empty() {
        println!("Notion database is empty.");
        return Ok(SyncReport {
            ledger: Ledger::new(),
            ledger_path: None,
            stats: LedgerStats::default(),
        });
    }
    log::info!("{} of {} Notion rows passed validation", records.len(), source.len());

    // oldest first, so the last duplicate is the newest and older words get added first
    records.sort_by_key(|r| r.date_modified);
    let (records, mut ledger) = drop_duplicates_case_insensitive(records);
    ledger.print_summary(Action::DuplicateDrop);

    let target = match store.fetch_all().await {
        Ok(target) => target,
        Err(e) => return Err(abort(&ledger, settings, run_at, e)),
    };
    log::info!(
        "Course holds {} words in {} levels",
        target.words.len(),
        target.groups.len()
    );

    if target.is_empty() {
        log::info!("The course is empty, every word will be added");
    }
    let plan = plan_sync(&records, &target.words);

    for word in &plan.deleted {
        let outcome = bounded(limit, "delete", store.delete(&word.record.cell_id)).await;
        ledger.push(LedgerRow::from_outcome(
            &word.record.term,
            &word.record.cell_id,
            Action::Delete,
            outcome,
        ));
    }
    finish_phase(store, &ledger, Action::Delete, !plan.deleted.is_empty()).await;

    for record in &plan.updated {
        let outcome = bounded(limit, "update", store.update(record)).await;
        ledger.push(LedgerRow::from_outcome(
            &record.term,
            &record.cell_id,
            Action::Update,
            outcome,
        ));
    }
    finish_phase(store, &ledger, Action::Update, !plan.updated.is_empty()).await;

    let added = allocate_and_add(
        store,
        &plan.added,
        &target.groups,
        settings.level_word_limit,
        limit,
        &mut ledger,
    )
    .await;
    if let Err(e) = added {
        return Err(abort(&ledger, settings, run_at, e));
    }
    finish_phase(store, &ledger, Action::Add, !plan.added.is_empty()).await;

    let ledger_path = ledger.persist(&settings.log_dir(), run_at)?;
    let stats = ledger.stats();
    println!("All done! Results written to {}", ledger_path.display());
    log::info!("Sync completed ({:.1}s)", started.elapsed().as_secs_f32());

    Ok(SyncReport { ledger, ledger_path: Some(ledger_path), stats })
}

async fn finish_phase<S: TargetStore>(
    store: &mut S,
    ledger: &Ledger,
    action: Action,
    attempted: bool,
) {
    ledger.print_summary(action);
    if !attempted {
        return;
    }
    if let Err(e) = store.save_changes().await {
        log::warn!("Saving changes after {} failed: {}", action, e);
    }
}

/// Writes whatever the ledger holds before a fatal error propagates.
fn abort(
    ledger: &Ledger,
    settings: &SyncSettings,
    run_at: DateTime<Utc>,
    error: SyncError,
) -> SyncError {
    log::error!("Sync aborted: {}", error);
    match ledger.persist(&settings.log_dir(), run_at) {
        Ok(path) => log::info!("Partial results written to {}", path.display()),
        Err(e) => log::error!("Could not write partial results: {}", e),
    }
    error
}
