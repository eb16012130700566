use std::{
    ops::Range,
    time::Duration,
};

use super::{
    ledger::{
        Action,
        Ledger,
        LedgerRow,
    },
    models::{
        Group,
        WordRecord,
    },
    store::{
        bounded,
        TargetStore,
    },
    SyncError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchTarget {
    /// Index into the groups the plan was computed from.
    Existing(usize),
    New,
}

/// One bulk insertion: a slice of the pending words and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub target: BatchTarget,
    pub range: Range<usize>,
}

/// Splits `pending` words into bulk insertions.
///
/// Levels with room are topped up first, in their existing order. Whatever is left
/// goes into new levels of `capacity` words each, in input order.
pub fn plan_batches(pending: usize, groups: &[Group], capacity: usize) -> Vec<BatchPlan> {
    let mut plans = Vec::new();
    if capacity == 0 {
        return plans;
    }

    let mut next = 0;
    for (index, group) in groups.iter().enumerate() {
        if next >= pending {
            break;
        }
        let room = group.remaining(capacity);
        if room == 0 {
            continue;
        }
        let end = (next + room).min(pending);
        plans.push(BatchPlan { target: BatchTarget::Existing(index), range: next..end });
        next = end;
    }

    while next < pending {
        let end = (next + capacity).min(pending);
        plans.push(BatchPlan { target: BatchTarget::New, range: next..end });
        next = end;
    }

    plans
}

/// Adds `pending` words to the course following `plan_batches`, one bulk call per batch.
///
/// Per-word outcomes go to `ledger` as they arrive so nothing is lost if a later
/// level cannot be created. Failing to create a level is a setup problem and
/// aborts with `SyncError::GroupCreation`.
pub async fn allocate_and_add<S: TargetStore>(
    store: &mut S,
    pending: &[WordRecord],
    groups: &[Group],
    capacity: usize,
    limit: Duration,
    ledger: &mut Ledger,
) -> Result<(), SyncError> {
    if pending.is_empty() {
        return Ok(());
    }
    if capacity == 0 {
        return Err(SyncError::Config("level word limit must be at least 1".to_string()));
    }

    for plan in plan_batches(pending.len(), groups, capacity) {
        let group = match plan.target {
            BatchTarget::Existing(index) => groups[index].clone(),
            BatchTarget::New => {
                let group = bounded(limit, "create level", store.create_group())
                    .await
                    .map_err(|e| match e {
                        SyncError::GroupCreation(_) => e,
                        other => SyncError::GroupCreation(other.to_string()),
                    })?;
                log::info!("Created level '{}'", group.name);
                group
            }
        };

        let batch = &pending[plan.range];
        log::info!("Adding {} words to level '{}'", batch.len(), group.name);

        // one slot per word plus one for the bulk call, so a store retrying word by
        // word under `limit` each is never cut off as a whole
        let batch_limit = limit.saturating_mul(batch.len() as u32 + 1);
        match bounded(batch_limit, "add", store.add_batch(batch, &group)).await {
            Ok(outcomes) => {
                let mut outcomes = outcomes.into_iter();
                for record in batch {
                    let outcome = outcomes.next().unwrap_or_else(|| {
                        Err(SyncError::Custom("no result reported for this word".to_string()))
                    });
                    ledger.push(LedgerRow::from_outcome(
                        &record.term,
                        &record.cell_id,
                        Action::Add,
                        outcome,
                    ));
                }
            }
            Err(e) => {
                log::warn!("Bulk add into '{}' failed: {}", group.name, e);
                let error = e.to_string();
                for record in batch {
                    ledger.push(LedgerRow::failed(
                        &record.term,
                        &record.cell_id,
                        Action::Add,
                        error.clone(),
                    ));
                }
            }
        }
    }

    Ok(())
}
