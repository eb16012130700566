use std::collections::HashMap;

use super::{
    ledger::{
        Action,
        Ledger,
        LedgerRow,
    },
    models::WordRecord,
};

fn normalize(term: &str) -> String {
    term.to_lowercase()
}

/// Collapses words whose terms match case-insensitively, keeping the last one of each.
///
/// Callers sort oldest to newest first so the survivor is the most recent edit.
/// Every dropped word is reported as a successful `duplicate_drop`.
pub fn drop_duplicates_case_insensitive(records: Vec<WordRecord>) -> (Vec<WordRecord>, Ledger) {
    let mut last_seen: HashMap<String, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        last_seen.insert(normalize(&record.term), index);
    }

    let mut ledger = Ledger::new();
    let mut kept = Vec::with_capacity(last_seen.len());
    for (index, record) in records.into_iter().enumerate() {
        if last_seen.get(&normalize(&record.term)) == Some(&index) {
            kept.push(record);
        } else {
            ledger.push(LedgerRow::succeeded(&record.term, &record.cell_id, Action::DuplicateDrop));
        }
    }

    (kept, ledger)
}
