pub mod batching;
pub mod duplicates;
pub mod errors;
pub mod http;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod relational;
pub mod schema;
pub mod store;

#[cfg(test)]
pub mod test_support;

pub use errors::SyncError;
pub use pipeline::{
    run_sync,
    SyncReport,
};
