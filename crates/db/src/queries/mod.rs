// crates/db/src/queries/mod.rs
// Query modules for the adscope SQLite database, split by domain.

pub(crate) mod competitors;
pub(crate) mod jobs;
pub(crate) mod metrics;
pub(crate) mod row_types;
pub(crate) mod users;
