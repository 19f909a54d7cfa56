//! PostgreSQL adapters - Read access to the activity store.
//!
//! - `PostgresActivityLogReader` - Context counters and the append-only log

mod activity_log_reader;

pub use activity_log_reader::PostgresActivityLogReader;
