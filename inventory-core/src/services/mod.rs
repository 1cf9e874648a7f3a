// src/services/mod.rs

pub mod aggregator;   // pure: records -> Summary
pub mod audit;
pub mod history;
pub mod ingestor;     // quoted CSV -> records
pub mod query;        // builders + QueryResult
pub mod record;
pub mod schema;
pub mod storage;
pub mod store;        // the ONLY reader/writer of table keys

// Public API
pub use aggregator::{Bucket, Summary, summarize};
pub use ingestor::{IngestMapping, IngestReport, Ingestor};
pub use query::{Filter, QueryError, QueryResult};
pub use record::Record;
pub use store::RecordStore;
