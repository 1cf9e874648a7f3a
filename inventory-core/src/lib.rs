//! Local data layer for an asset inventory: a query-builder record store over durable
//! tables, a quoted-CSV ingestor, and the summary reducer behind the dashboards.

pub mod commands;
pub mod config;
pub mod services;
pub mod utils;

pub use commands::Inventory;
pub use config::InventoryConfig;
pub use services::{QueryError, QueryResult, Record, RecordStore};
