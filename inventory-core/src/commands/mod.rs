// src/commands/mod.rs
pub mod init;
mod api;

pub use api::{ImportFailure, ImportReport, Inventory};

pub use init::{InitReport, ensure_initialized, ensure_initialized_once};
