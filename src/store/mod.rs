// src/store/mod.rs

pub mod key;
pub mod parquet_store;

use serde::Serialize;

use crate::error::{Advisory, Result};
use crate::table::Table;

pub use parquet_store::ParquetStore;
pub use key::validate_key;

/// What a successful `put` wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub key: String,
    pub rows: usize,
    pub advisories: Vec<Advisory>,
}

/// Keyed persistence of canonical tables.
///
/// `put` replaces the table at `key` atomically: a reader sees either the
/// previous table or the new one, and a failed `put` leaves the previous
/// table untouched.
pub trait TableStore {
    fn put(&self, key: &str, table: &Table) -> Result<WriteReport>;
    fn get(&self, key: &str) -> Result<Table>;
    fn contains(&self, key: &str) -> Result<bool>;
    /// Every stored key, sorted.
    fn keys(&self) -> Result<Vec<String>>;
}
