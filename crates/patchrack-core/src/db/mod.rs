//! Patch database module using CozoDB
//!
//! This module provides persistent storage for sound patches pulled from
//! hardware synths or imported from sysex files:
//! - Content-addressed dedup: the relation key is (synth tag, fingerprint)
//! - Category tagging (many-to-many) with a seeded built-in set
//! - Deterministic filtered listing for reproducible paging
//!
//! All queries are performed through typed Rust APIs that generate
//! CozoScript (Datalog) internally. Each script runs as one Cozo
//! transaction, so readers never observe a partially-applied write.

mod schema;
mod queries;
mod service;

pub use schema::{Category, PatchRow, BUILTIN_CATEGORIES};
pub use queries::{CategoryQuery, PatchFilter, PatchQuery};
pub use service::{fingerprint, Patch, PatchDatabase};

use cozo::{DbInstance, NamedRows};
use std::collections::BTreeMap;
use std::path::Path;

/// Database connection wrapper
pub struct LibraryDb {
    db: DbInstance,
}

impl LibraryDb {
    /// Open or create a database at the given path
    ///
    /// Uses the SQLite backend for durable storage.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let db = DbInstance::new("sqlite", path, "")
            .map_err(|e| DbError::Open(e.to_string()))?;

        let library_db = Self { db };
        library_db.ensure_schema()?;

        Ok(library_db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, DbError> {
        let db = DbInstance::new("mem", "", "")
            .map_err(|e| DbError::Open(e.to_string()))?;

        let library_db = Self { db };
        library_db.ensure_schema()?;

        Ok(library_db)
    }

    /// Ensure all required relations exist and built-ins are seeded
    fn ensure_schema(&self) -> Result<(), DbError> {
        schema::create_all_relations(&self.db)?;
        Ok(())
    }

    /// Run a raw CozoScript query with write access
    pub fn run_script(
        &self,
        script: &str,
        params: BTreeMap<String, cozo::DataValue>,
    ) -> Result<NamedRows, DbError> {
        self.db
            .run_script(script, params, cozo::ScriptMutability::Mutable)
            .map_err(|e| DbError::Query(e.to_string()))
    }

    /// Run a read-only query
    pub fn run_query(
        &self,
        script: &str,
        params: BTreeMap<String, cozo::DataValue>,
    ) -> Result<NamedRows, DbError> {
        self.db
            .run_script(script, params, cozo::ScriptMutability::Immutable)
            .map_err(|e| DbError::Query(e.to_string()))
    }
}

/// Database errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("No such patch: {synth}/{fingerprint}")]
    NotFound { synth: String, fingerprint: String },
}

/// Helper macro for creating parameter maps
#[macro_export]
macro_rules! params {
    () => {
        std::collections::BTreeMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::BTreeMap::new();
        $(
            map.insert($key.to_string(), cozo::DataValue::from($value));
        )+
        map
    }};
}
