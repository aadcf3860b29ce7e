//! Thread-safe patch database service
//!
//! This module provides the high-level API for the patch library,
//! abstracting away CozoDB details and ensuring thread-safe access
//! through a shared `Arc<PatchDatabase>`.
//!
//! Writes are serialized behind a mutex; reads go straight to the
//! database (each script is a single snapshot transaction), so a
//! listing never observes a half-applied import or mutation.
//!
//! # Usage
//!
//! ```ignore
//! use patchrack_core::db::{PatchDatabase, PatchFilter};
//!
//! let db = PatchDatabase::open("~/Music/patchrack")?;
//! let (patch, inserted) = db.import_patch(SynthModel::Rev2, "Warm Pad", &raw, &normalized, source)?;
//! let favorites = db.list_patches(&PatchFilter { favorite_only: true, ..Default::default() })?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::queries::{CategoryQuery, PatchFilter, PatchQuery};
use super::schema::{Category, PatchRow};
use super::{DbError, LibraryDb};
use crate::types::{PatchSource, SynthModel};

/// A stored patch, as seen by callers
///
/// Unlike the raw `PatchRow`, this carries the decoded source and the
/// attached category ids.
#[derive(Debug, Clone)]
pub struct Patch {
    pub model: SynthModel,
    /// Hex MD5 digest of the normalized patch bytes; the dedup key
    pub fingerprint: String,
    pub name: String,
    /// The patch dump as received, byte for byte
    pub data: Vec<u8>,
    pub favorite: bool,
    pub categories: Vec<i64>,
    pub source: PatchSource,
    /// Unix seconds at import time
    pub imported_at: i64,
}

/// Compute the content fingerprint over normalized patch bytes
///
/// Deterministic and content-only: two imports of byte-identical normalized
/// data always produce the same digest, regardless of name or source.
pub fn fingerprint(normalized: &[u8]) -> String {
    format!("{:x}", md5::compute(normalized))
}

/// Thread-safe patch database service
pub struct PatchDatabase {
    db: LibraryDb,
    /// Serializes import / mutation / delete; readers bypass it
    write_lock: Mutex<()>,
}

impl PatchDatabase {
    /// Open or create the patch database under the given library directory
    ///
    /// The database file will be created at `library_root/patchrack.db`.
    /// Schema is initialized idempotently.
    pub fn open(library_root: impl AsRef<Path>) -> Result<Arc<Self>, DbError> {
        let library_root: PathBuf = library_root.as_ref().to_path_buf();
        let db_path = library_root.join("patchrack.db");

        std::fs::create_dir_all(&library_root)
            .map_err(|e| DbError::Open(format!("Failed to create directory: {}", e)))?;

        log::info!("Opening patch database at {:?}", db_path);
        let db = LibraryDb::open(&db_path)?;

        Ok(Arc::new(Self {
            db,
            write_lock: Mutex::new(()),
        }))
    }

    /// Create an in-memory database service (for testing)
    pub fn in_memory() -> Result<Arc<Self>, DbError> {
        Ok(Arc::new(Self {
            db: LibraryDb::in_memory()?,
            write_lock: Mutex::new(()),
        }))
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Import a patch, deduplicating on (model, fingerprint)
    ///
    /// `raw` is the dump as received; `normalized` is the model-normalized
    /// form used only for hashing (typically the decoded data block with the
    /// embedded name blanked). If the key already exists the stored record is
    /// returned unchanged with `inserted = false`; a re-import never mutates
    /// existing bytes, name, flags, or categories.
    pub fn import_patch(
        &self,
        model: SynthModel,
        name: &str,
        raw: &[u8],
        normalized: &[u8],
        source: PatchSource,
    ) -> Result<(Patch, bool), DbError> {
        let digest = fingerprint(normalized);
        let _guard = self.write_lock.lock().unwrap();

        if let Some(existing) = PatchQuery::get(&self.db, model.tag(), &digest)? {
            log::debug!(
                "import_patch: duplicate {} '{}' -> existing '{}'",
                model.tag(),
                name,
                existing.name
            );
            return Ok((self.to_patch(existing)?, false));
        }

        let row = PatchRow {
            synth: model.tag().to_string(),
            fingerprint: digest,
            name: name.to_string(),
            data: raw.to_vec(),
            favorite: false,
            source_kind: source.kind().to_string(),
            source_name: source.name().to_string(),
            imported_at: unix_now(),
        };
        PatchQuery::put(&self.db, &row)?;

        log::info!("import_patch: stored {} '{}' ({})", model.tag(), name, row.fingerprint);
        Ok((self.to_patch(row)?, true))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// List patches matching a filter
    ///
    /// Results are ordered by display name, then fingerprint; re-invoking
    /// with the same filter against an unchanged database yields the same
    /// sequence.
    pub fn list_patches(&self, filter: &PatchFilter) -> Result<Vec<Patch>, DbError> {
        let rows = PatchQuery::list(&self.db, filter)?;

        // Single pass over all category edges instead of one query per row
        let mut by_patch: std::collections::HashMap<(String, String), Vec<i64>> =
            std::collections::HashMap::new();
        for (synth, fp, cat) in PatchQuery::all_category_edges(&self.db)? {
            by_patch.entry((synth, fp)).or_default().push(cat);
        }

        rows.into_iter()
            .map(|row| {
                let categories = by_patch
                    .remove(&(row.synth.clone(), row.fingerprint.clone()))
                    .unwrap_or_default();
                row_to_patch(row, categories)
            })
            .collect()
    }

    /// Fetch one patch by key
    pub fn get_patch(&self, model: SynthModel, fingerprint: &str) -> Result<Option<Patch>, DbError> {
        match PatchQuery::get(&self.db, model.tag(), fingerprint)? {
            Some(row) => Ok(Some(self.to_patch(row)?)),
            None => Ok(None),
        }
    }

    /// Count stored patches
    pub fn patch_count(&self) -> Result<usize, DbError> {
        PatchQuery::count(&self.db)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Replace the category set of a patch
    pub fn set_categories(
        &self,
        model: SynthModel,
        fingerprint: &str,
        categories: &[i64],
    ) -> Result<(), DbError> {
        let _guard = self.write_lock.lock().unwrap();
        self.require_exists(model, fingerprint)?;
        PatchQuery::set_categories(&self.db, model.tag(), fingerprint, categories)
    }

    /// Set or clear the favorite flag
    pub fn set_favorite(
        &self,
        model: SynthModel,
        fingerprint: &str,
        favorite: bool,
    ) -> Result<(), DbError> {
        let _guard = self.write_lock.lock().unwrap();
        self.require_exists(model, fingerprint)?;
        PatchQuery::set_favorite(&self.db, model.tag(), fingerprint, favorite)
    }

    /// Delete a patch; deleting an absent record is a no-op
    pub fn delete_patch(&self, model: SynthModel, fingerprint: &str) -> Result<(), DbError> {
        let _guard = self.write_lock.lock().unwrap();
        PatchQuery::delete(&self.db, model.tag(), fingerprint)
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// All categories, built-ins first
    pub fn list_categories(&self) -> Result<Vec<Category>, DbError> {
        CategoryQuery::get_all(&self.db)
    }

    /// Create a user category, returning its id
    pub fn add_category(&self, label: &str) -> Result<i64, DbError> {
        let _guard = self.write_lock.lock().unwrap();
        CategoryQuery::insert(&self.db, label)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn require_exists(&self, model: SynthModel, fingerprint: &str) -> Result<(), DbError> {
        if PatchQuery::get(&self.db, model.tag(), fingerprint)?.is_none() {
            return Err(DbError::NotFound {
                synth: model.tag().to_string(),
                fingerprint: fingerprint.to_string(),
            });
        }
        Ok(())
    }

    fn to_patch(&self, row: PatchRow) -> Result<Patch, DbError> {
        let categories = PatchQuery::categories_for(&self.db, &row.synth, &row.fingerprint)?;
        row_to_patch(row, categories)
    }
}

fn row_to_patch(row: PatchRow, categories: Vec<i64>) -> Result<Patch, DbError> {
    let model = SynthModel::from_tag(&row.synth)
        .ok_or_else(|| DbError::Query(format!("unknown synth tag '{}'", row.synth)))?;
    let source = PatchSource::from_parts(&row.source_kind, &row.source_name)
        .ok_or_else(|| DbError::Query(format!("unknown source kind '{}'", row.source_kind)))?;

    Ok(Patch {
        model,
        fingerprint: row.fingerprint,
        name: row.name,
        data: row.data,
        favorite: row.favorite,
        categories,
        source,
        imported_at: row.imported_at,
    })
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_source() -> PatchSource {
        PatchSource::File {
            path: "/tmp/bank.syx".to_string(),
        }
    }

    #[test]
    fn test_import_then_reimport_dedups() {
        let db = PatchDatabase::in_memory().unwrap();
        let raw = vec![0xF0, 0x01, 0x2F, 0x02, 0x10, 0x20, 0xF7];
        let normalized = vec![0x10, 0x20];

        let (first, inserted) = db
            .import_patch(SynthModel::Rev2, "Warm Pad", &raw, &normalized, file_source())
            .unwrap();
        assert!(inserted);

        // Same content under a different display name collapses to one record
        let (second, inserted) = db
            .import_patch(SynthModel::Rev2, "Renamed", &raw, &normalized, file_source())
            .unwrap();
        assert!(!inserted);
        assert_eq!(second.fingerprint, first.fingerprint);
        assert_eq!(second.name, "Warm Pad");
        assert_eq!(db.patch_count().unwrap(), 1);
    }

    #[test]
    fn test_same_bytes_different_models_stay_distinct() {
        let db = PatchDatabase::in_memory().unwrap();
        let raw = vec![0x01, 0x02, 0x03];

        let (_, a) = db
            .import_patch(SynthModel::Rev2, "A", &raw, &raw, file_source())
            .unwrap();
        let (_, b) = db
            .import_patch(SynthModel::Ob6, "A", &raw, &raw, file_source())
            .unwrap();
        assert!(a);
        assert!(b);
        assert_eq!(db.patch_count().unwrap(), 2);
    }

    #[test]
    fn test_fingerprint_ignores_name_via_normalization() {
        // Two dumps that differ only in the raw (name) bytes but normalize
        // identically must collapse
        let db = PatchDatabase::in_memory().unwrap();
        let normalized = vec![0xAA, 0xBB];

        let (_, first) = db
            .import_patch(SynthModel::ToraizAs1, "One", &[1, 2, 3], &normalized, file_source())
            .unwrap();
        let (_, second) = db
            .import_patch(SynthModel::ToraizAs1, "Two", &[4, 5, 6], &normalized, file_source())
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn test_favorite_and_categories() {
        let db = PatchDatabase::in_memory().unwrap();
        let (patch, _) = db
            .import_patch(SynthModel::Rev2, "Warm Pad", &[1], &[1], file_source())
            .unwrap();

        db.set_favorite(SynthModel::Rev2, &patch.fingerprint, true).unwrap();
        db.set_categories(SynthModel::Rev2, &patch.fingerprint, &[1, 3]).unwrap();

        let fetched = db.get_patch(SynthModel::Rev2, &patch.fingerprint).unwrap().unwrap();
        assert!(fetched.favorite);
        assert_eq!(fetched.categories, vec![1, 3]);

        let favorites = db
            .list_patches(&PatchFilter {
                favorite_only: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(favorites.len(), 1);
    }

    #[test]
    fn test_mutations_on_missing_patch_fail() {
        let db = PatchDatabase::in_memory().unwrap();
        let err = db.set_favorite(SynthModel::Rev2, "deadbeef", true).unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = db.set_categories(SynthModel::Rev2, "deadbeef", &[1]).unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        // Delete is the exception: idempotent no-op
        db.delete_patch(SynthModel::Rev2, "deadbeef").unwrap();
    }

    #[test]
    fn test_listing_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let fingerprint;
        {
            let db = PatchDatabase::open(temp.path()).unwrap();
            let (patch, _) = db
                .import_patch(SynthModel::Rev2, "Warm Pad", &[1, 2], &[1, 2], file_source())
                .unwrap();
            fingerprint = patch.fingerprint;
        }

        let db = PatchDatabase::open(temp.path()).unwrap();
        let fetched = db.get_patch(SynthModel::Rev2, &fingerprint).unwrap();
        assert_eq!(fetched.unwrap().name, "Warm Pad");
    }

    #[test]
    fn test_concurrent_imports() {
        use std::thread;

        let db = PatchDatabase::in_memory().unwrap();
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let db = db.clone();
                thread::spawn(move || {
                    db.import_patch(
                        SynthModel::Rev2,
                        &format!("Patch {}", i),
                        &[i],
                        &[i],
                        PatchSource::Device {
                            device: "Rev2 ch.1".to_string(),
                        },
                    )
                    .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(db.patch_count().unwrap(), 4);
    }
}
