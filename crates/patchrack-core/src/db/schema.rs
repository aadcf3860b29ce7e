//! CozoDB schema definitions for the patch library
//!
//! Relations:
//! - `patches`: one row per distinct patch content, keyed by
//!   (synth tag, fingerprint); the fingerprint is an MD5 hex digest of the
//!   model-normalized patch bytes, so re-imports of identical content land
//!   on the same key.
//! - `categories`: user-extensible label set, seeded with built-ins.
//! - `patch_categories`: many-to-many patch/category edges (all-key rows).

use super::DbError;
use cozo::DbInstance;
use serde::{Deserialize, Serialize};

/// Internal database row representation of a patch
///
/// This is the raw database schema - use `Patch` from service.rs for the
/// public API (it carries the decoded source and category set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRow {
    pub synth: String,
    pub fingerprint: String,
    pub name: String,
    pub data: Vec<u8>,
    pub favorite: bool,
    pub source_kind: String,
    pub source_name: String,
    pub imported_at: i64,
}

/// A patch category label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub label: String,
}

/// Built-in categories seeded when the relation is first created
///
/// These are the classic librarian sound classes; "Favorites" is not here
/// because it is the `favorite` flag on the patch row itself.
pub const BUILTIN_CATEGORIES: &[&str] = &[
    "Lead", "Pad", "Bass", "Keys", "Brass", "Organ", "Arp", "Pluck", "Drone", "SFX",
];

/// Get the set of existing relation names in the database
fn get_existing_relations(
    db: &DbInstance,
) -> Result<std::collections::HashSet<String>, DbError> {
    let result = db
        .run_script(
            "::relations",
            Default::default(),
            cozo::ScriptMutability::Immutable,
        )
        .map_err(|e| DbError::Schema(e.to_string()))?;

    // Columns are [name, arity, access_level, description]; we want name
    let mut relations = std::collections::HashSet::new();
    for row in result.rows {
        if let Some(name) = row.first().and_then(|v| v.get_str()) {
            relations.insert(name.to_string());
        }
    }
    Ok(relations)
}

/// Create all required relations in the database (idempotent)
///
/// Checks which relations already exist and only creates missing ones.
/// Safe to call multiple times. Built-in categories are seeded exactly once,
/// when the `categories` relation is first created.
pub fn create_all_relations(db: &DbInstance) -> Result<(), DbError> {
    let existing = get_existing_relations(db)?;
    log::debug!("Existing relations: {:?}", existing);

    if !existing.contains("patches") {
        log::debug!("Creating 'patches' relation");
        create_patches_relation(db)?;
    }
    if !existing.contains("categories") {
        log::debug!("Creating 'categories' relation");
        create_categories_relation(db)?;
        seed_builtin_categories(db)?;
    }
    if !existing.contains("patch_categories") {
        log::debug!("Creating 'patch_categories' relation");
        create_patch_categories_relation(db)?;
    }

    Ok(())
}

fn run_schema(db: &DbInstance, script: &str) -> Result<(), DbError> {
    db.run_script(script, Default::default(), cozo::ScriptMutability::Mutable)
        .map_err(|e| DbError::Schema(e.to_string()))?;
    Ok(())
}

fn create_patches_relation(db: &DbInstance) -> Result<(), DbError> {
    run_schema(
        db,
        r#"
        {:create patches {
            synth: String,
            fingerprint: String =>
            name: String,
            data: Bytes,
            favorite: Bool,
            source_kind: String,
            source_name: String,
            imported_at: Int
        }}
    "#,
    )
}

fn create_categories_relation(db: &DbInstance) -> Result<(), DbError> {
    run_schema(
        db,
        r#"
        {:create categories {
            id: Int =>
            label: String
        }}
    "#,
    )
}

fn create_patch_categories_relation(db: &DbInstance) -> Result<(), DbError> {
    // All-key relation: a row's existence is the association
    run_schema(
        db,
        r#"
        {:create patch_categories {
            synth: String,
            fingerprint: String,
            category_id: Int
        }}
    "#,
    )
}

fn seed_builtin_categories(db: &DbInstance) -> Result<(), DbError> {
    let rows: Vec<cozo::DataValue> = BUILTIN_CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, label)| {
            cozo::DataValue::List(vec![
                cozo::DataValue::from((i + 1) as i64),
                cozo::DataValue::Str((*label).into()),
            ])
        })
        .collect();

    let mut params = std::collections::BTreeMap::new();
    params.insert("rows".to_string(), cozo::DataValue::List(rows));

    db.run_script(
        r#"
        ?[id, label] <- $rows
        :put categories {id => label}
    "#,
        params,
        cozo::ScriptMutability::Mutable,
    )
    .map_err(|e| DbError::Schema(e.to_string()))?;

    log::debug!("Seeded {} built-in categories", BUILTIN_CATEGORIES.len());
    Ok(())
}
