//! Query builders and helpers for CozoDB
//!
//! This module provides typed query APIs that generate CozoScript internally.

use super::schema::{Category, PatchRow};
use super::{DbError, LibraryDb};
use cozo::{DataValue, NamedRows};
use std::collections::BTreeMap;

/// Column list for patch queries (must match schema order)
const PATCH_COLUMNS: &str =
    "synth, fingerprint, name, data, favorite, source_kind, source_name, imported_at";

/// Filter for patch listing
///
/// All fields are conjunctive; the zero value matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchFilter {
    /// Restrict to one synth model tag
    pub synth: Option<String>,
    /// Restrict to patches carrying this category id
    pub category: Option<i64>,
    /// Case-insensitive substring match on the display name
    pub text: Option<String>,
    /// Only favorites
    pub favorite_only: bool,
}

// ============================================================================
// Patch Queries
// ============================================================================

/// Query builder for patches
pub struct PatchQuery;

impl PatchQuery {
    /// Get one patch by its (synth, fingerprint) key
    pub fn get(db: &LibraryDb, synth: &str, fingerprint: &str) -> Result<Option<PatchRow>, DbError> {
        let mut params = BTreeMap::new();
        params.insert("synth".to_string(), DataValue::Str(synth.into()));
        params.insert("fingerprint".to_string(), DataValue::Str(fingerprint.into()));

        let result = db.run_query(
            &format!(
                r#"
            ?[{cols}] :=
                *patches{{{cols}}},
                synth = $synth,
                fingerprint = $fingerprint
        "#,
                cols = PATCH_COLUMNS
            ),
            params,
        )?;

        Ok(rows_to_patches(&result)?.into_iter().next())
    }

    /// List patches matching a filter, ordered by name then fingerprint
    ///
    /// The ordering makes repeated invocations against an unchanged database
    /// return identical sequences, which callers rely on for paging.
    pub fn list(db: &LibraryDb, filter: &PatchFilter) -> Result<Vec<PatchRow>, DbError> {
        log::debug!("PatchQuery::list: filter={:?}", filter);

        let mut params = BTreeMap::new();
        let mut conditions = String::new();

        if let Some(ref synth) = filter.synth {
            conditions.push_str(",\n                synth = $synth");
            params.insert("synth".to_string(), DataValue::Str(synth.as_str().into()));
        }
        if filter.favorite_only {
            conditions.push_str(",\n                favorite = true");
        }
        if let Some(ref text) = filter.text {
            conditions.push_str(",\n                str_includes(lowercase(name), $text)");
            params.insert(
                "text".to_string(),
                DataValue::Str(text.to_lowercase().into()),
            );
        }
        if let Some(category) = filter.category {
            conditions.push_str(
                ",\n                *patch_categories{synth, fingerprint, category_id: cat},\n                cat = $category",
            );
            params.insert("category".to_string(), DataValue::from(category));
        }

        let script = format!(
            r#"
            ?[{cols}] :=
                *patches{{{cols}}}{conditions}
            :order name, fingerprint
        "#,
            cols = PATCH_COLUMNS,
            conditions = conditions
        );

        let result = db.run_query(&script, params)?;
        let patches = rows_to_patches(&result)?;
        log::debug!("PatchQuery::list: {} rows", patches.len());
        Ok(patches)
    }

    /// Insert or overwrite a patch row
    pub fn put(db: &LibraryDb, row: &PatchRow) -> Result<(), DbError> {
        let mut params = BTreeMap::new();
        params.insert("synth".to_string(), DataValue::Str(row.synth.as_str().into()));
        params.insert(
            "fingerprint".to_string(),
            DataValue::Str(row.fingerprint.as_str().into()),
        );
        params.insert("name".to_string(), DataValue::Str(row.name.as_str().into()));
        params.insert("data".to_string(), DataValue::Bytes(row.data.clone()));
        params.insert("favorite".to_string(), DataValue::Bool(row.favorite));
        params.insert(
            "source_kind".to_string(),
            DataValue::Str(row.source_kind.as_str().into()),
        );
        params.insert(
            "source_name".to_string(),
            DataValue::Str(row.source_name.as_str().into()),
        );
        params.insert("imported_at".to_string(), DataValue::from(row.imported_at));

        db.run_script(
            r#"
            ?[synth, fingerprint, name, data, favorite, source_kind, source_name, imported_at] <- [[
                $synth, $fingerprint, $name, $data, $favorite, $source_kind, $source_name, $imported_at
            ]]
            :put patches {synth, fingerprint => name, data, favorite, source_kind, source_name, imported_at}
        "#,
            params,
        )?;

        Ok(())
    }

    /// Update the favorite flag in place
    ///
    /// Puts zero rows when the key is absent; the service layer turns that
    /// into NotFound by checking existence first.
    pub fn set_favorite(
        db: &LibraryDb,
        synth: &str,
        fingerprint: &str,
        favorite: bool,
    ) -> Result<(), DbError> {
        let mut params = BTreeMap::new();
        params.insert("synth".to_string(), DataValue::Str(synth.into()));
        params.insert("fingerprint".to_string(), DataValue::Str(fingerprint.into()));
        params.insert("favorite".to_string(), DataValue::Bool(favorite));

        db.run_script(
            r#"
            ?[synth, fingerprint, name, data, favorite, source_kind, source_name, imported_at] :=
                *patches{synth, fingerprint, name, data, source_kind, source_name, imported_at},
                synth = $synth,
                fingerprint = $fingerprint,
                favorite = $favorite
            :put patches {synth, fingerprint => name, data, favorite, source_kind, source_name, imported_at}
        "#,
            params,
        )?;

        Ok(())
    }

    /// Delete a patch and its category edges (idempotent, one transaction)
    pub fn delete(db: &LibraryDb, synth: &str, fingerprint: &str) -> Result<(), DbError> {
        let mut params = BTreeMap::new();
        params.insert("synth".to_string(), DataValue::Str(synth.into()));
        params.insert("fingerprint".to_string(), DataValue::Str(fingerprint.into()));

        db.run_script(
            r#"
            {
                ?[synth, fingerprint, category_id] :=
                    *patch_categories{synth, fingerprint, category_id},
                    synth = $synth,
                    fingerprint = $fingerprint
                :rm patch_categories {synth, fingerprint, category_id}
            }
            {
                ?[synth, fingerprint] <- [[$synth, $fingerprint]]
                :rm patches {synth, fingerprint}
            }
        "#,
            params,
        )?;

        Ok(())
    }

    /// Replace the category set of a patch (one transaction)
    pub fn set_categories(
        db: &LibraryDb,
        synth: &str,
        fingerprint: &str,
        categories: &[i64],
    ) -> Result<(), DbError> {
        let rows: Vec<DataValue> = categories
            .iter()
            .map(|&id| {
                DataValue::List(vec![
                    DataValue::Str(synth.into()),
                    DataValue::Str(fingerprint.into()),
                    DataValue::from(id),
                ])
            })
            .collect();

        let mut params = BTreeMap::new();
        params.insert("synth".to_string(), DataValue::Str(synth.into()));
        params.insert("fingerprint".to_string(), DataValue::Str(fingerprint.into()));
        params.insert("rows".to_string(), DataValue::List(rows));

        db.run_script(
            r#"
            {
                ?[synth, fingerprint, category_id] :=
                    *patch_categories{synth, fingerprint, category_id},
                    synth = $synth,
                    fingerprint = $fingerprint
                :rm patch_categories {synth, fingerprint, category_id}
            }
            {
                ?[synth, fingerprint, category_id] <- $rows
                :put patch_categories {synth, fingerprint, category_id}
            }
        "#,
            params,
        )?;

        Ok(())
    }

    /// Get the category ids attached to one patch
    pub fn categories_for(
        db: &LibraryDb,
        synth: &str,
        fingerprint: &str,
    ) -> Result<Vec<i64>, DbError> {
        let mut params = BTreeMap::new();
        params.insert("synth".to_string(), DataValue::Str(synth.into()));
        params.insert("fingerprint".to_string(), DataValue::Str(fingerprint.into()));

        let result = db.run_query(
            r#"
            ?[category_id] :=
                *patch_categories{synth, fingerprint, category_id},
                synth = $synth,
                fingerprint = $fingerprint
            :order category_id
        "#,
            params,
        )?;

        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| row.first().and_then(|v| v.get_int()))
            .collect())
    }

    /// Get all category edges, for batch-joining onto a listing
    pub fn all_category_edges(db: &LibraryDb) -> Result<Vec<(String, String, i64)>, DbError> {
        let result = db.run_query(
            r#"
            ?[synth, fingerprint, category_id] := *patch_categories{synth, fingerprint, category_id}
            :order synth, fingerprint, category_id
        "#,
            BTreeMap::new(),
        )?;

        let mut edges = Vec::with_capacity(result.rows.len());
        for row in result.rows {
            let synth = row
                .first()
                .and_then(|v| v.get_str())
                .ok_or_else(|| DbError::Query("bad patch_categories row".to_string()))?
                .to_string();
            let fingerprint = row
                .get(1)
                .and_then(|v| v.get_str())
                .ok_or_else(|| DbError::Query("bad patch_categories row".to_string()))?
                .to_string();
            let category_id = row
                .get(2)
                .and_then(|v| v.get_int())
                .ok_or_else(|| DbError::Query("bad patch_categories row".to_string()))?;
            edges.push((synth, fingerprint, category_id));
        }
        Ok(edges)
    }

    /// Count patches in the database
    pub fn count(db: &LibraryDb) -> Result<usize, DbError> {
        let result = db.run_query(
            r#"
            ?[count(fingerprint)] := *patches{synth, fingerprint}
        "#,
            BTreeMap::new(),
        )?;

        Ok(result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.get_int())
            .unwrap_or(0) as usize)
    }
}

// ============================================================================
// Category Queries
// ============================================================================

/// Query builder for categories
pub struct CategoryQuery;

impl CategoryQuery {
    /// Get all categories, built-ins first (ids ascend in seed order)
    pub fn get_all(db: &LibraryDb) -> Result<Vec<Category>, DbError> {
        let result = db.run_query(
            r#"
            ?[id, label] := *categories{id, label}
            :order id
        "#,
            BTreeMap::new(),
        )?;

        let mut categories = Vec::with_capacity(result.rows.len());
        for row in result.rows {
            let id = row
                .first()
                .and_then(|v| v.get_int())
                .ok_or_else(|| DbError::Query("bad categories row".to_string()))?;
            let label = row
                .get(1)
                .and_then(|v| v.get_str())
                .ok_or_else(|| DbError::Query("bad categories row".to_string()))?
                .to_string();
            categories.push(Category { id, label });
        }
        Ok(categories)
    }

    /// Insert a new category with the next free id, returning the id
    pub fn insert(db: &LibraryDb, label: &str) -> Result<i64, DbError> {
        let result = db.run_query(
            r#"
            ?[max(id)] := *categories{id}
        "#,
            BTreeMap::new(),
        )?;

        let next_id = result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.get_int())
            .unwrap_or(0)
            + 1;

        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::from(next_id));
        params.insert("label".to_string(), DataValue::Str(label.into()));

        db.run_script(
            r#"
            ?[id, label] <- [[$id, $label]]
            :put categories {id => label}
        "#,
            params,
        )?;

        Ok(next_id)
    }
}

// ============================================================================
// Row Conversion
// ============================================================================

/// Convert query result rows to PatchRow structs
///
/// Column order must match PATCH_COLUMNS.
fn rows_to_patches(result: &NamedRows) -> Result<Vec<PatchRow>, DbError> {
    let mut patches = Vec::with_capacity(result.rows.len());

    for row in &result.rows {
        let bad = |field: &str| DbError::Query(format!("bad patches row: {}", field));

        let synth = row
            .first()
            .and_then(|v| v.get_str())
            .ok_or_else(|| bad("synth"))?
            .to_string();
        let fingerprint = row
            .get(1)
            .and_then(|v| v.get_str())
            .ok_or_else(|| bad("fingerprint"))?
            .to_string();
        let name = row
            .get(2)
            .and_then(|v| v.get_str())
            .ok_or_else(|| bad("name"))?
            .to_string();
        let data = match row.get(3) {
            Some(DataValue::Bytes(bytes)) => bytes.clone(),
            _ => return Err(bad("data")),
        };
        let favorite = match row.get(4) {
            Some(DataValue::Bool(b)) => *b,
            _ => return Err(bad("favorite")),
        };
        let source_kind = row
            .get(5)
            .and_then(|v| v.get_str())
            .ok_or_else(|| bad("source_kind"))?
            .to_string();
        let source_name = row
            .get(6)
            .and_then(|v| v.get_str())
            .ok_or_else(|| bad("source_name"))?
            .to_string();
        let imported_at = row
            .get(7)
            .and_then(|v| v.get_int())
            .ok_or_else(|| bad("imported_at"))?;

        patches.push(PatchRow {
            synth,
            fingerprint,
            name,
            data,
            favorite,
            source_kind,
            source_name,
            imported_at,
        });
    }

    Ok(patches)
}
