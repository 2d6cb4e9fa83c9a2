//! Filtered lookups over the store.
//!
//! Model queries are composed dynamically: the type/name restrictions go in
//! a subquery capped at the filter's maximum, one `EXISTS` clause is ANDed
//! in per parameter-range predicate, and the surviving models are joined
//! back to `parameters` to collect their full parameter maps. All matching
//! is case-insensitive; reported parameter values are the raw source text
//! with SI suffixes intact (the scaled numeric is only used for filtering).

use indexmap::IndexMap;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::{ModelDb, Result};

/// The result cap applied when a filter does not specify one.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Inclusive numeric bounds on one model parameter.
///
/// At least one bound should be present for the predicate to restrict
/// anything; a predicate still requires the parameter to exist with a
/// numeric classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    /// The parameter name.
    pub name: String,
    /// Inclusive lower bound on the scaled value.
    #[serde(default)]
    pub min: Option<f64>,
    /// Inclusive upper bound on the scaled value.
    #[serde(default)]
    pub max: Option<f64>,
}

/// Filter for model lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFilter {
    /// The required model type, e.g. `nmos`.
    pub model_type: String,
    /// Optional SQL-LIKE pattern on the model name (`%` wildcard).
    #[serde(default)]
    pub name_pattern: Option<String>,
    /// Parameter range predicates; every predicate must hold.
    #[serde(default)]
    pub ranges: Vec<ParameterRange>,
    /// Maximum number of distinct models returned.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl ModelFilter {
    /// A filter matching every model of the given type.
    pub fn of_type(model_type: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            name_pattern: None,
            ranges: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Filter for subcircuit lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubcircuitFilter {
    /// Optional SQL-LIKE pattern on the subcircuit name.
    #[serde(default)]
    pub name_pattern: Option<String>,
    /// Maximum number of subcircuits returned.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// Parameters of one matched model: parameter name → raw value text.
pub type ParameterMap = IndexMap<String, String>;

/// A matched subcircuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcircuitEntry {
    /// The captured body.
    pub content: String,
    /// The file the subcircuit came from.
    pub source_file: String,
    /// The 1-based line of the `.subckt` header.
    pub line_number: u32,
}

/// One model type and how many models carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTypeCount {
    /// The model type.
    pub model_type: String,
    /// The number of stored models of that type.
    pub count: u64,
}

impl ModelDb {
    /// Looks up models matching the filter.
    ///
    /// Returns model name → (parameter name → raw value), capped at the
    /// filter's maximum over distinct models.
    pub fn query_models(&self, filter: &ModelFilter) -> Result<IndexMap<String, ParameterMap>> {
        let mut sql = String::from(
            "SELECT m.id, m.name, p.name, p.value \
             FROM (SELECT id, name FROM models WHERE type = ?",
        );
        let mut args: Vec<SqlValue> = vec![SqlValue::from(filter.model_type.clone())];
        if let Some(pattern) = &filter.name_pattern {
            sql.push_str(" AND name LIKE ?");
            args.push(SqlValue::from(pattern.clone()));
        }
        for range in &filter.ranges {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM parameters q \
                 WHERE q.model_id = models.id AND q.name = ? \
                 AND q.parameter_type = 'NUMERIC'",
            );
            args.push(SqlValue::from(range.name.clone()));
            if let Some(min) = range.min {
                sql.push_str(" AND q.numeric_value >= ?");
                args.push(SqlValue::from(min));
            }
            if let Some(max) = range.max {
                sql.push_str(" AND q.numeric_value <= ?");
                args.push(SqlValue::from(max));
            }
            sql.push(')');
        }
        sql.push_str(" ORDER BY id LIMIT ?) AS m");
        args.push(SqlValue::from(filter.max_results as i64));
        sql.push_str(" LEFT JOIN parameters p ON p.model_id = m.id ORDER BY m.id");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut results: IndexMap<String, ParameterMap> = IndexMap::new();
        for row in rows {
            let (model, param, value) = row?;
            let entry = results.entry(model).or_default();
            if let (Some(param), Some(value)) = (param, value) {
                entry.insert(param, value);
            }
        }
        Ok(results)
    }

    /// Looks up subcircuits matching the filter.
    ///
    /// Returns subcircuit name → (content, source file, line), capped at the
    /// filter's maximum.
    pub fn search_subcircuits(
        &self,
        filter: &SubcircuitFilter,
    ) -> Result<IndexMap<String, SubcircuitEntry>> {
        let mut sql = String::from(
            "SELECT name, content, source_file, line_number FROM subcircuits",
        );
        let mut args: Vec<SqlValue> = Vec::new();
        if let Some(pattern) = &filter.name_pattern {
            sql.push_str(" WHERE name LIKE ?");
            args.push(SqlValue::from(pattern.clone()));
        }
        sql.push_str(" ORDER BY id LIMIT ?");
        args.push(SqlValue::from(filter.max_results as i64));

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok((
                row.get::<_, String>(0)?,
                SubcircuitEntry {
                    content: row.get(1)?,
                    source_file: row.get(2)?,
                    line_number: row.get(3)?,
                },
            ))
        })?;

        let mut results = IndexMap::new();
        for row in rows {
            let (name, entry) = row?;
            results.insert(name, entry);
        }
        Ok(results)
    }

    /// Every distinct model type in the store, with model counts.
    pub fn list_model_types(&self) -> Result<Vec<ModelTypeCount>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT type, COUNT(*) FROM models GROUP BY type ORDER BY type")?;
        let rows = stmt.query_map([], |row| {
            Ok(ModelTypeCount {
                model_type: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    /// The number of stored models.
    pub fn model_count(&self) -> Result<u64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM models", [], |row| row.get(0))
            .optional()?
            .unwrap_or(0);
        Ok(count)
    }
}
