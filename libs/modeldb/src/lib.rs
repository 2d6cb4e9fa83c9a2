//! Relational store for extracted SPICE models and subcircuits.
//!
//! SQLite-backed. Three relations hold models, their classified parameters,
//! and captured subcircuit bodies; text columns carry a case-insensitive
//! collation so lookups match the extractor's case folding. A model and its
//! parameters are written as one transaction, so the store never holds
//! orphan parameter rows.
#![warn(missing_docs)]

pub mod extract;
pub mod query;


use std::path::Path;

use netlist::{ModelRecord, ParameterValue, Record, SubcircuitRecord};
use rusqlite::{params, Connection};
use thiserror::Error;

pub use extract::{Extractor, Summary};
pub use query::{ModelFilter, ParameterRange, SubcircuitFilter};

/// The result type returned by store functions.
pub type Result<T> = std::result::Result<T, Error>;

/// Possible store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error.
    #[error("database error")]
    Db(#[from] rusqlite::Error),
    /// I/O error.
    #[error("io error")]
    Io(#[from] std::io::Error),
    /// Error reading a netlist file.
    #[error(transparent)]
    Parse(#[from] netlist::parser::ParserError),
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS models (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL COLLATE NOCASE,
        type TEXT NOT NULL COLLATE NOCASE,
        source_file TEXT NOT NULL,
        line_number INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS parameters (
        id INTEGER PRIMARY KEY,
        model_id INTEGER NOT NULL REFERENCES models (id) ON DELETE CASCADE,
        name TEXT NOT NULL COLLATE NOCASE,
        value TEXT NOT NULL,
        parameter_type TEXT NOT NULL CHECK (parameter_type IN ('NUMERIC', 'STRING')),
        numeric_value REAL
    );

    CREATE TABLE IF NOT EXISTS subcircuits (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL COLLATE NOCASE,
        content TEXT NOT NULL,
        source_file TEXT NOT NULL,
        line_number INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_models_type ON models (type);
    CREATE INDEX IF NOT EXISTS idx_models_name ON models (name);
    CREATE INDEX IF NOT EXISTS idx_parameters_model ON parameters (model_id);
    CREATE INDEX IF NOT EXISTS idx_parameters_name ON parameters (name);
    CREATE INDEX IF NOT EXISTS idx_parameters_numeric
        ON parameters (name, numeric_value) WHERE parameter_type = 'NUMERIC';
    CREATE INDEX IF NOT EXISTS idx_subcircuits_name ON subcircuits (name);
"#;

const INSERT_MODEL_STMT: &str = r#"
    INSERT INTO models (name, type, source_file, line_number) VALUES (?, ?, ?, ?);
"#;

const INSERT_PARAMETER_STMT: &str = r#"
    INSERT INTO parameters (model_id, name, value, parameter_type, numeric_value)
    VALUES (?, ?, ?, ?, ?);
"#;

const INSERT_SUBCIRCUIT_STMT: &str = r#"
    INSERT INTO subcircuits (name, content, source_file, line_number) VALUES (?, ?, ?, ?);
"#;

const CLEAR_STMT: &str = r#"
    DELETE FROM parameters;
    DELETE FROM models;
    DELETE FROM subcircuits;
"#;

/// A store of extracted models and subcircuits.
pub struct ModelDb {
    conn: Connection,
}

impl ModelDb {
    /// Opens (creating if necessary) the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Opens a transient in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Inserts a model and all of its parameters as one transaction,
    /// returning the new model id.
    pub fn insert_model(&mut self, record: &ModelRecord) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            INSERT_MODEL_STMT,
            params![
                record.name.as_str(),
                record.model_type.as_str(),
                record.source_file.as_str(),
                record.line,
            ],
        )?;
        let id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(INSERT_PARAMETER_STMT)?;
            for (name, value) in record.params.iter() {
                match value {
                    ParameterValue::Numeric { raw, scaled } => stmt.execute(params![
                        id,
                        name.as_str(),
                        raw.as_str(),
                        "NUMERIC",
                        *scaled
                    ])?,
                    ParameterValue::String { raw } => stmt.execute(params![
                        id,
                        name.as_str(),
                        raw.as_str(),
                        "STRING",
                        Option::<f64>::None
                    ])?,
                };
            }
        }
        tx.commit()?;
        tracing::debug!(
            name = %record.name,
            model_type = %record.model_type,
            params = record.params.len(),
            "indexed model"
        );
        Ok(id)
    }

    /// Inserts a subcircuit, returning the new row id.
    pub fn insert_subcircuit(&mut self, record: &SubcircuitRecord) -> Result<i64> {
        self.conn.execute(
            INSERT_SUBCIRCUIT_STMT,
            params![
                record.name.as_str(),
                record.content.as_str(),
                record.source_file.as_str(),
                record.line,
            ],
        )?;
        tracing::debug!(name = %record.name, "indexed subcircuit");
        Ok(self.conn.last_insert_rowid())
    }

    /// Inserts any parser record.
    pub fn insert_record(&mut self, record: &Record) -> Result<()> {
        match record {
            Record::Model(model) => self.insert_model(model)?,
            Record::Subcircuit(subckt) => self.insert_subcircuit(subckt)?,
        };
        Ok(())
    }

    /// Deletes every stored model, parameter, and subcircuit.
    pub fn clear(&mut self) -> Result<()> {
        self.conn.execute_batch(CLEAR_STMT)?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}
