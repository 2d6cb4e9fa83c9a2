//! Extraction driver.
//!
//! Walks netlist files sequentially, streaming each parser record into the
//! store as it completes. A file that cannot be read aborts only that file;
//! every complete directive parsed before a failure point is kept.

use std::path::{Path, PathBuf};

use netlist::{AnomalyLog, Parser, Record};

use crate::{Error, ModelDb, Result};

/// File extensions recognized when scanning a directory for netlists.
pub const NETLIST_EXTENSIONS: &[&str] = &["sp", "spice", "cir", "ckt", "net", "lib", "mod", "inc"];

/// Streams extracted netlist records into a [`ModelDb`].
pub struct Extractor {
    db: ModelDb,
    log: AnomalyLog,
}

/// Totals for one extraction run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Files successfully parsed.
    pub files: usize,
    /// Models indexed.
    pub models: usize,
    /// Subcircuits indexed.
    pub subcircuits: usize,
    /// Files skipped because they could not be read.
    pub failed: Vec<PathBuf>,
}

impl Extractor {
    /// Makes an extractor with anomaly logging suppressed.
    pub fn new(db: ModelDb) -> Self {
        Self {
            db,
            log: AnomalyLog::disabled(),
        }
    }

    /// Makes an extractor appending one line per anomaly to `log_path`.
    ///
    /// The sink stays open for the lifetime of the extractor.
    pub fn with_log_path(db: ModelDb, log_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db,
            log: AnomalyLog::to_path(log_path)?,
        })
    }

    /// Extracts one netlist file into the store, returning the number of
    /// models and subcircuits indexed.
    pub fn extract_file(&mut self, path: impl AsRef<Path>) -> Result<(usize, usize)> {
        let path = path.as_ref();
        let parser = Parser::from_path(path, self.log.clone())?;
        let mut models = 0;
        let mut subcircuits = 0;
        for record in parser {
            match &record {
                Record::Model(_) => models += 1,
                Record::Subcircuit(_) => subcircuits += 1,
            }
            self.db.insert_record(&record)?;
        }
        tracing::debug!(?path, models, subcircuits, "extracted netlist");
        Ok((models, subcircuits))
    }

    /// Extracts every netlist under the given paths, in order. Directories
    /// are scanned recursively for files with conventional SPICE extensions
    /// ([`NETLIST_EXTENSIONS`]); explicit file paths are taken as-is.
    ///
    /// Unreadable files are recorded in the summary and skipped; store
    /// errors abort the run.
    pub fn extract_paths(&mut self, paths: &[PathBuf]) -> Result<Summary> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                collect_netlists(path, &mut files)?;
            } else {
                files.push(path.clone());
            }
        }

        let mut summary = Summary::default();
        for file in files {
            match self.extract_file(&file) {
                Ok((models, subcircuits)) => {
                    summary.files += 1;
                    summary.models += models;
                    summary.subcircuits += subcircuits;
                }
                Err(Error::Parse(err)) => {
                    tracing::warn!("{err}");
                    summary.failed.push(file);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(summary)
    }

    /// Consumes the extractor, yielding the store.
    pub fn into_db(self) -> ModelDb {
        self.db
    }

    /// The underlying store.
    pub fn db(&self) -> &ModelDb {
        &self.db
    }
}

/// Recursively gathers netlist files under `dir`, sorted for a stable
/// extraction order.
fn collect_netlists(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_netlists(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                NETLIST_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
        {
            out.push(path);
        }
    }
    Ok(())
}
