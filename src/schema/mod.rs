//! # Training Schema Alignment
//!
//! A trained model expects exactly the feature columns it was fit on, in the
//! same order. This module reshapes an arbitrary batch feature table to that
//! contract.
//!
//! ## Imputation source
//!
//! Columns of the hit-statistic families ([`IMPUTED_FAMILIES`]) that are
//! absent from the batch, or present with gaps, are filled with the mean of
//! that column *as observed during training* ([`TrainingMeans`]), never with
//! the batch's own mean. The classifier was fit against training-time
//! statistics, and a batch that never saw a column has no mean for it.
//!
//! Other absent schema columns are synthesized as missing cells and left to
//! the model's preprocessor. Batch columns the schema does not name are
//! dropped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, info};

use crate::table::{self, Table, TableError};

#[cfg(test)]
mod tests;

/// Column-name fragments whose gaps are filled with training-time means
pub const IMPUTED_FAMILIES: [&str; 3] = ["avgevalhits", "counthits", "precursor"];

/// Errors that can occur while loading a schema or aligning to it
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// I/O error reading the schema artifact
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing the schema artifact
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// The schema artifact declares no columns
    #[error("Training schema declares no columns")]
    EmptySchema,

    /// A column needs a training-time mean that the reference cannot provide
    #[error("Schema mismatch: no training reference statistic for column '{0}'")]
    SchemaMismatch(String),
}

/// Family a column belongs to, if its gaps are imputed from training means
pub fn imputed_family(column: &str) -> Option<&'static str> {
    IMPUTED_FAMILIES
        .into_iter()
        .find(|family| column.contains(family))
}

/// Column means observed in a model's training data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingMeans {
    means: HashMap<String, f64>,
}

impl TrainingMeans {
    /// Means from explicit values
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            means: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Means of every all-numeric column of a training reference
    fn from_reference(header: &[String], records: &[Vec<String>]) -> Self {
        let mut means = HashMap::new();
        for (i, column) in header.iter().enumerate() {
            let values: Option<Vec<f64>> = records
                .iter()
                .filter_map(|r| r.get(i))
                .filter(|v| !v.is_empty())
                .map(|v| v.parse::<f64>().ok().filter(|x| !x.is_nan()))
                .collect();
            if let Some(mean) = values.and_then(table::mean) {
                means.insert(column.clone(), mean);
            }
        }
        Self { means }
    }

    /// Training-time mean of a column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.means.get(column).copied()
    }
}

/// Ordered feature columns a trained model requires, with the training-time
/// statistics used to fill gaps
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSchema {
    columns: Vec<String>,
    means: TrainingMeans,
}

impl TrainingSchema {
    /// Schema from explicit columns and means
    pub fn new(columns: Vec<String>, means: TrainingMeans) -> Self {
        Self { columns, means }
    }

    /// Load a schema artifact: a CSV whose header is the column order and
    /// whose rows are the training reference
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let file = File::open(path)?;
        Self::read_csv(BufReader::new(file))
    }

    /// Parse a schema artifact from a reader
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, SchemaError> {
        let (header, records) = table::read_raw_csv(reader)?;
        if header.is_empty() || header.iter().all(|h| h.is_empty()) {
            return Err(SchemaError::EmptySchema);
        }
        let means = TrainingMeans::from_reference(&header, &records);
        Ok(Self {
            columns: header,
            means,
        })
    }

    /// Column order the model expects
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Training-time column means
    pub fn means(&self) -> &TrainingMeans {
        &self.means
    }

    /// Reshape `batch` to exactly this schema's columns, in order.
    ///
    /// Fails with [`SchemaError::SchemaMismatch`] when a hit-statistic column
    /// has gaps and the training reference has no mean for it.
    pub fn align(&self, batch: &Table) -> Result<Table, SchemaError> {
        let dropped: Vec<&String> = batch
            .columns()
            .iter()
            .filter(|c| !self.columns.contains(c))
            .collect();
        if !dropped.is_empty() {
            debug!(
                "Dropping {} batch columns unknown to the model: {:?}",
                dropped.len(),
                dropped
            );
        }

        let mut aligned = batch.select(&self.columns);

        let mut synthesized = 0;
        for column in &self.columns {
            let present = batch.has_column(column);
            let gaps = aligned.missing_count(column);

            match imputed_family(column) {
                Some(_) if gaps > 0 => {
                    let mean = self
                        .means
                        .get(column)
                        .ok_or_else(|| SchemaError::SchemaMismatch(column.clone()))?;
                    aligned.fill_missing_in(column, mean);
                    if !present {
                        synthesized += 1;
                    }
                }
                None if !present => {
                    debug!("Column {} absent from batch; left to the preprocessor", column);
                }
                _ => {}
            }
        }

        if synthesized > 0 {
            info!(
                "Synthesized {} hit-statistic columns from training means",
                synthesized
            );
        }
        Ok(aligned)
    }
}
