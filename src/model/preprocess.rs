//! Fitted feature preprocessing.
//!
//! A preprocessor is an ordered list of column transformers whose outputs are
//! concatenated into one dense input vector per sample. It is stored as a
//! JSON array:
//!
//! ```json
//! [
//!   {"kind": "standardize", "columns": ["rt_min"], "impute": [12.5], "mean": [12.5], "scale": [4.0]},
//!   {"kind": "one_hot", "columns": ["instrument_model"], "categories": [["LTQ", "Q Exactive"]], "fill": "Not available"}
//! ]
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::table::{Cell, Table, NOT_AVAILABLE};

fn default_fill() -> String {
    NOT_AVAILABLE.to_string()
}

/// One fitted column transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformer {
    /// Impute missing values, then `(x - mean) / scale`
    Standardize {
        /// Input columns
        columns: Vec<String>,
        /// Value substituted for a missing cell, per column
        impute: Vec<f64>,
        /// Centering offset, per column
        mean: Vec<f64>,
        /// Scaling divisor, per column; zero is treated as one
        scale: Vec<f64>,
    },
    /// One indicator per known category; unknown values encode as all zeros
    OneHot {
        /// Input columns
        columns: Vec<String>,
        /// Known categories, per column
        categories: Vec<Vec<String>>,
        /// Value substituted for a missing cell
        #[serde(default = "default_fill")]
        fill: String,
    },
}

impl Transformer {
    /// Input columns consumed by this transformer
    pub fn columns(&self) -> &[String] {
        match self {
            Transformer::Standardize { columns, .. } | Transformer::OneHot { columns, .. } => {
                columns
            }
        }
    }

    /// Number of output features
    pub fn width(&self) -> usize {
        match self {
            Transformer::Standardize { columns, .. } => columns.len(),
            Transformer::OneHot { categories, .. } => categories.iter().map(Vec::len).sum(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        match self {
            Transformer::Standardize {
                columns,
                impute,
                mean,
                scale,
            } => {
                let n = columns.len();
                if impute.len() != n || mean.len() != n || scale.len() != n {
                    return Err(ModelError::DimensionMismatch(format!(
                        "standardize over {} columns has {} impute, {} mean and {} scale values",
                        n,
                        impute.len(),
                        mean.len(),
                        scale.len()
                    )));
                }
            }
            Transformer::OneHot {
                columns,
                categories,
                ..
            } => {
                if categories.len() != columns.len() {
                    return Err(ModelError::DimensionMismatch(format!(
                        "one_hot over {} columns has {} category lists",
                        columns.len(),
                        categories.len()
                    )));
                }
            }
        }
        Ok(())
    }

    fn encode(&self, cells: &[&Cell], out: &mut Vec<f64>) -> Result<(), ModelError> {
        match self {
            Transformer::Standardize {
                columns,
                impute,
                mean,
                scale,
            } => {
                for (i, cell) in cells.iter().enumerate() {
                    let x = match cell {
                        Cell::Number(v) => *v,
                        Cell::Missing => impute[i],
                        Cell::Text(s) => s.parse::<f64>().map_err(|_| ModelError::NonNumeric {
                            column: columns[i].clone(),
                            value: s.clone(),
                        })?,
                    };
                    let divisor = if scale[i] == 0.0 { 1.0 } else { scale[i] };
                    out.push((x - mean[i]) / divisor);
                }
            }
            Transformer::OneHot {
                categories, fill, ..
            } => {
                for (i, cell) in cells.iter().enumerate() {
                    let value = cell.to_label().unwrap_or_else(|| fill.clone());
                    out.extend(
                        categories[i]
                            .iter()
                            .map(|c| if *c == value { 1.0 } else { 0.0 }),
                    );
                }
            }
        }
        Ok(())
    }
}

/// Ordered list of fitted transformers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preprocessor {
    transformers: Vec<Transformer>,
}

impl Preprocessor {
    /// Build from transformers, checking their internal shapes
    pub fn new(transformers: Vec<Transformer>) -> Result<Self, ModelError> {
        let preprocessor = Self { transformers };
        preprocessor.validate()?;
        Ok(preprocessor)
    }

    /// Load a preprocessor artifact
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let file = File::open(path)?;
        let preprocessor: Self = serde_json::from_reader(BufReader::new(file))?;
        preprocessor.validate()?;
        Ok(preprocessor)
    }

    fn validate(&self) -> Result<(), ModelError> {
        self.transformers.iter().try_for_each(Transformer::validate)
    }

    /// Total number of output features
    pub fn width(&self) -> usize {
        self.transformers.iter().map(Transformer::width).sum()
    }

    /// Every input column the transformers read
    pub fn input_columns(&self) -> impl Iterator<Item = &String> {
        self.transformers.iter().flat_map(|t| t.columns().iter())
    }

    /// Encode one table row into a dense feature vector
    pub fn transform_row(&self, table: &Table, key: &str) -> Result<Vec<f64>, ModelError> {
        let mut out = Vec::with_capacity(self.width());
        for transformer in &self.transformers {
            let cells: Vec<&Cell> = transformer
                .columns()
                .iter()
                .map(|c| table.cell(key, c))
                .collect();
            transformer.encode(&cells, &mut out)?;
        }
        Ok(out)
    }

    /// Encode every row of `table`, in row order
    pub fn transform(&self, table: &Table) -> Result<Vec<Vec<f64>>, ModelError> {
        if let Some(column) = self.input_columns().find(|c| !table.has_column(c)) {
            return Err(ModelError::DimensionMismatch(format!(
                "preprocessor reads column '{}' which the aligned table lacks",
                column
            )));
        }
        table
            .keys()
            .map(|key| self.transform_row(table, key))
            .collect()
    }
}
