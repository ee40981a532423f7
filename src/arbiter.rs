//! # Category Arbiter
//!
//! Resolves disagreements between models with a static lookup: for every
//! category the model with the highest known accuracy wins, for every sample,
//! whatever the row content. Accuracies are external constants supplied as an
//! [`AccuracyTable`]; the arbiter never computes them.
//!
//! Ties go to the later model, so with two models the second one is chosen
//! unless the first is strictly more accurate.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::model::{Category, PredictionRecord, ACTIVATION_METHOD_COLUMN, PARSED_SOFTWARE_COLUMN};
use crate::table::{Cell, Row, TableError};

/// Errors that can occur while loading accuracies or arbitrating
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    /// I/O error reading an accuracy table
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing an accuracy table
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error reading a prediction table
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// A model has no accuracy for a category
    #[error("Model '{model}' has no accuracy for category '{category}'")]
    MissingAccuracy {
        /// Model name
        model: String,
        /// Category label
        category: String,
    },

    /// The accuracy table names a category that does not exist
    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    /// Prediction sets and accuracy table disagree on the number of models
    #[error("Expected predictions from {expected} models, got {found}")]
    ModelCountMismatch {
        /// Models in the accuracy table
        expected: usize,
        /// Prediction sets supplied
        found: usize,
    },

    /// Nothing to arbitrate between
    #[error("No models configured")]
    NoModels,
}

/// Fixed per-category accuracy of one model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAccuracy {
    /// Model name
    pub name: String,
    /// Accuracy per category, in [`Category::ALL`] order
    pub accuracy: [f64; 9],
}

#[derive(Debug, Deserialize)]
struct MetricRecord {
    category: String,
    accuracy: f64,
}

impl ModelAccuracy {
    /// Accuracy from explicit values in category order
    pub fn new(name: impl Into<String>, accuracy: [f64; 9]) -> Self {
        Self {
            name: name.into(),
            accuracy,
        }
    }

    /// Accuracy from a category-label map; every category is required
    pub fn from_map(name: impl Into<String>, values: &HashMap<String, f64>) -> Result<Self, ArbiterError> {
        let name = name.into();
        if let Some(unknown) = values.keys().find(|k| Category::from_label(k).is_none()) {
            return Err(ArbiterError::UnknownCategory(unknown.clone()));
        }

        let mut accuracy = [0.0; 9];
        for category in Category::ALL {
            accuracy[category.index()] =
                *values
                    .get(category.label())
                    .ok_or_else(|| ArbiterError::MissingAccuracy {
                        model: name.clone(),
                        category: category.label().to_string(),
                    })?;
        }
        Ok(Self { name, accuracy })
    }

    /// Read a `category,accuracy` metrics CSV
    pub fn from_metrics_csv<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self, ArbiterError> {
        let file = File::open(path)?;
        Self::read_metrics(name, BufReader::new(file))
    }

    /// Parse a `category,accuracy` metrics CSV from a reader
    pub fn read_metrics<R: Read>(name: impl Into<String>, reader: R) -> Result<Self, ArbiterError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut values = HashMap::new();
        for record in rdr.deserialize() {
            let record: MetricRecord = record?;
            values.insert(record.category, record.accuracy);
        }
        Self::from_map(name, &values)
    }

    /// Accuracy for one category
    pub fn get(&self, category: Category) -> f64 {
        self.accuracy[category.index()]
    }
}

/// Per-category accuracies of every model, in model order
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyTable {
    models: Vec<ModelAccuracy>,
    numbers: Vec<usize>,
}

impl Default for AccuracyTable {
    fn default() -> Self {
        Self::new(vec![
            ModelAccuracy::new(
                "mlp_400_nokey",
                [0.82, 0.41, 0.25, 0.59, 0.28, 0.56, 0.39, 0.44, 0.37],
            ),
            ModelAccuracy::new(
                "mlp_200_nokey",
                [0.56, 0.28, 0.41, 0.37, 0.16, 0.47, 0.28, 0.22, 0.22],
            ),
        ])
    }
}

impl AccuracyTable {
    /// Table over the given models; order defines model numbering
    pub fn new(models: Vec<ModelAccuracy>) -> Self {
        let numbers = (1..=models.len()).collect();
        Self { models, numbers }
    }

    /// Table over a subset of configured models, each with the one-based
    /// number it is reported under
    pub fn numbered(models: Vec<(usize, ModelAccuracy)>) -> Self {
        let (numbers, models) = models.into_iter().unzip();
        Self { models, numbers }
    }

    /// Models in order
    pub fn models(&self) -> &[ModelAccuracy] {
        &self.models
    }

    /// Model names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }

    /// Winning model for one category
    pub fn winner(&self, category: Category) -> Option<Winner> {
        let mut best: Option<Winner> = None;
        for (model, m) in self.models.iter().enumerate() {
            let accuracy = m.get(category);
            if best.map_or(true, |b| accuracy >= b.accuracy) {
                best = Some(Winner {
                    model,
                    number: self.numbers[model],
                    accuracy,
                });
            }
        }
        best
    }

    /// Winning model for every category, in [`Category::ALL`] order
    pub fn winners(&self) -> Result<[Winner; 9], ArbiterError> {
        let mut winners = [Winner::default(); 9];
        for category in Category::ALL {
            winners[category.index()] = self.winner(category).ok_or(ArbiterError::NoModels)?;
        }
        Ok(winners)
    }
}

/// Winning model of a category and its accuracy
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Winner {
    /// Zero-based position in the table
    pub model: usize,
    /// One-based number the model is reported under
    pub number: usize,
    /// Accuracy of that model for the category
    pub accuracy: f64,
}

impl Winner {
    /// Human-readable provenance, e.g. `0.82 Accuracy (Model 1)`
    pub fn provenance(&self) -> String {
        format!("{:?} Accuracy (Model {})", self.accuracy, self.number)
    }
}

/// Per-category winning labels for one sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArbitratedRecord {
    /// Sample key
    pub filename: String,
    /// Winning label per category
    pub labels: [Option<String>; 9],
    /// Provenance string per category
    pub provenance: [String; 9],
    /// Software name parsed from the instrument-info report
    pub parsed_software: Option<String>,
    /// Activation method parsed from the instrument-info report
    pub activation_method: Option<String>,
}

impl ArbitratedRecord {
    /// Winning label of a category
    pub fn label(&self, category: Category) -> Option<&str> {
        self.labels[category.index()].as_deref()
    }

    /// Passthrough columns, then every category with its accuracy column
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert(
            PARSED_SOFTWARE_COLUMN.to_string(),
            Cell::from(self.parsed_software.clone()),
        );
        row.insert(
            ACTIVATION_METHOD_COLUMN.to_string(),
            Cell::from(self.activation_method.clone()),
        );
        for category in Category::ALL {
            row.insert(
                category.label().to_string(),
                Cell::from(self.label(category).map(str::to_string)),
            );
            row.insert(
                format!("{}_Accuracy", category.label()),
                Cell::Text(self.provenance[category.index()].clone()),
            );
        }
        row
    }
}

/// Combine the prediction sets of every model in `accuracy`, in model order.
///
/// Samples, passthrough fields and row order come from the first model's
/// predictions. A sample the winning model did not predict keeps no label for
/// that category.
pub fn arbitrate(
    predictions: &[Vec<PredictionRecord>],
    accuracy: &AccuracyTable,
) -> Result<Vec<ArbitratedRecord>, ArbiterError> {
    if predictions.len() != accuracy.models().len() {
        return Err(ArbiterError::ModelCountMismatch {
            expected: accuracy.models().len(),
            found: predictions.len(),
        });
    }
    let winners = accuracy.winners()?;

    for category in Category::ALL {
        let w = winners[category.index()];
        info!(
            "{}: using {} ({})",
            category,
            accuracy.models()[w.model].name,
            w.provenance()
        );
    }

    let by_model: Vec<HashMap<&str, &PredictionRecord>> = predictions
        .iter()
        .map(|records| records.iter().map(|r| (r.filename.as_str(), r)).collect())
        .collect();

    let mut arbitrated = Vec::with_capacity(predictions[0].len());
    for base in &predictions[0] {
        let mut record = ArbitratedRecord {
            filename: base.filename.clone(),
            parsed_software: base.parsed_software.clone(),
            activation_method: base.activation_method.clone(),
            ..ArbitratedRecord::default()
        };
        for category in Category::ALL {
            let winner = winners[category.index()];
            let label = match by_model[winner.model].get(base.filename.as_str()) {
                Some(prediction) => prediction.label(category).map(str::to_string),
                None => {
                    warn!(
                        "Model {} has no prediction for {}; {} left empty",
                        winner.number,
                        base.filename,
                        category
                    );
                    None
                }
            };
            record.labels[category.index()] = label;
            record.provenance[category.index()] = winner.provenance();
        }
        arbitrated.push(record);
    }
    Ok(arbitrated)
}
