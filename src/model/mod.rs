//! # Multi-Model Predictor
//!
//! A trained model is a set of four artifacts sharing a name prefix in the
//! models directory:
//!
//! | File | Content |
//! |------|---------|
//! | `{name}_train_features.csv` | [`TrainingSchema`] header and training reference rows |
//! | `{name}_preprocessor.json` | fitted [`Preprocessor`] |
//! | `{name}_model.json` | fitted [`Mlp`] classifier |
//! | `{name}_label_encoders.json` | per-category [`LabelDecoders`] |
//!
//! Prediction aligns the batch feature table to the model's schema, encodes
//! it, runs the classifier once per sample and decodes one label for each of
//! the nine [`Category`] heads. The parsed software and activation method are
//! copied from the unaligned feature row rather than predicted.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::schema::TrainingSchema;
use crate::table::{Cell, Row, Table, FILENAME_COLUMN};

pub use error::ModelError;
pub use labels::LabelDecoders;
pub use mlp::{Activation, Classifier, Layer, Mlp};
pub use preprocess::{Preprocessor, Transformer};

mod error;
mod labels;
mod mlp;
mod preprocess;


/// Output column carrying the software name parsed from the report
pub const PARSED_SOFTWARE_COLUMN: &str = "Parsed Software";

/// Output column carrying the activation method parsed from the report
pub const ACTIVATION_METHOD_COLUMN: &str = "Activation Method";

/// Feature column the parsed software is copied from
pub const SOFTWARE_FEATURE: &str = "software";

/// Feature column the parsed activation method is copied from
pub const ACTIVATION_FEATURE: &str = "activation_method";

/// Predicted metadata category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Biological domain
    Domain,
    /// Source organism
    Organism,
    /// Tissue or organ
    OrganismPart,
    /// Associated disease
    Diseases,
    /// Post-translational modification
    Modification,
    /// Experiment type
    ExperimentType,
    /// Instrument model
    Instrument,
    /// Quantification method
    Quantification,
    /// Analysis software
    Software,
}

impl Category {
    /// Every category, in classifier head order
    pub const ALL: [Category; 9] = [
        Category::Domain,
        Category::Organism,
        Category::OrganismPart,
        Category::Diseases,
        Category::Modification,
        Category::ExperimentType,
        Category::Instrument,
        Category::Quantification,
        Category::Software,
    ];

    /// Column label used in artifacts and configuration
    pub fn label(self) -> &'static str {
        match self {
            Category::Domain => "Domain",
            Category::Organism => "Organism",
            Category::OrganismPart => "Organism part",
            Category::Diseases => "Diseases",
            Category::Modification => "Modification",
            Category::ExperimentType => "Experiment Type",
            Category::Instrument => "Instrument",
            Category::Quantification => "Quantification",
            Category::Software => "Software",
        }
    }

    /// Category for a column label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Position in head order
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One model's predicted labels for one sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionRecord {
    /// Sample key
    pub filename: String,
    /// Decoded label per category, in [`Category::ALL`] order
    pub labels: [Option<String>; 9],
    /// Software name parsed from the instrument-info report
    pub parsed_software: Option<String>,
    /// Activation method parsed from the instrument-info report
    pub activation_method: Option<String>,
}

impl PredictionRecord {
    /// Record with no labels
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Label for a category
    pub fn label(&self, category: Category) -> Option<&str> {
        self.labels[category.index()].as_deref()
    }

    /// Set the label for a category
    pub fn set_label(&mut self, category: Category, label: impl Into<String>) {
        self.labels[category.index()] = Some(label.into());
    }

    /// Row with the categories followed by the passthrough columns
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        for category in Category::ALL {
            row.insert(
                category.label().to_string(),
                Cell::from(self.label(category).map(str::to_string)),
            );
        }
        row.insert(
            PARSED_SOFTWARE_COLUMN.to_string(),
            Cell::from(self.parsed_software.clone()),
        );
        row.insert(
            ACTIVATION_METHOD_COLUMN.to_string(),
            Cell::from(self.activation_method.clone()),
        );
        row
    }

    /// Record from a prediction table row
    pub fn from_row(filename: &str, table: &Table) -> Self {
        let mut record = Self::new(filename);
        for category in Category::ALL {
            record.labels[category.index()] = table.cell(filename, category.label()).to_label();
        }
        record.parsed_software = table.cell(filename, PARSED_SOFTWARE_COLUMN).to_label();
        record.activation_method = table.cell(filename, ACTIVATION_METHOD_COLUMN).to_label();
        record
    }
}

/// Table of prediction records with the fixed prediction column order
pub fn predictions_table(records: &[PredictionRecord]) -> Table {
    let mut table = Table::with_columns(Category::ALL.iter().map(|c| c.label()));
    table.push_column(PARSED_SOFTWARE_COLUMN);
    table.push_column(ACTIVATION_METHOD_COLUMN);
    for record in records {
        table.insert_row(record.filename.clone(), record.to_row());
    }
    table
}

/// Read a `{model}_predicted_metadata.csv` artifact
pub fn read_predictions<P: AsRef<Path>>(path: P) -> Result<Vec<PredictionRecord>, ModelError> {
    let table = Table::from_csv_path(path, FILENAME_COLUMN)?;
    Ok(table
        .keys()
        .map(|key| PredictionRecord::from_row(key, &table))
        .collect())
}

/// Canonical artifact paths of a named model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Training schema and reference rows
    pub train_features: PathBuf,
    /// Fitted preprocessor
    pub preprocessor: PathBuf,
    /// Fitted classifier
    pub classifier: PathBuf,
    /// Label decoders
    pub label_encoders: PathBuf,
    /// Optional per-category accuracy table
    pub metrics: PathBuf,
}

impl ModelPaths {
    /// Paths of model `name` in `models_dir`
    pub fn new(models_dir: &Path, name: &str) -> Self {
        Self {
            train_features: models_dir.join(format!("{name}_train_features.csv")),
            preprocessor: models_dir.join(format!("{name}_preprocessor.json")),
            classifier: models_dir.join(format!("{name}_model.json")),
            label_encoders: models_dir.join(format!("{name}_label_encoders.json")),
            metrics: models_dir.join(format!("{name}_metrics.csv")),
        }
    }

    fn require(path: &Path) -> Result<&Path, ModelError> {
        if path.is_file() {
            Ok(path)
        } else {
            Err(ModelError::MissingArtifact(path.to_path_buf()))
        }
    }
}

/// A loaded model: schema, preprocessor, classifier and decoders
#[derive(Debug, Clone)]
pub struct ModelBundle<C = Mlp> {
    name: String,
    schema: TrainingSchema,
    preprocessor: Preprocessor,
    classifier: C,
    decoders: LabelDecoders,
}

impl ModelBundle<Mlp> {
    /// Load model `name` from `models_dir`
    pub fn load(models_dir: &Path, name: &str) -> Result<Self, ModelError> {
        let paths = ModelPaths::new(models_dir, name);
        let schema = TrainingSchema::from_csv_path(ModelPaths::require(&paths.train_features)?)?;
        let preprocessor = Preprocessor::from_json_path(ModelPaths::require(&paths.preprocessor)?)?;
        let classifier = Mlp::from_json_path(ModelPaths::require(&paths.classifier)?)?;
        let decoders = LabelDecoders::from_json_path(ModelPaths::require(&paths.label_encoders)?)?;

        info!(
            "Loaded model {} ({} schema columns, {} encoded features)",
            name,
            schema.columns().len(),
            preprocessor.width()
        );
        Self::new(name, schema, preprocessor, classifier, decoders)
    }
}

impl<C: Classifier> ModelBundle<C> {
    /// Assemble a model, checking the artifacts fit together
    pub fn new(
        name: impl Into<String>,
        schema: TrainingSchema,
        preprocessor: Preprocessor,
        classifier: C,
        decoders: LabelDecoders,
    ) -> Result<Self, ModelError> {
        if preprocessor.width() != classifier.input_width() {
            return Err(ModelError::DimensionMismatch(format!(
                "preprocessor emits {} features, classifier expects {}",
                preprocessor.width(),
                classifier.input_width()
            )));
        }
        if classifier.heads().len() != Category::ALL.len() {
            return Err(ModelError::DimensionMismatch(format!(
                "classifier has {} heads, expected {}",
                classifier.heads().len(),
                Category::ALL.len()
            )));
        }
        if let Some(column) = preprocessor
            .input_columns()
            .find(|c| !schema.columns().contains(c))
        {
            return Err(ModelError::DimensionMismatch(format!(
                "preprocessor reads column '{}' outside the training schema",
                column
            )));
        }

        Ok(Self {
            name: name.into(),
            schema,
            preprocessor,
            classifier,
            decoders,
        })
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Training schema the batch is aligned to
    pub fn schema(&self) -> &TrainingSchema {
        &self.schema
    }

    /// Predict every category for every sample of `features`.
    ///
    /// Records are returned in the feature table's row order and carry the
    /// sample key, so callers never rely on positions.
    pub fn predict(&self, features: &Table) -> Result<Vec<PredictionRecord>, ModelError> {
        let aligned = self.schema.align(features)?;
        let matrix = self.preprocessor.transform(&aligned)?;

        let mut records = Vec::with_capacity(matrix.len());
        for (key, input) in aligned.keys().zip(&matrix) {
            let codes = self.classifier.predict(input)?;

            let mut record = PredictionRecord::new(key);
            for (category, code) in Category::ALL.into_iter().zip(codes) {
                record.set_label(category, self.decoders.decode(category, code)?);
            }
            record.parsed_software = features.cell(key, SOFTWARE_FEATURE).to_label();
            record.activation_method = features.cell(key, ACTIVATION_FEATURE).to_label();

            debug!("{}: {} predicted {:?}", self.name, key, record.labels);
            records.push(record);
        }

        info!("Model {} predicted {} samples", self.name, records.len());
        Ok(records)
    }
}
