//! # Pipeline Orchestration
//!
//! Runs the stages in order against one output directory:
//!
//! 1. external tools (instrument info, tolerances, parameter files, search)
//! 2. feature table
//! 3. per-model predictions
//! 4. arbitration and narrative (`metadata_result.csv`)
//! 5. keyword scan
//!
//! Every stage writes one artifact at a canonical path ([`OutputLayout`]) and
//! is skipped when that artifact already exists. Per-sample failures never
//! stop the run. A model whose schema cannot be satisfied is dropped from the
//! run; missing or unreadable model artifacts stop it.

use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::arbiter::{self, AccuracyTable, ArbiterError, ModelAccuracy};
use crate::artifact::{self, StageStatus};
use crate::features::{FeatureError, FeatureTableBuilder, DEFAULT_WORKERS};
use crate::ident::DEFAULT_SCORE_THRESHOLD;
use crate::keywords::{KeywordError, KeywordScan};
use crate::model::{self, ModelBundle, ModelError, ModelPaths, PredictionRecord};
use crate::narrative;
use crate::schema::SchemaError;
use crate::table::{Table, TableError, FILENAME_COLUMN};
use crate::tools::{self, ToolConfig, ToolError, ToolRunner};

/// Errors that stop a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// I/O error on the output directory
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Feature table stage failed
    #[error("Feature error: {0}")]
    FeatureError(#[from] FeatureError),

    /// A model could not be loaded or applied
    #[error("Model '{model}': {source}")]
    ModelError {
        /// Model name
        model: String,
        /// Underlying error
        source: ModelError,
    },

    /// Arbitration failed
    #[error("Arbiter error: {0}")]
    ArbiterError(#[from] ArbiterError),

    /// Tool stage failed
    #[error("Tool error: {0}")]
    ToolError(#[from] ToolError),

    /// Keyword scan failed
    #[error("Keyword error: {0}")]
    KeywordError(#[from] KeywordError),

    /// Error reading or writing a table
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// No model produced predictions
    #[error("No model predictions available")]
    NoPredictions,
}

/// Canonical artifact paths below an output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Instrument-info reports
    pub fn fileinfo_dir(&self) -> PathBuf {
        self.root.join("fileinfo")
    }

    /// Instrument-info feature table
    pub fn fileinfo_features(&self) -> PathBuf {
        self.fileinfo_dir().join("fileinfo_extracted_features.csv")
    }

    /// Tolerance predictions
    pub fn tolerances_dir(&self) -> PathBuf {
        self.root.join("tolerances")
    }

    /// Search parameter files
    pub fn param_dir(&self) -> PathBuf {
        self.root.join("param_files")
    }

    /// Default identification result directory
    pub fn idxml_dir(&self) -> PathBuf {
        self.root.join("idxml")
    }

    /// Merged feature table
    pub fn features(&self) -> PathBuf {
        self.root.join("extracted_features.csv")
    }

    /// Prediction table of one model
    pub fn predictions(&self, model: &str) -> PathBuf {
        self.root.join(format!("{model}_predicted_metadata.csv"))
    }

    /// Arbitrated metadata with narrative
    pub fn metadata_result(&self) -> PathBuf {
        self.root.join("metadata_result.csv")
    }

    /// Keyword presence table
    pub fn keyword_results(&self) -> PathBuf {
        self.root.join("keywords").join("keyword_parsing_results.csv")
    }
}

/// A configured model and, optionally, its fixed accuracies
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    /// Artifact name prefix
    pub name: String,
    /// Per-category accuracy; read from `{name}_metrics.csv` when absent
    pub accuracy: Option<ModelAccuracy>,
}

impl ModelSpec {
    /// Model without configured accuracies
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accuracy: None,
        }
    }
}

/// Settings of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Concurrent per-sample workers
    pub workers: usize,
    /// Identification score acceptance threshold
    pub score_threshold: f64,
    /// Directory holding model artifacts
    pub models_dir: PathBuf,
    /// Models in arbitration order
    pub models: Vec<ModelSpec>,
    /// External tools
    pub tools: ToolConfig,
    /// Keywords for the presence scan
    pub keywords: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let models = AccuracyTable::default()
            .models()
            .iter()
            .map(|m| ModelSpec {
                name: m.name.clone(),
                accuracy: Some(m.clone()),
            })
            .collect();
        Self {
            workers: DEFAULT_WORKERS,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            models_dir: PathBuf::from("models"),
            models,
            tools: ToolConfig::default(),
            keywords: crate::keywords::DEFAULT_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl PipelineConfig {
    /// Accuracy of a configured model, from config or its metrics file
    pub fn accuracy_of(&self, spec: &ModelSpec) -> Result<ModelAccuracy, ArbiterError> {
        match &spec.accuracy {
            Some(accuracy) => Ok(accuracy.clone()),
            None => {
                let path = ModelPaths::new(&self.models_dir, &spec.name).metrics;
                ModelAccuracy::from_metrics_csv(&spec.name, path)
            }
        }
    }
}

/// Predictions of one model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPredictions {
    /// Model name
    pub model: String,
    /// One record per sample
    pub records: Vec<PredictionRecord>,
    /// Whether the prediction artifact was written in this run
    pub status: StageStatus,
}

/// What a full run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Samples in the feature table
    pub samples: usize,
    /// Feature table stage
    pub features: StageStatus,
    /// Prediction stage per model that produced predictions
    pub predictions: Vec<(String, StageStatus)>,
    /// Metadata result stage
    pub metadata: StageStatus,
}

/// Stage runner bound to a configuration and an output directory
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    layout: OutputLayout,
}

impl Pipeline {
    /// Pipeline writing below `output_dir`
    pub fn new(config: PipelineConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            layout: OutputLayout::new(output_dir),
        }
    }

    /// Run configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Artifact paths
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run the external tools for every mzML in `mzml_dir`
    pub fn run_tools(
        &self,
        runner: &dyn ToolRunner,
        mzml_dir: &Path,
        idxml_dir: &Path,
    ) -> Result<(), PipelineError> {
        let tools = &self.config.tools;

        let fileinfo = tools::generate_fileinfo(runner, tools, mzml_dir, &self.layout.fileinfo_dir())?;
        info!("Instrument info: {:?}", fileinfo);

        let tolerances =
            tools::predict_tolerances(runner, tools, mzml_dir, &self.layout.tolerances_dir())?;
        info!("Tolerance prediction: {:?}", tolerances);

        let parameters = tools::write_parameter_files(
            &self.layout.tolerances_dir(),
            &self.layout.fileinfo_dir(),
            &self.layout.param_dir(),
        )?;
        info!("Search parameters: {:?}", parameters);

        let search = tools::run_identification(
            runner,
            tools,
            mzml_dir,
            &self.layout.param_dir(),
            idxml_dir,
        )?;
        info!("Identification search: {:?}", search);
        Ok(())
    }

    /// Build or read back the feature table
    pub fn build_features(&self, idxml_dir: Option<&Path>) -> Result<(Table, StageStatus), PipelineError> {
        let mut builder = FeatureTableBuilder::new(self.layout.fileinfo_dir(), self.layout.features())
            .with_text_output(self.layout.fileinfo_features())
            .with_workers(self.config.workers)
            .with_score_threshold(self.config.score_threshold);
        if let Some(dir) = idxml_dir {
            builder = builder.with_idxml_dir(dir);
        }
        Ok(builder.build()?)
    }

    /// Predict with every configured model.
    ///
    /// Models with an existing prediction artifact are read back. A model
    /// whose schema cannot be satisfied is logged and left out.
    pub fn predict(&self, features: &Table) -> Result<Vec<ModelPredictions>, PipelineError> {
        let mut all = Vec::with_capacity(self.config.models.len());
        for spec in &self.config.models {
            let name = spec.name.as_str();
            let path = self.layout.predictions(name);
            let model_error = |source| PipelineError::ModelError {
                model: name.to_string(),
                source,
            };

            if artifact::skip_if_present(&path, &format!("Predictions of {name}")) {
                let records = model::read_predictions(&path).map_err(model_error)?;
                all.push(ModelPredictions {
                    model: name.to_string(),
                    records,
                    status: StageStatus::Skipped,
                });
                continue;
            }

            let bundle = ModelBundle::load(&self.config.models_dir, name).map_err(model_error)?;
            let records = match bundle.predict(features) {
                Ok(records) => records,
                Err(ModelError::SchemaError(e @ SchemaError::SchemaMismatch(_))) => {
                    error!("Model {} skipped: {}", name, e);
                    continue;
                }
                Err(e) => return Err(model_error(e)),
            };

            model::predictions_table(&records).write_csv_path(&path, FILENAME_COLUMN)?;
            info!("Predictions of {} written to {}", name, path.display());
            all.push(ModelPredictions {
                model: name.to_string(),
                records,
                status: StageStatus::Written,
            });
        }
        Ok(all)
    }

    /// Read back every configured model's prediction artifact that exists
    pub fn read_predictions(&self) -> Result<Vec<ModelPredictions>, PipelineError> {
        let mut all = Vec::new();
        for spec in &self.config.models {
            let path = self.layout.predictions(&spec.name);
            if !artifact::is_present(&path) {
                warn!("No predictions of {} at {}", spec.name, path.display());
                continue;
            }
            let records = model::read_predictions(&path).map_err(|source| PipelineError::ModelError {
                model: spec.name.clone(),
                source,
            })?;
            all.push(ModelPredictions {
                model: spec.name.clone(),
                records,
                status: StageStatus::Skipped,
            });
        }
        Ok(all)
    }

    /// Arbitrate the predictions and write the metadata result with its
    /// narrative fields
    pub fn annotate(&self, predictions: &[ModelPredictions]) -> Result<StageStatus, PipelineError> {
        let output = self.layout.metadata_result();
        if artifact::skip_if_present(&output, "Metadata result") {
            return Ok(StageStatus::Skipped);
        }
        if predictions.is_empty() {
            return Err(PipelineError::NoPredictions);
        }

        // Survivors keep the number of their configured position
        let mut accuracies = Vec::with_capacity(predictions.len());
        for (i, p) in predictions.iter().enumerate() {
            let (number, spec) = match self.config.models.iter().position(|s| s.name == p.model) {
                Some(pos) => (pos + 1, self.config.models[pos].clone()),
                None => (i + 1, ModelSpec::named(&p.model)),
            };
            accuracies.push((number, self.config.accuracy_of(&spec)?));
        }
        let table = AccuracyTable::numbered(accuracies);

        let sets: Vec<Vec<PredictionRecord>> = predictions.iter().map(|p| p.records.clone()).collect();
        let records = arbiter::arbitrate(&sets, &table)?;

        narrative::metadata_table(&records).write_csv_path(&output, FILENAME_COLUMN)?;
        info!(
            "Metadata for {} samples written to {}",
            records.len(),
            output.display()
        );
        Ok(StageStatus::Written)
    }

    /// Scan the spectrum files for keywords
    pub fn scan_keywords(&self, mzml_dir: &Path) -> Result<StageStatus, PipelineError> {
        let scan = KeywordScan::default()
            .with_keywords(self.config.keywords.iter().cloned())
            .with_workers(self.config.workers);
        Ok(scan.run(mzml_dir, &self.layout.keyword_results())?)
    }

    /// Run every stage.
    ///
    /// `idxml_dir` overrides the default identification directory; with
    /// `runner` set to `None` the external tools are not invoked and their
    /// outputs must already exist.
    pub fn run(
        &self,
        runner: Option<&dyn ToolRunner>,
        mzml_dir: &Path,
        idxml_dir: Option<&Path>,
    ) -> Result<RunSummary, PipelineError> {
        std::fs::create_dir_all(self.layout.root())?;
        let idxml_dir = idxml_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.layout.idxml_dir());

        let mzml_count = artifact::list_files(mzml_dir, ".mzML")?.len();
        if mzml_count == 0 {
            warn!(
                "No mzML files were detected in {}; only existing artifacts will be used",
                mzml_dir.display()
            );
        } else {
            info!("Metadata inference will be performed on {} mzML files", mzml_count);
        }

        if let Some(runner) = runner {
            self.run_tools(runner, mzml_dir, &idxml_dir)?;
        }

        let (features, features_status) = self.build_features(Some(idxml_dir.as_path()))?;
        let predictions = self.predict(&features)?;
        let metadata = self.annotate(&predictions)?;

        if let Err(e) = self.scan_keywords(mzml_dir) {
            warn!("Keyword scan failed: {}", e);
        }

        Ok(RunSummary {
            samples: features.len(),
            features: features_status,
            predictions: predictions
                .iter()
                .map(|p| (p.model.clone(), p.status))
                .collect(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/out");
        assert_eq!(layout.features(), PathBuf::from("/out/extracted_features.csv"));
        assert_eq!(
            layout.predictions("mlp_400_nokey"),
            PathBuf::from("/out/mlp_400_nokey_predicted_metadata.csv")
        );
        assert_eq!(
            layout.fileinfo_features(),
            PathBuf::from("/out/fileinfo/fileinfo_extracted_features.csv")
        );
        assert_eq!(
            layout.keyword_results(),
            PathBuf::from("/out/keywords/keyword_parsing_results.csv")
        );
    }

    #[test]
    fn test_default_config_carries_fixed_accuracies() {
        let config = PipelineConfig::default();
        let names: Vec<&str> = config.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["mlp_400_nokey", "mlp_200_nokey"]);
        assert_eq!(config.workers, 4);
        assert_eq!(config.score_threshold, 1e-5);

        let acc = config.accuracy_of(&config.models[0]).unwrap();
        assert_eq!(acc.accuracy[0], 0.82);
    }

    #[test]
    fn test_accuracy_falls_back_to_metrics_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            models_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let spec = ModelSpec::named("custom");
        assert!(config.accuracy_of(&spec).is_err());

        let rows: String = crate::model::Category::ALL
            .iter()
            .map(|c| format!("{},0.5\n", c.label()))
            .collect();
        std::fs::write(
            dir.path().join("custom_metrics.csv"),
            format!("category,accuracy\n{rows}"),
        )
        .unwrap();
        assert_eq!(config.accuracy_of(&spec).unwrap().accuracy, [0.5; 9]);
    }

    #[test]
    fn test_annotate_requires_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineConfig::default(), dir.path());
        assert!(matches!(
            pipeline.annotate(&[]),
            Err(PipelineError::NoPredictions)
        ));
    }
}
