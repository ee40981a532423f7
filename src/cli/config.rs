//! TOML configuration file support.
//!
//! Every field is optional and overrides the built-in default:
//!
//! ```toml
//! # mzinfer.toml
//! [pipeline]
//! workers = 8
//! score_threshold = 1e-5
//! models_dir = "models"
//!
//! [tools]
//! database = "uniprot_sprot.fasta"
//! threads = 16
//!
//! [[models]]
//! name = "mlp_400_nokey"
//! [models.accuracy]
//! Domain = 0.82
//! Organism = 0.41
//! ```
//!
//! A `[[models]]` list replaces the default model list. A model without an
//! `accuracy` table reads `{name}_metrics.csv` from the models directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use mzinfer::arbiter::ModelAccuracy;
use mzinfer::pipeline::{ModelSpec, PipelineConfig};

/// Root configuration structure for mzinfer.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Pipeline-wide settings.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// External tool settings.
    #[serde(default)]
    pub tools: ToolsSection,

    /// Models in arbitration order.
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

/// `[pipeline]` section.
#[derive(Debug, Default, Deserialize)]
pub struct PipelineSection {
    /// Concurrent per-sample workers.
    pub workers: Option<usize>,

    /// Identification score acceptance threshold.
    pub score_threshold: Option<f64>,

    /// Directory holding model artifacts.
    pub models_dir: Option<PathBuf>,

    /// Keywords for the presence scan.
    pub keywords: Option<Vec<String>>,
}

/// `[tools]` section.
#[derive(Debug, Default, Deserialize)]
pub struct ToolsSection {
    pub fileinfo: Option<String>,
    pub param_medic: Option<String>,
    pub comet_adapter: Option<String>,
    pub comet_executable: Option<String>,
    pub database: Option<PathBuf>,
    pub threads: Option<usize>,
}

/// One `[[models]]` entry.
#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    /// Artifact name prefix.
    pub name: String,

    /// Accuracy per category label.
    pub accuracy: Option<HashMap<String, f64>>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Load the file when given, otherwise the empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply the configured overrides to the defaults.
    pub fn into_pipeline_config(self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::default();

        if let Some(workers) = self.pipeline.workers {
            config.workers = workers;
        }
        if let Some(threshold) = self.pipeline.score_threshold {
            config.score_threshold = threshold;
        }
        if let Some(dir) = self.pipeline.models_dir {
            config.models_dir = dir;
        }
        if let Some(keywords) = self.pipeline.keywords {
            config.keywords = keywords;
        }

        let tools = &mut config.tools;
        if let Some(v) = self.tools.fileinfo {
            tools.fileinfo = v;
        }
        if let Some(v) = self.tools.param_medic {
            tools.param_medic = v;
        }
        if let Some(v) = self.tools.comet_adapter {
            tools.comet_adapter = v;
        }
        if let Some(v) = self.tools.comet_executable {
            tools.comet_executable = v;
        }
        if self.tools.database.is_some() {
            tools.database = self.tools.database;
        }
        if let Some(v) = self.tools.threads {
            tools.threads = v;
        }

        if !self.models.is_empty() {
            config.models = self
                .models
                .into_iter()
                .map(|entry| {
                    let accuracy = entry
                        .accuracy
                        .map(|values| ModelAccuracy::from_map(&entry.name, &values))
                        .transpose()
                        .with_context(|| format!("Invalid accuracy table for model {}", entry.name))?;
                    Ok(ModelSpec {
                        name: entry.name,
                        accuracy,
                    })
                })
                .collect::<Result<_>>()?;
        }

        Ok(config)
    }
}

/// Pipeline configuration from an optional file and an optional models
/// directory override.
pub fn resolve(config: Option<&Path>, models_dir: Option<PathBuf>) -> Result<PipelineConfig> {
    let mut resolved = Config::load(config)?.into_pipeline_config()?;
    if let Some(dir) = models_dir {
        resolved.models_dir = dir;
    }
    Ok(resolved)
}
