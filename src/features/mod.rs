//! # Feature Table Builder
//!
//! Merges the per-sample instrument-info fields and identification statistics
//! of a batch into one [`Table`] keyed by sample filename.
//!
//! The merge is a left join onto the instrument-info rows: a sample with a
//! report but no identification results keeps its report fields and gets
//! imputed identification columns, while identification results without a
//! report are dropped. After the join every missing numeric cell is filled
//! with that column's mean over the merged batch ([`BatchMeans`]). Text cells
//! are never defaulted here; the parser already supplies sentinels.
//!
//! The stage is skipped entirely when its output artifact already exists.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;

use crate::artifact::{self, StageStatus};
use crate::ident::{self, IdentificationStats, DEFAULT_SCORE_THRESHOLD};
use crate::report::{self, RawTextFeatures};
use crate::table::{Table, TableError, FILENAME_COLUMN};


/// Default number of concurrent per-sample workers
pub const DEFAULT_WORKERS: usize = 4;

/// Errors that can occur while building the feature table
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error reading or writing a table artifact
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// The worker pool could not be created
    #[error("Worker pool error: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),

    /// No instrument-info report could be parsed
    #[error("No instrument-info reports found in {0}")]
    NoReports(PathBuf),
}

/// Column means computed from the batch being imputed
#[derive(Debug, Clone, Default)]
pub struct BatchMeans {
    means: HashMap<String, f64>,
}

impl BatchMeans {
    /// Means of every numeric column of `table`
    pub fn of(table: &Table) -> Self {
        let means = table
            .columns()
            .iter()
            .filter_map(|c| table.column_mean(c).map(|m| (c.clone(), m)))
            .collect();
        Self { means }
    }

    /// Batch mean of a column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.means.get(column).copied()
    }

    /// Fill every missing numeric cell of `table` with this batch's means
    pub fn impute(&self, table: &mut Table) -> usize {
        table.fill_missing_numeric(|column| self.get(column))
    }
}

/// Table of instrument-info fields, one row per report
pub fn text_feature_table(features: &[RawTextFeatures]) -> Table {
    Table::from_rows(features.iter().map(|f| (f.filename.clone(), f.to_row())))
}

/// Table of identification statistics, one row per search result.
///
/// Gaps are left in place; [`merge_features`] fills them once the join has
/// decided which samples make up the batch.
pub fn identification_table(stats: &[IdentificationStats]) -> Table {
    Table::from_rows(stats.iter().map(|s| (s.filename.clone(), s.to_row())))
}

/// Left-join identification statistics onto instrument-info fields and
/// impute the merged batch
pub fn merge_features(text: &Table, identification: &Table) -> Table {
    let mut merged = text.left_join(identification);
    let means = BatchMeans::of(&merged);
    let filled = means.impute(&mut merged);
    if filled > 0 {
        info!("Imputed {} missing numeric cells with batch means", filled);
    }
    merged
}

/// Parse every `*.txt` report in `dir` on a bounded worker pool.
///
/// Unreadable reports are logged and omitted. Results are ordered by path.
pub fn parse_report_dir(dir: &Path, workers: usize) -> Result<Vec<RawTextFeatures>, FeatureError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            paths.push(path);
        }
    }
    paths.sort();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    let parsed: Vec<Option<RawTextFeatures>> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| match report::parse_report_file(path) {
                Ok(features) => Some(features),
                Err(e) => {
                    warn!("Skipping report {}: {}", path.display(), e);
                    None
                }
            })
            .collect()
    });

    Ok(parsed.into_iter().flatten().collect())
}

/// Builds the batch feature table from report and identification directories
#[derive(Debug, Clone)]
pub struct FeatureTableBuilder {
    fileinfo_dir: PathBuf,
    idxml_dir: Option<PathBuf>,
    text_output: PathBuf,
    output: PathBuf,
    workers: usize,
    score_threshold: f64,
}

impl FeatureTableBuilder {
    /// Create a builder reading reports from `fileinfo_dir` and writing the
    /// merged table to `output`
    pub fn new(fileinfo_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let fileinfo_dir = fileinfo_dir.into();
        Self {
            text_output: fileinfo_dir.join("fileinfo_extracted_features.csv"),
            fileinfo_dir,
            idxml_dir: None,
            output: output.into(),
            workers: DEFAULT_WORKERS,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }

    /// Read identification results from `dir`
    pub fn with_idxml_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.idxml_dir = Some(dir.into());
        self
    }

    /// Where the intermediate instrument-info table is written
    pub fn with_text_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.text_output = path.into();
        self
    }

    /// Number of concurrent report parsers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Identification score acceptance threshold
    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Path of the merged feature table
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the feature table, or read it back if it already exists
    pub fn build(&self) -> Result<(Table, StageStatus), FeatureError> {
        if artifact::skip_if_present(&self.output, "Feature table") {
            let table = Table::from_csv_path(&self.output, FILENAME_COLUMN)?;
            return Ok((table, StageStatus::Skipped));
        }

        let reports = parse_report_dir(&self.fileinfo_dir, self.workers)?;
        if reports.is_empty() {
            return Err(FeatureError::NoReports(self.fileinfo_dir.clone()));
        }
        info!("Parsed {} instrument-info reports", reports.len());

        let text = text_feature_table(&reports);
        text.write_csv_path(&self.text_output, FILENAME_COLUMN)?;

        let stats = match &self.idxml_dir {
            Some(dir) => ident::summarize_dir(dir, self.score_threshold),
            None => Vec::new(),
        };
        info!("Summarized {} identification result sets", stats.len());

        let merged = merge_features(&text, &identification_table(&stats));
        merged.write_csv_path(&self.output, FILENAME_COLUMN)?;
        info!(
            "Feature table with {} samples and {} columns written to {}",
            merged.len(),
            merged.columns().len(),
            self.output.display()
        );

        Ok((merged, StageStatus::Written))
    }
}
