//! # mzinfer - Metadata Inference for Orphan Proteomics Files
//!
//! `mzinfer` recovers the experiment metadata of mass spectrometry proteomics
//! files that were deposited without it. For each sample it combines
//! instrument-level statistics with peptide identification statistics, feeds
//! them to several trained classifiers and keeps, per metadata category, the
//! answer of the model known to be most accurate for that category.
//!
//! ## Pipeline
//!
//! - **Text reports** ([`report`]): instrument model, retention-time, m/z and
//!   intensity ranges, precursor charge distribution and activation method
//!   parsed from each sample's instrument-info report.
//!
//! - **Identifications** ([`ident`]): accepted-hit counts, mean score and
//!   organism suffix counts from each sample's idXML search result.
//!
//! - **Feature table** ([`features`]): both joined per sample, with gaps in
//!   the identification columns imputed from batch means.
//!
//! - **Schema alignment** ([`schema`]): the feature table reshaped to each
//!   model's training columns, family gaps filled from training means.
//!
//! - **Prediction** ([`model`]): JSON model artifacts predicting nine
//!   categories per sample.
//!
//! - **Arbitration** ([`arbiter`]) and **narrative** ([`narrative`]): one
//!   label per category with its provenance, plus a generated title,
//!   description, protocols and keywords.
//!
//! Supporting stages run the external tools ([`tools`]) and a keyword scan
//! ([`keywords`]); [`pipeline`] ties everything to one output directory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mzinfer::pipeline::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default(), "out");
//!
//! // Tool outputs already exist below out/, so no runner is passed
//! let summary = pipeline.run(None, Path::new("raw"), None)?;
//! println!("Annotated {} samples", summary.samples);
//! # Ok::<(), mzinfer::pipeline::PipelineError>(())
//! ```
//!
//! Every stage writes one artifact and is skipped when that artifact already
//! exists, so an interrupted run can simply be started again.

#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod arbiter;
pub mod artifact;
pub mod features;
pub mod ident;
pub mod keywords;
pub mod model;
pub mod narrative;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod table;
pub mod tools;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::arbiter::{arbitrate, AccuracyTable, ArbitratedRecord, ModelAccuracy};
    pub use crate::features::{BatchMeans, FeatureTableBuilder};
    pub use crate::ident::IdentificationStats;
    pub use crate::model::{Category, ModelBundle, PredictionRecord};
    pub use crate::narrative::Narrative;
    pub use crate::pipeline::{OutputLayout, Pipeline, PipelineConfig, PipelineError};
    pub use crate::report::{parse_report, RawTextFeatures};
    pub use crate::schema::TrainingSchema;
    pub use crate::table::{Cell, Table};
}
