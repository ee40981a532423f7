//! # Instrument-Info Report Parser
//!
//! Extracts a fixed set of scalar and categorical fields from one free-text
//! instrument-info report (the output of an OpenMS `FileInfo` run).
//!
//! Lines are scanned independently and recognised by literal markers: numeric
//! markers (`retention time:`, `Instrument:`, ...) match case-sensitively,
//! categorical metadata markers (`organism:`, `tissue:`, ...) match
//! case-insensitively. The first matching marker claims the line.
//!
//! Charge-state distribution lines (`charge 2: 3100x`) produce one
//! `precursor_charge_{n}` field per observed charge, so the set of fields is
//! sample-dependent until the feature table reconciles it.
//!
//! Nothing here is fatal: a marker whose value cannot be extracted leaves the
//! field unset, and an empty report only produces a diagnostic.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use crate::table::{Cell, Row, NOT_AVAILABLE};

pub use activation::{ActivationStrategy, Disabled, FollowingLine, MULTI_LEVEL_PREFIX};

pub mod activation;

#[cfg(test)]
mod tests;

/// Decimal or scientific-notation numeric token
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").unwrap());

static CHARGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"charge (\d+): (\d+)x").unwrap());

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Column prefix for per-charge precursor counts
pub const PRECURSOR_CHARGE_PREFIX: &str = "precursor_charge_";

/// Fields extracted from one instrument-info report
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextFeatures {
    /// Canonical sample filename (`{stem}.mzML`)
    pub filename: String,
    pub instrument_model: String,
    pub organism: String,
    pub tissue: String,
    pub disease: String,
    pub software: String,
    pub activation_method: String,
    pub experiment_type: String,
    pub fraction_identifier: String,
    pub quantification_method: String,
    pub cleavage_agent: String,
    /// Retention time range (min, max)
    pub rt_range: Option<(f64, f64)>,
    /// m/z range (min, max)
    pub mz_range: Option<(f64, f64)>,
    /// Intensity range (min, max)
    pub intensity_range: Option<(f64, f64)>,
    /// Precursor count per observed charge state
    pub precursor_charges: BTreeMap<u32, u64>,
    pub total_peaks: Option<u64>,
    pub num_spectra: Option<u64>,
}

impl RawTextFeatures {
    /// Empty record with every categorical field set to the sentinel
    pub fn new(filename: impl Into<String>) -> Self {
        let na = || NOT_AVAILABLE.to_string();
        Self {
            filename: filename.into(),
            instrument_model: na(),
            organism: na(),
            tissue: na(),
            disease: na(),
            software: na(),
            activation_method: na(),
            experiment_type: na(),
            fraction_identifier: na(),
            quantification_method: na(),
            cleavage_agent: na(),
            rt_range: None,
            mz_range: None,
            intensity_range: None,
            precursor_charges: BTreeMap::new(),
            total_peaks: None,
            num_spectra: None,
        }
    }

    /// Sparse row; numeric fields that were not parsed are absent
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        let categorical = [
            ("instrument_model", &self.instrument_model),
            ("organism", &self.organism),
            ("tissue", &self.tissue),
            ("disease", &self.disease),
            ("software", &self.software),
            ("activation_method", &self.activation_method),
            ("experiment_type", &self.experiment_type),
            ("fraction_identifier", &self.fraction_identifier),
            ("quantification_method", &self.quantification_method),
            ("cleavage_agent", &self.cleavage_agent),
        ];
        for (name, value) in categorical {
            row.insert(name.to_string(), Cell::Text(value.clone()));
        }

        let ranges = [
            ("rt", self.rt_range),
            ("mz", self.mz_range),
            ("intensity", self.intensity_range),
        ];
        for (name, range) in ranges {
            if let Some((min, max)) = range {
                row.insert(format!("{name}_min"), Cell::from(min));
                row.insert(format!("{name}_max"), Cell::from(max));
            }
        }

        for (charge, count) in &self.precursor_charges {
            row.insert(
                format!("{PRECURSOR_CHARGE_PREFIX}{charge}"),
                Cell::from(*count),
            );
        }
        if let Some(peaks) = self.total_peaks {
            row.insert("total_peaks".to_string(), Cell::from(peaks));
        }
        if let Some(spectra) = self.num_spectra {
            row.insert("num_spectra".to_string(), Cell::from(spectra));
        }
        row
    }
}

/// Canonical sample filename for a report path: `{stem}.txt` → `{stem}.mzML`
pub fn sample_filename(report_path: &Path) -> String {
    let name = report_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split(".txt").next().unwrap_or(&name);
    format!("{stem}.mzML")
}

/// Parse a report file with the default activation heuristic
pub fn parse_report_file(path: &Path) -> std::io::Result<RawTextFeatures> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_report(&sample_filename(path), &content))
}

/// Parse report text with the default activation heuristic
pub fn parse_report(filename: &str, content: &str) -> RawTextFeatures {
    parse_report_with(filename, content, &mut FollowingLine::default())
}

/// Parse report text with an explicit activation strategy
pub fn parse_report_with<S>(filename: &str, content: &str, strategy: &mut S) -> RawTextFeatures
where
    S: ActivationStrategy + ?Sized,
{
    let mut features = RawTextFeatures::new(filename);

    if content.trim().is_empty() {
        warn!("Instrument-info report for {} is empty", filename);
        return features;
    }

    for raw in content.lines() {
        let line = raw.trim();
        let lower = line.to_lowercase();

        if line.contains("retention time:") {
            features.rt_range = numeric_range(line);
        } else if line.contains("mass-to-charge:") {
            features.mz_range = numeric_range(line);
        } else if line.contains("intensity:") {
            features.intensity_range = numeric_range(line);
        } else if line.contains("charge") && line.contains('x') {
            if let Some((charge, count)) = charge_count(line) {
                features.precursor_charges.insert(charge, count);
            }
        } else if line.contains("Instrument:") {
            if features.instrument_model == NOT_AVAILABLE {
                if let Some((_, value)) = line.rsplit_once("Instrument: ") {
                    set_if_present(&mut features.instrument_model, value);
                }
            }
        } else if line.contains("Total number of peaks:") {
            features.total_peaks = first_integer(line);
        } else if line.contains("Number of spectra:") {
            features.num_spectra = first_integer(line);
        } else if lower.contains("organism:") {
            set_labelled(&mut features.organism, line);
        } else if lower.contains("tissue:") {
            set_labelled(&mut features.tissue, line);
        } else if lower.contains("disease:") {
            set_labelled(&mut features.disease, line);
        } else if lower.contains("software name:") {
            set_labelled(&mut features.software, line);
        } else if lower.contains("activation methods") {
            strategy.on_heading(line);
        } else if lower.contains("experiment type:") {
            set_labelled(&mut features.experiment_type, line);
        } else if lower.contains("fraction identifier:") {
            set_labelled(&mut features.fraction_identifier, line);
        } else if lower.contains("quantification:") {
            set_labelled(&mut features.quantification_method, line);
        } else if lower.contains("cleavage agent:") {
            set_labelled(&mut features.cleavage_agent, line);
        } else {
            strategy.on_unclassified(line);
        }
    }

    if let Some(method) = strategy.finish() {
        features.activation_method = method;
    }

    debug!(
        "Parsed report for {}: instrument={}, activation={}, {} charge states",
        filename,
        features.instrument_model,
        features.activation_method,
        features.precursor_charges.len()
    );
    features
}

/// First two numeric tokens on the line, `None` when fewer are present
fn numeric_range(line: &str) -> Option<(f64, f64)> {
    let mut tokens = NUMBER_RE
        .find_iter(line)
        .filter_map(|m| m.as_str().parse::<f64>().ok());
    let min = tokens.next()?;
    let max = tokens.next()?;
    Some((min, max))
}

fn charge_count(line: &str) -> Option<(u32, u64)> {
    let caps = CHARGE_RE.captures(line)?;
    let charge = caps[1].parse().ok()?;
    let count = caps[2].parse().ok()?;
    Some((charge, count))
}

fn first_integer(line: &str) -> Option<u64> {
    INTEGER_RE.find(line)?.as_str().parse().ok()
}

/// Value after the last `": "`; a bare echoed label yields `None`
fn labelled_value(line: &str) -> Option<&str> {
    let (_, value) = line.rsplit_once(": ")?;
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn set_labelled(field: &mut String, line: &str) {
    if let Some(value) = labelled_value(line) {
        *field = value.to_string();
    }
}

fn set_if_present(field: &mut String, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        *field = value.to_string();
    }
}
