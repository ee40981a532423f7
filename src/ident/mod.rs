//! # Identification-Result Summarizer
//!
//! Aggregates per-organism hit counts and mean identification scores from one
//! peptide-identification result set.
//!
//! A hit is accepted when its score is at or below the significance threshold
//! (lower is better). Every protein accession of an accepted hit is mapped to
//! an organism suffix (`sp|P02768|ALBU_HUMAN` → `HUMAN`), so a hit shared by
//! several organisms counts once in each bucket.
//!
//! A zero-byte identification file is the placeholder left by a failed search
//! and produces no row at all.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::table::{Cell, Row};

pub use error::IdentError;
pub use idxml::read_hits;

mod error;
pub mod idxml;

/// Score at or below which a peptide hit is accepted
pub const DEFAULT_SCORE_THRESHOLD: f64 = 1e-5;

/// File name suffix of identification results produced by the search step
pub const IDXML_SUFFIX: &str = "_CometAdapter.idXML";

/// Column suffix for per-organism accepted hit counts
pub const COUNT_HITS_SUFFIX: &str = "counthits";

/// Column suffix for per-organism mean scores
pub const AVG_EVAL_HITS_SUFFIX: &str = "avgevalhits";

/// One peptide-spectrum match with its resolved protein accessions
#[derive(Debug, Clone, PartialEq)]
pub struct PeptideHit {
    /// Identification score (e-value, lower is better)
    pub score: f64,
    /// Distinct protein accessions the peptide maps to
    pub accessions: Vec<String>,
}

/// Accepted hits for one organism suffix
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SuffixStats {
    /// Number of accepted hits
    pub count: u64,
    score_sum: f64,
}

impl SuffixStats {
    fn add(&mut self, score: f64) {
        self.count += 1;
        self.score_sum += score;
    }

    /// Arithmetic mean score of the accepted hits
    pub fn mean_score(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.score_sum / self.count as f64
        }
    }
}

/// Per-organism hit statistics for one sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentificationStats {
    /// Canonical sample filename (`{stem}.mzML`)
    pub filename: String,
    /// Statistics per organism suffix, in first-seen order
    pub suffixes: IndexMap<String, SuffixStats>,
}

impl IdentificationStats {
    /// Tally accepted hits per organism suffix
    pub fn summarize(filename: impl Into<String>, hits: &[PeptideHit], threshold: f64) -> Self {
        let mut suffixes: IndexMap<String, SuffixStats> = IndexMap::new();
        for hit in hits.iter().filter(|h| h.score <= threshold) {
            for accession in &hit.accessions {
                suffixes
                    .entry(organism_suffix(accession).to_string())
                    .or_default()
                    .add(hit.score);
            }
        }
        Self {
            filename: filename.into(),
            suffixes,
        }
    }

    /// Whether no hit passed the threshold
    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Sparse row with `{suffix}_counthits` and `{suffix}_avgevalhits` columns
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        for (suffix, stats) in &self.suffixes {
            row.insert(
                format!("{suffix}_{COUNT_HITS_SUFFIX}"),
                Cell::from(stats.count),
            );
            row.insert(
                format!("{suffix}_{AVG_EVAL_HITS_SUFFIX}"),
                Cell::from(stats.mean_score()),
            );
        }
        row
    }
}

/// Organism code of a protein accession.
///
/// Takes the text after the last `|`, then after the last `_`, and cuts at
/// the first quote character.
pub fn organism_suffix(accession: &str) -> &str {
    let entry = accession.rsplit('|').next().unwrap_or(accession);
    let suffix = entry.rsplit('_').next().unwrap_or(entry);
    suffix.split('\'').next().unwrap_or(suffix)
}

/// Canonical sample filename for an identification file:
/// `{stem}_CometAdapter.idXML` → `{stem}.mzML`
pub fn sample_filename(idxml_path: &Path) -> String {
    let name = idxml_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .split(IDXML_SUFFIX)
        .next()
        .unwrap_or(&name)
        .trim_end_matches(".idXML");
    format!("{stem}.mzML")
}

/// Summarize one identification file.
///
/// Returns `Ok(None)` for a zero-byte placeholder.
pub fn summarize_file(path: &Path, threshold: f64) -> Result<Option<IdentificationStats>, IdentError> {
    if std::fs::metadata(path)?.len() == 0 {
        debug!("Skipping empty identification placeholder {}", path.display());
        return Ok(None);
    }

    let file = File::open(path)?;
    let hits = read_hits(BufReader::new(file))?;
    let stats = IdentificationStats::summarize(sample_filename(path), &hits, threshold);
    debug!(
        "{}: {} hits, {} organism suffixes accepted",
        path.display(),
        hits.len(),
        stats.suffixes.len()
    );
    Ok(Some(stats))
}

/// Summarize every `*.idXML` file in a directory.
///
/// Unreadable files and placeholders are logged and skipped; a missing
/// directory yields no results.
pub fn summarize_dir(dir: &Path, threshold: f64) -> Vec<IdentificationStats> {
    let mut paths = match list_idxml_files(dir) {
        Ok(paths) => paths,
        Err(e) => {
            warn!(
                "Identification directory {} not readable ({}); continuing without identification features",
                dir.display(),
                e
            );
            return Vec::new();
        }
    };
    paths.sort();

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        match summarize_file(&path, threshold) {
            Ok(Some(stats)) => results.push(stats),
            Ok(None) => info!("Identification for {} previously failed; skipping", path.display()),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    results
}

fn list_idxml_files(dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "idXML") {
            paths.push(path);
        }
    }
    Ok(paths)
}
