//! # Keyword Presence Scan
//!
//! Flags, per spectrum file, which of a fixed list of experiment keywords
//! occur anywhere in its text (case-insensitive). Each file is scanned line
//! by line on the bounded worker pool and the scan of a file stops as soon as
//! every keyword has been seen. The result table has one `0`/`1` column per
//! keyword and is not a model input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;

use crate::artifact::{self, StageStatus};
use crate::features::DEFAULT_WORKERS;
use crate::table::{Cell, Row, Table, TableError, FILENAME_COLUMN};

/// Keywords scanned for by default
pub const DEFAULT_KEYWORDS: [&str; 19] = [
    "iTRAQ", "SILAC", "SWATH", "phospho", "acetyl", "methyl", "glygly", "human", "mouse", "yeast",
    "virus", "liver", "kidney", "brain", "heart", "lung", "plasma", "serum", "cancer",
];

/// Errors that can occur during the keyword scan
#[derive(Debug, thiserror::Error)]
pub enum KeywordError {
    /// I/O error listing the input directory
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error writing the result table
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// The worker pool could not be created
    #[error("Worker pool error: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),
}

/// Presence flag per keyword, in keyword order
pub fn scan_reader<R: BufRead>(reader: R, keywords: &[String]) -> std::io::Result<Vec<bool>> {
    let needles: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut found = vec![false; needles.len()];
    let mut remaining = needles.len();

    let mut lines = reader.lines();
    while remaining > 0 {
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?.to_lowercase();
        for (flag, needle) in found.iter_mut().zip(&needles) {
            if !*flag && line.contains(needle.as_str()) {
                *flag = true;
                remaining -= 1;
            }
        }
    }
    Ok(found)
}

/// Scans spectrum files for keyword occurrences
#[derive(Debug, Clone)]
pub struct KeywordScan {
    keywords: Vec<String>,
    workers: usize,
}

impl Default for KeywordScan {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl KeywordScan {
    /// Scan for a custom keyword list
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Number of concurrent file scans
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Keywords in column order
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Result row for a single file
    pub fn scan_file(&self, path: &Path) -> std::io::Result<Row> {
        let file = File::open(path)?;
        let found = scan_reader(BufReader::new(file), &self.keywords)?;
        Ok(self
            .keywords
            .iter()
            .zip(found)
            .map(|(k, hit)| (k.clone(), Cell::from(u64::from(hit))))
            .collect())
    }

    /// Scan every `*.mzML` in `mzml_dir`; unreadable files are omitted
    pub fn scan_dir(&self, mzml_dir: &Path) -> Result<Table, KeywordError> {
        let paths = artifact::list_files(mzml_dir, ".mzML")?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.max(1))
            .build()?;

        let rows: Vec<Option<(String, Row)>> = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    let name = file_name(path);
                    info!("Scanning {} for keywords", name);
                    match self.scan_file(path) {
                        Ok(row) => Some((name, row)),
                        Err(e) => {
                            warn!("Error processing {}: {}", name, e);
                            None
                        }
                    }
                })
                .collect()
        });

        let mut table = Table::with_columns(self.keywords.iter().cloned());
        for (name, row) in rows.into_iter().flatten() {
            table.insert_row(name, row);
        }
        Ok(table)
    }

    /// Scan `mzml_dir` and write the result table to `output`, unless it
    /// already exists
    pub fn run(&self, mzml_dir: &Path, output: &Path) -> Result<StageStatus, KeywordError> {
        if artifact::skip_if_present(output, "Keyword parsing results") {
            return Ok(StageStatus::Skipped);
        }
        let table = self.scan_dir(mzml_dir)?;
        table.write_csv_path(output, FILENAME_COLUMN)?;
        info!(
            "Keyword parsing completed for {} files. Results saved to {}",
            table.len(),
            output.display()
        );
        Ok(StageStatus::Written)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_scan_is_case_insensitive() {
        let text = "<cvParam name=\"Phospho (STY)\"/>\n<userParam value=\"HUMAN liver\"/>\n";
        let found = scan_reader(text.as_bytes(), &keywords(&["phospho", "human", "SILAC"])).unwrap();
        assert_eq!(found, [true, true, false]);
    }

    #[test]
    fn test_itraq_matches_lowercase_text() {
        let found = scan_reader("itraq 4plex".as_bytes(), &keywords(&["iTRAQ"])).unwrap();
        assert_eq!(found, [true]);
    }

    #[test]
    fn test_run_writes_flags_and_skips_second_time() {
        let dir = tempfile::tempdir().unwrap();
        let mzml = dir.path().join("mzml");
        fs::create_dir(&mzml).unwrap();
        fs::write(mzml.join("a.mzML"), "serum sample\nyeast\n").unwrap();
        fs::write(mzml.join("b.mzML"), "nothing here\n").unwrap();
        fs::write(mzml.join("notes.txt"), "serum").unwrap();
        let output = dir.path().join("keywords").join("keyword_parsing_results.csv");

        let scan = KeywordScan::default().with_keywords(["serum", "yeast"]).with_workers(2);
        assert_eq!(scan.run(&mzml, &output).unwrap(), StageStatus::Written);

        let written = fs::read_to_string(&output).unwrap();
        assert_eq!(written, "Filename,serum,yeast\na.mzML,1,1\nb.mzML,0,0\n");

        fs::write(mzml.join("c.mzML"), "serum").unwrap();
        assert_eq!(scan.run(&mzml, &output).unwrap(), StageStatus::Skipped);
        assert_eq!(fs::read_to_string(&output).unwrap(), written);
    }
}
