use anyhow::{Context, Result};
use std::path::PathBuf;

use mzinfer::keywords::KeywordScan;
use mzinfer::pipeline::OutputLayout;

/// Scan mzML files for experiment keywords
pub fn run(mzml_dir: PathBuf, output_dir: PathBuf, workers: Option<usize>) -> Result<()> {
    if !mzml_dir.is_dir() {
        anyhow::bail!("mzML directory does not exist: {}", mzml_dir.display());
    }

    let mut scan = KeywordScan::default();
    if let Some(workers) = workers {
        scan = scan.with_workers(workers);
    }

    let output = OutputLayout::new(output_dir).keyword_results();
    let status = scan
        .run(&mzml_dir, &output)
        .context("Keyword scan failed")?;
    println!("Keyword table ({:?}) -> {}", status, output.display());
    Ok(())
}
