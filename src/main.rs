//! # mzinfer
//!
//! Command-line front end for inferring experiment metadata of orphan
//! proteomics files.
//!
//! ## Usage
//!
//! ```bash
//! # Full pipeline over a directory of mzML files
//! mzinfer -v run --mzml-dir raw/ --output-dir out/ --models-dir models/
//!
//! # Re-run only the arbitration from existing predictions
//! mzinfer annotate --output-dir out/
//!
//! # Inspect an artifact
//! mzinfer info out/extracted_features.csv
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
