use anyhow::{Context, Result};
use std::path::PathBuf;

use mzinfer::table::{Table, FILENAME_COLUMN};

/// Display information about a table artifact
pub fn run(file: PathBuf) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let table = Table::from_csv_path(&file, FILENAME_COLUMN)
        .with_context(|| format!("Failed to read table: {}", file.display()))?;

    println!("mzinfer Table Information");
    println!("=========================");
    println!("File: {}", file.display());
    println!();

    println!("Table Statistics:");
    println!("  Rows: {}", table.len());
    println!("  Columns: {}", table.columns().len());
    println!();

    println!("Columns:");
    for (i, column) in table.columns().iter().enumerate() {
        let kind = if table.is_numeric_column(column) {
            "numeric"
        } else {
            "text"
        };
        let missing = table.missing_count(column);
        println!(
            "  {:3}. {} ({}, {} missing)",
            i + 1,
            column,
            kind,
            missing
        );
    }

    Ok(())
}
