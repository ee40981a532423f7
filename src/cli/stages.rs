use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use mzinfer::pipeline::{Pipeline, RunSummary};
use mzinfer::table::{Table, FILENAME_COLUMN};
use mzinfer::tools::{ProcessRunner, ToolRunner};

use super::config;

/// Run the full pipeline
pub fn run(
    mzml_dir: PathBuf,
    output_dir: PathBuf,
    idxml_dir: Option<PathBuf>,
    models_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    skip_tools: bool,
) -> Result<()> {
    if !mzml_dir.is_dir() {
        anyhow::bail!("mzML directory does not exist: {}", mzml_dir.display());
    }
    let pipeline = Pipeline::new(config::resolve(config.as_deref(), models_dir)?, &output_dir);

    info!("mzinfer - Metadata Inference");
    info!("============================");
    info!("mzML:   {}", mzml_dir.display());
    info!("Output: {}", output_dir.display());
    info!("Models: {}", pipeline.config().models_dir.display());

    let runner = ProcessRunner;
    let runner: Option<&dyn ToolRunner> = if skip_tools { None } else { Some(&runner) };

    let summary = pipeline
        .run(runner, &mzml_dir, idxml_dir.as_deref())
        .context("Pipeline run failed")?;
    print_summary(&pipeline, &summary);
    Ok(())
}

/// Build the feature table only
pub fn features(output_dir: PathBuf, idxml_dir: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let pipeline = Pipeline::new(config::resolve(config.as_deref(), None)?, &output_dir);
    let idxml_dir = idxml_dir.unwrap_or_else(|| pipeline.layout().idxml_dir());

    let (table, status) = pipeline
        .build_features(Some(idxml_dir.as_path()))
        .context("Feature extraction failed")?;
    println!(
        "Feature table ({:?}): {} samples, {} columns -> {}",
        status,
        table.len(),
        table.columns().len(),
        pipeline.layout().features().display()
    );
    Ok(())
}

/// Predict with every configured model
pub fn predict(output_dir: PathBuf, models_dir: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let pipeline = Pipeline::new(config::resolve(config.as_deref(), models_dir)?, &output_dir);
    let features = read_table(&pipeline.layout().features())?;

    let predictions = pipeline.predict(&features).context("Prediction failed")?;
    for p in &predictions {
        println!(
            "{} ({:?}): {} samples -> {}",
            p.model,
            p.status,
            p.records.len(),
            pipeline.layout().predictions(&p.model).display()
        );
    }
    Ok(())
}

/// Arbitrate existing predictions and write the metadata result
pub fn annotate(output_dir: PathBuf, models_dir: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let pipeline = Pipeline::new(config::resolve(config.as_deref(), models_dir)?, &output_dir);

    let predictions = pipeline.read_predictions().context("Failed to read predictions")?;
    let status = pipeline.annotate(&predictions).context("Annotation failed")?;
    println!(
        "Metadata result ({:?}) -> {}",
        status,
        pipeline.layout().metadata_result().display()
    );
    Ok(())
}

fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }
    Table::from_csv_path(path, FILENAME_COLUMN)
        .with_context(|| format!("Failed to read table: {}", path.display()))
}

fn print_summary(pipeline: &Pipeline, summary: &RunSummary) {
    #[cfg(feature = "colorized_output")]
    println!("{}", console::style("Metadata inference complete").bold().green());
    #[cfg(not(feature = "colorized_output"))]
    println!("Metadata inference complete");

    println!("  Samples: {}", summary.samples);
    println!("  Feature table: {:?}", summary.features);
    for (model, status) in &summary.predictions {
        println!("  Predictions of {}: {:?}", model, status);
    }
    println!("  Metadata result: {:?}", summary.metadata);
    println!("  Output: {}", pipeline.layout().metadata_result().display());
}
