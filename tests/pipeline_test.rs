//! Integration tests for mzinfer
//!
//! These tests run the pipeline end to end on a tiny batch: two instrument
//! reports, one identification result, one failed-search placeholder and two
//! small JSON models that disagree with each other.

use mzinfer::arbiter::ModelAccuracy;
use mzinfer::artifact::StageStatus;
use mzinfer::model::Category;
use mzinfer::pipeline::{ModelSpec, Pipeline, PipelineConfig, PipelineError};
use mzinfer::table::{Table, FILENAME_COLUMN};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const QE_REPORT: &str = "\
Instrument: Q Exactive
Number of spectra: 1200
Ranges:
  retention time: 12.0 .. 3600.0 sec
  mass-to-charge: 350.0 .. 1800.0
Precursor charge distribution:
  charge 2: 800x
  charge 3: 300x
Activation methods
  MS-Level 2 & HCID (High-energy collision-induced dissociation): 1100
Software name: Xcalibur
";

const LTQ_REPORT: &str = "\
Instrument: LTQ
Number of spectra: 400
Ranges:
  retention time: 18.0 .. 2400.0 sec
";

const IDXML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<IdXML version="1.5">
  <IdentificationRun search_engine="Comet">
    <ProteinIdentification score_type="" higher_score_better="true">
      <ProteinHit id="PH_0" accession="sp|P02768|ALBU_HUMAN" score="0" sequence=""/>
    </ProteinIdentification>
    <PeptideIdentification score_type="expect" higher_score_better="false">
      <PeptideHit score="1e-07" sequence="LVNEVTEFAK" charge="2" protein_refs="PH_0"/>
      <PeptideHit score="3e-07" sequence="AEFAEVSK" charge="2" protein_refs="PH_0"/>
    </PeptideIdentification>
  </IdentificationRun>
</IdXML>
"#;

/// Write a model keyed on the one-hot instrument indicator. With `flip`
/// unset, LTQ selects code 0 and Q Exactive code 1; `flip` swaps them.
fn write_model(dir: &Path, name: &str, flip: bool) {
    fs::write(
        dir.join(format!("{name}_train_features.csv")),
        "rt_min,instrument_model,HUMAN_counthits\n10.0,LTQ,4\n20.0,Q Exactive,6\n",
    )
    .unwrap();

    let preprocessor = json!([
        {
            "kind": "standardize",
            "columns": ["rt_min", "HUMAN_counthits"],
            "impute": [15.0, 5.0],
            "mean": [15.0, 5.0],
            "scale": [5.0, 1.0]
        },
        {
            "kind": "one_hot",
            "columns": ["instrument_model"],
            "categories": [["LTQ", "Q Exactive"]],
            "fill": "Not available"
        }
    ]);
    fs::write(dir.join(format!("{name}_preprocessor.json")), preprocessor.to_string()).unwrap();

    let ltq_indicator = [0.0, 0.0, 1.0, 0.0];
    let qe_indicator = [0.0, 0.0, 0.0, 1.0];
    let (code0, code1) = if flip {
        (qe_indicator, ltq_indicator)
    } else {
        (ltq_indicator, qe_indicator)
    };
    let weights: Vec<[f64; 4]> = (0..9).flat_map(|_| [code0, code1]).collect();
    let classifier = json!({
        "activation": "relu",
        "layers": [{"weights": weights, "bias": vec![0.0; 18]}],
        "heads": vec![2; 9]
    });
    fs::write(dir.join(format!("{name}_model.json")), classifier.to_string()).unwrap();

    let decoders: serde_json::Map<String, serde_json::Value> = Category::ALL
        .iter()
        .map(|c| {
            let label = c.label();
            (label.to_string(), json!([format!("{label} A"), format!("{label} B")]))
        })
        .collect();
    fs::write(
        dir.join(format!("{name}_label_encoders.json")),
        serde_json::Value::Object(decoders).to_string(),
    )
    .unwrap();
}

struct Fixture {
    _dir: tempfile::TempDir,
    mzml: std::path::PathBuf,
    output: std::path::PathBuf,
    config: PipelineConfig,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let mzml = dir.path().join("raw");
    let output = dir.path().join("out");
    let models = dir.path().join("models");
    for d in [&mzml, &models, &output.join("fileinfo"), &output.join("idxml")] {
        fs::create_dir_all(d).unwrap();
    }

    fs::write(mzml.join("qe.mzML"), "<mzML><cvParam name=\"Homo sapiens\"/> human serum</mzML>\n").unwrap();
    fs::write(mzml.join("ltq.mzML"), "<mzML/>\n").unwrap();
    fs::write(output.join("fileinfo").join("qe.txt"), QE_REPORT).unwrap();
    fs::write(output.join("fileinfo").join("ltq.txt"), LTQ_REPORT).unwrap();
    fs::write(output.join("idxml").join("qe_CometAdapter.idXML"), IDXML).unwrap();
    fs::write(output.join("idxml").join("ltq_CometAdapter.idXML"), "").unwrap();

    write_model(&models, "alpha", false);
    write_model(&models, "beta", true);

    let mut alpha = [0.9; 9];
    alpha[Category::Organism.index()] = 0.1;
    let config = PipelineConfig {
        models_dir: models,
        models: vec![
            ModelSpec {
                name: "alpha".into(),
                accuracy: Some(ModelAccuracy::new("alpha", alpha)),
            },
            ModelSpec {
                name: "beta".into(),
                accuracy: Some(ModelAccuracy::new("beta", [0.5; 9])),
            },
        ],
        workers: 2,
        ..PipelineConfig::default()
    };

    Fixture {
        _dir: dir,
        mzml,
        output,
        config,
    }
}

/// Full run from existing tool outputs to the metadata result
#[test]
fn test_full_pipeline() {
    let f = fixture();
    let pipeline = Pipeline::new(f.config.clone(), &f.output);

    let summary = pipeline.run(None, &f.mzml, None).unwrap();
    assert_eq!(summary.samples, 2);
    assert_eq!(summary.features, StageStatus::Written);
    assert_eq!(
        summary.predictions,
        vec![
            ("alpha".to_string(), StageStatus::Written),
            ("beta".to_string(), StageStatus::Written)
        ]
    );
    assert_eq!(summary.metadata, StageStatus::Written);

    // The failed-search placeholder leaves a gap that the batch mean fills
    let features = Table::from_csv_path(f.output.join("extracted_features.csv"), FILENAME_COLUMN).unwrap();
    assert_eq!(features.cell("ltq.mzML", "HUMAN_counthits").as_number(), Some(2.0));
    assert_eq!(features.cell("qe.mzML", "rt_min").as_number(), Some(12.0));

    let result = Table::from_csv_path(f.output.join("metadata_result.csv"), FILENAME_COLUMN).unwrap();
    assert_eq!(result.len(), 2);

    // alpha wins every category except Organism
    assert_eq!(result.cell("qe.mzML", "Instrument").as_text(), Some("Instrument B"));
    assert_eq!(
        result.cell("qe.mzML", "Instrument_Accuracy").as_text(),
        Some("0.9 Accuracy (Model 1)")
    );
    assert_eq!(result.cell("qe.mzML", "Organism").as_text(), Some("Organism A"));
    assert_eq!(
        result.cell("qe.mzML", "Organism_Accuracy").as_text(),
        Some("0.5 Accuracy (Model 2)")
    );
    assert_eq!(result.cell("ltq.mzML", "Instrument").as_text(), Some("Instrument A"));
    assert_eq!(result.cell("ltq.mzML", "Organism").as_text(), Some("Organism B"));

    assert_eq!(result.cell("qe.mzML", "Parsed Software").as_text(), Some("Xcalibur"));
    let title = result.cell("qe.mzML", "Project Title").as_text().unwrap();
    assert!(title.starts_with("Orphan Proteomics Data: Experiment Type B Analysis of Organism A"));
    assert!(result.has_column("Keywords"));

    let keywords = fs::read_to_string(f.output.join("keywords").join("keyword_parsing_results.csv")).unwrap();
    assert!(keywords.starts_with("Filename,iTRAQ"));
    assert_eq!(keywords.lines().count(), 3);
}

/// A second run finds every artifact and rewrites nothing
#[test]
fn test_rerun_skips_every_stage() {
    let f = fixture();
    let pipeline = Pipeline::new(f.config.clone(), &f.output);
    pipeline.run(None, &f.mzml, None).unwrap();

    let features = fs::read_to_string(f.output.join("extracted_features.csv")).unwrap();
    let result = fs::read_to_string(f.output.join("metadata_result.csv")).unwrap();

    // New inputs must not leak into existing artifacts
    fs::write(f.output.join("fileinfo").join("extra.txt"), "Instrument: LTQ\n").unwrap();

    let summary = pipeline.run(None, &f.mzml, None).unwrap();
    assert_eq!(summary.features, StageStatus::Skipped);
    assert!(summary.predictions.iter().all(|(_, s)| *s == StageStatus::Skipped));
    assert_eq!(summary.metadata, StageStatus::Skipped);

    assert_eq!(fs::read_to_string(f.output.join("extracted_features.csv")).unwrap(), features);
    assert_eq!(fs::read_to_string(f.output.join("metadata_result.csv")).unwrap(), result);
}

/// A model whose schema cannot be satisfied is dropped, the others still run
#[test]
fn test_schema_mismatch_drops_only_that_model() {
    let f = fixture();
    // beta expects a MOUSE column the batch lacks and has no mean to fill it
    fs::write(
        f.config.models_dir.join("beta_train_features.csv"),
        "rt_min,instrument_model,HUMAN_counthits,MOUSE_counthits\n10.0,LTQ,4,\n",
    )
    .unwrap();
    let pipeline = Pipeline::new(f.config.clone(), &f.output);

    let summary = pipeline.run(None, &f.mzml, None).unwrap();
    let models: Vec<&str> = summary.predictions.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(models, ["alpha"]);

    let result = Table::from_csv_path(f.output.join("metadata_result.csv"), FILENAME_COLUMN).unwrap();
    assert_eq!(
        result.cell("qe.mzML", "Organism_Accuracy").as_text(),
        Some("0.1 Accuracy (Model 1)")
    );
}

/// Provenance names the configured model even when an earlier one is dropped
#[test]
fn test_dropped_first_model_keeps_numbering() {
    let f = fixture();
    fs::write(
        f.config.models_dir.join("alpha_train_features.csv"),
        "rt_min,instrument_model,HUMAN_counthits,MOUSE_counthits\n10.0,LTQ,4,\n",
    )
    .unwrap();
    let pipeline = Pipeline::new(f.config.clone(), &f.output);

    let summary = pipeline.run(None, &f.mzml, None).unwrap();
    let models: Vec<&str> = summary.predictions.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(models, ["beta"]);

    let result = Table::from_csv_path(f.output.join("metadata_result.csv"), FILENAME_COLUMN).unwrap();
    assert_eq!(
        result.cell("qe.mzML", "Instrument_Accuracy").as_text(),
        Some("0.5 Accuracy (Model 2)")
    );
    assert_eq!(result.cell("qe.mzML", "Instrument").as_text(), Some("Instrument A"));
}

/// A model with no artifacts stops the run
#[test]
fn test_missing_model_stops_run() {
    let mut f = fixture();
    f.config.models.push(ModelSpec::named("absent"));
    let pipeline = Pipeline::new(f.config.clone(), &f.output);

    let err = pipeline.run(None, &f.mzml, None).unwrap_err();
    assert!(matches!(err, PipelineError::ModelError { ref model, .. } if model == "absent"));
    assert!(!f.output.join("metadata_result.csv").exists());
}

/// Annotation alone works from prediction tables on disk
#[test]
fn test_annotate_from_existing_predictions() {
    let f = fixture();
    let pipeline = Pipeline::new(f.config.clone(), &f.output);
    let (features, _) = pipeline.build_features(Some(f.output.join("idxml").as_path())).unwrap();
    pipeline.predict(&features).unwrap();

    let predictions = pipeline.read_predictions().unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(pipeline.annotate(&predictions).unwrap(), StageStatus::Written);
    assert_eq!(pipeline.annotate(&predictions).unwrap(), StageStatus::Skipped);
}
