use super::*;

const FILEINFO_REPORT: &str = "\
-- General information --

File name: PXD000001_run1.mzML
File type: mzML

Instrument: Orbitrap Fusion
  Mass Analyzer: Orbitrap (resolution: 120000)

Number of spectra: 2310

Ranges:
  retention time: 1.73 .. 5387.39 sec (89.8 min)
  mass-to-charge: 350.0012 .. 1799.9876
  intensity: 0 .. 1.25e+07

Total number of peaks: 1048576

Precursor charge distribution:
  charge 1: 12x
  charge 2: 1540x
  charge 3: 610x

Activation methods
  MS-Level 2 & HCID (High-energy collision-induced dissociation): 2162

Software name: Xcalibur
organism: Homo sapiens
Tissue: liver
";

#[test]
fn test_parse_full_report() {
    let features = parse_report("PXD000001_run1.mzML", FILEINFO_REPORT);

    assert_eq!(features.instrument_model, "Orbitrap Fusion");
    assert_eq!(features.num_spectra, Some(2310));
    assert_eq!(features.rt_range, Some((1.73, 5387.39)));
    assert_eq!(features.mz_range, Some((350.0012, 1799.9876)));
    assert_eq!(features.intensity_range, Some((0.0, 1.25e7)));
    assert_eq!(features.total_peaks, Some(1_048_576));
    assert_eq!(features.precursor_charges.get(&2), Some(&1540));
    assert_eq!(features.precursor_charges.len(), 3);
    assert_eq!(
        features.activation_method,
        "HCID (High-energy collision-induced dissociation)"
    );
    assert_eq!(features.software, "Xcalibur");
    assert_eq!(features.organism, "Homo sapiens");
    assert_eq!(features.tissue, "liver");
    assert_eq!(features.disease, NOT_AVAILABLE);
    assert_eq!(features.cleavage_agent, NOT_AVAILABLE);
}

#[test]
fn test_single_numeric_token_leaves_range_unset() {
    let features = parse_report("a.mzML", "retention time: 12.5 sec\n");
    assert_eq!(features.rt_range, None);
}

#[test]
fn test_echoed_label_keeps_sentinel() {
    let report = "Instrument:\norganism:\nSoftware name:\n";
    let features = parse_report("a.mzML", report);

    assert_eq!(features.instrument_model, NOT_AVAILABLE);
    assert_eq!(features.organism, NOT_AVAILABLE);
    assert_eq!(features.software, NOT_AVAILABLE);
}

#[test]
fn test_first_instrument_wins() {
    let report = "Instrument: LTQ Orbitrap Velos\nInstrument: Q Exactive\n";
    let features = parse_report("a.mzML", report);
    assert_eq!(features.instrument_model, "LTQ Orbitrap Velos");
}

#[test]
fn test_empty_report_yields_defaults() {
    let features = parse_report("empty.mzML", "");

    assert_eq!(features, RawTextFeatures::new("empty.mzML"));
    assert_eq!(features.activation_method, NOT_AVAILABLE);
}

#[test]
fn test_missing_heading_leaves_activation_unset() {
    let report = "MS-Level 2 & CID (Collision-induced dissociation): 40\n";
    let features = parse_report("a.mzML", report);
    assert_eq!(features.activation_method, NOT_AVAILABLE);
}

#[test]
fn test_labelled_line_after_heading_does_not_capture() {
    let report = "\
Activation methods
experiment type: Label-free

  MS-Level 2 & ETD (Electron transfer dissociation): 10
";
    let features = parse_report("a.mzML", report);
    assert_eq!(features.experiment_type, "Label-free");
    assert_eq!(features.activation_method, "ETD (Electron transfer dissociation)");
}

#[test]
fn test_disabled_strategy_ignores_activation_lines() {
    let features = parse_report_with("a.mzML", FILEINFO_REPORT, &mut Disabled);
    assert_eq!(features.activation_method, NOT_AVAILABLE);
}

#[test]
fn test_to_row_is_sparse() {
    let features = parse_report("a.mzML", "charge 2: 10x\nTotal number of peaks: 99\n");
    let row = features.to_row();

    assert_eq!(row.get("precursor_charge_2"), Some(&Cell::Number(10.0)));
    assert_eq!(row.get("total_peaks"), Some(&Cell::Number(99.0)));
    assert!(row.get("rt_min").is_none());
    assert!(row.get("num_spectra").is_none());
    assert_eq!(
        row.get("organism"),
        Some(&Cell::Text(NOT_AVAILABLE.to_string()))
    );
}

#[test]
fn test_sample_filename_from_report_path() {
    assert_eq!(
        sample_filename(Path::new("/out/fileinfo/PXD1_a.txt")),
        "PXD1_a.mzML"
    );
}
