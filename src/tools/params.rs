//! Search parameter files.
//!
//! A parameter file is derived per sample from the tolerance prediction and
//! the instrument-info report, and is read back when the identification
//! search is launched. Lines the search does not need are ignored on read.

use std::sync::LazyLock;

use regex::Regex;

use crate::report::activation::method_name;

/// Header line prefix of a tolerance prediction table
pub const PREDICTION_HEADER: &str = "file\tprecursor_prediction_ppm";

/// Marker of the activation-method section of an instrument-info report
pub const ACTIVATION_HEADING: &str = "Activation methods";

/// Instruments searched with high-resolution fragment settings
pub const HIGH_RES_INSTRUMENTS: [&str; 11] = [
    "Bruker Daltonics maXis series",
    "LTQ Orbitrap Elite",
    "LTQ Orbitrap Velos",
    "LTQ Orbitrap XL",
    "Orbitrap Fusion",
    "Orbitrap Fusion Lumos",
    "Q Exactive",
    "Q Exactive HF-X",
    "Q Exactive Plus",
    "TripleTOF 5600",
    "TripleTOF 6600",
];

/// Instruments searched with low-resolution fragment settings
pub const LOW_RES_INSTRUMENTS: [&str; 11] = [
    "4800 Proteomics Analyzer",
    "Agilent instrument model",
    "Bruker Daltonics instrument model",
    "LTQ",
    "MS levels: 1, 2",
    "MS levels: 2",
    "Mass Analyzer: Ion trap (resolution: 0)",
    "Mass Analyzer: Quadrupole (resolution: 0)",
    "Mass Analyzer: Unknown (resolution: 0)",
    "SCIEX instrument model",
    "Waters instrument model",
];

static PEPTIDE_TOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"peptide_mass_tolerance\s*=\s*([\d.]+)").unwrap());
static FRAGMENT_TOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fragment_mass_tolerance\s*=\s*([\d.]+)").unwrap());
static INSTRUMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"instrument\s*=\s*(\S+)").unwrap());
static ACTIVATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"activation_method\s*=\s*(\S+)").unwrap());

/// Fragment resolution class of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// High-resolution fragment spectra
    High,
    /// Low-resolution fragment spectra
    Low,
}

impl Resolution {
    /// Resolution class of a known instrument name
    pub fn of_instrument(instrument: &str) -> Option<Self> {
        if HIGH_RES_INSTRUMENTS.contains(&instrument) {
            Some(Resolution::High)
        } else if LOW_RES_INSTRUMENTS.contains(&instrument) {
            Some(Resolution::Low)
        } else {
            None
        }
    }

    /// Value used in parameter files and on the search command line
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::High => "high_res",
            Resolution::Low => "low_res",
        }
    }
}

/// Search-engine name of a single recognised activation method
pub fn search_activation(method: &str) -> Option<&'static str> {
    match method {
        "CID (Collision-induced dissociation)" => Some("CID"),
        "ETD (Electron transfer dissociation)" => Some("ETD"),
        "HCID (High-energy collision-induced dissociation)" => Some("HCD"),
        "LCID (Low-energy collision-induced dissociation)" => Some("LCID"),
        _ => None,
    }
}

/// Every activation method listed in an instrument-info report, joined by
/// spaces. `None` without an activation-method section.
pub fn listed_activation_methods(report: &str) -> Option<String> {
    if !report.contains(ACTIVATION_HEADING) {
        return None;
    }
    let methods: Vec<&str> = report
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("MS-Level"))
        .map(method_name)
        .collect();
    let joined = methods.join(" ");
    let joined = joined.trim();
    (!joined.is_empty()).then(|| joined.to_string())
}

/// Tolerance prediction values: the line after the prediction header, split
/// on tabs
pub fn parse_tolerance_prediction(content: &str) -> Option<Vec<String>> {
    let mut lines = content.lines();
    lines.find(|l| l.starts_with(PREDICTION_HEADER))?;
    let values = lines.next()?;
    Some(values.trim().split('\t').map(str::to_string).collect())
}

fn predicted(values: &[String], index: usize) -> Option<f64> {
    values
        .get(index)
        .filter(|v| v.as_str() != "ERROR")
        .and_then(|v| v.trim().parse::<f64>().ok())
}

/// Parameters written to a sample's search parameter file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterFile {
    /// Precursor tolerance in ppm, predicted value plus its sigma
    pub peptide_mass_tolerance: Option<f64>,
    /// Fragment tolerance in Th, half the predicted bin width
    pub fragment_mass_tolerance: Option<f64>,
    /// Instrument resolution class
    pub instrument: Option<Resolution>,
    /// Search-engine activation method
    pub activation_method: Option<&'static str>,
}

impl ParameterFile {
    /// Derive parameters from prediction values and report fields
    pub fn derive(prediction: Option<&[String]>, instrument: Option<&str>, activation: Option<&str>) -> Self {
        let mut params = Self::default();
        if let Some(values) = prediction {
            if let (Some(ppm), Some(sigma)) = (predicted(values, 1), predicted(values, 2)) {
                params.peptide_mass_tolerance = Some(ppm + sigma);
            }
            params.fragment_mass_tolerance = predicted(values, 3).map(|th| th / 2.0);
        }
        params.instrument = instrument.and_then(Resolution::of_instrument);
        params.activation_method = activation.and_then(search_activation);
        params
    }

    /// Parameter file content
    pub fn render(&self) -> String {
        let mut out = String::from("# Comet MS/MS search engine parameters file.\n");
        out.push_str("decoy_search = 1\n");
        out.push_str("decoy_prefix = DECOY_\n");
        if let Some(tol) = self.peptide_mass_tolerance {
            out.push_str(&format!("peptide_mass_tolerance =  {tol:?}\n"));
        }
        if let Some(tol) = self.fragment_mass_tolerance {
            out.push_str(&format!("fragment_mass_tolerance =  {tol:?}\n"));
        }
        if let Some(resolution) = self.instrument {
            out.push_str(&format!("instrument = {}\n", resolution.as_str()));
        }
        if let Some(method) = self.activation_method {
            out.push_str(&format!("activation_method = {method}\n"));
        }
        out
    }
}

/// Settings passed to the identification search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    /// Precursor mass tolerance (ppm)
    pub precursor_mass_tolerance: f64,
    /// Fragment mass tolerance (Th)
    pub fragment_mass_tolerance: f64,
    /// Activation method, `ALL` when unknown
    pub activation_method: String,
    /// Instrument resolution class
    pub instrument: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            precursor_mass_tolerance: 10.0,
            fragment_mass_tolerance: 0.01,
            activation_method: "ALL".to_string(),
            instrument: Resolution::High.as_str().to_string(),
        }
    }
}

impl SearchSettings {
    /// Read settings from parameter file content, keeping defaults for
    /// anything not stated
    pub fn parse(content: &str) -> Self {
        let mut settings = Self::default();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with("peptide_mass_tolerance") {
                if let Some(v) = capture_f64(&PEPTIDE_TOL_RE, line) {
                    settings.precursor_mass_tolerance = v;
                }
            } else if line.starts_with("fragment_mass_tolerance") {
                if let Some(v) = capture_f64(&FRAGMENT_TOL_RE, line) {
                    settings.fragment_mass_tolerance = v;
                }
            } else if line.starts_with("instrument") {
                if let Some(c) = INSTRUMENT_RE.captures(line) {
                    settings.instrument = c[1].to_string();
                }
            } else if line.starts_with("activation_method") {
                if let Some(c) = ACTIVATION_RE.captures(line) {
                    settings.activation_method = c[1].to_string();
                }
            }
        }
        settings
    }
}

fn capture_f64(re: &Regex, line: &str) -> Option<f64> {
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREDICTION: &str = "\
INFO: processing sample.mzML
file\tprecursor_prediction_ppm\tprecursor_sigma_ppm\tfragment_prediction_th\tfragment_sigma_th
sample.mzML\t4.5\t1.5\t0.02\t0.004
";

    #[test]
    fn test_parse_prediction() {
        let values = parse_tolerance_prediction(PREDICTION).unwrap();
        assert_eq!(values[1], "4.5");
        assert_eq!(values.len(), 5);
        assert!(parse_tolerance_prediction("no header\n").is_none());
    }

    #[test]
    fn test_derive_and_render() {
        let values = parse_tolerance_prediction(PREDICTION).unwrap();
        let params = ParameterFile::derive(
            Some(&values),
            Some("Q Exactive"),
            Some("HCID (High-energy collision-induced dissociation)"),
        );

        assert_eq!(params.peptide_mass_tolerance, Some(6.0));
        assert_eq!(params.fragment_mass_tolerance, Some(0.01));
        assert_eq!(
            params.render(),
            "# Comet MS/MS search engine parameters file.\n\
             decoy_search = 1\n\
             decoy_prefix = DECOY_\n\
             peptide_mass_tolerance =  6.0\n\
             fragment_mass_tolerance =  0.01\n\
             instrument = high_res\n\
             activation_method = HCD\n"
        );
    }

    #[test]
    fn test_error_predictions_are_omitted() {
        let values: Vec<String> = ["f", "ERROR", "1.0", "ERROR"].map(String::from).to_vec();
        let params = ParameterFile::derive(Some(&values), Some("LTQ"), Some("CID ETD"));

        assert_eq!(params.peptide_mass_tolerance, None);
        assert_eq!(params.fragment_mass_tolerance, None);
        assert_eq!(params.instrument, Some(Resolution::Low));
        assert_eq!(params.activation_method, None);
    }

    #[test]
    fn test_listed_activation_methods() {
        let report = "Activation methods\n  MS-Level 2 & CID (Collision-induced dissociation): 2310\n";
        assert_eq!(
            listed_activation_methods(report).as_deref(),
            Some("CID (Collision-induced dissociation)")
        );

        let two = "Activation methods\nMS-Level 2 & CID (Collision-induced dissociation): 5\n\
                   MS-Level 2 & ETD (Electron transfer dissociation): 3\n";
        let joined = listed_activation_methods(two).unwrap();
        assert_eq!(search_activation(&joined), None);

        assert_eq!(listed_activation_methods("MS-Level 2 & CID: 5\n"), None);
    }

    #[test]
    fn test_search_settings_round_trip_and_defaults() {
        let params = ParameterFile {
            peptide_mass_tolerance: Some(12.5),
            fragment_mass_tolerance: None,
            instrument: Some(Resolution::Low),
            activation_method: Some("ETD"),
        };
        let settings = SearchSettings::parse(&params.render());

        assert_eq!(settings.precursor_mass_tolerance, 12.5);
        assert_eq!(settings.fragment_mass_tolerance, 0.01);
        assert_eq!(settings.instrument, "low_res");
        assert_eq!(settings.activation_method, "ETD");
        assert_eq!(SearchSettings::parse(""), SearchSettings::default());
    }
}
