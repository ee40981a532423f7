//! # Narrative Synthesizer
//!
//! Renders the descriptive text fields of a metadata record from its
//! arbitrated categories. Every field is a fixed template; the only
//! conditional parts are the organism-part and disease clauses, which appear
//! only for a present value other than the "Not available" sentinel.

use crate::arbiter::ArbitratedRecord;
use crate::model::Category;
use crate::table::{Cell, Row, Table, NOT_AVAILABLE};

/// Placeholder for a category with no value
pub const UNKNOWN: &str = "unknown";

/// Tags appended to every keyword list
pub const FIXED_KEYWORDS: [&str; 2] = ["orphan proteomics", "predicted metadata"];

/// Generated text fields of one sample
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Narrative {
    /// Project title
    pub project_title: String,
    /// Description paragraph
    pub description: String,
    /// Sample processing protocol sentence
    pub sample_protocol: String,
    /// Data processing protocol sentences
    pub data_protocol: String,
    /// Comma-joined keyword list
    pub keywords: String,
}

fn is_informative(value: Option<&str>) -> Option<&str> {
    value.filter(|v| *v != NOT_AVAILABLE)
}

fn optional_clause(label: &str, value: Option<&str>) -> String {
    is_informative(value)
        .map(|v| format!(", {label} {v}"))
        .unwrap_or_default()
}

impl Narrative {
    /// Render every text field from an arbitrated record
    pub fn from_record(record: &ArbitratedRecord) -> Self {
        let get = |c: Category| record.label(c).unwrap_or(UNKNOWN);
        let experiment = get(Category::ExperimentType);
        let organism = get(Category::Organism);
        let instrument = get(Category::Instrument);
        let software = get(Category::Software);
        let quant = get(Category::Quantification);
        let modification = get(Category::Modification);
        let organism_part = record.label(Category::OrganismPart);
        let disease = record.label(Category::Diseases);
        let activation = record.activation_method.as_deref().unwrap_or(UNKNOWN);

        let project_title = format!("Orphan Proteomics Data: {experiment} Analysis of {organism}");

        let description = format!(
            "This project presents orphan proteomics data with predicted metadata, generated \
             through machine learning-based annotation. The dataset focuses on {experiment} \
             proteomics of {organism}{}{}. The data was acquired using {instrument} and analyzed \
             with {software}. Predicted metadata includes {quant}, {modification}, Precursor Mass \
             Tolerance, and Fragment Mass Tolerance. Please note that these annotations are not \
             manually curated and should be interpreted with caution.",
            optional_clause("specifically in", organism_part),
            optional_clause("associated with", disease),
        );

        let sample_protocol = format!(
            "Samples were processed using {experiment}-based workflows, including {activation} fragmentation."
        );

        let data_protocol = format!(
            "Raw data was analyzed using {software}, applying {activation} for fragmentation. \
             {quant} was used for data analysis when applicable."
        );

        let keywords = keyword_list(record).join(", ");

        Self {
            project_title,
            description,
            sample_protocol,
            data_protocol,
            keywords,
        }
    }

    /// The five text columns of the metadata result
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("Project Title".into(), Cell::from(self.project_title.as_str()));
        row.insert("Description".into(), Cell::from(self.description.as_str()));
        row.insert(
            "Sample Processing Protocol".into(),
            Cell::from(self.sample_protocol.as_str()),
        );
        row.insert(
            "Data Processing Protocol".into(),
            Cell::from(self.data_protocol.as_str()),
        );
        row.insert("Keywords".into(), Cell::from(self.keywords.as_str()));
        row
    }
}

/// Ordered keywords of a record; missing and "Not available" entries are left
/// out, duplicates are kept
pub fn keyword_list(record: &ArbitratedRecord) -> Vec<String> {
    let mut candidates = vec![
        record.label(Category::ExperimentType),
        record.label(Category::Organism),
    ];
    if let Some(part) = is_informative(record.label(Category::OrganismPart)) {
        candidates.push(Some(part));
    }
    if let Some(disease) = is_informative(record.label(Category::Diseases)) {
        candidates.push(Some(disease));
    }
    candidates.extend([
        record.label(Category::Instrument),
        record.label(Category::Software),
        record.activation_method.as_deref(),
        record.label(Category::Modification),
    ]);
    candidates.extend(FIXED_KEYWORDS.map(Some));

    candidates
        .into_iter()
        .filter_map(is_informative)
        .map(str::to_string)
        .collect()
}

/// Metadata result table: arbitrated columns followed by the narrative
pub fn metadata_table(records: &[ArbitratedRecord]) -> Table {
    Table::from_rows(records.iter().map(|record| {
        let mut row = record.to_row();
        row.extend(Narrative::from_record(record).to_row());
        (record.filename.clone(), row)
    }))
}
