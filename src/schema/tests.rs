use super::*;
use crate::table::{Cell, Row};
use proptest::prelude::*;

const TRAINING_CSV: &str = "\
rt_min,HUMAN_counthits,HUMAN_avgevalhits,precursor_charge_2,instrument_model
1.0,10,1e-6,100,Q Exactive
3.0,20,3e-6,300,Orbitrap Fusion
";

fn batch() -> Table {
    let mut a = Row::new();
    a.insert("instrument_model".into(), "LTQ".into());
    a.insert("HUMAN_counthits".into(), Cell::Number(4.0));
    a.insert("YEAST_counthits".into(), Cell::Number(9.0));
    a.insert("rt_min".into(), Cell::Number(0.5));

    let mut b = Row::new();
    b.insert("instrument_model".into(), "LTQ".into());
    b.insert("HUMAN_counthits".into(), Cell::Missing);

    Table::from_rows(vec![("a.mzML".to_string(), a), ("b.mzML".to_string(), b)])
}

#[test]
fn test_schema_reads_column_order_and_means() {
    let schema = TrainingSchema::read_csv(TRAINING_CSV.as_bytes()).unwrap();

    assert_eq!(
        schema.columns(),
        &["rt_min", "HUMAN_counthits", "HUMAN_avgevalhits", "precursor_charge_2", "instrument_model"]
    );
    assert_eq!(schema.means().get("HUMAN_counthits"), Some(15.0));
    assert_eq!(schema.means().get("instrument_model"), None);
}

#[test]
fn test_align_matches_schema_exactly() {
    let schema = TrainingSchema::read_csv(TRAINING_CSV.as_bytes()).unwrap();
    let aligned = schema.align(&batch()).unwrap();

    assert_eq!(aligned.columns(), schema.columns());
    assert!(!aligned.has_column("YEAST_counthits"));
    assert_eq!(aligned.len(), 2);
}

#[test]
fn test_align_uses_training_mean_not_batch_mean() {
    let schema = TrainingSchema::read_csv(TRAINING_CSV.as_bytes()).unwrap();
    let aligned = schema.align(&batch()).unwrap();

    // batch mean of HUMAN_counthits would be 4.0
    assert_eq!(aligned.cell("b.mzML", "HUMAN_counthits"), &Cell::Number(15.0));
    assert_eq!(aligned.cell("a.mzML", "HUMAN_counthits"), &Cell::Number(4.0));
    let avg = aligned.cell("a.mzML", "HUMAN_avgevalhits").as_number().unwrap();
    assert!((avg - 2e-6).abs() < 1e-15);
    assert_eq!(aligned.cell("b.mzML", "precursor_charge_2"), &Cell::Number(200.0));
}

#[test]
fn test_absent_plain_column_left_missing() {
    let schema = TrainingSchema::read_csv(TRAINING_CSV.as_bytes()).unwrap();
    let aligned = schema.align(&batch()).unwrap();

    assert_eq!(aligned.cell("b.mzML", "rt_min"), &Cell::Missing);
}

#[test]
fn test_missing_reference_statistic_is_mismatch() {
    let schema = TrainingSchema::new(
        vec!["MOUSE_counthits".to_string()],
        TrainingMeans::default(),
    );
    let err = schema.align(&batch()).unwrap_err();
    assert!(matches!(err, SchemaError::SchemaMismatch(c) if c == "MOUSE_counthits"));
}

#[test]
fn test_fully_populated_family_column_needs_no_reference() {
    let schema = TrainingSchema::new(
        vec!["YEAST_counthits".to_string()],
        TrainingMeans::default(),
    );
    let mut table = batch();
    table.set_cell("b.mzML", "YEAST_counthits", Cell::Number(1.0));

    let aligned = schema.align(&table).unwrap();
    assert_eq!(aligned.cell("b.mzML", "YEAST_counthits"), &Cell::Number(1.0));
}

#[test]
fn test_empty_schema_rejected() {
    let err = TrainingSchema::read_csv("\n".as_bytes());
    assert!(err.is_err());
}

#[test]
fn test_imputed_family() {
    assert_eq!(imputed_family("HUMAN_avgevalhits"), Some("avgevalhits"));
    assert_eq!(imputed_family("precursor_charge_4"), Some("precursor"));
    assert_eq!(imputed_family("total_peaks"), None);
}

proptest! {
    #[test]
    fn prop_aligned_columns_equal_schema(
        schema_cols in prop::collection::vec("[a-z]{1,6}(_counthits)?", 1..8),
        batch_cols in prop::collection::vec("[a-z]{1,6}(_counthits)?", 0..8),
    ) {
        let mut unique = Vec::new();
        for c in schema_cols {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        let means = TrainingMeans::from_pairs(unique.iter().map(|c| (c.clone(), 1.0)));
        let schema = TrainingSchema::new(unique.clone(), means);

        let mut row = Row::new();
        for c in &batch_cols {
            row.insert(c.clone(), Cell::Number(2.0));
        }
        let table = Table::from_rows(vec![("s.mzML".to_string(), row)]);

        let aligned = schema.align(&table).unwrap();
        prop_assert_eq!(aligned.columns(), unique.as_slice());
    }
}
