use super::*;

fn row(cells: &[(&str, Cell)]) -> Row {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_columns_are_union_in_first_appearance_order() {
    let table = Table::from_rows(vec![
        ("a.mzML".to_string(), row(&[("x", 1.0.into()), ("y", 2.0.into())])),
        ("b.mzML".to_string(), row(&[("z", 3.0.into()), ("x", 4.0.into())])),
    ]);

    assert_eq!(table.columns(), &["x", "y", "z"]);
    assert_eq!(table.cell("b.mzML", "y"), &Cell::Missing);
}

#[test]
fn test_column_mean_ignores_missing_and_text_columns() {
    let table = Table::from_rows(vec![
        ("a".to_string(), row(&[("n", 1.0.into()), ("t", "foo".into())])),
        ("b".to_string(), row(&[("n", 3.0.into())])),
        ("c".to_string(), row(&[("t", "bar".into())])),
    ]);

    assert_eq!(table.column_mean("n"), Some(2.0));
    assert_eq!(table.column_mean("t"), None);
    assert_eq!(table.column_mean("absent"), None);
}

#[test]
fn test_fill_missing_numeric_leaves_text_alone() {
    let mut table = Table::from_rows(vec![
        ("a".to_string(), row(&[("n", 1.0.into()), ("t", "foo".into())])),
        ("b".to_string(), row(&[("n", Cell::Missing)])),
    ]);

    let filled = table.fill_missing_numeric(|_| Some(9.0));

    assert_eq!(filled, 1);
    assert_eq!(table.cell("b", "n"), &Cell::Number(9.0));
    assert_eq!(table.cell("b", "t"), &Cell::Missing);
}

#[test]
fn test_left_join_keeps_unmatched_left_rows() {
    let left = Table::from_rows(vec![
        ("a".to_string(), row(&[("l", 1.0.into())])),
        ("b".to_string(), row(&[("l", 2.0.into())])),
    ]);
    let right = Table::from_rows(vec![
        ("a".to_string(), row(&[("r", 10.0.into())])),
        ("c".to_string(), row(&[("r", 30.0.into())])),
    ]);

    let joined = left.left_join(&right);

    assert_eq!(joined.len(), 2);
    assert_eq!(joined.columns(), &["l", "r"]);
    assert_eq!(joined.cell("a", "r"), &Cell::Number(10.0));
    assert_eq!(joined.cell("b", "r"), &Cell::Missing);
    assert!(joined.row("c").is_none());
}

#[test]
fn test_select_reorders_and_synthesizes_missing_columns() {
    let table = Table::from_rows(vec![(
        "a".to_string(),
        row(&[("x", 1.0.into()), ("y", 2.0.into())]),
    )]);

    let selected = table.select(&["y".to_string(), "w".to_string()]);

    assert_eq!(selected.columns(), &["y", "w"]);
    assert_eq!(selected.cell("a", "y"), &Cell::Number(2.0));
    assert_eq!(selected.cell("a", "w"), &Cell::Missing);
}

#[test]
fn test_csv_roundtrip_puts_key_first() {
    let table = Table::from_rows(vec![
        (
            "a.mzML".to_string(),
            row(&[("organism", "Homo sapiens".into()), ("rt_min", 0.5.into())]),
        ),
        ("b.mzML".to_string(), row(&[("organism", NOT_AVAILABLE.into())])),
    ]);

    let mut buf = Vec::new();
    table.write_csv(&mut buf, FILENAME_COLUMN).unwrap();
    let text = String::from_utf8(buf.clone()).unwrap();
    assert!(text.starts_with("Filename,organism,rt_min\n"));
    assert!(text.contains("b.mzML,Not available,\n"));

    let restored = Table::read_csv(buf.as_slice(), FILENAME_COLUMN).unwrap();
    assert_eq!(restored.columns(), table.columns());
    assert_eq!(restored.cell("a.mzML", "rt_min"), &Cell::Number(0.5));
    assert_eq!(restored.cell("b.mzML", "rt_min"), &Cell::Missing);
}

#[test]
fn test_read_csv_mixed_column_stays_text() {
    let data = "Filename,fraction\na,1\nb,Not available\n";
    let table = Table::read_csv(data.as_bytes(), FILENAME_COLUMN).unwrap();

    assert_eq!(table.cell("a", "fraction"), &Cell::Text("1".to_string()));
    assert!(!table.is_numeric_column("fraction"));
}

#[test]
fn test_read_csv_requires_key_column() {
    let data = "name,value\na,1\n";
    let err = Table::read_csv(data.as_bytes(), FILENAME_COLUMN).unwrap_err();
    assert!(matches!(err, TableError::MissingKeyColumn(_)));
}

#[test]
fn test_mean_of_empty_is_none() {
    assert_eq!(mean(Vec::new()), None);
    assert_eq!(mean(vec![1.0, 2.0, 6.0]), Some(3.0));
}
