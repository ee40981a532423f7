//! # Keyed Sparse Tables
//!
//! Every pipeline stage exchanges data as a [`Table`]: one [`Row`] per sample,
//! keyed by the canonical sample filename. Rows are sparse maps from column
//! name to [`Cell`], so a sample only carries the charge states and organism
//! suffixes it actually produced. The column set of a table is the union of
//! its rows' keys in first-appearance order; it becomes a fixed header only
//! when the table is serialized.
//!
//! ## CSV layout
//!
//! The key column (`Filename` for all pipeline artifacts) is always written
//! first. Missing cells are written as empty fields. On read, a column whose
//! non-empty values all parse as numbers becomes numeric, otherwise every
//! non-empty value of that column is kept as text.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use indexmap::IndexMap;
use log::debug;

use crate::artifact;

pub use error::TableError;

mod error;

#[cfg(test)]
mod tests;

/// Name of the key column in every pipeline artifact
pub const FILENAME_COLUMN: &str = "Filename";

/// Sentinel used in place of a genuinely missing categorical value
pub const NOT_AVAILABLE: &str = "Not available";

static MISSING: Cell = Cell::Missing;

/// A single table value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// No value
    #[default]
    Missing,
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
}

impl Cell {
    /// Numeric value, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the cell holds no value
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Render the value as a label, numbers included.
    ///
    /// Returns `None` for missing cells.
    pub fn to_label(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Number(v) => Some(v.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }

    fn render(&self) -> String {
        self.to_label().unwrap_or_default()
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Cell::Missing
        } else {
            Cell::Number(value)
        }
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::from).unwrap_or_default()
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map(Cell::Text).unwrap_or_default()
    }
}

/// Sparse row: column name to value, in insertion order
pub type Row = IndexMap<String, Cell>;

/// Table of sparse rows keyed by sample filename
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: IndexMap<String, Row>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with a fixed column order
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for column in columns {
            table.push_column(column);
        }
        table
    }

    /// Build a table from keyed rows, reconciling the union of their columns
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, Row)>,
    {
        let mut table = Self::new();
        for (key, row) in rows {
            table.insert_row(key, row);
        }
        table
    }

    /// Insert a row, registering any columns not yet known.
    ///
    /// A row for an existing key replaces the previous one.
    pub fn insert_row(&mut self, key: impl Into<String>, row: Row) {
        let key = key.into();
        for column in row.keys() {
            if column != FILENAME_COLUMN {
                self.push_column(column.as_str());
            }
        }
        if self.rows.insert(key.clone(), row).is_some() {
            debug!("Replacing duplicate row for {}", key);
        }
    }

    /// Append a column to the column order if it is not present yet
    pub fn push_column(&mut self, column: impl Into<String>) {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
    }

    /// Column names in order, excluding the key column
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the table declares a column
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Look up a row by key
    pub fn row(&self, key: &str) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Iterate over keyed rows
    pub fn rows(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.rows.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Value at `(key, column)`; absent cells read as [`Cell::Missing`]
    pub fn cell(&self, key: &str, column: &str) -> &Cell {
        self.rows
            .get(key)
            .and_then(|row| row.get(column))
            .unwrap_or(&MISSING)
    }

    /// Set a single value, registering the column if needed
    pub fn set_cell(&mut self, key: &str, column: &str, cell: Cell) {
        self.push_column(column);
        if let Some(row) = self.rows.get_mut(key) {
            row.insert(column.to_string(), cell);
        }
    }

    /// All values of a column in row order
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.rows
            .values()
            .map(move |row| row.get(column).unwrap_or(&MISSING))
    }

    /// A column is numeric when it holds at least one number and no text
    pub fn is_numeric_column(&self, column: &str) -> bool {
        let mut any_number = false;
        for cell in self.column_values(column) {
            match cell {
                Cell::Text(_) => return false,
                Cell::Number(_) => any_number = true,
                Cell::Missing => {}
            }
        }
        any_number
    }

    /// Arithmetic mean of a numeric column, ignoring missing cells
    pub fn column_mean(&self, column: &str) -> Option<f64> {
        if !self.is_numeric_column(column) {
            return None;
        }
        mean(self.column_values(column).filter_map(Cell::as_number))
    }

    /// Fill missing cells of every numeric column with `fill(column)`.
    ///
    /// Columns for which `fill` returns `None` are left untouched.
    /// Returns the number of cells filled.
    pub fn fill_missing_numeric<F>(&mut self, fill: F) -> usize
    where
        F: Fn(&str) -> Option<f64>,
    {
        let numeric: Vec<String> = self
            .columns
            .iter()
            .filter(|c| self.is_numeric_column(c))
            .cloned()
            .collect();

        let mut filled = 0;
        for column in numeric {
            let Some(value) = fill(&column) else {
                continue;
            };
            for row in self.rows.values_mut() {
                let cell = row.entry(column.clone()).or_default();
                if cell.is_missing() {
                    *cell = Cell::Number(value);
                    filled += 1;
                }
            }
        }
        filled
    }

    /// Fill missing cells of one column with `value`, whatever its type.
    ///
    /// Returns the number of cells filled.
    pub fn fill_missing_in(&mut self, column: &str, value: f64) -> usize {
        self.push_column(column);
        let mut filled = 0;
        for row in self.rows.values_mut() {
            let cell = row.entry(column.to_string()).or_default();
            if cell.is_missing() {
                *cell = Cell::Number(value);
                filled += 1;
            }
        }
        filled
    }

    /// Number of missing cells in a column
    pub fn missing_count(&self, column: &str) -> usize {
        self.column_values(column).filter(|c| c.is_missing()).count()
    }

    /// Left join on the row key: every row of `self` survives, `right`'s
    /// columns are appended after `self`'s.
    ///
    /// On a column present in both tables the left value is kept.
    pub fn left_join(&self, right: &Table) -> Table {
        let mut joined = Table::with_columns(self.columns.iter().cloned());
        for column in &right.columns {
            if joined.has_column(column) {
                debug!("Column {} present on both sides of join; keeping left", column);
            }
            joined.push_column(column.clone());
        }

        for (key, row) in &self.rows {
            let mut merged = row.clone();
            if let Some(other) = right.rows.get(key) {
                for (column, cell) in other {
                    merged.entry(column.clone()).or_insert_with(|| cell.clone());
                }
            }
            joined.rows.insert(key.clone(), merged);
        }
        joined
    }

    /// Projection onto `columns` in the given order; absent cells become missing
    pub fn select(&self, columns: &[String]) -> Table {
        let mut selected = Table::with_columns(columns.iter().cloned());
        for (key, row) in &self.rows {
            let projected: Row = columns
                .iter()
                .map(|c| (c.clone(), row.get(c).cloned().unwrap_or_default()))
                .collect();
            selected.rows.insert(key.clone(), projected);
        }
        selected
    }

    /// Read a CSV table from a file, keyed by `key_column`
    pub fn from_csv_path<P: AsRef<Path>>(path: P, key_column: &str) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::read_csv(BufReader::new(file), key_column)
    }

    /// Read a CSV table keyed by `key_column`
    pub fn read_csv<R: Read>(reader: R, key_column: &str) -> Result<Self, TableError> {
        let (header, records) = read_raw_csv(reader)?;

        let key_idx = header
            .iter()
            .position(|h| h == key_column)
            .ok_or_else(|| TableError::MissingKeyColumn(key_column.to_string()))?;

        let numeric: Vec<bool> = (0..header.len())
            .map(|i| {
                records
                    .iter()
                    .filter_map(|r| r.get(i))
                    .filter(|v| !v.is_empty())
                    .all(|v| v.parse::<f64>().is_ok())
            })
            .collect();

        let mut table = Table::new();
        for (i, column) in header.iter().enumerate() {
            if i != key_idx {
                table.push_column(column.as_str());
            }
        }

        for record in records {
            let key = record.get(key_idx).cloned().unwrap_or_default();
            let mut row = Row::new();
            for (i, column) in header.iter().enumerate() {
                if i == key_idx {
                    continue;
                }
                let raw = record.get(i).map(String::as_str).unwrap_or("");
                row.insert(column.clone(), parse_cell(raw, numeric[i]));
            }
            table.rows.insert(key, row);
        }

        Ok(table)
    }

    /// Write the table as CSV with `key_column` first
    pub fn write_csv<W: Write>(&self, writer: W, key_column: &str) -> Result<(), TableError> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(key_column);
        header.extend(self.columns.iter().map(String::as_str));
        wtr.write_record(&header)?;

        for (key, row) in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(key.clone());
            for column in &self.columns {
                record.push(row.get(column).map(Cell::render).unwrap_or_default());
            }
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write the table to `path` atomically, keyed by `key_column`
    pub fn write_csv_path<P: AsRef<Path>>(&self, path: P, key_column: &str) -> Result<(), TableError> {
        artifact::persist_atomically(path.as_ref(), |file| self.write_csv(file, key_column))
    }
}

/// Read a headed CSV into its header and string records
pub(crate) fn read_raw_csv<R: Read>(reader: R) -> Result<(Vec<String>, Vec<Vec<String>>), TableError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    for (i, column) in header.iter().enumerate() {
        if header[..i].contains(column) {
            return Err(TableError::DuplicateColumn(column.clone()));
        }
    }

    let mut records = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        records.push(record.iter().map(|v| v.trim().to_string()).collect());
    }

    Ok((header, records))
}

fn parse_cell(raw: &str, numeric: bool) -> Cell {
    if raw.is_empty() {
        return Cell::Missing;
    }
    if numeric {
        raw.parse::<f64>().map(Cell::from).unwrap_or_default()
    } else {
        Cell::Text(raw.to_string())
    }
}

/// Arithmetic mean, `None` for an empty input
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
