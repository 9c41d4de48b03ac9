//! Tab-separated dataset tables keyed by taxon name.
//!
//! ## Format
//!
//! ```text
//! taxa      condA   condB
//! tipA      1.5     na
//! tipC      #NUM!   3.0
//! ```
//!
//! The first header cell names the key column and is otherwise ignored; the
//! remaining header cells are condition names. Rows whose key is a known tip
//! name are matched, all others are counted and dropped. Cells that are not
//! finite numbers are recorded as missing rather than rejected.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::{Error, Result};

/// A numeric cell that may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CellValue {
    Number(f64),
    #[default]
    Missing,
}

impl CellValue {
    /// Parses a cell, treating anything but a finite number as missing.
    pub fn parse(cell: &str) -> Self {
        match cell.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => CellValue::Number(value),
            _ => CellValue::Missing,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            CellValue::Missing => None,
        }
    }
}

/// Serialized as `{"value": <number|null>}`.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("value", &self.value())?;
        map.end()
    }
}

/// A dataset reconciled against a set of tip names.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetTable {
    conditions: Vec<String>,
    /// Every known tip with its cells (all missing if it had no row)
    tip_values: Vec<(String, Vec<CellValue>)>,
    matched_row_count: usize,
    unmatched_row_count: usize,
    min_value: Option<f64>,
    max_value: Option<f64>,
}

impl DatasetTable {
    /// Condition (column) names in header order.
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn matched_row_count(&self) -> usize {
        self.matched_row_count
    }

    pub fn unmatched_row_count(&self) -> usize {
        self.unmatched_row_count
    }

    /// Smallest non-missing matched value across all conditions.
    pub fn min_value(&self) -> Option<f64> {
        self.min_value
    }

    /// Largest non-missing matched value across all conditions.
    pub fn max_value(&self) -> Option<f64> {
        self.max_value
    }

    /// Cells of a known tip, in condition order.
    pub fn tip_cells(&self, tip: &str) -> Option<&[CellValue]> {
        self.tip_values
            .iter()
            .find(|(name, _)| name == tip)
            .map(|(_, cells)| cells.as_slice())
    }

    /// Value of one condition for one tip; `None` when missing or unknown.
    pub fn value(&self, tip: &str, condition: &str) -> Option<f64> {
        let column = self.conditions.iter().position(|c| c == condition)?;
        self.tip_cells(tip)?.get(column)?.value()
    }

    /// Serializable view, labelled with the dataset's name.
    pub fn view<'a>(&'a self, name: &'a str) -> DatasetView<'a> {
        DatasetView { name, table: self }
    }
}

/// Reads a tab-separated table and reconciles its rows with `known_tips`.
///
/// Taxon keys must equal a tip name exactly; only numeric cells are
/// trimmed. Blank lines are skipped. Short rows get missing cells for the absent
/// columns; surplus cells are ignored. When several rows match the same tip
/// the last one provides its values.
///
/// # Errors
/// Only a table without header line fails.
pub fn load_dataset<S: AsRef<str>>(tsv: &str, known_tips: &[S]) -> Result<DatasetTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(tsv.as_bytes());

    let headers = reader.headers().map_err(|e| Error::Dataset(e.to_string()))?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(Error::Dataset("missing header line".to_string()));
    }
    let conditions: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let known: HashMap<&str, usize> = known_tips
        .iter()
        .enumerate()
        .map(|(i, tip)| (tip.as_ref(), i))
        .collect();

    let mut rows: Vec<Vec<CellValue>> = Vec::new();
    let mut by_tip: Vec<Option<usize>> = vec![None; known_tips.len()];
    let mut unmatched_row_count = 0;

    for record in reader.records() {
        let record = record.map_err(|e| Error::Dataset(e.to_string()))?;
        if is_blank(&record) {
            continue;
        }
        let taxon = record.get(0).unwrap_or_default();
        match known.get(taxon) {
            Some(&tip) => {
                let cells = (0..conditions.len())
                    .map(|column| record.get(column + 1).map(CellValue::parse).unwrap_or_default())
                    .collect();
                by_tip[tip] = Some(rows.len());
                rows.push(cells);
            }
            None => unmatched_row_count += 1,
        }
    }

    let values = rows.iter().flat_map(|cells| cells.iter().filter_map(CellValue::value));
    let (min_value, max_value) = values.fold((None, None), |(min, max): (Option<f64>, Option<f64>), v| {
        (
            Some(min.map_or(v, |m| m.min(v))),
            Some(max.map_or(v, |m| m.max(v))),
        )
    });

    let tip_values = known_tips
        .iter()
        .zip(&by_tip)
        .map(|(tip, row)| {
            let cells = match row {
                Some(row) => rows[*row].clone(),
                None => vec![CellValue::Missing; conditions.len()],
            };
            (tip.as_ref().to_string(), cells)
        })
        .collect();

    Ok(DatasetTable {
        conditions,
        matched_row_count: rows.len(),
        tip_values,
        unmatched_row_count,
        min_value,
        max_value,
    })
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

// ============================================================================
// Serialization
// ============================================================================
/// Serializable form of a [`DatasetTable`].
///
/// `tip_values` keeps tree tip order and column order.
#[derive(Debug)]
pub struct DatasetView<'a> {
    name: &'a str,
    table: &'a DatasetTable,
}

struct TipValues<'a>(&'a DatasetTable);

struct Cells<'a> {
    conditions: &'a [String],
    cells: &'a [CellValue],
}

impl Serialize for DatasetView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let table = self.table;
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry("name", self.name)?;
        map.serialize_entry("columns", &table.conditions)?;
        map.serialize_entry("tip_values", &TipValues(table))?;
        map.serialize_entry("matched_row_count", &table.matched_row_count)?;
        map.serialize_entry("unmatched_row_count", &table.unmatched_row_count)?;
        map.serialize_entry("min_value", &table.min_value)?;
        map.serialize_entry("max_value", &table.max_value)?;
        map.end()
    }
}

impl Serialize for TipValues<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.tip_values.len()))?;
        for (tip, cells) in &self.0.tip_values {
            let cells = Cells {
                conditions: &self.0.conditions,
                cells,
            };
            map.serialize_entry(tip, &cells)?;
        }
        map.end()
    }
}

impl Serialize for Cells<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.conditions.len()))?;
        for (condition, cell) in self.conditions.iter().zip(self.cells) {
            map.serialize_entry(condition, cell)?;
        }
        map.end()
    }
}
