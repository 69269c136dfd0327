//! Observation table loading.
//!
//! The profiling core only needs an in-memory table with three fields per
//! row: entity id, date and amount. This module reads such a table from:
//!
//! - **CSV** (`.csv`): a header row naming the columns, comma-separated
//!   cells, dates as `YYYY-MM-DD` (a trailing time part is ignored). An empty
//!   amount cell is read as a missing value. Cells may be wrapped in double
//!   quotes; a quoted cell can contain commas, and `""` inside quotes is a
//!   literal quote.
//! - **JSON** (`.json`): an array of [`Observation`] objects.
//!
//! Column names default to the historical dataset layout
//! (`cajero`, `fecha`, `retiro`) and can be remapped with [`ColumnMapping`].

use super::Observation;
use crate::error::{Result, SegmentationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Names of the three required columns in a CSV header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Entity identifier column
    pub entity: String,

    /// Date column
    pub date: String,

    /// Amount column
    pub value: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            entity: "cajero".to_string(),
            date: "fecha".to_string(),
            value: "retiro".to_string(),
        }
    }
}

impl ColumnMapping {
    /// Create a custom column mapping.
    pub fn new(entity: &str, date: &str, value: &str) -> Self {
        Self {
            entity: entity.to_string(),
            date: date.to_string(),
            value: value.to_string(),
        }
    }
}

/// Reads observation tables from disk.
#[derive(Debug, Clone, Default)]
pub struct ObservationLoader {
    columns: ColumnMapping,
}

impl ObservationLoader {
    /// Loader with the default column mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with a custom column mapping.
    pub fn with_columns(columns: ColumnMapping) -> Self {
        Self { columns }
    }

    /// Load a table, inferring the format from the file extension.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Observation>> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|value| value.to_str())
            .map(|value| value.to_ascii_lowercase())
            .ok_or_else(|| {
                SegmentationError::input(format!(
                    "unable to infer input format for '{}'; expected .csv or .json",
                    path.display()
                ))
            })?;

        let observations = match extension.as_str() {
            "csv" => self.parse_csv(&fs::read_to_string(path)?)?,
            "json" => serde_json::from_str(&fs::read_to_string(path)?).map_err(|e| {
                SegmentationError::input(format!(
                    "'{}' is not a JSON array of observations: {e}",
                    path.display()
                ))
            })?,
            other => {
                return Err(SegmentationError::input(format!(
                    "unsupported input format '{other}'; expected .csv or .json"
                )))
            }
        };

        log::info!(
            "Loaded {} observations from {}",
            observations.len(),
            path.display()
        );
        Ok(observations)
    }

    /// Parse CSV text with a header row.
    pub fn parse_csv(&self, raw: &str) -> Result<Vec<Observation>> {
        let mut lines = raw
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (header_no, header) = lines
            .next()
            .ok_or_else(|| SegmentationError::input("CSV input is empty"))?;
        let header = split_cells(header, header_no)?;

        let entity_idx = self.column_index(&header, &self.columns.entity)?;
        let date_idx = self.column_index(&header, &self.columns.date)?;
        let value_idx = self.column_index(&header, &self.columns.value)?;

        let mut observations = Vec::new();
        for (line_no, line) in lines {
            let cells = split_cells(line, line_no)?;
            if cells.len() != header.len() {
                return Err(SegmentationError::input(format!(
                    "CSV line {line_no} has {} columns but expected {}",
                    cells.len(),
                    header.len()
                )));
            }

            let entity_id = cells[entity_idx].as_str();
            if entity_id.is_empty() {
                return Err(SegmentationError::input(format!(
                    "CSV line {line_no} has an empty '{}' cell",
                    self.columns.entity
                )));
            }

            let date = parse_date(&cells[date_idx]).ok_or_else(|| {
                SegmentationError::input(format!(
                    "CSV line {line_no}: '{}' is not a valid date",
                    cells[date_idx]
                ))
            })?;

            let value = match cells[value_idx].as_str() {
                "" => f64::NAN,
                cell => cell.parse::<f64>().map_err(|_| {
                    SegmentationError::input(format!(
                        "CSV line {line_no}: '{cell}' is not a valid amount"
                    ))
                })?,
            };

            observations.push(Observation::new(entity_id, date, value));
        }

        Ok(observations)
    }

    fn column_index(&self, header: &[String], name: &str) -> Result<usize> {
        header.iter().position(|cell| *cell == name).ok_or_else(|| {
            SegmentationError::input(format!(
                "CSV header is missing column '{name}' (found: {})",
                header.join(", ")
            ))
        })
    }
}

fn split_cells(line: &str, line_no: usize) -> Result<Vec<String>> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }

    if quoted {
        return Err(SegmentationError::input(format!(
            "CSV line {line_no} has an unterminated quoted cell"
        )));
    }
    cells.push(cell.trim().to_string());
    Ok(cells)
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    let day = cell.split(['T', ' ']).next().unwrap_or(cell);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
