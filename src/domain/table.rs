// Combined, timestamp-aligned table of every channel
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub timestamp: DateTime<FixedOffset>,
    pub cells: Vec<Option<f64>>,
}

/// Outer join of channel columns on timestamp. Missing cells stay `None`;
/// nothing is interpolated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombinedTable {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl CombinedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn cell(&self, timestamp: &DateTime<FixedOffset>, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|r| &r.timestamp == timestamp)
            .and_then(|r| r.cells[col])
    }
}

/// Accumulates columns one at a time and joins them on `build`.
#[derive(Debug, Default)]
pub struct CombinedTableBuilder {
    columns: Vec<String>,
    cells: BTreeMap<DateTime<FixedOffset>, BTreeMap<usize, f64>>,
}

impl CombinedTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column. A timestamp repeated within the column keeps its last value.
    pub fn add_column<I>(&mut self, name: impl Into<String>, points: I)
    where
        I: IntoIterator<Item = (DateTime<FixedOffset>, f64)>,
    {
        let col = self.columns.len();
        self.columns.push(name.into());
        for (timestamp, value) in points {
            self.cells.entry(timestamp).or_default().insert(col, value);
        }
    }

    pub fn build(self) -> CombinedTable {
        let width = self.columns.len();
        let rows = self
            .cells
            .into_iter()
            .map(|(timestamp, values)| {
                let mut cells = vec![None; width];
                for (col, value) in values {
                    cells[col] = Some(value);
                }
                TableRow { timestamp, cells }
            })
            .collect();

        CombinedTable {
            columns: self.columns,
            rows,
        }
    }
}
