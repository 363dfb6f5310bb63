//! # In-Memory Tables
//!
//! The table representation that lives only for the duration of one task's
//! `run`: a row-key column plus ordered named value columns, read from and
//! written to delimited files with a header row.
//!
//! Reads can project down to a subset of columns by name, which is how
//! transforms avoid loading columns they never touch. Writes always include
//! the row key and preserve insertion order, so re-running a task over the
//! same inputs produces a byte-identical file.

use std::collections::HashMap;
use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::debug;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
struct Row {
    key: String,
    cells: Vec<Option<String>>,
}

/// One two-dimensional dataset: a unique row-key column plus zero or more
/// named value columns. Empty cells are `None`.
#[derive(Debug, Clone)]
pub struct Table {
    key_name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
}

impl Table {
    /// An empty table whose row-key column has the given name.
    pub fn new(key_name: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Parse a table from delimited text.
    ///
    /// The first header field names the row key. `projection` restricts the
    /// value columns that are materialized; the row key is always read. A
    /// projected name absent from the header is a [`PipelineError::ColumnNotFound`]
    /// against `source` (a display label for the origin of the data).
    pub fn read_csv<R: Read>(
        reader: R,
        projection: Option<&[String]>,
        source: &str,
    ) -> PipelineResult<Self> {
        let mut csv = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = csv.headers()?.clone();
        if headers.is_empty() {
            return Err(PipelineError::schema(format!(
                "table {} has no header row",
                source
            )));
        }

        let key_name = headers[0].to_string();
        // Positions of the value columns to materialize, in file order.
        let mut keep: Vec<usize> = Vec::new();
        match projection {
            Some(wanted) => {
                for name in wanted {
                    match headers.iter().position(|h| h == name) {
                        Some(0) => {} // the row key is implied, never duplicated
                        Some(pos) => {
                            if !keep.contains(&pos) {
                                keep.push(pos);
                            }
                        }
                        None => {
                            return Err(PipelineError::ColumnNotFound {
                                column: name.clone(),
                                table: source.to_string(),
                            })
                        }
                    }
                }
                keep.sort_unstable();
            }
            None => keep.extend(1..headers.len()),
        }

        let mut table = Table::new(key_name);
        table.columns = keep.iter().map(|&pos| headers[pos].to_string()).collect();

        let mut record = StringRecord::new();
        while csv.read_record(&mut record)? {
            let key = record.get(0).unwrap_or("").to_string();
            let cells = keep
                .iter()
                .map(|&pos| record.get(pos).filter(|v| !v.is_empty()).map(String::from))
                .collect();
            table.push_row(key, cells)?;
        }
        debug!(
            "read {} rows x {} columns from {}",
            table.len(),
            table.columns.len(),
            source
        );
        Ok(table)
    }

    /// Write the full table, row key first, empty cells rendered as empty
    /// fields. Row order is insertion order, so output is deterministic.
    pub fn write_csv<W: Write>(&self, writer: W) -> PipelineResult<()> {
        let mut csv = WriterBuilder::new().from_writer(writer);
        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(self.key_name.as_str());
        header.extend(self.columns.iter().map(String::as_str));
        csv.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(row.cells.len() + 1);
            record.push(row.key.as_str());
            record.extend(row.cells.iter().map(|c| c.as_deref().unwrap_or("")));
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Value column names, in order (the row key is not included).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.key.as_str())
    }

    /// Append a row. The key must be new to the table.
    pub fn push_row(&mut self, key: String, cells: Vec<Option<String>>) -> PipelineResult<()> {
        if cells.len() != self.columns.len() {
            return Err(PipelineError::schema(format!(
                "row {} has {} cells, table has {} columns",
                key,
                cells.len(),
                self.columns.len()
            )));
        }
        if self.index.contains_key(&key) {
            return Err(PipelineError::schema(format!("duplicate row key {}", key)));
        }
        self.index.insert(key.clone(), self.rows.len());
        self.rows.push(Row { key, cells });
        Ok(())
    }

    /// Cell value for (row key, column), if the row exists and the cell is
    /// non-empty.
    pub fn get(&self, key: &str, column: &str) -> Option<&str> {
        let row = &self.rows[*self.index.get(key)?];
        let pos = self.columns.iter().position(|c| c == column)?;
        row.cells[pos].as_deref()
    }

    /// Overwrite one cell. The row and column must already exist.
    pub fn set(&mut self, key: &str, column: &str, value: Option<String>) -> PipelineResult<()> {
        let pos = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| PipelineError::ColumnNotFound {
                column: column.to_string(),
                table: self.key_name.clone(),
            })?;
        let row_idx = *self
            .index
            .get(key)
            .ok_or_else(|| PipelineError::schema(format!("row key {} not found", key)))?;
        self.rows[row_idx].cells[pos] = value;
        Ok(())
    }

    /// Append a new, empty value column.
    pub fn add_column(&mut self, name: impl Into<String>) -> PipelineResult<()> {
        let name = name.into();
        if name == self.key_name || self.has_column(&name) {
            return Err(PipelineError::schema(format!(
                "column {} already exists",
                name
            )));
        }
        self.columns.push(name);
        for row in &mut self.rows {
            row.cells.push(None);
        }
        Ok(())
    }

    /// Remove a value column.
    pub fn drop_column(&mut self, name: &str) -> PipelineResult<()> {
        let pos = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PipelineError::ColumnNotFound {
                column: name.to_string(),
                table: self.key_name.clone(),
            })?;
        self.columns.remove(pos);
        for row in &mut self.rows {
            row.cells.remove(pos);
        }
        Ok(())
    }

    /// Apply `f` to every cell of one column, in row order. `f` receives the
    /// row key and a mutable reference to the cell.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> PipelineResult<()>
    where
        F: FnMut(&str, &mut Option<String>),
    {
        let pos = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| PipelineError::ColumnNotFound {
                column: column.to_string(),
                table: self.key_name.clone(),
            })?;
        for row in &mut self.rows {
            f(&row.key, &mut row.cells[pos]);
        }
        Ok(())
    }

    /// Overwrite `column` with the same-named column from `source`, aligned
    /// by row key. Rows with no match in `source` become empty; keys present
    /// only in `source` are dropped. With `create_if_missing`, a destination
    /// column that does not exist yet is created instead of rejected.
    pub fn replace_column(
        &mut self,
        column: &str,
        source: &Table,
        create_if_missing: bool,
    ) -> PipelineResult<()> {
        if !source.has_column(column) {
            return Err(PipelineError::ColumnNotFound {
                column: column.to_string(),
                table: source.key_name.clone(),
            });
        }
        if !self.has_column(column) {
            if !create_if_missing {
                return Err(PipelineError::schema(format!(
                    "replacement target column {} does not exist",
                    column
                )));
            }
            self.add_column(column)?;
        }

        let keys: Vec<String> = self.keys().map(String::from).collect();
        for key in keys {
            let value = source.get(&key, column).map(String::from);
            self.set(&key, column, value)?;
        }
        Ok(())
    }

    /// Outer join with `right`.
    ///
    /// `left_on` / `right_on` name the join column on each side; `None`
    /// means that side joins on its row key. The result keeps every key from
    /// either side: left rows first in left order (merged with their match,
    /// if any), then unmatched right rows in right order. Result columns are
    /// the left columns followed by right columns not already present; on a
    /// name collision the left side's value wins for matched rows.
    ///
    /// Where several right rows share one join value, only the first is
    /// merged; row keys in the result stay unique. An unmatched right row
    /// enters under its own key, numerically suffixed if a left row already
    /// holds that key.
    pub fn outer_join(
        &self,
        right: &Table,
        left_on: Option<&str>,
        right_on: Option<&str>,
    ) -> PipelineResult<Table> {
        if let Some(col) = left_on {
            if !self.has_column(col) {
                return Err(PipelineError::ColumnNotFound {
                    column: col.to_string(),
                    table: self.key_name.clone(),
                });
            }
        }
        if let Some(col) = right_on {
            if !right.has_column(col) {
                return Err(PipelineError::ColumnNotFound {
                    column: col.to_string(),
                    table: right.key_name.clone(),
                });
            }
        }

        // Columns the right side contributes, with their source positions.
        let fresh: Vec<(usize, &String)> = right
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !self.has_column(name))
            .collect();

        let mut joined = Table::new(self.key_name.clone());
        joined.columns = self.columns.clone();
        joined
            .columns
            .extend(fresh.iter().map(|(_, name)| (*name).clone()));

        // First right row per join value.
        let mut right_by_value: HashMap<&str, usize> = HashMap::new();
        for (idx, row) in right.rows.iter().enumerate() {
            let value = match right_on {
                Some(col) => match right.get(&row.key, col) {
                    Some(v) => v,
                    None => continue, // empty join cells never match
                },
                None => row.key.as_str(),
            };
            if right_by_value.insert(value, idx).is_some() {
                debug!("duplicate join value {} on right side, keeping first", value);
            }
        }

        let mut matched = vec![false; right.rows.len()];
        for row in &self.rows {
            let value = match left_on {
                Some(col) => self.get(&row.key, col),
                None => Some(row.key.as_str()),
            };
            let partner = value.and_then(|v| right_by_value.get(v).copied());

            let mut cells = row.cells.clone();
            match partner {
                Some(idx) => {
                    matched[idx] = true;
                    let other = &right.rows[idx];
                    cells.extend(fresh.iter().map(|(pos, _)| other.cells[*pos].clone()));
                }
                None => cells.extend(std::iter::repeat(None).take(fresh.len())),
            }
            joined.push_row(row.key.clone(), cells)?;
        }

        for (idx, row) in right.rows.iter().enumerate() {
            if matched[idx] {
                continue;
            }
            // Colliding columns carry the right side's value here, since
            // there is no left row to take precedence.
            let mut cells: Vec<Option<String>> = self
                .columns
                .iter()
                .map(|name| {
                    right
                        .columns
                        .iter()
                        .position(|c| c == name)
                        .and_then(|pos| row.cells[pos].clone())
                })
                .collect();
            cells.extend(fresh.iter().map(|(pos, _)| row.cells[*pos].clone()));

            // When joining on value columns, an unmatched right row keeps
            // its own key; if a left row already claims it, suffix the key
            // to keep the result index unique.
            let mut key = row.key.clone();
            let mut suffix = 1;
            while joined.index.contains_key(&key) {
                key = format!("{}_{}", row.key, suffix);
                suffix += 1;
            }
            joined.push_row(key, cells)?;
        }

        Ok(joined)
    }
}
