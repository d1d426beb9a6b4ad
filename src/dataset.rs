//! In-memory columnar dataset consumed by validation and migrations.
//!
//! A [`Dataset`] is an ordered list of named [`Column`]s of equal length. Each
//! column stores typed, nullable values; its runtime kind is what schema
//! validation compares against the declared type. CSV input is loaded by
//! narrowing each column to the most specific kind all of its non-empty cells
//! parse as.

use std::{io::Read, io::Write, path::Path};

use anyhow::{Context, Result, anyhow, bail, ensure};
use chrono::NaiveDateTime;
use log::debug;

use crate::{
    data::{Value, parse_naive_datetime, parse_typed_value},
    io_utils,
    schema::DataType,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    DateTime(Vec<Option<NaiveDateTime>>),
    String(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn kind(&self) -> DataType {
        match self {
            ColumnValues::Float(_) => DataType::Float,
            ColumnValues::Int(_) => DataType::Int,
            ColumnValues::Bool(_) => DataType::Bool,
            ColumnValues::DateTime(_) => DataType::DateTime,
            ColumnValues::String(_) => DataType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Float(values) => values.len(),
            ColumnValues::Int(values) => values.len(),
            ColumnValues::Bool(values) => values.len(),
            ColumnValues::DateTime(values) => values.len(),
            ColumnValues::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Missing entries; NaN counts as missing in float columns.
    pub fn null_count(&self) -> usize {
        match self {
            ColumnValues::Float(values) => values
                .iter()
                .filter(|v| v.is_none_or(f64::is_nan))
                .count(),
            ColumnValues::Int(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnValues::Bool(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnValues::DateTime(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnValues::String(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    pub fn value(&self, index: usize) -> Option<Value> {
        match self {
            ColumnValues::Float(values) => values
                .get(index)
                .copied()
                .flatten()
                .filter(|v| !v.is_nan())
                .map(Value::Float),
            ColumnValues::Int(values) => values.get(index).copied().flatten().map(Value::Integer),
            ColumnValues::Bool(values) => values.get(index).copied().flatten().map(Value::Boolean),
            ColumnValues::DateTime(values) => {
                values.get(index).copied().flatten().map(Value::DateTime)
            }
            ColumnValues::String(values) => values
                .get(index)
                .cloned()
                .flatten()
                .map(Value::String),
        }
    }

    /// Column of `len` copies of `value`.
    pub fn filled(value: &Value, len: usize) -> Self {
        match value {
            Value::Boolean(b) => ColumnValues::Bool(vec![Some(*b); len]),
            Value::Integer(i) => ColumnValues::Int(vec![Some(*i); len]),
            Value::Float(f) => ColumnValues::Float(vec![Some(*f); len]),
            Value::String(s) => ColumnValues::String(vec![Some(s.clone()); len]),
            Value::DateTime(dt) => ColumnValues::DateTime(vec![Some(*dt); len]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn kind(&self) -> DataType {
        self.values.kind()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.null_count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Builds a dataset, rejecting duplicate names and ragged columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut dataset = Dataset::default();
        for column in columns {
            ensure!(
                !dataset.contains(&column.name),
                "Duplicate column '{}'",
                column.name
            );
            dataset.insert_column(column)?;
        }
        Ok(dataset)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Appends `column`, or replaces an existing column with the same name in place.
    pub fn insert_column(&mut self, column: Column) -> Result<()> {
        let replacing = self.columns.iter().position(|c| c.name == column.name);
        let others = self
            .columns
            .iter()
            .enumerate()
            .find(|(idx, _)| Some(*idx) != replacing)
            .map(|(_, c)| c.len());
        if let Some(expected) = others {
            ensure!(
                column.len() == expected,
                "Column '{}' has {} row(s) but the dataset has {}",
                column.name,
                column.len(),
                expected
            );
        }
        match replacing {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<Column> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| anyhow!("Column '{name}' not found"))?;
        Ok(self.columns.remove(idx))
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from != to && self.contains(to) {
            bail!("Cannot rename '{from}' to '{to}': column already exists");
        }
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == from)
            .ok_or_else(|| anyhow!("Column '{from}' not found"))?;
        column.name = to.to_string();
        Ok(())
    }

    /// Applies `f` to every present value of a float column.
    pub fn map_floats<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(f64) -> f64,
    {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| anyhow!("Column '{name}' not found"))?;
        match &mut column.values {
            ColumnValues::Float(values) => {
                for value in values.iter_mut().flatten() {
                    *value = f(*value);
                }
                Ok(())
            }
            other => bail!(
                "Column '{name}' holds {} values, expected float",
                other.kind()
            ),
        }
    }

    pub fn from_path(path: &Path, delimiter: u8) -> Result<Self> {
        let reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        Self::read_csv(reader).with_context(|| format!("Reading dataset from {path:?}"))
    }

    pub fn from_csv_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        Self::read_csv(io_utils::open_csv_reader(reader, delimiter))
    }

    fn read_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let headers = reader
            .headers()
            .context("Reading CSV headers")?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (row_idx, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
            for (idx, field) in record.iter().enumerate() {
                raw[idx].push(field.to_string());
            }
        }

        let mut columns = Vec::with_capacity(headers.len());
        for (name, cells) in headers.into_iter().zip(raw) {
            let kind = KindCandidate::observe(&cells).decide();
            debug!("Column '{name}' loaded as {kind}");
            let values = typed_values(&cells, kind)
                .with_context(|| format!("Converting column '{name}' to {kind}"))?;
            columns.push(Column::new(name, values));
        }
        Dataset::new(columns)
    }

    pub fn write_csv<W: Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(writer, delimiter);
        writer
            .write_record(self.column_names())
            .context("Writing CSV headers")?;
        for row in 0..self.row_count() {
            let record = self
                .columns
                .iter()
                .map(|c| c.values.value(row).map(|v| v.as_display()).unwrap_or_default())
                .collect::<Vec<_>>();
            writer
                .write_record(&record)
                .with_context(|| format!("Writing row {}", row + 2))?;
        }
        writer.flush().context("Flushing CSV output")?;
        Ok(())
    }
}

/// Narrows a column's kind as cells are observed; empty cells are skipped.
#[derive(Debug, Clone)]
struct KindCandidate {
    non_empty: usize,
    possible_boolean: bool,
    possible_integer: bool,
    possible_float: bool,
    possible_datetime: bool,
}

impl KindCandidate {
    fn observe(cells: &[String]) -> Self {
        let mut candidate = Self {
            non_empty: 0,
            possible_boolean: true,
            possible_integer: true,
            possible_float: true,
            possible_datetime: true,
        };
        for cell in cells.iter().filter(|c| !c.is_empty()) {
            candidate.non_empty += 1;
            let trimmed = cell.trim();
            // only literal true/false mark a boolean column; yes/no stay text
            if candidate.possible_boolean
                && !trimmed.eq_ignore_ascii_case("true")
                && !trimmed.eq_ignore_ascii_case("false")
            {
                candidate.possible_boolean = false;
            }
            if candidate.possible_integer && trimmed.parse::<i64>().is_err() {
                candidate.possible_integer = false;
            }
            if candidate.possible_float && trimmed.parse::<f64>().is_err() {
                candidate.possible_float = false;
            }
            if candidate.possible_datetime && parse_naive_datetime(trimmed).is_err() {
                candidate.possible_datetime = false;
            }
        }
        candidate
    }

    fn decide(&self) -> DataType {
        if self.non_empty == 0 {
            // an all-missing column reads as float, the way NaN-filled frames do
            DataType::Float
        } else if self.possible_boolean {
            DataType::Bool
        } else if self.possible_integer {
            DataType::Int
        } else if self.possible_float {
            DataType::Float
        } else if self.possible_datetime {
            DataType::DateTime
        } else {
            DataType::String
        }
    }
}

fn typed_values(cells: &[String], kind: DataType) -> Result<ColumnValues> {
    let parsed = cells
        .iter()
        .map(|cell| parse_typed_value(cell, kind))
        .collect::<Result<Vec<_>>>()?;
    let values = match kind {
        DataType::Float => ColumnValues::Float(
            parsed
                .into_iter()
                .map(|v| match v {
                    Some(Value::Float(f)) => Some(f),
                    _ => None,
                })
                .collect(),
        ),
        DataType::Int => ColumnValues::Int(
            parsed
                .into_iter()
                .map(|v| match v {
                    Some(Value::Integer(i)) => Some(i),
                    _ => None,
                })
                .collect(),
        ),
        DataType::Bool => ColumnValues::Bool(
            parsed
                .into_iter()
                .map(|v| match v {
                    Some(Value::Boolean(b)) => Some(b),
                    _ => None,
                })
                .collect(),
        ),
        DataType::DateTime => ColumnValues::DateTime(
            parsed
                .into_iter()
                .map(|v| match v {
                    Some(Value::DateTime(dt)) => Some(dt),
                    _ => None,
                })
                .collect(),
        ),
        DataType::String => ColumnValues::String(
            parsed
                .into_iter()
                .map(|v| v.map(|value| value.as_display()))
                .collect(),
        ),
    };
    Ok(values)
}
