#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use schema_managed::{Column, ColumnSpec, ColumnValues, Dataset, Schema, Version};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read temp file")
    }
}

pub fn floats(name: &str, values: &[f64]) -> Column {
    Column::new(
        name,
        ColumnValues::Float(values.iter().copied().map(Some).collect()),
    )
}

pub fn ints(name: &str, values: &[i64]) -> Column {
    Column::new(
        name,
        ColumnValues::Int(values.iter().copied().map(Some).collect()),
    )
}

pub fn dataset(columns: Vec<Column>) -> Dataset {
    Dataset::new(columns).expect("columns share a length")
}

/// Float `a` plus optional int `b`.
pub fn schema_v1() -> Schema {
    Schema::new(
        Version::new(1, 0, 0),
        vec![ColumnSpec::float("a"), ColumnSpec::int("b").optional()],
    )
}

/// `b` becomes required with bounds 0..=10.
pub fn schema_v1_1() -> Schema {
    Schema::new(
        Version::new(1, 1, 0),
        vec![
            ColumnSpec::float("a"),
            ColumnSpec::int("b").with_min(0.0).with_max(10.0),
        ],
    )
}
