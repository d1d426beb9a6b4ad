//! Backward-compatibility reports between two schema versions.
//!
//! Columns are matched by name. Removing a column, changing its type, making
//! it required, tightening numeric bounds, shrinking an enum, or setting a new
//! pattern are breaking. Added columns and relaxed requirements are not. Added
//! required columns are filed as non-breaking unless [`DiffPolicy`] says
//! otherwise. A report is compatible when nothing is breaking and the version
//! stayed on the same major line without going backwards.

use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::schema::{ColumnSpec, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffPolicy {
    pub added_required_is_breaking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSeverity {
    Breaking,
    NonBreaking,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaChangeKind {
    ColumnRemoved,
    ColumnAdded { required: bool },
    DatatypeChanged { from: String, to: String },
    BecameOptional,
    BecameRequired,
    MinimumRaised { from: f64, to: f64 },
    MaximumLowered { from: f64, to: f64 },
    EnumRestricted { removed: Vec<String> },
    PatternChanged { from: Option<String>, to: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaChange {
    pub column: String,
    #[serde(flatten)]
    pub change: SchemaChangeKind,
    pub severity: ChangeSeverity,
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.column;
        match &self.change {
            SchemaChangeKind::ColumnRemoved => write!(f, "Removed column '{name}'"),
            SchemaChangeKind::ColumnAdded { required: true } => {
                write!(f, "Added required column '{name}' (may break existing data)")
            }
            SchemaChangeKind::ColumnAdded { required: false } => {
                write!(f, "Added optional column '{name}'")
            }
            SchemaChangeKind::DatatypeChanged { from, to } => {
                write!(f, "Column '{name}' dtype change {from} -> {to}")
            }
            SchemaChangeKind::BecameOptional => write!(f, "Column '{name}' became optional"),
            SchemaChangeKind::BecameRequired => write!(f, "Column '{name}' became required"),
            SchemaChangeKind::MinimumRaised { from, to } => {
                write!(f, "Column '{name}' min increased {from} -> {to}")
            }
            SchemaChangeKind::MaximumLowered { from, to } => {
                write!(f, "Column '{name}' max decreased {from} -> {to}")
            }
            SchemaChangeKind::EnumRestricted { removed } => write!(
                f,
                "Column '{name}' enum no longer permits [{}]",
                removed.iter().join(", ")
            ),
            SchemaChangeKind::PatternChanged { .. } => write!(f, "Column '{name}' pattern changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    pub breaking: Vec<String>,
    pub non_breaking: Vec<String>,
    pub changes: Vec<SchemaChange>,
}

impl CompatibilityReport {
    pub fn breaking_changes(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes
            .iter()
            .filter(|c| c.severity == ChangeSeverity::Breaking)
    }
}

impl Schema {
    /// Compares `self` (the newer schema) against `previous`.
    pub fn diff(&self, previous: &Schema) -> CompatibilityReport {
        self.diff_with_policy(previous, DiffPolicy::default())
    }

    pub fn diff_with_policy(&self, previous: &Schema, policy: DiffPolicy) -> CompatibilityReport {
        let previous_cols = by_name(previous);
        let current_cols = by_name(self);
        let mut changes = Vec::new();

        for name in previous_cols.keys().filter(|n| !current_cols.contains_key(*n)) {
            changes.push(change(name, SchemaChangeKind::ColumnRemoved, true));
        }

        for (name, spec) in current_cols
            .iter()
            .filter(|(n, _)| !previous_cols.contains_key(*n))
        {
            let breaking = spec.required && policy.added_required_is_breaking;
            changes.push(change(
                name,
                SchemaChangeKind::ColumnAdded {
                    required: spec.required,
                },
                breaking,
            ));
        }

        for (name, prev) in &previous_cols {
            if let Some(curr) = current_cols.get(name) {
                compare_column(name, prev, curr, &mut changes);
            }
        }

        let (breaking, non_breaking): (Vec<_>, Vec<_>) = changes
            .iter()
            .partition(|c| c.severity == ChangeSeverity::Breaking);
        let breaking = breaking.into_iter().map(ToString::to_string).collect::<Vec<_>>();
        let non_breaking = non_breaking
            .into_iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let compatible =
            breaking.is_empty() && self.version().is_backward_compatible_with(&previous.version());
        debug!(
            "Compared schema {} with {}: {} breaking, {} non-breaking change(s)",
            self.version(),
            previous.version(),
            breaking.len(),
            non_breaking.len()
        );
        CompatibilityReport {
            compatible,
            breaking,
            non_breaking,
            changes,
        }
    }
}

fn by_name(schema: &Schema) -> BTreeMap<&str, &ColumnSpec> {
    schema
        .columns()
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect()
}

fn change(column: &str, change: SchemaChangeKind, breaking: bool) -> SchemaChange {
    SchemaChange {
        column: column.to_string(),
        change,
        severity: if breaking {
            ChangeSeverity::Breaking
        } else {
            ChangeSeverity::NonBreaking
        },
    }
}

fn compare_column(name: &str, prev: &ColumnSpec, curr: &ColumnSpec, changes: &mut Vec<SchemaChange>) {
    if prev.dtype() != curr.dtype() {
        changes.push(change(
            name,
            SchemaChangeKind::DatatypeChanged {
                from: prev.dtype().to_string(),
                to: curr.dtype().to_string(),
            },
            true,
        ));
    }
    if prev.required && !curr.required {
        changes.push(change(name, SchemaChangeKind::BecameOptional, false));
    }
    if !prev.required && curr.required {
        changes.push(change(name, SchemaChangeKind::BecameRequired, true));
    }

    if let (Some(old), Some(new)) = (prev.constraints.bounds(), curr.constraints.bounds()) {
        if let (Some(from), Some(to)) = (old.min, new.min)
            && to > from
        {
            changes.push(change(name, SchemaChangeKind::MinimumRaised { from, to }, true));
        }
        if let (Some(from), Some(to)) = (old.max, new.max)
            && to < from
        {
            changes.push(change(name, SchemaChangeKind::MaximumLowered { from, to }, true));
        }
    }

    if let (Some(old), Some(new)) = (
        prev.constraints.allowed_values(),
        curr.constraints.allowed_values(),
    ) {
        let removed = old
            .iter()
            .filter(|value| !new.contains(value))
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if !removed.is_empty() {
            changes.push(change(name, SchemaChangeKind::EnumRestricted { removed }, true));
        }
    }

    let old_pattern = prev.constraints.pattern().map(|p| p.as_str());
    if let Some(new_pattern) = curr.constraints.pattern().map(|p| p.as_str())
        && old_pattern != Some(new_pattern)
    {
        changes.push(change(
            name,
            SchemaChangeKind::PatternChanged {
                from: old_pattern.map(str::to_string),
                to: new_pattern.to_string(),
            },
            true,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn schema(version: (u64, u64, u64), columns: Vec<ColumnSpec>) -> Schema {
        Schema::new(Version::new(version.0, version.1, version.2), columns)
    }

    #[test]
    fn removed_column_is_breaking_and_added_is_not() {
        let previous = schema((1, 0, 0), vec![ColumnSpec::float("a"), ColumnSpec::int("b")]);
        let current = schema(
            (1, 1, 0),
            vec![ColumnSpec::float("a"), ColumnSpec::string("c").optional()],
        );
        let report = current.diff(&previous);
        assert!(!report.compatible);
        assert_eq!(report.breaking, vec!["Removed column 'b'"]);
        assert_eq!(report.non_breaking, vec!["Added optional column 'c'"]);
    }

    #[test]
    fn added_required_column_follows_policy() {
        let previous = schema((1, 0, 0), vec![ColumnSpec::float("a")]);
        let current = schema((1, 1, 0), vec![ColumnSpec::float("a"), ColumnSpec::int("n")]);
        let report = current.diff(&previous);
        assert!(report.compatible);
        assert!(report.breaking.is_empty());
        assert_eq!(
            report.non_breaking,
            vec!["Added required column 'n' (may break existing data)"]
        );

        let strict = current.diff_with_policy(
            &previous,
            DiffPolicy {
                added_required_is_breaking: true,
            },
        );
        assert!(!strict.compatible);
        assert_eq!(
            strict.breaking,
            vec!["Added required column 'n' (may break existing data)"]
        );
    }

    #[test]
    fn field_changes_are_classified() {
        let previous = schema(
            (1, 0, 0),
            vec![
                ColumnSpec::int("t"),
                ColumnSpec::int("r").optional(),
                ColumnSpec::int("o"),
                ColumnSpec::float("bounds").with_min(0.0).with_max(10.0),
                ColumnSpec::string("e").with_enum(["x", "y"]).unwrap(),
                ColumnSpec::string("p").with_pattern("[a-z]+").unwrap(),
            ],
        );
        let current = schema(
            (1, 0, 1),
            vec![
                ColumnSpec::float("t"),
                ColumnSpec::int("r"),
                ColumnSpec::int("o").optional(),
                ColumnSpec::float("bounds").with_min(1.0).with_max(5.0),
                ColumnSpec::string("e").with_enum(["x", "z"]).unwrap(),
                ColumnSpec::string("p").with_pattern("[a-z]*").unwrap(),
            ],
        );
        let report = current.diff(&previous);
        assert_eq!(
            report.breaking,
            vec![
                "Column 'bounds' min increased 0 -> 1",
                "Column 'bounds' max decreased 10 -> 5",
                "Column 'e' enum no longer permits [y]",
                "Column 'p' pattern changed",
                "Column 'r' became required",
                "Column 't' dtype change int -> float",
            ]
        );
        assert_eq!(report.non_breaking, vec!["Column 'o' became optional"]);
        assert!(!report.compatible);
        assert_eq!(report.breaking_changes().count(), 6);
    }

    #[test]
    fn relaxed_rules_are_not_reported() {
        let previous = schema(
            (1, 0, 0),
            vec![
                ColumnSpec::int("n").with_min(5.0).with_max(10.0).with_enum([5i64, 6]).unwrap(),
                ColumnSpec::string("s").with_pattern("a").unwrap(),
            ],
        );
        let current = schema(
            (1, 0, 0),
            vec![
                ColumnSpec::int("n").with_min(0.0).with_max(20.0).with_enum([5i64, 6, 7]).unwrap(),
                ColumnSpec::string("s"),
            ],
        );
        let report = current.diff(&previous);
        assert!(report.compatible);
        assert!(report.breaking.is_empty());
        assert!(report.non_breaking.is_empty());
    }

    #[test]
    fn major_bump_is_incompatible_even_without_changes() {
        let previous = schema((1, 9, 9), vec![ColumnSpec::float("a")]);
        let current = schema((2, 0, 0), vec![ColumnSpec::float("a")]);
        let report = current.diff(&previous);
        assert!(report.breaking.is_empty());
        assert!(!report.compatible);
        let downgrade = previous.diff(&schema((1, 10, 0), vec![ColumnSpec::float("a")]));
        assert!(!downgrade.compatible);
    }

    #[test]
    fn empty_schemas_produce_an_empty_compatible_report() {
        let report = schema((1, 0, 0), Vec::new()).diff(&schema((1, 0, 0), Vec::new()));
        assert!(report.compatible);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn report_serializes_structured_changes() {
        let previous = schema((1, 0, 0), vec![ColumnSpec::int("b").optional()]);
        let current = schema((1, 1, 0), vec![ColumnSpec::int("b")]);
        let value = serde_json::to_value(current.diff(&previous)).unwrap();
        assert_eq!(value["compatible"], false);
        assert_eq!(value["changes"][0]["column"], "b");
        assert_eq!(value["changes"][0]["kind"], "became_required");
        assert_eq!(value["changes"][0]["severity"], "breaking");
    }
}
