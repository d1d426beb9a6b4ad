//! Dataset validation against a [`Schema`].
//!
//! Checks run in a fixed order: required columns, then per schema column
//! (type, nulls, type-specific rules), then the target column. `validate`
//! stops at the first violation; `validate_all` keeps going and returns every
//! violation in the same order. A column whose type does not match gets no
//! further checks.

use log::debug;

use crate::{
    dataset::{Column, ColumnValues, Dataset},
    error::{LengthBound, ValidationError},
    schema::{ColumnSpec, Constraints, NumericBounds, Schema, StringRules},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    FailFast,
    CollectAll,
}

struct Findings {
    mode: ValidationMode,
    errors: Vec<ValidationError>,
}

impl Findings {
    /// Records a violation; returns true when checking should stop.
    fn add(&mut self, error: ValidationError) -> bool {
        self.errors.push(error);
        self.mode == ValidationMode::FailFast
    }

    fn stopped(&self) -> bool {
        self.mode == ValidationMode::FailFast && !self.errors.is_empty()
    }
}

impl Schema {
    pub fn validate(&self, dataset: &Dataset) -> Result<(), ValidationError> {
        match self.check(dataset, ValidationMode::FailFast).into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn validate_all(&self, dataset: &Dataset) -> Vec<ValidationError> {
        self.check(dataset, ValidationMode::CollectAll)
    }

    pub fn check(&self, dataset: &Dataset, mode: ValidationMode) -> Vec<ValidationError> {
        let mut findings = Findings {
            mode,
            errors: Vec::new(),
        };
        self.run_checks(dataset, &mut findings);
        debug!(
            "Validated {} column(s) against schema {}: {} violation(s)",
            dataset.columns().len(),
            self.version(),
            findings.errors.len()
        );
        findings.errors
    }

    fn run_checks(&self, dataset: &Dataset, findings: &mut Findings) {
        let missing = self
            .columns()
            .iter()
            .filter(|spec| spec.required && !dataset.contains(&spec.name))
            .map(|spec| spec.name.clone())
            .collect::<Vec<_>>();
        if !missing.is_empty() && findings.add(ValidationError::MissingColumns { names: missing }) {
            return;
        }

        for spec in self.columns() {
            let Some(column) = dataset.column(&spec.name) else {
                continue;
            };
            check_column(spec, column, findings);
            if findings.stopped() {
                return;
            }
        }

        if let Some(target) = self.target()
            && !dataset.contains(target)
        {
            findings.add(ValidationError::MissingTarget {
                name: target.to_string(),
            });
        }
    }
}

fn check_column(spec: &ColumnSpec, column: &Column, findings: &mut Findings) {
    let name = &spec.name;
    let observed = column.kind();
    if observed != spec.dtype() {
        findings.add(ValidationError::TypeMismatch {
            column: name.clone(),
            expected: spec.dtype(),
            observed,
        });
        return;
    }

    let nulls = column.null_count();
    if !spec.allow_nulls
        && nulls > 0
        && findings.add(ValidationError::UnexpectedNull {
            column: name.clone(),
            nulls,
        })
    {
        return;
    }

    match (&spec.constraints, &column.values) {
        (Constraints::Float { bounds, allowed }, ColumnValues::Float(values)) => {
            let present = values.iter().flatten().copied().filter(|v| !v.is_nan());
            if check_bounds(name, bounds, present, findings) {
                return;
            }
            if let Some(allowed) = allowed
                && values
                    .iter()
                    .any(|v| !v.is_some_and(|value| allowed.contains(&value)))
            {
                findings.add(enum_violation(name, allowed));
            }
        }
        (Constraints::Int { bounds, allowed }, ColumnValues::Int(values)) => {
            let present = values.iter().flatten().map(|v| *v as f64);
            if check_bounds(name, bounds, present, findings) {
                return;
            }
            if let Some(allowed) = allowed
                && values
                    .iter()
                    .any(|v| !v.is_some_and(|value| allowed.contains(&value)))
            {
                findings.add(enum_violation(name, allowed));
            }
        }
        (Constraints::String(rules), ColumnValues::String(values)) => {
            check_strings(name, rules, values, findings);
        }
        (Constraints::DateTime { bounds }, ColumnValues::DateTime(values)) => {
            let present = values
                .iter()
                .flatten()
                .map(|dt| dt.and_utc().timestamp_millis() as f64 / 1000.0);
            check_bounds(name, bounds, present, findings);
        }
        _ => {}
    }
}

/// Returns true when checking should stop.
fn check_bounds<I>(name: &str, bounds: &NumericBounds, values: I, findings: &mut Findings) -> bool
where
    I: Iterator<Item = f64>,
{
    if bounds.min.is_none() && bounds.max.is_none() {
        return false;
    }
    let (lowest, highest) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if let Some(min) = bounds.min
        && lowest < min
        && findings.add(ValidationError::BelowMinimum {
            column: name.to_string(),
            min,
        })
    {
        return true;
    }
    if let Some(max) = bounds.max
        && highest > max
        && findings.add(ValidationError::AboveMaximum {
            column: name.to_string(),
            max,
        })
    {
        return true;
    }
    false
}

fn check_strings(name: &str, rules: &StringRules, values: &[Option<String>], findings: &mut Findings) {
    let lengths = || values.iter().flatten().map(|s| s.chars().count());
    if let Some(min_length) = rules.min_length
        && lengths().any(|len| len < min_length)
        && findings.add(ValidationError::StringLengthViolation {
            column: name.to_string(),
            bound: LengthBound::Min(min_length),
        })
    {
        return;
    }
    if let Some(max_length) = rules.max_length
        && lengths().any(|len| len > max_length)
        && findings.add(ValidationError::StringLengthViolation {
            column: name.to_string(),
            bound: LengthBound::Max(max_length),
        })
    {
        return;
    }
    // a missing entry never matches a pattern or an enum
    if let Some(pattern) = &rules.pattern
        && values
            .iter()
            .any(|v| !v.as_deref().is_some_and(|s| pattern.is_full_match(s)))
        && findings.add(ValidationError::PatternViolation {
            column: name.to_string(),
            pattern: pattern.as_str().to_string(),
        })
    {
        return;
    }
    if let Some(allowed) = &rules.allowed
        && values
            .iter()
            .any(|v| !v.as_ref().is_some_and(|s| allowed.contains(s)))
    {
        findings.add(enum_violation(name, allowed));
    }
}

fn enum_violation<T: ToString>(name: &str, allowed: &[T]) -> ValidationError {
    ValidationError::EnumViolation {
        column: name.to_string(),
        allowed: allowed.iter().map(ToString::to_string).collect(),
    }
}
