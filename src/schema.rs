//! Versioned dataset schema model and its canonical document form.
//!
//! A [`Schema`] is an ordered list of [`ColumnSpec`]s, an optional target
//! column, and a [`Version`]. Column constraints are carried by
//! [`Constraints`], one variant per declared type, so each column only holds
//! the rules that apply to it. On disk the schema uses a flat record per
//! column (`name`, `dtype`, `required`, `allow_nulls`, `min`, `max`, `enum`,
//! `pattern`, `min_length`, `max_length`) with `null` for unset fields; rules
//! that do not apply to a column's `dtype` are ignored when loading.
//!
//! Column names are expected to be unique within a schema. Schemas are
//! immutable: evolving one means building a new schema at a new version.

pub mod evolution;
pub mod validate;

use std::{
    fmt,
    fs::{self, File},
    io::BufReader,
    path::Path,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    error::{SchemaError, VersionError},
    version::{Version, VersionPart},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float,
    Int,
    String,
    Bool,
    DateTime,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Int => "int",
            DataType::String => "string",
            DataType::Bool => "bool",
            DataType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive numeric limits. Datetime columns read them as epoch seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// A regular expression that must match a whole string value.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    full_match: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let full_match = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            full_match,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, value: &str) -> bool {
        self.full_match.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    pub allowed: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraints {
    Float {
        bounds: NumericBounds,
        allowed: Option<Vec<f64>>,
    },
    Int {
        bounds: NumericBounds,
        allowed: Option<Vec<i64>>,
    },
    String(StringRules),
    Bool,
    DateTime {
        bounds: NumericBounds,
    },
}

impl Constraints {
    pub fn unconstrained(dtype: DataType) -> Self {
        match dtype {
            DataType::Float => Constraints::Float {
                bounds: NumericBounds::default(),
                allowed: None,
            },
            DataType::Int => Constraints::Int {
                bounds: NumericBounds::default(),
                allowed: None,
            },
            DataType::String => Constraints::String(StringRules::default()),
            DataType::Bool => Constraints::Bool,
            DataType::DateTime => Constraints::DateTime {
                bounds: NumericBounds::default(),
            },
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            Constraints::Float { .. } => DataType::Float,
            Constraints::Int { .. } => DataType::Int,
            Constraints::String(_) => DataType::String,
            Constraints::Bool => DataType::Bool,
            Constraints::DateTime { .. } => DataType::DateTime,
        }
    }

    pub fn bounds(&self) -> Option<&NumericBounds> {
        match self {
            Constraints::Float { bounds, .. }
            | Constraints::Int { bounds, .. }
            | Constraints::DateTime { bounds } => Some(bounds),
            Constraints::String(_) | Constraints::Bool => None,
        }
    }

    fn bounds_mut(&mut self) -> Option<&mut NumericBounds> {
        match self {
            Constraints::Float { bounds, .. }
            | Constraints::Int { bounds, .. }
            | Constraints::DateTime { bounds } => Some(bounds),
            Constraints::String(_) | Constraints::Bool => None,
        }
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        match self {
            Constraints::String(rules) => rules.pattern.as_ref(),
            _ => None,
        }
    }

    /// Permitted literals, if the column restricts its values to a set.
    pub fn allowed_values(&self) -> Option<Vec<Value>> {
        match self {
            Constraints::Float { allowed, .. } => allowed
                .as_ref()
                .map(|values| values.iter().copied().map(Value::Float).collect()),
            Constraints::Int { allowed, .. } => allowed
                .as_ref()
                .map(|values| values.iter().copied().map(Value::Integer).collect()),
            Constraints::String(rules) => rules
                .allowed
                .as_ref()
                .map(|values| values.iter().cloned().map(Value::String).collect()),
            Constraints::Bool | Constraints::DateTime { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnRecord", into = "ColumnRecord")]
pub struct ColumnSpec {
    pub name: String,
    pub required: bool,
    pub allow_nulls: bool,
    pub constraints: Constraints,
}

impl ColumnSpec {
    /// A required, non-nullable column with no further rules.
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            required: true,
            allow_nulls: false,
            constraints: Constraints::unconstrained(dtype),
        }
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Float)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Int)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, DataType::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Bool)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, DataType::DateTime)
    }

    pub fn dtype(&self) -> DataType {
        self.constraints.dtype()
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.allow_nulls = true;
        self
    }

    /// Sets the lower bound; ignored for types without numeric bounds.
    pub fn with_min(mut self, min: f64) -> Self {
        if let Some(bounds) = self.constraints.bounds_mut() {
            bounds.min = Some(min);
        }
        self
    }

    /// Sets the upper bound; ignored for types without numeric bounds.
    pub fn with_max(mut self, max: f64) -> Self {
        if let Some(bounds) = self.constraints.bounds_mut() {
            bounds.max = Some(max);
        }
        self
    }

    pub fn with_length(mut self, min_length: Option<usize>, max_length: Option<usize>) -> Self {
        if let Constraints::String(rules) = &mut self.constraints {
            rules.min_length = min_length;
            rules.max_length = max_length;
        }
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, SchemaError> {
        if let Constraints::String(rules) = &mut self.constraints {
            let compiled = Pattern::new(pattern).map_err(|source| SchemaError::InvalidPattern {
                column: self.name.clone(),
                pattern: pattern.to_string(),
                source,
            })?;
            rules.pattern = Some(compiled);
        }
        Ok(self)
    }

    pub fn with_enum<I, V>(mut self, values: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let literals = values.into_iter().map(Into::into).collect::<Vec<_>>();
        set_allowed(&self.name, &mut self.constraints, literals)?;
        Ok(self)
    }
}

fn set_allowed(
    column: &str,
    constraints: &mut Constraints,
    literals: Vec<Value>,
) -> Result<(), SchemaError> {
    let dtype = constraints.dtype();
    let invalid = |literal: &Value| SchemaError::InvalidEnumLiteral {
        column: column.to_string(),
        dtype,
        literal: literal.to_string(),
    };
    match constraints {
        Constraints::Float { allowed, .. } => {
            let values = literals
                .iter()
                .map(|literal| match literal {
                    Value::Float(f) => Ok(*f),
                    Value::Integer(i) => Ok(*i as f64),
                    other => Err(invalid(other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            *allowed = Some(values);
        }
        Constraints::Int { allowed, .. } => {
            let values = literals
                .iter()
                .map(|literal| match literal {
                    Value::Integer(i) => Ok(*i),
                    Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
                    other => Err(invalid(other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            *allowed = Some(values);
        }
        Constraints::String(rules) => {
            let values = literals
                .iter()
                .map(|literal| match literal {
                    Value::String(s) => Ok(s.clone()),
                    // ISO-8601 literals deserialize as datetimes; keep their text
                    Value::DateTime(dt) => Ok(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
                    other => Err(invalid(other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            rules.allowed = Some(values);
        }
        Constraints::Bool | Constraints::DateTime { .. } => {}
    }
    Ok(())
}

/// Flat on-disk form of a column.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnRecord {
    name: String,
    dtype: DataType,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default)]
    allow_nulls: bool,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default, rename = "enum")]
    allowed: Option<Vec<Value>>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    min_length: Option<usize>,
    #[serde(default)]
    max_length: Option<usize>,
}

const fn default_required() -> bool {
    true
}

impl TryFrom<ColumnRecord> for ColumnSpec {
    type Error = SchemaError;

    fn try_from(record: ColumnRecord) -> Result<Self, Self::Error> {
        let mut spec = ColumnSpec::new(record.name, record.dtype);
        spec.required = record.required;
        spec.allow_nulls = record.allow_nulls;
        if let Some(bounds) = spec.constraints.bounds_mut() {
            bounds.min = record.min;
            bounds.max = record.max;
        }
        spec = spec.with_length(record.min_length, record.max_length);
        if let Some(pattern) = record.pattern.as_deref() {
            spec = spec.with_pattern(pattern)?;
        }
        if let Some(literals) = record.allowed {
            set_allowed(&spec.name, &mut spec.constraints, literals)?;
        }
        Ok(spec)
    }
}

impl From<ColumnSpec> for ColumnRecord {
    fn from(spec: ColumnSpec) -> Self {
        let dtype = spec.dtype();
        let bounds = spec.constraints.bounds().copied().unwrap_or_default();
        let allowed = spec.constraints.allowed_values();
        let (pattern, min_length, max_length) = match spec.constraints {
            Constraints::String(rules) => (
                rules.pattern.map(|p| p.source),
                rules.min_length,
                rules.max_length,
            ),
            _ => (None, None, None),
        };
        ColumnRecord {
            name: spec.name,
            dtype,
            required: spec.required,
            allow_nulls: spec.allow_nulls,
            min: bounds.min,
            max: bounds.max,
            allowed,
            pattern,
            min_length,
            max_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    version: Version,
    columns: Vec<ColumnSpec>,
    #[serde(default)]
    target: Option<String>,
}

impl Schema {
    pub fn new(version: Version, columns: Vec<ColumnSpec>) -> Self {
        Self {
            version,
            columns,
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Same columns and target at the bumped version.
    pub fn bump(&self, part: VersionPart) -> Result<Self, VersionError> {
        Ok(Self {
            version: self.version.bump(part)?,
            ..self.clone()
        })
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String, SchemaError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Loads JSON for `.json` paths and YAML otherwise.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let reader = BufReader::new(File::open(path)?);
        if is_json_path(path) {
            Ok(serde_json::from_reader(reader)?)
        } else {
            Ok(serde_yaml::from_reader(reader)?)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        let rendered = if is_json_path(path) {
            self.to_json()?
        } else {
            self.to_yaml()?
        };
        fs::write(path, rendered)?;
        Ok(())
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
