//! Migration steps between schema versions and the registry that chains them.
//!
//! Steps are keyed by `(from, to)`. Planning walks forward from the source
//! version, always taking the registered step with the smallest target above
//! the current version, until it lands exactly on the requested version. A
//! walk that passes the requested version, or runs out of forward steps,
//! fails with [`MigrationError::NoPathFound`].
//!
//! Steps can wrap any closure, or be built from declarative
//! [`MigrationOp`]s loaded from a migration file.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    dataset::{Column, ColumnValues, Dataset},
    error::MigrationError,
    version::Version,
};

pub type Transform = Arc<dyn Fn(Dataset) -> Result<Dataset> + Send + Sync>;

#[derive(Clone)]
pub struct MigrationStep {
    from: Version,
    to: Version,
    description: String,
    transform: Transform,
}

impl MigrationStep {
    pub fn new<F>(
        from: Version,
        to: Version,
        description: impl Into<String>,
        transform: F,
    ) -> Result<Self, MigrationError>
    where
        F: Fn(Dataset) -> Result<Dataset> + Send + Sync + 'static,
    {
        if from == to {
            return Err(MigrationError::SelfLoop { version: from });
        }
        Ok(Self {
            from,
            to,
            description: description.into(),
            transform: Arc::new(transform),
        })
    }

    /// A step that applies `operations` in order.
    pub fn from_operations(
        from: Version,
        to: Version,
        description: impl Into<String>,
        operations: Vec<MigrationOp>,
    ) -> Result<Self, MigrationError> {
        Self::new(from, to, description, move |mut dataset| {
            for op in &operations {
                op.apply(&mut dataset)?;
            }
            Ok(dataset)
        })
    }

    pub fn from_version(&self) -> Version {
        self.from
    }

    pub fn to_version(&self) -> Version {
        self.to
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn apply(&self, dataset: Dataset) -> Result<Dataset, MigrationError> {
        (self.transform)(dataset).map_err(|source| MigrationError::StepFailed {
            from: self.from,
            to: self.to,
            source,
        })
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registered steps, shareable across threads. Registration holds the write
/// lock for the whole check-and-insert; planning reads a consistent snapshot.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    steps: RwLock<BTreeMap<(Version, Version), MigrationStep>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, step: MigrationStep) -> Result<(), MigrationError> {
        let mut steps = self.steps.write().unwrap_or_else(PoisonError::into_inner);
        let key = (step.from, step.to);
        if steps.contains_key(&key) {
            return Err(MigrationError::DuplicateMigration {
                from: step.from,
                to: step.to,
            });
        }
        debug!("Registered migration {} -> {}", step.from, step.to);
        steps.insert(key, step);
        Ok(())
    }

    pub fn get(&self, from: Version, to: Version) -> Option<MigrationStep> {
        let steps = self.steps.read().unwrap_or_else(PoisonError::into_inner);
        steps.get(&(from, to)).cloned()
    }

    pub fn len(&self) -> usize {
        self.steps.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All steps ordered by `(from, to)`.
    pub fn steps(&self) -> Vec<MigrationStep> {
        let steps = self.steps.read().unwrap_or_else(PoisonError::into_inner);
        steps.values().cloned().collect()
    }

    pub fn plan(&self, from: Version, to: Version) -> Result<Vec<MigrationStep>, MigrationError> {
        if from == to {
            return Ok(Vec::new());
        }
        let steps = self.steps.read().unwrap_or_else(PoisonError::into_inner);
        let mut current = from;
        let mut visited = BTreeSet::from([from]);
        let mut plan = Vec::new();
        while current != to {
            if current > to {
                debug!("Migration walk overshot {to} at {current}");
                return Err(MigrationError::NoPathFound {
                    at: current,
                    target: to,
                });
            }
            // keys sort by (from, to), so the first forward step has the smallest target
            let next = steps
                .range((current, Version::MIN)..=(current, Version::MAX))
                .map(|(_, step)| step)
                .find(|step| step.to > current)
                .ok_or(MigrationError::NoPathFound {
                    at: current,
                    target: to,
                })?;
            debug!("Planned migration {} -> {}", next.from, next.to);
            current = next.to;
            if !visited.insert(current) {
                return Err(MigrationError::CycleDetected { at: current });
            }
            plan.push(next.clone());
        }
        Ok(plan)
    }

    /// Carries `dataset` from `from` to `to`, feeding each step the previous output.
    pub fn migrate(
        &self,
        dataset: Dataset,
        from: Version,
        to: Version,
    ) -> Result<Dataset, MigrationError> {
        let plan = self.plan(from, to)?;
        let mut dataset = dataset;
        for step in &plan {
            debug!(
                "Applying migration {} -> {} ({})",
                step.from, step.to, step.description
            );
            dataset = step.apply(dataset)?;
        }
        info!("Migrated dataset {from} -> {to} in {} step(s)", plan.len());
        Ok(dataset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MigrationOp {
    /// Adds (or overwrites) a column filled with one literal.
    AddColumn { name: String, value: Value },
    DropColumn { name: String },
    RenameColumn { from: String, to: String },
}

impl MigrationOp {
    pub fn apply(&self, dataset: &mut Dataset) -> Result<()> {
        match self {
            MigrationOp::AddColumn { name, value } => {
                let values = ColumnValues::filled(value, dataset.row_count());
                dataset.insert_column(Column::new(name.clone(), values))
            }
            MigrationOp::DropColumn { name } => dataset.drop_column(name).map(|_| ()),
            MigrationOp::RenameColumn { from, to } => dataset.rename_column(from, to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationDefinition {
    pub from: Version,
    pub to: Version,
    #[serde(default)]
    pub description: Option<String>,
    pub operations: Vec<MigrationOp>,
}

/// A YAML or JSON document listing declarative migrations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationFile {
    pub migrations: Vec<MigrationDefinition>,
}

impl MigrationFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening migration file {path:?}"))?;
        let reader = BufReader::new(file);
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_reader(reader).context("Parsing migration JSON")
        } else {
            serde_yaml::from_reader(reader).context("Parsing migration YAML")
        }
    }

    pub fn into_registry(self) -> Result<MigrationRegistry> {
        let registry = MigrationRegistry::new();
        for definition in self.migrations {
            let description = definition
                .description
                .unwrap_or_else(|| format!("{} -> {}", definition.from, definition.to));
            let step = MigrationStep::from_operations(
                definition.from,
                definition.to,
                description,
                definition.operations,
            )?;
            registry.register(step)?;
        }
        Ok(registry)
    }
}
