//! Append-only audit trail of schema snapshots.

use std::sync::{Mutex, PoisonError};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::SchemaError, schema::Schema, version::Version};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEntry {
    pub version: Version,
    pub schema: serde_json::Value,
    #[serde(default)]
    pub description: Option<String>,
}

impl EvolutionEntry {
    /// Rebuilds the schema captured by this entry.
    pub fn schema(&self) -> Result<Schema, SchemaError> {
        Ok(serde_json::from_value(self.schema.clone())?)
    }
}

#[derive(Debug, Default)]
pub struct EvolutionLog {
    entries: Mutex<Vec<EvolutionEntry>>,
}

impl EvolutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, schema: &Schema, description: Option<&str>) -> Result<(), SchemaError> {
        let entry = EvolutionEntry {
            version: schema.version(),
            schema: serde_json::to_value(schema)?,
            description: description.map(str::to_string),
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push(entry);
        debug!(
            "Recorded schema {} as history entry {}",
            schema.version(),
            entries.len()
        );
        Ok(())
    }

    pub fn latest(&self) -> Option<EvolutionEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.last().cloned()
    }

    pub fn entries(&self) -> Vec<EvolutionEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pretty JSON array of entries in recording order.
    pub fn to_json(&self) -> Result<String, SchemaError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(serde_json::to_string_pretty(&*entries)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let entries: Vec<EvolutionEntry> = serde_json::from_str(text)?;
        Ok(Self {
            entries: Mutex::new(entries),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::ColumnSpec, version::VersionPart};

    fn schema_v1() -> Schema {
        Schema::new(
            Version::new(1, 0, 0),
            vec![ColumnSpec::float("a"), ColumnSpec::int("b").optional()],
        )
    }

    #[test]
    fn latest_is_none_for_an_empty_log() {
        let log = EvolutionLog::new();
        assert!(log.latest().is_none());
        assert!(log.is_empty());
        assert_eq!(log.to_json().unwrap(), "[]");
    }

    #[test]
    fn entries_keep_recording_order_without_dedup() {
        let log = EvolutionLog::new();
        let v1 = schema_v1();
        let v2 = v1.bump(VersionPart::Minor).unwrap();
        log.record(&v1, Some("initial")).unwrap();
        log.record(&v2, None).unwrap();
        log.record(&v1, Some("initial again")).unwrap();

        let versions = log.entries().iter().map(|e| e.version).collect::<Vec<_>>();
        assert_eq!(
            versions,
            vec![Version::new(1, 0, 0), Version::new(1, 1, 0), Version::new(1, 0, 0)]
        );
        let latest = log.latest().unwrap();
        assert_eq!(latest.description.as_deref(), Some("initial again"));
        assert_eq!(latest.schema().unwrap(), v1);
    }

    #[test]
    fn json_export_resumes_into_an_equal_log() {
        let log = EvolutionLog::new();
        log.record(&schema_v1(), Some("initial")).unwrap();
        let exported = log.to_json().unwrap();
        let resumed = EvolutionLog::from_json(&exported).unwrap();
        assert_eq!(resumed.entries(), log.entries());
        assert_eq!(resumed.to_json().unwrap(), exported);
        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(value[0]["version"], "1.0.0");
        assert_eq!(value[0]["schema"]["columns"][1]["name"], "b");
    }

    #[test]
    fn log_is_shared_across_threads() {
        let log = std::sync::Arc::new(EvolutionLog::new());
        let handles = (0..4)
            .map(|i| {
                let log = std::sync::Arc::clone(&log);
                std::thread::spawn(move || {
                    let schema = Schema::new(Version::new(1, i, 0), Vec::new());
                    log.record(&schema, None).unwrap();
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 4);
    }
}
