//! Migration report: what was migrated and what failed, per record type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::RecordType;

/// Primary key → reason, for one record type.
pub type FailureMap = BTreeMap<String, String>;

/// Outcome of migrating one record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeReport {
    /// Primary keys in the order they were inserted.
    pub migrated: Vec<String>,
    pub failed: FailureMap,
}

impl TypeReport {
    pub fn record_success(&mut self, pkey: &str) {
        self.migrated.push(pkey.to_string());
    }

    /// Record a failure; a later failure for the same key replaces the
    /// earlier reason.
    pub fn record_failure(&mut self, pkey: &str, reason: impl Into<String>) {
        self.failed.insert(pkey.to_string(), reason.into());
    }
}

/// Result of a whole migration run.
///
/// Record types are keyed by [`RecordType`], whose ordering is the
/// migration order, so serialized output lists users before groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub migrated: BTreeMap<RecordType, Vec<String>>,
    pub failed: BTreeMap<RecordType, FailureMap>,
    pub enabled: bool,
}

impl MigrationReport {
    /// Empty report for a run that is allowed to proceed.
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Report returned when migration is switched off.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record_type: RecordType, report: TypeReport) {
        self.migrated.insert(record_type, report.migrated);
        self.failed.insert(record_type, report.failed);
    }

    pub fn migrated(&self, record_type: RecordType) -> &[String] {
        self.migrated
            .get(&record_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn failed(&self, record_type: RecordType) -> Option<&FailureMap> {
        self.failed.get(&record_type)
    }

    pub fn total_migrated(&self) -> usize {
        self.migrated.values().map(Vec::len).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.failed.values().map(BTreeMap::len).sum()
    }
}
