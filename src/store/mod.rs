// 🗄️ Tabular Store - the four read-only relations everything else filters
//
// Loaded once through a RelationSource (CSV directory or SQLite file),
// then shared as an immutable snapshot until an explicit reload.

pub mod csv_source;
pub mod sqlite_source;

use crate::period::Period;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use csv_source::{CsvSource, RelationFiles};
pub use sqlite_source::SqliteSource;

// ============================================================================
// ROWS
// ============================================================================

/// One financial report line, at entity or group granularity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    /// 8-digit code of the reporting institution
    pub entity_code: String,
    pub period: Period,
    pub account_name: String,
    pub account_code: i64,
    /// Report document the line was filed under
    pub document_code: u32,
    pub value: Option<f64>,
    /// Name as stored in the report (may be stale)
    pub institution_name: String,
}

/// One consolidated indicator value, keyed by entity or group code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRow {
    /// Entity code or group code, as text
    pub filter_code: String,
    pub period: Period,
    pub account_name: String,
    pub account_code: i64,
    pub value: Option<f64>,
}

/// Registry record: names, group memberships and leader linkage, versioned by period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRow {
    pub entity_code: String,
    pub period: Period,
    pub institution_name: String,
    pub prudential_group_code: Option<String>,
    pub financial_group_code: Option<String>,
    /// Code the prudential group files consolidated figures under
    pub leader_code: Option<String>,

    /// Every other registry column, addressable by name
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RegistryRow {
    /// Read a column by name: standard fields first, then free-form attributes
    pub fn column(&self, name: &str) -> Option<String> {
        match name {
            "entity_code" => Some(self.entity_code.clone()),
            "period" => Some(self.period.to_string()),
            "institution_name" => Some(self.institution_name.clone()),
            "prudential_group_code" => self.prudential_group_code.clone(),
            "financial_group_code" => self.financial_group_code.clone(),
            "leader_code" => self.leader_code.clone(),
            other => self.attributes.get(other).cloned(),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TabularStore {
    pub entity_detail: Vec<DetailRow>,
    pub group_detail: Vec<DetailRow>,
    pub group_values: Vec<ValueRow>,
    pub registry: Vec<RegistryRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entity_detail: usize,
    pub group_detail: usize,
    pub group_values: usize,
    pub registry: usize,
}

impl TabularStore {
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entity_detail: self.entity_detail.len(),
            group_detail: self.group_detail.len(),
            group_values: self.group_values.len(),
            registry: self.registry.len(),
        }
    }

    /// Most recent registry row for an entity code.
    ///
    /// "Most recent" is the maximum period; ties keep the earliest row in
    /// storage order.
    pub fn latest_registry_row(&self, code: &str) -> Option<&RegistryRow> {
        latest_by_period(self.registry.iter().filter(|r| r.entity_code == code))
    }

    /// Most recent row of a prudential group that declares a leader
    pub fn latest_group_leader(&self, group_code: &str) -> Option<&RegistryRow> {
        latest_by_period(self.registry.iter().filter(|r| {
            r.prudential_group_code.as_deref() == Some(group_code) && r.leader_code.is_some()
        }))
    }
}

fn latest_by_period<'a>(rows: impl Iterator<Item = &'a RegistryRow>) -> Option<&'a RegistryRow> {
    let mut best: Option<&RegistryRow> = None;
    for row in rows {
        match best {
            Some(current) if row.period <= current.period => {}
            _ => best = Some(row),
        }
    }
    best
}

// ============================================================================
// RELATION SOURCE
// ============================================================================

/// Where the four relations come from
pub trait RelationSource: Send + Sync {
    /// Load a fresh snapshot of all relations
    fn load(&self) -> anyhow::Result<TabularStore>;

    /// Human-readable location, used in log lines
    fn describe(&self) -> String;
}

/// Source backed by an already-built store (tests, embedding)
pub struct StaticSource(pub TabularStore);

impl RelationSource for StaticSource {
    fn load(&self) -> anyhow::Result<TabularStore> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_latest_registry_row_picks_max_period() {
        let store = sample_store();
        let row = store.latest_registry_row("00000208").unwrap();
        assert_eq!(row.period, 202501);
        assert_eq!(row.institution_name, "BANK A");
    }

    #[test]
    fn test_latest_registry_row_tie_keeps_first_stored() {
        let mut store = TabularStore::default();
        store.registry.push(registry("00000001", 202501, "FIRST", None, None, None));
        store.registry.push(registry("00000001", 202501, "SECOND", None, None, None));

        let row = store.latest_registry_row("00000001").unwrap();
        assert_eq!(row.institution_name, "FIRST");
    }

    #[test]
    fn test_latest_group_leader_ignores_rows_without_leader() {
        let store = sample_store();
        let row = store.latest_group_leader("C001").unwrap();
        assert_eq!(row.leader_code.as_deref(), Some("00000300"));
        assert_eq!(row.period, 202501);
        assert!(store.latest_group_leader("C999").is_none());
    }

    #[test]
    fn test_registry_column_lookup() {
        let store = sample_store();
        let row = store.latest_registry_row("00000208").unwrap();
        assert_eq!(row.column("financial_group_code"), Some("F001".to_string()));
        assert_eq!(row.column("segment"), Some("S1".to_string()));
        assert_eq!(row.column("missing"), None);
    }

    #[test]
    fn test_stats() {
        let stats = sample_store().stats();
        assert_eq!(stats.entity_detail, 6);
        assert_eq!(stats.group_detail, 4);
        assert_eq!(stats.group_values, 6);
        assert_eq!(stats.registry, 6);
    }
}
