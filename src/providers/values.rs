// 📊 Value Provider - group-consolidated indicator values
//
// One relation, three possible filter codes. Exactly one is used per request.

use super::{AccountSet, Query, ValueScope};
use crate::error::{AnalysisError, AnalysisResult};
use crate::period::Period;
use crate::resolver::ResolvedEntity;
use crate::store::{TabularStore, ValueRow};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueRecord {
    pub canonical_name: String,
    pub own_code: String,
    /// Code the scope selected for this request
    pub code_used: String,
    pub filter_code: String,
    pub period: Period,
    pub account_code: i64,
    pub account_name: String,
    pub value: Option<f64>,
}

pub struct ValueProvider<'a> {
    store: &'a TabularStore,
}

impl<'a> ValueProvider<'a> {
    pub fn new(store: &'a TabularStore) -> Self {
        ValueProvider { store }
    }

    /// Code the relation is filtered on for this entity and scope
    pub fn scope_code(&self, entity: &ResolvedEntity, scope: ValueScope) -> AnalysisResult<String> {
        match scope {
            ValueScope::Individual => Ok(entity.own_code.clone()),
            ValueScope::Prudential => entity.parent_group_code.clone().ok_or_else(|| {
                AnalysisError::data_unavailable(
                    entity.display_name(),
                    scope.as_str(),
                    "entity has no prudential group code in the registry",
                )
            }),
            ValueScope::Financial => entity.financial_group_code.clone().ok_or_else(|| {
                AnalysisError::data_unavailable(
                    entity.display_name(),
                    scope.as_str(),
                    "entity has no financial group code in the registry",
                )
            }),
        }
    }

    pub fn fetch(
        &self,
        entity: &ResolvedEntity,
        scope: ValueScope,
        query: &Query,
    ) -> AnalysisResult<Vec<ValueRecord>> {
        self.select(self.store.group_values.iter(), entity, scope, query)
    }

    pub fn fetch_in(
        &self,
        subset: &[&ValueRow],
        entity: &ResolvedEntity,
        scope: ValueScope,
        query: &Query,
    ) -> AnalysisResult<Vec<ValueRecord>> {
        self.select(subset.iter().copied(), entity, scope, query)
    }

    fn select<'r>(
        &self,
        rows: impl Iterator<Item = &'r ValueRow>,
        entity: &ResolvedEntity,
        scope: ValueScope,
        query: &Query,
    ) -> AnalysisResult<Vec<ValueRecord>> {
        let code = self.scope_code(entity, scope)?;
        let matcher = query.matcher();

        let records: Vec<ValueRecord> = rows
            .filter(|row| row.filter_code == code)
            .filter(|row| matcher.matches(row.period, &row.account_name, row.account_code))
            .map(|row| ValueRecord {
                canonical_name: entity.display_name().to_string(),
                own_code: entity.own_code.clone(),
                code_used: code.clone(),
                filter_code: row.filter_code.clone(),
                period: row.period,
                account_code: row.account_code,
                account_name: row.account_name.clone(),
                value: row.value,
            })
            .collect();

        if !records.is_empty() {
            return Ok(records);
        }

        let reason = if self.store.group_values.is_empty() {
            "the group values relation has no rows".to_string()
        } else {
            format!("no rows for code {} matching {}", code, query.describe())
        };
        Err(AnalysisError::data_unavailable(
            entity.display_name(),
            scope.as_str(),
            reason,
        ))
    }

    /// Pure set-membership pre-filter; empty accounts leave accounts unrestricted
    pub fn build_subset(
        &self,
        codes: &BTreeSet<String>,
        periods: &BTreeSet<Period>,
        accounts: &AccountSet,
    ) -> Vec<&'a ValueRow> {
        if codes.is_empty() || periods.is_empty() {
            return Vec::new();
        }

        let subset: Vec<&ValueRow> = self
            .store
            .group_values
            .iter()
            .filter(|row| codes.contains(&row.filter_code) && periods.contains(&row.period))
            .filter(|row| accounts.is_empty() || accounts.matches(&row.account_name, row.account_code))
            .collect();

        tracing::debug!(
            codes = codes.len(),
            periods = periods.len(),
            rows = subset.len(),
            "values subset built"
        );
        subset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Account;
    use crate::resolver::EntityResolver;
    use crate::store::fixtures::sample_store;
    use std::sync::Arc;

    fn setup() -> (Arc<TabularStore>, EntityResolver) {
        let store = Arc::new(sample_store());
        let resolver = EntityResolver::new(store.clone());
        (store, resolver)
    }

    #[test]
    fn test_scope_code_per_scope() {
        let (store, resolver) = setup();
        let provider = ValueProvider::new(&store);
        let a = resolver.resolve("BANK A").unwrap();

        assert_eq!(provider.scope_code(&a, ValueScope::Individual).unwrap(), "00000208");
        assert_eq!(provider.scope_code(&a, ValueScope::Prudential).unwrap(), "C001");
        assert_eq!(provider.scope_code(&a, ValueScope::Financial).unwrap(), "F001");
    }

    #[test]
    fn test_financial_code_comes_from_resolved_linkage() {
        let (_store, resolver) = setup();
        let a = resolver.resolve("BANK A").unwrap();
        assert_eq!(a.financial_group_code.as_deref(), Some("F001"));

        // No registry rows at all: the code carried by the entity is enough
        let empty = TabularStore::default();
        let provider = ValueProvider::new(&empty);
        assert_eq!(provider.scope_code(&a, ValueScope::Financial).unwrap(), "F001");
    }

    #[test]
    fn test_financial_scope_without_group_is_unavailable() {
        let (store, resolver) = setup();
        let provider = ValueProvider::new(&store);
        let x = resolver.resolve("Bank X").unwrap();

        let query = Query::new(vec![Account::from(78182)], vec![202501]);
        match provider.fetch(&x, ValueScope::Financial, &query) {
            Err(AnalysisError::DataUnavailable { entity, scope, .. }) => {
                assert_eq!(entity, "BANK X");
                assert_eq!(scope, "financial");
            }
            other => panic!("expected DataUnavailable, got {:?}", other),
        }

        // Entity without registry row has no group codes either
        let orphan = resolver.resolve("ORPHAN BANK").unwrap();
        assert!(provider.scope_code(&orphan, ValueScope::Prudential).is_err());
    }

    #[test]
    fn test_fetch_records_code_used() {
        let (store, resolver) = setup();
        let provider = ValueProvider::new(&store);
        let a = resolver.resolve("00000208").unwrap();

        let query = Query::new(vec![Account::from("Total Assets")], vec![202501, 202502]);
        let rows = provider.fetch(&a, ValueScope::Financial, &query).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.code_used == "F001" && r.own_code == "00000208"));
        assert_eq!(rows[1].value, Some(125.0));
    }

    #[test]
    fn test_subset_replay_equals_full_scan() {
        let (store, resolver) = setup();
        let provider = ValueProvider::new(&store);
        let a = resolver.resolve("BANK A").unwrap();
        let x = resolver.resolve("Bank X").unwrap();

        let codes: BTreeSet<String> = ["00000208".to_string(), "00000400".to_string()].into();
        let periods: BTreeSet<Period> = [202501, 202502].into();
        let subset = provider.build_subset(&codes, &periods, &AccountSet::default());
        assert_eq!(subset.len(), 3);

        for entity in [&a, &x] {
            let query = Query::new(vec![Account::from(78182)], vec![202501, 202502]);
            let full = provider.fetch(entity, ValueScope::Individual, &query).unwrap();
            let replayed = provider
                .fetch_in(&subset, entity, ValueScope::Individual, &query)
                .unwrap();
            assert_eq!(full, replayed);
        }
    }
}
