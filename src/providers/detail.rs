// 📑 Detail Provider - entity-level and group-level report lines
//
// Both scopes filter on reporting_code: a member of a prudential group
// files under its leader in either relation.

use super::{AccountSet, DetailScope, Query};
use crate::error::{AnalysisError, AnalysisResult};
use crate::period::Period;
use crate::resolver::ResolvedEntity;
use crate::store::{DetailRow, TabularStore};
use serde::Serialize;
use std::collections::BTreeSet;

/// One report line, identity fields first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRecord {
    pub canonical_name: String,
    pub own_code: String,
    pub entity_code: String,
    pub period: Period,
    pub document_code: u32,
    pub account_code: i64,
    pub account_name: String,
    pub value: Option<f64>,
}

impl DetailRecord {
    fn from_row(entity: &ResolvedEntity, row: &DetailRow) -> Self {
        DetailRecord {
            canonical_name: entity.display_name().to_string(),
            own_code: entity.own_code.clone(),
            entity_code: row.entity_code.clone(),
            period: row.period,
            document_code: row.document_code,
            account_code: row.account_code,
            account_name: row.account_name.clone(),
            value: row.value,
        }
    }
}

pub struct DetailProvider<'a> {
    store: &'a TabularStore,
}

impl<'a> DetailProvider<'a> {
    pub fn new(store: &'a TabularStore) -> Self {
        DetailProvider { store }
    }

    fn relation(&self, scope: DetailScope) -> &'a [DetailRow] {
        match scope {
            DetailScope::Individual => &self.store.entity_detail,
            DetailScope::Prudential => &self.store.group_detail,
        }
    }

    /// Report lines for one entity, filtered against the full relation
    pub fn fetch(
        &self,
        entity: &ResolvedEntity,
        scope: DetailScope,
        query: &Query,
    ) -> AnalysisResult<Vec<DetailRecord>> {
        self.select(self.relation(scope).iter(), entity, scope, query)
    }

    /// Same as `fetch`, replayed against a prebuilt subset
    pub fn fetch_in(
        &self,
        subset: &[&DetailRow],
        entity: &ResolvedEntity,
        scope: DetailScope,
        query: &Query,
    ) -> AnalysisResult<Vec<DetailRecord>> {
        self.select(subset.iter().copied(), entity, scope, query)
    }

    fn select<'r>(
        &self,
        rows: impl Iterator<Item = &'r DetailRow>,
        entity: &ResolvedEntity,
        scope: DetailScope,
        query: &Query,
    ) -> AnalysisResult<Vec<DetailRecord>> {
        let code = entity.reporting_code.as_str();
        let matcher = query.matcher();

        let records: Vec<DetailRecord> = rows
            .filter(|row| row.entity_code == code)
            .filter(|row| matcher.matches(row.period, &row.account_name, row.account_code))
            .filter(|row| matcher.document_ok(row.document_code))
            .map(|row| DetailRecord::from_row(entity, row))
            .collect();

        if !records.is_empty() {
            return Ok(records);
        }

        let reason = if self.relation(scope).is_empty() {
            format!("the {} detail relation has no rows", scope)
        } else {
            format!("no rows for code {} matching {}", code, query.describe())
        };
        Err(AnalysisError::data_unavailable(
            entity.display_name(),
            scope.as_str(),
            reason,
        ))
    }

    /// Pure set-membership pre-filter over one relation.
    ///
    /// Empty codes or periods select nothing; empty accounts or documents
    /// leave that dimension unrestricted.
    pub fn build_subset(
        &self,
        scope: DetailScope,
        codes: &BTreeSet<String>,
        periods: &BTreeSet<Period>,
        accounts: &AccountSet,
        documents: Option<&BTreeSet<u32>>,
    ) -> Vec<&'a DetailRow> {
        if codes.is_empty() || periods.is_empty() {
            return Vec::new();
        }

        let documents = documents.filter(|d| !d.is_empty());
        let subset: Vec<&DetailRow> = self
            .relation(scope)
            .iter()
            .filter(|row| codes.contains(&row.entity_code) && periods.contains(&row.period))
            .filter(|row| accounts.is_empty() || accounts.matches(&row.account_name, row.account_code))
            .filter(|row| documents.map_or(true, |d| d.contains(&row.document_code)))
            .collect();

        tracing::debug!(
            scope = %scope,
            codes = codes.len(),
            periods = periods.len(),
            rows = subset.len(),
            "detail subset built"
        );
        subset
    }
}
