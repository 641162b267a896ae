// 🧮 Batch Planner - many entities × many indicators, one pass per relation
//
// Algorithm:
// 1. Resolve each distinct identifier once (failures → warning, not error)
// 2. Validate every indicator before touching any relation
// 3. Union codes/periods/accounts/documents per (family, scope)
// 4. Build one subset per group
// 5. Replay each request against its group's subset
//
// Replaying one request's exact parameters on a subset built from a superset
// of them yields the same rows as scanning the whole relation.

pub mod compare;
pub mod series;

use crate::error::{AnalysisError, AnalysisResult};
use crate::period::Period;
use crate::providers::{
    Account, AccountSet, AttributeProvider, DetailProvider, DetailRecord, DetailScope, Query,
    ValueProvider, ValueRecord, ValueScope,
};
use crate::resolver::{EntityResolver, ResolvedEntity};
use crate::store::{DetailRow, ValueRow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use compare::{
    compare, Cell, ComparisonFill, ComparisonRequest, ComparisonRow, ComparisonTable, NamedIndicator,
};
pub use series::{series, series_batch, NullPolicy, SeriesBatch, SeriesPoint, SeriesQuery};

// ============================================================================
// INDICATORS
// ============================================================================

/// Raw indicator configuration as callers write it.
///
/// ```json
/// { "source": "values", "account": 78182, "scope": "prudential" }
/// { "source": "detail", "account": "Total Assets", "scope": "individual", "document": [4010] }
/// { "source": "attribute", "attribute": "segment" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub source: String,
    #[serde(default)]
    pub account: Option<Account>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, alias = "documents")]
    pub document: Option<Vec<u32>>,
}

/// Validated indicator
#[derive(Debug, Clone, PartialEq)]
pub enum Indicator {
    Detail {
        account: Account,
        scope: DetailScope,
        documents: Option<Vec<u32>>,
    },
    Values {
        account: Account,
        scope: ValueScope,
    },
    Attribute {
        name: String,
    },
}

impl IndicatorSpec {
    pub fn validate(&self, label: &str) -> AnalysisResult<Indicator> {
        match self.source.trim().to_lowercase().as_str() {
            "detail" => {
                let scope = DetailScope::parse(self.scope.as_deref())?;
                Ok(Indicator::Detail {
                    account: self.required_account(label)?,
                    scope,
                    documents: self.document.clone(),
                })
            }
            "values" => {
                let scope = ValueScope::parse(self.scope.as_deref())?;
                Ok(Indicator::Values {
                    account: self.required_account(label)?,
                    scope,
                })
            }
            "attribute" => match self.attribute.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => Ok(Indicator::Attribute {
                    name: name.to_string(),
                }),
                _ => Err(AnalysisError::malformed(label, "attribute indicators need an 'attribute'")),
            },
            other => Err(AnalysisError::malformed(
                label,
                format!(
                    "unknown source '{}' (expected 'detail', 'values' or 'attribute')",
                    other
                ),
            )),
        }
    }

    fn required_account(&self, label: &str) -> AnalysisResult<Account> {
        self.account.clone().ok_or_else(|| {
            AnalysisError::malformed(label, format!("'{}' indicators need an 'account'", self.source))
        })
    }

    /// Label used when the caller gives none
    pub fn default_label(&self) -> String {
        match (&self.account, &self.attribute) {
            (Some(account), _) => account.to_string(),
            (None, Some(attribute)) => attribute.clone(),
            (None, None) => self.source.clone(),
        }
    }
}

impl Indicator {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Indicator::Attribute { .. })
    }
}

/// One (identifier, indicator, periods) unit of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRequest {
    pub identifier: String,
    pub indicator: IndicatorSpec,
    #[serde(default)]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub label: Option<String>,
}

impl IndicatorRequest {
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.indicator.default_label())
    }
}

// ============================================================================
// PLAN OUTPUT
// ============================================================================

/// Rows a replayed request produced
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Detail(Vec<DetailRecord>),
    Values(Vec<ValueRecord>),
    Attribute(String),
}

/// Row with the highest document code; ties keep the first stored
pub(crate) fn highest_document<'r>(
    rows: impl IntoIterator<Item = &'r DetailRecord>,
) -> Option<&'r DetailRecord> {
    rows.into_iter()
        .fold(None, |best: Option<&'r DetailRecord>, row| match best {
            Some(b) if b.document_code >= row.document_code => Some(b),
            _ => Some(row),
        })
}

impl Fetched {
    /// (period, value) pairs in first-seen period order; attributes have none.
    ///
    /// Detail rows are reduced to one point per period, taken from the
    /// highest document code, so series and comparisons agree.
    pub fn points(&self) -> Vec<(Period, Option<f64>)> {
        match self {
            Fetched::Detail(rows) => {
                let mut periods: Vec<Period> = Vec::new();
                for row in rows {
                    if !periods.contains(&row.period) {
                        periods.push(row.period);
                    }
                }
                periods
                    .into_iter()
                    .map(|period| {
                        let best = highest_document(rows.iter().filter(|r| r.period == period));
                        (period, best.and_then(|r| r.value))
                    })
                    .collect()
            }
            Fetched::Values(rows) => rows.iter().map(|r| (r.period, r.value)).collect(),
            Fetched::Attribute(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub indicator: Indicator,
    /// None when the identifier could not be resolved
    pub entity: Option<ResolvedEntity>,
    /// None when unresolved or when no data matched
    pub fetched: Option<Fetched>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubsetKey {
    Detail(DetailScope),
    Values(ValueScope),
}

#[derive(Debug, Default)]
struct UnionParams {
    codes: BTreeSet<String>,
    periods: BTreeSet<Period>,
    accounts: AccountSet,
    documents: BTreeSet<u32>,
    every_request_has_documents: bool,
    requests: usize,
}

impl UnionParams {
    fn add(&mut self, code: String, periods: &[Period], account: &Account, documents: Option<&[u32]>) {
        self.codes.insert(code);
        self.periods.extend(periods.iter().copied());
        self.accounts.extend([account]);

        self.every_request_has_documents = match documents {
            Some(docs) => {
                self.documents.extend(docs.iter().copied());
                self.requests == 0 || self.every_request_has_documents
            }
            None => false,
        };
        self.requests += 1;
    }

    fn documents(&self) -> Option<&BTreeSet<u32>> {
        if self.every_request_has_documents {
            Some(&self.documents)
        } else {
            None
        }
    }
}

// ============================================================================
// PLANNER
// ============================================================================

pub struct BatchPlanner<'a> {
    resolver: &'a EntityResolver,
}

impl<'a> BatchPlanner<'a> {
    pub fn new(resolver: &'a EntityResolver) -> Self {
        BatchPlanner { resolver }
    }

    /// Resolve each distinct identifier once, keyed by the identifier as given
    pub fn resolve_all<'i>(
        &self,
        identifiers: impl IntoIterator<Item = &'i str>,
    ) -> AnalysisResult<HashMap<String, Option<ResolvedEntity>>> {
        let mut resolved = HashMap::new();

        for identifier in identifiers {
            if resolved.contains_key(identifier) {
                continue;
            }

            let entity = match self.resolver.resolve(identifier) {
                Ok(entity) => Some(entity),
                Err(e) if e.is_resolution_failure() => {
                    tracing::warn!(identifier, error = %e, "identifier not resolved; batch continues");
                    None
                }
                Err(e) => return Err(e),
            };
            resolved.insert(identifier.to_string(), entity);
        }

        Ok(resolved)
    }

    /// Run every request, one outcome per request in input order
    pub fn execute(&self, requests: &[IndicatorRequest]) -> AnalysisResult<Vec<RequestOutcome>> {
        let resolved = self.resolve_all(requests.iter().map(|r| r.identifier.as_str()))?;

        let indicators = requests
            .iter()
            .map(|r| r.indicator.validate(&r.label()))
            .collect::<AnalysisResult<Vec<_>>>()?;

        let resolver: &'a EntityResolver = self.resolver;
        let store = resolver.store().as_ref();
        let details = DetailProvider::new(store);
        let values = ValueProvider::new(store);
        let attributes = AttributeProvider::new(resolver);

        // Accumulate union parameters per (family, scope)
        let mut unions: BTreeMap<SubsetKey, UnionParams> = BTreeMap::new();
        for (request, indicator) in requests.iter().zip(&indicators) {
            let entity = match resolved.get(&request.identifier).and_then(Option::as_ref) {
                Some(entity) => entity,
                None => continue,
            };

            match indicator {
                Indicator::Detail {
                    account,
                    scope,
                    documents,
                } => unions.entry(SubsetKey::Detail(*scope)).or_default().add(
                    entity.reporting_code.clone(),
                    &request.periods,
                    account,
                    documents.as_deref(),
                ),
                Indicator::Values { account, scope } => {
                    if let Ok(code) = values.scope_code(entity, *scope) {
                        unions
                            .entry(SubsetKey::Values(*scope))
                            .or_default()
                            .add(code, &request.periods, account, None);
                    }
                }
                Indicator::Attribute { .. } => {}
            }
        }

        // One subset per group
        let mut detail_subsets: BTreeMap<DetailScope, Vec<&DetailRow>> = BTreeMap::new();
        let mut value_subsets: BTreeMap<ValueScope, Vec<&ValueRow>> = BTreeMap::new();
        for (key, params) in &unions {
            match key {
                SubsetKey::Detail(scope) => {
                    let subset = details.build_subset(
                        *scope,
                        &params.codes,
                        &params.periods,
                        &params.accounts,
                        params.documents(),
                    );
                    detail_subsets.insert(*scope, subset);
                }
                SubsetKey::Values(scope) => {
                    let subset = values.build_subset(&params.codes, &params.periods, &params.accounts);
                    value_subsets.insert(*scope, subset);
                }
            }
        }
        tracing::debug!(
            requests = requests.len(),
            groups = unions.len(),
            "batch subsets built"
        );

        // Replay
        let mut outcomes = Vec::with_capacity(requests.len());
        for (request, indicator) in requests.iter().zip(indicators) {
            let entity = resolved.get(&request.identifier).cloned().flatten();

            let fetched = match &entity {
                None => None,
                Some(entity) => {
                    let result = match &indicator {
                        Indicator::Detail {
                            account,
                            scope,
                            documents,
                        } => {
                            let query = Query {
                                accounts: vec![account.clone()],
                                periods: request.periods.clone(),
                                documents: documents.clone(),
                            };
                            let subset = detail_subsets.get(scope).map(Vec::as_slice).unwrap_or(&[]);
                            details
                                .fetch_in(subset, entity, *scope, &query)
                                .map(Fetched::Detail)
                        }
                        Indicator::Values { account, scope } => {
                            let query = Query::new(vec![account.clone()], request.periods.clone());
                            let subset = value_subsets.get(scope).map(Vec::as_slice).unwrap_or(&[]);
                            values
                                .fetch_in(subset, entity, *scope, &query)
                                .map(Fetched::Values)
                        }
                        Indicator::Attribute { name } => attributes
                            .attribute_for(entity, name)
                            .map(Fetched::Attribute)
                            .ok_or_else(|| {
                                AnalysisError::data_unavailable(
                                    entity.display_name(),
                                    "registry",
                                    format!("no value for attribute '{}'", name),
                                )
                            }),
                    };

                    match result {
                        Ok(fetched) => Some(fetched),
                        Err(e) if e.is_data_gap() => None,
                        Err(e) => return Err(e),
                    }
                }
            };

            outcomes.push(RequestOutcome {
                indicator,
                entity,
                fetched,
            });
        }

        Ok(outcomes)
    }
}
