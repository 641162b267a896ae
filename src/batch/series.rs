// 📈 Time Series - long-format (period, entity, account, value) rows
//
// Each request is reindexed to exactly the periods it asked for, so a missing
// month shows up as a null point that the NullPolicy then drops or fills.

use super::{BatchPlanner, Fetched, Indicator, IndicatorRequest, IndicatorSpec};
use crate::error::{AnalysisError, AnalysisResult};
use crate::period::{resolve_periods, Period};
use crate::providers::{DetailProvider, Query, ValueProvider};
use crate::resolver::{EntityResolver, ResolvedEntity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub period: Period,
    pub canonical_name: String,
    pub own_code: String,
    pub account_label: String,
    pub value: Option<f64>,
}

/// Post-processing of null and zero points, applied in field order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullPolicy {
    /// Treat 0 as missing
    pub zeros_as_null: bool,
    /// Replace missing values
    pub fill_value: Option<f64>,
    /// Drop points that are still missing
    pub drop_null: bool,
}

impl Default for NullPolicy {
    fn default() -> Self {
        NullPolicy {
            zeros_as_null: false,
            fill_value: None,
            drop_null: true,
        }
    }
}

impl NullPolicy {
    pub fn apply(&self, points: Vec<SeriesPoint>) -> Vec<SeriesPoint> {
        points
            .into_iter()
            .map(|mut point| {
                if self.zeros_as_null && point.value == Some(0.0) {
                    point.value = None;
                }
                if point.value.is_none() {
                    point.value = self.fill_value;
                }
                point
            })
            .filter(|point| !(self.drop_null && point.value.is_none()))
            .collect()
    }
}

/// Single-entity series request; periods come from a list or a start/end range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesQuery {
    pub identifier: String,
    pub indicator: IndicatorSpec,
    #[serde(default)]
    pub periods: Option<Vec<Period>>,
    #[serde(default)]
    pub start: Option<Period>,
    #[serde(default)]
    pub end: Option<Period>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub policy: NullPolicy,
}

/// Batch series body: requests plus one policy for all of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesBatch {
    pub requests: Vec<IndicatorRequest>,
    #[serde(default)]
    pub policy: NullPolicy,
}

fn numeric_indicator(spec: &IndicatorSpec, label: &str) -> AnalysisResult<Indicator> {
    let indicator = spec.validate(label)?;
    if !indicator.is_numeric() {
        return Err(AnalysisError::malformed(
            label,
            "attribute indicators have no time dimension",
        ));
    }
    Ok(indicator)
}

/// One point per requested period, from `Fetched::points`
fn reindex(
    entity: &ResolvedEntity,
    label: &str,
    periods: &[Period],
    points: &[(Period, Option<f64>)],
) -> Vec<SeriesPoint> {
    periods
        .iter()
        .map(|&period| SeriesPoint {
            period,
            canonical_name: entity.display_name().to_string(),
            own_code: entity.own_code.clone(),
            account_label: label.to_string(),
            value: points
                .iter()
                .filter(|(p, _)| *p == period)
                .find_map(|(_, v)| *v),
        })
        .collect()
}

/// Series for many (identifier, indicator) requests in one planned pass.
///
/// Unresolved identifiers contribute no points.
pub fn series_batch(
    resolver: &EntityResolver,
    requests: &[IndicatorRequest],
    policy: &NullPolicy,
) -> AnalysisResult<Vec<SeriesPoint>> {
    for request in requests {
        numeric_indicator(&request.indicator, &request.label())?;
    }

    let outcomes = BatchPlanner::new(resolver).execute(requests)?;

    let mut points = Vec::new();
    for (request, outcome) in requests.iter().zip(&outcomes) {
        let entity = match &outcome.entity {
            Some(entity) => entity,
            None => continue,
        };
        let fetched = outcome
            .fetched
            .as_ref()
            .map(|f| f.points())
            .unwrap_or_default();

        points.extend(reindex(entity, &request.label(), &request.periods, &fetched));
    }

    Ok(policy.apply(points))
}

/// Series for one identifier and one indicator; any failure is returned as-is
pub fn series(resolver: &EntityResolver, query: &SeriesQuery) -> AnalysisResult<Vec<SeriesPoint>> {
    let label = query
        .label
        .clone()
        .unwrap_or_else(|| query.indicator.default_label());

    let entity = resolver.resolve(&query.identifier)?;
    let indicator = numeric_indicator(&query.indicator, &label)?;
    let periods = resolve_periods(query.periods.as_deref(), query.start, query.end)?;

    let store = resolver.store().as_ref();
    let fetched = match indicator {
        Indicator::Detail {
            account,
            scope,
            documents,
        } => {
            let filter = Query {
                accounts: vec![account],
                periods: periods.clone(),
                documents,
            };
            Fetched::Detail(DetailProvider::new(store).fetch(&entity, scope, &filter)?)
        }
        Indicator::Values { account, scope } => {
            let filter = Query::new(vec![account], periods.clone());
            Fetched::Values(ValueProvider::new(store).fetch(&entity, scope, &filter)?)
        }
        Indicator::Attribute { name } => Fetched::Attribute(name),
    };

    Ok(query
        .policy
        .apply(reindex(&entity, &label, &periods, &fetched.points())))
}
