// 📋 Comparison Table - one row per identifier, one column per indicator
//
// Unresolved identifiers keep their row (sentinel name, "N/A" code, all null)
// so output rows always line up with the input list.

use super::{highest_document, BatchPlanner, Fetched, IndicatorRequest, IndicatorSpec};
use crate::error::AnalysisResult;
use crate::period::Period;
use crate::resolver::{EntityResolver, ResolvedEntity};
use serde::{Deserialize, Serialize};

/// Code shown for identifiers that did not resolve
pub const UNRESOLVED_CODE: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonFill {
    #[default]
    Keep,
    /// Null numeric cells become 0
    NullToZero,
    /// Numeric 0 becomes null
    ZeroToNull,
}

/// Indicator column: label plus the indicator fields inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedIndicator {
    pub label: String,
    #[serde(flatten)]
    pub spec: IndicatorSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub identifiers: Vec<String>,
    pub indicators: Vec<NamedIndicator>,
    pub period: Period,
    #[serde(default)]
    pub fill: ComparisonFill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub name: String,
    pub code: String,
    pub cells: Vec<Option<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonTable {
    pub columns: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    /// Cell by row index and column label
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.cells.get(col)?.as_ref()
    }
}

/// Reduce a request's rows to a single cell.
///
/// Detail: the row with the highest document code. Values: the first row.
fn cell_of(fetched: &Fetched) -> Option<Cell> {
    match fetched {
        Fetched::Detail(rows) => highest_document(rows)
            .and_then(|row| row.value)
            .map(Cell::Number),
        Fetched::Values(rows) => rows.first().and_then(|row| row.value).map(Cell::Number),
        Fetched::Attribute(text) => Some(Cell::Text(text.clone())),
    }
}

fn apply_fill(cell: Option<Cell>, fill: ComparisonFill) -> Option<Cell> {
    match (fill, cell) {
        (ComparisonFill::NullToZero, None) => Some(Cell::Number(0.0)),
        (ComparisonFill::ZeroToNull, Some(Cell::Number(v))) if v == 0.0 => None,
        (_, cell) => cell,
    }
}

fn entity_row(entity: &ResolvedEntity, cells: Vec<Option<Cell>>) -> ComparisonRow {
    ComparisonRow {
        name: entity.display_name().to_string(),
        code: entity.own_code.clone(),
        cells,
    }
}

fn sentinel_row(identifier: &str, columns: usize) -> ComparisonRow {
    ComparisonRow {
        name: format!("'{}' not found", identifier),
        code: UNRESOLVED_CODE.to_string(),
        cells: vec![None; columns],
    }
}

/// Build a comparison across entities for one period
pub fn compare(resolver: &EntityResolver, request: &ComparisonRequest) -> AnalysisResult<ComparisonTable> {
    let planner = BatchPlanner::new(resolver);
    let width = request.indicators.len();

    let requests: Vec<IndicatorRequest> = request
        .identifiers
        .iter()
        .flat_map(|identifier| {
            request.indicators.iter().map(move |column| IndicatorRequest {
                identifier: identifier.clone(),
                indicator: column.spec.clone(),
                periods: vec![request.period],
                label: Some(column.label.clone()),
            })
        })
        .collect();

    let columns: Vec<String> = request.indicators.iter().map(|c| c.label.clone()).collect();

    if width == 0 {
        let resolved = planner.resolve_all(request.identifiers.iter().map(String::as_str))?;
        let rows = request
            .identifiers
            .iter()
            .map(|id| match resolved.get(id).and_then(Option::as_ref) {
                Some(entity) => entity_row(entity, Vec::new()),
                None => sentinel_row(id, 0),
            })
            .collect();
        return Ok(ComparisonTable { columns, rows });
    }

    let outcomes = planner.execute(&requests)?;

    let rows = request
        .identifiers
        .iter()
        .zip(outcomes.chunks(width))
        .map(|(identifier, chunk)| match &chunk[0].entity {
            None => sentinel_row(identifier, width),
            Some(entity) => {
                let cells = chunk
                    .iter()
                    .map(|outcome| {
                        let cell = outcome.fetched.as_ref().and_then(cell_of);
                        if outcome.indicator.is_numeric() {
                            apply_fill(cell, request.fill)
                        } else {
                            cell
                        }
                    })
                    .collect();
                entity_row(entity, cells)
            }
        })
        .collect();

    Ok(ComparisonTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::providers::Account;
    use crate::store::fixtures::sample_store;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn column(label: &str, source: &str, account: Option<Account>, scope: Option<&str>) -> NamedIndicator {
        NamedIndicator {
            label: label.to_string(),
            spec: crate::batch::tests::spec(source, account, scope),
        }
    }

    fn comparison(identifiers: &[&str], indicators: Vec<NamedIndicator>, fill: ComparisonFill) -> ComparisonRequest {
        ComparisonRequest {
            identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
            indicators,
            period: 202501,
            fill,
        }
    }

    #[test]
    fn test_unresolved_identifier_gets_sentinel_row() {
        let resolver = EntityResolver::new(Arc::new(sample_store()));
        let request = comparison(
            &["Bank X", "NoSuchBank"],
            vec![column("assets", "values", Some(Account::from(78182)), Some("individual"))],
            ComparisonFill::Keep,
        );

        let table = compare(&resolver, &request).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].name, "BANK X");
        assert_eq!(table.rows[0].code, "00000400");
        assert_eq!(table.cell(0, "assets"), Some(&Cell::Number(79.0)));

        assert_eq!(table.rows[1].name, "'NoSuchBank' not found");
        assert_eq!(table.rows[1].code, "N/A");
        assert_eq!(table.rows[1].cells, vec![None]);
    }

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_unresolved_identifier_warns_once_across_columns() {
        let resolver = EntityResolver::new(Arc::new(sample_store()));
        let request = comparison(
            &["Bank X", "NoSuchBank"],
            vec![
                column("assets", "values", Some(Account::from(78182)), Some("individual")),
                column("solo", "detail", Some(Account::from("Total Assets")), Some("individual")),
                column("group", "detail", Some(Account::from("Total Assets")), Some("prudential")),
            ],
            ComparisonFill::Keep,
        );

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let table = tracing::subscriber::with_default(subscriber, || compare(&resolver, &request)).unwrap();

        assert_eq!(table.rows[1].code, "N/A");
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detail_cell_uses_highest_document() {
        let resolver = EntityResolver::new(Arc::new(sample_store()));
        let request = comparison(
            &["Bank X", "BANK A"],
            vec![
                column("solo", "detail", Some(Account::from("Total Assets")), Some("individual")),
                column("group", "detail", Some(Account::from("Total Assets")), Some("prudential")),
            ],
            ComparisonFill::Keep,
        );

        let table = compare(&resolver, &request).unwrap();
        assert_eq!(table.cell(0, "solo"), Some(&Cell::Number(81.0)));
        assert_eq!(table.cell(0, "group"), Some(&Cell::Number(85.0)));
        // Leader has no solo lines; consolidated lines come from documents 4060/4066
        assert_eq!(table.cell(1, "solo"), None);
        assert_eq!(table.cell(1, "group"), Some(&Cell::Number(910.0)));
    }

    #[test]
    fn test_fill_policies_touch_numeric_cells_only() {
        let resolver = EntityResolver::new(Arc::new(sample_store()));
        let mut attribute = column("segment", "attribute", None, None);
        attribute.spec.attribute = Some("segment".to_string());
        let columns = vec![
            column("financial", "values", Some(Account::from(78182)), Some("financial")),
            attribute,
        ];

        let zero = compare(
            &resolver,
            &comparison(&["ORPHAN BANK"], columns.clone(), ComparisonFill::NullToZero),
        )
        .unwrap();
        assert_eq!(zero.cell(0, "financial"), Some(&Cell::Number(0.0)));
        assert_eq!(zero.cell(0, "segment"), None);

        let mut request = comparison(&["Bank X"], columns, ComparisonFill::ZeroToNull);
        request.period = 202502;
        request.indicators[0].spec.scope = Some("individual".to_string());
        let nulled = compare(&resolver, &request).unwrap();
        assert_eq!(nulled.cell(0, "financial"), None);
        assert_eq!(nulled.cell(0, "segment"), Some(&Cell::Text("S3".to_string())));
    }

    #[test]
    fn test_malformed_indicator_aborts() {
        let resolver = EntityResolver::new(Arc::new(sample_store()));
        let request = comparison(
            &["Bank X"],
            vec![column("broken", "values", None, Some("individual"))],
            ComparisonFill::Keep,
        );

        assert!(matches!(
            compare(&resolver, &request),
            Err(AnalysisError::MalformedIndicator { .. })
        ));
    }

    #[test]
    fn test_comparison_request_from_json() {
        let request: ComparisonRequest = serde_json::from_str(
            r#"{
                "identifiers": ["Bank X"],
                "indicators": [{"label": "assets", "source": "values", "account": 78182, "scope": "individual"}],
                "period": 202501,
                "fill": "zero_to_null"
            }"#,
        )
        .unwrap();

        assert_eq!(request.fill, ComparisonFill::ZeroToNull);
        assert_eq!(request.indicators[0].spec.account, Some(Account::Code(78182)));
    }
}
