// 🏛️ Analyzer - one snapshot of the relations plus everything that reads it
//
// Queries take &self. reload() takes &mut self, so a reload can never
// interleave with a resolution or a batch.

use crate::batch::{
    self, ComparisonRequest, ComparisonTable, IndicatorRequest, NullPolicy, SeriesPoint,
    SeriesQuery,
};
use crate::config::AnalyzerConfig;
use crate::error::AnalysisResult;
use crate::providers::{
    AttributeProvider, AttributeRecord, DetailProvider, DetailRecord, DetailScope, Query,
    ValueProvider, ValueRecord, ValueScope,
};
use crate::resolver::{EntityResolver, Linkage, ResolvedEntity};
use crate::store::{RelationSource, StaticSource, StoreStats, TabularStore};
use std::sync::Arc;

pub struct Analyzer {
    config: AnalyzerConfig,
    source: Box<dyn RelationSource>,
    resolver: EntityResolver,
}

impl Analyzer {
    /// Load the relations named by the configuration
    pub fn open(config: AnalyzerConfig) -> AnalysisResult<Self> {
        let source = config.source();
        Self::with_source(source, config)
    }

    pub fn with_source(source: Box<dyn RelationSource>, config: AnalyzerConfig) -> AnalysisResult<Self> {
        let store = load_snapshot(source.as_ref())?;
        let resolver = EntityResolver::with_capacity(Arc::new(store), config.cache_capacity);

        Ok(Analyzer {
            config,
            source,
            resolver,
        })
    }

    /// Analyzer over an in-memory store
    pub fn from_store(store: TabularStore) -> Self {
        let config = AnalyzerConfig::default();
        let resolver = EntityResolver::with_capacity(Arc::new(store.clone()), config.cache_capacity);

        Analyzer {
            config,
            source: Box::new(StaticSource(store)),
            resolver,
        }
    }

    /// Re-read every relation, then rebuild the index and clear the memos
    pub fn reload(&mut self) -> AnalysisResult<StoreStats> {
        let store = load_snapshot(self.source.as_ref())?;
        let stats = store.stats();

        self.resolver.replace_store(Arc::new(store));
        tracing::info!(names = self.resolver.index_len(), "analyzer reloaded");
        Ok(stats)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    pub fn store(&self) -> &TabularStore {
        self.resolver.store()
    }

    pub fn stats(&self) -> StoreStats {
        self.store().stats()
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    pub fn find_code(&self, identifier: &str) -> AnalysisResult<String> {
        self.resolver.find_code(identifier)
    }

    pub fn get_linkage(&self, code: &str) -> Linkage {
        self.resolver.get_linkage(code)
    }

    pub fn resolve(&self, identifier: &str) -> AnalysisResult<ResolvedEntity> {
        self.resolver.resolve(identifier)
    }

    // ========================================================================
    // SINGLE-ENTITY RETRIEVAL
    // ========================================================================

    /// Report lines; `scope` is "individual" or "prudential"
    pub fn detail(&self, identifier: &str, scope: Option<&str>, query: &Query) -> AnalysisResult<Vec<DetailRecord>> {
        let scope = DetailScope::parse(scope)?;
        let entity = self.resolver.resolve(identifier)?;
        DetailProvider::new(self.store()).fetch(&entity, scope, query)
    }

    /// Consolidated values; `scope` is "individual", "prudential" or "financial"
    pub fn values(&self, identifier: &str, scope: Option<&str>, query: &Query) -> AnalysisResult<Vec<ValueRecord>> {
        let scope = ValueScope::parse(scope)?;
        let entity = self.resolver.resolve(identifier)?;
        ValueProvider::new(self.store()).fetch(&entity, scope, query)
    }

    pub fn attributes<I, N>(&self, identifiers: &[I], names: &[N]) -> Vec<AttributeRecord>
    where
        I: AsRef<str>,
        N: AsRef<str>,
    {
        AttributeProvider::new(&self.resolver).attributes(identifiers, names)
    }

    // ========================================================================
    // BATCHES
    // ========================================================================

    pub fn compare(&self, request: &ComparisonRequest) -> AnalysisResult<ComparisonTable> {
        batch::compare(&self.resolver, request)
    }

    pub fn series_batch(&self, requests: &[IndicatorRequest], policy: &NullPolicy) -> AnalysisResult<Vec<SeriesPoint>> {
        batch::series_batch(&self.resolver, requests, policy)
    }

    pub fn series(&self, query: &SeriesQuery) -> AnalysisResult<Vec<SeriesPoint>> {
        batch::series(&self.resolver, query)
    }
}

fn load_snapshot(source: &dyn RelationSource) -> AnalysisResult<TabularStore> {
    let store = source.load()?;
    let stats = store.stats();

    tracing::info!(
        source = %source.describe(),
        entity_detail = stats.entity_detail,
        group_detail = stats.group_detail,
        group_values = stats.group_values,
        registry = stats.registry,
        "relations loaded"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::providers::Account;
    use crate::store::fixtures::sample_store;
    use crate::store::{CsvSource, RelationFiles};
    use std::fs;

    #[test]
    fn test_string_scopes_are_validated_before_resolution() {
        let analyzer = Analyzer::from_store(sample_store());
        let query = Query::new(vec![Account::from("Total Assets")], vec![202501]);

        assert!(matches!(
            analyzer.detail("NoSuchBank", Some("cascade"), &query),
            Err(AnalysisError::InvalidScope { .. })
        ));
        assert!(matches!(
            analyzer.values("BANK A", None, &query),
            Err(AnalysisError::InvalidScope { .. })
        ));

        let rows = analyzer.values("BANK A", Some("Group-Level"), &query).unwrap();
        assert_eq!(rows[0].code_used, "C001");
    }

    #[test]
    fn test_reload_picks_up_changed_files() {
        let dir = tempfile::tempdir().unwrap();
        let detail_header = "entity_code,period,account_name,account_code,document_code,value,institution_name\n";
        fs::write(dir.path().join("entity_detail.csv"), detail_header).unwrap();
        fs::write(dir.path().join("group_detail.csv"), detail_header).unwrap();
        fs::write(
            dir.path().join("group_values.csv"),
            "filter_code,period,account_name,account_code,value\n",
        )
        .unwrap();
        let registry_header = "entity_code,period,institution_name,prudential_group_code,financial_group_code,leader_code\n";
        fs::write(
            dir.path().join("registry.csv"),
            format!("{}00000001,202501,FIRST NAME,,,\n", registry_header),
        )
        .unwrap();

        let source = CsvSource::new(dir.path(), RelationFiles::default());
        let mut analyzer = Analyzer::with_source(Box::new(source), AnalyzerConfig::default()).unwrap();
        assert_eq!(analyzer.resolve("FIRST NAME").unwrap().own_code, "00000001");

        fs::write(
            dir.path().join("registry.csv"),
            format!("{}00000001,202502,RENAMED,,,\n", registry_header),
        )
        .unwrap();
        let stats = analyzer.reload().unwrap();

        assert_eq!(stats.registry, 1);
        assert!(analyzer.resolve("FIRST NAME").is_err());
        assert_eq!(analyzer.resolve("00000001").unwrap().display_name(), "RENAMED");
    }

    #[test]
    fn test_open_reports_missing_relations_as_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalyzerConfig {
            data_dir: dir.path().to_path_buf(),
            ..AnalyzerConfig::default()
        };

        assert!(matches!(Analyzer::open(config), Err(AnalysisError::Load(_))));
    }
}
