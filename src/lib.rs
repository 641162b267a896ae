// Bank Analyzer - Core Library
// Identifier resolution, scoped retrieval and batch planning over
// regulatory financial relations. Used by the CLI, the API server, and tests.

pub mod error;
pub mod text;
pub mod period;
pub mod store;      // Relations: CSV directory or SQLite file
pub mod resolver;   // Identifier → canonical entity
pub mod providers;  // Scoped retrieval per relation family
pub mod batch;      // Planner, comparison tables, time series
pub mod config;
pub mod analyzer;

// Re-export commonly used types
pub use error::{AnalysisError, AnalysisResult};
pub use period::{month_range, Period};
pub use store::{
    CsvSource, DetailRow, RegistryRow, RelationFiles, RelationSource, SqliteSource,
    StoreStats, TabularStore, ValueRow,
};
pub use resolver::{EntityResolver, Linkage, NameIndex, ResolvedEntity};
pub use providers::{
    Account, AttributeProvider, AttributeRecord, DetailProvider, DetailRecord, DetailScope,
    Query, ValueProvider, ValueRecord, ValueScope,
};
pub use batch::{
    BatchPlanner, Cell, ComparisonFill, ComparisonRequest, ComparisonRow, ComparisonTable,
    Indicator, IndicatorRequest, IndicatorSpec, NamedIndicator, NullPolicy, SeriesBatch,
    SeriesPoint, SeriesQuery,
};
pub use config::{init_tracing, AnalyzerConfig, Backend};
pub use analyzer::Analyzer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
