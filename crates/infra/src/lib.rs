//! Infrastructure layer: aggregation cache, analysis repositories, config,
//! background execution and the service that wires the engines together.

pub mod cache;
pub mod clock;
pub mod config;
pub mod locks;
pub mod pool;
pub mod repository;
pub mod runner;
pub mod service;

pub use cache::{
    AggregationCache, AggregationKey, AggregationKeyBuilder, AggregationType, CacheEntry, CacheError,
    InMemoryAggregationCache, NoopAggregationCache,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AnalysisWindows, CacheConfig, ConfigError, IntelligenceConfig, RunnerConfig};
pub use pool::{JobTicket, AnalysisPool};
pub use repository::{AnalysisRecord, AnalysisRepository, InMemoryAnalysisRepository, RepositoryError};
pub use runner::{AnalysisReportSink, AnalysisRunner, AnalysisRunnerHandle, InMemoryReportSink, ScheduledAnalysis};
pub use service::{
    AnalysisStores, BatchSummary, ClassificationOutcome, DailyAnalysisReport, InventoryFilter, InventoryIntelligence,
    InventoryReport, PurgeReport,
};
