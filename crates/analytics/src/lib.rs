//! `bookwise-analytics`
//!
//! **Responsibility:** the pure analytical core of inventory intelligence.
//!
//! - Demand forecasting (four algorithms plus a weighted ensemble).
//! - ABC/XYZ classification, obsolescence risk, optimal stock levels.
//! - Constrained selection of reorder recommendations.
//!
//! Nothing here performs I/O. Inputs are catalog snapshots supplied by
//! callers (see `bookwise-infra`), outputs are plain values.

pub mod classification;
pub mod forecast;
pub mod job;
pub mod obsolescence;
pub mod optimization;
pub mod stats;
pub mod stock;

pub use classification::{
    AbcCategory, AbcXyzClassification, AbcXyzClassifier, ClassificationConfig, ClassificationSummary,
    DemandProfile, XyzCategory,
};
pub use forecast::{
    DemandForecastResult, DemandForecaster, ForecastAccuracy, ForecastAlgorithm, ForecastConfig,
    ForecastRun, SeasonalIndices, SeasonalSource,
};
pub use job::{AnalysisJob, ForecastJob, JobKind, OptimizationJob};
pub use obsolescence::{
    LifecycleStage, ObsolescenceAssessment, ObsolescenceAssessor, ObsolescenceConfig, RiskLevel,
};
pub use optimization::{ConstraintOptimizer, OptimizationConstraints, OptimizationResult, OptimizerConfig};
pub use stock::{OptimalStockCalculator, OptimalStockRecommendation, StockInputs, StockPolicyConfig, StockStatus};
