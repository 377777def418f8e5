//! `bookwise-core`: shared building blocks for the inventory intelligence engine.
//!
//! This crate contains identifiers, the error taxonomy and the data-quality
//! indicator shared by every analytical component (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod quality;

pub use error::{AnalyticsError, AnalyticsResult};
pub use id::{AnalysisRunId, BookId};
pub use quality::DataQuality;
