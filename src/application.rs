//! Application layer - ingestion driver, derived-metrics stage and reports
//!
//! Coordinates the domain planner with the store, sources and sinks the
//! infrastructure layer provides.

pub mod derived_stage;
pub mod ingestion;
pub mod report;

pub use derived_stage::{DerivedMetricsStage, DerivedOutcome, DerivedStageError, SkippedSubject};
pub use ingestion::{IngestError, IngestWarning, IngestionDriver, RunOutcome};
pub use report::{RenderedReport, ReportService};
