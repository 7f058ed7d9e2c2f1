//! Domain module - subjects, periods, records and the batch planner
//!
//! Everything here is free of I/O except for the repository and source
//! traits, which the infrastructure layer implements.

pub mod dataset;
pub mod metrics;
pub mod planner;
pub mod records;
pub mod repositories;
pub mod sinks;
pub mod sources;
pub mod subjects;

pub use dataset::{Dataset, MetricKind, Period};
pub use metrics::{MetricError, SubjectMetric, derive_metrics};
pub use planner::{BatchPlan, BatchPlanner, BatchSelector, PlanError};
pub use records::{DerivedRecord, Observation, RawRecord};
pub use repositories::{ObservationStore, StoreError};
pub use sinks::{ExportError, MetricSink};
pub use sources::{FetchError, ObservationSource, SourceSet};
pub use subjects::{Subject, SubjectCatalog};
