//! Ingestion driver: one planner-selected batch per invocation
//!
//! The driver never loops to completion. Each call reads the row count,
//! runs the batch the planner picks (or the derived stage once the raw table
//! is full) and returns. Callers re-invoke it until it reports nothing to do.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::derived_stage::{DerivedMetricsStage, DerivedOutcome, DerivedStageError, SkippedSubject};
use crate::domain::{
    BatchPlan, BatchPlanner, BatchSelector, Dataset, FetchError, Observation, ObservationStore,
    Period, PlanError, RawRecord, SourceSet, StoreError, Subject, SubjectCatalog,
};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid batch geometry: {0}")]
    Plan(#[from] PlanError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Fetch failure: {0}")]
    Fetch(#[from] FetchError),

    #[error("Derived stage failure: {0}")]
    Derived(#[from] DerivedStageError),

    #[error("No source configured for {dataset} period '{period}'")]
    MissingSource { dataset: Dataset, period: String },
}

/// A unit written with the sentinel value because its source had no observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestWarning {
    pub subject: Subject,
    pub period: Period,
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no observation for {} in {}; recorded as 0",
            self.subject, self.period
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    BatchWritten {
        batch: BatchSelector,
        rows_written: usize,
        warnings: Vec<IngestWarning>,
    },
    DerivedWritten {
        written: usize,
        skipped: Vec<SkippedSubject>,
    },
    NothingToDo,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatchWritten {
                batch,
                rows_written,
                warnings,
            } => write!(
                f,
                "batch {} wrote {} rows ({} missing)",
                batch.index + 1,
                rows_written,
                warnings.len()
            ),
            Self::DerivedWritten { written, skipped } => write!(
                f,
                "derived metrics written for {} subjects ({} skipped)",
                written,
                skipped.len()
            ),
            Self::NothingToDo => f.write_str("complete, nothing to do"),
        }
    }
}

pub struct IngestionDriver {
    dataset: Dataset,
    store: Arc<dyn ObservationStore>,
    sources: SourceSet,
    planner: BatchPlanner,
    derived: DerivedMetricsStage,
}

impl IngestionDriver {
    pub fn new(
        dataset: Dataset,
        store: Arc<dyn ObservationStore>,
        sources: SourceSet,
        batch_size: usize,
    ) -> Result<Self, IngestError> {
        let planner = BatchPlanner::new(SubjectCatalog::LEN, dataset.periods().len(), batch_size)?;
        for period in dataset.periods() {
            if sources.for_period(*period).is_none() {
                return Err(IngestError::MissingSource {
                    dataset,
                    period: period.label.to_string(),
                });
            }
        }
        let derived = DerivedMetricsStage::new(dataset, store.clone());
        Ok(Self {
            dataset,
            store,
            sources,
            planner,
            derived,
        })
    }

    #[must_use]
    pub fn with_derived_stage(mut self, derived: DerivedMetricsStage) -> Self {
        self.derived = derived;
        self
    }

    pub async fn run_once(&self) -> Result<RunOutcome, IngestError> {
        let count = self.store.count(self.dataset).await?;
        debug!("[{}] raw row count: {:?}", self.dataset, count);

        match self.planner.plan(count) {
            BatchPlan::Complete => {
                info!(
                    "[{}] raw ingestion complete ({} rows)",
                    self.dataset,
                    self.planner.expected_total()
                );
                match self.derived.run().await? {
                    DerivedOutcome::Written { written, skipped } => {
                        Ok(RunOutcome::DerivedWritten { written, skipped })
                    }
                    DerivedOutcome::AlreadyPresent => Ok(RunOutcome::NothingToDo),
                }
            }
            BatchPlan::Next(batch) => self.run_batch(batch).await,
        }
    }

    async fn run_batch(&self, batch: BatchSelector) -> Result<RunOutcome, IngestError> {
        let period = self
            .dataset
            .period(batch.period_index)
            .ok_or_else(|| IngestError::MissingSource {
                dataset: self.dataset,
                period: batch.period_index.to_string(),
            })?;
        let source = self
            .sources
            .for_period(period)
            .ok_or_else(|| IngestError::MissingSource {
                dataset: self.dataset,
                period: period.label.to_string(),
            })?;

        info!(
            "[{}] running batch {}/{} (period {}, subjects {}..{}) via {}",
            self.dataset,
            batch.index + 1,
            self.planner.batch_count(),
            period,
            batch.subjects.start,
            batch.subjects.end,
            source.name()
        );

        let mut rows_written = 0;
        let mut warnings = Vec::new();
        for (subject_index, _) in batch.units() {
            let Some(subject) = SubjectCatalog.get(subject_index) else {
                return Err(StoreError::UnknownSubject(subject_index.to_string()).into());
            };

            let observation = match source.fetch(subject, period).await {
                Ok(observation) => observation,
                Err(FetchError::MissingObservation { .. }) => {
                    warn!("[{}] no observation for {} in {}, recording 0", self.dataset, subject, period);
                    warnings.push(IngestWarning { subject, period });
                    Observation::sentinel()
                }
                Err(e) => {
                    warn!(
                        "[{}] batch {} aborted after {} rows: {}",
                        self.dataset, batch.index, rows_written, e
                    );
                    return Err(e.into());
                }
            };

            self.store
                .upsert_raw(self.dataset, &RawRecord::new(subject, period, observation))
                .await?;
            rows_written += 1;
        }

        info!(
            "[{}] batch {} wrote {} rows ({} warnings)",
            self.dataset,
            batch.index,
            rows_written,
            warnings.len()
        );
        Ok(RunOutcome::BatchWritten {
            batch,
            rows_written,
            warnings,
        })
    }
}
