//! Derived-metrics stage: runs once after raw ingestion is complete

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{
    Dataset, DerivedRecord, ExportError, MetricError, MetricSink, ObservationStore, StoreError,
    Subject, SubjectMetric, derive_metrics,
};

#[derive(Debug, thiserror::Error)]
pub enum DerivedStageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// A subject the stage could not compute, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSubject {
    pub subject: Subject,
    pub error: MetricError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DerivedOutcome {
    Written {
        written: usize,
        skipped: Vec<SkippedSubject>,
    },
    /// Derived records were already persisted by an earlier run.
    AlreadyPresent,
}

pub struct DerivedMetricsStage {
    dataset: Dataset,
    store: Arc<dyn ObservationStore>,
    sink: Option<Arc<dyn MetricSink>>,
}

impl DerivedMetricsStage {
    pub fn new(dataset: Dataset, store: Arc<dyn ObservationStore>) -> Self {
        Self {
            dataset,
            store,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Per-subject metrics from the current raw records. Pure read.
    pub async fn compute(&self) -> Result<Vec<SubjectMetric>, StoreError> {
        let records = self.store.raw_records(self.dataset).await?;
        Ok(derive_metrics(self.dataset, &records))
    }

    /// Computes, exports and persists the derived records. Once rows are
    /// persisted later runs are no-ops; a failed export persists nothing.
    pub async fn run(&self) -> Result<DerivedOutcome, DerivedStageError> {
        if self.store.derived_count(self.dataset).await? > 0 {
            info!("[{}] derived metrics already present, nothing to do", self.dataset);
            return Ok(DerivedOutcome::AlreadyPresent);
        }

        let mut derived = Vec::new();
        let mut skipped = Vec::new();
        for metric in self.compute().await? {
            match metric.result {
                Ok(value) => derived.push(DerivedRecord {
                    subject: metric.subject,
                    value,
                }),
                Err(error) => {
                    warn!("[{}] skipping {}: {}", self.dataset, metric.subject, error);
                    skipped.push(SkippedSubject {
                        subject: metric.subject,
                        error,
                    });
                }
            }
        }

        // Export first: derived rows mark the stage done, so a failed export must leave none.
        if let Some(sink) = &self.sink {
            sink.export(self.dataset, &derived).await?;
        }
        self.store.write_derived(self.dataset, &derived).await?;

        info!(
            "[{}] derived {} ({} written, {} skipped)",
            self.dataset,
            self.dataset.metric().label(),
            derived.len(),
            skipped.len()
        );
        Ok(DerivedOutcome::Written {
            written: derived.len(),
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Observation, RawRecord, SubjectCatalog};
    use crate::test_utils::{MemoryStore, RecordingSink};

    async fn seed(store: &MemoryStore, dataset: Dataset, earlier: i64, later: i64) {
        for subject in SubjectCatalog.iter() {
            store
                .upsert_raw(dataset, &RawRecord::new(subject, dataset.first_period(), Observation::new(earlier)))
                .await
                .unwrap();
            store
                .upsert_raw(dataset, &RawRecord::new(subject, dataset.last_period(), Observation::new(later)))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn writes_and_exports_once() {
        let store = Arc::new(MemoryStore::default());
        seed(&store, Dataset::Cases, 100, 150).await;
        let sink = Arc::new(RecordingSink::default());
        let stage = DerivedMetricsStage::new(Dataset::Cases, store.clone()).with_sink(sink.clone());

        let outcome = stage.run().await.unwrap();
        assert_eq!(outcome, DerivedOutcome::Written { written: 50, skipped: vec![] });

        let derived = store.derived_records(Dataset::Cases).await.unwrap();
        assert_eq!(derived.len(), 50);
        assert!(derived.iter().all(|r| (r.value - 50.0).abs() < f64::EPSILON));
        assert_eq!(derived[0].subject.code, "al");
        assert_eq!(sink.exports().len(), 1);

        assert_eq!(stage.run().await.unwrap(), DerivedOutcome::AlreadyPresent);
        assert_eq!(sink.exports().len(), 1);
    }

    #[tokio::test]
    async fn zero_baseline_subject_is_skipped_and_reported() {
        let store = Arc::new(MemoryStore::default());
        seed(&store, Dataset::Population, 100, 150).await;
        let wyoming = SubjectCatalog.by_code("wy").unwrap();
        store
            .upsert_raw(
                Dataset::Population,
                &RawRecord::new(wyoming, Dataset::Population.first_period(), Observation::sentinel()),
            )
            .await
            .unwrap();

        let stage = DerivedMetricsStage::new(Dataset::Population, store.clone());
        let DerivedOutcome::Written { written, skipped } = stage.run().await.unwrap() else {
            panic!("expected derived records to be written");
        };
        assert_eq!(written, 49);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].subject, wyoming);
        assert!(matches!(skipped[0].error, MetricError::DivisionByZero { .. }));

        let derived = store.derived_records(Dataset::Population).await.unwrap();
        assert!(derived.iter().all(|r| (r.value - 1.5).abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn failed_export_persists_nothing_and_is_retried() {
        let store = Arc::new(MemoryStore::default());
        seed(&store, Dataset::Cases, 100, 150).await;
        let sink = Arc::new(RecordingSink::failing(1));
        let stage = DerivedMetricsStage::new(Dataset::Cases, store.clone()).with_sink(sink.clone());

        let err = stage.run().await.unwrap_err();
        assert!(matches!(err, DerivedStageError::Export(_)));
        assert_eq!(store.derived_count(Dataset::Cases).await.unwrap(), 0);

        let outcome = stage.run().await.unwrap();
        assert!(matches!(outcome, DerivedOutcome::Written { written: 50, .. }));
        assert_eq!(sink.attempts(), 2);
        assert_eq!(sink.exports().len(), 1);
        assert_eq!(stage.run().await.unwrap(), DerivedOutcome::AlreadyPresent);
        assert_eq!(sink.attempts(), 2);
    }

    #[tokio::test]
    async fn all_subjects_skipped_reruns_and_reexports() {
        let store = Arc::new(MemoryStore::default());
        seed(&store, Dataset::Population, 0, 150).await;
        let sink = Arc::new(RecordingSink::default());
        let stage = DerivedMetricsStage::new(Dataset::Population, store.clone()).with_sink(sink.clone());

        for run in 1..=2 {
            let DerivedOutcome::Written { written, skipped } = stage.run().await.unwrap() else {
                panic!("expected the stage to run again");
            };
            assert_eq!(written, 0);
            assert_eq!(skipped.len(), 50);
            assert_eq!(sink.exports().len(), run);
        }
        assert!(sink.exports().iter().all(|(_, records)| records.is_empty()));
        assert_eq!(store.derived_count(Dataset::Population).await.unwrap(), 0);
    }
}
