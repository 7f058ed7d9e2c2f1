//! Observation sources: one (subject, period) unit per call

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::dataset::Period;
use super::records::Observation;
use super::subjects::Subject;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network, status or decode failure. The batch is retried on the next run.
    #[error("Source '{source_name}' unavailable for {subject}: {reason}")]
    SourceUnavailable {
        source_name: String,
        subject: String,
        reason: String,
    },

    /// The source answered but had no value for this unit.
    #[error("No observation for {subject} in period {period}")]
    MissingObservation { subject: String, period: String },
}

impl FetchError {
    pub fn unavailable(source_name: &str, subject: Subject, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            subject: subject.code.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn missing(subject: Subject, period: Period) -> Self {
        Self::MissingObservation {
            subject: subject.code.to_string(),
            period: period.label.to_string(),
        }
    }
}

#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    async fn fetch(&self, subject: Subject, period: Period) -> Result<Observation, FetchError>;
}

/// One source per period position of a dataset.
#[derive(Clone)]
pub struct SourceSet {
    by_period: Vec<Arc<dyn ObservationSource>>,
}

impl SourceSet {
    pub fn new(by_period: Vec<Arc<dyn ObservationSource>>) -> Self {
        Self { by_period }
    }

    /// Same source for every period.
    pub fn uniform(source: Arc<dyn ObservationSource>, period_count: usize) -> Self {
        Self {
            by_period: vec![source; period_count],
        }
    }

    pub fn for_period(&self, period: Period) -> Option<&Arc<dyn ObservationSource>> {
        self.by_period.get(period.position)
    }

    pub fn len(&self) -> usize {
        self.by_period.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_period.is_empty()
    }
}
