//! Row-count driven batch planner.
//!
//! The store's row count is the only checkpoint. Batches have a fixed size and
//! are laid out period-major: every chunk of the subject enumeration for the
//! first period, then every chunk for the next period, and so on. With 50
//! subjects, 2 periods and a batch size of 25:
//!
//! | batch | period | subjects |
//! |-------|--------|----------|
//! | 0     | 0      | 0..25    |
//! | 1     | 0      | 25..50   |
//! | 2     | 1      | 0..25    |
//! | 3     | 1      | 25..50   |
//!
//! A count that falls inside a batch rounds down to that batch, so a run that
//! died half way through is repeated in full on the next invocation.

use std::ops::Range;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("Subject and period enumerations must be non-empty (subjects={subjects}, periods={periods})")]
    EmptyEnumeration { subjects: usize, periods: usize },

    #[error("Batch size {batch_size} does not evenly divide {subjects} subjects")]
    UnevenBatches { subjects: usize, batch_size: usize },
}

/// Which slice of work to run next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSelector {
    pub index: u64,
    pub period_index: usize,
    pub subjects: Range<usize>,
}

impl BatchSelector {
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// `(subject_index, period_index)` pairs in enumeration order.
    pub fn units(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.subjects.clone().map(move |s| (s, self.period_index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPlan {
    Next(BatchSelector),
    Complete,
}

impl BatchPlan {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlanner {
    subject_count: usize,
    period_count: usize,
    batch_size: usize,
}

impl BatchPlanner {
    pub fn new(subject_count: usize, period_count: usize, batch_size: usize) -> Result<Self, PlanError> {
        if batch_size == 0 {
            return Err(PlanError::ZeroBatchSize);
        }
        if subject_count == 0 || period_count == 0 {
            return Err(PlanError::EmptyEnumeration {
                subjects: subject_count,
                periods: period_count,
            });
        }
        if subject_count % batch_size != 0 {
            return Err(PlanError::UnevenBatches {
                subjects: subject_count,
                batch_size,
            });
        }
        Ok(Self {
            subject_count,
            period_count,
            batch_size,
        })
    }

    pub fn expected_total(&self) -> u64 {
        (self.subject_count * self.period_count) as u64
    }

    pub fn batches_per_period(&self) -> usize {
        self.subject_count / self.batch_size
    }

    pub fn batch_count(&self) -> u64 {
        (self.batches_per_period() * self.period_count) as u64
    }

    /// `None` means the table does not exist yet and is treated as empty.
    pub fn plan(&self, current_count: Option<u64>) -> BatchPlan {
        let count = current_count.unwrap_or(0);
        if count >= self.expected_total() {
            return BatchPlan::Complete;
        }

        let index = (count / self.batch_size as u64).min(self.batch_count() - 1);
        BatchPlan::Next(self.selector(index))
    }

    /// Geometry of batch `index`. Panics if `index >= batch_count()`.
    pub fn selector(&self, index: u64) -> BatchSelector {
        assert!(index < self.batch_count(), "batch {index} out of range");
        let per_period = self.batches_per_period() as u64;
        let period_index = (index / per_period) as usize;
        let chunk = (index % per_period) as usize;
        let start = chunk * self.batch_size;
        BatchSelector {
            index,
            period_index,
            subjects: start..start + self.batch_size,
        }
    }
}
