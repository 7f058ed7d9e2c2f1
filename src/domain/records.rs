//! Typed rows flowing between sources, the store and the derived stage

use super::dataset::Period;
use super::subjects::Subject;

/// A single numeric observation returned by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub value: i64,
}

impl Observation {
    pub fn new(value: i64) -> Self {
        Self { value }
    }

    /// Stand-in written when a source has no value for a unit.
    pub fn sentinel() -> Self {
        Self { value: 0 }
    }
}

/// One persisted observation for a (subject, period) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub subject: Subject,
    pub period: Period,
    pub value: i64,
}

impl RawRecord {
    pub fn new(subject: Subject, period: Period, observation: Observation) -> Self {
        Self {
            subject,
            period,
            value: observation.value,
        }
    }
}

/// Metric relating the first and last period of one subject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedRecord {
    pub subject: Subject,
    pub value: f64,
}
