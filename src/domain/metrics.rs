//! Percent-change and ratio metrics between a subject's first and last period

use thiserror::Error;

use super::dataset::{Dataset, MetricKind};
use super::records::RawRecord;
use super::subjects::{Subject, SubjectCatalog};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("Incomplete data for {subject}: expected one record per boundary period, found {found}")]
    IncompleteData { subject: String, found: String },

    #[error("Division by zero for {subject}: earliest observation is 0")]
    DivisionByZero { subject: String },
}

impl MetricKind {
    pub fn compute(&self, subject: Subject, earlier: i64, later: i64) -> Result<f64, MetricError> {
        if earlier == 0 {
            return Err(MetricError::DivisionByZero {
                subject: subject.code.to_string(),
            });
        }
        let (earlier, later) = (earlier as f64, later as f64);
        Ok(match self {
            Self::PercentChange => (later - earlier) / earlier * 100.0,
            Self::Ratio => later / earlier,
        })
    }
}

/// Outcome of the derived computation for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectMetric {
    pub subject: Subject,
    pub result: Result<f64, MetricError>,
}

/// Computes the dataset's metric for every subject, in enumeration order.
///
/// Subjects without exactly one record for both the first and the last period
/// yield `IncompleteData`; they are never silently zeroed.
pub fn derive_metrics(dataset: Dataset, records: &[RawRecord]) -> Vec<SubjectMetric> {
    let first = dataset.first_period();
    let last = dataset.last_period();
    let metric = dataset.metric();

    SubjectCatalog
        .iter()
        .map(|subject| {
            let earlier: Vec<_> = records
                .iter()
                .filter(|r| r.subject == subject && r.period == first)
                .collect();
            let later: Vec<_> = records
                .iter()
                .filter(|r| r.subject == subject && r.period == last)
                .collect();

            let result = match (earlier.as_slice(), later.as_slice()) {
                ([e], [l]) => metric.compute(subject, e.value, l.value),
                _ => Err(MetricError::IncompleteData {
                    subject: subject.code.to_string(),
                    found: format!("{} x {first}, {} x {last}", earlier.len(), later.len()),
                }),
            };
            SubjectMetric { subject, result }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::Observation;

    fn ohio() -> Subject {
        SubjectCatalog.by_code("oh").unwrap()
    }

    #[test]
    fn percent_change_and_ratio() {
        assert_eq!(MetricKind::PercentChange.compute(ohio(), 100, 150), Ok(50.0));
        assert_eq!(MetricKind::Ratio.compute(ohio(), 100, 150), Ok(1.5));
        assert_eq!(MetricKind::PercentChange.compute(ohio(), 200, 100), Ok(-50.0));
    }

    #[test]
    fn zero_baseline_is_reported_not_infinite() {
        for kind in [MetricKind::PercentChange, MetricKind::Ratio] {
            assert_eq!(
                kind.compute(ohio(), 0, 150),
                Err(MetricError::DivisionByZero { subject: "oh".into() })
            );
        }
    }

    #[test]
    fn missing_period_is_incomplete() {
        let dataset = Dataset::Cases;
        let records = vec![
            RawRecord::new(ohio(), dataset.first_period(), Observation::new(10)),
            RawRecord::new(ohio(), dataset.last_period(), Observation::new(15)),
            RawRecord::new(SubjectCatalog.by_code("al").unwrap(), dataset.first_period(), Observation::new(7)),
        ];
        let metrics = derive_metrics(dataset, &records);
        assert_eq!(metrics.len(), 50);

        let oh = metrics.iter().find(|m| m.subject == ohio()).unwrap();
        assert_eq!(oh.result, Ok(50.0));

        let al = &metrics[0];
        assert!(matches!(al.result, Err(MetricError::IncompleteData { .. })));
    }

    #[test]
    fn duplicate_records_are_incomplete() {
        let dataset = Dataset::Population;
        let records = vec![
            RawRecord::new(ohio(), dataset.first_period(), Observation::new(10)),
            RawRecord::new(ohio(), dataset.first_period(), Observation::new(11)),
            RawRecord::new(ohio(), dataset.last_period(), Observation::new(15)),
        ];
        let oh = derive_metrics(dataset, &records)
            .into_iter()
            .find(|m| m.subject == ohio())
            .unwrap();
        assert!(matches!(oh.result, Err(MetricError::IncompleteData { .. })));
    }
}
