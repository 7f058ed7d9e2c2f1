//! Datasets and their fixed period sets

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::subjects::SubjectCatalog;

/// One point in time an observation is collected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    /// Position within the dataset's declared period order.
    pub position: usize,
    pub label: &'static str,
}

impl Period {
    /// `YYYYMMDD` labels as a calendar date.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.label, "%Y%m%d").ok()
    }

    /// Four-digit labels as a census year.
    pub fn year(&self) -> Option<i32> {
        if self.label.len() == 4 {
            self.label.parse().ok()
        } else {
            None
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label)
    }
}

const CASE_PERIODS: [Period; 2] = [
    Period { position: 0, label: "20201201" },
    Period { position: 1, label: "20210307" },
];

const POPULATION_PERIODS: [Period; 2] = [
    Period { position: 0, label: "2010" },
    Period { position: 1, label: "2020" },
];

/// How a dataset's derived record relates its first and last period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// `(later - earlier) / earlier * 100`
    PercentChange,
    /// `later / earlier`
    Ratio,
}

impl MetricKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PercentChange => "Percent Change",
            Self::Ratio => "Ratio",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Cases,
    Population,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Cases, Dataset::Population];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cases => "cases",
            Self::Population => "population",
        }
    }

    pub fn periods(&self) -> &'static [Period] {
        match self {
            Self::Cases => &CASE_PERIODS,
            Self::Population => &POPULATION_PERIODS,
        }
    }

    pub fn period(&self, position: usize) -> Option<Period> {
        self.periods().get(position).copied()
    }

    pub fn first_period(&self) -> Period {
        self.periods()[0]
    }

    pub fn last_period(&self) -> Period {
        self.periods()[self.periods().len() - 1]
    }

    pub fn metric(&self) -> MetricKind {
        match self {
            Self::Cases => MetricKind::PercentChange,
            Self::Population => MetricKind::Ratio,
        }
    }

    /// `|subjects| × |periods|`; the only termination signal for raw ingestion.
    pub fn expected_total(&self) -> u64 {
        (SubjectCatalog::LEN * self.periods().len()) as u64
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_totals_cover_every_key() {
        assert_eq!(Dataset::Cases.expected_total(), 100);
        assert_eq!(Dataset::Population.expected_total(), 100);
    }

    #[test]
    fn period_labels_parse_to_typed_values() {
        let dec = Dataset::Cases.first_period();
        assert_eq!(dec.date(), NaiveDate::from_ymd_opt(2020, 12, 1));
        assert_eq!(dec.year(), None);

        let census = Dataset::Population.last_period();
        assert_eq!(census.year(), Some(2020));
        assert_eq!(census.position, 1);
    }

    #[test]
    fn dataset_deserializes_from_lowercase() {
        let parsed: Vec<Dataset> = serde_json::from_str(r#"["cases","population"]"#).unwrap();
        assert_eq!(parsed, Dataset::ALL.to_vec());
    }
}
