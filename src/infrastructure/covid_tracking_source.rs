//! COVID Tracking Project case sources
//!
//! `LatestCasesSource` reads the per-state `current.json` summary and
//! `HistoricalCasesSource` scans the per-state `daily.json` series for the
//! period's date. The project stopped collecting on 2021-03-07, so "latest"
//! is effectively that day.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http_client::HttpClient;
use crate::domain::{FetchError, Observation, ObservationSource, Period, Subject};

/// The fields of a state record we read. Everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StateRecord {
    pub date: u32,
    pub positive: Option<i64>,
}

/// First entry matching `date`, if it carries a `positive` count.
pub fn select_historical(series: &[StateRecord], date: u32) -> Option<i64> {
    series.iter().find(|entry| entry.date == date)?.positive
}

fn period_date(period: Period) -> Option<u32> {
    period.date().and_then(|_| period.label.parse().ok())
}

fn api_root(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

pub struct LatestCasesSource {
    http: HttpClient,
    api_base: String,
}

impl LatestCasesSource {
    pub fn new(http: HttpClient, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_root(api_base),
        }
    }

    pub fn url_for(&self, subject: Subject) -> String {
        format!("{}/states/{}/current.json", self.api_base, subject.code)
    }
}

#[async_trait]
impl ObservationSource for LatestCasesSource {
    fn name(&self) -> &str {
        "covidtracking-current"
    }

    async fn fetch(&self, subject: Subject, period: Period) -> Result<Observation, FetchError> {
        let record: StateRecord = self
            .http
            .get_json(&self.url_for(subject))
            .await
            .map_err(|e| FetchError::unavailable(self.name(), subject, format!("{e:#}")))?;

        debug!("{}: latest record dated {}", subject, record.date);
        record
            .positive
            .map(Observation::new)
            .ok_or_else(|| FetchError::missing(subject, period))
    }
}

pub struct HistoricalCasesSource {
    http: HttpClient,
    api_base: String,
}

impl HistoricalCasesSource {
    pub fn new(http: HttpClient, api_base: &str) -> Self {
        Self {
            http,
            api_base: api_root(api_base),
        }
    }

    pub fn url_for(&self, subject: Subject) -> String {
        format!("{}/states/{}/daily.json", self.api_base, subject.code)
    }
}

#[async_trait]
impl ObservationSource for HistoricalCasesSource {
    fn name(&self) -> &str {
        "covidtracking-daily"
    }

    async fn fetch(&self, subject: Subject, period: Period) -> Result<Observation, FetchError> {
        let Some(date) = period_date(period) else {
            return Err(FetchError::unavailable(
                self.name(),
                subject,
                format!("period '{period}' is not a YYYYMMDD date"),
            ));
        };

        let series: Vec<StateRecord> = self
            .http
            .get_json(&self.url_for(subject))
            .await
            .map_err(|e| FetchError::unavailable(self.name(), subject, format!("{e:#}")))?;

        debug!("{}: scanning {} daily entries for {}", subject, series.len(), date);
        select_historical(&series, date)
            .map(Observation::new)
            .ok_or_else(|| FetchError::missing(subject, period))
    }
}
