//! Text reports over the ingested and derived data
//!
//! Four views: states with the highest percent change in cases, states with
//! the most positive cases on the first case period, each state's share of
//! the latest census population, and cases as a share of population for the
//! states with the most cases.

use std::sync::Arc;

use tabled::{Table, Tabled};

use crate::domain::{Dataset, DerivedRecord, ObservationStore, Period, RawRecord, StoreError, Subject};

pub const TOP_N: usize = 10;

#[derive(Debug, Clone, Tabled)]
pub struct RankedRow {
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Tabled)]
pub struct ShareRow {
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Count")]
    pub count: i64,
    #[tabled(rename = "Share (%)")]
    pub share: String,
}

/// Derived records sorted descending by value, truncated to `limit`.
pub fn rank_derived(records: &[DerivedRecord], limit: usize) -> Vec<DerivedRecord> {
    let mut ranked = records.to_vec();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(limit);
    ranked
}

/// Raw records of one period sorted descending by value, truncated to `limit`.
pub fn rank_period(records: &[RawRecord], period: Period, limit: usize) -> Vec<RawRecord> {
    let mut ranked: Vec<_> = records.iter().filter(|r| r.period == period).copied().collect();
    ranked.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.subject.index.cmp(&b.subject.index)));
    ranked.truncate(limit);
    ranked
}

/// Each subject's percentage of the period total, largest first.
pub fn population_shares(records: &[RawRecord], period: Period) -> Vec<(Subject, i64, f64)> {
    let rows = rank_period(records, period, usize::MAX);
    let total: i64 = rows.iter().map(|r| r.value).sum();
    if total == 0 {
        return Vec::new();
    }
    rows.into_iter()
        .map(|r| (r.subject, r.value, r.value as f64 / total as f64 * 100.0))
        .collect()
}

/// Cases as a percentage of population for the `limit` subjects with the most cases.
pub fn cases_share_of_population(
    cases: &[RawRecord],
    case_period: Period,
    population: &[RawRecord],
    population_period: Period,
    limit: usize,
) -> Vec<(Subject, i64, f64)> {
    rank_period(cases, case_period, limit)
        .into_iter()
        .filter_map(|c| {
            let pop = population
                .iter()
                .find(|p| p.subject == c.subject && p.period == population_period)?;
            (pop.value > 0).then(|| (c.subject, c.value, c.value as f64 / pop.value as f64 * 100.0))
        })
        .collect()
}

fn ranked_table<I>(rows: I) -> String
where
    I: IntoIterator<Item = (Subject, String)>,
{
    let rows: Vec<_> = rows
        .into_iter()
        .enumerate()
        .map(|(i, (subject, value))| RankedRow {
            rank: i + 1,
            state: subject.code.to_uppercase(),
            value,
        })
        .collect();
    if rows.is_empty() {
        "No data".to_string()
    } else {
        Table::new(rows).to_string()
    }
}

fn share_table(rows: Vec<(Subject, i64, f64)>, label: fn(&Subject) -> String) -> String {
    let rows: Vec<_> = rows
        .into_iter()
        .map(|(subject, count, share)| ShareRow {
            state: label(&subject),
            count,
            share: format!("{share:.3}"),
        })
        .collect();
    if rows.is_empty() {
        "No data".to_string()
    } else {
        Table::new(rows).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub title: String,
    pub body: String,
}

impl std::fmt::Display for RenderedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.title)?;
        write!(f, "{}", self.body)
    }
}

pub struct ReportService {
    store: Arc<dyn ObservationStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn ObservationStore>) -> Self {
        Self { store }
    }

    pub async fn render_all(&self) -> Result<Vec<RenderedReport>, StoreError> {
        let cases = self.store.raw_records(Dataset::Cases).await?;
        let population = self.store.raw_records(Dataset::Population).await?;
        let case_changes = self.store.derived_records(Dataset::Cases).await?;

        let case_first = Dataset::Cases.first_period();
        let case_last = Dataset::Cases.last_period();
        let census = Dataset::Population.last_period();

        Ok(vec![
            RenderedReport {
                title: format!("Highest percent change in cases, {case_first} to {case_last}"),
                body: ranked_table(
                    rank_derived(&case_changes, TOP_N)
                        .into_iter()
                        .map(|r| (r.subject, format!("{:.2}%", r.value))),
                ),
            },
            RenderedReport {
                title: format!("Highest positive cases on {case_first}"),
                body: ranked_table(
                    rank_period(&cases, case_first, TOP_N)
                        .into_iter()
                        .map(|r| (r.subject, r.value.to_string())),
                ),
            },
            RenderedReport {
                title: format!("Share of {census} US population by state"),
                body: share_table(population_shares(&population, census), |s| s.name.to_string()),
            },
            RenderedReport {
                title: format!("Positive cases on {case_first} as a share of {census} population"),
                body: share_table(
                    cases_share_of_population(&cases, case_first, &population, census, TOP_N),
                    |s| s.code.to_uppercase(),
                ),
            },
        ])
    }
}
