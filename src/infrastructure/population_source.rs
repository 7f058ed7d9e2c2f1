//! Census population scraped from the Wikipedia state population table
//!
//! The page is fetched at most once per period for the life of the process.
//! Each data row holds the state name in the third cell, the 2020 census in
//! the fourth and the 2010 census in the fifth.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::http_client::HttpClient;
use crate::domain::{FetchError, Observation, ObservationSource, Period, Subject};

const TABLE_SELECTOR: &str = "table.wikitable.sortable";
const FIRST_DATA_ROW: usize = 2;
const LAST_DATA_ROW: usize = 53;
const NAME_CELL: usize = 2;
const EXCLUDED: &str = "District of Columbia";

static FOOTNOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("valid footnote pattern"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableParseError {
    #[error("Population table '{selector}' not found")]
    TableNotFound { selector: String },

    #[error("No population column for period '{period}'")]
    UnknownColumn { period: String },

    #[error("Invalid population '{text}' for {state}")]
    InvalidNumber { state: String, text: String },
}

/// Cell index holding the census count for a period year.
pub fn column_for(period: Period) -> Option<usize> {
    match period.label {
        "2020" => Some(3),
        "2010" => Some(4),
        _ => None,
    }
}

fn clean_cell(text: &str) -> String {
    FOOTNOTES.replace_all(text, "").replace(',', "").trim().to_string()
}

/// State name to population for one census column.
pub fn parse_population_table(html: &str, column: usize) -> Result<HashMap<String, i64>, TableParseError> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse(TABLE_SELECTOR).map_err(|_| TableParseError::TableNotFound {
        selector: TABLE_SELECTOR.to_string(),
    })?;
    let row_selector = Selector::parse("tr").map_err(|_| TableParseError::TableNotFound {
        selector: "tr".to_string(),
    })?;
    let cell_selector = Selector::parse("td").map_err(|_| TableParseError::TableNotFound {
        selector: "td".to_string(),
    })?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| TableParseError::TableNotFound {
            selector: TABLE_SELECTOR.to_string(),
        })?;

    let mut populations = HashMap::new();
    for row in table
        .select(&row_selector)
        .skip(FIRST_DATA_ROW)
        .take(LAST_DATA_ROW - FIRST_DATA_ROW)
    {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| cell.text().collect::<String>())
            .collect();
        let (Some(name), Some(count)) = (cells.get(NAME_CELL), cells.get(column)) else {
            debug!("Skipping population row with {} cells", cells.len());
            continue;
        };

        let state = FOOTNOTES.replace_all(name, "").trim().to_string();
        let text = clean_cell(count);
        let value = text.parse::<i64>().map_err(|_| TableParseError::InvalidNumber {
            state: state.clone(),
            text: count.trim().to_string(),
        })?;
        populations.insert(state, value);
    }

    populations.remove(EXCLUDED);
    Ok(populations)
}

pub struct PopulationTableSource {
    http: HttpClient,
    url: String,
    cache: Mutex<HashMap<&'static str, Arc<HashMap<String, i64>>>>,
}

impl PopulationTableSource {
    pub fn new(http: HttpClient, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn table_for(&self, subject: Subject, period: Period) -> Result<Arc<HashMap<String, i64>>, FetchError> {
        let mut cache = self.cache.lock().await;
        if let Some(table) = cache.get(period.label) {
            return Ok(table.clone());
        }

        let column = column_for(period).ok_or_else(|| {
            FetchError::unavailable(
                self.name(),
                subject,
                TableParseError::UnknownColumn {
                    period: period.label.to_string(),
                },
            )
        })?;
        let html = self
            .http
            .get_text(&self.url)
            .await
            .map_err(|e| FetchError::unavailable(self.name(), subject, format!("{e:#}")))?;
        let table = Arc::new(
            parse_population_table(&html, column).map_err(|e| FetchError::unavailable(self.name(), subject, e))?,
        );

        info!("Loaded {} state populations for {}", table.len(), period);
        cache.insert(period.label, table.clone());
        Ok(table)
    }
}

#[async_trait]
impl ObservationSource for PopulationTableSource {
    fn name(&self) -> &str {
        "wikipedia-population"
    }

    async fn fetch(&self, subject: Subject, period: Period) -> Result<Observation, FetchError> {
        let table = self.table_for(subject, period).await?;
        table
            .get(subject.name)
            .copied()
            .map(Observation::new)
            .ok_or_else(|| FetchError::missing(subject, period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dataset, SubjectCatalog};

    /// Two header rows, 51 data rows (DC included), then rows past the cut.
    fn fixture() -> String {
        let mut rows = vec![
            "<tr><th>Rank 2020</th><th>Rank 2010</th><th>State</th><th>Census 2020</th><th>Census 2010</th></tr>".to_string(),
            "<tr><th colspan=\"5\">Sortable</th></tr>".to_string(),
        ];
        for (i, subject) in SubjectCatalog.iter().enumerate() {
            let name = if subject.code == "ca" {
                format!("{}<sup>[a]</sup>", subject.name)
            } else {
                subject.name.to_string()
            };
            rows.push(format!(
                "<tr><td>{}</td><td>{}</td><td> {} </td><td>{},000</td><td>{},500[1]</td></tr>",
                i + 1,
                i + 1,
                name,
                i + 1,
                i + 1
            ));
            if i == 20 {
                rows.push(
                    "<tr><td>-</td><td>-</td><td>District of Columbia</td><td>689,545</td><td>601,723</td></tr>"
                        .to_string(),
                );
            }
        }
        rows.push("<tr><td>-</td><td>-</td><td>Puerto Rico</td><td>3,285,874</td><td>3,725,789</td></tr>".to_string());
        format!(
            "<html><body><table class=\"wikitable\"><tr><td>decoy</td></tr></table>\
             <table class=\"wikitable sortable\"><tbody>{}</tbody></table></body></html>",
            rows.concat()
        )
    }

    #[test]
    fn extracts_fifty_states_without_dc() {
        let column = column_for(Dataset::Population.last_period()).unwrap();
        let table = parse_population_table(&fixture(), column).unwrap();
        assert_eq!(table.len(), 50);
        assert!(!table.contains_key("District of Columbia"));
        assert!(!table.contains_key("Puerto Rico"));
        assert_eq!(table["Alabama"], 1_000);
        assert_eq!(table["California"], 5_000);
        assert_eq!(table["Wyoming"], 50_000);
    }

    #[test]
    fn strips_footnotes_from_older_census_column() {
        let column = column_for(Dataset::Population.first_period()).unwrap();
        let table = parse_population_table(&fixture(), column).unwrap();
        assert_eq!(table["Texas"], 43_500);
    }

    #[test]
    fn missing_table_is_an_error() {
        let err = parse_population_table("<html><body><p>moved</p></body></html>", 3).unwrap_err();
        assert!(matches!(err, TableParseError::TableNotFound { .. }));
    }

    #[test]
    fn unparsable_count_is_an_error() {
        let html = fixture().replace("3,000", "n/a");
        let err = parse_population_table(&html, 3).unwrap_err();
        assert_eq!(
            err,
            TableParseError::InvalidNumber {
                state: "Arizona".to_string(),
                text: "n/a".to_string()
            }
        );
    }

    #[test]
    fn only_census_years_have_columns() {
        assert_eq!(column_for(Dataset::Cases.first_period()), None);
    }
}
