//! Infrastructure layer: SQLite persistence, HTTP sources, CSV export,
//! configuration and logging.

pub mod config;
pub mod covid_tracking_source;
pub mod csv_export;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod observation_repository;
pub mod population_source;

use std::sync::Arc;

pub use self::config::{AppConfig, ConfigError, SourceConfig};
pub use covid_tracking_source::{HistoricalCasesSource, LatestCasesSource};
pub use csv_export::CsvMetricSink;
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::{get_log_directory, init_logging_with_config};
pub use observation_repository::SqliteObservationStore;
pub use population_source::PopulationTableSource;

use crate::domain::{Dataset, ObservationSource, SourceSet};

/// Production sources for a dataset, one per period.
///
/// Cases: the historical daily series for the first period and the latest
/// summary for the second. Population: one table source shared by both census
/// years, so the page is parsed once per year.
pub fn sources_for(dataset: Dataset, config: &SourceConfig, http: &HttpClient) -> SourceSet {
    match dataset {
        Dataset::Cases => {
            let historical: Arc<dyn ObservationSource> =
                Arc::new(HistoricalCasesSource::new(http.clone(), &config.covid_api_base));
            let latest: Arc<dyn ObservationSource> =
                Arc::new(LatestCasesSource::new(http.clone(), &config.covid_api_base));
            SourceSet::new(vec![historical, latest])
        }
        Dataset::Population => {
            let table: Arc<dyn ObservationSource> =
                Arc::new(PopulationTableSource::new(http.clone(), &config.population_url));
            SourceSet::uniform(table, dataset.periods().len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_period_has_a_source() {
        let http = HttpClient::new(&HttpClientConfig::default()).unwrap();
        for dataset in Dataset::ALL {
            let sources = sources_for(dataset, &SourceConfig::default(), &http);
            assert_eq!(sources.len(), dataset.periods().len());
        }
        let cases = sources_for(Dataset::Cases, &SourceConfig::default(), &http);
        let first = cases.for_period(Dataset::Cases.first_period()).unwrap();
        let last = cases.for_period(Dataset::Cases.last_period()).unwrap();
        assert_eq!(first.name(), "covidtracking-daily");
        assert_eq!(last.name(), "covidtracking-current");
    }
}
