//! covid-census: advance every configured dataset by one step and exit
//!
//! Run it repeatedly; each invocation writes at most one batch per dataset,
//! or the derived metrics once a dataset's raw table is full.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use covid_census_lib::application::{DerivedMetricsStage, IngestionDriver};
use covid_census_lib::domain::{MetricSink, ObservationStore};
use covid_census_lib::infrastructure::{
    AppConfig, CsvMetricSink, DatabaseConnection, HttpClient, HttpClientConfig, SqliteObservationStore,
    init_logging_with_config, sources_for,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging_with_config(&config.logging)?;

    let database_url = config.database.resolved_url();
    let db = DatabaseConnection::new(&database_url, config.database.max_connections).await?;
    db.migrate().await.context("Failed to prepare database schema")?;

    let store: Arc<dyn ObservationStore> = Arc::new(SqliteObservationStore::new(db.pool().clone()));
    let sink: Arc<dyn MetricSink> = Arc::new(CsvMetricSink::new(config.export.clone()));
    let http = HttpClient::new(&HttpClientConfig::from_source_config(&config.sources))?;

    let run_id = Uuid::new_v4();
    let mut failures = 0;
    for &dataset in &config.ingest.datasets {
        let stage = DerivedMetricsStage::new(dataset, store.clone()).with_sink(sink.clone());
        let driver = IngestionDriver::new(
            dataset,
            store.clone(),
            sources_for(dataset, &config.sources, &http),
            config.ingest.batch_size,
        )?
        .with_derived_stage(stage);

        let span = info_span!("run", %run_id, %dataset);
        match driver.run_once().instrument(span).await {
            Ok(outcome) => {
                info!("[{}] {}", dataset, outcome);
                println!("{dataset}: {outcome}");
            }
            Err(e) => {
                error!("[{}] run failed: {}", dataset, e);
                println!("{dataset}: failed: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} dataset(s) failed; rerun to retry the same batch");
    }
    Ok(())
}
