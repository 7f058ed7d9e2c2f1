//! covid-report: print the report tables from the ingested store

use std::sync::Arc;

use anyhow::{Context, Result};

use covid_census_lib::application::ReportService;
use covid_census_lib::domain::ObservationStore;
use covid_census_lib::infrastructure::{
    AppConfig, DatabaseConnection, SqliteObservationStore, init_logging_with_config,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging_with_config(&config.logging)?;

    let db = DatabaseConnection::new(&config.database.resolved_url(), config.database.max_connections).await?;
    db.migrate().await?;
    let store: Arc<dyn ObservationStore> = Arc::new(SqliteObservationStore::new(db.pool().clone()));

    let reports = ReportService::new(store)
        .render_all()
        .await
        .context("Failed to read the store")?;
    for report in reports {
        println!("{report}\n");
    }
    Ok(())
}
