//! CSV export of derived metrics
//!
//! One file per dataset, header `State,Metric`, one row per subject in
//! enumeration order. The file is rewritten in full on every export.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::domain::{Dataset, DerivedRecord, ExportError, MetricSink};
use crate::infrastructure::config::ExportConfig;

pub const HEADER: &str = "State,Metric";

pub fn render_csv(records: &[DerivedRecord]) -> String {
    std::iter::once(HEADER.to_string())
        .chain(
            records
                .iter()
                .map(|record| format!("{},{}", record.subject.code, record.value)),
        )
        .map(|line| line + "\n")
        .collect()
}

pub struct CsvMetricSink {
    config: ExportConfig,
}

impl CsvMetricSink {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn path_for(&self, dataset: Dataset) -> PathBuf {
        self.config.path_for(dataset)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl MetricSink for CsvMetricSink {
    async fn export(&self, dataset: Dataset, records: &[DerivedRecord]) -> Result<(), ExportError> {
        let path = self.path_for(dataset);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }
        tokio::fs::write(&path, render_csv(records))
            .await
            .map_err(io_error(&path))?;
        info!("[{}] exported {} rows to {}", dataset, records.len(), path.display());
        Ok(())
    }
}
