//! Export sinks for derived records

use async_trait::async_trait;
use thiserror::Error;

use super::dataset::Dataset;
use super::records::DerivedRecord;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write export {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn export(&self, dataset: Dataset, records: &[DerivedRecord]) -> Result<(), ExportError>;
}
