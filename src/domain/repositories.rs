//! Repository interface for raw and derived observations

use async_trait::async_trait;
use thiserror::Error;

use super::dataset::Dataset;
use super::records::{DerivedRecord, RawRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown subject '{0}' in store")]
    UnknownSubject(String),

    #[error("Period '{period}' does not belong to dataset '{dataset}'")]
    UnknownPeriod { dataset: Dataset, period: String },
}

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Row population of the dataset's raw table; `None` if the table does not exist.
    async fn count(&self, dataset: Dataset) -> Result<Option<u64>, StoreError>;

    /// Writes one raw record, replacing any existing row with the same
    /// (subject, period). Committed before returning.
    async fn upsert_raw(&self, dataset: Dataset, record: &RawRecord) -> Result<(), StoreError>;

    /// All raw records ordered by period, then subject.
    async fn raw_records(&self, dataset: Dataset) -> Result<Vec<RawRecord>, StoreError>;

    async fn derived_count(&self, dataset: Dataset) -> Result<u64, StoreError>;

    async fn write_derived(&self, dataset: Dataset, records: &[DerivedRecord]) -> Result<(), StoreError>;

    /// Derived records in subject order.
    async fn derived_records(&self, dataset: Dataset) -> Result<Vec<DerivedRecord>, StoreError>;
}
