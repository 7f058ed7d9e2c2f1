//! SQLite-backed observation store
//!
//! Raw case rows reference the `subjects` and `periods` lookups by id; raw
//! population rows are keyed by state name and census year. Both tables carry
//! a UNIQUE (subject, period) constraint and every write is an upsert, so a
//! retried unit replaces its earlier row instead of adding a second one.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::domain::{
    Dataset, DerivedRecord, ObservationStore, Period, RawRecord, StoreError, Subject, SubjectCatalog,
};

pub struct SqliteObservationStore {
    pool: SqlitePool,
}

impl SqliteObservationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn raw_table(dataset: Dataset) -> &'static str {
        match dataset {
            Dataset::Cases => "raw_cases",
            Dataset::Population => "raw_population",
        }
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn period_id(&self, dataset: Dataset, period: Period) -> Result<i64, StoreError> {
        let unknown = || StoreError::UnknownPeriod {
            dataset,
            period: period.label.to_string(),
        };
        if dataset.period(period.position) != Some(period) {
            return Err(unknown());
        }
        let position = i64::try_from(period.position).map_err(|_| unknown())?;
        sqlx::query_scalar("SELECT id FROM periods WHERE dataset = ? AND position = ?")
            .bind(dataset.as_str())
            .bind(position)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(unknown)
    }

    fn subject_by_code(code: &str) -> Result<Subject, StoreError> {
        SubjectCatalog
            .by_code(code)
            .ok_or_else(|| StoreError::UnknownSubject(code.to_string()))
    }

    fn period_at(dataset: Dataset, position: i64) -> Result<Period, StoreError> {
        usize::try_from(position)
            .ok()
            .and_then(|p| dataset.period(p))
            .ok_or_else(|| StoreError::UnknownPeriod {
                dataset,
                period: position.to_string(),
            })
    }

    async fn case_records(&self) -> Result<Vec<RawRecord>, StoreError> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r"
            SELECT s.code, p.position, r.value
            FROM raw_cases r
            JOIN subjects s ON s.id = r.subject_id
            JOIN periods p ON p.id = r.period_id
            ORDER BY p.position, s.id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(code, position, value)| {
                Ok(RawRecord {
                    subject: Self::subject_by_code(&code)?,
                    period: Self::period_at(Dataset::Cases, position)?,
                    value,
                })
            })
            .collect()
    }

    async fn population_records(&self) -> Result<Vec<RawRecord>, StoreError> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT subject_label, period_label, value FROM raw_population")
                .fetch_all(&self.pool)
                .await?;

        let mut records = rows
            .into_iter()
            .map(|(name, label, value)| {
                let subject = SubjectCatalog
                    .by_name(&name)
                    .ok_or_else(|| StoreError::UnknownSubject(name.clone()))?;
                let period = Dataset::Population
                    .periods()
                    .iter()
                    .find(|p| p.label == label)
                    .copied()
                    .ok_or_else(|| StoreError::UnknownPeriod {
                        dataset: Dataset::Population,
                        period: label.clone(),
                    })?;
                Ok(RawRecord { subject, period, value })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        records.sort_by_key(|r| (r.period.position, r.subject.index));
        Ok(records)
    }
}

#[async_trait]
impl ObservationStore for SqliteObservationStore {
    async fn count(&self, dataset: Dataset) -> Result<Option<u64>, StoreError> {
        let table = Self::raw_table(dataset);
        if !self.table_exists(table).await? {
            return Ok(None);
        }
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(Some(count.unsigned_abs()))
    }

    async fn upsert_raw(&self, dataset: Dataset, record: &RawRecord) -> Result<(), StoreError> {
        match dataset {
            Dataset::Cases => {
                let period_id = self.period_id(dataset, record.period).await?;
                sqlx::query(
                    r"
                    INSERT INTO raw_cases (subject_id, period_id, value) VALUES (?, ?, ?)
                    ON CONFLICT (subject_id, period_id) DO UPDATE SET value = excluded.value
                    ",
                )
                .bind(record.subject.id())
                .bind(period_id)
                .bind(record.value)
                .execute(&self.pool)
                .await?;
            }
            Dataset::Population => {
                if dataset.period(record.period.position) != Some(record.period) {
                    return Err(StoreError::UnknownPeriod {
                        dataset,
                        period: record.period.label.to_string(),
                    });
                }
                sqlx::query(
                    r"
                    INSERT INTO raw_population (subject_label, period_label, value) VALUES (?, ?, ?)
                    ON CONFLICT (subject_label, period_label) DO UPDATE SET value = excluded.value
                    ",
                )
                .bind(record.subject.name)
                .bind(record.period.label)
                .bind(record.value)
                .execute(&self.pool)
                .await?;
            }
        }
        debug!(
            "[{}] upserted {} / {} = {}",
            dataset, record.subject, record.period, record.value
        );
        Ok(())
    }

    async fn raw_records(&self, dataset: Dataset) -> Result<Vec<RawRecord>, StoreError> {
        match dataset {
            Dataset::Cases => self.case_records().await,
            Dataset::Population => self.population_records().await,
        }
    }

    async fn derived_count(&self, dataset: Dataset) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM derived_metrics WHERE dataset = ?")
            .bind(dataset.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.unsigned_abs())
    }

    async fn write_derived(&self, dataset: Dataset, records: &[DerivedRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r"
                INSERT INTO derived_metrics (dataset, subject_id, value) VALUES (?, ?, ?)
                ON CONFLICT (dataset, subject_id) DO UPDATE SET value = excluded.value
                ",
            )
            .bind(dataset.as_str())
            .bind(record.subject.id())
            .bind(record.value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn derived_records(&self, dataset: Dataset) -> Result<Vec<DerivedRecord>, StoreError> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            r"
            SELECT s.code, d.value
            FROM derived_metrics d
            JOIN subjects s ON s.id = d.subject_id
            WHERE d.dataset = ?
            ORDER BY s.id
            ",
        )
        .bind(dataset.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(code, value)| {
                Ok(DerivedRecord {
                    subject: Self::subject_by_code(&code)?,
                    value,
                })
            })
            .collect()
    }
}
