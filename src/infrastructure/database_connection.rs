// Database connection and pool management
// This module handles SQLite database connections using sqlx

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{debug, info};

use crate::domain::{Dataset, SubjectCatalog};

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        if !db_path.starts_with(":memory:") {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {database_url}"))?;

        info!("Connected to database {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the schema and seeds the subject and period lookups.
    /// Safe to run on every start.
    pub async fn migrate(&self) -> Result<()> {
        let create_subjects_sql = r"
            CREATE TABLE IF NOT EXISTS subjects (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL
            )
        ";

        let create_periods_sql = r"
            CREATE TABLE IF NOT EXISTS periods (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dataset TEXT NOT NULL,
                position INTEGER NOT NULL,
                label TEXT NOT NULL,
                UNIQUE (dataset, position)
            )
        ";

        let create_raw_cases_sql = r"
            CREATE TABLE IF NOT EXISTS raw_cases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id INTEGER NOT NULL,
                period_id INTEGER NOT NULL,
                value INTEGER NOT NULL,
                UNIQUE (subject_id, period_id),
                FOREIGN KEY (subject_id) REFERENCES subjects (id),
                FOREIGN KEY (period_id) REFERENCES periods (id)
            )
        ";

        let create_raw_population_sql = r"
            CREATE TABLE IF NOT EXISTS raw_population (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_label TEXT NOT NULL,
                period_label TEXT NOT NULL,
                value INTEGER NOT NULL,
                UNIQUE (subject_label, period_label)
            )
        ";

        let create_derived_sql = r"
            CREATE TABLE IF NOT EXISTS derived_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dataset TEXT NOT NULL,
                subject_id INTEGER NOT NULL,
                value REAL NOT NULL,
                UNIQUE (dataset, subject_id),
                FOREIGN KEY (subject_id) REFERENCES subjects (id)
            )
        ";

        sqlx::query(create_subjects_sql).execute(&self.pool).await?;
        sqlx::query(create_periods_sql).execute(&self.pool).await?;
        sqlx::query(create_raw_cases_sql).execute(&self.pool).await?;
        sqlx::query(create_raw_population_sql).execute(&self.pool).await?;
        sqlx::query(create_derived_sql).execute(&self.pool).await?;

        for subject in SubjectCatalog.iter() {
            sqlx::query("INSERT OR IGNORE INTO subjects (id, code, name) VALUES (?, ?, ?)")
                .bind(subject.id())
                .bind(subject.code)
                .bind(subject.name)
                .execute(&self.pool)
                .await?;
        }

        for dataset in Dataset::ALL {
            for period in dataset.periods() {
                sqlx::query("INSERT OR IGNORE INTO periods (dataset, position, label) VALUES (?, ?, ?)")
                    .bind(dataset.as_str())
                    .bind(i64::try_from(period.position)?)
                    .bind(period.label)
                    .execute(&self.pool)
                    .await?;
            }
        }

        debug!("Schema ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn creates_file_in_missing_directory() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let db = DatabaseConnection::new(&database_url, 1).await?;
        db.migrate().await?;
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn migrate_is_idempotent_and_seeds_lookups() -> Result<()> {
        let db = DatabaseConnection::new("sqlite::memory:", 1).await?;
        db.migrate().await?;
        db.migrate().await?;

        let subjects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subjects")
            .fetch_one(db.pool())
            .await?;
        let periods: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM periods")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(subjects, 50);
        assert_eq!(periods, 4);

        let montana: String = sqlx::query_scalar("SELECT code FROM subjects WHERE id = 26")
            .fetch_one(db.pool())
            .await?;
        assert_eq!(montana, "mt");
        Ok(())
    }
}
