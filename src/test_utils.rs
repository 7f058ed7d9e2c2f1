//! Test utilities
//!
//! In-memory stand-ins for the store, the sources and the export sink so the
//! driver and the derived stage can be exercised without SQLite or HTTP.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::{
    Dataset, DerivedRecord, ExportError, FetchError, MetricSink, Observation, ObservationSource,
    ObservationStore, Period, RawRecord, StoreError, Subject,
};

/// Store backed by ordered maps. A dataset's "table" exists once it has a row.
#[derive(Default)]
pub struct MemoryStore {
    raw: Mutex<HashMap<Dataset, BTreeMap<(usize, usize), RawRecord>>>,
    derived: Mutex<HashMap<Dataset, Vec<DerivedRecord>>>,
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn count(&self, dataset: Dataset) -> Result<Option<u64>, StoreError> {
        let raw = self.raw.lock().unwrap();
        Ok(raw.get(&dataset).map(|rows| rows.len() as u64))
    }

    async fn upsert_raw(&self, dataset: Dataset, record: &RawRecord) -> Result<(), StoreError> {
        if dataset.period(record.period.position) != Some(record.period) {
            return Err(StoreError::UnknownPeriod {
                dataset,
                period: record.period.label.to_string(),
            });
        }
        let mut raw = self.raw.lock().unwrap();
        raw.entry(dataset)
            .or_default()
            .insert((record.period.position, record.subject.index), *record);
        Ok(())
    }

    async fn raw_records(&self, dataset: Dataset) -> Result<Vec<RawRecord>, StoreError> {
        let raw = self.raw.lock().unwrap();
        Ok(raw
            .get(&dataset)
            .map(|rows| rows.values().copied().collect())
            .unwrap_or_default())
    }

    async fn derived_count(&self, dataset: Dataset) -> Result<u64, StoreError> {
        let derived = self.derived.lock().unwrap();
        Ok(derived.get(&dataset).map_or(0, |rows| rows.len() as u64))
    }

    async fn write_derived(&self, dataset: Dataset, records: &[DerivedRecord]) -> Result<(), StoreError> {
        let mut derived = self.derived.lock().unwrap();
        derived.entry(dataset).or_default().extend_from_slice(records);
        Ok(())
    }

    async fn derived_records(&self, dataset: Dataset) -> Result<Vec<DerivedRecord>, StoreError> {
        let derived = self.derived.lock().unwrap();
        Ok(derived.get(&dataset).cloned().unwrap_or_default())
    }
}

/// Source returning a constant value, with per-subject failure scripting.
pub struct ScriptedSource {
    name: String,
    value: i64,
    missing: HashSet<&'static str>,
    unavailable: HashSet<&'static str>,
    recovered: AtomicBool,
}

impl ScriptedSource {
    pub fn constant(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            value,
            missing: HashSet::new(),
            unavailable: HashSet::new(),
            recovered: AtomicBool::new(false),
        }
    }

    pub fn missing_for(mut self, code: &'static str) -> Self {
        self.missing.insert(code);
        self
    }

    pub fn unavailable_for(mut self, code: &'static str) -> Self {
        self.unavailable.insert(code);
        self
    }

    /// Clears scripted outages.
    pub fn recover(&self) {
        self.recovered.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObservationSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, subject: Subject, period: Period) -> Result<Observation, FetchError> {
        if !self.recovered.load(Ordering::SeqCst) && self.unavailable.contains(subject.code) {
            return Err(FetchError::unavailable(&self.name, subject, "scripted outage"));
        }
        if self.missing.contains(subject.code) {
            return Err(FetchError::missing(subject, period));
        }
        Ok(Observation::new(self.value))
    }
}

/// Sink that remembers every successful export and can fail the first calls.
#[derive(Default)]
pub struct RecordingSink {
    exports: Mutex<Vec<(Dataset, Vec<DerivedRecord>)>>,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    pub fn exports(&self) -> Vec<(Dataset, Vec<DerivedRecord>)> {
        self.exports.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn export(&self, dataset: Dataset, records: &[DerivedRecord]) -> Result<(), ExportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ExportError::Io {
                path: format!("{dataset}.csv"),
                source: std::io::Error::other("disk full"),
            });
        }
        self.exports.lock().unwrap().push((dataset, records.to_vec()));
        Ok(())
    }
}
