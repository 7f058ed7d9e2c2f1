//! covid-census - resumable batch ingestion of US state COVID-19 case counts
//! and census population figures
//!
//! Every invocation advances each dataset by one step: the next batch of raw
//! observations, or, once the raw table is full, the derived metrics and
//! their CSV export. Progress lives entirely in the store's row counts.

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;
