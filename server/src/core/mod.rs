//! Date-keyed catalog and resolution layer.
//!
//! Every function here reads the filesystem fresh on each call; nothing is
//! cached between requests because the ingestion jobs rewrite these files at
//! arbitrary times.

pub mod catalog;
pub mod dates;
pub mod series;

pub use catalog::{latest, ordering_key, scan, CatalogEntry};
pub use dates::{DateIndex, DateIndexEntry, PathIndexEntry, Resolution};
pub use series::{reshape, summarize, RawSeries, SeriesPoint, SeriesSummary};
