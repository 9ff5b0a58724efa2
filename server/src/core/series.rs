use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Paired-array time series as written by the NDVI job: `x[i]` labels `y[i]`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RawSeries {
    #[serde(default)]
    pub x: Option<Vec<String>>,
    /// `null` marks a reading the job could not compute (cloud cover, bad frame).
    #[serde(default)]
    pub y: Option<Vec<Option<f64>>>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SeriesPoint {
    pub date: String,
    #[serde(rename = "ndvi")]
    pub value: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SeriesSummary {
    pub count: usize,
    pub latest: SeriesPoint,
    pub average: f64,
}

/// `2024_01_15` -> `2024-01-15`.
pub fn normalize_label(label: &str) -> String {
    label.replace('_', "-")
}

/// Turns the paired arrays into labelled points, keeping source order.
///
/// A missing array or a length mismatch yields no points at all; the
/// producer rewrites the file while it runs, so half-written input is
/// treated as "no data yet". Positions whose reading is `null` are skipped.
pub fn reshape(raw: &RawSeries) -> Vec<SeriesPoint> {
    let (Some(x), Some(y)) = (raw.x.as_ref(), raw.y.as_ref()) else {
        return Vec::new();
    };
    if x.len() != y.len() {
        warn!("series length mismatch x={} y={}", x.len(), y.len());
        return Vec::new();
    }
    let points: Vec<SeriesPoint> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(label, value)| {
            Some(SeriesPoint {
                date: normalize_label(label),
                value: (*value)?,
            })
        })
        .collect();
    if points.len() < x.len() {
        debug!("series skipped null readings skipped={}", x.len() - points.len());
    }
    points
}

/// Reads a raw series file. A missing file is an empty series.
pub fn load_raw(path: &Path) -> Result<RawSeries> {
    let body = match fs::read(path) {
        Ok(body) => body,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(RawSeries::default()),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    serde_json::from_slice(&body).with_context(|| format!("parsing {}", path.display()))
}

pub fn load(path: &Path) -> Result<Vec<SeriesPoint>> {
    Ok(reshape(&load_raw(path)?))
}

/// Latest point (last in source order) and the mean over all points.
pub fn summarize(points: &[SeriesPoint]) -> Option<SeriesSummary> {
    let latest = points.last()?.clone();
    let sum: f64 = points.iter().map(|p| p.value).sum();
    Some(SeriesSummary {
        count: points.len(),
        latest,
        average: sum / points.len() as f64,
    })
}
