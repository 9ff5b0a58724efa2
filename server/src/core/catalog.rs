use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Extensions accepted into the catalog, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// One discoverable image in the capture directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Public URL, `{url_prefix}/{filename}`.
    pub path: String,
    pub filename: String,
}

impl CatalogEntry {
    pub fn captured_at(&self) -> Option<CaptureTime> {
        capture_time(&self.filename)
    }
}

/// Capture date and time embedded in a filename.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CaptureTime {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`, zero where the filename stops at the date.
    pub time: String,
}

impl std::fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

/// Ordering key used to sort captures.
///
/// Capture files are named with a fixed-width, zero-padded timestamp
/// (`APU_2024_01_20_13_05_00.jpg`), so the filename itself orders
/// chronologically. Callers must go through this function so a parsed
/// timestamp can replace it later.
pub fn ordering_key(filename: &str) -> &str {
    filename
}

/// Reads the timestamp out of names like `APU_01_2024_01_15_12_30_00.jpg`.
///
/// The first underscore-separated run of `YYYY`, `MM`, `DD` tokens is the
/// date; up to three following two-digit tokens are the time.
pub fn capture_time(filename: &str) -> Option<CaptureTime> {
    let stem = match image_extension(filename) {
        Some(ext) => &filename[..filename.len() - ext.len() - 1],
        None => filename,
    };
    let parts: Vec<&str> = stem.split('_').collect();
    let is_num = |s: &str, width: usize| s.len() == width && s.bytes().all(|b| b.is_ascii_digit());

    let start = parts.windows(3).position(|w| {
        is_num(w[0], 4) && is_num(w[1], 2) && is_num(w[2], 2)
    })?;
    let date = format!("{}-{}-{}", parts[start], parts[start + 1], parts[start + 2]);
    let mut clock = ["00"; 3];
    for (slot, part) in clock.iter_mut().zip(parts[start + 3..].iter().copied()) {
        if !is_num(part, 2) {
            break;
        }
        *slot = part;
    }
    Some(CaptureTime {
        date,
        time: clock.join(":"),
    })
}

/// Returns the recognised extension of `filename`, lowercased match, if any.
pub fn image_extension(filename: &str) -> Option<&str> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
        .then_some(ext)
}

/// Lists `dir` (non-recursive) and returns its images newest first.
///
/// A missing directory is an empty catalog, not an error: the ingestion job
/// may not have created it yet.
pub fn scan(dir: &Path, url_prefix: &str) -> Result<Vec<CatalogEntry>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("reading {}", dir.display())),
    };

    let prefix = url_prefix.trim_end_matches('/');
    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.with_context(|| format!("reading entry in {}", dir.display()))?;
        // Follows symlinks, so a link to a directory is skipped too.
        if entry.path().is_dir() {
            continue;
        }
        let Ok(filename) = entry.file_name().into_string() else {
            continue;
        };
        if image_extension(&filename).is_none() {
            continue;
        }
        entries.push(CatalogEntry {
            path: format!("{}/{}", prefix, filename),
            filename,
        });
    }

    entries.sort_by(|a, b| ordering_key(&b.filename).cmp(ordering_key(&a.filename)));
    Ok(entries)
}

/// Newest image in `dir`, or `None` when the catalog is empty.
pub fn latest(dir: &Path, url_prefix: &str) -> Result<Option<CatalogEntry>> {
    Ok(scan(dir, url_prefix)?.into_iter().next())
}
