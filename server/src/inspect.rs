//! Offline commands that run the catalog, resolver and reshaper against a
//! data directory without starting the server.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::info;

use crate::core::{catalog, series, DateIndex, Resolution};

#[derive(Args, Debug)]
pub struct GalleryArgs {
    #[arg(long, default_value = "Phenocamdata")]
    image_dir: PathBuf,
    #[arg(long, default_value = "/Phenocamdata")]
    prefix: String,
    /// Print at most this many entries
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[arg(long)]
    date_index: PathBuf,
    #[arg(long)]
    path_index: PathBuf,
    /// Base directory for relative file paths
    #[arg(long, default_value = ".")]
    csv_list_dir: PathBuf,
    #[arg(long)]
    date: String,
}

#[derive(Args, Debug)]
pub struct SeriesArgs {
    /// Raw {"x": [...], "y": [...]} series file
    #[arg(long)]
    file: PathBuf,
    /// Print the summary instead of the points
    #[arg(long, default_value_t = false)]
    summary: bool,
}

pub fn gallery(args: GalleryArgs) -> Result<()> {
    let entries = catalog::scan(&args.image_dir, &args.prefix)?;
    info!("gallery dir={} images={}", args.image_dir.display(), entries.len());
    let limit = args.limit.unwrap_or(entries.len());
    for entry in entries.iter().take(limit) {
        match entry.captured_at() {
            Some(at) => println!("{}\t{}", entry.path, at),
            None => println!("{}", entry.path),
        }
    }
    Ok(())
}

pub fn resolve(args: ResolveArgs) -> Result<()> {
    let index = DateIndex::load(&args.date_index, &args.path_index)?;
    info!(
        "date index rows dates={} paths={} consistent={}",
        index.dates.len(),
        index.paths.len(),
        index.is_consistent()
    );
    match index.resolve(&args.date, &args.csv_list_dir) {
        Resolution::Found(path) => {
            println!("{}", path.display());
            Ok(())
        }
        Resolution::DateNotFound => Err(anyhow!("date {} not in index", args.date)),
        Resolution::FileMissing(path) => Err(anyhow!(
            "date {} resolves to missing file {}",
            args.date,
            path.display()
        )),
    }
}

pub fn series(args: SeriesArgs) -> Result<()> {
    let points = series::load(&args.file)?;
    let out = if args.summary {
        match series::summarize(&points) {
            Some(summary) => serde_json::to_string_pretty(&summary)?,
            None => "{}".to_string(),
        }
    } else {
        serde_json::to_string_pretty(&points)?
    };
    println!("{}", out);
    Ok(())
}
