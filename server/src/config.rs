use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Directory the camera job drops captures into
    #[arg(long, env = "PHENOCAM_IMAGE_DIR", default_value = "Phenocamdata")]
    pub image_dir: PathBuf,
    /// Base directory for relative paths in the path index
    #[arg(long, env = "PHENOCAM_CSV_LIST_DIR", default_value = "csv_list")]
    pub csv_list_dir: PathBuf,
    /// Directory holding the NDVI plot files
    #[arg(long, env = "PHENOCAM_NDVI_DATA_DIR", default_value = "Plots")]
    pub ndvi_data_dir: PathBuf,
    /// JSON array of {"date": ...} rows
    #[arg(long, env = "PHENOCAM_DATE_INDEX", default_value = "csv_list/dates.json")]
    pub date_index_path: PathBuf,
    /// JSON array of {"file_path": ...} rows, row-aligned with the date index
    #[arg(long, env = "PHENOCAM_PATH_INDEX", default_value = "csv_list/paths.json")]
    pub path_index_path: PathBuf,
    /// Raw series file name inside the NDVI data directory
    #[arg(long, default_value = "ndvi_plot.json")]
    pub series_file: String,
    #[arg(long, default_value = "/Phenocamdata")]
    pub image_url_prefix: String,
    #[arg(long, default_value = "/Plots")]
    pub plots_url_prefix: String,
    /// Dashboard assets served at the root
    #[arg(long, env = "PHENOCAM_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, env = "PHENOCAM_PORT", default_value_t = 5001)]
    pub port: u16,
    /// Run without the /timeseries endpoints
    #[arg(long, default_value_t = false)]
    pub disable_timeseries: bool,
    #[arg(long, default_value_t = 4)]
    pub tokio_workers: usize,
}

/// Immutable server configuration, fixed at startup.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub image_dir: PathBuf,
    pub csv_list_dir: PathBuf,
    pub ndvi_data_dir: PathBuf,
    pub date_index_path: PathBuf,
    pub path_index_path: PathBuf,
    pub series_file: String,
    pub image_url_prefix: String,
    pub plots_url_prefix: String,
    pub static_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub timeseries_enabled: bool,
}

impl ServerConfig {
    pub fn from_args(args: &ServeArgs) -> Result<Self> {
        if args.port == 0 {
            return Err(anyhow!("port must be non-zero"));
        }
        let config = Self {
            image_dir: args.image_dir.clone(),
            csv_list_dir: args.csv_list_dir.clone(),
            ndvi_data_dir: args.ndvi_data_dir.clone(),
            date_index_path: args.date_index_path.clone(),
            path_index_path: args.path_index_path.clone(),
            series_file: args.series_file.clone(),
            image_url_prefix: normalize_prefix(&args.image_url_prefix)?,
            plots_url_prefix: normalize_prefix(&args.plots_url_prefix)?,
            static_dir: args.static_dir.clone(),
            host: args.host.clone(),
            port: args.port,
            timeseries_enabled: !args.disable_timeseries,
        };
        Ok(config)
    }

    /// Config rooted at `root` with the default layout, used by tests and tools.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            image_dir: root.join("Phenocamdata"),
            csv_list_dir: root.join("csv_list"),
            ndvi_data_dir: root.join("Plots"),
            date_index_path: root.join("csv_list").join("dates.json"),
            path_index_path: root.join("csv_list").join("paths.json"),
            series_file: "ndvi_plot.json".to_string(),
            image_url_prefix: "/Phenocamdata".to_string(),
            plots_url_prefix: "/Plots".to_string(),
            static_dir: None,
            host: "127.0.0.1".to_string(),
            port: 5001,
            timeseries_enabled: true,
        }
    }

    pub fn series_path(&self) -> PathBuf {
        self.ndvi_data_dir.join(&self.series_file)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Logs the configured roots. Missing ones are expected before the first
    /// ingestion run, so they only warn.
    pub fn log_layout(&self) {
        for (name, path) in [
            ("image_dir", &self.image_dir),
            ("csv_list_dir", &self.csv_list_dir),
            ("ndvi_data_dir", &self.ndvi_data_dir),
            ("date_index", &self.date_index_path),
            ("path_index", &self.path_index_path),
        ] {
            if path.exists() {
                info!("{}={}", name, path.display());
            } else {
                warn!("{}={} (missing)", name, path.display());
            }
        }
        if let Some(dir) = &self.static_dir {
            info!("static_dir={}", dir.display());
        }
        info!(
            "image_url_prefix={} plots_url_prefix={} timeseries_enabled={}",
            self.image_url_prefix, self.plots_url_prefix, self.timeseries_enabled
        );
    }
}

fn normalize_prefix(raw: &str) -> Result<String> {
    if !raw.starts_with('/') {
        return Err(anyhow!("url prefix must start with '/': {}", raw));
    }
    let trimmed = raw.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(anyhow!("url prefix must not be '/'"));
    }
    Ok(trimmed.to_string())
}
