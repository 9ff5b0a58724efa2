use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::task;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{ServeArgs, ServerConfig};
use crate::core::{catalog, series, DateIndex, Resolution};

#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
}

#[derive(serde::Deserialize)]
struct DownloadQuery {
    date: Option<String>,
}

type HandlerError = (StatusCode, String);

pub fn run(args: ServeArgs) -> Result<()> {
    let config = ServerConfig::from_args(&args)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.tokio_workers.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: ServerConfig) -> Result<()> {
    config.log_layout();
    let addr = config.bind_addr();
    let app = build_router(config);

    info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the full application: JSON endpoints, raw file passthroughs and,
/// when configured, the dashboard's static assets.
pub fn build_router(config: ServerConfig) -> Router {
    let image_prefix = config.image_url_prefix.clone();
    let plots_prefix = config.plots_url_prefix.clone();
    let image_files = ServeDir::new(&config.image_dir);
    let plot_files = ServeDir::new(&config.ndvi_data_dir);
    let static_dir = config.static_dir.clone();
    let timeseries_enabled = config.timeseries_enabled;

    let mut api = Router::new()
        .route("/healthz", get(healthz))
        .route("/gallery", get(gallery))
        .route("/latest", get(latest))
        .route("/download", get(download));
    if timeseries_enabled {
        api = api
            .route("/timeseries", get(timeseries))
            .route("/timeseries/summary", get(timeseries_summary));
    }

    let mut app = api
        .with_state(AppState {
            config: Arc::new(config),
        })
        .nest_service(&image_prefix, image_files)
        .nest_service(&plots_prefix, plot_files);
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn gallery(State(state): State<AppState>) -> Json<Vec<String>> {
    let config = &state.config;
    let start = Instant::now();
    match catalog::scan(&config.image_dir, &config.image_url_prefix) {
        Ok(entries) => {
            info!(
                "gallery images={} dir={} ms={}",
                entries.len(),
                config.image_dir.display(),
                start.elapsed().as_millis()
            );
            Json(entries.into_iter().map(|e| e.path).collect())
        }
        Err(err) => {
            error!(
                "gallery scan failed dir={} err={:#}",
                config.image_dir.display(),
                err
            );
            Json(Vec::new())
        }
    }
}

async fn latest(State(state): State<AppState>) -> Response {
    let config = &state.config;
    match catalog::latest(&config.image_dir, &config.image_url_prefix) {
        Ok(Some(entry)) => Json(entry).into_response(),
        Ok(None) => Json(json!({})).into_response(),
        Err(err) => {
            error!(
                "latest scan failed dir={} err={:#}",
                config.image_dir.display(),
                err
            );
            Json(json!({})).into_response()
        }
    }
}

async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, HandlerError> {
    let config = &state.config;
    let date = query
        .date
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "missing required query parameter 'date'".to_string(),
            )
        })?;

    if !config.date_index_path.exists() || !config.path_index_path.exists() {
        warn!(
            "download date={} index not available date_index={} path_index={}",
            date,
            config.date_index_path.display(),
            config.path_index_path.display()
        );
        return Err((
            StatusCode::NOT_FOUND,
            format!("no data available for date {}", date),
        ));
    }

    let index = DateIndex::load(&config.date_index_path, &config.path_index_path).map_err(|err| {
        error!("download date={} index load failed err={:#}", date, err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to read date index".to_string(),
        )
    })?;

    let path = match index.resolve(&date, &config.csv_list_dir) {
        Resolution::Found(path) => path,
        Resolution::DateNotFound => {
            info!("download date={} not found", date);
            return Err((
                StatusCode::NOT_FOUND,
                format!("no data available for date {}", date),
            ));
        }
        Resolution::FileMissing(path) => {
            warn!("download date={} file missing path={}", date, path.display());
            return Err((
                StatusCode::NOT_FOUND,
                format!("file for date {} is no longer available", date),
            ));
        }
    };

    let read_path = path.clone();
    let bytes = task::spawn_blocking(move || fs::read(&read_path))
        .await
        .map_err(|err| {
            error!("download date={} read task failed err={}", date, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read file".to_string(),
            )
        })?
        .map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                warn!("download date={} file vanished path={}", date, path.display());
                (
                    StatusCode::NOT_FOUND,
                    format!("file for date {} is no longer available", date),
                )
            } else {
                error!("download date={} read failed path={} err={}", date, path.display(), err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to read file".to_string(),
                )
            }
        })?;
    info!(
        "download date={} path={} bytes={}",
        date,
        path.display(),
        bytes.len()
    );
    Ok(attachment_response(&path, bytes))
}

async fn timeseries(State(state): State<AppState>) -> Json<Vec<series::SeriesPoint>> {
    Json(load_series(&state.config))
}

async fn timeseries_summary(State(state): State<AppState>) -> Response {
    match series::summarize(&load_series(&state.config)) {
        Some(summary) => Json(summary).into_response(),
        None => Json(json!({})).into_response(),
    }
}

fn load_series(config: &ServerConfig) -> Vec<series::SeriesPoint> {
    let path = config.series_path();
    match series::load(&path) {
        Ok(points) => points,
        Err(err) => {
            error!("series load failed path={} err={:#}", path.display(), err);
            Vec::new()
        }
    }
}

fn attachment_response(path: &Path, bytes: Vec<u8>) -> Response {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let mut resp = Response::new(bytes.into());
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type(path)));
    resp.headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);
    resp
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
