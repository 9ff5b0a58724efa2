use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::Result;
use phenocam_server::{build_router, ServerConfig};
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestServer {
    root: TempDir,
    base_url: String,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn root(&self) -> &Path {
        self.root.path()
    }
}

async fn start_test_server(configure: impl FnOnce(&mut ServerConfig)) -> Result<TestServer> {
    let root = tempfile::tempdir()?;
    let mut config = ServerConfig::rooted_at(root.path());
    configure(&mut config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let app = build_router(config);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        root,
        base_url: format!("http://{}", addr),
    })
}

fn write(path: &Path, body: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

async fn get_json(url: &str) -> Result<(u16, Value)> {
    let resp = reqwest::get(url).await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok((status, serde_json::from_str(&body)?))
}

#[tokio::test]
async fn test_healthz() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let resp = reqwest::get(server.url("/healthz")).await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await?, "ok");
    Ok(())
}

#[tokio::test]
async fn test_gallery_and_latest_newest_first() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let images = server.root().join("Phenocamdata");
    write(&images.join("APU_2024_01_10.jpg"), b"jpg-10");
    write(&images.join("APU_2024_01_20.jpg"), b"jpg-20");
    write(&images.join("APU_2024_01_05.png"), b"png-05");
    write(&images.join("readme.txt"), b"skip");

    let (status, gallery) = get_json(&server.url("/gallery")).await?;
    assert_eq!(status, 200);
    assert_eq!(
        gallery,
        json!([
            "/Phenocamdata/APU_2024_01_20.jpg",
            "/Phenocamdata/APU_2024_01_10.jpg",
            "/Phenocamdata/APU_2024_01_05.png"
        ])
    );

    let (status, latest) = get_json(&server.url("/latest")).await?;
    assert_eq!(status, 200);
    assert_eq!(
        latest,
        json!({"path": "/Phenocamdata/APU_2024_01_20.jpg", "filename": "APU_2024_01_20.jpg"})
    );

    // The public path serves the image bytes.
    let resp = reqwest::get(server.url("/Phenocamdata/APU_2024_01_20.jpg")).await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await?.as_ref(), b"jpg-20");
    Ok(())
}

#[tokio::test]
async fn test_gallery_reflects_new_files_without_restart() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let images = server.root().join("Phenocamdata");
    write(&images.join("APU_2024_01_10.jpg"), b"a");

    let (_, latest) = get_json(&server.url("/latest")).await?;
    assert_eq!(latest["filename"], "APU_2024_01_10.jpg");

    write(&images.join("APU_2024_01_11.jpg"), b"b");
    let (_, latest) = get_json(&server.url("/latest")).await?;
    assert_eq!(latest["filename"], "APU_2024_01_11.jpg");
    Ok(())
}

#[tokio::test]
async fn test_missing_image_dir_is_empty() -> Result<()> {
    let server = start_test_server(|_| {}).await?;

    let (status, gallery) = get_json(&server.url("/gallery")).await?;
    assert_eq!(status, 200);
    assert_eq!(gallery, json!([]));

    let (status, latest) = get_json(&server.url("/latest")).await?;
    assert_eq!(status, 200);
    assert_eq!(latest, json!({}));
    Ok(())
}

#[tokio::test]
async fn test_download_by_date() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let data_file = server.root().join("data").join("a.csv");
    write(&data_file, b"date,ndvi\n2026-01-21,0.44\n");
    write(
        &server.root().join("csv_list").join("dates.json"),
        json!([{"date": "2026-01-21"}]).to_string(),
    );
    write(
        &server.root().join("csv_list").join("paths.json"),
        json!([{"file_path": data_file.to_str().unwrap()}]).to_string(),
    );

    let resp = reqwest::get(server.url("/download?date=2026-01-21")).await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "text/csv");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"a.csv\""
    );
    assert_eq!(resp.bytes().await?.as_ref(), b"date,ndvi\n2026-01-21,0.44\n");

    let resp = reqwest::get(server.url("/download?date=1999-01-01")).await?;
    assert_eq!(resp.status(), 404);
    Ok(())
}

#[tokio::test]
async fn test_download_relative_path_and_missing_file() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let csv_list = server.root().join("csv_list");
    write(&csv_list.join("2026_01_21.csv"), b"x");
    write(
        &csv_list.join("dates.json"),
        json!([{"date": "2026-01-21"}, {"date": "2026-01-22"}]).to_string(),
    );
    write(
        &csv_list.join("paths.json"),
        json!([{"file_path": "2026_01_21.csv"}, {"file_path": "2026_01_22.csv"}]).to_string(),
    );

    let resp = reqwest::get(server.url("/download?date=2026-01-21")).await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await?.as_ref(), b"x");

    let resp = reqwest::get(server.url("/download?date=2026-01-22")).await?;
    assert_eq!(resp.status(), 404);
    assert!(resp.text().await?.contains("no longer available"));
    Ok(())
}

#[tokio::test]
async fn test_download_requires_date() -> Result<()> {
    let server = start_test_server(|_| {}).await?;

    let resp = reqwest::get(server.url("/download")).await?;
    assert_eq!(resp.status(), 400);
    assert!(resp.text().await?.contains("date"));

    let resp = reqwest::get(server.url("/download?date=")).await?;
    assert_eq!(resp.status(), 400);
    Ok(())
}

#[tokio::test]
async fn test_download_without_index_is_not_found() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let resp = reqwest::get(server.url("/download?date=2026-01-21")).await?;
    assert_eq!(resp.status(), 404);
    Ok(())
}

#[tokio::test]
async fn test_download_length_mismatch_never_misbinds() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let csv_list = server.root().join("csv_list");
    write(&csv_list.join("a.csv"), b"a");
    write(
        &csv_list.join("dates.json"),
        json!([{"date": "2026-01-20"}, {"date": "2026-01-21"}]).to_string(),
    );
    write(&csv_list.join("paths.json"), json!([{"file_path": "a.csv"}]).to_string());

    let resp = reqwest::get(server.url("/download?date=2026-01-20")).await?;
    assert_eq!(resp.status(), 200);
    let resp = reqwest::get(server.url("/download?date=2026-01-21")).await?;
    assert_eq!(resp.status(), 404);
    Ok(())
}

#[tokio::test]
async fn test_timeseries_reshaped() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let raw = json!({"x": ["2024_01_15", "2024_01_16"], "y": [0.42, 0.45]});
    write(&server.root().join("Plots").join("ndvi_plot.json"), raw.to_string());

    let (status, series) = get_json(&server.url("/timeseries")).await?;
    assert_eq!(status, 200);
    assert_eq!(
        series,
        json!([
            {"date": "2024-01-15", "ndvi": 0.42},
            {"date": "2024-01-16", "ndvi": 0.45}
        ])
    );

    let (_, summary) = get_json(&server.url("/timeseries/summary")).await?;
    assert_eq!(summary["count"], 2);
    assert_eq!(summary["latest"], json!({"date": "2024-01-16", "ndvi": 0.45}));

    // Raw passthrough is untouched.
    let (status, passthrough) = get_json(&server.url("/Plots/ndvi_plot.json")).await?;
    assert_eq!(status, 200);
    assert_eq!(passthrough, raw);
    Ok(())
}

#[tokio::test]
async fn test_timeseries_missing_partial_or_corrupt_is_empty() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let source = server.root().join("Plots").join("ndvi_plot.json");

    let (status, series) = get_json(&server.url("/timeseries")).await?;
    assert_eq!(status, 200);
    assert_eq!(series, json!([]));
    let (_, summary) = get_json(&server.url("/timeseries/summary")).await?;
    assert_eq!(summary, json!({}));

    write(&source, json!({"x": ["2024_01_15"]}).to_string());
    let (_, series) = get_json(&server.url("/timeseries")).await?;
    assert_eq!(series, json!([]));

    write(&source, json!({"x": ["2024_01_15", "2024_01_16"], "y": [0.4]}).to_string());
    let (_, series) = get_json(&server.url("/timeseries")).await?;
    assert_eq!(series, json!([]));

    write(&source, b"{\"x\": [\"2024_01_15\"");
    let (status, series) = get_json(&server.url("/timeseries")).await?;
    assert_eq!(status, 200);
    assert_eq!(series, json!([]));
    Ok(())
}

#[tokio::test]
async fn test_timeseries_skips_null_readings() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    write(
        &server.root().join("Plots").join("ndvi_plot.json"),
        r#"{"x":["2024_01_15","2024_01_16","2024_01_17"],"y":[0.42,null,0.45]}"#,
    );

    let (status, series) = get_json(&server.url("/timeseries")).await?;
    assert_eq!(status, 200);
    assert_eq!(
        series,
        json!([
            {"date": "2024-01-15", "ndvi": 0.42},
            {"date": "2024-01-17", "ndvi": 0.45}
        ])
    );

    let (_, summary) = get_json(&server.url("/timeseries/summary")).await?;
    assert_eq!(summary["count"], 2);
    assert_eq!(summary["latest"]["date"], "2024-01-17");
    Ok(())
}

#[tokio::test]
async fn test_download_large_file_intact() -> Result<()> {
    let server = start_test_server(|_| {}).await?;
    let csv_list = server.root().join("csv_list");
    let body: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    write(&csv_list.join("big.bin"), &body);
    write(&csv_list.join("dates.json"), json!([{"date": "2026-01-21"}]).to_string());
    write(&csv_list.join("paths.json"), json!([{"file_path": "big.bin"}]).to_string());

    let resp = reqwest::get(server.url("/download?date=2026-01-21")).await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/octet-stream");
    assert_eq!(resp.bytes().await?.as_ref(), body.as_slice());
    Ok(())
}

#[tokio::test]
async fn test_timeseries_can_be_disabled() -> Result<()> {
    let server = start_test_server(|config| config.timeseries_enabled = false).await?;
    let resp = reqwest::get(server.url("/timeseries")).await?;
    assert_eq!(resp.status(), 404);

    let (status, _) = get_json(&server.url("/gallery")).await?;
    assert_eq!(status, 200);
    Ok(())
}

#[tokio::test]
async fn test_static_dashboard_fallback() -> Result<()> {
    let server = start_test_server(|config| {
        config.static_dir = Some(config.image_dir.parent().unwrap().join("Frontend"));
    })
    .await?;
    write(
        &server.root().join("Frontend").join("index.html"),
        b"<html>dashboard</html>",
    );

    let resp = reqwest::get(server.url("/")).await?;
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await?.contains("dashboard"));
    Ok(())
}
