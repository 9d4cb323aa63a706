//! Test helpers: build AppState and router over temporary directories.
//!
//! Run from workspace root: `cargo test -p mugen-api`.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use mugen_api::setup::{routes, services};
use mugen_api::AppState;
use mugen_core::{Config, ServiceConfig};
use mugen_storage::{BlobStore, LocalBlobStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_CONTAINER: &str = "mugenverse";
pub const TEST_BASE_URL: &str = "https://acct.blob.core.windows.net";
pub const TEST_SAS_TOKEN: &str = "sv=2024-01-01&sig=test";

/// Test application: server, state and the temporary tree it writes into.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub blob_store: Arc<dyn BlobStore>,
    pub _temp_dir: TempDir,
    root: PathBuf,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploaded_images")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("generated_videos")
    }

    pub fn video_path(&self, request_id: &str) -> String {
        format!("{}/{}.mp4", self.videos_dir().to_string_lossy(), request_id)
    }

    /// Drop a finished artifact where the engine would have written it.
    pub async fn write_artifact(&self, request_id: &str, bytes: &[u8]) {
        tokio::fs::write(self.video_path(request_id), bytes)
            .await
            .expect("Failed to write artifact");
    }
}

/// Config rooted at `root`, with fast polling so job tests stay quick.
pub fn test_config(root: &Path) -> ServiceConfig {
    let mut service = ServiceConfig::default();
    service.intake.uploads_dir = root.join("uploaded_images").to_string_lossy().to_string();
    service.intake.videos_dir = root.join("generated_videos").to_string_lossy().to_string();
    service.intake.max_upload_size_bytes = 1024 * 1024;
    service.blob.local_path = root.join("blob_store").to_string_lossy().to_string();
    service.blob.base_url = Some(TEST_BASE_URL.to_string());
    service.blob.sas_token = Some(TEST_SAS_TOKEN.to_string());
    service.generation.poll_interval_ms = 20;
    service.generation.timeout_secs = 10;
    service
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Setup a test app, letting the caller adjust the config first.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut ServiceConfig)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let root = temp_dir.path().to_path_buf();

    let mut service = test_config(&root);
    customize(&mut service);
    let config = Config::new(service);

    let local = LocalBlobStore::new(config.local_blob_path())
        .await
        .expect("Failed to create local blob store");
    local
        .create_container(TEST_CONTAINER)
        .await
        .expect("Failed to create container");
    let blob_store: Arc<dyn BlobStore> = Arc::new(local);

    let state = services::initialize_services(&config, Some(blob_store.clone()))
        .await
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        blob_store,
        _temp_dir: temp_dir,
        root,
    }
}

pub fn data_field(request_id: &str) -> String {
    serde_json::json!({ "request_id": request_id }).to_string()
}

pub fn image_part(file_name: &str, bytes: &[u8]) -> Part {
    Part::bytes(bytes::Bytes::copy_from_slice(bytes))
        .file_name(file_name)
        .mime_type("image/png")
}

pub fn image_form(request_id: &str, file_name: &str, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new()
        .add_text("data", data_field(request_id))
        .add_part("image", image_part(file_name, bytes))
}

pub fn frames_form(request_id: &str, first: &[u8], last: &[u8]) -> MultipartForm {
    MultipartForm::new()
        .add_text("data", data_field(request_id))
        .add_part("first", image_part("first.png", first))
        .add_part("last", image_part("last.png", last))
}

/// Poll `GET /jobs/{id}` until the job reaches a terminal state.
pub async fn wait_for_terminal_job(client: &TestServer, job_id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let job: serde_json::Value = client.get(&format!("/jobs/{}", job_id)).await.json();
        if matches!(job["status"].as_str(), Some("succeeded") | Some("failed")) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Job {} did not finish in time", job_id);
}
