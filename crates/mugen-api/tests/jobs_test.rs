//! Generation job integration tests.
//!
//! Run with: `cargo test -p mugen-api --test jobs_test`

mod helpers;

use axum_test::multipart::MultipartForm;
use helpers::{
    data_field, frames_form, image_form, setup_test_app, setup_test_app_with,
    wait_for_terminal_job, TEST_BASE_URL,
};

#[tokio::test]
async fn test_job_succeeds_once_artifact_appears() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/jobs/image_to_video")
        .multipart(image_form("job1", "cat.png", b"pixels"))
        .await;

    assert_eq!(response.status_code(), 202);
    let job: serde_json::Value = response.json();
    assert_eq!(job["status"], "queued");
    assert_eq!(job["kind"], "image_to_video");
    assert_eq!(job["resolution"], "1280*720");
    assert!(job["inputs"]["image"]
        .as_str()
        .unwrap()
        .ends_with("uploaded_images/job1.png"));

    app.write_artifact("job1", b"video").await;

    let job_id = job["id"].as_str().unwrap();
    let finished = wait_for_terminal_job(app.client(), job_id).await;
    assert_eq!(finished["status"], "succeeded");
    let blob_path = finished["blob_path"].as_str().unwrap();
    assert!(blob_path.starts_with(TEST_BASE_URL));
    assert!(blob_path.contains("generated_videos/job1.mp4"));
}

#[tokio::test]
async fn test_job_fails_when_engine_times_out() {
    let app = setup_test_app_with(|service| service.generation.timeout_secs = 1).await;

    let response = app
        .client()
        .post("/jobs/image_to_video")
        .multipart(image_form("slow", "cat.png", b"pixels"))
        .await;
    assert_eq!(response.status_code(), 202);
    let job: serde_json::Value = response.json();

    let finished = wait_for_terminal_job(app.client(), job["id"].as_str().unwrap()).await;
    assert_eq!(finished["status"], "failed");
    assert!(finished["error"].as_str().is_some());
    assert!(finished.get("blob_path").is_none());
}

#[tokio::test]
async fn test_frames_job_carries_both_inputs_and_prompt() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_text(
            "data",
            r#"{"request_id":"pair","prompt":"a wave","resolution":"832*480"}"#,
        )
        .add_part("first", helpers::image_part("a.png", b"one"))
        .add_part("last", helpers::image_part("b.png", b"two"));

    let response = app
        .client()
        .post("/jobs/first_and_last_frame_to_video")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 202);
    let job: serde_json::Value = response.json();
    assert_eq!(job["kind"], "first_and_last_frame_to_video");
    assert_eq!(job["prompt"], "a wave");
    assert_eq!(job["resolution"], "832*480");
    assert!(job["inputs"]["first"].as_str().unwrap().ends_with("pair_first.png"));
    assert!(job["inputs"]["last"].as_str().unwrap().ends_with("pair_last.png"));
}

#[tokio::test]
async fn test_job_requires_inputs() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/jobs/image_to_video")
        .multipart(MultipartForm::new().add_text("data", data_field("empty")))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_active_request_id_conflicts() {
    let app = setup_test_app().await;

    let first = app
        .client()
        .post("/jobs/image_to_video")
        .multipart(image_form("busy", "cat.png", b"pixels"))
        .await;
    assert_eq!(first.status_code(), 202);

    let second = app
        .client()
        .post("/jobs/image_to_video")
        .multipart(image_form("busy", "dog.png", b"other pixels"))
        .await;
    assert_eq!(second.status_code(), 409);

    let legacy = app
        .client()
        .post("/process/v1/first_and_last_frame_to_video")
        .multipart(frames_form("busy", b"1", b"2"))
        .await;
    assert_eq!(legacy.status_code(), 409);

    // The running job's input was not overwritten.
    let staged = tokio::fs::read(app.uploads_dir().join("busy.png"))
        .await
        .unwrap();
    assert_eq!(staged, b"pixels");
    assert!(!app.uploads_dir().join("busy_first.png").exists());
}

#[tokio::test]
async fn test_request_id_is_free_after_job_finishes() {
    let app = setup_test_app().await;
    app.write_artifact("again", b"video").await;

    let first: serde_json::Value = app
        .client()
        .post("/jobs/image_to_video")
        .multipart(image_form("again", "cat.png", b"pixels"))
        .await
        .json();
    wait_for_terminal_job(app.client(), first["id"].as_str().unwrap()).await;

    let second = app
        .client()
        .post("/jobs/image_to_video")
        .multipart(image_form("again", "cat.png", b"pixels"))
        .await;
    assert_eq!(second.status_code(), 202);
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/jobs/00000000-0000-4000-8000-000000000000")
        .await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_list_jobs_filters_by_request_id() {
    let app = setup_test_app().await;

    for request_id in ["list-a", "list-b"] {
        let response = app
            .client()
            .post("/jobs/image_to_video")
            .multipart(image_form(request_id, "cat.png", b"pixels"))
            .await;
        assert_eq!(response.status_code(), 202);
    }

    let all: serde_json::Value = app.client().get("/jobs").await.json();
    assert_eq!(all["count"], 2);

    let filtered: serde_json::Value = app
        .client()
        .get("/jobs")
        .add_query_param("request_id", "list-b")
        .await
        .json();
    assert_eq!(filtered["count"], 1);
    assert_eq!(filtered["jobs"][0]["request_id"], "list-b");
}
