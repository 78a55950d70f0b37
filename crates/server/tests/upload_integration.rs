//! Upload API integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestFixture;

#[tokio::test]
async fn test_init_session_returns_token() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 4}))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["total_chunks"], 4);
    assert!(resp.body["session_id"].as_str().is_some());
    assert!(resp.body["expires_at"].as_str().is_some());
}

#[tokio::test]
async fn test_init_session_rejects_zero_chunks() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 0}))
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body["error"]
        .as_str()
        .unwrap()
        .contains("total_chunks"));
}

#[tokio::test]
async fn test_out_of_order_chunks_assemble_in_index_order() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 3}))
        .await;
    let session_id = created.body["session_id"].as_str().unwrap().to_string();

    // Send 2, then 0, then 1
    let r2 = fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/2", session_id), b"cc")
        .await;
    assert_eq!(r2.status, StatusCode::OK);
    assert_eq!(r2.body["status"], "accepted");
    assert_eq!(r2.body["received"], 1);

    let r0 = fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/0", session_id), b"aa")
        .await;
    assert_eq!(r0.body["status"], "accepted");

    let r1 = fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/1", session_id), b"bb")
        .await;
    assert_eq!(r1.body["status"], "complete");
    assert_eq!(r1.body["received"], 3);

    let completed = fixture
        .post_empty(&format!("/api/v1/uploads/{}/complete", session_id))
        .await;
    assert_eq!(completed.status, StatusCode::CREATED);
    assert_eq!(completed.body["size_bytes"], 6);

    // The materialized artifact is chunk0 + chunk1 + chunk2
    let artifact_id = completed.body["artifact_id"].as_str().unwrap();
    let artifact = fixture.uploads.artifact(artifact_id).unwrap().unwrap();
    let bytes = std::fs::read(&artifact.path).unwrap();
    assert_eq!(bytes, b"aabbcc");
}

#[tokio::test]
async fn test_duplicate_chunk_resend_is_noop() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 2}))
        .await;
    let session_id = created.body["session_id"].as_str().unwrap().to_string();

    fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/0", session_id), b"xx")
        .await;

    // Resend the same index with different bytes
    let dup = fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/0", session_id), b"zz")
        .await;
    assert_eq!(dup.status, StatusCode::OK);
    assert_eq!(dup.body["status"], "duplicate");
    assert_eq!(dup.body["received"], 1);

    fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/1", session_id), b"yy")
        .await;
    let completed = fixture
        .post_empty(&format!("/api/v1/uploads/{}/complete", session_id))
        .await;

    // The original bytes won
    let artifact_id = completed.body["artifact_id"].as_str().unwrap();
    let artifact = fixture.uploads.artifact(artifact_id).unwrap().unwrap();
    assert_eq!(std::fs::read(&artifact.path).unwrap(), b"xxyy");
}

#[tokio::test]
async fn test_chunk_index_out_of_range() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 2}))
        .await;
    let session_id = created.body["session_id"].as_str().unwrap().to_string();

    let resp = fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/2", session_id), b"xx")
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_session_id_format() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .put_bytes("/api/v1/uploads/not-a-uuid/chunks/0", b"xx")
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let fixture = TestFixture::new().await;
    let ghost = uuid::Uuid::new_v4();

    let resp = fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/0", ghost), b"xx")
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = fixture.get(&format!("/api/v1/uploads/{}", ghost)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_progress_endpoint() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 3}))
        .await;
    let session_id = created.body["session_id"].as_str().unwrap().to_string();

    fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/1", session_id), b"bb")
        .await;

    let progress = fixture.get(&format!("/api/v1/uploads/{}", session_id)).await;
    assert_eq!(progress.status, StatusCode::OK);
    assert_eq!(progress.body["received"], 1);
    assert_eq!(progress.body["total_chunks"], 3);
}

#[tokio::test]
async fn test_complete_incomplete_session_is_404() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 3}))
        .await;
    let session_id = created.body["session_id"].as_str().unwrap().to_string();

    fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/0", session_id), b"aa")
        .await;

    let resp = fixture
        .post_empty(&format!("/api/v1/uploads/{}/complete", session_id))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(resp.body["error"].as_str().unwrap().contains("incomplete"));

    // The session survived the failed completion
    let progress = fixture.get(&format!("/api/v1/uploads/{}", session_id)).await;
    assert_eq!(progress.status, StatusCode::OK);
}

#[tokio::test]
async fn test_second_completion_is_404() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 1}))
        .await;
    let session_id = created.body["session_id"].as_str().unwrap().to_string();
    fixture
        .put_bytes(&format!("/api/v1/uploads/{}/chunks/0", session_id), b"data")
        .await;

    let first = fixture
        .post_empty(&format!("/api/v1/uploads/{}/complete", session_id))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = fixture
        .post_empty(&format!("/api/v1/uploads/{}/complete", session_id))
        .await;
    assert_eq!(second.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let fixture = TestFixture::new().await;

    let created = fixture
        .post_json("/api/v1/uploads", json!({"total_chunks": 2}))
        .await;
    let session_id = created.body["session_id"].as_str().unwrap().to_string();

    let first = fixture.delete(&format!("/api/v1/uploads/{}", session_id)).await;
    assert_eq!(first.status, StatusCode::NO_CONTENT);

    let again = fixture.delete(&format!("/api/v1/uploads/{}", session_id)).await;
    assert_eq!(again.status, StatusCode::NO_CONTENT);

    let progress = fixture.get(&format!("/api/v1/uploads/{}", session_id)).await;
    assert_eq!(progress.status, StatusCode::NOT_FOUND);
}
