#![allow(clippy::unwrap_used)]
// Integration tests for `HttpFileTransfer` using wiremock.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{basic_auth, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jujulink_api::Error;
use jujulink_api::http::{FileTransfer, HttpFileTransfer, HttpRequest, ProgressFn, charm_api_path};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HttpFileTransfer) {
    let server = MockServer::start().await;
    let transfer =
        HttpFileTransfer::with_client(Url::parse(&server.uri()).unwrap(), reqwest::Client::new());
    (server, transfer)
}

fn request(path: &str) -> HttpRequest {
    HttpRequest::new(path, "user-admin", SecretString::from("s3cret"))
}

fn recording_progress() -> (ProgressFn, Arc<Mutex<Vec<(u64, Option<u64>)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress: ProgressFn = Arc::new(move |done, total| {
        sink.lock().unwrap().push((done, total));
    });
    (progress, seen)
}

// ── Upload ──────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_posts_archive_with_basic_auth() {
    let (server, transfer) = setup().await;

    Mock::given(method("POST"))
        .and(path("/model/uuid-1/charms"))
        .and(query_param("series", "trusty"))
        .and(basic_auth("user-admin", "s3cret"))
        .and(header("content-type", "application/zip"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"charm-url": "local:trusty/django-1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let archive = Bytes::from(vec![7_u8; 150 * 1024]);
    let (progress, seen) = recording_progress();
    let reply = transfer
        .send_post_request(
            request(&charm_api_path("uuid-1", &[("series", "trusty")]))
                .with_header("Content-Type", "application/zip"),
            archive.clone(),
            Some(progress),
        )
        .await
        .unwrap();

    assert_eq!(reply.status, 200);
    assert_eq!(reply.json().unwrap()["charm-url"], "local:trusty/django-1");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].body, archive.to_vec());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen.last(), Some(&(150 * 1024, Some(150 * 1024))));
}

#[tokio::test]
async fn upload_rejection_is_http_status_error() {
    let (server, transfer) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid charm archive"))
        .mount(&server)
        .await;

    let err = transfer
        .send_post_request(request("/model/uuid-1/charms"), Bytes::from_static(b"PK"), None)
        .await
        .unwrap_err();

    match err {
        Error::HttpStatus { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid charm archive");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

// ── Download ────────────────────────────────────────────────────────

#[tokio::test]
async fn get_returns_file_contents_and_reports_progress() {
    let (server, transfer) = setup().await;

    Mock::given(method("GET"))
        .and(path("/model/uuid-1/charms"))
        .and(query_param("url", "local:trusty/django-42"))
        .and(query_param("file", "hooks/install"))
        .and(basic_auth("user-admin", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("#!/bin/sh\necho hi\n"))
        .mount(&server)
        .await;

    let (progress, seen) = recording_progress();
    let reply = transfer
        .send_get_request(
            request(&charm_api_path(
                "uuid-1",
                &[("url", "local:trusty/django-42"), ("file", "hooks/install")],
            )),
            Some(progress),
        )
        .await
        .unwrap();

    assert_eq!(reply.body, Bytes::from_static(b"#!/bin/sh\necho hi\n"));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.last().map(|(done, _)| *done), Some(18));
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let (server, transfer) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = transfer
        .send_get_request(request("/model/uuid-1/charms?url=local:x"), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
