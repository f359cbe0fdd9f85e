mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

use common::{RawResponse, request, test_app};
use rotorlink::api;
use rotorlink::http::connection::Connection;

#[tokio::test]
async fn test_two_token_request_line_is_bad_request() {
    let (app, _fake, _dir) = test_app("http-two-token");

    let resp = request(app, "GET /\r\n\r\n").await;

    assert_eq!(resp.status, 400);
    assert!(resp.head.starts_with("HTTP/1.0 400 Bad Request"));
}

#[tokio::test]
async fn test_unsupported_method_and_protocol() {
    let (app, _fake, _dir) = test_app("http-unsupported");

    assert_eq!(request(app.clone(), "DELETE /api/bearing HTTP/1.1\r\n\r\n").await.status, 400);
    assert_eq!(request(app, "GET /api/bearing HTTP/2.0\r\n\r\n").await.status, 400);
}

#[tokio::test]
async fn test_set_then_query_bearing() {
    let (app, fake, _dir) = test_app("http-bearing");

    let set = request(app.clone(), "GET /api/bearing?set=180 HTTP/1.1\r\nHost: rotator\r\n\r\n").await;
    assert_eq!(set.status, 200);
    assert_eq!(set.body_text(), "180\r\n");

    let get = request(app, "GET /api/bearing HTTP/1.1\r\n\r\n").await;
    assert_eq!(get.status, 200);
    assert_eq!(get.body_text(), "180\r\n");
    assert!(get.head.contains("Content-type: text/plain; charset=UTF-8"));
    assert!(get.head.contains("Content-length: 5"));

    assert_eq!(fake.frames(), vec![";", "AP1180\r", "AI1;"]);
}

#[tokio::test]
async fn test_out_of_range_bearing_never_reaches_the_driver() {
    let (app, fake, _dir) = test_app("http-range");

    for value in ["361", "-1", "1000", "ninety", "45.5"] {
        let resp = request(app.clone(), &format!("GET /api/bearing?set={} HTTP/1.0\r\n\r\n", value)).await;
        assert_eq!(resp.status, 400, "set={}", value);
        assert_eq!(resp.body_text(), "parameter out of range\r\n");
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(fake.frames().is_empty());
}

#[tokio::test]
async fn test_busy_rotator_is_service_unavailable() {
    let (app, fake, _dir) = test_app("http-busy");
    fake.set_silent();

    let holder = {
        let app = app.clone();
        tokio::spawn(async move { app.rotator.get_bearing().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let resp = request(app, "GET /api/bearing HTTP/1.0\r\n\r\n").await;
    assert_eq!(resp.status, 503);
    assert!(resp.body_text().contains("-13"));

    assert!(holder.await.unwrap().is_err());
}

#[tokio::test]
async fn test_root_redirects_to_rotator_page() {
    let (app, _fake, _dir) = test_app("http-root");

    let resp = request(app, "GET / HTTP/1.1\r\n\r\n").await;

    assert_eq!(resp.status, 301);
    assert!(resp.head.contains("Location: /rotator.html"));
    assert!(!resp.head.contains("Content-length"));
}

#[tokio::test]
async fn test_wrong_method_on_known_route() {
    let (app, _fake, _dir) = test_app("http-405");

    assert_eq!(request(app.clone(), "POST /api/bearing HTTP/1.1\r\n\r\n").await.status, 405);
    assert_eq!(request(app, "GET /api/restart HTTP/1.1\r\n\r\n").await.status, 405);
}

#[tokio::test]
async fn test_config_get_and_post_with_lowercase_headers() {
    let (app, _fake, dir) = test_app("http-config");

    let body = "hostname=tower2&tcp_port=7373";
    let raw = format!(
        "POST /api/config HTTP/1.1\r\ncontent-type: application/x-www-form-urlencoded\r\ncontent-length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let resp = request(app.clone(), &raw).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "ok\r\n");
    assert!(dir.join("config.yaml").exists());

    let resp = request(app, "GET /api/config HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.status, 200);
    assert!(resp.head.contains("Content-type: application/json"));
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(json["hostname"], "tower2");
    assert_eq!(json["tcp_port"], 7373);
}

#[tokio::test]
async fn test_config_rejects_out_of_range_json() {
    let (app, _fake, dir) = test_app("http-config-bad");

    let body = r#"{"web_port": 99999}"#;
    let raw = format!(
        "POST /api/config HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let resp = request(app.clone(), &raw).await;

    assert_eq!(resp.status, 400);
    assert_eq!(resp.body_text(), "parameter out of range\r\n");
    assert!(!dir.join("config.yaml").exists());
    assert_eq!(app.config().await.web_port, 80);
}

#[tokio::test]
async fn test_upload_then_serve_and_list() {
    let (app, _fake, dir) = test_app("http-upload");

    let body = "--XyZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\r\n73 de rotator\r\n--XyZ--\r\n";
    let raw = format!(
        "POST /api/upload_file HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XyZ\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let resp = request(app.clone(), &raw).await;
    assert_eq!(resp.status, 201);
    assert_eq!(resp.body_text(), "Uploaded notes.txt successfully");
    assert_eq!(std::fs::read_to_string(dir.join("notes.txt")).unwrap(), "73 de rotator");

    let resp = request(app.clone(), "GET /notes.txt HTTP/1.1\r\n\r\n").await;
    assert_eq!(resp.status, 200);
    assert!(resp.head.contains("Content-type: text/plain; charset=UTF-8"));
    assert_eq!(resp.body_text(), "73 de rotator");

    let resp = request(app, "GET /api/get_files HTTP/1.1\r\n\r\n").await;
    let names: Vec<String> = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(names, vec!["notes.txt"]);
}

#[tokio::test]
async fn test_upload_limits() {
    let (app, _fake, dir) = test_app("http-upload-limits");

    let missing = "POST /api/upload_file HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XyZ\r\n\r\n";
    assert_eq!(request(app.clone(), missing).await.status, 411);

    let huge = "POST /api/upload_file HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XyZ\r\nContent-Length: 999999999\r\n\r\n";
    assert_eq!(request(app, huge).await.status, 413);

    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_refused_upload_body_is_read_before_replying() {
    let (app, _fake, dir) = test_app("http-upload-drain");
    let router = Arc::new(api::router());
    // smaller than the body, so the client only finishes writing if the server reads it
    let (mut client, server) = duplex(1024);

    let task = tokio::spawn(async move {
        let mut conn = Connection::new(server, "test-client", app, router);
        conn.run().await
    });

    let body = vec![b'x'; 8192];
    let head = format!(
        "POST /api/upload_file HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    client.write_all(head.as_bytes()).await.unwrap();
    client.write_all(&body).await.unwrap();

    let mut raw = Vec::new();
    client.read_to_end(&mut raw).await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(RawResponse::parse(&raw).status, 400);
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_rename_and_remove() {
    let (app, _fake, dir) = test_app("http-files");
    std::fs::write(dir.join("old.txt"), "x").unwrap();

    let post = |path: &str, body: &str| {
        format!(
            "POST {} HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            path,
            body.len(),
            body
        )
    };

    let resp = request(app.clone(), &post("/api/rename_file", "filename=old.txt&newname=new.txt")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "renamed\r\n");
    assert!(dir.join("new.txt").exists());

    let resp = request(app.clone(), &post("/api/remove_file", "filename=new.txt")).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "removed\r\n");
    assert!(!dir.join("new.txt").exists());

    let resp = request(app, &post("/api/remove_file", "filename=rotator.html")).await;
    assert_eq!(resp.status, 409);
}

#[tokio::test]
async fn test_restart_clears_keep_running() {
    let (app, _fake, _dir) = test_app("http-restart");
    assert!(app.is_running());

    let resp = request(app.clone(), "POST /api/restart HTTP/1.1\r\n\r\n").await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "ok\r\n");
    assert!(!app.is_running());
}
