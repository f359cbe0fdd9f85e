use rotorlink::http::request::Version;
use rotorlink::http::response::{Body, Response, ResponseBuilder, StatusCode};
use rotorlink::http::writer::{ResponseWriter, serialize_head};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::Created.as_u16(), 201);
    assert_eq!(StatusCode::MovedPermanently.as_u16(), 301);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::Forbidden.as_u16(), 403);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
    assert_eq!(StatusCode::Conflict.as_u16(), 409);
    assert_eq!(StatusCode::LengthRequired.as_u16(), 411);
    assert_eq!(StatusCode::PayloadTooLarge.as_u16(), 413);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    assert_eq!(StatusCode::ServiceUnavailable.as_u16(), 503);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::MovedPermanently.reason_phrase(), "Moved Permanently");
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::LengthRequired.reason_phrase(), "Length Required");
    assert_eq!(StatusCode::ServiceUnavailable.reason_phrase(), "Service Unavailable");
}

#[test]
fn test_response_builder_basic() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .content_type("text/plain")
        .body(b"Hello, World!".to_vec())
        .build();

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.content_type.as_deref(), Some("text/plain"));
    assert_eq!(response.body.as_bytes(), Some(&b"Hello, World!"[..]));
}

#[test]
fn test_response_builder_empty_body() {
    let response = ResponseBuilder::new(StatusCode::Ok).body(Vec::new()).build();

    assert!(matches!(response.body, Body::Empty));
    assert!(response.body.is_empty());
}

#[test]
fn test_redirect_helper() {
    let response = Response::redirect("/rotator.html");

    assert_eq!(response.status, StatusCode::MovedPermanently);
    assert_eq!(response.extra_headers, vec!["Location: /rotator.html"]);
    assert!(response.content_type.is_none());
}

#[test]
fn test_head_framing() {
    let head = serialize_head(&Response::ok("180\r\n"), Version::Http11);

    assert_eq!(
        String::from_utf8(head).unwrap(),
        "HTTP/1.1 200 OK\r\nContent-type: text/plain; charset=UTF-8\r\nContent-length: 5\r\n\r\n"
    );
}

#[test]
fn test_head_without_body_has_no_length() {
    let head = serialize_head(&Response::redirect("/rotator.html"), Version::Http10);

    assert_eq!(
        String::from_utf8(head).unwrap(),
        "HTTP/1.0 301 Moved Permanently\r\nLocation: /rotator.html\r\n\r\n"
    );
}

#[tokio::test]
async fn test_writer_sends_head_then_body() {
    let mut out = Vec::new();
    let sent = ResponseWriter::new(Response::json(StatusCode::Ok, "[]"), Version::Http10)
        .write_to_stream(&mut out)
        .await
        .unwrap();

    assert_eq!(sent, 2);
    assert!(out.ends_with(b"\r\n\r\n[]"));
    assert!(out.starts_with(b"HTTP/1.0 200 OK\r\nContent-type: application/json; charset=UTF-8\r\n"));
}

#[test]
fn test_response_not_found_helper() {
    let response = Response::not_found();

    assert_eq!(response.status, StatusCode::NotFound);
    assert_eq!(response.content_type.as_deref(), Some("text/html"));
}

#[test]
fn test_response_internal_error_helper() {
    let response = Response::internal_error();

    assert_eq!(response.status, StatusCode::InternalServerError);
    assert_eq!(response.body.as_bytes(), Some(&b"500 Internal Server Error"[..]));
}
