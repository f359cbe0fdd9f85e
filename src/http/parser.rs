use std::collections::HashMap;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::http::mime;
use crate::http::request::{Args, Method, Request, Version};

/// Longest request line or header line we accept.
pub const MAX_LINE_LEN: usize = 2048;
pub const MAX_HEADERS: usize = 64;
/// Largest form or JSON body read into memory.
pub const MAX_FORM_BODY: u64 = 16 * 1024;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("only GET and POST are supported")]
    InvalidMethod,
    #[error("that protocol is not supported")]
    InvalidVersion,
    #[error("malformed header")]
    InvalidHeader,
    #[error("invalid content length")]
    InvalidContentLength,
    #[error("request line or header too long")]
    LineTooLong,
    #[error("too many headers")]
    TooManyHeaders,
    #[error("request body too large")]
    BodyTooLarge,
    #[error("request body is not a JSON object")]
    InvalidJson,
    #[error("connection closed mid-request")]
    Incomplete,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Splits a request line into method, target and protocol.
///
/// The line must consist of exactly three tokens separated by single spaces.
pub fn parse_request_line(line: &str) -> Result<(Method, &str, Version), ParseError> {
    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts[..] else {
        return Err(ParseError::InvalidRequest);
    };

    if target.is_empty() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method).ok_or(ParseError::InvalidMethod)?;
    let version = Version::from_str(version).ok_or(ParseError::InvalidVersion)?;

    Ok((method, target, version))
}

/// Splits a request target on the first `?` into path and query string.
pub fn split_target(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

/// Splits a header line on the first `:`, lowercasing the name.
pub fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
    let key = key.trim();

    if key.is_empty() {
        return Err(ParseError::InvalidHeader);
    }

    Ok((key.to_ascii_lowercase(), value.trim().to_string()))
}

/// Decodes `key=value&key=value` pairs; later duplicates win.
pub fn parse_form(input: &[u8]) -> Args {
    url::form_urlencoded::parse(input)
        .into_owned()
        .collect()
}

/// Flattens a JSON object body into string arguments.
pub fn parse_json_args(input: &[u8]) -> Result<Args, ParseError> {
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(input).map_err(|_| ParseError::InvalidJson)?;

    Ok(object
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}

/// Reads one CRLF (or LF) terminated line, without the terminator.
///
/// Returns `Ok(None)` when the stream is already at EOF.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<String>, ParseError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LEN as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;

    if n == 0 {
        return Ok(None);
    }
    if line.len() > MAX_LINE_LEN {
        return Err(ParseError::LineTooLong);
    }

    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| ParseError::InvalidRequest)
}

/// Reads the request line, headers and (for form or JSON posts) the body.
///
/// Multipart bodies are left unread so the caller can stream them. Returns
/// `Ok(None)` if the client closed the connection without sending anything.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Request>, ParseError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let Some(request_line) = read_line(reader).await? else {
        return Ok(None);
    };

    let (method, target, version) = parse_request_line(&request_line)?;
    let (path, query) = split_target(target);

    let mut headers = HashMap::new();
    loop {
        let line = read_line(reader).await?.ok_or(ParseError::Incomplete)?;
        if line.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(ParseError::TooManyHeaders);
        }
        let (key, value) = parse_header_line(&line)?;
        headers.insert(key, value);
    }

    let content_length = headers
        .get("content-length")
        .map(|v| v.parse::<u64>().map_err(|_| ParseError::InvalidContentLength))
        .transpose()?;

    let mut request = Request {
        method,
        path: path.to_string(),
        version,
        headers,
        args: Args::new(),
        content_length,
    };

    request.args = match method {
        Method::GET => parse_form(query.as_bytes()),
        Method::POST => read_body_args(reader, &request).await?,
    };

    Ok(Some(request))
}

async fn read_body_args<R>(reader: &mut R, request: &Request) -> Result<Args, ParseError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let length = request.content_length.unwrap_or(0);
    let form = request.has_media_type(mime::APP_WWW_FORM);
    let json = request.has_media_type(mime::APP_JSON);

    if length == 0 || !(form || json) {
        return Ok(Args::new());
    }
    if length > MAX_FORM_BODY {
        return Err(ParseError::BodyTooLarge);
    }

    let mut body = vec![0u8; length as usize];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ParseError::Incomplete
        } else {
            ParseError::Io(e)
        }
    })?;

    if form {
        Ok(parse_form(&body))
    } else {
        parse_json_args(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_request_line() {
        let (method, target, version) = parse_request_line("GET /api/bearing?set=90 HTTP/1.1").unwrap();

        assert_eq!(method, Method::GET);
        assert_eq!(target, "/api/bearing?set=90");
        assert_eq!(version, Version::Http11);
        assert_eq!(split_target(target), ("/api/bearing", "set=90"));
    }

    #[test]
    fn double_space_is_not_three_tokens() {
        assert!(matches!(
            parse_request_line("GET  / HTTP/1.1"),
            Err(ParseError::InvalidRequest)
        ));
    }
}
