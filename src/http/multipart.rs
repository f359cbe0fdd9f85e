//! Streaming `multipart/form-data` upload decoder
//!
//! The body is consumed straight off the socket in chunks of at most
//! [`CHUNK_SIZE`] bytes and never buffered whole. A session walks through
//!
//! ```text
//!   AwaitStartBoundary ──"--B"──▶ ReadingHeaders ──""──▶ StreamingData
//!          ▲                                                  │ CRLF "--B"
//!          └────────────"--B--"──── AwaitEndBoundary ◀────────┘
//! ```
//!
//! While streaming, the end of the file data is the delimiter `CRLF "--" B`,
//! which may be split across any number of reads. The longest tail of the
//! current window that is a proper prefix of the delimiter is held back in a
//! carry-over buffer and prepended to the next read, so the delimiter is
//! always matched against one contiguous window. No delimiter byte reaches
//! the file and no data byte is lost, whatever the read boundaries.
//!
//! Data is written to a hidden `.NAME.<session>.part` file, private to the
//! session, that is renamed into place only once the closing boundary has
//! been seen; any failure removes it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::files;
use crate::http::mime;
use crate::http::request::Request;
use crate::http::response::StatusCode;

/// Largest read taken from the socket in one go.
pub const CHUNK_SIZE: usize = 4096;
/// Part header lines longer than this abort the session.
const MAX_LINE_LEN: usize = 1024;
const MAX_BOUNDARY_LEN: usize = 70;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartState {
    AwaitStartBoundary,
    ReadingHeaders,
    StreamingData,
    AwaitEndBoundary,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("multipart boundary or content type error")]
    BadContentType,
    #[error("content length required")]
    LengthRequired,
    #[error("upload of {length} bytes exceeds the {limit} byte limit")]
    TooLarge { length: u64, limit: u64 },
    #[error("expected {expected}, got {got:?}")]
    UnexpectedLine { expected: &'static str, got: String },
    #[error("part header line too long")]
    LineTooLong,
    #[error("bad filename")]
    BadFilename,
    #[error("file part has no filename")]
    MissingFilename,
    #[error("{0} is protected")]
    Protected(String),
    #[error("upload ended before the closing boundary")]
    Truncated,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::LengthRequired => StatusCode::LengthRequired,
            UploadError::TooLarge { .. } => StatusCode::PayloadTooLarge,
            UploadError::Protected(_) => StatusCode::Conflict,
            UploadError::Io(_) => StatusCode::InternalServerError,
            _ => StatusCode::BadRequest,
        }
    }
}

/// Extracts the boundary parameter of a `multipart/form-data` content type.
///
/// ```
/// # use rotorlink::http::multipart::boundary_from_content_type;
/// assert_eq!(
///     boundary_from_content_type("multipart/form-data; boundary=----abc").as_deref(),
///     Some("----abc")
/// );
/// assert_eq!(boundary_from_content_type("text/plain; boundary=x"), None);
/// ```
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let mut parts = content_type.split(';');
    let media_type = parts.next()?.trim();
    if !media_type.eq_ignore_ascii_case(mime::MULTIPART_FORM) {
        return None;
    }

    parts
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .filter(|b| {
            !b.is_empty()
                && b.len() <= MAX_BOUNDARY_LEN
                && !b.ends_with(' ')
                && b.bytes().all(|c| c.is_ascii_graphic() || c == b' ')
        })
}

/// Checks an upload request before any of its body is read.
///
/// Returns the boundary token on success.
pub fn check_request(request: &Request, max_bytes: u64) -> Result<String, UploadError> {
    let boundary = request
        .content_type()
        .and_then(boundary_from_content_type)
        .ok_or(UploadError::BadContentType)?;

    match request.content_length {
        None | Some(0) => Err(UploadError::LengthRequired),
        Some(length) if length > max_bytes => Err(UploadError::TooLarge {
            length,
            limit: max_bytes,
        }),
        Some(_) => Ok(boundary),
    }
}

/// Streams `content_length` bytes of multipart body from `reader` into `dir`.
///
/// Returns the stored file name.
pub async fn receive_upload<R>(
    reader: &mut R,
    content_length: u64,
    boundary: &str,
    dir: &Path,
) -> Result<String, UploadError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut session = UploadSession::new(boundary, dir);

    let result = match session.pump(reader, content_length).await {
        Ok(()) => session.commit().await,
        Err(e) => Err(e),
    };

    if result.is_err() {
        session.discard().await;
    }

    result
}

/// One upload in progress.
pub struct UploadSession {
    start_line: Vec<u8>,
    end_line: Vec<u8>,
    delimiter: Vec<u8>,
    state: PartState,
    carry: BytesMut,
    dir: PathBuf,
    session_id: u64,
    filename: Option<String>,
    file: Option<File>,
    data_complete: bool,
    written: u64,
}

impl UploadSession {
    pub fn new(boundary: &str, dir: &Path) -> Self {
        Self {
            start_line: format!("--{}", boundary).into_bytes(),
            end_line: format!("--{}--", boundary).into_bytes(),
            delimiter: format!("\r\n--{}", boundary).into_bytes(),
            state: PartState::AwaitStartBoundary,
            carry: BytesMut::new(),
            dir: dir.to_path_buf(),
            session_id: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            filename: None,
            file: None,
            data_complete: false,
            written: 0,
        }
    }

    pub fn state(&self) -> PartState {
        self.state
    }

    /// Bytes currently held back from the previous chunk.
    pub fn carried(&self) -> usize {
        self.carry.len()
    }

    /// File bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    async fn pump<R>(&mut self, reader: &mut R, content_length: u64) -> Result<(), UploadError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut remaining = content_length;
        let mut chunk = vec![0u8; CHUNK_SIZE];

        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = reader.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(UploadError::Truncated);
            }
            remaining -= n as u64;
            self.feed(&chunk[..n]).await?;
        }

        Ok(())
    }

    /// Processes one chunk of body bytes.
    pub async fn feed(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let mut window = std::mem::take(&mut self.carry);
        window.extend_from_slice(chunk);
        let mut cursor = 0;

        while cursor < window.len() {
            let rest = &window[cursor..];

            match self.state {
                PartState::StreamingData => match find(rest, &self.delimiter) {
                    Some(i) => {
                        self.write_data(&rest[..i]).await?;
                        self.close_file().await?;
                        self.state = PartState::AwaitEndBoundary;
                        // the boundary line itself starts after the CRLF
                        cursor += i + 2;
                    }
                    None => {
                        let held = partial_match_len(rest, &self.delimiter);
                        let (data, tail) = rest.split_at(rest.len() - held);
                        self.write_data(data).await?;
                        self.carry.extend_from_slice(tail);
                        cursor = window.len();
                    }
                },
                PartState::AwaitStartBoundary
                | PartState::ReadingHeaders
                | PartState::AwaitEndBoundary => match find(rest, b"\r\n") {
                    Some(i) => {
                        self.handle_line(&rest[..i])?;
                        cursor += i + 2;
                    }
                    None => {
                        if rest.len() > MAX_LINE_LEN {
                            return Err(UploadError::LineTooLong);
                        }
                        self.carry.extend_from_slice(rest);
                        cursor = window.len();
                    }
                },
            }
        }

        Ok(())
    }

    fn handle_line(&mut self, line: &[u8]) -> Result<(), UploadError> {
        match self.state {
            PartState::AwaitStartBoundary => {
                if self.data_complete {
                    // epilogue after the closing boundary
                } else if line == self.start_line.as_slice() {
                    self.state = PartState::ReadingHeaders;
                } else {
                    return Err(unexpected("start boundary", line));
                }
            }
            PartState::ReadingHeaders => {
                if line.is_empty() {
                    if self.filename.is_none() {
                        return Err(UploadError::MissingFilename);
                    }
                    self.state = PartState::StreamingData;
                } else {
                    self.handle_header(line)?;
                }
            }
            PartState::AwaitEndBoundary => {
                if line == self.end_line.as_slice() {
                    self.state = PartState::AwaitStartBoundary;
                } else {
                    return Err(unexpected("closing boundary", line));
                }
            }
            PartState::StreamingData => {}
        }

        Ok(())
    }

    fn handle_header(&mut self, line: &[u8]) -> Result<(), UploadError> {
        let text = String::from_utf8_lossy(line);
        let Some((name, value)) = text.split_once(':') else {
            return Ok(());
        };
        if !name.trim().eq_ignore_ascii_case("content-disposition") {
            return Ok(());
        }

        let filename = disposition_filename(value).ok_or(UploadError::MissingFilename)?;
        if !files::valid_filename(filename) {
            tracing::warn!(filename, "Rejected upload file name");
            return Err(UploadError::BadFilename);
        }
        if files::is_protected(filename) {
            return Err(UploadError::Protected(filename.to_string()));
        }

        self.filename = Some(filename.to_string());
        Ok(())
    }

    async fn write_data(&mut self, data: &[u8]) -> Result<(), UploadError> {
        if data.is_empty() {
            return Ok(());
        }
        if self.file.is_none() {
            self.file = Some(self.open_destination().await?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(data).await?;
            self.written += data.len() as u64;
        }
        Ok(())
    }

    async fn open_destination(&self) -> Result<File, UploadError> {
        let path = self.partial_path().ok_or(UploadError::MissingFilename)?;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        Ok(file)
    }

    /// Closes the destination at the end of the data, creating it for an empty file.
    async fn close_file(&mut self) -> Result<(), UploadError> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => self.open_destination().await?,
        };
        file.flush().await?;
        self.data_complete = true;
        Ok(())
    }

    /// Moves the finished file into place once the closing boundary is in.
    pub async fn commit(&mut self) -> Result<String, UploadError> {
        let closed = match self.state {
            PartState::AwaitStartBoundary => true,
            // closing boundary without its trailing CRLF
            PartState::AwaitEndBoundary => self.carry[..] == self.end_line[..],
            _ => false,
        };
        if !(self.data_complete && closed) {
            return Err(UploadError::Truncated);
        }

        let (Some(partial), Some(name)) = (self.partial_path(), self.filename.clone()) else {
            return Err(UploadError::MissingFilename);
        };
        tokio::fs::rename(&partial, self.dir.join(&name)).await?;

        tracing::info!(file = %name, bytes = self.written, "Upload stored");
        Ok(name)
    }

    /// Closes the destination and removes any partial file.
    pub async fn discard(&mut self) {
        self.file = None;
        if let Some(partial) = self.partial_path() {
            match tokio::fs::remove_file(&partial).await {
                Ok(()) => tracing::debug!(path = %partial.display(), "Removed partial upload"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(error = %e, "Failed to remove partial upload"),
            }
        }
    }

    fn partial_path(&self) -> Option<PathBuf> {
        self.filename
            .as_ref()
            .map(|name| {
                let tag = format!("{}-{}", std::process::id(), self.session_id);
                self.dir.join(format!(".{}.{}.part", name, tag))
            })
    }
}

fn disposition_filename(value: &str) -> Option<&str> {
    value.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn unexpected(expected: &'static str, line: &[u8]) -> UploadError {
    UploadError::UnexpectedLine {
        expected,
        got: String::from_utf8_lossy(line).into_owned(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest proper prefix of `pattern` that `data` ends with.
fn partial_match_len(data: &[u8], pattern: &[u8]) -> usize {
    (1..pattern.len())
        .rev()
        .find(|&k| data.ends_with(&pattern[..k]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_back_delimiter_prefixes() {
        let delimiter = b"\r\n--XyZ";
        assert_eq!(partial_match_len(b"data\r", delimiter), 1);
        assert_eq!(partial_match_len(b"data\r\n", delimiter), 2);
        assert_eq!(partial_match_len(b"data\r\n-", delimiter), 3);
        assert_eq!(partial_match_len(b"data\r\n--Xy", delimiter), 5);
        assert_eq!(partial_match_len(b"data\r\n-a", delimiter), 0);
        assert_eq!(partial_match_len(b"", delimiter), 0);
    }

    #[test]
    fn filename_from_disposition() {
        assert_eq!(
            disposition_filename(r#" form-data; name="file"; filename="notes.txt""#),
            Some("notes.txt")
        );
        assert_eq!(disposition_filename(r#" form-data; name="file""#), None);
    }
}
