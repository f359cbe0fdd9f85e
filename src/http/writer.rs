use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::request::Version;
use crate::http::response::{Body, Response};

/// Chunk size used when streaming file bodies.
pub const BUFFER_SIZE: usize = 4096;

/// Serializes the status line and headers, including the blank separator line.
pub fn serialize_head(resp: &Response, version: Version) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        version.as_str(),
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    if let Some(content_type) = resp.content_type.as_deref().filter(|ct| !ct.is_empty()) {
        buf.extend_from_slice(format!("Content-type: {}; charset=UTF-8\r\n", content_type).as_bytes());
    }

    let length = resp.body.len();
    if length > 0 {
        buf.extend_from_slice(format!("Content-length: {}\r\n", length).as_bytes());
    }

    for header in &resp.extra_headers {
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

pub struct ResponseWriter {
    head: Vec<u8>,
    body: Body,
}

impl ResponseWriter {
    pub fn new(response: Response, version: Version) -> Self {
        Self {
            head: serialize_head(&response, version),
            body: response.body,
        }
    }

    /// Writes head and body, flushes, and returns the number of body bytes sent.
    pub async fn write_to_stream<W>(self, stream: &mut W) -> anyhow::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        stream.write_all(&self.head).await?;

        let sent = match self.body {
            Body::Empty => 0,
            Body::Bytes(bytes) => {
                stream.write_all(&bytes).await?;
                bytes.len() as u64
            }
            Body::File { file, len } => stream_file(file, len, stream).await?,
        };

        stream.flush().await?;
        Ok(sent)
    }
}

/// Copies at most `len` bytes of `file`, flushing after every chunk so a large
/// file never sits in memory.
async fn stream_file<W>(file: tokio::fs::File, len: u64, stream: &mut W) -> anyhow::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut file = file.take(len);
    let mut chunk = vec![0u8; BUFFER_SIZE];
    let mut sent = 0u64;

    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        stream.write_all(&chunk[..n]).await?;
        stream.flush().await?;
        sent += n as u64;
    }

    if sent < len {
        tracing::warn!(expected = len, sent, "File shrank while it was being served");
    }

    Ok(sent)
}
