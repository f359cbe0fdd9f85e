//! HTTP protocol implementation.
//!
//! A deliberately small HTTP/1.0 and HTTP/1.1 server: one request per
//! connection, no keep-alive, no chunked encoding, no TLS.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine (read, dispatch, write, close)
//! - **`parser`**: Request line, header and argument parsing off a buffered stream
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes the head and streams the body to the client
//! - **`router`**: Exact-match route table of async handlers
//! - **`static_files`**: Fallback file serving from the content directory
//! - **`multipart`**: Streaming `multipart/form-data` upload decoder
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Request line and headers (form/JSON body too)
//!        └──────┬──────┘
//!               │ Request parsed          ── malformed ──┐
//!               ▼                                        │
//!        ┌──────────────────┐                            │
//!        │   Processing     │ ← Route table or static    │
//!        └──────┬───────────┘   (uploads read the body)  │
//!               │ Response ready                         │
//!               ▼                                        │
//!        ┌──────────────────┐                            │
//!        │    Writing       │ ◀──────── 400 ─────────────┘
//!        └──────┬───────────┘
//!               │ Flushed
//!               ▼
//!             Closed
//! ```

pub mod connection;
pub mod mime;
pub mod multipart;
pub mod parser;
pub mod request;
pub mod response;
pub mod router;
pub mod static_files;
pub mod writer;
