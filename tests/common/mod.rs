#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

use rotorlink::api;
use rotorlink::config::Config;
use rotorlink::http::connection::Connection;
use rotorlink::rotator::{Dialect, RotatorDriver};
use rotorlink::server::AppState;

/// In-memory stand-in for a DCU-1 controller on the far end of the serial link.
///
/// Frames end with `;` or CR. `AP1DDD` updates the position, `AI1;` is
/// answered with `;DDD`. Every frame received is recorded.
#[derive(Clone, Default)]
pub struct FakeRotator {
    pub frames: Arc<Mutex<Vec<String>>>,
    pub position: Arc<Mutex<u16>>,
    /// Reply to `AI1;` with this instead of the position
    pub reply: Arc<Mutex<Option<Vec<u8>>>>,
    /// Never answer `AI1;`
    pub silent: Arc<Mutex<bool>>,
}

impl FakeRotator {
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub fn set_reply(&self, reply: &[u8]) {
        *self.reply.lock().unwrap() = Some(reply.to_vec());
    }

    pub fn set_silent(&self) {
        *self.silent.lock().unwrap() = true;
    }

    /// Spawns the controller on one end of a duplex and returns a driver on the other.
    pub fn attach(&self, dialect: Dialect) -> RotatorDriver {
        let (host, device) = duplex(1024);
        tokio::spawn(self.clone().run(device));
        RotatorDriver::new(Box::new(host), dialect)
    }

    fn next_reply(&self) -> Option<Vec<u8>> {
        if *self.silent.lock().unwrap() {
            return None;
        }
        let position = *self.position.lock().unwrap();
        let reply = self.reply.lock().unwrap().clone();
        Some(reply.unwrap_or_else(|| format!(";{:03}", position).into_bytes()))
    }

    async fn run(self, mut device: DuplexStream) {
        let mut frame = Vec::new();
        let mut buf = [0u8; 64];

        loop {
            let n = match device.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };

            for &byte in &buf[..n] {
                frame.push(byte);
                if byte != b';' && byte != b'\r' {
                    continue;
                }

                let text = String::from_utf8_lossy(&frame).into_owned();
                frame.clear();
                self.frames.lock().unwrap().push(text.clone());

                if let Some(digits) = text.strip_prefix("AP1") {
                    if let Ok(bearing) = digits[..digits.len() - 1].parse() {
                        *self.position.lock().unwrap() = bearing;
                    }
                } else if text == "AI1;" {
                    let Some(reply) = self.next_reply() else {
                        continue;
                    };
                    if device.write_all(&reply).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// A fresh, empty directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("rotorlink-{}-{}-{}", tag, std::process::id(), n));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn test_config(content_dir: &Path) -> Config {
    Config {
        content_dir: content_dir.to_path_buf(),
        max_upload_bytes: 64 * 1024,
        ..Config::default()
    }
}

/// App state over a temp content directory and a fake rotator.
pub fn test_app(tag: &str) -> (Arc<AppState>, FakeRotator, PathBuf) {
    let dir = temp_dir(tag);
    let fake = FakeRotator::default();
    let driver = Arc::new(fake.attach(Dialect::Combined));
    let app = AppState::new(test_config(&dir), dir.join("config.yaml"), driver);
    (Arc::new(app), fake, dir)
}

/// Sends one raw request through a full connection and returns the raw response.
pub async fn exchange(app: Arc<AppState>, raw: &[u8]) -> Vec<u8> {
    let (mut client, server) = duplex(1 << 20);
    let router = Arc::new(api::router());

    let task = tokio::spawn(async move {
        let mut conn = Connection::new(server, "test-client", app, router);
        conn.run().await
    });

    client.write_all(raw).await.unwrap();
    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    task.await.unwrap().unwrap();
    response
}

pub struct RawResponse {
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn parse(raw: &[u8]) -> Self {
        let split = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response has no header terminator");
        let head = String::from_utf8(raw[..split].to_vec()).unwrap();
        let status = head
            .split(' ')
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("bad status line");

        Self {
            status,
            head,
            body: raw[split + 4..].to_vec(),
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn request(app: Arc<AppState>, raw: &str) -> RawResponse {
    RawResponse::parse(&exchange(app, raw.as_bytes()).await)
}
