use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::config::{Config, ConfigError};
use crate::http::request::Args;
use crate::rotator::RotatorDriver;

/// Shared state handed to every handler and background task.
pub struct AppState {
    pub rotator: Arc<RotatorDriver>,
    config: RwLock<Config>,
    config_path: PathBuf,
    content_dir: PathBuf,
    max_upload_bytes: u64,
    keep_running: AtomicBool,
}

impl AppState {
    pub fn new(config: Config, config_path: impl Into<PathBuf>, rotator: Arc<RotatorDriver>) -> Self {
        Self {
            rotator,
            content_dir: config.content_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
            config: RwLock::new(config),
            config_path: config_path.into(),
            keep_running: AtomicBool::new(true),
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// A copy of the current configuration.
    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Validates and applies `args`, persisting the result when anything changed.
    ///
    /// Port and address changes take effect after a restart.
    pub async fn update_config(&self, args: &Args) -> Result<(), ConfigError> {
        let mut config = self.config.write().await;
        let mut updated = config.clone();

        if updated.apply_updates(args)? {
            updated.save(&self.config_path)?;
            *config = updated;
            tracing::info!(path = %self.config_path.display(), "Configuration saved");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.keep_running.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.keep_running.store(false, Ordering::Relaxed);
    }
}
