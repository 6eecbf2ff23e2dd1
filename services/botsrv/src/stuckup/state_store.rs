//! Checkpoint persistence with a local-file fallback
//!
//! The remote state table is authoritative when reachable. A remote that is
//! unconfigured or failing hands over to one local file per key, so a
//! checkpoint is always recorded somewhere.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    ALERT_TRIGGER_KEY, DATA_HASH_KEY, LAST_SCHEDULED_SYNC_KEY, REFERENCE_FINGERPRINT_KEY,
};
use crate::config::Settings;
use crate::integrations::{Outcome, TableStore};

#[async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(None)` is a legitimate "never set"
    async fn get(&self, key: &str) -> Outcome<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Outcome<()>;
}

/// State rows in the remote table store
pub struct RemoteStateStore {
    table: Arc<dyn TableStore>,
}

impl RemoteStateStore {
    pub fn new(table: Arc<dyn TableStore>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl StateStore for RemoteStateStore {
    async fn get(&self, key: &str) -> Outcome<Option<String>> {
        self.table.get_state(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Outcome<()> {
        self.table.set_state(key, value).await
    }
}

/// One plain-text file per key
pub struct LocalFileStateStore {
    paths: HashMap<String, PathBuf>,
}

impl LocalFileStateStore {
    pub fn new(paths: HashMap<String, PathBuf>) -> Self {
        Self { paths }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let paths = [
            (REFERENCE_FINGERPRINT_KEY, &settings.stuckup_state_path),
            (DATA_HASH_KEY, &settings.stuckup_data_hash_path),
            (LAST_SCHEDULED_SYNC_KEY, &settings.stuckup_schedule_state_path),
            (ALERT_TRIGGER_KEY, &settings.stuckup_dashboard_alert_state_path),
        ]
        .into_iter()
        .map(|(key, path)| (key.to_string(), PathBuf::from(path)))
        .collect();
        Self::new(paths)
    }

    pub fn path_for(&self, key: &str) -> Option<&Path> {
        self.paths.get(key).map(PathBuf::as_path)
    }
}

#[async_trait]
impl StateStore for LocalFileStateStore {
    async fn get(&self, key: &str) -> Outcome<Option<String>> {
        let Some(path) = self.path_for(key) else {
            return Outcome::failed(format!("no local file configured for '{}'", key));
        };
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let value = content.trim();
                Outcome::Ok((!value.is_empty()).then(|| value.to_string()))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Outcome::Ok(None),
            Err(e) => Outcome::failed(format!("read {}: {}", path.display(), e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Outcome<()> {
        let Some(path) = self.path_for(key) else {
            return Outcome::failed(format!("no local file configured for '{}'", key));
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Outcome::failed(format!("create {}: {}", parent.display(), e));
            }
        }
        match tokio::fs::write(path, value).await {
            Ok(()) => Outcome::Ok(()),
            Err(e) => Outcome::failed(format!("write {}: {}", path.display(), e)),
        }
    }
}

/// Remote first, local file when the remote is skipped or failing
///
/// Successful remote writes are mirrored locally so the file always holds the
/// last value written anywhere.
pub struct FallbackStateStore {
    remote: Arc<dyn StateStore>,
    local: Arc<dyn StateStore>,
}

impl FallbackStateStore {
    pub fn new(remote: Arc<dyn StateStore>, local: Arc<dyn StateStore>) -> Self {
        Self { remote, local }
    }

    pub fn from_settings(settings: &Settings, table: Arc<dyn TableStore>) -> Self {
        Self::new(
            Arc::new(RemoteStateStore::new(table)),
            Arc::new(LocalFileStateStore::from_settings(settings)),
        )
    }
}

#[async_trait]
impl StateStore for FallbackStateStore {
    async fn get(&self, key: &str) -> Outcome<Option<String>> {
        match self.remote.get(key).await {
            Outcome::Ok(value) => Outcome::Ok(value),
            Outcome::Skipped(reason) => {
                debug!("State '{}' read locally (remote skipped: {})", key, reason);
                self.local.get(key).await
            },
            Outcome::Failed(reason) => {
                warn!("State '{}' remote read failed, falling back to local file: {}", key, reason);
                self.local.get(key).await
            },
        }
    }

    async fn set(&self, key: &str, value: &str) -> Outcome<()> {
        match self.remote.set(key, value).await {
            Outcome::Ok(()) => {
                if let Outcome::Failed(reason) = self.local.set(key, value).await {
                    warn!("State '{}' local mirror failed: {}", key, reason);
                }
                Outcome::Ok(())
            },
            Outcome::Skipped(reason) => {
                debug!("State '{}' written locally (remote skipped: {})", key, reason);
                self.local.set(key, value).await
            },
            Outcome::Failed(reason) => {
                warn!("State '{}' remote write failed, falling back to local file: {}", key, reason);
                self.local.set(key, value).await
            },
        }
    }
}
