//! Storage defaults and progress polling configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, StorageError};

/// Default locations used when a pool definition leaves them out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Default pool root for system connections
    pub system_pool_path: String,
    /// Default pool root for session (per-user) connections, `~` is expanded
    pub session_pool_path: String,
    /// Prefix of logical volume group device paths
    pub lvm_target_base: String,
    /// Target for disk pools
    pub disk_target: String,
    /// Target for iSCSI and SCSI pools
    pub scsi_target: String,
    /// Target for multipath pools
    pub mpath_target: String,
    /// Volume allocation polling
    pub progress: ProgressConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            system_pool_path: "/var/lib/libvirt/images".to_string(),
            session_pool_path: "~/.local/share/libvirt/images".to_string(),
            lvm_target_base: "/dev/".to_string(),
            disk_target: "/dev".to_string(),
            scsi_target: "/dev/disk/by-path".to_string(),
            mpath_target: "/dev/mapper".to_string(),
            progress: ProgressConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::InvalidConfig(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            StorageError::InvalidConfig(format!("Failed to parse config file: {}", e))
        })
    }

    /// Session pool root with a leading `~` replaced by the user's home.
    pub fn expanded_session_pool_path(&self) -> String {
        shellexpand::tilde(&self.session_pool_path).into_owned()
    }
}

/// Timings of the allocation progress task.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Wait between volume lookups while creation is starting
    pub lookup_retry_ms: u64,
    /// Give up looking the volume up after this many attempts
    pub max_lookup_attempts: u32,
    /// Wait between allocation reports
    pub poll_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            lookup_retry_ms: 200,
            max_lookup_attempts: 3000,
            poll_interval_ms: 1000,
        }
    }
}

impl ProgressConfig {
    pub fn lookup_retry(&self) -> Duration {
        Duration::from_millis(self.lookup_retry_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
