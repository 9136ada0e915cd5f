//! Error types for storage pool and volume operations.

use thiserror::Error;

/// Errors that can occur while building or installing storage objects.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Name failed the generic syntax check.
    #[error("{0}")]
    InvalidName(String),

    /// Name collides with an existing pool or volume.
    #[error("Name '{name}' already in use by another {kind}.")]
    NameInUse {
        /// "pool" or "volume"
        kind: &'static str,
        name: String,
    },

    /// A field required by the pool type was not provided.
    #[error("{0}")]
    MissingField(String),

    /// Invalid configuration or illegal type/flag combination.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Requested volume allocation does not fit into the pool.
    #[error("{0}")]
    SizeConflict(String),

    /// The connection does not support the requested operation.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Object was not found on the connection.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Defining the pool XML failed.
    #[error("Could not define storage pool: {0}")]
    DefineFailed(String),

    /// Building the pool failed.
    #[error("Could not build storage pool: {0}")]
    BuildFailed(String),

    /// Starting the pool failed.
    #[error("Could not start storage pool: {0}")]
    StartFailed(String),

    /// Enabling autostart failed.
    #[error("Could not set pool autostart flag: {0}")]
    AutostartFailed(String),

    /// The default pool could not be created.
    #[error("Couldn't create default storage pool '{path}': {reason}")]
    DefaultPoolFailed { path: String, reason: String },

    /// Volume creation failed.
    #[error("Couldn't create storage volume '{name}': '{reason}'")]
    VolumeCreateFailed { name: String, reason: String },

    /// Error reported by libvirt.
    #[error("Libvirt error: {0}")]
    Libvirt(String),

    /// XML generation/parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Whether this error means the connection lacks support for the call.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, StorageError::NotSupported(_))
    }
}

impl From<quick_xml::DeError> for StorageError {
    fn from(e: quick_xml::DeError) -> Self {
        StorageError::Xml(e.to_string())
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_in_use_message() {
        let err = StorageError::NameInUse { kind: "pool", name: "default".into() };
        assert_eq!(err.to_string(), "Name 'default' already in use by another pool.");
    }

    #[test]
    fn test_volume_create_failed_message() {
        let err = StorageError::VolumeCreateFailed {
            name: "disk.qcow2".into(),
            reason: "no space".into(),
        };
        assert_eq!(err.to_string(), "Couldn't create storage volume 'disk.qcow2': 'no space'");
    }
}
