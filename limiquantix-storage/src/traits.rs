//! Connection abstraction consumed by pools and volumes.
//!
//! `StoragePool` and `StorageVolume` never talk to libvirt directly. They go
//! through these traits so the same defaulting and install logic runs against
//! [`crate::MockConnection`] in tests and [`crate::libvirt`] in production.

use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::types::{PoolInfo, PoolType, VolumeCreateFlags, VolumeInfo};

/// A connection to a hypervisor host's storage subsystem.
#[async_trait]
pub trait StorageConnection: Send + Sync {
    // =========================================================================
    // Connection properties
    // =========================================================================

    /// Connection URI (e.g., `qemu:///system`).
    fn uri(&self) -> &str;

    /// Whether this is a per-user (session) connection.
    fn is_session(&self) -> bool;

    /// Whether this is libvirt's test driver.
    fn is_test_driver(&self) -> bool;

    /// Default paths and timings for objects created on this connection.
    fn storage_config(&self) -> &StorageConfig;

    // =========================================================================
    // Pools
    // =========================================================================

    /// List every pool, active or inactive.
    async fn list_all_pools(&self) -> Result<Vec<Arc<dyn PoolHandle>>>;

    /// Discover pool sources of `pool_type`.
    ///
    /// `source_xml` is a `<source>` descriptor narrowing the search. Returns
    /// a `<sources>` document, or `StorageError::NotSupported` when the
    /// driver can't enumerate this type.
    async fn find_pool_sources(&self, pool_type: PoolType, source_xml: &str) -> Result<String>;

    /// Look up a pool by name. `Ok(None)` if there is no such pool.
    async fn lookup_pool_by_name(&self, name: &str) -> Result<Option<Arc<dyn PoolHandle>>>;

    /// Define a persistent pool from XML.
    async fn define_pool(&self, xml: &str) -> Result<Arc<dyn PoolHandle>>;

    /// Remember a freshly installed pool so later listings see it.
    fn cache_new_pool(&self, pool: Arc<dyn PoolHandle>);

    // =========================================================================
    // Volumes
    // =========================================================================

    /// Find the pool-managed volume at `path`. `Ok(None)` when the path is
    /// not part of any pool.
    async fn lookup_volume_by_path(&self, path: &str) -> Result<Option<Arc<dyn VolumeHandle>>>;

    // =========================================================================
    // Capabilities
    // =========================================================================

    /// Whether qcow2 volumes can be created with lazy refcounts.
    async fn supports_qcow2_lazy_refcounts(&self) -> bool;

    /// Whether `pool` accepts the prealloc-metadata volume create flag.
    async fn supports_pool_metadata_prealloc(&self, pool: &dyn PoolHandle) -> bool;
}

/// A live storage pool.
#[async_trait]
pub trait PoolHandle: Send + Sync {
    /// Pool name.
    fn name(&self) -> String;

    /// Current `(state, capacity, allocation, available)`.
    async fn info(&self) -> Result<PoolInfo>;

    /// Start the pool.
    async fn start(&self) -> Result<()>;

    /// Rescan the pool's volumes.
    async fn refresh(&self) -> Result<()>;

    /// Enable or disable autostart.
    async fn set_autostart(&self, autostart: bool) -> Result<()>;

    /// Build the pool's underlying storage.
    async fn build(&self) -> Result<()>;

    /// Remove the persistent definition.
    async fn undefine(&self) -> Result<()>;

    /// Current pool XML.
    async fn xml_desc(&self) -> Result<String>;

    /// Create a volume from XML.
    async fn create_volume(&self, xml: &str, flags: VolumeCreateFlags) -> Result<Arc<dyn VolumeHandle>>;

    /// Create a volume from XML, copying data from `input`.
    async fn clone_volume(
        &self,
        xml: &str,
        input: &dyn VolumeHandle,
        flags: VolumeCreateFlags,
    ) -> Result<Arc<dyn VolumeHandle>>;

    /// Look up a volume by name. `Ok(None)` if there is no such volume.
    async fn lookup_volume(&self, name: &str) -> Result<Option<Arc<dyn VolumeHandle>>>;

    /// Names of all volumes in the pool.
    async fn list_volume_names(&self) -> Result<Vec<String>>;
}

/// A live storage volume.
#[async_trait]
pub trait VolumeHandle: Send + Sync {
    /// Volume name.
    fn name(&self) -> String;

    /// Volume path on the host.
    fn path(&self) -> String;

    /// Current `(type, capacity, allocation)`.
    async fn info(&self) -> Result<VolumeInfo>;

    /// Current volume XML.
    async fn xml_desc(&self) -> Result<String>;

    /// The pool this volume belongs to.
    async fn pool(&self) -> Result<Arc<dyn PoolHandle>>;

    /// Access to the concrete backend type.
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle").field("name", &self.name()).finish()
    }
}

impl fmt::Debug for dyn VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeHandle")
            .field("name", &self.name())
            .field("path", &self.path())
            .finish()
    }
}
