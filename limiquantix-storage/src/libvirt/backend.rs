//! Libvirt backend implementation.

use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use virt::connect::Connect;
use virt::error::{Error as VirtError, ErrorNumber};
use virt::storage_pool::StoragePool as VirtPool;
use virt::storage_vol::StorageVol;

use super::split_version;
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::traits::{PoolHandle, StorageConnection, VolumeHandle};
use crate::types::*;

/// libvirt release that added qcow2 lazy refcounts.
const LAZY_REFCOUNTS_LIBVIRT: u32 = 1_001_000;
/// QEMU release that added qcow2 lazy refcounts.
const LAZY_REFCOUNTS_QEMU: u32 = 1_002_000;
/// libvirt release that added `VIR_STORAGE_VOL_CREATE_PREALLOC_METADATA`.
const PREALLOC_METADATA_LIBVIRT: u32 = 1_000_001;

fn libvirt_error(e: VirtError) -> StorageError {
    if e.code() == ErrorNumber::NoSupport {
        StorageError::NotSupported(e.to_string())
    } else {
        StorageError::Libvirt(e.to_string())
    }
}

/// Storage connection backed by libvirt.
pub struct LibvirtConnection {
    uri: String,
    connection: Arc<Connect>,
    config: StorageConfig,
}

impl LibvirtConnection {
    /// Connect to the specified URI with default storage settings.
    ///
    /// Common URIs:
    /// - `qemu:///system` - System-wide QEMU/KVM
    /// - `qemu:///session` - User session QEMU
    /// - `test:///default` - libvirt's test driver
    pub async fn new(uri: &str) -> Result<Self> {
        Self::with_config(uri, StorageConfig::default()).await
    }

    pub async fn with_config(uri: &str, config: StorageConfig) -> Result<Self> {
        info!(uri = %uri, "Connecting to libvirt");

        let connection = Connect::open(Some(uri)).map_err(libvirt_error)?;

        info!("Connected to libvirt");

        Ok(Self {
            uri: uri.to_string(),
            connection: Arc::new(connection),
            config,
        })
    }

    fn wrap_pool(&self, pool: VirtPool) -> Result<Arc<dyn PoolHandle>> {
        let name = pool.get_name().map_err(libvirt_error)?;
        Ok(Arc::new(LibvirtPool {
            connection: self.connection.clone(),
            pool,
            name,
        }))
    }

    fn lib_version(&self) -> Option<u32> {
        self.connection.get_lib_version().ok()
    }
}

#[async_trait]
impl StorageConnection for LibvirtConnection {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn is_session(&self) -> bool {
        self.uri.trim_end_matches('/').ends_with("/session")
    }

    fn is_test_driver(&self) -> bool {
        self.uri.starts_with("test:")
    }

    fn storage_config(&self) -> &StorageConfig {
        &self.config
    }

    #[instrument(skip(self))]
    async fn list_all_pools(&self) -> Result<Vec<Arc<dyn PoolHandle>>> {
        self.connection
            .list_all_storage_pools(0)
            .map_err(libvirt_error)?
            .into_iter()
            .map(|pool| self.wrap_pool(pool))
            .collect()
    }

    #[instrument(skip(self, source_xml), fields(pool_type = %pool_type))]
    async fn find_pool_sources(&self, pool_type: PoolType, source_xml: &str) -> Result<String> {
        debug!(source = %source_xml, "Finding pool sources");
        self.connection
            .find_storage_pool_sources(pool_type.as_str(), source_xml, 0)
            .map_err(libvirt_error)
    }

    async fn lookup_pool_by_name(&self, name: &str) -> Result<Option<Arc<dyn PoolHandle>>> {
        match VirtPool::lookup_by_name(&self.connection, name) {
            Ok(pool) => self.wrap_pool(pool).map(Some),
            Err(e) if e.code() == ErrorNumber::NoStoragePool => Ok(None),
            Err(e) => Err(libvirt_error(e)),
        }
    }

    #[instrument(skip(self, xml))]
    async fn define_pool(&self, xml: &str) -> Result<Arc<dyn PoolHandle>> {
        let pool = VirtPool::define_xml(&self.connection, xml, 0).map_err(libvirt_error)?;
        let handle = self.wrap_pool(pool)?;
        info!(pool = %handle.name(), "Storage pool defined");
        Ok(handle)
    }

    fn cache_new_pool(&self, pool: Arc<dyn PoolHandle>) {
        // Listings go straight to libvirt, nothing to update
        debug!(pool = %pool.name(), "New storage pool");
    }

    async fn lookup_volume_by_path(&self, path: &str) -> Result<Option<Arc<dyn VolumeHandle>>> {
        match StorageVol::lookup_by_path(&self.connection, path) {
            Ok(vol) => LibvirtVolume::wrap(self.connection.clone(), vol).map(Some),
            Err(e) if e.code() == ErrorNumber::NoStorageVol => Ok(None),
            Err(e) => Err(libvirt_error(e)),
        }
    }

    async fn supports_qcow2_lazy_refcounts(&self) -> bool {
        let Some(lib) = self.lib_version() else {
            return false;
        };
        if lib < LAZY_REFCOUNTS_LIBVIRT {
            return false;
        }
        if self.is_test_driver() {
            return true;
        }
        match self.connection.get_hyp_version() {
            Ok(hv) => hv >= LAZY_REFCOUNTS_QEMU,
            Err(e) => {
                debug!(error = %e, "Could not read hypervisor version");
                false
            }
        }
    }

    async fn supports_pool_metadata_prealloc(&self, pool: &dyn PoolHandle) -> bool {
        let version = self.lib_version();
        debug!(pool = %pool.name(), version = ?version.map(split_version), "Checking metadata prealloc support");
        version.map_or(false, |lib| lib >= PREALLOC_METADATA_LIBVIRT)
    }
}

/// A libvirt storage pool.
pub struct LibvirtPool {
    connection: Arc<Connect>,
    pool: VirtPool,
    name: String,
}

#[async_trait]
impl PoolHandle for LibvirtPool {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn info(&self) -> Result<PoolInfo> {
        let info = self.pool.get_info().map_err(libvirt_error)?;
        Ok(PoolInfo {
            state: PoolState::from_raw(info.state),
            capacity: info.capacity,
            allocation: info.allocation,
            available: info.available,
        })
    }

    #[instrument(skip(self), fields(pool = %self.name))]
    async fn start(&self) -> Result<()> {
        self.pool.create(0).map_err(libvirt_error)?;
        info!("Storage pool started");
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.pool.refresh(0).map_err(libvirt_error)?;
        Ok(())
    }

    async fn set_autostart(&self, autostart: bool) -> Result<()> {
        self.pool.set_autostart(autostart).map_err(libvirt_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(pool = %self.name))]
    async fn build(&self) -> Result<()> {
        self.pool.build(0).map_err(libvirt_error)?;
        info!("Storage pool built");
        Ok(())
    }

    #[instrument(skip(self), fields(pool = %self.name))]
    async fn undefine(&self) -> Result<()> {
        self.pool.undefine().map_err(libvirt_error)?;
        info!("Storage pool undefined");
        Ok(())
    }

    async fn xml_desc(&self) -> Result<String> {
        self.pool.get_xml_desc(0).map_err(libvirt_error)
    }

    #[instrument(skip(self, xml), fields(pool = %self.name, flags = flags.bits()))]
    async fn create_volume(&self, xml: &str, flags: VolumeCreateFlags) -> Result<Arc<dyn VolumeHandle>> {
        let vol = StorageVol::create_xml(&self.pool, xml, flags.bits()).map_err(libvirt_error)?;
        LibvirtVolume::wrap(self.connection.clone(), vol)
    }

    #[instrument(skip(self, xml, input), fields(pool = %self.name, flags = flags.bits()))]
    async fn clone_volume(
        &self,
        xml: &str,
        input: &dyn VolumeHandle,
        flags: VolumeCreateFlags,
    ) -> Result<Arc<dyn VolumeHandle>> {
        let input = input.as_any().downcast_ref::<LibvirtVolume>().ok_or_else(|| {
            StorageError::InvalidConfig("input volume must be a libvirt storage volume".to_string())
        })?;
        let vol = StorageVol::create_xml_from(&self.pool, xml, &input.vol, flags.bits())
            .map_err(libvirt_error)?;
        LibvirtVolume::wrap(self.connection.clone(), vol)
    }

    async fn lookup_volume(&self, name: &str) -> Result<Option<Arc<dyn VolumeHandle>>> {
        match StorageVol::lookup_by_name(&self.pool, name) {
            Ok(vol) => LibvirtVolume::wrap(self.connection.clone(), vol).map(Some),
            Err(e) if e.code() == ErrorNumber::NoStorageVol => Ok(None),
            Err(e) => Err(libvirt_error(e)),
        }
    }

    async fn list_volume_names(&self) -> Result<Vec<String>> {
        self.pool.list_volumes().map_err(libvirt_error)
    }
}

/// A libvirt storage volume.
pub struct LibvirtVolume {
    connection: Arc<Connect>,
    vol: StorageVol,
    name: String,
    path: String,
}

impl LibvirtVolume {
    fn wrap(connection: Arc<Connect>, vol: StorageVol) -> Result<Arc<dyn VolumeHandle>> {
        let name = vol.get_name().map_err(libvirt_error)?;
        let path = vol.get_path().map_err(libvirt_error)?;
        Ok(Arc::new(Self {
            connection,
            vol,
            name,
            path,
        }))
    }
}

#[async_trait]
impl VolumeHandle for LibvirtVolume {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    async fn info(&self) -> Result<VolumeInfo> {
        let info = self.vol.get_info().map_err(libvirt_error)?;
        Ok(VolumeInfo {
            kind: VolumeType::from_raw(info.kind as u32),
            capacity: info.capacity,
            allocation: info.allocation,
        })
    }

    async fn xml_desc(&self) -> Result<String> {
        self.vol.get_xml_desc(0).map_err(libvirt_error)
    }

    async fn pool(&self) -> Result<Arc<dyn PoolHandle>> {
        let pool = VirtPool::lookup_by_volume(&self.vol).map_err(libvirt_error)?;
        let name = pool.get_name().map_err(libvirt_error)?;
        Ok(Arc::new(LibvirtPool {
            connection: self.connection.clone(),
            pool,
            name,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
