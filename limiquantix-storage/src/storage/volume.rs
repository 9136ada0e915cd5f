//! Storage volume definitions.
//!
//! A [`StorageVolume`] wraps a `<volume>` document and is installed into a
//! live pool, either as a fresh volume or as a clone of an input volume.
//! Creation can take a long time for preallocated images, so `install()`
//! optionally reports the growing allocation to a [`ProgressMeter`].

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{StoragePool, STORAGE_OBJECT_LABEL};
use crate::error::{Result, StorageError};
use crate::naming::{generate_name, validate_generic_name, NameOptions};
use crate::progress::{ensure_meter, spawn_allocation_poller, Completion, ProgressMeter};
use crate::traits::{PoolHandle, StorageConnection, VolumeHandle};
use crate::types::{PoolType, VolumeCreateFlags, VolumeProperty, VolumeType};
use crate::xml::{
    self, BackingStore, Flag, FormatElement, Permissions, SizeElement, VolumeDocument,
    VolumeFeatures,
};

const MIB: u64 = 1024 * 1024;

/// Outcome of comparing a volume's size with its pool's free space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeConflict {
    /// Fits.
    None,
    /// Fits now, but won't once the volume is fully allocated.
    Warning(String),
    /// The requested allocation doesn't fit.
    Fatal(String),
}

impl SizeConflict {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SizeConflict::Fatal(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            SizeConflict::None => None,
            SizeConflict::Warning(msg) | SizeConflict::Fatal(msg) => Some(msg),
        }
    }
}

/// A libvirt storage volume definition.
pub struct StorageVolume {
    conn: Arc<dyn StorageConnection>,
    doc: VolumeDocument,
    pool: Option<Arc<dyn PoolHandle>>,
    pool_xml: Option<StoragePool>,
    input_vol: Option<Arc<dyn VolumeHandle>>,
    reflink: bool,
}

impl fmt::Debug for StorageVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageVolume")
            .field("doc", &self.doc)
            .field("pool", &self.pool.as_ref().map(|p| p.name()))
            .field("input_vol", &self.input_vol.as_ref().map(|v| v.name()))
            .field("reflink", &self.reflink)
            .finish()
    }
}

impl StorageVolume {
    pub fn new(conn: Arc<dyn StorageConnection>) -> Self {
        Self {
            conn,
            doc: VolumeDocument::default(),
            pool: None,
            pool_xml: None,
            input_vol: None,
            reflink: false,
        }
    }

    /// Parse an existing volume definition.
    pub fn from_xml(conn: Arc<dyn StorageConnection>, xml: &str) -> Result<Self> {
        let mut vol = Self::new(conn);
        vol.doc = xml::from_xml(xml)?;
        Ok(vol)
    }

    pub fn to_xml(&self) -> Result<String> {
        xml::to_xml(&self.doc)
    }

    pub fn document(&self) -> &VolumeDocument {
        &self.doc
    }

    /// File extension conventionally used for an image format.
    pub fn get_file_extension_for_format(format: Option<&str>) -> String {
        match format {
            None | Some("") => String::new(),
            Some("raw") => ".img".to_string(),
            Some(fmt) => format!(".{}", fmt),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Explicit `type` attribute.
    pub fn kind(&self) -> Option<VolumeType> {
        self.doc.kind
    }

    pub fn set_kind(&mut self, kind: Option<VolumeType>) {
        self.doc.kind = kind;
    }

    pub fn name(&self) -> Option<&str> {
        self.doc.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.doc.name = Some(name.into());
    }

    pub fn key(&self) -> Option<&str> {
        self.doc.key.as_deref()
    }

    pub fn capacity(&self) -> Option<u64> {
        self.doc.capacity.as_ref().map(SizeElement::as_bytes)
    }

    pub fn set_capacity(&mut self, bytes: Option<u64>) {
        self.doc.capacity = bytes.map(SizeElement::bytes);
    }

    pub fn allocation(&self) -> Option<u64> {
        self.doc.allocation.as_ref().map(SizeElement::as_bytes)
    }

    pub fn set_allocation(&mut self, bytes: Option<u64>) {
        self.doc.allocation = bytes.map(SizeElement::bytes);
    }

    pub fn format(&self) -> Option<&str> {
        self.doc.target.format.as_ref().map(|f| f.kind.as_str())
    }

    pub fn set_format(&mut self, format: Option<String>) {
        self.doc.target.format = format.map(|kind| FormatElement { kind });
    }

    pub fn target_path(&self) -> Option<&str> {
        self.doc.target.path.as_deref()
    }

    pub fn set_target_path(&mut self, path: Option<String>) {
        self.doc.target.path = path;
    }

    pub fn permissions(&self) -> Option<&Permissions> {
        self.doc.target.permissions.as_ref()
    }

    pub fn set_permissions(&mut self, permissions: Option<Permissions>) {
        self.doc.target.permissions = permissions;
    }

    pub fn backing_store(&self) -> Option<&str> {
        self.doc.backing_store.as_ref().and_then(|b| b.path.as_deref())
    }

    pub fn set_backing_store(&mut self, path: Option<String>) {
        self.backing_mut().path = path;
        self.prune_backing();
    }

    pub fn backing_format(&self) -> Option<&str> {
        self.doc
            .backing_store
            .as_ref()
            .and_then(|b| b.format.as_ref())
            .map(|f| f.kind.as_str())
    }

    pub fn set_backing_format(&mut self, format: Option<String>) {
        self.backing_mut().format = format.map(|kind| FormatElement { kind });
        self.prune_backing();
    }

    fn backing_mut(&mut self) -> &mut BackingStore {
        self.doc.backing_store.get_or_insert_with(BackingStore::default)
    }

    fn prune_backing(&mut self) {
        if self.doc.backing_store.as_ref() == Some(&BackingStore::default()) {
            self.doc.backing_store = None;
        }
    }

    /// qcow2 lazy refcounts. `None` until explicitly set.
    pub fn lazy_refcounts(&self) -> Option<bool> {
        self.doc
            .target
            .features
            .as_ref()
            .map(|features| features.lazy_refcounts.is_some())
    }

    pub fn set_lazy_refcounts(&mut self, enabled: Option<bool>) {
        self.doc.target.features = enabled.map(|on| VolumeFeatures {
            lazy_refcounts: on.then(Flag::default),
        });
    }

    // =========================================================================
    // Associated objects
    // =========================================================================

    pub fn pool(&self) -> Option<&Arc<dyn PoolHandle>> {
        self.pool.as_ref()
    }

    /// Associate the volume with `pool`, starting it if needed and
    /// snapshotting its XML.
    pub async fn set_pool(&mut self, pool: Arc<dyn PoolHandle>) -> Result<()> {
        StoragePool::ensure_pool_is_running(pool.as_ref(), false).await?;
        let xml = pool.xml_desc().await?;
        self.pool_xml = Some(StoragePool::from_xml(self.conn.clone(), &xml)?);
        self.pool = Some(pool);
        Ok(())
    }

    pub fn input_vol(&self) -> Option<&Arc<dyn VolumeHandle>> {
        self.input_vol.as_ref()
    }

    /// Volume to clone from on install.
    pub fn set_input_vol(&mut self, vol: Option<Arc<dyn VolumeHandle>>) {
        self.input_vol = vol;
    }

    pub fn reflink(&self) -> bool {
        self.reflink
    }

    pub fn set_reflink(&mut self, reflink: bool) {
        self.reflink = reflink;
    }

    /// Copy format, capacity and allocation from the input volume. Unless
    /// `only_format` is set, also move to the input volume's pool.
    pub async fn sync_input_vol(&mut self, only_format: bool) -> Result<()> {
        let input = self.input_vol.clone().ok_or_else(|| {
            StorageError::InvalidConfig("No input volume to sync from".to_string())
        })?;

        let parsed = StorageVolume::from_xml(self.conn.clone(), &input.xml_desc().await?)?;
        self.set_format(parsed.format().map(str::to_string));
        self.set_capacity(parsed.capacity());
        self.set_allocation(parsed.allocation());

        if only_format {
            return Ok(());
        }
        let pool = input.pool().await?;
        self.set_pool(pool).await
    }

    /// Volume storage class: the explicit type, else what the pool produces.
    pub fn file_type(&self) -> VolumeType {
        self.doc.kind.unwrap_or_else(|| {
            self.pool_xml
                .as_ref()
                .map(StoragePool::get_disk_type)
                .unwrap_or(VolumeType::File)
        })
    }

    pub fn supports_property(&self, property: VolumeProperty) -> bool {
        match property {
            VolumeProperty::Format => {
                self.file_type() == VolumeType::File
                    || self.pool_xml.as_ref().map(StoragePool::pool_type) == Some(PoolType::Gluster)
            }
            _ => true,
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check `name` is syntactically valid and free in `pool`.
    pub async fn validate_name(pool: &dyn PoolHandle, name: &str) -> Result<()> {
        validate_generic_name(STORAGE_OBJECT_LABEL, name)?;

        if pool.lookup_volume(name).await?.is_some() {
            return Err(StorageError::NameInUse {
                kind: "volume",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn require_pool(&self) -> Result<Arc<dyn PoolHandle>> {
        self.pool.clone().ok_or_else(|| {
            StorageError::InvalidConfig("A storage pool must be set for the volume".to_string())
        })
    }

    /// Validate the definition, filling in format defaults.
    #[instrument(skip(self), fields(volume = ?self.name()))]
    pub async fn validate(&mut self) -> Result<()> {
        let pool = self.require_pool()?;
        Self::validate_name(pool.as_ref(), self.name().unwrap_or_default()).await?;

        if self.format().map_or(true, str::is_empty) && self.file_type() == VolumeType::File {
            self.set_format(Some("raw".to_string()));
        }
        if self.lazy_refcounts().is_none() && self.format() == Some("qcow2") {
            let supported = self.conn.supports_qcow2_lazy_refcounts().await;
            self.set_lazy_refcounts(Some(supported));
        }

        let is_logical = self.pool_xml.as_ref().map(StoragePool::pool_type) == Some(PoolType::Logical);
        if is_logical && self.allocation() != self.capacity() {
            warn!("Sparse logical volumes are not supported, setting allocation equal to capacity");
            let capacity = self.capacity();
            self.set_allocation(capacity);
        }

        match self.is_size_conflict().await? {
            SizeConflict::Fatal(msg) => return Err(StorageError::SizeConflict(msg)),
            SizeConflict::Warning(msg) => warn!("{}", msg),
            SizeConflict::None => {}
        }
        Ok(())
    }

    /// Compare the requested sizes with the pool's available space.
    pub async fn is_size_conflict(&self) -> Result<SizeConflict> {
        let Some(pool) = &self.pool else {
            return Ok(SizeConflict::None);
        };

        let available = pool.info().await?.available;
        let allocation = self.allocation().unwrap_or(0);
        let capacity = self.capacity().unwrap_or(0);

        if allocation > available {
            return Ok(SizeConflict::Fatal(format!(
                "There is not enough free space on the storage pool to create the volume. \
                 ({} M requested allocation > {} M available)",
                allocation / MIB,
                available / MIB
            )));
        }
        if capacity > available {
            return Ok(SizeConflict::Warning(format!(
                "The requested volume capacity will exceed the available pool space when \
                 the volume is fully allocated. ({} M requested capacity > {} M available)",
                capacity / MIB,
                available / MIB
            )));
        }
        Ok(SizeConflict::None)
    }

    // =========================================================================
    // Install
    // =========================================================================

    /// Format of the volume backing this one, if libvirt manages it and the
    /// format is meaningful.
    pub async fn detect_backing_store_format(&self) -> Result<Option<String>> {
        let Some(backing) = self.backing_store() else {
            return Ok(None);
        };
        debug!(backing_store = %backing, "Attempting to detect format for backing store");

        let Some(vol) = self.conn.lookup_volume_by_path(backing).await? else {
            debug!("Didn't find any volume for backing store");
            return Ok(None);
        };

        let mut backing_vol = StorageVolume::from_xml(self.conn.clone(), &vol.xml_desc().await?)?;
        backing_vol.set_pool(vol.pool().await?).await?;

        if backing_vol.supports_property(VolumeProperty::Format) {
            debug!(format = ?backing_vol.format(), "Detected backing store format");
            return Ok(backing_vol.format().map(str::to_string));
        }

        debug!("Backing store volume has no file format we can specify");
        Ok(None)
    }

    /// Create the volume in its pool, cloning from the input volume if set.
    ///
    /// When a meter is given, a background task reports allocation while
    /// libvirt creates the volume. The task has finished when this returns.
    #[instrument(skip(self, meter), fields(volume = ?self.name()))]
    pub async fn install(&mut self, meter: Option<Arc<dyn ProgressMeter>>) -> Result<Arc<dyn VolumeHandle>> {
        let pool = self.require_pool()?;

        if self.backing_store().is_some() && self.backing_format().is_none() {
            let format = self.detect_backing_store_format().await?;
            self.set_backing_format(format);
        }

        let name = self.name().unwrap_or_default().to_string();
        let xml = self.to_xml()?;
        debug!(xml = %xml, "Creating storage volume");

        let mut create_flags = VolumeCreateFlags::default();
        let mut clone_flags = VolumeCreateFlags::default();
        if self.format() == Some("qcow2")
            && self.backing_store().is_none()
            && !self.conn.is_test_driver()
            && self.conn.supports_pool_metadata_prealloc(pool.as_ref()).await
        {
            create_flags.prealloc_metadata = true;
            // Makes libvirt+qemu-img preallocate the cloned image
            if self.capacity() == self.allocation() {
                clone_flags.prealloc_metadata = true;
            }
        }
        if self.reflink {
            clone_flags.reflink = true;
        }

        let completion = Completion::new();
        let poller = meter.as_ref().map(|meter| {
            spawn_allocation_poller(
                pool.clone(),
                name.clone(),
                meter.clone(),
                completion.subscribe(),
                self.conn.storage_config().progress.clone(),
            )
        });

        let meter = ensure_meter(meter);
        let capacity = self.capacity().unwrap_or(0);
        meter.start(capacity, &format!("Allocating '{}'", name));

        let result = match &self.input_vol {
            Some(input) => {
                debug!(input = %input.name(), flags = clone_flags.bits(), "Cloning storage volume");
                pool.clone_volume(&xml, input.as_ref(), clone_flags).await
            }
            None => {
                debug!(flags = create_flags.bits(), "Using vol create flags");
                pool.create_volume(&xml, create_flags).await
            }
        };

        completion.set();
        if let Some(poller) = poller {
            if let Err(e) = poller.await {
                debug!(error = %e, "Allocation progress task failed");
            }
        }

        match result {
            Ok(vol) => {
                meter.end(capacity);
                info!(path = %vol.path(), "Storage volume installed");
                Ok(vol)
            }
            Err(e) => {
                debug!(error = %e, "Error creating storage volume");
                Err(StorageError::VolumeCreateFailed {
                    name,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// A volume name based on `basename` not used in `pool`.
    ///
    /// The pool is started and refreshed first so the name list is current.
    pub async fn find_free_name(
        pool: &dyn PoolHandle,
        basename: &str,
        options: &NameOptions,
    ) -> Result<String> {
        StoragePool::ensure_pool_is_running(pool, true).await?;
        let taken = pool.list_volume_names().await?;
        generate_name(basename, |name| taken.iter().any(|t| t == name), options)
    }
}
