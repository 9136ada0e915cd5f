//! Storage pool definitions.
//!
//! A [`StoragePool`] wraps a `<pool>` document. `validate()` fills in the
//! type-dependent defaults libvirt needs (target path, source name, format)
//! and `install()` defines, builds, starts and autostarts the pool.
//!
//! ## Example
//!
//! ```rust,ignore
//! use limiquantix_storage::{PoolInstallOptions, PoolType, StoragePool, Host};
//!
//! let mut pool = StoragePool::new(conn.clone(), PoolType::Netfs);
//! pool.set_name("isos");
//! pool.add_host(Host::new("nfs.example.com"));
//! pool.set_source_path(Some("/export/isos".into()));
//!
//! pool.validate().await?;
//! let handle = pool.install(PoolInstallOptions::all()).await?;
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{normalize_path, preferred_default_pool_path, STORAGE_OBJECT_LABEL};
use crate::error::{Result, StorageError};
use crate::naming::{generate_name, validate_generic_name, NameOptions};
use crate::traits::{PoolHandle, StorageConnection};
use crate::types::{PoolInstallOptions, PoolProperty, PoolState, PoolType, SourcePathKind, VolumeType};
use crate::xml::{
    self, Auth, AuthSecret, FormatElement, Host, Initiator, NameAttr, PathAttr, Permissions,
    PoolDocument, PoolSource, SizeElement, SourceList,
};

/// Name of the pool libvirt tools fall back to.
pub const DEFAULT_POOL_NAME: &str = "default";

/// A libvirt storage pool definition.
#[derive(Clone)]
pub struct StoragePool {
    conn: Arc<dyn StorageConnection>,
    doc: PoolDocument,
}

impl fmt::Debug for StoragePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoragePool")
            .field("uri", &self.conn.uri())
            .field("doc", &self.doc)
            .finish()
    }
}

impl StoragePool {
    /// Create an empty pool definition of the given type.
    pub fn new(conn: Arc<dyn StorageConnection>, pool_type: PoolType) -> Self {
        Self {
            conn,
            doc: PoolDocument::new(pool_type),
        }
    }

    /// Parse an existing pool definition.
    pub fn from_xml(conn: Arc<dyn StorageConnection>, xml: &str) -> Result<Self> {
        Ok(Self {
            conn,
            doc: xml::from_xml(xml)?,
        })
    }

    /// Serialize the definition.
    pub fn to_xml(&self) -> Result<String> {
        xml::to_xml(&self.doc)
    }

    pub fn document(&self) -> &PoolDocument {
        &self.doc
    }

    pub fn connection(&self) -> &Arc<dyn StorageConnection> {
        &self.conn
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn pool_type(&self) -> PoolType {
        self.doc.kind
    }

    pub fn set_pool_type(&mut self, pool_type: PoolType) {
        self.doc.kind = pool_type;
    }

    pub fn name(&self) -> Option<&str> {
        self.doc.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.doc.name = Some(name.into());
    }

    pub fn uuid(&self) -> Option<&str> {
        self.doc.uuid.as_deref()
    }

    pub fn set_uuid(&mut self, uuid: Option<String>) {
        self.doc.uuid = uuid;
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

    pub fn available(&self) -> Option<u64> {
        self.doc.available.as_ref().map(SizeElement::as_bytes)
    }

    pub fn set_available(&mut self, bytes: Option<u64>) {
        self.doc.available = bytes.map(SizeElement::bytes);
    }

    pub fn format(&self) -> Option<&str> {
        self.doc.source.format.as_ref().map(|f| f.kind.as_str())
    }

    pub fn set_format(&mut self, format: Option<String>) {
        self.doc.source.format = format.map(|kind| FormatElement { kind });
    }

    pub fn hosts(&self) -> &[Host] {
        &self.doc.source.hosts
    }

    pub fn add_host(&mut self, host: Host) {
        self.doc.source.hosts.push(host);
    }

    pub fn clear_hosts(&mut self) {
        self.doc.source.hosts.clear();
    }

    /// Source path, read from the `<source>` child used by this pool type.
    pub fn source_path(&self) -> Option<&str> {
        let source = &self.doc.source;
        match self.doc.kind.source_path_kind() {
            SourcePathKind::Dir => source.dir.as_ref().map(|d| d.path.as_str()),
            SourcePathKind::Adapter => source.adapter.as_ref().map(|a| a.name.as_str()),
            SourcePathKind::Device => source.devices.first().map(|d| d.path.as_str()),
        }
    }

    pub fn set_source_path(&mut self, path: Option<String>) {
        let source = &mut self.doc.source;
        match self.doc.kind.source_path_kind() {
            SourcePathKind::Dir => source.dir = path.map(|path| PathAttr { path }),
            SourcePathKind::Adapter => source.adapter = path.map(|name| NameAttr { name }),
            SourcePathKind::Device => match (path, source.devices.first_mut()) {
                (Some(path), Some(first)) => first.path = path,
                (Some(path), None) => source.devices.push(PathAttr { path }),
                (None, _) => source.devices.clear(),
            },
        }
    }

    pub fn source_name(&self) -> Option<&str> {
        self.doc.source.name.as_deref()
    }

    pub fn set_source_name(&mut self, name: Option<String>) {
        self.doc.source.name = name;
    }

    /// iSCSI initiator IQN.
    pub fn iqn(&self) -> Option<&str> {
        self.doc.source.initiator.as_ref().map(|i| i.iqn.name.as_str())
    }

    pub fn set_iqn(&mut self, iqn: Option<String>) {
        self.doc.source.initiator = iqn.map(|name| Initiator { iqn: NameAttr { name } });
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

    pub fn auth_type(&self) -> Option<&str> {
        self.doc.source.auth.as_ref().and_then(|a| a.kind.as_deref())
    }

    pub fn set_auth_type(&mut self, kind: Option<String>) {
        self.auth_mut().kind = kind;
        self.prune_auth();
    }

    pub fn auth_username(&self) -> Option<&str> {
        self.doc.source.auth.as_ref().and_then(|a| a.username.as_deref())
    }

    pub fn set_auth_username(&mut self, username: Option<String>) {
        self.auth_mut().username = username;
        self.prune_auth();
    }

    pub fn auth_secret_uuid(&self) -> Option<&str> {
        self.doc
            .source
            .auth
            .as_ref()
            .and_then(|a| a.secret.as_ref())
            .and_then(|s| s.uuid.as_deref())
    }

    pub fn set_auth_secret_uuid(&mut self, uuid: Option<String>) {
        self.auth_mut().secret = uuid.map(|uuid| AuthSecret { uuid: Some(uuid) });
        self.prune_auth();
    }

    fn auth_mut(&mut self) -> &mut Auth {
        self.doc.source.auth.get_or_insert_with(Auth::default)
    }

    fn prune_auth(&mut self) {
        if self.doc.source.auth.as_ref() == Some(&Auth::default()) {
            self.doc.source.auth = None;
        }
    }

    // =========================================================================
    // Type-dependent helpers
    // =========================================================================

    /// Whether this pool's type exposes `property`.
    pub fn supports_property(&self, property: PoolProperty) -> bool {
        self.doc.kind.supports(property)
    }

    /// Storage class of volumes created in this pool.
    pub fn get_disk_type(&self) -> VolumeType {
        self.doc.kind.disk_type()
    }

    /// Target path libvirt should use when none was given.
    pub fn default_target_path(&self) -> Result<String> {
        let config = self.conn.storage_config();
        let name = self.name().unwrap_or_default();

        match self.doc.kind {
            PoolType::Dir | PoolType::Fs | PoolType::Netfs => {
                let root = preferred_default_pool_path(self.conn.as_ref());
                Ok(Path::new(&root).join(name).to_string_lossy().into_owned())
            }
            PoolType::Logical => {
                let vg = self.source_name().unwrap_or(name);
                Ok(format!("{}{}", config.lvm_target_base, vg))
            }
            PoolType::Disk => Ok(config.disk_target.clone()),
            PoolType::Iscsi | PoolType::Scsi => Ok(config.scsi_target.clone()),
            PoolType::Mpath => Ok(config.mpath_target.clone()),
            other => Err(StorageError::InvalidConfig(format!(
                "No default target_path for type={}",
                other
            ))),
        }
    }

    /// Source name libvirt should use when none was given.
    pub fn default_source_name(&self) -> Option<String> {
        if !self.supports_property(PoolProperty::SourceName) {
            return None;
        }

        match self.doc.kind {
            PoolType::Netfs => self.name().map(str::to_string),
            PoolType::Rbd => Some("rbd".to_string()),
            PoolType::Gluster => Some("gv0".to_string()),
            _ => {
                // A target like /dev/<vg> names the volume group
                let base = &self.conn.storage_config().lvm_target_base;
                self.target_path()
                    .and_then(|path| path.strip_prefix(base.as_str()))
                    .and_then(|vg| vg.split('/').next())
                    .map(str::to_string)
            }
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check `name` is syntactically valid and not used by another pool.
    pub async fn validate_name(conn: &dyn StorageConnection, name: &str) -> Result<()> {
        validate_generic_name(STORAGE_OBJECT_LABEL, name)?;

        if conn.lookup_pool_by_name(name).await?.is_some() {
            return Err(StorageError::NameInUse {
                kind: "pool",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Validate the definition, filling in type-dependent defaults.
    #[instrument(skip(self), fields(pool = ?self.name(), pool_type = %self.pool_type()))]
    pub async fn validate(&mut self) -> Result<()> {
        let name = self.name().unwrap_or_default().to_string();
        Self::validate_name(self.conn.as_ref(), &name).await?;

        if is_unset(self.target_path()) && self.supports_property(PoolProperty::TargetPath) {
            let path = self.default_target_path()?;
            self.set_target_path(Some(path));
        }
        if is_unset(self.source_name()) {
            let source_name = self.default_source_name();
            self.set_source_name(source_name);
        }
        if is_unset(self.format()) && self.supports_property(PoolProperty::Format) {
            self.set_format(Some("auto".to_string()));
        }

        if self.supports_property(PoolProperty::Hosts) && self.hosts().is_empty() {
            return Err(StorageError::MissingField("Hostname is required".to_string()));
        }
        if self.supports_property(PoolProperty::SourcePath)
            && self.pool_type() != PoolType::Logical
            && is_unset(self.source_path())
        {
            return Err(StorageError::MissingField("Source path is required".to_string()));
        }

        // libvirt has no explicit "auto" for disk pools, leaving the
        // format out probes existing partition tables
        if self.pool_type() == PoolType::Disk && self.format() == Some("auto") {
            self.set_format(None);
        }

        debug!(target_path = ?self.target_path(), source_name = ?self.source_name(), "Storage pool validated");
        Ok(())
    }

    // =========================================================================
    // Install
    // =========================================================================

    /// Define the pool and run the requested build/start/autostart steps.
    ///
    /// If any step after define fails the definition is removed again.
    #[instrument(skip(self), fields(pool = ?self.name(), pool_type = %self.pool_type()))]
    pub async fn install(&self, options: PoolInstallOptions) -> Result<Arc<dyn PoolHandle>> {
        if self.pool_type() == PoolType::Logical && options.build && is_unset(self.source_path()) {
            return Err(StorageError::InvalidConfig(
                "Must explicitly specify source path if building pool".to_string(),
            ));
        }
        if self.pool_type() == PoolType::Disk && options.build && self.format() == Some("auto") {
            return Err(StorageError::InvalidConfig(
                "Must explicitly specify disk format if formatting disk device.".to_string(),
            ));
        }

        let xml = self.to_xml()?;
        debug!(xml = %xml, "Creating storage pool");

        let pool = self
            .conn
            .define_pool(&xml)
            .await
            .map_err(|e| StorageError::DefineFailed(e.to_string()))?;

        if let Err(err) = Self::activate(pool.as_ref(), options).await {
            if let Err(cleanup) = pool.undefine().await {
                debug!(error = %cleanup, "Error cleaning up pool after failure");
            }
            return Err(err);
        }

        self.conn.cache_new_pool(pool.clone());

        info!("Storage pool installed");
        Ok(pool)
    }

    async fn activate(pool: &dyn PoolHandle, options: PoolInstallOptions) -> Result<()> {
        if options.build {
            pool.build()
                .await
                .map_err(|e| StorageError::BuildFailed(e.to_string()))?;
        }
        if options.create {
            pool.start()
                .await
                .map_err(|e| StorageError::StartFailed(e.to_string()))?;
        }
        if options.autostart {
            pool.set_autostart(true)
                .await
                .map_err(|e| StorageError::AutostartFailed(e.to_string()))?;
        }
        Ok(())
    }

    // =========================================================================
    // Connection-wide helpers
    // =========================================================================

    /// Parse the XML of every pool on the connection.
    pub async fn fetch_all_pools(conn: &Arc<dyn StorageConnection>) -> Result<Vec<StoragePool>> {
        let mut pools = Vec::new();
        for handle in conn.list_all_pools().await? {
            let xml = handle.xml_desc().await?;
            pools.push(StoragePool::from_xml(conn.clone(), &xml)?);
        }
        Ok(pools)
    }

    /// Pools of `pool_type` found by libvirt's source discovery, optionally
    /// probing `host`.
    ///
    /// Drivers that can't enumerate sources yield an empty list.
    #[instrument(skip(conn), fields(uri = %conn.uri()))]
    pub async fn pool_list_from_sources(
        conn: &Arc<dyn StorageConnection>,
        pool_type: PoolType,
        host: Option<&str>,
    ) -> Result<Vec<StoragePool>> {
        let mut stub = PoolSource::default();
        if let Some(host) = host {
            stub.hosts.push(Host::new(host));
        }
        let source_xml = xml::to_xml(&stub)?;

        let sources_xml = match conn.find_pool_sources(pool_type, &source_xml).await {
            Ok(xml) => xml,
            Err(e) if e.is_not_supported() => {
                debug!(error = %e, "Pool source enumeration not supported");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let list: SourceList = xml::from_xml(&sources_xml)?;
        let pools = list
            .sources
            .into_iter()
            .map(|source| {
                let mut parsed = StoragePool::new(conn.clone(), pool_type);
                parsed.doc.source = source;

                let mut pool = StoragePool::new(conn.clone(), pool_type);
                pool.set_source_path(parsed.source_path().map(str::to_string));
                for host in parsed.doc.source.hosts.drain(..) {
                    pool.add_host(host);
                }
                pool.set_source_name(parsed.source_name().map(str::to_string));
                pool.set_format(parsed.format().map(str::to_string));
                pool
            })
            .collect::<Vec<_>>();

        debug!(count = pools.len(), "Enumerated pool sources");
        Ok(pools)
    }

    async fn lookup_by_target_path(
        conn: &Arc<dyn StorageConnection>,
        path: &str,
    ) -> Result<Option<StoragePool>> {
        let wanted = normalize_path(path);
        Ok(Self::fetch_all_pools(conn)
            .await?
            .into_iter()
            .find(|pool| pool.target_path().map(normalize_path).as_ref() == Some(&wanted)))
    }

    /// The pool named "default", or else the pool at the default path.
    async fn lookup_default_pool(conn: &Arc<dyn StorageConnection>) -> Result<Option<StoragePool>> {
        let by_name = Self::fetch_all_pools(conn)
            .await?
            .into_iter()
            .find(|pool| pool.name() == Some(DEFAULT_POOL_NAME));

        let pool = match by_name {
            Some(pool) => Some(pool),
            None => {
                let path = preferred_default_pool_path(conn.as_ref());
                Self::lookup_by_target_path(conn, &path).await?
            }
        };

        if let Some(pool) = &pool {
            debug!(name = ?pool.name(), target = ?pool.target_path(), "Found default pool");
        }
        Ok(pool)
    }

    /// Look up the default pool, creating it when `build` is set.
    ///
    /// The new pool is a directory pool named "default" at
    /// [`preferred_default_pool_path`], built, started and autostarted.
    #[instrument(skip(conn), fields(uri = %conn.uri()))]
    pub async fn build_default_pool(
        conn: &Arc<dyn StorageConnection>,
        build: bool,
    ) -> Result<Option<StoragePool>> {
        if let Some(pool) = Self::lookup_default_pool(conn).await? {
            return Ok(Some(pool));
        }
        if !build {
            return Ok(None);
        }

        let path = preferred_default_pool_path(conn.as_ref());
        debug!(path = %path, "Attempting to build default pool");

        let mut pool = StoragePool::new(conn.clone(), PoolType::Dir);
        pool.set_name(DEFAULT_POOL_NAME);
        pool.set_target_path(Some(path.clone()));

        pool.install(PoolInstallOptions::all())
            .await
            .map_err(|e| StorageError::DefaultPoolFailed {
                path,
                reason: e.to_string(),
            })?;

        Ok(Some(pool))
    }

    /// First pool, active or inactive, whose target path is `path`.
    ///
    /// Dumps the XML of every pool, so it is not quick.
    pub async fn lookup_pool_by_path(
        conn: &Arc<dyn StorageConnection>,
        path: &str,
    ) -> Result<Option<Arc<dyn PoolHandle>>> {
        let Some(pool) = Self::lookup_by_target_path(conn, path).await? else {
            return Ok(None);
        };
        let name = pool.name().unwrap_or_default();
        conn.lookup_pool_by_name(name).await
    }

    /// A name based on `basename` not used by any pool.
    pub async fn find_free_name(
        conn: &Arc<dyn StorageConnection>,
        basename: &str,
        options: &NameOptions,
    ) -> Result<String> {
        let taken: Vec<String> = conn
            .list_all_pools()
            .await?
            .iter()
            .map(|pool| pool.name())
            .collect();
        generate_name(basename, |name| taken.iter().any(|t| t == name), options)
    }

    /// Start `pool` if it isn't running, optionally refreshing it.
    pub async fn ensure_pool_is_running(pool: &dyn PoolHandle, refresh: bool) -> Result<()> {
        if pool.info().await?.state != PoolState::Running {
            debug!(pool = %pool.name(), "Starting pool");
            pool.start().await?;
        }
        if refresh {
            debug!(pool = %pool.name(), "Refreshing pool");
            pool.refresh().await?;
        }
        Ok(())
    }
}

fn is_unset(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}
