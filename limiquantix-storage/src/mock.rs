//! Mock storage backend for testing and development.

use async_trait::async_trait;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::progress::ProgressMeter;
use crate::storage::normalize_path;
use crate::traits::{PoolHandle, StorageConnection, VolumeHandle};
use crate::types::*;
use crate::xml::{self, PoolDocument, SizeElement, VolumeDocument};

const DEFAULT_POOL_CAPACITY: u64 = 100 * 1024 * 1024 * 1024;

type PoolRegistry = RwLock<BTreeMap<String, Arc<MockPool>>>;

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Internal("Lock poisoned".to_string())
}

/// Operations the mock should fail, for exercising error paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFailures {
    pub define: bool,
    pub build: bool,
    pub start: bool,
    pub autostart: bool,
    pub undefine: bool,
    pub create_volume: bool,
}

/// Mock storage connection.
///
/// Keeps pools and volumes in memory without requiring libvirt. Useful for:
/// - Unit and integration testing
/// - Development without libvirt installed
pub struct MockConnection {
    uri: String,
    session: bool,
    test_driver: bool,
    lazy_refcounts: bool,
    metadata_prealloc: bool,
    config: StorageConfig,
    failures: MockFailures,
    create_delay: Duration,
    pools: Arc<PoolRegistry>,
    pool_sources: HashMap<PoolType, String>,
    source_requests: RwLock<Vec<String>>,
    cached: RwLock<Vec<String>>,
}

impl MockConnection {
    /// Create a mock system connection.
    pub fn new() -> Self {
        info!("Creating mock storage connection");
        Self {
            uri: "mock:///system".to_string(),
            session: false,
            test_driver: false,
            lazy_refcounts: true,
            metadata_prealloc: true,
            config: StorageConfig::default(),
            failures: MockFailures::default(),
            create_delay: Duration::ZERO,
            pools: Arc::new(RwLock::new(BTreeMap::new())),
            pool_sources: HashMap::new(),
            source_requests: RwLock::new(Vec::new()),
            cached: RwLock::new(Vec::new()),
        }
    }

    /// Create a mock per-user connection.
    pub fn session() -> Self {
        let mut conn = Self::new();
        conn.uri = "mock:///session".to_string();
        conn.session = true;
        conn
    }

    pub fn with_config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    /// Behave like libvirt's test driver.
    pub fn with_test_driver(mut self, test_driver: bool) -> Self {
        self.test_driver = test_driver;
        self
    }

    pub fn with_lazy_refcounts(mut self, supported: bool) -> Self {
        self.lazy_refcounts = supported;
        self
    }

    pub fn with_metadata_prealloc(mut self, supported: bool) -> Self {
        self.metadata_prealloc = supported;
        self
    }

    /// Failures applied to every pool created afterwards.
    pub fn with_failures(mut self, failures: MockFailures) -> Self {
        self.failures = failures;
        self
    }

    /// Time volume creation takes. Allocation grows in steps meanwhile.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// `<sources>` document returned by discovery for `pool_type`. Types
    /// without one report "not supported".
    pub fn with_pool_sources(mut self, pool_type: PoolType, sources_xml: impl Into<String>) -> Self {
        self.pool_sources.insert(pool_type, sources_xml.into());
        self
    }

    /// Register an existing pool.
    pub fn add_pool(&self, mut doc: PoolDocument, state: PoolState) -> Arc<MockPool> {
        doc.uuid.get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
        let pool = MockPool::new(doc, state, &self.pools, self.failures, self.create_delay);
        self.pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pool.name(), pool.clone());
        pool
    }

    pub fn pool(&self, name: &str) -> Option<Arc<MockPool>> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn pool_names(&self) -> Vec<String> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Names passed to `cache_new_pool`, in order.
    pub fn cached_pools(&self) -> Vec<String> {
        self.cached.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `<source>` descriptors passed to source discovery, in order.
    pub fn source_requests(&self) -> Vec<String> {
        self.source_requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageConnection for MockConnection {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn is_session(&self) -> bool {
        self.session
    }

    fn is_test_driver(&self) -> bool {
        self.test_driver
    }

    fn storage_config(&self) -> &StorageConfig {
        &self.config
    }

    async fn list_all_pools(&self) -> Result<Vec<Arc<dyn PoolHandle>>> {
        let pools = self.pools.read().map_err(poisoned)?;
        Ok(pools
            .values()
            .map(|pool| pool.clone() as Arc<dyn PoolHandle>)
            .collect())
    }

    async fn find_pool_sources(&self, pool_type: PoolType, source_xml: &str) -> Result<String> {
        self.source_requests
            .write()
            .map_err(poisoned)?
            .push(source_xml.to_string());

        self.pool_sources.get(&pool_type).cloned().ok_or_else(|| {
            StorageError::NotSupported(format!("source discovery for {} pools", pool_type))
        })
    }

    async fn lookup_pool_by_name(&self, name: &str) -> Result<Option<Arc<dyn PoolHandle>>> {
        let pools = self.pools.read().map_err(poisoned)?;
        Ok(pools.get(name).map(|pool| pool.clone() as Arc<dyn PoolHandle>))
    }

    #[instrument(skip(self, xml))]
    async fn define_pool(&self, xml: &str) -> Result<Arc<dyn PoolHandle>> {
        if self.failures.define {
            return Err(StorageError::Libvirt("mock: define failed".to_string()));
        }

        let mut doc: PoolDocument = xml::from_xml(xml)?;
        let name = doc
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| StorageError::Libvirt("missing pool name".to_string()))?;
        doc.uuid.get_or_insert_with(|| uuid::Uuid::new_v4().to_string());

        let mut pools = self.pools.write().map_err(poisoned)?;
        if pools.contains_key(&name) {
            return Err(StorageError::Libvirt(format!("pool '{}' already exists", name)));
        }

        let pool = MockPool::new(doc, PoolState::Inactive, &self.pools, self.failures, self.create_delay);
        pools.insert(name.clone(), pool.clone());

        info!(pool = %name, "Defined mock storage pool");
        Ok(pool as Arc<dyn PoolHandle>)
    }

    fn cache_new_pool(&self, pool: Arc<dyn PoolHandle>) {
        self.cached
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pool.name());
    }

    async fn lookup_volume_by_path(&self, path: &str) -> Result<Option<Arc<dyn VolumeHandle>>> {
        let wanted = normalize_path(path);
        let pools = self.pools.read().map_err(poisoned)?;
        for pool in pools.values() {
            let volumes = pool.volumes.read().map_err(poisoned)?;
            if let Some(vol) = volumes.values().find(|v| normalize_path(&v.path) == wanted) {
                return Ok(Some(vol.clone() as Arc<dyn VolumeHandle>));
            }
        }
        Ok(None)
    }

    async fn supports_qcow2_lazy_refcounts(&self) -> bool {
        self.lazy_refcounts
    }

    async fn supports_pool_metadata_prealloc(&self, _pool: &dyn PoolHandle) -> bool {
        self.metadata_prealloc
    }
}

/// In-memory storage pool.
pub struct MockPool {
    me: Weak<MockPool>,
    registry: Weak<PoolRegistry>,
    doc: RwLock<PoolDocument>,
    state: RwLock<PoolState>,
    autostart: AtomicBool,
    built: AtomicBool,
    capacity: AtomicU64,
    available: AtomicU64,
    refreshes: AtomicU32,
    failures: MockFailures,
    create_delay: Duration,
    volumes: RwLock<BTreeMap<String, Arc<MockVolume>>>,
    last_create_flags: RwLock<Option<VolumeCreateFlags>>,
}

impl MockPool {
    fn new(
        doc: PoolDocument,
        state: PoolState,
        registry: &Arc<PoolRegistry>,
        failures: MockFailures,
        create_delay: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry: Arc::downgrade(registry),
            doc: RwLock::new(doc),
            state: RwLock::new(state),
            autostart: AtomicBool::new(false),
            built: AtomicBool::new(false),
            capacity: AtomicU64::new(DEFAULT_POOL_CAPACITY),
            available: AtomicU64::new(DEFAULT_POOL_CAPACITY),
            refreshes: AtomicU32::new(0),
            failures,
            create_delay,
            volumes: RwLock::new(BTreeMap::new()),
            last_create_flags: RwLock::new(None),
        })
    }

    pub fn state(&self) -> PoolState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_autostart(&self) -> bool {
        self.autostart.load(Ordering::SeqCst)
    }

    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Set free space, growing the capacity if needed.
    pub fn set_available(&self, bytes: u64) {
        self.available.store(bytes, Ordering::SeqCst);
        self.capacity.fetch_max(bytes, Ordering::SeqCst);
    }

    /// Flags of the most recent create or clone call.
    pub fn last_create_flags(&self) -> Option<VolumeCreateFlags> {
        *self.last_create_flags.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a fully allocated volume.
    pub fn add_volume(&self, doc: VolumeDocument) -> Arc<MockVolume> {
        let capacity = doc.capacity.as_ref().map(SizeElement::as_bytes).unwrap_or(0);
        let allocation = doc.allocation.as_ref().map(SizeElement::as_bytes).unwrap_or(capacity);
        let vol = self.make_volume(doc, allocation, None);
        self.volumes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(vol.name.clone(), vol.clone());
        vol
    }

    pub fn volume(&self, name: &str) -> Option<Arc<MockVolume>> {
        self.volumes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn pool_type(&self) -> PoolType {
        self.doc.read().unwrap_or_else(PoisonError::into_inner).kind
    }

    fn volume_path(&self, name: &str) -> String {
        let doc = self.doc.read().unwrap_or_else(PoisonError::into_inner);
        match doc.target.path.as_deref() {
            Some(target) => Path::new(target).join(name).to_string_lossy().into_owned(),
            None => name.to_string(),
        }
    }

    fn make_volume(&self, mut doc: VolumeDocument, allocation: u64, cloned_from: Option<String>) -> Arc<MockVolume> {
        let name = doc.name.clone().unwrap_or_default();
        let path = self.volume_path(&name);
        let kind = doc.kind.unwrap_or_else(|| self.pool_type().disk_type());

        doc.kind = Some(kind);
        doc.key = Some(path.clone());
        doc.target.path = Some(path.clone());

        Arc::new(MockVolume {
            name,
            path,
            kind,
            capacity: doc.capacity.as_ref().map(SizeElement::as_bytes).unwrap_or(0),
            allocation: AtomicU64::new(allocation),
            doc,
            pool: self.me.clone(),
            cloned_from,
        })
    }

    fn record_flags(&self, flags: VolumeCreateFlags) -> Result<()> {
        *self.last_create_flags.write().map_err(poisoned)? = Some(flags);
        Ok(())
    }

    /// Register a new volume and simulate its allocation growing.
    async fn create(&self, doc: VolumeDocument, cloned_from: Option<String>) -> Result<Arc<dyn VolumeHandle>> {
        if self.failures.create_volume {
            return Err(StorageError::Libvirt("mock: volume creation failed".to_string()));
        }
        if self.state() != PoolState::Running {
            return Err(StorageError::Libvirt(format!("storage pool '{}' is not active", self.name())));
        }
        let name = doc
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| StorageError::Libvirt("missing volume name".to_string()))?;

        let capacity = doc.capacity.as_ref().map(SizeElement::as_bytes).unwrap_or(0);
        let target = doc.allocation.as_ref().map(SizeElement::as_bytes).unwrap_or(capacity);

        let vol = {
            let mut volumes = self.volumes.write().map_err(poisoned)?;
            if volumes.contains_key(&name) {
                return Err(StorageError::Libvirt(format!("storage volume '{}' exists already", name)));
            }
            let vol = self.make_volume(doc, 0, cloned_from);
            volumes.insert(name.clone(), vol.clone());
            vol
        };

        if self.create_delay.is_zero() {
            vol.allocation.store(target, Ordering::SeqCst);
        } else {
            // Allocation grows in steps, then the image is finalized
            const STEPS: u32 = 4;
            let pause = self.create_delay / (STEPS + 1);
            for step in 1..STEPS {
                tokio::time::sleep(pause).await;
                vol.allocation.store(target / u64::from(STEPS) * u64::from(step), Ordering::SeqCst);
            }
            tokio::time::sleep(pause).await;
            vol.allocation.store(target, Ordering::SeqCst);
            tokio::time::sleep(pause).await;
        }

        let available = self.available.load(Ordering::SeqCst);
        self.available.store(available.saturating_sub(target), Ordering::SeqCst);

        debug!(volume = %name, allocation = target, "Created mock storage volume");
        Ok(vol as Arc<dyn VolumeHandle>)
    }
}

#[async_trait]
impl PoolHandle for MockPool {
    fn name(&self) -> String {
        self.doc
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone()
            .unwrap_or_default()
    }

    async fn info(&self) -> Result<PoolInfo> {
        let capacity = self.capacity.load(Ordering::SeqCst);
        let available = self.available.load(Ordering::SeqCst);
        Ok(PoolInfo {
            state: *self.state.read().map_err(poisoned)?,
            capacity,
            allocation: capacity.saturating_sub(available),
            available,
        })
    }

    async fn start(&self) -> Result<()> {
        if self.failures.start {
            return Err(StorageError::Libvirt("mock: start failed".to_string()));
        }
        *self.state.write().map_err(poisoned)? = PoolState::Running;
        info!(pool = %self.name(), "Started mock storage pool");
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        if self.state() != PoolState::Running {
            return Err(StorageError::Libvirt(format!("storage pool '{}' is not active", self.name())));
        }
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_autostart(&self, autostart: bool) -> Result<()> {
        if self.failures.autostart {
            return Err(StorageError::Libvirt("mock: autostart failed".to_string()));
        }
        self.autostart.store(autostart, Ordering::SeqCst);
        Ok(())
    }

    async fn build(&self) -> Result<()> {
        if self.failures.build {
            return Err(StorageError::Libvirt("mock: build failed".to_string()));
        }
        debug!(pool = %self.name(), "Built mock storage pool");
        self.built.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn undefine(&self) -> Result<()> {
        if self.failures.undefine {
            return Err(StorageError::Libvirt("mock: undefine failed".to_string()));
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.write().map_err(poisoned)?.remove(&self.name());
        }
        info!(pool = %self.name(), "Undefined mock storage pool");
        Ok(())
    }

    async fn xml_desc(&self) -> Result<String> {
        let mut doc = self.doc.read().map_err(poisoned)?.clone();
        let info = self.info().await?;
        doc.capacity = Some(SizeElement::bytes(info.capacity));
        doc.allocation = Some(SizeElement::bytes(info.allocation));
        doc.available = Some(SizeElement::bytes(info.available));
        xml::to_xml(&doc)
    }

    #[instrument(skip(self, xml), fields(pool = %self.name()))]
    async fn create_volume(&self, xml: &str, flags: VolumeCreateFlags) -> Result<Arc<dyn VolumeHandle>> {
        self.record_flags(flags)?;
        let doc: VolumeDocument = xml::from_xml(xml)?;
        self.create(doc, None).await
    }

    #[instrument(skip(self, xml, input), fields(pool = %self.name()))]
    async fn clone_volume(
        &self,
        xml: &str,
        input: &dyn VolumeHandle,
        flags: VolumeCreateFlags,
    ) -> Result<Arc<dyn VolumeHandle>> {
        let source = input
            .as_any()
            .downcast_ref::<MockVolume>()
            .ok_or_else(|| StorageError::Internal("input volume is not a mock volume".to_string()))?;
        self.record_flags(flags)?;

        let mut doc: VolumeDocument = xml::from_xml(xml)?;
        if doc.capacity.is_none() {
            doc.capacity = Some(SizeElement::bytes(source.capacity));
        }
        if doc.target.format.is_none() {
            doc.target.format = source.doc.target.format.clone();
        }
        self.create(doc, Some(source.name.clone())).await
    }

    async fn lookup_volume(&self, name: &str) -> Result<Option<Arc<dyn VolumeHandle>>> {
        let volumes = self.volumes.read().map_err(poisoned)?;
        Ok(volumes.get(name).map(|vol| vol.clone() as Arc<dyn VolumeHandle>))
    }

    async fn list_volume_names(&self) -> Result<Vec<String>> {
        Ok(self.volumes.read().map_err(poisoned)?.keys().cloned().collect())
    }
}

/// In-memory storage volume.
pub struct MockVolume {
    name: String,
    path: String,
    kind: VolumeType,
    capacity: u64,
    allocation: AtomicU64,
    doc: VolumeDocument,
    pool: Weak<MockPool>,
    cloned_from: Option<String>,
}

impl MockVolume {
    /// Name of the volume this one was cloned from.
    pub fn cloned_from(&self) -> Option<String> {
        self.cloned_from.clone()
    }

    pub fn allocation(&self) -> u64 {
        self.allocation.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VolumeHandle for MockVolume {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    async fn info(&self) -> Result<VolumeInfo> {
        Ok(VolumeInfo {
            kind: self.kind,
            capacity: self.capacity,
            allocation: self.allocation(),
        })
    }

    async fn xml_desc(&self) -> Result<String> {
        let mut doc = self.doc.clone();
        doc.capacity = Some(SizeElement::bytes(self.capacity));
        doc.allocation = Some(SizeElement::bytes(self.allocation()));
        xml::to_xml(&doc)
    }

    async fn pool(&self) -> Result<Arc<dyn PoolHandle>> {
        self.pool
            .upgrade()
            .map(|pool| pool as Arc<dyn PoolHandle>)
            .ok_or_else(|| StorageError::NotFound(format!("pool of volume '{}'", self.name)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Something reported to a [`RecordingMeter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterEvent {
    Start { size: u64, text: String },
    Update(u64),
    End(u64),
}

/// Progress meter that keeps every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingMeter {
    events: Mutex<Vec<MeterEvent>>,
}

impl RecordingMeter {
    pub fn events(&self) -> Vec<MeterEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, event: MeterEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl ProgressMeter for RecordingMeter {
    fn start(&self, size: u64, text: &str) {
        self.push(MeterEvent::Start { size, text: text.to_string() });
    }

    fn update(&self, value: u64) {
        self.push(MeterEvent::Update(value));
    }

    fn end(&self, value: u64) {
        self.push(MeterEvent::End(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_pool(name: &str) -> PoolDocument {
        let mut doc = PoolDocument::new(PoolType::Dir);
        doc.name = Some(name.to_string());
        doc.target.path = Some(format!("/srv/{}", name));
        doc
    }

    #[tokio::test]
    async fn test_define_assigns_uuid() {
        let conn = MockConnection::new();
        let pool = conn.define_pool(&xml::to_xml(&dir_pool("a")).unwrap()).await.unwrap();

        let doc: PoolDocument = xml::from_xml(&pool.xml_desc().await.unwrap()).unwrap();
        assert!(uuid::Uuid::parse_str(doc.uuid.as_deref().unwrap()).is_ok());
        assert_eq!(pool.info().await.unwrap().state, PoolState::Inactive);
    }

    #[tokio::test]
    async fn test_define_duplicate_fails() {
        let conn = MockConnection::new();
        let xml = xml::to_xml(&dir_pool("a")).unwrap();
        conn.define_pool(&xml).await.unwrap();
        assert!(conn.define_pool(&xml).await.is_err());
    }

    #[tokio::test]
    async fn test_undefine_removes_pool() {
        let conn = MockConnection::new();
        let pool = conn.add_pool(dir_pool("gone"), PoolState::Inactive);
        pool.undefine().await.unwrap();
        assert!(conn.lookup_pool_by_name("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_volume_in_inactive_pool_fails() {
        let conn = MockConnection::new();
        let pool = conn.add_pool(dir_pool("idle"), PoolState::Inactive);
        let result = pool
            .create_volume("<volume><name>v</name></volume>", VolumeCreateFlags::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_volume_consumes_space() {
        let conn = MockConnection::new();
        let pool = conn.add_pool(dir_pool("p"), PoolState::Running);
        pool.set_available(10_000);

        let vol = pool
            .create_volume(
                "<volume><name>v.img</name><capacity>4000</capacity></volume>",
                VolumeCreateFlags::default(),
            )
            .await
            .unwrap();

        assert_eq!(vol.path(), "/srv/p/v.img");
        assert_eq!(vol.info().await.unwrap().allocation, 4000);
        assert_eq!(pool.info().await.unwrap().available, 6000);
        assert_eq!(pool.list_volume_names().await.unwrap(), vec!["v.img".to_string()]);
    }

    #[tokio::test]
    async fn test_lookup_volume_by_path() {
        let conn = MockConnection::new();
        let pool = conn.add_pool(dir_pool("p"), PoolState::Running);
        let mut doc = VolumeDocument::default();
        doc.name = Some("base.qcow2".into());
        pool.add_volume(doc);

        let found = conn.lookup_volume_by_path("/srv/p//base.qcow2").await.unwrap().unwrap();
        assert_eq!(found.name(), "base.qcow2");
        assert_eq!(found.pool().await.unwrap().name(), "p");
        assert!(conn.lookup_volume_by_path("/srv/p/other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_source_discovery_not_supported() {
        let conn = MockConnection::new();
        let err = conn.find_pool_sources(PoolType::Disk, "<source/>").await.unwrap_err();
        assert!(err.is_not_supported());
        assert_eq!(conn.source_requests(), vec!["<source/>".to_string()]);
    }
}
