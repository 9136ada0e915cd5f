//! Integration tests for pool and volume flows.
//!
//! These tests drive the public API end to end against the mock connection.

use std::sync::Arc;
use std::time::Duration;

use limiquantix_common::try_init_logging;
use limiquantix_storage::mock::{MeterEvent, RecordingMeter};
use limiquantix_storage::xml::{FormatElement, PoolDocument, SizeElement, VolumeDocument};
use limiquantix_storage::{
    Host, MockConnection, MockFailures, PoolInstallOptions, PoolState, PoolType, ProgressConfig,
    StorageConfig, StorageConnection, StorageError, StoragePool, StorageVolume, VolumeCreateFlags,
    VolumeHandle,
};

const GIB: u64 = 1024 * 1024 * 1024;

fn fast_progress() -> StorageConfig {
    StorageConfig {
        progress: ProgressConfig {
            lookup_retry_ms: 5,
            max_lookup_attempts: 200,
            poll_interval_ms: 10,
        },
        ..StorageConfig::default()
    }
}

fn dir_pool(mock: &MockConnection, name: &str, target: &str) -> Arc<limiquantix_storage::mock::MockPool> {
    let mut doc = PoolDocument::new(PoolType::Dir);
    doc.name = Some(name.to_string());
    doc.target.path = Some(target.to_string());
    mock.add_pool(doc, PoolState::Running)
}

/// A session connection without any pool gets a fresh "default" pool under
/// the user's home.
#[tokio::test]
async fn test_build_default_pool_on_session() {
    try_init_logging("debug");
    let mock = Arc::new(MockConnection::session());
    let conn: Arc<dyn StorageConnection> = mock.clone();

    let pool = StoragePool::build_default_pool(&conn, true)
        .await
        .expect("default pool")
        .expect("pool was built");

    let expected = conn.storage_config().expanded_session_pool_path();
    assert_eq!(pool.name(), Some("default"));
    assert_eq!(pool.pool_type(), PoolType::Dir);
    assert_eq!(pool.target_path(), Some(expected.as_str()));

    let live = mock.pool("default").expect("pool defined");
    assert!(live.is_built());
    assert!(live.is_autostart());
    assert_eq!(live.state(), PoolState::Running);

    // A second call finds the pool instead of defining another
    let again = StoragePool::build_default_pool(&conn, true).await.unwrap().unwrap();
    assert_eq!(again.name(), Some("default"));
    assert_eq!(mock.pool_names(), vec!["default".to_string()]);
}

/// qcow2 volume, fully allocated, on a connection with metadata prealloc.
#[tokio::test]
async fn test_install_qcow2_with_progress() {
    try_init_logging("debug");
    let mock = Arc::new(
        MockConnection::new()
            .with_config(fast_progress())
            .with_metadata_prealloc(true)
            .with_create_delay(Duration::from_millis(250)),
    );
    let conn: Arc<dyn StorageConnection> = mock.clone();
    let pool = dir_pool(&mock, "images", "/var/lib/libvirt/images");

    let mut vol = StorageVolume::new(conn.clone());
    vol.set_name("vm.qcow2");
    vol.set_format(Some("qcow2".into()));
    vol.set_capacity(Some(10 * GIB));
    vol.set_allocation(Some(10 * GIB));
    vol.set_pool(pool.clone()).await.unwrap();
    vol.validate().await.unwrap();

    let meter = Arc::new(RecordingMeter::default());
    let created = vol.install(Some(meter.clone())).await.expect("volume created");

    assert_eq!(created.path(), "/var/lib/libvirt/images/vm.qcow2");
    assert_eq!(
        pool.last_create_flags(),
        Some(VolumeCreateFlags { prealloc_metadata: true, reflink: false })
    );

    let events = meter.events();
    let updates: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            MeterEvent::Update(value) => Some(*value),
            _ => None,
        })
        .collect();
    assert!(!updates.is_empty(), "no progress reported: {:?}", events);
    assert!(updates.windows(2).all(|w| w[0] <= w[1]), "allocation went backwards: {:?}", updates);
    assert_eq!(updates.last(), Some(&(10 * GIB)));
    assert_eq!(events.last(), Some(&MeterEvent::End(10 * GIB)));
}

/// The backing store's format is looked up from its pool before creation.
#[tokio::test]
async fn test_backing_format_detected_on_install() {
    try_init_logging("debug");
    let mock = Arc::new(MockConnection::new());
    let conn: Arc<dyn StorageConnection> = mock.clone();
    let pool = dir_pool(&mock, "images", "/var/lib/libvirt/images");

    let mut base = VolumeDocument::default();
    base.name = Some("base.qcow2".into());
    base.capacity = Some(SizeElement::bytes(5 * GIB));
    base.target.format = Some(FormatElement { kind: "qcow2".into() });
    pool.add_volume(base);

    let mut overlay = StorageVolume::new(conn.clone());
    overlay.set_name("overlay.qcow2");
    overlay.set_format(Some("qcow2".into()));
    overlay.set_capacity(Some(5 * GIB));
    overlay.set_backing_store(Some("/var/lib/libvirt/images/base.qcow2".into()));
    overlay.set_pool(pool.clone()).await.unwrap();
    overlay.validate().await.unwrap();

    let created = overlay.install(None).await.unwrap();
    assert_eq!(overlay.backing_format(), Some("qcow2"));

    let xml = created.xml_desc().await.unwrap();
    let doc: VolumeDocument = limiquantix_storage::xml::from_xml(&xml).unwrap();
    let backing = doc.backing_store.expect("backing store kept");
    assert_eq!(backing.format.map(|f| f.kind).as_deref(), Some("qcow2"));

    // Backing store present: no metadata preallocation
    assert_eq!(pool.last_create_flags(), Some(VolumeCreateFlags::default()));
}

/// Logical volumes can't be sparse.
#[tokio::test]
async fn test_logical_volume_allocation_forced() {
    try_init_logging("debug");
    let mock = Arc::new(MockConnection::new());
    let conn: Arc<dyn StorageConnection> = mock.clone();

    let mut doc = PoolDocument::new(PoolType::Logical);
    doc.name = Some("vg_data".into());
    doc.source.name = Some("vg_data".into());
    doc.target.path = Some("/dev/vg_data".into());
    let pool = mock.add_pool(doc, PoolState::Running);

    let mut vol = StorageVolume::new(conn.clone());
    vol.set_name("lv_vm");
    vol.set_capacity(Some(20 * GIB));
    vol.set_allocation(Some(5 * GIB));
    vol.set_pool(pool).await.unwrap();

    vol.validate().await.expect("sparse request is corrected, not rejected");
    assert_eq!(vol.allocation(), Some(20 * GIB));
    assert_eq!(vol.format(), None);
}

/// Full pool definition flow for an NFS share.
#[tokio::test]
async fn test_netfs_pool_install() {
    try_init_logging("debug");
    let mock = Arc::new(MockConnection::new());
    let conn: Arc<dyn StorageConnection> = mock.clone();

    let mut pool = StoragePool::new(conn.clone(), PoolType::Netfs);
    pool.set_name("isos");
    pool.add_host(Host::new("nfs.example.com").with_port(2049));
    pool.set_source_path(Some("/export/isos".into()));
    pool.validate().await.unwrap();

    assert_eq!(pool.format(), Some("auto"));
    assert_eq!(pool.target_path(), Some("/var/lib/libvirt/images/isos"));

    let handle = pool
        .install(PoolInstallOptions { build: true, create: true, autostart: false })
        .await
        .unwrap();

    let defined: PoolDocument = limiquantix_storage::xml::from_xml(&handle.xml_desc().await.unwrap()).unwrap();
    assert_eq!(defined.source.dir.map(|d| d.path).as_deref(), Some("/export/isos"));
    assert_eq!(defined.source.format.map(|f| f.kind).as_deref(), Some("auto"));
    assert!(defined.uuid.is_some());

    let live = mock.pool("isos").unwrap();
    assert!(!live.is_autostart());
    assert_eq!(live.state(), PoolState::Running);
}

/// A failing install step leaves no pool definition behind.
#[tokio::test]
async fn test_install_failure_cleans_up() {
    try_init_logging("debug");
    let mock = Arc::new(MockConnection::new().with_failures(MockFailures {
        autostart: true,
        ..Default::default()
    }));
    let conn: Arc<dyn StorageConnection> = mock.clone();

    let mut pool = StoragePool::new(conn.clone(), PoolType::Dir);
    pool.set_name("scratch");
    pool.validate().await.unwrap();

    let err = pool.install(PoolInstallOptions::all()).await.unwrap_err();
    assert!(matches!(err, StorageError::AutostartFailed(_)));
    assert!(conn.lookup_pool_by_name("scratch").await.unwrap().is_none());
    assert!(mock.cached_pools().is_empty());
}

/// Drivers that can't enumerate sources produce an empty list.
#[tokio::test]
async fn test_source_enumeration_unsupported() {
    try_init_logging("debug");
    let conn: Arc<dyn StorageConnection> = Arc::new(MockConnection::new());

    let pools = StoragePool::pool_list_from_sources(&conn, PoolType::Iscsi, Some("san.local"))
        .await
        .unwrap();
    assert!(pools.is_empty());
}

/// Volume clone picks up size and format from the source volume.
#[tokio::test]
async fn test_clone_volume_flow() {
    try_init_logging("debug");
    let mock = Arc::new(MockConnection::new().with_metadata_prealloc(true));
    let conn: Arc<dyn StorageConnection> = mock.clone();
    let pool = dir_pool(&mock, "images", "/var/lib/libvirt/images");

    let mut src = VolumeDocument::default();
    src.name = Some("golden.qcow2".into());
    src.capacity = Some(SizeElement::bytes(8 * GIB));
    src.allocation = Some(SizeElement::bytes(2 * GIB));
    src.target.format = Some(FormatElement { kind: "qcow2".into() });
    let src: Arc<dyn VolumeHandle> = pool.add_volume(src);

    let name = StorageVolume::find_free_name(
        pool.as_ref(),
        "golden",
        &limiquantix_storage::NameOptions::default().with_suffix(".qcow2"),
    )
    .await
    .unwrap();
    assert_eq!(name, "golden-1.qcow2");

    let mut clone = StorageVolume::new(conn.clone());
    clone.set_name(name.clone());
    clone.set_input_vol(Some(src));
    clone.sync_input_vol(false).await.unwrap();
    clone.validate().await.unwrap();
    assert_eq!(clone.format(), Some("qcow2"));
    assert_eq!(clone.capacity(), Some(8 * GIB));

    let created = clone.install(None).await.unwrap();
    assert_eq!(created.name(), name);
    // capacity != allocation: only the create flags would carry prealloc
    assert_eq!(pool.last_create_flags(), Some(VolumeCreateFlags::default()));
    assert_eq!(
        pool.volume(&name).unwrap().cloned_from().as_deref(),
        Some("golden.qcow2")
    );
}

/// Connections pick up paths from a YAML config.
#[tokio::test]
async fn test_yaml_config_drives_defaults() {
    let config = StorageConfig::from_yaml("system_pool_path: /srv/vm\nlvm_target_base: /dev/mapper/\n").unwrap();
    let conn: Arc<dyn StorageConnection> = Arc::new(MockConnection::new().with_config(config));

    let mut dir = StoragePool::new(conn.clone(), PoolType::Dir);
    dir.set_name("fast");
    dir.validate().await.unwrap();
    assert_eq!(dir.target_path(), Some("/srv/vm/fast"));

    let mut lvm = StoragePool::new(conn.clone(), PoolType::Logical);
    lvm.set_name("vg1");
    lvm.validate().await.unwrap();
    assert_eq!(lvm.target_path(), Some("/dev/mapper/vg1"));
    assert_eq!(lvm.source_name(), Some("vg1"));
}
