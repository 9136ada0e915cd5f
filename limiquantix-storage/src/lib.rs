//! # limiquantix Storage
//!
//! Libvirt storage pool and volume definitions for limiquantix nodes.
//!
//! This crate builds `<pool>` and `<volume>` XML, fills in the defaults each
//! pool type needs, validates requests against the host and drives their
//! creation through a storage connection:
//! - **Libvirt** (feature `libvirt`) - production connection
//! - **Mock** - in-memory connection for tests and development
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      StoragePool / StorageVolume        │
//! │  (validate, install, default pool, ...) │
//! └─────────────────────┬───────────────────┘
//!                       │
//! ┌─────────────────────┴───────────────────┐
//! │        StorageConnection Trait          │
//! └─────────────────────┬───────────────────┘
//!         ┌─────────────┴─────────────┐
//!         ▼                           ▼
//! ┌───────────────────┐     ┌───────────────────┐
//! │ LibvirtConnection │     │  MockConnection   │
//! │   (via libvirt)   │     │    (in memory)    │
//! └───────────────────┘     └───────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use limiquantix_storage::{MockConnection, StorageConnection, StoragePool, StorageVolume};
//!
//! #[tokio::main]
//! async fn main() {
//!     let conn: Arc<dyn StorageConnection> = Arc::new(MockConnection::new());
//!
//!     let pool = StoragePool::build_default_pool(&conn, true).await.unwrap().unwrap();
//!     let handle = conn.lookup_pool_by_name(pool.name().unwrap()).await.unwrap().unwrap();
//!
//!     let mut vol = StorageVolume::new(conn.clone());
//!     vol.set_name("vm.qcow2");
//!     vol.set_format(Some("qcow2".into()));
//!     vol.set_capacity(Some(10 * 1024 * 1024 * 1024));
//!     vol.set_pool(handle).await.unwrap();
//!     vol.validate().await.unwrap();
//!     vol.install(None).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod libvirt;
pub mod mock;
pub mod naming;
pub mod progress;
pub mod storage;
pub mod traits;
pub mod types;
pub mod xml;

pub use config::{ProgressConfig, StorageConfig};
pub use error::{Result, StorageError};
pub use mock::{MockConnection, MockFailures};
pub use naming::NameOptions;
pub use progress::{NullMeter, ProgressMeter};
pub use storage::{preferred_default_pool_path, SizeConflict, StoragePool, StorageVolume};
pub use traits::{PoolHandle, StorageConnection, VolumeHandle};
pub use types::*;
pub use xml::{Host, Permissions};

// Re-export libvirt connection when available
#[cfg(feature = "libvirt")]
pub use libvirt::LibvirtConnection;
