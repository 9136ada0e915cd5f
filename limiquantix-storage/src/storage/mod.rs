//! Storage pool and volume definitions for limiquantix.
//!
//! This module builds, validates and installs libvirt storage objects:
//! - **StoragePool**: directory, filesystem, NFS, LVM, disk, iSCSI, SCSI,
//!   multipath, Gluster, Ceph RBD, Sheepdog, ZFS pools
//! - **StorageVolume**: files, LVs and network objects inside a pool
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │     StoragePool      │        │    StorageVolume     │
//! │  - type defaults     │◄───────│  - format defaults   │
//! │  - validation        │ pool   │  - size checks       │
//! │  - define/build/start│  XML   │  - create/clone      │
//! └──────────┬───────────┘        └──────────┬───────────┘
//!            │                               │  progress task
//!            ▼                               ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │      StorageConnection / PoolHandle / VolumeHandle       │
//! └─────────────────────────┬───────────────────────────────┘
//!               ┌───────────┴───────────┐
//!               ▼                       ▼
//!      ┌────────────────┐      ┌──────────────────┐
//!      │ MockConnection │      │ LibvirtConnection│
//!      └────────────────┘      └──────────────────┘
//! ```

mod pool;
mod volume;

pub use pool::*;
pub use volume::*;

use std::path::{Component, Path, PathBuf};

use crate::traits::StorageConnection;

/// Label used in generic name validation errors.
const STORAGE_OBJECT_LABEL: &str = "Storage object";

/// Default pool root: the per-user directory on session connections,
/// the system image directory otherwise.
pub fn preferred_default_pool_path(conn: &dyn StorageConnection) -> String {
    let config = conn.storage_config();
    if conn.is_session() {
        config.expanded_session_pool_path()
    } else {
        config.system_pool_path.clone()
    }
}

/// Lexically normalise an absolute path (`//`, `.` and `..` removed,
/// no trailing slash). Symlinks are not resolved.
pub(crate) fn normalize_path(path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/var/lib//libvirt/images/"), PathBuf::from("/var/lib/libvirt/images"));
        assert_eq!(normalize_path("/var/lib/./libvirt/../libvirt/images"), PathBuf::from("/var/lib/libvirt/images"));
        assert_eq!(normalize_path("/"), PathBuf::from("/"));
    }
}
