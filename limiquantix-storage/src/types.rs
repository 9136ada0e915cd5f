//! Type definitions for storage pools and volumes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

// =============================================================================
// POOL TYPES
// =============================================================================

/// Libvirt storage pool type (the `type` attribute of `<pool>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolType {
    #[serde(rename = "dir")]
    Dir,
    #[serde(rename = "fs")]
    Fs,
    #[serde(rename = "netfs")]
    Netfs,
    #[serde(rename = "logical")]
    Logical,
    #[serde(rename = "disk")]
    Disk,
    #[serde(rename = "iscsi")]
    Iscsi,
    #[serde(rename = "iscsi-direct")]
    IscsiDirect,
    #[serde(rename = "scsi")]
    Scsi,
    #[serde(rename = "mpath")]
    Mpath,
    #[serde(rename = "gluster")]
    Gluster,
    #[serde(rename = "rbd")]
    Rbd,
    #[serde(rename = "sheepdog")]
    Sheepdog,
    #[serde(rename = "zfs")]
    Zfs,
    #[serde(rename = "vstorage")]
    Vstorage,
}

impl PoolType {
    /// Every pool type libvirt knows about.
    pub const ALL: [PoolType; 14] = [
        PoolType::Dir,
        PoolType::Fs,
        PoolType::Netfs,
        PoolType::Logical,
        PoolType::Disk,
        PoolType::Iscsi,
        PoolType::IscsiDirect,
        PoolType::Scsi,
        PoolType::Mpath,
        PoolType::Gluster,
        PoolType::Rbd,
        PoolType::Sheepdog,
        PoolType::Zfs,
        PoolType::Vstorage,
    ];

    /// Get the libvirt name for this pool type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Dir => "dir",
            PoolType::Fs => "fs",
            PoolType::Netfs => "netfs",
            PoolType::Logical => "logical",
            PoolType::Disk => "disk",
            PoolType::Iscsi => "iscsi",
            PoolType::IscsiDirect => "iscsi-direct",
            PoolType::Scsi => "scsi",
            PoolType::Mpath => "mpath",
            PoolType::Gluster => "gluster",
            PoolType::Rbd => "rbd",
            PoolType::Sheepdog => "sheepdog",
            PoolType::Zfs => "zfs",
            PoolType::Vstorage => "vstorage",
        }
    }

    /// Check whether pools of this type expose `property`.
    pub fn supports(&self, property: PoolProperty) -> bool {
        match property.users() {
            Some(types) => types.contains(self),
            // Not type dependent, always present in the document
            None => true,
        }
    }

    /// Volume storage class produced by pools of this type.
    pub fn disk_type(&self) -> VolumeType {
        match self {
            PoolType::Disk
            | PoolType::Logical
            | PoolType::Scsi
            | PoolType::Mpath
            | PoolType::Zfs => VolumeType::Block,
            PoolType::Gluster | PoolType::Rbd | PoolType::Iscsi | PoolType::Sheepdog => {
                VolumeType::Network
            }
            _ => VolumeType::File,
        }
    }

    /// Which `<source>` child carries the source path for this type.
    pub fn source_path_kind(&self) -> SourcePathKind {
        match self {
            PoolType::Netfs | PoolType::Gluster => SourcePathKind::Dir,
            PoolType::Scsi => SourcePathKind::Adapter,
            _ => SourcePathKind::Device,
        }
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PoolType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StorageError::InvalidConfig(format!("unknown pool type '{}'", s)))
    }
}

/// Location of the source path inside `<source>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePathKind {
    /// `./source/dir/@path`
    Dir,
    /// `./source/adapter/@name`
    Adapter,
    /// `./source/device/@path`
    Device,
}

/// Pool properties whose presence depends on the pool type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolProperty {
    SourcePath,
    SourceName,
    Hosts,
    Format,
    Iqn,
    TargetPath,
    Name,
    Uuid,
    Capacity,
    Allocation,
    Available,
    Permissions,
    AuthType,
    AuthUsername,
    AuthSecretUuid,
}

const SOURCE_PATH_USERS: &[PoolType] = &[
    PoolType::Fs,
    PoolType::Netfs,
    PoolType::Logical,
    PoolType::Disk,
    PoolType::Iscsi,
    PoolType::Scsi,
    PoolType::Gluster,
];
const SOURCE_NAME_USERS: &[PoolType] = &[
    PoolType::Logical,
    PoolType::Gluster,
    PoolType::Rbd,
    PoolType::Sheepdog,
    PoolType::Zfs,
];
const HOSTS_USERS: &[PoolType] = &[
    PoolType::Netfs,
    PoolType::Iscsi,
    PoolType::Gluster,
    PoolType::Rbd,
    PoolType::Sheepdog,
];
const FORMAT_USERS: &[PoolType] = &[PoolType::Fs, PoolType::Netfs, PoolType::Disk];
const IQN_USERS: &[PoolType] = &[PoolType::Iscsi];
const TARGET_PATH_USERS: &[PoolType] = &[
    PoolType::Dir,
    PoolType::Fs,
    PoolType::Netfs,
    PoolType::Logical,
    PoolType::Disk,
    PoolType::Iscsi,
    PoolType::Scsi,
    PoolType::Mpath,
];

impl PoolProperty {
    /// Pool types using this property, or `None` when it is not type dependent.
    pub fn users(&self) -> Option<&'static [PoolType]> {
        match self {
            PoolProperty::SourcePath => Some(SOURCE_PATH_USERS),
            PoolProperty::SourceName => Some(SOURCE_NAME_USERS),
            PoolProperty::Hosts => Some(HOSTS_USERS),
            PoolProperty::Format => Some(FORMAT_USERS),
            PoolProperty::Iqn => Some(IQN_USERS),
            PoolProperty::TargetPath => Some(TARGET_PATH_USERS),
            _ => None,
        }
    }
}

/// Running state of a storage pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Inactive,
    Building,
    Running,
    Degraded,
    Inaccessible,
}

impl PoolState {
    /// Convert a libvirt `virStoragePoolState` value.
    pub fn from_raw(state: u32) -> Self {
        match state {
            1 => PoolState::Building,
            2 => PoolState::Running,
            3 => PoolState::Degraded,
            4 => PoolState::Inaccessible,
            _ => PoolState::Inactive,
        }
    }
}

/// Live pool information: `(state, capacity, allocation, available)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo {
    pub state: PoolState,
    /// Total capacity in bytes
    pub capacity: u64,
    /// Allocated bytes
    pub allocation: u64,
    /// Free bytes
    pub available: u64,
}

/// Post-define steps run by [`crate::StoragePool::install`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolInstallOptions {
    /// Build the pool (mkdir, vgcreate, mkfs...)
    pub build: bool,
    /// Start the pool
    pub create: bool,
    /// Mark the pool autostart
    pub autostart: bool,
}

impl PoolInstallOptions {
    /// Build, start and autostart.
    pub fn all() -> Self {
        Self { build: true, create: true, autostart: true }
    }
}

// =============================================================================
// VOLUME TYPES
// =============================================================================

/// Storage class of a volume, numbered like `virStorageVolType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    File,
    Block,
    Dir,
    Network,
    Netdir,
}

impl VolumeType {
    /// Convert a libvirt `virStorageVolType` value.
    pub fn from_raw(kind: u32) -> Self {
        match kind {
            1 => VolumeType::Block,
            2 => VolumeType::Dir,
            3 => VolumeType::Network,
            4 => VolumeType::Netdir,
            _ => VolumeType::File,
        }
    }
}

/// Live volume information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeInfo {
    pub kind: VolumeType,
    /// Logical size in bytes
    pub capacity: u64,
    /// Bytes actually allocated on the backing storage
    pub allocation: u64,
}

/// Volume properties known to [`crate::StorageVolume::supports_property`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeProperty {
    Name,
    Key,
    Capacity,
    Allocation,
    Format,
    TargetPath,
    BackingStore,
    BackingFormat,
    LazyRefcounts,
    Permissions,
}

/// Flags for `virStorageVolCreateXML` / `virStorageVolCreateXMLFrom`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeCreateFlags {
    /// Preallocate image metadata only
    pub prealloc_metadata: bool,
    /// Clone with a copy-on-write reflink
    pub reflink: bool,
}

impl VolumeCreateFlags {
    /// Raw libvirt flag bits.
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.prealloc_metadata {
            bits |= 1 << 0;
        }
        if self.reflink {
            bits |= 1 << 1;
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_type_round_trip_names() {
        for t in PoolType::ALL {
            assert_eq!(t.as_str().parse::<PoolType>().unwrap(), t);
        }
        assert!("bogus".parse::<PoolType>().is_err());
    }

    #[test]
    fn test_support_matrix() {
        use PoolProperty::*;
        use PoolType::*;

        let expected: &[(PoolProperty, &[PoolType])] = &[
            (SourcePath, &[Fs, Netfs, Logical, Disk, Iscsi, Scsi, Gluster]),
            (SourceName, &[Logical, Gluster, Rbd, PoolType::Sheepdog, Zfs]),
            (Hosts, &[Netfs, Iscsi, Gluster, Rbd, PoolType::Sheepdog]),
            (Format, &[Fs, Netfs, Disk]),
            (Iqn, &[Iscsi]),
            (TargetPath, &[PoolType::Dir, Fs, Netfs, Logical, Disk, Iscsi, Scsi, Mpath]),
        ];

        for (prop, users) in expected {
            for t in PoolType::ALL {
                assert_eq!(
                    t.supports(*prop),
                    users.contains(&t),
                    "{:?} support for {}",
                    prop,
                    t
                );
            }
        }

        for t in PoolType::ALL {
            assert!(t.supports(Name));
            assert!(t.supports(Permissions));
            assert!(t.supports(AuthSecretUuid));
        }
    }

    #[test]
    fn test_disk_type_mapping() {
        let cases = [
            (PoolType::Dir, VolumeType::File),
            (PoolType::Fs, VolumeType::File),
            (PoolType::Netfs, VolumeType::File),
            (PoolType::Logical, VolumeType::Block),
            (PoolType::Disk, VolumeType::Block),
            (PoolType::Iscsi, VolumeType::Network),
            (PoolType::IscsiDirect, VolumeType::File),
            (PoolType::Scsi, VolumeType::Block),
            (PoolType::Mpath, VolumeType::Block),
            (PoolType::Gluster, VolumeType::Network),
            (PoolType::Rbd, VolumeType::Network),
            (PoolType::Sheepdog, VolumeType::Network),
            (PoolType::Zfs, VolumeType::Block),
            (PoolType::Vstorage, VolumeType::File),
        ];
        for (pool_type, expected) in cases {
            assert_eq!(pool_type.disk_type(), expected, "{}", pool_type);
        }
    }

    #[test]
    fn test_source_path_kind() {
        assert_eq!(PoolType::Netfs.source_path_kind(), SourcePathKind::Dir);
        assert_eq!(PoolType::Gluster.source_path_kind(), SourcePathKind::Dir);
        assert_eq!(PoolType::Scsi.source_path_kind(), SourcePathKind::Adapter);
        assert_eq!(PoolType::Logical.source_path_kind(), SourcePathKind::Device);
        assert_eq!(PoolType::Iscsi.source_path_kind(), SourcePathKind::Device);
    }

    #[test]
    fn test_create_flag_bits() {
        assert_eq!(VolumeCreateFlags::default().bits(), 0);
        let flags = VolumeCreateFlags { prealloc_metadata: true, reflink: true };
        assert_eq!(flags.bits(), 3);
    }
}
