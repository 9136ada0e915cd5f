//! Libvirt storage backend.
//!
//! This module provides the production connection using libvirt's storage
//! API. It requires the `libvirt` feature to be enabled and the system to
//! have libvirt installed.

#[cfg(feature = "libvirt")]
mod backend;

#[cfg(feature = "libvirt")]
pub use backend::{LibvirtConnection, LibvirtPool, LibvirtVolume};

/// Check if libvirt backend is compiled in.
pub fn is_available() -> bool {
    cfg!(feature = "libvirt")
}

/// Split a libvirt version number (`major * 1_000_000 + minor * 1000 +
/// micro`) into its parts.
pub fn split_version(version: u32) -> (u32, u32, u32) {
    (version / 1_000_000, (version / 1000) % 1000, version % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_version() {
        assert_eq!(split_version(9_000_000), (9, 0, 0));
        assert_eq!(split_version(1_002_003), (1, 2, 3));
    }

    #[test]
    fn test_is_available_matches_feature() {
        assert_eq!(is_available(), cfg!(feature = "libvirt"));
    }
}
