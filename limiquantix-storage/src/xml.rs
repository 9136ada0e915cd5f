//! XML documents for libvirt storage objects.
//!
//! Pools and volumes are modelled as serde structs and serialized with
//! quick-xml. Field declaration order is the element order of the generated
//! XML, so keep it stable: consumers of stored definitions diff on it.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;
use crate::types::{PoolType, VolumeType};

/// Serialize a document with two-space indentation.
pub fn to_xml<T: Serialize>(value: &T) -> Result<String> {
    let mut buffer = String::new();
    let mut ser = quick_xml::se::Serializer::new(&mut buffer);
    ser.indent(' ', 2);
    value.serialize(ser)?;
    Ok(buffer)
}

/// Parse a document, ignoring elements we don't model.
pub fn from_xml<T: DeserializeOwned>(xml: &str) -> Result<T> {
    Ok(quick_xml::de::from_str(xml)?)
}

// =============================================================================
// SHARED ELEMENTS
// =============================================================================

/// A byte quantity such as `<capacity unit='bytes'>1024</capacity>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeElement {
    #[serde(rename = "@unit", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "$text")]
    pub value: u64,
}

impl SizeElement {
    pub fn bytes(value: u64) -> Self {
        Self { unit: None, value }
    }

    /// Value scaled to bytes according to the `unit` attribute.
    pub fn as_bytes(&self) -> u64 {
        let multiplier: u64 = match self.unit.as_deref() {
            None | Some("b") | Some("B") | Some("bytes") => 1,
            Some("KB") => 1_000,
            Some("k") | Some("K") | Some("KiB") => 1 << 10,
            Some("MB") => 1_000_000,
            Some("M") | Some("MiB") => 1 << 20,
            Some("GB") => 1_000_000_000,
            Some("G") | Some("GiB") => 1 << 30,
            Some("TB") => 1_000_000_000_000,
            Some("T") | Some("TiB") => 1 << 40,
            Some("PB") => 1_000_000_000_000_000,
            Some("P") | Some("PiB") => 1 << 50,
            Some("EB") => 1_000_000_000_000_000_000,
            Some("E") | Some("EiB") => 1 << 60,
            Some(_) => 1,
        };
        self.value.saturating_mul(multiplier)
    }
}

/// `<permissions>` under `<target>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// `<format type='...'/>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatElement {
    #[serde(rename = "@type")]
    pub kind: String,
}

/// Element carrying a single `path` attribute (`<dir>`, `<device>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAttr {
    #[serde(rename = "@path")]
    pub path: String,
}

/// Element carrying a single `name` attribute (`<adapter>`, `<iqn>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAttr {
    #[serde(rename = "@name")]
    pub name: String,
}

/// Marker element such as `<lazy_refcounts/>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {}

// =============================================================================
// POOL
// =============================================================================

/// `<host name='...' port='...'/>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@port", default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), port: None }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// `<initiator><iqn name='...'/></initiator>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiator {
    pub iqn: NameAttr,
}

/// `<secret uuid='...'/>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSecret {
    #[serde(rename = "@uuid", default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

/// `<auth type='chap' username='...'><secret uuid='...'/></auth>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "@username", default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<AuthSecret>,
}

/// `<source>` of a pool; also the unit returned by source discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "source")]
pub struct PoolSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatElement>,
    #[serde(rename = "host", default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<Host>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathAttr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<NameAttr>,
    #[serde(rename = "device", default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<PathAttr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<Initiator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
}

impl PoolSource {
    pub fn is_empty(&self) -> bool {
        *self == PoolSource::default()
    }
}

/// `<target>` of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
}

impl PoolTarget {
    pub fn is_empty(&self) -> bool {
        *self == PoolTarget::default()
    }
}

/// `<sources>` document returned by `virConnectFindStoragePoolSources`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename = "sources")]
pub struct SourceList {
    #[serde(rename = "source", default)]
    pub sources: Vec<PoolSource>,
}

/// `<pool>` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "pool")]
pub struct PoolDocument {
    #[serde(rename = "@type")]
    pub kind: PoolType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<SizeElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<SizeElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<SizeElement>,
    #[serde(default, skip_serializing_if = "PoolSource::is_empty")]
    pub source: PoolSource,
    #[serde(default, skip_serializing_if = "PoolTarget::is_empty")]
    pub target: PoolTarget,
}

impl PoolDocument {
    pub fn new(kind: PoolType) -> Self {
        Self {
            kind,
            name: None,
            uuid: None,
            capacity: None,
            allocation: None,
            available: None,
            source: PoolSource::default(),
            target: PoolTarget::default(),
        }
    }
}

// =============================================================================
// VOLUME
// =============================================================================

/// `<features>` under a volume target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_refcounts: Option<Flag>,
}

/// `<target>` of a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<VolumeFeatures>,
}

impl VolumeTarget {
    pub fn is_empty(&self) -> bool {
        *self == VolumeTarget::default()
    }
}

/// `<backingStore>` of a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackingStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatElement>,
}

/// `<volume>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "volume")]
pub struct VolumeDocument {
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<VolumeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<SizeElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<SizeElement>,
    #[serde(default, skip_serializing_if = "VolumeTarget::is_empty")]
    pub target: VolumeTarget,
    #[serde(rename = "backingStore", default, skip_serializing_if = "Option::is_none")]
    pub backing_store: Option<BackingStore>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBVIRT_POOL: &str = r#"<pool type='netfs'>
  <name>isos</name>
  <uuid>1b5ac2e8-ae0a-4bc6-9a13-0b4b6d0e1c3f</uuid>
  <capacity unit='bytes'>107374182400</capacity>
  <allocation unit='bytes'>0</allocation>
  <available unit='bytes'>107374182400</available>
  <source>
    <host name='nfs.example.com' port='2049'/>
    <dir path='/export/isos'/>
    <format type='nfs'/>
  </source>
  <target>
    <path>/var/lib/libvirt/images/isos</path>
    <permissions>
      <mode>0755</mode>
      <owner>107</owner>
      <group>107</group>
    </permissions>
  </target>
</pool>"#;

    #[test]
    fn test_parse_libvirt_pool() {
        let doc: PoolDocument = from_xml(LIBVIRT_POOL).unwrap();

        assert_eq!(doc.kind, PoolType::Netfs);
        assert_eq!(doc.name.as_deref(), Some("isos"));
        assert_eq!(doc.capacity.as_ref().map(SizeElement::as_bytes), Some(107374182400));
        assert_eq!(doc.source.hosts, vec![Host::new("nfs.example.com").with_port(2049)]);
        assert_eq!(doc.source.dir.as_ref().map(|d| d.path.as_str()), Some("/export/isos"));
        assert_eq!(doc.source.format.as_ref().map(|f| f.kind.as_str()), Some("nfs"));
        assert_eq!(doc.target.path.as_deref(), Some("/var/lib/libvirt/images/isos"));
        assert_eq!(
            doc.target.permissions.as_ref().and_then(|p| p.owner.as_deref()),
            Some("107")
        );
    }

    #[test]
    fn test_pool_element_order() {
        let mut doc = PoolDocument::new(PoolType::Netfs);
        doc.name = Some("share".into());
        doc.source.dir = Some(PathAttr { path: "/export".into() });
        doc.source.hosts.push(Host::new("nfs.local"));
        doc.source.format = Some(FormatElement { kind: "auto".into() });
        doc.target.path = Some("/mnt/share".into());

        let xml = to_xml(&doc).unwrap();
        let order = ["<pool", "<name>", "<source>", "<format", "<host", "<dir", "<target>", "<path>"];
        let positions: Vec<usize> = order.iter().map(|tag| xml.find(tag).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "unexpected order:\n{}", xml);
        assert!(xml.contains(r#"type="netfs""#));
        assert!(!xml.contains("<uuid>"));
    }

    #[test]
    fn test_empty_source_stub() {
        let xml = to_xml(&PoolSource::default()).unwrap();
        assert_eq!(xml, "<source/>");
    }

    #[test]
    fn test_parse_source_list() {
        let xml = r#"<sources>
  <source>
    <host name='192.168.1.50'/>
    <dir path='/export/a'/>
    <format type='nfs'/>
  </source>
  <source>
    <host name='192.168.1.50'/>
    <dir path='/export/b'/>
    <format type='nfs'/>
  </source>
</sources>"#;
        let list: SourceList = from_xml(xml).unwrap();
        assert_eq!(list.sources.len(), 2);
        assert_eq!(list.sources[1].dir.as_ref().unwrap().path, "/export/b");
    }

    #[test]
    fn test_parse_multi_device_logical_pool() {
        let xml = r#"<pool type='logical'>
  <name>vg_data</name>
  <source>
    <device path='/dev/sda2'/>
    <device path='/dev/sdb1'/>
    <name>vg_data</name>
    <format type='lvm2'/>
  </source>
  <target>
    <path>/dev/vg_data</path>
  </target>
</pool>"#;
        let doc: PoolDocument = from_xml(xml).unwrap();
        let paths: Vec<&str> = doc.source.devices.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["/dev/sda2", "/dev/sdb1"]);
        assert_eq!(doc.source.name.as_deref(), Some("vg_data"));

        let written = to_xml(&doc).unwrap();
        assert_eq!(written.matches("<device ").count(), 2);
    }

    #[test]
    fn test_parse_interleaved_hosts() {
        let xml = r#"<pool type='rbd'>
  <name>ceph</name>
  <source>
    <host name='mon1'/>
    <name>rbd</name>
    <host name='mon2' port='6789'/>
  </source>
</pool>"#;
        let doc: PoolDocument = from_xml(xml).unwrap();
        assert_eq!(
            doc.source.hosts,
            vec![Host::new("mon1"), Host::new("mon2").with_port(6789)]
        );
        assert_eq!(doc.source.name.as_deref(), Some("rbd"));
    }

    #[test]
    fn test_parse_source_list_with_physical_volumes() {
        let xml = r#"<sources>
  <source>
    <device path='/dev/sda2'/>
    <device path='/dev/sdb1'/>
    <name>vg_data</name>
    <format type='lvm2'/>
  </source>
  <source>
    <device path='/dev/sdc'/>
    <name>vg_fast</name>
    <format type='lvm2'/>
  </source>
</sources>"#;
        let list: SourceList = from_xml(xml).unwrap();
        assert_eq!(list.sources.len(), 2);
        assert_eq!(list.sources[0].devices.len(), 2);
        assert_eq!(list.sources[1].name.as_deref(), Some("vg_fast"));
    }

    #[test]
    fn test_volume_with_backing_store() {
        let xml = r#"<volume type='file'>
  <name>overlay.qcow2</name>
  <key>/var/lib/libvirt/images/overlay.qcow2</key>
  <capacity unit='G'>10</capacity>
  <allocation unit='bytes'>196608</allocation>
  <physical unit='bytes'>196608</physical>
  <target>
    <path>/var/lib/libvirt/images/overlay.qcow2</path>
    <format type='qcow2'/>
    <compat>1.1</compat>
    <features>
      <lazy_refcounts/>
    </features>
  </target>
  <backingStore>
    <path>/var/lib/libvirt/images/base.qcow2</path>
    <format type='qcow2'/>
  </backingStore>
</volume>"#;
        let doc: VolumeDocument = from_xml(xml).unwrap();

        assert_eq!(doc.kind, Some(VolumeType::File));
        assert_eq!(doc.capacity.as_ref().unwrap().as_bytes(), 10 * 1024 * 1024 * 1024);
        assert!(doc.target.features.as_ref().unwrap().lazy_refcounts.is_some());
        let backing = doc.backing_store.unwrap();
        assert_eq!(backing.path.as_deref(), Some("/var/lib/libvirt/images/base.qcow2"));
        assert_eq!(backing.format.unwrap().kind, "qcow2");
    }

    #[test]
    fn test_size_units() {
        let size = |unit: &str, value| SizeElement { unit: Some(unit.to_string()), value };
        assert_eq!(size("bytes", 5).as_bytes(), 5);
        assert_eq!(size("KiB", 2).as_bytes(), 2048);
        assert_eq!(size("MB", 3).as_bytes(), 3_000_000);
        assert_eq!(size("T", 1).as_bytes(), 1 << 40);
        assert_eq!(SizeElement::bytes(42).as_bytes(), 42);
    }
}
