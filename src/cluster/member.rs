//! Member identity
//!
//! A [`Member`] names one node of the cluster: an immutable id, the socket
//! address it serves on, whether it is the node running this process, and
//! a shared attribute store. Members are exchanged between nodes as a single
//! portable record carrying id, endpoint and the full attribute snapshot.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use uuid::Uuid;

use super::attributes::{AttributeKind, AttributeResult, AttributeStore, AttributeValue};
use super::{ATTRIBUTE_ENTRY_CLASS_ID, CLUSTER_FACTORY_ID, MEMBER_CLASS_ID};
use crate::portable::{FieldValue, Portable, PortableError, PortableReader, PortableResult, PortableWriter};

/// A cluster node's identity and metadata
#[derive(Clone)]
pub struct Member {
    id: String,
    endpoint: SocketAddr,
    local: bool,
    attributes: Arc<AttributeStore>,
}

impl Member {
    /// Identity for the node running this process, with a fresh UUID
    pub fn local(endpoint: SocketAddr) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), endpoint, true)
    }

    /// Identity with a caller-chosen id and no attributes
    pub fn with_id(id: impl Into<String>, endpoint: SocketAddr, local: bool) -> Self {
        Self::with_store(id, endpoint, local, Arc::new(AttributeStore::new()))
    }

    /// Identity sharing an existing attribute store
    pub fn with_store(
        id: impl Into<String>,
        endpoint: SocketAddr,
        local: bool,
        attributes: Arc<AttributeStore>,
    ) -> Self {
        Self {
            id: id.into(),
            endpoint,
            local,
            attributes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn socket_address(&self) -> SocketAddr {
        self.endpoint
    }

    #[deprecated(note = "use `socket_address` instead")]
    pub fn inet_socket_address(&self) -> SocketAddr {
        self.socket_address()
    }

    /// True only in the process this identity represents
    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn attributes(&self) -> &Arc<AttributeStore> {
        &self.attributes
    }

    /// Typed attribute lookup
    pub fn attribute<T: AttributeKind>(&self, key: &str) -> AttributeResult<Option<T>> {
        self.attributes.get_as(key)
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.set(key, value);
    }

    pub fn remove_attribute(&self, key: &str) {
        self.attributes.remove(key);
    }
}

impl Default for Member {
    /// Blank remote identity, filled in by `read_portable`
    fn default() -> Self {
        Self::with_id(String::new(), SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0), false)
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("local", &self.local)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Member [{}]:{} - {}", self.endpoint.ip(), self.endpoint.port(), self.id)?;
        if self.local {
            write!(f, " this")?;
        }
        Ok(())
    }
}

impl Portable for Member {
    fn factory_id(&self) -> i32 {
        CLUSTER_FACTORY_ID
    }

    fn class_id(&self) -> i32 {
        MEMBER_CLASS_ID
    }

    fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()> {
        writer.write_utf("uuid", &self.id)?;
        writer.write_utf("host", &self.endpoint.ip().to_string())?;
        writer.write_int("port", i32::from(self.endpoint.port()))?;
        let entries: Vec<AttributeEntry> = self
            .attributes
            .get_all()
            .map(|attribute| AttributeEntry::new(attribute.key, attribute.value))
            .collect();
        writer.write_portable_array("attrs", &entries)
    }

    fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()> {
        let id = reader.read_utf("uuid")?;
        let host = reader.read_utf("host")?;
        let ip: IpAddr = host
            .parse()
            .map_err(|_| PortableError::Malformed(format!("invalid member host '{}'", host)))?;
        let port = reader.read_int("port")?;
        let port = u16::try_from(port)
            .map_err(|_| PortableError::Malformed(format!("invalid member port {}", port)))?;
        let entries: Vec<AttributeEntry> = reader.read_portable_array("attrs")?;

        let mut attributes = HashMap::with_capacity(entries.len());
        for entry in entries {
            if attributes.contains_key(&entry.key) {
                return Err(PortableError::Malformed(format!(
                    "member attribute '{}' appears more than once",
                    entry.key
                )));
            }
            attributes.insert(entry.key, entry.value);
        }

        self.id = id;
        self.endpoint = SocketAddr::new(ip, port);
        self.local = false;
        self.attributes = Arc::new(AttributeStore::with_attributes(attributes));
        Ok(())
    }
}

/// One attribute inside an encoded member
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEntry {
    pub key: String,
    pub value: AttributeValue,
}

impl AttributeEntry {
    pub fn new(key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Default for AttributeEntry {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

impl Portable for AttributeEntry {
    fn factory_id(&self) -> i32 {
        CLUSTER_FACTORY_ID
    }

    fn class_id(&self) -> i32 {
        ATTRIBUTE_ENTRY_CLASS_ID
    }

    fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()> {
        writer.write_utf("k", &self.key)?;
        writer.write_value("v", attribute_to_field(&self.value))
    }

    fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()> {
        self.key = reader.read_utf("k")?;
        self.value = field_to_attribute(&self.key, reader.read_value("v")?)?;
        Ok(())
    }
}

fn attribute_to_field(value: &AttributeValue) -> FieldValue {
    match value {
        AttributeValue::String(v) => FieldValue::Utf(v.clone()),
        AttributeValue::Bool(v) => FieldValue::Bool(*v),
        AttributeValue::Int8(v) => FieldValue::Byte(*v),
        AttributeValue::Int16(v) => FieldValue::Short(*v),
        AttributeValue::Int32(v) => FieldValue::Int(*v),
        AttributeValue::Int64(v) => FieldValue::Long(*v),
        AttributeValue::Float32(v) => FieldValue::Float(*v),
        AttributeValue::Float64(v) => FieldValue::Double(*v),
    }
}

fn field_to_attribute(key: &str, value: FieldValue) -> PortableResult<AttributeValue> {
    Ok(match value {
        FieldValue::Utf(v) => AttributeValue::String(v),
        FieldValue::Bool(v) => AttributeValue::Bool(v),
        FieldValue::Byte(v) => AttributeValue::Int8(v),
        FieldValue::Short(v) => AttributeValue::Int16(v),
        FieldValue::Int(v) => AttributeValue::Int32(v),
        FieldValue::Long(v) => AttributeValue::Int64(v),
        FieldValue::Float(v) => AttributeValue::Float32(v),
        FieldValue::Double(v) => AttributeValue::Float64(v),
        other => {
            return Err(PortableError::Malformed(format!(
                "attribute '{}' carries unsupported {} value",
                key,
                other.field_type()
            )))
        }
    })
}
