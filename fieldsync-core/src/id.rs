//! Identifier types.
//!
//! Temporary vs. remote is a sum type, not a string convention: an id is
//! classified exactly once, at the parse boundary, and every other component
//! matches on the variant instead of sniffing prefixes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Reserved prefix carried by the encoded form of every temporary id.
pub const TEMP_PREFIX: &str = "temp_";

/// Locally allocated placeholder id for an entity the system of record has
/// not acknowledged yet. Holds the full encoded form, prefix included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(String);

impl TempId {
    /// Build a temp id from its encoded form. Returns `None` when the
    /// reserved prefix is missing.
    pub fn parse(encoded: &str) -> Option<Self> {
        if encoded.starts_with(TEMP_PREFIX) {
            Some(Self(encoded.to_string()))
        } else {
            None
        }
    }

    /// Build a temp id from allocator parts: kind, process instance tag,
    /// and a monotonic counter value.
    pub fn from_parts(kind: &str, instance: &str, counter: u64) -> Self {
        Self(format!("{TEMP_PREFIX}{kind}_{instance}_{counter}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by the system of record upon successful creation.
/// Opaque to this engine; the backend may use numbers, uuids, or anything
/// else that fits in a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entity id as seen anywhere in the engine: either a local placeholder
/// or the canonical remote id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Temp(TempId),
    Remote(RemoteId),
}

impl EntityId {
    /// Classify an encoded id by its reserved prefix. This is the only place
    /// in the workspace that looks at the prefix.
    pub fn parse(encoded: &str) -> Self {
        match TempId::parse(encoded) {
            Some(temp) => Self::Temp(temp),
            None => Self::Remote(RemoteId::new(encoded)),
        }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    pub fn as_temp(&self) -> Option<&TempId> {
        match self {
            Self::Temp(t) => Some(t),
            Self::Remote(_) => None,
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteId> {
        match self {
            Self::Temp(_) => None,
            Self::Remote(r) => Some(r),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temp(t) => t.fmt(f),
            Self::Remote(r) => r.fmt(f),
        }
    }
}

impl From<TempId> for EntityId {
    fn from(id: TempId) -> Self {
        Self::Temp(id)
    }
}

impl From<RemoteId> for EntityId {
    fn from(id: RemoteId) -> Self {
        Self::Remote(id)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Ok(Self::parse(&encoded))
    }
}

/// Unique id of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Local id of a stored binary blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(Uuid);

impl BlobId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for BlobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
