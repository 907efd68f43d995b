//! Typed records for the mega-watcher change stream.
//!
//! The controller sends each delta as a `[kind, op, entity]` triple. Both
//! protocol generations decode into [`DeltaRecord`]; ordering of a batch is
//! left to the session layer.

use serde::{Serialize, Serializer};
use serde_json::Value;

// ── EntityKind ──────────────────────────────────────────────────────

/// Entity kind carried by a delta.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Application,
    Relation,
    Unit,
    Machine,
    Annotation,
    RemoteApplication,
    /// A kind this client has no special handling for.
    Other(String),
}

impl EntityKind {
    /// Map a modern-generation wire kind.
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "application" => Self::Application,
            "relation" => Self::Relation,
            "unit" => Self::Unit,
            "machine" => Self::Machine,
            "annotation" => Self::Annotation,
            "remote-application" | "remoteApplication" | "remoteapplication" => {
                Self::RemoteApplication
            }
            other => Self::Other(other.to_owned()),
        }
    }

    /// Map a legacy-generation wire kind (applications were "services").
    pub fn from_legacy_wire(kind: &str) -> Self {
        match kind {
            "service" => Self::Application,
            "remoteservice" | "remote-service" => Self::RemoteApplication,
            other => Self::from_wire(other),
        }
    }

    /// Kind name as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Application => "application",
            Self::Relation => "relation",
            Self::Unit => "unit",
            Self::Machine => "machine",
            Self::Annotation => "annotation",
            Self::RemoteApplication => "remoteapplication",
            Self::Other(kind) => kind,
        }
    }

    /// Canonical info-type name, e.g. `"applicationInfo"`.
    pub fn info_name(&self) -> String {
        format!("{}Info", self.as_str())
    }

    /// Dependency rank used to order a batch. Unknown kinds have none.
    pub fn priority(&self) -> Option<i32> {
        match self {
            Self::Application => Some(1),
            Self::Relation => Some(2),
            Self::Unit => Some(3),
            Self::Machine => Some(4),
            Self::Annotation => Some(5),
            Self::RemoteApplication => Some(100),
            Self::Other(_) => None,
        }
    }
}

// ── DeltaOp ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeltaOp {
    Change,
    Remove,
    Other(String),
}

impl DeltaOp {
    pub fn from_wire(op: &str) -> Self {
        match op {
            "change" => Self::Change,
            "remove" => Self::Remove,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Change => "change",
            Self::Remove => "remove",
            Self::Other(op) => op,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove)
    }
}

// Both enums serialize as their wire strings.

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Serialize for DeltaOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── DeltaRecord ─────────────────────────────────────────────────────

/// One normalized change from the mega-watcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRecord {
    pub kind: EntityKind,
    pub op: DeltaOp,
    pub entity: Value,
}

impl DeltaRecord {
    /// Decode a `[kind, op, entity]` triple using the given kind mapping.
    pub fn from_triple(raw: &Value, map_kind: fn(&str) -> EntityKind) -> Option<Self> {
        let [kind, op, entity] = raw.as_array()?.as_slice() else {
            return None;
        };
        Some(Self {
            kind: map_kind(kind.as_str()?),
            op: DeltaOp::from_wire(op.as_str()?),
            entity: entity.clone(),
        })
    }

    pub fn info_name(&self) -> String {
        self.kind.info_name()
    }
}
