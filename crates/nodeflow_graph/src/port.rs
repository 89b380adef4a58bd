// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions: port sides, indices, roles and the data flowing through them.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Index of a port, unique within one (node, port type) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortIndex(pub u32);

impl PortIndex {
    /// Sentinel used for the unresolved end of a draft connection
    pub const INVALID: PortIndex = PortIndex(u32::MAX);

    /// Whether this index refers to a real port
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Iterate over the first `count` port indices
    pub fn range(count: u32) -> impl Iterator<Item = PortIndex> {
        (0..count).map(PortIndex)
    }
}

impl fmt::Display for PortIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("<invalid>")
        }
    }
}

/// Side of a node a port lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortType {
    /// Input port
    In,
    /// Output port
    Out,
    /// No port; marks the missing end of a draft connection
    None,
}

impl PortType {
    /// The side a connection attached to this side leads to
    pub fn opposite(self) -> PortType {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
            Self::None => Self::None,
        }
    }

    /// Whether this is a real port side
    pub fn is_valid(self) -> bool {
        self != Self::None
    }
}

/// Rule governing how many connections an output port may hold at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionPolicy {
    /// A new connection evicts the existing ones
    One,
    /// Any number of simultaneous connections
    #[default]
    Many,
}

/// Port-related data roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRole {
    /// Data currently held by the port
    Data,
    /// Tag describing the kind of data the port carries
    DataType,
    /// Connection policy of the port
    ConnectionPolicy,
    /// Whether the caption is drawn
    CaptionVisible,
    /// Port caption
    Caption,
}

/// Type tag of the data carried by a port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeDataType {
    /// Identifier compared when checking compatibility
    pub id: String,
    /// Human-readable name
    pub name: String,
}

impl NodeDataType {
    /// Create a new data type tag
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A value flowing between nodes of a data-flow graph
pub trait NodeData: fmt::Debug + Any {
    /// Type tag of this value
    fn data_type(&self) -> NodeDataType;

    /// Access for downcasting to the concrete value type
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a data value
pub type SharedNodeData = Rc<dyn NodeData>;

/// Value stored under a [`PortRole`]
///
/// Every variant corresponds to exactly one role, so callers matching on the
/// variant get a statically known payload type.
#[derive(Debug, Clone)]
pub enum PortValue {
    /// Value for [`PortRole::Data`]
    Data(SharedNodeData),
    /// Value for [`PortRole::DataType`]
    DataType(NodeDataType),
    /// Value for [`PortRole::ConnectionPolicy`]
    ConnectionPolicy(ConnectionPolicy),
    /// Value for [`PortRole::CaptionVisible`]
    CaptionVisible(bool),
    /// Value for [`PortRole::Caption`]
    Caption(String),
}

impl PortValue {
    /// The role this value belongs to
    pub fn role(&self) -> PortRole {
        match self {
            Self::Data(_) => PortRole::Data,
            Self::DataType(_) => PortRole::DataType,
            Self::ConnectionPolicy(_) => PortRole::ConnectionPolicy,
            Self::CaptionVisible(_) => PortRole::CaptionVisible,
            Self::Caption(_) => PortRole::Caption,
        }
    }
}
