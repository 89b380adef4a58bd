// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node identity and node-level data roles.

use crate::style::NodeStyle;
use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node, allocated by the graph model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel returned when no node could be created or resolved
    pub const INVALID: NodeId = NodeId(u32::MAX);

    /// Whether this id refers to a real node
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#<invalid>")
        }
    }
}

/// Node-related data roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Registered type name of the node
    Type,
    /// Position in scene coordinates
    Position,
    /// Measured size
    Size,
    /// Whether the caption is drawn
    CaptionVisible,
    /// Caption text
    Caption,
    /// Style override
    Style,
    /// Number of input ports
    NumberOfInPorts,
    /// Number of output ports
    NumberOfOutPorts,
    /// Area reserved for an embedded control
    Widget,
}

/// Value stored under a [`NodeRole`]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    /// Value for [`NodeRole::Type`]
    Type(String),
    /// Value for [`NodeRole::Position`]
    Position(Pos2),
    /// Value for [`NodeRole::Size`]
    Size(Vec2),
    /// Value for [`NodeRole::CaptionVisible`]
    CaptionVisible(bool),
    /// Value for [`NodeRole::Caption`]
    Caption(String),
    /// Value for [`NodeRole::Style`]
    Style(NodeStyle),
    /// Value for [`NodeRole::NumberOfInPorts`]
    NumberOfInPorts(u32),
    /// Value for [`NodeRole::NumberOfOutPorts`]
    NumberOfOutPorts(u32),
    /// Value for [`NodeRole::Widget`]: preferred size of the embedded control
    Widget(Vec2),
}

impl NodeValue {
    /// The role this value belongs to
    pub fn role(&self) -> NodeRole {
        match self {
            Self::Type(_) => NodeRole::Type,
            Self::Position(_) => NodeRole::Position,
            Self::Size(_) => NodeRole::Size,
            Self::CaptionVisible(_) => NodeRole::CaptionVisible,
            Self::Caption(_) => NodeRole::Caption,
            Self::Style(_) => NodeRole::Style,
            Self::NumberOfInPorts(_) => NodeRole::NumberOfInPorts,
            Self::NumberOfOutPorts(_) => NodeRole::NumberOfOutPorts,
            Self::Widget(_) => NodeRole::Widget,
        }
    }
}

/// Geometry side-table entry kept by graph models, independent of node payload
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeGeometryData {
    /// Position in scene coordinates
    pub position: Pos2,
    /// Last measured size
    pub size: Vec2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_sentinel() {
        assert!(!NodeId::INVALID.is_valid());
        assert!(NodeId(0).is_valid());
        assert_eq!(NodeId(7).to_string(), "#7");
    }

    #[test]
    fn test_node_value_role() {
        assert_eq!(NodeValue::Position(Pos2::ZERO).role(), NodeRole::Position);
        assert_eq!(NodeValue::NumberOfOutPorts(2).role(), NodeRole::NumberOfOutPorts);
    }
}
