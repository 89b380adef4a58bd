// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) identity.
//!
//! A connection is named by the four values that pin down both of its ends.
//! While a connection is being dragged one end holds the invalid sentinels;
//! such a draft id never enters a model's connectivity map.

use crate::node::NodeId;
use crate::port::{PortIndex, PortType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a connection: (out node, out port, in node, in port)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId {
    /// Node owning the output end
    pub out_node_id: NodeId,
    /// Output port index
    pub out_port_index: PortIndex,
    /// Node owning the input end
    pub in_node_id: NodeId,
    /// Input port index
    pub in_port_index: PortIndex,
}

impl ConnectionId {
    /// Create a connection id from both ends
    pub fn new(
        out_node_id: NodeId,
        out_port_index: PortIndex,
        in_node_id: NodeId,
        in_port_index: PortIndex,
    ) -> Self {
        Self {
            out_node_id,
            out_port_index,
            in_node_id,
            in_port_index,
        }
    }

    /// Create a draft id attached to one port, with the other end dangling
    pub fn incomplete(connected_port: PortType, node_id: NodeId, port_index: PortIndex) -> Self {
        let mut id = Self::new(
            NodeId::INVALID,
            PortIndex::INVALID,
            NodeId::INVALID,
            PortIndex::INVALID,
        );
        id.set_end(connected_port, node_id, port_index);
        id
    }

    /// Node at the given end, or the invalid sentinel for [`PortType::None`]
    pub fn node_id(&self, port_type: PortType) -> NodeId {
        match port_type {
            PortType::Out => self.out_node_id,
            PortType::In => self.in_node_id,
            PortType::None => NodeId::INVALID,
        }
    }

    /// Port at the given end, or the invalid sentinel for [`PortType::None`]
    pub fn port_index(&self, port_type: PortType) -> PortIndex {
        match port_type {
            PortType::Out => self.out_port_index,
            PortType::In => self.in_port_index,
            PortType::None => PortIndex::INVALID,
        }
    }

    /// Bind one end of the connection
    pub fn set_end(&mut self, port_type: PortType, node_id: NodeId, port_index: PortIndex) {
        match port_type {
            PortType::Out => {
                self.out_node_id = node_id;
                self.out_port_index = port_index;
            }
            PortType::In => {
                self.in_node_id = node_id;
                self.in_port_index = port_index;
            }
            PortType::None => {}
        }
    }

    /// Copy of this id with one end cleared
    pub fn detached(mut self, port_type: PortType) -> Self {
        self.set_end(port_type, NodeId::INVALID, PortIndex::INVALID);
        self
    }

    /// Whether the given end points at a real port
    pub fn is_end_valid(&self, port_type: PortType) -> bool {
        port_type.is_valid() && self.node_id(port_type).is_valid() && self.port_index(port_type).is_valid()
    }

    /// Whether both ends are resolved
    pub fn is_complete(&self) -> bool {
        self.is_end_valid(PortType::Out) && self.is_end_valid(PortType::In)
    }

    /// The end still waiting for a port, [`PortType::None`] when complete
    pub fn required_port(&self) -> PortType {
        match (self.is_end_valid(PortType::Out), self.is_end_valid(PortType::In)) {
            (true, false) => PortType::In,
            (false, true) => PortType::Out,
            _ => PortType::None,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.out_node_id == node_id || self.in_node_id == node_id
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.out_node_id, self.out_port_index, self.in_node_id, self.in_port_index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_connection() {
        let id = ConnectionId::incomplete(PortType::Out, NodeId(3), PortIndex(1));
        assert_eq!(id.out_node_id, NodeId(3));
        assert_eq!(id.out_port_index, PortIndex(1));
        assert!(!id.is_complete());
        assert_eq!(id.required_port(), PortType::In);

        let id = ConnectionId::incomplete(PortType::In, NodeId(4), PortIndex(0));
        assert_eq!(id.required_port(), PortType::Out);
        assert_eq!(id.node_id(PortType::In), NodeId(4));
    }

    #[test]
    fn test_complete_connection() {
        let id = ConnectionId::new(NodeId(0), PortIndex(0), NodeId(1), PortIndex(2));
        assert!(id.is_complete());
        assert_eq!(id.required_port(), PortType::None);
        assert!(id.involves_node(NodeId(1)));
        assert!(!id.involves_node(NodeId(2)));

        let detached = id.detached(PortType::In);
        assert_eq!(detached.required_port(), PortType::In);
        assert_eq!(detached.out_node_id, NodeId(0));
    }
}
