// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interaction state of a connection object.

use crate::connection::ConnectionId;
use crate::node::NodeId;
use crate::port::PortType;

/// Lifecycle stage of a connection object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LooseEnd {
    /// One end follows the pointer and still needs a port of this side
    Pending {
        /// Side of the missing end
        required_port: PortType,
    },
    /// Both ends are bound to ports
    Connected,
}

/// Per-connection interaction state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    required_port: PortType,
    hovered: bool,
    last_hovered_node: Option<NodeId>,
}

impl ConnectionState {
    /// State matching a connection id: pending while one end is unresolved
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            required_port: connection_id.required_port(),
            hovered: false,
            last_hovered_node: None,
        }
    }

    /// Current lifecycle stage
    pub fn loose_end(&self) -> LooseEnd {
        match self.required_port {
            PortType::None => LooseEnd::Connected,
            required_port => LooseEnd::Pending { required_port },
        }
    }

    /// Side still waiting for a port, [`PortType::None`] once connected
    pub fn required_port(&self) -> PortType {
        self.required_port
    }

    /// Whether one end is still dangling
    pub fn requires_port(&self) -> bool {
        self.required_port != PortType::None
    }

    /// Mark one end as dangling
    pub fn set_required_port(&mut self, port_type: PortType) {
        self.required_port = port_type;
    }

    /// Mark both ends as bound
    pub fn set_no_required_port(&mut self) {
        self.required_port = PortType::None;
    }

    /// Whether the pointer is over the connection
    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    /// Update the hover flag
    pub fn set_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    /// Node last found under the dangling end
    pub fn last_hovered_node(&self) -> Option<NodeId> {
        self.last_hovered_node
    }

    /// Record the node under the dangling end.
    ///
    /// Returns the previously hovered node when it differs, so the caller can
    /// reset that node's reaction.
    pub fn interact_with_node(&mut self, node_id: NodeId) -> Option<NodeId> {
        match self.last_hovered_node.replace(node_id) {
            Some(previous) if previous != node_id => Some(previous),
            _ => None,
        }
    }

    /// Forget the hovered node, returning it
    pub fn reset_last_hovered_node(&mut self) -> Option<NodeId> {
        self.last_hovered_node.take()
    }
}
