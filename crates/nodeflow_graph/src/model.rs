// SPDX-License-Identifier: MIT OR Apache-2.0
//! The abstract graph model.
//!
//! A [`GraphModel`] is the single source of truth for nodes, ports and
//! connectivity. Presentation layers never own model data; they hold ids and
//! learn about mutations exclusively through [`GraphEvent`]s, which a model
//! queues while a mutating call runs and hands out through
//! [`GraphModel::take_events`].
//!
//! Lookups never fail loudly: unknown nodes, ports or roles yield `None`,
//! empty sets or `false`.

use crate::connection::ConnectionId;
use crate::node::{NodeId, NodeRole, NodeValue};
use crate::port::{ConnectionPolicy, NodeDataType, PortIndex, PortRole, PortType, PortValue};
use crate::style::NodeStyle;
use egui::{Pos2, Vec2};
use std::collections::HashSet;

/// Structural change notifications raised by a graph model
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A node was added
    NodeCreated(NodeId),
    /// A node was removed, after all of its connections
    NodeDeleted(NodeId),
    /// A node's position changed
    NodePositionUpdated(NodeId),
    /// A connection was committed
    ConnectionCreated(ConnectionId),
    /// A connection was removed
    ConnectionDeleted(ConnectionId),
    /// Ports are going away.
    ///
    /// Events are drained after the mutating call returns, so the
    /// connections incident on the doomed ports are captured here, before
    /// removal. They are followed by `ConnectionDeleted` events.
    PortsAboutToBeDeleted {
        /// Owning node
        node_id: NodeId,
        /// Side of the ports
        port_type: PortType,
        /// Indices being removed
        ports: Vec<PortIndex>,
        /// Connections that touched the removed ports
        connections: Vec<ConnectionId>,
    },
    /// Ports were removed
    PortsDeleted {
        /// Owning node
        node_id: NodeId,
        /// Side of the ports
        port_type: PortType,
        /// Indices removed
        ports: Vec<PortIndex>,
    },
    /// Ports are about to be added
    PortsAboutToBeInserted {
        /// Owning node
        node_id: NodeId,
        /// Side of the ports
        port_type: PortType,
        /// Indices being added
        ports: Vec<PortIndex>,
    },
    /// Ports were added
    PortsInserted {
        /// Owning node
        node_id: NodeId,
        /// Side of the ports
        port_type: PortType,
        /// Indices added
        ports: Vec<PortIndex>,
    },
}

/// Contract every graph model variant implements
pub trait GraphModel {
    /// Snapshot of live node ids, in no particular order
    fn all_node_ids(&self) -> HashSet<NodeId>;

    /// Whether the node exists
    fn node_exists(&self, node_id: NodeId) -> bool;

    /// Opposite-side endpoints of a port; empty if unconnected or unknown
    fn connected_nodes(
        &self,
        node_id: NodeId,
        port_type: PortType,
        port_index: PortIndex,
    ) -> HashSet<(NodeId, PortIndex)>;

    /// Whether a committed connection exists
    fn connection_exists(&self, connection_id: ConnectionId) -> bool {
        connection_id.is_complete()
            && self
                .connected_nodes(
                    connection_id.out_node_id,
                    PortType::Out,
                    connection_id.out_port_index,
                )
                .contains(&(connection_id.in_node_id, connection_id.in_port_index))
    }

    /// Every committed connection touching a node
    fn all_connection_ids(&self, node_id: NodeId) -> HashSet<ConnectionId> {
        let mut result = HashSet::new();
        for port_type in [PortType::In, PortType::Out] {
            for port_index in PortIndex::range(self.port_count(node_id, port_type)) {
                for (other_node, other_port) in self.connected_nodes(node_id, port_type, port_index) {
                    result.insert(match port_type {
                        PortType::In => ConnectionId::new(other_node, other_port, node_id, port_index),
                        _ => ConnectionId::new(node_id, port_index, other_node, other_port),
                    });
                }
            }
        }
        result
    }

    /// Create a node of a registered type.
    ///
    /// Returns [`NodeId::INVALID`] without mutating anything when the type is
    /// unknown.
    fn add_node(&mut self, node_type: &str) -> NodeId;

    /// Whether the two ends of a connection carry the same data type
    fn connection_possible(&self, connection_id: ConnectionId) -> bool {
        let out_type = self.port_data_type(
            connection_id.out_node_id,
            PortType::Out,
            connection_id.out_port_index,
        );
        let in_type = self.port_data_type(
            connection_id.in_node_id,
            PortType::In,
            connection_id.in_port_index,
        );
        out_type == in_type
    }

    /// Commit a connection. Both ends must refer to existing ports.
    fn add_connection(&mut self, connection_id: ConnectionId);

    /// Remove a committed connection. Returns false if it did not exist.
    fn delete_connection(&mut self, connection_id: ConnectionId) -> bool;

    /// Remove a node after all of its connections.
    fn delete_node(&mut self, node_id: NodeId) -> bool;

    /// Read a node role
    fn node_data(&self, node_id: NodeId, role: NodeRole) -> Option<NodeValue>;

    /// Write a node role. Returns false when the role is read-only, the node
    /// is unknown or `value` belongs to another role.
    fn set_node_data(&mut self, node_id: NodeId, role: NodeRole, value: NodeValue) -> bool;

    /// Read a port role
    fn port_data(
        &self,
        node_id: NodeId,
        port_type: PortType,
        port_index: PortIndex,
        role: PortRole,
    ) -> Option<PortValue>;

    /// Write a port role
    fn set_port_data(
        &mut self,
        _node_id: NodeId,
        _port_type: PortType,
        _port_index: PortIndex,
        _role: PortRole,
        _value: PortValue,
    ) -> bool {
        false
    }

    /// Drain the notifications raised since the last call
    fn take_events(&mut self) -> Vec<GraphEvent>;

    // Typed accessors over the role-keyed interface.

    /// Node position
    fn node_position(&self, node_id: NodeId) -> Option<Pos2> {
        match self.node_data(node_id, NodeRole::Position)? {
            NodeValue::Position(position) => Some(position),
            _ => None,
        }
    }

    /// Last measured node size
    fn node_size(&self, node_id: NodeId) -> Option<Vec2> {
        match self.node_data(node_id, NodeRole::Size)? {
            NodeValue::Size(size) => Some(size),
            _ => None,
        }
    }

    /// Registered type name
    fn node_type(&self, node_id: NodeId) -> Option<String> {
        match self.node_data(node_id, NodeRole::Type)? {
            NodeValue::Type(name) => Some(name),
            _ => None,
        }
    }

    /// Caption, if it should be drawn
    fn visible_caption(&self, node_id: NodeId) -> Option<String> {
        let visible = match self.node_data(node_id, NodeRole::CaptionVisible) {
            Some(NodeValue::CaptionVisible(visible)) => visible,
            _ => true,
        };
        if !visible {
            return None;
        }
        match self.node_data(node_id, NodeRole::Caption)? {
            NodeValue::Caption(caption) => Some(caption),
            _ => None,
        }
    }

    /// Style override
    fn node_style(&self, node_id: NodeId) -> Option<NodeStyle> {
        match self.node_data(node_id, NodeRole::Style)? {
            NodeValue::Style(style) => Some(style),
            _ => None,
        }
    }

    /// Size reserved for an embedded control
    fn widget_size(&self, node_id: NodeId) -> Option<Vec2> {
        match self.node_data(node_id, NodeRole::Widget)? {
            NodeValue::Widget(size) => Some(size),
            _ => None,
        }
    }

    /// Number of ports on one side; zero for unknown nodes
    fn port_count(&self, node_id: NodeId, port_type: PortType) -> u32 {
        let role = match port_type {
            PortType::In => NodeRole::NumberOfInPorts,
            PortType::Out => NodeRole::NumberOfOutPorts,
            PortType::None => return 0,
        };
        match self.node_data(node_id, role) {
            Some(NodeValue::NumberOfInPorts(count) | NodeValue::NumberOfOutPorts(count)) => count,
            _ => 0,
        }
    }

    /// Data type of a port
    fn port_data_type(
        &self,
        node_id: NodeId,
        port_type: PortType,
        port_index: PortIndex,
    ) -> Option<NodeDataType> {
        match self.port_data(node_id, port_type, port_index, PortRole::DataType)? {
            PortValue::DataType(data_type) => Some(data_type),
            _ => None,
        }
    }

    /// Connection policy of a port; input ports always accept a single link
    fn port_connection_policy(
        &self,
        node_id: NodeId,
        port_type: PortType,
        port_index: PortIndex,
    ) -> ConnectionPolicy {
        if port_type != PortType::Out {
            return ConnectionPolicy::One;
        }
        match self.port_data(node_id, port_type, port_index, PortRole::ConnectionPolicy) {
            Some(PortValue::ConnectionPolicy(policy)) => policy,
            _ => ConnectionPolicy::One,
        }
    }

    /// Port caption, if it should be drawn
    fn visible_port_caption(
        &self,
        node_id: NodeId,
        port_type: PortType,
        port_index: PortIndex,
    ) -> Option<String> {
        let visible = matches!(
            self.port_data(node_id, port_type, port_index, PortRole::CaptionVisible),
            Some(PortValue::CaptionVisible(true))
        );
        if !visible {
            return None;
        }
        match self.port_data(node_id, port_type, port_index, PortRole::Caption)? {
            PortValue::Caption(caption) => Some(caption),
            _ => None,
        }
    }
}
