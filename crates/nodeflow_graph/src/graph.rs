// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generic graph model.
//!
//! [`SimpleGraphModel`] stores bare nodes: a registered type name with fixed
//! input/output port counts, a caption and geometry. Ports carry no data
//! types, so any output may be wired to any input.

use crate::connection::ConnectionId;
use crate::connectivity::Connectivity;
use crate::model::{GraphEvent, GraphModel};
use crate::node::{NodeGeometryData, NodeId, NodeRole, NodeValue};
use crate::port::{ConnectionPolicy, PortIndex, PortRole, PortType, PortValue};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Name of the node type every [`SimpleGraphModel`] knows
pub const DEFAULT_NODE_TYPE: &str = "default";

/// Port layout of a registered node type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTypeSpec {
    /// Caption given to new nodes of this type
    pub caption: String,
    /// Number of input ports
    pub in_ports: u32,
    /// Number of output ports
    pub out_ports: u32,
}

impl NodeTypeSpec {
    /// Create a node type description
    pub fn new(caption: impl Into<String>, in_ports: u32, out_ports: u32) -> Self {
        Self {
            caption: caption.into(),
            in_ports,
            out_ports,
        }
    }
}

#[derive(Debug, Clone)]
struct SimpleNode {
    node_type: String,
    caption: String,
    in_ports: u32,
    out_ports: u32,
    geometry: NodeGeometryData,
}

impl SimpleNode {
    fn port_count(&self, port_type: PortType) -> u32 {
        match port_type {
            PortType::In => self.in_ports,
            PortType::Out => self.out_ports,
            PortType::None => 0,
        }
    }

    fn set_port_count(&mut self, port_type: PortType, count: u32) {
        match port_type {
            PortType::In => self.in_ports = count,
            PortType::Out => self.out_ports = count,
            PortType::None => {}
        }
    }
}

/// Graph model without data types or node payloads
#[derive(Debug, Clone)]
pub struct SimpleGraphModel {
    node_types: IndexMap<String, NodeTypeSpec>,
    nodes: IndexMap<NodeId, SimpleNode>,
    connectivity: Connectivity,
    next_node_id: u32,
    output_policy: ConnectionPolicy,
    events: Vec<GraphEvent>,
}

impl SimpleGraphModel {
    /// Create an empty model knowing only [`DEFAULT_NODE_TYPE`] (one port per side)
    pub fn new() -> Self {
        let mut node_types = IndexMap::new();
        node_types.insert(DEFAULT_NODE_TYPE.to_string(), NodeTypeSpec::new("Node", 1, 1));

        Self {
            node_types,
            nodes: IndexMap::new(),
            connectivity: Connectivity::new(),
            next_node_id: 0,
            output_policy: ConnectionPolicy::Many,
            events: Vec::new(),
        }
    }

    /// Register or replace a node type
    pub fn register_node_type(&mut self, name: impl Into<String>, spec: NodeTypeSpec) {
        self.node_types.insert(name.into(), spec);
    }

    /// Registered node type names, in registration order
    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.node_types.keys().map(String::as_str)
    }

    /// Connection policy reported for every output port
    pub fn output_policy(&self) -> ConnectionPolicy {
        self.output_policy
    }

    /// Change the connection policy of every output port
    pub fn set_output_policy(&mut self, policy: ConnectionPolicy) {
        self.output_policy = policy;
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every committed connection
    pub fn connections(&self) -> HashSet<ConnectionId> {
        self.connectivity.all_connections()
    }

    /// Change the number of ports on one side of a node.
    ///
    /// Ports are added or removed at the end. Connections on removed ports are
    /// deleted after `PortsAboutToBeDeleted` is queued.
    pub fn set_port_count(&mut self, node_id: NodeId, port_type: PortType, count: u32) -> bool {
        if !port_type.is_valid() {
            return false;
        }
        let Some(current) = self.nodes.get(&node_id).map(|node| node.port_count(port_type)) else {
            return false;
        };

        if count < current {
            let ports: Vec<PortIndex> = (count..current).map(PortIndex).collect();
            let connections =
                self.connectivity
                    .connections_at(node_id, port_type, ports.iter().copied());

            self.events.push(GraphEvent::PortsAboutToBeDeleted {
                node_id,
                port_type,
                ports: ports.clone(),
                connections: connections.clone(),
            });
            for connection_id in connections {
                self.delete_connection(connection_id);
            }
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.set_port_count(port_type, count);
            }
            self.events.push(GraphEvent::PortsDeleted {
                node_id,
                port_type,
                ports,
            });
        } else if count > current {
            let ports: Vec<PortIndex> = (current..count).map(PortIndex).collect();
            self.events.push(GraphEvent::PortsAboutToBeInserted {
                node_id,
                port_type,
                ports: ports.clone(),
            });
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.set_port_count(port_type, count);
            }
            self.events.push(GraphEvent::PortsInserted {
                node_id,
                port_type,
                ports,
            });
        }

        tracing::debug!("Node {} now has {} {:?} ports", node_id, count, port_type);
        true
    }

    fn port_exists(&self, node_id: NodeId, port_type: PortType, port_index: PortIndex) -> bool {
        self.nodes
            .get(&node_id)
            .is_some_and(|node| port_index.0 < node.port_count(port_type))
    }
}

impl Default for SimpleGraphModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphModel for SimpleGraphModel {
    fn all_node_ids(&self) -> HashSet<NodeId> {
        self.nodes.keys().copied().collect()
    }

    fn node_exists(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    fn connected_nodes(
        &self,
        node_id: NodeId,
        port_type: PortType,
        port_index: PortIndex,
    ) -> HashSet<(NodeId, PortIndex)> {
        self.connectivity.connected(node_id, port_type, port_index)
    }

    fn connection_exists(&self, connection_id: ConnectionId) -> bool {
        self.connectivity.contains(connection_id)
    }

    fn all_connection_ids(&self, node_id: NodeId) -> HashSet<ConnectionId> {
        self.connectivity.connections_of(node_id)
    }

    fn add_node(&mut self, node_type: &str) -> NodeId {
        let Some(spec) = self.node_types.get(node_type) else {
            tracing::debug!("Unknown node type '{}'", node_type);
            return NodeId::INVALID;
        };

        if self.next_node_id == NodeId::INVALID.0 {
            tracing::warn!("Node ids exhausted, cannot add '{}'", node_type);
            return NodeId::INVALID;
        }
        let node_id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.insert(
            node_id,
            SimpleNode {
                node_type: node_type.to_string(),
                caption: spec.caption.clone(),
                in_ports: spec.in_ports,
                out_ports: spec.out_ports,
                geometry: NodeGeometryData::default(),
            },
        );

        tracing::debug!("Created node {} of type '{}'", node_id, node_type);
        self.events.push(GraphEvent::NodeCreated(node_id));
        node_id
    }

    fn add_connection(&mut self, connection_id: ConnectionId) {
        if !self.port_exists(connection_id.out_node_id, PortType::Out, connection_id.out_port_index)
            || !self.port_exists(connection_id.in_node_id, PortType::In, connection_id.in_port_index)
        {
            tracing::warn!("Ignoring connection {} with an unknown end", connection_id);
            return;
        }

        if self.connectivity.connect(connection_id) {
            tracing::debug!("Connected {}", connection_id);
            self.events.push(GraphEvent::ConnectionCreated(connection_id));
        }
    }

    fn delete_connection(&mut self, connection_id: ConnectionId) -> bool {
        let removed = self.connectivity.disconnect(connection_id);
        if removed {
            tracing::debug!("Disconnected {}", connection_id);
            self.events.push(GraphEvent::ConnectionDeleted(connection_id));
        }
        removed
    }

    fn delete_node(&mut self, node_id: NodeId) -> bool {
        if !self.nodes.contains_key(&node_id) {
            return false;
        }

        let mut connections: Vec<_> = self.connectivity.connections_of(node_id).into_iter().collect();
        connections.sort();
        for connection_id in connections {
            self.delete_connection(connection_id);
        }

        self.nodes.shift_remove(&node_id);
        tracing::debug!("Deleted node {}", node_id);
        self.events.push(GraphEvent::NodeDeleted(node_id));
        true
    }

    fn node_data(&self, node_id: NodeId, role: NodeRole) -> Option<NodeValue> {
        let node = self.nodes.get(&node_id)?;
        match role {
            NodeRole::Type => Some(NodeValue::Type(node.node_type.clone())),
            NodeRole::Position => Some(NodeValue::Position(node.geometry.position)),
            NodeRole::Size => Some(NodeValue::Size(node.geometry.size)),
            NodeRole::CaptionVisible => Some(NodeValue::CaptionVisible(true)),
            NodeRole::Caption => Some(NodeValue::Caption(node.caption.clone())),
            NodeRole::NumberOfInPorts => Some(NodeValue::NumberOfInPorts(node.in_ports)),
            NodeRole::NumberOfOutPorts => Some(NodeValue::NumberOfOutPorts(node.out_ports)),
            NodeRole::Style | NodeRole::Widget => None,
        }
    }

    fn set_node_data(&mut self, node_id: NodeId, role: NodeRole, value: NodeValue) -> bool {
        if value.role() != role {
            return false;
        }
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };

        match value {
            NodeValue::Position(position) => {
                node.geometry.position = position;
                self.events.push(GraphEvent::NodePositionUpdated(node_id));
                true
            }
            NodeValue::Size(size) => {
                node.geometry.size = size;
                true
            }
            NodeValue::Caption(caption) => {
                node.caption = caption;
                true
            }
            _ => false,
        }
    }

    fn port_data(
        &self,
        node_id: NodeId,
        port_type: PortType,
        port_index: PortIndex,
        role: PortRole,
    ) -> Option<PortValue> {
        if !self.port_exists(node_id, port_type, port_index) {
            return None;
        }

        match role {
            PortRole::Data | PortRole::DataType => None,
            PortRole::ConnectionPolicy => Some(PortValue::ConnectionPolicy(match port_type {
                PortType::Out => self.output_policy,
                _ => ConnectionPolicy::One,
            })),
            PortRole::CaptionVisible => Some(PortValue::CaptionVisible(true)),
            PortRole::Caption => Some(PortValue::Caption(match port_type {
                PortType::In => format!("In {}", port_index.0),
                _ => format!("Out {}", port_index.0),
            })),
        }
    }

    fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}
