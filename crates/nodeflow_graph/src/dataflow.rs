// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data-flow graph model.
//!
//! Every node is backed by a [`NodeDelegateModel`] created from a
//! [`NodeDelegateModelRegistry`]. Ports take their data types and policies from
//! the delegate, and values travel along connections: committing a connection
//! delivers the output's current value to the input, deleting it delivers
//! `None`, and [`DataFlowGraphModel::update_delegate`] pushes a node's outputs
//! downstream after an edit.

use crate::connection::ConnectionId;
use crate::connectivity::Connectivity;
use crate::delegate::NodeDelegateModel;
use crate::model::{GraphEvent, GraphModel};
use crate::node::{NodeGeometryData, NodeId, NodeRole, NodeValue};
use crate::port::{ConnectionPolicy, PortIndex, PortRole, PortType, PortValue, SharedNodeData};
use crate::registry::NodeDelegateModelRegistry;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// Graph model whose nodes are computational delegates
pub struct DataFlowGraphModel {
    registry: Rc<NodeDelegateModelRegistry>,
    next_node_id: u32,
    models: IndexMap<NodeId, Box<dyn NodeDelegateModel>>,
    /// Port counts as last announced through events
    port_counts: HashMap<NodeId, (u32, u32)>,
    geometry: HashMap<NodeId, NodeGeometryData>,
    connectivity: Connectivity,
    events: Vec<GraphEvent>,
}

impl DataFlowGraphModel {
    /// Create an empty model creating nodes from `registry`
    pub fn new(registry: Rc<NodeDelegateModelRegistry>) -> Self {
        Self {
            registry,
            next_node_id: 0,
            models: IndexMap::new(),
            port_counts: HashMap::new(),
            geometry: HashMap::new(),
            connectivity: Connectivity::new(),
            events: Vec::new(),
        }
    }

    /// Registry used to create nodes
    pub fn registry(&self) -> &Rc<NodeDelegateModelRegistry> {
        &self.registry
    }

    /// Delegate backing a node
    pub fn delegate(&self, node_id: NodeId) -> Option<&dyn NodeDelegateModel> {
        self.models.get(&node_id).map(|model| model.as_ref())
    }

    /// Edit a node's delegate, then propagate its outputs downstream.
    ///
    /// Port count changes made by `f` are announced through port events;
    /// connections on removed ports are deleted. Returns `None` for unknown
    /// nodes.
    pub fn update_delegate<R>(
        &mut self,
        node_id: NodeId,
        f: impl FnOnce(&mut dyn NodeDelegateModel) -> R,
    ) -> Option<R> {
        let result = f(self.models.get_mut(&node_id)?.as_mut());
        self.propagate(node_id);
        Some(result)
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.models.len()
    }

    /// How many more nodes can be allocated an id
    pub fn available_node_ids(&self) -> u32 {
        NodeId::INVALID.0 - self.next_node_id
    }

    /// Every committed connection
    pub fn connections(&self) -> HashSet<ConnectionId> {
        self.connectivity.all_connections()
    }

    /// Node ids in creation order
    pub fn node_ids_in_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.models.keys().copied()
    }

    /// Delete every node
    pub fn clear(&mut self) {
        let node_ids: Vec<NodeId> = self.models.keys().copied().collect();
        for node_id in node_ids {
            self.delete_node(node_id);
        }
    }

    fn port_exists(&self, node_id: NodeId, port_type: PortType, port_index: PortIndex) -> bool {
        self.models
            .get(&node_id)
            .is_some_and(|model| port_index.0 < model.n_ports(port_type))
    }

    /// Deliver a value to an input port, if the port still exists
    fn deliver(&mut self, node_id: NodeId, port_index: PortIndex, data: Option<SharedNodeData>) {
        if let Some(model) = self.models.get_mut(&node_id) {
            if port_index.0 < model.n_ports(PortType::In) {
                model.set_in_data(data, port_index);
            }
        }
    }

    /// Remove a connection and clear the input it fed, without propagating
    fn detach(&mut self, connection_id: ConnectionId) -> bool {
        if !self.connectivity.disconnect(connection_id) {
            return false;
        }
        tracing::debug!("Disconnected {}", connection_id);
        self.events.push(GraphEvent::ConnectionDeleted(connection_id));
        self.deliver(connection_id.in_node_id, connection_id.in_port_index, None);
        true
    }

    /// Announce port count changes of a node.
    ///
    /// Returns the downstream nodes that lost an input connection.
    fn sync_ports(&mut self, node_id: NodeId) -> Vec<NodeId> {
        let Some(model) = self.models.get(&node_id) else {
            return Vec::new();
        };
        let current = (model.n_ports(PortType::In), model.n_ports(PortType::Out));
        let previous = self.port_counts.insert(node_id, current).unwrap_or(current);

        let mut touched = Vec::new();
        for (port_type, old, new) in [
            (PortType::In, previous.0, current.0),
            (PortType::Out, previous.1, current.1),
        ] {
            if new < old {
                let ports: Vec<PortIndex> = (new..old).map(PortIndex).collect();
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
                    if self.detach(connection_id) && port_type == PortType::Out {
                        touched.push(connection_id.in_node_id);
                    }
                }
                self.events.push(GraphEvent::PortsDeleted {
                    node_id,
                    port_type,
                    ports,
                });
                tracing::debug!("Node {} dropped {:?} ports {}..{}", node_id, port_type, new, old);
            } else if new > old {
                let ports: Vec<PortIndex> = (old..new).map(PortIndex).collect();
                self.events.push(GraphEvent::PortsAboutToBeInserted {
                    node_id,
                    port_type,
                    ports: ports.clone(),
                });
                self.events.push(GraphEvent::PortsInserted {
                    node_id,
                    port_type,
                    ports,
                });
                tracing::debug!("Node {} gained {:?} ports {}..{}", node_id, port_type, old, new);
            }
        }
        touched
    }

    /// Push the outputs of `start` downstream, breadth first.
    ///
    /// Each node forwards its outputs at most once per call, which also
    /// terminates propagation around cycles.
    fn propagate(&mut self, start: NodeId) {
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);

        while let Some(node_id) = queue.pop_front() {
            let mut downstream = self.sync_ports(node_id);

            let out_ports = self
                .models
                .get(&node_id)
                .map_or(0, |model| model.n_ports(PortType::Out));
            for port_index in PortIndex::range(out_ports) {
                let data = self
                    .models
                    .get(&node_id)
                    .and_then(|model| model.out_data(port_index));

                let mut targets: Vec<_> = self
                    .connectivity
                    .connected(node_id, PortType::Out, port_index)
                    .into_iter()
                    .collect();
                targets.sort();
                for (target_node, target_port) in targets {
                    self.deliver(target_node, target_port, data.clone());
                    downstream.push(target_node);
                }
            }

            for target_node in downstream {
                if visited.insert(target_node) {
                    queue.push_back(target_node);
                }
            }
        }
        tracing::trace!("Propagated data from node {}", start);
    }
}

impl std::fmt::Debug for DataFlowGraphModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFlowGraphModel")
            .field("nodes", &self.models.keys().collect::<Vec<_>>())
            .field("connectivity", &self.connectivity)
            .finish()
    }
}

impl GraphModel for DataFlowGraphModel {
    fn all_node_ids(&self) -> HashSet<NodeId> {
        self.models.keys().copied().collect()
    }

    fn node_exists(&self, node_id: NodeId) -> bool {
        self.models.contains_key(&node_id)
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
        let Some(model) = self.registry.create(node_type) else {
            tracing::debug!("Unknown node type '{}'", node_type);
            return NodeId::INVALID;
        };

        if self.next_node_id == NodeId::INVALID.0 {
            tracing::warn!("Node ids exhausted, cannot add '{}'", node_type);
            return NodeId::INVALID;
        }
        let node_id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.port_counts.insert(
            node_id,
            (model.n_ports(PortType::In), model.n_ports(PortType::Out)),
        );
        self.models.insert(node_id, model);
        self.geometry.insert(node_id, NodeGeometryData::default());

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
        if !self.connectivity.connect(connection_id) {
            return;
        }

        tracing::debug!("Connected {}", connection_id);
        self.events.push(GraphEvent::ConnectionCreated(connection_id));

        let data = self
            .models
            .get(&connection_id.out_node_id)
            .and_then(|model| model.out_data(connection_id.out_port_index));
        self.deliver(connection_id.in_node_id, connection_id.in_port_index, data);
        self.propagate(connection_id.in_node_id);
    }

    fn delete_connection(&mut self, connection_id: ConnectionId) -> bool {
        if !self.detach(connection_id) {
            return false;
        }
        self.propagate(connection_id.in_node_id);
        true
    }

    fn delete_node(&mut self, node_id: NodeId) -> bool {
        if !self.models.contains_key(&node_id) {
            return false;
        }

        let mut connections: Vec<_> = self.connectivity.connections_of(node_id).into_iter().collect();
        connections.sort();
        for connection_id in connections {
            self.delete_connection(connection_id);
        }

        self.models.shift_remove(&node_id);
        self.geometry.remove(&node_id);
        self.port_counts.remove(&node_id);

        tracing::debug!("Deleted node {}", node_id);
        self.events.push(GraphEvent::NodeDeleted(node_id));
        true
    }

    fn node_data(&self, node_id: NodeId, role: NodeRole) -> Option<NodeValue> {
        let model = self.models.get(&node_id)?;
        let geometry = self.geometry.get(&node_id).copied().unwrap_or_default();

        match role {
            NodeRole::Type => Some(NodeValue::Type(model.name())),
            NodeRole::Position => Some(NodeValue::Position(geometry.position)),
            NodeRole::Size => Some(NodeValue::Size(geometry.size)),
            NodeRole::CaptionVisible => Some(NodeValue::CaptionVisible(model.caption_visible())),
            NodeRole::Caption => Some(NodeValue::Caption(model.caption())),
            NodeRole::Style => model.style().map(NodeValue::Style),
            NodeRole::NumberOfInPorts => Some(NodeValue::NumberOfInPorts(model.n_ports(PortType::In))),
            NodeRole::NumberOfOutPorts => {
                Some(NodeValue::NumberOfOutPorts(model.n_ports(PortType::Out)))
            }
            NodeRole::Widget => model.embedded_widget_size().map(NodeValue::Widget),
        }
    }

    fn set_node_data(&mut self, node_id: NodeId, role: NodeRole, value: NodeValue) -> bool {
        if value.role() != role || !self.models.contains_key(&node_id) {
            return false;
        }
        let geometry = self.geometry.entry(node_id).or_default();

        match value {
            NodeValue::Position(position) => {
                geometry.position = position;
                self.events.push(GraphEvent::NodePositionUpdated(node_id));
                true
            }
            NodeValue::Size(size) => {
                geometry.size = size;
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
        let model = self.models.get(&node_id)?;

        match role {
            PortRole::Data => match port_type {
                PortType::Out => model.out_data(port_index).map(PortValue::Data),
                _ => {
                    let (source_node, source_port) = self
                        .connectivity
                        .connected(node_id, PortType::In, port_index)
                        .into_iter()
                        .min()?;
                    self.models
                        .get(&source_node)?
                        .out_data(source_port)
                        .map(PortValue::Data)
                }
            },
            PortRole::DataType => Some(PortValue::DataType(model.data_type(port_type, port_index))),
            PortRole::ConnectionPolicy => Some(PortValue::ConnectionPolicy(match port_type {
                PortType::Out => model.port_out_connection_policy(port_index),
                _ => ConnectionPolicy::One,
            })),
            PortRole::CaptionVisible => Some(PortValue::CaptionVisible(
                model.port_caption_visible(port_type, port_index),
            )),
            PortRole::Caption => Some(PortValue::Caption(model.port_caption(port_type, port_index))),
        }
    }

    fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}
