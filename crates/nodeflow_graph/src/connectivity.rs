// SPDX-License-Identifier: MIT OR Apache-2.0
//! Symmetric adjacency index shared by the graph model implementations.

use crate::connection::ConnectionId;
use crate::node::NodeId;
use crate::port::{PortIndex, PortType};
use std::collections::{HashMap, HashSet};

/// Key of one port in the connectivity map
pub type PortKey = (NodeId, PortType, PortIndex);

/// Adjacency index from a port to the ports on the opposite side.
///
/// Both directions are always updated together: if `(A, Out, i)` lists
/// `(B, j)` then `(B, In, j)` lists `(A, i)`. Empty entries are pruned.
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    map: HashMap<PortKey, HashSet<(NodeId, PortIndex)>>,
}

impl Connectivity {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a complete connection. Returns false if it was already present
    /// or if either end is unresolved.
    pub fn connect(&mut self, connection_id: ConnectionId) -> bool {
        if !connection_id.is_complete() || self.contains(connection_id) {
            return false;
        }

        for port_type in [PortType::Out, PortType::In] {
            let opposite = port_type.opposite();
            self.map
                .entry(Self::key(connection_id, port_type))
                .or_default()
                .insert((connection_id.node_id(opposite), connection_id.port_index(opposite)));
        }
        true
    }

    /// Remove a connection from both directions. Returns false if absent.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> bool {
        if !self.contains(connection_id) {
            return false;
        }

        for port_type in [PortType::Out, PortType::In] {
            let key = Self::key(connection_id, port_type);
            let opposite = port_type.opposite();
            if let Some(entries) = self.map.get_mut(&key) {
                entries.remove(&(connection_id.node_id(opposite), connection_id.port_index(opposite)));
                if entries.is_empty() {
                    self.map.remove(&key);
                }
            }
        }
        true
    }

    /// Opposite-side endpoints of a port; empty when unconnected or unknown
    pub fn connected(
        &self,
        node_id: NodeId,
        port_type: PortType,
        port_index: PortIndex,
    ) -> HashSet<(NodeId, PortIndex)> {
        self.map
            .get(&(node_id, port_type, port_index))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the port holds at least one connection
    pub fn is_connected(&self, node_id: NodeId, port_type: PortType, port_index: PortIndex) -> bool {
        self.map.contains_key(&(node_id, port_type, port_index))
    }

    /// Whether a committed connection exists
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.map
            .get(&Self::key(connection_id, PortType::Out))
            .is_some_and(|entries| {
                entries.contains(&(connection_id.in_node_id, connection_id.in_port_index))
            })
    }

    /// All connections touching a node
    pub fn connections_of(&self, node_id: NodeId) -> HashSet<ConnectionId> {
        self.map
            .iter()
            .filter(|((key_node, port_type, _), _)| *key_node == node_id && port_type.is_valid())
            .flat_map(|(&(key_node, port_type, port_index), entries)| {
                entries.iter().map(move |&(other_node, other_port)| match port_type {
                    PortType::In => ConnectionId::new(other_node, other_port, key_node, port_index),
                    _ => ConnectionId::new(key_node, port_index, other_node, other_port),
                })
            })
            .collect()
    }

    /// All connections touching the given ports of a node
    pub fn connections_at(
        &self,
        node_id: NodeId,
        port_type: PortType,
        ports: impl IntoIterator<Item = PortIndex>,
    ) -> Vec<ConnectionId> {
        let mut connections: Vec<_> = ports
            .into_iter()
            .flat_map(|port_index| {
                self.connected(node_id, port_type, port_index)
                    .into_iter()
                    .map(move |(other_node, other_port)| match port_type {
                        PortType::In => ConnectionId::new(other_node, other_port, node_id, port_index),
                        _ => ConnectionId::new(node_id, port_index, other_node, other_port),
                    })
            })
            .collect();
        connections.sort();
        connections
    }

    /// Every committed connection
    pub fn all_connections(&self) -> HashSet<ConnectionId> {
        self.map
            .iter()
            .filter(|((_, port_type, _), _)| *port_type == PortType::Out)
            .flat_map(|(&(out_node, _, out_port), entries)| {
                entries
                    .iter()
                    .map(move |&(in_node, in_port)| ConnectionId::new(out_node, out_port, in_node, in_port))
            })
            .collect()
    }

    /// Whether no connection is recorded
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Remove every connection
    pub fn clear(&mut self) {
        self.map.clear();
    }

    fn key(connection_id: ConnectionId, port_type: PortType) -> PortKey {
        (
            connection_id.node_id(port_type),
            port_type,
            connection_id.port_index(port_type),
        )
    }
}
