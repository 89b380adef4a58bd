// SPDX-License-Identifier: MIT OR Apache-2.0
//! Saving and loading data-flow graphs.
//!
//! A document lists nodes (id, delegate name plus delegate state, position)
//! and connections by document ids. Loading allocates fresh node ids, so a
//! document can be merged into a non-empty graph.

use crate::connection::ConnectionId;
use crate::dataflow::DataFlowGraphModel;
use crate::delegate::NodeDelegateModel;
use crate::model::GraphModel;
use crate::node::{NodeId, NodeRole, NodeValue};
use crate::port::{ConnectionPolicy, PortIndex, PortType};
use egui::Pos2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// File extension used for saved graphs
pub const DOCUMENT_EXTENSION: &str = "flow";

/// Errors raised while saving or loading a graph document
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON for this layout
    #[error("Invalid document: {0}")]
    Json(#[from] serde_json::Error),

    /// A node record carries no delegate name
    #[error("Node {0} has no model name")]
    MissingModelName(u32),

    /// A node record names an unregistered delegate
    #[error("Node {id} uses unknown model '{name}'")]
    UnknownModel {
        /// Document id of the node
        id: u32,
        /// Delegate name found in the document
        name: String,
    },

    /// Two node records share an id
    #[error("Duplicate node id {0}")]
    DuplicateNode(u32),

    /// A connection references a node missing from the document
    #[error("Connection {out_id}:{out_index} -> {in_id}:{in_index} references an unknown node")]
    DanglingConnection {
        /// Output node
        out_id: u32,
        /// Output port
        out_index: u32,
        /// Input node
        in_id: u32,
        /// Input port
        in_index: u32,
    },

    /// A connection references a port the node does not have
    #[error("Node {node} has no {port_type:?} port {index}")]
    InvalidPort {
        /// Document id of the node
        node: u32,
        /// Side of the port
        port_type: PortType,
        /// Port index
        index: u32,
    },

    /// The graph cannot allocate ids for every node of the document
    #[error("Document has {0} nodes but the graph has run out of node ids")]
    NodeIdsExhausted(usize),

    /// A connection leads from a node back into itself
    #[error("Connection loops node {0} back into itself")]
    SelfLoop(u32),

    /// A port already holds as many connections as its policy allows
    #[error("Node {node} {port_type:?} port {index} is already connected")]
    PortOccupied {
        /// Document id of the node
        node: u32,
        /// Side of the port
        port_type: PortType,
        /// Port index
        index: u32,
    },

    /// The two ends of a connection carry different data types
    #[error("Connection {out_id}:{out_index} -> {in_id}:{in_index} joins '{out_type}' to '{in_type}'")]
    IncompatibleDataTypes {
        /// Output node
        out_id: u32,
        /// Output port
        out_index: u32,
        /// Input node
        in_id: u32,
        /// Input port
        in_index: u32,
        /// Data type id of the output
        out_type: String,
        /// Data type id of the input
        in_type: String,
    },
}

/// Saved node position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

/// Saved node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Document id
    pub id: u32,
    /// Delegate state; always an object holding at least `name`
    pub model: serde_json::Value,
    /// Position in scene coordinates
    #[serde(default)]
    pub position: PositionRecord,
}

impl NodeRecord {
    /// Delegate name stored in the record
    pub fn model_name(&self) -> Option<&str> {
        self.model.get("name").and_then(serde_json::Value::as_str)
    }
}

/// Saved connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Output node document id
    pub out_id: u32,
    /// Output port
    pub out_index: u32,
    /// Input node document id
    pub in_id: u32,
    /// Input port
    pub in_index: u32,
}

/// A saved graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Nodes in creation order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Connections, sorted
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

impl DataFlowGraphModel {
    /// Capture the graph as a document
    pub fn save_document(&self) -> SceneDocument {
        let nodes = self
            .node_ids_in_order()
            .filter_map(|node_id| {
                let delegate = self.delegate(node_id)?;
                let mut model = match delegate.save() {
                    serde_json::Value::Object(map) => map,
                    serde_json::Value::Null => serde_json::Map::new(),
                    other => {
                        let mut map = serde_json::Map::new();
                        map.insert("state".to_string(), other);
                        map
                    }
                };
                model.insert("name".to_string(), serde_json::Value::String(delegate.name()));

                let position = self.node_position(node_id).unwrap_or_default();
                Some(NodeRecord {
                    id: node_id.0,
                    model: serde_json::Value::Object(model),
                    position: PositionRecord {
                        x: position.x,
                        y: position.y,
                    },
                })
            })
            .collect();

        let mut connections: Vec<ConnectionId> = self.connections().into_iter().collect();
        connections.sort();
        let connections = connections
            .into_iter()
            .map(|id| ConnectionRecord {
                out_id: id.out_node_id.0,
                out_index: id.out_port_index.0,
                in_id: id.in_node_id.0,
                in_index: id.in_port_index.0,
            })
            .collect();

        SceneDocument { nodes, connections }
    }

    /// Add the nodes and connections of a document to the graph.
    ///
    /// The whole document is validated before the graph is touched. Returns
    /// the mapping from document ids to the allocated node ids.
    pub fn load_document(
        &mut self,
        document: &SceneDocument,
    ) -> Result<HashMap<u32, NodeId>, PersistenceError> {
        self.validate_document(document)?;

        let mut id_map = HashMap::new();
        for record in &document.nodes {
            let name = record.model_name().unwrap_or_default();
            let node_id = self.add_node(name);
            self.set_node_data(
                node_id,
                NodeRole::Position,
                NodeValue::Position(Pos2::new(record.position.x, record.position.y)),
            );
            self.update_delegate(node_id, |delegate| delegate.restore(&record.model));
            id_map.insert(record.id, node_id);
        }

        for record in &document.connections {
            if let (Some(&out_node), Some(&in_node)) =
                (id_map.get(&record.out_id), id_map.get(&record.in_id))
            {
                self.add_connection(ConnectionId::new(
                    out_node,
                    PortIndex(record.out_index),
                    in_node,
                    PortIndex(record.in_index),
                ));
            }
        }

        tracing::debug!(
            "Loaded {} nodes and {} connections",
            document.nodes.len(),
            document.connections.len()
        );
        Ok(id_map)
    }

    /// Serialize the graph to pretty-printed JSON
    pub fn save_to_memory(&self) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec_pretty(&self.save_document())?)
    }

    /// Add a graph serialized by [`save_to_memory`](Self::save_to_memory)
    pub fn load_from_memory(&mut self, bytes: &[u8]) -> Result<HashMap<u32, NodeId>, PersistenceError> {
        let document: SceneDocument = serde_json::from_slice(bytes)?;
        self.load_document(&document)
    }

    /// Save the graph to a file
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        std::fs::write(path, self.save_to_memory()?)?;
        tracing::info!("Saved graph to {:?}", path);
        Ok(())
    }

    /// Add the graph stored in a file
    pub fn load(&mut self, path: &Path) -> Result<HashMap<u32, NodeId>, PersistenceError> {
        let bytes = std::fs::read(path)?;
        let id_map = self.load_from_memory(&bytes)?;
        tracing::info!("Loaded graph from {:?}", path);
        Ok(id_map)
    }

    fn validate_document(&self, document: &SceneDocument) -> Result<(), PersistenceError> {
        if document.nodes.len() > self.available_node_ids() as usize {
            return Err(PersistenceError::NodeIdsExhausted(document.nodes.len()));
        }

        // Restored scratch delegates, keyed by document id
        let mut delegates: HashMap<u32, Box<dyn NodeDelegateModel>> = HashMap::new();

        for record in &document.nodes {
            let name = record
                .model_name()
                .ok_or(PersistenceError::MissingModelName(record.id))?;
            let mut delegate =
                self.registry()
                    .create(name)
                    .ok_or_else(|| PersistenceError::UnknownModel {
                        id: record.id,
                        name: name.to_string(),
                    })?;
            delegate.restore(&record.model);

            if delegates.insert(record.id, delegate).is_some() {
                return Err(PersistenceError::DuplicateNode(record.id));
            }
        }

        let mut occupied_inputs: HashSet<(u32, u32)> = HashSet::new();
        let mut linked_outputs: HashSet<(u32, u32)> = HashSet::new();

        for record in &document.connections {
            let (Some(out_delegate), Some(in_delegate)) =
                (delegates.get(&record.out_id), delegates.get(&record.in_id))
            else {
                return Err(PersistenceError::DanglingConnection {
                    out_id: record.out_id,
                    out_index: record.out_index,
                    in_id: record.in_id,
                    in_index: record.in_index,
                });
            };
            if record.out_index >= out_delegate.n_ports(PortType::Out) {
                return Err(PersistenceError::InvalidPort {
                    node: record.out_id,
                    port_type: PortType::Out,
                    index: record.out_index,
                });
            }
            if record.in_index >= in_delegate.n_ports(PortType::In) {
                return Err(PersistenceError::InvalidPort {
                    node: record.in_id,
                    port_type: PortType::In,
                    index: record.in_index,
                });
            }
            if record.out_id == record.in_id {
                return Err(PersistenceError::SelfLoop(record.out_id));
            }

            let out_type = out_delegate.data_type(PortType::Out, PortIndex(record.out_index));
            let in_type = in_delegate.data_type(PortType::In, PortIndex(record.in_index));
            if out_type != in_type {
                return Err(PersistenceError::IncompatibleDataTypes {
                    out_id: record.out_id,
                    out_index: record.out_index,
                    in_id: record.in_id,
                    in_index: record.in_index,
                    out_type: out_type.id,
                    in_type: in_type.id,
                });
            }

            if !occupied_inputs.insert((record.in_id, record.in_index)) {
                return Err(PersistenceError::PortOccupied {
                    node: record.in_id,
                    port_type: PortType::In,
                    index: record.in_index,
                });
            }
            let first_link = linked_outputs.insert((record.out_id, record.out_index));
            let policy = out_delegate.port_out_connection_policy(PortIndex(record.out_index));
            if !first_link && policy == ConnectionPolicy::One {
                return Err(PersistenceError::PortOccupied {
                    node: record.out_id,
                    port_type: PortType::Out,
                    index: record.out_index,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::tests::{number_at, test_registry};

    fn sample_model() -> (DataFlowGraphModel, NodeId, NodeId, NodeId) {
        let mut model = DataFlowGraphModel::new(test_registry());
        let a = model.add_node("Constant");
        let b = model.add_node("Constant");
        let sum = model.add_node("Sum");
        model.update_delegate(a, |delegate| delegate.restore(&serde_json::json!({ "value": 1.5 })));
        model.update_delegate(b, |delegate| delegate.restore(&serde_json::json!({ "value": 2.0 })));
        model.set_node_data(sum, NodeRole::Position, NodeValue::Position(Pos2::new(200.0, 40.0)));
        model.add_connection(ConnectionId::new(a, PortIndex(0), sum, PortIndex(0)));
        model.add_connection(ConnectionId::new(b, PortIndex(0), sum, PortIndex(1)));
        (model, a, b, sum)
    }

    #[test]
    fn test_document_layout() {
        let (model, a, _, sum) = sample_model();
        let document = model.save_document();

        assert_eq!(document.nodes.len(), 3);
        assert_eq!(document.nodes[0].id, a.0);
        assert_eq!(document.nodes[0].model_name(), Some("Constant"));
        assert_eq!(document.nodes[0].model["value"], serde_json::json!(1.5));
        assert_eq!(document.nodes[2].position, PositionRecord { x: 200.0, y: 40.0 });
        assert_eq!(
            document.connections[0],
            ConnectionRecord {
                out_id: a.0,
                out_index: 0,
                in_id: sum.0,
                in_index: 0
            }
        );
    }

    #[test]
    fn test_memory_round_trip() {
        let (model, _, _, _) = sample_model();
        let bytes = model.save_to_memory().unwrap();

        let mut restored = DataFlowGraphModel::new(test_registry());
        let id_map = restored.load_from_memory(&bytes).unwrap();

        assert_eq!(restored.node_count(), 3);
        assert_eq!(restored.connections().len(), 2);
        let sum = id_map[&2];
        assert_eq!(number_at(&restored, sum, PortType::Out, 0), Some(3.5));
        assert_eq!(restored.node_position(sum), Some(Pos2::new(200.0, 40.0)));
        assert_eq!(restored.save_document(), model.save_document());
    }

    #[test]
    fn test_load_remaps_ids() {
        let (model, _, _, _) = sample_model();
        let document = model.save_document();

        let mut merged = DataFlowGraphModel::new(test_registry());
        merged.add_node("Sum");
        let id_map = merged.load_document(&document).unwrap();

        assert_eq!(merged.node_count(), 4);
        assert_eq!(id_map[&0], NodeId(1));
        assert!(merged
            .connections()
            .iter()
            .all(|id| id.out_node_id != NodeId(0) && id.in_node_id != NodeId(0)));
    }

    #[test]
    fn test_unknown_model_leaves_graph_untouched() {
        let mut document = SceneDocument::default();
        document.nodes.push(NodeRecord {
            id: 0,
            model: serde_json::json!({ "name": "Constant" }),
            position: PositionRecord::default(),
        });
        document.nodes.push(NodeRecord {
            id: 1,
            model: serde_json::json!({ "name": "Teleporter" }),
            position: PositionRecord::default(),
        });

        let mut model = DataFlowGraphModel::new(test_registry());
        let result = model.load_document(&document);
        assert!(matches!(result, Err(PersistenceError::UnknownModel { id: 1, .. })));
        assert_eq!(model.node_count(), 0);
        assert!(model.take_events().is_empty());
    }

    #[test]
    fn test_invalid_connections_rejected() {
        let node = |id| NodeRecord {
            id,
            model: serde_json::json!({ "name": "Constant" }),
            position: PositionRecord::default(),
        };
        let mut document = SceneDocument {
            nodes: vec![node(0), node(1)],
            connections: vec![ConnectionRecord {
                out_id: 0,
                out_index: 0,
                in_id: 5,
                in_index: 0,
            }],
        };

        let mut model = DataFlowGraphModel::new(test_registry());
        assert!(matches!(
            model.load_document(&document),
            Err(PersistenceError::DanglingConnection { in_id: 5, .. })
        ));

        // Constants have no inputs
        document.connections[0].in_id = 1;
        assert!(matches!(
            model.load_document(&document),
            Err(PersistenceError::InvalidPort {
                node: 1,
                port_type: PortType::In,
                ..
            })
        ));

        document.nodes.push(node(1));
        document.connections.clear();
        assert!(matches!(
            model.load_document(&document),
            Err(PersistenceError::DuplicateNode(1))
        ));
        assert_eq!(model.node_count(), 0);
    }

    /// Constants 0 and 1, sums 2 and 3, text sink 4
    fn port_rule_document(connections: &[(u32, u32, u32, u32)]) -> SceneDocument {
        let node = |id, name: &str| NodeRecord {
            id,
            model: serde_json::json!({ "name": name }),
            position: PositionRecord::default(),
        };
        SceneDocument {
            nodes: vec![
                node(0, "Constant"),
                node(1, "Constant"),
                node(2, "Sum"),
                node(3, "Sum"),
                node(4, "TextSink"),
            ],
            connections: connections
                .iter()
                .map(|&(out_id, out_index, in_id, in_index)| ConnectionRecord {
                    out_id,
                    out_index,
                    in_id,
                    in_index,
                })
                .collect(),
        }
    }

    #[test]
    fn test_port_rules_enforced_on_load() {
        let mut model = DataFlowGraphModel::new(test_registry());

        // Two connections into one input
        let document = port_rule_document(&[(0, 0, 2, 0), (1, 0, 2, 0)]);
        assert!(matches!(
            model.load_document(&document),
            Err(PersistenceError::PortOccupied {
                node: 2,
                port_type: PortType::In,
                index: 0
            })
        ));

        let document = port_rule_document(&[(2, 0, 2, 1)]);
        assert!(matches!(
            model.load_document(&document),
            Err(PersistenceError::SelfLoop(2))
        ));

        // Sum outputs hold a single link
        let document = port_rule_document(&[(2, 0, 3, 0), (2, 0, 3, 1)]);
        assert!(matches!(
            model.load_document(&document),
            Err(PersistenceError::PortOccupied {
                node: 2,
                port_type: PortType::Out,
                index: 0
            })
        ));

        let document = port_rule_document(&[(0, 0, 4, 0)]);
        match model.load_document(&document) {
            Err(PersistenceError::IncompatibleDataTypes { out_type, in_type, .. }) => {
                assert_eq!(out_type, "number");
                assert_eq!(in_type, "text");
            }
            other => panic!("expected a data type mismatch, got {other:?}"),
        }

        assert_eq!(model.node_count(), 0);
        assert!(model.connections().is_empty());
        assert!(model.take_events().is_empty());
    }

    #[test]
    fn test_many_policy_fan_out_loads() {
        let mut model = DataFlowGraphModel::new(test_registry());
        let document = port_rule_document(&[(0, 0, 2, 0), (0, 0, 3, 0), (1, 0, 2, 1)]);

        let id_map = model.load_document(&document).unwrap();
        assert_eq!(model.connections().len(), 3);
        assert_eq!(
            model
                .connected_nodes(id_map[&0], PortType::Out, PortIndex(0))
                .len(),
            2
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("graph.{DOCUMENT_EXTENSION}"));

        let (model, _, _, _) = sample_model();
        model.save(&path).unwrap();

        let mut loaded = DataFlowGraphModel::new(test_registry());
        loaded.load(&path).unwrap();
        assert_eq!(loaded.save_document(), model.save_document());

        assert!(matches!(
            loaded.load(&dir.path().join("missing.flow")),
            Err(PersistenceError::Io(_))
        ));
        std::fs::write(&path, b"{ nodes: ").unwrap();
        assert!(matches!(loaded.load(&path), Err(PersistenceError::Json(_))));
    }
}
