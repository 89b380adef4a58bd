// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rules for attaching a draft connection to a node and for detaching a
//! committed connection back into a draft.

use crate::connection::ConnectionId;
use crate::geometry::scene_tolerance;
use crate::model::GraphModel;
use crate::node::NodeId;
use crate::port::{ConnectionPolicy, PortIndex, PortType};
use crate::scene::BasicScene;
use egui::emath::TSTransform;
use thiserror::Error;

/// Reason a draft connection cannot attach to a node
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionRejection {
    /// The scene holds no draft with the expected id
    #[error("No draft connection {0}")]
    NoDraft(ConnectionId),

    /// Both ends of the connection are already bound
    #[error("Connection {0} does not require a port")]
    NoRequiredPort(ConnectionId),

    /// The node is the one already bound to the other end
    #[error("Node {0} cannot connect to itself")]
    SelfLoop(NodeId),

    /// The node has no visual object in the scene
    #[error("Node {0} is not in the scene")]
    UnknownNode(NodeId),

    /// The dangling end is not over a port of the required side
    #[error("No {0:?} port under the connection end")]
    NoPortUnderPoint(PortType),

    /// The port cannot take another connection under its policy
    #[error("{port_type:?} port {port_index} of node {node_id} is occupied")]
    PortOccupied {
        /// Target node
        node_id: NodeId,
        /// Side of the port
        port_type: PortType,
        /// Port index
        port_index: PortIndex,
    },

    /// The two ports carry different data types
    #[error("Connection {0} joins incompatible data types")]
    IncompatibleDataTypes(ConnectionId),
}

/// Interaction between one node and one draft connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConnectionInteraction {
    node_id: NodeId,
    connection_id: ConnectionId,
}

impl NodeConnectionInteraction {
    /// Pair a node with a connection
    pub fn new(node_id: NodeId, connection_id: ConnectionId) -> Self {
        Self {
            node_id,
            connection_id,
        }
    }

    /// Check whether the scene's draft can attach to the node.
    ///
    /// The checks run in order: the draft needs a port, the node differs from
    /// the node at the bound end, a port of the required side lies under the
    /// draft's dangling end, that port is vacant under its policy, and both
    /// ports carry the same data type. On success returns the target port.
    pub fn can_connect<M: GraphModel>(
        &self,
        scene: &BasicScene<M>,
        view: &TSTransform,
    ) -> Result<PortIndex, ConnectionRejection> {
        let draft = scene
            .draft_connection()
            .filter(|draft| draft.connection_id() == self.connection_id)
            .ok_or(ConnectionRejection::NoDraft(self.connection_id))?;

        let required_port = draft.state.required_port();
        if required_port == PortType::None {
            return Err(ConnectionRejection::NoRequiredPort(self.connection_id));
        }

        if self.connection_id.node_id(required_port.opposite()) == self.node_id {
            return Err(ConnectionRejection::SelfLoop(self.node_id));
        }

        let node = scene
            .node_graphics_object(self.node_id)
            .ok_or(ConnectionRejection::UnknownNode(self.node_id))?;
        let tolerance = scene_tolerance(scene.config().geometry.port_hit_tolerance, view);
        let port_index =
            node.check_hit_scene_point(required_port, draft.end_point(required_port), tolerance);
        if !port_index.is_valid() {
            return Err(ConnectionRejection::NoPortUnderPoint(required_port));
        }

        if !self.node_port_is_empty(scene.model(), required_port, port_index) {
            return Err(ConnectionRejection::PortOccupied {
                node_id: self.node_id,
                port_type: required_port,
                port_index,
            });
        }

        let candidate = self.completed_id(required_port, port_index);
        if !scene.model().connection_possible(candidate) {
            return Err(ConnectionRejection::IncompatibleDataTypes(candidate));
        }

        Ok(port_index)
    }

    /// Attach the draft to the node and commit it.
    ///
    /// Returns false, leaving model and draft untouched, when
    /// [`can_connect`](Self::can_connect) rejects the attachment.
    pub fn try_connect<M: GraphModel>(&self, scene: &mut BasicScene<M>, view: &TSTransform) -> bool {
        let port_index = match self.can_connect(scene, view) {
            Ok(port_index) => port_index,
            Err(rejection) => {
                tracing::debug!("Connection rejected: {}", rejection);
                return false;
            }
        };

        let Some(required_port) = scene
            .draft_connection()
            .map(|draft| draft.state.required_port())
        else {
            return false;
        };

        let connection_id = self.completed_id(required_port, port_index);
        match scene.use_draft_connection(connection_id) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Failed to commit draft connection: {}", err);
                false
            }
        }
    }

    /// Detach the connection from the node and turn it into a draft.
    ///
    /// The connection leaves the model, and a draft anchored at the still
    /// bound end takes its place, requiring a port of `port_to_disconnect`.
    pub fn disconnect<M: GraphModel>(&self, scene: &mut BasicScene<M>, port_to_disconnect: PortType) -> bool {
        if !port_to_disconnect.is_valid()
            || self.connection_id.node_id(port_to_disconnect) != self.node_id
        {
            return false;
        }

        let Some(object) = scene.delete_connection(self.connection_id) else {
            return false;
        };

        let draft_id = self.connection_id.detached(port_to_disconnect);
        tracing::debug!("Detached {} into draft {}", self.connection_id, draft_id);
        scene.make_draft_connection_from(object, draft_id);
        true
    }

    /// Whether the port can take one more connection
    fn node_port_is_empty<M: GraphModel>(
        &self,
        model: &M,
        port_type: PortType,
        port_index: PortIndex,
    ) -> bool {
        if model
            .connected_nodes(self.node_id, port_type, port_index)
            .is_empty()
        {
            return true;
        }
        port_type == PortType::Out
            && model.port_connection_policy(self.node_id, port_type, port_index) == ConnectionPolicy::Many
    }

    fn completed_id(&self, required_port: PortType, port_index: PortIndex) -> ConnectionId {
        let mut connection_id = self.connection_id;
        connection_id.set_end(required_port, self.node_id, port_index);
        connection_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{SimpleGraphModel, DEFAULT_NODE_TYPE};
    use crate::node::{NodeRole, NodeValue};
    use egui::Pos2;

    fn two_node_scene() -> (BasicScene<SimpleGraphModel>, NodeId, NodeId) {
        let mut model = SimpleGraphModel::new();
        let a = model.add_node(DEFAULT_NODE_TYPE);
        let b = model.add_node(DEFAULT_NODE_TYPE);
        model.set_node_data(b, NodeRole::Position, NodeValue::Position(Pos2::new(300.0, 0.0)));
        (BasicScene::new(model), a, b)
    }

    #[test]
    fn test_can_connect_requires_port_under_end() {
        let (mut scene, a, b) = two_node_scene();
        let view = TSTransform::IDENTITY;
        let draft_id = ConnectionId::incomplete(PortType::Out, a, PortIndex(0));
        assert!(scene.make_draft_connection(draft_id));

        let interaction = NodeConnectionInteraction::new(b, draft_id);
        assert_eq!(
            interaction.can_connect(&scene, &view),
            Err(ConnectionRejection::NoPortUnderPoint(PortType::In))
        );

        let anchor = scene.port_scene_position(b, PortType::In, PortIndex(0)).unwrap();
        scene.move_draft_end(anchor);
        assert_eq!(interaction.can_connect(&scene, &view), Ok(PortIndex(0)));

        assert!(interaction.try_connect(&mut scene, &view));
        assert!(scene.draft_connection().is_none());
        let committed = ConnectionId::new(a, PortIndex(0), b, PortIndex(0));
        assert!(scene.model().connection_exists(committed));
        assert!(scene.connection_graphics_object(committed).is_some());
    }

    #[test]
    fn test_self_loop_rejected() {
        let (mut scene, a, _) = two_node_scene();
        let draft_id = ConnectionId::incomplete(PortType::Out, a, PortIndex(0));
        scene.make_draft_connection(draft_id);
        let anchor = scene.port_scene_position(a, PortType::In, PortIndex(0)).unwrap();
        scene.move_draft_end(anchor);

        let interaction = NodeConnectionInteraction::new(a, draft_id);
        assert_eq!(
            interaction.can_connect(&scene, &TSTransform::IDENTITY),
            Err(ConnectionRejection::SelfLoop(a))
        );
        assert!(!interaction.try_connect(&mut scene, &TSTransform::IDENTITY));
        assert!(scene.draft_connection().is_some());
        assert!(scene.model().connections().is_empty());
    }

    #[test]
    fn test_missing_draft() {
        let (scene, a, b) = two_node_scene();
        let draft_id = ConnectionId::incomplete(PortType::Out, a, PortIndex(0));
        assert_eq!(
            NodeConnectionInteraction::new(b, draft_id).can_connect(&scene, &TSTransform::IDENTITY),
            Err(ConnectionRejection::NoDraft(draft_id))
        );
    }

    #[test]
    fn test_disconnect_turns_connection_into_draft() {
        let (mut scene, a, b) = two_node_scene();
        let id = ConnectionId::new(a, PortIndex(0), b, PortIndex(0));
        scene.update_model(|model| model.add_connection(id));
        assert!(scene.connection_graphics_object(id).is_some());

        // Only the bound node may detach its own end
        assert!(!NodeConnectionInteraction::new(a, id).disconnect(&mut scene, PortType::In));

        assert!(NodeConnectionInteraction::new(b, id).disconnect(&mut scene, PortType::In));
        assert!(!scene.model().connection_exists(id));
        assert!(scene.connection_graphics_object(id).is_none());

        let draft = scene.draft_connection().unwrap();
        assert_eq!(draft.connection_id(), id.detached(PortType::In));
        assert_eq!(draft.state.required_port(), PortType::In);
        assert_eq!(
            Some(draft.end_point(PortType::Out)),
            scene.port_scene_position(a, PortType::Out, PortIndex(0))
        );
    }
}
