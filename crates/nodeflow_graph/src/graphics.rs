// SPDX-License-Identifier: MIT OR Apache-2.0
//! Presentation objects mirrored from a graph model.
//!
//! These objects hold ids into the model, never model data; everything they
//! cache (position, measured geometry) is refreshed by the owning scene when
//! the model reports a change.

use crate::config::GeometryConfig;
use crate::connection::ConnectionId;
use crate::connection_state::ConnectionState;
use crate::geometry::{self, NodeGeometry};
use crate::model::GraphModel;
use crate::node::NodeId;
use crate::port::{NodeDataType, PortIndex, PortType};
use egui::{Pos2, Rect};

/// Whether a node is showing feedback for a connection dragged over it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactToConnectionState {
    /// No draft hovers the node
    #[default]
    NotReacting,
    /// A draft hovers the node
    Reacting,
}

/// Interaction state of a node object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeState {
    /// Whether the pointer is over the node
    pub hovered: bool,
    reaction: ReactToConnectionState,
    reacting_port_type: Option<PortType>,
    reacting_data_type: Option<NodeDataType>,
    dragging_position: Pos2,
}

impl NodeState {
    /// Start showing feedback for a draft that needs a `port_type` port
    pub fn react_to_possible_connection(
        &mut self,
        port_type: PortType,
        data_type: Option<NodeDataType>,
        scene_point: Pos2,
    ) {
        self.reaction = ReactToConnectionState::Reacting;
        self.reacting_port_type = Some(port_type);
        self.reacting_data_type = data_type;
        self.dragging_position = scene_point;
    }

    /// Stop showing draft feedback
    pub fn reset_reaction_to_connection(&mut self) {
        self.reaction = ReactToConnectionState::NotReacting;
        self.reacting_port_type = None;
        self.reacting_data_type = None;
    }

    /// Current reaction
    pub fn reaction(&self) -> ReactToConnectionState {
        self.reaction
    }

    /// Whether a draft hovers the node
    pub fn is_reacting(&self) -> bool {
        self.reaction == ReactToConnectionState::Reacting
    }

    /// Side the hovering draft needs
    pub fn reacting_port_type(&self) -> Option<PortType> {
        self.reacting_port_type
    }

    /// Data type carried by the hovering draft
    pub fn reacting_data_type(&self) -> Option<&NodeDataType> {
        self.reacting_data_type.as_ref()
    }

    /// Last pointer position of the hovering draft
    pub fn dragging_position(&self) -> Pos2 {
        self.dragging_position
    }
}

/// Visual object of one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGraphicsObject {
    /// Node in the model
    pub node_id: NodeId,
    /// Cached model position
    pub position: Pos2,
    /// Cached measured geometry
    pub geometry: NodeGeometry,
    /// Interaction state
    pub state: NodeState,
    /// Stacking order; larger values are drawn and hit-tested first
    pub z_value: f32,
    /// Whether the node is selected
    pub selected: bool,
}

impl NodeGraphicsObject {
    /// Build the object for an existing model node
    pub fn new<M: GraphModel + ?Sized>(model: &M, node_id: NodeId, config: &GeometryConfig) -> Self {
        Self {
            node_id,
            position: model.node_position(node_id).unwrap_or_default(),
            geometry: NodeGeometry::measure(model, node_id, config),
            state: NodeState::default(),
            z_value: 0.0,
            selected: false,
        }
    }

    /// Re-read position and re-measure geometry
    pub fn refresh<M: GraphModel + ?Sized>(&mut self, model: &M, config: &GeometryConfig) {
        self.position = model.node_position(self.node_id).unwrap_or(self.position);
        self.geometry = NodeGeometry::measure(model, self.node_id, config);
    }

    /// Node body in scene coordinates
    pub fn scene_body_rect(&self) -> Rect {
        self.geometry.body_rect().translate(self.position.to_vec2())
    }

    /// Bounds including port anchors, in scene coordinates
    pub fn scene_bounding_rect(&self) -> Rect {
        self.geometry.bounding_rect().translate(self.position.to_vec2())
    }

    /// Port anchor in scene coordinates
    pub fn port_scene_position(&self, port_type: PortType, port_index: PortIndex) -> Pos2 {
        self.geometry
            .port_scene_position(port_type, port_index, self.position)
    }

    /// Port of the given side under a scene point
    pub fn check_hit_scene_point(
        &self,
        port_type: PortType,
        scene_point: Pos2,
        tolerance: f32,
    ) -> PortIndex {
        self.geometry
            .check_hit_scene_point(port_type, scene_point, self.position, tolerance)
    }

    /// Port on either side under a scene point, inputs first
    pub fn check_hit_port(&self, scene_point: Pos2, tolerance: f32) -> Option<(PortType, PortIndex)> {
        self.geometry
            .check_hit_port(scene_point, self.position, tolerance)
    }
}

/// Visual object of one connection, committed or draft
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionGraphicsObject {
    connection_id: ConnectionId,
    /// Interaction state
    pub state: ConnectionState,
    out_point: Pos2,
    in_point: Pos2,
    /// Whether the connection is selected
    pub selected: bool,
}

impl ConnectionGraphicsObject {
    /// Create an object with both end points placed
    pub fn new(connection_id: ConnectionId, out_point: Pos2, in_point: Pos2) -> Self {
        Self {
            connection_id,
            state: ConnectionState::new(connection_id),
            out_point,
            in_point,
            selected: false,
        }
    }

    /// Connection id; one end holds sentinels while pending
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Re-target the object, deriving the pending side from the new id
    pub fn set_connection_id(&mut self, connection_id: ConnectionId) {
        self.connection_id = connection_id;
        self.state.set_required_port(connection_id.required_port());
    }

    /// Bind the dangling end to a port and place it at `anchor`
    pub fn bind_end(&mut self, port_type: PortType, node_id: NodeId, port_index: PortIndex, anchor: Pos2) {
        self.connection_id.set_end(port_type, node_id, port_index);
        self.set_end_point(port_type, anchor);
        if self.connection_id.is_complete() {
            self.state.set_no_required_port();
        }
    }

    /// End point of one side, in scene coordinates
    pub fn end_point(&self, port_type: PortType) -> Pos2 {
        match port_type {
            PortType::Out => self.out_point,
            _ => self.in_point,
        }
    }

    /// Move one end point
    pub fn set_end_point(&mut self, port_type: PortType, point: Pos2) {
        match port_type {
            PortType::Out => self.out_point = point,
            PortType::In => self.in_point = point,
            PortType::None => {}
        }
    }

    /// Control points of the drawn curve
    pub fn points_c1_c2(&self) -> (Pos2, Pos2) {
        geometry::points_c1_c2(self.out_point, self.in_point)
    }

    /// Sampled curve
    pub fn curve(&self) -> Vec<Pos2> {
        geometry::connection_curve(self.out_point, self.in_point)
    }

    /// Bounds of the curve
    pub fn bounding_rect(&self, point_diameter: f32) -> Rect {
        geometry::connection_bounding_rect(self.out_point, self.in_point, point_diameter)
    }

    /// Whether a scene point lies on the curve
    pub fn hit_test(&self, scene_point: Pos2, tolerance: f32) -> bool {
        geometry::connection_hit_test(self.out_point, self.in_point, scene_point, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{SimpleGraphModel, DEFAULT_NODE_TYPE};
    use crate::node::{NodeRole, NodeValue};
    use egui::Vec2;

    #[test]
    fn test_node_object_follows_model() {
        let mut model = SimpleGraphModel::new();
        let node = model.add_node(DEFAULT_NODE_TYPE);
        let config = GeometryConfig::default();

        let mut object = NodeGraphicsObject::new(&model, node, &config);
        assert_eq!(object.position, Pos2::ZERO);

        model.set_node_data(node, NodeRole::Position, NodeValue::Position(Pos2::new(30.0, 40.0)));
        object.refresh(&model, &config);
        assert_eq!(object.scene_body_rect().min, Pos2::new(30.0, 40.0));
        let anchor = object.port_scene_position(PortType::In, PortIndex(0));
        assert_eq!(
            anchor,
            Pos2::new(30.0, 40.0 + config.caption_height + config.port_spacing * 0.5)
        );
        assert_eq!(
            object.check_hit_port(anchor + Vec2::new(2.0, 0.0), 5.0),
            Some((PortType::In, PortIndex(0)))
        );
        assert_eq!(object.check_hit_port(Pos2::new(80.0, 90.0), 5.0), None);
    }

    #[test]
    fn test_node_reaction() {
        let mut state = NodeState::default();
        state.react_to_possible_connection(PortType::In, None, Pos2::new(1.0, 2.0));
        assert!(state.is_reacting());
        assert_eq!(state.reacting_port_type(), Some(PortType::In));

        state.reset_reaction_to_connection();
        assert_eq!(state.reaction(), ReactToConnectionState::NotReacting);
        assert_eq!(state.reacting_port_type(), None);
    }

    #[test]
    fn test_draft_binding() {
        let draft = ConnectionId::incomplete(PortType::Out, NodeId(0), PortIndex(0));
        let mut object = ConnectionGraphicsObject::new(draft, Pos2::ZERO, Pos2::ZERO);
        assert!(object.state.requires_port());

        object.set_end_point(PortType::In, Pos2::new(10.0, 5.0));
        assert_eq!(object.end_point(PortType::In), Pos2::new(10.0, 5.0));

        object.bind_end(PortType::In, NodeId(1), PortIndex(0), Pos2::new(80.0, 0.0));
        assert!(object.connection_id().is_complete());
        assert!(!object.state.requires_port());
        assert_eq!(object.end_point(PortType::In), Pos2::new(80.0, 0.0));
        assert!(object.hit_test(Pos2::new(40.0, 0.0), 1.0));
    }
}
