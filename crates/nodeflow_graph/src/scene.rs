// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene keeping visual objects in sync with a graph model.
//!
//! The scene owns its model. Every edit goes through the scene, which drains
//! the model's event queue afterwards and mirrors each structural change onto
//! its node and connection objects. Pointer gestures (press, move, release)
//! are expressed in scene coordinates together with the current view
//! transform, so hit tolerances stay constant in screen pixels.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::config::SceneConfig;
use crate::connection::ConnectionId;
use crate::connection_state::LooseEnd;
use crate::geometry::{locate_node_at, scene_tolerance};
use crate::graphics::{ConnectionGraphicsObject, NodeGraphicsObject};
use crate::interaction::NodeConnectionInteraction;
use crate::model::{GraphEvent, GraphModel};
use crate::node::{NodeId, NodeRole, NodeValue};
use crate::port::{ConnectionPolicy, PortIndex, PortType};
use egui::emath::TSTransform;
use egui::{Modifiers, Pos2, Vec2};
use thiserror::Error;

/// Scene operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// No draft connection exists
    #[error("No draft connection in the scene")]
    NoDraftConnection,

    /// The id still has a dangling end
    #[error("Connection {0} still has a dangling end")]
    IncompleteConnection(ConnectionId),

    /// The model did not store the connection
    #[error("Model refused connection {0}")]
    ConnectionRefused(ConnectionId),

    /// The id does not extend the draft's bound end
    #[error("Connection {connection} does not complete draft {draft}")]
    DraftMismatch {
        /// Current draft
        draft: ConnectionId,
        /// Id offered to complete it
        connection: ConnectionId,
    },
}

/// Notifications raised by the scene for the host application
#[derive(Debug, Clone, PartialEq)]
pub enum SceneSignal {
    /// A node was double clicked
    NodeDoubleClicked(NodeId),
    /// A context menu was requested on a node, at a scene position
    NodeContextMenu(NodeId, Pos2),
    /// The pointer entered a node, at a screen position
    NodeHovered(NodeId, Pos2),
    /// The pointer left a node
    NodeHoverLeft(NodeId),
    /// The pointer entered a connection, at a screen position
    ConnectionHovered(ConnectionId, Pos2),
    /// The pointer left a connection
    ConnectionHoverLeft(ConnectionId),
    /// A node is about to be deleted through the scene
    BeforeNodeDeleted(NodeId),
    /// A node's visual object was removed
    NodeDeleted(NodeId),
    /// A node drag finished at a new position
    NodeMoved(NodeId, Pos2),
}

#[derive(Debug, Clone, Copy, Default)]
struct NodeDrag {
    moved: bool,
}

/// Visual mirror of a [`GraphModel`]
pub struct BasicScene<M: GraphModel> {
    model: M,
    config: SceneConfig,
    node_objects: HashMap<NodeId, NodeGraphicsObject>,
    connection_objects: HashMap<ConnectionId, ConnectionGraphicsObject>,
    draft: Option<ConnectionGraphicsObject>,
    signals: Vec<SceneSignal>,
    drag: Option<NodeDrag>,
    hovered_node: Option<NodeId>,
    hovered_connection: Option<ConnectionId>,
    last_pointer: Pos2,
}

impl<M: GraphModel> BasicScene<M> {
    /// Build a scene over a model using the default configuration
    pub fn new(model: M) -> Self {
        Self::with_config(model, SceneConfig::default())
    }

    /// Build a scene over a model
    pub fn with_config(mut model: M, config: SceneConfig) -> Self {
        // The model's current state is read during population
        let stale = model.take_events();
        tracing::trace!("Discarding {} events raised before the scene existed", stale.len());

        let mut scene = Self {
            model,
            config,
            node_objects: HashMap::new(),
            connection_objects: HashMap::new(),
            draft: None,
            signals: Vec::new(),
            drag: None,
            hovered_node: None,
            hovered_connection: None,
            last_pointer: Pos2::ZERO,
        };
        scene.traverse_graph_and_populate_graphics_objects();
        scene
    }

    /// Rebuild every visual object from the model.
    ///
    /// Nodes are visited breadth first along output connections, starting
    /// from the lowest unvisited id, so every node and every connection gets
    /// exactly one object.
    pub fn traverse_graph_and_populate_graphics_objects(&mut self) {
        self.node_objects.clear();
        self.connection_objects.clear();
        self.draft = None;
        self.hovered_node = None;
        self.hovered_connection = None;

        let mut remaining: BTreeSet<NodeId> = self.model.all_node_ids().into_iter().collect();
        let mut connections = Vec::new();

        while let Some(root) = remaining.pop_first() {
            let mut fifo = VecDeque::from([root]);
            while let Some(node_id) = fifo.pop_front() {
                self.create_node(node_id);

                for port_index in PortIndex::range(self.model.port_count(node_id, PortType::Out)) {
                    let mut targets: Vec<_> = self
                        .model
                        .connected_nodes(node_id, PortType::Out, port_index)
                        .into_iter()
                        .collect();
                    targets.sort();

                    for (in_node_id, in_port_index) in targets {
                        if remaining.remove(&in_node_id) {
                            fifo.push_back(in_node_id);
                        }
                        connections.push(ConnectionId::new(node_id, port_index, in_node_id, in_port_index));
                    }
                }
            }
        }

        for connection_id in connections {
            self.create_connection(connection_id);
        }
        self.process_events();

        tracing::debug!(
            "Populated scene with {} nodes and {} connections",
            self.node_objects.len(),
            self.connection_objects.len()
        );
    }

    /// The mirrored model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Edit the model, then mirror the changes it reports
    pub fn update_model<R>(&mut self, f: impl FnOnce(&mut M) -> R) -> R {
        let result = f(&mut self.model);
        self.process_events();
        result
    }

    /// Give the model back, dropping all visual objects
    pub fn into_model(self) -> M {
        self.model
    }

    /// Scene configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Replace the configuration and re-measure every node
    pub fn set_config(&mut self, config: SceneConfig) {
        self.config = config;
        let mut node_ids: Vec<NodeId> = self.node_objects.keys().copied().collect();
        node_ids.sort();
        for node_id in node_ids {
            self.refresh_node(node_id);
        }
    }

    /// Drain the model's event queue and mirror every change.
    ///
    /// Handling one event may cause more, so the queue is drained until empty.
    pub fn process_events(&mut self) {
        loop {
            let events = self.model.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.handle_event(event);
            }
        }
    }

    fn handle_event(&mut self, event: GraphEvent) {
        tracing::trace!("Scene handling {:?}", event);
        match event {
            GraphEvent::NodeCreated(node_id) => {
                if !self.node_objects.contains_key(&node_id) {
                    self.create_node(node_id);
                }
            }
            GraphEvent::NodeDeleted(node_id) => self.remove_node_object(node_id),
            GraphEvent::NodePositionUpdated(node_id) => self.sync_node_position(node_id),
            GraphEvent::ConnectionCreated(connection_id) => {
                if self.connection_objects.contains_key(&connection_id) {
                    self.place_connection(connection_id);
                } else {
                    self.create_connection(connection_id);
                }
            }
            GraphEvent::ConnectionDeleted(connection_id) => {
                self.remove_connection_object(connection_id);
            }
            GraphEvent::PortsAboutToBeDeleted {
                node_id,
                port_type,
                ports,
                connections,
            } => {
                for connection_id in connections {
                    self.remove_connection_object(connection_id);
                }
                self.discard_draft_on_ports(node_id, port_type, &ports);
            }
            GraphEvent::PortsDeleted { node_id, .. } | GraphEvent::PortsInserted { node_id, .. } => {
                self.refresh_node(node_id);
            }
            GraphEvent::PortsAboutToBeInserted { .. } => {}
        }
    }

    /// Create the object for a model node and record its measured size
    pub fn create_node(&mut self, node_id: NodeId) {
        if !self.model.node_exists(node_id) {
            tracing::warn!("Cannot create object for unknown node {}", node_id);
            return;
        }
        let object = NodeGraphicsObject::new(&self.model, node_id, &self.config.geometry);
        self.model
            .set_node_data(node_id, NodeRole::Size, NodeValue::Size(object.geometry.size));
        self.node_objects.insert(node_id, object);
    }

    /// Re-read a node from the model and move its connections
    pub fn refresh_node(&mut self, node_id: NodeId) {
        let Some(object) = self.node_objects.get_mut(&node_id) else {
            return;
        };
        object.refresh(&self.model, &self.config.geometry);
        let size = object.geometry.size;
        self.model
            .set_node_data(node_id, NodeRole::Size, NodeValue::Size(size));
        self.move_connections(node_id);
    }

    fn sync_node_position(&mut self, node_id: NodeId) {
        let Some(position) = self.model.node_position(node_id) else {
            return;
        };
        match self.node_objects.get_mut(&node_id) {
            Some(object) if object.position != position => object.position = position,
            _ => return,
        }
        self.move_connections(node_id);
    }

    fn create_connection(&mut self, connection_id: ConnectionId) {
        let (out_point, in_point) = self.end_points(connection_id);
        self.connection_objects.insert(
            connection_id,
            ConnectionGraphicsObject::new(connection_id, out_point, in_point),
        );
    }

    fn place_connection(&mut self, connection_id: ConnectionId) {
        let (out_point, in_point) = self.end_points(connection_id);
        if let Some(object) = self.connection_objects.get_mut(&connection_id) {
            object.set_end_point(PortType::Out, out_point);
            object.set_end_point(PortType::In, in_point);
        }
    }

    fn end_points(&self, connection_id: ConnectionId) -> (Pos2, Pos2) {
        let point = |port_type: PortType| {
            self.port_scene_position(
                connection_id.node_id(port_type),
                port_type,
                connection_id.port_index(port_type),
            )
            .unwrap_or(Pos2::ZERO)
        };
        (point(PortType::Out), point(PortType::In))
    }

    fn move_connections(&mut self, node_id: NodeId) {
        let connection_ids: Vec<ConnectionId> = self
            .connection_objects
            .keys()
            .filter(|connection_id| connection_id.involves_node(node_id))
            .copied()
            .collect();
        for connection_id in connection_ids {
            self.place_connection(connection_id);
        }

        let Some(draft_id) = self.draft.as_ref().map(ConnectionGraphicsObject::connection_id) else {
            return;
        };
        let bound = draft_id.required_port().opposite();
        if !bound.is_valid() || draft_id.node_id(bound) != node_id {
            return;
        }
        let anchor = self.port_scene_position(node_id, bound, draft_id.port_index(bound));
        if let (Some(anchor), Some(draft)) = (anchor, self.draft.as_mut()) {
            draft.set_end_point(bound, anchor);
        }
    }

    fn remove_node_object(&mut self, node_id: NodeId) {
        self.connection_objects
            .retain(|connection_id, _| !connection_id.involves_node(node_id));
        if self
            .draft
            .as_ref()
            .is_some_and(|draft| draft.connection_id().involves_node(node_id))
        {
            self.draft = None;
        }
        if self.hovered_node == Some(node_id) {
            self.hovered_node = None;
        }
        if self
            .hovered_connection
            .is_some_and(|connection_id| connection_id.involves_node(node_id))
        {
            self.hovered_connection = None;
        }
        if self.node_objects.remove(&node_id).is_some() {
            self.signals.push(SceneSignal::NodeDeleted(node_id));
        }
    }

    fn remove_connection_object(&mut self, connection_id: ConnectionId) -> Option<ConnectionGraphicsObject> {
        if self.hovered_connection == Some(connection_id) {
            self.hovered_connection = None;
        }
        self.connection_objects.remove(&connection_id)
    }

    fn discard_draft_on_ports(&mut self, node_id: NodeId, port_type: PortType, ports: &[PortIndex]) {
        let Some(draft_id) = self.draft.as_ref().map(ConnectionGraphicsObject::connection_id) else {
            return;
        };
        if draft_id.node_id(port_type) == node_id && ports.contains(&draft_id.port_index(port_type)) {
            tracing::debug!("Discarding draft {} anchored on a removed port", draft_id);
            self.draft = None;
        }
    }

    /// Delete a node and its connections from the model and the scene
    pub fn delete_node(&mut self, node_id: NodeId) -> bool {
        if !self.model.node_exists(node_id) && !self.node_objects.contains_key(&node_id) {
            return false;
        }
        self.signals.push(SceneSignal::BeforeNodeDeleted(node_id));
        let deleted = self.model.delete_node(node_id);
        self.process_events();
        self.remove_node_object(node_id);
        deleted
    }

    /// Delete a connection, returning its visual object.
    ///
    /// A committed connection leaves the model. An id matching the draft
    /// discards the draft instead.
    pub fn delete_connection(&mut self, connection_id: ConnectionId) -> Option<ConnectionGraphicsObject> {
        let mut removed = None;
        if self.connection_objects.contains_key(&connection_id)
            || self.model.connection_exists(connection_id)
        {
            self.model.delete_connection(connection_id);
            removed = self.remove_connection_object(connection_id);
            self.process_events();
        }

        if removed.is_none()
            && self
                .draft
                .as_ref()
                .is_some_and(|draft| draft.connection_id() == connection_id)
        {
            removed = self.draft.take();
        }
        removed
    }

    /// Start a draft connection anchored at its bound end.
    ///
    /// Replaces any existing draft. Fails when the id has no dangling end or
    /// the bound node has no object.
    pub fn make_draft_connection(&mut self, connection_id: ConnectionId) -> bool {
        let required_port = connection_id.required_port();
        if !required_port.is_valid() {
            tracing::warn!("Draft {} has no dangling end", connection_id);
            return false;
        }
        let bound = required_port.opposite();
        let Some(anchor) = self.port_scene_position(
            connection_id.node_id(bound),
            bound,
            connection_id.port_index(bound),
        ) else {
            tracing::warn!("Draft {} starts from an unknown node", connection_id);
            return false;
        };

        if let Some(previous) = self.draft.replace(ConnectionGraphicsObject::new(connection_id, anchor, anchor)) {
            tracing::debug!("Replaced draft {}", previous.connection_id());
        }
        true
    }

    /// Turn an existing object into the draft under a new id
    pub fn make_draft_connection_from(&mut self, mut object: ConnectionGraphicsObject, connection_id: ConnectionId) {
        object.set_connection_id(connection_id);
        object.selected = false;
        object.state.set_hovered(false);
        self.draft = Some(object);
    }

    /// Commit the draft under a complete id and add it to the model
    pub fn use_draft_connection(&mut self, connection_id: ConnectionId) -> Result<(), SceneError> {
        if !connection_id.is_complete() {
            return Err(SceneError::IncompleteConnection(connection_id));
        }
        let Some(mut draft) = self.draft.take() else {
            return Err(SceneError::NoDraftConnection);
        };

        let draft_id = draft.connection_id();
        let LooseEnd::Pending { required_port } = draft.state.loose_end() else {
            self.draft = Some(draft);
            return Err(SceneError::DraftMismatch {
                draft: draft_id,
                connection: connection_id,
            });
        };
        let node_id = connection_id.node_id(required_port);
        let port_index = connection_id.port_index(required_port);
        let free_end = draft.end_point(required_port);
        let anchor = self
            .port_scene_position(node_id, required_port, port_index)
            .unwrap_or(free_end);
        draft.bind_end(required_port, node_id, port_index, anchor);
        if draft.connection_id() != connection_id {
            draft.set_connection_id(draft_id);
            draft.set_end_point(required_port, free_end);
            self.draft = Some(draft);
            return Err(SceneError::DraftMismatch {
                draft: draft_id,
                connection: connection_id,
            });
        }
        draft.state.reset_last_hovered_node();
        self.connection_objects.insert(connection_id, draft);
        self.place_connection(connection_id);

        self.model.add_connection(connection_id);
        self.process_events();

        if !self.model.connection_exists(connection_id) {
            self.remove_connection_object(connection_id);
            return Err(SceneError::ConnectionRefused(connection_id));
        }
        tracing::debug!("Committed connection {}", connection_id);
        Ok(())
    }

    /// Move the draft's dangling end
    pub fn move_draft_end(&mut self, scene_pos: Pos2) {
        if let Some(draft) = self.draft.as_mut() {
            let required_port = draft.state.required_port();
            draft.set_end_point(required_port, scene_pos);
        }
    }

    /// Drop the draft without touching the model
    pub fn cancel_draft(&mut self) -> bool {
        let cancelled = self.draft.take().is_some();
        for object in self.node_objects.values_mut() {
            object.state.reset_reaction_to_connection();
        }
        cancelled
    }

    /// Object of a node
    pub fn node_graphics_object(&self, node_id: NodeId) -> Option<&NodeGraphicsObject> {
        self.node_objects.get(&node_id)
    }

    /// All node objects, in no particular order
    pub fn node_graphics_objects(&self) -> impl Iterator<Item = &NodeGraphicsObject> + '_ {
        self.node_objects.values()
    }

    /// Node objects from bottom to top
    pub fn nodes_in_paint_order(&self) -> Vec<&NodeGraphicsObject> {
        let mut objects: Vec<_> = self.node_objects.values().collect();
        objects.sort_by(|a, b| a.z_value.total_cmp(&b.z_value).then(a.node_id.cmp(&b.node_id)));
        objects
    }

    /// Object of a committed connection
    pub fn connection_graphics_object(&self, connection_id: ConnectionId) -> Option<&ConnectionGraphicsObject> {
        self.connection_objects.get(&connection_id)
    }

    /// All committed connection objects, in no particular order
    pub fn connection_graphics_objects(&self) -> impl Iterator<Item = &ConnectionGraphicsObject> + '_ {
        self.connection_objects.values()
    }

    /// The draft connection, if one is being dragged
    pub fn draft_connection(&self) -> Option<&ConnectionGraphicsObject> {
        self.draft.as_ref()
    }

    /// Port anchor in scene coordinates
    pub fn port_scene_position(&self, node_id: NodeId, port_type: PortType, port_index: PortIndex) -> Option<Pos2> {
        self.node_objects
            .get(&node_id)
            .map(|object| object.port_scene_position(port_type, port_index))
    }

    /// Lowest id among the connections under a scene point
    pub fn connection_at(&self, scene_pos: Pos2, view: &TSTransform) -> Option<ConnectionId> {
        let tolerance = scene_tolerance(self.config.geometry.connection_hit_tolerance, view);
        self.connection_objects
            .iter()
            .filter(|(_, object)| object.hit_test(scene_pos, tolerance))
            .map(|(connection_id, _)| *connection_id)
            .min()
    }

    /// Node under the pointer
    pub fn hovered_node(&self) -> Option<NodeId> {
        self.hovered_node
    }

    /// Connection under the pointer
    pub fn hovered_connection(&self) -> Option<ConnectionId> {
        self.hovered_connection
    }

    /// Take the signals raised since the last call
    pub fn take_signals(&mut self) -> Vec<SceneSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Select a node; without `extend` the rest of the selection is cleared,
    /// with it the node's selection is toggled
    pub fn select_node(&mut self, node_id: NodeId, extend: bool) {
        let selected = self
            .node_objects
            .get(&node_id)
            .is_some_and(|object| object.selected);
        if !selected && !extend {
            self.clear_selection();
        }
        if let Some(object) = self.node_objects.get_mut(&node_id) {
            object.selected = !(extend && selected);
        }
    }

    /// Select a connection, same rules as [`select_node`](Self::select_node)
    pub fn select_connection(&mut self, connection_id: ConnectionId, extend: bool) {
        let selected = self
            .connection_objects
            .get(&connection_id)
            .is_some_and(|object| object.selected);
        if !selected && !extend {
            self.clear_selection();
        }
        if let Some(object) = self.connection_objects.get_mut(&connection_id) {
            object.selected = !(extend && selected);
        }
    }

    /// Deselect everything
    pub fn clear_selection(&mut self) {
        for object in self.node_objects.values_mut() {
            object.selected = false;
        }
        for object in self.connection_objects.values_mut() {
            object.selected = false;
        }
    }

    /// Selected nodes, sorted
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        let mut node_ids: Vec<NodeId> = self
            .node_objects
            .values()
            .filter(|object| object.selected)
            .map(|object| object.node_id)
            .collect();
        node_ids.sort();
        node_ids
    }

    /// Selected connections, sorted
    pub fn selected_connections(&self) -> Vec<ConnectionId> {
        let mut connection_ids: Vec<ConnectionId> = self
            .connection_objects
            .iter()
            .filter(|(_, object)| object.selected)
            .map(|(connection_id, _)| *connection_id)
            .collect();
        connection_ids.sort();
        connection_ids
    }

    /// Delete selected connections, then selected nodes.
    ///
    /// Returns how many items were removed.
    pub fn delete_selected(&mut self) -> usize {
        let mut removed = 0;
        for connection_id in self.selected_connections() {
            if self.delete_connection(connection_id).is_some() {
                removed += 1;
            }
        }
        for node_id in self.selected_nodes() {
            if self.delete_node(node_id) {
                removed += 1;
            }
        }
        removed
    }

    /// Delete every node, and with them every connection
    pub fn clear_scene(&mut self) {
        self.cancel_draft();
        let mut node_ids: Vec<NodeId> = self.model.all_node_ids().into_iter().collect();
        node_ids.sort();
        for node_id in node_ids {
            self.delete_node(node_id);
        }
    }

    fn raise_node(&mut self, node_id: NodeId) {
        let Some(bounds) = self
            .node_objects
            .get(&node_id)
            .map(NodeGraphicsObject::scene_bounding_rect)
        else {
            return;
        };
        for object in self.node_objects.values_mut() {
            if object.node_id == node_id {
                object.z_value = 1.0;
            } else if object.z_value > 0.0 && object.scene_bounding_rect().intersects(bounds) {
                object.z_value = 0.0;
            }
        }
    }

    /// Pointer pressed.
    ///
    /// On a port this starts a draft: an occupied input is detached from its
    /// first connection, a single-link output first drops its connections.
    /// Elsewhere on a node it selects the node and starts dragging it; off
    /// nodes it selects a connection or clears the selection.
    pub fn mouse_press(&mut self, scene_pos: Pos2, view: &TSTransform, modifiers: Modifiers) {
        self.last_pointer = scene_pos;
        let extend = modifiers.ctrl || modifiers.command;

        let Some(node_id) = locate_node_at(scene_pos, self, view) else {
            match self.connection_at(scene_pos, view) {
                Some(connection_id) => self.select_connection(connection_id, extend),
                None if !extend => self.clear_selection(),
                None => {}
            }
            return;
        };

        self.select_node(node_id, extend);
        self.raise_node(node_id);

        let tolerance = scene_tolerance(self.config.geometry.port_hit_tolerance, view);
        let hit = self
            .node_objects
            .get(&node_id)
            .and_then(|object| object.check_hit_port(scene_pos, tolerance));

        match hit {
            Some((port_type, port_index)) => self.press_port(node_id, port_type, port_index),
            None => self.drag = Some(NodeDrag::default()),
        }
    }

    fn press_port(&mut self, node_id: NodeId, port_type: PortType, port_index: PortIndex) {
        let mut connected: Vec<_> = self
            .model
            .connected_nodes(node_id, port_type, port_index)
            .into_iter()
            .collect();
        connected.sort();

        if port_type == PortType::In {
            if let Some(&(out_node_id, out_port_index)) = connected.first() {
                let connection_id = ConnectionId::new(out_node_id, out_port_index, node_id, port_index);
                NodeConnectionInteraction::new(node_id, connection_id).disconnect(self, PortType::In);
                return;
            }
        } else if !connected.is_empty()
            && self.model.port_connection_policy(node_id, port_type, port_index) == ConnectionPolicy::One
        {
            for (in_node_id, in_port_index) in connected {
                self.delete_connection(ConnectionId::new(node_id, port_index, in_node_id, in_port_index));
            }
        }

        self.make_draft_connection(ConnectionId::incomplete(port_type, node_id, port_index));
    }

    /// Pointer moved, with or without a button held
    pub fn mouse_move(&mut self, scene_pos: Pos2, view: &TSTransform) {
        let delta = scene_pos - self.last_pointer;
        self.last_pointer = scene_pos;

        if self.draft.is_some() {
            self.drag_draft(scene_pos, view);
            return;
        }

        if let Some(drag) = self.drag.as_mut() {
            if delta != Vec2::ZERO {
                drag.moved = true;
                self.move_selected_nodes(delta);
            }
            return;
        }

        self.update_hover(scene_pos, view);
    }

    fn drag_draft(&mut self, scene_pos: Pos2, view: &TSTransform) {
        let located = locate_node_at(scene_pos, self, view);
        let Some(draft) = self.draft.as_mut() else {
            return;
        };

        let draft_id = draft.connection_id();
        let required_port = draft.state.required_port();
        draft.set_end_point(required_port, scene_pos);
        let previous = match located {
            Some(node_id) => draft.state.interact_with_node(node_id),
            None => draft.state.reset_last_hovered_node(),
        };

        if let Some(object) = previous.and_then(|node_id| self.node_objects.get_mut(&node_id)) {
            object.state.reset_reaction_to_connection();
        }

        if let Some(node_id) = located {
            let bound = required_port.opposite();
            let data_type = self
                .model
                .port_data_type(draft_id.node_id(bound), bound, draft_id.port_index(bound));
            if let Some(object) = self.node_objects.get_mut(&node_id) {
                object
                    .state
                    .react_to_possible_connection(required_port, data_type, scene_pos);
            }
        }
    }

    fn move_selected_nodes(&mut self, delta: Vec2) {
        for node_id in self.selected_nodes() {
            let Some(position) = self.model.node_position(node_id) else {
                continue;
            };
            self.model
                .set_node_data(node_id, NodeRole::Position, NodeValue::Position(position + delta));
            self.sync_node_position(node_id);
        }
        self.process_events();
    }

    fn update_hover(&mut self, scene_pos: Pos2, view: &TSTransform) {
        let screen_pos = *view * scene_pos;

        let node = locate_node_at(scene_pos, self, view);
        if node != self.hovered_node {
            if let Some(previous) = self.hovered_node.take() {
                if let Some(object) = self.node_objects.get_mut(&previous) {
                    object.state.hovered = false;
                }
                self.signals.push(SceneSignal::NodeHoverLeft(previous));
            }
            if let Some(node_id) = node {
                self.raise_node(node_id);
                if let Some(object) = self.node_objects.get_mut(&node_id) {
                    object.state.hovered = true;
                }
                self.hovered_node = Some(node_id);
                self.signals.push(SceneSignal::NodeHovered(node_id, screen_pos));
            }
        }

        let connection = match node {
            Some(_) => None,
            None => self.connection_at(scene_pos, view),
        };
        if connection != self.hovered_connection {
            if let Some(previous) = self.hovered_connection.take() {
                if let Some(object) = self.connection_objects.get_mut(&previous) {
                    object.state.set_hovered(false);
                }
                self.signals.push(SceneSignal::ConnectionHoverLeft(previous));
            }
            if let Some(connection_id) = connection {
                if let Some(object) = self.connection_objects.get_mut(&connection_id) {
                    object.state.set_hovered(true);
                }
                self.hovered_connection = Some(connection_id);
                self.signals
                    .push(SceneSignal::ConnectionHovered(connection_id, screen_pos));
            }
        }
    }

    /// Pointer released.
    ///
    /// A draft attaches to the node under the pointer when allowed and is
    /// discarded otherwise. A node drag reports the final positions.
    pub fn mouse_release(&mut self, scene_pos: Pos2, view: &TSTransform) {
        self.last_pointer = scene_pos;

        if self.draft.is_some() {
            self.release_draft(scene_pos, view);
            return;
        }

        if let Some(drag) = self.drag.take() {
            if drag.moved {
                for node_id in self.selected_nodes() {
                    if let Some(position) = self.model.node_position(node_id) {
                        self.signals.push(SceneSignal::NodeMoved(node_id, position));
                    }
                }
            }
        }
    }

    fn release_draft(&mut self, scene_pos: Pos2, view: &TSTransform) {
        self.move_draft_end(scene_pos);
        let Some(draft_id) = self.draft.as_ref().map(ConnectionGraphicsObject::connection_id) else {
            return;
        };

        if let Some(node_id) = locate_node_at(scene_pos, self, view) {
            NodeConnectionInteraction::new(node_id, draft_id).try_connect(self, view);
        }

        if self
            .draft
            .as_ref()
            .is_some_and(|draft| draft.state.requires_port())
        {
            tracing::debug!("Discarding draft connection {}", draft_id);
            self.delete_connection(draft_id);
        }

        for object in self.node_objects.values_mut() {
            object.state.reset_reaction_to_connection();
        }
    }

    /// Double click; returns the node hit
    pub fn mouse_double_click(&mut self, scene_pos: Pos2, view: &TSTransform) -> Option<NodeId> {
        let node_id = locate_node_at(scene_pos, self, view)?;
        self.signals.push(SceneSignal::NodeDoubleClicked(node_id));
        Some(node_id)
    }

    /// Context menu request; returns the node hit
    pub fn context_menu(&mut self, scene_pos: Pos2, view: &TSTransform) -> Option<NodeId> {
        let node_id = locate_node_at(scene_pos, self, view)?;
        self.signals
            .push(SceneSignal::NodeContextMenu(node_id, scene_pos));
        Some(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::tests::test_registry;
    use crate::dataflow::DataFlowGraphModel;
    use crate::graph::{SimpleGraphModel, DEFAULT_NODE_TYPE};

    const VIEW: TSTransform = TSTransform::IDENTITY;

    /// Nodes laid out in a row, 300 units apart
    fn row_scene(count: usize, policy: ConnectionPolicy) -> (BasicScene<SimpleGraphModel>, Vec<NodeId>) {
        let mut model = SimpleGraphModel::new();
        model.set_output_policy(policy);
        let nodes: Vec<NodeId> = (0..count)
            .map(|i| {
                let node = model.add_node(DEFAULT_NODE_TYPE);
                let position = Pos2::new(300.0 * i as f32, 0.0);
                model.set_node_data(node, NodeRole::Position, NodeValue::Position(position));
                node
            })
            .collect();
        (BasicScene::new(model), nodes)
    }

    fn anchor<M: GraphModel>(scene: &BasicScene<M>, node: NodeId, port_type: PortType) -> Pos2 {
        scene
            .port_scene_position(node, port_type, PortIndex(0))
            .unwrap()
    }

    fn drag<M: GraphModel>(scene: &mut BasicScene<M>, from: Pos2, to: Pos2) {
        scene.mouse_press(from, &VIEW, Modifiers::NONE);
        scene.mouse_move(to, &VIEW);
        scene.mouse_release(to, &VIEW);
    }

    fn link(out_node: NodeId, in_node: NodeId) -> ConnectionId {
        ConnectionId::new(out_node, PortIndex(0), in_node, PortIndex(0))
    }

    #[test]
    fn test_population_mirrors_model() {
        let mut model = SimpleGraphModel::new();
        let a = model.add_node(DEFAULT_NODE_TYPE);
        let b = model.add_node(DEFAULT_NODE_TYPE);
        let c = model.add_node(DEFAULT_NODE_TYPE);
        model.add_connection(link(b, a));

        let scene = BasicScene::new(model);
        assert_eq!(scene.node_graphics_objects().count(), 3);
        assert_eq!(scene.connection_graphics_objects().count(), 1);
        assert!(scene.connection_graphics_object(link(b, a)).is_some());
        assert!(scene.node_graphics_object(c).is_some());

        let object = scene.node_graphics_object(a).unwrap();
        assert_eq!(scene.model().node_size(a), Some(object.geometry.size));
    }

    #[test]
    fn test_drag_output_to_input_creates_one_connection() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);

        let from = anchor(&scene, a, PortType::Out);
        let to = anchor(&scene, b, PortType::In);
        scene.mouse_press(from, &VIEW, Modifiers::NONE);
        assert!(scene.draft_connection().is_some());

        scene.mouse_move(to, &VIEW);
        assert!(scene.node_graphics_object(b).unwrap().state.is_reacting());

        scene.mouse_release(to, &VIEW);
        assert!(scene.draft_connection().is_none());
        assert_eq!(scene.model().connections().len(), 1);
        assert_eq!(scene.connection_graphics_objects().count(), 1);
        assert!(!scene.node_graphics_object(b).unwrap().state.is_reacting());

        let object = scene.connection_graphics_object(link(a, b)).unwrap();
        assert!(!object.state.requires_port());
        assert_eq!(object.end_point(PortType::Out), from);
        assert_eq!(object.end_point(PortType::In), to);
    }

    #[test]
    fn test_drag_input_to_output_creates_connection() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);

        let (from, to) = (anchor(&scene, b, PortType::In), anchor(&scene, a, PortType::Out));
        drag(&mut scene, from, to);
        assert!(scene.model().connection_exists(link(a, b)));
    }

    #[test]
    fn test_delete_node_keeps_unrelated_connections() {
        let (mut scene, nodes) = row_scene(3, ConnectionPolicy::Many);
        let (a, b, c) = (nodes[0], nodes[1], nodes[2]);
        scene.update_model(|model| {
            model.add_connection(link(a, b));
            model.add_connection(link(c, a));
            model.add_connection(link(b, c));
        });
        assert_eq!(scene.connection_graphics_objects().count(), 3);
        scene.take_signals();

        assert!(scene.delete_node(a));
        assert!(scene.node_graphics_object(a).is_none());
        assert_eq!(scene.model().connections().len(), 1);
        assert!(scene.model().connection_exists(link(b, c)));
        let remaining: Vec<ConnectionId> = scene
            .connection_graphics_objects()
            .map(ConnectionGraphicsObject::connection_id)
            .collect();
        assert_eq!(remaining, vec![link(b, c)]);

        assert_eq!(
            scene.take_signals(),
            vec![SceneSignal::BeforeNodeDeleted(a), SceneSignal::NodeDeleted(a)]
        );
        assert!(!scene.delete_node(a));
    }

    #[test]
    fn test_detach_and_release_on_empty_space() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);
        scene.update_model(|model| model.add_connection(link(a, b)));

        scene.mouse_press(anchor(&scene, b, PortType::In), &VIEW, Modifiers::NONE);
        assert!(!scene.model().connection_exists(link(a, b)));
        let draft = scene.draft_connection().unwrap();
        assert_eq!(draft.state.required_port(), PortType::In);

        let empty = Pos2::new(1000.0, 500.0);
        scene.mouse_move(empty, &VIEW);
        scene.mouse_release(empty, &VIEW);

        assert!(scene.draft_connection().is_none());
        assert!(scene.model().connections().is_empty());
        assert_eq!(scene.connection_graphics_objects().count(), 0);
    }

    #[test]
    fn test_detach_and_reattach_elsewhere() {
        let (mut scene, nodes) = row_scene(3, ConnectionPolicy::Many);
        let (a, b, c) = (nodes[0], nodes[1], nodes[2]);
        scene.update_model(|model| model.add_connection(link(a, b)));

        let (from, to) = (anchor(&scene, b, PortType::In), anchor(&scene, c, PortType::In));
        drag(&mut scene, from, to);
        assert_eq!(scene.model().connections().into_iter().collect::<Vec<_>>(), vec![link(a, c)]);
        assert!(scene.connection_graphics_object(link(a, c)).is_some());
        assert!(scene.connection_graphics_object(link(a, b)).is_none());
    }

    #[test]
    fn test_single_output_policy_evicts_on_press() {
        let (mut scene, nodes) = row_scene(3, ConnectionPolicy::One);
        let (a, b, c) = (nodes[0], nodes[1], nodes[2]);
        scene.update_model(|model| model.add_connection(link(a, b)));

        scene.mouse_press(anchor(&scene, a, PortType::Out), &VIEW, Modifiers::NONE);
        assert!(scene.model().connections().is_empty());
        assert_eq!(scene.connection_graphics_objects().count(), 0);

        let to = anchor(&scene, c, PortType::In);
        scene.mouse_move(to, &VIEW);
        scene.mouse_release(to, &VIEW);
        assert_eq!(scene.model().connections().into_iter().collect::<Vec<_>>(), vec![link(a, c)]);
    }

    #[test]
    fn test_many_output_policy_fans_out() {
        let (mut scene, nodes) = row_scene(3, ConnectionPolicy::Many);
        let (a, b, c) = (nodes[0], nodes[1], nodes[2]);
        scene.update_model(|model| model.add_connection(link(a, b)));

        let (from, to) = (anchor(&scene, a, PortType::Out), anchor(&scene, c, PortType::In));
        drag(&mut scene, from, to);
        assert_eq!(scene.model().connections().len(), 2);
        assert_eq!(scene.connection_graphics_objects().count(), 2);
    }

    #[test]
    fn test_occupied_input_rejects_drop() {
        let (mut scene, nodes) = row_scene(3, ConnectionPolicy::Many);
        let (a, b, c) = (nodes[0], nodes[1], nodes[2]);
        scene.update_model(|model| model.add_connection(link(a, b)));

        let (from, to) = (anchor(&scene, c, PortType::Out), anchor(&scene, b, PortType::In));
        drag(&mut scene, from, to);
        assert_eq!(scene.model().connections().into_iter().collect::<Vec<_>>(), vec![link(a, b)]);
        assert!(scene.draft_connection().is_none());
        assert_eq!(scene.connection_graphics_objects().count(), 1);
    }

    #[test]
    fn test_incompatible_types_leave_model_untouched() {
        let mut scene = BasicScene::new(DataFlowGraphModel::new(test_registry()));
        let (constant, sink, sum) = scene.update_model(|model| {
            let constant = model.add_node("Constant");
            let sink = model.add_node("TextSink");
            let sum = model.add_node("Sum");
            model.set_node_data(sink, NodeRole::Position, NodeValue::Position(Pos2::new(300.0, 0.0)));
            model.set_node_data(sum, NodeRole::Position, NodeValue::Position(Pos2::new(0.0, 300.0)));
            (constant, sink, sum)
        });

        let from = anchor(&scene, constant, PortType::Out);
        let to = anchor(&scene, sink, PortType::In);
        scene.mouse_press(from, &VIEW, Modifiers::NONE);
        scene.mouse_move(to, &VIEW);
        let state = &scene.node_graphics_object(sink).unwrap().state;
        assert_eq!(state.reacting_data_type().map(|t| t.id.as_str()), Some("number"));
        scene.mouse_release(to, &VIEW);

        assert!(scene.model().connections().is_empty());
        assert_eq!(scene.connection_graphics_objects().count(), 0);
        assert!(scene.draft_connection().is_none());

        let to = anchor(&scene, sum, PortType::In);
        drag(&mut scene, from, to);
        assert_eq!(scene.model().connections().len(), 1);
    }

    #[test]
    fn test_removed_ports_drop_connection_objects() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);
        scene.update_model(|model| model.add_connection(link(a, b)));

        assert!(scene.update_model(|model| model.set_port_count(b, PortType::In, 0)));
        assert_eq!(scene.connection_graphics_objects().count(), 0);
        assert_eq!(
            scene.node_graphics_object(b).unwrap().geometry.port_count(PortType::In),
            0
        );

        assert!(scene.update_model(|model| model.set_port_count(b, PortType::In, 2)));
        assert_eq!(
            scene.node_graphics_object(b).unwrap().geometry.port_count(PortType::In),
            2
        );
    }

    #[test]
    fn test_removing_anchor_port_discards_draft() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let a = nodes[0];
        assert!(scene.update_model(|model| model.set_port_count(a, PortType::Out, 2)));

        let draft_id = ConnectionId::incomplete(PortType::Out, a, PortIndex(0));
        assert!(scene.make_draft_connection(draft_id));

        // Ports other than the anchor leave the draft alone
        assert!(scene.update_model(|model| model.set_port_count(a, PortType::In, 0)));
        assert!(scene.update_model(|model| model.set_port_count(a, PortType::Out, 1)));
        assert_eq!(
            scene.draft_connection().map(ConnectionGraphicsObject::connection_id),
            Some(draft_id)
        );

        let from = anchor(&scene, a, PortType::Out);
        let empty = Pos2::new(150.0, 200.0);
        scene.mouse_press(from, &VIEW, Modifiers::NONE);
        scene.mouse_move(empty, &VIEW);
        assert!(scene.draft_connection().is_some());

        assert!(scene.update_model(|model| model.set_port_count(a, PortType::Out, 0)));
        assert!(scene.draft_connection().is_none());

        scene.mouse_release(empty, &VIEW);
        assert!(scene.draft_connection().is_none());
        assert!(scene.model().connections().is_empty());
        assert_eq!(scene.connection_graphics_objects().count(), 0);
    }

    #[test]
    fn test_node_drag_moves_connections() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);
        scene.update_model(|model| model.add_connection(link(a, b)));
        scene.take_signals();

        let grab = Pos2::new(50.0, 10.0);
        let target = grab + Vec2::new(20.0, 30.0);
        scene.mouse_press(grab, &VIEW, Modifiers::NONE);
        scene.mouse_move(target, &VIEW);
        scene.mouse_release(target, &VIEW);

        assert_eq!(scene.model().node_position(a), Some(Pos2::new(20.0, 30.0)));
        assert_eq!(scene.node_graphics_object(a).unwrap().position, Pos2::new(20.0, 30.0));
        let object = scene.connection_graphics_object(link(a, b)).unwrap();
        assert_eq!(object.end_point(PortType::Out), anchor(&scene, a, PortType::Out));
        assert_eq!(
            scene.take_signals(),
            vec![SceneSignal::NodeMoved(a, Pos2::new(20.0, 30.0))]
        );
    }

    #[test]
    fn test_hover_signals_and_raise() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let a = nodes[0];
        let over = Pos2::new(50.0, 10.0);

        scene.mouse_move(over, &VIEW);
        assert_eq!(scene.hovered_node(), Some(a));
        assert_eq!(scene.node_graphics_object(a).unwrap().z_value, 1.0);

        scene.mouse_move(Pos2::new(1000.0, 1000.0), &VIEW);
        assert_eq!(scene.hovered_node(), None);
        assert_eq!(
            scene.take_signals(),
            vec![SceneSignal::NodeHovered(a, over), SceneSignal::NodeHoverLeft(a)]
        );
    }

    #[test]
    fn test_connection_selection_and_delete() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);
        scene.update_model(|model| model.add_connection(link(a, b)));

        let middle = anchor(&scene, a, PortType::Out).lerp(anchor(&scene, b, PortType::In), 0.5);
        assert_eq!(scene.connection_at(middle, &VIEW), Some(link(a, b)));

        scene.mouse_press(middle, &VIEW, Modifiers::NONE);
        scene.mouse_release(middle, &VIEW);
        assert_eq!(scene.selected_connections(), vec![link(a, b)]);
        assert!(scene.selected_nodes().is_empty());

        assert_eq!(scene.delete_selected(), 1);
        assert!(scene.model().connections().is_empty());
        assert_eq!(scene.node_graphics_objects().count(), 2);
    }

    #[test]
    fn test_selection_with_modifiers() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };

        scene.mouse_press(Pos2::new(50.0, 10.0), &VIEW, Modifiers::NONE);
        scene.mouse_release(Pos2::new(50.0, 10.0), &VIEW);
        scene.mouse_press(Pos2::new(350.0, 10.0), &VIEW, ctrl);
        scene.mouse_release(Pos2::new(350.0, 10.0), &VIEW);
        assert_eq!(scene.selected_nodes(), vec![a, b]);

        scene.mouse_press(Pos2::new(350.0, 10.0), &VIEW, ctrl);
        scene.mouse_release(Pos2::new(350.0, 10.0), &VIEW);
        assert_eq!(scene.selected_nodes(), vec![a]);

        scene.mouse_press(Pos2::new(1000.0, 1000.0), &VIEW, Modifiers::NONE);
        assert!(scene.selected_nodes().is_empty());
    }

    #[test]
    fn test_use_draft_connection_errors() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);

        assert_eq!(
            scene.use_draft_connection(link(a, b)),
            Err(SceneError::NoDraftConnection)
        );

        let draft_id = ConnectionId::incomplete(PortType::Out, a, PortIndex(0));
        assert!(scene.make_draft_connection(draft_id));
        assert_eq!(
            scene.use_draft_connection(draft_id),
            Err(SceneError::IncompleteConnection(draft_id))
        );
        assert!(scene.draft_connection().is_some());

        // The bound end must stay where the draft started
        assert_eq!(
            scene.use_draft_connection(link(b, a)),
            Err(SceneError::DraftMismatch {
                draft: draft_id,
                connection: link(b, a),
            })
        );
        let draft = scene.draft_connection().unwrap();
        assert_eq!(draft.connection_id(), draft_id);
        assert!(draft.state.requires_port());
        assert!(!scene.model().connection_exists(link(b, a)));

        assert_eq!(scene.use_draft_connection(link(a, b)), Ok(()));
        assert!(scene.model().connection_exists(link(a, b)));
        let committed = scene.connection_graphics_object(link(a, b)).unwrap();
        assert!(!committed.state.requires_port());
        assert_eq!(
            committed.end_point(PortType::In),
            scene.port_scene_position(b, PortType::In, PortIndex(0)).unwrap()
        );
    }

    #[test]
    fn test_delete_connection_targets_draft() {
        let (mut scene, nodes) = row_scene(1, ConnectionPolicy::Many);
        let draft_id = ConnectionId::incomplete(PortType::Out, nodes[0], PortIndex(0));
        scene.make_draft_connection(draft_id);

        assert!(scene.delete_connection(draft_id).is_some());
        assert!(scene.draft_connection().is_none());
        assert!(scene.delete_connection(draft_id).is_none());
    }

    #[test]
    fn test_double_click_and_context_menu() {
        let (mut scene, nodes) = row_scene(1, ConnectionPolicy::Many);
        let a = nodes[0];
        let point = Pos2::new(50.0, 10.0);

        assert_eq!(scene.mouse_double_click(point, &VIEW), Some(a));
        assert_eq!(scene.context_menu(point, &VIEW), Some(a));
        assert_eq!(scene.context_menu(Pos2::new(900.0, 900.0), &VIEW), None);
        assert_eq!(
            scene.take_signals(),
            vec![
                SceneSignal::NodeDoubleClicked(a),
                SceneSignal::NodeContextMenu(a, point)
            ]
        );
    }

    #[test]
    fn test_clear_scene() {
        let (mut scene, nodes) = row_scene(3, ConnectionPolicy::Many);
        scene.update_model(|model| model.add_connection(link(nodes[0], nodes[1])));

        scene.clear_scene();
        assert_eq!(scene.model().node_count(), 0);
        assert_eq!(scene.node_graphics_objects().count(), 0);
        assert_eq!(scene.connection_graphics_objects().count(), 0);
    }

    #[test]
    fn test_zoomed_view_scales_tolerance() {
        let (mut scene, nodes) = row_scene(2, ConnectionPolicy::Many);
        let (a, b) = (nodes[0], nodes[1]);
        let zoomed_out = TSTransform::from_scaling(0.5);

        // 15 scene units off the anchor is within 10 screen pixels at half zoom
        let near = anchor(&scene, b, PortType::In) + Vec2::new(0.0, 15.0);
        scene.mouse_press(anchor(&scene, a, PortType::Out), &zoomed_out, Modifiers::NONE);
        scene.mouse_move(near, &zoomed_out);
        scene.mouse_release(near, &zoomed_out);
        assert!(scene.model().connection_exists(link(a, b)));
    }
}
