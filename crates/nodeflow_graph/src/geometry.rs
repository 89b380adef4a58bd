// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spatial queries: node measuring, port anchors and hit-testing, connection
//! curves and node lookup under a point.
//!
//! Node geometry is expressed in the node's local frame, whose origin is the
//! node position. Port hit tolerances are given in view pixels and divided by
//! the view zoom, so hit areas keep their on-screen size at any zoom level.

use crate::config::GeometryConfig;
use crate::model::GraphModel;
use crate::node::NodeId;
use crate::port::{PortIndex, PortType};
use crate::scene::BasicScene;
use egui::emath::TSTransform;
use egui::{Pos2, Rect, Vec2};

/// Largest horizontal control point offset of a connection curve
pub const CONNECTION_CONTROL_OFFSET: f32 = 200.0;

/// Number of segments used to sample a connection curve
pub const CONNECTION_SEGMENTS: usize = 32;

/// Measured layout of one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeGeometry {
    /// Size of the node body
    pub size: Vec2,
    /// Number of input ports
    pub in_ports: u32,
    /// Number of output ports
    pub out_ports: u32,
    caption_height: f32,
    port_spacing: f32,
    port_radius: f32,
}

impl NodeGeometry {
    /// Measure a node from the roles its model reports
    pub fn measure<M: GraphModel + ?Sized>(model: &M, node_id: NodeId, config: &GeometryConfig) -> Self {
        let in_ports = model.port_count(node_id, PortType::In);
        let out_ports = model.port_count(node_id, PortType::Out);

        let text_width = |text: &str| text.chars().count() as f32 * config.char_width;
        let widest_caption = |port_type: PortType, count: u32| {
            PortIndex::range(count)
                .filter_map(|port_index| model.visible_port_caption(node_id, port_type, port_index))
                .map(|caption| text_width(&caption))
                .fold(0.0_f32, f32::max)
        };

        let caption_width = model
            .visible_caption(node_id)
            .map_or(0.0, |caption| text_width(&caption) + 2.0 * config.padding);
        let widget = model.widget_size(node_id).unwrap_or(Vec2::ZERO);
        let body_width = widest_caption(PortType::In, in_ports)
            + widest_caption(PortType::Out, out_ports)
            + widget.x
            + 4.0 * config.padding;

        let ports_height = in_ports.max(out_ports) as f32 * config.port_spacing;
        let height = config.caption_height + ports_height.max(widget.y) + config.padding;

        Self {
            size: Vec2::new(
                config.min_node_width.max(caption_width).max(body_width),
                height,
            ),
            in_ports,
            out_ports,
            caption_height: config.caption_height,
            port_spacing: config.port_spacing,
            port_radius: config.port_radius,
        }
    }

    /// Number of ports on one side
    pub fn port_count(&self, port_type: PortType) -> u32 {
        match port_type {
            PortType::In => self.in_ports,
            PortType::Out => self.out_ports,
            PortType::None => 0,
        }
    }

    /// Node body in the local frame
    pub fn body_rect(&self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, self.size)
    }

    /// Body plus the port anchors sticking out of it, in the local frame
    pub fn bounding_rect(&self) -> Rect {
        self.body_rect().expand(self.port_radius)
    }

    /// Caption header in the local frame
    pub fn caption_rect(&self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, Vec2::new(self.size.x, self.caption_height))
    }

    /// Port anchor in the local frame
    pub fn port_node_position(&self, port_type: PortType, port_index: PortIndex) -> Pos2 {
        let y = self.caption_height + self.port_spacing * (port_index.0 as f32 + 0.5);
        match port_type {
            PortType::Out => Pos2::new(self.size.x, y),
            _ => Pos2::new(0.0, y),
        }
    }

    /// Port anchor in scene coordinates for a node placed at `node_position`
    pub fn port_scene_position(
        &self,
        port_type: PortType,
        port_index: PortIndex,
        node_position: Pos2,
    ) -> Pos2 {
        node_position + self.port_node_position(port_type, port_index).to_vec2()
    }

    /// Port of the given side whose anchor is nearest to `scene_point`.
    ///
    /// Returns [`PortIndex::INVALID`] if no anchor lies within `tolerance`
    /// scene units.
    pub fn check_hit_scene_point(
        &self,
        port_type: PortType,
        scene_point: Pos2,
        node_position: Pos2,
        tolerance: f32,
    ) -> PortIndex {
        if !port_type.is_valid() {
            return PortIndex::INVALID;
        }

        PortIndex::range(self.port_count(port_type))
            .map(|port_index| {
                let anchor = self.port_scene_position(port_type, port_index, node_position);
                (port_index, anchor.distance(scene_point))
            })
            .filter(|(_, distance)| *distance <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(PortIndex::INVALID, |(port_index, _)| port_index)
    }

    /// Nearest port on either side, inputs winning ties
    pub fn check_hit_port(
        &self,
        scene_point: Pos2,
        node_position: Pos2,
        tolerance: f32,
    ) -> Option<(PortType, PortIndex)> {
        [PortType::In, PortType::Out].into_iter().find_map(|port_type| {
            let port_index = self.check_hit_scene_point(port_type, scene_point, node_position, tolerance);
            port_index.is_valid().then_some((port_type, port_index))
        })
    }
}

/// Port hit tolerance in scene units for a view
pub fn scene_tolerance(view_tolerance: f32, view: &TSTransform) -> f32 {
    if view.scaling > 0.0 {
        view_tolerance / view.scaling
    } else {
        view_tolerance
    }
}

/// Control points of the cubic curve joining an output anchor to an input anchor.
///
/// When the input lies left of the output the curve bends vertically so it
/// loops around the nodes instead of cutting through them.
pub fn points_c1_c2(out: Pos2, input: Pos2) -> (Pos2, Pos2) {
    let x_distance = input.x - out.x;
    let mut horizontal_offset = CONNECTION_CONTROL_OFFSET.min(x_distance.abs());
    let mut vertical_offset = 0.0;
    let mut ratio_x = 0.5;

    if x_distance <= 0.0 {
        let y_distance = input.y - out.y + 20.0;
        let direction = if y_distance < 0.0 { -1.0 } else { 1.0 };
        vertical_offset = CONNECTION_CONTROL_OFFSET.min(y_distance.abs()) * direction;
        ratio_x = 1.0;
    }
    horizontal_offset *= ratio_x;

    (
        Pos2::new(out.x + horizontal_offset, out.y + vertical_offset),
        Pos2::new(input.x - horizontal_offset, input.y - vertical_offset),
    )
}

/// Generate points along a cubic bezier curve
pub fn bezier_points(p0: Pos2, p1: Pos2, p2: Pos2, p3: Pos2, segments: usize) -> Vec<Pos2> {
    let segments = segments.max(1);
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;

        points.push(Pos2::new(x, y));
    }
    points
}

/// Sampled curve of a connection between two anchors
pub fn connection_curve(out: Pos2, input: Pos2) -> Vec<Pos2> {
    let (c1, c2) = points_c1_c2(out, input);
    bezier_points(out, c1, c2, input, CONNECTION_SEGMENTS)
}

/// Rectangle covering a connection curve and its control points
pub fn connection_bounding_rect(out: Pos2, input: Pos2, point_diameter: f32) -> Rect {
    let (c1, c2) = points_c1_c2(out, input);
    Rect::from_two_pos(out, input)
        .union(Rect::from_two_pos(c1, c2))
        .expand(point_diameter)
}

/// Whether `point` lies within `tolerance` of the connection curve
pub fn connection_hit_test(out: Pos2, input: Pos2, point: Pos2, tolerance: f32) -> bool {
    connection_curve(out, input)
        .windows(2)
        .any(|segment| distance_to_segment(point, segment[0], segment[1]) <= tolerance)
}

fn distance_to_segment(point: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let length_sq = ab.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / length_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// Topmost node whose bounds contain `scene_point`.
///
/// Bounds include the port anchors plus the port hit tolerance, converted
/// from view pixels through `view`, so a press on a port sticking out of a
/// node still resolves to that node. Higher z values win, then higher ids.
pub fn locate_node_at<M: GraphModel>(
    scene_point: Pos2,
    scene: &BasicScene<M>,
    view: &TSTransform,
) -> Option<NodeId> {
    let tolerance = scene_tolerance(scene.config().geometry.port_hit_tolerance, view);
    let margin = (tolerance - scene.config().geometry.port_radius).max(0.0);

    scene
        .node_graphics_objects()
        .filter(|object| {
            object
                .scene_bounding_rect()
                .expand(margin)
                .contains(scene_point)
        })
        .max_by(|a, b| {
            a.z_value
                .total_cmp(&b.z_value)
                .then(a.node_id.cmp(&b.node_id))
        })
        .map(|object| object.node_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeTypeSpec, SimpleGraphModel, DEFAULT_NODE_TYPE};
    use crate::node::{NodeRole, NodeValue};

    fn measured(in_ports: u32, out_ports: u32) -> NodeGeometry {
        let mut model = SimpleGraphModel::new();
        model.register_node_type("node", NodeTypeSpec::new("N", in_ports, out_ports));
        let node = model.add_node("node");
        NodeGeometry::measure(&model, node, &GeometryConfig::default())
    }

    #[test]
    fn test_measure_grows_with_ports() {
        let config = GeometryConfig::default();
        let small = measured(1, 1);
        let large = measured(4, 1);

        assert!(small.size.x >= config.min_node_width);
        assert!(large.size.y > small.size.y);
        assert_eq!(
            large.size.y,
            config.caption_height + 4.0 * config.port_spacing + config.padding
        );
    }

    #[test]
    fn test_port_positions() {
        let config = GeometryConfig::default();
        let geometry = measured(2, 1);

        let in1 = geometry.port_node_position(PortType::In, PortIndex(1));
        assert_eq!(in1.x, 0.0);
        assert_eq!(in1.y, config.caption_height + config.port_spacing * 1.5);

        let out0 = geometry.port_scene_position(PortType::Out, PortIndex(0), Pos2::new(10.0, 10.0));
        assert_eq!(out0.x, 10.0 + geometry.size.x);
    }

    #[test]
    fn test_check_hit_scene_point() {
        let geometry = measured(2, 1);
        let origin = Pos2::new(100.0, 50.0);
        let anchor = geometry.port_scene_position(PortType::In, PortIndex(1), origin);

        assert_eq!(
            geometry.check_hit_scene_point(PortType::In, anchor + Vec2::new(3.0, 0.0), origin, 5.0),
            PortIndex(1)
        );
        assert_eq!(
            geometry.check_hit_scene_point(PortType::In, anchor + Vec2::new(30.0, 0.0), origin, 5.0),
            PortIndex::INVALID
        );
        assert_eq!(
            geometry.check_hit_scene_point(PortType::Out, anchor, origin, 5.0),
            PortIndex::INVALID
        );
        assert_eq!(
            geometry.check_hit_port(anchor, origin, 5.0),
            Some((PortType::In, PortIndex(1)))
        );
    }

    #[test]
    fn test_control_points() {
        // Input right of output: purely horizontal offsets, halved
        let (c1, c2) = points_c1_c2(Pos2::new(0.0, 0.0), Pos2::new(100.0, 0.0));
        assert_eq!(c1, Pos2::new(50.0, 0.0));
        assert_eq!(c2, Pos2::new(50.0, 0.0));

        // Far apart: offset capped
        let (c1, _) = points_c1_c2(Pos2::new(0.0, 0.0), Pos2::new(1000.0, 0.0));
        assert_eq!(c1.x, 100.0);

        // Input left of output: the curve bends downwards
        let (c1, c2) = points_c1_c2(Pos2::new(100.0, 0.0), Pos2::new(0.0, 0.0));
        assert_eq!(c1, Pos2::new(200.0, 20.0));
        assert_eq!(c2, Pos2::new(-100.0, -20.0));
    }

    #[test]
    fn test_connection_hit_test() {
        let out = Pos2::new(0.0, 0.0);
        let input = Pos2::new(200.0, 0.0);

        assert!(connection_hit_test(out, input, Pos2::new(100.0, 2.0), 5.0));
        assert!(!connection_hit_test(out, input, Pos2::new(100.0, 40.0), 5.0));

        let bounds = connection_bounding_rect(out, input, 10.0);
        assert!(bounds.contains(Pos2::new(100.0, 0.0)));
    }

    #[test]
    fn test_scene_tolerance_follows_zoom() {
        assert_eq!(scene_tolerance(10.0, &TSTransform::IDENTITY), 10.0);
        assert_eq!(scene_tolerance(10.0, &TSTransform::from_scaling(2.0)), 5.0);
    }

    #[test]
    fn test_locate_node_at() {
        let mut model = SimpleGraphModel::new();
        let a = model.add_node(DEFAULT_NODE_TYPE);
        let b = model.add_node(DEFAULT_NODE_TYPE);
        model.set_node_data(
            b,
            NodeRole::Position,
            NodeValue::Position(Pos2::new(50.0, 0.0)),
        );
        let scene = BasicScene::new(model);
        let view = TSTransform::IDENTITY;

        // Overlap: later node on top
        assert_eq!(locate_node_at(Pos2::new(60.0, 10.0), &scene, &view), Some(b));
        assert_eq!(locate_node_at(Pos2::new(10.0, 10.0), &scene, &view), Some(a));
        assert_eq!(locate_node_at(Pos2::new(-500.0, 10.0), &scene, &view), None);

        // A point just left of node a resolves only while the zoom keeps it within tolerance
        let near = Pos2::new(-8.0, 10.0);
        assert_eq!(locate_node_at(near, &scene, &view), Some(a));
        assert_eq!(locate_node_at(near, &scene, &TSTransform::from_scaling(4.0)), None);
    }
}
