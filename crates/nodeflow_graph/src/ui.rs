// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui front end for a [`BasicScene`].
//!
//! Features:
//! - Node, port and connection painting from the scene's objects
//! - Accept/reject feedback on ports while a connection is dragged
//! - Pan (middle drag) and zoom (scroll wheel, pinch) navigation
//! - Pointer and keyboard input forwarded to the scene's gestures
//! - Status bar

use crate::graphics::NodeGraphicsObject;
use crate::model::GraphModel;
use crate::port::{PortIndex, PortType};
use crate::scene::BasicScene;
use crate::style::color32;
use egui::emath::TSTransform;
use egui::{Color32, Pos2, Rect, Shape, Stroke, Vec2};

/// Grid parameters
const GRID_SPACING: f32 = 20.0;
const NODE_SHADOW_OFFSET: f32 = 3.0;

/// Zoom limits
const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 4.0;

/// Pointer distance below which a reacting port grows
const REACTION_DISTANCE: f32 = 40.0;

/// Input sampled once per frame
struct FrameInput {
    pointer: Option<Pos2>,
    scroll: f32,
    zoom_delta: f32,
    modifiers: egui::Modifiers,
    pressed: bool,
    released: bool,
    delete: bool,
    escape: bool,
}

/// Pan/zoom state of a canvas showing one scene
#[derive(Debug, Clone)]
pub struct GraphView {
    /// Scene to canvas transform; the canvas origin is the top-left corner
    /// of the allocated rect
    pub transform: TSTransform,
    /// Draw the background grid
    pub show_grid: bool,
    /// Draw the status line
    pub show_status_bar: bool,
    last_pointer: Option<Pos2>,
}

impl Default for GraphView {
    fn default() -> Self {
        Self {
            transform: TSTransform::IDENTITY,
            show_grid: true,
            show_status_bar: true,
            last_pointer: None,
        }
    }
}

impl GraphView {
    /// Create a view at the scene origin, unzoomed
    pub fn new() -> Self {
        Self::default()
    }

    /// Current zoom factor
    pub fn zoom(&self) -> f32 {
        self.transform.scaling
    }

    /// Scene to screen transform for a canvas rect
    pub fn to_screen(&self, rect: Rect) -> TSTransform {
        TSTransform::from_translation(rect.min.to_vec2()) * self.transform
    }

    /// Zoom by `factor`, keeping the scene point under `canvas_point` fixed
    pub fn zoom_around(&mut self, canvas_point: Pos2, factor: f32) {
        let scene_point = self.transform.inverse() * canvas_point;
        let scaling = (self.transform.scaling * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.transform = TSTransform::new(canvas_point.to_vec2() - scene_point.to_vec2() * scaling, scaling);
    }

    /// Paint the scene into the remaining space of `ui` and feed it input
    pub fn show<M: GraphModel>(&mut self, ui: &mut egui::Ui, scene: &mut BasicScene<M>) -> egui::Response {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.handle_input(ui, &response, rect, scene);
        let to_screen = self.to_screen(rect);

        if self.show_grid {
            draw_grid(&painter, rect, &to_screen);
        }
        draw_connections(&painter, scene, &to_screen);
        draw_draft(&painter, scene, &to_screen);
        for object in scene.nodes_in_paint_order() {
            draw_node(&painter, scene, object, &to_screen);
        }
        if self.show_status_bar {
            draw_status_bar(&painter, rect, scene, to_screen.scaling);
        }

        response
    }

    fn handle_input<M: GraphModel>(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        rect: Rect,
        scene: &mut BasicScene<M>,
    ) {
        let input = ui.input(|i| FrameInput {
            pointer: i.pointer.interact_pos(),
            scroll: i.raw_scroll_delta.y,
            zoom_delta: i.zoom_delta(),
            modifiers: i.modifiers,
            pressed: i.pointer.button_pressed(egui::PointerButton::Primary),
            released: i.pointer.button_released(egui::PointerButton::Primary),
            delete: i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
            escape: i.key_pressed(egui::Key::Escape),
        });

        if response.dragged_by(egui::PointerButton::Middle) {
            self.transform.translation += response.drag_delta();
        }

        if let Some(pointer) = input.pointer.filter(|pointer| rect.contains(*pointer)) {
            let mut factor = input.zoom_delta;
            if input.scroll != 0.0 {
                factor *= 1.0 + input.scroll * 0.001;
            }
            if factor != 1.0 {
                self.zoom_around(pointer - rect.min.to_vec2(), factor);
            }
        }

        let to_screen = self.to_screen(rect);
        if let Some(pointer) = input.pointer {
            let scene_pos = to_screen.inverse() * pointer;
            let inside = rect.contains(pointer);

            if self.last_pointer != Some(pointer) {
                self.last_pointer = Some(pointer);
                if inside || scene.draft_connection().is_some() {
                    scene.mouse_move(scene_pos, &to_screen);
                }
            }
            if input.pressed && inside {
                scene.mouse_press(scene_pos, &to_screen, input.modifiers);
            }
            if input.released {
                scene.mouse_release(scene_pos, &to_screen);
            }
            if response.double_clicked() {
                scene.mouse_double_click(scene_pos, &to_screen);
            }
            if response.secondary_clicked() {
                scene.context_menu(scene_pos, &to_screen);
            }
        }

        let keyboard_free = ui.memory(|mem| mem.focused().is_none());
        if keyboard_free && input.delete {
            let removed = scene.delete_selected();
            tracing::debug!("Deleted {} selected items", removed);
        }
        if input.escape && scene.cancel_draft() {
            tracing::debug!("Draft connection cancelled");
        }
    }
}

fn draw_grid(painter: &egui::Painter, rect: Rect, to_screen: &TSTransform) {
    let spacing = GRID_SPACING * to_screen.scaling;
    if spacing < 4.0 {
        return;
    }

    let grid_color_minor = Color32::from_rgba_unmultiplied(60, 60, 60, 100);
    let grid_color_major = Color32::from_rgba_unmultiplied(80, 80, 80, 150);
    let origin = *to_screen * Pos2::ZERO;

    for (step, color) in [(spacing, grid_color_minor), (spacing * 5.0, grid_color_major)] {
        let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
        while x < rect.right() {
            painter.line_segment(
                [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
                Stroke::new(1.0, color),
            );
            x += step;
        }

        let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
        while y < rect.bottom() {
            painter.line_segment(
                [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
                Stroke::new(1.0, color),
            );
            y += step;
        }
    }

    // Origin axes
    if rect.contains(origin) {
        let axis = Stroke::new(2.0, Color32::from_rgba_unmultiplied(100, 100, 150, 180));
        painter.line_segment(
            [Pos2::new(origin.x, rect.top()), Pos2::new(origin.x, rect.bottom())],
            axis,
        );
        painter.line_segment(
            [Pos2::new(rect.left(), origin.y), Pos2::new(rect.right(), origin.y)],
            axis,
        );
    }
}

fn draw_connections<M: GraphModel>(painter: &egui::Painter, scene: &BasicScene<M>, to_screen: &TSTransform) {
    let style = &scene.config().connection_style;
    let width = style.line_width * to_screen.scaling;

    let mut objects: Vec<_> = scene.connection_graphics_objects().collect();
    objects.sort_by_key(|object| object.connection_id());

    for object in objects {
        let connection_id = object.connection_id();
        let points: Vec<Pos2> = object
            .curve()
            .into_iter()
            .map(|point| *to_screen * point)
            .collect();

        if object.selected {
            painter.add(Shape::line(
                points.clone(),
                Stroke::new(width * 2.0, color32(style.selected_halo_color)),
            ));
        }

        let color = if object.selected {
            style.selected_color
        } else if object.state.is_hovered() {
            style.hovered_color
        } else {
            let data_type = scene.model().port_data_type(
                connection_id.out_node_id,
                PortType::Out,
                connection_id.out_port_index,
            );
            style.normal_color_for(data_type.as_ref())
        };
        painter.add(Shape::line(points, Stroke::new(width, color32(color))));
    }
}

fn draw_draft<M: GraphModel>(painter: &egui::Painter, scene: &BasicScene<M>, to_screen: &TSTransform) {
    let Some(draft) = scene.draft_connection() else {
        return;
    };
    let style = &scene.config().connection_style;
    let zoom = to_screen.scaling;

    let points: Vec<Pos2> = draft
        .curve()
        .into_iter()
        .map(|point| *to_screen * point)
        .collect();
    let stroke = Stroke::new(style.construction_line_width * zoom, color32(style.construction_color));
    painter.extend(Shape::dashed_line(&points, stroke, 8.0 * zoom, 4.0 * zoom));

    for port_type in [PortType::Out, PortType::In] {
        painter.circle_filled(
            *to_screen * draft.end_point(port_type),
            style.point_diameter * 0.5 * zoom,
            color32(style.construction_color),
        );
    }
}

fn draw_node<M: GraphModel>(
    painter: &egui::Painter,
    scene: &BasicScene<M>,
    object: &NodeGraphicsObject,
    to_screen: &TSTransform,
) {
    let model = scene.model();
    let node_id = object.node_id;
    let zoom = to_screen.scaling;
    let style = model
        .node_style(node_id)
        .unwrap_or_else(|| scene.config().node_style.clone());

    let screen_rect = *to_screen * object.scene_body_rect();
    if !painter.clip_rect().intersects(screen_rect.expand(REACTION_DISTANCE * zoom)) {
        return;
    }
    let rounding = style.rounding * zoom;

    // Shadow
    painter.rect_filled(
        screen_rect.translate(Vec2::splat(NODE_SHADOW_OFFSET)),
        rounding,
        Color32::from_rgba_unmultiplied(0, 0, 0, 60),
    );
    painter.rect_filled(screen_rect, rounding, color32(style.fill_color));

    let header_rect = *to_screen
        * object
            .geometry
            .caption_rect()
            .translate(object.position.to_vec2());
    painter.rect_filled(
        header_rect,
        egui::Rounding {
            nw: rounding,
            ne: rounding,
            sw: 0.0,
            se: 0.0,
        },
        color32(style.header_color),
    );
    if let Some(caption) = model.visible_caption(node_id) {
        painter.text(
            header_rect.center(),
            egui::Align2::CENTER_CENTER,
            caption,
            egui::FontId::proportional(12.0 * zoom),
            color32(style.font_color),
        );
    }

    let (boundary, pen_width) = if object.selected {
        (style.selected_boundary_color, style.hovered_pen_width)
    } else if object.state.hovered {
        (style.normal_boundary_color, style.hovered_pen_width)
    } else {
        (style.normal_boundary_color, style.pen_width)
    };
    painter.rect_stroke(screen_rect, rounding, Stroke::new(pen_width, color32(boundary)));

    let geometry = &scene.config().geometry;
    for port_type in [PortType::In, PortType::Out] {
        for port_index in PortIndex::range(object.geometry.port_count(port_type)) {
            let anchor = object.port_scene_position(port_type, port_index);
            let screen_anchor = *to_screen * anchor;
            let connected = !model
                .connected_nodes(node_id, port_type, port_index)
                .is_empty();

            let mut radius = geometry.port_radius * zoom;
            let mut color = if connected {
                style.filled_connection_point_color
            } else {
                style.connection_point_color
            };

            let state = &object.state;
            if state.is_reacting() && state.reacting_port_type() == Some(port_type) {
                let distance = anchor.distance(state.dragging_position());
                if distance < REACTION_DISTANCE {
                    radius *= 2.0 - distance / REACTION_DISTANCE;
                }
                let data_type = model.port_data_type(node_id, port_type, port_index);
                color = if state.reacting_data_type() == data_type.as_ref() {
                    style.accept_color
                } else {
                    style.reject_color
                };
            }

            painter.circle_filled(screen_anchor, radius, color32(color));
            painter.circle_stroke(screen_anchor, radius, Stroke::new(1.0, Color32::from_gray(30)));

            if let Some(caption) = model.visible_port_caption(node_id, port_type, port_index) {
                let (offset, align) = match port_type {
                    PortType::Out => (-geometry.padding, egui::Align2::RIGHT_CENTER),
                    _ => (geometry.padding, egui::Align2::LEFT_CENTER),
                };
                let font_color = if connected {
                    style.font_color
                } else {
                    style.font_color_faded
                };
                painter.text(
                    Pos2::new(screen_anchor.x + offset * zoom, screen_anchor.y),
                    align,
                    caption,
                    egui::FontId::proportional(10.0 * zoom),
                    color32(font_color),
                );
            }
        }
    }
}

fn draw_status_bar<M: GraphModel>(painter: &egui::Painter, rect: Rect, scene: &BasicScene<M>, zoom: f32) {
    painter.text(
        Pos2::new(rect.left() + 5.0, rect.bottom() - 11.0),
        egui::Align2::LEFT_CENTER,
        format!(
            "Nodes: {} | Connections: {} | Zoom: {:.0}% | Selected: {}",
            scene.node_graphics_objects().count(),
            scene.connection_graphics_objects().count(),
            zoom * 100.0,
            scene.selected_nodes().len(),
        ),
        egui::FontId::proportional(11.0),
        Color32::from_gray(150),
    );
}
