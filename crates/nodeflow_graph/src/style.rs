// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visual styles for nodes and connections.

use crate::port::NodeDataType;
use egui::Color32;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// RGBA colour as stored in configuration files
pub type Rgba = [u8; 4];

/// Convert a stored colour to an egui colour
pub fn color32(rgba: Rgba) -> Color32 {
    let [r, g, b, a] = rgba;
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Node appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStyle {
    /// Outline colour
    pub normal_boundary_color: Rgba,
    /// Outline colour when selected
    pub selected_boundary_color: Rgba,
    /// Body fill
    pub fill_color: Rgba,
    /// Caption header fill
    pub header_color: Rgba,
    /// Text colour
    pub font_color: Rgba,
    /// Text colour for secondary labels
    pub font_color_faded: Rgba,
    /// Unconnected port colour
    pub connection_point_color: Rgba,
    /// Connected port colour
    pub filled_connection_point_color: Rgba,
    /// Port highlight while a compatible draft hovers the node
    pub accept_color: Rgba,
    /// Port highlight while an incompatible draft hovers the node
    pub reject_color: Rgba,
    /// Outline width
    pub pen_width: f32,
    /// Outline width when hovered
    pub hovered_pen_width: f32,
    /// Corner rounding
    pub rounding: f32,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            normal_boundary_color: [255, 255, 255, 255],
            selected_boundary_color: [255, 165, 0, 255],
            fill_color: [45, 45, 48, 230],
            header_color: [70, 100, 130, 255],
            font_color: [255, 255, 255, 255],
            font_color_faded: [128, 128, 128, 255],
            connection_point_color: [169, 169, 169, 255],
            filled_connection_point_color: [0, 255, 255, 255],
            accept_color: [80, 200, 80, 255],
            reject_color: [200, 80, 80, 255],
            pen_width: 1.0,
            hovered_pen_width: 1.5,
            rounding: 6.0,
        }
    }
}

/// Connection appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionStyle {
    /// Colour of a draft connection
    pub construction_color: Rgba,
    /// Colour of a committed connection
    pub normal_color: Rgba,
    /// Colour when selected
    pub selected_color: Rgba,
    /// Halo drawn under a selected connection
    pub selected_halo_color: Rgba,
    /// Colour when hovered
    pub hovered_color: Rgba,
    /// Width of a committed connection
    pub line_width: f32,
    /// Width of a draft connection
    pub construction_line_width: f32,
    /// Diameter of the end point markers
    pub point_diameter: f32,
    /// Derive the normal colour from the carried data type
    pub use_data_defined_colors: bool,
}

impl Default for ConnectionStyle {
    fn default() -> Self {
        Self {
            construction_color: [169, 169, 169, 255],
            normal_color: [0, 139, 139, 255],
            selected_color: [100, 100, 100, 255],
            selected_halo_color: [255, 165, 0, 255],
            hovered_color: [224, 255, 255, 255],
            line_width: 3.0,
            construction_line_width: 2.0,
            point_diameter: 10.0,
            use_data_defined_colors: false,
        }
    }
}

impl ConnectionStyle {
    /// Colour of a committed connection carrying the given data type
    pub fn normal_color_for(&self, data_type: Option<&NodeDataType>) -> Rgba {
        match data_type {
            Some(data_type) if self.use_data_defined_colors => data_type_color(data_type),
            _ => self.normal_color,
        }
    }
}

/// Stable colour derived from a data type id
fn data_type_color(data_type: &NodeDataType) -> Rgba {
    let mut hasher = DefaultHasher::new();
    data_type.id.hash(&mut hasher);
    let hash = hasher.finish();

    // Keep channels away from black so lines stay visible on a dark canvas
    let channel = |shift: u32| 80 + ((hash >> shift) & 0xff) as u8 % 176;
    [channel(0), channel(8), channel(16), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_defined_colors() {
        let mut style = ConnectionStyle::default();
        let decimal = NodeDataType::new("decimal", "Decimal");

        assert_eq!(style.normal_color_for(Some(&decimal)), style.normal_color);

        style.use_data_defined_colors = true;
        let first = style.normal_color_for(Some(&decimal));
        let second = style.normal_color_for(Some(&decimal));
        assert_eq!(first, second);
        assert_eq!(style.normal_color_for(None), style.normal_color);
    }
}
