// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene configuration.
//!
//! Geometry metrics and default styles used when measuring, hit-testing and
//! painting a scene. Stored as RON; every field has a default so partial
//! files are accepted.

use crate::style::{ConnectionStyle, NodeStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration file name used by default
pub const CONFIG_FILE_NAME: &str = "nodeflow.ron";

/// Errors raised while reading or writing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON for this configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serializing the configuration failed
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] ron::Error),
}

/// Node and port measurement metrics, in scene units unless noted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Vertical distance between two ports on the same side
    pub port_spacing: f32,
    /// Height of the caption header
    pub caption_height: f32,
    /// Radius of a port anchor
    pub port_radius: f32,
    /// Port hit radius, in view pixels
    pub port_hit_tolerance: f32,
    /// Connection hit distance, in view pixels
    pub connection_hit_tolerance: f32,
    /// Narrowest node body
    pub min_node_width: f32,
    /// Average glyph width used to estimate text extents
    pub char_width: f32,
    /// Inner padding of the node body
    pub padding: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            port_spacing: 22.0,
            caption_height: 24.0,
            port_radius: 5.0,
            port_hit_tolerance: 10.0,
            connection_hit_tolerance: 5.0,
            min_node_width: 100.0,
            char_width: 7.0,
            padding: 8.0,
        }
    }
}

/// Full scene configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Geometry metrics
    pub geometry: GeometryConfig,
    /// Default node style
    pub node_style: NodeStyle,
    /// Connection style
    pub connection_style: ConnectionStyle,
}

impl SceneConfig {
    /// Parse configuration from a RON string
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Serialize configuration to a pretty RON string
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&source)?;
        tracing::debug!("Loaded scene configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        tracing::debug!("Saved scene configuration to {:?}", path);
        Ok(())
    }
}
