// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph editing core.
//!
//! This crate provides:
//! - Graph models behind one [`GraphModel`] contract: a generic
//!   [`SimpleGraphModel`] and a data-flow [`DataFlowGraphModel`] whose nodes
//!   are computational delegates
//! - The connection drafting state machine (press on a port, drag, drop)
//! - A scene that mirrors a model into node and connection objects
//! - Geometry helpers for port anchors, hit-testing and connection curves
//! - An egui view painting a scene and feeding it input
//!
//! ## Architecture
//!
//! Models never call into the scene. Each mutating call queues
//! [`GraphEvent`]s, and [`BasicScene`] drains the queue after every edit it
//! performs, so the visual objects always match the model once control
//! returns to the caller.

pub mod config;
pub mod connection;
pub mod connection_state;
pub mod connectivity;
pub mod dataflow;
pub mod delegate;
pub mod geometry;
pub mod graph;
pub mod graphics;
pub mod graphs;
pub mod interaction;
pub mod model;
pub mod node;
pub mod persistence;
pub mod port;
pub mod registry;
pub mod scene;
pub mod style;
pub mod ui;

pub use config::{ConfigError, GeometryConfig, SceneConfig};
pub use connection::ConnectionId;
pub use dataflow::DataFlowGraphModel;
pub use delegate::NodeDelegateModel;
pub use graph::SimpleGraphModel;
pub use interaction::{ConnectionRejection, NodeConnectionInteraction};
pub use model::{GraphEvent, GraphModel};
pub use node::{NodeId, NodeRole, NodeValue};
pub use persistence::{PersistenceError, SceneDocument};
pub use port::{ConnectionPolicy, NodeData, NodeDataType, PortIndex, PortRole, PortType, PortValue};
pub use registry::NodeDelegateModelRegistry;
pub use scene::{BasicScene, SceneError, SceneSignal};
pub use ui::GraphView;
