// SPDX-License-Identifier: MIT OR Apache-2.0
//! Computational node models backing a data-flow graph.

use crate::port::{ConnectionPolicy, NodeDataType, PortIndex, PortType, SharedNodeData};
use crate::style::NodeStyle;
use egui::Vec2;

/// Business logic of one node in a [`DataFlowGraphModel`](crate::dataflow::DataFlowGraphModel).
///
/// The graph model owns every delegate and routes data between them: when an
/// upstream output changes, [`set_in_data`](Self::set_in_data) is called on
/// each connected input, after which the model reads
/// [`out_data`](Self::out_data) of every output and forwards it further.
pub trait NodeDelegateModel {
    /// Registered type name; unique within a registry
    fn name(&self) -> String;

    /// Caption shown in the node header
    fn caption(&self) -> String {
        self.name()
    }

    /// Whether the caption is drawn
    fn caption_visible(&self) -> bool {
        true
    }

    /// Number of ports on one side
    fn n_ports(&self, port_type: PortType) -> u32;

    /// Data type carried by a port
    fn data_type(&self, port_type: PortType, port_index: PortIndex) -> NodeDataType;

    /// Port caption
    fn port_caption(&self, port_type: PortType, port_index: PortIndex) -> String {
        self.data_type(port_type, port_index).name
    }

    /// Whether the port caption is drawn
    fn port_caption_visible(&self, _port_type: PortType, _port_index: PortIndex) -> bool {
        false
    }

    /// How many connections an output port may hold
    fn port_out_connection_policy(&self, _port_index: PortIndex) -> ConnectionPolicy {
        ConnectionPolicy::Many
    }

    /// Receive data on an input port; `None` when the input was disconnected
    fn set_in_data(&mut self, data: Option<SharedNodeData>, port_index: PortIndex);

    /// Current value of an output port
    fn out_data(&self, port_index: PortIndex) -> Option<SharedNodeData>;

    /// Size of the embedded control, if the node has one
    fn embedded_widget_size(&self) -> Option<Vec2> {
        None
    }

    /// Style override for this node
    fn style(&self) -> Option<NodeStyle> {
        None
    }

    /// Serialize the node's own state
    fn save(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Restore state written by [`save`](Self::save)
    fn restore(&mut self, _state: &serde_json::Value) {}
}
