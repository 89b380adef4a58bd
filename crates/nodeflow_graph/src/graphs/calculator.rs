// SPDX-License-Identifier: MIT OR Apache-2.0
//! Calculator graph: decimal sources, result displays and the four
//! arithmetic operators.

use std::any::Any;
use std::rc::Rc;

use crate::delegate::NodeDelegateModel;
use crate::port::{NodeData, NodeDataType, PortIndex, PortType, SharedNodeData};
use crate::registry::NodeDelegateModelRegistry;
use egui::Vec2;

/// Type id of decimal values
pub const DECIMAL_TYPE_ID: &str = "decimal";

/// Size reserved for the value field of sources and displays
const VALUE_FIELD_SIZE: Vec2 = Vec2::new(80.0, 20.0);

/// Type tag of decimal values
pub fn decimal_type() -> NodeDataType {
    NodeDataType::new(DECIMAL_TYPE_ID, "Decimal")
}

/// A decimal number flowing between calculator nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimalData(pub f64);

impl NodeData for DecimalData {
    fn data_type(&self) -> NodeDataType {
        decimal_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Read a decimal out of shared node data
pub fn decimal_value(data: &SharedNodeData) -> Option<f64> {
    data.as_any()
        .downcast_ref::<DecimalData>()
        .map(|decimal| decimal.0)
}

/// Emits a user-entered number
#[derive(Debug, Clone, Default)]
pub struct NumberSource {
    value: f64,
}

impl NumberSource {
    /// Source emitting `value`
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    /// Current value
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl NodeDelegateModel for NumberSource {
    fn name(&self) -> String {
        "NumberSource".to_string()
    }

    fn caption(&self) -> String {
        "Number Source".to_string()
    }

    fn n_ports(&self, port_type: PortType) -> u32 {
        u32::from(port_type == PortType::Out)
    }

    fn data_type(&self, _port_type: PortType, _port_index: PortIndex) -> NodeDataType {
        decimal_type()
    }

    fn set_in_data(&mut self, _data: Option<SharedNodeData>, _port_index: PortIndex) {}

    fn out_data(&self, _port_index: PortIndex) -> Option<SharedNodeData> {
        Some(Rc::new(DecimalData(self.value)))
    }

    fn embedded_widget_size(&self) -> Option<Vec2> {
        Some(VALUE_FIELD_SIZE)
    }

    fn save(&self) -> serde_json::Value {
        serde_json::json!({ "number": self.value })
    }

    /// Accepts the number either as a JSON number or as numeric text
    fn restore(&mut self, state: &serde_json::Value) {
        let number = match state.get("number") {
            Some(serde_json::Value::String(text)) => text.trim().parse().ok(),
            Some(value) => value.as_f64(),
            None => None,
        };
        if let Some(number) = number {
            self.value = number;
        }
    }
}

/// Shows the number arriving on its input
#[derive(Debug, Clone, Default)]
pub struct NumberDisplay {
    value: Option<f64>,
}

impl NumberDisplay {
    /// Number currently shown
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Text of the display field; empty while disconnected
    pub fn text(&self) -> String {
        self.value.map(|value| value.to_string()).unwrap_or_default()
    }
}

impl NodeDelegateModel for NumberDisplay {
    fn name(&self) -> String {
        "NumberDisplay".to_string()
    }

    fn caption(&self) -> String {
        "Result".to_string()
    }

    fn n_ports(&self, port_type: PortType) -> u32 {
        u32::from(port_type == PortType::In)
    }

    fn data_type(&self, _port_type: PortType, _port_index: PortIndex) -> NodeDataType {
        decimal_type()
    }

    fn set_in_data(&mut self, data: Option<SharedNodeData>, _port_index: PortIndex) {
        self.value = data.as_ref().and_then(decimal_value);
    }

    fn out_data(&self, _port_index: PortIndex) -> Option<SharedNodeData> {
        None
    }

    fn embedded_widget_size(&self) -> Option<Vec2> {
        Some(VALUE_FIELD_SIZE)
    }
}

/// Arithmetic performed by a [`MathOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// a + b
    Addition,
    /// a - b
    Subtraction,
    /// a * b
    Multiplication,
    /// a / b
    Division,
}

impl Operation {
    /// Every operation, in registration order
    pub const ALL: [Operation; 4] = [
        Operation::Addition,
        Operation::Subtraction,
        Operation::Multiplication,
        Operation::Division,
    ];

    /// Registered node type name
    pub fn name(self) -> &'static str {
        match self {
            Operation::Addition => "Addition",
            Operation::Subtraction => "Subtraction",
            Operation::Multiplication => "Multiplication",
            Operation::Division => "Division",
        }
    }

    /// Apply to two operands; `None` when undefined
    pub fn apply(self, a: f64, b: f64) -> Option<f64> {
        match self {
            Operation::Addition => Some(a + b),
            Operation::Subtraction => Some(a - b),
            Operation::Multiplication => Some(a * b),
            Operation::Division if b == 0.0 => None,
            Operation::Division => Some(a / b),
        }
    }

    fn port_caption(self, port_type: PortType, port_index: PortIndex) -> Option<&'static str> {
        match (self, port_type, port_index.0) {
            (Operation::Subtraction, PortType::In, 0) => Some("Minuend"),
            (Operation::Subtraction, PortType::In, 1) => Some("Subtrahend"),
            (Operation::Division, PortType::In, 0) => Some("Dividend"),
            (Operation::Division, PortType::In, 1) => Some("Divisor"),
            (Operation::Subtraction | Operation::Division, PortType::Out, _) => Some("Result"),
            _ => None,
        }
    }
}

/// Binary operator node: two decimal inputs, one decimal output
#[derive(Debug, Clone)]
pub struct MathOperation {
    operation: Operation,
    operands: [Option<f64>; 2],
    result: Option<f64>,
    validation_message: Option<String>,
}

impl MathOperation {
    /// Operator node for `operation`
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            operands: [None, None],
            result: None,
            validation_message: None,
        }
    }

    /// Operation performed
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Last computed result
    pub fn result(&self) -> Option<f64> {
        self.result
    }

    /// Why no result is produced, when the inputs are complete but invalid
    pub fn validation_message(&self) -> Option<&str> {
        self.validation_message.as_deref()
    }

    fn compute(&mut self) {
        self.validation_message = None;
        self.result = match self.operands {
            [Some(a), Some(b)] => {
                let result = self.operation.apply(a, b);
                if result.is_none() {
                    self.validation_message = Some("Division by zero".to_string());
                }
                result
            }
            _ => None,
        };
    }
}

impl NodeDelegateModel for MathOperation {
    fn name(&self) -> String {
        self.operation.name().to_string()
    }

    fn n_ports(&self, port_type: PortType) -> u32 {
        match port_type {
            PortType::In => 2,
            PortType::Out => 1,
            PortType::None => 0,
        }
    }

    fn data_type(&self, _port_type: PortType, _port_index: PortIndex) -> NodeDataType {
        decimal_type()
    }

    fn port_caption(&self, port_type: PortType, port_index: PortIndex) -> String {
        self.operation
            .port_caption(port_type, port_index)
            .map_or_else(|| decimal_type().name, str::to_string)
    }

    fn port_caption_visible(&self, _port_type: PortType, _port_index: PortIndex) -> bool {
        true
    }

    fn set_in_data(&mut self, data: Option<SharedNodeData>, port_index: PortIndex) {
        if let Some(operand) = self.operands.get_mut(port_index.0 as usize) {
            *operand = data.as_ref().and_then(decimal_value);
        }
        self.compute();
    }

    fn out_data(&self, _port_index: PortIndex) -> Option<SharedNodeData> {
        self.result
            .map(|result| Rc::new(DecimalData(result)) as SharedNodeData)
    }
}

/// Create the calculator node registry
pub fn create_calculator_registry() -> NodeDelegateModelRegistry {
    let mut registry = NodeDelegateModelRegistry::new();

    registry.register_model::<NumberSource>("Sources");
    registry.register_model::<NumberDisplay>("Displays");

    for operation in Operation::ALL {
        registry.register_factory("Operators", move || Box::new(MathOperation::new(operation)));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;
    use crate::dataflow::DataFlowGraphModel;
    use crate::model::GraphModel;
    use crate::port::{PortRole, PortValue};
    use crate::node::NodeId;

    fn wire(out_node: NodeId, in_node: NodeId, in_port: u32) -> ConnectionId {
        ConnectionId::new(out_node, PortIndex(0), in_node, PortIndex(in_port))
    }

    fn shown(model: &DataFlowGraphModel, display: NodeId) -> Option<f64> {
        match model.port_data(display, PortType::In, PortIndex(0), PortRole::Data)? {
            PortValue::Data(data) => decimal_value(&data),
            _ => None,
        }
    }

    fn source(model: &mut DataFlowGraphModel, value: f64) -> NodeId {
        let node = model.add_node("NumberSource");
        model.update_delegate(node, |delegate| {
            delegate.restore(&serde_json::json!({ "number": value }));
        });
        node
    }

    #[test]
    fn test_registry_layout() {
        let registry = create_calculator_registry();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.categories(), vec!["Sources", "Displays", "Operators"]);
        assert_eq!(registry.category_of("Division"), Some("Operators"));
        assert_eq!(registry.create("Subtraction").unwrap().caption(), "Subtraction");
    }

    #[test]
    fn test_operations() {
        assert_eq!(Operation::Subtraction.apply(5.0, 3.0), Some(2.0));
        assert_eq!(Operation::Multiplication.apply(2.5, 4.0), Some(10.0));
        assert_eq!(Operation::Division.apply(1.0, 0.0), None);

        let mut division = MathOperation::new(Operation::Division);
        division.set_in_data(Some(Rc::new(DecimalData(1.0))), PortIndex(0));
        assert_eq!(division.validation_message(), None);
        division.set_in_data(Some(Rc::new(DecimalData(0.0))), PortIndex(1));
        assert_eq!(division.result(), None);
        assert!(division.validation_message().is_some());
        assert_eq!(division.port_caption(PortType::In, PortIndex(1)), "Divisor");
        assert_eq!(
            MathOperation::new(Operation::Addition).port_caption(PortType::In, PortIndex(0)),
            "Decimal"
        );
    }

    #[test]
    fn test_calculation_flows_to_display() {
        let mut model = DataFlowGraphModel::new(Rc::new(create_calculator_registry()));
        let a = source(&mut model, 3.0);
        let b = source(&mut model, 4.0);
        let add = model.add_node("Addition");
        let display = model.add_node("NumberDisplay");

        model.add_connection(wire(add, display, 0));
        model.add_connection(wire(a, add, 0));
        assert_eq!(shown(&model, display), None);

        model.add_connection(wire(b, add, 1));
        assert_eq!(shown(&model, display), Some(7.0));

        model.update_delegate(a, |delegate| {
            delegate.restore(&serde_json::json!({ "number": "10" }));
        });
        assert_eq!(shown(&model, display), Some(14.0));

        model.delete_connection(wire(b, add, 1));
        assert_eq!(shown(&model, display), None);
    }

    #[test]
    fn test_source_state_round_trip() {
        let mut restored = NumberSource::default();
        restored.restore(&NumberSource::new(2.5).save());
        assert_eq!(restored.value(), 2.5);

        restored.restore(&serde_json::json!({ "number": "not a number" }));
        assert_eq!(restored.value(), 2.5);
    }
}
