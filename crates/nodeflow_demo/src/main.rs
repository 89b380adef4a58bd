// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless calculator demo.
//!
//! Builds a small calculator graph, wires it with scripted pointer gestures
//! through the connection drafting state machine, logs the computed results
//! and writes the graph document.
//!
//! Usage: `nodeflow_demo [config.ron] [output.flow]`

use std::path::{Path, PathBuf};
use std::rc::Rc;

use egui::emath::TSTransform;
use egui::{Modifiers, Pos2};
use nodeflow_graph::graphs::calculator::{create_calculator_registry, decimal_value};
use nodeflow_graph::persistence::DOCUMENT_EXTENSION;
use nodeflow_graph::{
    BasicScene, ConfigError, DataFlowGraphModel, GraphModel, NodeDelegateModel, NodeId, NodeRole,
    NodeValue, PersistenceError, PortIndex, PortRole, PortType, PortValue, SceneConfig,
};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Demo failures
#[derive(Debug, Error)]
enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Script error: {0}")]
    Script(String),
}

type Scene = BasicScene<DataFlowGraphModel>;

const VIEW: TSTransform = TSTransform::IDENTITY;

/// Nodes of the demo graph
struct Calculator {
    first: NodeId,
    second: NodeId,
    addition: NodeId,
    division: NodeId,
    sum_display: NodeId,
    quotient_display: NodeId,
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nodeflow_graph=debug,nodeflow_demo=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting nodeflow demo v{}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let output_path = args
        .next()
        .map_or_else(|| PathBuf::from(format!("calculator.{DOCUMENT_EXTENSION}")), PathBuf::from);

    if let Err(e) = run(config_path.as_deref(), &output_path) {
        tracing::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

fn run(config_path: Option<&Path>, output_path: &Path) -> Result<(), DemoError> {
    let config = match config_path {
        Some(path) => SceneConfig::load(path)?,
        None => {
            let mut config = SceneConfig::default();
            config.connection_style.use_data_defined_colors = true;
            config
        }
    };

    let model = DataFlowGraphModel::new(Rc::new(create_calculator_registry()));
    let mut scene = BasicScene::with_config(model, config);
    let calculator = build_nodes(&mut scene);

    // (1.5 + 4) and (1.5 / 4)
    wire(&mut scene, calculator.first, 0, calculator.addition, 0)?;
    wire(&mut scene, calculator.second, 0, calculator.addition, 1)?;
    wire(&mut scene, calculator.addition, 0, calculator.sum_display, 0)?;
    wire(&mut scene, calculator.first, 0, calculator.division, 0)?;
    wire(&mut scene, calculator.second, 0, calculator.division, 1)?;
    wire(&mut scene, calculator.division, 0, calculator.quotient_display, 0)?;
    report(&scene, &calculator);

    // An occupied input refuses a second connection
    let from = anchor(&scene, calculator.division, PortType::Out, 0)?;
    let to = anchor(&scene, calculator.sum_display, PortType::In, 0)?;
    drag(&mut scene, from, to);
    tracing::info!(
        "After dropping onto an occupied input: {} connections",
        scene.model().connections().len()
    );

    // Editing a source propagates downstream
    scene.update_model(|model| {
        model.update_delegate(calculator.second, |delegate| {
            delegate.restore(&serde_json::json!({ "number": 0.0 }));
        })
    });
    report(&scene, &calculator);

    // Pick the quotient wire up by its input end and drop it on empty canvas
    let from = anchor(&scene, calculator.quotient_display, PortType::In, 0)?;
    drag(&mut scene, from, Pos2::new(900.0, 700.0));
    tracing::info!(
        "After detaching the quotient display: {} connections",
        scene.model().connections().len()
    );

    for signal in scene.take_signals() {
        tracing::debug!("Scene signal: {:?}", signal);
    }

    scene.model().save(output_path)?;
    tracing::info!("Wrote {}", output_path.display());
    Ok(())
}

fn build_nodes(scene: &mut Scene) -> Calculator {
    scene.update_model(|model| {
        let mut place = |name: &str, x: f32, y: f32| {
            let node_id = model.add_node(name);
            model.set_node_data(node_id, NodeRole::Position, NodeValue::Position(Pos2::new(x, y)));
            node_id
        };

        let calculator = Calculator {
            first: place("NumberSource", 0.0, 0.0),
            second: place("NumberSource", 0.0, 200.0),
            addition: place("Addition", 300.0, 0.0),
            division: place("Division", 300.0, 200.0),
            sum_display: place("NumberDisplay", 600.0, 0.0),
            quotient_display: place("NumberDisplay", 600.0, 200.0),
        };

        for (node_id, value) in [(calculator.first, 1.5), (calculator.second, 4.0)] {
            model.update_delegate(node_id, |delegate| {
                delegate.restore(&serde_json::json!({ "number": value }));
            });
        }
        calculator
    })
}

fn anchor(scene: &Scene, node_id: NodeId, port_type: PortType, port_index: u32) -> Result<Pos2, DemoError> {
    scene
        .port_scene_position(node_id, port_type, PortIndex(port_index))
        .ok_or_else(|| DemoError::Script(format!("node {node_id} is not in the scene")))
}

fn drag(scene: &mut Scene, from: Pos2, to: Pos2) {
    scene.mouse_press(from, &VIEW, Modifiers::NONE);
    scene.mouse_move(to, &VIEW);
    scene.mouse_release(to, &VIEW);
}

/// Drag from an output anchor to an input anchor and check the result
fn wire(
    scene: &mut Scene,
    out_node: NodeId,
    out_port: u32,
    in_node: NodeId,
    in_port: u32,
) -> Result<(), DemoError> {
    let from = anchor(scene, out_node, PortType::Out, out_port)?;
    let to = anchor(scene, in_node, PortType::In, in_port)?;
    drag(scene, from, to);

    let connected = scene
        .model()
        .connected_nodes(in_node, PortType::In, PortIndex(in_port))
        .contains(&(out_node, PortIndex(out_port)));
    if !connected {
        return Err(DemoError::Script(format!(
            "dragging {out_node}:{out_port} onto {in_node}:{in_port} did not connect"
        )));
    }
    Ok(())
}

fn displayed(scene: &Scene, display: NodeId) -> Option<f64> {
    match scene
        .model()
        .port_data(display, PortType::In, PortIndex(0), PortRole::Data)?
    {
        PortValue::Data(data) => decimal_value(&data),
        _ => None,
    }
}

fn report(scene: &Scene, calculator: &Calculator) {
    for (label, display) in [
        ("sum", calculator.sum_display),
        ("quotient", calculator.quotient_display),
    ] {
        let caption = scene
            .model()
            .delegate(display)
            .map(NodeDelegateModel::caption)
            .unwrap_or_default();
        match displayed(scene, display) {
            Some(value) => tracing::info!("{caption} ({label}): {value}"),
            None => tracing::info!("{caption} ({label}): no value"),
        }
    }
}
