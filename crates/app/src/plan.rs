use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use texgraph_core::{
    builtin_kind_from_name, Link, NodeParams, OutputModule, ParamValue, PointInfo, Port, PortType,
    Procedure, RgbColor,
};

/// A procedure described as JSON: sinks, named modules with parameters, and
/// links between them.
#[derive(Debug, Deserialize)]
pub(crate) struct Plan {
    #[serde(default = "default_sinks")]
    sinks: Vec<PlanSink>,
    #[serde(default)]
    modules: Vec<PlanModule>,
    #[serde(default)]
    links: Vec<PlanLink>,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            sinks: default_sinks(),
            modules: Vec::new(),
            links: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlanSink {
    name: String,
    #[serde(rename = "type")]
    value_type: PortType,
    #[serde(default)]
    default: Option<SinkDefault>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SinkDefault {
    Number(f64),
    Color([f32; 3]),
}

#[derive(Debug, Deserialize)]
struct PlanModule {
    name: String,
    kind: String,
    #[serde(default)]
    position: [i32; 2],
    #[serde(default)]
    params: BTreeMap<String, ParamValue>,
}

#[derive(Debug, Deserialize)]
struct PlanLink {
    from: PlanSource,
    to: PlanTarget,
}

#[derive(Debug, Deserialize)]
struct PlanSource {
    module: String,
    #[serde(default)]
    output: PortRef,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanTarget {
    Input {
        module: String,
        #[serde(default)]
        input: PortRef,
    },
    Sink {
        sink: String,
    },
}

/// A port given by position or by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PortRef {
    Index(usize),
    Name(String),
}

impl Default for PortRef {
    fn default() -> Self {
        PortRef::Index(0)
    }
}

fn default_sinks() -> Vec<PlanSink> {
    vec![
        PlanSink {
            name: "value".to_string(),
            value_type: PortType::Number,
            default: None,
        },
        PlanSink {
            name: "color".to_string(),
            value_type: PortType::Color,
            default: None,
        },
    ]
}

pub(crate) fn load_plan(path: &Path) -> Result<Plan, String> {
    let data = std::fs::read(path).map_err(|err| err.to_string())?;
    serde_json::from_slice(&data).map_err(|err| err.to_string())
}

fn sink_outputs(plan: &Plan) -> Result<Vec<OutputModule>, String> {
    plan.sinks
        .iter()
        .map(|sink| match (sink.value_type, &sink.default) {
            (PortType::Number, None) => Ok(OutputModule::number(&sink.name, 0.0)),
            (PortType::Number, Some(SinkDefault::Number(value))) => {
                Ok(OutputModule::number(&sink.name, *value))
            }
            (PortType::Color, None) => Ok(OutputModule::color(&sink.name, RgbColor::BLACK)),
            (PortType::Color, Some(SinkDefault::Color(rgb))) => {
                Ok(OutputModule::color(&sink.name, RgbColor::from_array(*rgb)))
            }
            _ => Err(format!("sink {}: default does not match its type", sink.name)),
        })
        .collect()
}

fn port_index(ports: &[Port], port: &PortRef, module: &str) -> Result<usize, String> {
    match port {
        PortRef::Index(index) if *index < ports.len() => Ok(*index),
        PortRef::Index(index) => Err(format!("module {module} has no port {index}")),
        PortRef::Name(name) => ports
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| format!("module {module} has no port named {name}")),
    }
}

/// Builds the procedure a plan describes.
pub(crate) fn build(plan: &Plan) -> Result<Procedure, String> {
    let mut procedure = Procedure::new(sink_outputs(plan)?);
    let mut name_to_index = HashMap::new();

    for module in &plan.modules {
        let kind = builtin_kind_from_name(&module.kind)
            .ok_or_else(|| format!("unknown module kind {}", module.kind))?;
        let index = procedure.add_module(kind.create(), module.position);
        if name_to_index.insert(module.name.clone(), index).is_some() {
            return Err(format!("duplicate module name {}", module.name));
        }
        let params = NodeParams {
            values: module.params.clone(),
        };
        procedure
            .set_params(index, params)
            .map_err(|err| format!("module {}: {err}", module.name))?;
    }

    let lookup = |name: &str| {
        name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| format!("unknown module {name}"))
    };
    for link in &plan.links {
        let from = lookup(&link.from.module)?;
        let outputs = procedure.module(from).map(|m| m.outputs()).unwrap_or(&[]);
        let output = port_index(outputs, &link.from.output, &link.from.module)?;
        let resolved = match &link.to {
            PlanTarget::Input { module, input } => {
                let to = lookup(module)?;
                let inputs = procedure.module(to).map(|m| m.inputs()).unwrap_or(&[]);
                Link::to_input(from, output, to, port_index(inputs, input, module)?)
            }
            PlanTarget::Sink { sink } => {
                let index = procedure
                    .outputs()
                    .iter()
                    .position(|out| out.name == *sink)
                    .ok_or_else(|| format!("unknown sink {sink}"))?;
                Link::to_output(from, output, index)
            }
        };
        procedure
            .add_link(resolved)
            .map_err(|err| format!("link {} -> {:?}: {err}", link.from.module, link.to))?;
    }

    tracing::info!(
        "plan: built {} modules, {} links",
        procedure.module_count(),
        plan.links.len()
    );
    Ok(procedure)
}

/// Loads a binary procedure against the plan's sinks, ignoring its modules.
pub(crate) fn load_binary(plan: &Plan, bytes: &[u8]) -> Result<Procedure, String> {
    Procedure::from_bytes(sink_outputs(plan)?, bytes).map_err(|err| err.to_string())
}

#[derive(Debug, Serialize)]
pub(crate) struct SampleReport {
    point: [f64; 3],
    sinks: Vec<SinkReport>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SinkReport {
    Number {
        name: String,
        value: f64,
        error: f64,
        gradient: [f64; 3],
    },
    Color {
        name: String,
        color: [f32; 3],
    },
}

pub(crate) fn sample(procedure: &mut Procedure, point: &PointInfo) -> SampleReport {
    procedure.init_for_point(point);
    let sinks = procedure
        .outputs()
        .iter()
        .enumerate()
        .map(|(index, sink)| match sink.value_type {
            PortType::Number => SinkReport::Number {
                name: sink.name.clone(),
                value: procedure.output_value(index),
                error: procedure.output_error(index),
                gradient: procedure.output_gradient(index).to_array(),
            },
            PortType::Color => SinkReport::Color {
                name: sink.name.clone(),
                color: procedure.output_color(index).to_array(),
            },
        })
        .collect();
    SampleReport {
        point: [point.x, point.y, point.z],
        sinks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARBLE: &str = r#"{
        "modules": [
            {"name": "shape", "kind": "Expression",
             "params": {"expr": {"Text": "x * 2 + input1"}}},
            {"name": "offset", "kind": "Number", "params": {"value": {"Float": 0.5}}},
            {"name": "ramp", "kind": "Spectrum"}
        ],
        "links": [
            {"from": {"module": "offset"}, "to": {"module": "shape", "input": "input1"}},
            {"from": {"module": "shape"}, "to": {"sink": "value"}},
            {"from": {"module": "offset", "output": "Value"}, "to": {"module": "ramp"}},
            {"from": {"module": "ramp"}, "to": {"sink": "color"}}
        ]
    }"#;

    fn plan(json: &str) -> Plan {
        serde_json::from_str(json).expect("plan json")
    }

    fn number(report: &SampleReport, sink: usize) -> (f64, [f64; 3]) {
        match &report.sinks[sink] {
            SinkReport::Number {
                value, gradient, ..
            } => (*value, *gradient),
            other => panic!("expected a number, got {other:?}"),
        }
    }

    #[test]
    fn builds_and_samples_a_plan() {
        let mut procedure = build(&plan(MARBLE)).expect("build");
        let report = sample(&mut procedure, &PointInfo::new(1.0, 0.0, 0.0));
        let (value, gradient) = number(&report, 0);
        assert!((value - 2.5).abs() < 1e-9);
        assert!((gradient[0] - 2.0).abs() < 1e-9);
        match &report.sinks[1] {
            SinkReport::Color { color, .. } => assert!((color[0] - 0.5).abs() < 1e-6),
            other => panic!("expected a color, got {other:?}"),
        }
    }

    #[test]
    fn binary_round_trip_matches_the_plan() {
        let plan = plan(MARBLE);
        let mut built = build(&plan).expect("build");
        let bytes = built.to_bytes().expect("encode");
        let mut loaded = load_binary(&plan, &bytes).expect("load");
        let point = PointInfo::new(0.3, -0.2, 0.0);
        assert_eq!(
            number(&sample(&mut built, &point), 0),
            number(&sample(&mut loaded, &point), 0)
        );
    }

    #[test]
    fn reports_unknown_names() {
        let unknown_kind = r#"{"modules": [{"name": "a", "kind": "Teapot"}]}"#;
        assert!(build(&plan(unknown_kind))
            .expect_err("kind")
            .contains("Teapot"));

        let unknown_port = r#"{
            "modules": [{"name": "a", "kind": "Sum"}, {"name": "b", "kind": "Sum"}],
            "links": [{"from": {"module": "a"}, "to": {"module": "b", "input": "Value 9"}}]
        }"#;
        assert!(build(&plan(unknown_port))
            .expect_err("port")
            .contains("Value 9"));

        let unknown_sink = r#"{
            "modules": [{"name": "a", "kind": "Sum"}],
            "links": [{"from": {"module": "a"}, "to": {"sink": "roughness"}}]
        }"#;
        assert!(build(&plan(unknown_sink))
            .expect_err("sink")
            .contains("roughness"));
    }

    #[test]
    fn rejects_bad_parameters_and_feedback() {
        let bad_param = r#"{"modules": [
            {"name": "n", "kind": "Noise", "params": {"octaves": {"Int": 0}}}
        ]}"#;
        assert!(build(&plan(bad_param)).is_err());

        let cycle = r#"{
            "modules": [{"name": "a", "kind": "Sum"}, {"name": "b", "kind": "Sum"}],
            "links": [
                {"from": {"module": "a"}, "to": {"module": "b"}},
                {"from": {"module": "b"}, "to": {"module": "a"}}
            ]
        }"#;
        assert!(build(&plan(cycle)).expect_err("cycle").contains("feedback"));
    }

    #[test]
    fn custom_sinks_and_defaults() {
        let json = r#"{"sinks": [
            {"name": "height", "type": "number", "default": 0.25},
            {"name": "tint", "type": "color", "default": [0.1, 0.2, 0.3]}
        ]}"#;
        let mut procedure = build(&plan(json)).expect("build");
        let report = sample(&mut procedure, &PointInfo::default());
        assert_eq!(number(&report, 0).0, 0.25);

        let mismatch = r#"{"sinks": [{"name": "h", "type": "number", "default": [1, 2, 3]}]}"#;
        assert!(build(&plan(mismatch)).is_err());
    }
}
