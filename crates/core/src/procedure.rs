use std::slice;

use glam::DVec3;
use thiserror::Error;

use crate::math::RgbColor;
use crate::module::{Inputs, Module, Port, PortDefault, PortType};
use crate::params::{NodeParams, ParamError, ParamValue};
use crate::point::PointInfo;

/// One output port of one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Source {
    pub module: usize,
    pub output: usize,
}

impl Source {
    pub fn new(module: usize, output: usize) -> Self {
        Self { module, output }
    }
}

/// A module with its input wiring and editor position.
#[derive(Debug, Clone)]
pub struct ModuleSlot {
    pub(crate) module: Box<dyn Module>,
    pub(crate) inputs: Vec<Option<Source>>,
    pub(crate) position: [i32; 2],
}

impl ModuleSlot {
    pub(crate) fn new(module: Box<dyn Module>, position: [i32; 2]) -> Self {
        let inputs = vec![None; module.inputs().len()];
        Self {
            module,
            inputs,
            position,
        }
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    pub fn position(&self) -> [i32; 2] {
        self.position
    }

    pub fn input(&self, port: usize) -> Option<Source> {
        self.inputs.get(port).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkTarget {
    Input { module: usize, input: usize },
    /// A sink of the procedure.
    Output(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub from: Source,
    pub to: LinkTarget,
}

impl Link {
    pub fn to_input(from_module: usize, from_output: usize, module: usize, input: usize) -> Self {
        Self {
            from: Source::new(from_module, from_output),
            to: LinkTarget::Input { module, input },
        }
    }

    pub fn to_output(from_module: usize, from_output: usize, sink: usize) -> Self {
        Self {
            from: Source::new(from_module, from_output),
            to: LinkTarget::Output(sink),
        }
    }
}

/// A terminal of the procedure, such as a material's diffuse color.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputModule {
    pub name: String,
    pub value_type: PortType,
    pub default: PortDefault,
    source: Option<Source>,
}

impl OutputModule {
    pub fn number(name: impl Into<String>, default: f64) -> Self {
        Self {
            name: name.into(),
            value_type: PortType::Number,
            default: PortDefault::Number(default),
            source: None,
        }
    }

    pub fn color(name: impl Into<String>, default: RgbColor) -> Self {
        Self {
            name: name.into(),
            value_type: PortType::Color,
            default: PortDefault::Color(default),
            source: None,
        }
    }

    pub fn source(&self) -> Option<Source> {
        self.source
    }

    /// The same sink with nothing feeding it.
    pub fn unlinked(&self) -> Self {
        Self {
            source: None,
            ..self.clone()
        }
    }

    fn port(&self) -> Port {
        Port {
            name: "Input",
            value_type: self.value_type,
            default: self.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("module not found: {0}")]
    ModuleNotFound(usize),
    #[error("output not found: {0}")]
    OutputNotFound(usize),
    #[error("port not found: module {module}, port {port}")]
    PortNotFound { module: usize, port: usize },
    #[error("type mismatch on link: expected {expected:?}, got {got:?}")]
    TypeMismatch { expected: PortType, got: PortType },
    #[error("link would create a feedback loop")]
    Feedback,
    #[error("module {0} still has links")]
    ModuleHasLinks(usize),
    #[error(transparent)]
    Param(#[from] ParamError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    InProgress,
    Done,
}

/// A procedural texture: an arena of modules wired into a DAG that feeds a
/// fixed list of sinks.
///
/// Evaluation caches live inside the modules, so one procedure must not be
/// shared between threads; clone it instead.
#[derive(Debug, Clone, Default)]
pub struct Procedure {
    modules: Vec<ModuleSlot>,
    outputs: Vec<OutputModule>,
    point: PointInfo,
}

impl Procedure {
    pub fn new(outputs: Vec<OutputModule>) -> Self {
        Self {
            modules: Vec::new(),
            outputs,
            point: PointInfo::default(),
        }
    }

    pub fn outputs(&self) -> &[OutputModule] {
        &self.outputs
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module(&self, index: usize) -> Option<&dyn Module> {
        self.modules.get(index).map(ModuleSlot::module)
    }

    pub fn slots(&self) -> &[ModuleSlot] {
        &self.modules
    }

    pub fn set_position(&mut self, index: usize, position: [i32; 2]) -> Result<(), GraphError> {
        let slot = self
            .modules
            .get_mut(index)
            .ok_or(GraphError::ModuleNotFound(index))?;
        slot.position = position;
        Ok(())
    }

    pub fn add_module(&mut self, module: Box<dyn Module>, position: [i32; 2]) -> usize {
        self.modules.push(ModuleSlot::new(module, position));
        self.modules.len() - 1
    }

    /// Removes an unlinked module. Later modules shift down by one index.
    pub fn remove_module(&mut self, index: usize) -> Result<Box<dyn Module>, GraphError> {
        if index >= self.modules.len() {
            return Err(GraphError::ModuleNotFound(index));
        }
        let linked = self.links().any(|link| {
            link.from.module == index
                || matches!(link.to, LinkTarget::Input { module, .. } if module == index)
        });
        if linked {
            return Err(GraphError::ModuleHasLinks(index));
        }

        let removed = self.modules.remove(index);
        let renumber = |source: &mut Option<Source>| {
            if let Some(source) = source {
                if source.module > index {
                    source.module -= 1;
                }
            }
        };
        for slot in &mut self.modules {
            slot.inputs.iter_mut().for_each(renumber);
        }
        self.outputs
            .iter_mut()
            .for_each(|out| renumber(&mut out.source));
        tracing::debug!("removed module {} ({})", index, removed.module.kind().name());
        Ok(removed.module)
    }

    /// Every link, derived from the input wiring.
    pub fn links(&self) -> impl Iterator<Item = Link> + '_ {
        let inputs = self.modules.iter().enumerate().flat_map(|(module, slot)| {
            slot.inputs.iter().enumerate().filter_map(move |(input, source)| {
                source.map(|from| Link {
                    from,
                    to: LinkTarget::Input { module, input },
                })
            })
        });
        let sinks = self.outputs.iter().enumerate().filter_map(|(sink, out)| {
            out.source.map(|from| Link {
                from,
                to: LinkTarget::Output(sink),
            })
        });
        inputs.chain(sinks)
    }

    fn target_port(&self, target: LinkTarget) -> Result<Port, GraphError> {
        match target {
            LinkTarget::Input { module, input } => {
                let slot = self
                    .modules
                    .get(module)
                    .ok_or(GraphError::ModuleNotFound(module))?;
                slot.module
                    .inputs()
                    .get(input)
                    .copied()
                    .ok_or(GraphError::PortNotFound {
                        module,
                        port: input,
                    })
            }
            LinkTarget::Output(sink) => self
                .outputs
                .get(sink)
                .map(OutputModule::port)
                .ok_or(GraphError::OutputNotFound(sink)),
        }
    }

    fn wire(&mut self, target: LinkTarget) -> Result<&mut Option<Source>, GraphError> {
        match target {
            LinkTarget::Input { module, input } => self
                .modules
                .get_mut(module)
                .ok_or(GraphError::ModuleNotFound(module))?
                .inputs
                .get_mut(input)
                .ok_or(GraphError::PortNotFound {
                    module,
                    port: input,
                }),
            LinkTarget::Output(sink) => self
                .outputs
                .get_mut(sink)
                .map(|out| &mut out.source)
                .ok_or(GraphError::OutputNotFound(sink)),
        }
    }

    /// Checks that both ends of `link` exist and carry the same value type.
    fn validate(&self, link: Link) -> Result<(), GraphError> {
        let from = self
            .modules
            .get(link.from.module)
            .ok_or(GraphError::ModuleNotFound(link.from.module))?;
        let from_type = from
            .module
            .outputs()
            .get(link.from.output)
            .map(|port| port.value_type)
            .ok_or(GraphError::PortNotFound {
                module: link.from.module,
                port: link.from.output,
            })?;
        let to_type = self.target_port(link.to)?.value_type;
        if from_type != to_type {
            return Err(GraphError::TypeMismatch {
                expected: to_type,
                got: from_type,
            });
        }
        Ok(())
    }

    /// Connects `link.from` to `link.to`, replacing whatever fed that input.
    ///
    /// A link that would close a loop is rolled back and reported as
    /// [`GraphError::Feedback`]; the procedure is then unchanged.
    pub fn add_link(&mut self, link: Link) -> Result<(), GraphError> {
        self.validate(link)?;
        let previous = self.wire(link.to)?.replace(link.from);
        if matches!(link.to, LinkTarget::Input { .. }) && self.check_feedback() {
            *self.wire(link.to)? = previous;
            tracing::warn!("rejected link {:?} -> {:?}: feedback loop", link.from, link.to);
            return Err(GraphError::Feedback);
        }
        tracing::debug!("linked {:?} -> {:?}", link.from, link.to);
        Ok(())
    }

    /// Disconnects whatever feeds `target`, returning it.
    pub fn remove_link(&mut self, target: LinkTarget) -> Option<Source> {
        self.wire(target).ok()?.take()
    }

    /// Whether the wiring contains a cycle.
    ///
    /// Depth-first search from every sink and then every module; reaching a
    /// module that is still in progress means a loop.
    pub fn check_feedback(&self) -> bool {
        let mut state = vec![Visit::New; self.modules.len()];
        let roots = self
            .outputs
            .iter()
            .filter_map(|out| out.source.map(|source| source.module))
            .chain(0..self.modules.len());
        for root in roots {
            if self.visit_has_cycle(root, &mut state) {
                return true;
            }
        }
        false
    }

    fn visit_has_cycle(&self, root: usize, state: &mut [Visit]) -> bool {
        if state.get(root) != Some(&Visit::New) {
            return false;
        }
        // (module, next input to look at)
        let mut stack = vec![(root, 0usize)];
        state[root] = Visit::InProgress;
        while let Some((module, next)) = stack.pop() {
            let inputs = &self.modules[module].inputs;
            if next >= inputs.len() {
                state[module] = Visit::Done;
                continue;
            }
            stack.push((module, next + 1));
            let Some(source) = inputs[next] else {
                continue;
            };
            match state.get(source.module) {
                Some(Visit::InProgress) => return true,
                Some(Visit::New) => {
                    state[source.module] = Visit::InProgress;
                    stack.push((source.module, 0));
                }
                _ => {}
            }
        }
        false
    }

    /// Starts evaluation at `point`, clearing every module's caches.
    pub fn init_for_point(&mut self, point: &PointInfo) {
        self.point = *point;
        for slot in &mut self.modules {
            slot.module.init(point);
        }
    }

    fn with_sink<T>(&self, sink: usize, fallback: T, eval: impl FnOnce(&Inputs<'_>) -> T) -> T {
        let Some(out) = self.outputs.get(sink) else {
            return fallback;
        };
        let port = [out.port()];
        let inputs = Inputs::new(
            &self.modules,
            slice::from_ref(&out.source),
            &port,
            &self.point,
            None,
        );
        eval(&inputs)
    }

    /// Value feeding sink `sink` at the current point, without extra blur.
    pub fn output_value(&self, sink: usize) -> f64 {
        self.with_sink(sink, 0.0, |inputs| inputs.value(0, 0.0))
    }

    pub fn output_error(&self, sink: usize) -> f64 {
        self.with_sink(sink, 0.0, |inputs| inputs.error(0, 0.0))
    }

    pub fn output_gradient(&self, sink: usize) -> DVec3 {
        self.with_sink(sink, DVec3::ZERO, |inputs| inputs.gradient(0, 0.0))
    }

    pub fn output_color(&self, sink: usize) -> RgbColor {
        self.with_sink(sink, RgbColor::BLACK, |inputs| inputs.color(0, 0.0))
    }

    pub fn params(&self, module: usize) -> Option<NodeParams> {
        self.module(module).map(Module::params)
    }

    pub fn set_param(
        &mut self,
        module: usize,
        key: &str,
        value: ParamValue,
    ) -> Result<(), GraphError> {
        let slot = self
            .modules
            .get_mut(module)
            .ok_or(GraphError::ModuleNotFound(module))?;
        slot.module.set_param(key, value)?;
        Ok(())
    }

    /// Applies a whole parameter map to one module.
    ///
    /// Keys whose validation depends on another key (a brick's gap against
    /// its height) are retried after the others, so the map's order does not
    /// matter. Fails with the last rejection once a pass makes no progress,
    /// leaving the module as it was.
    pub fn set_params(&mut self, module: usize, params: NodeParams) -> Result<(), GraphError> {
        let slot = self
            .modules
            .get_mut(module)
            .ok_or(GraphError::ModuleNotFound(module))?;
        let mut updated = slot.module.duplicate();
        apply_params(updated.as_mut(), params)?;
        slot.module = updated;
        Ok(())
    }

    /// Replaces this procedure with an independent deep copy of `other`.
    pub fn copy_from(&mut self, other: &Procedure) {
        *self = other.clone();
    }

    /// Validates and wires `link` without the feedback check; callers that
    /// wire in bulk run [`Procedure::check_feedback`] once afterwards.
    pub(crate) fn connect_unchecked(&mut self, link: Link) -> Result<(), GraphError> {
        self.validate(link)?;
        *self.wire(link.to)? = Some(link.from);
        Ok(())
    }
}

pub(crate) fn apply_params(module: &mut dyn Module, params: NodeParams) -> Result<(), ParamError> {
    let mut pending: Vec<(String, ParamValue)> = params.values.into_iter().collect();
    while !pending.is_empty() {
        let attempted = pending.len();
        let mut rejected = None;
        let mut retry = Vec::new();
        for (key, value) in pending {
            if let Err(err) = module.set_param(&key, value.clone()) {
                rejected = Some(err);
                retry.push((key, value));
            }
        }
        if retry.len() == attempted {
            if let Some(err) = rejected {
                return Err(err);
            }
        }
        pending = retry;
    }
    Ok(())
}
