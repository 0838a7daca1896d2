use std::cell::Cell;
use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::math::RgbColor;
use crate::modules_builtin::ModuleKind;
use crate::params::{NodeParams, ParamError, ParamValue};
use crate::point::{Axis, PointInfo};
use crate::procedure::{ModuleSlot, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    Number,
    Color,
}

/// What an unconnected input port evaluates to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortDefault {
    Number(f64),
    Color(RgbColor),
    /// The query point's coordinate, with the footprint as its error.
    Coordinate(Axis),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Port {
    pub name: &'static str,
    pub value_type: PortType,
    pub default: PortDefault,
}

impl Port {
    pub const fn number(name: &'static str, default: f64) -> Self {
        Self {
            name,
            value_type: PortType::Number,
            default: PortDefault::Number(default),
        }
    }

    pub const fn color(name: &'static str, default: RgbColor) -> Self {
        Self {
            name,
            value_type: PortType::Color,
            default: PortDefault::Color(default),
        }
    }

    pub const fn coordinate(name: &'static str, axis: Axis) -> Self {
        Self {
            name,
            value_type: PortType::Number,
            default: PortDefault::Coordinate(axis),
        }
    }
}

/// Value plus the half-width of its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Estimate {
    pub value: f64,
    pub error: f64,
}

impl Estimate {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }

    pub fn exact(value: f64) -> Self {
        Self { value, error: 0.0 }
    }
}

/// Per-point cache slot keyed by the exact blur it was computed for.
#[derive(Debug, Clone)]
pub struct Memo<T: Copy> {
    slot: Cell<Option<(u64, T)>>,
}

impl<T: Copy> Default for Memo<T> {
    fn default() -> Self {
        Self {
            slot: Cell::new(None),
        }
    }
}

impl<T: Copy> Memo<T> {
    pub fn get_or_compute(&self, blur: f64, compute: impl FnOnce() -> T) -> T {
        let key = blur.to_bits();
        if let Some((cached, value)) = self.slot.get() {
            if cached == key {
                return value;
            }
        }
        let value = compute();
        self.slot.set(Some((key, value)));
        value
    }

    pub fn clear(&mut self) {
        *self.slot.get_mut() = None;
    }

    pub fn is_cached(&self, blur: f64) -> bool {
        matches!(self.slot.get(), Some((key, _)) if key == blur.to_bits())
    }
}

/// Caches of one numeric output: value with its error, and the gradient.
#[derive(Debug, Clone, Default)]
pub struct OutputCache {
    pub estimate: Memo<Estimate>,
    pub gradient: Memo<DVec3>,
}

impl OutputCache {
    pub fn clear(&mut self) {
        self.estimate.clear();
        self.gradient.clear();
    }
}

pub trait DuplicateModule {
    /// Deep copy with independent identity and caches.
    fn duplicate(&self) -> Box<dyn Module>;
}

impl<T> DuplicateModule for T
where
    T: Module + Clone + 'static,
{
    fn duplicate(&self) -> Box<dyn Module> {
        let mut copy = self.clone();
        copy.init(&PointInfo::default());
        Box::new(copy)
    }
}

/// A node of a procedure.
///
/// `init` is called once per query point before any of the evaluation
/// methods; the evaluation methods may be called in any order and any number
/// of times afterwards and must return identical results for identical
/// `(which, blur)` until the next `init`. Evaluation never fails: unconnected
/// inputs resolve to their port default and degenerate arithmetic follows
/// each kind's documented numeric policy.
pub trait Module: DuplicateModule + fmt::Debug + Send {
    fn kind(&self) -> ModuleKind;

    fn inputs(&self) -> &[Port] {
        &[]
    }

    fn outputs(&self) -> &[Port];

    /// Starts a new query point, invalidating every cached result.
    fn init(&mut self, _point: &PointInfo) {}

    fn average_value(&self, _inputs: &Inputs<'_>, _which: usize, _blur: f64) -> f64 {
        0.0
    }

    /// Non-negative half-width of the value's uncertainty over the footprint.
    fn value_error(&self, _inputs: &Inputs<'_>, _which: usize, _blur: f64) -> f64 {
        0.0
    }

    /// Spatial gradient of the value with respect to x, y and z.
    fn value_gradient(&self, _inputs: &Inputs<'_>, _which: usize, _blur: f64) -> DVec3 {
        DVec3::ZERO
    }

    fn color(&self, _inputs: &Inputs<'_>, _which: usize, _blur: f64) -> RgbColor {
        RgbColor::BLACK
    }

    fn params(&self) -> NodeParams {
        NodeParams::default()
    }

    /// Validates and applies one parameter. On error nothing changes.
    fn set_param(&mut self, key: &str, _value: ParamValue) -> Result<(), ParamError> {
        Err(ParamError::Unknown(key.to_string()))
    }
}

impl Clone for Box<dyn Module> {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

/// A module's view of its direct predecessors during one evaluation.
#[derive(Clone, Copy)]
pub struct Inputs<'a> {
    slots: &'a [ModuleSlot],
    wiring: &'a [Option<Source>],
    ports: &'a [Port],
    point: &'a PointInfo,
    outer: Option<&'a Inputs<'a>>,
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(
        slots: &'a [ModuleSlot],
        wiring: &'a [Option<Source>],
        ports: &'a [Port],
        point: &'a PointInfo,
        outer: Option<&'a Inputs<'a>>,
    ) -> Self {
        Self {
            slots,
            wiring,
            ports,
            point,
            outer,
        }
    }

    pub fn point(&self) -> &'a PointInfo {
        self.point
    }

    /// The inputs of the module that owns the sub-graph being evaluated.
    pub fn outer(&self) -> Option<&'a Inputs<'a>> {
        self.outer
    }

    pub fn is_connected(&self, port: usize) -> bool {
        self.source(port).is_some()
    }

    fn source(&self, port: usize) -> Option<(&'a dyn Module, usize, Inputs<'a>)> {
        let source = (*self.wiring.get(port)?)?;
        let slot = self.slots.get(source.module)?;
        let upstream = Inputs::new(
            self.slots,
            &slot.inputs,
            slot.module.inputs(),
            self.point,
            self.outer,
        );
        Some((slot.module.as_ref(), source.output, upstream))
    }

    fn default_for(&self, port: usize) -> PortDefault {
        self.ports
            .get(port)
            .map(|p| p.default)
            .unwrap_or(PortDefault::Number(0.0))
    }

    pub fn value(&self, port: usize, blur: f64) -> f64 {
        if let Some((module, output, upstream)) = self.source(port) {
            return module.average_value(&upstream, output, blur);
        }
        match self.default_for(port) {
            PortDefault::Number(value) => value,
            PortDefault::Color(color) => f64::from(color.luminance()),
            PortDefault::Coordinate(axis) => self.point.coordinate(axis),
        }
    }

    pub fn error(&self, port: usize, blur: f64) -> f64 {
        if let Some((module, output, upstream)) = self.source(port) {
            return module.value_error(&upstream, output, blur);
        }
        match self.default_for(port) {
            PortDefault::Coordinate(axis) => self.point.coordinate_error(axis, blur),
            _ => 0.0,
        }
    }

    pub fn gradient(&self, port: usize, blur: f64) -> DVec3 {
        if let Some((module, output, upstream)) = self.source(port) {
            return module.value_gradient(&upstream, output, blur);
        }
        match self.default_for(port) {
            PortDefault::Coordinate(axis) => axis.unit(),
            _ => DVec3::ZERO,
        }
    }

    pub fn color(&self, port: usize, blur: f64) -> RgbColor {
        if let Some((module, output, upstream)) = self.source(port) {
            return module.color(&upstream, output, blur);
        }
        match self.default_for(port) {
            PortDefault::Color(color) => color,
            PortDefault::Number(value) => RgbColor::gray(value as f32),
            PortDefault::Coordinate(axis) => RgbColor::gray(self.point.coordinate(axis) as f32),
        }
    }

    pub fn estimate(&self, port: usize, blur: f64) -> Estimate {
        Estimate::new(self.value(port, blur), self.error(port, blur))
    }
}
