// Box-filtered lattice patterns.
//
// Each axis contributes the fraction of its footprint covered by the
// pattern; axes combine as independent events. An output that is mixed over
// the footprint reports `min(v, 1 - v)` as its error.

use glam::DVec3;

use crate::math::{pulse_coverage, pulse_slope};
use crate::module::{Estimate, Inputs, Module, OutputCache, Port};
use crate::modules::coverage_error;
use crate::modules_builtin::ModuleKind;
use crate::params::{expect_float, NodeParams, ParamError, ParamValue};
use crate::point::Axis;

const XYZ: [Port; 3] = [
    Port::coordinate("X", Axis::X),
    Port::coordinate("Y", Axis::Y),
    Port::coordinate("Z", Axis::Z),
];
const XY: [Port; 2] = [Port::coordinate("X", Axis::X), Port::coordinate("Y", Axis::Y)];
const VALUE_OUT: [Port; 1] = [Port::number("Value", 0.0)];

fn is_mixed(coverage: f64) -> bool {
    coverage > 0.0 && coverage < 1.0
}

/// Alternating 0/1 unit cells: 1 where `floor(x) + floor(y) + floor(z)` is odd.
#[derive(Debug, Clone, Default)]
pub struct CheckerModule {
    cache: OutputCache,
}

impl CheckerModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let mut product = 1.0;
        let mut mixed = false;
        for axis in 0..3 {
            let input = inputs.estimate(axis, blur);
            let odd = pulse_coverage(input.value - 1.0, input.error, 2.0, 1.0);
            mixed |= is_mixed(odd);
            product *= 1.0 - 2.0 * odd;
        }
        let value = 0.5 - 0.5 * product;
        Estimate::new(value, coverage_error(value, mixed))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let mut factors = [1.0; 3];
        let mut slopes = [0.0; 3];
        for axis in 0..3 {
            let input = inputs.estimate(axis, blur);
            let odd = pulse_coverage(input.value - 1.0, input.error, 2.0, 1.0);
            factors[axis] = 1.0 - 2.0 * odd;
            slopes[axis] = pulse_slope(input.value - 1.0, input.error, 2.0, 1.0);
        }
        let mut gradient = DVec3::ZERO;
        for axis in 0..3 {
            if slopes[axis] == 0.0 {
                continue;
            }
            let others: f64 = (0..3).filter(|&j| j != axis).map(|j| factors[j]).product();
            gradient += inputs.gradient(axis, blur) * (slopes[axis] * others);
        }
        gradient
    }
}

impl Module for CheckerModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Checker
    }

    fn inputs(&self) -> &[Port] {
        &XYZ
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

/// Lines of `width` centered on multiples of `spacing` along every axis;
/// 1 on a line, 0 between lines.
#[derive(Debug, Clone)]
pub struct GridModule {
    spacing: f64,
    width: f64,
    cache: OutputCache,
}

impl Default for GridModule {
    fn default() -> Self {
        Self {
            spacing: 1.0,
            width: 0.1,
            cache: OutputCache::default(),
        }
    }
}

impl GridModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let mut empty = 1.0;
        let mut mixed = false;
        for axis in 0..3 {
            let input = inputs.estimate(axis, blur);
            let line = pulse_coverage(
                input.value + 0.5 * self.width,
                input.error,
                self.spacing,
                self.width,
            );
            mixed |= is_mixed(line);
            empty *= 1.0 - line;
        }
        let value = 1.0 - empty;
        Estimate::new(value, coverage_error(value, mixed))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let mut gaps = [1.0; 3];
        let mut slopes = [0.0; 3];
        for axis in 0..3 {
            let input = inputs.estimate(axis, blur);
            let x = input.value + 0.5 * self.width;
            gaps[axis] = 1.0 - pulse_coverage(x, input.error, self.spacing, self.width);
            slopes[axis] = pulse_slope(x, input.error, self.spacing, self.width);
        }
        let mut gradient = DVec3::ZERO;
        for axis in 0..3 {
            if slopes[axis] == 0.0 {
                continue;
            }
            let others: f64 = (0..3).filter(|&j| j != axis).map(|j| gaps[j]).product();
            gradient += inputs.gradient(axis, blur) * (slopes[axis] * others);
        }
        gradient
    }
}

impl Module for GridModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Grid
    }

    fn inputs(&self) -> &[Port] {
        &XYZ
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();

    fn params(&self) -> NodeParams {
        NodeParams::new()
            .with("spacing", ParamValue::Float(self.spacing))
            .with("width", ParamValue::Float(self.width))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        let (mut spacing, mut width) = (self.spacing, self.width);
        match key {
            "spacing" => spacing = expect_float(key, &value)?,
            "width" => width = expect_float(key, &value)?,
            _ => return Err(ParamError::Unknown(key.to_string())),
        }
        if spacing <= 0.0 {
            return Err(ParamError::invalid(key, "spacing must be positive"));
        }
        if !(0.0..=spacing).contains(&width) {
            return Err(ParamError::invalid(key, "width must lie in [0, spacing]"));
        }
        self.spacing = spacing;
        self.width = width;
        self.cache.clear();
        Ok(())
    }
}

/// Running-bond brick wall in the XY plane: bricks are one unit long and
/// `height` tall, each row shifted by `offset`. 1 in mortar, 0 in brick.
#[derive(Debug, Clone)]
pub struct BrickModule {
    height: f64,
    gap: f64,
    offset: f64,
    cache: OutputCache,
}

impl Default for BrickModule {
    fn default() -> Self {
        Self {
            height: 0.5,
            gap: 0.1,
            offset: 0.5,
            cache: OutputCache::default(),
        }
    }
}

impl BrickModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (x, y) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let row = (y.value / self.height).floor();
        let bed = pulse_coverage(y.value, y.error, self.height, self.gap);
        let head = pulse_coverage(x.value - row * self.offset, x.error, 1.0, self.gap);
        let value = 1.0 - (1.0 - bed) * (1.0 - head);
        Estimate::new(value, coverage_error(value, is_mixed(bed) || is_mixed(head)))
    }

    // The row shift is piecewise constant in y and contributes nothing.
    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (x, y) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let shifted = x.value - (y.value / self.height).floor() * self.offset;
        let bed = pulse_coverage(y.value, y.error, self.height, self.gap);
        let head = pulse_coverage(shifted, x.error, 1.0, self.gap);
        let bed_slope = pulse_slope(y.value, y.error, self.height, self.gap);
        let head_slope = pulse_slope(shifted, x.error, 1.0, self.gap);
        let mut gradient = DVec3::ZERO;
        if head_slope != 0.0 {
            gradient += inputs.gradient(0, blur) * (head_slope * (1.0 - bed));
        }
        if bed_slope != 0.0 {
            gradient += inputs.gradient(1, blur) * (bed_slope * (1.0 - head));
        }
        gradient
    }
}

impl Module for BrickModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Brick
    }

    fn inputs(&self) -> &[Port] {
        &XY
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();

    fn params(&self) -> NodeParams {
        NodeParams::new()
            .with("height", ParamValue::Float(self.height))
            .with("gap", ParamValue::Float(self.gap))
            .with("offset", ParamValue::Float(self.offset))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        let (mut height, mut gap, mut offset) = (self.height, self.gap, self.offset);
        match key {
            "height" => height = expect_float(key, &value)?,
            "gap" => gap = expect_float(key, &value)?,
            "offset" => offset = expect_float(key, &value)?,
            _ => return Err(ParamError::Unknown(key.to_string())),
        }
        if height <= 0.0 {
            return Err(ParamError::invalid(key, "height must be positive"));
        }
        if gap < 0.0 || gap >= height.min(1.0) {
            return Err(ParamError::invalid(
                key,
                "gap must lie in [0, min(1, height))",
            ));
        }
        self.height = height;
        self.gap = gap;
        self.offset = offset;
        self.cache.clear();
        Ok(())
    }
}
