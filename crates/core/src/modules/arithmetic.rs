// Closed-form arithmetic on one or two numeric inputs.

use glam::DVec3;

use crate::math::{
    box_average, quadrature_approx, saturate, saturate_vec, sawtooth, sawtooth_antiderivative,
    smoothed_slope,
};
use crate::module::{Estimate, Inputs, Module, OutputCache, Port};
use crate::modules_builtin::ModuleKind;
use crate::params::{expect_float, NodeParams, ParamError, ParamValue};

const VALUE_OUT: [Port; 1] = [Port::number("Value", 0.0)];
const TWO_ZEROS: [Port; 2] = [Port::number("Value 1", 0.0), Port::number("Value 2", 0.0)];
const TWO_ONES: [Port; 2] = [Port::number("Value 1", 1.0), Port::number("Value 2", 1.0)];
const SINGLE: [Port; 1] = [Port::number("Input", 0.0)];

#[derive(Debug, Clone, Default)]
pub struct SumModule {
    cache: OutputCache,
}

impl SumModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (a, b) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        Estimate::new(saturate(a.value + b.value), quadrature_approx(a.error, b.error))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        inputs.gradient(0, blur) + inputs.gradient(1, blur)
    }
}

impl Module for SumModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Sum
    }

    fn inputs(&self) -> &[Port] {
        &TWO_ZEROS
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

#[derive(Debug, Clone, Default)]
pub struct DifferenceModule {
    cache: OutputCache,
}

impl DifferenceModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (a, b) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        Estimate::new(saturate(a.value - b.value), quadrature_approx(a.error, b.error))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        inputs.gradient(0, blur) - inputs.gradient(1, blur)
    }
}

impl Module for DifferenceModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Difference
    }

    fn inputs(&self) -> &[Port] {
        &TWO_ZEROS
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

#[derive(Debug, Clone, Default)]
pub struct ProductModule {
    cache: OutputCache,
}

impl ProductModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (a, b) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let error = b.value.abs() * a.error + a.value.abs() * b.error + a.error * b.error;
        Estimate::new(saturate(a.value * b.value), saturate(error))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (a, b) = (inputs.value(0, blur), inputs.value(1, blur));
        saturate_vec(inputs.gradient(0, blur) * b + inputs.gradient(1, blur) * a)
    }
}

impl Module for ProductModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Product
    }

    fn inputs(&self) -> &[Port] {
        &TWO_ONES
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

/// `Value 1 / Value 2`.
///
/// A zero denominator yields `±f64::MAX` (sign of the numerator) with error
/// `f64::MAX`; a denominator whose uncertainty reaches zero also reports
/// error `f64::MAX`.
#[derive(Debug, Clone, Default)]
pub struct RatioModule {
    cache: OutputCache,
}

impl RatioModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (a, b) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        if b.value == 0.0 {
            let sign = if a.value < 0.0 { -1.0 } else { 1.0 };
            return Estimate::new(sign * f64::MAX, f64::MAX);
        }
        let ratio = a.value / b.value;
        let error = if b.error >= b.value.abs() {
            f64::MAX
        } else {
            saturate((a.error + ratio.abs() * b.error) / b.value.abs())
        };
        Estimate::new(saturate(ratio), error)
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (a, b) = (inputs.value(0, blur), inputs.value(1, blur));
        if b == 0.0 {
            return DVec3::ZERO;
        }
        saturate_vec((inputs.gradient(0, blur) - inputs.gradient(1, blur) * (a / b)) / b)
    }
}

impl Module for RatioModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Ratio
    }

    fn inputs(&self) -> &[Port] {
        &TWO_ONES
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

const MOD_INPUTS: [Port; 2] = [Port::number("Value", 0.0), Port::number("Modulus", 1.0)];

/// Sawtooth `Value mod |Modulus|` in `[0, |Modulus|)`; a zero modulus gives 0.
#[derive(Debug, Clone, Default)]
pub struct ModModule {
    cache: OutputCache,
}

impl ModModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (a, b) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let m = b.value.abs();
        if m == 0.0 {
            return Estimate::exact(0.0);
        }
        let (x, e) = (a.value, a.error);
        let value = box_average(
            x,
            e,
            |v| sawtooth(v, m),
            |v| sawtooth_antiderivative(v, m),
        );
        let crosses = 2.0 * e >= m || ((x - e) / m).floor() != ((x + e) / m).floor();
        let error = if crosses { 0.5 * m } else { e };
        let modulus_error = (x / m).floor().abs() * b.error;
        Estimate::new(value, saturate(error + modulus_error))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (a, b) = (inputs.estimate(0, blur), inputs.value(1, blur));
        let m = b.abs();
        if m == 0.0 {
            return DVec3::ZERO;
        }
        let slope = smoothed_slope(a.value, a.error, |v| sawtooth(v, m), |_| 1.0);
        let modulus_slope = -(a.value / m).floor() * b.signum();
        saturate_vec(inputs.gradient(0, blur) * slope + inputs.gradient(1, blur) * modulus_slope)
    }
}

impl Module for ModModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Mod
    }

    fn inputs(&self) -> &[Port] {
        &MOD_INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

const POWER_INPUTS: [Port; 2] = [Port::number("Base", 0.0), Port::number("Exponent", 1.0)];

fn is_integer(p: f64) -> bool {
    p.fract() == 0.0
}

/// `x^p`, mirrored to `-(|x|^p)` for a negative base and non-integer exponent.
fn power_raw(x: f64, p: f64) -> f64 {
    if x < 0.0 && !is_integer(p) {
        -(-x).powf(p)
    } else {
        x.powf(p)
    }
}

fn power_slope(x: f64, p: f64) -> f64 {
    if p == 0.0 {
        0.0
    } else if is_integer(p) {
        p * x.powf(p - 1.0)
    } else {
        p * x.abs().powf(p - 1.0)
    }
}

fn power_antiderivative(x: f64, p: f64) -> f64 {
    let q = p + 1.0;
    if is_integer(p) {
        x.powf(q) / q
    } else {
        x.abs().powf(q) / q
    }
}

/// The integral over the interval exists and has a closed form.
fn power_integrable(x: f64, e: f64, p: f64) -> bool {
    (p + 1.0).abs() > 1e-9 && (p > -1.0 || x.abs() > e)
}

/// `Base ^ Exponent`.
///
/// Zero base with a negative exponent saturates to `f64::MAX`; errors use the
/// first-order derivative and saturate where it is singular.
#[derive(Debug, Clone, Default)]
pub struct PowerModule {
    cache: OutputCache,
}

impl PowerModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (base, exponent) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let (x, e, p) = (base.value, base.error, exponent.value);
        let value = if power_integrable(x, e, p) {
            box_average(
                x,
                e,
                |v| power_raw(v, p),
                |v| power_antiderivative(v, p),
            )
        } else {
            power_raw(x, p)
        };
        let base_error = saturate((power_slope(x, p) * e).abs());
        let exponent_error = if x == 0.0 || exponent.error == 0.0 {
            0.0
        } else {
            saturate((power_raw(x, p) * x.abs().ln() * exponent.error).abs())
        };
        Estimate::new(saturate(value), saturate(base_error + exponent_error))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let base = inputs.estimate(0, blur);
        let (x, e, p) = (base.value, base.error, inputs.value(1, blur));
        let slope = if power_integrable(x, e, p) {
            smoothed_slope(x, e, |v| power_raw(v, p), |v| power_slope(v, p))
        } else {
            power_slope(x, p)
        };
        let mut gradient = inputs.gradient(0, blur) * saturate(slope);
        if x != 0.0 {
            gradient += inputs.gradient(1, blur) * (power_raw(x, p) * x.abs().ln());
        }
        saturate_vec(gradient)
    }
}

impl Module for PowerModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Power
    }

    fn inputs(&self) -> &[Port] {
        &POWER_INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct AbsModule {
    cache: OutputCache,
}

impl AbsModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let input = inputs.estimate(0, blur);
        let (x, e) = (input.value, input.error);
        let value = box_average(x, e, f64::abs, |v| 0.5 * v * v.abs());
        let error = 0.5 * ((x.abs() + e) - (x.abs() - e).max(0.0));
        Estimate::new(value, error)
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let input = inputs.estimate(0, blur);
        inputs.gradient(0, blur) * smoothed_slope(input.value, input.error, f64::abs, sign)
    }
}

impl Module for AbsModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Abs
    }

    fn inputs(&self) -> &[Port] {
        &SINGLE
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

/// Clamps its input to `[min, max]`; locally flat (zero gradient) outside.
#[derive(Debug, Clone)]
pub struct ClipModule {
    min: f64,
    max: f64,
    cache: OutputCache,
}

impl Default for ClipModule {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            cache: OutputCache::default(),
        }
    }
}

impl ClipModule {
    /// Rejects `min > max`, like the `min`/`max` parameters.
    pub fn new(min: f64, max: f64) -> Result<Self, ParamError> {
        if min > max {
            return Err(ParamError::invalid("min", "min must not exceed max"));
        }
        Ok(Self {
            min,
            max,
            cache: OutputCache::default(),
        })
    }

    fn clip(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }

    fn antiderivative(&self, v: f64) -> f64 {
        let (lo, hi) = (self.min, self.max);
        if v < lo {
            lo * v
        } else if v <= hi {
            0.5 * (v * v + lo * lo)
        } else {
            0.5 * (hi * hi + lo * lo) + hi * (v - hi)
        }
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let input = inputs.estimate(0, blur);
        let (x, e) = (input.value, input.error);
        let value = box_average(x, e, |v| self.clip(v), |v| self.antiderivative(v));
        let error = 0.5 * (self.clip(x + e) - self.clip(x - e));
        Estimate::new(value, error)
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let input = inputs.estimate(0, blur);
        let slope = smoothed_slope(
            input.value,
            input.error,
            |v| self.clip(v),
            |v| {
                if v > self.min && v < self.max {
                    1.0
                } else {
                    0.0
                }
            },
        );
        inputs.gradient(0, blur) * slope
    }
}

impl Module for ClipModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Clip
    }

    fn inputs(&self) -> &[Port] {
        &SINGLE
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();

    fn params(&self) -> NodeParams {
        NodeParams::new()
            .with("min", ParamValue::Float(self.min))
            .with("max", ParamValue::Float(self.max))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        let value = match key {
            "min" | "max" => expect_float(key, &value)?,
            _ => return Err(ParamError::Unknown(key.to_string())),
        };
        let (min, max) = if key == "min" {
            (value, self.max)
        } else {
            (self.min, value)
        };
        if min > max {
            return Err(ParamError::invalid(key, "min must not exceed max"));
        }
        self.min = min;
        self.max = max;
        self.cache.clear();
        Ok(())
    }
}

/// `scale * input + shift`.
#[derive(Debug, Clone)]
pub struct ScaleShiftModule {
    scale: f64,
    shift: f64,
    cache: OutputCache,
}

impl Default for ScaleShiftModule {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl ScaleShiftModule {
    pub fn new(scale: f64, shift: f64) -> Self {
        Self {
            scale,
            shift,
            cache: OutputCache::default(),
        }
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let input = inputs.estimate(0, blur);
        Estimate::new(
            saturate(self.scale * input.value + self.shift),
            saturate(self.scale.abs() * input.error),
        )
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        inputs.gradient(0, blur) * self.scale
    }
}

impl Module for ScaleShiftModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::ScaleShift
    }

    fn inputs(&self) -> &[Port] {
        &SINGLE
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();

    fn params(&self) -> NodeParams {
        NodeParams::new()
            .with("scale", ParamValue::Float(self.scale))
            .with("shift", ParamValue::Float(self.shift))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "scale" => self.scale = expect_float(key, &value)?,
            "shift" => self.shift = expect_float(key, &value)?,
            _ => return Err(ParamError::Unknown(key.to_string())),
        }
        self.cache.clear();
        Ok(())
    }
}

const INTERPOLATE_INPUTS: [Port; 3] = [
    Port::number("Value 1", 0.0),
    Port::number("Value 2", 1.0),
    Port::number("Fraction", 0.5),
];

/// Linear interpolation with the fraction clamped to `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct InterpolateModule {
    cache: OutputCache,
}

impl InterpolateModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (a, b, t) = (
            inputs.estimate(0, blur),
            inputs.estimate(1, blur),
            inputs.estimate(2, blur),
        );
        let f = t.value.clamp(0.0, 1.0);
        let mut error = (1.0 - f) * a.error + f * b.error;
        if t.value > 0.0 && t.value < 1.0 {
            error += (b.value - a.value).abs() * t.error;
        }
        Estimate::new(
            saturate(a.value + f * (b.value - a.value)),
            saturate(error),
        )
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let t = inputs.value(2, blur);
        let f = t.clamp(0.0, 1.0);
        let mut gradient = inputs.gradient(0, blur) * (1.0 - f) + inputs.gradient(1, blur) * f;
        if t > 0.0 && t < 1.0 {
            let span = inputs.value(1, blur) - inputs.value(0, blur);
            gradient += inputs.gradient(2, blur) * span;
        }
        saturate_vec(gradient)
    }
}

impl Module for InterpolateModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Interpolate
    }

    fn inputs(&self) -> &[Port] {
        &INTERPOLATE_INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

const BLUR_INPUTS: [Port; 2] = [Port::number("Value", 0.0), Port::number("Blur", 0.0)];

/// Re-evaluates its first input with extra blur taken from the second.
#[derive(Debug, Clone, Default)]
pub struct BlurModule {
    cache: OutputCache,
}

impl BlurModule {
    fn widened(&self, inputs: &Inputs<'_>, blur: f64) -> f64 {
        blur + inputs.value(1, blur).max(0.0)
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        inputs.estimate(0, self.widened(inputs, blur))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        inputs.gradient(0, self.widened(inputs, blur))
    }
}

impl Module for BlurModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Blur
    }

    fn inputs(&self) -> &[Port] {
        &BLUR_INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{assert_close, input, wired};
    use crate::modules::{CoordinateModule, NumberModule};
    use crate::point::{Axis, PointInfo};
    use crate::procedure::{Link, Procedure};

    fn number(value: f64) -> Option<Box<dyn Module>> {
        input(NumberModule::new(value))
    }

    fn evaluate(
        target: impl Module + 'static,
        upstream: Vec<Option<Box<dyn Module>>>,
    ) -> Procedure {
        let mut procedure = wired(Box::new(target), upstream);
        procedure.init_for_point(&PointInfo::default());
        procedure
    }

    /// Sum or difference of `2x` and `-3y`, so both gradients are non-trivial.
    fn linear_pair(target: impl Module + 'static) -> Procedure {
        let mut procedure = Procedure::new(crate::modules::testing::sinks());
        let x = procedure.add_module(Box::new(CoordinateModule::new(Axis::X)), [0, 0]);
        let y = procedure.add_module(Box::new(CoordinateModule::new(Axis::Y)), [0, 0]);
        let sx = procedure.add_module(Box::new(ScaleShiftModule::new(2.0, 0.0)), [0, 0]);
        let sy = procedure.add_module(Box::new(ScaleShiftModule::new(-3.0, 1.0)), [0, 0]);
        let op = procedure.add_module(Box::new(target), [0, 0]);
        for link in [
            Link::to_input(x, 0, sx, 0),
            Link::to_input(y, 0, sy, 0),
            Link::to_input(sx, 0, op, 0),
            Link::to_input(sy, 0, op, 1),
            Link::to_output(op, 0, 0),
        ] {
            procedure.add_link(link).expect("link");
        }
        procedure.init_for_point(&PointInfo::new(0.5, 0.25, 0.0).with_size(0.1, 0.2, 0.0));
        procedure
    }

    #[test]
    fn sum_gradient_adds_upstream_gradients() {
        let procedure = linear_pair(SumModule::default());
        assert_close(procedure.output_value(0), 1.0 + 0.25);
        assert_eq!(procedure.output_gradient(0), DVec3::new(2.0, -3.0, 0.0));
        assert_close(procedure.output_error(0), 0.3 + 0.5 * 0.1);
    }

    #[test]
    fn difference_gradient_subtracts_upstream_gradients() {
        let procedure = linear_pair(DifferenceModule::default());
        assert_close(procedure.output_value(0), 1.0 - 0.25);
        assert_eq!(procedure.output_gradient(0), DVec3::new(2.0, 3.0, 0.0));
    }

    #[test]
    fn product_defaults_to_one() {
        let procedure = evaluate(ProductModule::default(), vec![number(3.0)]);
        assert_eq!(procedure.output_value(0), 3.0);
    }

    #[test]
    fn ratio_by_zero_saturates() {
        let procedure = evaluate(RatioModule::default(), vec![number(4.0), number(0.0)]);
        assert_eq!(procedure.output_value(0), f64::MAX);
        assert_eq!(procedure.output_error(0), f64::MAX);
        assert_eq!(procedure.output_gradient(0), DVec3::ZERO);

        let procedure = evaluate(RatioModule::default(), vec![number(-4.0), number(0.0)]);
        assert_eq!(procedure.output_value(0), -f64::MAX);
    }

    #[test]
    fn ratio_of_constants() {
        let procedure = evaluate(RatioModule::default(), vec![number(3.0), number(4.0)]);
        assert_eq!(procedure.output_value(0), 0.75);
        assert_eq!(procedure.output_error(0), 0.0);
    }

    #[test]
    fn mod_wraps_into_period() {
        let procedure = evaluate(ModModule::default(), vec![number(5.5), number(2.0)]);
        assert_close(procedure.output_value(0), 1.5);
        let procedure = evaluate(ModModule::default(), vec![number(-0.5), number(2.0)]);
        assert_close(procedure.output_value(0), 1.5);
        let procedure = evaluate(ModModule::default(), vec![number(5.5), number(0.0)]);
        assert_eq!(procedure.output_value(0), 0.0);
    }

    #[test]
    fn power_mirrors_negative_base() {
        let procedure = evaluate(PowerModule::default(), vec![number(-8.0), number(1.0 / 3.0)]);
        assert_close(procedure.output_value(0), -2.0);
        let procedure = evaluate(PowerModule::default(), vec![number(-2.0), number(3.0)]);
        assert_close(procedure.output_value(0), -8.0);
    }

    #[test]
    fn power_of_zero_with_negative_exponent_saturates() {
        let procedure = evaluate(PowerModule::default(), vec![number(0.0), number(-1.0)]);
        assert_eq!(procedure.output_value(0), f64::MAX);
        assert!(procedure.output_error(0) >= 0.0);
    }

    #[test]
    fn power_smooths_over_footprint() {
        let mut procedure = wired(
            Box::new(PowerModule::default()),
            vec![input(CoordinateModule::new(Axis::X)), number(2.0)],
        );
        procedure.init_for_point(&PointInfo::new(0.0, 0.0, 0.0).with_size(2.0, 0.0, 0.0));
        assert_close(procedure.output_value(0), 1.0 / 3.0);
        assert_close(procedure.output_gradient(0).x, 0.0);
    }

    #[test]
    fn abs_error_bounds_range_across_zero() {
        let mut procedure = wired(
            Box::new(AbsModule::default()),
            vec![input(CoordinateModule::new(Axis::X))],
        );
        procedure.init_for_point(&PointInfo::new(-0.25, 0.0, 0.0).with_size(1.0, 0.0, 0.0));
        assert_close(procedure.output_error(0), 0.375);
        assert!(procedure.output_value(0) > 0.25);
    }

    #[test]
    fn clip_above_max_is_flat() {
        let procedure = evaluate(ClipModule::new(0.0, 1.0).expect("bounds"), vec![number(1.5)]);
        assert_eq!(procedure.output_value(0), 1.0);
        assert_eq!(procedure.output_error(0), 0.0);
        assert_eq!(procedure.output_gradient(0), DVec3::ZERO);
    }

    #[test]
    fn clip_inside_passes_gradient() {
        let mut procedure = wired(
            Box::new(ClipModule::default()),
            vec![input(CoordinateModule::new(Axis::X))],
        );
        procedure.init_for_point(&PointInfo::new(0.5, 0.0, 0.0));
        assert_eq!(procedure.output_gradient(0), DVec3::X);
    }

    #[test]
    fn clip_rejects_inverted_bounds() {
        let mut clip = ClipModule::default();
        let err = clip.set_param("min", ParamValue::Float(2.0));
        assert!(matches!(err, Err(ParamError::Invalid { .. })));
        assert_eq!(clip.min, 0.0);
        clip.set_param("max", ParamValue::Float(3.0)).expect("max");
        clip.set_param("min", ParamValue::Float(2.0)).expect("min");
        assert_eq!((clip.min, clip.max), (2.0, 3.0));
        assert!(matches!(
            ClipModule::new(1.0, -1.0),
            Err(ParamError::Invalid { .. })
        ));
    }

    #[test]
    fn interpolate_clamps_fraction() {
        let procedure = evaluate(
            InterpolateModule::default(),
            vec![number(2.0), number(4.0), number(0.25)],
        );
        assert_close(procedure.output_value(0), 2.5);
        let procedure = evaluate(
            InterpolateModule::default(),
            vec![number(2.0), number(4.0), number(3.0)],
        );
        assert_close(procedure.output_value(0), 4.0);
    }

    #[test]
    fn blur_widens_upstream_footprint() {
        let mut procedure = wired(
            Box::new(BlurModule::default()),
            vec![input(CoordinateModule::new(Axis::X)), number(0.5)],
        );
        procedure.init_for_point(&PointInfo::new(1.0, 0.0, 0.0).with_size(0.2, 0.0, 0.0));
        assert_close(procedure.output_value(0), 1.0);
        assert_close(procedure.output_error(0), 0.6);
    }

    #[test]
    fn errors_are_never_negative() {
        let modules: Vec<Box<dyn Module>> = vec![
            Box::new(SumModule::default()),
            Box::new(DifferenceModule::default()),
            Box::new(ProductModule::default()),
            Box::new(RatioModule::default()),
            Box::new(ModModule::default()),
            Box::new(PowerModule::default()),
            Box::new(AbsModule::default()),
            Box::new(ClipModule::default()),
            Box::new(ScaleShiftModule::new(-2.0, 1.0)),
            Box::new(InterpolateModule::default()),
            Box::new(BlurModule::default()),
        ];
        for module in modules {
            let mut procedure = wired(
                module,
                vec![
                    input(CoordinateModule::new(Axis::X)),
                    input(CoordinateModule::new(Axis::Y)),
                ],
            );
            for (x, y) in [(-1.5, 0.5), (0.0, 0.0), (2.25, -3.0), (0.1, 1e-3)] {
                procedure.init_for_point(&PointInfo::new(x, y, 0.0).with_size(0.3, 0.7, 0.0));
                let error = procedure.output_error(0);
                assert!(error >= 0.0, "negative error {error}");
            }
        }
    }
}
