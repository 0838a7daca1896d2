// Smooth single-variable functions.
//
// Values are averaged over the input's uncertainty interval through each
// function's antiderivative; errors propagate through the local derivative.

use std::f64::consts::PI;

use glam::DVec3;

use crate::math::{box_average, propagate_error, saturate, saturate_vec, smoothed_slope};
use crate::module::{Estimate, Inputs, Module, OutputCache, Port};
use crate::modules_builtin::ModuleKind;

const SINGLE: [Port; 1] = [Port::number("Input", 0.0)];
const VALUE_OUT: [Port; 1] = [Port::number("Value", 0.0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transcendental {
    Sine,
    Cosine,
    /// Sign-mirrored: `-sqrt(-x)` for negative input.
    Sqrt,
    Exp,
    /// `-f64::MAX` with zero error for non-positive input.
    Log,
}

fn mirrored_sqrt(x: f64) -> f64 {
    x.signum() * x.abs().sqrt()
}

impl Transcendental {
    fn value(self, x: f64) -> f64 {
        match self {
            Transcendental::Sine => x.sin(),
            Transcendental::Cosine => x.cos(),
            Transcendental::Sqrt => mirrored_sqrt(x),
            Transcendental::Exp => saturate(x.exp()),
            Transcendental::Log => {
                if x > 0.0 {
                    x.ln()
                } else {
                    -f64::MAX
                }
            }
        }
    }

    fn slope(self, x: f64) -> f64 {
        match self {
            Transcendental::Sine => x.cos(),
            Transcendental::Cosine => -x.sin(),
            Transcendental::Sqrt => saturate(0.5 / x.abs().sqrt()),
            Transcendental::Exp => saturate(x.exp()),
            Transcendental::Log => {
                if x > 0.0 {
                    saturate(1.0 / x)
                } else {
                    0.0
                }
            }
        }
    }

    fn antiderivative(self, x: f64) -> f64 {
        match self {
            Transcendental::Sine => -x.cos(),
            Transcendental::Cosine => x.sin(),
            Transcendental::Sqrt => 2.0 / 3.0 * x.abs().powf(1.5),
            Transcendental::Exp => saturate(x.exp()),
            Transcendental::Log => x * x.ln() - x,
        }
    }

    /// Whether `[x - e, x + e]` stays inside the domain of the antiderivative.
    fn smoothable(self, x: f64, e: f64) -> bool {
        match self {
            Transcendental::Log => x - e > 0.0,
            _ => true,
        }
    }

    fn estimate(self, x: f64, e: f64) -> Estimate {
        if self == Transcendental::Log && x <= 0.0 {
            return Estimate::new(-f64::MAX, 0.0);
        }
        let value = if self.smoothable(x, e) {
            box_average(
                x,
                e,
                |v| self.value(v),
                |v| self.antiderivative(v),
            )
        } else {
            self.value(x)
        };
        let error = match self {
            Transcendental::Sine | Transcendental::Cosine => {
                propagate_error(self.slope(x), e).min(0.5)
            }
            Transcendental::Sqrt => 0.5 * (mirrored_sqrt(x + e) - mirrored_sqrt(x - e)),
            Transcendental::Exp | Transcendental::Log => propagate_error(self.slope(x), e),
        };
        Estimate::new(saturate(value), error)
    }

    fn gradient_scale(self, x: f64, e: f64) -> f64 {
        if self == Transcendental::Log && x <= 0.0 {
            return 0.0;
        }
        if self.smoothable(x, e) {
            saturate(smoothed_slope(
                x,
                e,
                |v| self.value(v),
                |v| self.slope(v),
            ))
        } else {
            self.slope(x)
        }
    }
}

/// Applies one [`Transcendental`] function to its input.
#[derive(Debug, Clone)]
pub struct TranscendentalModule {
    function: Transcendental,
    cache: OutputCache,
}

impl TranscendentalModule {
    pub fn new(function: Transcendental) -> Self {
        Self {
            function,
            cache: OutputCache::default(),
        }
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let input = inputs.estimate(0, blur);
        self.function.estimate(input.value, input.error)
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let input = inputs.estimate(0, blur);
        let scale = self.function.gradient_scale(input.value, input.error);
        if scale == 0.0 {
            return DVec3::ZERO;
        }
        saturate_vec(inputs.gradient(0, blur) * scale)
    }
}

impl Module for TranscendentalModule {
    fn kind(&self) -> ModuleKind {
        match self.function {
            Transcendental::Sine => ModuleKind::Sine,
            Transcendental::Cosine => ModuleKind::Cosine,
            Transcendental::Sqrt => ModuleKind::Sqrt,
            Transcendental::Exp => ModuleKind::Exp,
            Transcendental::Log => ModuleKind::Log,
        }
    }

    fn inputs(&self) -> &[Port] {
        &SINGLE
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

const CONTROL_MIN: f64 = 1e-6;
const CONTROL_MAX: f64 = 1.0 - 1e-6;

/// Perlin's bias and gain curves on `[0, 1]`, parameterized by the exponent
/// `p = ln(control) / ln(0.5)` so that a control of 0.5 is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Bias,
    Gain,
}

impl Shape {
    fn exponent(self, control: f64) -> f64 {
        let c = control.clamp(CONTROL_MIN, CONTROL_MAX);
        match self {
            Shape::Bias => c.ln() / 0.5f64.ln(),
            Shape::Gain => (1.0 - c).ln() / 0.5f64.ln(),
        }
    }

    /// `d exponent / d control`, zero where the control is clamped.
    fn exponent_slope(self, control: f64) -> f64 {
        if control <= CONTROL_MIN || control >= CONTROL_MAX {
            return 0.0;
        }
        match self {
            Shape::Bias => 1.0 / (control * 0.5f64.ln()),
            Shape::Gain => -1.0 / ((1.0 - control) * 0.5f64.ln()),
        }
    }

    fn value(self, t: f64, p: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        if p == 1.0 {
            return t;
        }
        match self {
            Shape::Bias => t.powf(p),
            Shape::Gain if t < 0.5 => 0.5 * (2.0 * t).powf(p),
            Shape::Gain => 1.0 - 0.5 * (2.0 - 2.0 * t).powf(p),
        }
    }

    fn slope(self, t: f64, p: f64) -> f64 {
        if t <= 0.0 || t >= 1.0 {
            return 0.0;
        }
        if p == 1.0 {
            return 1.0;
        }
        let slope = match self {
            Shape::Bias => p * t.powf(p - 1.0),
            Shape::Gain if t < 0.5 => p * (2.0 * t).powf(p - 1.0),
            Shape::Gain => p * (2.0 - 2.0 * t).powf(p - 1.0),
        };
        saturate(slope)
    }

    fn antiderivative(self, t: f64, p: f64) -> f64 {
        let q = p + 1.0;
        match self {
            Shape::Bias => {
                if t <= 0.0 {
                    0.0
                } else if t <= 1.0 {
                    t.powf(q) / q
                } else {
                    1.0 / q + (t - 1.0)
                }
            }
            Shape::Gain => {
                let quarter = 1.0 / (4.0 * q);
                if t <= 0.0 {
                    0.0
                } else if t <= 0.5 {
                    (2.0 * t).powf(q) * quarter
                } else if t <= 1.0 {
                    quarter + (t - 0.5) + ((2.0 - 2.0 * t).powf(q) - 1.0) * quarter
                } else {
                    0.5 + (t - 1.0)
                }
            }
        }
    }

    /// `d value / d exponent` at `t`.
    fn exponent_sensitivity(self, t: f64, p: f64) -> f64 {
        if t <= 0.0 || t >= 1.0 {
            return 0.0;
        }
        match self {
            Shape::Bias => t.powf(p) * t.ln(),
            Shape::Gain if t < 0.5 => 0.5 * (2.0 * t).powf(p) * (2.0 * t).ln(),
            Shape::Gain => -0.5 * (2.0 - 2.0 * t).powf(p) * (2.0 - 2.0 * t).ln(),
        }
    }
}

/// Bias or gain of `Input` controlled by a second input in `(0, 1)`.
///
/// The input is clamped to `[0, 1]` and the control to `[1e-6, 1 - 1e-6]`.
#[derive(Debug, Clone)]
pub struct ShapingModule {
    shape: Shape,
    cache: OutputCache,
}

const BIAS_INPUTS: [Port; 2] = [Port::number("Input", 0.0), Port::number("Bias", 0.5)];
const GAIN_INPUTS: [Port; 2] = [Port::number("Input", 0.0), Port::number("Gain", 0.5)];

impl ShapingModule {
    pub fn bias() -> Self {
        Self {
            shape: Shape::Bias,
            cache: OutputCache::default(),
        }
    }

    pub fn gain() -> Self {
        Self {
            shape: Shape::Gain,
            cache: OutputCache::default(),
        }
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (input, control) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let shape = self.shape;
        let p = shape.exponent(control.value);
        let (t, e) = (input.value, input.error);
        let value = box_average(
            t,
            e,
            |v| shape.value(v, p),
            |v| shape.antiderivative(v, p),
        );
        let control_slope =
            shape.exponent_sensitivity(t, p) * shape.exponent_slope(control.value);
        let error =
            propagate_error(shape.slope(t, p), e) + propagate_error(control_slope, control.error);
        Estimate::new(value, saturate(error))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (input, control) = (inputs.estimate(0, blur), inputs.value(1, blur));
        let shape = self.shape;
        let p = shape.exponent(control);
        let slope = smoothed_slope(
            input.value,
            input.error,
            |v| shape.value(v, p),
            |v| shape.slope(v, p),
        );
        let mut gradient = DVec3::ZERO;
        if slope != 0.0 {
            gradient += inputs.gradient(0, blur) * slope;
        }
        let control_slope =
            shape.exponent_sensitivity(input.value, p) * shape.exponent_slope(control);
        if control_slope != 0.0 {
            gradient += inputs.gradient(1, blur) * control_slope;
        }
        saturate_vec(gradient)
    }
}

impl Module for ShapingModule {
    fn kind(&self) -> ModuleKind {
        match self.shape {
            Shape::Bias => ModuleKind::Bias,
            Shape::Gain => ModuleKind::Gain,
        }
    }

    fn inputs(&self) -> &[Port] {
        match self.shape {
            Shape::Bias => &BIAS_INPUTS,
            Shape::Gain => &GAIN_INPUTS,
        }
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();
}

const ANGLE_INPUTS: [Port; 2] = [
    Port::coordinate("X", crate::point::Axis::X),
    Port::coordinate("Y", crate::point::Axis::Y),
];

/// `atan2(Y, X)` in `(-pi, pi]`.
#[derive(Debug, Clone, Default)]
pub struct AngleModule {
    cache: OutputCache,
}

impl AngleModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (x, y) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let r2 = x.value * x.value + y.value * y.value;
        let error = if r2 == 0.0 {
            if x.error + y.error > 0.0 {
                PI
            } else {
                0.0
            }
        } else {
            ((y.value.abs() * x.error + x.value.abs() * y.error) / r2).min(PI)
        };
        Estimate::new(y.value.atan2(x.value), error)
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (x, y) = (inputs.value(0, blur), inputs.value(1, blur));
        let r2 = x * x + y * y;
        if r2 == 0.0 {
            return DVec3::ZERO;
        }
        saturate_vec((inputs.gradient(1, blur) * x - inputs.gradient(0, blur) * y) / r2)
    }
}

impl Module for AngleModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Angle
    }

    fn inputs(&self) -> &[Port] {
        &ANGLE_INPUTS
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
    use crate::procedure::Procedure;

    fn on_constant(module: impl Module + 'static, value: f64) -> Procedure {
        let mut procedure = wired(Box::new(module), vec![input(NumberModule::new(value))]);
        procedure.init_for_point(&PointInfo::default());
        procedure
    }

    fn on_x(module: impl Module + 'static, point: PointInfo) -> Procedure {
        let mut procedure = wired(
            Box::new(module),
            vec![input(CoordinateModule::new(Axis::X))],
        );
        procedure.init_for_point(&point);
        procedure
    }

    #[test]
    fn cosine_of_exact_zero_is_one() {
        let procedure = on_constant(TranscendentalModule::new(Transcendental::Cosine), 0.0);
        assert_eq!(procedure.output_value(0), 1.0);
        assert_eq!(procedure.output_error(0), 0.0);
    }

    #[test]
    fn sine_gradient_follows_cosine() {
        let procedure = on_x(
            TranscendentalModule::new(Transcendental::Sine),
            PointInfo::new(0.0, 0.0, 0.0),
        );
        assert_eq!(procedure.output_value(0), 0.0);
        assert_eq!(procedure.output_gradient(0), DVec3::X);
    }

    #[test]
    fn sine_error_is_capped() {
        let procedure = on_x(
            TranscendentalModule::new(Transcendental::Sine),
            PointInfo::new(0.0, 0.0, 0.0).with_size(10.0, 0.0, 0.0),
        );
        assert_eq!(procedure.output_error(0), 0.5);
        assert!(procedure.output_value(0).abs() < 1e-12);
    }

    #[test]
    fn sqrt_mirrors_sign() {
        let procedure = on_constant(TranscendentalModule::new(Transcendental::Sqrt), -4.0);
        assert_eq!(procedure.output_value(0), -2.0);
    }

    #[test]
    fn sqrt_error_at_zero_stays_finite() {
        let procedure = on_x(
            TranscendentalModule::new(Transcendental::Sqrt),
            PointInfo::new(0.0, 0.0, 0.0).with_size(0.5, 0.0, 0.0),
        );
        assert_close(procedure.output_error(0), 0.5);
        assert_close(procedure.output_value(0), 0.0);
    }

    #[test]
    fn log_of_non_positive_saturates() {
        let procedure = on_constant(TranscendentalModule::new(Transcendental::Log), 0.0);
        assert_eq!(procedure.output_value(0), -f64::MAX);
        assert_eq!(procedure.output_error(0), 0.0);
        assert_eq!(procedure.output_gradient(0), DVec3::ZERO);
    }

    #[test]
    fn exp_averages_over_footprint() {
        let procedure = on_x(
            TranscendentalModule::new(Transcendental::Exp),
            PointInfo::new(0.0, 0.0, 0.0).with_size(2.0, 0.0, 0.0),
        );
        let expected = (1f64.exp() - (-1f64).exp()) / 2.0;
        assert_close(procedure.output_value(0), expected);
        assert_close(procedure.output_error(0), 1.0);
    }

    #[test]
    fn half_bias_is_identity() {
        let mut procedure = wired(
            Box::new(ShapingModule::bias()),
            vec![input(NumberModule::new(0.7)), input(NumberModule::new(0.5))],
        );
        procedure.init_for_point(&PointInfo::default());
        assert_eq!(procedure.output_value(0), 0.7);
    }

    #[test]
    fn bias_moves_midpoint() {
        let mut procedure = wired(
            Box::new(ShapingModule::bias()),
            vec![input(NumberModule::new(0.5)), input(NumberModule::new(0.8))],
        );
        procedure.init_for_point(&PointInfo::default());
        assert_close(procedure.output_value(0), 0.8);
    }

    #[test]
    fn gain_fixes_midpoint_and_steepens() {
        let mut procedure = wired(
            Box::new(ShapingModule::gain()),
            vec![input(NumberModule::new(0.5)), input(NumberModule::new(0.8))],
        );
        procedure.init_for_point(&PointInfo::default());
        assert_close(procedure.output_value(0), 0.5);

        let mut procedure = wired(
            Box::new(ShapingModule::gain()),
            vec![input(NumberModule::new(0.25)), input(NumberModule::new(0.8))],
        );
        procedure.init_for_point(&PointInfo::default());
        assert!(procedure.output_value(0) < 0.25);
    }

    #[test]
    fn shape_antiderivatives_match_numeric_integral() {
        for shape in [Shape::Bias, Shape::Gain] {
            let p = shape.exponent(0.3);
            let steps = 20_000;
            let (a, b) = (-0.2, 1.3);
            let dx = (b - a) / steps as f64;
            let numeric: f64 = (0..steps)
                .map(|i| shape.value(a + (i as f64 + 0.5) * dx, p) * dx)
                .sum();
            let exact = shape.antiderivative(b, p) - shape.antiderivative(a, p);
            assert!((numeric - exact).abs() < 1e-4, "{shape:?}");
        }
    }

    #[test]
    fn angle_of_unit_y_is_quarter_turn() {
        let mut procedure = wired(
            Box::new(AngleModule::default()),
            vec![input(NumberModule::new(0.0)), input(NumberModule::new(1.0))],
        );
        procedure.init_for_point(&PointInfo::default());
        assert_close(procedure.output_value(0), PI / 2.0);
    }

    #[test]
    fn unconnected_angle_reads_point() {
        let mut procedure = wired(Box::new(AngleModule::default()), Vec::new());
        procedure.init_for_point(&PointInfo::new(1.0, 1.0, 0.0));
        assert_close(procedure.output_value(0), PI / 4.0);
        let gradient = procedure.output_gradient(0);
        assert_close(gradient.x, -0.5);
        assert_close(gradient.y, 0.5);
    }
}
