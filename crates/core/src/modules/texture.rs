// Solid textures driven by lattice noise and feature points.

use std::f64::consts::PI;

use glam::DVec3;

use crate::math::{box_average, sawtooth, sawtooth_antiderivative, saturate};
use crate::module::{Estimate, Inputs, Memo, Module, OutputCache, Port};
use crate::modules_builtin::ModuleKind;
use crate::noise::{cell_features, CellFeatures, Fractal};
use crate::params::{expect_float, expect_int, NodeParams, ParamError, ParamValue};
use crate::point::{Axis, PointInfo};

const XYZ: [Port; 3] = [
    Port::coordinate("X", Axis::X),
    Port::coordinate("Y", Axis::Y),
    Port::coordinate("Z", Axis::Z),
];
const VALUE_OUT: [Port; 1] = [Port::number("Value", 0.0)];
const CELL_OUTS: [Port; 3] = [
    Port::number("Cell", 0.0),
    Port::number("Distance 1", 0.0),
    Port::number("Distance 2", 0.0),
];

/// Position read from the X/Y/Z inputs with its per-axis error.
fn position(inputs: &Inputs<'_>, blur: f64) -> (DVec3, DVec3) {
    let (x, y, z) = (
        inputs.estimate(0, blur),
        inputs.estimate(1, blur),
        inputs.estimate(2, blur),
    );
    (
        DVec3::new(x.value, y.value, z.value),
        DVec3::new(x.error, y.error, z.error),
    )
}

/// Spatial gradient of `f(X, Y, Z)` given its gradient in input space.
fn chain(inputs: &Inputs<'_>, blur: f64, local: DVec3) -> DVec3 {
    let mut gradient = DVec3::ZERO;
    for axis in 0..3 {
        if local[axis] != 0.0 {
            gradient += inputs.gradient(axis, blur) * local[axis];
        }
    }
    gradient
}

fn default_fractal(absolute: bool) -> Fractal {
    Fractal {
        amplitude: 1.0,
        octaves: 4,
        persistence: 0.5,
        absolute,
    }
}

fn fractal_params(params: NodeParams, fractal: &Fractal) -> NodeParams {
    params
        .with("amplitude", ParamValue::Float(fractal.amplitude))
        .with("octaves", ParamValue::Int(fractal.octaves as i32))
        .with("persistence", ParamValue::Float(fractal.persistence))
}

/// Returns `fractal` with one of its parameters replaced.
fn with_fractal_param(
    fractal: &Fractal,
    key: &str,
    value: &ParamValue,
) -> Result<Fractal, ParamError> {
    let mut updated = *fractal;
    match key {
        "amplitude" => updated.amplitude = expect_float(key, value)?,
        "persistence" => updated.persistence = expect_float(key, value)?,
        "octaves" => {
            let octaves = expect_int(key, value)?;
            if !(1..=16).contains(&octaves) {
                return Err(ParamError::invalid(key, "octaves must lie in 1..=16"));
            }
            updated.octaves = octaves as u32;
        }
        _ => return Err(ParamError::Unknown(key.to_string())),
    }
    Ok(updated)
}

fn positive_spacing(key: &str, value: &ParamValue) -> Result<f64, ParamError> {
    let spacing = expect_float(key, value)?;
    if spacing <= 0.0 {
        return Err(ParamError::invalid(key, "spacing must be positive"));
    }
    Ok(spacing)
}

#[derive(Debug, Clone, Copy)]
struct CellSample {
    features: CellFeatures,
    position: DVec3,
    size: DVec3,
}

/// Worley cellular texture: the random id of the nearest feature cell and
/// the distances to the two nearest feature points.
#[derive(Debug, Clone, Default)]
pub struct CellsModule {
    sample: Memo<CellSample>,
    gradients: Memo<(DVec3, DVec3)>,
}

impl CellsModule {
    fn sample(&self, inputs: &Inputs<'_>, blur: f64) -> CellSample {
        self.sample.get_or_compute(blur, || {
            let (position, size) = position(inputs, blur);
            CellSample {
                features: cell_features(position),
                position,
                size,
            }
        })
    }

    fn distance_error(direction: DVec3, size: DVec3) -> f64 {
        direction.abs().dot(size)
    }

    fn direction(from: DVec3, to: DVec3, distance: f64) -> DVec3 {
        if distance > 0.0 {
            (to - from) / distance
        } else {
            DVec3::ZERO
        }
    }

    fn estimate(&self, inputs: &Inputs<'_>, which: usize, blur: f64) -> Estimate {
        let CellSample {
            features,
            position,
            size,
        } = self.sample(inputs, blur);
        match which {
            0 => {
                // Both features are within reach of the footprint.
                let ambiguous = features.distance2 - features.distance1 < 2.0 * size.length();
                let error = if ambiguous {
                    0.5 * (features.id - features.second_id).abs()
                } else {
                    0.0
                };
                Estimate::new(features.id, error)
            }
            1 => {
                let direction = Self::direction(features.nearest, position, features.distance1);
                Estimate::new(features.distance1, Self::distance_error(direction, size))
            }
            _ => {
                let direction = Self::direction(features.second, position, features.distance2);
                Estimate::new(features.distance2, Self::distance_error(direction, size))
            }
        }
    }
}

impl Module for CellsModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Cells
    }

    fn inputs(&self) -> &[Port] {
        &XYZ
    }

    fn outputs(&self) -> &[Port] {
        &CELL_OUTS
    }

    fn init(&mut self, _point: &PointInfo) {
        self.sample.clear();
        self.gradients.clear();
    }

    fn average_value(&self, inputs: &Inputs<'_>, which: usize, blur: f64) -> f64 {
        self.estimate(inputs, which, blur).value
    }

    fn value_error(&self, inputs: &Inputs<'_>, which: usize, blur: f64) -> f64 {
        self.estimate(inputs, which, blur).error
    }

    fn value_gradient(&self, inputs: &Inputs<'_>, which: usize, blur: f64) -> DVec3 {
        if which == 0 {
            return DVec3::ZERO;
        }
        let (first, second) = self.gradients.get_or_compute(blur, || {
            let sample = self.sample(inputs, blur);
            let features = sample.features;
            let first =
                Self::direction(features.nearest, sample.position, features.distance1);
            let second =
                Self::direction(features.second, sample.position, features.distance2);
            (chain(inputs, blur, first), chain(inputs, blur, second))
        });
        if which == 1 {
            first
        } else {
            second
        }
    }
}

/// Fractal gradient noise. `noise()` maps signed noise into `[0, 1]`
/// around 0.5; `turbulence()` sums absolute octaves.
#[derive(Debug, Clone)]
pub struct NoiseModule {
    fractal: Fractal,
    cache: OutputCache,
}

impl NoiseModule {
    pub fn noise() -> Self {
        Self {
            fractal: default_fractal(false),
            cache: OutputCache::default(),
        }
    }

    pub fn turbulence() -> Self {
        Self {
            fractal: default_fractal(true),
            cache: OutputCache::default(),
        }
    }

    /// Offset and scale applied to the raw fractal sum.
    fn mapping(&self) -> (f64, f64) {
        if self.fractal.absolute {
            (0.0, 1.0)
        } else {
            (0.5, 0.5)
        }
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (p, size) = position(inputs, blur);
        let sample = self.fractal.sample(p, size);
        let (offset, scale) = self.mapping();
        Estimate::new(offset + scale * sample.value, saturate(scale * sample.error))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (p, size) = position(inputs, blur);
        let sample = self.fractal.sample(p, size);
        let (_, scale) = self.mapping();
        chain(inputs, blur, sample.gradient * scale)
    }
}

impl Module for NoiseModule {
    fn kind(&self) -> ModuleKind {
        if self.fractal.absolute {
            ModuleKind::Turbulence
        } else {
            ModuleKind::Noise
        }
    }

    fn inputs(&self) -> &[Port] {
        &XYZ
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();

    fn params(&self) -> NodeParams {
        fractal_params(NodeParams::new(), &self.fractal)
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        self.fractal = with_fractal_param(&self.fractal, key, &value)?;
        self.cache.clear();
        Ok(())
    }
}

/// `sin(e) / e`, the attenuation of a sine averaged over `[t - e, t + e]`.
fn sinc(e: f64) -> f64 {
    if e < 1e-9 {
        1.0
    } else {
        e.sin() / e
    }
}

/// Veined stone: a sine along X whose phase is perturbed by turbulence.
#[derive(Debug, Clone)]
pub struct MarbleModule {
    spacing: f64,
    turbulence: Fractal,
    cache: OutputCache,
}

impl Default for MarbleModule {
    fn default() -> Self {
        Self {
            spacing: 1.0,
            turbulence: default_fractal(true),
            cache: OutputCache::default(),
        }
    }
}

impl MarbleModule {
    /// Phase, its error and its gradient in input space.
    fn phase(&self, inputs: &Inputs<'_>, blur: f64) -> (f64, f64, DVec3) {
        let (p, size) = position(inputs, blur);
        let frequency = PI / self.spacing;
        if self.turbulence.amplitude == 0.0 {
            return (frequency * p.x, frequency * size.x, DVec3::X * frequency);
        }
        let t = self.turbulence.sample(p, size);
        (
            frequency * (p.x + t.value),
            frequency * (size.x + t.error),
            (DVec3::X + t.gradient) * frequency,
        )
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (theta, error, _) = self.phase(inputs, blur);
        let damping = sinc(error);
        let value = 0.5 + 0.5 * theta.sin() * damping;
        let spread = 0.5 * theta.cos().abs() * damping * error + 0.5 * (1.0 - damping);
        Estimate::new(value, saturate(spread).min(0.5))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (theta, error, local) = self.phase(inputs, blur);
        chain(inputs, blur, local * (0.5 * theta.cos() * sinc(error)))
    }
}

impl Module for MarbleModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Marble
    }

    fn inputs(&self) -> &[Port] {
        &XYZ
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();

    fn params(&self) -> NodeParams {
        fractal_params(
            NodeParams::new().with("spacing", ParamValue::Float(self.spacing)),
            &self.turbulence,
        )
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "spacing" => self.spacing = positive_spacing(key, &value)?,
            _ => self.turbulence = with_fractal_param(&self.turbulence, key, &value)?,
        }
        self.cache.clear();
        Ok(())
    }
}

/// Concentric growth rings around the Z axis, perturbed by turbulence.
/// Each ring ramps from 0 to 1 over `spacing`.
#[derive(Debug, Clone)]
pub struct WoodModule {
    spacing: f64,
    turbulence: Fractal,
    cache: OutputCache,
}

impl Default for WoodModule {
    fn default() -> Self {
        Self {
            spacing: 0.2,
            turbulence: Fractal {
                amplitude: 0.5,
                ..default_fractal(true)
            },
            cache: OutputCache::default(),
        }
    }
}

impl WoodModule {
    /// Ring coordinate, its error and its gradient in input space.
    fn rings(&self, inputs: &Inputs<'_>, blur: f64) -> (f64, f64, DVec3) {
        let (p, size) = position(inputs, blur);
        let radius = p.x.hypot(p.y);
        let (radial, radial_error) = if radius > 0.0 {
            let direction = DVec3::new(p.x / radius, p.y / radius, 0.0);
            (direction, direction.abs().dot(size))
        } else {
            (DVec3::ZERO, size.x.hypot(size.y))
        };
        let mut u = radius / self.spacing;
        let mut error = radial_error / self.spacing;
        let mut local = radial / self.spacing;
        if self.turbulence.amplitude != 0.0 {
            let t = self.turbulence.sample(p, size);
            u += t.value;
            error += t.error;
            local += t.gradient;
        }
        (u, error, local)
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (u, error, _) = self.rings(inputs, blur);
        let value = box_average(
            u,
            error,
            |v| sawtooth(v, 1.0),
            |v| sawtooth_antiderivative(v, 1.0),
        );
        let crosses = (u - error).floor() != (u + error).floor();
        let spread = if crosses { 0.5 } else { error.min(0.5) };
        Estimate::new(value, spread)
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (_, _, local) = self.rings(inputs, blur);
        chain(inputs, blur, local)
    }
}

impl Module for WoodModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Wood
    }

    fn inputs(&self) -> &[Port] {
        &XYZ
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    single_output!();

    fn params(&self) -> NodeParams {
        fractal_params(
            NodeParams::new().with("spacing", ParamValue::Float(self.spacing)),
            &self.turbulence,
        )
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "spacing" => self.spacing = positive_spacing(key, &value)?,
            _ => self.turbulence = with_fractal_param(&self.turbulence, key, &value)?,
        }
        self.cache.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{assert_close, wired, wired_output};
    use crate::procedure::Procedure;

    fn unwired(module: impl Module + 'static) -> Procedure {
        wired(Box::new(module), Vec::new())
    }

    fn sample_at(procedure: &mut Procedure, point: PointInfo) -> (f64, f64, DVec3) {
        procedure.init_for_point(&point);
        (
            procedure.output_value(0),
            procedure.output_error(0),
            procedure.output_gradient(0),
        )
    }

    #[test]
    fn cells_distances_are_ordered_and_unit_gradient() {
        let mut first = wired_output(Box::new(CellsModule::default()), Vec::new(), 1);
        let mut second = wired_output(Box::new(CellsModule::default()), Vec::new(), 2);
        let point = PointInfo::new(0.4, 2.3, -1.7);
        let (d1, e1, g1) = sample_at(&mut first, point);
        let (d2, _, _) = sample_at(&mut second, point);
        assert!(d1 <= d2);
        assert_eq!(e1, 0.0);
        assert_close(g1.length(), 1.0);
    }

    #[test]
    fn cells_distance_gradient_matches_finite_difference() {
        let mut procedure = wired_output(Box::new(CellsModule::default()), Vec::new(), 1);
        let (_, _, gradient) = sample_at(&mut procedure, PointInfo::new(0.31, 0.62, 0.17));
        let h = 1e-6;
        let (ahead, _, _) = sample_at(&mut procedure, PointInfo::new(0.31 + h, 0.62, 0.17));
        let (behind, _, _) = sample_at(&mut procedure, PointInfo::new(0.31 - h, 0.62, 0.17));
        assert!(((ahead - behind) / (2.0 * h) - gradient.x).abs() < 1e-5);
    }

    #[test]
    fn cell_id_is_exact_without_footprint() {
        let mut procedure = unwired(CellsModule::default());
        let (id, error, gradient) = sample_at(&mut procedure, PointInfo::new(5.5, 1.25, 0.75));
        assert!((0.0..1.0).contains(&id));
        assert_eq!(error, 0.0);
        assert_eq!(gradient, DVec3::ZERO);
    }

    #[test]
    fn noise_is_centered_on_lattice() {
        let mut module = NoiseModule::noise();
        module.set_param("octaves", ParamValue::Int(1)).expect("octaves");
        let mut procedure = unwired(module);
        let (value, error, _) = sample_at(&mut procedure, PointInfo::new(2.0, -1.0, 3.0));
        assert_close(value, 0.5);
        assert_eq!(error, 0.0);
    }

    #[test]
    fn noise_gradient_matches_finite_difference() {
        let mut procedure = unwired(NoiseModule::noise());
        let (_, _, gradient) = sample_at(&mut procedure, PointInfo::new(0.37, 1.21, -2.64));
        let h = 1e-6;
        let (ahead, _, _) = sample_at(&mut procedure, PointInfo::new(0.37, 1.21 + h, -2.64));
        let (behind, _, _) = sample_at(&mut procedure, PointInfo::new(0.37, 1.21 - h, -2.64));
        assert!(((ahead - behind) / (2.0 * h) - gradient.y).abs() < 1e-5);
    }

    #[test]
    fn noise_fades_to_gray_under_large_footprint() {
        let mut procedure = unwired(NoiseModule::noise());
        let point = PointInfo::new(0.3, 0.7, 0.1).with_size(20.0, 20.0, 20.0);
        let (value, error, _) = sample_at(&mut procedure, point);
        assert_close(value, 0.5);
        assert_close(error, 0.5);
    }

    #[test]
    fn turbulence_is_non_negative() {
        let mut procedure = unwired(NoiseModule::turbulence());
        for i in 0..20 {
            let x = f64::from(i) * 0.37;
            let (value, error, _) = sample_at(&mut procedure, PointInfo::new(x, 0.5 * x, 0.2));
            assert!(value >= 0.0);
            assert!(error >= 0.0);
        }
    }

    #[test]
    fn noise_rejects_octaves_out_of_range() {
        let mut module = NoiseModule::noise();
        assert!(module.set_param("octaves", ParamValue::Int(0)).is_err());
        assert!(module.set_param("octaves", ParamValue::Int(17)).is_err());
        assert_eq!(module.fractal.octaves, 4);
    }

    #[test]
    fn marble_without_turbulence_is_a_sine() {
        let mut module = MarbleModule::default();
        module.set_param("amplitude", ParamValue::Float(0.0)).expect("amplitude");
        let mut procedure = unwired(module);
        let (value, error, _) = sample_at(&mut procedure, PointInfo::new(0.5, 0.0, 0.0));
        assert_close(value, 1.0);
        assert_eq!(error, 0.0);
        let (value, _, gradient) = sample_at(&mut procedure, PointInfo::new(0.0, 0.0, 0.0));
        assert_close(value, 0.5);
        assert_close(gradient.x, 0.5 * PI);
    }

    #[test]
    fn marble_blurs_toward_gray() {
        let mut module = MarbleModule::default();
        module.set_param("amplitude", ParamValue::Float(0.0)).expect("amplitude");
        let mut procedure = unwired(module);
        let point = PointInfo::new(0.5, 0.0, 0.0).with_size(2.0, 0.0, 0.0);
        let (value, error, _) = sample_at(&mut procedure, point);
        assert_close(value, 0.5);
        assert_close(error, 0.5);
    }

    #[test]
    fn wood_rings_ramp_with_radius() {
        let mut module = WoodModule::default();
        module.set_param("amplitude", ParamValue::Float(0.0)).expect("amplitude");
        module.set_param("spacing", ParamValue::Float(1.0)).expect("spacing");
        let mut procedure = unwired(module);
        let (value, error, gradient) = sample_at(&mut procedure, PointInfo::new(0.25, 0.0, 0.0));
        assert_close(value, 0.25);
        assert_eq!(error, 0.0);
        assert_close(gradient.x, 1.0);
        let (value, _, _) = sample_at(&mut procedure, PointInfo::new(0.0, 1.5, 0.0));
        assert_close(value, 0.5);
    }

    #[test]
    fn wood_rejects_non_positive_spacing() {
        let mut module = WoodModule::default();
        assert!(module.set_param("spacing", ParamValue::Float(0.0)).is_err());
        assert_eq!(module.spacing, 0.2);
    }
}
