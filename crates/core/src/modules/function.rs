use glam::DVec3;

use crate::curve::{Curve, Interpolation};
use crate::math::smoothed_slope;
use crate::module::{Estimate, Inputs, Module, OutputCache, Port};
use crate::modules_builtin::ModuleKind;
use crate::params::{expect_bool, wrong_type, NodeParams, ParamError, ParamValue};

const INPUTS: [Port; 1] = [Port::number("Input", 0.0)];
const OUTPUTS: [Port; 1] = [Port::number("Output", 0.0)];

/// A user-drawn curve applied to its input.
#[derive(Debug, Clone)]
pub struct FunctionModule {
    points: Vec<[f64; 2]>,
    smooth: bool,
    repeat: bool,
    curve: Curve,
    cache: OutputCache,
}

impl Default for FunctionModule {
    fn default() -> Self {
        Self {
            points: vec![[0.0, 0.0], [1.0, 1.0]],
            smooth: false,
            repeat: false,
            curve: Curve::identity(),
            cache: OutputCache::default(),
        }
    }
}

fn build_curve(points: &[[f64; 2]], smooth: bool, repeat: bool) -> Result<Curve, String> {
    if points.len() < 2 {
        return Err("function needs at least two points".to_string());
    }
    let interpolation = if smooth {
        Interpolation::CatmullRom
    } else {
        Interpolation::Linear
    };
    Curve::new(points, interpolation, repeat)
}

impl FunctionModule {
    fn rebuild(
        &mut self,
        points: Vec<[f64; 2]>,
        smooth: bool,
        repeat: bool,
    ) -> Result<(), ParamError> {
        let curve = build_curve(&points, smooth, repeat)
            .map_err(|message| ParamError::invalid("points", message))?;
        self.points = points;
        self.smooth = smooth;
        self.repeat = repeat;
        self.curve = curve;
        self.cache.clear();
        Ok(())
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let input = inputs.estimate(0, blur);
        Estimate::new(
            self.curve.average(input.value, input.error),
            self.curve.error(input.value, input.error),
        )
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let input = inputs.estimate(0, blur);
        let slope = smoothed_slope(
            input.value,
            input.error,
            |x| self.curve.value(x),
            |x| self.curve.slope(x),
        );
        inputs.gradient(0, blur) * slope
    }
}

impl Module for FunctionModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Function
    }

    fn inputs(&self) -> &[Port] {
        &INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &OUTPUTS
    }

    single_output!();

    fn params(&self) -> NodeParams {
        NodeParams::new()
            .with("points", ParamValue::Curve(self.points.clone()))
            .with("smooth", ParamValue::Bool(self.smooth))
            .with("repeat", ParamValue::Bool(self.repeat))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "points" => match value {
                ParamValue::Curve(points) => self.rebuild(points, self.smooth, self.repeat),
                other => Err(wrong_type(key, "curve", &other)),
            },
            "smooth" => {
                let smooth = expect_bool(key, &value)?;
                self.rebuild(self.points.clone(), smooth, self.repeat)
            }
            "repeat" => {
                let repeat = expect_bool(key, &value)?;
                self.rebuild(self.points.clone(), self.smooth, repeat)
            }
            _ => Err(ParamError::Unknown(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{assert_close, input, wired};
    use crate::modules::CoordinateModule;
    use crate::point::{Axis, PointInfo};
    use crate::procedure::Procedure;

    fn triangle() -> FunctionModule {
        let mut module = FunctionModule::default();
        module
            .set_param(
                "points",
                ParamValue::Curve(vec![[0.0, 0.0], [1.0, 2.0], [2.0, 0.0]]),
            )
            .expect("points");
        module
    }

    #[test]
    fn maps_input_through_curve() {
        let mut procedure = wired(
            Box::new(triangle()),
            vec![input(CoordinateModule::new(Axis::X))],
        );
        procedure.init_for_point(&PointInfo::new(0.5, 0.0, 0.0));
        assert_close(procedure.output_value(0), 1.0);
        assert_eq!(procedure.output_error(0), 0.0);
        assert_close(procedure.output_gradient(0).x, 2.0);
    }

    #[test]
    fn footprint_smooths_the_peak() {
        let mut procedure = wired(
            Box::new(triangle()),
            vec![input(CoordinateModule::new(Axis::X))],
        );
        procedure.init_for_point(&PointInfo::new(1.0, 0.0, 0.0).with_size(1.0, 0.0, 0.0));
        assert_close(procedure.output_value(0), 1.5);
        assert!(procedure.output_error(0) > 0.0);
    }

    #[test]
    fn gradient_follows_the_averaged_curve() {
        let mut procedure = wired(
            Box::new(triangle()),
            vec![input(CoordinateModule::new(Axis::X))],
        );
        let value_at = |procedure: &mut Procedure, x: f64| {
            procedure.init_for_point(&PointInfo::new(x, 0.0, 0.0).with_size(0.5, 0.0, 0.0));
            procedure.output_value(0)
        };
        let h = 1e-4;
        let above = value_at(&mut procedure, 0.9 + h);
        let below = value_at(&mut procedure, 0.9 - h);
        let difference = (above - below) / (2.0 * h);
        value_at(&mut procedure, 0.9);
        let gradient = procedure.output_gradient(0).x;
        // Straddling the peak, the averaged curve is flatter than either side.
        assert!((gradient - difference).abs() < 1e-6, "{gradient} vs {difference}");
        assert!((gradient - 0.8).abs() < 1e-9);
    }

    #[test]
    fn rejects_single_point_and_keeps_previous_curve() {
        let mut module = triangle();
        let err = module.set_param("points", ParamValue::Curve(vec![[0.0, 1.0]]));
        assert!(matches!(err, Err(ParamError::Invalid { .. })));
        assert_eq!(module.points.len(), 3);
        let err = module.set_param("points", ParamValue::Curve(vec![[1.0, 0.0], [0.0, 1.0]]));
        assert!(err.is_err());
    }
}
