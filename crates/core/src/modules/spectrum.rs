use crate::curve::{Curve, Interpolation};
use crate::math::RgbColor;
use crate::module::{Inputs, Memo, Module, Port};
use crate::modules_builtin::ModuleKind;
use crate::params::{expect_bool, wrong_type, ColorStop, NodeParams, ParamError, ParamValue};

const INPUTS: [Port; 1] = [Port::number("Input", 0.0)];
const OUTPUTS: [Port; 1] = [Port::color("Color", RgbColor::BLACK)];

/// Color lookup table: maps its input through a list of color stops,
/// box-filtered over the input's uncertainty.
#[derive(Debug, Clone)]
pub struct SpectrumModule {
    stops: Vec<ColorStop>,
    smooth: bool,
    repeat: bool,
    channels: [Curve; 3],
    cache: Memo<RgbColor>,
}

impl Default for SpectrumModule {
    fn default() -> Self {
        Self {
            stops: vec![
                ColorStop::new(0.0, RgbColor::BLACK),
                ColorStop::new(1.0, RgbColor::WHITE),
            ],
            smooth: false,
            repeat: false,
            channels: [Curve::identity(), Curve::identity(), Curve::identity()],
            cache: Memo::default(),
        }
    }
}

fn build_channels(stops: &[ColorStop], smooth: bool, repeat: bool) -> Result<[Curve; 3], String> {
    if stops.is_empty() {
        return Err("spectrum needs at least one stop".to_string());
    }
    if stops.windows(2).any(|pair| pair[1].position <= pair[0].position) {
        return Err("stop positions must be strictly increasing".to_string());
    }
    let interpolation = if smooth {
        Interpolation::Ease
    } else {
        Interpolation::Linear
    };
    let channel = |index: usize| {
        let points: Vec<[f64; 2]> = stops
            .iter()
            .map(|stop| [stop.position, f64::from(stop.color.channel(index))])
            .collect();
        Curve::new(&points, interpolation, repeat)
    };
    Ok([channel(0)?, channel(1)?, channel(2)?])
}

impl SpectrumModule {
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    fn rebuild(
        &mut self,
        stops: Vec<ColorStop>,
        smooth: bool,
        repeat: bool,
    ) -> Result<(), ParamError> {
        let channels = build_channels(&stops, smooth, repeat)
            .map_err(|message| ParamError::invalid("stops", message))?;
        self.stops = stops;
        self.smooth = smooth;
        self.repeat = repeat;
        self.channels = channels;
        self.cache.clear();
        Ok(())
    }

    fn compute_color(&self, inputs: &Inputs<'_>, blur: f64) -> RgbColor {
        let input = inputs.estimate(0, blur);
        let [red, green, blue] =
            [0, 1, 2].map(|c| self.channels[c].average(input.value, input.error) as f32);
        RgbColor::new(red, green, blue)
    }
}

impl Module for SpectrumModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Spectrum
    }

    fn inputs(&self) -> &[Port] {
        &INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &OUTPUTS
    }

    color_output!();

    fn params(&self) -> NodeParams {
        NodeParams::new()
            .with("stops", ParamValue::Stops(self.stops.clone()))
            .with("smooth", ParamValue::Bool(self.smooth))
            .with("repeat", ParamValue::Bool(self.repeat))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "stops" => match value {
                ParamValue::Stops(stops) => self.rebuild(stops, self.smooth, self.repeat),
                other => Err(wrong_type(key, "stops", &other)),
            },
            "smooth" => {
                let smooth = expect_bool(key, &value)?;
                self.rebuild(self.stops.clone(), smooth, self.repeat)
            }
            "repeat" => {
                let repeat = expect_bool(key, &value)?;
                self.rebuild(self.stops.clone(), self.smooth, repeat)
            }
            _ => Err(ParamError::Unknown(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{input, wired};
    use crate::modules::{CoordinateModule, NumberModule};
    use crate::point::{Axis, PointInfo};

    fn color_at(module: SpectrumModule, x: f64, size: f64) -> RgbColor {
        let mut procedure = wired(
            Box::new(module),
            vec![input(CoordinateModule::new(Axis::X))],
        );
        procedure.init_for_point(&PointInfo::new(x, 0.0, 0.0).with_size(size, 0.0, 0.0));
        procedure.output_color(1)
    }

    fn red_green() -> SpectrumModule {
        let mut module = SpectrumModule::default();
        module
            .set_param(
                "stops",
                ParamValue::Stops(vec![
                    ColorStop::new(0.0, RgbColor::new(1.0, 0.0, 0.0)),
                    ColorStop::new(1.0, RgbColor::new(0.0, 1.0, 0.0)),
                ]),
            )
            .expect("stops");
        module
    }

    #[test]
    fn default_is_a_gray_ramp() {
        let color = color_at(SpectrumModule::default(), 0.25, 0.0);
        assert!((color.red - 0.25).abs() < 1e-6);
        assert_eq!(color.red, color.blue);
    }

    #[test]
    fn interpolates_between_stops_and_clamps_outside() {
        let mid = color_at(red_green(), 0.5, 0.0);
        assert!((mid.red - 0.5).abs() < 1e-6);
        assert!((mid.green - 0.5).abs() < 1e-6);
        let beyond = color_at(red_green(), 3.0, 0.0);
        assert_eq!(beyond, RgbColor::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn footprint_averages_the_ramp() {
        // Mean of the clamped ramp over [-1, 1] is 0.25.
        let color = color_at(SpectrumModule::default(), 0.0, 2.0);
        assert!((color.red - 0.25).abs() < 1e-6);
    }

    #[test]
    fn repeat_wraps_the_input() {
        let mut module = red_green();
        module.set_param("repeat", ParamValue::Bool(true)).expect("repeat");
        let color = color_at(module, 2.25, 0.0);
        assert!((color.green - 0.25).abs() < 1e-6);
    }

    #[test]
    fn rejects_empty_or_unsorted_stops() {
        let mut module = SpectrumModule::default();
        assert!(module
            .set_param("stops", ParamValue::Stops(Vec::new()))
            .is_err());
        let unsorted = vec![
            ColorStop::new(0.5, RgbColor::WHITE),
            ColorStop::new(0.2, RgbColor::BLACK),
        ];
        assert!(module
            .set_param("stops", ParamValue::Stops(unsorted))
            .is_err());
        assert_eq!(module.stops().len(), 2);
    }

    #[test]
    fn single_stop_is_constant() {
        let mut module = SpectrumModule::default();
        module
            .set_param(
                "stops",
                ParamValue::Stops(vec![ColorStop::new(0.3, RgbColor::new(0.1, 0.2, 0.3))]),
            )
            .expect("stops");
        let mut procedure = wired(Box::new(module), vec![input(NumberModule::new(9.0))]);
        procedure.init_for_point(&PointInfo::default());
        assert_eq!(procedure.output_color(1), RgbColor::new(0.1, 0.2, 0.3));
    }
}
