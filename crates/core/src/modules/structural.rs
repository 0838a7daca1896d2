use glam::DVec3;

use crate::math::RgbColor;
use crate::module::{Inputs, Module, Port};
use crate::modules_builtin::ModuleKind;
use crate::params::{expect_color, expect_float, expect_int, NodeParams, ParamError, ParamValue};
use crate::point::Axis;

const VALUE_OUT: [Port; 1] = [Port::number("Value", 0.0)];
const COLOR_OUT: [Port; 1] = [Port::color("Color", RgbColor::BLACK)];

/// Passes one coordinate of the query point through.
#[derive(Debug, Clone)]
pub struct CoordinateModule {
    axis: Axis,
}

impl CoordinateModule {
    pub fn new(axis: Axis) -> Self {
        Self { axis }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }
}

impl Module for CoordinateModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Coordinate
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    fn average_value(&self, inputs: &Inputs<'_>, _which: usize, _blur: f64) -> f64 {
        inputs.point().coordinate(self.axis)
    }

    fn value_error(&self, inputs: &Inputs<'_>, _which: usize, blur: f64) -> f64 {
        inputs.point().coordinate_error(self.axis, blur)
    }

    fn value_gradient(&self, _inputs: &Inputs<'_>, _which: usize, _blur: f64) -> DVec3 {
        self.axis.unit()
    }

    fn params(&self) -> NodeParams {
        NodeParams::new().with("axis", ParamValue::Int(self.axis.index() as i32))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "axis" => {
                let index = expect_int(key, &value)?;
                self.axis = usize::try_from(index)
                    .ok()
                    .and_then(Axis::from_index)
                    .ok_or_else(|| ParamError::invalid(key, "axis must be 0 (x) to 3 (t)"))?;
                Ok(())
            }
            _ => Err(ParamError::Unknown(key.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumberModule {
    value: f64,
}

impl NumberModule {
    pub fn new(value: f64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Module for NumberModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Number
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    fn average_value(&self, _inputs: &Inputs<'_>, _which: usize, _blur: f64) -> f64 {
        self.value
    }

    fn params(&self) -> NodeParams {
        NodeParams::new().with("value", ParamValue::Float(self.value))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "value" => {
                self.value = expect_float(key, &value)?;
                Ok(())
            }
            _ => Err(ParamError::Unknown(key.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColorModule {
    color: RgbColor,
}

impl ColorModule {
    pub fn new(color: RgbColor) -> Self {
        Self { color }
    }
}

impl Module for ColorModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Color
    }

    fn outputs(&self) -> &[Port] {
        &COLOR_OUT
    }

    fn color(&self, _inputs: &Inputs<'_>, _which: usize, _blur: f64) -> RgbColor {
        self.color
    }

    fn params(&self) -> NodeParams {
        NodeParams::new().with("color", ParamValue::Color(self.color.to_array()))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "color" => {
                self.color = expect_color(key, &value)?;
                Ok(())
            }
            _ => Err(ParamError::Unknown(key.to_string())),
        }
    }
}

/// Free text attached to a procedure; has no ports.
#[derive(Debug, Clone, Default)]
pub struct CommentModule {
    text: String,
}

impl CommentModule {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Module for CommentModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Comment
    }

    fn outputs(&self) -> &[Port] {
        &[]
    }

    fn params(&self) -> NodeParams {
        NodeParams::new().with("text", ParamValue::Text(self.text.clone()))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match (key, value) {
            ("text", ParamValue::Text(text)) => {
                self.text = text;
                Ok(())
            }
            ("text", other) => Err(crate::params::wrong_type(key, "text", &other)),
            _ => Err(ParamError::Unknown(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{assert_close, wired};
    use crate::point::PointInfo;

    #[test]
    fn coordinate_reports_footprint_and_unit_gradient() {
        let mut procedure = wired(Box::new(CoordinateModule::new(Axis::Y)), Vec::new());
        procedure.init_for_point(&PointInfo::new(1.0, 2.5, 3.0).with_size(0.0, 0.4, 0.0));
        assert_close(procedure.output_value(0), 2.5);
        assert_close(procedure.output_error(0), 0.2);
        assert_eq!(procedure.output_gradient(0), DVec3::Y);
    }

    #[test]
    fn coordinate_rejects_bad_axis() {
        let mut module = CoordinateModule::new(Axis::X);
        assert!(module.set_param("axis", ParamValue::Int(4)).is_err());
        assert!(module.set_param("axis", ParamValue::Int(-1)).is_err());
        assert_eq!(module.axis(), Axis::X);
        module.set_param("axis", ParamValue::Int(3)).expect("time axis");
        assert_eq!(module.axis(), Axis::T);
    }

    #[test]
    fn number_is_exact() {
        let mut procedure = wired(Box::new(NumberModule::new(4.25)), Vec::new());
        procedure.init_for_point(&PointInfo::new(9.0, 9.0, 9.0).with_size(1.0, 1.0, 1.0));
        assert_eq!(procedure.output_value(0), 4.25);
        assert_eq!(procedure.output_error(0), 0.0);
        assert_eq!(procedure.output_gradient(0), DVec3::ZERO);
    }

    #[test]
    fn color_constant_reaches_color_sink() {
        let color = RgbColor::new(0.1, 0.2, 0.3);
        let mut procedure = wired(Box::new(ColorModule::new(color)), Vec::new());
        procedure.init_for_point(&PointInfo::default());
        assert_eq!(procedure.output_color(1), color);
    }

    #[test]
    fn comment_keeps_text() {
        let mut module = CommentModule::default();
        module
            .set_param("text", ParamValue::Text("wood grain".to_string()))
            .expect("text");
        assert_eq!(module.text(), "wood grain");
        assert!(module.set_param("text", ParamValue::Bool(true)).is_err());
    }
}
