use std::slice;

use glam::DVec3;

use crate::expr::{compile, ExprError, Program, EXPRESSION_INPUTS};
use crate::module::{Inputs, Module, Port};
use crate::modules_builtin::ModuleKind;
use crate::params::{expect_int, wrong_type, NodeParams, ParamError, ParamValue};
use crate::point::PointInfo;

const INPUTS: [Port; EXPRESSION_INPUTS] = [
    Port::number("input1", 0.0),
    Port::number("input2", 0.0),
    Port::number("input3", 0.0),
];
const VALUE_OUT: [Port; 1] = [Port::number("Value", 0.0)];

/// Evaluates an infix expression over the query point and its inputs.
///
/// The text is compiled into a private sub-graph; a text that fails to
/// compile keeps its diagnostics in [`ExpressionModule::errors`] and
/// evaluates to 0.
#[derive(Debug, Clone)]
pub struct ExpressionModule {
    text: String,
    program: Program,
    errors: Vec<ExprError>,
}

impl Default for ExpressionModule {
    fn default() -> Self {
        Self::new("x")
    }
}

impl ExpressionModule {
    pub fn new(text: impl Into<String>) -> Self {
        let mut module = Self {
            text: String::new(),
            program: Program::zero(),
            errors: Vec::new(),
        };
        module.set_text(text.into());
        module
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Diagnostics from the last compile; empty when it succeeded.
    pub fn errors(&self) -> &[ExprError] {
        &self.errors
    }

    fn set_text(&mut self, text: String) {
        match compile(&text) {
            Ok(program) => {
                self.program = program;
                self.errors.clear();
            }
            Err(errors) => {
                tracing::warn!(
                    "expression '{}' failed to compile: {}",
                    text,
                    errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ")
                );
                self.program = Program::zero();
                self.errors = errors;
            }
        }
        self.text = text;
    }

    /// Runs `eval` against the program's root, with `outer` visible to the
    /// expression's input modules.
    fn evaluate<T>(&self, outer: &Inputs<'_>, eval: impl FnOnce(&Inputs<'_>) -> T) -> T {
        let root = Some(self.program.root);
        let inner = Inputs::new(
            &self.program.slots,
            slice::from_ref(&root),
            &VALUE_OUT,
            outer.point(),
            Some(outer),
        );
        eval(&inner)
    }
}

impl Module for ExpressionModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Expression
    }

    fn inputs(&self) -> &[Port] {
        &INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    fn init(&mut self, point: &PointInfo) {
        for slot in &mut self.program.slots {
            slot.module.init(point);
        }
    }

    fn average_value(&self, inputs: &Inputs<'_>, _which: usize, blur: f64) -> f64 {
        self.evaluate(inputs, |inner| inner.value(0, blur))
    }

    fn value_error(&self, inputs: &Inputs<'_>, _which: usize, blur: f64) -> f64 {
        self.evaluate(inputs, |inner| inner.error(0, blur))
    }

    fn value_gradient(&self, inputs: &Inputs<'_>, _which: usize, blur: f64) -> DVec3 {
        self.evaluate(inputs, |inner| inner.gradient(0, blur))
    }

    fn params(&self) -> NodeParams {
        NodeParams::new().with("expr", ParamValue::Text(self.text.clone()))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "expr" => match value {
                ParamValue::Text(text) => {
                    self.set_text(text);
                    Ok(())
                }
                other => Err(wrong_type(key, "text", &other)),
            },
            _ => Err(ParamError::Unknown(key.to_string())),
        }
    }
}

/// Reads one input of the enclosing expression module.
#[derive(Debug, Clone)]
pub struct ExpressionInputModule {
    index: usize,
}

impl ExpressionInputModule {
    pub fn new(index: usize) -> Self {
        Self {
            index: index.min(EXPRESSION_INPUTS - 1),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Module for ExpressionInputModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::ExpressionInput
    }

    fn outputs(&self) -> &[Port] {
        &VALUE_OUT
    }

    fn average_value(&self, inputs: &Inputs<'_>, _which: usize, blur: f64) -> f64 {
        inputs
            .outer()
            .map_or(0.0, |outer| outer.value(self.index, blur))
    }

    fn value_error(&self, inputs: &Inputs<'_>, _which: usize, blur: f64) -> f64 {
        inputs
            .outer()
            .map_or(0.0, |outer| outer.error(self.index, blur))
    }

    fn value_gradient(&self, inputs: &Inputs<'_>, _which: usize, blur: f64) -> DVec3 {
        inputs
            .outer()
            .map_or(DVec3::ZERO, |outer| outer.gradient(self.index, blur))
    }

    fn params(&self) -> NodeParams {
        NodeParams::new().with("index", ParamValue::Int(self.index as i32))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "index" => {
                let index = expect_int(key, &value)?;
                self.index = usize::try_from(index)
                    .ok()
                    .filter(|index| *index < EXPRESSION_INPUTS)
                    .ok_or_else(|| ParamError::invalid(key, "index must be 0 to 2"))?;
                Ok(())
            }
            _ => Err(ParamError::Unknown(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{assert_close, input, wired};
    use crate::modules::{CoordinateModule, NumberModule};
    use crate::point::Axis;
    use crate::procedure::Procedure;

    fn at(mut procedure: Procedure, point: PointInfo) -> (f64, f64, DVec3) {
        procedure.init_for_point(&point);
        (
            procedure.output_value(0),
            procedure.output_error(0),
            procedure.output_gradient(0),
        )
    }

    #[test]
    fn sine_plus_constant() {
        let procedure = wired(Box::new(ExpressionModule::new("sin(x)+2")), Vec::new());
        let (value, _, gradient) = at(procedure, PointInfo::new(0.0, 0.0, 0.0));
        assert_close(value, 2.0);
        assert_close(gradient.x, 1.0);
        assert_close(gradient.y, 0.0);
        assert_close(gradient.z, 0.0);
    }

    #[test]
    fn operator_precedence() {
        for (text, expected) in [
            ("1 + 2 * 3", 7.0),
            ("(1 + 2) * 3", 9.0),
            ("2 ^ 3 ^ 2", 64.0),
            ("7 % 4", 3.0),
            ("10 - 4 - 3", 3.0),
            ("-x^2", 9.0),
            ("max(x, 5) / 2", 2.5),
        ] {
            let procedure = wired(Box::new(ExpressionModule::new(text)), Vec::new());
            let (value, _, _) = at(procedure, PointInfo::new(-3.0, 0.0, 0.0));
            assert_close(value, expected);
        }
    }

    #[test]
    fn inputs_come_from_the_enclosing_module() {
        let procedure = wired(
            Box::new(ExpressionModule::new("input1 * x + input3")),
            vec![
                input(CoordinateModule::new(Axis::Y)),
                None,
                input(NumberModule::new(0.5)),
            ],
        );
        let (value, _, gradient) = at(procedure, PointInfo::new(2.0, 3.0, 0.0));
        assert_close(value, 6.5);
        assert_close(gradient.x, 3.0);
        assert_close(gradient.y, 2.0);
    }

    #[test]
    fn nested_expressions_see_their_own_inputs() {
        let procedure = wired(
            Box::new(ExpressionModule::new("input1 ^ 2")),
            vec![input(ExpressionModule::new("x * 3 + input1"))],
        );
        let (value, _, _) = at(procedure, PointInfo::new(2.0, 0.0, 0.0));
        assert_close(value, 36.0);
    }

    #[test]
    fn footprint_flows_through_coordinates() {
        let procedure = wired(Box::new(ExpressionModule::new("x")), Vec::new());
        let (_, error, _) = at(procedure, PointInfo::new(0.0, 0.0, 0.0).with_size(0.5, 0.0, 0.0));
        assert_close(error, 0.25);
    }

    #[test]
    fn bad_text_keeps_diagnostics_and_evaluates_to_zero() {
        let mut module = ExpressionModule::default();
        module
            .set_param("expr", ParamValue::Text("sin(x".to_string()))
            .expect("text is stored");
        assert_eq!(module.errors(), &[ExprError::UnmatchedParen]);
        assert_eq!(module.text(), "sin(x");
        let procedure = wired(Box::new(module), Vec::new());
        let (value, _, gradient) = at(procedure, PointInfo::new(1.0, 0.0, 0.0));
        assert_eq!(value, 0.0);
        assert_eq!(gradient, DVec3::ZERO);
    }

    #[test]
    fn runaway_nesting_falls_back_to_zero() {
        let text = format!("{}x{}", "(".repeat(100_000), ")".repeat(100_000));
        let module = ExpressionModule::new(&text);
        assert_eq!(module.errors(), &[ExprError::TooDeep]);
        let procedure = wired(Box::new(module), Vec::new());
        let (value, _, _) = at(procedure, PointInfo::new(1.0, 0.0, 0.0));
        assert_eq!(value, 0.0);
    }

    #[test]
    fn recompiling_clears_diagnostics() {
        let mut module = ExpressionModule::new("nope");
        assert_eq!(module.errors().len(), 1);
        module
            .set_param("expr", ParamValue::Text("y + 1".to_string()))
            .expect("text");
        assert!(module.errors().is_empty());
        assert!(module.set_param("expr", ParamValue::Float(1.0)).is_err());
    }

    #[test]
    fn copies_evaluate_independently() {
        let original = ExpressionModule::new("x * 2");
        let mut copy = original.clone();
        copy.set_param("expr", ParamValue::Text("x * 5".to_string()))
            .expect("text");
        let point = PointInfo::new(1.0, 0.0, 0.0);
        let (a, _, _) = at(wired(Box::new(original), Vec::new()), point);
        let (b, _, _) = at(wired(Box::new(copy), Vec::new()), point);
        assert_close(a, 2.0);
        assert_close(b, 5.0);
    }

    #[test]
    fn input_module_without_enclosing_expression_is_zero() {
        let procedure = wired(Box::new(ExpressionInputModule::new(1)), Vec::new());
        let (value, error, _) = at(procedure, PointInfo::new(4.0, 0.0, 0.0));
        assert_eq!(value, 0.0);
        assert_eq!(error, 0.0);
    }

    #[test]
    fn input_index_is_validated() {
        let mut module = ExpressionInputModule::new(0);
        assert!(module.set_param("index", ParamValue::Int(3)).is_err());
        module.set_param("index", ParamValue::Int(2)).expect("index");
        assert_eq!(module.index(), 2);
    }
}
