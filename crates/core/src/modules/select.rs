// Threshold modules that pick between their inputs.
//
// When the two uncertainty intervals overlap the choice is ambiguous, so the
// result blends both branches by how far apart the values are relative to
// the combined error instead of switching abruptly.

use glam::DVec3;

use crate::math::saturate;
use crate::module::{Estimate, Inputs, Module, OutputCache, Port};
use crate::modules::coverage_error;
use crate::modules_builtin::ModuleKind;

const INPUTS: [Port; 2] = [Port::number("Value 1", 0.0), Port::number("Value 2", 0.0)];
const OUTPUTS: [Port; 1] = [Port::number("Value", 0.0)];

/// Weight of the first input given a signed margin in its favor.
fn first_weight(margin: f64, width: f64) -> f64 {
    if margin.abs() >= width {
        if margin >= 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        0.5 + 0.5 * margin / width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    Min,
    Max,
}

/// Min or max of two inputs.
#[derive(Debug, Clone)]
pub struct SelectModule {
    pick: Pick,
    cache: OutputCache,
}

impl SelectModule {
    pub fn min() -> Self {
        Self {
            pick: Pick::Min,
            cache: OutputCache::default(),
        }
    }

    pub fn max() -> Self {
        Self {
            pick: Pick::Max,
            cache: OutputCache::default(),
        }
    }

    fn weight(&self, a: Estimate, b: Estimate) -> f64 {
        let margin = match self.pick {
            Pick::Min => b.value - a.value,
            Pick::Max => a.value - b.value,
        };
        first_weight(margin, a.error + b.error)
    }

    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (a, b) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let w = self.weight(a, b);
        let value = w * a.value + (1.0 - w) * b.value;
        let error = w * a.error
            + (1.0 - w) * b.error
            + 2.0 * w * (1.0 - w) * (a.value - b.value).abs();
        Estimate::new(value, saturate(error))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let w = self.weight(inputs.estimate(0, blur), inputs.estimate(1, blur));
        let mut gradient = DVec3::ZERO;
        if w > 0.0 {
            gradient += inputs.gradient(0, blur) * w;
        }
        if w < 1.0 {
            gradient += inputs.gradient(1, blur) * (1.0 - w);
        }
        gradient
    }
}

impl Module for SelectModule {
    fn kind(&self) -> ModuleKind {
        match self.pick {
            Pick::Min => ModuleKind::Min,
            Pick::Max => ModuleKind::Max,
        }
    }

    fn inputs(&self) -> &[Port] {
        &INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &OUTPUTS
    }

    single_output!();
}

/// 1 where `Value 1 > Value 2`, else 0; ramps across the ambiguous band.
#[derive(Debug, Clone, Default)]
pub struct CompareModule {
    cache: OutputCache,
}

impl CompareModule {
    fn compute_estimate(&self, inputs: &Inputs<'_>, blur: f64) -> Estimate {
        let (a, b) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let margin = a.value - b.value;
        let width = a.error + b.error;
        if margin.abs() >= width {
            let value = if margin > 0.0 { 1.0 } else { 0.0 };
            return Estimate::exact(value);
        }
        let value = 0.5 + 0.5 * margin / width;
        Estimate::new(value, coverage_error(value, true))
    }

    fn compute_gradient(&self, inputs: &Inputs<'_>, blur: f64) -> DVec3 {
        let (a, b) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let width = a.error + b.error;
        if (a.value - b.value).abs() >= width {
            return DVec3::ZERO;
        }
        (inputs.gradient(0, blur) - inputs.gradient(1, blur)) * (0.5 / width)
    }
}

impl Module for CompareModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Compare
    }

    fn inputs(&self) -> &[Port] {
        &INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &OUTPUTS
    }

    single_output!();
}
