use crate::math::RgbColor;
use crate::module::{Inputs, Memo, Module, Port};
use crate::modules_builtin::ModuleKind;

const COLOR_OUT: [Port; 1] = [Port::color("Color", RgbColor::BLACK)];

const RGB_INPUTS: [Port; 3] = [
    Port::number("Red", 0.0),
    Port::number("Green", 0.0),
    Port::number("Blue", 0.0),
];
const HSV_INPUTS: [Port; 3] = [
    Port::number("Hue", 0.0),
    Port::number("Saturation", 0.0),
    Port::number("Value", 0.0),
];
const HLS_INPUTS: [Port; 3] = [
    Port::number("Hue", 0.0),
    Port::number("Lightness", 0.0),
    Port::number("Saturation", 0.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Rgb,
    /// Hue in turns, saturation, value.
    Hsv,
    /// Hue in turns, lightness, saturation.
    Hls,
}

/// Assembles a color from three numeric components.
#[derive(Debug, Clone)]
pub struct ColorSpaceModule {
    space: ColorSpace,
    cache: Memo<RgbColor>,
}

impl ColorSpaceModule {
    pub fn new(space: ColorSpace) -> Self {
        Self {
            space,
            cache: Memo::default(),
        }
    }

    pub fn space(&self) -> ColorSpace {
        self.space
    }

    fn compute_color(&self, inputs: &Inputs<'_>, blur: f64) -> RgbColor {
        let [a, b, c] = [0, 1, 2].map(|port| inputs.value(port, blur) as f32);
        match self.space {
            ColorSpace::Rgb => RgbColor::new(a, b, c),
            ColorSpace::Hsv => RgbColor::from_hsv(a * 360.0, b, c),
            ColorSpace::Hls => RgbColor::from_hls(a * 360.0, b, c),
        }
    }
}

impl Module for ColorSpaceModule {
    fn kind(&self) -> ModuleKind {
        match self.space {
            ColorSpace::Rgb => ModuleKind::Rgb,
            ColorSpace::Hsv => ModuleKind::Hsv,
            ColorSpace::Hls => ModuleKind::Hls,
        }
    }

    fn inputs(&self) -> &[Port] {
        match self.space {
            ColorSpace::Rgb => &RGB_INPUTS,
            ColorSpace::Hsv => &HSV_INPUTS,
            ColorSpace::Hls => &HLS_INPUTS,
        }
    }

    fn outputs(&self) -> &[Port] {
        &COLOR_OUT
    }

    color_output!();
}

const BLEND_INPUTS: [Port; 3] = [
    Port::color("Color 1", RgbColor::BLACK),
    Port::color("Color 2", RgbColor::WHITE),
    Port::number("Fraction", 0.5),
];

/// Linear mix of two colors by a fraction clamped to `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct BlendModule {
    cache: Memo<RgbColor>,
}

impl BlendModule {
    fn compute_color(&self, inputs: &Inputs<'_>, blur: f64) -> RgbColor {
        let fraction = inputs.value(2, blur).clamp(0.0, 1.0) as f32;
        if fraction <= 0.0 {
            return inputs.color(0, blur);
        }
        if fraction >= 1.0 {
            return inputs.color(1, blur);
        }
        inputs.color(0, blur).lerp(inputs.color(1, blur), fraction)
    }
}

impl Module for BlendModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Blend
    }

    fn inputs(&self) -> &[Port] {
        &BLEND_INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &COLOR_OUT
    }

    color_output!();
}

const PAIR_INPUTS: [Port; 2] = [
    Port::color("Color 1", RgbColor::BLACK),
    Port::color("Color 2", RgbColor::BLACK),
];
const PRODUCT_INPUTS: [Port; 2] = [
    Port::color("Color 1", RgbColor::WHITE),
    Port::color("Color 2", RgbColor::WHITE),
];

/// Per-channel binary color operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOp {
    Lighter,
    Darker,
    Sum,
    Product,
}

impl ColorOp {
    fn apply(self, a: RgbColor, b: RgbColor) -> RgbColor {
        match self {
            ColorOp::Lighter => a.max(b),
            ColorOp::Darker => a.min(b),
            ColorOp::Sum => a + b,
            ColorOp::Product => a * b,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorOpModule {
    op: ColorOp,
    cache: Memo<RgbColor>,
}

impl ColorOpModule {
    pub fn new(op: ColorOp) -> Self {
        Self {
            op,
            cache: Memo::default(),
        }
    }

    fn compute_color(&self, inputs: &Inputs<'_>, blur: f64) -> RgbColor {
        self.op.apply(inputs.color(0, blur), inputs.color(1, blur))
    }
}

impl Module for ColorOpModule {
    fn kind(&self) -> ModuleKind {
        match self.op {
            ColorOp::Lighter => ModuleKind::Lighter,
            ColorOp::Darker => ModuleKind::Darker,
            ColorOp::Sum => ModuleKind::ColorSum,
            ColorOp::Product => ModuleKind::ColorProduct,
        }
    }

    fn inputs(&self) -> &[Port] {
        match self.op {
            ColorOp::Product => &PRODUCT_INPUTS,
            _ => &PAIR_INPUTS,
        }
    }

    fn outputs(&self) -> &[Port] {
        &COLOR_OUT
    }

    color_output!();
}

const SCALE_INPUTS: [Port; 2] = [
    Port::color("Color", RgbColor::WHITE),
    Port::number("Scale", 1.0),
];

/// Multiplies every channel of a color by a number.
#[derive(Debug, Clone, Default)]
pub struct ColorScaleModule {
    cache: Memo<RgbColor>,
}

impl ColorScaleModule {
    fn compute_color(&self, inputs: &Inputs<'_>, blur: f64) -> RgbColor {
        inputs.color(0, blur) * inputs.value(1, blur) as f32
    }
}

impl Module for ColorScaleModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::ColorScale
    }

    fn inputs(&self) -> &[Port] {
        &SCALE_INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &COLOR_OUT
    }

    color_output!();
}
