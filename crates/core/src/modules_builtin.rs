use crate::module::Module;
use crate::modules::*;
use crate::params::NodeParams;
use crate::point::Axis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Coordinate,
    Number,
    Color,
    Function,
    Comment,
    Sum,
    Difference,
    Product,
    Ratio,
    Mod,
    Power,
    Min,
    Max,
    Compare,
    Abs,
    Clip,
    ScaleShift,
    Interpolate,
    Blur,
    Sine,
    Cosine,
    Sqrt,
    Exp,
    Log,
    Bias,
    Gain,
    Angle,
    Checker,
    Brick,
    Grid,
    Cells,
    Noise,
    Turbulence,
    Marble,
    Wood,
    Rgb,
    Hsv,
    Hls,
    Blend,
    Lighter,
    Darker,
    ColorSum,
    ColorProduct,
    ColorScale,
    Spectrum,
    Image,
    Expression,
    ExpressionInput,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 48] = [
        ModuleKind::Coordinate,
        ModuleKind::Number,
        ModuleKind::Color,
        ModuleKind::Function,
        ModuleKind::Comment,
        ModuleKind::Sum,
        ModuleKind::Difference,
        ModuleKind::Product,
        ModuleKind::Ratio,
        ModuleKind::Mod,
        ModuleKind::Power,
        ModuleKind::Min,
        ModuleKind::Max,
        ModuleKind::Compare,
        ModuleKind::Abs,
        ModuleKind::Clip,
        ModuleKind::ScaleShift,
        ModuleKind::Interpolate,
        ModuleKind::Blur,
        ModuleKind::Sine,
        ModuleKind::Cosine,
        ModuleKind::Sqrt,
        ModuleKind::Exp,
        ModuleKind::Log,
        ModuleKind::Bias,
        ModuleKind::Gain,
        ModuleKind::Angle,
        ModuleKind::Checker,
        ModuleKind::Brick,
        ModuleKind::Grid,
        ModuleKind::Cells,
        ModuleKind::Noise,
        ModuleKind::Turbulence,
        ModuleKind::Marble,
        ModuleKind::Wood,
        ModuleKind::Rgb,
        ModuleKind::Hsv,
        ModuleKind::Hls,
        ModuleKind::Blend,
        ModuleKind::Lighter,
        ModuleKind::Darker,
        ModuleKind::ColorSum,
        ModuleKind::ColorProduct,
        ModuleKind::ColorScale,
        ModuleKind::Spectrum,
        ModuleKind::Image,
        ModuleKind::Expression,
        ModuleKind::ExpressionInput,
    ];

    /// Stable tag written to serialized procedures.
    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::Coordinate => "Coordinate",
            ModuleKind::Number => "Number",
            ModuleKind::Color => "Color",
            ModuleKind::Function => "Function",
            ModuleKind::Comment => "Comment",
            ModuleKind::Sum => "Sum",
            ModuleKind::Difference => "Difference",
            ModuleKind::Product => "Product",
            ModuleKind::Ratio => "Ratio",
            ModuleKind::Mod => "Mod",
            ModuleKind::Power => "Power",
            ModuleKind::Min => "Min",
            ModuleKind::Max => "Max",
            ModuleKind::Compare => "Compare",
            ModuleKind::Abs => "Abs",
            ModuleKind::Clip => "Clip",
            ModuleKind::ScaleShift => "ScaleShift",
            ModuleKind::Interpolate => "Interpolate",
            ModuleKind::Blur => "Blur",
            ModuleKind::Sine => "Sine",
            ModuleKind::Cosine => "Cosine",
            ModuleKind::Sqrt => "Sqrt",
            ModuleKind::Exp => "Exp",
            ModuleKind::Log => "Log",
            ModuleKind::Bias => "Bias",
            ModuleKind::Gain => "Gain",
            ModuleKind::Angle => "Angle",
            ModuleKind::Checker => "Checker",
            ModuleKind::Brick => "Brick",
            ModuleKind::Grid => "Grid",
            ModuleKind::Cells => "Cells",
            ModuleKind::Noise => "Noise",
            ModuleKind::Turbulence => "Turbulence",
            ModuleKind::Marble => "Marble",
            ModuleKind::Wood => "Wood",
            ModuleKind::Rgb => "RGB",
            ModuleKind::Hsv => "HSV",
            ModuleKind::Hls => "HLS",
            ModuleKind::Blend => "Blend",
            ModuleKind::Lighter => "Lighter",
            ModuleKind::Darker => "Darker",
            ModuleKind::ColorSum => "ColorSum",
            ModuleKind::ColorProduct => "ColorProduct",
            ModuleKind::ColorScale => "ColorScale",
            ModuleKind::Spectrum => "Spectrum",
            ModuleKind::Image => "Image",
            ModuleKind::Expression => "Expression",
            ModuleKind::ExpressionInput => "ExpressionInput",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            ModuleKind::Coordinate
            | ModuleKind::Number
            | ModuleKind::Color
            | ModuleKind::Function
            | ModuleKind::Comment => "Values",
            ModuleKind::Sum
            | ModuleKind::Difference
            | ModuleKind::Product
            | ModuleKind::Ratio
            | ModuleKind::Mod
            | ModuleKind::Power
            | ModuleKind::Min
            | ModuleKind::Max
            | ModuleKind::Compare
            | ModuleKind::Abs
            | ModuleKind::Clip
            | ModuleKind::ScaleShift
            | ModuleKind::Interpolate
            | ModuleKind::Blur => "Operators",
            ModuleKind::Sine
            | ModuleKind::Cosine
            | ModuleKind::Sqrt
            | ModuleKind::Exp
            | ModuleKind::Log
            | ModuleKind::Bias
            | ModuleKind::Gain
            | ModuleKind::Angle => "Functions",
            ModuleKind::Checker
            | ModuleKind::Brick
            | ModuleKind::Grid
            | ModuleKind::Cells
            | ModuleKind::Noise
            | ModuleKind::Turbulence
            | ModuleKind::Marble
            | ModuleKind::Wood => "Patterns",
            ModuleKind::Rgb
            | ModuleKind::Hsv
            | ModuleKind::Hls
            | ModuleKind::Blend
            | ModuleKind::Lighter
            | ModuleKind::Darker
            | ModuleKind::ColorSum
            | ModuleKind::ColorProduct
            | ModuleKind::ColorScale
            | ModuleKind::Spectrum
            | ModuleKind::Image => "Colors",
            ModuleKind::Expression | ModuleKind::ExpressionInput => "Expressions",
        }
    }

    /// A fresh module of this kind with default parameters.
    pub fn create(self) -> Box<dyn Module> {
        match self {
            ModuleKind::Coordinate => Box::new(CoordinateModule::new(Axis::X)),
            ModuleKind::Number => Box::new(NumberModule::new(0.0)),
            ModuleKind::Color => Box::new(ColorModule::default()),
            ModuleKind::Function => Box::new(FunctionModule::default()),
            ModuleKind::Comment => Box::new(CommentModule::default()),
            ModuleKind::Sum => Box::new(SumModule::default()),
            ModuleKind::Difference => Box::new(DifferenceModule::default()),
            ModuleKind::Product => Box::new(ProductModule::default()),
            ModuleKind::Ratio => Box::new(RatioModule::default()),
            ModuleKind::Mod => Box::new(ModModule::default()),
            ModuleKind::Power => Box::new(PowerModule::default()),
            ModuleKind::Min => Box::new(SelectModule::min()),
            ModuleKind::Max => Box::new(SelectModule::max()),
            ModuleKind::Compare => Box::new(CompareModule::default()),
            ModuleKind::Abs => Box::new(AbsModule::default()),
            ModuleKind::Clip => Box::new(ClipModule::default()),
            ModuleKind::ScaleShift => Box::new(ScaleShiftModule::default()),
            ModuleKind::Interpolate => Box::new(InterpolateModule::default()),
            ModuleKind::Blur => Box::new(BlurModule::default()),
            ModuleKind::Sine => Box::new(TranscendentalModule::new(Transcendental::Sine)),
            ModuleKind::Cosine => Box::new(TranscendentalModule::new(Transcendental::Cosine)),
            ModuleKind::Sqrt => Box::new(TranscendentalModule::new(Transcendental::Sqrt)),
            ModuleKind::Exp => Box::new(TranscendentalModule::new(Transcendental::Exp)),
            ModuleKind::Log => Box::new(TranscendentalModule::new(Transcendental::Log)),
            ModuleKind::Bias => Box::new(ShapingModule::bias()),
            ModuleKind::Gain => Box::new(ShapingModule::gain()),
            ModuleKind::Angle => Box::new(AngleModule::default()),
            ModuleKind::Checker => Box::new(CheckerModule::default()),
            ModuleKind::Brick => Box::new(BrickModule::default()),
            ModuleKind::Grid => Box::new(GridModule::default()),
            ModuleKind::Cells => Box::new(CellsModule::default()),
            ModuleKind::Noise => Box::new(NoiseModule::noise()),
            ModuleKind::Turbulence => Box::new(NoiseModule::turbulence()),
            ModuleKind::Marble => Box::new(MarbleModule::default()),
            ModuleKind::Wood => Box::new(WoodModule::default()),
            ModuleKind::Rgb => Box::new(ColorSpaceModule::new(ColorSpace::Rgb)),
            ModuleKind::Hsv => Box::new(ColorSpaceModule::new(ColorSpace::Hsv)),
            ModuleKind::Hls => Box::new(ColorSpaceModule::new(ColorSpace::Hls)),
            ModuleKind::Blend => Box::new(BlendModule::default()),
            ModuleKind::Lighter => Box::new(ColorOpModule::new(ColorOp::Lighter)),
            ModuleKind::Darker => Box::new(ColorOpModule::new(ColorOp::Darker)),
            ModuleKind::ColorSum => Box::new(ColorOpModule::new(ColorOp::Sum)),
            ModuleKind::ColorProduct => Box::new(ColorOpModule::new(ColorOp::Product)),
            ModuleKind::ColorScale => Box::new(ColorScaleModule::default()),
            ModuleKind::Spectrum => Box::new(SpectrumModule::default()),
            ModuleKind::Image => Box::new(ImageModule::default()),
            ModuleKind::Expression => Box::new(ExpressionModule::default()),
            ModuleKind::ExpressionInput => Box::new(ExpressionInputModule::new(0)),
        }
    }
}

pub fn builtin_kind_from_name(name: &str) -> Option<ModuleKind> {
    ModuleKind::ALL.into_iter().find(|kind| kind.name() == name)
}

pub fn default_params(kind: ModuleKind) -> NodeParams {
    kind.create().params()
}
