mod curve;
mod expr;
mod math;
mod module;
mod modules;
mod modules_builtin;
mod noise;
mod params;
mod point;
mod procedure;
mod serial;

pub use curve::{Curve, Interpolation};
pub use expr::{
    compile, parse, Ast, BinaryOp, ExprError, Function, Program, Variable, MAX_EXPRESSION_DEPTH,
};
pub use math::{box_average, pulse_coverage, RgbColor};
pub use module::{
    DuplicateModule, Estimate, Inputs, Memo, Module, OutputCache, Port, PortDefault, PortType,
};
pub use modules::{
    AbsModule, AngleModule, BlendModule, BlurModule, BrickModule, CellsModule, CheckerModule,
    ClipModule, ColorModule, ColorOp, ColorOpModule, ColorScaleModule, ColorSpace,
    ColorSpaceModule, CommentModule, CompareModule, CoordinateModule, DifferenceModule,
    ExpressionInputModule, ExpressionModule, FunctionModule, GridModule, ImageModule,
    InterpolateModule, MarbleModule, ModModule, NoiseModule, NumberModule, PowerModule,
    ProductModule, RatioModule, ScaleShiftModule, SelectModule, ShapingModule, SpectrumModule,
    SumModule, Transcendental, TranscendentalModule, WoodModule,
};
pub use modules_builtin::{builtin_kind_from_name, default_params, ModuleKind};
pub use noise::{cell_features, perlin, CellFeatures, Fractal};
pub use params::{ColorStop, ImageData, NodeParams, ParamError, ParamValue};
pub use point::{Axis, PointInfo};
pub use procedure::{
    GraphError, Link, LinkTarget, ModuleSlot, OutputModule, Procedure, Source,
};
pub use serial::{SerialError, FORMAT_VERSION};
