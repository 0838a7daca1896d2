/// Implements `init` and the three numeric `Module` methods for a module
/// with a single numeric output, an `OutputCache` field named `cache`, and
/// inherent `compute_estimate` / `compute_gradient` methods.
macro_rules! single_output {
    () => {
        fn init(&mut self, _point: &crate::point::PointInfo) {
            self.cache.clear();
        }

        fn average_value(
            &self,
            inputs: &crate::module::Inputs<'_>,
            _which: usize,
            blur: f64,
        ) -> f64 {
            self.cache
                .estimate
                .get_or_compute(blur, || self.compute_estimate(inputs, blur))
                .value
        }

        fn value_error(
            &self,
            inputs: &crate::module::Inputs<'_>,
            _which: usize,
            blur: f64,
        ) -> f64 {
            self.cache
                .estimate
                .get_or_compute(blur, || self.compute_estimate(inputs, blur))
                .error
        }

        fn value_gradient(
            &self,
            inputs: &crate::module::Inputs<'_>,
            _which: usize,
            blur: f64,
        ) -> glam::DVec3 {
            self.cache
                .gradient
                .get_or_compute(blur, || self.compute_gradient(inputs, blur))
        }
    };
}

/// Implements `init` and `color` for a module with one color output, a
/// `Memo<RgbColor>` field named `cache`, and an inherent `compute_color`.
macro_rules! color_output {
    () => {
        fn init(&mut self, _point: &crate::point::PointInfo) {
            self.cache.clear();
        }

        fn color(
            &self,
            inputs: &crate::module::Inputs<'_>,
            _which: usize,
            blur: f64,
        ) -> crate::math::RgbColor {
            self.cache
                .get_or_compute(blur, || self.compute_color(inputs, blur))
        }
    };
}

mod arithmetic;
mod color;
mod expression;
mod function;
mod image;
mod pattern;
mod select;
mod spectrum;
mod structural;
mod texture;
mod transcendental;

pub use arithmetic::{
    AbsModule, BlurModule, ClipModule, DifferenceModule, InterpolateModule, ModModule,
    PowerModule, ProductModule, RatioModule, ScaleShiftModule, SumModule,
};
pub use color::{
    BlendModule, ColorOp, ColorOpModule, ColorScaleModule, ColorSpace, ColorSpaceModule,
};
pub use expression::{ExpressionInputModule, ExpressionModule};
pub use function::FunctionModule;
pub use image::ImageModule;
pub use pattern::{BrickModule, CheckerModule, GridModule};
pub use select::{CompareModule, SelectModule};
pub use spectrum::SpectrumModule;
pub use structural::{ColorModule, CommentModule, CoordinateModule, NumberModule};
pub use texture::{CellsModule, MarbleModule, NoiseModule, WoodModule};
pub use transcendental::{AngleModule, ShapingModule, Transcendental, TranscendentalModule};

/// Half-width of a value in `[0, 1]` that is ambiguous over the footprint.
pub(crate) fn coverage_error(value: f64, mixed: bool) -> f64 {
    if mixed {
        value.min(1.0 - value).max(0.0)
    } else {
        0.0
    }
}
