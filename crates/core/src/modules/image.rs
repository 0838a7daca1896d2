// Image lookup.
//
// The image covers `[0, scale.x] x [0, scale.y]` with its top row at the top.
// Lookups are box filtered through a summed-area table; the box is never
// narrower than one pixel, which makes point samples bilinear.

use std::sync::Arc;

use glam::DVec3;

use crate::math::RgbColor;
use crate::module::{Inputs, Memo, Module, Port};
use crate::modules_builtin::ModuleKind;
use crate::params::{
    expect_bool, expect_vec2, wrong_type, ImageData, NodeParams, ParamError, ParamValue,
};
use crate::point::{Axis, PointInfo};

const INPUTS: [Port; 2] = [Port::coordinate("X", Axis::X), Port::coordinate("Y", Axis::Y)];
const OUTPUTS: [Port; 4] = [
    Port::color("Color", RgbColor::BLACK),
    Port::number("Red", 0.0),
    Port::number("Green", 0.0),
    Port::number("Blue", 0.0),
];

/// How one axis extends the image beyond its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extend {
    /// Black outside.
    None,
    Tile,
    /// Tiles alternate with their mirror image.
    Mirror,
}

impl Extend {
    fn from_flags(tile: bool, mirror: bool) -> Self {
        match (tile, mirror) {
            (_, true) => Extend::Mirror,
            (true, false) => Extend::Tile,
            (false, false) => Extend::None,
        }
    }

    /// Writes the cumulative integral up to `x` on an axis of length `len`
    /// as a combination of in-range cumulative integrals: `(weight, position)`.
    fn cumulative_terms(self, x: f64, len: f64) -> Vec<(f64, f64)> {
        match self {
            Extend::None => vec![(1.0, x.clamp(0.0, len))],
            Extend::Tile => {
                let periods = (x / len).floor();
                vec![(periods, len), (1.0, x - periods * len)]
            }
            Extend::Mirror => {
                let periods = (x / (2.0 * len)).floor();
                let rest = x - periods * 2.0 * len;
                if rest <= len {
                    vec![(2.0 * periods, len), (1.0, rest)]
                } else {
                    vec![(2.0 * periods + 2.0, len), (-1.0, 2.0 * len - rest)]
                }
            }
        }
    }
}

/// Summed-area table with the bottom image row first.
#[derive(Debug)]
struct SummedArea {
    width: usize,
    height: usize,
    sums: Vec<[f64; 3]>,
}

impl SummedArea {
    fn new(image: &ImageData) -> Self {
        let (width, height) = (image.width as usize, image.height as usize);
        let stride = width + 1;
        let mut sums = vec![[0.0; 3]; stride * (height + 1)];
        for row in 0..height {
            let source = &image.pixels[(height - 1 - row) * width..(height - row) * width];
            for (col, pixel) in source.iter().enumerate() {
                let rgb = pixel.to_array();
                for c in 0..3 {
                    sums[(row + 1) * stride + col + 1][c] = f64::from(rgb[c])
                        + sums[row * stride + col + 1][c]
                        + sums[(row + 1) * stride + col][c]
                        - sums[row * stride + col][c];
                }
            }
        }
        Self {
            width,
            height,
            sums,
        }
    }

    fn corner(&self, col: usize, row: usize) -> [f64; 3] {
        self.sums[row * (self.width + 1) + col]
    }

    /// Integral over `[0, x] x [0, y]` in pixel units, both inside the image.
    fn integral(&self, x: f64, y: f64) -> [f64; 3] {
        let x = x.clamp(0.0, self.width as f64);
        let y = y.clamp(0.0, self.height as f64);
        let (col, row) = (
            (x.floor() as usize).min(self.width.saturating_sub(1)),
            (y.floor() as usize).min(self.height.saturating_sub(1)),
        );
        let (fx, fy) = (x - col as f64, y - row as f64);
        let (a, b) = (self.corner(col, row), self.corner(col + 1, row));
        let (c, d) = (self.corner(col, row + 1), self.corner(col + 1, row + 1));
        let mut out = [0.0; 3];
        for i in 0..3 {
            let bottom = a[i] + (b[i] - a[i]) * fx;
            let top = c[i] + (d[i] - c[i]) * fx;
            out[i] = bottom + (top - bottom) * fy;
        }
        out
    }
}

/// Channel means and their slopes in image-space units.
#[derive(Debug, Clone, Copy, Default)]
struct Lookup {
    mean: [f64; 3],
    slope_x: [f64; 3],
    slope_y: [f64; 3],
}

/// Looks up colors from a bitmap, with optional tiling and mirroring.
#[derive(Debug, Clone)]
pub struct ImageModule {
    image: ImageData,
    scale: [f64; 2],
    tile: [bool; 2],
    mirror: [bool; 2],
    table: Option<Arc<SummedArea>>,
    lookup: Memo<Lookup>,
}

impl Default for ImageModule {
    fn default() -> Self {
        Self {
            image: ImageData::default(),
            scale: [1.0, 1.0],
            tile: [false; 2],
            mirror: [false; 2],
            table: None,
            lookup: Memo::default(),
        }
    }
}

impl ImageModule {
    pub fn image(&self) -> &ImageData {
        &self.image
    }

    fn extend(&self, axis: usize) -> Extend {
        Extend::from_flags(self.tile[axis], self.mirror[axis])
    }

    /// Mean over `[x0, x1] x [y0, y1]` in pixel units.
    fn box_mean(&self, table: &SummedArea, x: [f64; 2], y: [f64; 2]) -> [f64; 3] {
        let (width, height) = (table.width as f64, table.height as f64);
        let cumulative = |px: f64, py: f64| {
            let mut total = [0.0; 3];
            for (wx, sx) in self.extend(0).cumulative_terms(px, width) {
                for (wy, sy) in self.extend(1).cumulative_terms(py, height) {
                    let part = table.integral(sx, sy);
                    for c in 0..3 {
                        total[c] += wx * wy * part[c];
                    }
                }
            }
            total
        };
        let (a, b) = (cumulative(x[1], y[1]), cumulative(x[0], y[1]));
        let (c, d) = (cumulative(x[1], y[0]), cumulative(x[0], y[0]));
        let area = (x[1] - x[0]) * (y[1] - y[0]);
        let mut mean = [0.0; 3];
        for i in 0..3 {
            mean[i] = (a[i] - b[i] - c[i] + d[i]) / area;
        }
        mean
    }

    fn compute_lookup(&self, inputs: &Inputs<'_>, blur: f64) -> Lookup {
        let Some(table) = self.table.as_deref() else {
            return Lookup::default();
        };
        let (x, y) = (inputs.estimate(0, blur), inputs.estimate(1, blur));
        let to_pixels = [
            table.width as f64 / self.scale[0],
            table.height as f64 / self.scale[1],
        ];
        let (px, py) = (x.value * to_pixels[0], y.value * to_pixels[1]);
        let hx = (x.error * to_pixels[0]).max(0.5);
        let hy = (y.error * to_pixels[1]).max(0.5);

        let mean = self.box_mean(table, [px - hx, px + hx], [py - hy, py + hy]);
        let right = self.box_mean(table, [px, px + 2.0 * hx], [py - hy, py + hy]);
        let left = self.box_mean(table, [px - 2.0 * hx, px], [py - hy, py + hy]);
        let up = self.box_mean(table, [px - hx, px + hx], [py, py + 2.0 * hy]);
        let down = self.box_mean(table, [px - hx, px + hx], [py - 2.0 * hy, py]);

        let mut lookup = Lookup {
            mean,
            ..Lookup::default()
        };
        for c in 0..3 {
            lookup.slope_x[c] = (right[c] - left[c]) / (2.0 * hx) * to_pixels[0];
            lookup.slope_y[c] = (up[c] - down[c]) / (2.0 * hy) * to_pixels[1];
        }
        lookup
    }

    fn sample(&self, inputs: &Inputs<'_>, blur: f64) -> Lookup {
        self.lookup
            .get_or_compute(blur, || self.compute_lookup(inputs, blur))
    }

    fn set_image(&mut self, image: ImageData) -> Result<(), ParamError> {
        let empty = image.width == 0 && image.height == 0 && image.pixels.is_empty();
        if !empty && !image.is_valid() {
            return Err(ParamError::invalid(
                "image",
                format!(
                    "expected {} pixels for {}x{}, got {}",
                    image.width as usize * image.height as usize,
                    image.width,
                    image.height,
                    image.pixels.len()
                ),
            ));
        }
        self.table = (!empty).then(|| Arc::new(SummedArea::new(&image)));
        self.image = image;
        Ok(())
    }
}

impl Module for ImageModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Image
    }

    fn inputs(&self) -> &[Port] {
        &INPUTS
    }

    fn outputs(&self) -> &[Port] {
        &OUTPUTS
    }

    fn init(&mut self, _point: &PointInfo) {
        self.lookup.clear();
    }

    fn color(&self, inputs: &Inputs<'_>, _which: usize, blur: f64) -> RgbColor {
        let [r, g, b] = self.sample(inputs, blur).mean;
        RgbColor::new(r as f32, g as f32, b as f32)
    }

    fn average_value(&self, inputs: &Inputs<'_>, which: usize, blur: f64) -> f64 {
        match which {
            1..=3 => self.sample(inputs, blur).mean[which - 1],
            _ => 0.0,
        }
    }

    fn value_error(&self, inputs: &Inputs<'_>, which: usize, blur: f64) -> f64 {
        if !(1..=3).contains(&which) {
            return 0.0;
        }
        let lookup = self.sample(inputs, blur);
        let c = which - 1;
        let spread = lookup.slope_x[c].abs() * inputs.error(0, blur)
            + lookup.slope_y[c].abs() * inputs.error(1, blur);
        spread.min(0.5)
    }

    fn value_gradient(&self, inputs: &Inputs<'_>, which: usize, blur: f64) -> DVec3 {
        if !(1..=3).contains(&which) {
            return DVec3::ZERO;
        }
        let lookup = self.sample(inputs, blur);
        let c = which - 1;
        inputs.gradient(0, blur) * lookup.slope_x[c] + inputs.gradient(1, blur) * lookup.slope_y[c]
    }

    fn params(&self) -> NodeParams {
        NodeParams::new()
            .with("image", ParamValue::Image(self.image.clone()))
            .with("scale", ParamValue::Vec2(self.scale))
            .with("tile_x", ParamValue::Bool(self.tile[0]))
            .with("tile_y", ParamValue::Bool(self.tile[1]))
            .with("mirror_x", ParamValue::Bool(self.mirror[0]))
            .with("mirror_y", ParamValue::Bool(self.mirror[1]))
    }

    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<(), ParamError> {
        match key {
            "image" => match value {
                ParamValue::Image(image) => self.set_image(image)?,
                other => return Err(wrong_type(key, "image", &other)),
            },
            "scale" => {
                let scale = expect_vec2(key, &value)?;
                if scale.iter().any(|s| *s <= 0.0) {
                    return Err(ParamError::invalid(key, "scale must be positive"));
                }
                self.scale = scale;
            }
            "tile_x" => self.tile[0] = expect_bool(key, &value)?,
            "tile_y" => self.tile[1] = expect_bool(key, &value)?,
            "mirror_x" => self.mirror[0] = expect_bool(key, &value)?,
            "mirror_y" => self.mirror[1] = expect_bool(key, &value)?,
            _ => return Err(ParamError::Unknown(key.to_string())),
        }
        self.lookup.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testing::{assert_close, wired_output};
    use crate::procedure::Procedure;

    /// 2x1 image: black on the left, white on the right.
    fn half_white() -> ImageModule {
        let mut module = ImageModule::default();
        module
            .set_param(
                "image",
                ParamValue::Image(ImageData::new(2, 1, vec![RgbColor::BLACK, RgbColor::WHITE])),
            )
            .expect("image");
        module
    }

    fn at(procedure: &mut Procedure, x: f64, y: f64, size: f64) {
        procedure.init_for_point(&PointInfo::new(x, y, 0.0).with_size(size, size, 0.0));
    }

    #[test]
    fn pixel_centers_are_exact() {
        let mut procedure = wired_output(Box::new(half_white()), Vec::new(), 0);
        at(&mut procedure, 0.25, 0.5, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::BLACK);
        at(&mut procedure, 0.75, 0.5, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::WHITE);
    }

    #[test]
    fn point_samples_interpolate_between_centers() {
        let mut procedure = wired_output(Box::new(half_white()), Vec::new(), 1);
        at(&mut procedure, 0.5, 0.5, 0.0);
        assert_close(procedure.output_value(0), 0.5);
        assert_close(procedure.output_gradient(0).x, 2.0);
        assert_eq!(procedure.output_gradient(0).y, 0.0);
    }

    #[test]
    fn outside_without_tiling_is_black() {
        let mut procedure = wired_output(Box::new(half_white()), Vec::new(), 0);
        at(&mut procedure, 3.75, 0.5, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::BLACK);
    }

    #[test]
    fn tiling_repeats_the_image() {
        let mut module = half_white();
        module.set_param("tile_x", ParamValue::Bool(true)).expect("tile");
        let mut procedure = wired_output(Box::new(module), Vec::new(), 0);
        at(&mut procedure, 3.75, 0.5, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::WHITE);
        at(&mut procedure, -0.75, 0.5, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::BLACK);
    }

    #[test]
    fn mirroring_reflects_alternate_tiles() {
        let mut module = half_white();
        module.set_param("mirror_x", ParamValue::Bool(true)).expect("mirror");
        let mut procedure = wired_output(Box::new(module), Vec::new(), 0);
        at(&mut procedure, 1.25, 0.5, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::WHITE);
        at(&mut procedure, 1.75, 0.5, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::BLACK);
    }

    #[test]
    fn large_footprint_averages_the_image() {
        let mut procedure = wired_output(Box::new(half_white()), Vec::new(), 2);
        at(&mut procedure, 0.5, 0.5, 1.0);
        assert_close(procedure.output_value(0), 0.5);
    }

    #[test]
    fn top_row_is_at_the_top() {
        let mut module = ImageModule::default();
        module
            .set_param(
                "image",
                ParamValue::Image(ImageData::new(1, 2, vec![RgbColor::WHITE, RgbColor::BLACK])),
            )
            .expect("image");
        let mut procedure = wired_output(Box::new(module), Vec::new(), 0);
        at(&mut procedure, 0.5, 0.75, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::WHITE);
    }

    #[test]
    fn rejects_mismatched_pixel_count() {
        let mut module = half_white();
        let bad = ImageData::new(3, 3, vec![RgbColor::WHITE; 4]);
        assert!(module.set_param("image", ParamValue::Image(bad)).is_err());
        assert_eq!(module.image().width, 2);
        assert!(module.set_param("scale", ParamValue::Vec2([0.0, 1.0])).is_err());
    }

    #[test]
    fn empty_image_is_black() {
        let mut procedure = wired_output(Box::new(ImageModule::default()), Vec::new(), 0);
        at(&mut procedure, 0.5, 0.5, 0.0);
        assert_eq!(procedure.output_color(1), RgbColor::BLACK);
    }
}
