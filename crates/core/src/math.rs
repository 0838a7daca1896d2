use std::ops::{Add, Mul, Sub};

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Linear RGB triple used by every color-valued port.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RgbColor {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor::new(0.0, 0.0, 0.0);
    pub const WHITE: RgbColor = RgbColor::new(1.0, 1.0, 1.0);

    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    pub fn gray(value: f32) -> Self {
        Self::new(value, value, value)
    }

    pub fn from_array(rgb: [f32; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }

    /// Builds a color from hue (degrees, wraps), saturation and value.
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        if saturation <= 0.0 {
            return Self::gray(value);
        }
        let h = hue.rem_euclid(360.0) / 60.0;
        let sector = h.floor();
        let f = h - sector;
        let p = value * (1.0 - saturation);
        let q = value * (1.0 - saturation * f);
        let t = value * (1.0 - saturation * (1.0 - f));
        match sector as i32 {
            0 => Self::new(value, t, p),
            1 => Self::new(q, value, p),
            2 => Self::new(p, value, t),
            3 => Self::new(p, q, value),
            4 => Self::new(t, p, value),
            _ => Self::new(value, p, q),
        }
    }

    /// Builds a color from hue (degrees, wraps), lightness and saturation.
    pub fn from_hls(hue: f32, lightness: f32, saturation: f32) -> Self {
        if saturation <= 0.0 {
            return Self::gray(lightness);
        }
        let q = if lightness < 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - lightness * saturation
        };
        let p = 2.0 * lightness - q;
        let h = hue.rem_euclid(360.0) / 360.0;
        Self::new(
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        )
    }

    /// Returns (hue in degrees, saturation, value).
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let max = self.red.max(self.green).max(self.blue);
        let min = self.red.min(self.green).min(self.blue);
        let delta = max - min;
        if max <= 0.0 || delta <= 0.0 {
            return (0.0, 0.0, max.max(0.0));
        }
        (hue_degrees(self, max, delta), delta / max, max)
    }

    /// Returns (hue in degrees, lightness, saturation).
    pub fn to_hls(self) -> (f32, f32, f32) {
        let max = self.red.max(self.green).max(self.blue);
        let min = self.red.min(self.green).min(self.blue);
        let lightness = 0.5 * (max + min);
        let delta = max - min;
        if delta <= 0.0 {
            return (0.0, lightness, 0.0);
        }
        let saturation = if lightness <= 0.5 {
            delta / (max + min)
        } else {
            delta / (2.0 - max - min)
        };
        (hue_degrees(self, max, delta), lightness, saturation)
    }

    pub fn luminance(self) -> f32 {
        0.2126 * self.red + 0.7152 * self.green + 0.0722 * self.blue
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.red.max(other.red),
            self.green.max(other.green),
            self.blue.max(other.blue),
        )
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(
            self.red.min(other.red),
            self.green.min(other.green),
            self.blue.min(other.blue),
        )
    }

    pub fn channel(self, index: usize) -> f32 {
        match index {
            0 => self.red,
            1 => self.green,
            _ => self.blue,
        }
    }
}

impl Add for RgbColor {
    type Output = RgbColor;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.red + rhs.red, self.green + rhs.green, self.blue + rhs.blue)
    }
}

impl Sub for RgbColor {
    type Output = RgbColor;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.red - rhs.red, self.green - rhs.green, self.blue - rhs.blue)
    }
}

impl Mul for RgbColor {
    type Output = RgbColor;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.red * rhs.red, self.green * rhs.green, self.blue * rhs.blue)
    }
}

impl Mul<f32> for RgbColor {
    type Output = RgbColor;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.red * rhs, self.green * rhs, self.blue * rhs)
    }
}

fn hue_degrees(color: RgbColor, max: f32, delta: f32) -> f32 {
    let sector = if max == color.red {
        (color.green - color.blue) / delta
    } else if max == color.green {
        (color.blue - color.red) / delta + 2.0
    } else {
        (color.red - color.green) / delta + 4.0
    };
    (sector * 60.0).rem_euclid(360.0)
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Averages a function over `[x - error, x + error]` through its antiderivative.
///
/// Falls back to `f(x)` when the interval is too narrow for the difference
/// quotient to be meaningful, so zero error always yields the raw value.
pub fn box_average(
    x: f64,
    error: f64,
    f: impl Fn(f64) -> f64,
    antiderivative: impl Fn(f64) -> f64,
) -> f64 {
    if error <= 1e-9 * x.abs().max(1.0) {
        return f(x);
    }
    (antiderivative(x + error) - antiderivative(x - error)) / (2.0 * error)
}

/// First-order error estimate that stays non-negative and finite.
pub fn propagate_error(derivative: f64, error: f64) -> f64 {
    saturate((derivative * error).abs())
}

/// Approximates `sqrt(a*a + b*b)` for two non-negative errors without a root.
pub fn quadrature_approx(a: f64, b: f64) -> f64 {
    if a > b {
        a + 0.5 * b
    } else {
        b + 0.5 * a
    }
}

/// Component-wise [`saturate`].
pub fn saturate_vec(v: DVec3) -> DVec3 {
    DVec3::new(saturate(v.x), saturate(v.y), saturate(v.z))
}

pub fn saturate(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else if value.is_nan() {
        0.0
    } else {
        value.signum() * f64::MAX
    }
}

/// Slope of the box-averaged function, `d/dx` of [`box_average`].
///
/// Uses the same narrow-interval threshold, returning `derivative(x)` there.
pub fn smoothed_slope(
    x: f64,
    error: f64,
    f: impl Fn(f64) -> f64,
    derivative: impl Fn(f64) -> f64,
) -> f64 {
    if error <= 1e-9 * x.abs().max(1.0) {
        return derivative(x);
    }
    (f(x + error) - f(x - error)) / (2.0 * error)
}

/// `x mod period` in `[0, period)` for a positive period.
pub fn sawtooth(x: f64, period: f64) -> f64 {
    x - period * (x / period).floor()
}

/// Antiderivative of [`sawtooth`]; continuous across the jumps.
pub fn sawtooth_antiderivative(x: f64, period: f64) -> f64 {
    let r = sawtooth(x, period);
    0.5 * period * period * (x / period).floor() + 0.5 * r * r
}

/// Fraction of `[x - error, x + error]` where `sawtooth(x, period) < width`.
pub fn pulse_coverage(x: f64, error: f64, period: f64, width: f64) -> f64 {
    let raw = |v: f64| if sawtooth(v, period) < width { 1.0 } else { 0.0 };
    let integral = |v: f64| (v / period).floor() * width + sawtooth(v, period).min(width);
    box_average(x, error, raw, integral).clamp(0.0, 1.0)
}

/// Derivative of [`pulse_coverage`] with respect to `x`; nonzero only while
/// an edge of the pulse lies inside the interval.
pub fn pulse_slope(x: f64, error: f64, period: f64, width: f64) -> f64 {
    let raw = |v: f64| if sawtooth(v, period) < width { 1.0 } else { 0.0 };
    smoothed_slope(x, error, raw, |_| 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_round_trip() {
        let color = RgbColor::new(0.8, 0.4, 0.2);
        let (h, s, v) = color.to_hsv();
        let back = RgbColor::from_hsv(h, s, v);
        assert!((back.red - color.red).abs() < 1e-5);
        assert!((back.green - color.green).abs() < 1e-5);
        assert!((back.blue - color.blue).abs() < 1e-5);
    }

    #[test]
    fn hls_primary_red() {
        let color = RgbColor::from_hls(0.0, 0.5, 1.0);
        assert!((color.red - 1.0).abs() < 1e-6);
        assert!(color.green.abs() < 1e-6);
        assert!(color.blue.abs() < 1e-6);
    }

    #[test]
    fn box_average_of_linear_function_is_exact() {
        let value = box_average(2.0, 0.5, |x| 3.0 * x, |x| 1.5 * x * x);
        assert!((value - 6.0).abs() < 1e-12);
    }

    #[test]
    fn box_average_without_error_is_raw() {
        let value = box_average(0.3, 0.0, f64::sin, |x| -x.cos());
        assert_eq!(value, 0.3f64.sin());
    }

    #[test]
    fn quadrature_is_symmetric() {
        assert_eq!(quadrature_approx(1.0, 2.0), quadrature_approx(2.0, 1.0));
        assert_eq!(quadrature_approx(0.0, 0.0), 0.0);
    }

    #[test]
    fn sawtooth_integral_is_continuous_at_jump() {
        let below = sawtooth_antiderivative(2.0 - 1e-12, 2.0);
        let above = sawtooth_antiderivative(2.0, 2.0);
        assert!((below - above).abs() < 1e-9);
        assert!((sawtooth_antiderivative(4.0, 2.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn pulse_coverage_averages_duty_cycle() {
        assert_eq!(pulse_coverage(0.05, 0.0, 1.0, 0.1), 1.0);
        assert_eq!(pulse_coverage(0.5, 0.0, 1.0, 0.1), 0.0);
        assert!((pulse_coverage(0.5, 5.0, 1.0, 0.1) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn pulse_slope_sees_edges_in_the_interval() {
        assert_eq!(pulse_slope(0.05, 0.0, 1.0, 0.1), 0.0);
        assert_eq!(pulse_slope(0.5, 0.1, 1.0, 0.1), 0.0);
        assert!((pulse_slope(0.1, 0.05, 1.0, 0.1) + 10.0).abs() < 1e-9);
        assert!((pulse_slope(1.0, 0.05, 1.0, 0.1) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn smoothed_slope_of_sine_shrinks_with_width() {
        let sharp = smoothed_slope(0.0, 0.0, f64::sin, f64::cos);
        let wide = smoothed_slope(0.0, 1.0, f64::sin, f64::cos);
        assert_eq!(sharp, 1.0);
        assert!((wide - 1f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn saturate_clamps_infinities() {
        assert_eq!(saturate(f64::INFINITY), f64::MAX);
        assert_eq!(saturate(f64::NEG_INFINITY), -f64::MAX);
        assert_eq!(saturate(f64::NAN), 0.0);
    }
}
