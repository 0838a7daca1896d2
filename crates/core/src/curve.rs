// Piecewise curves with closed-form antiderivatives.
//
// Function and spectrum modules smooth their output over the input's
// uncertainty interval, so every segment type here knows its own integral.

use crate::math::box_average;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    /// Cubic Hermite segments with Catmull-Rom tangents.
    CatmullRom,
    /// Cubic Hermite segments with flat tangents (smoothstep between knots).
    Ease,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    xs: Vec<f64>,
    ys: Vec<f64>,
    tangents: Vec<f64>,
    /// Integral from the first knot up to each knot.
    integrals: Vec<f64>,
    interpolation: Interpolation,
    repeat: bool,
}

impl Curve {
    /// Builds a curve from `[x, y]` knots with strictly increasing x.
    pub fn new(
        points: &[[f64; 2]],
        interpolation: Interpolation,
        repeat: bool,
    ) -> Result<Self, String> {
        if points.is_empty() {
            return Err("curve needs at least one point".to_string());
        }
        if points.iter().flatten().any(|v| !v.is_finite()) {
            return Err("curve points must be finite".to_string());
        }
        if points.windows(2).any(|pair| pair[1][0] <= pair[0][0]) {
            return Err("curve x values must be strictly increasing".to_string());
        }

        let xs: Vec<f64> = points.iter().map(|p| p[0]).collect();
        let ys: Vec<f64> = points.iter().map(|p| p[1]).collect();
        let tangents = match interpolation {
            Interpolation::CatmullRom => catmull_rom_tangents(&xs, &ys),
            Interpolation::Linear | Interpolation::Ease => vec![0.0; xs.len()],
        };

        let mut curve = Self {
            xs,
            ys,
            tangents,
            integrals: Vec::new(),
            interpolation,
            repeat,
        };
        let mut integrals = Vec::with_capacity(curve.xs.len());
        let mut total = 0.0;
        integrals.push(0.0);
        for i in 0..curve.xs.len().saturating_sub(1) {
            total += curve.segment_integral(i, 1.0);
            integrals.push(total);
        }
        curve.integrals = integrals;
        Ok(curve)
    }

    /// Linear ramp through `(0, 0)` and `(1, 1)`.
    pub fn identity() -> Self {
        Self {
            xs: vec![0.0, 1.0],
            ys: vec![0.0, 1.0],
            tangents: vec![0.0, 0.0],
            integrals: vec![0.0, 0.5],
            interpolation: Interpolation::Linear,
            repeat: false,
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    fn first_x(&self) -> f64 {
        self.xs[0]
    }

    fn last_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }

    fn period(&self) -> f64 {
        self.last_x() - self.first_x()
    }

    fn wraps(&self) -> bool {
        self.repeat && self.period() > 0.0
    }

    fn wrap(&self, x: f64) -> f64 {
        if self.wraps() {
            self.first_x() + (x - self.first_x()).rem_euclid(self.period())
        } else {
            x
        }
    }

    /// Index of the segment containing `x`, which must lie inside the knots.
    fn segment(&self, x: f64) -> usize {
        let last = self.xs.len() - 2;
        match self.xs.partition_point(|&knot| knot <= x) {
            0 => 0,
            n => (n - 1).min(last),
        }
    }

    fn segment_parts(&self, i: usize, x: f64) -> (f64, f64) {
        let h = self.xs[i + 1] - self.xs[i];
        (h, ((x - self.xs[i]) / h).clamp(0.0, 1.0))
    }

    fn segment_value(&self, i: usize, t: f64, h: f64) -> f64 {
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        match self.interpolation {
            Interpolation::Linear => y0 + (y1 - y0) * t,
            Interpolation::CatmullRom | Interpolation::Ease => {
                let (m0, m1) = (self.tangents[i], self.tangents[i + 1]);
                let t2 = t * t;
                let t3 = t2 * t;
                (2.0 * t3 - 3.0 * t2 + 1.0) * y0
                    + (t3 - 2.0 * t2 + t) * h * m0
                    + (-2.0 * t3 + 3.0 * t2) * y1
                    + (t3 - t2) * h * m1
            }
        }
    }

    fn segment_slope(&self, i: usize, t: f64, h: f64) -> f64 {
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        match self.interpolation {
            Interpolation::Linear => (y1 - y0) / h,
            Interpolation::CatmullRom | Interpolation::Ease => {
                let (m0, m1) = (self.tangents[i], self.tangents[i + 1]);
                let t2 = t * t;
                ((6.0 * t2 - 6.0 * t) * y0
                    + (3.0 * t2 - 4.0 * t + 1.0) * h * m0
                    + (-6.0 * t2 + 6.0 * t) * y1
                    + (3.0 * t2 - 2.0 * t) * h * m1)
                    / h
            }
        }
    }

    /// Integral over segment `i` from its start to parameter `t`.
    fn segment_integral(&self, i: usize, t: f64) -> f64 {
        let h = self.xs[i + 1] - self.xs[i];
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let t2 = t * t;
        let t3 = t2 * t;
        let t4 = t3 * t;
        match self.interpolation {
            Interpolation::Linear => h * (y0 * t + 0.5 * (y1 - y0) * t2),
            Interpolation::CatmullRom | Interpolation::Ease => {
                let (m0, m1) = (self.tangents[i], self.tangents[i + 1]);
                h * ((0.5 * t4 - t3 + t) * y0
                    + (0.25 * t4 - 2.0 / 3.0 * t3 + 0.5 * t2) * h * m0
                    + (-0.5 * t4 + t3) * y1
                    + (0.25 * t4 - t3 / 3.0) * h * m1)
            }
        }
    }

    pub fn value(&self, x: f64) -> f64 {
        if self.xs.len() == 1 {
            return self.ys[0];
        }
        let x = self.wrap(x);
        if x <= self.first_x() {
            return self.ys[0];
        }
        if x >= self.last_x() {
            return self.ys[self.ys.len() - 1];
        }
        let i = self.segment(x);
        let (h, t) = self.segment_parts(i, x);
        self.segment_value(i, t, h)
    }

    pub fn slope(&self, x: f64) -> f64 {
        if self.xs.len() == 1 {
            return 0.0;
        }
        let x = self.wrap(x);
        if x < self.first_x() || x > self.last_x() {
            return 0.0;
        }
        let i = self.segment(x);
        let (h, t) = self.segment_parts(i, x);
        self.segment_slope(i, t, h)
    }

    /// Integral inside the knot range, from the first knot to `x`.
    fn inner_integral(&self, x: f64) -> f64 {
        let x = x.clamp(self.first_x(), self.last_x());
        let i = self.segment(x);
        let (_, t) = self.segment_parts(i, x);
        self.integrals[i] + self.segment_integral(i, t)
    }

    pub fn antiderivative(&self, x: f64) -> f64 {
        if self.xs.len() == 1 {
            return self.ys[0] * x;
        }
        let (first, last) = (self.first_x(), self.last_x());
        if self.wraps() {
            let periods = ((x - first) / self.period()).floor();
            let total = self.integrals[self.integrals.len() - 1];
            return periods * total + self.inner_integral(self.wrap(x));
        }
        let below = self.ys[0] * (x.min(first) - first);
        let above = self.ys[self.ys.len() - 1] * (x.max(last) - last);
        below + self.inner_integral(x) + above
    }

    /// Mean of the curve over `[x - error, x + error]`.
    pub fn average(&self, x: f64, error: f64) -> f64 {
        box_average(x, error, |v| self.value(v), |v| self.antiderivative(v))
    }

    /// Half-width of the curve's variation over `[x - error, x + error]`.
    pub fn error(&self, x: f64, error: f64) -> f64 {
        if error <= 0.0 {
            return 0.0;
        }
        let samples = [self.value(x - error), self.value(x), self.value(x + error)];
        let max = samples.iter().copied().fold(f64::MIN, f64::max);
        let min = samples.iter().copied().fold(f64::MAX, f64::min);
        (self.slope(x).abs() * error).max(0.5 * (max - min))
    }
}

fn catmull_rom_tangents(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 1).min(n - 1);
            (ys[hi] - ys[lo]) / (xs[hi] - xs[lo])
        })
        .collect()
}
