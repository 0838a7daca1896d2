// Deterministic lattice randomness, gradient noise and cellular features.
//
// Everything here is a pure function of lattice coordinates, so patterns are
// stable under re-evaluation and camera movement.

use glam::DVec3;

// 12 gradient directions (edges of a cube)
const GRAD3: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

/// Mulberry32, a tiny 32-bit PRNG.
#[derive(Debug, Clone, Copy)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub const fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = (self.state ^ (self.state >> 15)).wrapping_mul(1 | self.state);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        t ^ (t >> 14)
    }

    /// Next value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }
}

/// Fisher-Yates shuffle of the identity permutation.
const fn build_permutation(seed: u32) -> [u8; 256] {
    let mut perm = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        perm[i] = i as u8;
        i += 1;
    }
    let mut rng = Mulberry32::new(seed);
    let mut i = 255;
    while i > 0 {
        let r = rng.next_u32() as u64;
        let j = ((r * (i as u64 + 1)) >> 32) as usize;
        let tmp = perm[i];
        perm[i] = perm[j];
        perm[j] = tmp;
        i -= 1;
    }
    perm
}

static PERM: [u8; 256] = build_permutation(0x5eed_2d3f);

#[inline]
fn perm(index: i64) -> i64 {
    i64::from(PERM[(index & 255) as usize])
}

#[inline]
fn lattice_index(i: i64, j: i64, k: i64) -> usize {
    perm(perm(perm(i) + j) + k) as usize
}

/// 32-bit hash of an integer lattice cell.
pub fn lattice_hash(i: i64, j: i64, k: i64) -> u32 {
    let mut h = (i as u32).wrapping_mul(0x8da6_b343)
        ^ (j as u32).wrapping_mul(0xd816_3841)
        ^ (k as u32).wrapping_mul(0xcb1a_b31f);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^ (h >> 16)
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn fade_derivative(t: f64) -> f64 {
    30.0 * t * t * (t - 1.0) * (t - 1.0)
}

/// Gradient noise in roughly [-1, 1] together with its analytic gradient.
pub fn perlin(p: DVec3) -> (f64, DVec3) {
    let cell = p.floor();
    let f = p - cell;
    let (i, j, k) = (cell.x as i64, cell.y as i64, cell.z as i64);
    let u = DVec3::new(fade(f.x), fade(f.y), fade(f.z));
    let du = DVec3::new(
        fade_derivative(f.x),
        fade_derivative(f.y),
        fade_derivative(f.z),
    );

    let mut grads = [DVec3::ZERO; 8];
    let mut dots = [0.0; 8];
    for (corner, (grad, dot)) in grads.iter_mut().zip(dots.iter_mut()).enumerate() {
        let offset = DVec3::new(
            (corner & 1) as f64,
            ((corner >> 1) & 1) as f64,
            ((corner >> 2) & 1) as f64,
        );
        let g = GRAD3[lattice_index(
            i + offset.x as i64,
            j + offset.y as i64,
            k + offset.z as i64,
        ) % 12];
        *grad = DVec3::from_array(g);
        *dot = grad.dot(f - offset);
    }

    let [d000, d100, d010, d110, d001, d101, d011, d111] = dots;
    let k1 = d100 - d000;
    let k2 = d010 - d000;
    let k3 = d001 - d000;
    let k4 = d000 - d100 - d010 + d110;
    let k5 = d000 - d010 - d001 + d011;
    let k6 = d000 - d100 - d001 + d101;
    let k7 = -d000 + d100 + d010 - d110 + d001 - d101 - d011 + d111;

    let value = d000
        + k1 * u.x
        + k2 * u.y
        + k3 * u.z
        + k4 * u.x * u.y
        + k5 * u.y * u.z
        + k6 * u.z * u.x
        + k7 * u.x * u.y * u.z;

    let mut gradient = DVec3::new(
        du.x * (k1 + k4 * u.y + k6 * u.z + k7 * u.y * u.z),
        du.y * (k2 + k4 * u.x + k5 * u.z + k7 * u.x * u.z),
        du.z * (k3 + k5 * u.y + k6 * u.x + k7 * u.x * u.y),
    );
    for (corner, grad) in grads.iter().enumerate() {
        let wx = if corner & 1 == 1 { u.x } else { 1.0 - u.x };
        let wy = if (corner >> 1) & 1 == 1 { u.y } else { 1.0 - u.y };
        let wz = if (corner >> 2) & 1 == 1 { u.z } else { 1.0 - u.z };
        gradient += *grad * (wx * wy * wz);
    }

    (value, gradient)
}

/// Octave-summed gradient noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fractal {
    pub amplitude: f64,
    pub octaves: u32,
    pub persistence: f64,
    /// Sum `|noise|` per octave (turbulence) instead of signed noise.
    pub absolute: bool,
}

/// Value, error and noise-space gradient of a fractal sum.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FractalSample {
    pub value: f64,
    pub error: f64,
    pub gradient: DVec3,
}

impl Fractal {
    /// Samples at `p` with `size` the per-axis half footprint in noise space.
    ///
    /// Octaves whose feature size falls below the footprint fade out and
    /// their amplitude is reported as error instead of aliasing.
    pub fn sample(&self, p: DVec3, size: DVec3) -> FractalSample {
        let mut sample = FractalSample::default();
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut norm = 0.0;
        let widest = size.max_element();

        for octave in 0..self.octaves.max(1) {
            let shift = DVec3::splat(f64::from(octave) * 17.31);
            let (mut n, mut g) = perlin(p * frequency + shift);
            if self.absolute {
                g *= n.signum();
                n = n.abs();
            }
            let weight = (2.0 - 4.0 * widest * frequency).clamp(0.0, 1.0);
            let local = (g * frequency).abs().dot(size).min(1.0);

            sample.value += weight * amplitude * n;
            sample.gradient += g * (weight * amplitude * frequency);
            sample.error += amplitude * ((1.0 - weight) + weight * local);

            norm += amplitude;
            amplitude *= self.persistence;
            frequency *= 2.0;
        }

        let scale = if norm > 0.0 { self.amplitude / norm } else { 0.0 };
        FractalSample {
            value: sample.value * scale,
            error: sample.error * scale.abs(),
            gradient: sample.gradient * scale,
        }
    }
}

/// Nearest and second-nearest feature points around a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellFeatures {
    pub nearest: DVec3,
    pub second: DVec3,
    pub distance1: f64,
    pub distance2: f64,
    /// Random value in [0, 1) attached to the nearest feature's cell.
    pub id: f64,
    pub second_id: f64,
}

/// One jittered feature point per unit cell, searched over the 27 neighbors.
pub fn cell_features(p: DVec3) -> CellFeatures {
    let base = p.floor();
    let mut best = CellFeatures {
        nearest: DVec3::ZERO,
        second: DVec3::ZERO,
        distance1: f64::MAX,
        distance2: f64::MAX,
        id: 0.0,
        second_id: 0.0,
    };

    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let cell = base + DVec3::new(f64::from(dx), f64::from(dy), f64::from(dz));
                let mut rng =
                    Mulberry32::new(lattice_hash(cell.x as i64, cell.y as i64, cell.z as i64));
                let feature = cell + DVec3::new(rng.next_f64(), rng.next_f64(), rng.next_f64());
                let distance = feature.distance(p);
                let id = rng.next_f64();
                if distance < best.distance1 {
                    best.second = best.nearest;
                    best.distance2 = best.distance1;
                    best.second_id = best.id;
                    best.nearest = feature;
                    best.distance1 = distance;
                    best.id = id;
                } else if distance < best.distance2 {
                    best.second = feature;
                    best.distance2 = distance;
                    best.second_id = id;
                }
            }
        }
    }

    best
}
