use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Coordinate axis a position-consuming port reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    T,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::T];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::T => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Axis> {
        Axis::ALL.get(index).copied()
    }

    /// Unit spatial gradient of the coordinate; time has none.
    pub fn unit(self) -> DVec3 {
        match self {
            Axis::X => DVec3::X,
            Axis::Y => DVec3::Y,
            Axis::Z => DVec3::Z,
            Axis::T => DVec3::ZERO,
        }
    }
}

/// The point a procedure is being evaluated at.
///
/// Built by the host for every sample and handed to
/// [`Procedure::init_for_point`](crate::Procedure::init_for_point); modules
/// only ever read it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointInfo {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
    pub xsize: f64,
    pub ysize: f64,
    pub zsize: f64,
}

impl PointInfo {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    pub fn with_time(mut self, t: f64) -> Self {
        self.t = t;
        self
    }

    pub fn with_size(mut self, xsize: f64, ysize: f64, zsize: f64) -> Self {
        self.xsize = xsize.max(0.0);
        self.ysize = ysize.max(0.0);
        self.zsize = zsize.max(0.0);
        self
    }

    pub fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    pub fn coordinate(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::T => self.t,
        }
    }

    /// Half the footprint along `axis` plus the requested blur.
    pub fn coordinate_error(&self, axis: Axis, blur: f64) -> f64 {
        match axis {
            Axis::X => 0.5 * self.xsize + blur,
            Axis::Y => 0.5 * self.ysize + blur,
            Axis::Z => 0.5 * self.zsize + blur,
            Axis::T => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_error_combines_footprint_and_blur() {
        let point = PointInfo::new(1.0, 2.0, 3.0).with_size(0.2, 0.4, 0.0);
        assert!((point.coordinate_error(Axis::X, 0.05) - 0.15).abs() < 1e-12);
        assert!((point.coordinate_error(Axis::Y, 0.0) - 0.2).abs() < 1e-12);
        assert_eq!(point.coordinate_error(Axis::T, 1.0), 0.0);
    }

    #[test]
    fn negative_sizes_are_clamped() {
        let point = PointInfo::default().with_size(-1.0, 0.5, -0.1);
        assert_eq!(point.xsize, 0.0);
        assert_eq!(point.zsize, 0.0);
    }
}
