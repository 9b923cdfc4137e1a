// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Three-component double-precision vectors.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::constants::{BIG, SMALL};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3d {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Unit vector at polar angle `theta` from +z and azimuth `phi`.
    pub fn from_polar(theta: f64, phi: f64) -> Self {
        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        Self::new(st * cp, st * sp, ct)
    }

    /// Sentinel vector with every component set to -BIG.
    pub fn big_sentinel() -> Self {
        Self::new(-BIG, -BIG, -BIG)
    }

    pub fn dot(self, o: Self) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(self, o: Self) -> Self {
        Self::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector along `self`; the zero vector maps to itself.
    pub fn unit(self) -> Self {
        let n = self.norm();
        if n < SMALL {
            self
        } else {
            self / n
        }
    }

    /// Rescale in place to unit length.
    pub fn normalize(&mut self) {
        *self = self.unit();
    }

    /// Unit vector along the (x, y) components rotated 90 degrees
    /// clockwise, z dropped. In rz geometry this turns a cone's edge vector
    /// into its outward unit normal.
    pub fn right_normal(self) -> Self {
        Self::new(self.y, -self.x, 0.0).unit()
    }

    /// Component of `self` perpendicular to `b`.
    pub fn perpendicular_to(self, b: Self) -> Self {
        let bb = b.dot(b);
        if bb < SMALL {
            return self;
        }
        self - b * (self.dot(b) / bb)
    }

    /// Projection into the rz half-plane: (r, z, 0) with r = sqrt(x^2+y^2).
    pub fn get_rz(self) -> Self {
        Self::new((self.x * self.x + self.y * self.y).sqrt(), self.z, 0.0)
    }

    pub fn distance(self, o: Self) -> f64 {
        (self - o).norm()
    }

    pub fn cos_angle(self, o: Self) -> f64 {
        let d = self.norm() * o.norm();
        if d < SMALL {
            0.0
        } else {
            self.dot(o) / d
        }
    }

    /// Sum of componentwise absolute differences.
    pub fn abs_diff(self, o: Self) -> f64 {
        (self.x - o.x).abs() + (self.y - o.y).abs() + (self.z - o.z).abs()
    }

    /// Point at distance `d` from `a` along the segment toward `b`.
    pub fn along(d: f64, a: Self, b: Self) -> Self {
        a + (b - a).unit() * d
    }
}

impl Add for Vector3d {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl AddAssign for Vector3d {
    fn add_assign(&mut self, o: Self) {
        *self = *self + o;
    }
}

impl Sub for Vector3d {
    type Output = Self;
    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl SubAssign for Vector3d {
    fn sub_assign(&mut self, o: Self) {
        *self = *self - o;
    }
}

impl Mul<f64> for Vector3d {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Mul<Vector3d> for f64 {
    type Output = Vector3d;
    fn mul(self, v: Vector3d) -> Vector3d {
        v * self
    }
}

impl MulAssign<f64> for Vector3d {
    fn mul_assign(&mut self, s: f64) {
        *self = *self * s;
    }
}

impl Div<f64> for Vector3d {
    type Output = Self;
    fn div(self, s: f64) -> Self {
        Self::new(self.x / s, self.y / s, self.z / s)
    }
}

impl DivAssign<f64> for Vector3d {
    fn div_assign(&mut self, s: f64) {
        *self = *self / s;
    }
}

impl Neg for Vector3d {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn dot_and_cross() {
        let a = Vector3d::new(1.0, 2.0, 3.0);
        let b = Vector3d::new(4.0, -5.0, 6.0);
        assert_abs_diff_eq!(a.dot(b), 12.0, epsilon = 1e-14);
        let c = a.cross(b);
        assert_abs_diff_eq!(c.x, 27.0, epsilon = 1e-14);
        assert_abs_diff_eq!(c.y, 6.0, epsilon = 1e-14);
        assert_abs_diff_eq!(c.z, -13.0, epsilon = 1e-14);
        // cross is perpendicular to both factors
        assert_abs_diff_eq!(c.dot(a), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.dot(b), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn unit_norm() {
        let a = Vector3d::new(3.0, 0.0, 4.0);
        assert_abs_diff_eq!(a.norm(), 5.0, epsilon = 1e-14);
        assert_abs_diff_eq!(a.unit().norm(), 1.0, epsilon = 1e-14);
        let zero = Vector3d::default();
        assert_eq!(zero.unit(), zero);
    }

    #[test]
    fn right_normal_rotates_clockwise_and_normalizes() {
        let v = Vector3d::new(3.0, 4.0, 7.0);
        let n = v.right_normal();
        assert_abs_diff_eq!(n.x, 0.8, epsilon = 1e-14);
        assert_abs_diff_eq!(n.y, -0.6, epsilon = 1e-14);
        assert_eq!(n.z, 0.0);
        // in-plane and perpendicular
        assert_abs_diff_eq!(n.x * v.x + n.y * v.y, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn perpendicular_to_removes_projection() {
        let a = Vector3d::new(1.0, 1.0, 0.0);
        let b = Vector3d::new(0.0, 0.0, 2.0);
        assert_eq!(a.perpendicular_to(b), a);
        let c = Vector3d::new(1.0, 0.0, 1.0).perpendicular_to(Vector3d::new(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(c.z, 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(c.x, 1.0, epsilon = 1e-14);
    }

    #[test]
    fn rz_projection() {
        let v = Vector3d::new(3.0, 4.0, -2.0);
        assert_eq!(v.get_rz(), Vector3d::new(5.0, -2.0, 0.0));
    }

    #[test]
    fn polar_direction() {
        let v = Vector3d::from_polar(0.0, 0.0);
        assert_abs_diff_eq!(v.z, 1.0, epsilon = 1e-14);
        let w = Vector3d::from_polar(std::f64::consts::FRAC_PI_2, 0.0);
        assert_abs_diff_eq!(w.x, 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(w.z, 0.0, epsilon = 1e-14);
    }

    #[test]
    fn along_moves_by_distance() {
        let a = Vector3d::new(0.0, 0.0, 0.0);
        let b = Vector3d::new(10.0, 0.0, 0.0);
        assert_eq!(Vector3d::along(2.0, a, b), Vector3d::new(2.0, 0.0, 0.0));
    }
}
