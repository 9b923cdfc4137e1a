// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision; `festr` does every calculation in
double precision. Geometric tolerances are named here rather than inlined at
their points of use, because several of them encode physical length scales
(centimetres) that have to stay consistent between the face-intersection code
and the ray walker.
 */

pub use std::f64::consts::PI;

/// 2π
pub const TWO_PI: f64 = 2.0 * PI;

/// 4π
pub const FOUR_PI: f64 = 4.0 * PI;

/// Speed of light \[cm/s\]. Ray direction vectors carry this magnitude so
/// that ray parameters are photon times of flight \[s\].
pub const CV: f64 = 2.99792458e10;

/// Zero tolerance for vector components and general floating-point
/// comparisons.
pub const SMALL: f64 = 1.0e-15;

/// Sentinel magnitude standing in for "no solution" / "at infinity".
pub const BIG: f64 = 1.0e100;

/// Positivity tolerance for face-hit ray parameters \[s\]. The minimum
/// admissible zone thickness is ~1e-8 cm (about the Bohr radius), so the
/// shortest physical photon flight between faces is ~3e-19 s.
pub const EQT: f64 = 1.0e-19;

/// Tolerance used when deciding whether an inferred scale factor is
/// effectively 1 (i.e. whether output stays in absolute units).
pub const SCALE_EQT: f64 = 1.0e-9;

/// Leading factor of the Planckian backlighter \[W/cm2/sr/eV\] for hv and T
/// in eV.
pub const PLANCK_F: f64 = 5040.367;

/// Field width used for integer labels in text outputs.
pub const INT_WIDTH: usize = 10;

/// Cone face-edge tolerances \[cm\], \[cm\], \[cm2\].
pub mod cone {
    /// Curvature threshold: below this radial spread a cone is flat.
    pub const SMALL: f64 = 5.0e-7;
    /// Hits closer than this to a cone edge are nudged inward.
    pub const MINIMUM_DISTANCE: f64 = 1.0e-6;
    /// Containment tolerance on rz coordinate products.
    pub const ZERO: f64 = 1.0e-19;
}
