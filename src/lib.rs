// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! FESTR: Finite-Element Spectral Transfer of Radiation.
//!
//! Computes synthetic X-ray/UV emission spectra from time-dependent
//! hydrodynamic snapshots of radiating plasmas and, running in reverse,
//! infers plasma conditions from measured spectra.

pub mod arr;
pub mod cli;
pub mod constants;
pub mod dbase;
pub mod detector;
pub mod diagnostics;
pub(crate) mod error;
pub mod geometry;
pub mod goal;
pub mod hydro;
pub mod io;
pub mod math;
pub mod pool;
pub mod transport;

#[cfg(test)]
mod tests;

// Re-exports.
pub use arr::ArrDbl;
pub use cli::{run, setup_logger, FestrArgs, Options};
pub use dbase::{Database, Table};
pub use detector::{Detector, Symmetry};
pub use diagnostics::Diagnostics;
pub use error::FestrError;
pub use geometry::{Grid, Mesh, Vector3d, Zone};
pub use goal::{Goal, Objective};
pub use hydro::Hydro;
pub use transport::Ray;
