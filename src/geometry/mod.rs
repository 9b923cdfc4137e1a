// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Analytic mesh geometry: vectors, the node grid, the face variants
//! (planar polygons, cones of revolution, spheres, composite surfaces),
//! zones and the mesh itself.

pub mod cone;
pub mod face;
pub mod grid;
pub mod mesh;
pub mod polygon;
pub mod sphere;
pub mod surface;
pub mod vector;
pub mod zone;

pub use cone::Cone;
pub use face::{Face, FaceId, FacePtr, Intercept};
pub use grid::{Grid, Node};
pub use mesh::Mesh;
pub use polygon::Polygon;
pub use sphere::Sphere;
pub use surface::Surface;
pub use vector::Vector3d;
pub use zone::{Zone, ZoneState};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("ray from ({x:.6e}, {y:.6e}, {z:.6e}) lost in zone {zone}")]
    LostRay { zone: usize, x: f64, y: f64, z: f64 },

    #[error("ray kept cycling through zone {zone} (last face {face}) without reaching the boundary")]
    StuckRay { zone: usize, face: i16 },

    #[error("face ({zone}, {face}) names no neighbor outside zone {zone}")]
    NoExitNeighbor { zone: usize, face: i16 },

    #[error("unknown face kind `{kind}` in {path}")]
    UnknownFaceKind { kind: String, path: PathBuf },

    #[error("node {node} not present in the grid (size {size})")]
    MissingNode { node: usize, size: usize },

    #[error("zone {zone} out of range (mesh size {size})")]
    MissingZone { zone: usize, size: usize },

    #[error(transparent)]
    Io(#[from] crate::io::IoError),
}
