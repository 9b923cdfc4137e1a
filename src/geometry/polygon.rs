// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Planar polygon faces. The plane is defined by the summed signed area
//! normals of the triangle fan rooted at vertex 0, so mildly warped vertex
//! loops still yield a consistent orientation.

use super::face::{Face, FaceCore, FaceId, Intercept};
use super::grid::Grid;
use super::vector::Vector3d;
use crate::constants::SMALL;
use crate::io::{IoError, TokenReader};
use crate::math::sign_eqt;

#[derive(Clone, Debug, Default)]
pub struct Polygon {
    core: FaceCore,
}

impl Polygon {
    pub fn new(my_zone: usize, my_id: i16) -> Self {
        Self {
            core: FaceCore::new(my_zone, my_id),
        }
    }

    pub fn add_node(&mut self, i: usize) {
        self.core.nodes.push(i);
    }

    pub fn add_neighbor(&mut self, zone: usize, face: i16) {
        self.core.neighbors.push(FaceId::new(zone, face));
    }

    /// Mesh-file record: FaceID, node count, node ids, neighbors.
    pub fn load(r: &mut TokenReader) -> Result<Self, IoError> {
        let mut core = FaceCore::load(r, None)?;
        core.load_neighbors(r)?;
        Ok(Self { core })
    }

    /// Record without its own neighbor list, as embedded in a Surface.
    pub fn load_subface(r: &mut TokenReader) -> Result<Self, IoError> {
        let core = FaceCore::load(r, None)?;
        Ok(Self { core })
    }

    fn anchor(&self, g: &Grid) -> Vector3d {
        g.point(self.core.nodes[0])
    }

    /// In-plane containment via edge orientation against the face normal.
    /// Points on an edge or vertex count as contained.
    fn contains_in_plane(&self, g: &Grid, w: Vector3d) -> bool {
        let n = self.normal(g);
        let nv = self.core.nodes.len();
        for i in 0..nv {
            let a = g.point(self.core.nodes[i]);
            let b = g.point(self.core.nodes[(i + 1) % nv]);
            let e = b - a;
            let r = w - a;
            let cross = e.cross(r);
            let scale = e.norm() * r.norm();
            if scale < SMALL {
                // w coincides with a vertex
                continue;
            }
            if cross.dot(n) / scale < -1.0e-12 {
                return false;
            }
        }
        true
    }
}

impl Face for Polygon {
    fn core(&self) -> &FaceCore {
        &self.core
    }

    fn is_curved(&self, _g: &Grid) -> bool {
        false
    }

    fn area2_normal_center(&self, g: &Grid) -> (Vector3d, Vector3d) {
        let nv = self.core.nodes.len();
        let a0 = self.anchor(g);
        let mut area2 = Vector3d::default();
        let mut center = a0;
        for i in 1..nv {
            let a = g.point(self.core.nodes[i]);
            center += a;
            if i + 1 < nv {
                let b = g.point(self.core.nodes[i + 1]);
                area2 += (a - a0).cross(b - a0);
            }
        }
        (area2, center / nv as f64)
    }

    fn distance(&self, g: &Grid, w: Vector3d) -> f64 {
        (w - self.anchor(g)).dot(self.normal(g))
    }

    fn subpoint(&self, g: &Grid, w: Vector3d) -> Vector3d {
        w - self.normal(g) * self.distance(g, w)
    }

    fn face_point(&self, g: &Grid, w: Vector3d) -> Vector3d {
        let s = self.subpoint(g, w);
        if self.contains_in_plane(g, s) {
            s
        } else {
            self.center(g)
        }
    }

    fn contains(&self, g: &Grid, w: Vector3d) -> bool {
        self.contains_in_plane(g, self.subpoint(g, w))
    }

    fn intercept(&self, g: &Grid, p: Vector3d, u: Vector3d, eqt: f64, from: FaceId) -> Intercept {
        let fid = self.fid();
        let n = self.normal(g);
        let un = u.dot(n);
        if from == fid || un.abs() < SMALL {
            return Intercept::not_found(fid);
        }
        let t = (self.anchor(g) - p).dot(n) / un;
        let w = p + u * t;
        let mut rv = Intercept::not_found(fid);
        rv.t = t;
        rv.w = w;
        rv.is_found = sign_eqt(t, eqt) == 1 && self.contains_in_plane(g, w);
        rv
    }

    fn velocity(&self, g: &Grid, w: Vector3d) -> Vector3d {
        let mut u = Vector3d::default();
        let mut s = 0.0;
        for &i in &self.core.nodes {
            let d = (g.point(i) - w).norm();
            if d < SMALL {
                return g.velocity(i);
            }
            let d = 1.0 / d;
            s += d;
            u += g.velocity(i) * d;
        }
        u / s
    }
}
