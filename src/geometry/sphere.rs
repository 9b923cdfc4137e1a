// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Spherical faces: one center node, a signed radius, a radial velocity
//! and an orientation sign. The whole closed sphere is the face, so
//! containment is unconditional; zone 0's bounding sphere is the face every
//! ray is launched against.

use super::face::{choose_root, Face, FaceCore, FaceId, Intercept};
use super::grid::Grid;
use super::vector::Vector3d;
use crate::constants::{FOUR_PI, SMALL};
use crate::io::{IoError, TokenReader};
use crate::math::solve_quadratic;

#[derive(Clone, Debug, Default)]
pub struct Sphere {
    core: FaceCore,
    /// Signed radius; the sign orients the face.
    pub r: f64,
    /// Radial expansion velocity of the surface.
    pub v: f64,
    /// Orientation sign, -1/0/+1.
    pub n: i32,
}

impl Sphere {
    pub fn new(my_zone: usize, my_id: i16) -> Self {
        Self {
            core: FaceCore::new(my_zone, my_id),
            r: 0.0,
            v: 0.0,
            n: 0,
        }
    }

    pub fn add_node(&mut self, i: usize) {
        self.core.nodes.push(i);
    }

    pub fn add_neighbor(&mut self, zone: usize, face: i16) {
        self.core.neighbors.push(FaceId::new(zone, face));
    }

    /// Mesh-file record: FaceID, center node id, `r v n`, neighbors.
    pub fn load(rdr: &mut TokenReader) -> Result<Self, IoError> {
        let mut core = FaceCore::load(rdr, Some(1))?;
        let r: f64 = rdr.next("sphere radius")?;
        let v: f64 = rdr.next("sphere radial velocity")?;
        let n: i32 = rdr.next("sphere orientation")?;
        core.load_neighbors(rdr)?;
        Ok(Self { core, r, v, n })
    }

    pub fn center_position(&self, g: &Grid) -> Vector3d {
        g.point(self.core.nodes[0])
    }

    pub fn center_velocity(&self, g: &Grid) -> Vector3d {
        g.velocity(self.core.nodes[0])
    }
}

impl Face for Sphere {
    fn core(&self) -> &FaceCore {
        &self.core
    }

    fn is_curved(&self, _g: &Grid) -> bool {
        true
    }

    fn area2_normal_center(&self, g: &Grid) -> (Vector3d, Vector3d) {
        (
            Vector3d::new(f64::from(self.n) * FOUR_PI * self.r * self.r, 0.0, 0.0),
            self.center_position(g),
        )
    }

    /// A sphere has no single normal direction; the conventional stand-in
    /// carries only the orientation given by the radius sign.
    fn normal(&self, _g: &Grid) -> Vector3d {
        Vector3d::new(self.r.signum(), 0.0, 0.0)
    }

    fn distance(&self, g: &Grid, w: Vector3d) -> f64 {
        let d = (w - self.center_position(g)).norm() - self.r.abs();
        d * self.r.signum()
    }

    fn subpoint(&self, g: &Grid, w: Vector3d) -> Vector3d {
        let c = self.center_position(g);
        let d = w - c;
        if d.norm() < SMALL {
            return Vector3d::big_sentinel();
        }
        c + d.unit() * self.r.abs()
    }

    fn face_point(&self, g: &Grid, w: Vector3d) -> Vector3d {
        self.subpoint(g, w)
    }

    fn contains(&self, _g: &Grid, _w: Vector3d) -> bool {
        true
    }

    fn intercept(&self, g: &Grid, p: Vector3d, u: Vector3d, eqt: f64, from: FaceId) -> Intercept {
        let fid = self.fid();
        let c = self.center_position(g);
        let pc = p - c;
        let qa = u.dot(u);
        let qb = 2.0 * u.dot(pc);
        let qc = pc.dot(pc) - self.r * self.r;
        let roots = solve_quadratic(qa, qb, qc, eqt);
        choose_root(roots, p, u, eqt, from, fid, |_| true)
    }

    fn velocity(&self, g: &Grid, w: Vector3d) -> Vector3d {
        let c = self.center_position(g);
        self.center_velocity(g) + (w - c).unit() * self.v
    }
}
