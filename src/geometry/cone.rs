// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Conical ribbons for 2-D RZ geometry: surfaces of revolution about the
//! z-axis spanned by two rz-plane nodes. A ribbon whose endpoints share a z
//! value degenerates to a flat annular disk; sharing an r value makes it a
//! cylinder.

use super::face::{choose_root, Face, FaceCore, FaceId, Intercept};
use super::grid::Grid;
use super::vector::Vector3d;
use crate::constants::{cone, BIG, SMALL, TWO_PI};
use crate::io::{IoError, TokenReader};
use crate::math::{sign_eqt, solve_quadratic};

#[derive(Clone, Debug, Default)]
pub struct Cone {
    core: FaceCore,
}

impl Cone {
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

    /// Mesh-file record: FaceID, the two rz node ids, neighbors.
    pub fn load(r: &mut TokenReader) -> Result<Self, IoError> {
        let mut core = FaceCore::load(r, Some(2))?;
        core.load_neighbors(r)?;
        Ok(Self { core })
    }

    /// rz point of endpoint `i`: x holds r, y holds z.
    fn point(&self, g: &Grid, i: usize) -> Vector3d {
        g.point(self.core.nodes[i])
    }

    /// The two endpoints rotated to azimuth `phi`, ordered by ascending z.
    pub fn get_endpoints(&self, g: &Grid, phi: f64) -> (Vector3d, Vector3d) {
        let v0 = self.point(g, 0);
        let v1 = self.point(g, 1);
        let (sin_phi, cos_phi) = phi.sin_cos();
        let a = Vector3d::new(v0.x * cos_phi, v0.x * sin_phi, v0.y);
        let b = Vector3d::new(v1.x * cos_phi, v1.x * sin_phi, v1.y);
        if a.z <= b.z {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn is_flat(&self, g: &Grid) -> bool {
        !self.is_curved(g)
    }
}

impl Face for Cone {
    fn core(&self) -> &FaceCore {
        &self.core
    }

    fn is_curved(&self, g: &Grid) -> bool {
        (self.point(g, 1).y - self.point(g, 0).y).abs() > cone::SMALL
    }

    /// Lateral area of the frustum times the outward rz normal.
    fn area2_normal_center(&self, g: &Grid) -> (Vector3d, Vector3d) {
        let a = self.point(g, 0);
        let b = self.point(g, 1);
        let c = (a + b) / 2.0;
        let v = b - a;
        let dr = b.x - a.x;
        let dz = b.y - a.y;
        let s = (dr * dr + dz * dz).sqrt();
        let area2 = TWO_PI * (a.x + b.x) * s;
        (v.right_normal() * area2, c)
    }

    fn distance(&self, g: &Grid, w: Vector3d) -> f64 {
        let d = w.get_rz() - self.subpoint(g, w).get_rz();
        d.dot(self.normal(g))
    }

    /// Foot of the perpendicular in the rz plane, rotated back into w's
    /// azimuth.
    fn subpoint(&self, g: &Grid, w: Vector3d) -> Vector3d {
        let wr = (w.x * w.x + w.y * w.y).sqrt();
        let phi = w.y.atan2(w.x);

        let a = self.point(g, 0);
        let b = self.point(g, 1);
        let dr = b.x - a.x;
        let dz = b.y - a.y;

        let t = ((wr - a.x) * dr + (w.z - a.y) * dz) / (dr * dr + dz * dz);
        let rs = a.x + t * dr;
        Vector3d::new(rs * phi.cos(), rs * phi.sin(), a.y + t * dz)
    }

    /// Ribbon midpoint rotated into w's azimuth.
    fn face_point(&self, g: &Grid, w: Vector3d) -> Vector3d {
        let phi = w.y.atan2(w.x);
        let mid = (self.point(g, 0) + self.point(g, 1)) / 2.0;
        Vector3d::new(mid.x * phi.cos(), mid.x * phi.sin(), mid.y)
    }

    /// rz-plane bounding-box test against the two endpoints.
    fn contains(&self, g: &Grid, w: Vector3d) -> bool {
        let v = w.get_rz();
        let a = self.point(g, 0);
        let b = self.point(g, 1);
        (v.x - a.x) * (v.x - b.x) <= cone::ZERO && (v.y - a.y) * (v.y - b.y) <= cone::ZERO
    }

    fn intercept(&self, g: &Grid, p: Vector3d, u: Vector3d, eqt: f64, from: FaceId) -> Intercept {
        let fid = self.fid();
        let atail = self.point(g, 0);
        let za = atail.y;

        let mut rv;
        if self.is_flat(g) {
            // annular disk: plane intersection with n = zhat
            if fid == from || u.z.abs() < SMALL {
                return Intercept::not_found(fid);
            }
            rv = Intercept::not_found(fid);
            rv.t = (za - p.z) / u.z;
            rv.w = p + u * rv.t;
            rv.is_found = sign_eqt(rv.t, eqt) == 1 && self.contains(g, rv.w);
        } else {
            let bhead = self.point(g, 1);
            let ra = atail.x;
            let dr = bhead.x - ra;
            let dz = bhead.y - za;
            let rp2 = p.x * p.x + p.y * p.y;
            let zd = p.z - za;
            let dz2 = dz * dz;
            let ff = dz2 * (p.x * u.x + p.y * u.y);
            let gg = dz * ra * dr;
            let hh = gg + zd * dr * dr;
            let uzdr = u.z * dr;

            let uxy2 = u.x * u.x + u.y * u.y;
            if uxy2 > 1.0e-8 {
                // general case: quadratic in t from the rz implicit equation
                let a = dz2 * uxy2 - uzdr * uzdr;
                let b = 2.0 * (ff - u.z * hh);
                let c = dz2 * (rp2 - ra * ra) - zd * (gg + hh);
                let roots = solve_quadratic(a, b, c, eqt);
                rv = choose_root(roots, p, u, eqt, from, fid, |w| self.contains(g, w));
            } else if dr.abs() < SMALL {
                // a vertical ray cannot leave through a cylinder wall
                return Intercept::not_found(fid);
            } else {
                // near-vertical ray: solve directly for the crossing height
                rv = Intercept::not_found(fid);
                rv.w = Vector3d::new(p.x, p.y, za + (rp2.sqrt() - ra) * dz / dr);
                rv.t = (rv.w.z - p.z) / u.z;
                rv.is_found = sign_eqt(rv.t, eqt) == 1 && self.contains(g, rv.w);
            }

            // a ray running along the generatrix grazes rather than crosses
            let phi = rv.w.y.atan2(rv.w.x);
            let (sin_phi, cos_phi) = phi.sin_cos();
            let head = Vector3d::new(bhead.x * cos_phi, bhead.x * sin_phi, bhead.y);
            let tail = Vector3d::new(atail.x * cos_phi, atail.x * sin_phi, atail.y);
            let cone_dir = (tail - head).unit();
            let cross_product = cone_dir.cross(u) / u.norm();
            if cross_product.norm().abs() < 1.0e-16 {
                return Intercept::not_found(fid);
            }

            if !rv.is_found && from == fid && rp2.sqrt() < 2.0 * cone::MINIMUM_DISTANCE {
                // A valid solution was rejected by floating-point noise near
                // the vertex: hop the ray across the z-axis, tolerating a
                // small error. The solution is provisional (t is parked at
                // BIG/2 so stepping cannot settle here), and the rescue is
                // counted because it can mask genuine topology errors.
                rv.w = Vector3d::new(-p.x, -p.y, p.z);
                rv.t = BIG / 2.0;
                rv.is_found = true;
                log::warn!(
                    "cone ({}, {}): near-axis hop at r = {:.3e} cm",
                    fid.zone,
                    fid.face,
                    rp2.sqrt()
                );
                AXIS_HOPS.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }

        if rv.is_found && rv.t < BIG / 4.0 {
            // nudge hits off the ribbon edges to break degenerate
            // edge-shared intersections
            let w = rv.w;
            let phi = w.y.atan2(w.x);
            let (a, b) = self.get_endpoints(g, phi);
            if (w - a).norm() < cone::MINIMUM_DISTANCE {
                rv.w = Vector3d::along(cone::MINIMUM_DISTANCE, a, b);
            }
            if (w - b).norm() < cone::MINIMUM_DISTANCE {
                rv.w = Vector3d::along(cone::MINIMUM_DISTANCE, b, a);
            }
        }

        rv
    }

    /// Inverse-distance mean of the two endpoint velocities in the rz
    /// plane, rotated into w's azimuth.
    fn velocity(&self, g: &Grid, w: Vector3d) -> Vector3d {
        let wrz = w.get_rz();
        let phi = w.y.atan2(w.x);

        let mut u = Vector3d::default();
        let mut s = 0.0;
        for i in 0..2 {
            let d = (self.point(g, i) - wrz).norm();
            if d < SMALL {
                u = g.velocity(self.core.nodes[i]);
                s = 1.0;
                break;
            }
            let d = 1.0 / d;
            s += d;
            u += g.velocity(self.core.nodes[i]) * d;
        }
        u /= s;
        Vector3d::new(u.x * phi.cos(), u.x * phi.sin(), u.y)
    }
}

/// Process-wide tally of near-axis hops; a nonzero count at the end of a
/// run is reported as suspicious.
pub static AXIS_HOPS: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::geometry::grid::Node;

    fn rz_grid(points: &[(f64, f64)]) -> Grid {
        let mut g = Grid::new();
        for (i, &(r, z)) in points.iter().enumerate() {
            g.add_node(Node::new(
                i,
                Vector3d::new(r, z, 0.0),
                Vector3d::default(),
            ));
        }
        g
    }

    fn cone_between(g_points: &[(f64, f64)]) -> (Grid, Cone) {
        let g = rz_grid(g_points);
        let mut f = Cone::new(1, 0);
        f.add_node(0);
        f.add_node(1);
        (g, f)
    }

    #[test]
    fn area2_normal_center() {
        // endpoints (2, 4) and (5, 8): edge (3, 4), s = 5, ra + rb = 7
        let (g, f) = cone_between(&[(2.0, 4.0), (5.0, 8.0)]);
        let (an, c) = f.area2_normal_center(&g);
        let area2 = TWO_PI * 35.0;
        assert_abs_diff_eq!(an.x, 0.8 * area2, epsilon = 1e-9);
        assert_abs_diff_eq!(an.y, -0.6 * area2, epsilon = 1e-9);
        assert_eq!(c, Vector3d::new(3.5, 6.0, 0.0));
        assert_abs_diff_eq!(f.area(&g), crate::constants::PI * 35.0, epsilon = 1e-9);
        let n = f.normal(&g);
        assert_abs_diff_eq!(n.x, 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(n.y, -0.6, epsilon = 1e-12);
    }

    #[test]
    fn endpoints_ordered_by_z() {
        let (g, f) = cone_between(&[(5.0, 10.0), (2.0, 1.0)]);
        let (a, b) = f.get_endpoints(&g, 0.0);
        assert!(a.z < b.z);
        assert_abs_diff_eq!(a.x, 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(b.x, 5.0, epsilon = 1e-14);
        // rotated into azimuth pi/2
        let (a, _) = f.get_endpoints(&g, std::f64::consts::FRAC_PI_2);
        assert_abs_diff_eq!(a.y, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_disk_intercept() {
        // annulus between r = 1 and r = 3 at z = 2
        let (g, f) = cone_between(&[(1.0, 2.0), (3.0, 2.0)]);
        assert!(!f.is_curved(&g));
        let p = Vector3d::new(2.0, 0.0, 0.0);
        let u = Vector3d::new(0.0, 0.0, 1.0);
        let hit = f.intercept(&g, p, u, 1.0e-19, FaceId::new(9, 9));
        assert!(hit.is_found);
        assert_abs_diff_eq!(hit.t, 2.0, epsilon = 1e-12);
        // inside the hole: no hit
        let miss = f.intercept(
            &g,
            Vector3d::new(0.5, 0.0, 0.0),
            u,
            1.0e-19,
            FaceId::new(9, 9),
        );
        assert!(!miss.is_found);
    }

    #[test]
    fn grazing_along_generatrix_not_found() {
        // ribbon (5, 1) -> (9, 10) in rz; the ray runs down the generatrix
        let (g, f) = cone_between(&[(5.0, 1.0), (9.0, 10.0)]);
        let p = Vector3d::new(9.0, 0.0, 10.0);
        let u = Vector3d::new(-4.0, 0.0, -9.0); // along the surface line
        let hit = f.intercept(&g, p, u, 1.0e-19, FaceId::new(9, 9));
        assert!(!hit.is_found);
    }

    #[test]
    fn oblique_hit_takes_nearer_root() {
        // 45-degree cone r = z between (1, 1) and (4, 4): the quadric is
        // x^2 + y^2 = z^2. A horizontal chord at z = 2 crosses it at
        // x = -2 (t = 1) and x = 2 (t = 5).
        let (g, f) = cone_between(&[(1.0, 1.0), (4.0, 4.0)]);
        let p = Vector3d::new(-3.0, 0.0, 2.0);
        let u = Vector3d::new(1.0, 0.0, 0.0);
        let hit = f.intercept(&g, p, u, 1.0e-19, FaceId::new(9, 9));
        assert!(hit.is_found);
        assert_abs_diff_eq!(hit.t, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hit.w.x, -2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hit.w.z, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn leaving_own_face_takes_farther_root() {
        // same chord, but the ray starts on this face: the nearer root is
        // the one being left, so the exit is at t = 5
        let (g, f) = cone_between(&[(1.0, 1.0), (4.0, 4.0)]);
        let p = Vector3d::new(-3.0, 0.0, 2.0);
        let u = Vector3d::new(1.0, 0.0, 0.0);
        let hit = f.intercept(&g, p, u, 1.0e-19, f.fid());
        assert!(hit.is_found);
        assert_abs_diff_eq!(hit.t, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hit.w.x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn cylinder_vertical_ray_not_found() {
        // cylinder wall at r = 2
        let (g, f) = cone_between(&[(2.0, 0.0), (2.0, 5.0)]);
        let p = Vector3d::new(0.0, 0.0, 1.0);
        let u = Vector3d::new(0.0, 0.0, 1.0);
        assert!(!f.intercept(&g, p, u, 1.0e-19, FaceId::new(9, 9)).is_found);
    }

    #[test]
    fn cylinder_radial_ray_hits_wall() {
        let (g, f) = cone_between(&[(2.0, 0.0), (2.0, 5.0)]);
        let p = Vector3d::new(0.0, 0.0, 2.5);
        let u = Vector3d::new(1.0, 0.0, 0.0);
        let hit = f.intercept(&g, p, u, 1.0e-19, FaceId::new(9, 9));
        assert!(hit.is_found);
        assert_abs_diff_eq!(hit.t, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hit.w.x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn contains_is_rz_box() {
        let (g, f) = cone_between(&[(1.0, 0.0), (3.0, 4.0)]);
        assert!(f.contains(&g, Vector3d::new(2.0, 0.0, 2.0)));
        assert!(!f.contains(&g, Vector3d::new(4.0, 0.0, 2.0)));
        assert!(!f.contains(&g, Vector3d::new(2.0, 0.0, 5.0)));
        // azimuth does not matter
        assert!(f.contains(&g, Vector3d::new(0.0, 2.0, 2.0)));
    }

    #[test]
    fn velocity_rotates_into_azimuth() {
        let mut g = Grid::new();
        g.add_node(Node::new(
            0,
            Vector3d::new(1.0, 0.0, 0.0),
            Vector3d::new(2.0, 0.0, 0.0), // radial 2, axial 0
        ));
        g.add_node(Node::new(
            1,
            Vector3d::new(1.0, 2.0, 0.0),
            Vector3d::new(2.0, 0.0, 0.0),
        ));
        let mut f = Cone::new(1, 0);
        f.add_node(0);
        f.add_node(1);
        // at azimuth pi/2 the radial velocity points along +y
        let v = f.velocity(&g, Vector3d::new(0.0, 1.0, 1.0));
        assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.y, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn subpoint_perpendicular_foot() {
        // cylinder wall at r = 2: the foot of any point is at radius 2,
        // same azimuth and height
        let (g, f) = cone_between(&[(2.0, 0.0), (2.0, 5.0)]);
        let s = f.subpoint(&g, Vector3d::new(3.0, 4.0, 1.0));
        assert_abs_diff_eq!((s.x * s.x + s.y * s.y).sqrt(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.z, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.distance(&g, Vector3d::new(3.0, 4.0, 1.0)), 3.0, epsilon = 1e-12);
    }
}
