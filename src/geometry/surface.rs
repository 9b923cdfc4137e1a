// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Composite surfaces: an ordered sequence of planar sub-polygons acting
//! as a single face. Sub-faces carry the reserved face index -1; identity
//! and neighbor linkage live on the parent.

use super::face::{Face, FaceCore, FaceId, Intercept};
use super::grid::Grid;
use super::polygon::Polygon;
use super::vector::Vector3d;
use crate::io::{IoError, TokenReader};

#[derive(Clone, Debug, Default)]
pub struct Surface {
    core: FaceCore,
    subs: Vec<Polygon>,
}

impl Surface {
    pub fn new(my_zone: usize, my_id: i16) -> Self {
        Self {
            core: FaceCore::new(my_zone, my_id),
            subs: Vec::new(),
        }
    }

    pub fn add_subface(&mut self, p: Polygon) {
        self.subs.push(p);
    }

    pub fn nsubs(&self) -> usize {
        self.subs.len()
    }

    pub fn add_neighbor(&mut self, zone: usize, face: i16) {
        self.core.neighbors.push(FaceId::new(zone, face));
    }

    /// Mesh-file record: FaceID, sub-face count, that many polygon records
    /// without neighbor lists, then the parent's neighbors.
    pub fn load(r: &mut TokenReader) -> Result<Self, IoError> {
        let my_zone: usize = r.next("surface zone id")?;
        let my_id: i16 = r.next("surface face index")?;
        let mut surface = Surface::new(my_zone, my_id);
        let nsubs: usize = r.next("sub-face count")?;
        for _ in 0..nsubs {
            r.find_word("Polygon")?;
            surface.subs.push(Polygon::load_subface(r)?);
        }
        surface.core.load_neighbors(r)?;
        Ok(surface)
    }

    /// The sub-face responsible for `w`: the first one containing it, or
    /// failing that the one whose plane passes closest.
    fn sub_for(&self, g: &Grid, w: Vector3d) -> &Polygon {
        self.subs
            .iter()
            .find(|s| s.contains(g, w))
            .unwrap_or_else(|| {
                self.subs
                    .iter()
                    .min_by(|a, b| {
                        a.distance(g, w)
                            .abs()
                            .total_cmp(&b.distance(g, w).abs())
                    })
                    .expect("a Surface holds at least one sub-face")
            })
    }
}

impl Face for Surface {
    fn core(&self) -> &FaceCore {
        &self.core
    }

    fn is_curved(&self, _g: &Grid) -> bool {
        false
    }

    fn area2_normal_center(&self, g: &Grid) -> (Vector3d, Vector3d) {
        let mut area2 = Vector3d::default();
        let mut center = Vector3d::default();
        for s in &self.subs {
            let (a, c) = s.area2_normal_center(g);
            area2 += a;
            center += c;
        }
        (area2, center / self.subs.len() as f64)
    }

    fn distance(&self, g: &Grid, w: Vector3d) -> f64 {
        self.sub_for(g, w).distance(g, w)
    }

    fn subpoint(&self, g: &Grid, w: Vector3d) -> Vector3d {
        self.sub_for(g, w).subpoint(g, w)
    }

    fn face_point(&self, g: &Grid, w: Vector3d) -> Vector3d {
        self.sub_for(g, w).face_point(g, w)
    }

    fn contains(&self, g: &Grid, w: Vector3d) -> bool {
        self.subs.iter().any(|s| s.contains(g, w))
    }

    fn intercept(&self, g: &Grid, p: Vector3d, u: Vector3d, eqt: f64, from: FaceId) -> Intercept {
        let fid = self.fid();
        if from == fid {
            return Intercept::not_found(fid);
        }
        let mut best = Intercept::not_found(fid);
        best.t = crate::constants::BIG;
        let mut found = false;
        for s in &self.subs {
            let hit = s.intercept(g, p, u, eqt, from);
            if hit.is_found && hit.t < best.t {
                best.t = hit.t;
                best.w = hit.w;
                found = true;
            }
        }
        if !found {
            return Intercept::not_found(fid);
        }
        best.is_found = true;
        best.fid = fid;
        best
    }

    fn velocity(&self, g: &Grid, w: Vector3d) -> Vector3d {
        self.sub_for(g, w).velocity(g, w)
    }
}
