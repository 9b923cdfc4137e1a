// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! [Zone]: a closed region of space bounded by faces and carrying one
//! uniform material state. Provides the ray-exit query that drives the
//! zone-to-zone walk.

use super::face::{Face, FaceId, FacePtr, Intercept};
use super::grid::Grid;
use super::vector::Vector3d;
use super::GeometryError;
use crate::constants::{BIG, EQT};
use crate::io::TokenReader;

#[derive(Default)]
pub struct Zone {
    id: usize,
    faces: Vec<FacePtr>,
    /// Electron temperature \[eV\].
    pub te: f64,
    /// Radiation temperature \[eV\].
    pub tr: f64,
    /// Particle (ion) number density \[particles/cm3\].
    pub np: f64,
    /// Material names, parallel to `fp`.
    pub mat: Vec<String>,
    /// Number fractions of the materials; expected to sum to 1.
    pub fp: Vec<f64>,
}

impl Zone {
    /// The universe boundary: every ray begins and ends its walk here.
    pub const BOUNDING_ZONE: usize = 0;

    pub fn new(id: usize) -> Self {
        Self {
            id,
            te: -1.0,
            tr: -1.0,
            np: -1.0,
            ..Self::default()
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn add_face(&mut self, f: FacePtr) {
        self.faces.push(f);
    }

    pub fn face(&self, i: usize) -> &dyn Face {
        self.faces[i].as_ref()
    }

    pub fn faces(&self) -> &[FacePtr] {
        &self.faces
    }

    pub fn nfaces(&self) -> usize {
        self.faces.len()
    }

    pub fn nmat(&self) -> usize {
        self.mat.len()
    }

    /// Centroid of the face representative points: an interior restart
    /// origin for rays that rounded off the zone boundary.
    pub fn zone_point(&self, g: &Grid, p: Vector3d) -> Vector3d {
        let mut s = Vector3d::default();
        for f in &self.faces {
            s += f.face_point(g, p);
        }
        s / self.faces.len() as f64
    }

    /// First positive face hit of the ray `(p, u)` leaving this zone, given
    /// the face it currently sits on. When rounding has pushed `p` just
    /// outside the zone, a second attempt from [Zone::zone_point] recovers;
    /// failing that the ray is genuinely lost.
    pub fn hit(
        &self,
        g: &Grid,
        p: Vector3d,
        u: Vector3d,
        from: FaceId,
    ) -> Result<Intercept, GeometryError> {
        if let Some(hit) = self.closest_hit(g, p, u, from) {
            return Ok(hit);
        }
        let zp = self.zone_point(g, p);
        if let Some(hit) = self.closest_hit(g, zp, u, from) {
            return Ok(hit);
        }
        Err(GeometryError::LostRay {
            zone: self.id,
            x: p.x,
            y: p.y,
            z: p.z,
        })
    }

    fn closest_hit(&self, g: &Grid, p: Vector3d, u: Vector3d, from: FaceId) -> Option<Intercept> {
        let mut best: Option<Intercept> = None;
        for f in &self.faces {
            let pt = f.intercept(g, p, u, EQT, from);
            if pt.is_found && pt.t < best.map_or(BIG, |b| b.t) {
                best = Some(pt);
            }
        }
        best
    }

    /// Geometry record: `Zone <id> <nfaces>` then face records dispatched
    /// on their leading keyword.
    pub fn load_geo(r: &mut TokenReader) -> Result<Self, GeometryError> {
        r.find_word("Zone")?;
        let id: usize = r.next("zone id")?;
        let mut zone = Zone::new(id);
        let nfaces: usize = r.next("face count")?;
        for _ in 0..nfaces {
            let kind = r
                .next::<String>("face kind")
                .map_err(GeometryError::Io)?;
            let f: FacePtr = match kind.as_str() {
                "Sphere" => Box::new(super::sphere::Sphere::load(r)?),
                "Polygon" => Box::new(super::polygon::Polygon::load(r)?),
                "Cone" => Box::new(super::cone::Cone::load(r)?),
                "Surface" => Box::new(super::surface::Surface::load(r)?),
                _ => {
                    return Err(GeometryError::UnknownFaceKind {
                        kind,
                        path: r.path().to_path_buf(),
                    })
                }
            };
            zone.faces.push(f);
        }
        Ok(zone)
    }

    /// Material state record: `Zone <id>` then te, tr, np, nmat and the
    /// (material, fraction) pairs.
    pub fn load_mat(&mut self, r: &mut TokenReader) -> Result<(), GeometryError> {
        r.find_word("Zone")?;
        let _id: usize = r.next("zone id")?;
        self.apply_state(ZoneState::load(r)?);
        Ok(())
    }

    pub fn apply_state(&mut self, state: ZoneState) {
        self.te = state.te;
        self.tr = state.tr;
        self.np = state.np;
        self.mat = state.mat;
        self.fp = state.fp;
    }
}

/// One material-state record, as it appears in time files and in the
/// per-zone candidate lists of an inverse search.
#[derive(Clone, Debug, Default)]
pub struct ZoneState {
    pub te: f64,
    pub tr: f64,
    pub np: f64,
    pub mat: Vec<String>,
    pub fp: Vec<f64>,
}

impl ZoneState {
    pub fn load(r: &mut TokenReader) -> Result<Self, GeometryError> {
        let mut state = ZoneState::default();
        r.find_word("te")?;
        state.te = r.next("electron temperature")?;
        r.find_word("tr")?;
        state.tr = r.next("radiation temperature")?;
        r.find_word("np")?;
        state.np = r.next("particle density")?;
        r.find_word("nmat")?;
        let nmat: usize = r.next("material count")?;
        r.find_word("material")?;
        r.find_word("fraction")?;
        for _ in 0..nmat {
            state.mat.push(r.next("material name")?);
            state.fp.push(r.next("material fraction")?);
        }
        Ok(state)
    }
}
