// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ray transport: the zone-to-zone walk across the mesh and the
//! far-to-near integration of the radiative transfer equation with the
//! moving-medium (Doppler) correction at zone boundaries.


use thiserror::Error;

use crate::arr::ArrDbl;
use crate::constants::CV;
use crate::dbase::{zone_optical_data, Database, DbaseError, OpticalData, Table};
use crate::geometry::{Face, FaceId, GeometryError, Grid, Mesh, Vector3d, Zone};
use crate::math::{syngrids, AxisMode};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Dbase(#[from] DbaseError),
}

/// One zone crossing of a traced ray.
#[derive(Clone, Copy, Debug)]
pub struct RaySegment {
    pub zone: usize,
    pub entry: Vector3d,
    pub exit: Vector3d,
    pub entry_face: FaceId,
    pub exit_face: FaceId,
}

/// Per-zone optical coefficients saved by the central ray of a
/// spherically symmetric snapshot for reuse by its off-center rays.
pub type SpectralCache = Vec<Option<OpticalData>>;

/// A single line of sight: trace it across the mesh, then integrate
/// intensity along it from the far side toward the detector.
pub struct Ray {
    /// Launch point (on or before the bounding sphere).
    pub r: Vector3d,
    /// Flight direction scaled to the speed of light, so ray parameters
    /// are photon times of flight.
    pub v: Vector3d,
    /// Intensity spectrum over the detector's hv window.
    pub y: ArrDbl,
    /// Database hv window bounds.
    pub jmin: usize,
    pub jmax: usize,
    /// Log the zone path after tracing.
    pub tracking: bool,
    pub segments: Vec<RaySegment>,
}

impl Ray {
    pub fn new(jmin: usize, jmax: usize, tracking: bool, r: Vector3d, v: Vector3d) -> Self {
        Self {
            r,
            v,
            y: ArrDbl::new(jmax - jmin + 1),
            jmin,
            jmax,
            tracking,
            segments: Vec::new(),
        }
    }

    pub fn set_backlighter(&mut self, yback: &ArrDbl) {
        self.y = yback.clone();
    }

    /// Walk from the launch point zone-to-zone until the ray exits
    /// through the bounding sphere or crosses into the bounding zone.
    pub fn trace(&mut self, g: &Grid, m: &Mesh) -> Result<(), GeometryError> {
        self.segments.clear();
        let mut current_zone = Zone::BOUNDING_ZONE;
        let mut current_face = FaceId::new(Zone::BOUNDING_ZONE, FaceId::RAY_START);
        let mut p = self.r;

        // a straight line crosses each zone of a well-formed mesh a
        // bounded number of times; running past that means the walk is
        // cycling
        let max_steps = 4 * m.len() + 16;
        let mut terminated = false;
        for _ in 0..max_steps {
            let zone = m.zone(current_zone)?;
            let hit = zone.hit(g, p, self.v, current_face)?;
            self.segments.push(RaySegment {
                zone: current_zone,
                entry: p,
                exit: hit.w,
                entry_face: current_face,
                exit_face: hit.fid,
            });

            if hit.fid == FaceId::BOUNDING_SPHERE {
                terminated = true;
                break;
            }
            let exit_face = m.zone(hit.fid.zone)?.face(hit.fid.face as usize);
            let next = exit_face
                .neighbors()
                .iter()
                .find(|n| n.zone != current_zone)
                .copied()
                .ok_or(GeometryError::NoExitNeighbor {
                    zone: current_zone,
                    face: hit.fid.face,
                })?;
            if next.zone == Zone::BOUNDING_ZONE {
                terminated = true;
                break;
            }
            current_zone = next.zone;
            current_face = next;
            p = hit.w;
        }
        if !terminated {
            return Err(GeometryError::StuckRay {
                zone: current_zone,
                face: current_face.face,
            });
        }

        if self.tracking {
            for s in &self.segments {
                log::debug!(
                    "ray segment: zone {} from ({:.6e}, {:.6e}, {:.6e}) to ({:.6e}, {:.6e}, {:.6e})",
                    s.zone,
                    s.entry.x,
                    s.entry.y,
                    s.entry.z,
                    s.exit.x,
                    s.exit.y,
                    s.exit.z
                );
            }
        }
        Ok(())
    }

    /// Integrate the transfer equation along the traced segments in
    /// reverse order (far side first), starting from the backlighter
    /// already loaded into `y`. `central` marks the ray that populates
    /// the spectral cache under spherical symmetry; other rays of the
    /// same snapshot reuse it.
    pub fn cross_mesh(
        &mut self,
        g: &Grid,
        m: &Mesh,
        d: &Database,
        tbl: &Table,
        hv: &[f64],
        mut cache: Option<&mut SpectralCache>,
        central: bool,
    ) -> Result<(), TransportError> {
        let nhv = self.jmax - self.jmin + 1;
        debug_assert_eq!(hv.len(), nhv);

        for i in (0..self.segments.len()).rev() {
            let seg = self.segments[i];
            let zone = m.zone(seg.zone)?;
            if zone.nmat() == 0 {
                // vacuum: the ray passes through untouched
                continue;
            }

            let data = match cache.as_deref_mut() {
                Some(c) if central => {
                    let fresh = zone_optical_data(zone, d, tbl, self.jmin, self.jmax)?;
                    c[seg.zone] = Some(fresh.clone());
                    fresh
                }
                Some(c) => match &c[seg.zone] {
                    Some(saved) => saved.clone(),
                    None => zone_optical_data(zone, d, tbl, self.jmin, self.jmax)?,
                },
                None => zone_optical_data(zone, d, tbl, self.jmin, self.jmax)?,
            };

            // lab -> rest at the upstream boundary
            if let Some(beta) = self.boundary_beta(g, m, seg.entry_face, seg.entry)? {
                self.y = doppler_remap(hv, &self.y, 1.0 - beta);
            }

            let length = (seg.exit - seg.entry).norm();
            advance_intensity(&mut self.y, &data.em, &data.ab, &data.sc, length);

            // rest -> lab at the downstream boundary
            if let Some(beta) = self.boundary_beta(g, m, seg.exit_face, seg.exit)? {
                self.y = doppler_remap(hv, &self.y, 1.0 / (1.0 - beta));
            }
        }
        Ok(())
    }

    /// Flow velocity at a segment boundary projected on the ray,
    /// in units of c. Sentinel faces (a ray start) carry no velocity.
    fn boundary_beta(
        &self,
        g: &Grid,
        m: &Mesh,
        fid: FaceId,
        w: Vector3d,
    ) -> Result<Option<f64>, GeometryError> {
        if fid.face < 0 {
            return Ok(None);
        }
        let face = m.zone(fid.zone)?.face(fid.face as usize);
        let vel = face.velocity(g, w);
        Ok(Some(vel.dot(self.v.unit()) / CV))
    }
}

/// One path-length step of the formal solution:
/// `y <- y exp(-tau) + S (1 - exp(-tau))` with `tau = (a + s) L` and the
/// source function `S = e / (a + s)` where extinction is present.
pub fn advance_intensity(y: &mut ArrDbl, em: &ArrDbl, ab: &ArrDbl, sc: &ArrDbl, length: f64) {
    for k in 0..y.len() {
        let ext = ab[k] + sc[k];
        let tau = ext * length;
        let att = (-tau).exp();
        let source = if ext > 0.0 { em[k] / ext } else { 0.0 };
        y[k] = y[k] * att + source * (1.0 - att);
    }
}

/// Resample `y` from the grid `hv` onto the grid `hv * factor`,
/// linear in both axes. Values beyond the tabulated range hold the end
/// bins, and a degenerate factor leaves the spectrum untouched.
pub fn doppler_remap(hv: &[f64], y: &ArrDbl, factor: f64) -> ArrDbl {
    if !factor.is_finite() || factor <= 0.0 || (factor - 1.0).abs() < crate::constants::SMALL {
        return y.clone();
    }
    let shifted: Vec<f64> = hv.iter().map(|&e| e * factor).collect();
    ArrDbl::from_vec(syngrids(
        hv,
        y.as_slice(),
        AxisMode::Lin,
        AxisMode::Lin,
        &shifted,
    ))
}
