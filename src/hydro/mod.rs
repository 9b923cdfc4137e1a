// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! [Hydro]: the sequence of hydrodynamic snapshots driving a forward run,
//! or, in inverse mode, the enumeration of candidate zone states over a
//! fixed base geometry. Forward snapshots live in `mesh_<label>.txt` /
//! `time_<label>.txt` pairs listed by `times.txt`; inverse candidates
//! live in `states.txt` as per-zone lists of material-state records.

#[cfg(test)]
mod tests;

use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::detector::Symmetry;
use crate::geometry::{GeometryError, Grid, Mesh, Vector3d, ZoneState};
use crate::io::{self, IoError, TokenReader};
use crate::math::{self, IndexingError};

#[derive(Error, Debug)]
pub enum HydroError {
    #[error("time index {it} is not listed in {path}")]
    UnknownTimeIndex { it: usize, path: PathBuf },

    #[error("no time step falls within tmin = {tmin:e}, tmax = {tmax:e}")]
    EmptyTimeWindow { tmin: f64, tmax: f64 },

    #[error("states.txt lists {found} zones, the base geometry has {expected}")]
    StateZoneCountMismatch { found: usize, expected: usize },

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Indexing(#[from] IndexingError),

    #[error(transparent)]
    Io(#[from] IoError),
}

pub struct Hydro {
    analysis: bool,
    path: PathBuf,
    symmetry: Symmetry,
    /// Bounding sphere of the mesh, used to aim detector bundles.
    sc: Vector3d,
    sr: f64,
    /// (snapshot index, time, interval) rows of `times.txt`, windowed to
    /// `[tmin, tmax]` in forward mode.
    times: Vec<(usize, f64, f64)>,
    times_text: String,
    /// Candidate states per zone (inverse mode only).
    states: Vec<Vec<ZoneState>>,
    ndim: Vec<usize>,
    nintervals: usize,
    ntd: usize,
}

impl Hydro {
    pub fn new(
        analysis: bool,
        path: impl Into<PathBuf>,
        symmetry: Symmetry,
        tmin: f64,
        tmax: f64,
    ) -> Result<Self, HydroError> {
        let path = path.into();

        let mut bs = TokenReader::open(path.join("bounding_sphere.txt"))?;
        let sc = Vector3d::new(
            bs.next("sphere center x")?,
            bs.next("sphere center y")?,
            bs.next("sphere center z")?,
        );
        let sr: f64 = bs.next("sphere radius")?;

        let times_path = path.join("times.txt");
        let times_text = fs::read_to_string(&times_path).map_err(|source| IoError::FileNotOpen {
            path: times_path.clone(),
            source,
        })?;
        let mut tr = TokenReader::from_str_named(&times_text, times_path);
        tr.find_word("ntimes")?;
        let ntimes: usize = tr.next("time step count")?;
        let mut times = Vec::with_capacity(ntimes);
        for _ in 0..ntimes {
            let it: usize = tr.next("snapshot index")?;
            let t: f64 = tr.next("time")?;
            let dt: f64 = tr.next("time interval")?;
            if analysis || (t >= tmin && t <= tmax) {
                times.push((it, t, dt));
            }
        }
        if times.is_empty() {
            return Err(HydroError::EmptyTimeWindow { tmin, tmax });
        }

        let mut h = Self {
            analysis,
            path,
            symmetry,
            sc,
            sr,
            times,
            times_text,
            states: Vec::new(),
            ndim: Vec::new(),
            nintervals: 0,
            ntd: 0,
        };

        if analysis {
            h.load_states()?;
            h.nintervals = h.case_count();
        } else {
            h.nintervals = h.times.len();
        }
        let max_label = if analysis {
            h.nintervals.saturating_sub(1)
        } else {
            h.times.iter().map(|t| t.0).max().unwrap_or(0)
        };
        h.ntd = math::ndigits(max_label);
        Ok(h)
    }

    /// `states.txt`: `Zones <n>`, then per zone `Zone <id> ncases <k>`
    /// followed by `k` material-state records.
    fn load_states(&mut self) -> Result<(), HydroError> {
        let mut r = TokenReader::open(self.path.join("states.txt"))?;
        r.find_word("Zones")?;
        let nzones: usize = r.next("zone count")?;
        for _ in 0..nzones {
            r.find_word("Zone")?;
            let _id: usize = r.next("zone id")?;
            r.find_word("ncases")?;
            let ncases: usize = r.next("case count")?;
            let mut candidates = Vec::with_capacity(ncases);
            for _ in 0..ncases {
                candidates.push(ZoneState::load(&mut r)?);
            }
            self.states.push(candidates);
        }
        self.ndim = self.states.iter().map(Vec::len).collect();
        Ok(())
    }

    fn case_count(&self) -> usize {
        match self.symmetry {
            Symmetry::None => self.ndim.iter().product(),
            Symmetry::Spherical => self.ndim.iter().sum(),
        }
    }

    pub fn analysis(&self) -> bool {
        self.analysis
    }

    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    /// Switching to the product index scheme after a spherical search;
    /// the case count follows the scheme.
    pub fn set_symmetry(&mut self, symmetry: Symmetry) {
        self.symmetry = symmetry;
        if self.analysis {
            self.nintervals = self.case_count();
        }
    }

    pub fn nintervals(&self) -> usize {
        self.nintervals
    }

    pub fn ntd(&self) -> usize {
        self.ntd
    }

    pub fn ndim(&self) -> &[usize] {
        &self.ndim
    }

    pub fn sphere_center(&self) -> Vector3d {
        self.sc
    }

    pub fn sphere_radius(&self) -> f64 {
        self.sr
    }

    pub fn times_text(&self) -> &str {
        &self.times_text
    }

    /// Snapshot index used on disk for the j-th interval (identity for
    /// the enumerated cases of an inverse search).
    pub fn time_index_at(&self, j: usize) -> usize {
        if self.analysis {
            j
        } else {
            self.times[j].0
        }
    }

    fn time_row(&self, it: usize) -> Result<&(usize, f64, f64), HydroError> {
        if self.analysis {
            return Ok(&self.times[0]);
        }
        self.times
            .iter()
            .find(|row| row.0 == it)
            .ok_or_else(|| HydroError::UnknownTimeIndex {
                it,
                path: self.path.join("times.txt"),
            })
    }

    pub fn time_at(&self, it: usize) -> Result<f64, HydroError> {
        Ok(self.time_row(it)?.1)
    }

    pub fn dt_at(&self, it: usize) -> Result<f64, HydroError> {
        Ok(self.time_row(it)?.2)
    }

    /// Bring `(grid, mesh)` to snapshot (or candidate) `it`.
    ///
    /// Forward mode replaces both from the snapshot file pair. Inverse
    /// mode loads the base geometry once, then applies candidate states:
    /// a product index sets every zone, a summation index only the zone
    /// whose axis it belongs to, leaving the rest as previously set (the
    /// peeled search relies on this to hold outer shells at their best).
    pub fn load_at(&self, it: usize, grid: &mut Grid, mesh: &mut Mesh) -> Result<(), HydroError> {
        if !self.analysis {
            let label = io::fmt_int0(it, self.ntd);
            let mut geo = TokenReader::open(self.path.join(format!("mesh_{label}.txt")))?;
            let mut mat = TokenReader::open(self.path.join(format!("time_{label}.txt")))?;
            *grid = Grid::load(&mut geo)?;
            *mesh = Mesh::load(&mut geo, &mut mat)?;
            return Ok(());
        }

        if mesh.is_empty() {
            let label = io::fmt_int0(0, self.ntd);
            let mut geo = TokenReader::open(self.path.join(format!("mesh_{label}.txt")))?;
            *grid = Grid::load(&mut geo)?;
            *mesh = Mesh::load_geometry(&mut geo)?;
            if mesh.len() != self.states.len() {
                return Err(HydroError::StateZoneCountMismatch {
                    found: self.states.len(),
                    expected: mesh.len(),
                });
            }
            // start every zone from its first candidate
            for iz in 0..mesh.len() {
                mesh.zone_mut(iz)?.apply_state(self.states[iz][0].clone());
            }
        }

        match self.symmetry {
            Symmetry::None => {
                let indx = math::one_to_many(&self.ndim, it)?;
                for (iz, &k) in indx.iter().enumerate() {
                    mesh.zone_mut(iz)?.apply_state(self.states[iz][k].clone());
                }
            }
            Symmetry::Spherical => {
                let (axis, k) = math::one_to_two(&self.ndim, it)?;
                mesh.zone_mut(axis)?.apply_state(self.states[axis][k].clone());
            }
        }
        Ok(())
    }
}
