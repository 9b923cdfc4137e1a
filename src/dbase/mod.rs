// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The tabulated opacity database: te/tr/ne/hv grids with their on-disk
//! string encodings, the material-name table, and the per-zone lookup of
//! emissivity, absorption and scattering spectra with the electron density
//! solved by stoichiometric charge neutrality.


use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

use crate::arr::{ArrDbl, ArrError};
use crate::geometry::Zone;
use crate::io::{IoError, TokenReader};
use crate::math::{ne_charge_neut, nearest};

#[derive(Error, Debug)]
pub enum DbaseError {
    #[error("material `{name}` is not in the material table")]
    UnknownMaterial { name: String },

    #[error("external opacity generation (`{cmnd}`) is not supported; the database must be pretabulated")]
    TopsUnsupported { cmnd: String },

    #[error("electron density grid is empty in {path}")]
    EmptyNeGrid { path: PathBuf },

    #[error(transparent)]
    Arr(#[from] ArrError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Translation from user material names to on-disk directory names.
#[derive(Clone, Debug, Default)]
pub struct Table {
    map: IndexMap<String, String>,
}

impl Table {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DbaseError> {
        let mut r = TokenReader::open(path)?;
        let mut map = IndexMap::new();
        while !r.is_exhausted() {
            let user: String = r.next("material alias")?;
            let disk: String = r.next("material directory name")?;
            map.insert(user, disk);
        }
        Ok(Self { map })
    }

    pub fn insert(&mut self, user: impl Into<String>, disk: impl Into<String>) {
        self.map.insert(user.into(), disk.into());
    }

    pub fn get_f(&self, name: &str) -> Result<&str, DbaseError> {
        self.map
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| DbaseError::UnknownMaterial {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// One tabulated axis: values plus the strings used in file names.
#[derive(Clone, Debug, Default)]
struct GridAxis {
    nbits: usize,
    values: Vec<f64>,
    labels: Vec<String>,
}

impl GridAxis {
    /// Grid-file sections: "Number of bits:", "Number of grid points:",
    /// "Grid points:" followed by (index, value) rows. With `int_width`
    /// the values are integers and their labels are zero-padded.
    fn load(path: &Path, int_width: usize) -> Result<Self, DbaseError> {
        let mut r = TokenReader::open(path)?;
        r.find_word("bits:")?;
        let nbits: usize = r.next("bit count")?;
        r.find_word("points:")?;
        let n: usize = r.next("grid point count")?;
        r.find_word("points:")?;
        let mut values = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for _ in 0..n {
            let _index: usize = r.next("grid point index")?;
            if int_width == 0 {
                let label: String = r.next("grid point value")?;
                let value: f64 = label.parse().map_err(|_| IoError::BadToken {
                    token: label.clone(),
                    what: "grid point value",
                    path: path.to_path_buf(),
                })?;
                values.push(value);
                labels.push(label);
            } else {
                let k: i64 = r.next("grid point value")?;
                values.push(k as f64);
                labels.push(if k < 0 {
                    format!("-{:0w$}", -k, w = int_width.saturating_sub(1))
                } else {
                    format!("{:0w$}", k, w = int_width)
                });
            }
        }
        Ok(Self {
            nbits,
            values,
            labels,
        })
    }
}

pub struct Database {
    path: PathBuf,
    tops_cmnd: String,
    te: GridAxis,
    tr: GridAxis,
    ne: GridAxis,
    hv: GridAxis,
}

impl Database {
    /// Load the te/tr/ne/hv grids from `<path>/grids/`. The electron
    /// density axis is assembled as mantissa x 10^exponent with labels
    /// `<mantissa>e<exponent>`.
    pub fn new(tops_cmnd: &str, path: impl Into<PathBuf>) -> Result<Self, DbaseError> {
        if tops_cmnd != "none" {
            return Err(DbaseError::TopsUnsupported {
                cmnd: tops_cmnd.to_string(),
            });
        }
        let path = path.into();
        let grids = path.join("grids");
        let te = GridAxis::load(&grids.join("te_grid.txt"), 0)?;
        let tr = GridAxis::load(&grids.join("tr_grid.txt"), 0)?;
        let neman = GridAxis::load(&grids.join("ne_man_grid.txt"), 0)?;
        let neexp = GridAxis::load(&grids.join("ne_exp_grid.txt"), 2)?;
        let hv = GridAxis::load(&grids.join("hv_grid.txt"), 0)?;

        let mut ne = GridAxis {
            nbits: neman.nbits + neexp.nbits,
            values: Vec::with_capacity(neman.values.len() * neexp.values.len()),
            labels: Vec::with_capacity(neman.values.len() * neexp.values.len()),
        };
        for (e, estr) in neexp.values.iter().zip(&neexp.labels) {
            let scale = 10.0f64.powf(*e);
            for (m, mstr) in neman.values.iter().zip(&neman.labels) {
                ne.values.push(m * scale);
                ne.labels.push(format!("{mstr}e{estr}"));
            }
        }
        if ne.values.is_empty() {
            return Err(DbaseError::EmptyNeGrid {
                path: grids.join("ne_man_grid.txt"),
            });
        }

        log::debug!(
            "database grids: {} te ({} bits), {} tr ({} bits), {} ne ({} bits), {} hv",
            te.values.len(),
            te.nbits,
            tr.values.len(),
            tr.nbits,
            ne.values.len(),
            ne.nbits,
            hv.values.len()
        );

        Ok(Self {
            path,
            tops_cmnd: tops_cmnd.to_string(),
            te,
            tr,
            ne,
            hv,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tops_cmnd(&self) -> &str {
        &self.tops_cmnd
    }

    pub fn nhv(&self) -> usize {
        self.hv.values.len()
    }

    pub fn hv(&self) -> &[f64] {
        &self.hv.values
    }

    pub fn hv_at(&self, i: usize) -> f64 {
        self.hv.values[i]
    }

    pub fn nte(&self) -> usize {
        self.te.values.len()
    }

    pub fn ntr(&self) -> usize {
        self.tr.values.len()
    }

    pub fn nne(&self) -> usize {
        self.ne.values.len()
    }

    pub fn ne_at(&self, i: usize) -> f64 {
        self.ne.values[i]
    }

    pub fn ne_str_at(&self, i: usize) -> &str {
        &self.ne.labels[i]
    }

    pub fn nearest_te_str(&self, x: f64) -> &str {
        &self.te.labels[nearest(x, &self.te.values)]
    }

    pub fn nearest_tr_str(&self, x: f64) -> &str {
        &self.tr.labels[nearest(x, &self.tr.values)]
    }

    /// Average charge per material at tabulated point `froot` + ne index
    /// `ine`, read from the `_zb` files under `eos/`.
    fn load_zbars(
        &self,
        froot: &str,
        tbl: &Table,
        mat: &[String],
        ine: usize,
    ) -> Result<Vec<f64>, DbaseError> {
        let dirpath = self.path.join("eos");
        let allparam = format!("{froot}{}pcc_zb.txt", self.ne_str_at(ine));
        let mut zb = Vec::with_capacity(mat.len());
        for name in mat {
            let m = tbl.get_f(name)?;
            let fname = dirpath.join(m).join(format!("{m}{allparam}"));
            let mut r = TokenReader::open(&fname)?;
            r.find_word("zbar")?;
            zb.push(r.next("average charge")?);
        }
        Ok(zb)
    }

    /// Resolve the zone state to tabulated coordinates: nearest (te, tr),
    /// then the tabulated ne minimizing the charge-neutrality mismatch
    /// `|ne - np sum_i fp_i zbar_i(ne)|`. Returns the consistent electron
    /// density and the file-name fragment
    /// `_te<T>ev_tr<R>ev_ne<N>pcc_` shared by all spectra of that point.
    pub fn find_ne(
        &self,
        tbl: &Table,
        te: f64,
        tr: f64,
        np: f64,
        mat: &[String],
        fp: &[f64],
    ) -> Result<(f64, String), DbaseError> {
        let froot = format!(
            "_te{}ev_tr{}ev_ne",
            self.nearest_te_str(te),
            self.nearest_tr_str(tr)
        );

        // the mismatch is not monotone in the ne index, so scan it whole
        let mut best = (0usize, f64::INFINITY, 0.0f64);
        for ine in 0..self.nne() {
            let zbars = self.load_zbars(&froot, tbl, mat, ine)?;
            let ne_model = ne_charge_neut(np, fp, &zbars);
            let diff = (self.ne_at(ine) - ne_model).abs();
            if diff < best.1 {
                best = (ine, diff, ne_model);
            }
        }
        let (ine, _, ne) = best;
        Ok((ne, format!("{froot}{}pcc_", self.ne_str_at(ine))))
    }
}

/// Local radiative coefficients of one zone over an hv window.
#[derive(Clone)]
pub struct OpticalData {
    /// Emissivity \[W/cm3/sr/eV\].
    pub em: ArrDbl,
    /// Absorption \[1/cm\].
    pub ab: ArrDbl,
    /// Scattering \[1/cm\].
    pub sc: ArrDbl,
    /// Electron density consistent with the tabulated point \[1/cm3\].
    pub ne: f64,
}

impl OpticalData {
    pub fn zeros(nhv: usize) -> Self {
        Self {
            em: ArrDbl::new(nhv),
            ab: ArrDbl::new(nhv),
            sc: ArrDbl::new(nhv),
            ne: 0.0,
        }
    }
}

/// Assemble a zone's optical coefficients over the hv window
/// `[jmin..=jmax]`: number-fraction-weighted sums of the per-material
/// tabulated spectra, scaled by the particle density. A zone with no
/// materials is transparent by construction.
pub fn zone_optical_data(
    zone: &Zone,
    d: &Database,
    tbl: &Table,
    jmin: usize,
    jmax: usize,
) -> Result<OpticalData, DbaseError> {
    let nhv = jmax - jmin + 1;
    if zone.nmat() == 0 {
        return Ok(OpticalData::zeros(nhv));
    }

    let (ne, froot) = d.find_ne(tbl, zone.te, zone.tr, zone.np, &zone.mat, &zone.fp)?;
    let mut data = OpticalData::zeros(nhv);
    data.ne = ne;
    let dirpath = d.path().join("spectra");
    for (name, &fpop) in zone.mat.iter().zip(&zone.fp) {
        let m = tbl.get_f(name)?;
        let root = dirpath.join(m);
        let load = |suffix: &str| -> Result<ArrDbl, DbaseError> {
            let fname = root.join(format!("{m}{froot}{suffix}.txt"));
            Ok(ArrDbl::load_array(fname, d.nhv(), jmin, jmax)?)
        };
        data.em += &(&load("em")? * fpop);
        data.ab += &(&load("ab")? * fpop);
        data.sc += &(&load("sc")? * fpop);
    }
    data.em *= zone.np;
    data.ab *= zone.np;
    data.sc *= zone.np;
    Ok(data)
}
