// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Virtual detectors: a rectangular pixel grid with an optional
//! solid-angle bundle of ray directions per pixel, recording per-pixel,
//! space-integrated and time-integrated spectra.


use std::collections::VecDeque;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crossbeam_utils::atomic::AtomicCell;
use itertools::Itertools;
use rayon::prelude::*;
use scopeguard::defer_on_unwind;
use thiserror::Error;

use crate::arr::{ArrDbl, ArrError};
use crate::constants::{CV, FOUR_PI, INT_WIDTH, PI, SCALE_EQT, TWO_PI};
use crate::dbase::{Database, DbaseError, Table};
use crate::geometry::{Face, FaceId, GeometryError, Grid, Mesh, Vector3d, Zone};
use crate::goal::{Goal, GoalError};
use crate::io::{self, IoError, TokenReader};
use crate::math::{self, sign_eqt};
use crate::pool::{self, Message, PoolError};
use crate::transport::{Ray, SpectralCache, TransportError};

/// Positivity tolerance for the launch intercept against the bounding
/// sphere; looser than the in-mesh tolerance because the launch leg is
/// macroscopic.
const EQT_LAUNCH: f64 = 1.0e-15;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("the hv range of detector {name} has no overlap with the hv range of the database")]
    NoHvOverlap { name: String },

    #[error("only parallel rays (ntheta = 0) are allowed in spherical-symmetry analysis")]
    BundleInSphericalAnalysis,

    #[error("unknown backlighter kind `{kind}`")]
    BadBacklighter { kind: String },

    #[error("zone {zone} does not match objective {objective} in the peeled search")]
    PeelZoneMismatch { zone: usize, objective: usize },

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Arr(#[from] ArrError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Dbase(#[from] DbaseError),

    #[error(transparent)]
    Goal(#[from] GoalError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Indexing(#[from] math::IndexingError),

    #[error(transparent)]
    Convolution(#[from] math::ConvolutionRangeError),
}

impl From<TransportError> for DetectorError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Geometry(e) => Self::Geometry(e),
            TransportError::Dbase(e) => Self::Dbase(e),
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum Symmetry {
    None,
    Spherical,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BacklighterSpec {
    Flat(f64),
    Blackbody(f64),
    File(String),
}

/// Everything a detector needs to look at one snapshot.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub g: &'a Grid,
    pub m: &'a Mesh,
    pub d: &'a Database,
    pub tbl: &'a Table,
}

/// Parsed per-detector configuration (see the diagnostics list format).
pub struct DetectorConfig {
    pub name: String,
    pub out_path: PathBuf,
    pub freq_patch: usize,
    pub freq_ray: usize,
    pub freq_trace: usize,
    pub symmetry: Symmetry,
    pub my_id: usize,
    pub rc: Vector3d,
    pub rx: Vector3d,
    pub ry: Vector3d,
    pub dx: f64,
    pub dy: f64,
    pub pc: Vector3d,
    pub theta_max: f64,
    pub hv_min: f64,
    pub hv_max: f64,
    pub fwhm: f64,
    pub backlighter: BacklighterSpec,
    pub tracking: bool,
    pub write_ray: bool,
}

/// Task message: one pixel of one detector.
#[derive(Clone, Copy, Debug)]
pub struct PatchId {
    pub ix: usize,
    pub iy: usize,
    pub counter: usize,
}

impl Message for PatchId {
    fn size_of(&self) -> usize {
        3 * 8
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        pool::pack_usize(buf, self.ix);
        pool::pack_usize(buf, self.iy);
        pool::pack_usize(buf, self.counter);
    }

    fn unpack(cur: &mut Cursor<&[u8]>) -> Self {
        Self {
            ix: pool::unpack_usize(cur),
            iy: pool::unpack_usize(cur),
            counter: pool::unpack_usize(cur),
        }
    }
}

/// Result message: the pixel's accumulated spectrum.
#[derive(Clone, Debug)]
pub struct PatchSpectrum {
    pub ix: usize,
    pub iy: usize,
    pub y: Vec<f64>,
}

impl Message for PatchSpectrum {
    fn size_of(&self) -> usize {
        3 * 8 + self.y.len() * 8
    }

    fn pack(&self, buf: &mut Vec<u8>) {
        pool::pack_usize(buf, self.ix);
        pool::pack_usize(buf, self.iy);
        pool::pack_usize(buf, self.y.len());
        for &v in &self.y {
            pool::pack_f64(buf, v);
        }
    }

    fn unpack(cur: &mut Cursor<&[u8]>) -> Self {
        let ix = pool::unpack_usize(cur);
        let iy = pool::unpack_usize(cur);
        let nhv = pool::unpack_usize(cur);
        let y = (0..nhv).map(|_| pool::unpack_f64(cur)).collect();
        Self { ix, iy, y }
    }
}

pub struct Detector {
    dname: String,
    path: PathBuf,
    symmetry: Symmetry,
    my_id: usize,
    freq_patch: usize,
    freq_ray: usize,
    freq_trace: usize,

    rc: Vector3d,
    /// Center of pixel (0, 0).
    ro: Vector3d,
    rx: Vector3d,
    ry: Vector3d,
    ex: Vector3d,
    ey: Vector3d,
    ez: Vector3d,
    // bundle basis and its row-major transform to global coordinates
    bx: Vector3d,
    by: Vector3d,
    bz: Vector3d,
    xr: Vector3d,
    yr: Vector3d,
    zr: Vector3d,

    dx: f64,
    dy: f64,
    /// Pixel area for Cartesian grids; 1 under spherical symmetry where
    /// the area depends on the ring index.
    da: f64,
    ux: Vector3d,
    uy: Vector3d,

    nhv: usize,
    hv: Vec<f64>,
    jmin: usize,
    jmax: usize,
    fwhm: f64,

    backlighter: BacklighterSpec,
    yback: ArrDbl,
    tracking: bool,
    write_ray: bool,

    nx: usize,
    ny: usize,
    nxd: usize,
    nyd: usize,

    pc: Vector3d,
    theta_max: f64,
    ntheta: usize,
    nphi: usize,
    nthetad: usize,
    nphid: usize,
    dtheta: f64,
    dphi: f64,
    dtheta2: f64,

    /// Per-pixel spectra for the current time step.
    yp: Vec<ArrDbl>,
    /// Space-integrated spectrum for the current time step.
    pub ys: ArrDbl,
    /// Time-integrated per-pixel spectra.
    yt: Vec<ArrDbl>,
    /// Space- and time-integrated spectrum.
    pub yst: ArrDbl,
}

impl Detector {
    pub fn new(
        cfg: DetectorConfig,
        d: &Database,
        diag_path: &Path,
    ) -> Result<Self, DetectorError> {
        // restrict the database hv grid to this detector's range
        let mut hv = Vec::new();
        let mut jmin = d.nhv();
        let mut jmax = 0usize;
        for (i, &e) in d.hv().iter().enumerate() {
            let min_true = e >= cfg.hv_min;
            let max_true = e <= cfg.hv_max;
            if min_true && max_true {
                hv.push(e);
            }
            if min_true && i < jmin {
                jmin = i;
            }
            if max_true && i > jmax {
                jmax = i;
            }
        }
        if hv.is_empty() {
            return Err(DetectorError::NoHvOverlap { name: cfg.name });
        }
        let nhv = jmax - jmin + 1;

        // pixel discretization
        let mut dx = cfg.dx;
        let mut dy = cfg.dy;
        let mut nx = math::nint(2.0 * cfg.rx.norm() / dx) as usize;
        let mut ny = math::nint(2.0 * cfg.ry.norm() / dy) as usize;
        let mut da = dx * dy;
        if cfg.symmetry == Symmetry::Spherical {
            nx = nx / 2 + 1;
            dx = cfg.rx.norm() / (nx as f64 - 0.5);
            ny = 1;
            dy = 2.0 * cfg.ry.norm();
            // pixel areas vary ring to ring and cannot be factored out
            da = 1.0;
        }
        let nxd = math::ndigits(nx);
        let nyd = math::ndigits(ny);

        // pixel-grid and bundle bases
        let ex = cfg.rx.unit();
        let ey = cfg.ry.unit();
        let ez = ex.cross(ey);
        let ux = ex * dx;
        let uy = ey * dy;
        let bz = (cfg.rc - cfg.pc).unit();
        let mut bx = ex.perpendicular_to(bz);
        let mut by = ey.perpendicular_to(bz);
        if bx.norm() > by.norm() {
            bx = bx.unit();
            by = bz.cross(bx);
        } else {
            by = by.unit();
            bx = by.cross(bz);
        }
        let xr = Vector3d::new(bx.x, by.x, bz.x);
        let yr = Vector3d::new(bx.y, by.y, bz.y);
        let zr = Vector3d::new(bx.z, by.z, bz.z);

        let ro = cfg.rc - cfg.rx - cfg.ry + (ux + uy) / 2.0;

        // backlighter spectrum on the restricted hv grid
        let yback = match &cfg.backlighter {
            BacklighterSpec::Flat(value) => ArrDbl::with_value(nhv, *value),
            BacklighterSpec::Blackbody(tev) => {
                ArrDbl::from_vec(hv.iter().map(|&e| math::planckian(e, *tev)).collect())
            }
            BacklighterSpec::File(fname) => {
                let mut r = TokenReader::open(diag_path.join(fname))?;
                r.find_word("nhv:")?;
                let nback: usize = r.next("backlighter point count")?;
                let mut x = Vec::with_capacity(nback);
                let mut y = Vec::with_capacity(nback);
                r.find_word("I0(W/cm2/sr/eV)")?;
                for _ in 0..nback {
                    x.push(r.next("backlighter hv")?);
                    y.push(r.next("backlighter intensity")?);
                }
                ArrDbl::from_vec(math::syngrids(
                    &x,
                    &y,
                    math::AxisMode::Lin,
                    math::AxisMode::Lin,
                    &hv,
                ))
            }
        };

        let det = Self {
            dname: cfg.name,
            path: cfg.out_path,
            symmetry: cfg.symmetry,
            my_id: cfg.my_id,
            freq_patch: cfg.freq_patch,
            freq_ray: cfg.freq_ray,
            freq_trace: cfg.freq_trace,
            rc: cfg.rc,
            ro,
            rx: cfg.rx,
            ry: cfg.ry,
            ex,
            ey,
            ez,
            bx,
            by,
            bz,
            xr,
            yr,
            zr,
            dx,
            dy,
            da,
            ux,
            uy,
            nhv,
            hv,
            jmin,
            jmax,
            fwhm: cfg.fwhm,
            backlighter: cfg.backlighter,
            yback,
            tracking: cfg.tracking,
            write_ray: cfg.write_ray,
            nx,
            ny,
            nxd,
            nyd,
            pc: cfg.pc,
            theta_max: cfg.theta_max,
            ntheta: 0,
            nphi: 0,
            nthetad: 0,
            nphid: 0,
            dtheta: 0.0,
            dphi: 0.0,
            dtheta2: 0.0,
            yp: vec![ArrDbl::new(nhv); nx * ny],
            ys: ArrDbl::new(nhv),
            yt: vec![ArrDbl::new(nhv); nx * ny],
            yst: ArrDbl::new(nhv),
        };
        det.write_working_grids()?;
        Ok(det)
    }

    /// Record the restricted hv grid and the working backlighter next to
    /// the other outputs.
    fn write_working_grids(&self) -> Result<(), DetectorError> {
        fs::create_dir_all(&self.path).map_err(|source| IoError::Write {
            path: self.path.clone(),
            source,
        })?;
        let mut grid = String::from("\n Number of bits:\n           0\n\n Number of grid points:\n");
        grid.push_str(&io::fmt_int(self.nhv, INT_WIDTH + 1));
        grid.push_str("\n\n Grid points:\n");
        for (i, e) in self.hv.iter().enumerate() {
            grid.push_str(&io::fmt_int(i, INT_WIDTH + 1));
            grid.push_str("  ");
            grid.push_str(&io::fmt_sci(*e));
            grid.push('\n');
        }
        let gpath = self.path.join(format!("{}-hv_grid.txt", self.dname));
        fs::write(&gpath, grid).map_err(|source| IoError::Write {
            path: gpath.clone(),
            source,
        })?;

        let header = format!("{}-backlighter\ndata in W/cm2/sr/eV", self.dname);
        self.yback
            .to_file(self.path.join(format!("{}-backlighter.txt", self.dname)), &header)?;
        Ok(())
    }

    /// Define the per-pixel direction bundle.
    pub fn set_bundle(&mut self, theta_max: f64, ntheta: usize, nphi: usize) {
        self.theta_max = theta_max;
        self.ntheta = ntheta;
        self.nphi = if ntheta == 0 { 0 } else { nphi };
        self.nthetad = math::ndigits(self.ntheta);
        self.nphid = math::ndigits(self.nphi);
        if ntheta > 0 {
            self.dtheta = theta_max / ntheta as f64;
        }
        if self.nphi > 0 {
            self.dphi = TWO_PI / self.nphi as f64;
        }
        self.dtheta2 = self.dtheta / 2.0;
    }

    /// Bundle half-angle subtending the mesh bounding sphere.
    pub fn compute_theta_max(&self, sc: Vector3d, sr: f64) -> f64 {
        (sr / (self.rc - sc).norm()).asin()
    }

    pub fn name(&self) -> &str {
        &self.dname
    }

    pub fn out_path(&self) -> &Path {
        &self.path
    }

    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    pub fn my_id(&self) -> usize {
        self.my_id
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nhv(&self) -> usize {
        self.nhv
    }

    pub fn hv(&self) -> &[f64] {
        &self.hv
    }

    pub fn fwhm(&self) -> f64 {
        self.fwhm
    }

    pub fn ntheta(&self) -> usize {
        self.ntheta
    }

    pub fn nphi(&self) -> usize {
        self.nphi
    }

    pub fn backlighter(&self) -> &ArrDbl {
        &self.yback
    }

    pub fn backlighter_spec(&self) -> &BacklighterSpec {
        &self.backlighter
    }

    pub fn rc(&self) -> Vector3d {
        self.rc
    }

    pub fn ro(&self) -> Vector3d {
        self.ro
    }

    pub fn rx(&self) -> Vector3d {
        self.rx
    }

    pub fn ry(&self) -> Vector3d {
        self.ry
    }

    pub fn ex(&self) -> Vector3d {
        self.ex
    }

    pub fn ey(&self) -> Vector3d {
        self.ey
    }

    pub fn ez(&self) -> Vector3d {
        self.ez
    }

    pub fn bx(&self) -> Vector3d {
        self.bx
    }

    pub fn by(&self) -> Vector3d {
        self.by
    }

    pub fn bz(&self) -> Vector3d {
        self.bz
    }

    pub fn pc(&self) -> Vector3d {
        self.pc
    }

    pub fn theta_max(&self) -> f64 {
        self.theta_max
    }

    pub fn dtheta(&self) -> f64 {
        self.dtheta
    }

    pub fn dphi(&self) -> f64 {
        self.dphi
    }

    pub fn freq_ray(&self) -> usize {
        self.freq_ray
    }

    pub fn freq_trace(&self) -> usize {
        self.freq_trace
    }

    fn patch_index(&self, ix: usize, iy: usize) -> usize {
        iy * self.nx + ix
    }

    pub fn yp_at(&self, ix: usize, iy: usize) -> &ArrDbl {
        &self.yp[self.patch_index(ix, iy)]
    }

    pub fn yt_at(&self, ix: usize, iy: usize) -> &ArrDbl {
        &self.yt[self.patch_index(ix, iy)]
    }

    /// Where rays of pixel `(ix, iy)` start.
    fn patch_origin(&self, ix: usize, iy: usize) -> Vector3d {
        match self.symmetry {
            Symmetry::None => self.ro + self.ux * ix as f64 + self.uy * iy as f64,
            Symmetry::Spherical => self.rc + self.ux * ix as f64,
        }
    }

    fn local_to_global(&self, v: Vector3d) -> Vector3d {
        Vector3d::new(self.xr.dot(v), self.yr.dot(v), self.zr.dot(v))
    }

    /// All bundle directions: the central ray, then the (theta, phi)
    /// rings.
    fn directions(&self) -> Vec<(usize, usize)> {
        std::iter::once((0, 0))
            .chain((1..self.ntheta).cartesian_product(0..self.nphi))
            .collect()
    }

    pub fn ndirections(&self) -> usize {
        if self.ntheta == 0 {
            1
        } else {
            (self.ntheta - 1) * self.nphi + 1
        }
    }

    /// Pixel area under spherical symmetry: a filled central disk for
    /// ix = 0, annuli of width dx beyond.
    fn patch_area(&self, ix: usize) -> f64 {
        match self.symmetry {
            Symmetry::None => self.da,
            Symmetry::Spherical => {
                if ix == 0 {
                    PI * (self.dx / 2.0) * (self.dx / 2.0)
                } else {
                    TWO_PI * ix as f64 * self.dx * self.dx
                }
            }
        }
    }

    fn patch_fname(&self, ix: usize, iy: usize) -> String {
        format!(
            "_ix{}_iy{}",
            io::fmt_int0(ix, self.nxd),
            io::fmt_int0(iy, self.nyd)
        )
    }

    fn patch_string(&self, ix: usize, iy: usize) -> String {
        let (x, y) = match self.symmetry {
            Symmetry::None => (
                self.dx * (ix as f64 + 0.5),
                self.dy * (iy as f64 + 0.5),
            ),
            Symmetry::Spherical => (self.dx * ix as f64, 0.0),
        };
        format!(
            "ix {}{} cm\niy {}{} cm\n",
            io::fmt_int(ix, self.nxd),
            io::fmt_sci(x),
            io::fmt_int(iy, self.nyd),
            io::fmt_sci(y)
        )
    }

    fn omega_fname(&self, dir: (usize, usize)) -> String {
        format!(
            "_it{}_ip{}",
            io::fmt_int0(dir.0, self.nthetad),
            io::fmt_int0(dir.1, self.nphid)
        )
    }

    /// Shoot one ray of one pixel's bundle and return its weighted
    /// contribution to the pixel spectrum. `cache`/`central` implement
    /// the spherical-symmetry reuse of per-zone optical data.
    fn do_ray(
        &self,
        scene: Scene,
        gol: &Goal,
        it: usize,
        ntd: usize,
        patch: (usize, usize),
        dir: (usize, usize),
        cache: Option<&mut SpectralCache>,
        central: bool,
    ) -> Result<ArrDbl, DetectorError> {
        let r0 = self.patch_origin(patch.0, patch.1);
        let theta = dir.0 as f64 * self.dtheta;
        let phi = dir.1 as f64 * self.dphi;
        let cvec = self.local_to_global(Vector3d::from_polar(theta, phi) * (-CV));

        let launch_face = scene.m.bounding_sphere_face()?;
        let from = FaceId::new(Zone::BOUNDING_ZONE, FaceId::RAY_START);
        let pt = launch_face.intercept(scene.g, r0, cvec, EQT_LAUNCH, from);

        let mut ray = Ray::new(self.jmin, self.jmax, self.tracking, r0, cvec);
        let mut contribution = ArrDbl::new(self.nhv);
        if pt.is_found {
            ray.trace(scene.g, scene.m)?;
            ray.set_backlighter(&self.yback);
            ray.cross_mesh(scene.g, scene.m, scene.d, scene.tbl, &self.hv, cache, central)?;

            if self.ntheta == 0 {
                // parallel rays, one per pixel (W/cm2/sr/eV)
                contribution = ray.y.clone();
            } else {
                // solid-angle element of this direction (W/cm2/eV)
                let domega = if dir == (0, 0) {
                    FOUR_PI * (self.dtheta / 4.0).sin().powi(2)
                } else {
                    2.0 * self.dphi * theta.sin() * self.dtheta2.sin()
                };
                contribution = &ray.y * (domega * self.ez.cos_angle(ray.v));
            }
        }

        // per-ray spectra are written in forward mode only
        if self.write_ray && !gol.analysis() {
            let cname = format!(
                "{}-yp{}{}_{}",
                self.dname,
                self.patch_fname(patch.0, patch.1),
                self.omega_fname(dir),
                time_fname(it, ntd)
            );
            let ybroad = ArrDbl::from_vec(math::convolution(
                self.fwhm,
                &self.hv,
                ray.y.as_slice(),
                &self.hv,
                self.nhv,
            )?);
            let scale = gol.best_scale(&cname);
            let (ybroad, units) = if sign_eqt(scale - 1.0, SCALE_EQT) == 0 {
                (ybroad, "data in W/cm2/sr/eV")
            } else {
                (&ybroad * scale, "data in arbitrary_units")
            };
            let header = format!("{cname}\n{units}");
            ybroad.to_file(self.path.join(format!("{cname}.txt")), &header)?;
        }

        Ok(contribution)
    }

    /// Accumulate one pixel: loop the bundle (data-parallel when there is
    /// no cache to thread through), then apply the pixel-area factor.
    pub fn compute_patch(
        &self,
        scene: Scene,
        gol: &Goal,
        it: usize,
        ntd: usize,
        patch: (usize, usize),
        mut cache: Option<&mut SpectralCache>,
        central: bool,
    ) -> Result<ArrDbl, DetectorError> {
        let dirs = self.directions();
        let mut y = ArrDbl::new(self.nhv);

        if cache.is_some() || dirs.len() == 1 {
            for &dir in &dirs {
                let contribution =
                    self.do_ray(scene, gol, it, ntd, patch, dir, cache.as_deref_mut(), central)?;
                y += &contribution;
            }
        } else {
            // bundle directions are independent; sum them across threads
            let contributions: Result<Vec<ArrDbl>, DetectorError> = dirs
                .par_iter()
                .map(|&dir| self.do_ray(scene, gol, it, ntd, patch, dir, None, false))
                .collect();
            for c in contributions? {
                y += &c;
            }
        }

        if self.ntheta > 0 {
            y *= self.patch_area(patch.0);
        }
        Ok(y)
    }

    /// Convolve, apply the recorded best scale, and write one per-pixel
    /// spectrum file for this time step.
    fn write_patch_spectrum(
        &self,
        gol: &Goal,
        it: usize,
        ntd: usize,
        t: f64,
        patch: (usize, usize),
        y: &ArrDbl,
    ) -> Result<(), DetectorError> {
        let cname = format!("{}-yp{}", self.dname, self.patch_fname(patch.0, patch.1));
        let tname = time_fname(it, ntd);
        let ybroad = ArrDbl::from_vec(math::convolution(
            self.fwhm,
            &self.hv,
            y.as_slice(),
            &self.hv,
            self.nhv,
        )?);
        let scale = gol.best_scale(&cname);
        let units = if sign_eqt(scale - 1.0, SCALE_EQT) == 0 {
            if self.ntheta == 0 {
                "data in W/cm2/sr/eV"
            } else {
                "data in W/eV"
            }
        } else {
            "data in arbitrary_units"
        };
        let ybroad = if sign_eqt(scale - 1.0, SCALE_EQT) == 0 {
            ybroad
        } else {
            &ybroad * scale
        };
        let header = format!(
            "{cname}_{tname}\n{}{}{units}",
            time_string(it, ntd, t),
            self.patch_string(patch.0, patch.1)
        );
        ybroad.to_file(self.path.join(format!("{cname}_{tname}.txt")), &header)?;
        Ok(())
    }

    /// Fold one pixel spectrum into the space-integrated accumulator,
    /// with the spherical edge weights for parallel-ray detectors.
    fn accumulate_ys(&mut self, patch: (usize, usize), y: &ArrDbl) {
        match self.symmetry {
            Symmetry::None => self.ys += y,
            Symmetry::Spherical => {
                if self.ntheta == 0 {
                    if patch.0 == 0 {
                        // dx is the diameter of the central disk
                        self.ys += &(y / 8.0);
                    } else {
                        // ring area weight: ix * dx = r> + r<
                        self.ys += &(y * patch.0 as f64);
                    }
                } else {
                    self.ys += y;
                }
            }
        }
    }

    /// One time step of this detector: every pixel, every direction.
    ///
    /// In forward mode with no symmetry the pixels are distributed over a
    /// dynamic task pool of `nranks - 1` workers; the spherically
    /// symmetric path runs serially so the central ray can seed the
    /// optical-data cache that its ring pixels reuse. In analysis mode
    /// the computed spectra are scored against the goal instead of being
    /// written out.
    #[allow(clippy::too_many_arguments)]
    pub fn do_patches(
        &mut self,
        scene: Scene,
        gol: &mut Goal,
        it: usize,
        t: f64,
        dt: f64,
        ntd: usize,
        nranks: usize,
    ) -> Result<(), DetectorError> {
        self.ys.fill(0.0);
        let analysis = gol.analysis();

        if !analysis && self.symmetry == Symmetry::None && nranks >= 2 {
            // dynamic distribution over the pixel grid
            let mut queue: VecDeque<PatchId> = VecDeque::new();
            let mut counter = 0usize;
            for ix in 0..self.nx {
                for iy in 0..self.ny {
                    queue.push_back(PatchId { ix, iy, counter });
                    counter += 1;
                }
            }
            let ntasks = queue.len();

            let worker_error: Mutex<Option<DetectorError>> = Mutex::new(None);
            // once any pixel fails, let the other workers abandon their
            // remaining work early
            let abandon = AtomicCell::new(false);
            let mut arrivals: Vec<PatchSpectrum> = Vec::with_capacity(ntasks);
            {
                let det = &*self;
                let gol_ref = &*gol;
                let worker_error = &worker_error;
                let abandon = &abandon;
                pool::execute(
                    nranks,
                    queue,
                    |pid: PatchId| {
                        defer_on_unwind! { abandon.store(true); }
                        let empty = || PatchSpectrum {
                            ix: pid.ix,
                            iy: pid.iy,
                            y: vec![0.0; det.nhv],
                        };
                        if abandon.load() {
                            return empty();
                        }
                        let patch = (pid.ix, pid.iy);
                        let computed = det
                            .compute_patch(scene, gol_ref, it, ntd, patch, None, false)
                            .and_then(|y| {
                                det.write_patch_spectrum(gol_ref, it, ntd, t, patch, &y)?;
                                Ok(y)
                            });
                        match computed {
                            Ok(y) => PatchSpectrum {
                                ix: pid.ix,
                                iy: pid.iy,
                                y: y.as_slice().to_vec(),
                            },
                            Err(e) => {
                                abandon.store(true);
                                let mut slot = worker_error.lock().expect("error slot");
                                slot.get_or_insert(e);
                                empty()
                            }
                        }
                    },
                    |res| {
                        if det.freq_patch > 0 && res.case_id % det.freq_patch == 0 {
                            log::info!(
                                "{}: patch {}/{} done (rank {})",
                                det.dname,
                                res.case_id,
                                ntasks,
                                res.rank
                            );
                        }
                        arrivals.push(res.output);
                    },
                )?;
            }
            if let Some(e) = worker_error.into_inner().expect("error slot") {
                return Err(e);
            }

            for arrival in arrivals {
                let y = ArrDbl::from_vec(arrival.y);
                let patch = (arrival.ix, arrival.iy);
                let idx = self.patch_index(arrival.ix, arrival.iy);
                self.accumulate_ys(patch, &y);
                self.yt[idx] += &(&y * dt);
                self.yp[idx] = y;
            }
        } else {
            // serial pixel loop; under spherical symmetry pixel 0 comes
            // first and carries the cache for the rest of the snapshot
            let mut cache: Option<SpectralCache> =
                (self.symmetry == Symmetry::Spherical && !analysis)
                    .then(|| vec![None; scene.m.len()]);
            let mut count = 0usize;
            for ix in 0..self.nx {
                for iy in 0..self.ny {
                    let patch = (ix, iy);
                    let central = ix == 0;
                    let y =
                        self.compute_patch(scene, gol, it, ntd, patch, cache.as_mut(), central)?;
                    if analysis {
                        let cname =
                            format!("{}-yp{}", self.dname, self.patch_fname(ix, iy));
                        let ybroad = ArrDbl::from_vec(math::convolution(
                            self.fwhm,
                            &self.hv,
                            y.as_slice(),
                            &self.hv,
                            self.nhv,
                        )?);
                        gol.fit_eval(&cname, &self.hv, &ybroad)?;
                    } else {
                        self.write_patch_spectrum(gol, it, ntd, t, patch, &y)?;
                    }
                    self.accumulate_ys(patch, &y);
                    let idx = self.patch_index(ix, iy);
                    self.yt[idx] += &(&y * dt);
                    self.yp[idx] = y;
                    count += 1;
                    if self.freq_patch > 0 && count % self.freq_patch == 0 {
                        log::info!("{}: patch {}/{} done", self.dname, count, self.nx * self.ny);
                    }
                }
            }
        }

        // close out the space integral for this step
        if self.ntheta == 0 {
            match self.symmetry {
                Symmetry::None => self.ys *= self.da,
                Symmetry::Spherical => self.ys *= TWO_PI * self.dx * self.dx,
            }
        }
        self.yst += &(&self.ys * dt);

        let cname = format!("{}-ys_{}", self.dname, time_fname(it, ntd));
        let ybroad = ArrDbl::from_vec(math::convolution(
            self.fwhm,
            &self.hv,
            self.ys.as_slice(),
            &self.hv,
            self.nhv,
        )?);
        if analysis {
            gol.fit_eval(&cname, &self.hv, &ybroad)?;
        } else {
            let scale = gol.best_scale(&cname);
            let units = if sign_eqt(scale - 1.0, SCALE_EQT) == 0 {
                if self.ntheta == 0 {
                    "data in W/sr/eV"
                } else {
                    "data in W/eV"
                }
            } else {
                "data in arbitrary_units"
            };
            let ybroad = if sign_eqt(scale - 1.0, SCALE_EQT) == 0 {
                ybroad
            } else {
                &ybroad * scale
            };
            let header = format!("{cname}\n{}{units}", time_string(it, ntd, t));
            ybroad.to_file(self.path.join(format!("{cname}.txt")), &header)?;
        }
        Ok(())
    }

    /// One candidate of the spherically symmetric ("peeling") search:
    /// decode which shell the summation index `jt` varies, shoot its one
    /// chordal ray, and offer the result to that shell's objective. Once
    /// the index reaches the bounding zone the per-shell winners are
    /// assembled into the product-based best case.
    pub fn evaluate(
        &mut self,
        ndim: &[usize],
        scene: Scene,
        gol: &mut Goal,
        jt: usize,
        ntd: usize,
    ) -> Result<(), DetectorError> {
        if self.ntheta != 0 {
            return Err(DetectorError::BundleInSphericalAnalysis);
        }
        let izone = math::one_to_two(ndim, jt)?.0;

        if izone == Zone::BOUNDING_ZONE {
            // the search is over: gather each shell's winner
            let nzones = ndim.len();
            let mut indx = vec![0usize; nzones];
            for iz in 1..nzones {
                let icase = gol.objective(iz - 1)?.best_case();
                let pr = math::one_to_two(ndim, icase)?;
                if pr.0 != iz {
                    return Err(DetectorError::PeelZoneMismatch {
                        zone: iz,
                        objective: iz - 1,
                    });
                }
                indx[iz] = pr.1;
            }
            // the bounding zone has exactly one (vacuum) case
            indx[Zone::BOUNDING_ZONE] = 0;
            gol.set_best_case(math::many_to_one(ndim, &indx)?);
        } else {
            // one chordal ray per shell for now
            let patch = (izone - 1, 0usize);
            let y = self.compute_patch(scene, gol, jt, ntd, patch, None, false)?;
            let ybroad = ArrDbl::from_vec(math::convolution(
                self.fwhm,
                &self.hv,
                y.as_slice(),
                &self.hv,
                self.nhv,
            )?);
            gol.objective_mut(izone - 1)?
                .update_best(&self.hv, &ybroad, jt)?;
        }
        Ok(())
    }

    /// Rebuild the time-integrated per-pixel spectra from the per-step
    /// files on disk, weighted by each step's interval, and write them.
    pub fn yt_to_files(
        &self,
        gol: &Goal,
        intervals: &[(usize, f64)],
        ntd: usize,
    ) -> Result<(), DetectorError> {
        for ix in 0..self.nx {
            for iy in 0..self.ny {
                let pname = self.patch_fname(ix, iy);
                let cname = format!("{}-yt{pname}", self.dname);
                let units = if self.ntheta == 0 {
                    "data in J/cm2/sr/eV"
                } else {
                    "data in J/eV"
                };
                let header = format!("{cname}\n{}{units}", self.patch_string(ix, iy));

                let mut ysum = ArrDbl::new(self.nhv);
                for &(it, dt) in intervals {
                    let fnm = self.path.join(format!(
                        "{}-yp{pname}_{}.txt",
                        self.dname,
                        time_fname(it, ntd)
                    ));
                    let ypatch = ArrDbl::load_array(&fnm, self.nhv, 0, self.nhv - 1)?;
                    ysum += &(&ypatch * dt);
                }
                if !gol.analysis() {
                    ysum.to_file(self.path.join(format!("{cname}.txt")), &header)?;
                }
            }
        }
        Ok(())
    }

    /// Write the space- and time-integrated spectrum.
    pub fn write_yst(&self) -> Result<(), DetectorError> {
        let cname = format!("{}-yst", self.dname);
        let units = if self.ntheta == 0 {
            "data in J/sr/eV"
        } else {
            "data in J/eV"
        };
        let ybroad = ArrDbl::from_vec(math::convolution(
            self.fwhm,
            &self.hv,
            self.yst.as_slice(),
            &self.hv,
            self.nhv,
        )?);
        let header = format!("{cname}\n{units}");
        ybroad.to_file(self.path.join(format!("{cname}.txt")), &header)?;
        Ok(())
    }
}

pub fn time_string(it: usize, ntd: usize, t: f64) -> String {
    format!("time {} {} s\n", io::fmt_int(it, ntd), io::fmt_sci(t))
}

pub fn time_fname(it: usize, ntd: usize) -> String {
    format!("time{}", io::fmt_int0(it, ntd))
}
