// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The run orchestrator: owns the detectors, iterates time steps (or
//! inverse-search cases) and drives each detector over its pixels.


use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use thiserror::Error;
use vec1::Vec1;

use crate::dbase::{Database, DbaseError, Table};
use crate::detector::{
    BacklighterSpec, Detector, DetectorConfig, DetectorError, Scene, Symmetry,
};
use crate::geometry::{GeometryError, Grid, Mesh, Vector3d, Zone};
use crate::goal::{Goal, GoalError};
use crate::hydro::{Hydro, HydroError};
use crate::io::{self, IoError, TokenReader};
use crate::geometry::cone::AXIS_HOPS;
use crate::math::{self, IndexingError};

#[derive(Error, Debug)]
pub enum DiagnosticsError {
    #[error("only one detector is permitted under spherical symmetry")]
    OneDetectorIn1d,

    #[error("there are no detectors in {path}")]
    NoDetectors { path: PathBuf },

    #[error("cannot parse `{token}` as a boolean in {path}")]
    BadBool { token: String, path: PathBuf },

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Hydro(#[from] HydroError),

    #[error(transparent)]
    Goal(#[from] GoalError),

    #[error(transparent)]
    Dbase(#[from] DbaseError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Indexing(#[from] IndexingError),
}

fn parse_bool(token: &str, path: &Path) -> Result<bool, DiagnosticsError> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" => Ok(false),
        _ => Err(DiagnosticsError::BadBool {
            token: token.to_string(),
            path: path.to_path_buf(),
        }),
    }
}

pub struct Diagnostics {
    /// Master progress print frequency (`prints` in the list file).
    freq: usize,
    path: PathBuf,
    outpath: PathBuf,
    pub det: Vec1<Detector>,
    /// Total rank count for pixel distribution (1 master + workers).
    nranks: usize,
    draw_progress: bool,
}

impl Diagnostics {
    /// Read `<diag_path>/list.txt` and every named detector file. The
    /// hydro directory supplies the bounding sphere (for bundle
    /// half-angles) and the times table that is copied beside each
    /// detector's outputs.
    pub fn new(
        diag_path: impl Into<PathBuf>,
        hydro_path: &Path,
        out_path: &Path,
        d: &Database,
        nranks: usize,
        draw_progress: bool,
    ) -> Result<Self, DiagnosticsError> {
        let diag_path = diag_path.into();

        let mut bs = TokenReader::open(hydro_path.join("bounding_sphere.txt"))?;
        let sc = Vector3d::new(
            bs.next("sphere center x")?,
            bs.next("sphere center y")?,
            bs.next("sphere center z")?,
        );
        let sr: f64 = bs.next("sphere radius")?;
        let times_path = hydro_path.join("times.txt");
        let times_text =
            fs::read_to_string(&times_path).map_err(|source| IoError::FileNotOpen {
                path: times_path,
                source,
            })?;

        let list_path = diag_path.join("list.txt");
        let mut list = TokenReader::open(&list_path)?;
        list.find_word("prints")?;
        let freq: usize = list.next("print frequency")?;
        list.find_word("Detectors")?;
        let n: usize = list.next("detector count")?;
        list.find_word("freq_Ray")?; // end of the column header line

        let mut det = Vec::with_capacity(n);
        for i in 0..n {
            let dname: String = list.next("detector name")?;
            let ntheta: usize = list.next("ntheta")?;
            let mut nphi: usize = list.next("nphi")?;
            let freq_ray: usize = list.next("freq_Ray")?;
            if ntheta == 0 {
                nphi = 0; // parallel rays only
            }

            let det_path = diag_path.join(format!("{dname}.txt"));
            let mut r = TokenReader::open(&det_path)?;

            r.find_word("path")?;
            let sub: String = r.next("output subdirectory")?;
            let outdir = if sub == "/" {
                out_path.to_path_buf()
            } else {
                out_path.join(sub)
            };

            r.find_word("freq_patch")?;
            let freq_patch: usize = r.next("freq_patch")?;
            r.find_word("freq_trace")?;
            let freq_trace: usize = r.next("freq_trace")?;

            r.find_word("symmetry")?;
            let symmetry_token: String = r.next("symmetry")?;
            let symmetry: Symmetry = symmetry_token.parse().map_err(|_| IoError::BadToken {
                token: symmetry_token.clone(),
                what: "symmetry",
                path: det_path.clone(),
            })?;

            fn vec3(r: &mut TokenReader, key: &str) -> Result<Vector3d, DiagnosticsError> {
                r.find_word(key)?;
                Ok(Vector3d::new(
                    r.next("vector x")?,
                    r.next("vector y")?,
                    r.next("vector z")?,
                ))
            }
            let rc = vec3(&mut r, "rc")?;
            let rx = vec3(&mut r, "rx")?;
            let ry = vec3(&mut r, "ry")?;

            r.find_word("dx")?;
            let dx: f64 = r.next("dx")?;
            r.find_word("dy")?;
            let dy: f64 = r.next("dy")?;
            let pc = vec3(&mut r, "pc")?;
            r.find_word("theta_max")?;
            let mut theta_max: f64 = r.next("theta_max")?;
            r.find_word("range")?;
            let hv_min: f64 = r.next("hv range minimum")?;
            let hv_max: f64 = r.next("hv range maximum")?;
            r.find_word("fwhm")?;
            let fwhm: f64 = r.next("fwhm")?;

            r.find_word("backlighter")?;
            let kind: String = r.next("backlighter kind")?;
            let value: String = r.next("backlighter value")?;
            let backlighter = match kind.as_str() {
                "flat" => BacklighterSpec::Flat(value.parse().map_err(|_| {
                    IoError::BadToken {
                        token: value,
                        what: "backlighter value",
                        path: det_path.clone(),
                    }
                })?),
                "blackbody" => BacklighterSpec::Blackbody(value.parse().map_err(|_| {
                    IoError::BadToken {
                        token: value,
                        what: "backlighter temperature",
                        path: det_path.clone(),
                    }
                })?),
                "file" => BacklighterSpec::File(value),
                _ => return Err(DetectorError::BadBacklighter { kind }.into()),
            };

            r.find_word("tracking")?;
            let tracking_token: String = r.next("tracking flag")?;
            let tracking = parse_bool(&tracking_token, &det_path)?;
            r.find_word("write_Ray")?;
            let write_ray_token: String = r.next("write_Ray flag")?;
            let write_ray = parse_bool(&write_ray_token, &det_path)?;

            let cfg = DetectorConfig {
                name: dname,
                out_path: outdir.clone(),
                freq_patch,
                freq_ray,
                freq_trace,
                symmetry,
                my_id: i,
                rc,
                rx,
                ry,
                dx,
                dy,
                pc,
                theta_max,
                hv_min,
                hv_max,
                fwhm,
                backlighter,
                tracking,
                write_ray,
            };
            let mut detector = Detector::new(cfg, d, &diag_path)?;
            if detector.symmetry() != Symmetry::None && n != 1 {
                return Err(DiagnosticsError::OneDetectorIn1d);
            }
            if theta_max <= 0.0 {
                theta_max = detector.compute_theta_max(sc, sr);
            }
            detector.set_bundle(theta_max, ntheta, nphi);

            let tname = outdir.join("times.txt");
            fs::write(&tname, &times_text).map_err(|source| IoError::Write {
                path: tname,
                source,
            })?;

            det.push(detector);
        }
        let det = Vec1::try_from_vec(det)
            .map_err(|_| DiagnosticsError::NoDetectors { path: list_path })?;

        Ok(Self {
            freq,
            path: diag_path,
            outpath: out_path.to_path_buf(),
            det,
            nranks,
            draw_progress,
        })
    }

    pub fn diag_path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.det.len()
    }

    pub fn is_empty(&self) -> bool {
        self.det.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.det.iter().position(|d| d.name() == name)
    }

    fn progress_bar(&self, len: usize, msg: &'static str) -> ProgressBar {
        let bar = ProgressBar::new(len as u64)
            .with_style(
                ProgressStyle::default_bar()
                    .template(
                        "{msg:12}: [{wide_bar:.blue}] {pos:4}/{len:4} ({elapsed_precise}<{eta_precise})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            )
            .with_message(msg);
        bar.set_draw_target(if self.draw_progress && self.freq > 0 {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        });
        bar
    }

    /// Forward mode: every time step, every detector, every pixel.
    pub fn postprocess(
        &mut self,
        d: &Database,
        tbl: &Table,
        h: &Hydro,
        gol: &mut Goal,
    ) -> Result<(), DiagnosticsError> {
        let mut grid = Grid::new();
        let mut mesh = Mesh::new();
        let ntd = h.ntd();

        let bar = self.progress_bar(h.nintervals(), "Time steps");
        for j in 0..h.nintervals() {
            let it = h.time_index_at(j);
            let t = h.time_at(it)?;
            let dt = h.dt_at(it)?;
            h.load_at(it, &mut grid, &mut mesh)?;
            let scene = Scene {
                g: &grid,
                m: &mesh,
                d,
                tbl,
            };
            for det in &mut self.det {
                det.do_patches(scene, gol, it, t, dt, ntd, self.nranks)?;
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        log::info!("processing time-integrated, space-resolved spectra");
        let intervals: Vec<(usize, f64)> = (0..h.nintervals())
            .map(|j| {
                let it = h.time_index_at(j);
                Ok((it, h.dt_at(it)?))
            })
            .collect::<Result<_, HydroError>>()?;
        for det in &self.det {
            det.yt_to_files(gol, &intervals, ntd)?;
            det.write_yst()?;
        }

        report_axis_hops();
        Ok(())
    }

    /// Inverse mode: enumerate the candidate space, score each case, then
    /// replay the winner through the forward path and write its state.
    pub fn analyze(
        &mut self,
        d: &Database,
        tbl: &Table,
        h: &mut Hydro,
        gol: &mut Goal,
    ) -> Result<(), DiagnosticsError> {
        let mut grid = Grid::new();
        let mut mesh = Mesh::new();
        let ndim = h.ndim().to_vec();
        let nzones = ndim.len();
        let ntd = h.ntd();
        let nintervals = h.nintervals();
        let spherical = self.det[0].symmetry() == Symmetry::Spherical;
        let mut previous_zone = nzones;

        let bar = self.progress_bar(nintervals, "Cases");
        for j in 0..nintervals {
            let it = h.time_index_at(j);
            let t = h.time_at(0)?;
            let dt = h.dt_at(0)?;

            if spherical {
                // peel the onion: walk the summation index backwards so
                // outer shells settle before inner ones are explored
                let jt = nintervals - it - 1;
                h.load_at(jt, &mut grid, &mut mesh)?;
                if it == 0 {
                    previous_zone = nzones - 1;
                    h.load_at(0, &mut grid, &mut mesh)?;
                } else {
                    let current_zone = math::one_to_two(&ndim, jt)?.0;
                    if current_zone != previous_zone {
                        // freeze the finished shell at its best candidate
                        let best = gol.objective(previous_zone - 1)?.best_case();
                        h.load_at(best, &mut grid, &mut mesh)?;
                        previous_zone = current_zone;
                    }
                }
                let scene = Scene {
                    g: &grid,
                    m: &mesh,
                    d,
                    tbl,
                };
                self.det[0].evaluate(&ndim, scene, gol, jt, ntd)?;
            } else {
                h.load_at(it, &mut grid, &mut mesh)?;
                let scene = Scene {
                    g: &grid,
                    m: &mesh,
                    d,
                    tbl,
                };
                for det in &mut self.det {
                    det.do_patches(scene, gol, it, t, dt, ntd, 1)?;
                }
            }

            gol.update_best(it);
            bar.inc(1);
        }
        bar.finish_and_clear();

        if spherical {
            self.refine_shells(d, tbl, h, gol, &ndim, &mut grid, &mut mesh, ntd)?;
        }

        // replay the winner with scoring off and outputs on
        gol.set_analysis(false);
        if h.symmetry() == Symmetry::Spherical {
            // product-based indexing from here on, as if the search had
            // never exploited the symmetry
            h.set_symmetry(Symmetry::None);
        }
        let it = gol.best_case();
        h.load_at(it, &mut grid, &mut mesh)?;
        let t = h.time_at(0)?;
        let dt = h.dt_at(0)?;
        let scene = Scene {
            g: &grid,
            m: &mesh,
            d,
            tbl,
        };
        for det in &mut self.det {
            det.do_patches(scene, gol, it, t, dt, ntd, self.nranks)?;
        }
        gol.set_analysis(true);

        self.write_best_case(d, tbl, &mesh)?;
        report_axis_hops();
        Ok(())
    }

    /// One more pass over each shell, outer to inner, with every other
    /// shell held at its incumbent best. The peeled search scores a shell
    /// before inner shells are known; re-scoring against the settled
    /// configuration catches reabsorption the first pass missed.
    #[allow(clippy::too_many_arguments)]
    fn refine_shells(
        &mut self,
        d: &Database,
        tbl: &Table,
        h: &Hydro,
        gol: &mut Goal,
        ndim: &[usize],
        grid: &mut Grid,
        mesh: &mut Mesh,
        ntd: usize,
    ) -> Result<(), DiagnosticsError> {
        let nzones = ndim.len();

        // settle the mesh at the incumbent per-shell bests
        for iz in 1..nzones {
            let best = gol.objective(iz - 1)?.best_case();
            h.load_at(best, grid, mesh)?;
        }

        for iz in (1..nzones).rev() {
            gol.objective_mut(iz - 1)?.reset_best();
            for k in 0..ndim[iz] {
                let jt = math::two_to_one(ndim, (iz, k))?;
                h.load_at(jt, grid, mesh)?;
                let scene = Scene {
                    g: &*grid,
                    m: &*mesh,
                    d,
                    tbl,
                };
                self.det[0].evaluate(ndim, scene, gol, jt, ntd)?;
            }
            // leave the shell at its refined best
            let best = gol.objective(iz - 1)?.best_case();
            h.load_at(best, grid, mesh)?;
        }

        // reassemble the aggregate winner from the refined shells
        let mut indx = vec![0usize; nzones];
        for iz in 1..nzones {
            let icase = gol.objective(iz - 1)?.best_case();
            indx[iz] = math::one_to_two(ndim, icase)?.1;
        }
        indx[Zone::BOUNDING_ZONE] = 0;
        gol.set_best_case(math::many_to_one(ndim, &indx)?);
        Ok(())
    }

    /// Summaries of the winning configuration: a one-line-per-zone table
    /// (`best_case.dat`) and the full state blocks (`best_case.txt`).
    fn write_best_case(
        &self,
        d: &Database,
        tbl: &Table,
        mesh: &Mesh,
    ) -> Result<(), DiagnosticsError> {
        let mut plot = String::from(
            "#      Zone   ne(el./cm3)    te(eV)         tr(eV)         np(ions/cm3)   fps",
        );
        let mut full = String::from("time 0 s");

        for iz in 0..mesh.len() {
            let zone = mesh.zone(iz)?;
            let ne = if zone.nmat() > 0 {
                d.find_ne(tbl, zone.te, zone.tr, zone.np, &zone.mat, &zone.fp)?
                    .0
            } else {
                0.0
            };
            if iz > 0 {
                plot.push('\n');
                plot.push_str(&io::fmt_int(iz, crate::constants::INT_WIDTH));
                for v in [ne, zone.te, zone.tr, zone.np] {
                    plot.push_str(&io::fmt_sci(v));
                }
                for &fp in &zone.fp {
                    plot.push_str(&io::fmt_sci(fp));
                }
            }
            full.push_str(&format!(
                "\n\nZone{}\nne{} electrons/cm3\nte{} eV\ntr{} eV\nnp{} particles/cm3\nnmat{}\nmaterial fraction",
                io::fmt_int(iz, crate::constants::INT_WIDTH),
                io::fmt_sci(ne),
                io::fmt_sci(zone.te),
                io::fmt_sci(zone.tr),
                io::fmt_sci(zone.np),
                io::fmt_int(zone.nmat(), crate::constants::INT_WIDTH),
            ));
            for (m, &fp) in zone.mat.iter().zip(&zone.fp) {
                full.push_str(&format!("\n{m}{}", io::fmt_sci(fp)));
            }
        }
        plot.push('\n');
        full.push('\n');

        let dat = self.outpath.join("best_case.dat");
        fs::write(&dat, plot).map_err(|source| IoError::Write { path: dat, source })?;
        let txt = self.outpath.join("best_case.txt");
        fs::write(&txt, full).map_err(|source| IoError::Write { path: txt, source })?;
        Ok(())
    }

    /// Run whichever mode the goal calls for.
    pub fn execute(
        &mut self,
        d: &Database,
        tbl: &Table,
        h: &mut Hydro,
        gol: &mut Goal,
    ) -> Result<(), DiagnosticsError> {
        if gol.analysis() {
            self.analyze(d, tbl, h, gol)
        } else {
            self.postprocess(d, tbl, h, gol)
        }
    }
}

/// The cone near-axis rescue is numerically benign but can hide real
/// topology errors; make a nonzero count visible at the end of a run.
fn report_axis_hops() {
    let hops = AXIS_HOPS.load(std::sync::atomic::Ordering::Relaxed);
    if hops > 0 {
        log::warn!(
            "{hops} near-axis cone hop(s) occurred; check the mesh topology near the z-axis"
        );
    }
}
