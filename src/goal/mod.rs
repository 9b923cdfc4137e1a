// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Inverse-mode scoring: measured target spectra ([Objective]) and their
//! weighted aggregate ([Goal]), with chi-squared or absolute-difference
//! fitness, optional per-objective rescaling, and best-case tracking.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

use crate::arr::ArrDbl;
use crate::constants::BIG;
use crate::io::{IoError, TokenReader};
use crate::math::{syngrids, AxisMode};

#[derive(Error, Debug)]
pub enum GoalError {
    #[error("Objective ranges do not conform:\nsize1 = {size1}\nsize2 = {size2}")]
    RangeMismatch { size1: usize, size2: usize },

    #[error("unknown axis mode `{mode}` in {path}")]
    BadAxisMode { mode: String, path: PathBuf },

    #[error("objective index {index} out of range ({len} objectives)")]
    NoSuchObjective { index: usize, len: usize },

    #[error(transparent)]
    Io(#[from] IoError),
}

/// One measured spectrum to match: ordinates `y`, optional abscissas `x`
/// (otherwise compared bin-by-bin) and optional weights `w` (default 1).
pub struct Objective {
    name: String,
    weight: f64,
    rescale: bool,
    xmode: AxisMode,
    ymode: AxisMode,
    x: Option<Vec<f64>>,
    y: Vec<f64>,
    w: Option<Vec<f64>>,

    /// Fitness and scale of the most recent evaluation, promoted to the
    /// best-* fields when the aggregate case wins.
    last_fitness: f64,
    last_scale: f64,

    best_fitness: f64,
    best_case: usize,
    best_scale: f64,
}

impl Objective {
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        rescale: bool,
        xmode: AxisMode,
        ymode: AxisMode,
        x: Option<Vec<f64>>,
        y: Vec<f64>,
        w: Option<Vec<f64>>,
    ) -> Self {
        Self {
            name: name.into(),
            weight,
            rescale,
            xmode,
            ymode,
            x,
            y,
            w,
            last_fitness: -BIG,
            last_scale: 1.0,
            best_fitness: -BIG,
            best_case: 0,
            best_scale: 1.0,
        }
    }

    /// Read `<dir>/<name>.txt`: `npts <n>` then rows of `[x] y [w]`
    /// columns as announced by the presence flags.
    pub fn load(
        dir: &Path,
        name: &str,
        weight: f64,
        x_present: bool,
        w_present: bool,
        rescale: bool,
        xmode: AxisMode,
        ymode: AxisMode,
    ) -> Result<Self, GoalError> {
        let mut r = TokenReader::open(dir.join(format!("{name}.txt")))?;
        r.find_word("npts")?;
        let n: usize = r.next("point count")?;
        let mut x = x_present.then(|| Vec::with_capacity(n));
        let mut y = Vec::with_capacity(n);
        let mut w = w_present.then(|| Vec::with_capacity(n));
        for _ in 0..n {
            if let Some(x) = x.as_mut() {
                x.push(r.next("abscissa")?);
            }
            y.push(r.next("ordinate")?);
            if let Some(w) = w.as_mut() {
                w.push(r.next("weight")?);
            }
        }
        Ok(Self::new(name, weight, rescale, xmode, ymode, x, y, w))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn rescale(&self) -> bool {
        self.rescale
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn best_case(&self) -> usize {
        self.best_case
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    pub fn best_scale(&self) -> f64 {
        self.best_scale
    }

    /// Forget the incumbent before a rescan of this objective's axis.
    pub fn reset_best(&mut self) {
        self.best_fitness = -BIG;
    }

    fn weights(&self) -> Vec<f64> {
        self.w
            .clone()
            .unwrap_or_else(|| vec![1.0; self.y.len()])
    }

    /// Resample a computed spectrum onto this objective's sampling. With
    /// abscissas present the detector grid is interpolated onto them;
    /// without, a mismatched length is recoverable by index interpolation.
    fn resample(&self, hv: &[f64], ya: &[f64]) -> Result<Vec<f64>, GoalError> {
        if let Some(x) = &self.x {
            if hv.len() != ya.len() {
                return Err(GoalError::RangeMismatch {
                    size1: hv.len(),
                    size2: ya.len(),
                });
            }
            return Ok(syngrids(hv, ya, self.xmode, self.ymode, x));
        }
        if ya.len() == self.y.len() {
            return Ok(ya.to_vec());
        }
        // x-less objective against a spectrum of unexpected length:
        // resample on the index axis and proceed
        let idx_in: Vec<f64> = (0..ya.len()).map(|i| i as f64).collect();
        let scale = (ya.len() - 1) as f64 / (self.y.len() - 1).max(1) as f64;
        let idx_out: Vec<f64> = (0..self.y.len()).map(|i| i as f64 * scale).collect();
        Ok(syngrids(&idx_in, ya, AxisMode::Lin, self.ymode, &idx_out))
    }

    /// Weighted chi-squared against the measured spectrum. The candidate
    /// must already be sampled on this objective's points.
    pub fn get_chi2(&self, a: &[f64]) -> Result<f64, GoalError> {
        if a.len() != self.y.len() {
            return Err(GoalError::RangeMismatch {
                size1: a.len(),
                size2: self.y.len(),
            });
        }
        let w = self.weights();
        Ok(a.iter()
            .zip(&self.y)
            .zip(&w)
            .map(|((a, y), w)| w * (a - y) * (a - y))
            .sum())
    }

    /// Weighted sum of absolute differences.
    pub fn get_fabs(&self, a: &[f64]) -> Result<f64, GoalError> {
        if a.len() != self.y.len() {
            return Err(GoalError::RangeMismatch {
                size1: a.len(),
                size2: self.y.len(),
            });
        }
        let w = self.weights();
        Ok(a.iter()
            .zip(&self.y)
            .zip(&w)
            .map(|((a, y), w)| w * (a - y).abs())
            .sum())
    }

    /// Negative of the chosen metric; larger is better. Chi-squared when
    /// both abscissas and weights are present, absolute difference
    /// otherwise.
    pub fn get_fitness(&self, a: &[f64]) -> Result<f64, GoalError> {
        if self.x.is_some() && self.w.is_some() {
            Ok(-self.get_chi2(a)?)
        } else {
            Ok(-self.get_fabs(a)?)
        }
    }

    /// Best non-negative multiplier of `a` under the objective's metric.
    /// Chi-squared has the closed form `s = sum(w a y) / sum(w a^2)`; the
    /// absolute-difference optimum is the weighted median of the ratios
    /// `y/a` with weights `w |a|`.
    fn solve_scale(&self, a: &[f64]) -> f64 {
        let w = self.weights();
        let s = if self.x.is_some() && self.w.is_some() {
            let num: f64 = a.iter().zip(&self.y).zip(&w).map(|((a, y), w)| w * a * y).sum();
            let den: f64 = a.iter().zip(&w).map(|(a, w)| w * a * a).sum();
            if den > 0.0 {
                num / den
            } else {
                1.0
            }
        } else {
            let mut ratios: Vec<(f64, f64)> = a
                .iter()
                .zip(&self.y)
                .zip(&w)
                .filter(|((a, _), _)| a.abs() > 0.0)
                .map(|((a, y), w)| (y / a, w * a.abs()))
                .collect();
            if ratios.is_empty() {
                return 1.0;
            }
            ratios.sort_by(|p, q| p.0.total_cmp(&q.0));
            let total: f64 = ratios.iter().map(|r| r.1).sum();
            let mut acc = 0.0;
            let mut s = ratios[ratios.len() - 1].0;
            for (ratio, weight) in ratios {
                acc += weight;
                if acc >= total / 2.0 {
                    s = ratio;
                    break;
                }
            }
            s
        };
        s.max(0.0)
    }

    /// Evaluate a computed spectrum: resample, optionally rescale, and
    /// remember the result for aggregate best-case bookkeeping.
    pub fn fit_eval(&mut self, hv: &[f64], ya: &ArrDbl) -> Result<f64, GoalError> {
        let a = self.resample(hv, ya.as_slice())?;
        let (fitness, scale) = if self.rescale {
            let s = self.solve_scale(&a);
            let scaled: Vec<f64> = a.iter().map(|v| v * s).collect();
            (self.get_fitness(&scaled)?, s)
        } else {
            (self.get_fitness(&a)?, 1.0)
        };
        self.last_fitness = fitness;
        self.last_scale = scale;
        Ok(fitness)
    }

    /// Directly offer a candidate for this objective's own best case
    /// (used by the spherical peeling search, one objective per shell).
    /// Only a strict improvement replaces the incumbent.
    pub fn update_best(&mut self, hv: &[f64], ya: &ArrDbl, case: usize) -> Result<(), GoalError> {
        let fitness = self.fit_eval(hv, ya)?;
        if fitness > self.best_fitness {
            self.best_fitness = fitness;
            self.best_case = case;
            self.best_scale = self.last_scale;
        }
        Ok(())
    }
}

/// The set of objectives for one inverse run, with aggregate best-case
/// tracking across enumerated candidates.
pub struct Goal {
    analysis: bool,
    objectives: IndexMap<String, Objective>,
    best_case: usize,
    best_fitness: f64,
}

impl Goal {
    /// Forward-mode goal: no objectives, nothing to score.
    pub fn forward() -> Self {
        Self {
            analysis: false,
            objectives: IndexMap::new(),
            best_case: 0,
            best_fitness: -BIG,
        }
    }

    pub fn new(objectives: Vec<Objective>) -> Self {
        Self {
            analysis: true,
            objectives: objectives
                .into_iter()
                .map(|o| (o.name.clone(), o))
                .collect(),
            best_case: 0,
            best_fitness: -BIG,
        }
    }

    /// Read `<dir>/list.txt`: `Objectives <n>` then per objective a row
    /// `name weight x_present w_present rescale xmode ymode`, with data
    /// files alongside.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, GoalError> {
        let dir = dir.as_ref();
        let mut r = TokenReader::open(dir.join("list.txt"))?;
        r.find_word("Objectives")?;
        let n: usize = r.next("objective count")?;
        let mut objectives = Vec::with_capacity(n);
        for _ in 0..n {
            let name: String = r.next("objective name")?;
            let weight: f64 = r.next("objective weight")?;
            let x_present: bool = r.next("x presence flag")?;
            let w_present: bool = r.next("w presence flag")?;
            let rescale: bool = r.next("rescale flag")?;
            let parse_mode = |r: &mut TokenReader| -> Result<AxisMode, GoalError> {
                let mode: String = r.next("axis mode")?;
                mode.parse().map_err(|_| GoalError::BadAxisMode {
                    mode,
                    path: dir.join("list.txt"),
                })
            };
            let xmode = parse_mode(&mut r)?;
            let ymode = parse_mode(&mut r)?;
            objectives.push(Objective::load(
                dir, &name, weight, x_present, w_present, rescale, xmode, ymode,
            )?);
        }
        Ok(Self::new(objectives))
    }

    pub fn analysis(&self) -> bool {
        self.analysis
    }

    pub fn set_analysis(&mut self, analysis: bool) {
        self.analysis = analysis;
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn objective(&self, i: usize) -> Result<&Objective, GoalError> {
        self.objectives
            .get_index(i)
            .map(|(_, o)| o)
            .ok_or(GoalError::NoSuchObjective {
                index: i,
                len: self.objectives.len(),
            })
    }

    pub fn objective_mut(&mut self, i: usize) -> Result<&mut Objective, GoalError> {
        let len = self.objectives.len();
        self.objectives
            .get_index_mut(i)
            .map(|(_, o)| o)
            .ok_or(GoalError::NoSuchObjective { index: i, len })
    }

    /// Score a named spectrum against its objective, if one exists.
    /// Spectra without a matching objective are simply not scored.
    pub fn fit_eval(&mut self, cname: &str, hv: &[f64], ya: &ArrDbl) -> Result<(), GoalError> {
        if let Some(obj) = self.objectives.get_mut(cname) {
            obj.fit_eval(hv, ya)?;
        }
        Ok(())
    }

    /// Scale factor recorded for the winning case of a named spectrum;
    /// 1 when the name has no objective.
    pub fn best_scale(&self, cname: &str) -> f64 {
        self.objectives
            .get(cname)
            .map_or(1.0, |o| o.best_scale)
    }

    pub fn best_case(&self) -> usize {
        self.best_case
    }

    pub fn set_best_case(&mut self, case: usize) {
        self.best_case = case;
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    /// Close out one enumerated case: the weighted sum of each
    /// objective's latest fitness competes with the incumbent; only a
    /// strict improvement replaces it (ties keep the earlier case).
    pub fn update_best(&mut self, case: usize) {
        let aggregate: f64 = self
            .objectives
            .values()
            .map(|o| o.weight * o.last_fitness)
            .sum();
        if aggregate > self.best_fitness {
            self.best_fitness = aggregate;
            self.best_case = case;
            for o in self.objectives.values_mut() {
                o.best_fitness = o.last_fitness;
                o.best_case = case;
                o.best_scale = o.last_scale;
            }
        }
    }
}
