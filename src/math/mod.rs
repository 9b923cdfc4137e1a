// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stand-alone numeric helpers: tolerant sign tests, the quadratic solver
//! used by curved-face intersections, interpolation and resampling of
//! spectra, Gaussian instrumental broadening, and the index maps that
//! flatten parameter-space products and sums.

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::constants::{BIG, SMALL, TWO_PI};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IndexingError {
    #[error("many_to_one ranges do not conform:\ndimensions = {ndim}\nindices = {nindx}")]
    RangeMismatch { ndim: usize, nindx: usize },

    #[error("two_to_one range error:\nmaximum = {max}\nrequested = {requested}")]
    AxisOutOfRange { max: usize, requested: usize },

    #[error("index out of range")]
    OutOfRange,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("convolution ranges do not match:\nsize(xin): {nxin}\nsize(yin): {nyin}\nsize(xout): {nxout}\nsize(yout): {nyout}")]
pub struct ConvolutionRangeError {
    pub nxin: usize,
    pub nyin: usize,
    pub nxout: usize,
    pub nyout: usize,
}

/// Sign of `x` with a symmetric dead band of width `eqt` around zero.
pub fn sign_eqt(x: f64, eqt: f64) -> i32 {
    let tol = eqt.abs();
    if x > tol {
        1
    } else if x < -tol {
        -1
    } else {
        0
    }
}

/// Nearest integer (round half up).
pub fn nint(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Number of decimal digits needed to print `i`.
pub fn ndigits(i: usize) -> usize {
    let mut k = 10usize;
    for j in 1..=crate::constants::INT_WIDTH {
        if i < k {
            return j;
        }
        k = k.saturating_mul(10);
    }
    0
}

/// Real roots of `a x^2 + b x + c = 0`, with coefficients treated as zero
/// within `eqt`.
///
/// Follows the numerically stable `q = -(b + sgn(b) sqrt(d))/2` form; the
/// extra `b == 0` branch is needed because the tolerant sign can vanish
/// where a plain `sgn` could not. Roots are ordered `x1 >= x2`.
#[derive(Clone, Copy, Debug)]
pub struct QuadRoots {
    pub nroots: usize,
    pub x1: f64,
    pub x2: f64,
}

pub fn solve_quadratic(a: f64, b: f64, c: f64, eqt: f64) -> QuadRoots {
    let tol = eqt.abs();

    if a.abs() <= tol {
        // linear equation
        if b.abs() <= tol {
            return QuadRoots {
                nroots: 0,
                x1: -BIG,
                x2: -BIG,
            };
        }
        let x = -c / b;
        return QuadRoots {
            nroots: 1,
            x1: x,
            x2: x,
        };
    }

    let mut d = b * b - 4.0 * a * c;
    if d.abs() <= tol {
        d = 0.0;
    }
    if d < 0.0 {
        return QuadRoots {
            nroots: 0,
            x1: -BIG,
            x2: -BIG,
        };
    }

    let (mut x1, mut x2);
    if b.abs() <= tol {
        x1 = (-c / a).sqrt();
        x2 = -x1;
    } else {
        let q = -0.5 * (b + f64::from(sign_eqt(b, tol)) * d.sqrt());
        x1 = q / a;
        x2 = c / q;
    }
    if x1 < x2 {
        std::mem::swap(&mut x1, &mut x2);
    }

    QuadRoots {
        nroots: if d <= tol { 1 } else { 2 },
        x1,
        x2,
    }
}

/// Linear fit through (x1, y1), (x2, y2) evaluated at x.
pub fn fitlin(x: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    y1 + (x - x1) * (y2 - y1) / (x2 - x1)
}

/// Axis interpolation modes for [fitpoint] and [syngrids].
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AxisMode {
    Lin,
    Log,
}

/// Two-point interpolation with independently lin/log x and y axes.
pub fn fitpoint(
    x: f64,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    xmode: AxisMode,
    ymode: AxisMode,
) -> f64 {
    match (xmode, ymode) {
        (AxisMode::Lin, AxisMode::Lin) => fitlin(x, x1, y1, x2, y2),
        (AxisMode::Log, AxisMode::Lin) => fitlin(x.ln(), x1.ln(), y1, x2.ln(), y2),
        (AxisMode::Lin, AxisMode::Log) => fitlin(x, x1, y1.ln(), x2, y2.ln()).exp(),
        (AxisMode::Log, AxisMode::Log) => {
            fitlin(x.ln(), x1.ln(), y1.ln(), x2.ln(), y2.ln()).exp()
        }
    }
}

/// Index of the grid value nearest to `x`. `v` must be sorted ascending;
/// ties resolve to the lower index.
pub fn nearest(x: f64, v: &[f64]) -> usize {
    if v.is_empty() {
        return 0;
    }
    let mut lo = 0usize;
    let mut hi = v.len() - 1;
    if x <= v[lo] {
        return lo;
    }
    if x >= v[hi] {
        return hi;
    }
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if x < v[mid] {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    if (x - v[lo]).abs() <= (v[hi] - x).abs() {
        lo
    } else {
        hi
    }
}

/// Exhaustive argmin of `|f(i) - target|` over `i in 0..n`. Used where the
/// probed quantity is not monotone in the index (e.g. the charge-neutrality
/// mismatch over a tabulated ne grid).
pub fn nearest_exh<F>(target: f64, f: F, n: usize) -> usize
where
    F: Fn(usize) -> f64,
{
    let mut best = 0usize;
    let mut best_diff = f64::INFINITY;
    for i in 0..n {
        let diff = (f(i) - target).abs();
        if diff < best_diff {
            best_diff = diff;
            best = i;
        }
    }
    best
}

/// Normal density at `x` for mean `mu` and width `sigma`.
pub fn gaussian(x: f64, mu: f64, sigma: f64) -> f64 {
    let y = (x - mu) / sigma;
    (-y * y / 2.0).exp() / sigma / TWO_PI.sqrt()
}

/// Planckian intensity `B(hv, T)` \[W/cm2/sr/eV\] with both arguments in eV.
/// Returns 0 for non-positive temperatures.
pub fn planckian(hv: f64, tev: f64) -> f64 {
    if tev <= 0.0 {
        return 0.0;
    }
    crate::constants::PLANCK_F * hv.powi(3) / ((hv / tev).exp() - 1.0)
}

/// Resample the table `(xin, yin)` onto the grid `xout`, interpolating with
/// the given axis modes. Outside the input range the nearest end value is
/// held; an empty input yields zeros.
pub fn syngrids(
    xin: &[f64],
    yin: &[f64],
    xmode: AxisMode,
    ymode: AxisMode,
    xout: &[f64],
) -> Vec<f64> {
    let n = xin.len().min(yin.len());
    let mut yout = vec![0.0; xout.len()];
    if n == 0 {
        return yout;
    }

    for (yo, &x) in yout.iter_mut().zip(xout) {
        if x <= xin[0] {
            *yo = yin[0];
        } else if x >= xin[n - 1] {
            *yo = yin[n - 1];
        } else {
            // xin is sorted ascending
            let j = match xin[..n].binary_search_by(|a| a.partial_cmp(&x).unwrap()) {
                Ok(j) => j,
                Err(j) => j,
            };
            let (j1, j2) = (j - 1, j.min(n - 1));
            *yo = if j1 == j2 {
                yin[j1]
            } else {
                fitpoint(x, xin[j1], yin[j1], xin[j2], yin[j2], xmode, ymode)
            };
        }
    }
    yout
}

/// Instrumental broadening: resample `(xin, yin)` onto `xout` and convolve
/// with a Gaussian of the given FWHM. A non-positive FWHM only resamples
/// (lin-log, matching the shape-preserving behaviour expected of spectra).
///
/// Fails if `xin`/`yin` or `xout`/`yout` lengths disagree; both sizes appear
/// in the message.
pub fn convolution(
    fwhm: f64,
    xin: &[f64],
    yin: &[f64],
    xout: &[f64],
    nyout: usize,
) -> Result<Vec<f64>, ConvolutionRangeError> {
    if xin.len() != yin.len() || xout.len() != nyout {
        return Err(ConvolutionRangeError {
            nxin: xin.len(),
            nyin: yin.len(),
            nxout: xout.len(),
            nyout,
        });
    }

    let resampled = if xin.len() == xout.len() && xin.iter().zip(xout).all(|(a, b)| a == b) {
        yin.to_vec()
    } else {
        // log-interpolate intensities so that resampling cannot produce
        // negative values between positive samples
        let positive = yin.iter().all(|&y| y > 0.0);
        let ymode = if positive { AxisMode::Log } else { AxisMode::Lin };
        syngrids(xin, yin, AxisMode::Lin, ymode, xout)
    };

    if sign_eqt(fwhm, SMALL) != 1 {
        return Ok(resampled);
    }

    // FWHM = 2 sqrt(2 ln 2) sigma
    let sigma = fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
    let mut yout = vec![0.0; nyout];
    for (i, (yo, &xi)) in yout.iter_mut().zip(xout).enumerate() {
        let mut s = 0.0;
        let mut wsum = 0.0;
        for (j, (&xj, &yj)) in xout.iter().zip(&resampled).enumerate() {
            // the kernel is negligible beyond a few widths; skip the tails
            if (xj - xi).abs() > 6.0 * sigma && i != j {
                continue;
            }
            let w = gaussian(xj, xi, sigma);
            s += w * yj;
            wsum += w;
        }
        *yo = if wsum > 0.0 { s / wsum } else { resampled[i] };
    }
    Ok(yout)
}

/// Trapezoidal integral of the tabulated `(x, y)` over `[a, b]` (or
/// `[b, a]`, negated, when `b < a`).
pub fn integrate_trapezoid(a: f64, b: f64, x: &[f64], y: &[f64]) -> f64 {
    let (lo, hi, sign) = if a <= b { (a, b, 1.0) } else { (b, a, -1.0) };
    let n = x.len().min(y.len());
    if n < 2 || lo == hi {
        return 0.0;
    }

    let value_at = |t: f64| -> f64 {
        let j = nearest(t, &x[..n]);
        let (j1, j2) = if x[j] <= t {
            (j, (j + 1).min(n - 1))
        } else {
            (j.saturating_sub(1), j)
        };
        if j1 == j2 {
            y[j1]
        } else {
            fitlin(t, x[j1], y[j1], x[j2], y[j2])
        }
    };

    let mut s = 0.0;
    let mut xprev = lo;
    let mut yprev = value_at(lo);
    for (&xj, &yj) in x[..n].iter().zip(&y[..n]) {
        if xj <= lo {
            continue;
        }
        if xj >= hi {
            break;
        }
        s += 0.5 * (yprev + yj) * (xj - xprev);
        xprev = xj;
        yprev = yj;
    }
    s += 0.5 * (yprev + value_at(hi)) * (hi - xprev);
    sign * s
}

/// Flatten a multi-index into a single index, most significant axis first.
pub fn many_to_one(dim: &[usize], indx: &[usize]) -> Result<usize, IndexingError> {
    if indx.len() != dim.len() {
        return Err(IndexingError::RangeMismatch {
            ndim: dim.len(),
            nindx: indx.len(),
        });
    }
    if indx.is_empty() {
        return Err(IndexingError::OutOfRange);
    }
    let mut j = indx[0];
    for i in 1..indx.len() {
        if indx[i] >= dim[i] {
            return Err(IndexingError::OutOfRange);
        }
        j = j * dim[i] + indx[i];
    }
    Ok(j)
}

/// Inverse of [many_to_one].
pub fn one_to_many(dim: &[usize], mut j: usize) -> Result<Vec<usize>, IndexingError> {
    if dim.is_empty() {
        return Err(IndexingError::OutOfRange);
    }
    let n: usize = dim.iter().product();
    if j >= n {
        return Err(IndexingError::OutOfRange);
    }
    let mut indx = vec![0usize; dim.len()];
    for i in (0..dim.len()).rev() {
        let remainder = j % dim[i];
        indx[i] = remainder;
        j = (j - remainder) / dim[i];
    }
    Ok(indx)
}

/// Flatten an (axis, offset) pair into a single index of the telescoping
/// sum over axes.
pub fn two_to_one(dim: &[usize], p: (usize, usize)) -> Result<usize, IndexingError> {
    if p.0 >= dim.len() {
        return Err(IndexingError::AxisOutOfRange {
            max: dim.len().saturating_sub(1),
            requested: p.0,
        });
    }
    if p.1 >= dim[p.0] {
        return Err(IndexingError::OutOfRange);
    }
    Ok(dim[..p.0].iter().sum::<usize>() + p.1)
}

/// Inverse of [two_to_one].
pub fn one_to_two(dim: &[usize], mut j: usize) -> Result<(usize, usize), IndexingError> {
    if dim.is_empty() {
        return Err(IndexingError::OutOfRange);
    }
    let mut i = 0usize;
    while j >= dim[i] {
        j -= dim[i];
        i += 1;
        if i >= dim.len() {
            return Err(IndexingError::OutOfRange);
        }
    }
    Ok((i, j))
}

/// Scale `f` so its elements sum to `n`.
pub fn normalize_to(f: &[f64], n: f64) -> Vec<f64> {
    let s = n / f.iter().sum::<f64>();
    f.iter().map(|x| x * s).collect()
}

/// Electron density from stoichiometric charge neutrality:
/// `ne = np * sum_i fp_i * zbar_i`.
pub fn ne_charge_neut(np: f64, fp: &[f64], zb: &[f64]) -> f64 {
    fp.iter().zip(zb).map(|(f, z)| f * z).sum::<f64>() * np
}
