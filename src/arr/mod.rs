// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! [ArrDbl]: the spectrum array. A length-checked sequence of doubles with
//! elementwise arithmetic, guarded division and logarithms, and the text
//! file format used by every per-bin spectrum this code reads or writes.


use std::fs;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub,
               SubAssign};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::constants::{BIG, SMALL};
use crate::io::{self, IoError};

#[derive(Error, Debug)]
pub enum ArrError {
    #[error("ArrDbl ranges do not conform:\nsize1 = {left}\nsize2 = {right}")]
    RangeMismatch { left: usize, right: usize },

    #[error("array file {path} holds {found} values, expected at least {expected}")]
    Truncated {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Array of doubles sampled on a photon-energy grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrDbl {
    v: Vec<f64>,
}

impl ArrDbl {
    /// Zero-filled array of length `n`.
    pub fn new(n: usize) -> Self {
        Self { v: vec![0.0; n] }
    }

    pub fn from_vec(v: Vec<f64>) -> Self {
        Self { v }
    }

    pub fn with_value(n: usize, x: f64) -> Self {
        Self { v: vec![x; n] }
    }

    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }

    pub fn fill(&mut self, x: f64) {
        self.v.iter_mut().for_each(|e| *e = x);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.v
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.v.iter()
    }

    pub fn sum(&self) -> f64 {
        self.v.iter().sum()
    }

    /// Sum of elementwise absolute differences; zero iff equal.
    pub fn abs_diff(&self, other: &Self) -> f64 {
        let n = self.len().min(other.len());
        let mut d: f64 = self.v[..n]
            .iter()
            .zip(&other.v[..n])
            .map(|(a, b)| (a - b).abs())
            .sum();
        d += (self.len() as f64 - other.len() as f64).abs();
        d
    }

    /// Elementwise natural log; non-positive elements map to -BIG.
    pub fn log(&self) -> Self {
        Self {
            v: self
                .v
                .iter()
                .map(|&x| if x > 0.0 { x.ln() } else { -BIG })
                .collect(),
        }
    }

    /// Elementwise exponential.
    pub fn exp(&self) -> Self {
        Self {
            v: self.v.iter().map(|&x| x.exp()).collect(),
        }
    }

    fn conforming<'a>(&self, other: &'a ArrDbl) -> &'a ArrDbl {
        if self.len() != other.len() {
            panic!(
                "{}",
                ArrError::RangeMismatch {
                    left: self.len(),
                    right: other.len(),
                }
            );
        }
        other
    }

    /// Write one value per line after the header lines.
    pub fn to_file(&self, path: impl AsRef<Path>, header: &str) -> Result<(), ArrError> {
        let path = path.as_ref();
        let mut out = String::with_capacity(self.len() * 16 + header.len() + 2);
        out.push_str(header);
        if !header.is_empty() && !header.ends_with('\n') {
            out.push('\n');
        }
        for &x in &self.v {
            out.push_str(&io::fmt_sci(x));
            out.push('\n');
        }
        fs::write(path, out).map_err(|source| {
            ArrError::Io(IoError::Write {
                path: path.to_path_buf(),
                source,
            })
        })
    }

    /// Read the window `[jmin..=jmax]` of an `nhv`-line array file. A data
    /// line holds exactly one number; header lines do not and are
    /// skipped.
    pub fn load_array(
        path: impl AsRef<Path>,
        nhv: usize,
        jmin: usize,
        jmax: usize,
    ) -> Result<Self, ArrError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| {
            ArrError::Io(IoError::FileNotOpen {
                path: path.to_path_buf(),
                source,
            })
        })?;
        let values: Vec<f64> = text
            .lines()
            .filter_map(|line| {
                let mut tokens = line.split_whitespace();
                let first = tokens.next()?;
                if tokens.next().is_some() {
                    return None;
                }
                first.parse().ok()
            })
            .take(nhv)
            .collect();
        if values.len() <= jmax {
            return Err(ArrError::Truncated {
                path: path.to_path_buf(),
                found: values.len(),
                expected: jmax + 1,
            });
        }
        Ok(Self {
            v: values[jmin..=jmax].to_vec(),
        })
    }
}

impl Index<usize> for ArrDbl {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        &self.v[i]
    }
}

impl IndexMut<usize> for ArrDbl {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.v[i]
    }
}

impl<'a> IntoIterator for &'a ArrDbl {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;
    fn into_iter(self) -> Self::IntoIter {
        self.v.iter()
    }
}

// Elementwise arithmetic. Length mismatches are programmer errors inside
// this crate (all spectra share the detector's hv window) and panic with
// both sizes in the message; runtime-variable lengths are checked by the
// callers that can encounter them.

impl AddAssign<&ArrDbl> for ArrDbl {
    fn add_assign(&mut self, rhs: &ArrDbl) {
        self.conforming(rhs);
        self.v.iter_mut().zip(&rhs.v).for_each(|(a, b)| *a += b);
    }
}

impl SubAssign<&ArrDbl> for ArrDbl {
    fn sub_assign(&mut self, rhs: &ArrDbl) {
        self.conforming(rhs);
        self.v.iter_mut().zip(&rhs.v).for_each(|(a, b)| *a -= b);
    }
}

impl MulAssign<&ArrDbl> for ArrDbl {
    fn mul_assign(&mut self, rhs: &ArrDbl) {
        self.conforming(rhs);
        self.v.iter_mut().zip(&rhs.v).for_each(|(a, b)| *a *= b);
    }
}

/// Guarded elementwise division: dividing by anything smaller in magnitude
/// than SMALL yields -BIG instead of inf/nan.
impl DivAssign<&ArrDbl> for ArrDbl {
    fn div_assign(&mut self, rhs: &ArrDbl) {
        self.conforming(rhs);
        self.v.iter_mut().zip(&rhs.v).for_each(|(a, b)| {
            *a = if b.abs() < SMALL { -BIG } else { *a / b };
        });
    }
}

impl AddAssign<f64> for ArrDbl {
    fn add_assign(&mut self, rhs: f64) {
        self.v.iter_mut().for_each(|a| *a += rhs);
    }
}

impl SubAssign<f64> for ArrDbl {
    fn sub_assign(&mut self, rhs: f64) {
        self.v.iter_mut().for_each(|a| *a -= rhs);
    }
}

impl MulAssign<f64> for ArrDbl {
    fn mul_assign(&mut self, rhs: f64) {
        self.v.iter_mut().for_each(|a| *a *= rhs);
    }
}

impl DivAssign<f64> for ArrDbl {
    fn div_assign(&mut self, rhs: f64) {
        if rhs.abs() < SMALL {
            self.v.iter_mut().for_each(|a| *a = -BIG);
        } else {
            self.v.iter_mut().for_each(|a| *a /= rhs);
        }
    }
}

macro_rules! binop_arr {
    ($trait:ident, $method:ident, $assign:tt) => {
        impl $trait<&ArrDbl> for &ArrDbl {
            type Output = ArrDbl;
            fn $method(self, rhs: &ArrDbl) -> ArrDbl {
                let mut out = self.clone();
                out $assign rhs;
                out
            }
        }

        impl $trait<f64> for &ArrDbl {
            type Output = ArrDbl;
            fn $method(self, rhs: f64) -> ArrDbl {
                let mut out = self.clone();
                out $assign rhs;
                out
            }
        }
    };
}

binop_arr!(Add, add, +=);
binop_arr!(Sub, sub, -=);
binop_arr!(Mul, mul, *=);
binop_arr!(Div, div, /=);

impl Mul<&ArrDbl> for f64 {
    type Output = ArrDbl;
    fn mul(self, rhs: &ArrDbl) -> ArrDbl {
        rhs * self
    }
}

impl Neg for &ArrDbl {
    type Output = ArrDbl;
    fn neg(self) -> ArrDbl {
        ArrDbl {
            v: self.v.iter().map(|&x| -x).collect(),
        }
    }
}
