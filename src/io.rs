// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Token-stream reading of the line-keyed text formats (options, mesh,
//! time, grid, detector and goal files) and the fixed-width numeric output
//! format shared by all spectra files.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("file {path} is not open")]
    FileNotOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{word} not found in {path}")]
    WordNotFound { word: String, path: PathBuf },

    #[error("cannot parse `{token}` as {what} in {path}")]
    BadToken {
        token: String,
        what: &'static str,
        path: PathBuf,
    },

    #[error("unexpected end of file in {path}")]
    UnexpectedEof { path: PathBuf },

    #[error("cannot write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Whitespace-token cursor over a whole text file. All of the input formats
/// are order-sensitive keyword/value streams, so a single forward scan with
/// `find_word` + `next` covers them.
pub struct TokenReader {
    path: PathBuf,
    tokens: Vec<String>,
    pos: usize,
}

impl TokenReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path).map_err(|source| IoError::FileNotOpen {
            path: path.clone(),
            source,
        })?;
        Ok(Self::from_str_named(&text, path))
    }

    pub fn from_str_named(text: &str, path: PathBuf) -> Self {
        Self {
            path,
            tokens: text.split_whitespace().map(str::to_string).collect(),
            pos: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advance past the next occurrence of `word`.
    pub fn find_word(&mut self, word: &str) -> Result<(), IoError> {
        while self.pos < self.tokens.len() {
            let t = &self.tokens[self.pos];
            self.pos += 1;
            if t == word {
                return Ok(());
            }
        }
        Err(IoError::WordNotFound {
            word: word.to_string(),
            path: self.path.clone(),
        })
    }

    /// Parse the next token.
    pub fn next<T: FromStr>(&mut self, what: &'static str) -> Result<T, IoError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| IoError::UnexpectedEof {
                path: self.path.clone(),
            })?;
        self.pos += 1;
        token.parse().map_err(|_| IoError::BadToken {
            token: token.clone(),
            what,
            path: self.path.clone(),
        })
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

/// Scientific notation, six digits after the decimal point, in a
/// 15-character right-aligned field; matches the formatting of every
/// numeric text output this code writes and reads back.
pub fn fmt_sci(x: f64) -> String {
    if !x.is_finite() {
        return format!("{:>15}", x);
    }
    let formatted = format!("{:.6e}", x);
    // {:.6e} renders the exponent without a sign or leading zero
    let (mantissa, exp) = formatted
        .split_once('e')
        .expect("exponential format always contains e");
    let exp: i32 = exp.parse().expect("exponent is an integer");
    let mut s = String::new();
    let _ = write!(s, "{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs());
    format!("{:>15}", s)
}

/// Right-aligned integer in a field of the given width.
pub fn fmt_int(i: usize, width: usize) -> String {
    format!("{:>width$}", i, width = width)
}

/// Zero-padded integer of the given width, used in output file names.
pub fn fmt_int0(i: usize, width: usize) -> String {
    format!("{:0width$}", i, width = width)
}
