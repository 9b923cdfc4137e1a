// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all festr-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use crate::arr::ArrError;
use crate::cli::OptionsError;
use crate::dbase::DbaseError;
use crate::detector::DetectorError;
use crate::diagnostics::DiagnosticsError;
use crate::geometry::GeometryError;
use crate::goal::GoalError;
use crate::hydro::HydroError;
use crate::pool::PoolError;
use crate::transport::TransportError;

/// The *only* publicly visible error from festr.
#[derive(Error, Debug)]
pub enum FestrError {
    /// An error in the options file or command line.
    #[error("{0}")]
    Options(String),

    /// An error related to the opacity database or material table.
    #[error("{0}")]
    Dbase(String),

    /// An error related to hydro snapshots or candidate states.
    #[error("{0}")]
    Hydro(String),

    /// An error related to detectors and their outputs.
    #[error("{0}")]
    Detector(String),

    /// An error related to mesh geometry or ray tracing.
    #[error("{0}")]
    Geometry(String),

    /// An error related to goal spectra and scoring.
    #[error("{0}")]
    Goal(String),

    /// An error in the parallel task distribution.
    #[error("{0}")]
    Pool(String),

    /// A generic error that cannot be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses
// the correct `e`!

impl From<DiagnosticsError> for FestrError {
    fn from(e: DiagnosticsError) -> Self {
        let s = e.to_string();
        match e {
            DiagnosticsError::OneDetectorIn1d
            | DiagnosticsError::NoDetectors { .. }
            | DiagnosticsError::BadBool { .. } => Self::Options(s),
            DiagnosticsError::Detector(e) => Self::from(e),
            DiagnosticsError::Hydro(e) => Self::from(e),
            DiagnosticsError::Goal(e) => Self::from(e),
            DiagnosticsError::Dbase(e) => Self::from(e),
            DiagnosticsError::Geometry(e) => Self::from(e),
            DiagnosticsError::Indexing(_) => Self::Hydro(s),
            DiagnosticsError::Io(_) => Self::Generic(s),
        }
    }
}

impl From<DetectorError> for FestrError {
    fn from(e: DetectorError) -> Self {
        let s = e.to_string();
        match e {
            DetectorError::NoHvOverlap { .. }
            | DetectorError::BundleInSphericalAnalysis
            | DetectorError::BadBacklighter { .. } => Self::Detector(s),
            DetectorError::PeelZoneMismatch { .. } => Self::Goal(s),
            DetectorError::Geometry(_) => Self::Geometry(s),
            DetectorError::Dbase(e) => Self::from(e),
            DetectorError::Goal(e) => Self::from(e),
            DetectorError::Pool(e) => Self::from(e),
            DetectorError::Indexing(_) | DetectorError::Convolution(_) => Self::Detector(s),
            DetectorError::Io(_) | DetectorError::Arr(_) => Self::Generic(s),
        }
    }
}

impl From<HydroError> for FestrError {
    fn from(e: HydroError) -> Self {
        let s = e.to_string();
        match e {
            HydroError::UnknownTimeIndex { .. }
            | HydroError::EmptyTimeWindow { .. }
            | HydroError::StateZoneCountMismatch { .. }
            | HydroError::Indexing(_) => Self::Hydro(s),
            HydroError::Geometry(_) => Self::Geometry(s),
            HydroError::Io(_) => Self::Generic(s),
        }
    }
}

impl From<DbaseError> for FestrError {
    fn from(e: DbaseError) -> Self {
        let s = e.to_string();
        match e {
            DbaseError::UnknownMaterial { .. }
            | DbaseError::TopsUnsupported { .. }
            | DbaseError::EmptyNeGrid { .. } => Self::Dbase(s),
            DbaseError::Arr(_) | DbaseError::Io(_) => Self::Generic(s),
        }
    }
}

impl From<GoalError> for FestrError {
    fn from(e: GoalError) -> Self {
        let s = e.to_string();
        match e {
            GoalError::RangeMismatch { .. }
            | GoalError::BadAxisMode { .. }
            | GoalError::NoSuchObjective { .. } => Self::Goal(s),
            GoalError::Io(_) => Self::Generic(s),
        }
    }
}

impl From<GeometryError> for FestrError {
    fn from(e: GeometryError) -> Self {
        Self::Geometry(e.to_string())
    }
}

impl From<TransportError> for FestrError {
    fn from(e: TransportError) -> Self {
        let s = e.to_string();
        match e {
            TransportError::Geometry(_) => Self::Geometry(s),
            TransportError::Dbase(e) => Self::from(e),
        }
    }
}

impl From<PoolError> for FestrError {
    fn from(e: PoolError) -> Self {
        Self::Pool(e.to_string())
    }
}

impl From<ArrError> for FestrError {
    fn from(e: ArrError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<OptionsError> for FestrError {
    fn from(e: OptionsError) -> Self {
        Self::Options(e.to_string())
    }
}
