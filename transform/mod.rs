//! # Real Spherical-Harmonic Transform Primitives
//!
//! Gauss-Legendre synthesis and analysis of real spherical-harmonic
//! expansions, packed-vector conversion and per-degree cross-power. Everything
//! the multitaper estimators need from a transform library lives here, and
//! nothing more: the longitude sums are direct DFTs over `2B + 1` equally
//! spaced samples and the latitude sums run over `B + 1` Gauss-Legendre nodes,
//! which makes both directions exact for bandwidth-`B` functions.
//!
//! Internally every computation runs on 4π ("geodesy") normalized harmonics
//! without the Condon-Shortley phase. The other conventions are handled by a
//! per-(l, m) rescaling of the coefficients on the way in and out, see
//! [`HarmonicConvention::scale`].

pub mod coeffs;
pub mod grid;
pub mod legendre;
pub mod quadrature;
pub mod spectrum;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use coeffs::ShCoeffs;
pub use grid::{analyze, synthesize};
pub use quadrature::{GridPlan, PerThreadQuadrature, QuadratureCache, QuadratureRule};
pub use spectrum::{cross_power, power};

/// Errors raised by the transform layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("{what} requires at least {required} elements, but {found} were supplied.")]
    Dimension {
        what: &'static str,
        required: usize,
        found: usize,
    },

    #[error("Parameter '{name}' has the invalid value {value}.")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Failed to allocate a buffer of {elements} f64 values.")]
    Allocation { elements: usize },
}

/// Normalization of the real spherical harmonics.
///
/// The discriminants are the conventional integer codes (1 = geodesy 4π,
/// 2 = Schmidt semi-normalized, 3 = unnormalized, 4 = orthonormalized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `∫ Y_lm² dΩ = 4π`.
    Geodesy,
    /// `∫ Y_lm² dΩ = 4π / (2l + 1)`.
    Schmidt,
    /// Plain associated Legendre functions.
    Unnormalized,
    /// `∫ Y_lm² dΩ = 1`.
    Orthonormal,
}

impl Normalization {
    pub fn from_code(code: i32) -> Result<Self, TransformError> {
        match code {
            1 => Ok(Self::Geodesy),
            2 => Ok(Self::Schmidt),
            3 => Ok(Self::Unnormalized),
            4 => Ok(Self::Orthonormal),
            other => Err(TransformError::InvalidParameter {
                name: "norm",
                value: other.to_string(),
            }),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Geodesy => 1,
            Self::Schmidt => 2,
            Self::Unnormalized => 3,
            Self::Orthonormal => 4,
        }
    }
}

/// Whether the Condon-Shortley phase factor `(-1)^m` is part of the
/// Legendre functions. Codes: `1` excludes it, `-1` includes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CondonShortley {
    Exclude,
    Include,
}

impl CondonShortley {
    pub fn from_code(code: i32) -> Result<Self, TransformError> {
        match code {
            1 => Ok(Self::Exclude),
            -1 => Ok(Self::Include),
            other => Err(TransformError::InvalidParameter {
                name: "csphase",
                value: other.to_string(),
            }),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Exclude => 1,
            Self::Include => -1,
        }
    }
}

/// The numeric convention every coefficient set in a computation must share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonicConvention {
    pub normalization: Normalization,
    pub csphase: CondonShortley,
}

impl Default for HarmonicConvention {
    fn default() -> Self {
        Self {
            normalization: Normalization::Geodesy,
            csphase: CondonShortley::Exclude,
        }
    }
}

impl HarmonicConvention {
    pub fn new(normalization: Normalization, csphase: CondonShortley) -> Self {
        Self {
            normalization,
            csphase,
        }
    }

    /// Validates the integer codes used at foreign boundaries.
    pub fn from_codes(norm: i32, csphase: i32) -> Result<Self, TransformError> {
        Ok(Self {
            normalization: Normalization::from_code(norm)?,
            csphase: CondonShortley::from_code(csphase)?,
        })
    }

    /// Ratio `Y_lm(convention) / Y_lm(4π, no phase)`.
    ///
    /// A coefficient `c` in this convention corresponds to the 4π coefficient
    /// `c * scale(l, m)`.
    ///
    /// The unnormalized ratio grows like `sqrt((l+m)!/(l-m)!)` and overflows
    /// for degrees in the upper hundreds; all other ratios are bounded.
    pub fn scale(&self, l: usize, m: usize) -> f64 {
        let two_l_plus_one = (2 * l + 1) as f64;
        let magnitude = match self.normalization {
            Normalization::Geodesy => 1.0,
            Normalization::Schmidt => 1.0 / two_l_plus_one.sqrt(),
            Normalization::Orthonormal => 1.0 / (4.0 * std::f64::consts::PI).sqrt(),
            Normalization::Unnormalized => {
                // (l+m)! / (l-m)! accumulated as a product to avoid factorials.
                let mut ratio = 1.0;
                for j in (l - m + 1)..=(l + m) {
                    ratio *= j as f64;
                }
                let order_factor = if m == 0 { 1.0 } else { 2.0 };
                (ratio / (order_factor * two_l_plus_one)).sqrt()
            }
        };
        match self.csphase {
            CondonShortley::Include if m % 2 == 1 => -magnitude,
            _ => magnitude,
        }
    }
}

/// Allocates a zero-filled buffer without aborting on exhaustion.
pub(crate) fn try_zeroed(elements: usize) -> Result<Vec<f64>, TransformError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(elements)
        .map_err(|_| TransformError::Allocation { elements })?;
    buffer.resize(elements, 0.0);
    Ok(buffer)
}

/// Fallible counterpart of `Array2::zeros((rows, cols))`.
pub(crate) fn try_zeros2(rows: usize, cols: usize) -> Result<Array2<f64>, TransformError> {
    let elements = rows
        .checked_mul(cols)
        .ok_or(TransformError::Allocation { elements: usize::MAX })?;
    Array2::from_shape_vec((rows, cols), try_zeroed(elements)?)
        .map_err(|_| TransformError::Allocation { elements })
}
