//! # Localized Multitaper Spectral Estimation
//!
//! Two independent pipelines share the taper bank as their only common input:
//!
//! 1.  **Minimum-variance weights.** [`covariance::taper_covariance`] builds the
//!     covariance `F` of the single-taper spectral estimates at one degree
//!     under an assumed global spectrum `Sff`, and [`weights`] finds, for every
//!     taper count `k`, the weights summing to one that minimize `wᵀ F_k w`.
//!
//! 2.  **Windowed cross-spectra.** [`cross_spectrum`] multiplies two fields by
//!     each taper on a Gauss-Legendre grid, re-expands the products, and
//!     combines the per-taper cross-power spectra into a multitaper estimate
//!     with its standard error ([`estimate`]).
//!
//! Both pipelines take a caller-owned [`QuadratureCache`](crate::transform::QuadratureCache).

pub mod cap;
pub mod config;
pub mod covariance;
pub mod cross_spectrum;
pub mod estimate;
pub mod sweep;
pub mod tapers;
pub mod weights;

use crate::transform::TransformError;
use thiserror::Error;

pub use cap::{CapTapers, spherical_cap_tapers};
pub use config::{ConfigError, MultitaperConfig};
pub use covariance::{CovarianceMode, taper_covariance};
pub use cross_spectrum::{multitaper_cross_spectrum, multitaper_spectrum};
pub use estimate::{MultitaperSpectrum, combine_estimates};
pub use sweep::variance_sweep;
pub use tapers::TaperBank;
pub use weights::{
    MinimumVarianceSolution, SolverOptions, SolverOutputs, equal_weight_variance,
    minimum_variance_weights, optimal_taper_weights, solve_minimum_variance,
    solve_minimum_variance_clipped,
};

/// A comprehensive error type for the multitaper routines.
#[derive(Error, Debug)]
pub enum MultitaperError {
    #[error("Spherical-harmonic transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("{what} requires at least {required}, but {found} was supplied.")]
    Dimension {
        what: &'static str,
        required: usize,
        found: usize,
    },

    #[error("Parameter '{name}' has the invalid value {value}.")]
    InvalidParameter { name: &'static str, value: String },

    #[error(
        "Taper bandwidth {taper_lmax} must be smaller than the signal bandwidth {signal_lmax}."
    )]
    InvalidBandwidth {
        taper_lmax: usize,
        signal_lmax: usize,
    },

    #[error(
        "The covariance matrix of the first {k} tapers is singular to working precision (reciprocal condition number {rcond:.3e})."
    )]
    SingularCovariance { k: usize, rcond: f64 },

    #[error("A dense linear-algebra routine failed: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),
}
