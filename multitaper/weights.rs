//! # Minimum-Variance Taper Weights
//!
//! For a covariance `F_k` of `k` single-taper estimates, the unbiased weights
//! minimizing `wᵀ F_k w` subject to `Σ w = 1` follow from one Lagrange
//! multiplier:
//!
//! ```text
//! w = F_k⁻¹ 1 / (1ᵀ F_k⁻¹ 1),        var_opt = 1 / (1ᵀ F_k⁻¹ 1).
//! ```
//!
//! The optimal weights for `k` tapers are not a truncation of those for
//! `k + 1`, so every leading submatrix is solved on its own.

use super::MultitaperError;
use super::covariance::{CovarianceMode, taper_covariance};
use super::tapers::TaperBank;
use crate::transform::{HarmonicConvention, QuadratureCache};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use ndarray_linalg::{SVD, Solve};

pub const DEFAULT_RCOND_TOLERANCE: f64 = 1e-12;

/// Which optional results to return alongside the variances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverOutputs {
    pub weights: bool,
    pub covariance: bool,
}

impl SolverOutputs {
    pub fn all() -> Self {
        Self {
            weights: true,
            covariance: true,
        }
    }

    pub fn variances_only() -> Self {
        Self {
            weights: false,
            covariance: false,
        }
    }
}

impl Default for SolverOutputs {
    fn default() -> Self {
        Self::all()
    }
}

/// Settings for [`optimal_taper_weights`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    pub outputs: SolverOutputs,
    pub mode: CovarianceMode,
    /// Smallest acceptable `σ_min / σ_max` of a covariance submatrix.
    pub rcond_tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            outputs: SolverOutputs::default(),
            mode: CovarianceMode::Full,
            rcond_tolerance: DEFAULT_RCOND_TOLERANCE,
        }
    }
}

/// Variances for taper counts `1..=kmax` together with the optional weights
/// and covariance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumVarianceSolution {
    /// `var_opt[k - 1]`: minimum variance achievable with the first `k` tapers.
    pub var_opt: Array1<f64>,
    /// `var_unit[k - 1]`: variance of the equal-weight average of `k` tapers.
    pub var_unit: Array1<f64>,
    /// Column `k - 1` holds the `k` optimal weights in rows `0..k`, zero below.
    pub weight_opt: Option<Array2<f64>>,
    /// The `kmax x kmax` covariance the variances were derived from.
    pub unweighted_covar: Option<Array2<f64>>,
}

impl MinimumVarianceSolution {
    pub fn kmax(&self) -> usize {
        self.var_opt.len()
    }

    /// The optimal weights for `k` tapers, when weights were requested.
    pub fn weights_for(&self, k: usize) -> Option<ArrayView1<'_, f64>> {
        if k == 0 || k > self.kmax() {
            return None;
        }
        self.weight_opt
            .as_ref()
            .map(|weights| weights.slice(s![..k, k - 1]))
    }
}

/// Minimum-variance weights and variance for one covariance matrix.
pub fn minimum_variance_weights(
    covariance: ArrayView2<f64>,
    rcond_tolerance: f64,
) -> Result<(Array1<f64>, f64), MultitaperError> {
    let k = covariance.nrows();
    if k == 0 || covariance.ncols() != k {
        return Err(MultitaperError::Dimension {
            what: "columns of a square covariance matrix",
            required: k.max(1),
            found: covariance.ncols(),
        });
    }
    if covariance.iter().any(|value| !value.is_finite()) {
        return Err(MultitaperError::SingularCovariance { k, rcond: f64::NAN });
    }

    let rcond = reciprocal_condition(covariance)?;
    if !(rcond >= rcond_tolerance) {
        return Err(MultitaperError::SingularCovariance { k, rcond });
    }

    let ones = Array1::<f64>::ones(k);
    let solution = covariance.solve(&ones)?;
    let total = solution.sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(MultitaperError::SingularCovariance { k, rcond });
    }
    Ok((solution / total, 1.0 / total))
}

/// Variance of the equal-weight average, `(1 / k²) Σ_ij F_ij`.
pub fn equal_weight_variance(covariance: ArrayView2<f64>) -> f64 {
    let k = covariance.nrows();
    if k == 0 {
        return 0.0;
    }
    covariance.sum() / (k * k) as f64
}

fn reciprocal_condition(matrix: ArrayView2<f64>) -> Result<f64, MultitaperError> {
    let (_, singular, _) = matrix.svd(false, false)?;
    let largest = singular.iter().fold(0.0_f64, |acc, &value| acc.max(value));
    let smallest = singular.iter().fold(f64::INFINITY, |acc, &value| acc.min(value));
    if largest <= 0.0 {
        return Ok(0.0);
    }
    Ok(smallest / largest)
}

/// Solves every leading submatrix `F[..k, ..k]` for `k = 1..=kmax`.
///
/// Fails with [`MultitaperError::SingularCovariance`] at the first
/// ill-conditioned `k`.
pub fn solve_minimum_variance(
    covariance: ArrayView2<f64>,
    kmax: usize,
    outputs: SolverOutputs,
    rcond_tolerance: f64,
) -> Result<MinimumVarianceSolution, MultitaperError> {
    solve_leading(covariance, kmax, outputs, rcond_tolerance, false)
}

/// Like [`solve_minimum_variance`], but stops at the last well-conditioned
/// taper count instead of failing. The returned solution may be shorter than
/// `kmax`; it only fails when a single taper is already singular.
pub fn solve_minimum_variance_clipped(
    covariance: ArrayView2<f64>,
    kmax: usize,
    outputs: SolverOutputs,
    rcond_tolerance: f64,
) -> Result<MinimumVarianceSolution, MultitaperError> {
    solve_leading(covariance, kmax, outputs, rcond_tolerance, true)
}

fn solve_leading(
    covariance: ArrayView2<f64>,
    kmax: usize,
    outputs: SolverOutputs,
    rcond_tolerance: f64,
    clip: bool,
) -> Result<MinimumVarianceSolution, MultitaperError> {
    let n = covariance.nrows();
    if covariance.ncols() != n {
        return Err(MultitaperError::Dimension {
            what: "columns of a square covariance matrix",
            required: n,
            found: covariance.ncols(),
        });
    }
    if kmax == 0 || kmax > n {
        return Err(MultitaperError::Dimension {
            what: "rows of the covariance matrix",
            required: kmax.max(1),
            found: n,
        });
    }

    let mut var_opt = Vec::with_capacity(kmax);
    let mut var_unit = Vec::with_capacity(kmax);
    let mut weight_columns: Vec<Array1<f64>> = Vec::with_capacity(kmax);

    for k in 1..=kmax {
        let leading = covariance.slice(s![..k, ..k]);
        let (weights, variance) = match minimum_variance_weights(leading, rcond_tolerance) {
            Ok(result) => result,
            Err(MultitaperError::SingularCovariance { rcond, .. }) if clip && k > 1 => {
                log::warn!(
                    "Covariance of {k} tapers is ill-conditioned (rcond {rcond:.3e}); clipping to {} tapers",
                    k - 1
                );
                break;
            }
            Err(err) => return Err(err),
        };
        log::debug!("k = {k}: var_opt = {variance:.6e}");
        var_opt.push(variance);
        var_unit.push(equal_weight_variance(leading));
        if outputs.weights {
            weight_columns.push(weights);
        }
    }

    let solved = var_opt.len();
    let weight_opt = outputs.weights.then(|| {
        let mut matrix = Array2::zeros((solved, solved));
        for (column, weights) in weight_columns.iter().enumerate() {
            matrix.slice_mut(s![..weights.len(), column]).assign(weights);
        }
        matrix
    });
    let unweighted_covar = outputs
        .covariance
        .then(|| covariance.slice(s![..solved, ..solved]).to_owned());

    Ok(MinimumVarianceSolution {
        var_opt: Array1::from(var_opt),
        var_unit: Array1::from(var_unit),
        weight_opt,
        unweighted_covar,
    })
}

/// Minimum-variance multitaper weights at one degree: builds the taper
/// covariance under `sff` and solves it for `k = 1..=kmax`.
pub fn optimal_taper_weights(
    bank: &TaperBank,
    kmax: usize,
    degree: usize,
    sff: ArrayView1<f64>,
    options: &SolverOptions,
    convention: &HarmonicConvention,
    cache: &mut QuadratureCache,
) -> Result<MinimumVarianceSolution, MultitaperError> {
    if !(options.rcond_tolerance >= 0.0) {
        return Err(MultitaperError::InvalidParameter {
            name: "rcond_tolerance",
            value: options.rcond_tolerance.to_string(),
        });
    }
    let covariance = taper_covariance(bank, kmax, degree, sff, options.mode, convention, cache)?;
    solve_minimum_variance(covariance.view(), kmax, options.outputs, options.rcond_tolerance)
}
