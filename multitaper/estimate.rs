use super::MultitaperError;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis, s};

/// Weights must sum to one within this tolerance.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-8;

/// A multitaper spectral estimate over degrees `0..=L - Lt`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultitaperSpectrum {
    pub estimate: Array1<f64>,
    /// `None` when a single taper was used, since one estimate carries no
    /// information about its own scatter.
    pub standard_error: Option<Array1<f64>>,
}

impl MultitaperSpectrum {
    /// Largest degree of the estimate.
    pub fn lmax(&self) -> usize {
        self.estimate.len().saturating_sub(1)
    }

    pub fn standard_error_or_zero(&self) -> Array1<f64> {
        self.standard_error
            .clone()
            .unwrap_or_else(|| Array1::zeros(self.estimate.len()))
    }
}

/// Combines a `K x n` table of single-taper estimates.
///
/// Without weights the estimate is the mean and the standard error is
/// `sqrt(s² / K)` with the sample variance `s²` taken over `K - 1`. With
/// weights `w` (first `K` entries, summing to one) the estimate is `Σ w_k x_k`
/// and the standard error uses the reliability-weighted variance
///
/// ```text
/// SE² = Σw² / ((Σw)² - Σw²) · Σw · Σ w_k (x_k - x̄)².
/// ```
pub fn combine_estimates(
    table: ArrayView2<f64>,
    weights: Option<ArrayView1<f64>>,
) -> Result<MultitaperSpectrum, MultitaperError> {
    let k = table.nrows();
    if k == 0 {
        return Err(MultitaperError::Dimension {
            what: "single-taper estimates",
            required: 1,
            found: 0,
        });
    }

    match weights {
        None => {
            let estimate = table.sum_axis(Axis(0)) / k as f64;
            let standard_error = (k > 1).then(|| {
                let mut squares = Array1::<f64>::zeros(table.ncols());
                for row in table.axis_iter(Axis(0)) {
                    let deviation = &row - &estimate;
                    squares += &(&deviation * &deviation);
                }
                squares.mapv(|s| (s / ((k - 1) * k) as f64).sqrt())
            });
            Ok(MultitaperSpectrum {
                estimate,
                standard_error,
            })
        }
        Some(weights) => {
            validate_weights(weights, k)?;
            let weights = weights.slice(s![..k]);
            let estimate = weights.dot(&table);
            let sum: f64 = weights.sum();
            let sum_of_squares: f64 = weights.iter().map(|w| w * w).sum();
            let denominator = sum * sum - sum_of_squares;
            let standard_error = (k > 1 && denominator > 0.0).then(|| {
                let factor = sum_of_squares / denominator * sum;
                let mut spread = Array1::<f64>::zeros(table.ncols());
                for (row, &w) in table.axis_iter(Axis(0)).zip(weights.iter()) {
                    let deviation = &row - &estimate;
                    spread.scaled_add(w, &(&deviation * &deviation));
                }
                // Negative weights can push the spread below zero.
                spread.mapv(|s| (factor * s).max(0.0).sqrt())
            });
            if k > 1 && standard_error.is_none() {
                log::warn!(
                    "Taper weights have non-positive effective spread ({denominator:.3e}); no standard error"
                );
            }
            Ok(MultitaperSpectrum {
                estimate,
                standard_error,
            })
        }
    }
}

/// Checks that `weights` covers `k` tapers and that those entries sum to one.
pub(crate) fn validate_weights(weights: ArrayView1<f64>, k: usize) -> Result<(), MultitaperError> {
    if weights.len() < k {
        return Err(MultitaperError::Dimension {
            what: "taper weights",
            required: k,
            found: weights.len(),
        });
    }
    let sum: f64 = weights.iter().take(k).sum();
    if !((sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE) {
        return Err(MultitaperError::InvalidParameter {
            name: "taper weights sum",
            value: sum.to_string(),
        });
    }
    Ok(())
}
