use super::coeffs::ShCoeffs;
use super::TransformError;
use ndarray::Array1;

/// Per-degree cross-power `S_fg(l) = Σ_m (C^f_lm C^g_lm + S^f_lm S^g_lm)` for
/// `l = 0..=lmax`.
///
/// Both inputs must share one normalization convention; with 4π harmonics this
/// is the power per degree.
pub fn cross_power(a: &ShCoeffs, b: &ShCoeffs, lmax: usize) -> Result<Array1<f64>, TransformError> {
    let available = a.lmax().min(b.lmax());
    if lmax > available {
        return Err(TransformError::Dimension {
            what: "coefficient bandwidth for cross-power",
            required: lmax,
            found: available,
        });
    }
    Ok(Array1::from_shape_fn(lmax + 1, |l| {
        (0..=l)
            .map(|m| a.get(0, l, m) * b.get(0, l, m) + a.get(1, l, m) * b.get(1, l, m))
            .sum()
    }))
}

/// Per-degree power spectrum of a single expansion.
pub fn power(a: &ShCoeffs, lmax: usize) -> Result<Array1<f64>, TransformError> {
    cross_power(a, a, lmax)
}
