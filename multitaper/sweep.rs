use super::MultitaperError;
use super::tapers::TaperBank;
use super::weights::{MinimumVarianceSolution, SolverOptions, optimal_taper_weights};
use crate::transform::{HarmonicConvention, PerThreadQuadrature};
use ndarray::ArrayView1;
use rayon::prelude::*;

/// Runs [`optimal_taper_weights`] for every entry of `degrees` in parallel.
///
/// Each rayon worker uses its own cache from `caches`. Results come back in
/// the order of `degrees`; if any degree fails, one of the errors is returned.
pub fn variance_sweep(
    bank: &TaperBank,
    kmax: usize,
    degrees: &[usize],
    sff: ArrayView1<f64>,
    options: &SolverOptions,
    convention: &HarmonicConvention,
    caches: &PerThreadQuadrature,
) -> Result<Vec<MinimumVarianceSolution>, MultitaperError> {
    bank.require(kmax)?;
    log::info!(
        "Minimum-variance sweep over {} degrees with {kmax} tapers",
        degrees.len()
    );
    degrees
        .par_iter()
        .map(|&degree| {
            caches.with(|cache| optimal_taper_weights(bank, kmax, degree, sff, options, convention, cache))
        })
        .collect()
}
