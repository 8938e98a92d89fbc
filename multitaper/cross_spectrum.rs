//! # Windowed Cross-Spectra
//!
//! Each taper `h_k` localizes both fields in the spatial domain. With `L` the
//! smaller of the two signal bandwidths and `Lt` the taper bandwidth, the
//! products `h_k f` and `h_k g` are band-limited to `L + Lt`, so a single
//! Gauss-Legendre grid of that bandwidth represents them exactly. Only degrees
//! `0..=L - Lt` of the windowed cross-power are free of truncation effects and
//! only those are reported.

use super::MultitaperError;
use super::estimate::{MultitaperSpectrum, combine_estimates, validate_weights};
use super::tapers::TaperBank;
use crate::transform::{
    HarmonicConvention, QuadratureCache, ShCoeffs, analyze, cross_power, power, synthesize,
    try_zeros2,
};
use ndarray::{Array2, ArrayView1, Zip};

/// Multitaper cross-power estimate of `f` and `g` over degrees `0..=L - Lt`,
/// using the first `k` tapers of `bank`.
///
/// Without `weights` the single-taper estimates are averaged; with weights
/// (at least `k` entries, the first `k` summing to one) they are combined as
/// in [`combine_estimates`]. All inputs share `convention`.
pub fn multitaper_cross_spectrum(
    f: &ShCoeffs,
    g: &ShCoeffs,
    bank: &TaperBank,
    k: usize,
    weights: Option<ArrayView1<f64>>,
    convention: &HarmonicConvention,
    cache: &mut QuadratureCache,
) -> Result<MultitaperSpectrum, MultitaperError> {
    let lmax = f.lmax().min(g.lmax());
    check_inputs(bank, k, lmax, weights)?;
    log::info!(
        "Multitaper cross-spectrum: {k} tapers of bandwidth {}, signal bandwidth {lmax}",
        bank.lmax()
    );

    let signals = [f.truncated(lmax), g.truncated(lmax)];
    let table = windowed_spectra(&signals, bank, k, convention, cache)?;
    combine_estimates(table.view(), weights)
}

/// Multitaper power-spectrum estimate of `f`; the `f = g` case of
/// [`multitaper_cross_spectrum`] with each windowed product analyzed once.
pub fn multitaper_spectrum(
    f: &ShCoeffs,
    bank: &TaperBank,
    k: usize,
    weights: Option<ArrayView1<f64>>,
    convention: &HarmonicConvention,
    cache: &mut QuadratureCache,
) -> Result<MultitaperSpectrum, MultitaperError> {
    let lmax = f.lmax();
    check_inputs(bank, k, lmax, weights)?;
    log::info!(
        "Multitaper power spectrum: {k} tapers of bandwidth {}, signal bandwidth {lmax}",
        bank.lmax()
    );

    let table = windowed_spectra(std::slice::from_ref(f), bank, k, convention, cache)?;
    combine_estimates(table.view(), weights)
}

fn check_inputs(
    bank: &TaperBank,
    k: usize,
    lmax: usize,
    weights: Option<ArrayView1<f64>>,
) -> Result<(), MultitaperError> {
    bank.require(k)?;
    if bank.lmax() >= lmax {
        return Err(MultitaperError::InvalidBandwidth {
            taper_lmax: bank.lmax(),
            signal_lmax: lmax,
        });
    }
    if let Some(weights) = weights {
        validate_weights(weights, k)?;
    }
    Ok(())
}

/// The `k x (L - Lt + 1)` table of single-taper spectra. `signals` holds one
/// field for a power spectrum or two for a cross-spectrum, all of bandwidth `L`.
fn windowed_spectra(
    signals: &[ShCoeffs],
    bank: &TaperBank,
    k: usize,
    convention: &HarmonicConvention,
    cache: &mut QuadratureCache,
) -> Result<Array2<f64>, MultitaperError> {
    let lmax = signals.iter().map(ShCoeffs::lmax).min().unwrap_or(0);
    let taper_lmax = bank.lmax();
    let output_lmax = lmax - taper_lmax;
    let plan = cache.plan(lmax + taper_lmax)?;

    let grids = signals
        .iter()
        .map(|signal| synthesize(signal, convention, plan))
        .collect::<Result<Vec<_>, _>>()?;

    let mut product = try_zeros2(plan.nlat(), plan.nlon())?;
    let mut table = try_zeros2(k, output_lmax + 1)?;
    for (index, mut row) in table.rows_mut().into_iter().enumerate() {
        let taper_grid = synthesize(&bank.taper(index)?, convention, plan)?;
        let mut windowed = Vec::with_capacity(grids.len());
        for grid in &grids {
            Zip::from(&mut product)
                .and(grid)
                .and(&taper_grid)
                .for_each(|p, &f, &h| *p = f * h);
            windowed.push(analyze(product.view(), convention, plan)?);
        }
        let spectrum = match windowed.as_slice() {
            [a, b] => cross_power(a, b, output_lmax)?,
            [a] => power(a, output_lmax)?,
            _ => {
                return Err(MultitaperError::Dimension {
                    what: "windowed fields",
                    required: 1,
                    found: windowed.len(),
                });
            }
        };
        log::debug!("Windowed spectrum of taper {} computed", index + 1);
        row.assign(&spectrum);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::coeffs::{packed_index, packed_len};
    use crate::transform::{CondonShortley, Normalization};
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn random_coeffs(lmax: usize, seed: u64) -> ShCoeffs {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut coeffs = ShCoeffs::zeros(lmax);
        for l in 0..=lmax {
            for m in 0..=l {
                coeffs.set(0, l, m, normal.sample(&mut rng));
                if m > 0 {
                    coeffs.set(1, l, m, normal.sample(&mut rng));
                }
            }
        }
        coeffs
    }

    #[test]
    fn constant_taper_reproduces_the_global_cross_power() {
        let f = random_coeffs(6, 1);
        let g = random_coeffs(8, 2);
        let bank = TaperBank::from_packed(array![[1.0]].view(), 0).unwrap();
        let mut cache = QuadratureCache::new();
        let convention = HarmonicConvention::default();
        let result =
            multitaper_cross_spectrum(&f, &g, &bank, 1, None, &convention, &mut cache).unwrap();
        let expected = cross_power(&f, &g, 6).unwrap();
        assert_eq!(result.estimate.len(), 7);
        for (a, b) in result.estimate.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10, max_relative = 1e-10);
        }
        assert!(result.standard_error.is_none());
        assert_eq!(cache.bandwidth(), Some(6));
    }

    #[test]
    fn power_spectrum_matches_cross_spectrum_of_a_field_with_itself() {
        let f = random_coeffs(7, 3);
        let mut columns = Array2::zeros((packed_len(2), 2));
        columns[[packed_index(0, 0, 0), 0]] = 0.8;
        columns[[packed_index(0, 1, 0), 0]] = 0.6;
        columns[[packed_index(0, 0, 0), 1]] = -0.6;
        columns[[packed_index(0, 1, 0), 1]] = 0.8;
        let bank = TaperBank::from_packed(columns.view(), 2).unwrap();
        let convention = HarmonicConvention::new(Normalization::Orthonormal, CondonShortley::Include);
        let mut cache = QuadratureCache::new();
        let cross =
            multitaper_cross_spectrum(&f, &f, &bank, 2, None, &convention, &mut cache).unwrap();
        let auto = multitaper_spectrum(&f, &bank, 2, None, &convention, &mut cache).unwrap();
        assert_eq!(cache.rebuilds(), 1);
        assert_eq!(auto.lmax(), 5);
        for (a, b) in cross.estimate.iter().zip(auto.estimate.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
        let (cross_se, auto_se) = (cross.standard_error.unwrap(), auto.standard_error.unwrap());
        for (a, b) in cross_se.iter().zip(auto_se.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-10, epsilon = 1e-14);
        }
    }

    #[test]
    fn identical_tapers_have_zero_standard_error() {
        let f = random_coeffs(5, 4);
        let g = random_coeffs(5, 5);
        let columns = array![[1.0, 1.0]];
        let bank = TaperBank::from_packed(columns.view(), 0).unwrap();
        let mut cache = QuadratureCache::new();
        let convention = HarmonicConvention::default();
        let weights = array![0.3, 0.7];
        let weighted =
            multitaper_cross_spectrum(&f, &g, &bank, 2, Some(weights.view()), &convention, &mut cache)
                .unwrap();
        let unweighted =
            multitaper_cross_spectrum(&f, &g, &bank, 2, None, &convention, &mut cache).unwrap();
        for (a, b) in weighted.estimate.iter().zip(unweighted.estimate.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10, max_relative = 1e-10);
        }
        for se in weighted.standard_error.unwrap().iter() {
            assert!(se.abs() < 1e-8);
        }
    }

    #[test]
    fn invalid_inputs_fail_before_touching_the_cache() {
        let f = random_coeffs(3, 6);
        let g = random_coeffs(2, 7);
        let columns = Array2::from_elem((packed_len(2), 2), 0.5);
        let bank = TaperBank::from_packed(columns.view(), 2).unwrap();
        let mut cache = QuadratureCache::new();
        let convention = HarmonicConvention::default();

        assert!(matches!(
            multitaper_cross_spectrum(&f, &g, &bank, 1, None, &convention, &mut cache),
            Err(MultitaperError::InvalidBandwidth { taper_lmax: 2, signal_lmax: 2 })
        ));
        assert!(matches!(
            multitaper_spectrum(&f, &bank, 3, None, &convention, &mut cache),
            Err(MultitaperError::Dimension { required: 3, found: 2, .. })
        ));
        assert!(matches!(
            multitaper_spectrum(&f, &bank, 2, Some(array![1.0].view()), &convention, &mut cache),
            Err(MultitaperError::Dimension { required: 2, found: 1, .. })
        ));
        assert!(matches!(
            multitaper_spectrum(&f, &bank, 2, Some(array![0.5, 0.4].view()), &convention, &mut cache),
            Err(MultitaperError::InvalidParameter { .. })
        ));
        assert_eq!(cache.bandwidth(), None);
    }
}
