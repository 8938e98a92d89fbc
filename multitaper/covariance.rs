//! # Taper Covariance
//!
//! Under the assumption that the unwindowed field is a zero-mean isotropic
//! Gaussian process with power spectrum `Sff`, its 4π-normalized coefficients
//! are independent with `E[f_lm²] = Sff(l) / (2l + 1)`. Windowing by taper
//! `h_k` is linear,
//!
//! ```text
//! Φᵏ_lm = Σ_{l1 m1} Aᵏ_{lm, l1m1} f_{l1m1},   Aᵏ_{lm, l1m1} = (1/4π) ∫ h_k Y_lm Y_l1m1 dΩ,
//! ```
//!
//! and the covariance of two single-taper estimates `Ŝ_k(l) = Σ_m (Φᵏ_lm)²` is
//! the Gaussian fourth-moment identity
//!
//! ```text
//! F_kk' = 2 Σ_{m, m'} ( Σ_{l1 m1} Aᵏ_{m, l1m1} Aᵏ'_{m', l1m1} Sff(l1) / (2l1 + 1) )².
//! ```
//!
//! The coupling integrals are evaluated exactly by Gauss-Legendre analysis of
//! the products `h_k · Y_lm` at bandwidth `l + Lt`; only degrees
//! `|l - Lt| <= l1 <= l + Lt` come out non-zero.

use super::MultitaperError;
use super::tapers::TaperBank;
use crate::transform::coeffs::{packed_index, packed_len};
use crate::transform::{
    GridPlan, HarmonicConvention, QuadratureCache, ShCoeffs, analyze, synthesize, try_zeros2,
};
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};

/// Which entries of the covariance matrix to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CovarianceMode {
    /// Every entry.
    #[default]
    Full,
    /// Only the variances; off-diagonal entries are left at exactly zero.
    DiagonalOnly,
}

impl CovarianceMode {
    /// Maps the conventional `nocross` flag onto a mode.
    pub fn from_nocross(nocross: bool) -> Self {
        if nocross {
            Self::DiagonalOnly
        } else {
            Self::Full
        }
    }
}

/// Covariance of the single-taper spectral estimates of the first `kmax`
/// tapers at spherical-harmonic degree `degree`.
///
/// `sff` must cover degrees `0..=degree + Lt`. Taper coefficients are read in
/// `convention`.
pub fn taper_covariance(
    bank: &TaperBank,
    kmax: usize,
    degree: usize,
    sff: ArrayView1<f64>,
    mode: CovarianceMode,
    convention: &HarmonicConvention,
    cache: &mut QuadratureCache,
) -> Result<Array2<f64>, MultitaperError> {
    bank.require(kmax)?;
    let bandwidth = degree + bank.lmax();
    if sff.len() < bandwidth + 1 {
        return Err(MultitaperError::Dimension {
            what: "degrees of the global spectrum Sff",
            required: bandwidth + 1,
            found: sff.len(),
        });
    }
    if let Some(bad) = sff.iter().take(bandwidth + 1).find(|value| !value.is_finite()) {
        return Err(MultitaperError::InvalidParameter {
            name: "Sff",
            value: bad.to_string(),
        });
    }

    log::info!(
        "Building {mode:?} taper covariance for degree {degree}: {kmax} tapers, taper bandwidth {}",
        bank.lmax()
    );

    let plan = cache.plan(bandwidth)?;
    let geodesy = HarmonicConvention::default();
    let harmonics = degree_harmonic_grids(degree, plan)?;
    let signal_variance = coefficient_variances(sff, bandwidth);

    let mut product = try_zeros2(plan.nlat(), plan.nlon())?;
    let mut couplings = Vec::with_capacity(kmax);
    for k in 0..kmax {
        let taper = bank.taper(k)?.converted(convention, &geodesy);
        let taper_grid = synthesize(&taper, &geodesy, plan)?;
        let mut coupling = try_zeros2(harmonics.len(), packed_len(bandwidth))?;
        for (mut row, harmonic) in coupling.axis_iter_mut(Axis(0)).zip(harmonics.iter()) {
            Zip::from(&mut product)
                .and(&taper_grid)
                .and(harmonic)
                .for_each(|p, &h, &y| *p = h * y);
            row.assign(&analyze(product.view(), &geodesy, plan)?.to_packed());
        }
        log::debug!("Computed coupling matrix of taper {}", k + 1);
        couplings.push(coupling);
    }

    let mut covariance = try_zeros2(kmax, kmax)?;
    for k in 0..kmax {
        let weighted = &couplings[k] * &signal_variance;
        let partners = match mode {
            CovarianceMode::Full => k..kmax,
            CovarianceMode::DiagonalOnly => k..k + 1,
        };
        for kp in partners {
            let cross = weighted.dot(&couplings[kp].t());
            let value = 2.0 * cross.iter().map(|c| c * c).sum::<f64>();
            covariance[[k, kp]] = value;
            covariance[[kp, k]] = value;
        }
    }
    Ok(covariance)
}

/// Grids of the `2l + 1` real 4π harmonics of degree `l`: cosine terms
/// `m = 0..=l`, then sine terms `m = 1..=l`.
fn degree_harmonic_grids(degree: usize, plan: &GridPlan) -> Result<Vec<Array2<f64>>, MultitaperError> {
    let geodesy = HarmonicConvention::default();
    let terms = (0..=degree)
        .map(|m| (0, m))
        .chain((1..=degree).map(|m| (1, m)));
    let mut grids = Vec::with_capacity(2 * degree + 1);
    for (part, m) in terms {
        let mut unit = ShCoeffs::zeros(degree);
        unit.set(part, degree, m, 1.0);
        grids.push(synthesize(&unit, &geodesy, plan)?);
    }
    Ok(grids)
}

/// `Sff(l) / (2l + 1)` spread over the packed layout of `bandwidth`.
fn coefficient_variances(sff: ArrayView1<f64>, bandwidth: usize) -> Array1<f64> {
    let mut variances = Array1::zeros(packed_len(bandwidth));
    for l in 0..=bandwidth {
        let per_coefficient = sff[l] / (2 * l + 1) as f64;
        for m in 0..=l {
            variances[packed_index(0, l, m)] = per_coefficient;
            if m > 0 {
                variances[packed_index(1, l, m)] = per_coefficient;
            }
        }
    }
    variances
}
