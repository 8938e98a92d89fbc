//! Spherical-cap localization windows.
//!
//! For a cap of angular radius `θ0` about the north pole the optimally
//! concentrated band-limited windows separate by order: for each `m` the
//! degree profile is an eigenvector of
//!
//! ```text
//! D_ll' = ∫_{cos θ0}^{1} P̄_lm P̄_l'm dz / ∫_{-1}^{1} P̄_lm² dz,    m <= l, l' <= Lt,
//! ```
//!
//! and its eigenvalue is the fraction of the window's energy inside the cap.

use super::MultitaperError;
use super::tapers::TaperBank;
use crate::transform::QuadratureRule;
use crate::transform::legendre::{plm, triangular_index};
use ndarray::{Array1, Array2, ArrayView1, s};
use ndarray_linalg::{Eigh, UPLO};

/// All `(Lt + 1)²` cap windows of one bandwidth, sorted by concentration.
#[derive(Debug, Clone, PartialEq)]
pub struct CapTapers {
    /// `(Lt + 1) x K` degree profiles in 4π normalization with unit power.
    pub profiles: Array2<f64>,
    /// Signed order of each column; negative orders are sine windows.
    pub orders: Vec<i32>,
    /// Fraction of each window's energy inside the cap, descending.
    pub concentration: Array1<f64>,
    pub theta0_degrees: f64,
}

impl CapTapers {
    pub fn lmax(&self) -> usize {
        self.profiles.nrows() - 1
    }

    /// The windows as a [`TaperBank`], best concentrated first.
    pub fn bank(&self) -> Result<TaperBank, MultitaperError> {
        TaperBank::from_cap(self.profiles.view(), &self.orders)
    }

    /// Number of well-concentrated windows, `(Lt + 1)² (1 - cos θ0) / 2`.
    pub fn shannon_number(&self) -> f64 {
        let n = (self.lmax() + 1) as f64;
        n * n * (1.0 - self.theta0_degrees.to_radians().cos()) / 2.0
    }
}

/// Computes the cap windows of bandwidth `lmax` for a cap of radius
/// `theta0_degrees`.
pub fn spherical_cap_tapers(theta0_degrees: f64, lmax: usize) -> Result<CapTapers, MultitaperError> {
    if !(theta0_degrees > 0.0 && theta0_degrees <= 180.0) {
        return Err(MultitaperError::InvalidParameter {
            name: "theta0_degrees",
            value: theta0_degrees.to_string(),
        });
    }
    log::info!("Computing spherical-cap tapers: cap radius {theta0_degrees} degrees, bandwidth {lmax}");

    let z0 = theta0_degrees.to_radians().cos();
    let rule = QuadratureRule::gauss_legendre(lmax + 1)?;
    let half_width = (1.0 - z0) / 2.0;
    let midpoint = (1.0 + z0) / 2.0;
    let tables = rule
        .nodes
        .iter()
        .map(|&x| plm(lmax, (half_width * x + midpoint).min(1.0)))
        .collect::<Result<Vec<_>, _>>()?;
    let weights: Vec<f64> = rule.weights.iter().map(|w| w * half_width).collect();

    let mut windows: Vec<(f64, i32, Array1<f64>)> = Vec::with_capacity((lmax + 1) * (lmax + 1));
    for m in 0..=lmax {
        let size = lmax - m + 1;
        let norm = if m == 0 { 2.0 } else { 4.0 };
        let mut matrix = Array2::<f64>::zeros((size, size));
        for (table, &w) in tables.iter().zip(weights.iter()) {
            for i in 0..size {
                let pi = table[triangular_index(m + i, m)];
                for j in 0..=i {
                    matrix[[i, j]] += w * pi * table[triangular_index(m + j, m)] / norm;
                }
            }
        }
        for i in 0..size {
            for j in 0..i {
                matrix[[j, i]] = matrix[[i, j]];
            }
        }

        let (values, vectors) = matrix.eigh(UPLO::Lower)?;
        for (index, &value) in values.iter().enumerate() {
            let mut profile = Array1::zeros(lmax + 1);
            profile
                .slice_mut(s![m..])
                .assign(&oriented(vectors.column(index)));
            let order = m as i32;
            if m > 0 {
                windows.push((value, -order, profile.clone()));
            }
            windows.push((value, order, profile));
        }
        log::debug!("Solved concentration problem for order {m}");
    }

    // Ties go to the lower order, cosine window ahead of its sine partner.
    windows.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then(a.1.unsigned_abs().cmp(&b.1.unsigned_abs()))
            .then(b.1.cmp(&a.1))
    });

    let count = windows.len();
    let mut profiles = Array2::zeros((lmax + 1, count));
    let mut orders = Vec::with_capacity(count);
    let mut concentration = Array1::zeros(count);
    for (k, (value, order, profile)) in windows.into_iter().enumerate() {
        profiles.column_mut(k).assign(&profile);
        orders.push(order);
        concentration[k] = value.clamp(0.0, 1.0);
    }

    Ok(CapTapers {
        profiles,
        orders,
        concentration,
        theta0_degrees,
    })
}

/// Flips the sign so the largest-magnitude coefficient is positive.
fn oriented(vector: ArrayView1<f64>) -> Array1<f64> {
    let dominant = vector
        .iter()
        .copied()
        .fold(0.0_f64, |acc, value| if value.abs() > acc.abs() { value } else { acc });
    if dominant < 0.0 {
        vector.mapv(|value| -value)
    } else {
        vector.to_owned()
    }
}
