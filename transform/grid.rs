use super::coeffs::ShCoeffs;
use super::legendre::{triangular_index, triangular_len};
use super::quadrature::GridPlan;
use super::{HarmonicConvention, TransformError, try_zeroed};
use ndarray::{Array2, ArrayView2};

/// Evaluates an expansion on the `(B + 1) x (2B + 1)` Gauss-Legendre grid of
/// `plan`. Rows run over the latitude nodes from north to south, columns over
/// longitudes `2πj / (2B + 1)`.
///
/// `coeffs` may have any bandwidth up to the plan's.
pub fn synthesize(
    coeffs: &ShCoeffs,
    convention: &HarmonicConvention,
    plan: &GridPlan,
) -> Result<Array2<f64>, TransformError> {
    let lmax = coeffs.lmax();
    if lmax > plan.bandwidth() {
        return Err(TransformError::Dimension {
            what: "grid bandwidth for synthesis",
            required: lmax,
            found: plan.bandwidth(),
        });
    }

    let (cos_coeffs, sin_coeffs) = geodesy_coefficients(coeffs, convention)?;
    let (nlat, nlon) = (plan.nlat(), plan.nlon());
    let mut buffer = try_zeroed(nlat * nlon)?;
    let mut cos_sums = vec![0.0; lmax + 1];
    let mut sin_sums = vec![0.0; lmax + 1];

    for (i, row) in buffer.chunks_exact_mut(nlon).enumerate() {
        let plm = plan.plm().row(i);
        for m in 0..=lmax {
            let mut a = 0.0;
            let mut b = 0.0;
            for l in m..=lmax {
                let idx = triangular_index(l, m);
                a += plm[idx] * cos_coeffs[idx];
                b += plm[idx] * sin_coeffs[idx];
            }
            cos_sums[m] = a;
            sin_sums[m] = b;
        }
        for m in 0..=lmax {
            let cos_row = plan.cos_table().row(m);
            let sin_row = plan.sin_table().row(m);
            let (a, b) = (cos_sums[m], sin_sums[m]);
            for (j, value) in row.iter_mut().enumerate() {
                *value += a * cos_row[j] + b * sin_row[j];
            }
        }
    }

    Array2::from_shape_vec((nlat, nlon), buffer).map_err(|_| TransformError::Allocation {
        elements: nlat * nlon,
    })
}

/// Expands a grid sampled as in [`synthesize`] into coefficients of the
/// plan's bandwidth. Exact for any band-limited field of that bandwidth.
pub fn analyze(
    grid: ArrayView2<f64>,
    convention: &HarmonicConvention,
    plan: &GridPlan,
) -> Result<ShCoeffs, TransformError> {
    let (nlat, nlon) = (plan.nlat(), plan.nlon());
    if grid.nrows() != nlat {
        return Err(TransformError::Dimension {
            what: "grid latitude rows",
            required: nlat,
            found: grid.nrows(),
        });
    }
    if grid.ncols() != nlon {
        return Err(TransformError::Dimension {
            what: "grid longitude columns",
            required: nlon,
            found: grid.ncols(),
        });
    }

    let lmax = plan.bandwidth();
    let mut cos_acc = try_zeroed(triangular_len(lmax))?;
    let mut sin_acc = try_zeroed(triangular_len(lmax))?;
    let weights = &plan.rule().weights;

    for i in 0..nlat {
        let row = grid.row(i);
        let plm = plan.plm().row(i);
        // (1 / 4π) * w_i * (2π / nlon)
        let ring_weight = weights[i] / (2.0 * nlon as f64);
        for m in 0..=lmax {
            let a = row.dot(&plan.cos_table().row(m)) * ring_weight;
            let b = row.dot(&plan.sin_table().row(m)) * ring_weight;
            for l in m..=lmax {
                let idx = triangular_index(l, m);
                cos_acc[idx] += plm[idx] * a;
                sin_acc[idx] += plm[idx] * b;
            }
        }
    }

    let mut coeffs = ShCoeffs::zeros(lmax);
    for l in 0..=lmax {
        for m in 0..=l {
            let idx = triangular_index(l, m);
            let scale = convention.scale(l, m);
            coeffs.set(0, l, m, cos_acc[idx] / scale);
            if m > 0 {
                coeffs.set(1, l, m, sin_acc[idx] / scale);
            }
        }
    }
    Ok(coeffs)
}

/// Coefficients rescaled to 4π normalization without phase, in triangular
/// layout.
fn geodesy_coefficients(
    coeffs: &ShCoeffs,
    convention: &HarmonicConvention,
) -> Result<(Vec<f64>, Vec<f64>), TransformError> {
    let lmax = coeffs.lmax();
    let mut cos_coeffs = try_zeroed(triangular_len(lmax))?;
    let mut sin_coeffs = try_zeroed(triangular_len(lmax))?;
    for l in 0..=lmax {
        for m in 0..=l {
            let idx = triangular_index(l, m);
            let scale = convention.scale(l, m);
            cos_coeffs[idx] = coeffs.get(0, l, m) * scale;
            sin_coeffs[idx] = coeffs.get(1, l, m) * scale;
        }
    }
    Ok((cos_coeffs, sin_coeffs))
}
