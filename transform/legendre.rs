//! 4π-normalized associated Legendre functions.
//!
//! `P̄_lm(z) = sqrt((2 - δ_m0) (2l + 1) (l - m)! / (l + m)!) P_lm(z)` without the
//! Condon-Shortley phase, evaluated with the standard sectoral-then-vertical
//! recursion. The recursion coefficients stay O(1), so the functions are
//! stable well beyond the degrees the multitaper routines use.

use super::TransformError;

/// Offset of `(l, m)` in a triangular table, `m <= l`.
#[inline]
pub fn triangular_index(l: usize, m: usize) -> usize {
    l * (l + 1) / 2 + m
}

pub fn triangular_len(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 2) / 2
}

/// Fills `out[triangular_index(l, m)] = P̄_lm(z)` for all `m <= l <= lmax`.
pub fn fill_plm(lmax: usize, z: f64, out: &mut [f64]) -> Result<(), TransformError> {
    let required = triangular_len(lmax);
    if out.len() < required {
        return Err(TransformError::Dimension {
            what: "Legendre table",
            required,
            found: out.len(),
        });
    }
    if !(-1.0..=1.0).contains(&z) {
        return Err(TransformError::InvalidParameter {
            name: "z",
            value: z.to_string(),
        });
    }

    let u = (1.0 - z * z).max(0.0).sqrt();
    let mut sectoral = 1.0;
    for m in 0..=lmax {
        if m == 1 {
            sectoral = 3.0_f64.sqrt() * u;
        } else if m > 1 {
            let mf = m as f64;
            sectoral *= u * ((2.0 * mf + 1.0) / (2.0 * mf)).sqrt();
        }
        out[triangular_index(m, m)] = sectoral;
        if m == lmax {
            break;
        }

        let mf = m as f64;
        let mut p_prev = sectoral;
        let mut p_curr = z * (2.0 * mf + 3.0).sqrt() * sectoral;
        out[triangular_index(m + 1, m)] = p_curr;

        for l in (m + 2)..=lmax {
            let lf = l as f64;
            let a = ((2.0 * lf - 1.0) * (2.0 * lf + 1.0) / ((lf - mf) * (lf + mf))).sqrt();
            let b = ((2.0 * lf + 1.0) * (lf + mf - 1.0) * (lf - mf - 1.0)
                / ((lf - mf) * (lf + mf) * (2.0 * lf - 3.0)))
                .sqrt();
            let p_next = a * z * p_curr - b * p_prev;
            out[triangular_index(l, m)] = p_next;
            p_prev = p_curr;
            p_curr = p_next;
        }
    }
    Ok(())
}

/// Allocating convenience wrapper around [`fill_plm`].
pub fn plm(lmax: usize, z: f64) -> Result<Vec<f64>, TransformError> {
    let mut table = vec![0.0; triangular_len(lmax)];
    fill_plm(lmax, z, &mut table)?;
    Ok(table)
}
