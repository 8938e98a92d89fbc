use super::{HarmonicConvention, TransformError};
use ndarray::{Array1, Array3, ArrayView1, s};

/// Real spherical-harmonic coefficients `cilm[i][l][m]`.
///
/// `i = 0` holds the cosine terms `C_lm` and `i = 1` the sine terms `S_lm`.
/// Entries with `m > l`, and the sine term of order zero, are always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ShCoeffs {
    cilm: Array3<f64>,
}

/// Number of entries in a packed vector of bandwidth `lmax`.
pub fn packed_len(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 1)
}

/// Position of `(i, l, m)` in a packed vector, ordered by degree and, within
/// a degree, cosine terms `m = 0..=l` followed by sine terms `m = 1..=l`.
pub fn packed_index(i: usize, l: usize, m: usize) -> usize {
    l * l + i * l + m
}

impl ShCoeffs {
    pub fn zeros(lmax: usize) -> Self {
        Self {
            cilm: Array3::zeros((2, lmax + 1, lmax + 1)),
        }
    }

    /// Wraps an existing `(2, L+1, >= L+1)` array. Orders beyond `L` are
    /// dropped. Nonzero entries with `m > l`, or a nonzero sine term of order
    /// zero, are rejected.
    pub fn from_array(cilm: Array3<f64>) -> Result<Self, TransformError> {
        let (parts, rows, cols) = cilm.dim();
        if parts != 2 {
            return Err(TransformError::Dimension {
                what: "cosine/sine planes of a coefficient array",
                required: 2,
                found: parts,
            });
        }
        if rows == 0 || cols < rows {
            return Err(TransformError::Dimension {
                what: "orders per degree of a coefficient array",
                required: rows.max(1),
                found: cols,
            });
        }
        for ((i, l, m), &value) in cilm.indexed_iter() {
            if value != 0.0 && (m > l || (i == 1 && m == 0)) {
                return Err(TransformError::InvalidParameter {
                    name: "cilm",
                    value: format!("{value} at [{i}][{l}][{m}], which must be zero"),
                });
            }
        }
        Ok(Self {
            cilm: cilm.slice(s![.., .., ..rows]).to_owned(),
        })
    }

    /// Unpacks a vector laid out as described in [`packed_index`].
    pub fn from_packed(vector: ArrayView1<f64>, lmax: usize) -> Result<Self, TransformError> {
        let required = packed_len(lmax);
        if vector.len() < required {
            return Err(TransformError::Dimension {
                what: "packed coefficient vector",
                required,
                found: vector.len(),
            });
        }
        let mut coeffs = Self::zeros(lmax);
        for l in 0..=lmax {
            for m in 0..=l {
                coeffs.cilm[[0, l, m]] = vector[packed_index(0, l, m)];
                if m > 0 {
                    coeffs.cilm[[1, l, m]] = vector[packed_index(1, l, m)];
                }
            }
        }
        Ok(coeffs)
    }

    pub fn to_packed(&self) -> Array1<f64> {
        let lmax = self.lmax();
        let mut vector = Array1::zeros(packed_len(lmax));
        for l in 0..=lmax {
            for m in 0..=l {
                vector[packed_index(0, l, m)] = self.cilm[[0, l, m]];
                if m > 0 {
                    vector[packed_index(1, l, m)] = self.cilm[[1, l, m]];
                }
            }
        }
        vector
    }

    pub fn lmax(&self) -> usize {
        self.cilm.dim().1 - 1
    }

    #[inline]
    pub fn get(&self, i: usize, l: usize, m: usize) -> f64 {
        self.cilm[[i, l, m]]
    }

    #[inline]
    pub fn set(&mut self, i: usize, l: usize, m: usize, value: f64) {
        self.cilm[[i, l, m]] = value;
    }

    pub fn as_array(&self) -> &Array3<f64> {
        &self.cilm
    }

    /// Copies degrees `0..=lmax`, zero padding when `lmax` exceeds the
    /// stored bandwidth.
    pub fn truncated(&self, lmax: usize) -> Self {
        let keep = lmax.min(self.lmax()) + 1;
        let mut out = Self::zeros(lmax);
        out.cilm
            .slice_mut(s![.., ..keep, ..keep])
            .assign(&self.cilm.slice(s![.., ..keep, ..keep]));
        out
    }

    /// Re-expresses the same function in another convention.
    pub fn converted(&self, from: &HarmonicConvention, to: &HarmonicConvention) -> Self {
        if from == to {
            return self.clone();
        }
        let mut out = self.clone();
        for l in 0..=self.lmax() {
            for m in 0..=l {
                let factor = from.scale(l, m) / to.scale(l, m);
                out.cilm[[0, l, m]] *= factor;
                out.cilm[[1, l, m]] *= factor;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{CondonShortley, Normalization};
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn packed_layout_follows_degree_then_cosine_then_sine() {
        assert_eq!(packed_index(0, 0, 0), 0);
        assert_eq!(packed_index(0, 1, 0), 1);
        assert_eq!(packed_index(0, 1, 1), 2);
        assert_eq!(packed_index(1, 1, 1), 3);
        assert_eq!(packed_index(0, 2, 2), 6);
        assert_eq!(packed_index(1, 2, 1), 7);
        assert_eq!(packed_index(1, 2, 2), 8);
        assert_eq!(packed_len(2), 9);
    }

    #[test]
    fn packing_is_lossless() {
        let vector = Array1::from_iter((0..16).map(|i| i as f64 + 0.5));
        let coeffs = ShCoeffs::from_packed(vector.view(), 3).unwrap();
        assert_eq!(coeffs.get(1, 3, 2), vector[packed_index(1, 3, 2)]);
        assert_eq!(coeffs.to_packed(), vector);
    }

    #[test]
    fn short_packed_vector_is_rejected() {
        let vector = Array1::zeros(8);
        let err = ShCoeffs::from_packed(vector.view(), 2).unwrap_err();
        assert_eq!(
            err,
            TransformError::Dimension {
                what: "packed coefficient vector",
                required: 9,
                found: 8
            }
        );
    }

    #[test]
    fn array_constructor_keeps_valid_terms() {
        let mut cilm = Array3::zeros((2, 3, 4));
        cilm[[0, 2, 0]] = 1.5;
        cilm[[1, 2, 2]] = -0.25;
        let coeffs = ShCoeffs::from_array(cilm).unwrap();
        assert_eq!(coeffs.lmax(), 2);
        assert_eq!(coeffs.as_array().dim(), (2, 3, 3));
        assert_eq!(coeffs.get(0, 2, 0), 1.5);
        assert_eq!(coeffs.get(1, 2, 2), -0.25);
    }

    #[test]
    fn array_constructor_rejects_terms_outside_the_triangle() {
        let mut order_zero_sine = Array3::zeros((2, 3, 3));
        order_zero_sine[[1, 2, 0]] = 1.0;
        assert!(matches!(
            ShCoeffs::from_array(order_zero_sine),
            Err(TransformError::InvalidParameter { name: "cilm", .. })
        ));

        let mut above_degree = Array3::zeros((2, 3, 3));
        above_degree[[0, 1, 2]] = 1.0;
        assert!(matches!(
            ShCoeffs::from_array(above_degree),
            Err(TransformError::InvalidParameter { name: "cilm", .. })
        ));

        let mut extra_column = Array3::zeros((2, 2, 3));
        extra_column[[0, 1, 2]] = 1.0;
        assert!(ShCoeffs::from_array(extra_column).is_err());

        assert!(matches!(
            ShCoeffs::from_array(Array3::zeros((1, 3, 3))),
            Err(TransformError::Dimension { required: 2, found: 1, .. })
        ));
    }

    #[test]
    fn array_input_survives_a_grid_round_trip() {
        use crate::transform::{QuadratureCache, analyze, cross_power, synthesize};

        let mut cilm = Array3::zeros((2, 3, 3));
        cilm[[0, 0, 0]] = 1.0;
        cilm[[0, 2, 1]] = 0.5;
        cilm[[1, 2, 2]] = 2.0;
        let coeffs = ShCoeffs::from_array(cilm).unwrap();
        let mut cache = QuadratureCache::new();
        let plan = cache.plan(2).unwrap();
        let convention = HarmonicConvention::default();
        let grid = synthesize(&coeffs, &convention, plan).unwrap();
        let recovered = analyze(grid.view(), &convention, plan).unwrap();
        let before = cross_power(&coeffs, &coeffs, 2).unwrap();
        let after = cross_power(&recovered, &recovered, 2).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_relative_eq!(before[2], 4.25, epsilon = 1e-15);
    }

    #[test]
    fn truncation_pads_and_cuts() {
        let mut coeffs = ShCoeffs::zeros(2);
        coeffs.set(0, 2, 1, 3.0);
        coeffs.set(0, 1, 0, 2.0);
        let cut = coeffs.truncated(1);
        assert_eq!(cut.lmax(), 1);
        assert_eq!(cut.get(0, 1, 0), 2.0);
        let padded = coeffs.truncated(4);
        assert_eq!(padded.lmax(), 4);
        assert_eq!(padded.get(0, 2, 1), 3.0);
        assert_eq!(padded.get(0, 4, 4), 0.0);
    }

    #[test]
    fn conversion_round_trips() {
        let mut coeffs = ShCoeffs::zeros(3);
        coeffs.set(0, 3, 1, 1.25);
        coeffs.set(1, 2, 2, -0.5);
        let geodesy = HarmonicConvention::default();
        let ortho = HarmonicConvention::new(Normalization::Orthonormal, CondonShortley::Include);
        let there = coeffs.converted(&geodesy, &ortho);
        assert_relative_eq!(
            there.get(0, 3, 1),
            -1.25 * (4.0 * std::f64::consts::PI).sqrt(),
            epsilon = 1e-12
        );
        let back = there.converted(&ortho, &geodesy);
        assert_relative_eq!(back.get(0, 3, 1), 1.25, epsilon = 1e-12);
        assert_relative_eq!(back.get(1, 2, 2), -0.5, epsilon = 1e-12);
    }
}
