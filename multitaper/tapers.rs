use super::MultitaperError;
use crate::transform::ShCoeffs;
use crate::transform::coeffs::{packed_index, packed_len};
use ndarray::{Array2, ArrayView2, Axis, s};

/// An ordered bank of orthogonal localization windows.
///
/// Each column of `columns` is one taper as a packed coefficient vector of
/// bandwidth `lmax` (see [`packed_index`]). Banks built from spherical-cap
/// tapers also remember the angular order of every taper.
#[derive(Debug, Clone, PartialEq)]
pub struct TaperBank {
    lmax: usize,
    columns: Array2<f64>,
    orders: Option<Vec<i32>>,
}

impl TaperBank {
    /// Arbitrary-shape tapers, one packed vector per column. Rows beyond
    /// `(lmax + 1)²` are ignored.
    pub fn from_packed(columns: ArrayView2<f64>, lmax: usize) -> Result<Self, MultitaperError> {
        let required = packed_len(lmax);
        if columns.nrows() < required {
            return Err(MultitaperError::Dimension {
                what: "rows of the packed taper matrix",
                required,
                found: columns.nrows(),
            });
        }
        if columns.ncols() == 0 {
            return Err(MultitaperError::Dimension {
                what: "taper columns",
                required: 1,
                found: 0,
            });
        }
        Ok(Self {
            lmax,
            columns: columns.slice(s![..required, ..]).to_owned(),
            orders: None,
        })
    }

    /// Spherical-cap tapers given as `(lmax + 1) x K` degree profiles plus the
    /// order of each column. A non-negative order `m` places the profile on the
    /// cosine terms of order `m`, a negative order on the sine terms of `|m|`.
    pub fn from_cap(profiles: ArrayView2<f64>, orders: &[i32]) -> Result<Self, MultitaperError> {
        if profiles.nrows() == 0 {
            return Err(MultitaperError::Dimension {
                what: "degrees of the cap taper matrix",
                required: 1,
                found: 0,
            });
        }
        if orders.len() < profiles.ncols() {
            return Err(MultitaperError::Dimension {
                what: "taper orders",
                required: profiles.ncols(),
                found: orders.len(),
            });
        }
        let lmax = profiles.nrows() - 1;
        let mut columns = Array2::zeros((packed_len(lmax), profiles.ncols()));
        for (k, profile) in profiles.axis_iter(Axis(1)).enumerate() {
            let order = orders[k];
            let m = order.unsigned_abs() as usize;
            if m > lmax {
                return Err(MultitaperError::InvalidParameter {
                    name: "taper order",
                    value: order.to_string(),
                });
            }
            let part = usize::from(order < 0);
            for l in m..=lmax {
                columns[[packed_index(part, l, m), k]] = profile[l];
            }
        }
        Ok(Self {
            lmax,
            columns,
            orders: Some(orders[..profiles.ncols()].to_vec()),
        })
    }

    /// Taper bandwidth `Lt`.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn len(&self) -> usize {
        self.columns.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.ncols() == 0
    }

    pub fn orders(&self) -> Option<&[i32]> {
        self.orders.as_deref()
    }

    pub fn columns(&self) -> ArrayView2<'_, f64> {
        self.columns.view()
    }

    /// Taper `k` (zero-based) as a coefficient set.
    pub fn taper(&self, k: usize) -> Result<ShCoeffs, MultitaperError> {
        if k >= self.len() {
            return Err(MultitaperError::Dimension {
                what: "taper columns",
                required: k + 1,
                found: self.len(),
            });
        }
        Ok(ShCoeffs::from_packed(self.columns.column(k), self.lmax)?)
    }

    /// Fails unless the bank holds at least `k` tapers.
    pub(crate) fn require(&self, k: usize) -> Result<(), MultitaperError> {
        if k == 0 || k > self.len() {
            return Err(MultitaperError::Dimension {
                what: "taper columns",
                required: k.max(1),
                found: if k == 0 { 0 } else { self.len() },
            });
        }
        Ok(())
    }
}
