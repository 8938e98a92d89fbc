//! # Gauss-Legendre Quadrature and Grid Plans
//!
//! A [`GridPlan`] bundles everything a synthesis or analysis at one bandwidth
//! needs: the Gauss-Legendre nodes and weights in `z = cos(theta)`, the 4π
//! Legendre table at every node, and the longitude cosine/sine tables of the
//! `2B + 1` point equiangular ring.
//!
//! Building a plan means root-finding for the nodes plus `O(B³)` Legendre
//! evaluations, and callers usually sweep degrees or taper counts at a fixed
//! bandwidth. [`QuadratureCache`] keeps the plan of the most recent bandwidth
//! and rebuilds it only when a different bandwidth is requested. The cache is
//! an ordinary value owned by the caller; mutation requires `&mut`, so two
//! threads can never race on the same instance. [`PerThreadQuadrature`] gives
//! every worker thread of a parallel sweep its own cache.

use super::legendre::{fill_plm, triangular_len};
use super::{TransformError, try_zeroed};
use ndarray::Array2;
use std::cell::RefCell;
use std::f64::consts::PI;
use thread_local::ThreadLocal;

const NEWTON_TOLERANCE: f64 = 1e-15;
const NEWTON_MAX_ITERATIONS: usize = 100;

/// Nodes (in `z = cos(theta)`, descending from the north pole) and weights of
/// an n-point Gauss-Legendre rule on `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule {
    pub nodes: Vec<f64>,
    pub weights: Vec<f64>,
}

impl QuadratureRule {
    /// Computes the rule by Newton iteration on `P_n` from the Chebyshev-like
    /// initial guesses, mirroring the positive root into the southern half.
    pub fn gauss_legendre(n: usize) -> Result<Self, TransformError> {
        if n == 0 {
            return Err(TransformError::InvalidParameter {
                name: "quadrature points",
                value: n.to_string(),
            });
        }
        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let nf = n as f64;
        let half = n.div_ceil(2);

        for i in 0..half {
            let mut z = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
            let mut derivative = 1.0;
            for _ in 0..NEWTON_MAX_ITERATIONS {
                let (p_n, p_n_minus_1) = legendre_pair(n, z);
                derivative = nf * (z * p_n - p_n_minus_1) / (z * z - 1.0);
                let step = p_n / derivative;
                z -= step;
                if step.abs() < NEWTON_TOLERANCE {
                    break;
                }
            }
            if 2 * i + 1 == n {
                // Middle node of an odd rule sits exactly on the equator.
                z = 0.0;
                let (p_n, p_n_minus_1) = legendre_pair(n, z);
                derivative = nf * (z * p_n - p_n_minus_1) / (z * z - 1.0);
            }
            let weight = 2.0 / ((1.0 - z * z) * derivative * derivative);
            nodes[i] = z;
            weights[i] = weight;
            nodes[n - 1 - i] = -z;
            weights[n - 1 - i] = weight;
        }

        Ok(Self { nodes, weights })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// `(P_n(z), P_{n-1}(z))` by the three-term recurrence.
fn legendre_pair(n: usize, z: f64) -> (f64, f64) {
    let mut p_curr = 1.0;
    let mut p_prev = 0.0;
    for j in 0..n {
        let jf = j as f64;
        let p_next = ((2.0 * jf + 1.0) * z * p_curr - jf * p_prev) / (jf + 1.0);
        p_prev = p_curr;
        p_curr = p_next;
    }
    (p_curr, p_prev)
}

/// Precomputed tables for exact synthesis and analysis at one bandwidth.
#[derive(Debug, Clone)]
pub struct GridPlan {
    bandwidth: usize,
    rule: QuadratureRule,
    /// `(nlat, triangular_len(B))`, 4π-normalized `P̄_lm` at every node.
    plm: Array2<f64>,
    /// `(B + 1, nlon)`, `cos(m phi_j)`.
    cos_table: Array2<f64>,
    /// `(B + 1, nlon)`, `sin(m phi_j)`.
    sin_table: Array2<f64>,
}

impl GridPlan {
    pub fn new(bandwidth: usize) -> Result<Self, TransformError> {
        let nlat = bandwidth + 1;
        let nlon = 2 * bandwidth + 1;
        let rule = QuadratureRule::gauss_legendre(nlat)?;

        let columns = triangular_len(bandwidth);
        let mut plm_buffer = try_zeroed(nlat * columns)?;
        for (row, &z) in plm_buffer.chunks_exact_mut(columns).zip(rule.nodes.iter()) {
            fill_plm(bandwidth, z, row)?;
        }
        let plm = Array2::from_shape_vec((nlat, columns), plm_buffer).map_err(|_| {
            TransformError::Allocation {
                elements: nlat * columns,
            }
        })?;

        let orders = bandwidth + 1;
        let step = 2.0 * PI / nlon as f64;
        let cos_table =
            Array2::from_shape_fn((orders, nlon), |(m, j)| (m as f64 * j as f64 * step).cos());
        let sin_table =
            Array2::from_shape_fn((orders, nlon), |(m, j)| (m as f64 * j as f64 * step).sin());

        Ok(Self {
            bandwidth,
            rule,
            plm,
            cos_table,
            sin_table,
        })
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    pub fn nlat(&self) -> usize {
        self.bandwidth + 1
    }

    pub fn nlon(&self) -> usize {
        2 * self.bandwidth + 1
    }

    pub fn rule(&self) -> &QuadratureRule {
        &self.rule
    }

    pub fn plm(&self) -> &Array2<f64> {
        &self.plm
    }

    pub fn cos_table(&self) -> &Array2<f64> {
        &self.cos_table
    }

    pub fn sin_table(&self) -> &Array2<f64> {
        &self.sin_table
    }
}

/// Holds the grid plan of the most recently requested bandwidth.
#[derive(Debug, Default)]
pub struct QuadratureCache {
    plan: Option<GridPlan>,
    rebuilds: usize,
}

impl QuadratureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the plan for `bandwidth`, building it if the cached plan has a
    /// different bandwidth or nothing is cached yet.
    ///
    /// A failed build leaves the previous plan in place.
    pub fn plan(&mut self, bandwidth: usize) -> Result<&GridPlan, TransformError> {
        let plan = match self.plan.take() {
            Some(plan) if plan.bandwidth == bandwidth => plan,
            previous => {
                log::debug!("Building Gauss-Legendre grid plan for bandwidth {bandwidth}");
                match GridPlan::new(bandwidth) {
                    Ok(fresh) => {
                        self.rebuilds += 1;
                        fresh
                    }
                    Err(err) => {
                        self.plan = previous;
                        return Err(err);
                    }
                }
            }
        };
        Ok(self.plan.insert(plan))
    }

    /// Bandwidth of the cached plan, if any.
    pub fn bandwidth(&self) -> Option<usize> {
        self.plan.as_ref().map(GridPlan::bandwidth)
    }

    /// How many plans this cache has built so far.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn clear(&mut self) {
        self.plan = None;
    }
}

/// One [`QuadratureCache`] per OS thread, for use from rayon workers.
#[derive(Default)]
pub struct PerThreadQuadrature {
    caches: ThreadLocal<RefCell<QuadratureCache>>,
}

impl PerThreadQuadrature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with the calling thread's cache.
    ///
    /// Re-entrant use from inside `f` on the same thread panics, as with
    /// any `RefCell`.
    pub fn with<R>(&self, f: impl FnOnce(&mut QuadratureCache) -> R) -> R {
        let cell = self.caches.get_or(|| RefCell::new(QuadratureCache::new()));
        let mut cache = cell.borrow_mut();
        f(&mut cache)
    }

    /// Number of threads that have touched this object.
    pub fn thread_count(&mut self) -> usize {
        self.caches.iter_mut().count()
    }
}
