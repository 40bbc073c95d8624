use ndarray::{Array2, ArrayView1};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};

/// Identifier of a movie in the original catalog
pub type RawId = u32;

/// Dense zero-based row/column index into the score matrices
pub type InnerId = usize;

/// Bidirectional mapping between catalog ids and matrix indices
///
/// Built once when the artifacts are loaded. Every inner id in `[0, N)` has
/// exactly one raw id and vice versa.
#[derive(Debug, Clone)]
pub struct IdMapping {
    inner_to_raw: Vec<RawId>,
    raw_to_inner: HashMap<RawId, InnerId>,
}

impl IdMapping {
    /// Builds the mapping from its inner-to-raw side, deriving the inverse
    pub fn new(inner_to_raw: Vec<RawId>) -> AppResult<Self> {
        let mut raw_to_inner = HashMap::with_capacity(inner_to_raw.len());
        for (inner, raw) in inner_to_raw.iter().enumerate() {
            if let Some(previous) = raw_to_inner.insert(*raw, inner) {
                return Err(AppError::InvalidArgument(format!(
                    "raw id {} is mapped from both inner ids {} and {}",
                    raw, previous, inner
                )));
            }
        }

        Ok(Self {
            inner_to_raw,
            raw_to_inner,
        })
    }

    /// Accepts both sides of an externally produced mapping after checking
    /// that they are exact inverses
    pub fn from_pairs(
        inner_to_raw: Vec<RawId>,
        raw_to_inner: HashMap<RawId, InnerId>,
    ) -> AppResult<Self> {
        if inner_to_raw.len() != raw_to_inner.len() {
            return Err(AppError::InvalidArgument(format!(
                "mapping sizes differ: {} inner ids, {} raw ids",
                inner_to_raw.len(),
                raw_to_inner.len()
            )));
        }

        for (inner, raw) in inner_to_raw.iter().enumerate() {
            match raw_to_inner.get(raw) {
                Some(&back) if back == inner => {}
                Some(&back) => {
                    return Err(AppError::InvalidArgument(format!(
                        "raw id {} maps back to inner id {}, expected {}",
                        raw, back, inner
                    )))
                }
                None => {
                    return Err(AppError::InvalidArgument(format!(
                        "raw id {} (inner id {}) missing from raw-to-inner mapping",
                        raw, inner
                    )))
                }
            }
        }

        Ok(Self {
            inner_to_raw,
            raw_to_inner,
        })
    }

    /// Resolves a catalog id to its matrix index
    pub fn to_inner(&self, raw: RawId) -> AppResult<InnerId> {
        self.raw_to_inner
            .get(&raw)
            .copied()
            .ok_or_else(|| AppError::LookupFailure(format!("movie {} has no matrix index", raw)))
    }

    pub fn to_raw(&self, inner: InnerId) -> Option<RawId> {
        self.inner_to_raw.get(inner).copied()
    }

    pub fn contains_raw(&self, raw: RawId) -> bool {
        self.raw_to_inner.contains_key(&raw)
    }

    pub fn len(&self) -> usize {
        self.inner_to_raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner_to_raw.is_empty()
    }
}

/// Dense square matrix of item-item affinities
///
/// Entry `(i, j)` is the affinity of item `i` to item `j`. Not required to be
/// symmetric. All entries are finite.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    values: Array2<f64>,
}

impl ScoreMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> AppResult<Self> {
        let n = rows.len();
        let mut flat = Vec::with_capacity(n * n);

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(AppError::InvalidArgument(format!(
                    "score matrix is not square: row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(AppError::InvalidArgument(format!(
                    "score matrix entry ({}, {}) is not finite",
                    i, j
                )));
            }
            flat.extend(row);
        }

        let values = Array2::from_shape_vec((n, n), flat)
            .map_err(|e| AppError::Internal(format!("score matrix shape error: {}", e)))?;

        Ok(Self { values })
    }

    /// Number of items `N`
    pub fn dim(&self) -> usize {
        self.values.nrows()
    }

    /// Row `i`; panics when `i >= dim()`, callers check bounds first
    pub fn row(&self, i: InnerId) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }
}

/// Convex blend weight `alpha` in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeight(f64);

impl BlendWeight {
    pub fn new(alpha: f64) -> AppResult<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(AppError::InvalidArgument(format!(
                "alpha must lie in [0, 1], got {}",
                alpha
            )));
        }
        Ok(Self(alpha))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `1 - alpha`, the weight of the neighborhood source
    pub fn complement(self) -> f64 {
        1.0 - self.0
    }
}

/// Independent weights of the two point predictors
///
/// Unlike `BlendWeight` these do not have to sum to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub svd_weight: f64,
    pub knn_weight: f64,
}

impl HybridWeights {
    pub fn new(svd_weight: f64, knn_weight: f64) -> AppResult<Self> {
        if !svd_weight.is_finite() || !knn_weight.is_finite() {
            return Err(AppError::InvalidArgument(format!(
                "predictor weights must be finite, got svd={} knn={}",
                svd_weight, knn_weight
            )));
        }
        Ok(Self {
            svd_weight,
            knn_weight,
        })
    }

    pub fn combine(&self, svd_estimate: f64, knn_estimate: f64) -> f64 {
        self.svd_weight * svd_estimate + self.knn_weight * knn_estimate
    }
}
