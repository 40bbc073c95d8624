//! Point predictors for personal recommendations
//!
//! Both models are pretrained elsewhere; this module only evaluates them.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{IdMapping, InnerId, Rating, RawId, ScoreMatrix},
};

/// A trained model that estimates how a user would rate an item
#[cfg_attr(test, mockall::automock)]
pub trait Predictor: Send + Sync {
    /// Estimated rating of `item` by `user`
    ///
    /// Pairs the model has too little data for still get an estimate (the
    /// model's fallback). Errors are reserved for faults in the model itself.
    fn predict(&self, user: u32, item: RawId) -> AppResult<f64>;

    /// Model name for logging
    fn name(&self) -> &'static str;
}

/// Lowest and highest rating the models may return
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RatingScale {
    pub min: f64,
    pub max: f64,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

impl RatingScale {
    pub fn clip(&self, estimate: f64) -> f64 {
        estimate.clamp(self.min, self.max)
    }
}

/// Bias and latent factors of one user or item
#[derive(Debug, Clone, Deserialize)]
pub struct LatentEntry {
    #[serde(default)]
    pub bias: f64,
    pub factors: Vec<f64>,
}

// ============================================================================
// Factorization (biased SVD)
// ============================================================================

/// Pretrained biased matrix-factorization model
///
/// `estimate = mean + b_u + b_i + q_i · p_u`. An unknown user or item adds
/// nothing, so the estimate falls back toward the baseline and, when both
/// are unknown, to the global mean.
#[derive(Debug, Clone, Deserialize)]
pub struct FactorizationModel {
    pub global_mean: f64,
    #[serde(default)]
    pub rating_scale: RatingScale,
    pub users: HashMap<u32, LatentEntry>,
    pub items: HashMap<RawId, LatentEntry>,
}

impl FactorizationModel {
    /// Checks that every factor vector has the same length
    pub fn validate(&self) -> AppResult<()> {
        if !self.global_mean.is_finite() {
            return Err(AppError::Artifact(
                "factorization global mean is not finite".to_string(),
            ));
        }

        let mut expected: Option<usize> = None;
        let entries = self
            .users
            .iter()
            .map(|(id, e)| ("user", *id, e))
            .chain(self.items.iter().map(|(id, e)| ("item", *id, e)));

        for (kind, id, entry) in entries {
            let len = entry.factors.len();
            match expected {
                None => expected = Some(len),
                Some(n) if n != len => {
                    return Err(AppError::Artifact(format!(
                        "{} {} has {} factors, expected {}",
                        kind, id, len, n
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

impl Predictor for FactorizationModel {
    fn predict(&self, user: u32, item: RawId) -> AppResult<f64> {
        let user_entry = self.users.get(&user);
        let item_entry = self.items.get(&item);

        let mut estimate = self.global_mean;
        match (user_entry, item_entry) {
            (None, None) => {}
            (Some(u), None) => estimate += u.bias,
            (None, Some(i)) => estimate += i.bias,
            (Some(u), Some(i)) => {
                let dot: f64 = u.factors.iter().zip(&i.factors).map(|(p, q)| p * q).sum();
                estimate += u.bias + i.bias + dot;
            }
        }

        Ok(self.rating_scale.clip(estimate))
    }

    fn name(&self) -> &'static str {
        "svd"
    }
}

// ============================================================================
// Neighborhood (item-based KNN)
// ============================================================================

/// Tunables of the neighborhood model (`knn_model.json`)
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NeighborhoodParams {
    /// Maximum number of neighbors considered
    #[serde(default = "default_k")]
    pub k: usize,
    /// Fewer usable neighbors than this makes the prediction impossible
    #[serde(default = "default_min_k")]
    pub min_k: usize,
    #[serde(default)]
    pub rating_scale: RatingScale,
    /// Fallback estimate; the mean of the training ratings when absent
    #[serde(default)]
    pub global_mean: Option<f64>,
}

fn default_k() -> usize {
    40
}

fn default_min_k() -> usize {
    1
}

impl Default for NeighborhoodParams {
    fn default() -> Self {
        Self {
            k: default_k(),
            min_k: default_min_k(),
            rating_scale: RatingScale::default(),
            global_mean: None,
        }
    }
}

/// Item-based nearest-neighbor predictor over a precomputed similarity matrix
///
/// Unknown users, unknown items and pairs without enough positive neighbors
/// are answered with the clipped global mean.
pub struct NeighborhoodModel {
    params: NeighborhoodParams,
    similarities: Arc<ScoreMatrix>,
    mapping: Arc<IdMapping>,
    global_mean: f64,
    /// Ratings per user as (inner id, rating), in the order they were given
    user_ratings: HashMap<u32, Vec<(InnerId, f64)>>,
}

impl NeighborhoodModel {
    pub fn new<'a>(
        params: NeighborhoodParams,
        similarities: Arc<ScoreMatrix>,
        mapping: Arc<IdMapping>,
        ratings: impl IntoIterator<Item = &'a Rating>,
    ) -> AppResult<Self> {
        if similarities.dim() != mapping.len() {
            return Err(AppError::Artifact(format!(
                "similarity matrix has {} items, mapping has {}",
                similarities.dim(),
                mapping.len()
            )));
        }

        let mut user_ratings: HashMap<u32, Vec<(InnerId, f64)>> = HashMap::new();
        let mut total = 0.0;
        let mut count = 0usize;
        for rating in ratings {
            total += rating.rating;
            count += 1;
            // Ratings of movies outside the matrix cannot act as neighbors
            if let Ok(inner) = mapping.to_inner(rating.movie_id) {
                user_ratings
                    .entry(rating.user_id)
                    .or_default()
                    .push((inner, rating.rating));
            }
        }

        let global_mean = match params.global_mean {
            Some(mean) => mean,
            None if count > 0 => total / count as f64,
            None => {
                return Err(AppError::Artifact(
                    "neighborhood model needs ratings or a global_mean".to_string(),
                ))
            }
        };
        if !global_mean.is_finite() {
            return Err(AppError::Artifact(
                "neighborhood global mean is not finite".to_string(),
            ));
        }

        tracing::debug!(
            users = user_ratings.len(),
            ratings = count,
            global_mean,
            "Neighborhood model ready"
        );

        Ok(Self {
            params,
            similarities,
            mapping,
            global_mean,
            user_ratings,
        })
    }

    fn fallback(&self) -> f64 {
        self.params.rating_scale.clip(self.global_mean)
    }
}

impl Predictor for NeighborhoodModel {
    fn predict(&self, user: u32, item: RawId) -> AppResult<f64> {
        let (Some(rated), Ok(target)) = (self.user_ratings.get(&user), self.mapping.to_inner(item))
        else {
            return Ok(self.fallback());
        };

        let row = self.similarities.row(target);
        let mut neighbors: Vec<(f64, f64)> = rated
            .iter()
            .map(|&(inner, rating)| (row[inner], rating))
            .collect();
        // Stable, so equal similarities keep the user's rating order
        neighbors.sort_by(|a, b| b.0.total_cmp(&a.0));
        neighbors.truncate(self.params.k);

        let mut sum_sim = 0.0;
        let mut sum_ratings = 0.0;
        let mut actual_k = 0;
        for (sim, rating) in neighbors {
            if sim > 0.0 {
                sum_sim += sim;
                sum_ratings += sim * rating;
                actual_k += 1;
            }
        }

        if actual_k < self.params.min_k || sum_sim == 0.0 {
            tracing::trace!(user, item, actual_k, "Not enough neighbors, using global mean");
            return Ok(self.fallback());
        }

        Ok(self.params.rating_scale.clip(sum_ratings / sum_sim))
    }

    fn name(&self) -> &'static str {
        "knn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rating(user_id: u32, movie_id: RawId, value: f64) -> Rating {
        Rating {
            user_id,
            movie_id,
            rating: value,
            timestamp: Utc::now(),
        }
    }

    fn factorization_model() -> FactorizationModel {
        serde_json::from_value(serde_json::json!({
            "global_mean": 3.5,
            "users": {
                "1": { "bias": 0.2, "factors": [0.5, 1.0] }
            },
            "items": {
                "10": { "bias": -0.1, "factors": [1.0, 0.4] },
                "20": { "bias": 1.0, "factors": [2.0, 2.0] }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_factorization_known_pair() {
        let model = factorization_model();
        assert!(model.validate().is_ok());
        // 3.5 + 0.2 - 0.1 + (0.5 + 0.4)
        let estimate = model.predict(1, 10).unwrap();
        assert!((estimate - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_factorization_clips_to_scale() {
        let model = factorization_model();
        assert_eq!(model.predict(1, 20).unwrap(), 5.0);
    }

    #[test]
    fn test_factorization_unknown_user_uses_item_baseline() {
        let model = factorization_model();
        let estimate = model.predict(99, 10).unwrap();
        assert!((estimate - 3.4).abs() < 1e-9);
    }

    #[test]
    fn test_factorization_unknown_pair_is_global_mean() {
        let model = factorization_model();
        assert_eq!(model.predict(99, 99).unwrap(), 3.5);
    }

    #[test]
    fn test_factorization_rejects_mixed_factor_lengths() {
        let mut model = factorization_model();
        model.items.insert(
            30,
            LatentEntry {
                bias: 0.0,
                factors: vec![1.0],
            },
        );
        assert!(matches!(model.validate(), Err(AppError::Artifact(_))));
    }

    fn neighborhood_model(params: NeighborhoodParams) -> NeighborhoodModel {
        let mapping = Arc::new(IdMapping::new(vec![10, 20, 30, 40]).unwrap());
        let similarities = Arc::new(
            ScoreMatrix::from_rows(vec![
                vec![1.0, 0.8, 0.2, 0.0],
                vec![0.8, 1.0, 0.5, 0.0],
                vec![0.2, 0.5, 1.0, 0.0],
                vec![0.0, 0.0, 0.0, 1.0],
            ])
            .unwrap(),
        );
        let ratings = vec![
            rating(1, 20, 4.0),
            rating(1, 30, 2.0),
            rating(1, 999, 5.0),
            rating(2, 40, 3.0),
        ];
        NeighborhoodModel::new(params, similarities, mapping, &ratings).unwrap()
    }

    #[test]
    fn test_neighborhood_weighted_average() {
        let model = neighborhood_model(NeighborhoodParams::default());
        // (0.8 * 4 + 0.2 * 2) / (0.8 + 0.2)
        let estimate = model.predict(1, 10).unwrap();
        assert!((estimate - 3.6).abs() < 1e-9);
    }

    #[test]
    fn test_neighborhood_respects_k() {
        let model = neighborhood_model(NeighborhoodParams {
            k: 1,
            ..NeighborhoodParams::default()
        });
        assert_eq!(model.predict(1, 10).unwrap(), 4.0);
    }

    #[test]
    fn test_neighborhood_mean_covers_all_ratings() {
        let model = neighborhood_model(NeighborhoodParams::default());
        // (4 + 2 + 5 + 3) / 4, including the movie outside the matrix
        assert_eq!(model.global_mean, 3.5);
    }

    #[test]
    fn test_neighborhood_zero_similarity_falls_back_to_mean() {
        let model = neighborhood_model(NeighborhoodParams::default());
        // Movie 40 shares no similarity with anything user 1 rated
        assert_eq!(model.predict(1, 40).unwrap(), 3.5);
    }

    #[test]
    fn test_neighborhood_min_k_falls_back_to_mean() {
        let model = neighborhood_model(NeighborhoodParams {
            min_k: 3,
            ..NeighborhoodParams::default()
        });
        assert_eq!(model.predict(1, 10).unwrap(), 3.5);
    }

    #[test]
    fn test_neighborhood_unknown_user_or_item_falls_back_to_mean() {
        let model = neighborhood_model(NeighborhoodParams::default());
        assert_eq!(model.predict(7, 10).unwrap(), 3.5);
        assert_eq!(model.predict(1, 50).unwrap(), 3.5);
    }

    #[test]
    fn test_neighborhood_configured_mean_is_clipped() {
        let model = neighborhood_model(NeighborhoodParams {
            global_mean: Some(9.0),
            ..NeighborhoodParams::default()
        });
        assert_eq!(model.predict(7, 10).unwrap(), 5.0);
    }

    #[test]
    fn test_neighborhood_ties_keep_rating_order() {
        let mapping = Arc::new(IdMapping::new(vec![10, 20, 30]).unwrap());
        let similarities = Arc::new(
            ScoreMatrix::from_rows(vec![
                vec![1.0, 0.5, 0.5],
                vec![0.5, 1.0, 0.0],
                vec![0.5, 0.0, 1.0],
            ])
            .unwrap(),
        );
        let params = NeighborhoodParams {
            k: 1,
            ..NeighborhoodParams::default()
        };
        // 30 was rated first, so it wins the tie at k = 1
        let ratings = vec![rating(1, 30, 2.0), rating(1, 20, 5.0)];
        let model = NeighborhoodModel::new(params, similarities, mapping, &ratings).unwrap();
        assert_eq!(model.predict(1, 10).unwrap(), 2.0);
    }

    #[test]
    fn test_neighborhood_needs_a_mean() {
        let mapping = Arc::new(IdMapping::new(vec![10]).unwrap());
        let similarities = Arc::new(ScoreMatrix::from_rows(vec![vec![1.0]]).unwrap());
        let result = NeighborhoodModel::new(
            NeighborhoodParams::default(),
            similarities,
            mapping,
            &Vec::<Rating>::new(),
        );
        assert!(matches!(result, Err(AppError::Artifact(_))));
    }

    #[test]
    fn test_neighborhood_params_defaults_from_json() {
        let params: NeighborhoodParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.k, 40);
        assert_eq!(params.min_k, 1);
        assert_eq!(params.rating_scale, RatingScale::default());
        assert_eq!(params.global_mean, None);
    }
}
