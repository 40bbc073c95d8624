//! Hybrid scoring and top-N ranking
//!
//! Both operations are pure functions of their inputs. Candidates are
//! generated in a fixed order (ascending inner id for the matrix variant,
//! caller order for the user variant) and ranked with a stable sort, so
//! candidates with exactly equal scores keep their generation order.

use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{
        BlendWeight, CandidateOutcome, HybridWeights, InnerId, ItemRanking,
        PredictionFailurePolicy, RawId, ScoreMatrix, ScoredItem, UserRanking,
    },
    services::predictor::Predictor,
};

/// Ranks every item against `reference` by blending two item-item matrices
///
/// `blended(j) = alpha * factorization[reference][j] + (1 - alpha) * neighborhood[reference][j]`
/// for every `j != reference`. Returns the best `min(top_n, N - 1)` items in
/// descending score order.
pub fn score_and_rank(
    reference: InnerId,
    factorization: &ScoreMatrix,
    neighborhood: &ScoreMatrix,
    alpha: f64,
    top_n: usize,
) -> AppResult<ItemRanking> {
    let n = factorization.dim();
    if neighborhood.dim() != n {
        return Err(AppError::InvalidArgument(format!(
            "score matrices differ in dimension: {} vs {}",
            n,
            neighborhood.dim()
        )));
    }
    if reference >= n {
        return Err(AppError::InvalidArgument(format!(
            "reference index {} out of range [0, {})",
            reference, n
        )));
    }
    let weight = BlendWeight::new(alpha)?;
    if top_n == 0 {
        return Err(AppError::InvalidArgument(
            "top_n must be positive".to_string(),
        ));
    }

    let factorization_row = factorization.row(reference);
    let neighborhood_row = neighborhood.row(reference);

    let mut scored: ItemRanking = factorization_row
        .iter()
        .zip(neighborhood_row.iter())
        .enumerate()
        .filter(|(j, _)| *j != reference)
        .map(|(j, (f, k))| ScoredItem::new(j, weight.value() * f + weight.complement() * k))
        .collect();

    rank_descending(&mut scored, top_n);

    tracing::debug!(
        reference,
        alpha,
        candidates = n - 1,
        returned = scored.len(),
        "Ranked similar items"
    );

    Ok(scored)
}

/// Scores each candidate with both predictors, keeping failures per candidate
///
/// Stops at the first failure when `policy` is `Abort`, since the rest of the
/// batch would be discarded anyway.
pub fn score_candidates(
    user_id: u32,
    candidates: &[RawId],
    svd: &dyn Predictor,
    knn: &dyn Predictor,
    weights: HybridWeights,
    policy: PredictionFailurePolicy,
) -> Vec<CandidateOutcome> {
    let mut outcomes = Vec::with_capacity(candidates.len());

    for &item in candidates {
        let outcome = match predict_hybrid(user_id, item, svd, knn, weights) {
            Ok(score) => CandidateOutcome::Scored(ScoredItem::new(item, score)),
            Err(e) => CandidateOutcome::Failed {
                item,
                reason: e.to_string(),
            },
        };

        let failed = matches!(outcome, CandidateOutcome::Failed { .. });
        outcomes.push(outcome);
        if failed && policy == PredictionFailurePolicy::Abort {
            break;
        }
    }

    outcomes
}

/// Ranks unseen `candidates` for a user by a weighted sum of two predictors
///
/// `hybrid = svd_weight * svd_estimate + knn_weight * knn_estimate`. The
/// weights are independent and are not normalized. The minimum-ratings gate
/// belongs to the caller.
#[instrument(skip(candidates, svd, knn), fields(candidates = candidates.len()))]
pub fn score_and_rank_for_user(
    user_id: u32,
    candidates: &[RawId],
    svd: &dyn Predictor,
    knn: &dyn Predictor,
    weights: HybridWeights,
    top_n: usize,
    policy: PredictionFailurePolicy,
) -> AppResult<UserRanking> {
    if top_n == 0 {
        return Err(AppError::InvalidArgument(
            "top_n must be positive".to_string(),
        ));
    }

    let mut scored = Vec::with_capacity(candidates.len());
    let mut skipped = 0;

    for outcome in score_candidates(user_id, candidates, svd, knn, weights, policy) {
        match outcome {
            CandidateOutcome::Scored(item) => scored.push(item),
            CandidateOutcome::Failed { item, reason } => match policy {
                PredictionFailurePolicy::Abort => {
                    tracing::error!(user_id, item, reason = %reason, "Prediction failed, aborting");
                    return Err(AppError::PredictionFailure(format!(
                        "movie {}: {}",
                        item, reason
                    )));
                }
                PredictionFailurePolicy::Skip => {
                    tracing::warn!(user_id, item, reason = %reason, "Prediction failed, skipping candidate");
                    skipped += 1;
                }
            },
        }
    }

    rank_descending(&mut scored, top_n);

    tracing::debug!(
        user_id,
        svd = svd.name(),
        knn = knn.name(),
        returned = scored.len(),
        skipped,
        "Ranked user candidates"
    );

    Ok(UserRanking {
        items: scored,
        skipped,
    })
}

/// Maps a raw score in `[0, 1]` onto the 1-5 star scale
pub fn display_rating(score: f64) -> f64 {
    score * 4.0 + 1.0
}

fn predict_hybrid(
    user_id: u32,
    item: RawId,
    svd: &dyn Predictor,
    knn: &dyn Predictor,
    weights: HybridWeights,
) -> AppResult<f64> {
    let svd_estimate = svd.predict(user_id, item)?;
    let knn_estimate = knn.predict(user_id, item)?;
    let hybrid = weights.combine(svd_estimate, knn_estimate);

    if !hybrid.is_finite() {
        return Err(AppError::PredictionFailure(format!(
            "non-finite estimate (svd={}, knn={})",
            svd_estimate, knn_estimate
        )));
    }

    Ok(hybrid)
}

// `sort_by` is stable: equal scores keep generation order.
fn rank_descending<T>(scored: &mut Vec<ScoredItem<T>>, top_n: usize) {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);
}
