use std::borrow::Cow;
use std::time::Duration;

use crate::{
    api::AppState,
    config::Config,
    error::{AppError, AppResult},
    models::{
        HybridWeights, InnerId, Movie, RawId, Recommendation, ScoredItem, SimilarMoviesResponse,
        UserRecommendationsResponse, UserSummary,
    },
    services::scorer::{display_rating, score_and_rank, score_and_rank_for_user},
};

/// Upper bound on catalog search results
pub const MAX_SEARCH_RESULTS: usize = 100;

/// Finds movies similar to `movie_id`
///
/// Blends the factorization and neighborhood similarity rows of the movie
/// with `alpha` (the configured default when absent) and returns the top-N
/// catalog entries with their star rating.
pub async fn similar_movies(
    state: &AppState,
    movie_id: RawId,
    alpha: Option<f64>,
    top_n: Option<usize>,
) -> AppResult<SimilarMoviesResponse> {
    let config = &state.config;
    let alpha = alpha.unwrap_or(config.default_alpha);
    let top_n = resolve_top_n(top_n.unwrap_or(config.default_top_n), config)?;

    let inner = state.artifacts.mapping.to_inner(movie_id)?;
    let reference = state
        .catalog
        .movie(movie_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("movie {} is not in the catalog", movie_id)))?;

    tracing::info!(movie_id, inner, alpha, top_n, "Ranking similar movies");

    let factorization = state.artifacts.factorization.clone();
    let neighborhood = state.artifacts.neighborhood.clone();
    let ranked = run_scoring(config.scoring_budget_ms, move || {
        score_and_rank(inner, &factorization, &neighborhood, alpha, top_n)
    })
    .await?;

    let recommendations = ranked
        .iter()
        .enumerate()
        .map(|(idx, scored)| {
            let movie = lookup_inner(state, scored)?;
            Ok(
                Recommendation::new(idx + 1, &movie, scored.score, &config.placeholder_image_url)
                    .with_predicted_rating(display_rating(scored.score)),
            )
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(SimilarMoviesResponse {
        reference,
        alpha,
        top_n,
        recommendations,
    })
}

/// Recommends unseen movies to a user from the two point predictors
///
/// Users with fewer than `min_ratings` ratings are turned away before any
/// prediction runs.
pub async fn user_recommendations(
    state: &AppState,
    user_id: u32,
    top_n: Option<usize>,
) -> AppResult<UserRecommendationsResponse> {
    let config = &state.config;
    let top_n = resolve_top_n(top_n.unwrap_or(config.default_user_top_n), config)?;
    let summary = user_summary(state, user_id)?;

    if !summary.eligible {
        return Err(AppError::InsufficientRatings {
            user_id,
            count: summary.rated_movies,
            required: summary.min_ratings,
        });
    }

    let svd = state.svd.clone().ok_or_else(|| {
        AppError::Unavailable("factorization model is not loaded".to_string())
    })?;
    let knn = state.knn.clone();
    let weights = HybridWeights::new(config.svd_weight, config.knn_weight)?;
    let policy = config.prediction_failure_policy;
    let candidates = state.catalog.unseen_movies(user_id);

    tracing::info!(
        user_id,
        candidates = candidates.len(),
        top_n,
        ?policy,
        "Ranking movies for user"
    );

    let ranking = run_scoring(config.scoring_budget_ms, move || {
        score_and_rank_for_user(
            user_id,
            &candidates,
            svd.as_ref(),
            knn.as_ref(),
            weights,
            top_n,
            policy,
        )
    })
    .await?;

    if ranking.skipped > 0 {
        tracing::warn!(
            user_id,
            skipped = ranking.skipped,
            "Some candidates were dropped after failed predictions"
        );
    }

    let recommendations = ranking
        .items
        .iter()
        .filter_map(|scored| {
            state
                .catalog
                .movie(scored.item)
                .map(|movie| (movie, scored.score))
        })
        .enumerate()
        .map(|(idx, (movie, score))| {
            Recommendation::new(idx + 1, movie, score, &config.placeholder_image_url)
                .with_score_label()
        })
        .collect();

    Ok(UserRecommendationsResponse {
        user_id,
        top_n,
        svd_weight: weights.svd_weight,
        knn_weight: weights.knn_weight,
        skipped_candidates: ranking.skipped,
        recommendations,
    })
}

/// Login check: whether the user exists and may receive recommendations
pub fn user_summary(state: &AppState, user_id: u32) -> AppResult<UserSummary> {
    if !state.catalog.has_user(user_id) {
        return Err(AppError::NotFound(format!("user {} not found", user_id)));
    }

    let rated_movies = state.catalog.user_ratings(user_id).len();
    let min_ratings = state.config.min_ratings;

    Ok(UserSummary {
        user_id,
        rated_movies,
        min_ratings,
        eligible: rated_movies >= min_ratings,
    })
}

/// Catalog search backing the title picker
pub fn search_movies(state: &AppState, query: &str, limit: Option<usize>) -> Vec<Movie> {
    let limit = limit.unwrap_or(MAX_SEARCH_RESULTS).min(MAX_SEARCH_RESULTS);
    state
        .catalog
        .search(query, limit)
        .into_iter()
        .cloned()
        .collect()
}

/// Checks the caller-side bounds `[1, max_top_n]`
fn resolve_top_n(top_n: usize, config: &Config) -> AppResult<usize> {
    if top_n == 0 || top_n > config.max_top_n {
        return Err(AppError::InvalidArgument(format!(
            "top_n must lie in [1, {}], got {}",
            config.max_top_n, top_n
        )));
    }
    Ok(top_n)
}

/// Catalog entry of a ranked inner id
///
/// A mapped movie without a catalog row is still returned, as a bare
/// stand-in, so ranks and result length stay intact.
fn lookup_inner<'a>(
    state: &'a AppState,
    scored: &ScoredItem<InnerId>,
) -> AppResult<Cow<'a, Movie>> {
    let raw = state.artifacts.mapping.to_raw(scored.item).ok_or_else(|| {
        AppError::Internal(format!("ranked inner id {} is not mapped", scored.item))
    })?;
    match state.catalog.movie(raw) {
        Some(movie) => Ok(Cow::Borrowed(movie)),
        None => {
            tracing::warn!(movie_id = raw, "Ranked movie missing from catalog");
            Ok(Cow::Owned(Movie::unlisted(raw)))
        }
    }
}

/// Runs a scoring job, on the blocking pool under a deadline when a budget
/// is configured
async fn run_scoring<T, F>(budget_ms: Option<u64>, job: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let Some(ms) = budget_ms else {
        return job();
    };

    let task = tokio::task::spawn_blocking(job);
    match tokio::time::timeout(Duration::from_millis(ms), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Scoring task join error");
            Err(AppError::Internal(e.to_string()))
        }
        Err(_) => {
            tracing::warn!(budget_ms = ms, "Scoring exceeded its budget");
            Err(AppError::Timeout(ms))
        }
    }
}
