use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{Movie, RawId, SimilarMoviesResponse, UserRecommendationsResponse, UserSummary},
    services::recommendations,
};

use super::AppState;

// Request types

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub alpha: Option<f64>,
    pub top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TopNQuery {
    pub top_n: Option<usize>,
}

// Handlers

/// Health check endpoint, with the size of what was loaded at startup
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "items": state.artifacts.mapping.len(),
            "movies": state.catalog.movie_count(),
            "factorization_model": state.svd.is_some(),
        })),
    )
}

/// Search the catalog by title
pub async fn search_movies(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Json<Vec<Movie>> {
    Json(recommendations::search_movies(&state, &params.q, params.limit))
}

/// Get a single catalog entry
pub async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<RawId>,
) -> AppResult<Json<Movie>> {
    state
        .catalog
        .movie(movie_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("movie {} not found", movie_id)))
}

/// Movies similar to the given one
pub async fn similar_movies(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(movie_id): Path<RawId>,
    Query(params): Query<SimilarQuery>,
) -> AppResult<Json<SimilarMoviesResponse>> {
    tracing::info!(
        request_id = %request_id,
        movie_id,
        alpha = ?params.alpha,
        top_n = ?params.top_n,
        "Processing similarity request"
    );

    let response =
        recommendations::similar_movies(&state, movie_id, params.alpha, params.top_n).await?;

    tracing::info!(
        request_id = %request_id,
        returned = response.recommendations.len(),
        "Similarity request completed"
    );

    Ok(Json(response))
}

/// Login check for a user id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<u32>,
) -> AppResult<Json<UserSummary>> {
    Ok(Json(recommendations::user_summary(&state, user_id)?))
}

/// Personal recommendations for a user
pub async fn user_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<u32>,
    Query(params): Query<TopNQuery>,
) -> AppResult<Json<UserRecommendationsResponse>> {
    tracing::info!(
        request_id = %request_id,
        user_id,
        top_n = ?params.top_n,
        "Processing user recommendation request"
    );

    let response =
        recommendations::user_recommendations(&state, user_id, params.top_n).await?;

    tracing::info!(
        request_id = %request_id,
        returned = response.recommendations.len(),
        skipped = response.skipped_candidates,
        "User recommendation request completed"
    );

    Ok(Json(response))
}
