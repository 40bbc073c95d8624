use serde::{Deserialize, Serialize};

use super::{InnerId, Movie, RawId};

/// One entry of a ranked result: an item and its blended score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem<T> {
    pub item: T,
    pub score: f64,
}

impl<T> ScoredItem<T> {
    pub fn new(item: T, score: f64) -> Self {
        Self { item, score }
    }
}

/// What to do when a predictor fails for one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionFailurePolicy {
    /// Drop the candidate and keep ranking the rest
    #[default]
    Skip,
    /// Fail the whole request on the first bad candidate
    Abort,
}

/// Per-candidate result of the point-prediction variant
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Scored(ScoredItem<RawId>),
    Failed { item: RawId, reason: String },
}

/// Ranked candidates for a user plus the number dropped by failed predictions
#[derive(Debug, Clone, PartialEq)]
pub struct UserRanking {
    pub items: Vec<ScoredItem<RawId>>,
    pub skipped: usize,
}

/// A recommendation as returned to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub rank: usize,
    pub movie_id: RawId,
    pub title: String,
    pub genres: Vec<String>,
    pub image_url: String,
    pub score: f64,
    /// Score mapped onto the 1-5 star scale, item similarity only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_label: Option<String>,
}

impl Recommendation {
    pub fn new(rank: usize, movie: &Movie, score: f64, placeholder_image_url: &str) -> Self {
        Self {
            rank,
            movie_id: movie.movie_id,
            title: movie.title.clone(),
            genres: movie.genres.clone(),
            image_url: movie
                .img_link
                .clone()
                .unwrap_or_else(|| placeholder_image_url.to_string()),
            score,
            predicted_rating: None,
            rating_label: None,
        }
    }

    pub fn with_predicted_rating(mut self, rating: f64) -> Self {
        self.predicted_rating = Some(rating);
        self.rating_label = Some(format!("{:.2}/5", rating));
        self
    }

    /// Labels the raw score, for rankings that have no star mapping
    pub fn with_score_label(mut self) -> Self {
        self.rating_label = Some(format!("{:.2}", self.score));
        self
    }
}

/// Response for a "movies similar to X" query
#[derive(Debug, Serialize)]
pub struct SimilarMoviesResponse {
    pub reference: Movie,
    pub alpha: f64,
    pub top_n: usize,
    pub recommendations: Vec<Recommendation>,
}

/// Response for a personal recommendation query
#[derive(Debug, Serialize)]
pub struct UserRecommendationsResponse {
    pub user_id: u32,
    pub top_n: usize,
    pub svd_weight: f64,
    pub knn_weight: f64,
    /// Candidates dropped because a predictor failed for them
    pub skipped_candidates: usize,
    pub recommendations: Vec<Recommendation>,
}

/// Login check result for a user id
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub user_id: u32,
    pub rated_movies: usize,
    pub min_ratings: usize,
    pub eligible: bool,
}

/// Ranked inner ids, before they are mapped back to catalog entries
pub type ItemRanking = Vec<ScoredItem<InnerId>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(img_link: Option<&str>) -> Movie {
        Movie {
            movie_id: 260,
            title: "Star Wars (1977)".to_string(),
            genres: vec!["Action".to_string(), "Sci-Fi".to_string()],
            img_link: img_link.map(str::to_string),
        }
    }

    #[test]
    fn test_placeholder_image_used_when_missing() {
        let rec = Recommendation::new(1, &movie(None), 0.5, "https://placeholder");
        assert_eq!(rec.image_url, "https://placeholder");

        let rec = Recommendation::new(1, &movie(Some("https://poster")), 0.5, "https://placeholder");
        assert_eq!(rec.image_url, "https://poster");
    }

    #[test]
    fn test_rating_label_format() {
        let rec = Recommendation::new(1, &movie(None), 0.6, "-").with_predicted_rating(3.4);
        assert_eq!(rec.rating_label.as_deref(), Some("3.40/5"));
    }

    #[test]
    fn test_score_label_format() {
        let rec = Recommendation::new(1, &movie(None), 4.3456, "-").with_score_label();
        assert_eq!(rec.rating_label.as_deref(), Some("4.35"));
        assert_eq!(rec.predicted_rating, None);
    }

    #[test]
    fn test_policy_serialization() {
        assert_eq!(
            serde_json::to_string(&PredictionFailurePolicy::Skip).unwrap(),
            "\"skip\""
        );
        let policy: PredictionFailurePolicy = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(policy, PredictionFailurePolicy::Abort);
    }

    #[test]
    fn test_optional_rating_fields_omitted() {
        let rec = Recommendation::new(2, &movie(None), 4.1, "-");
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("predicted_rating").is_none());
        assert_eq!(json["rank"], 2);
    }
}
