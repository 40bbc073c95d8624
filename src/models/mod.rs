mod item;
mod movie;
mod recommendation;

pub use item::{BlendWeight, HybridWeights, IdMapping, InnerId, RawId, ScoreMatrix};
pub use movie::{ImageRecord, Movie, MovieRecord, Rating, RatingRecord};
pub use recommendation::{
    CandidateOutcome, ItemRanking, PredictionFailurePolicy, Recommendation, ScoredItem,
    SimilarMoviesResponse, UserRanking, UserRecommendationsResponse, UserSummary,
};
