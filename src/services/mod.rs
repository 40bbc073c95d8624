pub mod predictor;
pub mod recommendations;
pub mod scorer;

pub use predictor::{FactorizationModel, NeighborhoodModel, Predictor};
pub use scorer::{display_rating, score_and_rank, score_and_rank_for_user};
