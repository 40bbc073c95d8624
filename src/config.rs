use serde::Deserialize;
use std::path::PathBuf;

use crate::models::PredictionFailurePolicy;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the pretrained matrices, id mappings and models
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Movie metadata (movieId,title,genres)
    #[serde(default = "default_movies_csv")]
    pub movies_csv: PathBuf,

    /// Poster links (movieId,img_link), joined onto the catalog when present
    #[serde(default)]
    pub images_csv: Option<PathBuf>,

    /// User ratings (userId,movieId,rating,timestamp)
    #[serde(default = "default_ratings_csv")]
    pub ratings_csv: PathBuf,

    /// Blend weight used when a similarity request does not supply one
    #[serde(default = "default_alpha")]
    pub default_alpha: f64,

    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// Result count of personal recommendations when the request has none
    #[serde(default = "default_user_top_n")]
    pub default_user_top_n: usize,

    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,

    /// Weight of the factorization predictor in user recommendations
    #[serde(default = "default_svd_weight")]
    pub svd_weight: f64,

    /// Weight of the neighborhood predictor in user recommendations
    #[serde(default = "default_knn_weight")]
    pub knn_weight: f64,

    /// Ratings a user needs before personal recommendations are offered
    #[serde(default = "default_min_ratings")]
    pub min_ratings: usize,

    #[serde(default)]
    pub prediction_failure_policy: PredictionFailurePolicy,

    /// Wall-clock budget for a single scoring call, unlimited when unset
    #[serde(default)]
    pub scoring_budget_ms: Option<u64>,

    #[serde(default = "default_placeholder_image_url")]
    pub placeholder_image_url: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_movies_csv() -> PathBuf {
    PathBuf::from("data/movies.csv")
}

fn default_ratings_csv() -> PathBuf {
    PathBuf::from("data/ratings.csv")
}

fn default_alpha() -> f64 {
    0.9
}

fn default_top_n() -> usize {
    10
}

fn default_user_top_n() -> usize {
    5
}

fn default_max_top_n() -> usize {
    20
}

fn default_svd_weight() -> f64 {
    0.7
}

fn default_knn_weight() -> f64 {
    0.3
}

fn default_min_ratings() -> usize {
    5
}

fn default_placeholder_image_url() -> String {
    "https://via.placeholder.com/150?text=No+Image".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            artifacts_dir: default_artifacts_dir(),
            movies_csv: default_movies_csv(),
            images_csv: None,
            ratings_csv: default_ratings_csv(),
            default_alpha: default_alpha(),
            default_top_n: default_top_n(),
            default_user_top_n: default_user_top_n(),
            max_top_n: default_max_top_n(),
            svd_weight: default_svd_weight(),
            knn_weight: default_knn_weight(),
            min_ratings: default_min_ratings(),
            prediction_failure_policy: PredictionFailurePolicy::default(),
            scoring_budget_ms: None,
            placeholder_image_url: default_placeholder_image_url(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the recommenders cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.default_alpha) {
            anyhow::bail!(
                "DEFAULT_ALPHA must lie in [0, 1], got {}",
                self.default_alpha
            );
        }
        if self.max_top_n == 0 {
            anyhow::bail!("MAX_TOP_N must be positive");
        }
        if self.default_top_n == 0 || self.default_top_n > self.max_top_n {
            anyhow::bail!(
                "DEFAULT_TOP_N must lie in [1, {}], got {}",
                self.max_top_n,
                self.default_top_n
            );
        }
        if self.default_user_top_n == 0 || self.default_user_top_n > self.max_top_n {
            anyhow::bail!(
                "DEFAULT_USER_TOP_N must lie in [1, {}], got {}",
                self.max_top_n,
                self.default_user_top_n
            );
        }
        if !self.svd_weight.is_finite() || !self.knn_weight.is_finite() {
            anyhow::bail!("SVD_WEIGHT and KNN_WEIGHT must be finite");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_alpha, 0.9);
        assert_eq!(config.default_top_n, 10);
        assert_eq!(config.default_user_top_n, 5);
        assert_eq!(config.max_top_n, 20);
        assert_eq!(config.min_ratings, 5);
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_rejects_alpha_out_of_range() {
        let config = Config {
            default_alpha: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_default_top_n_above_max() {
        let config = Config {
            default_top_n: 30,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_default_user_top_n() {
        let config = Config {
            default_user_top_n: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weights_need_not_sum_to_one() {
        let config = Config {
            svd_weight: 1.0,
            knn_weight: 1.0,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_pairs() {
        let vars = vec![
            ("PORT".to_string(), "8080".to_string()),
            ("DEFAULT_ALPHA".to_string(), "0.5".to_string()),
            ("PREDICTION_FAILURE_POLICY".to_string(), "abort".to_string()),
            ("SCORING_BUDGET_MS".to_string(), "250".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_alpha, 0.5);
        assert_eq!(
            config.prediction_failure_policy,
            PredictionFailurePolicy::Abort
        );
        assert_eq!(config.scoring_budget_ms, Some(250));
        assert_eq!(config.svd_weight, 0.7);
    }
}
