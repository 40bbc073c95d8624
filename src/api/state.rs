use std::sync::Arc;

use crate::{
    config::Config,
    data::{Artifacts, Catalog},
    error::AppResult,
    services::predictor::{NeighborhoodModel, Predictor},
};

/// Shared application state
///
/// Everything here is built once at startup and only read afterwards, so
/// handlers share it without locking.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub artifacts: Arc<Artifacts>,
    pub catalog: Arc<Catalog>,
    /// Factorization predictor, absent when no SVD model was shipped
    pub svd: Option<Arc<dyn Predictor>>,
    pub knn: Arc<dyn Predictor>,
}

impl AppState {
    /// Wires the predictors from the loaded artifacts and catalog ratings
    pub fn new(config: Config, artifacts: Artifacts, catalog: Catalog) -> AppResult<Self> {
        let knn = NeighborhoodModel::new(
            artifacts.knn_params,
            artifacts.neighborhood.clone(),
            artifacts.mapping.clone(),
            catalog.all_ratings(),
        )?;
        let svd = artifacts
            .svd_model
            .clone()
            .map(|model| model as Arc<dyn Predictor>);

        Ok(Self::with_predictors(
            config,
            artifacts,
            catalog,
            svd,
            Arc::new(knn),
        ))
    }

    /// Builds the state around caller-supplied predictors
    pub fn with_predictors(
        config: Config,
        artifacts: Artifacts,
        catalog: Catalog,
        svd: Option<Arc<dyn Predictor>>,
        knn: Arc<dyn Predictor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            artifacts: Arc::new(artifacts),
            catalog: Arc::new(catalog),
            svd,
            knn,
        }
    }
}
