use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{IdMapping, InnerId, RawId, ScoreMatrix},
    services::predictor::{FactorizationModel, NeighborhoodParams},
};

pub const ID_MAPPINGS_FILE: &str = "id_mappings.json";
pub const SVD_MATRIX_FILE: &str = "svd_matrix.json";
pub const KNN_MATRIX_FILE: &str = "knn_matrix.json";
pub const SVD_MODEL_FILE: &str = "svd_model.json";
pub const KNN_MODEL_FILE: &str = "knn_model.json";

/// On-disk shape of `id_mappings.json`
#[derive(Debug, Deserialize)]
struct IdMappingsFile {
    inner_to_raw: Vec<RawId>,
    #[serde(default)]
    raw_to_inner: Option<HashMap<RawId, InnerId>>,
}

/// Pretrained artifacts, loaded once at startup and never mutated
///
/// Handles are shared with `Arc` so request handlers and predictors can hold
/// them without copying the matrices.
pub struct Artifacts {
    pub mapping: Arc<IdMapping>,
    pub factorization: Arc<ScoreMatrix>,
    pub neighborhood: Arc<ScoreMatrix>,
    /// Absent when only item similarity is served
    pub svd_model: Option<Arc<FactorizationModel>>,
    pub knn_params: NeighborhoodParams,
}

impl Artifacts {
    /// Loads every artifact from `dir`
    ///
    /// The mapping and both matrices are required. The predictor files are
    /// optional; without `svd_model.json` personal recommendations are off.
    pub fn load(dir: &Path) -> AppResult<Self> {
        tracing::info!(dir = %dir.display(), "Loading pretrained artifacts");

        let mappings: IdMappingsFile = read_json(&dir.join(ID_MAPPINGS_FILE))?;
        let mapping = match mappings.raw_to_inner {
            Some(raw_to_inner) => IdMapping::from_pairs(mappings.inner_to_raw, raw_to_inner),
            None => IdMapping::new(mappings.inner_to_raw),
        }
        .map_err(|e| AppError::Artifact(format!("{}: {}", ID_MAPPINGS_FILE, e)))?;

        let factorization = load_matrix(&dir.join(SVD_MATRIX_FILE))?;
        let neighborhood = load_matrix(&dir.join(KNN_MATRIX_FILE))?;

        let svd_model = match read_optional_json::<FactorizationModel>(&dir.join(SVD_MODEL_FILE))? {
            Some(model) => {
                model.validate()?;
                tracing::info!(
                    users = model.users.len(),
                    items = model.items.len(),
                    "Loaded factorization model"
                );
                Some(Arc::new(model))
            }
            None => {
                tracing::warn!(
                    file = SVD_MODEL_FILE,
                    "Factorization model not found, personal recommendations disabled"
                );
                None
            }
        };

        let knn_params = read_optional_json::<NeighborhoodParams>(&dir.join(KNN_MODEL_FILE))?
            .unwrap_or_default();

        let artifacts = Self::from_parts(mapping, factorization, neighborhood)?;

        tracing::info!(
            items = artifacts.mapping.len(),
            knn_k = knn_params.k,
            "Artifacts loaded"
        );

        Ok(Self {
            svd_model,
            knn_params,
            ..artifacts
        })
    }

    /// Assembles artifacts already in memory, checking that the matrices and
    /// the mapping agree on `N`
    pub fn from_parts(
        mapping: IdMapping,
        factorization: ScoreMatrix,
        neighborhood: ScoreMatrix,
    ) -> AppResult<Self> {
        if factorization.dim() != neighborhood.dim() {
            return Err(AppError::Artifact(format!(
                "matrix dimensions differ: factorization {} vs neighborhood {}",
                factorization.dim(),
                neighborhood.dim()
            )));
        }
        if factorization.dim() != mapping.len() {
            return Err(AppError::Artifact(format!(
                "matrices cover {} items but the id mapping has {}",
                factorization.dim(),
                mapping.len()
            )));
        }

        Ok(Self {
            mapping: Arc::new(mapping),
            factorization: Arc::new(factorization),
            neighborhood: Arc::new(neighborhood),
            svd_model: None,
            knn_params: NeighborhoodParams::default(),
        })
    }

    pub fn with_svd_model(mut self, model: FactorizationModel) -> AppResult<Self> {
        model.validate()?;
        self.svd_model = Some(Arc::new(model));
        Ok(self)
    }
}

fn load_matrix(path: &Path) -> AppResult<ScoreMatrix> {
    let rows: Vec<Vec<f64>> = read_json(path)?;
    let matrix = ScoreMatrix::from_rows(rows)
        .map_err(|e| AppError::Artifact(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), dim = matrix.dim(), "Loaded score matrix");
    Ok(matrix)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::Artifact(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::Artifact(format!("failed to parse {}: {}", path.display(), e)))
}

fn read_optional_json<T: DeserializeOwned>(path: &Path) -> AppResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}
