use std::path::Path;

use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::Array2;
use ndarray_npy::{read_npy, ReadNpyError, ReadableElement};

use crate::handlers::kmeans::{ClusteringEngine, ClusteringSettings};

const CONVERGENCE_TOLERANCE: f64 = 1e-4;

/// Reads a two-dimensional observations × features array.
///
/// `float32` and integer arrays are widened to `f64`.
pub fn load_observations(path: &Path) -> Result<Array2<f64>, String> {
    let describe = |error: ReadNpyError| format!("failed to read '{}': {error}", path.display());

    match read_npy::<_, Array2<f64>>(path) {
        Err(ReadNpyError::WrongDescriptor(descriptor)) => widen_observations(path)
            .ok_or_else(|| {
                format!(
                    "failed to read '{}': unsupported element type {descriptor}",
                    path.display()
                )
            })?
            .map_err(describe),
        other => other.map_err(describe),
    }
}

/// Retries the narrower element types; `None` when none of them matches.
fn widen_observations(path: &Path) -> Option<Result<Array2<f64>, ReadNpyError>> {
    fn attempt<T: ReadableElement + Copy>(
        path: &Path,
        widen: fn(T) -> f64,
    ) -> Option<Result<Array2<f64>, ReadNpyError>> {
        match read_npy::<_, Array2<T>>(path) {
            Err(ReadNpyError::WrongDescriptor(_)) => None,
            result => Some(result.map(|observations| observations.mapv(widen))),
        }
    }

    attempt::<f32>(path, f64::from)
        .or_else(|| attempt::<i64>(path, |value| value as f64))
        .or_else(|| attempt::<i32>(path, f64::from))
        .or_else(|| attempt::<u64>(path, |value| value as f64))
        .or_else(|| attempt::<u32>(path, f64::from))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinfaKMeansEngine;

impl ClusteringEngine for LinfaKMeansEngine {
    type Model = KMeans<f64, L2Dist>;

    fn fit(
        &self,
        observations: Array2<f64>,
        settings: &ClusteringSettings,
    ) -> Result<Self::Model, String> {
        let (n_samples, n_features) = observations.dim();
        if n_features == 0 {
            return Err("observations must have at least one feature column".to_string());
        }
        if n_samples < settings.n_clusters {
            return Err(format!(
                "n_samples={n_samples} should be >= n_clusters={}",
                settings.n_clusters
            ));
        }

        let dataset = DatasetBase::from(observations);
        KMeans::<f64, L2Dist>::params(settings.n_clusters)
            .n_runs(1)
            .max_n_iterations(settings.max_iterations)
            .tolerance(CONVERGENCE_TOLERANCE)
            .fit(&dataset)
            .map_err(|error| format!("k-means fit failed: {error}"))
    }
}
