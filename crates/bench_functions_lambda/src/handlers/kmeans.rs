use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use ndarray::Array2;
use serde::Serialize;
use serde_json::json;

use crate::adapters::clustering::{load_observations, LinfaKMeansEngine};
use crate::adapters::object_store::BlobStore;
use crate::handlers::outcome::{
    describe_artifact, finish_invocation, HandlerError, InvocationOutcome, UploadedArtifact,
};
use crate::handlers::scratch::ScratchWorkspace;
use crate::handlers::telemetry::log_handler_info;
use crate::runtime::config::BenchConfig;
use crate::runtime::contract::{FunctionKind, InvocationRequest};
use crate::runtime::policy::{KMEANS_CENTERS, KMEANS_MAX_ITERATIONS};
use crate::runtime::storage_keys::{blob_key, BlobRole};

const FUNCTION: FunctionKind = FunctionKind::Kmeans;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusteringSettings {
    pub n_clusters: usize,
    pub max_iterations: u64,
}

/// Delegated clustering fit. The returned model is persisted as-is.
pub trait ClusteringEngine {
    type Model: Serialize;

    fn fit(
        &self,
        observations: Array2<f64>,
        settings: &ClusteringSettings,
    ) -> Result<Self::Model, String>;
}

pub fn handle_kmeans_request(
    request: &InvocationRequest,
    config: &BenchConfig,
    engine: &impl ClusteringEngine,
    store: &impl BlobStore,
) -> InvocationOutcome {
    let started_at = Instant::now();
    log_handler_info(
        FUNCTION.component(),
        "invocation_started",
        json!({ "size": request.size.clone() }),
    );

    let result = train_and_upload(request, config, engine, store);
    finish_invocation(
        FUNCTION.component(),
        &request.size,
        result,
        started_at.elapsed().as_millis(),
    )
}

pub fn handle_kmeans_request_with_linfa(
    request: &InvocationRequest,
    config: &BenchConfig,
    store: &impl BlobStore,
) -> InvocationOutcome {
    handle_kmeans_request(request, config, &LinfaKMeansEngine, store)
}

fn train_and_upload(
    request: &InvocationRequest,
    config: &BenchConfig,
    engine: &impl ClusteringEngine,
    store: &impl BlobStore,
) -> Result<UploadedArtifact, HandlerError> {
    let (size, n_clusters) = KMEANS_CENTERS.resolve(&request.size)?;
    let settings = ClusteringSettings {
        n_clusters: *n_clusters,
        max_iterations: KMEANS_MAX_ITERATIONS,
    };

    let workspace = ScratchWorkspace::acquire(&config.bench_home, FUNCTION, size)
        .map_err(|error| HandlerError::io(&config.bench_home, error))?;

    let observations_path = workspace.file_for(BlobRole::Observations);
    store.download(
        &blob_key(FUNCTION, size, BlobRole::Observations),
        &observations_path,
    )?;
    let observations =
        load_observations(&observations_path).map_err(HandlerError::Serialization)?;
    log_handler_info(
        FUNCTION.component(),
        "inputs_downloaded",
        json!({
            "size": size,
            "project": config.project_id.clone(),
            "bucket": config.bucket.clone(),
            "observations": observations.nrows(),
            "features": observations.ncols(),
        }),
    );

    let model = engine
        .fit(observations, &settings)
        .map_err(HandlerError::Computation)?;
    log_handler_info(
        FUNCTION.component(),
        "computation_completed",
        json!({ "size": size, "settings": settings }),
    );

    let model_path = workspace.file_for(BlobRole::Model);
    persist_model(&model, &model_path)?;

    let artifact = describe_artifact(&model_path, blob_key(FUNCTION, size, BlobRole::Model))?;
    store.upload(&model_path, &artifact.artifact_key)?;
    log_handler_info(
        FUNCTION.component(),
        "artifact_uploaded",
        json!({ "size": size, "artifact_key": artifact.artifact_key.clone() }),
    );

    workspace
        .close()
        .map_err(|error| HandlerError::io(&config.bench_home, error))?;
    Ok(artifact)
}

fn persist_model(model: &impl Serialize, path: &Path) -> Result<(), HandlerError> {
    let file = File::create(path).map_err(|error| HandlerError::io(path, error))?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, model)
        .map_err(|error| HandlerError::Serialization(format!("failed to encode model: {error}")))?;
    writer.flush().map_err(|error| HandlerError::io(path, error))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use linfa_clustering::KMeans;
    use linfa_nn::distance::L2Dist;
    use ndarray_npy::WriteNpyExt;
    use tempfile::TempDir;

    use super::*;
    use crate::handlers::outcome::{FailureReason, STATUS_FAILURE, STATUS_SUCCESS};
    use crate::handlers::test_support::{assert_no_scratch_left, sample_config, MemoryStore};
    use crate::runtime::contract::SizeLabel;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct CapturedFit {
        settings: ClusteringSettings,
        shape: (usize, usize),
    }

    struct RecordingEngine {
        fits: Mutex<Vec<CapturedFit>>,
    }

    impl RecordingEngine {
        fn new() -> Self {
            Self {
                fits: Mutex::new(Vec::new()),
            }
        }

        fn fits(&self) -> Vec<CapturedFit> {
            self.fits.lock().expect("poisoned mutex").clone()
        }
    }

    impl ClusteringEngine for RecordingEngine {
        type Model = CapturedFit;

        fn fit(
            &self,
            observations: Array2<f64>,
            settings: &ClusteringSettings,
        ) -> Result<Self::Model, String> {
            let captured = CapturedFit {
                settings: *settings,
                shape: observations.dim(),
            };
            self.fits
                .lock()
                .expect("poisoned mutex")
                .push(captured.clone());
            Ok(captured)
        }
    }

    struct FailingEngine;

    impl ClusteringEngine for FailingEngine {
        type Model = ();

        fn fit(
            &self,
            _observations: Array2<f64>,
            _settings: &ClusteringSettings,
        ) -> Result<Self::Model, String> {
            Err("injected fit failure".to_string())
        }
    }

    fn observations() -> Array2<f64> {
        Array2::from_shape_fn((100, 4), |(row, column)| {
            (row % 10) as f64 * 10.0 + ((row * 7 + column * 3) % 5) as f64 * 0.1
        })
    }

    fn npy_bytes(array: &Array2<f64>) -> Vec<u8> {
        let mut bytes = Vec::new();
        array.write_npy(&mut bytes).expect("fixture should encode");
        bytes
    }

    fn seeded_store(size: SizeLabel) -> MemoryStore {
        let store = MemoryStore::new();
        store.seed_object(
            &blob_key(FunctionKind::Kmeans, size, BlobRole::Observations),
            &npy_bytes(&observations()),
        );
        store
    }

    #[test]
    fn small_request_trains_ten_centers_and_uploads_model() {
        let home = TempDir::new().expect("bench home");
        let config = sample_config(home.path());
        let store = seeded_store(SizeLabel::Small);

        let outcome =
            handle_kmeans_request_with_linfa(&InvocationRequest::new("small"), &config, &store);

        assert_eq!(outcome.status_code(), STATUS_SUCCESS);
        assert_eq!(
            store.uploaded_keys(),
            vec!["Func18_kmeans/small_kmeans_model.pkl".to_string()]
        );

        let body = store
            .body("Func18_kmeans/small_kmeans_model.pkl")
            .expect("model should be uploaded");
        let model: KMeans<f64, L2Dist> =
            bincode::deserialize(&body).expect("model should decode");
        assert_eq!(model.centroids().dim(), (10, 4));
        assert_no_scratch_left(home.path());
    }

    #[test]
    fn every_size_uses_its_table_entry_and_iteration_cap() {
        for size in SizeLabel::ALL {
            let home = TempDir::new().expect("bench home");
            let config = sample_config(home.path());
            let store = seeded_store(size);
            let engine = RecordingEngine::new();

            let outcome = handle_kmeans_request(
                &InvocationRequest::new(size.as_str()),
                &config,
                &engine,
                &store,
            );

            assert_eq!(outcome.status_code(), STATUS_SUCCESS);
            assert_eq!(
                engine.fits(),
                vec![CapturedFit {
                    settings: ClusteringSettings {
                        n_clusters: *KMEANS_CENTERS.get(size),
                        max_iterations: 50,
                    },
                    shape: (100, 4),
                }]
            );
        }
    }

    #[test]
    fn unknown_size_fails_without_touching_storage() {
        let home = TempDir::new().expect("bench home");
        let config = sample_config(home.path());
        let store = seeded_store(SizeLabel::Small);
        let engine = RecordingEngine::new();

        let outcome =
            handle_kmeans_request(&InvocationRequest::new("huge"), &config, &engine, &store);

        assert_eq!(outcome.status_code(), STATUS_FAILURE);
        assert!(matches!(
            outcome,
            InvocationOutcome::Failed {
                reason: FailureReason::Lookup,
                ..
            }
        ));
        assert_eq!(store.call_count(), 0);
        assert!(engine.fits().is_empty());
        assert_no_scratch_left(home.path());
    }

    #[test]
    fn download_failure_returns_one_and_removes_scratch() {
        let home = TempDir::new().expect("bench home");
        let config = sample_config(home.path());
        let store = seeded_store(SizeLabel::Small).failing_downloads();

        let outcome = handle_kmeans_request(
            &InvocationRequest::new("small"),
            &config,
            &RecordingEngine::new(),
            &store,
        );

        assert_eq!(outcome.status_code(), STATUS_FAILURE);
        assert!(store.uploaded_keys().is_empty());
        assert_no_scratch_left(home.path());
    }

    #[test]
    fn missing_input_object_is_a_transfer_failure() {
        let home = TempDir::new().expect("bench home");
        let config = sample_config(home.path());
        let store = MemoryStore::new();

        let outcome = handle_kmeans_request(
            &InvocationRequest::new("medium"),
            &config,
            &RecordingEngine::new(),
            &store,
        );

        assert!(matches!(
            outcome,
            InvocationOutcome::Failed {
                reason: FailureReason::Transfer,
                ..
            }
        ));
        assert_no_scratch_left(home.path());
    }

    #[test]
    fn upload_failure_returns_one_and_removes_scratch() {
        let home = TempDir::new().expect("bench home");
        let config = sample_config(home.path());
        let store = seeded_store(SizeLabel::Small).failing_uploads();

        let outcome = handle_kmeans_request(
            &InvocationRequest::new("small"),
            &config,
            &RecordingEngine::new(),
            &store,
        );

        assert_eq!(outcome.status_code(), STATUS_FAILURE);
        assert_eq!(store.body("Func18_kmeans/small_kmeans_model.pkl"), None);
        assert_no_scratch_left(home.path());
    }

    #[test]
    fn fit_failure_is_a_computation_failure() {
        let home = TempDir::new().expect("bench home");
        let config = sample_config(home.path());
        let store = seeded_store(SizeLabel::Small);

        let outcome = handle_kmeans_request(
            &InvocationRequest::new("small"),
            &config,
            &FailingEngine,
            &store,
        );

        match outcome {
            InvocationOutcome::Failed { reason, message } => {
                assert_eq!(reason, FailureReason::Computation);
                assert!(message.contains("injected fit failure"));
            }
            InvocationOutcome::Succeeded(_) => panic!("fit failure should not succeed"),
        }
        assert_no_scratch_left(home.path());
    }

    #[test]
    fn corrupt_input_array_is_a_serialization_failure() {
        let home = TempDir::new().expect("bench home");
        let config = sample_config(home.path());
        let store = MemoryStore::new();
        store.seed_object("Func18_kmeans/small_x.npy", b"not an npy file");

        let outcome = handle_kmeans_request(
            &InvocationRequest::new("small"),
            &config,
            &RecordingEngine::new(),
            &store,
        );

        assert!(matches!(
            outcome,
            InvocationOutcome::Failed {
                reason: FailureReason::Serialization,
                ..
            }
        ));
        assert_no_scratch_left(home.path());
    }

    #[test]
    fn repeated_invocation_overwrites_same_model_blob() {
        let home = TempDir::new().expect("bench home");
        let config = sample_config(home.path());
        let store = seeded_store(SizeLabel::Small);
        let request = InvocationRequest::new("small");

        let first = handle_kmeans_request_with_linfa(&request, &config, &store);
        let first_body = store.body("Func18_kmeans/small_kmeans_model.pkl");
        let second = handle_kmeans_request_with_linfa(&request, &config, &store);

        assert_eq!(first.status_code(), STATUS_SUCCESS);
        assert_eq!(second.status_code(), STATUS_SUCCESS);
        assert_eq!(store.object_keys().len(), 2);
        assert_eq!(
            store.uploaded_keys(),
            vec![
                "Func18_kmeans/small_kmeans_model.pkl".to_string(),
                "Func18_kmeans/small_kmeans_model.pkl".to_string(),
            ]
        );
        assert_eq!(store.body("Func18_kmeans/small_kmeans_model.pkl"), first_body);
    }
}
