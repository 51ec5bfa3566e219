use std::path::Path;
use std::time::Instant;

use serde_json::json;

use crate::adapters::dataframe::{reset_row_index, write_csv, DataFusionJoinEngine, JoinedTable};
use crate::adapters::object_store::BlobStore;
use crate::handlers::outcome::{
    describe_artifact, finish_invocation, HandlerError, InvocationOutcome, UploadedArtifact,
};
use crate::handlers::scratch::ScratchWorkspace;
use crate::handlers::telemetry::log_handler_info;
use crate::runtime::config::BenchConfig;
use crate::runtime::contract::{FunctionKind, InvocationRequest};
use crate::runtime::policy::{PartitionSize, JOIN_BLOCKSIZE, JOIN_KEY};
use crate::runtime::storage_keys::{blob_key, BlobRole};

const FUNCTION: FunctionKind = FunctionKind::Join;

#[derive(Debug, Clone, Copy)]
pub struct JoinInputs<'a> {
    pub left: &'a Path,
    pub right: &'a Path,
    pub key: &'a str,
    /// Splitting hint for the engine; never changes which rows match.
    pub partition_size: PartitionSize,
}

/// Delegated inner equality join, fully materialized.
pub trait JoinEngine {
    fn inner_join(&self, inputs: &JoinInputs<'_>) -> Result<JoinedTable, String>;
}

pub fn handle_join_request(
    request: &InvocationRequest,
    config: &BenchConfig,
    engine: &impl JoinEngine,
    store: &impl BlobStore,
) -> InvocationOutcome {
    let started_at = Instant::now();
    log_handler_info(
        FUNCTION.component(),
        "invocation_started",
        json!({ "size": request.size.clone() }),
    );

    let result = join_and_upload(request, config, engine, store);
    finish_invocation(
        FUNCTION.component(),
        &request.size,
        result,
        started_at.elapsed().as_millis(),
    )
}

pub fn handle_join_request_with_datafusion(
    request: &InvocationRequest,
    config: &BenchConfig,
    store: &impl BlobStore,
) -> InvocationOutcome {
    handle_join_request(request, config, &DataFusionJoinEngine, store)
}

fn join_and_upload(
    request: &InvocationRequest,
    config: &BenchConfig,
    engine: &impl JoinEngine,
    store: &impl BlobStore,
) -> Result<UploadedArtifact, HandlerError> {
    let (size, blocksize) = JOIN_BLOCKSIZE.resolve(&request.size)?;
    let partition_size = PartitionSize::parse(blocksize)?;

    let workspace = ScratchWorkspace::acquire(&config.bench_home, FUNCTION, size)
        .map_err(|error| HandlerError::io(&config.bench_home, error))?;

    let left_path = workspace.file_for(BlobRole::LeftTable);
    let right_path = workspace.file_for(BlobRole::RightTable);
    store.download(&blob_key(FUNCTION, size, BlobRole::LeftTable), &left_path)?;
    store.download(&blob_key(FUNCTION, size, BlobRole::RightTable), &right_path)?;
    log_handler_info(
        FUNCTION.component(),
        "inputs_downloaded",
        json!({
            "size": size,
            "project": config.project_id.clone(),
            "bucket": config.bucket.clone(),
            "blocksize": blocksize,
            "partition_bytes": partition_size.bytes(),
        }),
    );

    let joined = engine
        .inner_join(&JoinInputs {
            left: &left_path,
            right: &right_path,
            key: JOIN_KEY,
            partition_size,
        })
        .map_err(HandlerError::Computation)?;
    let indexed = reset_row_index(joined).map_err(HandlerError::Computation)?;
    log_handler_info(
        FUNCTION.component(),
        "computation_completed",
        json!({
            "size": size,
            "rows": indexed.num_rows(),
            "columns": indexed.column_names(),
        }),
    );

    let output_path = workspace.file_for(BlobRole::JoinResult);
    write_csv(&indexed, &output_path).map_err(HandlerError::Serialization)?;

    let artifact =
        describe_artifact(&output_path, blob_key(FUNCTION, size, BlobRole::JoinResult))?;
    store.upload(&output_path, &artifact.artifact_key)?;
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
