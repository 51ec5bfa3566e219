use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::adapters::object_store::TransferError;
use crate::handlers::telemetry::{log_handler_error, log_handler_info};
use crate::runtime::contract::{artifact_digest, ValidationError};

pub const STATUS_SUCCESS: i32 = 0;
pub const STATUS_FAILURE: i32 = 1;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("lookup failed: {0}")]
    Lookup(#[from] ValidationError),
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),
    #[error("computation failed: {0}")]
    Computation(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("io failed at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HandlerError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Lookup(_) => FailureReason::Lookup,
            Self::Transfer(_) => FailureReason::Transfer,
            Self::Computation(_) => FailureReason::Computation,
            Self::Serialization(_) => FailureReason::Serialization,
            Self::Io { .. } => FailureReason::Io,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Lookup,
    Transfer,
    Computation,
    Serialization,
    Io,
}

/// Result artifact of a successful invocation, as uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedArtifact {
    pub artifact_key: String,
    pub artifact_bytes: u64,
    pub artifact_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Succeeded(UploadedArtifact),
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl InvocationOutcome {
    /// External contract: 0 on success, 1 for any failure kind.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Succeeded(_) => STATUS_SUCCESS,
            Self::Failed { .. } => STATUS_FAILURE,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

pub fn describe_artifact(
    local_path: &Path,
    artifact_key: String,
) -> Result<UploadedArtifact, HandlerError> {
    let file =
        std::fs::File::open(local_path).map_err(|error| HandlerError::io(local_path, error))?;
    let artifact_bytes = file
        .metadata()
        .map_err(|error| HandlerError::io(local_path, error))?
        .len();
    let artifact_sha256 =
        artifact_digest(file).map_err(|error| HandlerError::io(local_path, error))?;

    Ok(UploadedArtifact {
        artifact_key,
        artifact_bytes,
        artifact_sha256,
    })
}

/// Converts the handler result into the caller-facing outcome and logs it.
pub fn finish_invocation(
    component: &str,
    size: &str,
    result: Result<UploadedArtifact, HandlerError>,
    duration_ms: u128,
) -> InvocationOutcome {
    match result {
        Ok(artifact) => {
            log_handler_info(
                component,
                "invocation_completed",
                json!({
                    "size": size,
                    "duration_ms": duration_ms,
                    "artifact_key": artifact.artifact_key.clone(),
                    "artifact_bytes": artifact.artifact_bytes,
                    "artifact_sha256": artifact.artifact_sha256.clone(),
                    "status": STATUS_SUCCESS,
                }),
            );
            InvocationOutcome::Succeeded(artifact)
        }
        Err(error) => {
            let reason = error.reason();
            let message = error.to_string();
            log_handler_error(
                component,
                "invocation_failed",
                json!({
                    "size": size,
                    "duration_ms": duration_ms,
                    "reason": reason,
                    "error": message.clone(),
                    "status": STATUS_FAILURE,
                }),
            );
            InvocationOutcome::Failed { reason, message }
        }
    }
}
