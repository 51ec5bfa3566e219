use serde_json::{json, Value};

use crate::handlers::outcome::STATUS_FAILURE;
use crate::adapters::object_store::CloudStorageGateway;
use crate::handlers::telemetry::{log_handler_error, log_handler_info};
use crate::runtime::contract::{FunctionKind, InvocationRequest};

/// Set by the Lambda execution environment; absent when a binary runs locally.
pub const RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";

pub fn is_lambda_environment() -> bool {
    std::env::var_os(RUNTIME_API_VAR).is_some()
}

pub fn decode_request(payload: Value) -> Result<InvocationRequest, String> {
    if payload.is_null() {
        return Ok(InvocationRequest::new(""));
    }
    if !payload.is_object() {
        return Err(format!(
            "invalid invocation payload: expected a JSON object, got {payload}"
        ));
    }
    serde_json::from_value(payload).map_err(|error| format!("invalid invocation payload: {error}"))
}

pub fn log_gateway_ready(component: &str, gateway: &CloudStorageGateway) {
    log_handler_info(
        component,
        "gateway_ready",
        json!({
            "project": gateway.project_id(),
            "bucket": gateway.bucket(),
            "lambda": is_lambda_environment(),
        }),
    );
}

/// Decodes the payload or logs the rejection and yields the failure status.
pub fn decode_or_reject(component: &str, payload: Value) -> Result<InvocationRequest, i32> {
    decode_request(payload).map_err(|message| {
        log_handler_error(
            component,
            "invocation_failed",
            json!({
                "reason": "payload",
                "error": message,
                "status": STATUS_FAILURE,
            }),
        );
        STATUS_FAILURE
    })
}

/// Line printed after a direct invocation; each function keeps its own label.
pub fn direct_result_line(function: FunctionKind, status: i32) -> String {
    match function {
        FunctionKind::Kmeans => format!("Return value: {status}"),
        FunctionKind::Join => format!("Result: {status}"),
    }
}

pub fn print_direct_result(function: FunctionKind, status: i32) {
    println!("{}", direct_result_line(function, status));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_size_field() {
        let request = decode_request(json!({ "size": "medium" })).expect("payload should decode");
        assert_eq!(request, InvocationRequest::new("medium"));
    }

    #[test]
    fn missing_size_becomes_empty_label() {
        let request = decode_request(json!({})).expect("payload should decode");
        assert_eq!(request.size, "");
        assert!(request.resolve_size().is_err());
    }

    #[test]
    fn null_payload_is_treated_like_missing_size() {
        let request = decode_request(Value::Null).expect("null should decode");
        assert_eq!(request.size, "");
    }

    #[test]
    fn wrong_field_type_is_rejected_with_failure_status() {
        let status = decode_or_reject("kmeans_handler", json!({ "size": 3 }))
            .expect_err("numeric size should be rejected");
        assert_eq!(status, STATUS_FAILURE);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let error = decode_request(json!(["small"])).expect_err("array payload should fail");
        assert!(error.contains("invalid invocation payload"));
    }

    #[test]
    fn array_and_scalar_payloads_return_failure_status() {
        for payload in [json!(["small"]), json!("small"), json!(1)] {
            let status = decode_or_reject("join_handler", payload)
                .expect_err("non-object payload should be rejected");
            assert_eq!(status, STATUS_FAILURE);
        }
    }

    #[test]
    fn direct_result_labels_follow_function() {
        assert_eq!(direct_result_line(FunctionKind::Kmeans, 0), "Return value: 0");
        assert_eq!(direct_result_line(FunctionKind::Join, 1), "Result: 1");
    }

    #[tokio::test]
    async fn gateway_ready_event_names_project_and_bucket() {
        let config = crate::handlers::test_support::sample_config(&std::env::temp_dir());
        let gateway = CloudStorageGateway::connect(&config).await;

        log_gateway_ready("kmeans_handler", &gateway);
        assert_eq!(gateway.project_id(), config.project_id);
    }
}
