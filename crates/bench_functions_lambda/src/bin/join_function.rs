use std::sync::Arc;

use bench_functions_lambda::adapters::object_store::CloudStorageGateway;
use bench_functions_lambda::handlers::entry::{
    decode_or_reject, is_lambda_environment, log_gateway_ready, print_direct_result,
};
use bench_functions_lambda::handlers::join::handle_join_request_with_datafusion;
use bench_functions_lambda::runtime::config::BenchConfig;
use bench_functions_lambda::runtime::contract::{FunctionKind, InvocationRequest};
use bench_functions_lambda::runtime::policy::JOIN_TRANSFER_CHUNK_SIZE;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};

fn invoke(
    request: &InvocationRequest,
    config: &BenchConfig,
    gateway: &CloudStorageGateway,
) -> i32 {
    handle_join_request_with_datafusion(request, config, gateway).status_code()
}

async fn handle_request(
    event: LambdaEvent<Value>,
    config: &BenchConfig,
    gateway: &CloudStorageGateway,
) -> Result<Value, Error> {
    let status = match decode_or_reject(FunctionKind::Join.component(), event.payload) {
        Ok(request) => invoke(&request, config, gateway),
        Err(status) => status,
    };
    Ok(json!(status))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Arc::new(BenchConfig::from_env()?);
    let gateway = Arc::new(
        CloudStorageGateway::connect(&config)
            .await
            .with_chunk_size(JOIN_TRANSFER_CHUNK_SIZE),
    );

    log_gateway_ready(FunctionKind::Join.component(), &gateway);

    if !is_lambda_environment() {
        let status = invoke(&InvocationRequest::default(), &config, &gateway);
        print_direct_result(FunctionKind::Join, status);
        return Ok(());
    }

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let config = Arc::clone(&config);
        let gateway = Arc::clone(&gateway);
        async move { handle_request(event, &config, &gateway).await }
    }))
    .await
}
