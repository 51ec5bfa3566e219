use std::future::Future;

use tokio::runtime::{Handle, RuntimeFlavor};

/// Drives an async SDK or engine call to completion from synchronous handler code.
///
/// Inside the Lambda's multi-thread runtime the worker is handed over with
/// `block_in_place`. A current-thread runtime cannot be blocked, so the future
/// runs on a scoped helper thread with its own runtime instead. Without any
/// runtime a temporary current-thread runtime is built.
pub fn block_on<F>(future: F) -> Result<F::Output, String>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| run_on_fresh_runtime(future))
                .join()
                .map_err(|_| "async bridge helper thread panicked".to_string())?
        }),
        Err(_) => run_on_fresh_runtime(future),
    }
}

fn run_on_fresh_runtime<F: Future>(future: F) -> Result<F::Output, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("failed to start async runtime: {error}"))?;
    Ok(runtime.block_on(future))
}
