pub use bench_functions_core::{config, contract, policy, storage_keys};
