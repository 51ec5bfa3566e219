pub mod entry;
pub mod join;
pub mod kmeans;
pub mod outcome;
pub mod scratch;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;
