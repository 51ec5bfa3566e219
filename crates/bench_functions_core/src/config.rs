//! Process-wide configuration resolved once at startup.

use std::path::PathBuf;

pub const BENCH_HOME_VAR: &str = "BENCH_HOME";
pub const GCP_PROJECT_VAR: &str = "GCP_PROJECT";
pub const GCP_BUCKET_VAR: &str = "GCP_BUCKET";
pub const STORAGE_ENDPOINT_VAR: &str = "STORAGE_ENDPOINT_URL";
pub const STORAGE_REGION_VAR: &str = "STORAGE_REGION";

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_STORAGE_REGION: &str = "auto";

const REQUIRED_VARS: [&str; 3] = [BENCH_HOME_VAR, GCP_PROJECT_VAR, GCP_BUCKET_VAR];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Parent directory of every scratch workspace.
    pub bench_home: PathBuf,
    pub project_id: String,
    pub bucket: String,
    pub storage_endpoint: String,
    pub storage_region: String,
}

impl BenchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let missing: Vec<&'static str> = REQUIRED_VARS
            .into_iter()
            .filter(|&name| read(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError { missing });
        }

        Ok(Self {
            bench_home: PathBuf::from(read(BENCH_HOME_VAR).unwrap_or_default()),
            project_id: read(GCP_PROJECT_VAR).unwrap_or_default(),
            bucket: read(GCP_BUCKET_VAR).unwrap_or_default(),
            storage_endpoint: read(STORAGE_ENDPOINT_VAR)
                .unwrap_or_else(|| DEFAULT_STORAGE_ENDPOINT.to_string()),
            storage_region: read(STORAGE_REGION_VAR)
                .unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    missing: Vec<&'static str>,
}

impl ConfigError {
    pub fn missing(&self) -> &[&'static str] {
        &self.missing
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Required environment variables ({}) are not set; missing: {}",
            REQUIRED_VARS.join(", "),
            self.missing.join(", ")
        )
    }
}

impl std::error::Error for ConfigError {}
