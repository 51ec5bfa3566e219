use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DIRECT_INVOCATION_SIZE: SizeLabel = SizeLabel::Small;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeLabel {
    Small,
    Medium,
    Large,
}

impl SizeLabel {
    pub const ALL: [SizeLabel; 3] = [SizeLabel::Small, SizeLabel::Medium, SizeLabel::Large];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == value)
            .ok_or_else(|| {
                ValidationError::new(format!(
                    "unknown size '{value}'; expected one of small, medium, large"
                ))
            })
    }
}

impl FromStr for SizeLabel {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl std::fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Benchmark functions and the blob namespace each one reads from and writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Kmeans,
    Join,
}

impl FunctionKind {
    pub fn namespace(self) -> &'static str {
        match self {
            Self::Kmeans => "Func18_kmeans",
            Self::Join => "Func19_join",
        }
    }

    pub fn component(self) -> &'static str {
        match self {
            Self::Kmeans => "kmeans_handler",
            Self::Join => "join_handler",
        }
    }
}

/// Wire shape of one invocation.
///
/// `size` stays a raw string so that an unknown or missing label is reported
/// through the handler's lookup failure instead of a payload decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    #[serde(default)]
    pub size: String,
}

impl InvocationRequest {
    pub fn new(size: impl Into<String>) -> Self {
        Self { size: size.into() }
    }

    pub fn resolve_size(&self) -> Result<SizeLabel, ValidationError> {
        SizeLabel::parse(&self.size)
    }
}

impl Default for InvocationRequest {
    fn default() -> Self {
        Self::new(DIRECT_INVOCATION_SIZE.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Hex SHA-256 of an artifact body, read to the end.
pub fn artifact_digest(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
