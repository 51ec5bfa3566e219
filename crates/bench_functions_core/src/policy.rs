//! Fixed per-size workload parameters.
//!
//! Tables are read-only and looked up once per invocation.

use crate::contract::{SizeLabel, ValidationError};

pub const KMEANS_MAX_ITERATIONS: u64 = 50;
pub const JOIN_KEY: &str = "id0";
pub const JOIN_TRANSFER_CHUNK_SIZE: u64 = 1 << 30;

pub static KMEANS_CENTERS: SizePolicy<usize> = SizePolicy::new(10, 60, 100);
pub static JOIN_BLOCKSIZE: SizePolicy<&'static str> = SizePolicy::new("250MB", "125MB", "12MB");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePolicy<T> {
    small: T,
    medium: T,
    large: T,
}

impl<T> SizePolicy<T> {
    pub const fn new(small: T, medium: T, large: T) -> Self {
        Self {
            small,
            medium,
            large,
        }
    }

    pub fn get(&self, size: SizeLabel) -> &T {
        match size {
            SizeLabel::Small => &self.small,
            SizeLabel::Medium => &self.medium,
            SizeLabel::Large => &self.large,
        }
    }

    pub fn resolve(&self, size: &str) -> Result<(SizeLabel, &T), ValidationError> {
        let label = SizeLabel::parse(size)?;
        Ok((label, self.get(label)))
    }
}

/// Target byte size of one input partition for the join engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSize {
    bytes: u64,
}

impl PartitionSize {
    pub fn from_bytes(bytes: u64) -> Result<Self, ValidationError> {
        if bytes == 0 {
            return Err(ValidationError::new(
                "partition size must be a positive number of bytes",
            ));
        }
        Ok(Self { bytes })
    }

    /// Parses sizes such as `250MB`, `12 MiB` or `1.5GB`.
    ///
    /// Decimal units are powers of 1000, `*iB` units powers of 1024.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        let split_at = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split_at);

        let quantity: f64 = number.parse().map_err(|_| {
            ValidationError::new(format!("invalid partition size '{value}': missing number"))
        })?;
        let multiplier = unit_multiplier(&unit.trim().to_ascii_lowercase()).ok_or_else(|| {
            ValidationError::new(format!(
                "invalid partition size '{value}': unknown unit '{}'",
                unit.trim()
            ))
        })?;

        let bytes = (quantity * multiplier as f64).round();
        if !bytes.is_finite() || bytes < 1.0 || bytes > u64::MAX as f64 {
            return Err(ValidationError::new(format!(
                "invalid partition size '{value}': must be at least one byte"
            )));
        }
        Self::from_bytes(bytes as u64)
    }

    pub fn bytes(self) -> u64 {
        self.bytes
    }

    /// Number of partitions a file of `file_len` bytes splits into; never zero.
    pub fn partitions_for(self, file_len: u64) -> usize {
        let partitions = file_len.div_ceil(self.bytes).max(1);
        usize::try_from(partitions).unwrap_or(usize::MAX)
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let multiplier = match unit {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "t" | "tb" => 1_000_000_000_000,
        "ki" | "kib" => 1 << 10,
        "mi" | "mib" => 1 << 20,
        "gi" | "gib" => 1 << 30,
        "ti" | "tib" => 1 << 40,
        _ => return None,
    };
    Some(multiplier)
}
