use crate::contract::{FunctionKind, SizeLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobRole {
    Observations,
    Model,
    LeftTable,
    RightTable,
    JoinResult,
}

impl BlobRole {
    fn suffix(self) -> &'static str {
        match self {
            Self::Observations => "x.npy",
            Self::Model => "kmeans_model.pkl",
            Self::LeftTable => "join1.csv",
            Self::RightTable => "join2.csv",
            Self::JoinResult => "join_result.csv",
        }
    }
}

/// File name used both inside the scratch workspace and as the blob basename.
pub fn scratch_file_name(size: SizeLabel, role: BlobRole) -> String {
    format!("{}_{}", size.as_str(), role.suffix())
}

pub fn blob_key(function: FunctionKind, size: SizeLabel, role: BlobRole) -> String {
    format!(
        "{}/{}",
        function.namespace(),
        scratch_file_name(size, role)
    )
}
