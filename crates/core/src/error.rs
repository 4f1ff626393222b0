use crate::types::CommitHash;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Commit not found: {0}")]
    CommitNotFound(CommitHash),

    #[error("Commit already exists: {0}")]
    DuplicateCommit(CommitHash),

    #[error("Variant {index} out of range for commit {hash} ({len} variants)")]
    VariantOutOfRange {
        hash: CommitHash,
        index: usize,
        len: usize,
    },

    #[error("Variant {index} of commit {hash} is already finalized")]
    VariantFinalized { hash: CommitHash, index: usize },

    #[error("Malformed history: {0}")]
    MalformedHistory(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
