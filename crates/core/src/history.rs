//! Lineage walking and prompt-history reconstruction.
//!
//! Each update request carries the whole conversation so far: for every
//! commit from the root to the head, the edit instruction that produced it
//! (for edits) followed by the code of its selected variant.

use std::collections::HashSet;

use crate::commit::{CommitType, PromptContent};
use crate::error::CoreError;
use crate::store::VersionGraph;
use crate::types::CommitHash;

/// Commit hashes from the root down to `hash`, inclusive.
///
/// Fails with [`CoreError::MalformedHistory`] when a parent reference is
/// dangling or the parent chain loops back on itself.
pub fn lineage(store: &VersionGraph, hash: &CommitHash) -> Result<Vec<CommitHash>, CoreError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(hash.clone());

    while let Some(h) = current {
        if !seen.insert(h.clone()) {
            return Err(CoreError::MalformedHistory(format!(
                "cycle detected at commit {h}"
            )));
        }
        let commit = store.get(&h).ok_or_else(|| {
            CoreError::MalformedHistory(format!("missing commit {h} in parent chain"))
        })?;
        current = commit.parent_hash.clone();
        chain.push(h);
    }

    chain.reverse();
    Ok(chain)
}

/// Flattened prompt history ending at `hash`, oldest first.
pub fn extract_history(
    store: &VersionGraph,
    hash: &CommitHash,
) -> Result<Vec<PromptContent>, CoreError> {
    let mut history = Vec::new();

    for h in lineage(store, hash)? {
        let commit = store
            .get(&h)
            .ok_or_else(|| CoreError::MalformedHistory(format!("missing commit {h}")))?;

        if commit.commit_type == CommitType::AiEdit {
            history.push(commit.inputs.clone().unwrap_or_default());
        }

        let code = commit
            .selected_variant()
            .map(|v| v.code.clone())
            .unwrap_or_default();
        history.push(PromptContent::text(code));
    }

    Ok(history)
}
