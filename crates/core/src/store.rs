//! In-memory version graph: commits keyed by hash plus the head pointer.
//!
//! [`VersionGraph`] is an owned value created once per application session
//! and passed by reference to whoever drives generation. It is mutated from
//! a single task, so it carries no locks. Every mutation is published as a
//! [`StoreChange`] on a [`tokio::sync::broadcast`] channel; call
//! [`VersionGraph::subscribe`] to observe them.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::commit::{Commit, Variant, VariantStatus, MAX_VARIANT_SLOTS};
use crate::error::CoreError;
use crate::types::CommitHash;

/// Broadcast channel capacity for store change notifications.
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// A single observable mutation of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StoreChange {
    CommitAdded(CommitHash),
    CommitRemoved(CommitHash),
    HeadChanged(Option<CommitHash>),
    /// Code, status or error of one variant changed.
    VariantUpdated { hash: CommitHash, index: usize },
    VariantsResized { hash: CommitHash, count: usize },
    VariantSelected { hash: CommitHash, index: usize },
    Reset,
}

pub struct VersionGraph {
    commits: HashMap<CommitHash, Commit>,
    head: Option<CommitHash>,
    change_tx: broadcast::Sender<StoreChange>,
}

impl Default for VersionGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionGraph {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            commits: HashMap::new(),
            head: None,
            change_tx,
        }
    }

    /// Subscribe to store mutations.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.change_tx.subscribe()
    }

    // ---- reads ----

    pub fn get(&self, hash: &CommitHash) -> Option<&Commit> {
        self.commits.get(hash)
    }

    pub fn head(&self) -> Option<&CommitHash> {
        self.head.as_ref()
    }

    /// The commit the head points at.
    pub fn head_commit(&self) -> Option<&Commit> {
        self.head.as_ref().and_then(|h| self.commits.get(h))
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn contains(&self, hash: &CommitHash) -> bool {
        self.commits.contains_key(hash)
    }

    // ---- graph mutations ----

    /// Insert a new commit. Fails if the hash is already taken.
    pub fn add_commit(&mut self, commit: Commit) -> Result<(), CoreError> {
        if self.commits.contains_key(&commit.hash) {
            return Err(CoreError::DuplicateCommit(commit.hash));
        }
        let hash = commit.hash.clone();
        tracing::debug!(
            commit = %hash,
            commit_type = ?commit.commit_type,
            parent = ?commit.parent_hash.as_ref().map(CommitHash::as_str),
            variants = commit.variants.len(),
            "Commit added",
        );
        self.commits.insert(hash.clone(), commit);
        self.publish(StoreChange::CommitAdded(hash));
        Ok(())
    }

    /// Delete a commit record. The head is left untouched; the caller is
    /// responsible for re-pointing it.
    pub fn remove_commit(&mut self, hash: &CommitHash) -> Result<Commit, CoreError> {
        let commit = self
            .commits
            .remove(hash)
            .ok_or_else(|| CoreError::CommitNotFound(hash.clone()))?;
        tracing::debug!(commit = %hash, "Commit removed");
        self.publish(StoreChange::CommitRemoved(hash.clone()));
        Ok(commit)
    }

    /// Point the head at an existing commit, or clear it.
    pub fn set_head(&mut self, hash: Option<CommitHash>) -> Result<(), CoreError> {
        if let Some(ref h) = hash {
            if !self.commits.contains_key(h) {
                return Err(CoreError::CommitNotFound(h.clone()));
            }
        }
        self.head = hash.clone();
        self.publish(StoreChange::HeadChanged(hash));
        Ok(())
    }

    /// Drop every commit and clear the head.
    pub fn reset(&mut self) {
        self.commits.clear();
        self.head = None;
        self.publish(StoreChange::Reset);
    }

    // ---- variant mutations ----

    /// Concatenate `token` onto the addressed variant's code.
    pub fn append_variant_code(
        &mut self,
        hash: &CommitHash,
        index: usize,
        token: &str,
    ) -> Result<(), CoreError> {
        let variant = self.open_variant_mut(hash, index)?;
        variant.code.push_str(token);
        self.publish(StoreChange::VariantUpdated {
            hash: hash.clone(),
            index,
        });
        Ok(())
    }

    /// Replace the addressed variant's code wholesale.
    pub fn set_variant_code(
        &mut self,
        hash: &CommitHash,
        index: usize,
        code: &str,
    ) -> Result<(), CoreError> {
        let variant = self.open_variant_mut(hash, index)?;
        variant.code.clear();
        variant.code.push_str(code);
        self.publish(StoreChange::VariantUpdated {
            hash: hash.clone(),
            index,
        });
        Ok(())
    }

    /// Move a variant to `status`. `error` is stored only for
    /// [`VariantStatus::Error`].
    pub fn update_variant_status(
        &mut self,
        hash: &CommitHash,
        index: usize,
        status: VariantStatus,
        error: Option<String>,
    ) -> Result<(), CoreError> {
        let variant = self.open_variant_mut(hash, index)?;
        variant.status = status;
        variant.error_message = match status {
            VariantStatus::Error => error,
            _ => None,
        };
        tracing::debug!(commit = %hash, variant_index = index, ?status, "Variant status updated");
        self.publish(StoreChange::VariantUpdated {
            hash: hash.clone(),
            index,
        });
        Ok(())
    }

    /// Resize the variant slot list to exactly `count` slots.
    ///
    /// Extra slots are truncated; missing slots are padded with empty
    /// generating placeholders. Slots below `min(old, count)` keep their
    /// content. The selected index is clamped back into range.
    pub fn resize_variants(&mut self, hash: &CommitHash, count: usize) -> Result<(), CoreError> {
        if count > MAX_VARIANT_SLOTS {
            return Err(CoreError::Validation(format!(
                "variant count {count} exceeds the maximum of {MAX_VARIANT_SLOTS}"
            )));
        }
        let commit = self
            .commits
            .get_mut(hash)
            .ok_or_else(|| CoreError::CommitNotFound(hash.clone()))?;
        let old = commit.variants.len();
        commit.variants.resize_with(count, Variant::placeholder);
        if commit.selected_variant_index >= count {
            commit.selected_variant_index = 0;
        }
        tracing::debug!(commit = %hash, old, new = count, "Variants resized");
        self.publish(StoreChange::VariantsResized {
            hash: hash.clone(),
            count,
        });
        Ok(())
    }

    /// Choose which variant of a commit is displayed and carried into history.
    pub fn select_variant(&mut self, hash: &CommitHash, index: usize) -> Result<(), CoreError> {
        let commit = self
            .commits
            .get_mut(hash)
            .ok_or_else(|| CoreError::CommitNotFound(hash.clone()))?;
        if index >= commit.variants.len() {
            return Err(CoreError::VariantOutOfRange {
                hash: hash.clone(),
                index,
                len: commit.variants.len(),
            });
        }
        commit.selected_variant_index = index;
        self.publish(StoreChange::VariantSelected {
            hash: hash.clone(),
            index,
        });
        Ok(())
    }

    // ---- private helpers ----

    /// Resolve a variant that still accepts mutations.
    fn open_variant_mut(
        &mut self,
        hash: &CommitHash,
        index: usize,
    ) -> Result<&mut Variant, CoreError> {
        let commit = self
            .commits
            .get_mut(hash)
            .ok_or_else(|| CoreError::CommitNotFound(hash.clone()))?;
        let len = commit.variants.len();
        let variant = commit
            .variants
            .get_mut(index)
            .ok_or_else(|| CoreError::VariantOutOfRange {
                hash: hash.clone(),
                index,
                len,
            })?;
        if variant.status.is_terminal() {
            return Err(CoreError::VariantFinalized {
                hash: hash.clone(),
                index,
            });
        }
        Ok(variant)
    }

    fn publish(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.change_tx.send(change);
    }
}
