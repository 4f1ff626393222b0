//! Commit and variant records (the nodes of the version graph).
//!
//! A [`Commit`] is created once per generation or import and is immutable
//! except for the content and status of its [`Variant`]s, which mutate in
//! place while a generation session streams.

use serde::{Deserialize, Serialize};

use crate::types::{CommitHash, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of variant slots provisioned for an AI commit before the backend
/// reports how many it will actually produce.
pub const DEFAULT_VARIANT_SLOTS: usize = 4;

/// Upper bound on the variant slots a commit may hold.
pub const MAX_VARIANT_SLOTS: usize = 16;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a commit was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitType {
    /// First generation from an image, video or text prompt.
    AiCreate,
    /// Edit instruction applied on top of a parent commit.
    AiEdit,
    /// Code imported directly by the user, no generation involved.
    CodeCreate,
}

/// Lifecycle of a single variant within one generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    Generating,
    Complete,
    Error,
}

impl VariantStatus {
    /// `true` once no further mutations are accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Overall status of a commit, derived from its variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    /// At least one variant is still generating.
    Generating,
    /// Every variant has reached a terminal state and at least one succeeded
    /// (or the commit has no variant slots left).
    Ready,
    /// Every variant ended in error.
    Failed,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Prompt payload: free text plus reference images (data URLs or links).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContent {
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl PromptContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn image(image: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            images: vec![image.into()],
        }
    }
}

/// One candidate code output of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub code: String,
    pub status: VariantStatus,
    /// Populated only when `status` is [`VariantStatus::Error`].
    pub error_message: Option<String>,
}

impl Variant {
    /// Empty slot waiting for streamed code.
    pub fn placeholder() -> Self {
        Self {
            code: String::new(),
            status: VariantStatus::Generating,
            error_message: None,
        }
    }

    /// Fully-formed variant that will never be streamed into.
    pub fn completed(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status: VariantStatus::Complete,
            error_message: None,
        }
    }
}

/// A node in the version graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: CommitHash,
    pub commit_type: CommitType,
    pub parent_hash: Option<CommitHash>,
    pub date_created: Timestamp,
    /// Prompt or edit instruction that produced the commit; `None` for
    /// imported code.
    pub inputs: Option<PromptContent>,
    pub variants: Vec<Variant>,
    pub selected_variant_index: usize,
}

impl Commit {
    /// Root commit for a fresh generation, with provisioned empty slots.
    pub fn ai_create(inputs: PromptContent) -> Self {
        Self::build(
            CommitType::AiCreate,
            None,
            Some(inputs),
            placeholders(DEFAULT_VARIANT_SLOTS),
        )
    }

    /// Child commit for an edit instruction applied on top of `parent`.
    pub fn ai_edit(parent: CommitHash, inputs: PromptContent) -> Self {
        Self::build(
            CommitType::AiEdit,
            Some(parent),
            Some(inputs),
            placeholders(DEFAULT_VARIANT_SLOTS),
        )
    }

    /// Root commit holding user-supplied code in a single complete variant.
    pub fn code_create(code: impl Into<String>) -> Self {
        Self::build(
            CommitType::CodeCreate,
            None,
            None,
            vec![Variant::completed(code)],
        )
    }

    /// Low-level constructor; generates the hash.
    pub fn build(
        commit_type: CommitType,
        parent_hash: Option<CommitHash>,
        inputs: Option<PromptContent>,
        variants: Vec<Variant>,
    ) -> Self {
        Self {
            hash: CommitHash::generate(),
            commit_type,
            parent_hash,
            date_created: chrono::Utc::now(),
            inputs,
            variants,
            selected_variant_index: 0,
        }
    }

    /// Override the generated hash. Intended for fixtures and replay.
    pub fn with_hash(mut self, hash: impl Into<CommitHash>) -> Self {
        self.hash = hash.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_hash.is_none()
    }

    /// The variant currently selected for display, if any slot exists.
    pub fn selected_variant(&self) -> Option<&Variant> {
        self.variants.get(self.selected_variant_index)
    }

    pub fn status(&self) -> CommitStatus {
        if self
            .variants
            .iter()
            .any(|v| v.status == VariantStatus::Generating)
        {
            CommitStatus::Generating
        } else if !self.variants.is_empty()
            && self.variants.iter().all(|v| v.status == VariantStatus::Error)
        {
            CommitStatus::Failed
        } else {
            CommitStatus::Ready
        }
    }
}

fn placeholders(count: usize) -> Vec<Variant> {
    (0..count).map(|_| Variant::placeholder()).collect()
}
