//! Workspace controller: turns user actions into commits and sessions.
//!
//! [`Workspace`] owns the [`VersionGraph`], the [`ExecutionLog`] and at most
//! one active [`StreamingSession`]. Each generating action adds a commit,
//! points the head at it and starts a session; [`Workspace::drive`] then
//! pulls the session's events through a [`StoreReconciler`] until the
//! channel closes, and either marks the code ready or rolls the commit back.
//!
//! User-facing failures are pushed as [`Notification`]s on the channel the
//! workspace was built with.

use pix2code_core::commit::{Commit, CommitType, PromptContent};
use pix2code_core::error::CoreError;
use pix2code_core::execution_log::ExecutionLog;
use pix2code_core::history::extract_history;
use pix2code_core::store::VersionGraph;
use pix2code_core::types::CommitHash;
use pix2code_stream::client::CodegenClient;
use pix2code_stream::close::ABNORMAL_CLOSE_CODE;
use pix2code_stream::config::ClientConfig;
use pix2code_stream::reconciler::StoreReconciler;
use pix2code_stream::request::{
    GenerationParams, GenerationSettings, GenerationType, InputMode, Stack,
};
use pix2code_stream::session::{CancelHandle, SessionEvent, SessionOutcome, StreamingSession};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::notify::{self, Notification};

/// Suffix joining an update instruction to the element it targets.
const SELECTED_ELEMENT_SUFFIX: &str = " referring to this element specifically: ";

/// Coarse application phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Initial,
    Coding,
    CodeReady,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("No current version set")]
    NoHead,

    #[error("Only the first version can be regenerated.")]
    NotRegenerable,

    #[error("Please include some instructions for AI on what to update.")]
    EmptyInstruction,

    #[error("No reference images provided")]
    NoReferenceImages,

    #[error("You've run out of credits. Please purchase more to continue.")]
    OutOfCredits,

    #[error("Version history is invalid: {0}")]
    History(CoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to encode generation request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The session currently streaming into a commit.
struct ActiveGeneration {
    session: StreamingSession,
    commit: CommitHash,
}

pub struct Workspace {
    store: VersionGraph,
    log: ExecutionLog,
    client: CodegenClient,
    settings: GenerationSettings,
    user_id: String,
    is_running_on_cloud: bool,

    input_mode: InputMode,
    reference_images: Vec<String>,
    initial_prompt: String,
    is_imported_from_code: bool,

    /// Last balance reported by the backend; `None` until one is known.
    credits: Option<i64>,
    app_state: AppState,
    active: Option<ActiveGeneration>,
    notifier: mpsc::UnboundedSender<Notification>,
}

impl Workspace {
    pub fn new(
        client: CodegenClient,
        settings: GenerationSettings,
        user_id: impl Into<String>,
        notifier: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        Self {
            store: VersionGraph::new(),
            log: ExecutionLog::new(),
            client,
            settings,
            user_id: user_id.into(),
            is_running_on_cloud: false,
            input_mode: InputMode::default(),
            reference_images: Vec::new(),
            initial_prompt: String::new(),
            is_imported_from_code: false,
            credits: None,
            app_state: AppState::Initial,
            active: None,
            notifier,
        }
    }

    /// Build a workspace from environment-derived configuration.
    pub fn from_config(
        config: &ClientConfig,
        settings: GenerationSettings,
        notifier: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        let mut workspace = Self::new(
            config.codegen_client(),
            settings,
            config.user_id.clone().unwrap_or_default(),
            notifier,
        );
        workspace.is_running_on_cloud = config.is_running_on_cloud;
        workspace
    }

    // ---- accessors ----

    pub fn store(&self) -> &VersionGraph {
        &self.store
    }

    pub fn execution_log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn app_state(&self) -> AppState {
        self.app_state
    }

    pub fn credits(&self) -> Option<i64> {
        self.credits
    }

    /// Seed the balance, e.g. from the credit summary endpoint.
    pub fn set_credits(&mut self, balance: Option<i64>) {
        self.credits = balance;
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn is_generating(&self) -> bool {
        self.active.is_some()
    }

    // ---- generating actions ----

    /// Start a fresh design from screenshots or a video.
    pub fn create(
        &mut self,
        reference_images: Vec<String>,
        input_mode: InputMode,
    ) -> Result<CommitHash, WorkspaceError> {
        let Some(first) = reference_images.first().cloned() else {
            return Err(WorkspaceError::NoReferenceImages);
        };
        self.ensure_credits()?;

        self.reset();
        self.reference_images = reference_images;
        self.input_mode = input_mode;

        self.start_generation(GenerationType::Create, PromptContent::image(first), None)
    }

    /// Start a fresh design from a text description.
    pub fn create_from_text(&mut self, text: &str) -> Result<CommitHash, WorkspaceError> {
        if text.trim().is_empty() {
            return self.reject(WorkspaceError::EmptyInstruction);
        }
        self.ensure_credits()?;

        self.reset();
        self.input_mode = InputMode::Text;
        self.initial_prompt = text.to_string();

        self.start_generation(GenerationType::Create, PromptContent::text(text), None)
    }

    /// Apply an edit instruction on top of the head commit.
    ///
    /// An edit that is still streaming is replaced: the new edit builds on
    /// its parent. A refused update leaves the active generation running.
    ///
    /// * `images` - Extra images attached to the instruction.
    /// * `selected_element` - Markup of the element the edit targets.
    pub fn update(
        &mut self,
        instruction: &str,
        images: Vec<String>,
        selected_element: Option<&str>,
    ) -> Result<CommitHash, WorkspaceError> {
        if instruction.trim().is_empty() {
            return self.reject(WorkspaceError::EmptyInstruction);
        }
        self.ensure_credits()?;
        let Some(base) = self.settled_head() else {
            return self.reject(WorkspaceError::NoHead);
        };

        let mut history = match extract_history(&self.store, &base) {
            Ok(history) => history,
            Err(e) => return self.reject(WorkspaceError::History(e)),
        };

        let text = match selected_element {
            Some(element) => format!("{instruction}{SELECTED_ELEMENT_SUFFIX}{element}"),
            None => instruction.to_string(),
        };
        history.push(PromptContent { text, images });

        let prompt = if self.input_mode == InputMode::Text {
            PromptContent::text(self.initial_prompt.clone())
        } else {
            PromptContent {
                text: String::new(),
                images: self.reference_images.iter().take(1).cloned().collect(),
            }
        };

        self.abandon_active()?;
        self.start_generation(GenerationType::Update, prompt, Some(history))
    }

    /// Re-run the create that produced the head commit.
    pub fn regenerate(&mut self) -> Result<CommitHash, WorkspaceError> {
        let Some(head) = self.store.head_commit() else {
            return self.reject(WorkspaceError::NoHead);
        };
        if head.commit_type != CommitType::AiCreate {
            return self.reject(WorkspaceError::NotRegenerable);
        }

        match self.input_mode {
            InputMode::Text => {
                let prompt = self.initial_prompt.clone();
                self.create_from_text(&prompt)
            }
            mode => {
                let images = self.reference_images.clone();
                self.create(images, mode)
            }
        }
    }

    /// Load existing code as the first version without contacting the
    /// backend.
    pub fn import_from_code(
        &mut self,
        code: impl Into<String>,
        stack: Stack,
    ) -> Result<CommitHash, WorkspaceError> {
        self.reset();
        self.is_imported_from_code = true;
        self.settings.generated_code_config = stack;

        let commit = Commit::code_create(code);
        let hash = commit.hash.clone();
        self.store.add_commit(commit)?;
        self.store.set_head(Some(hash.clone()))?;
        self.app_state = AppState::CodeReady;

        tracing::info!(commit = %hash, ?stack, "Imported code");
        Ok(hash)
    }

    /// Choose which variant of the head commit is shown and carried forward.
    pub fn select_variant(&mut self, index: usize) -> Result<(), WorkspaceError> {
        let head = self.store.head().cloned().ok_or(WorkspaceError::NoHead)?;
        self.store.select_variant(&head, index)?;
        Ok(())
    }

    // ---- session control ----

    /// Request cancellation of the active session, if any. The rollback
    /// happens in [`drive`](Self::drive) once the channel has closed.
    pub fn cancel(&self) {
        if let Some(active) = &self.active {
            active.session.cancel();
        }
    }

    /// Handle usable while [`drive`](Self::drive) holds the workspace.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.active.as_ref().map(|a| a.session.cancel_handle())
    }

    /// Apply the active session's events until it closes.
    ///
    /// Returns `None` when nothing is generating. The session stays attached
    /// until its terminal event, so dropping this future midway leaves the
    /// generation active and a later call picks up where it stopped.
    pub async fn drive(&mut self) -> Result<Option<SessionOutcome>, WorkspaceError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(None);
        };

        let notifier = self.notifier.clone();
        let mut reconciler =
            StoreReconciler::new(&mut self.store, &mut self.log, active.commit.clone());

        let outcome = loop {
            let Some(event) = active.session.next_event().await else {
                break SessionOutcome::Abnormal {
                    code: ABNORMAL_CLOSE_CODE,
                    reason: "session ended without a close event".to_string(),
                };
            };

            match event {
                SessionEvent::Opened => {
                    tracing::debug!(commit = %active.commit, "Generation channel open");
                }
                SessionEvent::Message(message) => {
                    if let Err(e) = reconciler.apply(&message) {
                        tracing::warn!(
                            commit = %active.commit,
                            kind = message.kind(),
                            error = %e,
                            "Ignoring message the store rejected",
                        );
                        let _ = notifier.send(Notification::info(e.to_string()));
                    }
                    for error in reconciler.take_channel_errors() {
                        let _ = notifier.send(Notification::error(error));
                    }
                    if let Some(balance) = reconciler.take_credits() {
                        self.credits = Some(balance);
                    }
                }
                SessionEvent::Malformed { .. } => {
                    let _ = notifier.send(Notification::error(notify::MALFORMED_MESSAGE));
                }
                SessionEvent::Closed(outcome) => break outcome,
            }
        };

        let commit = active.commit.clone();
        self.active = None;
        self.finish(&commit, &outcome)?;
        Ok(Some(outcome))
    }

    /// Drop every commit, the log, the inputs and any active session.
    pub fn reset(&mut self) {
        if let Some(active) = self.active.take() {
            active.session.cancel();
        }
        self.store.reset();
        self.log.reset();
        self.input_mode = InputMode::default();
        self.reference_images.clear();
        self.initial_prompt.clear();
        self.is_imported_from_code = false;
        self.app_state = AppState::Initial;
    }

    // ---- private helpers ----

    fn start_generation(
        &mut self,
        generation_type: GenerationType,
        prompt: PromptContent,
        history: Option<Vec<PromptContent>>,
    ) -> Result<CommitHash, WorkspaceError> {
        self.ensure_credits()?;

        let commit = match generation_type {
            GenerationType::Create => Commit::ai_create(prompt.clone()),
            GenerationType::Update => {
                let parent = self.store.head().cloned().ok_or(WorkspaceError::NoHead)?;
                let inputs = history
                    .as_ref()
                    .and_then(|h| h.last().cloned())
                    .unwrap_or_default();
                Commit::ai_edit(parent, inputs)
            }
        };

        let params = GenerationParams {
            generation_type,
            input_mode: self.input_mode,
            prompt,
            history,
            is_imported_from_code: self.is_imported_from_code,
            settings: self.settings.clone(),
            user_id: self.user_id.clone(),
        };
        let session = StreamingSession::start(&self.client, &params)?;

        let hash = commit.hash.clone();
        self.store.add_commit(commit)?;
        self.store.set_head(Some(hash.clone()))?;
        self.log.reset();
        self.app_state = AppState::Coding;
        self.active = Some(ActiveGeneration {
            session,
            commit: hash.clone(),
        });

        tracing::info!(
            commit = %hash,
            ?generation_type,
            input_mode = ?self.input_mode,
            "Generation started",
        );
        Ok(hash)
    }

    fn finish(&mut self, commit: &CommitHash, outcome: &SessionOutcome) -> Result<(), WorkspaceError> {
        if let Some(n) =
            notify::outcome_notification(outcome, self.is_running_on_cloud, self.client.ws_url())
        {
            self.notify(n);
        }

        if outcome.is_completed() {
            tracing::info!(commit = %commit, "Generation complete");
            self.app_state = AppState::CodeReady;
            Ok(())
        } else {
            tracing::info!(commit = %commit, ?outcome, "Generation did not complete, rolling back");
            self.roll_back(commit)
        }
    }

    /// Undo a generation that did not complete. A root commit resets the
    /// whole workspace; any other commit is removed and the head returns to
    /// its parent.
    fn roll_back(&mut self, hash: &CommitHash) -> Result<(), WorkspaceError> {
        let Some(commit) = self.store.get(hash) else {
            return Ok(());
        };

        match commit.parent_hash.clone() {
            None => self.reset(),
            Some(parent) => {
                self.store.remove_commit(hash)?;
                self.store.set_head(Some(parent))?;
                self.app_state = AppState::CodeReady;
            }
        }
        Ok(())
    }

    /// Head the store will have once any active generation is rolled back.
    fn settled_head(&self) -> Option<CommitHash> {
        match &self.active {
            Some(active) => self
                .store
                .get(&active.commit)
                .and_then(|c| c.parent_hash.clone()),
            None => self.store.head().cloned(),
        }
    }

    /// Refuse generation once the known balance is exhausted.
    fn ensure_credits(&self) -> Result<(), WorkspaceError> {
        match self.credits {
            Some(balance) if balance <= 0 => self.reject(WorkspaceError::OutOfCredits),
            _ => Ok(()),
        }
    }

    /// Cancel and roll back a session that is being replaced.
    fn abandon_active(&mut self) -> Result<(), WorkspaceError> {
        if let Some(active) = self.active.take() {
            tracing::info!(commit = %active.commit, "Replacing active generation");
            active.session.cancel();
            self.roll_back(&active.commit)?;
        }
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        if self.notifier.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }

    /// Surface a user-facing refusal and return it.
    fn reject<T>(&self, err: WorkspaceError) -> Result<T, WorkspaceError> {
        tracing::warn!(error = %err, "Action refused");
        self.notify(Notification::error(err.to_string()));
        Err(err)
    }
}
