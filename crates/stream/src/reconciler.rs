//! Applies inbound messages to the version graph.
//!
//! [`dispatch`] routes one [`InboundMessage`] to exactly one
//! [`GenerationSink`] method. [`StoreReconciler`] is the sink that mutates a
//! [`VersionGraph`] commit and the [`ExecutionLog`].

use pix2code_core::commit::VariantStatus;
use pix2code_core::error::CoreError;
use pix2code_core::execution_log::ExecutionLog;
use pix2code_core::store::VersionGraph;
use pix2code_core::types::CommitHash;

use crate::messages::InboundMessage;

/// Receiver of decoded generation messages, one method per message kind.
pub trait GenerationSink {
    fn on_chunk(&mut self, variant_index: usize, token: &str) -> Result<(), CoreError>;
    fn on_set_code(&mut self, variant_index: usize, code: &str) -> Result<(), CoreError>;
    fn on_status(&mut self, variant_index: usize, line: &str);
    fn on_variant_complete(&mut self, variant_index: usize) -> Result<(), CoreError>;
    fn on_variant_error(&mut self, variant_index: usize, error: &str) -> Result<(), CoreError>;
    fn on_variant_count(&mut self, count: usize) -> Result<(), CoreError>;
    fn on_credits(&mut self, balance: i64);
    fn on_channel_error(&mut self, message: &str);
}

/// Route one message to the matching sink method.
pub fn dispatch<S>(sink: &mut S, message: &InboundMessage) -> Result<(), CoreError>
where
    S: GenerationSink + ?Sized,
{
    match message {
        InboundMessage::Chunk {
            value,
            variant_index,
        } => sink.on_chunk(*variant_index, value),
        InboundMessage::SetCode {
            value,
            variant_index,
        } => sink.on_set_code(*variant_index, value),
        InboundMessage::Status {
            value,
            variant_index,
        } => {
            sink.on_status(*variant_index, value);
            Ok(())
        }
        InboundMessage::VariantComplete { variant_index } => {
            sink.on_variant_complete(*variant_index)
        }
        InboundMessage::VariantError {
            value,
            variant_index,
        } => sink.on_variant_error(*variant_index, value),
        InboundMessage::VariantCount { value } => sink.on_variant_count(*value),
        InboundMessage::Credits { value } => {
            sink.on_credits(*value);
            Ok(())
        }
        InboundMessage::Error { value } => {
            sink.on_channel_error(value);
            Ok(())
        }
    }
}

/// Sink bound to one commit of a [`VersionGraph`].
///
/// Credit updates and channel-level errors have no store counterpart; they
/// are collected for the caller to pick up with
/// [`take_credits`](Self::take_credits) and
/// [`take_channel_errors`](Self::take_channel_errors).
pub struct StoreReconciler<'a> {
    store: &'a mut VersionGraph,
    log: &'a mut ExecutionLog,
    commit: CommitHash,
    credits: Option<i64>,
    channel_errors: Vec<String>,
}

impl<'a> StoreReconciler<'a> {
    pub fn new(store: &'a mut VersionGraph, log: &'a mut ExecutionLog, commit: CommitHash) -> Self {
        Self {
            store,
            log,
            commit,
            credits: None,
            channel_errors: Vec::new(),
        }
    }

    pub fn commit(&self) -> &CommitHash {
        &self.commit
    }

    /// Apply one message.
    pub fn apply(&mut self, message: &InboundMessage) -> Result<(), CoreError> {
        dispatch(self, message)
    }

    /// Latest credit balance seen since the last call.
    pub fn take_credits(&mut self) -> Option<i64> {
        self.credits.take()
    }

    pub fn take_channel_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.channel_errors)
    }
}

impl GenerationSink for StoreReconciler<'_> {
    fn on_chunk(&mut self, variant_index: usize, token: &str) -> Result<(), CoreError> {
        self.store
            .append_variant_code(&self.commit, variant_index, token)
    }

    fn on_set_code(&mut self, variant_index: usize, code: &str) -> Result<(), CoreError> {
        self.store.set_variant_code(&self.commit, variant_index, code)
    }

    fn on_status(&mut self, variant_index: usize, line: &str) {
        self.log.append(variant_index, line);
    }

    fn on_variant_complete(&mut self, variant_index: usize) -> Result<(), CoreError> {
        tracing::info!(commit = %self.commit, variant_index, "Variant complete");
        self.store
            .update_variant_status(&self.commit, variant_index, VariantStatus::Complete, None)
    }

    fn on_variant_error(&mut self, variant_index: usize, error: &str) -> Result<(), CoreError> {
        tracing::warn!(commit = %self.commit, variant_index, error, "Variant failed");
        self.store.update_variant_status(
            &self.commit,
            variant_index,
            VariantStatus::Error,
            Some(error.to_string()),
        )
    }

    fn on_variant_count(&mut self, count: usize) -> Result<(), CoreError> {
        tracing::info!(commit = %self.commit, count, "Backend reported variant count");
        self.store.resize_variants(&self.commit, count)
    }

    fn on_credits(&mut self, balance: i64) {
        tracing::debug!(balance, "Credit balance updated");
        self.credits = Some(balance);
    }

    fn on_channel_error(&mut self, message: &str) {
        tracing::error!(commit = %self.commit, error = message, "Error generating code");
        self.channel_errors.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pix2code_core::commit::{Commit, CommitStatus, PromptContent};

    use super::*;

    fn setup() -> (VersionGraph, ExecutionLog, CommitHash) {
        let mut store = VersionGraph::new();
        store
            .add_commit(Commit::ai_create(PromptContent::text("blog")).with_hash("a"))
            .unwrap();
        store.set_head(Some("a".into())).unwrap();
        (store, ExecutionLog::new(), "a".into())
    }

    fn chunk(i: usize, v: &str) -> InboundMessage {
        InboundMessage::Chunk {
            value: v.into(),
            variant_index: i,
        }
    }

    #[test]
    fn interleaved_chunks_land_on_their_variants() {
        let (mut store, mut log, h) = setup();
        let mut rec = StoreReconciler::new(&mut store, &mut log, h.clone());
        for msg in [chunk(0, "<a"), chunk(1, "<b"), chunk(0, ">"), chunk(1, ">")] {
            rec.apply(&msg).unwrap();
        }
        let commit = store.get(&h).unwrap();
        assert_eq!(commit.variants[0].code, "<a>");
        assert_eq!(commit.variants[1].code, "<b>");
    }

    #[test]
    fn set_code_replaces_streamed_tokens() {
        let (mut store, mut log, h) = setup();
        let mut rec = StoreReconciler::new(&mut store, &mut log, h.clone());
        rec.apply(&chunk(2, "draft")).unwrap();
        rec.apply(&InboundMessage::SetCode {
            value: "<final/>".into(),
            variant_index: 2,
        })
        .unwrap();
        assert_eq!(store.get(&h).unwrap().variants[2].code, "<final/>");
    }

    #[test]
    fn status_lines_go_to_execution_log_only() {
        let (mut store, mut log, h) = setup();
        let mut rec = StoreReconciler::new(&mut store, &mut log, h.clone());
        rec.apply(&InboundMessage::Status {
            value: "Generating images...".into(),
            variant_index: 1,
        })
        .unwrap();
        assert_eq!(log.lines(1), ["Generating images..."]);
        assert_eq!(store.get(&h).unwrap().variants[1].code, "");
    }

    #[test]
    fn variant_error_is_isolated() {
        let (mut store, mut log, h) = setup();
        let mut rec = StoreReconciler::new(&mut store, &mut log, h.clone());
        rec.apply(&InboundMessage::VariantError {
            value: "timeout".into(),
            variant_index: 0,
        })
        .unwrap();
        rec.apply(&chunk(1, "still going")).unwrap();

        let commit = store.get(&h).unwrap();
        assert_eq!(commit.variants[0].status, VariantStatus::Error);
        assert_eq!(commit.variants[0].error_message.as_deref(), Some("timeout"));
        assert_eq!(commit.variants[1].code, "still going");
        assert_eq!(commit.variants[1].status, VariantStatus::Generating);
    }

    #[test]
    fn variant_count_shrinks_then_stale_index_errors() {
        let (mut store, mut log, h) = setup();
        let mut rec = StoreReconciler::new(&mut store, &mut log, h.clone());
        rec.apply(&chunk(0, "zero")).unwrap();
        rec.apply(&InboundMessage::VariantCount { value: 3 }).unwrap();
        assert_matches!(
            rec.apply(&chunk(3, "late")),
            Err(CoreError::VariantOutOfRange { index: 3, len: 3, .. })
        );
        rec.apply(&chunk(1, "one")).unwrap();

        let commit = store.get(&h).unwrap();
        assert_eq!(commit.variants.len(), 3);
        assert_eq!(commit.variants[0].code, "zero");
        assert_eq!(commit.variants[1].code, "one");
    }

    #[test]
    fn oversized_variant_count_is_rejected_without_touching_slots() {
        let (mut store, mut log, h) = setup();
        let msg = crate::messages::parse_message(
            r#"{"type":"variantCount","value":"9223372036854775807","variantIndex":0}"#,
        )
        .unwrap();

        let mut rec = StoreReconciler::new(&mut store, &mut log, h.clone());
        assert_matches!(rec.apply(&msg), Err(CoreError::Validation(_)));
        rec.apply(&chunk(0, "still streaming")).unwrap();

        let commit = store.get(&h).unwrap();
        assert_eq!(commit.variants.len(), 4);
        assert_eq!(commit.variants[0].code, "still streaming");
    }

    #[test]
    fn completing_all_slots_readies_commit() {
        let (mut store, mut log, h) = setup();
        let mut rec = StoreReconciler::new(&mut store, &mut log, h.clone());
        rec.apply(&InboundMessage::VariantCount { value: 2 }).unwrap();
        for i in 0..2 {
            rec.apply(&InboundMessage::VariantComplete { variant_index: i })
                .unwrap();
        }
        assert!(rec.apply(&chunk(0, "after")).is_err());
        assert_eq!(store.get(&h).unwrap().status(), CommitStatus::Ready);
    }

    #[test]
    fn credits_and_channel_errors_are_collected() {
        let (mut store, mut log, h) = setup();
        let mut rec = StoreReconciler::new(&mut store, &mut log, h);
        rec.apply(&InboundMessage::Credits { value: 12 }).unwrap();
        rec.apply(&InboundMessage::Credits { value: 11 }).unwrap();
        rec.apply(&InboundMessage::Error {
            value: "No OpenAI key".into(),
        })
        .unwrap();

        assert_eq!(rec.take_credits(), Some(11));
        assert_eq!(rec.take_credits(), None);
        assert_eq!(rec.take_channel_errors(), vec!["No OpenAI key".to_string()]);
        assert!(rec.take_channel_errors().is_empty());
    }

    /// Records calls to check routing independent of the store.
    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl GenerationSink for Recorder {
        fn on_chunk(&mut self, i: usize, t: &str) -> Result<(), CoreError> {
            self.0.push(format!("chunk:{i}:{t}"));
            Ok(())
        }
        fn on_set_code(&mut self, i: usize, c: &str) -> Result<(), CoreError> {
            self.0.push(format!("set:{i}:{c}"));
            Ok(())
        }
        fn on_status(&mut self, i: usize, l: &str) {
            self.0.push(format!("status:{i}:{l}"));
        }
        fn on_variant_complete(&mut self, i: usize) -> Result<(), CoreError> {
            self.0.push(format!("complete:{i}"));
            Ok(())
        }
        fn on_variant_error(&mut self, i: usize, e: &str) -> Result<(), CoreError> {
            self.0.push(format!("error:{i}:{e}"));
            Ok(())
        }
        fn on_variant_count(&mut self, n: usize) -> Result<(), CoreError> {
            self.0.push(format!("count:{n}"));
            Ok(())
        }
        fn on_credits(&mut self, b: i64) {
            self.0.push(format!("credits:{b}"));
        }
        fn on_channel_error(&mut self, m: &str) {
            self.0.push(format!("channel:{m}"));
        }
    }

    #[test]
    fn dispatch_calls_exactly_one_method_per_message() {
        let mut rec = Recorder::default();
        let messages = [
            chunk(0, "x"),
            InboundMessage::SetCode {
                value: "y".into(),
                variant_index: 1,
            },
            InboundMessage::Status {
                value: "s".into(),
                variant_index: 2,
            },
            InboundMessage::VariantComplete { variant_index: 0 },
            InboundMessage::VariantError {
                value: "e".into(),
                variant_index: 1,
            },
            InboundMessage::VariantCount { value: 3 },
            InboundMessage::Credits { value: 5 },
            InboundMessage::Error { value: "bad".into() },
        ];
        for m in &messages {
            dispatch(&mut rec, m).unwrap();
        }
        assert_eq!(
            rec.0,
            vec![
                "chunk:0:x",
                "set:1:y",
                "status:2:s",
                "complete:0",
                "error:1:e",
                "count:3",
                "credits:5",
                "channel:bad",
            ]
        );
    }
}
