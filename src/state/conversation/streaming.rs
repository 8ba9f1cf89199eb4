use super::super::transcript::{Message, Role};
use super::state::{ReducerEffect, RunFailure, RunPhase, StreamReducer};
use crate::types::{Annotation, StreamEvent};
use aho_corasick::{AhoCorasick, MatchKind};

impl StreamReducer {
    pub fn apply(&mut self, event: StreamEvent) -> ReducerEffect {
        match self.phase {
            RunPhase::Idle | RunPhase::Completed | RunPhase::Failed => {
                tracing::debug!(?event, phase = ?self.phase, "event outside an active run");
                return ReducerEffect::Ignored;
            }
            RunPhase::Running { .. } | RunPhase::AwaitingToolOutput { .. } => {}
        }
        self.heartbeat.touch();

        match event {
            StreamEvent::TextCreated => {
                self.open_message(Role::Assistant);
                ReducerEffect::Continue
            }
            StreamEvent::TextDelta { value, annotations } => {
                if let Some(value) = value {
                    let index = self.open_index_for(Role::Assistant);
                    self.transcript.append_to(index, &value);
                }
                if !annotations.is_empty() {
                    self.rewrite_annotations(&annotations);
                }
                ReducerEffect::Continue
            }
            StreamEvent::CodeCreated => {
                self.open_message(Role::Code);
                ReducerEffect::Continue
            }
            StreamEvent::CodeDelta { input } => {
                let index = self.open_index_for(Role::Code);
                self.transcript.append_to(index, &input);
                ReducerEffect::Continue
            }
            StreamEvent::ToolCallRequired { run_id, tool_calls } => {
                self.phase = RunPhase::AwaitingToolOutput {
                    run_id: run_id.clone(),
                };
                ReducerEffect::SubmitToolOutputs { run_id, tool_calls }
            }
            StreamEvent::RunCompleted => {
                self.phase = RunPhase::Completed;
                ReducerEffect::Finished
            }
            StreamEvent::Error { message } => {
                self.phase = RunPhase::Failed;
                ReducerEffect::Failed(RunFailure::Provider(message))
            }
            StreamEvent::End => {
                // The provider closes the stream right after asking for tool outputs.
                if matches!(self.phase, RunPhase::AwaitingToolOutput { .. }) {
                    return ReducerEffect::Continue;
                }
                self.phase = RunPhase::Failed;
                ReducerEffect::Failed(RunFailure::PrematureEnd)
            }
            StreamEvent::Unknown => ReducerEffect::Continue,
        }
    }

    fn open_message(&mut self, role: Role) -> usize {
        let index = self.transcript.push(Message {
            role,
            text: String::new(),
        });
        if role == Role::Assistant {
            self.annotation_target = Some(index);
        }
        self.phase = RunPhase::Running { open: Some(index) };
        index
    }

    /// Index of the open message with `role`, opening one if needed.
    fn open_index_for(&mut self, role: Role) -> usize {
        if let RunPhase::Running { open: Some(index) } = self.phase {
            if self.transcript.messages().get(index).map(|m| m.role) == Some(role) {
                return index;
            }
        }
        self.open_message(role)
    }

    fn rewrite_annotations(&mut self, annotations: &[Annotation]) {
        let Some(index) = self.annotation_target else {
            return;
        };

        let mut patterns = Vec::new();
        let mut replacements = Vec::new();
        for annotation in annotations {
            let (Some(text), Some(file_id)) = (annotation.text(), annotation.file_id()) else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            patterns.push(text.to_string());
            replacements.push(format!("{}/{}", self.file_url_base, file_id));
        }
        if patterns.is_empty() {
            return;
        }

        let matcher = match AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&patterns)
        {
            Ok(matcher) => matcher,
            Err(error) => {
                tracing::warn!(%error, "skipping annotation rewrite");
                return;
            }
        };

        if let Some(message) = self.transcript.get_mut(index) {
            message.text = matcher.replace_all(&message.text, &replacements);
        }
    }
}
