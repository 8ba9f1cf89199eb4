use super::super::transcript::{Message, Transcript};
use super::watchdog::Heartbeat;
use crate::types::ToolCall;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FILE_URL_BASE: &str = "/api/files";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    /// `open` is the index of the message currently receiving deltas.
    Running {
        open: Option<usize>,
    },
    AwaitingToolOutput {
        run_id: String,
    },
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    #[error("{0}")]
    Provider(String),
    #[error("stream ended before the run completed")]
    PrematureEnd,
    #[error("no stream activity for {}ms", .0.as_millis())]
    Stalled(Duration),
    #[error("tool call failed: {0}")]
    Tool(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// What the caller has to do after feeding one event to the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReducerEffect {
    Continue,
    SubmitToolOutputs {
        run_id: String,
        tool_calls: Vec<ToolCall>,
    },
    Finished,
    Failed(RunFailure),
    /// The run is already over (or never started); the event changed nothing.
    Ignored,
}

pub struct StreamReducer {
    pub(super) transcript: Transcript,
    pub(super) phase: RunPhase,
    /// Most recent assistant message of the current run, open or closed.
    pub(super) annotation_target: Option<usize>,
    pub(super) file_url_base: String,
    pub(super) heartbeat: Arc<Heartbeat>,
}

impl StreamReducer {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            phase: RunPhase::Idle,
            annotation_target: None,
            file_url_base: DEFAULT_FILE_URL_BASE.to_string(),
            heartbeat: Arc::new(Heartbeat::new()),
        }
    }

    pub fn with_file_url_base(mut self, base: impl Into<String>) -> Self {
        self.file_url_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    pub fn heartbeat(&self) -> Arc<Heartbeat> {
        Arc::clone(&self.heartbeat)
    }

    pub fn input_enabled(&self) -> bool {
        matches!(
            self.phase,
            RunPhase::Idle | RunPhase::Completed | RunPhase::Failed
        )
    }

    /// Appends the user's message and starts a fresh run.
    pub fn begin_run(&mut self, user_text: &str) {
        self.transcript.push(Message::user(user_text));
        self.phase = RunPhase::Running { open: None };
        self.annotation_target = None;
        self.heartbeat.touch();
    }

    /// Leaves `AwaitingToolOutput` once the outputs have been submitted.
    pub fn resume(&mut self) -> bool {
        if !matches!(self.phase, RunPhase::AwaitingToolOutput { .. }) {
            return false;
        }
        self.phase = RunPhase::Running { open: None };
        self.heartbeat.touch();
        true
    }

    /// Marks the run failed from outside the event sequence (stall, transport,
    /// tool errors). Returns false when the run had already ended.
    pub fn fail(&mut self, failure: &RunFailure) -> bool {
        if self.phase.is_terminal() || self.phase == RunPhase::Idle {
            return false;
        }
        tracing::warn!(%failure, "run stopped");
        self.phase = RunPhase::Failed;
        true
    }

    /// Completes a run whose whole reply arrived at once. `None` completes the
    /// run without adding a message.
    pub fn finish_with_reply(&mut self, reply: Option<&str>) {
        if self.phase.is_terminal() || self.phase == RunPhase::Idle {
            return;
        }
        if let Some(reply) = reply {
            let index = self.transcript.push(Message::assistant(reply));
            self.annotation_target = Some(index);
        }
        self.phase = RunPhase::Completed;
    }
}
