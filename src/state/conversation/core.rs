use super::super::transcript::Transcript;
use super::state::{ReducerEffect, RunFailure, RunPhase, StreamReducer, DEFAULT_FILE_URL_BASE};
use super::tools::run_tool_calls;
use super::watchdog::Watchdog;
use crate::api::{ByteStream, ChatBackend, StreamParser};
use crate::config::Config;
use crate::tools::ToolRegistry;
use crate::types::{StreamEvent, ToolCall};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub heartbeat_interval: Duration,
    pub tool_timeout: Duration,
    pub file_url_base: String,
    pub greeting: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(15_000),
            tool_timeout: Duration::from_secs(30),
            file_url_base: DEFAULT_FILE_URL_BASE.to_string(),
            greeting: None,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval,
            tool_timeout: config.tool_timeout,
            greeting: config.greeting.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Blank input; nothing was sent.
    Skipped,
    Completed,
    Failed(RunFailure),
}

enum Consumed {
    Finished,
    ToolCalls {
        run_id: String,
        tool_calls: Vec<ToolCall>,
    },
    Failed(RunFailure),
}

/// One conversation: a thread on the backend plus the transcript built from
/// its runs.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    tools: ToolRegistry,
    reducer: StreamReducer,
    thread_id: Option<String>,
    options: SessionOptions,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, tools: ToolRegistry, options: SessionOptions) -> Self {
        let transcript = Transcript::with_greeting(options.greeting.as_deref());
        let reducer = StreamReducer::new(transcript).with_file_url_base(&options.file_url_base);
        Self {
            backend,
            tools,
            reducer,
            thread_id: None,
            options,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        self.reducer.transcript()
    }

    pub fn phase(&self) -> &RunPhase {
        self.reducer.phase()
    }

    pub fn input_enabled(&self) -> bool {
        self.reducer.input_enabled()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Creates the backend thread if this session has none yet.
    pub async fn start(&mut self) -> anyhow::Result<String> {
        if let Some(thread_id) = &self.thread_id {
            return Ok(thread_id.clone());
        }
        let thread_id = self.backend.create_thread().await?;
        tracing::info!(%thread_id, "thread created");
        self.thread_id = Some(thread_id.clone());
        Ok(thread_id)
    }

    /// Sends `content` and reduces the streamed run, including any tool-call
    /// round trips, until it completes or fails.
    pub async fn send_message(&mut self, content: &str) -> RunOutcome {
        if content.trim().is_empty() {
            return RunOutcome::Skipped;
        }
        self.reducer.begin_run(content);

        let thread_id = match self.start().await {
            Ok(thread_id) => thread_id,
            Err(error) => return self.stop(RunFailure::Transport(format!("{error:#}"))),
        };

        let mut stream = match self.backend.stream_message(&thread_id, content).await {
            Ok(stream) => stream,
            Err(error) => return self.stop(RunFailure::Transport(format!("{error:#}"))),
        };

        loop {
            match self.consume(stream).await {
                Consumed::Finished => {
                    tracing::info!(%thread_id, "run completed");
                    return RunOutcome::Completed;
                }
                Consumed::Failed(failure) => return self.stop(failure),
                Consumed::ToolCalls { run_id, tool_calls } => {
                    tracing::info!(%run_id, count = tool_calls.len(), "submitting tool outputs");
                    let outputs =
                        match run_tool_calls(&self.tools, &tool_calls, self.options.tool_timeout)
                            .await
                        {
                            Ok(outputs) => outputs,
                            Err(failure) => return self.stop(failure),
                        };
                    stream = match self
                        .backend
                        .submit_tool_outputs(&thread_id, &run_id, &outputs)
                        .await
                    {
                        Ok(stream) => stream,
                        Err(error) => {
                            return self.stop(RunFailure::Transport(format!("{error:#}")))
                        }
                    };
                    self.reducer.resume();
                }
            }
        }
    }

    /// Sends `content` and waits for the server to assemble the whole reply.
    pub async fn send_message_polled(&mut self, content: &str) -> RunOutcome {
        if content.trim().is_empty() {
            return RunOutcome::Skipped;
        }
        self.reducer.begin_run(content);

        let thread_id = match self.start().await {
            Ok(thread_id) => thread_id,
            Err(error) => return self.stop(RunFailure::Transport(format!("{error:#}"))),
        };

        match self.backend.post_message(&thread_id, content).await {
            Ok(reply) => {
                let content = reply
                    .as_ref()
                    .map(|payload| payload.content.as_str())
                    .filter(|content| !content.is_empty());
                if content.is_none() {
                    tracing::warn!(%thread_id, "run finished without assistant content");
                }
                self.reducer.finish_with_reply(content);
                RunOutcome::Completed
            }
            Err(error) => self.stop(RunFailure::Transport(format!("{error:#}"))),
        }
    }

    fn stop(&mut self, failure: RunFailure) -> RunOutcome {
        self.reducer.fail(&failure);
        RunOutcome::Failed(failure)
    }

    async fn consume(&mut self, mut stream: ByteStream) -> Consumed {
        // Silence is measured from the moment the stream opens.
        self.reducer.heartbeat().touch();
        let watchdog = Watchdog::spawn(self.reducer.heartbeat(), self.options.heartbeat_interval);
        let stalled = watchdog.stalled();
        let mut parser = StreamParser::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = stalled.cancelled() => {
                    return Consumed::Failed(RunFailure::Stalled(watchdog.threshold()));
                }
                next = stream.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => return Consumed::Failed(RunFailure::Transport(format!("{error:#}"))),
            };
            let events = match parser.process(&chunk) {
                Ok(events) => events,
                Err(error) => return Consumed::Failed(RunFailure::Transport(format!("{error:#}"))),
            };

            for event in events {
                if let Some(consumed) = self.settle(event) {
                    return consumed;
                }
            }
        }

        let leftover = parser.flush();
        if !leftover.trim().is_empty() {
            tracing::debug!(leftover, "stream closed mid-frame");
        }
        // A stream that closes without `done` ends the run the same way.
        self.settle(StreamEvent::End)
            .unwrap_or(Consumed::Failed(RunFailure::PrematureEnd))
    }

    fn settle(&mut self, event: StreamEvent) -> Option<Consumed> {
        match self.reducer.apply(event) {
            ReducerEffect::Continue | ReducerEffect::Ignored => None,
            ReducerEffect::SubmitToolOutputs { run_id, tool_calls } => {
                Some(Consumed::ToolCalls { run_id, tool_calls })
            }
            ReducerEffect::Finished => Some(Consumed::Finished),
            ReducerEffect::Failed(failure) => Some(Consumed::Failed(failure)),
        }
    }
}
