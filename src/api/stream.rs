use super::logging::emit_sse_parse_error;
use crate::types::{Annotation, Run, StreamEvent};
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

/// Incremental SSE decoder for the provider's run event stream.
///
/// Bytes may be split anywhere, including inside a UTF-8 sequence; a frame is
/// only decoded once its blank-line terminator has arrived.
#[derive(Default)]
pub struct StreamParser {
    buffer: Vec<u8>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;

        while let Some((frame_len, terminator_len)) = find_frame_end(&self.buffer[start..]) {
            let frame = String::from_utf8_lossy(&self.buffer[start..start + frame_len]);
            start += frame_len + terminator_len;

            let mut event_type: Option<String> = None;
            let mut data_lines: Vec<&str> = Vec::new();
            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event_type = Some(rest.trim().to_string());
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
                }
            }

            let Some(event_type) = event_type else {
                continue;
            };
            let data = data_lines.join("\n");

            match map_event(&event_type, data.trim()) {
                Ok(mapped) => events.extend(mapped),
                Err(error) => emit_sse_parse_error(Some(event_type.as_str()), &data, &error),
            }
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        Ok(events)
    }

    pub fn flush(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned()
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut index = 0;
    while index + 1 < buffer.len() {
        if buffer[index] == b'\n' && buffer[index + 1] == b'\n' {
            return Some((index, 2));
        }
        if buffer[index..].starts_with(b"\r\n\r\n") {
            return Some((index, 4));
        }
        index += 1;
    }
    None
}

#[derive(Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDeltaBody,
}

#[derive(Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    content: Vec<DeltaContent>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DeltaContent {
    Text {
        #[serde(default)]
        text: Option<DeltaText>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct DeltaText {
    #[serde(default)]
    value: Option<String>,
    /// Decoded one by one so a partial annotation cannot drop the value.
    #[serde(default)]
    annotations: Vec<Value>,
}

#[derive(Deserialize)]
struct RunStepDeltaEvent {
    delta: RunStepDeltaBody,
}

#[derive(Deserialize)]
struct RunStepDeltaBody {
    #[serde(default)]
    step_details: Option<StepDetailsDelta>,
}

#[derive(Deserialize)]
struct StepDetailsDelta {
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolCallDelta {
    CodeInterpreter {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        code_interpreter: Option<CodeInterpreterDelta>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct CodeInterpreterDelta {
    #[serde(default)]
    input: Option<String>,
}

fn map_event(event_type: &str, data: &str) -> serde_json::Result<Vec<StreamEvent>> {
    let event = match event_type {
        "thread.message.created" => StreamEvent::TextCreated,
        "thread.message.delta" => return map_message_delta(data),
        "thread.run.step.delta" => return map_step_delta(data),
        "thread.run.requires_action" => {
            let run: Run = serde_json::from_str(data)?;
            StreamEvent::ToolCallRequired {
                tool_calls: run.pending_tool_calls(),
                run_id: run.id,
            }
        }
        "thread.run.completed" => StreamEvent::RunCompleted,
        "thread.run.failed"
        | "thread.run.cancelled"
        | "thread.run.expired"
        | "thread.run.incomplete" => {
            let run: Run = serde_json::from_str(data)?;
            let message = run
                .last_error
                .and_then(|error| error.message)
                .unwrap_or_else(|| format!("Run failed with status: {}", run.status));
            StreamEvent::Error { message }
        }
        "error" => StreamEvent::Error {
            message: error_message(data),
        },
        "done" => StreamEvent::End,
        _ => StreamEvent::Unknown,
    };
    Ok(vec![event])
}

fn map_message_delta(data: &str) -> serde_json::Result<Vec<StreamEvent>> {
    let event: MessageDeltaEvent = serde_json::from_str(data)?;
    let mut value: Option<String> = None;
    let mut annotations = Vec::new();

    for part in event.delta.content {
        let DeltaContent::Text { text: Some(text) } = part else {
            continue;
        };
        if let Some(fragment) = text.value {
            value.get_or_insert_with(String::new).push_str(&fragment);
        }
        annotations.extend(text.annotations.into_iter().filter_map(decode_annotation));
    }

    if value.is_none() && annotations.is_empty() {
        return Ok(vec![StreamEvent::Unknown]);
    }
    Ok(vec![StreamEvent::TextDelta { value, annotations }])
}

fn decode_annotation(raw: Value) -> Option<Annotation> {
    match serde_json::from_value(raw) {
        Ok(annotation) => Some(annotation),
        Err(error) => {
            tracing::debug!(%error, "skipping incomplete annotation");
            None
        }
    }
}

fn map_step_delta(data: &str) -> serde_json::Result<Vec<StreamEvent>> {
    let event: RunStepDeltaEvent = serde_json::from_str(data)?;
    let mut events = Vec::new();

    let tool_calls = event
        .delta
        .step_details
        .map(|details| details.tool_calls)
        .unwrap_or_default();
    for call in tool_calls {
        let ToolCallDelta::CodeInterpreter {
            id,
            code_interpreter,
        } = call
        else {
            continue;
        };
        // The first delta of a call carries its id.
        if id.is_some() {
            events.push(StreamEvent::CodeCreated);
        }
        if let Some(input) = code_interpreter
            .and_then(|code| code.input)
            .filter(|input| !input.is_empty())
        {
            events.push(StreamEvent::CodeDelta { input });
        }
    }

    if events.is_empty() {
        events.push(StreamEvent::Unknown);
    }
    Ok(events)
}

fn error_message(data: &str) -> String {
    let parsed = serde_json::from_str::<Value>(data).ok();
    parsed
        .as_ref()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| data.to_string())
}
