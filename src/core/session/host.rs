//! Host runtime capability interface.
//!
//! The coordinator never talks to the surrounding plugin runtime directly.
//! Everything it needs goes through [`HostEnv`]: issuing commands (flush,
//! tool calls, history retrieval), publishing data records (transcripts,
//! storage mirrors, statistics) and playing audio frames.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::core::realtime::{RealtimeResult, Role};

/// Interrupt downstream playback.
pub const CMD_FLUSH: &str = "flush";
/// Execute a registered tool.
pub const CMD_TOOL_CALL: &str = "tool_call";
/// Load stored conversation history.
pub const CMD_RETRIEVE: &str = "retrieve";
/// A user joined the room.
pub const CMD_ON_USER_JOINED: &str = "on_user_joined";
/// A user left the room.
pub const CMD_ON_USER_LEFT: &str = "on_user_left";
/// Register a tool the model may call.
pub const CMD_TOOL_REGISTER: &str = "tool_register";

/// Transcript segment record.
pub const DATA_TEXT: &str = "text_data";
/// Storage mirror record for an appended turn.
pub const DATA_APPEND: &str = "append";
/// Usage and latency statistics record.
pub const DATA_LLM_STAT: &str = "llm_stat";

/// Property carrying a tool result on a `tool_call` reply.
pub const PROPERTY_TOOL_RESULT: &str = "tool_result";
/// Property carrying the JSON history on a `retrieve` reply.
pub const PROPERTY_RESPONSE: &str = "response";
/// Property carrying tool metadata on `tool_register`.
pub const PROPERTY_TOOL: &str = "tool";

/// Outcome of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Error,
}

/// A named command with JSON properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub properties: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Reply to a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub struct CmdResult {
    pub status: StatusCode,
    pub properties: Map<String, Value>,
}

impl CmdResult {
    pub fn ok() -> Self {
        Self {
            status: StatusCode::Ok,
            properties: Map::new(),
        }
    }

    /// An error result with a `detail` property.
    pub fn error(detail: impl Into<String>) -> Self {
        Self::with_status(StatusCode::Error).with_property("detail", detail.into())
    }

    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::Ok
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A named data record with JSON properties.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub name: String,
    pub properties: Map<String, Value>,
}

impl DataRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// A `text_data` transcript segment.
    pub fn transcript(
        text: impl Into<String>,
        end_of_segment: bool,
        role: Role,
        stream_id: u32,
    ) -> Self {
        Self::new(DATA_TEXT)
            .with_property("text", text.into())
            .with_property("end_of_segment", end_of_segment)
            .with_property("role", role.as_str())
            .with_property("stream_id", stream_id)
    }

    /// An `append` storage mirror record.
    pub fn append(text: impl Into<String>, role: Role, stream_id: u32) -> Self {
        Self::new(DATA_APPEND)
            .with_property("text", text.into())
            .with_property("role", role.as_str())
            .with_property("stream_id", stream_id)
    }

    pub fn text(&self) -> Option<&str> {
        self.properties.get("text").and_then(Value::as_str)
    }

    pub fn end_of_segment(&self) -> bool {
        self.properties
            .get("end_of_segment")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn role(&self) -> Option<&str> {
        self.properties.get("role").and_then(Value::as_str)
    }

    pub fn stream_id(&self) -> Option<u64> {
        self.properties.get("stream_id").and_then(Value::as_u64)
    }
}

/// Sample layout of an [`AudioFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataLayout {
    #[default]
    Interleaved,
    NonInterleaved,
}

/// Audio frame handed to the host for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub name: String,
    pub buf: Bytes,
    pub sample_rate: u32,
    pub bytes_per_sample: u32,
    pub channels: u32,
    pub samples_per_channel: u32,
    pub layout: DataLayout,
}

impl AudioFrame {
    /// A mono, interleaved PCM16 frame.
    pub fn pcm16_mono(buf: Bytes, sample_rate: u32) -> Self {
        let samples_per_channel = (buf.len() / 2) as u32;
        Self {
            name: "pcm_frame".to_string(),
            buf,
            sample_rate,
            bytes_per_sample: 2,
            channels: 1,
            samples_per_channel,
            layout: DataLayout::Interleaved,
        }
    }
}

/// Microphone audio delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundAudio {
    pub buf: Bytes,
    /// Logical stream of the speaking user
    pub stream_id: u32,
    /// Room or channel name, used for dump file names
    pub channel: Option<String>,
}

impl InboundAudio {
    pub fn new(buf: impl Into<Bytes>, stream_id: u32) -> Self {
        Self {
            buf: buf.into(),
            stream_id,
            channel: None,
        }
    }
}

/// Camera frame delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub buf: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Capabilities the host runtime provides to a session.
#[async_trait]
pub trait HostEnv: Send + Sync + 'static {
    /// Send a command and wait for its result.
    async fn send_cmd(&self, cmd: Command) -> RealtimeResult<CmdResult>;

    /// Publish a data record.
    async fn send_data(&self, data: DataRecord) -> RealtimeResult<()>;

    /// Play an audio frame.
    async fn send_audio_frame(&self, frame: AudioFrame) -> RealtimeResult<()>;
}

/// Shared host handle.
pub type SharedHost = Arc<dyn HostEnv>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_record() {
        let record = DataRecord::transcript("Hello.", false, Role::Assistant, 0);
        assert_eq!(record.name, DATA_TEXT);
        assert_eq!(record.text(), Some("Hello."));
        assert!(!record.end_of_segment());
        assert_eq!(record.role(), Some("assistant"));
        assert_eq!(record.stream_id(), Some(0));
    }

    #[test]
    fn test_pcm16_frame_layout() {
        let frame = AudioFrame::pcm16_mono(Bytes::from(vec![0u8; 960]), 24000);
        assert_eq!(frame.samples_per_channel, 480);
        assert_eq!(frame.bytes_per_sample, 2);
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.layout, DataLayout::Interleaved);
    }

    #[test]
    fn test_cmd_result_helpers() {
        let err = CmdResult::error("boom");
        assert!(!err.is_ok());
        assert_eq!(err.property("detail").and_then(Value::as_str), Some("boom"));

        let ok = CmdResult::ok().with_property("response", "[]");
        assert!(ok.is_ok());
    }
}
