//! Realtime WebSocket message types.
//!
//! Client and server events of the realtime conversation protocol spoken by
//! OpenAI-compatible services (OpenAI Realtime, Qwen-Omni realtime). All
//! events are JSON objects discriminated by their `type` field.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Update session configuration
//! - input_audio_buffer.append - Append audio to buffer
//! - input_audio_buffer.commit - Commit audio buffer
//! - input_audio_buffer.clear - Clear audio buffer
//! - input_image_buffer.append - Append a JPEG frame
//! - conversation.item.create - Add item to conversation
//! - conversation.item.truncate - Cut an assistant item at a playback offset
//! - conversation.item.delete - Delete conversation item
//! - response.create - Generate a response
//! - response.cancel - Cancel current response
//!
//! Server events are listed on [`ServerEvent`]. Types this crate does not
//! model deserialize to [`ServerEvent::Unknown`] instead of failing.

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::base::{
    InputTranscriptionConfig, RealtimeError, RealtimeResult, ToolDefinition, TurnDetectionConfig,
};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session parameters sent with `session.update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Model name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    /// Output audio format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputTranscriptionConfig>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetectionConfig>,

    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Temperature for response generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum response output tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<u32>,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type (message, function_call, function_call_output)
    #[serde(rename = "type", default)]
    pub item_type: String,
    /// Item status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Item role (user, assistant, system)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    /// Call ID for function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function name for function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Function arguments for function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Function output for function call result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// A user message carrying one `input_text` part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(vec![ContentPart::text("input_text", text)]),
            ..Default::default()
        }
    }

    /// An assistant message carrying one `text` part.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("assistant".to_string()),
            content: Some(vec![ContentPart::text("text", text)]),
            ..Default::default()
        }
    }

    /// The result of a tool invocation.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.into()),
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn is_function_call(&self) -> bool {
        self.item_type == "function_call"
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type (input_text, input_audio, text, audio)
    #[serde(rename = "type", default)]
    pub content_type: String,
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Audio content (base64 encoded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Transcript of audio content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl ContentPart {
    fn text(content_type: &str, text: impl Into<String>) -> Self {
        Self {
            content_type: content_type.to_string(),
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Response Configuration
// =============================================================================

/// Per-response overrides for `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Response modalities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    /// Instructions for this response only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Voice for audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Tool choice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the realtime service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionUpdate,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Commit the input audio buffer
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Clear the input audio buffer
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,

    /// Append a camera frame
    #[serde(rename = "input_image_buffer.append")]
    InputImageBufferAppend {
        /// Base64-encoded JPEG
        image: String,
    },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
        /// Previous item ID to insert after
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
    },

    /// Truncate a conversation item
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        /// Item ID
        item_id: String,
        /// Content index
        content_index: u32,
        /// Audio end in ms
        audio_end_ms: u64,
    },

    /// Delete a conversation item
    #[serde(rename = "conversation.item.delete")]
    ConversationItemDelete {
        /// Item ID
        item_id: String,
    },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Response configuration
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },

    /// Cancel the current response
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Create an image append event from JPEG bytes.
    pub fn image_append(jpeg: &[u8]) -> Self {
        ClientEvent::InputImageBufferAppend {
            image: BASE64_STANDARD.encode(jpeg),
        }
    }

    pub fn item_create(item: ConversationItem) -> Self {
        ClientEvent::ConversationItemCreate {
            item,
            previous_item_id: None,
        }
    }

    /// Wire name of the event.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientEvent::InputAudioBufferClear => "input_audio_buffer.clear",
            ClientEvent::InputImageBufferAppend { .. } => "input_image_buffer.append",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ConversationItemTruncate { .. } => "conversation.item.truncate",
            ClientEvent::ConversationItemDelete { .. } => "conversation.item.delete",
            ClientEvent::ResponseCreate { .. } => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the realtime service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: Session,
    },

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session information
        session: Session,
    },

    /// Speech started (VAD detected speech)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        /// Audio start timestamp in ms
        #[serde(default)]
        audio_start_ms: u64,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Speech stopped (VAD detected silence)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        /// Audio end timestamp in ms
        #[serde(default)]
        audio_end_ms: u64,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Audio buffer committed
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        /// Previous item ID
        #[serde(default)]
        previous_item_id: Option<String>,
        /// New item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Audio buffer cleared
    #[serde(rename = "input_audio_buffer.cleared")]
    InputAudioBufferCleared,

    /// Conversation item created
    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated {
        /// Previous item ID
        #[serde(default)]
        previous_item_id: Option<String>,
        /// Created item
        item: ConversationItem,
    },

    /// Input audio transcription completed
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Transcript text
        transcript: String,
    },

    /// Input audio transcription failed
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    TranscriptionFailed {
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Error details
        error: ApiError,
    },

    /// Conversation item truncated
    #[serde(rename = "conversation.item.truncated")]
    ConversationItemTruncated {
        /// Item ID
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Audio end in ms
        #[serde(default)]
        audio_end_ms: u64,
    },

    /// Conversation item deleted
    #[serde(rename = "conversation.item.deleted")]
    ConversationItemDeleted {
        /// Item ID
        item_id: String,
    },

    /// Response created
    #[serde(rename = "response.created")]
    ResponseCreated {
        /// Response information
        response: Response,
    },

    /// Response done
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response information
        response: Response,
    },

    /// Output item added to response
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Response ID
        #[serde(default)]
        response_id: String,
        /// Output index
        #[serde(default)]
        output_index: u32,
        /// Item
        item: ConversationItem,
    },

    /// Output item done
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Response ID
        #[serde(default)]
        response_id: String,
        /// Output index
        #[serde(default)]
        output_index: u32,
        /// Item
        item: ConversationItem,
    },

    /// Content part added
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        /// Response ID
        #[serde(default)]
        response_id: String,
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Content part
        part: ContentPart,
    },

    /// Content part done
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        /// Response ID
        #[serde(default)]
        response_id: String,
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Content part
        part: ContentPart,
    },

    /// Text delta
    #[serde(rename = "response.text.delta")]
    TextDelta {
        /// Response ID
        response_id: String,
        /// Item ID
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Text delta
        delta: String,
    },

    /// Text done
    #[serde(rename = "response.text.done")]
    TextDone {
        /// Response ID
        response_id: String,
        /// Item ID
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Full text
        text: String,
    },

    /// Audio transcript delta
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        /// Response ID
        response_id: String,
        /// Item ID
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Transcript delta
        delta: String,
    },

    /// Audio transcript done
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        /// Response ID
        response_id: String,
        /// Item ID
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Full transcript
        transcript: String,
    },

    /// Audio delta (audio data chunk)
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Response ID
        response_id: String,
        /// Item ID
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
        /// Base64-encoded audio delta
        delta: String,
    },

    /// Audio done
    #[serde(rename = "response.audio.done")]
    AudioDone {
        /// Response ID
        #[serde(default)]
        response_id: String,
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Content index
        #[serde(default)]
        content_index: u32,
    },

    /// Function call arguments delta
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Response ID
        #[serde(default)]
        response_id: String,
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Call ID
        call_id: String,
        /// Arguments delta
        delta: String,
    },

    /// Function call arguments done
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        /// Response ID
        #[serde(default)]
        response_id: String,
        /// Item ID
        #[serde(default)]
        item_id: String,
        /// Call ID
        call_id: String,
        /// Function name (not sent by every service)
        #[serde(default)]
        name: Option<String>,
        /// Full arguments
        arguments: String,
    },

    /// Rate limits updated
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {
        /// Rate limit information
        #[serde(default)]
        rate_limits: Vec<RateLimit>,
    },

    /// Any event type not modelled above
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Parse one text frame.
    pub fn parse(text: &str) -> RealtimeResult<Self> {
        serde_json::from_str(text).map_err(|e| RealtimeError::Protocol(e.to_string()))
    }

    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
    /// Parameter that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Event ID that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Session information as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Session {
    /// Session ID
    #[serde(default)]
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Response modalities
    #[serde(default)]
    pub modalities: Vec<String>,
    /// Voice
    #[serde(default)]
    pub voice: Option<String>,
    /// Turn detection config
    #[serde(default)]
    pub turn_detection: Option<TurnDetectionConfig>,
}

/// Response information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Response {
    /// Response ID
    #[serde(default)]
    pub id: String,
    /// Response status
    #[serde(default)]
    pub status: String,
    /// Output items
    #[serde(default)]
    pub output: Vec<ConversationItem>,
    /// Usage information
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Token usage reported with `response.done`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Usage {
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u64,
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u64,
    /// Input token details
    #[serde(default)]
    pub input_token_details: Option<TokenDetails>,
    /// Output token details
    #[serde(default)]
    pub output_token_details: Option<TokenDetails>,
}

/// Token usage details.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TokenDetails {
    /// Cached tokens
    #[serde(default)]
    pub cached_tokens: u64,
    /// Text tokens
    #[serde(default)]
    pub text_tokens: u64,
    /// Audio tokens
    #[serde(default)]
    pub audio_tokens: u64,
}

/// Rate limit information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RateLimit {
    /// Rate limit name
    #[serde(default)]
    pub name: String,
    /// Limit value
    #[serde(default)]
    pub limit: u64,
    /// Remaining value
    #[serde(default)]
    pub remaining: u64,
    /// Reset timestamp
    #[serde(default)]
    pub reset_seconds: f64,
}

// =============================================================================
// Tests
// =============================================================================
