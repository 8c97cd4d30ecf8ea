//! Session coordination on top of the realtime connection.
//!
//! [`SessionCoordinator`] owns the connection and the conversation state.
//! The host talks to it through a [`SessionHandle`] and receives output
//! through the [`HostEnv`] capability trait.

pub mod audio_ingest;
pub mod coordinator;
pub mod dump;
pub mod flushed;
pub mod host;
pub mod memory;
pub mod playback;
pub mod prompt;
pub mod stats;
pub mod tool_bridge;
pub mod transcript;
pub mod video;

use tokio::sync::watch;

use crate::core::realtime::RequestSender;

/// The live link as seen by side tasks: `Some` only while a session is active.
pub type LinkReceiver = watch::Receiver<Option<RequestSender>>;

pub use audio_ingest::{AUDIO_FLUSH_THRESHOLD, AudioIngestBuffer, IngestStatus};
pub use coordinator::{CmdOutcome, INTERRUPTED_SUFFIX, SessionCoordinator, SessionHandle};
pub use dump::AudioDump;
pub use flushed::{FLUSHED_CAPACITY, FlushedResponses};
pub use host::{
    AudioFrame, CmdResult, Command, DataLayout, DataRecord, HostEnv, InboundAudio, SharedHost,
    StatusCode, VideoFrame,
};
pub use memory::{ConversationMemory, ConversationTurn, MemoryEvent};
pub use stats::{LatencySummary, SessionStats, UsageTotals};
pub use tool_bridge::{
    PendingToolCall, TOOL_FAILURE_OUTPUT, ToolCallBridge, ToolMetadata, ToolParameter,
};
pub use transcript::TranscriptAssembler;
pub use video::{MAX_IMAGE_SIDE, PixelFormat, VIDEO_QUEUE_CAPACITY, VideoFrameThrottler};
