//! Realtime multimodal service client.
//!
//! This module provides the wire protocol and the connection to a realtime
//! conversational model service (Qwen Omni or OpenAI Realtime).
//!
//! # Components
//!
//! - [`messages`]: typed client and server events (JSON, `type` tagged)
//! - [`ConnectionManager`]: one full-duplex channel with an ordered writer
//! - [`WebSocketConnector`]: the production transport (tokio-tungstenite)
//! - [`ReconnectionConfig`]: backoff policy used by the session coordinator
//!
//! # Audio Format
//!
//! PCM 16-bit signed little-endian, mono, 24kHz unless configured otherwise.
//!
//! # Example
//!
//! ```rust,ignore
//! use omni_v2v::core::realtime::{ClientEvent, ConnectionManager, WebSocketConnector, Vendor};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! let connector = WebSocketConnector::new(
//!     "wss://dashscope.aliyuncs.com/api-ws",
//!     "/v1/realtime",
//!     "qwen-omni-turbo-realtime",
//!     api_key,
//!     Vendor::Qwen,
//! )?;
//! let mut conn = ConnectionManager::new(Arc::new(connector), false);
//! conn.connect().await?;
//! conn.send_request(ClientEvent::InputAudioBufferCommit).await?;
//!
//! let events = conn.listen();
//! futures::pin_mut!(events);
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event);
//! }
//! ```

mod base;
mod config;
mod connection;
pub mod messages;

pub use base::{
    CoordinatorState, InputTranscriptionConfig, RealtimeError, RealtimeResult, ReconnectionConfig,
    Role, ToolDefinition, TurnDetectionConfig,
};
pub use config::{
    DEFAULT_REALTIME_MODEL, DEFAULT_SAMPLE_RATE, Modality, OPENAI_REALTIME_BASE_URI,
    QWEN_REALTIME_BASE_URI, REALTIME_PATH, RealtimeAudioFormat, Vendor,
};
pub use connection::{
    ConnectionManager, Connector, RequestSender, Transport, TransportSink, TransportStream,
    WebSocketConnector, build_ws_url,
};
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, RateLimit, Response, ResponseConfig,
    ServerEvent, Session, SessionUpdate, TokenDetails, Usage,
};
