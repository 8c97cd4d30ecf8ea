//! Base types shared by the realtime connection and the session coordinator.
//!
//! This module defines the error taxonomy, the reconnection policy, the
//! turn-detection and tool definitions sent in `session.update`, and the
//! coordinator state enum.
//!
//! # Audio Format
//!
//! All audio exchanged with the service is PCM 16-bit signed little-endian,
//! mono, at the configured sample rate (24kHz by default).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while running a realtime session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Establishing or using the transport failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A request was issued while no channel is open
    #[error("Not connected")]
    NotConnected,

    /// The service sent something that could not be understood
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A tool round trip failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The host runtime rejected or failed a call
    #[error("Host error: {0}")]
    Host(String),

    /// Image or audio processing failed
    #[error("Media error: {0}")]
    Media(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Reconnection
// =============================================================================

/// Backoff policy applied between connection attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectionConfig {
    /// Maximum number of consecutive failed attempts before giving up.
    /// Set to 0 for unlimited attempts.
    /// Default: 0
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds).
    /// Default: 500ms
    pub initial_delay_ms: u64,

    /// Upper bound for the delay (milliseconds).
    /// Default: 30000ms
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    /// Default: 2.0
    pub backoff_multiplier: f32,

    /// Spread each delay by up to ±25%.
    /// Default: true
    pub jitter: bool,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 500,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectionConfig {
    /// Calculate the delay for a given attempt number (1-based) using
    /// exponential backoff. Returns the delay in milliseconds.
    pub fn calculate_delay(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = base_delay * multiplier.powi(exponent);
        let delay = delay.min(self.max_delay_ms as f64);

        if self.jitter && delay > 0.0 {
            let jitter_range = delay * 0.25;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (delay + jitter).max(0.0) as u64
        } else {
            delay as u64
        }
    }

    /// Delay for the given attempt as a [`Duration`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.calculate_delay(attempt))
    }

    /// Check if more reconnection attempts are allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }
}

// =============================================================================
// Session Parameters
// =============================================================================

/// Turn detection (VAD) settings carried in `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side energy VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Amount of audio to include before voice detection (ms)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration before end of turn (ms)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// Semantic-aware turn detection
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        /// Eagerness level (low, medium, high, auto)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
    /// No automatic turn detection
    #[serde(rename = "none")]
    None,
    /// A mode this crate does not know about
    #[serde(other)]
    Other,
}

impl TurnDetectionConfig {
    /// Wire name of the mode.
    pub fn mode(&self) -> &'static str {
        match self {
            TurnDetectionConfig::ServerVad { .. } => "server_vad",
            TurnDetectionConfig::SemanticVad { .. } => "semantic_vad",
            TurnDetectionConfig::None => "none",
            TurnDetectionConfig::Other => "other",
        }
    }
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
        }
    }
}

/// Configuration for input audio transcription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTranscriptionConfig {
    /// Model to use for transcription (e.g., "gummy-realtime-v1")
    pub model: String,
}

/// Tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl ToolDefinition {
    /// Build a function tool definition.
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: Option<serde_json::Value>,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            name: name.into(),
            description,
            parameters,
        }
    }
}

// =============================================================================
// Coordinator State
// =============================================================================

/// Lifecycle state of a session coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    /// No channel open; a reconnect may be pending
    #[default]
    Disconnected,
    /// Opening the channel
    Connecting,
    /// Channel open, waiting for `session.created`
    AwaitingSession,
    /// Session established; media and requests flow
    Active,
    /// Stopped by the host; terminal
    Stopped,
}

impl CoordinatorState {
    /// Whether requests can currently be sent.
    pub fn is_active(&self) -> bool {
        matches!(self, CoordinatorState::Active)
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorState::Disconnected => write!(f, "Disconnected"),
            CoordinatorState::Connecting => write!(f, "Connecting"),
            CoordinatorState::AwaitingSession => write!(f, "AwaitingSession"),
            CoordinatorState::Active => write!(f, "Active"),
            CoordinatorState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human speaking into the microphone
    User,
    /// The model
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_state_display() {
        assert_eq!(CoordinatorState::Active.to_string(), "Active");
        assert_eq!(CoordinatorState::Disconnected.to_string(), "Disconnected");
        assert_eq!(
            CoordinatorState::AwaitingSession.to_string(),
            "AwaitingSession"
        );
        assert!(CoordinatorState::Active.is_active());
        assert!(!CoordinatorState::Connecting.is_active());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_default_turn_detection() {
        let td = TurnDetectionConfig::default();
        match td {
            TurnDetectionConfig::ServerVad { threshold, .. } => {
                assert_eq!(threshold, Some(0.5));
            }
            _ => panic!("Expected ServerVad default"),
        }
    }

    #[test]
    fn test_turn_detection_serialization() {
        let json = serde_json::to_value(TurnDetectionConfig::SemanticVad {
            eagerness: Some("auto".to_string()),
        })
        .unwrap();
        assert_eq!(json["type"], "semantic_vad");
        assert_eq!(json["eagerness"], "auto");

        let none = serde_json::to_value(TurnDetectionConfig::None).unwrap();
        assert_eq!(none, serde_json::json!({"type": "none"}));
    }

    #[test]
    fn test_turn_detection_unknown_mode() {
        let td: TurnDetectionConfig =
            serde_json::from_str(r#"{"type":"push_to_talk","x":1}"#).unwrap();
        assert_eq!(td, TurnDetectionConfig::Other);
    }

    #[test]
    fn test_tool_definition_is_flat() {
        let tool = ToolDefinition::function("get_weather", Some("Weather".into()), None);
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["name"], "get_weather");
        assert!(json.get("parameters").is_none());
    }

    #[test]
    fn test_error_display() {
        let err = RealtimeError::Connection("refused".to_string());
        assert!(err.to_string().contains("Connection error"));

        let err = RealtimeError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_reconnection_config_default() {
        let config = ReconnectionConfig::default();
        assert_eq!(config.max_attempts, 0);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 30000);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert!(config.jitter);
    }

    #[test]
    fn test_reconnection_unlimited_attempts() {
        let config = ReconnectionConfig::default();
        assert!(config.should_retry(0));
        assert!(config.should_retry(100));
        assert!(config.should_retry(u32::MAX));

        let bounded = ReconnectionConfig {
            max_attempts: 3,
            ..Default::default()
        };
        assert!(bounded.should_retry(2));
        assert!(!bounded.should_retry(3));
    }

    #[test]
    fn test_reconnection_calculate_delay_no_jitter() {
        let config = ReconnectionConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        };

        assert_eq!(config.calculate_delay(1), 1000);
        assert_eq!(config.calculate_delay(2), 2000);
        assert_eq!(config.calculate_delay(3), 4000);
        assert_eq!(config.calculate_delay(5), 16000);
        // Capped
        assert_eq!(config.calculate_delay(6), 30000);
        assert_eq!(config.calculate_delay(60), 30000);
    }

    #[test]
    fn test_reconnection_calculate_delay_with_jitter() {
        let config = ReconnectionConfig {
            initial_delay_ms: 1000,
            jitter: true,
            ..Default::default()
        };

        for _ in 0..50 {
            let delay = config.calculate_delay(1);
            assert!(
                (750..=1250).contains(&delay),
                "Delay {} should be within 750-1250",
                delay
            );
        }
        for _ in 0..50 {
            let delay = config.calculate_delay(40);
            assert!(delay <= 37500, "Delay {} exceeds jittered ceiling", delay);
        }
    }
}
