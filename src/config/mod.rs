//! Configuration module for realtime sessions
//!
//! This module loads [`SessionConfig`] from `.env` files, environment variables
//! and YAML files. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable overrides (`REALTIME_*`)
//!
//! # Example
//! ```rust,no_run
//! use omni_v2v::config::SessionConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = SessionConfig::from_env()?;
//!
//! // Load from YAML file with environment variable fallbacks
//! let config = SessionConfig::from_file(Path::new("session.yaml"))?;
//! println!("Connecting to {}", config.base_uri());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::realtime::{
    DEFAULT_REALTIME_MODEL, DEFAULT_SAMPLE_RATE, REALTIME_PATH, RealtimeError, RealtimeResult,
    ReconnectionConfig, TurnDetectionConfig, Vendor, WebSocketConnector,
};

mod env;
mod yaml;

pub use yaml::YamlConfig;

/// Which server-side turn detector to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VadType {
    #[default]
    ServerVad,
    SemanticVad,
}

impl VadType {
    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "semantic_vad" | "semantic" => Self::SemanticVad,
            _ => Self::ServerVad,
        }
    }
}

/// Settings for one realtime session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    // Service
    pub api_key: String,
    pub vendor: Vendor,
    /// Overrides the vendor's default endpoint.
    pub base_uri: Option<String>,
    pub path: String,
    pub model: String,

    // Conversation
    pub language: String,
    /// System prompt; `{language}`, `{model}`, `{greeting}` and `{tools}`
    /// are substituted.
    pub prompt: String,
    pub greeting: String,
    pub max_history: usize,
    pub enable_storage: bool,

    // Generation
    pub voice: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub audio_out: bool,

    // Audio
    pub sample_rate: u32,
    pub input_transcript: bool,
    /// Overrides the vendor's default transcription model.
    pub transcription_model: Option<String>,
    /// Stream id attached to assistant transcripts.
    pub stream_id: u32,
    pub dump: bool,
    pub dump_dir: PathBuf,

    // Turn detection
    pub server_vad: bool,
    pub vad_type: VadType,
    pub vad_eagerness: String,
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,

    pub reconnection: ReconnectionConfig,
    /// Log every outbound request.
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            vendor: Vendor::default(),
            base_uri: None,
            path: REALTIME_PATH.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            language: "zh-CN".to_string(),
            prompt: String::new(),
            greeting: String::new(),
            max_history: 20,
            enable_storage: false,
            voice: "alloy".to_string(),
            temperature: 0.5,
            max_tokens: 1024,
            audio_out: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
            input_transcript: true,
            transcription_model: None,
            stream_id: 0,
            dump: false,
            dump_dir: PathBuf::from("."),
            server_vad: true,
            vad_type: VadType::ServerVad,
            vad_eagerness: "auto".to_string(),
            vad_threshold: 0.5,
            vad_prefix_padding_ms: 300,
            vad_silence_duration_ms: 500,
            reconnection: ReconnectionConfig::default(),
            verbose: false,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// `.env` values are expected to be loaded by the caller
    /// (`dotenvy::dotenv()` in `main`).
    ///
    /// # Errors
    /// Returns [`RealtimeError::Configuration`] if a variable is malformed or
    /// validation fails.
    pub fn from_env() -> RealtimeResult<Self> {
        let mut config = Self::default();
        env::apply_env(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variables as the
    /// base layer.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &Path) -> RealtimeResult<Self> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = Self::default();
        env::apply_env(&mut config)?;
        yaml_config.apply(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> RealtimeResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(RealtimeError::Configuration(
                "API key is required (set REALTIME_API_KEY or service.api_key)".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(RealtimeError::Configuration(
                "Model name must not be empty".to_string(),
            ));
        }
        let base = self.base_uri();
        let url = Url::parse(base)
            .map_err(|e| RealtimeError::Configuration(format!("Invalid base URI {base}: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::Configuration(format!(
                "Base URI must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }
        if self.max_history == 0 {
            return Err(RealtimeError::Configuration(
                "max_history must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.vad_threshold) {
            return Err(RealtimeError::Configuration(format!(
                "vad_threshold must be within 0.0..=1.0, got {}",
                self.vad_threshold
            )));
        }
        if self.sample_rate == 0 {
            return Err(RealtimeError::Configuration(
                "sample_rate must be positive".to_string(),
            ));
        }
        let backoff = &self.reconnection;
        if backoff.initial_delay_ms == 0 {
            return Err(RealtimeError::Configuration(
                "reconnection initial_delay_ms must be positive".to_string(),
            ));
        }
        if backoff.backoff_multiplier.is_nan() || backoff.backoff_multiplier < 1.0 {
            return Err(RealtimeError::Configuration(format!(
                "reconnection backoff_multiplier must be at least 1.0, got {}",
                backoff.backoff_multiplier
            )));
        }
        if backoff.max_delay_ms < backoff.initial_delay_ms {
            return Err(RealtimeError::Configuration(format!(
                "reconnection max_delay_ms ({}) is below initial_delay_ms ({})",
                backoff.max_delay_ms, backoff.initial_delay_ms
            )));
        }
        Ok(())
    }

    /// Endpoint to connect to.
    pub fn base_uri(&self) -> &str {
        self.base_uri
            .as_deref()
            .unwrap_or_else(|| self.vendor.default_base_uri())
    }

    pub fn transcription_model(&self) -> &str {
        self.transcription_model
            .as_deref()
            .unwrap_or_else(|| self.vendor.default_transcription_model())
    }

    /// Turn detection block for `session.update`.
    pub fn turn_detection(&self) -> TurnDetectionConfig {
        if !self.server_vad {
            return TurnDetectionConfig::None;
        }
        match self.vad_type {
            VadType::ServerVad => TurnDetectionConfig::ServerVad {
                threshold: Some(self.vad_threshold),
                prefix_padding_ms: Some(self.vad_prefix_padding_ms),
                silence_duration_ms: Some(self.vad_silence_duration_ms),
            },
            VadType::SemanticVad => TurnDetectionConfig::SemanticVad {
                eagerness: Some(self.vad_eagerness.clone()),
            },
        }
    }

    /// Build the WebSocket connector for this configuration.
    pub fn connector(&self) -> RealtimeResult<WebSocketConnector> {
        WebSocketConnector::new(
            self.base_uri(),
            &self.path,
            &self.model,
            self.api_key.clone(),
            self.vendor,
        )
    }
}
