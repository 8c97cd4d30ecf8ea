//! Service-level constants and small enums for realtime vendors.
//!
//! - Vendor selection (Qwen-Omni realtime, OpenAI realtime)
//! - Audio format configuration
//! - Output modalities

use serde::{Deserialize, Serialize};

/// Default endpoint for the Qwen-Omni realtime service.
pub const QWEN_REALTIME_BASE_URI: &str = "wss://dashscope.aliyuncs.com/api-ws";

/// Default endpoint for the OpenAI realtime service.
pub const OPENAI_REALTIME_BASE_URI: &str = "wss://api.openai.com";

/// Path appended to the base URI.
pub const REALTIME_PATH: &str = "/v1/realtime";

/// Default model.
pub const DEFAULT_REALTIME_MODEL: &str = "qwen-omni-turbo-realtime";

/// Default audio sample rate (PCM16).
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

// =============================================================================
// Vendors
// =============================================================================

/// Realtime service flavour. Affects the handshake headers and the default
/// input transcription model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Alibaba DashScope Qwen-Omni realtime
    #[default]
    Qwen,
    /// OpenAI realtime
    #[serde(rename = "openai")]
    OpenAi,
}

impl Vendor {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qwen => "qwen",
            Self::OpenAi => "openai",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "azure" => Self::OpenAi,
            _ => Self::default(),
        }
    }

    /// Whether the handshake must carry `OpenAI-Beta: realtime=v1`.
    #[inline]
    pub fn needs_beta_header(&self) -> bool {
        matches!(self, Self::OpenAi)
    }

    /// Input transcription model used when none is configured.
    pub fn default_transcription_model(&self) -> &'static str {
        match self {
            Self::Qwen => "gummy-realtime-v1",
            Self::OpenAi => "whisper-1",
        }
    }

    pub fn default_base_uri(&self) -> &'static str {
        match self {
            Self::Qwen => QWEN_REALTIME_BASE_URI,
            Self::OpenAi => OPENAI_REALTIME_BASE_URI,
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio formats understood by realtime services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeAudioFormat {
    /// PCM 16-bit signed little-endian (default)
    #[default]
    Pcm16,
    /// G.711 u-law (8-bit)
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 a-law (8-bit)
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

impl RealtimeAudioFormat {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "pcm16",
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
        }
    }

    /// Bytes per sample for frames handed to the host.
    #[inline]
    pub fn bytes_per_sample(&self) -> u32 {
        match self {
            Self::Pcm16 => 2,
            Self::G711Ulaw | Self::G711Alaw => 1,
        }
    }
}

impl std::fmt::Display for RealtimeAudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Modalities
// =============================================================================

/// Output modalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Text output
    Text,
    /// Audio output
    Audio,
}

impl Modality {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }

    /// Modalities requested for the given audio-out setting.
    pub fn for_output(audio_out: bool) -> Vec<String> {
        if audio_out {
            vec![Self::Text.as_str().to_string(), Self::Audio.as_str().to_string()]
        } else {
            vec![Self::Text.as_str().to_string()]
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_from_str() {
        assert_eq!(Vendor::from_str_or_default("openai"), Vendor::OpenAi);
        assert_eq!(Vendor::from_str_or_default("OpenAI"), Vendor::OpenAi);
        assert_eq!(Vendor::from_str_or_default("qwen"), Vendor::Qwen);
        assert_eq!(Vendor::from_str_or_default(""), Vendor::Qwen);
    }

    #[test]
    fn test_vendor_handshake_and_defaults() {
        assert!(Vendor::OpenAi.needs_beta_header());
        assert!(!Vendor::Qwen.needs_beta_header());
        assert_eq!(Vendor::Qwen.default_transcription_model(), "gummy-realtime-v1");
        assert_eq!(Vendor::OpenAi.default_transcription_model(), "whisper-1");
        assert_eq!(Vendor::Qwen.default_base_uri(), QWEN_REALTIME_BASE_URI);
    }

    #[test]
    fn test_vendor_serde() {
        let v: Vendor = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(v, Vendor::OpenAi);
        assert_eq!(serde_json::to_string(&Vendor::Qwen).unwrap(), "\"qwen\"");
    }

    #[test]
    fn test_audio_format() {
        assert_eq!(RealtimeAudioFormat::Pcm16.as_str(), "pcm16");
        assert_eq!(RealtimeAudioFormat::Pcm16.bytes_per_sample(), 2);
        assert_eq!(RealtimeAudioFormat::G711Alaw.bytes_per_sample(), 1);
    }

    #[test]
    fn test_modalities_for_output() {
        assert_eq!(Modality::for_output(true), vec!["text", "audio"]);
        assert_eq!(Modality::for_output(false), vec!["text"]);
    }
}
