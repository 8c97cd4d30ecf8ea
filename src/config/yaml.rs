use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::realtime::{RealtimeError, RealtimeResult, ReconnectionConfig, Vendor};

use super::{SessionConfig, VadType};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables and defaults.
///
/// # Example YAML structure
/// ```yaml
/// service:
///   vendor: "qwen"
///   api_key: "sk-..."
///   base_uri: "wss://dashscope.aliyuncs.com/api-ws"
///   path: "/v1/realtime"
///   model: "qwen-omni-turbo-realtime"
///
/// conversation:
///   language: "en-US"
///   prompt: "You are a helpful assistant. Answer in {language}."
///   greeting: "Hello!"
///   max_history: 20
///   enable_storage: false
///
/// generation:
///   voice: "Chelsie"
///   temperature: 0.5
///   max_tokens: 1024
///   audio_out: true
///
/// audio:
///   sample_rate: 24000
///   input_transcript: true
///   transcription_model: "gummy-realtime-v1"
///   stream_id: 0
///   dump: false
///   dump_dir: "/tmp/omni-dump"
///
/// vad:
///   server_vad: true
///   type: "server_vad"
///   eagerness: "auto"
///   threshold: 0.5
///   prefix_padding_ms: 300
///   silence_duration_ms: 500
///
/// reconnection:
///   initial_delay_ms: 500
///   max_delay_ms: 30000
///
/// verbose: false
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub service: ServiceYaml,
    pub conversation: ConversationYaml,
    pub generation: GenerationYaml,
    pub audio: AudioYaml,
    pub vad: VadYaml,
    pub reconnection: Option<ReconnectionConfig>,
    pub verbose: Option<bool>,
}

/// Remote service connection settings
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceYaml {
    pub vendor: Option<String>,
    pub api_key: Option<String>,
    pub base_uri: Option<String>,
    pub path: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConversationYaml {
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub greeting: Option<String>,
    pub max_history: Option<usize>,
    pub enable_storage: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GenerationYaml {
    pub voice: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub audio_out: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub sample_rate: Option<u32>,
    pub input_transcript: Option<bool>,
    pub transcription_model: Option<String>,
    pub stream_id: Option<u32>,
    pub dump: Option<bool>,
    pub dump_dir: Option<PathBuf>,
}

/// Voice activity detection settings
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VadYaml {
    pub server_vad: Option<bool>,
    #[serde(rename = "type")]
    pub vad_type: Option<String>,
    pub eagerness: Option<String>,
    pub threshold: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns [`RealtimeError::Configuration`] if the file cannot be read or
    /// the YAML is malformed.
    pub fn from_file(path: &Path) -> RealtimeResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RealtimeError::Configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents)
            .map_err(|e| RealtimeError::Configuration(format!("Failed to parse YAML config: {e}")))
    }

    /// Overwrite every field of `config` that is present in this file.
    pub fn apply(self, config: &mut SessionConfig) {
        let YamlConfig {
            service,
            conversation,
            generation,
            audio,
            vad,
            reconnection,
            verbose,
        } = self;

        if let Some(v) = service.vendor {
            config.vendor = Vendor::from_str_or_default(&v);
        }
        if let Some(v) = service.api_key {
            config.api_key = v;
        }
        if service.base_uri.is_some() {
            config.base_uri = service.base_uri;
        }
        set(&mut config.path, service.path);
        set(&mut config.model, service.model);

        set(&mut config.language, conversation.language);
        set(&mut config.prompt, conversation.prompt);
        set(&mut config.greeting, conversation.greeting);
        set(&mut config.max_history, conversation.max_history);
        set(&mut config.enable_storage, conversation.enable_storage);

        set(&mut config.voice, generation.voice);
        set(&mut config.temperature, generation.temperature);
        set(&mut config.max_tokens, generation.max_tokens);
        set(&mut config.audio_out, generation.audio_out);

        set(&mut config.sample_rate, audio.sample_rate);
        set(&mut config.input_transcript, audio.input_transcript);
        if audio.transcription_model.is_some() {
            config.transcription_model = audio.transcription_model;
        }
        set(&mut config.stream_id, audio.stream_id);
        set(&mut config.dump, audio.dump);
        set(&mut config.dump_dir, audio.dump_dir);

        set(&mut config.server_vad, vad.server_vad);
        if let Some(v) = vad.vad_type {
            config.vad_type = VadType::from_str_or_default(&v);
        }
        set(&mut config.vad_eagerness, vad.eagerness);
        set(&mut config.vad_threshold, vad.threshold);
        set(&mut config.vad_prefix_padding_ms, vad.prefix_padding_ms);
        set(&mut config.vad_silence_duration_ms, vad.silence_duration_ms);

        set(&mut config.reconnection, reconnection);
        set(&mut config.verbose, verbose);
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
service:
  vendor: "openai"
  api_key: "sk-yaml"
  base_uri: "wss://api.openai.com"
  model: "gpt-4o-realtime-preview"
conversation:
  language: "en-US"
  greeting: "Hello!"
  max_history: 8
generation:
  voice: "verse"
  audio_out: false
vad:
  type: "semantic_vad"
  eagerness: "high"
reconnection:
  initial_delay_ms: 100
  jitter: false
verbose: true
"#;
        let parsed: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let mut config = SessionConfig::default();
        parsed.apply(&mut config);

        assert_eq!(config.vendor, Vendor::OpenAi);
        assert_eq!(config.api_key, "sk-yaml");
        assert_eq!(config.base_uri(), "wss://api.openai.com");
        assert_eq!(config.model, "gpt-4o-realtime-preview");
        assert_eq!(config.language, "en-US");
        assert_eq!(config.max_history, 8);
        assert_eq!(config.voice, "verse");
        assert!(!config.audio_out);
        assert_eq!(config.vad_type, VadType::SemanticVad);
        assert_eq!(config.vad_eagerness, "high");
        assert_eq!(config.reconnection.initial_delay_ms, 100);
        assert!(!config.reconnection.jitter);
        // Unset nested reconnection fields fall back to defaults.
        assert_eq!(config.reconnection.max_delay_ms, 30000);
        assert!(config.verbose);
    }

    #[test]
    fn test_yaml_config_partial_keeps_defaults() {
        let parsed: YamlConfig = serde_yaml::from_str("conversation:\n  prompt: \"hi\"\n").unwrap();
        let mut config = SessionConfig::default();
        parsed.apply(&mut config);

        assert_eq!(config.prompt, "hi");
        assert_eq!(config.model, "qwen-omni-turbo-realtime");
        assert_eq!(config.sample_rate, 24000);
        assert!(config.server_vad);
    }

    #[test]
    fn test_yaml_config_empty() {
        let parsed: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(parsed.service.api_key.is_none());
        assert!(parsed.reconnection.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.yaml");
        fs::write(&path, "audio:\n  sample_rate: 16000\n  dump: true\n").unwrap();

        let parsed = YamlConfig::from_file(&path).unwrap();
        assert_eq!(parsed.audio.sample_rate, Some(16000));
        assert_eq!(parsed.audio.dump, Some(true));
    }

    #[test]
    fn test_from_file_not_found() {
        let err = YamlConfig::from_file(Path::new("/nonexistent/session.yaml")).unwrap_err();
        assert!(matches!(err, RealtimeError::Configuration(_)));
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.yaml");
        fs::write(&path, "audio: [unclosed").unwrap();

        let err = YamlConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }
}
