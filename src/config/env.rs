//! Environment variable overrides for [`SessionConfig`](super::SessionConfig).

use std::env;
use std::str::FromStr;

use crate::core::realtime::{RealtimeError, RealtimeResult, Vendor};

use super::{SessionConfig, VadType};

/// Read a non-empty environment variable.
pub(crate) fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an environment variable.
pub(crate) fn env_parse<T>(name: &str) -> RealtimeResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            RealtimeError::Configuration(format!("Invalid value for {name}: {raw:?} ({e})"))
        }),
        None => Ok(None),
    }
}

/// Read a boolean environment variable (`true/false/1/0/yes/no/on/off`).
pub(crate) fn env_bool(name: &str) -> RealtimeResult<Option<bool>> {
    match env_string(name) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(RealtimeError::Configuration(format!(
                "Invalid boolean for {name}: {raw:?}"
            ))),
        },
        None => Ok(None),
    }
}

/// Apply `REALTIME_*` environment variables on top of `config`.
pub(crate) fn apply_env(config: &mut SessionConfig) -> RealtimeResult<()> {
    if let Some(key) = env_string("REALTIME_API_KEY")
        .or_else(|| env_string("DASHSCOPE_API_KEY"))
        .or_else(|| env_string("OPENAI_API_KEY"))
    {
        config.api_key = key;
    }
    if let Some(vendor) = env_string("REALTIME_VENDOR") {
        config.vendor = Vendor::from_str_or_default(&vendor);
    }
    if let Some(v) = env_string("REALTIME_BASE_URI") {
        config.base_uri = Some(v);
    }
    if let Some(v) = env_string("REALTIME_PATH") {
        config.path = v;
    }
    if let Some(v) = env_string("REALTIME_MODEL") {
        config.model = v;
    }
    if let Some(v) = env_string("REALTIME_LANGUAGE") {
        config.language = v;
    }
    if let Some(v) = env_string("REALTIME_PROMPT") {
        config.prompt = v;
    }
    if let Some(v) = env_string("REALTIME_GREETING") {
        config.greeting = v;
    }
    if let Some(v) = env_string("REALTIME_VOICE") {
        config.voice = v;
    }
    if let Some(v) = env_parse("REALTIME_TEMPERATURE")? {
        config.temperature = v;
    }
    if let Some(v) = env_parse("REALTIME_MAX_TOKENS")? {
        config.max_tokens = v;
    }
    if let Some(v) = env_bool("REALTIME_SERVER_VAD")? {
        config.server_vad = v;
    }
    if let Some(v) = env_string("REALTIME_VAD_TYPE") {
        config.vad_type = VadType::from_str_or_default(&v);
    }
    if let Some(v) = env_bool("REALTIME_AUDIO_OUT")? {
        config.audio_out = v;
    }
    if let Some(v) = env_bool("REALTIME_INPUT_TRANSCRIPT")? {
        config.input_transcript = v;
    }
    if let Some(v) = env_parse("REALTIME_SAMPLE_RATE")? {
        config.sample_rate = v;
    }
    if let Some(v) = env_parse("REALTIME_MAX_HISTORY")? {
        config.max_history = v;
    }
    if let Some(v) = env_bool("REALTIME_ENABLE_STORAGE")? {
        config.enable_storage = v;
    }
    if let Some(v) = env_bool("REALTIME_DUMP")? {
        config.dump = v;
    }
    if let Some(v) = env_string("REALTIME_DUMP_DIR") {
        config.dump_dir = v.into();
    }
    if let Some(v) = env_bool("REALTIME_VERBOSE")? {
        config.verbose = v;
    }
    Ok(())
}
