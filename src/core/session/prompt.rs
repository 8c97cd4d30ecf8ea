//! Session instructions, greeting text and the `session.update` payload.

use crate::config::SessionConfig;
use crate::core::realtime::{
    ClientEvent, InputTranscriptionConfig, Modality, RealtimeAudioFormat, ResponseConfig,
    SessionUpdate,
};

use super::tool_bridge::ToolMetadata;

/// Replace `{language}`, `{model}`, `{greeting}` and `{tools}` in `prompt`.
pub fn render_prompt(prompt: &str, config: &SessionConfig, tools: &[ToolMetadata]) -> String {
    prompt
        .replace("{language}", &config.language)
        .replace("{model}", &config.model)
        .replace("{greeting}", &config.greeting)
        .replace("{tools}", &tools_prompt(tools))
}

/// Human readable list of tools for the instructions.
pub fn tools_prompt(tools: &[ToolMetadata]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let mut text = String::from("You have several tools that you can get help from:\n");
    for tool in tools {
        text.push_str(&format!("- ***{}***: {}\n", tool.name, tool.description));
    }
    text
}

/// Text the model is asked to say when a user first shows up.
pub fn greeting_text(config: &SessionConfig) -> String {
    if !config.greeting.is_empty() {
        return format!("Say '{}' to me.", config.greeting);
    }
    match config.language.as_str() {
        "zh-CN" => "你好。",
        "ja-JP" => "こんにちは",
        "ko-KR" => "안녕하세요",
        _ => "Hi, there.",
    }
    .to_string()
}

/// `response.create` that makes the model greet the user.
pub fn greeting_request(config: &SessionConfig) -> ClientEvent {
    ClientEvent::ResponseCreate {
        response: Some(ResponseConfig {
            modalities: Some(Modality::for_output(true)),
            instructions: Some(format!("{}{}", config.prompt, greeting_text(config))),
            ..Default::default()
        }),
    }
}

/// Full `session.update` for the current config and tool registry.
pub fn session_update(config: &SessionConfig, tools: &[ToolMetadata]) -> ClientEvent {
    let format = RealtimeAudioFormat::Pcm16.as_str().to_string();
    let session = SessionUpdate {
        modalities: Some(Modality::for_output(config.audio_out)),
        instructions: Some(render_prompt(&config.prompt, config, tools)),
        model: Some(config.model.clone()),
        voice: config.audio_out.then(|| config.voice.clone()),
        input_audio_format: Some(format.clone()),
        output_audio_format: Some(format),
        input_audio_transcription: config.input_transcript.then(|| InputTranscriptionConfig {
            model: config.transcription_model().to_string(),
        }),
        turn_detection: Some(config.turn_detection()),
        tools: Some(tools.iter().map(ToolMetadata::to_definition).collect()),
        tool_choice: Some("auto".to_string()),
        temperature: Some(config.temperature),
        max_response_output_tokens: Some(config.max_tokens),
    };
    ClientEvent::SessionUpdate { session }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::TurnDetectionConfig;

    fn tool() -> ToolMetadata {
        ToolMetadata {
            name: "lookup".to_string(),
            description: "Look things up".to_string(),
            parameters: vec![],
        }
    }

    #[test]
    fn test_render_prompt_placeholders() {
        let config = SessionConfig {
            language: "en-US".to_string(),
            model: "m1".to_string(),
            greeting: "hello".to_string(),
            ..Default::default()
        };
        let rendered = render_prompt("{language}/{model}/{greeting}|{tools}", &config, &[tool()]);
        assert!(rendered.starts_with("en-US/m1/hello|You have several tools"));
        assert!(rendered.contains("- ***lookup***: Look things up"));

        let rendered = render_prompt("tools: {tools}.", &config, &[]);
        assert_eq!(rendered, "tools: .");
    }

    #[test]
    fn test_greeting_text() {
        let mut config = SessionConfig {
            language: "en-US".to_string(),
            ..Default::default()
        };
        assert_eq!(greeting_text(&config), "Hi, there.");
        config.language = "zh-CN".to_string();
        assert_eq!(greeting_text(&config), "你好。");
        config.language = "ja-JP".to_string();
        assert_eq!(greeting_text(&config), "こんにちは");
        config.language = "ko-KR".to_string();
        assert_eq!(greeting_text(&config), "안녕하세요");
        config.greeting = "Welcome back".to_string();
        assert_eq!(greeting_text(&config), "Say 'Welcome back' to me.");
    }

    #[test]
    fn test_greeting_request_prefixes_prompt() {
        let config = SessionConfig {
            prompt: "Be brief. ".to_string(),
            language: "en-US".to_string(),
            ..Default::default()
        };
        match greeting_request(&config) {
            ClientEvent::ResponseCreate { response: Some(r) } => {
                assert_eq!(r.instructions.as_deref(), Some("Be brief. Hi, there."));
                assert_eq!(
                    r.modalities,
                    Some(vec!["text".to_string(), "audio".to_string()])
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_session_update_audio_out() {
        let config = SessionConfig::default();
        let ClientEvent::SessionUpdate { session } = session_update(&config, &[tool()]) else {
            panic!("expected session.update");
        };
        assert_eq!(session.voice.as_deref(), Some("alloy"));
        assert_eq!(session.modalities.unwrap().len(), 2);
        assert_eq!(session.tool_choice.as_deref(), Some("auto"));
        assert_eq!(session.tools.unwrap()[0].name, "lookup");
        assert_eq!(session.input_audio_format.as_deref(), Some("pcm16"));
        assert_eq!(
            session.input_audio_transcription.unwrap().model,
            "gummy-realtime-v1"
        );
        assert!(matches!(
            session.turn_detection,
            Some(TurnDetectionConfig::ServerVad { .. })
        ));
    }

    #[test]
    fn test_session_update_text_only_without_vad() {
        let config = SessionConfig {
            audio_out: false,
            server_vad: false,
            input_transcript: false,
            ..Default::default()
        };
        let ClientEvent::SessionUpdate { session } = session_update(&config, &[]) else {
            panic!("expected session.update");
        };
        assert_eq!(session.modalities, Some(vec!["text".to_string()]));
        assert!(session.voice.is_none());
        assert!(session.input_audio_transcription.is_none());
        assert_eq!(session.turn_detection, Some(TurnDetectionConfig::None));
        assert_eq!(session.tools, Some(vec![]));
    }
}
