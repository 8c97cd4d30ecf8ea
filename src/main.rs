use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use omni_v2v::config::SessionConfig;
use omni_v2v::core::realtime::{RealtimeResult, Role};
use omni_v2v::core::session::host::CMD_TOOL_CALL;
use omni_v2v::core::session::{
    AudioFrame, CmdResult, Command, DataRecord, HostEnv, SessionCoordinator,
};

/// omni-v2v - Realtime voice-to-voice session runner
#[derive(Parser, Debug)]
#[command(name = "omni-v2v")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Host that logs everything it receives and rejects tool calls.
struct LoggingHost;

#[async_trait]
impl HostEnv for LoggingHost {
    async fn send_cmd(&self, cmd: Command) -> RealtimeResult<CmdResult> {
        info!("cmd {} {:?}", cmd.name, cmd.properties);
        if cmd.name == CMD_TOOL_CALL {
            return Ok(CmdResult::error("no tool executor attached"));
        }
        Ok(CmdResult::ok())
    }

    async fn send_data(&self, data: DataRecord) -> RealtimeResult<()> {
        match data.text() {
            Some(text) => info!(
                "[{}] {}{}",
                data.role().unwrap_or(Role::Assistant.as_str()),
                text,
                if data.end_of_segment() { " <end>" } else { "" }
            ),
            None => info!("data {} {:?}", data.name, data.properties),
        }
        Ok(())
    }

    async fn send_audio_frame(&self, frame: AudioFrame) -> RealtimeResult<()> {
        debug!(
            "audio frame {} samples @ {}Hz",
            frame.samples_per_channel,
            frame.sample_rate
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Must be installed before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        SessionConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        SessionConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let connector = config.connector().map_err(|e| anyhow!(e.to_string()))?;
    info!("Connecting to {} ({})", connector.url(), config.vendor.as_str());

    let (handle, mut task) =
        SessionCoordinator::spawn(config, Arc::new(LoggingHost), Arc::new(connector));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down");
            handle.stop();
            task.await?;
        }
        result = &mut task => {
            result?;
            warn!("Session ended without a stop request");
        }
    }

    Ok(())
}
