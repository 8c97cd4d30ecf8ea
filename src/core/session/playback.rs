//! Delivery of assistant audio to the host.
//!
//! Every chunk carries the playback generation it was queued under. An
//! interruption bumps the generation, and chunks queued before it are
//! dropped instead of played.

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::dump::AudioDump;
use super::host::{AudioFrame, SharedHost};
use crate::core::realtime::Role;

/// Decoded PCM chunks waiting for playback.
pub const PLAYBACK_QUEUE_CAPACITY: usize = 256;

/// Decoded assistant PCM tagged with its playback generation.
#[derive(Debug, Clone)]
pub(crate) struct PlaybackChunk {
    pub generation: u64,
    pub pcm: Bytes,
}

/// Body of the audio output task. Each chunk of the current generation
/// becomes one mono PCM16 frame.
pub(crate) async fn run_audio_output(
    mut chunks: mpsc::Receiver<PlaybackChunk>,
    generation: watch::Receiver<u64>,
    host: SharedHost,
    sample_rate: u32,
    dump: Option<AudioDump>,
    cancel: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = chunks.recv() => chunk,
        };
        let Some(PlaybackChunk { generation: tag, pcm }) = chunk else { break };

        let current = *generation.borrow();
        if tag < current {
            debug!("Dropping {} bytes of interrupted playback", pcm.len());
            continue;
        }

        if let Some(dump) = &dump {
            dump.write(Role::Assistant, None, &pcm).await;
        }

        debug!("Playing {} bytes ({} samples)", pcm.len(), pcm.len() / 2);
        if let Err(e) = host.send_audio_frame(AudioFrame::pcm16_mono(pcm, sample_rate)).await {
            warn!("Host rejected audio frame: {}", e);
        }
    }
}
