//! Microphone audio ingestion.
//!
//! Small host frames are batched into larger `input_audio_buffer.append`
//! requests. Nothing is sent while the link is down; the bytes stay buffered
//! and go out with the first flush after the session becomes active.

use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::LinkReceiver;
use super::dump::AudioDump;
use super::host::InboundAudio;
use crate::core::realtime::{ClientEvent, RequestSender, Role};

/// Bytes accumulated before a flush (about 107ms of 24kHz PCM16).
pub const AUDIO_FLUSH_THRESHOLD: usize = 5120;

/// Accumulates inbound PCM until the flush threshold.
#[derive(Debug)]
pub struct AudioIngestBuffer {
    buf: BytesMut,
    threshold: usize,
}

impl Default for AudioIngestBuffer {
    fn default() -> Self {
        Self::with_threshold(AUDIO_FLUSH_THRESHOLD)
    }
}

impl AudioIngestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(threshold * 2),
            threshold,
        }
    }

    /// Append a chunk. Returns the whole buffer when it should be sent.
    pub fn append(&mut self, chunk: &[u8], connected: bool) -> Option<Bytes> {
        self.buf.extend_from_slice(chunk);
        self.take_ready(connected)
    }

    /// Return and clear the buffer if connected and at the threshold.
    pub fn take_ready(&mut self, connected: bool) -> Option<Bytes> {
        if connected && self.buf.len() >= self.threshold {
            Some(self.buf.split().freeze())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Latest facts about inbound audio, published to the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IngestStatus {
    /// Stream id of the most recent frame
    pub stream_id: u32,
    /// Arrival time of the most recent frame
    pub last_frame_at: Option<Instant>,
}

/// Body of the audio ingest task.
pub(crate) async fn run_audio_ingest(
    mut frames: mpsc::Receiver<InboundAudio>,
    mut link: LinkReceiver,
    status: watch::Sender<IngestStatus>,
    dump: Option<AudioDump>,
    cancel: CancellationToken,
) {
    let mut buffer = AudioIngestBuffer::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };

                status.send_modify(|s| {
                    s.stream_id = frame.stream_id;
                    s.last_frame_at = Some(Instant::now());
                });

                if let Some(dump) = &dump {
                    dump.write(Role::User, frame.channel.as_deref(), &frame.buf).await;
                }

                let sender = link.borrow().clone();
                if let Some(ready) = buffer.append(&frame.buf, sender.is_some()) {
                    send_audio(sender, ready).await;
                }
            }
            changed = link.changed() => {
                if changed.is_err() {
                    break;
                }
                let sender = link.borrow_and_update().clone();
                if let Some(ready) = buffer.take_ready(sender.is_some()) {
                    debug!("Flushing {} bytes buffered while disconnected", ready.len());
                    send_audio(sender, ready).await;
                }
            }
        }
    }
}

async fn send_audio(sender: Option<RequestSender>, audio: Bytes) {
    let Some(sender) = sender else { return };
    if let Err(e) = sender.send_request(ClientEvent::audio_append(&audio)).await {
        warn!("Dropped {} bytes of input audio: {}", audio.len(), e);
    }
}
