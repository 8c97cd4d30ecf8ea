//! In-memory realtime service and recording host for coordinator tests.
//!
//! - `MemoryConnector` hands out queued in-memory transports; every queued
//!   transport has a `ServerPeer` the test drives as the remote service.
//! - `RecordingHost` records commands, data records and audio frames and
//!   answers `tool_call` / `retrieve` with configurable replies.

// Not every scenario uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Notify;

use omni_v2v::config::SessionConfig;
use omni_v2v::core::realtime::{
    Connector, RealtimeError, RealtimeResult, ReconnectionConfig, Transport,
};
use omni_v2v::core::session::host::{CMD_RETRIEVE, CMD_TOOL_CALL};
use omni_v2v::core::session::{AudioFrame, CmdResult, Command, DataRecord, HostEnv};

// =============================================================================
// Remote service side
// =============================================================================

/// The service end of one in-memory connection.
pub struct ServerPeer {
    incoming: fmpsc::UnboundedReceiver<String>,
    outgoing: Option<fmpsc::UnboundedSender<String>>,
}

impl ServerPeer {
    /// Push one server event to the client.
    pub fn send(&self, event: Value) {
        if let Some(tx) = &self.outgoing {
            tx.unbounded_send(event.to_string())
                .expect("client side is gone");
        }
    }

    /// Next client event.
    pub async fn recv(&mut self) -> Value {
        let text = self
            .incoming
            .next()
            .await
            .expect("client closed the connection");
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }

    /// Next client event, asserting its type.
    pub async fn expect(&mut self, event_type: &str) -> Value {
        let event = self.recv().await;
        assert_eq!(event["type"], event_type, "unexpected client event {event}");
        event
    }

    /// Next client event that is not audio or image input.
    pub async fn recv_control(&mut self) -> Value {
        loop {
            let event = self.recv().await;
            let ty = event["type"].as_str().unwrap_or_default();
            if ty != "input_audio_buffer.append" && ty != "input_image_buffer.append" {
                return event;
            }
        }
    }

    /// Close the service side. The client sees end of stream.
    pub fn hang_up(&mut self) {
        self.outgoing = None;
    }

    /// Send `session.created` and consume the client's `session.update`.
    pub async fn establish(&mut self, session_id: &str) -> Value {
        self.send(session_created(session_id));
        self.expect("session.update").await
    }
}

/// Connector that opens queued in-memory transports in order.
#[derive(Default)]
pub struct MemoryConnector {
    pending: Mutex<VecDeque<Transport>>,
    attempts: AtomicUsize,
    attempted: Notify,
}

impl MemoryConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a transport for the next `open()` and return its service end.
    pub fn add_peer(&self) -> ServerPeer {
        let (client_tx, server_rx) = fmpsc::unbounded::<String>();
        let (server_tx, client_rx) = fmpsc::unbounded::<String>();
        self.pending.lock().push_back(Transport {
            sink: Box::pin(client_tx.sink_map_err(|e| RealtimeError::Connection(e.to_string()))),
            stream: client_rx.map(Ok).boxed(),
        });
        ServerPeer {
            incoming: server_rx,
            outgoing: Some(server_tx),
        }
    }

    /// Number of `open()` calls so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn wait_for_attempts(&self, n: usize) {
        loop {
            let notified = self.attempted.notified();
            if self.attempts() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self) -> RealtimeResult<Transport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let transport = self.pending.lock().pop_front();
        self.attempted.notify_waiters();
        transport.ok_or_else(|| RealtimeError::Connection("connection refused".to_string()))
    }
}

// =============================================================================
// Host side
// =============================================================================

/// Host that records everything the coordinator sends.
pub struct RecordingHost {
    pub cmds: Mutex<Vec<Command>>,
    pub data: Mutex<Vec<DataRecord>>,
    pub frames: Mutex<Vec<AudioFrame>>,
    /// Commands (`cmd:<name>`) and frame starts (`frame`) in arrival order
    pub log: Mutex<Vec<String>>,
    frame_delay: Mutex<Option<Duration>>,
    tool_reply: Mutex<CmdResult>,
    retrieve_reply: Mutex<CmdResult>,
    changed: Notify,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cmds: Mutex::new(Vec::new()),
            data: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            frame_delay: Mutex::new(None),
            tool_reply: Mutex::new(CmdResult::error("no tool executor")),
            retrieve_reply: Mutex::new(CmdResult::error("no storage")),
            changed: Notify::new(),
        })
    }

    pub fn reply_to_tool_calls(&self, reply: CmdResult) {
        *self.tool_reply.lock() = reply;
    }

    /// Make every `send_audio_frame` take `delay`, like a real audio sink.
    pub fn slow_playback(&self, delay: Duration) {
        *self.frame_delay.lock() = Some(delay);
    }

    /// Frames started after the first `cmd:flush`, or None without a flush.
    pub fn frames_after_flush(&self) -> Option<usize> {
        let log = self.log.lock();
        let flush = log.iter().position(|e| e == "cmd:flush")?;
        Some(log[flush..].iter().filter(|e| *e == "frame").count())
    }

    pub fn reply_to_retrieve(&self, reply: CmdResult) {
        *self.retrieve_reply.lock() = reply;
    }

    pub fn cmd_names(&self) -> Vec<String> {
        self.cmds.lock().iter().map(|c| c.name.clone()).collect()
    }

    /// `(text, end_of_segment, role)` of every `text_data` record.
    pub fn transcripts(&self) -> Vec<(String, bool, String)> {
        self.data
            .lock()
            .iter()
            .filter(|d| d.name == "text_data")
            .map(|d| {
                (
                    d.text().unwrap_or_default().to_string(),
                    d.end_of_segment(),
                    d.role().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    pub fn records(&self, name: &str) -> Vec<DataRecord> {
        self.data
            .lock()
            .iter()
            .filter(|d| d.name == name)
            .cloned()
            .collect()
    }

    /// Wait until `check` holds.
    pub async fn wait_until(&self, check: impl Fn(&Self) -> bool) {
        loop {
            let notified = self.changed.notified();
            if check(self) {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl HostEnv for RecordingHost {
    async fn send_cmd(&self, cmd: Command) -> RealtimeResult<CmdResult> {
        let reply = match cmd.name.as_str() {
            CMD_TOOL_CALL => self.tool_reply.lock().clone(),
            CMD_RETRIEVE => self.retrieve_reply.lock().clone(),
            _ => CmdResult::ok(),
        };
        self.log.lock().push(format!("cmd:{}", cmd.name));
        self.cmds.lock().push(cmd);
        self.changed.notify_waiters();
        Ok(reply)
    }

    async fn send_data(&self, data: DataRecord) -> RealtimeResult<()> {
        self.data.lock().push(data);
        self.changed.notify_waiters();
        Ok(())
    }

    async fn send_audio_frame(&self, frame: AudioFrame) -> RealtimeResult<()> {
        self.log.lock().push("frame".to_string());
        self.frames.lock().push(frame);
        self.changed.notify_waiters();
        let delay = *self.frame_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Configuration with fast, deterministic reconnects.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        api_key: "test-key".to_string(),
        language: "en-US".to_string(),
        prompt: "You are helpful. ".to_string(),
        reconnection: ReconnectionConfig {
            initial_delay_ms: 10,
            max_delay_ms: 50,
            jitter: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn session_created(id: &str) -> Value {
    json!({
        "type": "session.created",
        "session": {
            "id": id,
            "model": "qwen-omni-turbo-realtime",
            "modalities": ["text", "audio"],
            "turn_detection": {"type": "server_vad", "threshold": 0.5}
        }
    })
}

pub fn response_created(response_id: &str) -> Value {
    json!({"type": "response.created", "response": {"id": response_id, "status": "in_progress"}})
}

pub fn transcript_delta(response_id: &str, item_id: &str, delta: &str) -> Value {
    json!({
        "type": "response.audio_transcript.delta",
        "response_id": response_id,
        "item_id": item_id,
        "output_index": 0,
        "content_index": 0,
        "delta": delta
    })
}

pub fn audio_delta(response_id: &str, item_id: &str, content_index: u32, pcm: &[u8]) -> Value {
    use base64::prelude::*;
    json!({
        "type": "response.audio.delta",
        "response_id": response_id,
        "item_id": item_id,
        "output_index": 0,
        "content_index": content_index,
        "delta": BASE64_STANDARD.encode(pcm)
    })
}

pub fn transcription_completed(item_id: &str, transcript: &str) -> Value {
    json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": item_id,
        "content_index": 0,
        "transcript": transcript
    })
}

pub fn speech_started() -> Value {
    json!({
        "type": "input_audio_buffer.speech_started",
        "audio_start_ms": 1400,
        "item_id": "in_1"
    })
}

pub fn speech_stopped(audio_end_ms: u64) -> Value {
    json!({
        "type": "input_audio_buffer.speech_stopped",
        "audio_end_ms": audio_end_ms,
        "item_id": "in_1"
    })
}
