//! The session coordinator state machine.
//!
//! One task owns the realtime connection and processes server events in
//! arrival order. Microphone audio, camera frames and playback run on side
//! tasks that see the live link through a watch channel; the link carries a
//! [`RequestSender`] only while the session is [`CoordinatorState::Active`].
//!
//! When the connection ends for any reason other than [`SessionHandle::stop`]
//! the coordinator resets its per-connection state, waits the reconnection
//! delay and opens a fresh connection. Conversation memory survives and is
//! replayed into the new session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::LinkReceiver;
use super::audio_ingest::{IngestStatus, run_audio_ingest};
use super::dump::AudioDump;
use super::flushed::FlushedResponses;
use super::host::{
    CMD_FLUSH, CMD_ON_USER_JOINED, CMD_ON_USER_LEFT, CMD_RETRIEVE, CMD_TOOL_REGISTER, Command,
    DataRecord, InboundAudio, PROPERTY_RESPONSE, PROPERTY_TOOL, SharedHost, StatusCode,
    VideoFrame,
};
use super::memory::{ConversationMemory, ConversationTurn, MemoryEvent};
use super::playback::{PLAYBACK_QUEUE_CAPACITY, PlaybackChunk, run_audio_output};
use super::prompt::{greeting_request, session_update};
use super::stats::SessionStats;
use super::tool_bridge::{PendingToolCall, ToolCallBridge, ToolMetadata};
use super::transcript::TranscriptAssembler;
use super::video::{VIDEO_SAMPLE_INTERVAL, VideoFrameThrottler, run_video_sampler};
use crate::config::SessionConfig;
use crate::core::realtime::{
    ClientEvent, ConnectionManager, Connector, ConversationItem, CoordinatorState, RealtimeError,
    RealtimeResult, RequestSender, Role, ServerEvent, Session,
};

/// Inbound microphone frames waiting for the ingest task.
const AUDIO_QUEUE_CAPACITY: usize = 256;

/// Host commands waiting for the coordinator.
const CONTROL_QUEUE_CAPACITY: usize = 32;

/// Suffix of a transcript cut short by barge-in.
pub const INTERRUPTED_SUFFIX: &str = "[interrupted]";

/// Reply to a host command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOutcome {
    pub status: StatusCode,
    pub detail: String,
}

impl CmdOutcome {
    pub fn ok() -> Self {
        Self {
            status: StatusCode::Ok,
            detail: "success".to_string(),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Error,
            detail: detail.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::Ok
    }
}

struct ControlRequest {
    cmd: Command,
    reply: oneshot::Sender<CmdOutcome>,
}

/// Host-facing handle to a running coordinator.
#[derive(Clone)]
pub struct SessionHandle {
    audio: mpsc::Sender<InboundAudio>,
    video: VideoFrameThrottler,
    control: mpsc::Sender<ControlRequest>,
    state: watch::Receiver<CoordinatorState>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Hand one microphone frame to the ingest task.
    pub async fn push_audio(&self, frame: InboundAudio) -> RealtimeResult<()> {
        self.audio
            .send(frame)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    /// Offer one camera frame. Returns false if it was dropped.
    pub fn push_video(&self, frame: VideoFrame) -> bool {
        self.video.offer(frame)
    }

    /// Deliver a host command (`flush`, `on_user_joined`, `on_user_left`,
    /// `tool_register`) and wait for the outcome.
    pub async fn on_cmd(&self, cmd: Command) -> CmdOutcome {
        let (reply, rx) = oneshot::channel();
        if self.control.send(ControlRequest { cmd, reply }).await.is_err() {
            return CmdOutcome::error("session stopped");
        }
        rx.await
            .unwrap_or_else(|_| CmdOutcome::error("session stopped"))
    }

    /// Stop the session. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.clone()
    }

    /// Wait until the coordinator reaches `target`, or fails if it stopped
    /// first.
    pub async fn wait_for_state(&self, target: CoordinatorState) -> RealtimeResult<()> {
        let mut rx = self.state.clone();
        let reached = rx
            .wait_for(|s| *s == target || *s == CoordinatorState::Stopped)
            .await
            .map_err(|_| RealtimeError::NotConnected)?;
        if *reached == target {
            Ok(())
        } else {
            Err(RealtimeError::NotConnected)
        }
    }
}

/// State that only lives as long as one connection.
struct SessionEpoch {
    session: Option<Session>,
    /// Time origin for truncation offsets
    started_at: Instant,
    response_id: Option<String>,
    item_id: Option<String>,
    content_index: u32,
    assembler: TranscriptAssembler,
    flushed: FlushedResponses,
    remote_stream_id: u32,
    /// call id -> function name
    tool_calls: HashMap<String, String>,
}

impl SessionEpoch {
    fn new() -> Self {
        Self {
            session: None,
            started_at: Instant::now(),
            response_id: None,
            item_id: None,
            content_index: 0,
            assembler: TranscriptAssembler::new(),
            flushed: FlushedResponses::new(),
            remote_stream_id: 0,
            tool_calls: HashMap::new(),
        }
    }

    fn is_flushed(&self, response_id: &str) -> bool {
        self.flushed.contains(response_id)
    }
}

/// Drives one realtime session and its reconnects.
pub struct SessionCoordinator {
    config: Arc<SessionConfig>,
    host: SharedHost,
    connector: Arc<dyn Connector>,
    bridge: ToolCallBridge,

    memory: ConversationMemory,
    memory_events: mpsc::UnboundedReceiver<MemoryEvent>,
    control: mpsc::Receiver<ControlRequest>,
    link: watch::Sender<Option<RequestSender>>,
    state: watch::Sender<CoordinatorState>,
    ingest_status: watch::Receiver<IngestStatus>,
    playback: mpsc::Sender<PlaybackChunk>,
    playback_generation: watch::Sender<u64>,
    cancel: CancellationToken,

    epoch: SessionEpoch,
    tools: Vec<ToolMetadata>,
    stats: SessionStats,
    input_end: Option<Instant>,
    first_session_seen: bool,
    greeted: bool,
    users_count: u32,
}

impl SessionCoordinator {
    /// Start a coordinator and its side tasks.
    ///
    /// Returns the host handle and the join handle of the coordinator task.
    /// The task finishes after [`SessionHandle::stop`], or when the
    /// reconnection policy gives up.
    pub fn spawn(
        config: SessionConfig,
        host: SharedHost,
        connector: Arc<dyn Connector>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let config = Arc::new(config);
        let cancel = CancellationToken::new();
        let dump = config.dump.then(|| AudioDump::new(config.dump_dir.clone()));

        let (link_tx, link_rx): (_, LinkReceiver) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(CoordinatorState::Disconnected);
        let (status_tx, status_rx) = watch::channel(IngestStatus::default());
        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_QUEUE_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let (playback_tx, playback_rx) = mpsc::channel(PLAYBACK_QUEUE_CAPACITY);
        let (generation_tx, generation_rx) = watch::channel(0u64);
        let (video, video_rx) = VideoFrameThrottler::new();
        let (memory, memory_events) = ConversationMemory::with_listener(config.max_history);

        tokio::spawn(run_audio_ingest(
            audio_rx,
            link_rx.clone(),
            status_tx,
            dump.clone(),
            cancel.clone(),
        ));
        tokio::spawn(run_audio_output(
            playback_rx,
            generation_rx,
            host.clone(),
            config.sample_rate,
            dump,
            cancel.clone(),
        ));
        tokio::spawn(run_video_sampler(
            video_rx,
            link_rx,
            VIDEO_SAMPLE_INTERVAL,
            cancel.clone(),
        ));

        let coordinator = Self {
            config,
            bridge: ToolCallBridge::new(host.clone()),
            host,
            connector,
            memory,
            memory_events,
            control: control_rx,
            link: link_tx,
            state: state_tx,
            ingest_status: status_rx,
            playback: playback_tx,
            playback_generation: generation_tx,
            cancel: cancel.clone(),
            epoch: SessionEpoch::new(),
            tools: Vec::new(),
            stats: SessionStats::new(),
            input_end: None,
            first_session_seen: false,
            greeted: false,
            users_count: 0,
        };
        let task = tokio::spawn(coordinator.run());

        let handle = SessionHandle {
            audio: audio_tx,
            video,
            control: control_tx,
            state: state_rx,
            cancel,
        };
        (handle, task)
    }

    async fn run(mut self) {
        if self.config.enable_storage {
            self.retrieve_history().await;
        }

        let policy = self.config.reconnection.clone();
        let mut attempt: u32 = 0;

        while !self.cancel.is_cancelled() {
            let established = self.connect_and_drive().await;
            self.reset_epoch();

            if self.cancel.is_cancelled() {
                break;
            }

            attempt = if established { 1 } else { attempt + 1 };
            if !policy.should_retry(attempt) {
                error!("Giving up after {} reconnection attempts", attempt);
                break;
            }

            let delay = policy.delay_for(attempt);
            info!("Reconnecting in {:?} (attempt {})", delay, attempt);
            if !self.idle(delay).await {
                break;
            }
        }

        let _ = self.link.send(None);
        self.state.send_replace(CoordinatorState::Stopped);
        info!("Session coordinator stopped");
    }

    /// One connection lifetime. Returns true if a session was established.
    async fn connect_and_drive(&mut self) -> bool {
        self.set_state(CoordinatorState::Connecting);
        let started = Instant::now();
        let mut conn = ConnectionManager::new(self.connector.clone(), self.config.verbose);

        let cancel = self.cancel.clone();
        let connected = tokio::select! {
            _ = cancel.cancelled() => return false,
            result = conn.connect() => result,
        };

        let established = match connected {
            Ok(()) => {
                self.stats.record_connect(started.elapsed());
                info!("Realtime channel open after {:?}", started.elapsed());
                self.set_state(CoordinatorState::AwaitingSession);
                self.drive(&mut conn).await
            }
            Err(e) => {
                warn!("Failed to connect: {}", e);
                false
            }
        };

        conn.close().await;
        established
    }

    async fn drive(&mut self, conn: &mut ConnectionManager) -> bool {
        let sender = match conn.sender() {
            Ok(sender) => sender,
            Err(e) => {
                warn!("Connection has no sender: {}", e);
                return false;
            }
        };
        let events = conn.listen();
        tokio::pin!(events);

        let cancel = self.cancel.clone();
        let mut established = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.next() => {
                    let Some(event) = event else { break };
                    if matches!(event, ServerEvent::SessionCreated { .. }) {
                        established = true;
                    }
                    if let Err(e) = self.handle_event(event, &sender).await {
                        warn!("Failed to handle server event: {}", e);
                    }
                    self.drain_memory_events(Some(&sender)).await;
                }
                Some(request) = self.control.recv() => {
                    self.handle_control(request).await;
                }
            }
        }

        info!("Realtime loop finished");
        established
    }

    /// Serve host commands while waiting. Returns false if stopped.
    async fn idle(&mut self, delay: Duration) -> bool {
        let cancel = self.cancel.clone();
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut sleep => return true,
                Some(request) = self.control.recv() => self.handle_control(request).await,
            }
        }
    }

    fn set_state(&self, state: CoordinatorState) {
        debug!("Coordinator state -> {}", state);
        self.state.send_replace(state);
    }

    fn reset_epoch(&mut self) {
        let _ = self.link.send(None);
        self.epoch = SessionEpoch::new();
        if !self.cancel.is_cancelled() {
            self.set_state(CoordinatorState::Disconnected);
        }
    }

    fn is_active(&self) -> bool {
        self.state.borrow().is_active()
    }

    fn live_sender(&self) -> Option<RequestSender> {
        self.link.borrow().clone()
    }

    /// Stream id of the speaking user.
    fn remote_stream_id(&mut self) -> u32 {
        if self.epoch.remote_stream_id == 0 {
            self.epoch.remote_stream_id = self.ingest_status.borrow().stream_id;
        }
        if self.epoch.remote_stream_id == 0 {
            self.config.stream_id
        } else {
            self.epoch.remote_stream_id
        }
    }

    fn input_end(&self) -> Option<Instant> {
        if self.config.server_vad {
            self.input_end
        } else {
            self.ingest_status.borrow().last_frame_at
        }
    }

    fn since_input_end(&self) -> Option<Duration> {
        self.input_end()
            .map(|end| Instant::now().saturating_duration_since(end))
    }

    // =========================================================================
    // Server events
    // =========================================================================

    async fn handle_event(
        &mut self,
        event: ServerEvent,
        sender: &RequestSender,
    ) -> RealtimeResult<()> {
        match event {
            ServerEvent::SessionCreated { session } => {
                self.on_session_created(session, sender).await?
            }
            ServerEvent::SessionUpdated { session } => {
                debug!("Session updated: {}", session.id);
            }
            ServerEvent::TranscriptionCompleted {
                item_id, transcript, ..
            } => {
                info!("User transcript: {}", transcript);
                let stream_id = self.remote_stream_id();
                self.send_data(DataRecord::transcript(
                    transcript.clone(),
                    true,
                    Role::User,
                    stream_id,
                ))
                .await;
                self.memory
                    .put(ConversationTurn::new(Role::User, transcript, Some(item_id)));
            }
            ServerEvent::TranscriptionFailed { item_id, error, .. } => {
                warn!("Transcription failed for {}: {}", item_id, error.message);
            }
            ServerEvent::ResponseCreated { response } => {
                debug!("Response created: {}", response.id);
                self.epoch.response_id = Some(response.id);
            }
            ServerEvent::ResponseDone { response } => {
                info!("Response done: {} ({})", response.id, response.status);
                if self.epoch.response_id.as_deref() == Some(response.id.as_str()) {
                    self.epoch.response_id = None;
                }
                if let Some(usage) = &response.usage {
                    self.stats.add_usage(usage);
                    self.send_data(self.stats.to_record()).await;
                }
            }
            ServerEvent::AudioTranscriptDelta {
                response_id,
                item_id,
                delta,
                ..
            }
            | ServerEvent::TextDelta {
                response_id,
                item_id,
                delta,
                ..
            } => {
                if self.epoch.is_flushed(&response_id) {
                    debug!("Dropping transcript delta of flushed response {}", response_id);
                    return Ok(());
                }
                self.track_item(&item_id);
                for sentence in self.epoch.assembler.push(&delta) {
                    self.send_data(DataRecord::transcript(sentence, false, Role::Assistant, 0))
                        .await;
                }
            }
            ServerEvent::AudioDelta {
                response_id,
                item_id,
                content_index,
                delta,
            } => {
                if self.epoch.is_flushed(&response_id) {
                    debug!("Dropping audio delta of flushed response {}", response_id);
                    return Ok(());
                }
                self.track_item(&item_id);
                self.epoch.content_index = content_index;
                let pcm = ServerEvent::decode_audio_delta(&delta)
                    .map_err(|e| RealtimeError::Protocol(format!("invalid audio delta: {e}")))?;
                let chunk = PlaybackChunk {
                    generation: *self.playback_generation.borrow(),
                    pcm: Bytes::from(pcm),
                };
                if self.playback.send(chunk).await.is_err() {
                    warn!("Audio output task is gone");
                }
            }
            ServerEvent::AudioTranscriptDone {
                response_id,
                item_id,
                transcript: text,
                ..
            }
            | ServerEvent::TextDone {
                response_id,
                item_id,
                text,
                ..
            } => {
                if self.epoch.is_flushed(&response_id) {
                    debug!("Dropping final transcript of flushed response {}", response_id);
                    return Ok(());
                }
                self.memory
                    .put(ConversationTurn::new(Role::Assistant, text, Some(item_id)));
                self.epoch.assembler.reset();
                self.send_data(DataRecord::transcript("", true, Role::Assistant, 0))
                    .await;
                self.record_completion();
            }
            ServerEvent::AudioDone { .. } => self.record_completion(),
            ServerEvent::SpeechStarted { .. } => self.on_speech_started(sender).await?,
            ServerEvent::SpeechStopped { audio_end_ms, .. } => {
                let now = Instant::now();
                self.epoch.started_at = now
                    .checked_sub(Duration::from_millis(audio_end_ms))
                    .unwrap_or(now);
                self.input_end = Some(now);
                debug!("Speech stopped at {}ms", audio_end_ms);
            }
            ServerEvent::OutputItemAdded { item, .. } => {
                if item.is_function_call()
                    && let (Some(call_id), Some(name)) = (item.call_id, item.name)
                {
                    debug!("Function call {} -> {}", call_id, name);
                    self.epoch.tool_calls.insert(call_id, name);
                }
            }
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
                ..
            } => {
                let name = name
                    .or_else(|| self.epoch.tool_calls.remove(&call_id))
                    .unwrap_or_default();
                info!("Model requested tool {} ({})", name, call_id);
                let bridge = self.bridge.clone();
                let sender = sender.clone();
                let call = PendingToolCall {
                    call_id,
                    name,
                    arguments,
                };
                tokio::spawn(async move {
                    if let Err(e) = bridge.relay(&sender, call).await {
                        warn!("Failed to return tool output: {}", e);
                    }
                });
            }
            ServerEvent::Error { error } => {
                error!("Realtime service error: {} {}", error.error_type, error.message);
            }
            ServerEvent::Unknown => debug!("Ignoring unknown server event"),
            other => debug!("Unhandled server event: {:?}", other),
        }
        Ok(())
    }

    async fn on_session_created(
        &mut self,
        session: Session,
        sender: &RequestSender,
    ) -> RealtimeResult<()> {
        info!("Session created: {} ({})", session.id, session.model);
        self.epoch.session = Some(session);
        self.epoch.started_at = Instant::now();

        sender
            .send_request(session_update(&self.config, &self.tools))
            .await?;

        let history = self.memory.get();
        for turn in &history {
            let item = match turn.role {
                Role::User => ConversationItem::user_text(turn.content.clone()),
                Role::Assistant => ConversationItem::assistant_text(turn.content.clone()),
            };
            sender.send_request(ClientEvent::item_create(item)).await?;
        }
        if !history.is_empty() {
            info!("Replayed {} turns of history", history.len());
        }
        self.memory.clear();

        let _ = self.link.send(Some(sender.clone()));
        self.set_state(CoordinatorState::Active);

        if !self.first_session_seen {
            self.first_session_seen = true;
            self.greet(sender).await?;
        }
        Ok(())
    }

    /// Barge-in: drop queued playback, truncate, flush the host, close the
    /// interrupted transcript and suppress the rest of the response.
    async fn on_speech_started(&mut self, sender: &RequestSender) -> RealtimeResult<()> {
        self.interrupt_playback();
        let elapsed_ms = Instant::now()
            .saturating_duration_since(self.epoch.started_at)
            .as_millis() as u64;
        info!(
            "Speech started, response {:?}, item {:?}",
            self.epoch.response_id, self.epoch.item_id
        );

        if let Some(item_id) = self.epoch.item_id.clone()
            && elapsed_ms > 0
        {
            sender
                .send_request(ClientEvent::ConversationItemTruncate {
                    item_id,
                    content_index: self.epoch.content_index,
                    audio_end_ms: elapsed_ms,
                })
                .await?;
        }

        if self.config.server_vad {
            self.flush_host().await;
        }

        if let Some(response_id) = self.epoch.response_id.clone()
            && !self.epoch.assembler.remainder().is_empty()
        {
            let text = format!("{}{}", self.epoch.assembler.take_remainder(), INTERRUPTED_SUFFIX);
            self.send_data(DataRecord::transcript(text, true, Role::Assistant, 0))
                .await;
            self.epoch.flushed.insert(response_id);
        }

        self.epoch.item_id = None;
        Ok(())
    }

    /// Remember the current item; the first delta of a new item marks the
    /// first token.
    fn track_item(&mut self, item_id: &str) {
        if self.epoch.item_id.as_deref() == Some(item_id) {
            return;
        }
        self.epoch.item_id = Some(item_id.to_string());
        if let Some(latency) = self.since_input_end() {
            self.stats.record_first_token(latency);
        }
    }

    fn record_completion(&mut self) {
        if let Some(latency) = self.since_input_end() {
            self.stats.record_completion(latency);
        }
    }

    async fn greet(&mut self, sender: &RequestSender) -> RealtimeResult<()> {
        info!("Sending greeting");
        self.greeted = true;
        sender.send_request(greeting_request(&self.config)).await
    }

    // =========================================================================
    // Memory and storage
    // =========================================================================

    async fn drain_memory_events(&mut self, sender: Option<&RequestSender>) {
        while let Ok(event) = self.memory_events.try_recv() {
            match event {
                MemoryEvent::Expired(turn) => {
                    let (Some(item_id), Some(sender)) = (turn.item_id, sender) else {
                        continue;
                    };
                    debug!("History turn expired, deleting item {}", item_id);
                    if let Err(e) = sender
                        .send_request(ClientEvent::ConversationItemDelete { item_id })
                        .await
                    {
                        warn!("Failed to delete expired item: {}", e);
                    }
                }
                MemoryEvent::Appended(turn) => {
                    if !self.config.enable_storage {
                        continue;
                    }
                    let stream_id = match turn.role {
                        Role::User => self.remote_stream_id(),
                        Role::Assistant => 0,
                    };
                    self.send_data(DataRecord::append(turn.content, turn.role, stream_id))
                        .await;
                }
            }
        }
    }

    async fn retrieve_history(&mut self) {
        let result = match self.host.send_cmd(Command::new(CMD_RETRIEVE)).await {
            Ok(result) if result.is_ok() => result,
            Ok(_) => {
                warn!("Failed to retrieve stored history");
                return;
            }
            Err(e) => {
                warn!("Failed to retrieve stored history: {}", e);
                return;
            }
        };

        let turns = match result.property(PROPERTY_RESPONSE) {
            Some(Value::String(raw)) => serde_json::from_str::<Vec<ConversationTurn>>(raw),
            Some(value) => serde_json::from_value::<Vec<ConversationTurn>>(value.clone()),
            None => Ok(Vec::new()),
        };
        match turns {
            Ok(turns) => {
                info!("Loaded {} stored turns", turns.len());
                for turn in turns {
                    self.memory.put(turn);
                }
                // Stored turns are already persisted.
                while self.memory_events.try_recv().is_ok() {}
            }
            Err(e) => error!("Failed to parse stored history: {}", e),
        }
    }

    // =========================================================================
    // Host commands
    // =========================================================================

    async fn handle_control(&mut self, request: ControlRequest) {
        let outcome = self.handle_cmd(request.cmd).await;
        let _ = request.reply.send(outcome);
    }

    async fn handle_cmd(&mut self, cmd: Command) -> CmdOutcome {
        debug!("Host command: {}", cmd.name);
        match cmd.name.as_str() {
            CMD_FLUSH => {
                self.interrupt_playback();
                self.flush_host().await;
                CmdOutcome::ok()
            }
            CMD_ON_USER_JOINED => {
                self.users_count += 1;
                info!("User joined, {} present", self.users_count);
                if self.users_count == 1
                    && !self.greeted
                    && let Some(sender) = self.live_sender()
                    && let Err(e) = self.greet(&sender).await
                {
                    warn!("Failed to send greeting: {}", e);
                }
                CmdOutcome::ok()
            }
            CMD_ON_USER_LEFT => {
                self.users_count = self.users_count.saturating_sub(1);
                info!("User left, {} present", self.users_count);
                CmdOutcome::ok()
            }
            CMD_TOOL_REGISTER => match self.register_tool(&cmd).await {
                Ok(()) => CmdOutcome::ok(),
                Err(e) => {
                    warn!("Rejected tool registration: {}", e);
                    CmdOutcome::error(e.to_string())
                }
            },
            other => CmdOutcome::error(format!("unknown command {other}")),
        }
    }

    async fn register_tool(&mut self, cmd: &Command) -> RealtimeResult<()> {
        let tool: ToolMetadata = match cmd.property(PROPERTY_TOOL) {
            Some(Value::String(raw)) => serde_json::from_str(raw)?,
            Some(value) => serde_json::from_value(value.clone())?,
            None => {
                return Err(RealtimeError::Configuration(
                    "tool_register without tool property".to_string(),
                ));
            }
        };
        info!("Registered tool {}", tool.name);

        match self.tools.iter_mut().find(|t| t.name == tool.name) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }

        if self.is_active()
            && let Some(sender) = self.live_sender()
        {
            sender
                .send_request(session_update(&self.config, &self.tools))
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Host output
    // =========================================================================

    /// Drop assistant audio that is queued but not yet played.
    fn interrupt_playback(&self) {
        self.playback_generation.send_modify(|g| *g += 1);
    }

    async fn flush_host(&self) {
        match self.host.send_cmd(Command::new(CMD_FLUSH)).await {
            Ok(result) if !result.is_ok() => warn!("Host refused flush"),
            Ok(_) => {}
            Err(e) => warn!("Failed to flush host: {}", e),
        }
    }

    async fn send_data(&self, data: DataRecord) {
        if let Err(e) = self.host.send_data(data).await {
            warn!("Failed to send data to host: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_outcome() {
        assert!(CmdOutcome::ok().is_ok());
        let err = CmdOutcome::error("nope");
        assert!(!err.is_ok());
        assert_eq!(err.detail, "nope");
    }

    #[test]
    fn test_epoch_starts_empty() {
        let epoch = SessionEpoch::new();
        assert!(epoch.session.is_none());
        assert!(epoch.response_id.is_none());
        assert!(epoch.item_id.is_none());
        assert!(epoch.flushed.is_empty());
        assert_eq!(epoch.remote_stream_id, 0);
        assert!(!epoch.is_flushed("resp_1"));
    }
}
