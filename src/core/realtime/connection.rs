//! Connection management for the realtime channel.
//!
//! A [`ConnectionManager`] owns exactly one full-duplex text channel obtained
//! from a [`Connector`]. Outbound events go through a single writer task so
//! they reach the wire in call order; inbound frames are exposed as a lazy
//! stream of typed [`ServerEvent`]s.
//!
//! The manager never reconnects on its own. When [`ConnectionManager::listen`]
//! ends, the owner decides whether to build a fresh manager.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, Stream, StreamExt};
use http::HeaderValue;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::base::{RealtimeError, RealtimeResult};
use super::config::Vendor;
use super::messages::{ClientEvent, ServerEvent};

/// Capacity of the outbound request queue.
const REQUEST_CHANNEL_CAPACITY: usize = 256;

/// How long `close()` waits for queued requests to be written.
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest string field value printed in verbose logs.
const VERBOSE_FIELD_LIMIT: usize = 128;

/// Outbound half of a transport.
pub type TransportSink = Pin<Box<dyn Sink<String, Error = RealtimeError> + Send>>;

/// Inbound half of a transport. Ends on close; an `Err` item is terminal.
pub type TransportStream = BoxStream<'static, RealtimeResult<String>>;

/// An open, ordered, full-duplex text channel.
pub struct Transport {
    pub sink: TransportSink,
    pub stream: TransportStream,
}

/// Opens transports to the realtime service.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new channel.
    async fn open(&self) -> RealtimeResult<Transport>;
}

// =============================================================================
// WebSocket connector
// =============================================================================

/// Production connector over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
    api_key: String,
    vendor: Vendor,
}

impl WebSocketConnector {
    /// Build a connector for `{base_uri}{path}?model={model}`.
    pub fn new(
        base_uri: &str,
        path: &str,
        model: &str,
        api_key: impl Into<String>,
        vendor: Vendor,
    ) -> RealtimeResult<Self> {
        Ok(Self {
            url: build_ws_url(base_uri, path, model)?,
            api_key: api_key.into(),
            vendor,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn build_request(&self) -> RealtimeResult<http::Request<()>> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::Connection(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| RealtimeError::Configuration(format!("Invalid API key: {}", e)))?;
        let headers = request.headers_mut();
        headers.insert(http::header::AUTHORIZATION, auth);
        if self.vendor.needs_beta_header() {
            headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        }

        Ok(request)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self) -> RealtimeResult<Transport> {
        let request = self.build_request()?;

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::Connection(e.to_string()))?;

        info!("Connected to realtime service at {}", self.url);

        let (ws_sink, mut ws_stream) = ws.split();

        let sink = ws_sink
            .sink_map_err(|e| RealtimeError::Connection(e.to_string()))
            .with(|text: String| {
                futures::future::ready(Ok::<_, RealtimeError>(Message::Text(text.into())))
            });

        let stream = async_stream::stream! {
            while let Some(msg) = ws_stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => yield Ok(text.as_str().to_owned()),
                    Ok(Message::Binary(data)) => {
                        debug!("Ignoring binary frame of {} bytes", data.len());
                    }
                    Ok(Message::Close(frame)) => {
                        info!("WebSocket closed by server: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(RealtimeError::Connection(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Transport {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }
}

/// Join base URI and path and make sure the `model` query parameter is set.
pub fn build_ws_url(base_uri: &str, path: &str, model: &str) -> RealtimeResult<Url> {
    let joined = format!("{}{}", base_uri.trim_end_matches('/'), path);
    let mut url = Url::parse(&joined)
        .map_err(|e| RealtimeError::Configuration(format!("Invalid URL {}: {}", joined, e)))?;

    if !model.is_empty() && !url.query_pairs().any(|(k, _)| k == "model") {
        url.query_pairs_mut().append_pair("model", model);
    }
    Ok(url)
}

// =============================================================================
// Request sender
// =============================================================================

/// Cloneable handle for queueing client events on a live connection.
#[derive(Debug, Clone)]
pub struct RequestSender {
    tx: mpsc::Sender<ClientEvent>,
}

impl RequestSender {
    /// A sender wired to a plain receiver instead of a transport.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue one event. Fails once the connection has been closed.
    pub async fn send_request(&self, event: ClientEvent) -> RealtimeResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// Connection manager
// =============================================================================

/// Owns one channel to the realtime service.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    verbose: bool,
    sender: Option<RequestSender>,
    stream: Option<TransportStream>,
    writer: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, verbose: bool) -> Self {
        Self {
            connector,
            verbose,
            sender: None,
            stream: None,
            writer: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Open the channel. A closed manager cannot be reopened.
    pub async fn connect(&mut self) -> RealtimeResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RealtimeError::Connection(
                "connection manager already closed".to_string(),
            ));
        }
        if self.sender.is_some() {
            return Ok(());
        }

        let Transport { sink, stream } = self.connector.open().await?;

        let (sender, rx) = RequestSender::channel(REQUEST_CHANNEL_CAPACITY);
        self.writer = Some(tokio::spawn(run_writer(
            sink,
            rx,
            self.cancel.clone(),
            self.verbose,
        )));
        self.sender = Some(sender);
        self.stream = Some(stream);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// A handle other tasks can use to send on this connection.
    pub fn sender(&self) -> RealtimeResult<RequestSender> {
        self.sender.clone().ok_or(RealtimeError::NotConnected)
    }

    /// Serialize and queue one client event.
    pub async fn send_request(&self, event: ClientEvent) -> RealtimeResult<()> {
        self.sender()?.send_request(event).await
    }

    /// Token cancelled when this connection is closed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Lazily yield server events until the peer closes, the transport fails
    /// or the manager is closed. Messages that do not parse are logged and
    /// skipped. Can only be taken once per connection.
    pub fn listen(&mut self) -> impl Stream<Item = ServerEvent> + Send + use<> {
        let inbound = self.stream.take();
        let cancel = self.cancel.clone();

        async_stream::stream! {
            let Some(mut inbound) = inbound else {
                warn!("listen() called without an open channel");
                return;
            };

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Listener cancelled");
                        break;
                    }
                    next = inbound.next() => next,
                };

                match next {
                    None => {
                        info!("Realtime channel closed");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Realtime channel failed: {}", e);
                        break;
                    }
                    Some(Ok(text)) => match ServerEvent::parse(&text) {
                        Ok(event) => yield event,
                        Err(e) => {
                            warn!("Skipping server message: {} - {}", e, preview(&text));
                        }
                    },
                }
            }
        }
    }

    /// Close the channel. Requests already queued are still written.
    /// Calling this more than once is a no-op.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        self.sender = None;
        self.stream = None;

        if let Some(writer) = self.writer.take() {
            let abort = writer.abort_handle();
            if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, writer)
                .await
                .is_err()
            {
                warn!("Writer did not finish within {:?}, aborting", WRITER_SHUTDOWN_TIMEOUT);
                abort.abort();
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_writer(
    mut sink: TransportSink,
    mut rx: mpsc::Receiver<ClientEvent>,
    cancel: CancellationToken,
    verbose: bool,
) {
    loop {
        let event = tokio::select! {
            biased;
            event = rx.recv() => event,
            _ = cancel.cancelled() => break,
        };
        let Some(event) = event else { break };
        if write_event(&mut sink, &event, verbose).await.is_err() {
            return;
        }
    }

    // Flush whatever was queued before close.
    while let Ok(event) = rx.try_recv() {
        if write_event(&mut sink, &event, verbose).await.is_err() {
            return;
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Error closing realtime channel: {}", e);
    }
}

async fn write_event(
    sink: &mut TransportSink,
    event: &ClientEvent,
    verbose: bool,
) -> RealtimeResult<()> {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize {}: {}", event.event_type(), e);
            return Ok(());
        }
    };

    if verbose {
        debug!("-> {}", redact_for_log(&json));
    }

    sink.send(json).await.map_err(|e| {
        error!("Failed to send {}: {}", event.event_type(), e);
        e
    })
}

/// Shorten bulky payload fields so verbose logs stay readable.
fn redact_for_log(json: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(json) else {
        return preview(json);
    };
    if let Some(map) = value.as_object_mut() {
        for key in ["delta", "audio", "image"] {
            if let Some(serde_json::Value::String(s)) = map.get_mut(key) {
                if s.len() > VERBOSE_FIELD_LIMIT {
                    *s = format!("{}...", truncate_chars(s, VERBOSE_FIELD_LIMIT));
                }
            }
        }
    }
    value.to_string()
}

fn preview(text: &str) -> String {
    if text.len() > VERBOSE_FIELD_LIMIT {
        format!("{}...", truncate_chars(text, VERBOSE_FIELD_LIMIT))
    } else {
        text.to_string()
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
