//! Gateway (WebSocket) transport for the Discord API.
//!
//! This module owns the WebSocket connection lifecycle:
//!   - connect → receive HELLO → send IDENTIFY
//!   - background heartbeat task
//!   - sequence number + session_id tracking
//!   - automatic reconnect + RESUME on disconnect
//!   - gateway send rate limiting (120 events / 60s)
//!
//! The rest of the codebase consumes a stream of [`GatewayEvent`] values
//! without ever touching `tokio_tungstenite` directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::config::AccountKind;
use crate::error::{Error, Result};
use crate::events::GatewayEvent;
use crate::types::{GatewayPayload, Intents};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Discord allows at most 120 gateway sends per 60 seconds.
const SEND_BUDGET_MAX: usize = 120;
const SEND_BUDGET_WINDOW: Duration = Duration::from_secs(60);

/// Consecutive failed reconnects before the client gives up.
const MAX_RECONNECT_ATTEMPTS: u32 = 8;

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Gateway send rate limiter
// ---------------------------------------------------------------------------

/// Sliding-window limiter for outbound gateway messages.
struct SendRateLimiter {
    /// Send instants still inside the window, oldest first.
    timestamps: Vec<Instant>,
    budget: usize,
    window: Duration,
}

impl SendRateLimiter {
    fn new(budget: usize, window: Duration) -> Self {
        Self {
            timestamps: Vec::with_capacity(budget),
            budget,
            window,
        }
    }

    /// How long to wait before the next send. Does not record the send.
    fn delay(&self, now: Instant) -> Option<Duration> {
        let mut in_window = self
            .timestamps
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window);
        let oldest = in_window.next()?;
        if in_window.count() + 1 < self.budget {
            return None;
        }
        let expires_at = *oldest + self.window;
        (expires_at > now).then(|| expires_at - now)
    }

    fn record(&mut self, now: Instant) {
        let window = self.window;
        self.timestamps
            .retain(|&t| now.duration_since(t) < window);
        self.timestamps.push(now);
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GatewayConfig {
    pub token: String,
    pub account: AccountKind,
    /// Only sent when identifying as a bot.
    pub intents: Intents,
    pub url: String,
}

impl GatewayConfig {
    pub fn new(token: impl Into<String>, account: AccountKind) -> Self {
        Self {
            token: token.into(),
            account,
            intents: Intents::logged_events(),
            url: DEFAULT_GATEWAY_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("account", &self.account)
            .field("intents", &self.intents)
            .field("url", &self.url)
            .finish()
    }
}

/// The IDENTIFY (op 2) payload.
///
/// User accounts identify like a desktop client and come up invisible;
/// bot accounts declare the intents they need.
pub(crate) fn identify_payload(config: &GatewayConfig) -> Value {
    match config.account {
        AccountKind::User => json!({
            "op": 2,
            "d": {
                "token": config.token,
                "properties": {
                    "os": "Linux",
                    "browser": "Discord Client",
                    "device": "",
                },
                "presence": {
                    "status": "offline",
                    "since": 0,
                    "activities": [],
                    "afk": false,
                },
                "compress": false,
            }
        }),
        AccountKind::Bot => json!({
            "op": 2,
            "d": {
                "token": config.token,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "complete-logger",
                    "device": "complete-logger",
                },
                "intents": config.intents.bits(),
            }
        }),
    }
}

fn resume_payload(token: &str, session_id: &str, sequence: u64) -> Value {
    json!({
        "op": 6,
        "d": {
            "token": token,
            "session_id": session_id,
            "seq": sequence,
        }
    })
}

/// Make sure the URL carries the API version and encoding.
fn with_query(url: &str) -> String {
    if url.contains("v=10") {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&v=10&encoding=json", url)
    } else {
        format!("{}/?v=10&encoding=json", url.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// Internal session state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct SessionState {
    /// From the READY event.
    session_id: Option<String>,
    /// Resume URL provided by Discord in the READY event.
    resume_gateway_url: Option<String>,
    /// Last sequence number seen.
    sequence: Option<u64>,
}

impl SessionState {
    /// Session id and sequence, when both are known.
    fn resumable(&self) -> Option<(String, u64)> {
        Some((self.session_id.clone()?, self.sequence?))
    }
}

// ---------------------------------------------------------------------------
// WebSocket aliases (transport boundary)
// ---------------------------------------------------------------------------

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

type WsStream = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// A running gateway connection.
///
/// `events` closes once the driver stops; awaiting `driver` then yields why.
pub struct GatewayHandle {
    pub events: mpsc::Receiver<GatewayEvent>,
    pub driver: tokio::task::JoinHandle<Result<()>>,
}

/// Spawn the gateway driver: reading and parsing events, heartbeating at
/// the interval Discord asks for, and reconnecting or resuming on
/// disconnects.
pub fn connect(config: GatewayConfig) -> GatewayHandle {
    let (event_tx, events) = mpsc::channel::<GatewayEvent>(EVENT_CHANNEL_CAPACITY);
    let driver = tokio::spawn(gateway_driver(config, event_tx));
    GatewayHandle { events, driver }
}

// ---------------------------------------------------------------------------
// The main driver loop (runs in a spawned task)
// ---------------------------------------------------------------------------

async fn gateway_driver(config: GatewayConfig, event_tx: mpsc::Sender<GatewayEvent>) -> Result<()> {
    let session = Arc::new(Mutex::new(SessionState::default()));
    let mut reconnect_attempts: u32 = 0;

    loop {
        if reconnect_attempts > 0 {
            if reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
                error!("exceeded max reconnect attempts, giving up");
                return Err(Error::Gateway(format!(
                    "gave up after {} reconnect attempts",
                    MAX_RECONNECT_ATTEMPTS
                )));
            }
            let backoff = backoff_delay(reconnect_attempts);
            warn!(
                delay_ms = backoff.as_millis() as u64,
                attempt = reconnect_attempts,
                "backing off before reconnect"
            );
            tokio::time::sleep(backoff).await;
        }

        let url = {
            let s = session.lock().await;
            with_query(s.resume_gateway_url.as_deref().unwrap_or(&config.url))
        };

        info!(url = %url, "connecting to Discord gateway");

        let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                error!(error = %e, "failed to connect to gateway");
                reconnect_attempts += 1;
                continue;
            }
        };

        info!("WebSocket connected");

        let (ws_write, mut ws_read) = ws_stream.split();
        let ws_write = Arc::new(Mutex::new(ws_write));
        let rate_limiter = Arc::new(Mutex::new(SendRateLimiter::new(
            SEND_BUDGET_MAX,
            SEND_BUDGET_WINDOW,
        )));

        // ------------------------------------------------------------------
        // 1.  Read HELLO and extract heartbeat_interval
        // ------------------------------------------------------------------
        let heartbeat_interval = match read_hello_from_stream(&mut ws_read).await {
            Ok(interval) => interval,
            Err(e) => {
                error!(error = %e, "failed to read HELLO from gateway");
                reconnect_attempts += 1;
                continue;
            }
        };

        info!(interval_ms = heartbeat_interval, "received HELLO");

        // ------------------------------------------------------------------
        // 2.  Send IDENTIFY or RESUME
        // ------------------------------------------------------------------
        let resumable = session.lock().await.resumable();
        let (handshake, kind) = match resumable {
            Some((session_id, sequence)) => (
                resume_payload(&config.token, &session_id, sequence),
                "RESUME",
            ),
            None => (identify_payload(&config), "IDENTIFY"),
        };

        if let Err(e) = rate_limited_send(&ws_write, &rate_limiter, &handshake).await {
            error!(error = %e, "failed to send {}", kind);
            reconnect_attempts += 1;
            continue;
        }
        info!("sent {}", kind);

        // ------------------------------------------------------------------
        // 3.  Spawn heartbeat task
        // ------------------------------------------------------------------
        let hb_write = Arc::clone(&ws_write);
        let hb_session = Arc::clone(&session);
        let hb_rate_limiter = Arc::clone(&rate_limiter);
        let (hb_cancel_tx, mut hb_cancel_rx) = mpsc::channel::<()>(1);

        let heartbeat_handle = tokio::spawn(async move {
            // First heartbeat goes out after `heartbeat_interval * jitter`,
            // jitter in [0, 1).
            let jitter = rand::random::<f64>();
            let first_delay = Duration::from_millis((heartbeat_interval as f64 * jitter) as u64);
            tokio::select! {
                _ = tokio::time::sleep(first_delay) => {}
                _ = hb_cancel_rx.recv() => { return; }
            }

            let mut interval = tokio::time::interval(Duration::from_millis(heartbeat_interval));
            // The first tick fires immediately; we already waited above.
            interval.tick().await;

            loop {
                let seq = hb_session.lock().await.sequence;
                let heartbeat = json!({"op": 1, "d": seq});
                if let Err(e) = rate_limited_send(&hb_write, &hb_rate_limiter, &heartbeat).await {
                    warn!(error = %e, "heartbeat send failed, stopping heartbeat task");
                    return;
                }
                debug!(seq = ?seq, "sent heartbeat");

                tokio::select! {
                    _ = interval.tick() => {}
                    _ = hb_cancel_rx.recv() => {
                        debug!("heartbeat task cancelled");
                        return;
                    }
                }
            }
        });

        // ------------------------------------------------------------------
        // 4.  Main read loop
        // ------------------------------------------------------------------
        let disconnect_reason =
            read_loop(&mut ws_read, &ws_write, &rate_limiter, &event_tx, &session).await;

        // ------------------------------------------------------------------
        // 5.  Cleanup: cancel heartbeat, decide whether to reconnect
        // ------------------------------------------------------------------
        let _ = hb_cancel_tx.send(()).await;
        heartbeat_handle.abort();

        {
            let mut w = ws_write.lock().await;
            let _ = w.send(WsMessage::Close(None)).await;
        }

        match disconnect_reason {
            DisconnectReason::ShouldResume => {
                info!("will attempt RESUME");
                // Session state is preserved so the next loop sends RESUME.
            }
            DisconnectReason::ShouldReidentify => {
                info!("session invalidated, will re-IDENTIFY");
                let mut s = session.lock().await;
                s.session_id = None;
                s.sequence = None;
            }
            DisconnectReason::Fatal(code) => {
                error!(close_code = code, "fatal gateway close, shutting down");
                return Err(Error::Gateway(format!(
                    "gateway closed with fatal code {} ({})",
                    code,
                    close_code_description(code)
                )));
            }
            DisconnectReason::EventChannelClosed => {
                info!("event channel closed, shutting down gateway driver");
                return Ok(());
            }
        }

        reconnect_attempts += 1;
    }
}

// ---------------------------------------------------------------------------
// Disconnect reason
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisconnectReason {
    ShouldResume,
    ShouldReidentify,
    /// Carries the close code.
    Fatal(u16),
    EventChannelClosed,
}

/// What to do after the server closes the socket with `code`.
fn classify_close(code: u16) -> DisconnectReason {
    match code {
        4004 | 4010..=4014 => DisconnectReason::Fatal(code),
        // Invalid seq or session timed out.
        4007 | 4009 => DisconnectReason::ShouldReidentify,
        _ => DisconnectReason::ShouldResume,
    }
}

fn close_code_description(code: u16) -> &'static str {
    match code {
        4004 => "authentication failed",
        4010 => "invalid shard",
        4011 => "sharding required",
        4012 => "invalid API version",
        4013 => "invalid intents",
        4014 => "disallowed intents",
        _ => "unknown",
    }
}

// ---------------------------------------------------------------------------
// Read loop
// ---------------------------------------------------------------------------

async fn read_loop(
    ws_read: &mut WsStream,
    ws_write: &Arc<Mutex<WsSink>>,
    rate_limiter: &Arc<Mutex<SendRateLimiter>>,
    event_tx: &mpsc::Sender<GatewayEvent>,
    session: &Arc<Mutex<SessionState>>,
) -> DisconnectReason {
    loop {
        tokio::select! {
            biased;

            // Consumer went away; nothing left to deliver to.
            _ = event_tx.closed() => {
                return DisconnectReason::EventChannelClosed;
            }

            msg = ws_read.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket read error");
                        return DisconnectReason::ShouldResume;
                    }
                    None => {
                        info!("WebSocket stream ended");
                        return DisconnectReason::ShouldResume;
                    }
                };

                match msg {
                    WsMessage::Text(text) => {
                        let payload: GatewayPayload = match serde_json::from_str(&text) {
                            Ok(p) => p,
                            Err(e) => {
                                warn!(error = %e, "failed to parse gateway payload");
                                continue;
                            }
                        };

                        if let Some(s) = payload.s {
                            session.lock().await.sequence = Some(s);
                        }

                        let event = GatewayEvent::from_payload(payload);

                        match &event {
                            GatewayEvent::Ready(ready) => {
                                let mut sess = session.lock().await;
                                sess.session_id = Some(ready.session_id.clone());
                                sess.resume_gateway_url = Some(ready.resume_gateway_url.clone());
                                info!(
                                    session_id = %ready.session_id,
                                    user = %ready.user.tag(),
                                    "gateway READY"
                                );
                            }

                            GatewayEvent::Resumed => {
                                info!("session resumed");
                            }

                            GatewayEvent::HeartbeatRequest => {
                                let seq = session.lock().await.sequence;
                                let heartbeat = json!({"op": 1, "d": seq});
                                if let Err(e) = rate_limited_send(ws_write, rate_limiter, &heartbeat).await {
                                    warn!(error = %e, "failed to send requested heartbeat");
                                }
                                debug!("sent requested heartbeat");
                                continue;
                            }

                            GatewayEvent::HeartbeatAck => {
                                debug!("heartbeat acknowledged");
                                continue;
                            }

                            GatewayEvent::Reconnect => {
                                info!("gateway requested reconnect (op 7)");
                                return DisconnectReason::ShouldResume;
                            }

                            GatewayEvent::InvalidSession(resumable) => {
                                warn!(resumable, "session invalidated (op 9)");
                                let jitter = Duration::from_millis(1000 + rand::random::<u64>() % 4000);
                                tokio::time::sleep(jitter).await;
                                return if *resumable {
                                    DisconnectReason::ShouldResume
                                } else {
                                    DisconnectReason::ShouldReidentify
                                };
                            }

                            _ => {}
                        }

                        if event_tx.send(event).await.is_err() {
                            info!("event channel closed by consumer");
                            return DisconnectReason::EventChannelClosed;
                        }
                    }

                    WsMessage::Close(frame) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        warn!(close_code = ?code, "WebSocket closed by server");
                        return code.map_or(DisconnectReason::ShouldResume, classify_close);
                    }

                    // Ping/Pong/Binary: ignore.
                    _ => {}
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read the HELLO payload and return its heartbeat interval in ms.
async fn read_hello_from_stream(stream: &mut WsStream) -> Result<u64> {
    let msg = tokio::time::timeout(Duration::from_secs(30), stream.next())
        .await
        .map_err(|_| Error::Gateway("timed out waiting for HELLO".to_string()))?
        .ok_or_else(|| Error::Gateway("stream ended before HELLO".to_string()))?
        .map_err(|e| Error::Gateway(format!("WS error reading HELLO: {}", e)))?;

    let text = match msg {
        WsMessage::Text(t) => t,
        other => {
            return Err(Error::Gateway(format!(
                "expected text message for HELLO, got {:?}",
                other
            )))
        }
    };

    let payload: GatewayPayload = serde_json::from_str(&text)
        .map_err(|e| Error::Gateway(format!("failed to parse HELLO: {}", e)))?;
    hello_interval(&payload)
}

fn hello_interval(payload: &GatewayPayload) -> Result<u64> {
    if payload.op != 10 {
        return Err(Error::Gateway(format!(
            "expected op 10 (HELLO), got op {}",
            payload.op
        )));
    }

    payload
        .d
        .as_ref()
        .and_then(|d| d.get("heartbeat_interval"))
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::Gateway("HELLO missing heartbeat_interval".to_string()))
}

/// Send a JSON payload on the WebSocket, respecting the send budget.
async fn rate_limited_send(
    ws_write: &Arc<Mutex<WsSink>>,
    rate_limiter: &Arc<Mutex<SendRateLimiter>>,
    payload: &Value,
) -> Result<()> {
    loop {
        let delay = rate_limiter.lock().await.delay(Instant::now());
        match delay {
            Some(d) => {
                debug!(
                    delay_ms = d.as_millis() as u64,
                    "gateway send rate-limited, waiting"
                );
                tokio::time::sleep(d).await;
            }
            None => break,
        }
    }

    rate_limiter.lock().await.record(Instant::now());

    let text = serde_json::to_string(payload)
        .map_err(|e| Error::Gateway(format!("failed to encode payload: {}", e)))?;

    ws_write
        .lock()
        .await
        .send(WsMessage::Text(text))
        .await
        .map_err(|e| Error::Gateway(format!("WS send error: {}", e)))
}

/// Exponential backoff with jitter, capped at 60 s.
fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 1000u64 * 2u64.saturating_pow(attempt.min(6));
    let jitter = (rand::random::<f64>() * 0.5 + 0.75) * base_ms as f64;
    Duration::from_millis(jitter.min(60_000.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Send budget --------------------------------------------------------

    #[test]
    fn send_budget_allows_up_to_limit() {
        let now = Instant::now();
        let mut limiter = SendRateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..2 {
            limiter.record(now);
        }
        assert_eq!(limiter.delay(now), None);
        limiter.record(now);
        assert_eq!(limiter.delay(now), Some(Duration::from_secs(60)));
    }

    #[test]
    fn send_budget_frees_up_as_window_slides() {
        let start = Instant::now();
        let mut limiter = SendRateLimiter::new(2, Duration::from_secs(60));
        limiter.record(start);
        limiter.record(start + Duration::from_secs(30));

        let later = start + Duration::from_secs(45);
        assert_eq!(limiter.delay(later), Some(Duration::from_secs(15)));
        assert_eq!(limiter.delay(start + Duration::from_secs(61)), None);
    }

    #[test]
    fn record_prunes_expired_sends() {
        let start = Instant::now();
        let mut limiter = SendRateLimiter::new(120, Duration::from_secs(60));
        limiter.record(start);
        limiter.record(start + Duration::from_secs(120));
        assert_eq!(limiter.timestamps.len(), 1);
    }

    // -- Backoff ------------------------------------------------------------

    #[test]
    fn backoff_grows_and_caps() {
        let first = backoff_delay(1);
        assert!(first >= Duration::from_millis(1500) && first <= Duration::from_millis(2500));
        for attempt in 6..=MAX_RECONNECT_ATTEMPTS {
            assert!(backoff_delay(attempt) <= Duration::from_secs(60));
        }
    }

    // -- Close codes --------------------------------------------------------

    #[test]
    fn close_codes_are_classified() {
        assert_eq!(classify_close(4004), DisconnectReason::Fatal(4004));
        for code in 4010..=4014 {
            assert_eq!(classify_close(code), DisconnectReason::Fatal(code));
        }
        assert_eq!(classify_close(4007), DisconnectReason::ShouldReidentify);
        assert_eq!(classify_close(4009), DisconnectReason::ShouldReidentify);
        assert_eq!(classify_close(1000), DisconnectReason::ShouldResume);
        assert_eq!(classify_close(4000), DisconnectReason::ShouldResume);
    }

    // -- Handshake payloads -------------------------------------------------

    #[test]
    fn user_identify_is_offline_without_intents() {
        let payload = identify_payload(&GatewayConfig::new("tok", AccountKind::User));
        assert_eq!(payload["op"], 2);
        assert_eq!(payload["d"]["token"], "tok");
        assert_eq!(payload["d"]["presence"]["status"], "offline");
        assert!(payload["d"].get("intents").is_none());
    }

    #[test]
    fn bot_identify_sends_intents() {
        let payload = identify_payload(&GatewayConfig::new("tok", AccountKind::Bot));
        assert_eq!(
            payload["d"]["intents"].as_u64(),
            Some(u64::from(Intents::logged_events().bits()))
        );
        assert!(payload["d"].get("presence").is_none());
    }

    #[test]
    fn resume_carries_session_and_sequence() {
        let payload = resume_payload("tok", "sess", 42);
        assert_eq!(payload["op"], 6);
        assert_eq!(payload["d"]["session_id"], "sess");
        assert_eq!(payload["d"]["seq"], 42);
    }

    #[test]
    fn session_is_resumable_only_with_id_and_sequence() {
        let mut session = SessionState::default();
        assert!(session.resumable().is_none());
        session.session_id = Some("s".into());
        assert!(session.resumable().is_none());
        session.sequence = Some(7);
        assert_eq!(session.resumable(), Some(("s".to_string(), 7)));
    }

    #[test]
    fn gateway_url_gets_version_query() {
        assert_eq!(with_query(DEFAULT_GATEWAY_URL), DEFAULT_GATEWAY_URL);
        assert_eq!(
            with_query("wss://gateway-us-east1-b.discord.gg"),
            "wss://gateway-us-east1-b.discord.gg/?v=10&encoding=json"
        );
    }

    #[test]
    fn hello_interval_requires_op_10() {
        let hello: GatewayPayload =
            serde_json::from_str(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
                .unwrap();
        assert_eq!(hello_interval(&hello).unwrap(), 41250);

        let ack: GatewayPayload =
            serde_json::from_str(r#"{"op":11,"d":null,"s":null,"t":null}"#).unwrap();
        assert!(hello_interval(&ack).is_err());
    }

    #[test]
    fn config_debug_redacts_token() {
        let rendered = format!("{:?}", GatewayConfig::new("secret", AccountKind::User));
        assert!(!rendered.contains("secret"));
    }
}
