//! Rate-limit aware client for the Discord REST API.
//!
//! All outbound HTTP calls go through [`DiscordHttpClient`] so that auth
//! headers, rate-limit back-off, and error handling live in one place. The
//! event logger only needs two read endpoints, exposed through [`Lookup`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::AccountKind;
use crate::error::{HttpError, Result};
use crate::handler::Lookup;
use crate::types::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://discord.com/api/v10";
const USER_AGENT: &str = concat!("complete-logger/", env!("CARGO_PKG_VERSION"));
const MAX_RETRIES: u32 = 5;
/// Longest we'll ever sleep for a single rate-limit wait.
const MAX_WAIT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Rate-limit tracker (per-bucket)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct BucketState {
    remaining: u32,
    resets_at: Instant,
}

#[derive(Debug, Clone, Default)]
struct RateLimiter {
    /// Route key → bucket id.
    route_buckets: HashMap<String, String>,
    /// Bucket id → state.
    buckets: HashMap<String, BucketState>,
    /// No request may be sent before this instant.
    global_until: Option<Instant>,
}

impl RateLimiter {
    /// How long to wait before sending on `route_key`, if at all.
    fn delay_for(&self, route_key: &str, now: Instant) -> Option<Duration> {
        if let Some(until) = self.global_until {
            if until > now {
                return Some(until - now);
            }
        }

        let bucket_id = self.route_buckets.get(route_key)?;
        let state = self.buckets.get(bucket_id)?;
        if state.remaining == 0 && state.resets_at > now {
            return Some(state.resets_at - now);
        }
        None
    }

    fn update(&mut self, route_key: &str, info: &RateLimitInfo, now: Instant) {
        let reset_after = info.reset_after.and_then(seconds);

        if info.is_global {
            if let Some(reset_after) = reset_after {
                self.global_until = Some(now + reset_after);
            }
        }

        if let Some(bucket) = &info.bucket {
            self.route_buckets
                .insert(route_key.to_string(), bucket.clone());
            self.buckets.insert(
                bucket.clone(),
                BucketState {
                    remaining: info.remaining.unwrap_or(1),
                    resets_at: now + reset_after.unwrap_or(Duration::from_secs(1)),
                },
            );
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_rate_limit_headers(headers: &HeaderMap) -> RateLimitInfo {
    RateLimitInfo {
        remaining: header(headers, "x-ratelimit-remaining").and_then(|s| s.parse().ok()),
        reset_after: header(headers, "x-ratelimit-reset-after").and_then(|s| s.parse().ok()),
        bucket: header(headers, "x-ratelimit-bucket").map(str::to_string),
        is_global: header(headers, "x-ratelimit-global") == Some("true")
            || header(headers, "x-ratelimit-scope") == Some("global"),
    }
}

/// Seconds from a header as a duration; negative or non-finite values are
/// dropped.
fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

/// Bot tokens are prefixed, user tokens are sent as-is.
fn authorization(token: &str, account: AccountKind) -> String {
    match account {
        AccountKind::Bot => format!("Bot {}", token),
        AccountKind::User => token.to_string(),
    }
}

// ---------------------------------------------------------------------------
// DiscordHttpClient
// ---------------------------------------------------------------------------

/// Cheap to clone (internals are behind `Arc`).
#[derive(Clone)]
pub struct DiscordHttpClient {
    http: reqwest::Client,
    authorization: String,
    limiter: Arc<Mutex<RateLimiter>>,
}

impl DiscordHttpClient {
    pub fn new(token: &str, account: AccountKind) -> std::result::Result<Self, HttpError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            authorization: authorization(token, account),
            limiter: Arc::new(Mutex::new(RateLimiter::default())),
        })
    }

    /// Wait out any known rate limit on `route_key`.
    async fn wait_for(&self, route_key: &str) {
        let delay = self.limiter.lock().await.delay_for(route_key, Instant::now());
        if let Some(delay) = delay {
            let delay = delay.min(MAX_WAIT);
            debug!(
                route = route_key,
                delay_ms = delay.as_millis() as u64,
                "rate-limit pre-emptive backoff"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Send a request to `{BASE_URL}/{path}` and return the body on success.
    ///
    /// `route_key` groups requests for rate-limit bucketing, e.g.
    /// `GET /channels/{channel_id}`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        route_key: &str,
    ) -> std::result::Result<Vec<u8>, HttpError> {
        let url = format!("{}/{}", BASE_URL, path.trim_start_matches('/'));

        for attempt in 0..=MAX_RETRIES {
            self.wait_for(route_key).await;

            let resp = self
                .http
                .request(method.clone(), &url)
                .header(AUTHORIZATION, &self.authorization)
                .send()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            let status = resp.status();
            let info = parse_rate_limit_headers(resp.headers());
            self.limiter
                .lock()
                .await
                .update(route_key, &info, Instant::now());

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES {
                let retry_after = info.reset_after.unwrap_or(1.0);
                let delay = seconds(retry_after)
                    .unwrap_or(Duration::from_secs(1))
                    .min(MAX_WAIT);
                warn!(
                    route = route_key,
                    attempt,
                    retry_after_s = retry_after,
                    global = info.is_global,
                    "rate-limited by Discord, backing off"
                );
                if info.is_global {
                    self.limiter.lock().await.global_until = Some(Instant::now() + delay);
                }
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            if status.is_success() {
                return Ok(body.to_vec());
            }
            return Err(HttpError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
                route: route_key.to_string(),
            });
        }

        Err(HttpError::Api {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            body: "rate-limited after max retries".to_string(),
            route: route_key.to_string(),
        })
    }

    /// Like [`request`](Self::request) but deserialises the body as JSON.
    pub async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        route_key: &str,
    ) -> std::result::Result<T, HttpError> {
        let bytes = self.request(method, path, route_key).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            let raw = String::from_utf8_lossy(&bytes);
            let end = raw
                .char_indices()
                .nth(200)
                .map_or(raw.len(), |(index, _)| index);
            HttpError::Serde(format!("{}: {}", e, &raw[..end]))
        })
    }

    // ------------------------------------------------------------------
    // Endpoints
    // ------------------------------------------------------------------

    pub async fn get_channel(&self, channel_id: &str) -> std::result::Result<Channel, HttpError> {
        let path = format!("channels/{}", channel_id);
        let route_key = format!("GET /channels/{}", channel_id);
        self.request_json(Method::GET, &path, &route_key).await
    }

    pub async fn get_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> std::result::Result<Message, HttpError> {
        let path = format!("channels/{}/messages/{}", channel_id, message_id);
        let route_key = format!("GET /channels/{}/messages", channel_id);
        self.request_json(Method::GET, &path, &route_key).await
    }

    /// The gateway URL to connect to. Falls back to the well-known default
    /// when the endpoint is unreachable.
    pub async fn get_gateway_url(&self) -> String {
        #[derive(serde::Deserialize)]
        struct GatewayInfo {
            url: String,
        }

        match self
            .request_json::<GatewayInfo>(Method::GET, "gateway", "GET /gateway")
            .await
        {
            Ok(info) => info.url,
            Err(e) => {
                warn!(error = %e, "could not fetch gateway url, using default");
                crate::gateway::DEFAULT_GATEWAY_URL.to_string()
            }
        }
    }
}

#[async_trait]
impl Lookup for DiscordHttpClient {
    async fn fetch_channel(&self, channel_id: &str) -> Result<Channel> {
        Ok(self.get_channel(channel_id).await?)
    }

    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<Message> {
        Ok(self.get_message(channel_id, message_id).await?)
    }
}

impl std::fmt::Debug for DiscordHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordHttpClient")
            .field("authorization", &"<redacted>")
            .finish()
    }
}
