//! Client run loop: gateway in, handler events out.
//!
//! Each configured token gets its own client. A client connects the gateway,
//! feeds every wire event through its [`ClientState`] and hands the resulting
//! [`Event`]s to the handler in arrival order. Events whose handler has to
//! fetch from the REST API run as tracked tasks so a slow lookup never holds
//! up the cache; they are drained before the client returns.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::{AccountKind, Config};
use crate::error::{Error, Result};
use crate::events::GatewayEvent;
use crate::gateway::{self, GatewayConfig, GatewayHandle};
use crate::handler::{Event, EventHandler};
use crate::http::DiscordHttpClient;
use crate::identity;
use crate::logger::EventLogger;
use crate::logging::{LogContext, Logger};
use crate::state::ClientState;

async fn deliver<H>(handler: &H, account: &str, event: Event)
where
    H: EventHandler,
{
    let name = event.name();
    if let Err(e) = handler.handle(event).await {
        error!(account = %account, handler = name, error = %e, "event handler failed");
    }
}

/// Hand `event` to `handler`. Failures are logged with the handler name and
/// otherwise dropped.
///
/// Events that need a lookup are spawned into `pending`; everything else is
/// handled before this returns, so their records keep event order.
async fn dispatch<H>(handler: &Arc<H>, account: &str, event: Event, pending: &mut JoinSet<()>)
where
    H: EventHandler + 'static,
{
    if event.needs_lookup() {
        let handler = Arc::clone(handler);
        let account = account.to_string();
        pending.spawn(async move { deliver(handler.as_ref(), &account, event).await });
    } else {
        deliver(handler.as_ref(), account, event).await;
    }
}

/// Wait for every in-flight lookup handler.
async fn drain(account: &str, pending: &mut JoinSet<()>) {
    while let Some(joined) = pending.join_next().await {
        if let Err(e) = joined {
            error!(account = %account, error = %e, "event handler task failed");
        }
    }
}

/// Run one client until its gateway stops or `shutdown` flips.
///
/// Returns `Ok` when the event stream ends cleanly or on shutdown, and the
/// gateway's error when it shut down fatally (bad token, reconnects
/// exhausted).
pub async fn start(
    token: String,
    account: AccountKind,
    message_cache: usize,
    logger: Logger,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let name = logger.name().to_string();
    let http = DiscordHttpClient::new(&token, account)?;

    let mut gateway_config = GatewayConfig::new(token, account);
    gateway_config.url = http.get_gateway_url().await;

    let handler = Arc::new(EventLogger::new(logger, http));
    let mut state = ClientState::new(message_cache);
    let mut pending = JoinSet::new();

    let GatewayHandle {
        mut events,
        driver,
    } = gateway::connect(gateway_config);

    info!(account = %name, ?account, "gateway connecting, entering event loop");

    let interrupted = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break false };
                if let GatewayEvent::Ready(ready) = &event {
                    info!(
                        account = %name,
                        user = %ready.user,
                        guilds = ready.guilds.len(),
                        "client ready"
                    );
                }
                for event in state.process(event) {
                    dispatch(&handler, &name, event, &mut pending).await;
                }
            }
            Some(joined) = pending.join_next(), if !pending.is_empty() => {
                if let Err(e) = joined {
                    error!(account = %name, error = %e, "event handler task failed");
                }
            }
            _ = shutdown.changed() => break true,
        }
    };

    drain(&name, &mut pending).await;

    if interrupted {
        info!(account = %name, "client stopped");
        driver.abort();
        return Ok(());
    }

    warn!(account = %name, "event stream ended");
    driver
        .await
        .map_err(|e| Error::Gateway(format!("gateway task failed: {}", e)))?
}

/// Start one client per configured token and wait for all of them. Ctrl-C
/// stops every client after its in-flight handlers finish.
pub async fn run(config: Config, log: &LogContext) -> Result<()> {
    let (stop, stopped) = watch::channel(false);
    let clients = config.tokens.iter().map(|token| {
        let logger = log.logger(identity::account_name(token));
        info!(account = logger.name(), "starting client");
        start(
            token.clone(),
            config.account,
            config.message_cache,
            logger,
            stopped.clone(),
        )
    });
    let clients = join_all(clients);
    tokio::pin!(clients);

    let results = tokio::select! {
        results = &mut clients => results,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupted, finishing in-flight handlers");
            stop.send_replace(true);
            clients.await
        }
    };

    let mut failures = results.into_iter().filter_map(|r| r.err()).collect::<Vec<_>>();
    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0)),
        n => {
            for e in &failures {
                error!(error = %e, "client failed");
            }
            Err(Error::Gateway(format!("{} clients failed", n)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Lookup;
    use crate::logging::capture;
    use crate::types::fixtures::*;
    use crate::types::{Channel, Message};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Unreachable;

    #[async_trait]
    impl Lookup for Unreachable {
        async fn fetch_channel(&self, channel_id: &str) -> Result<Channel> {
            Err(Error::Gateway(format!("no route to channel {}", channel_id)))
        }

        async fn fetch_message(&self, _channel_id: &str, message_id: &str) -> Result<Message> {
            Err(Error::Gateway(format!("no route to message {}", message_id)))
        }
    }

    /// Answers lookups after a short delay.
    struct Slow;

    #[async_trait]
    impl Lookup for Slow {
        async fn fetch_channel(&self, channel_id: &str) -> Result<Channel> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(guild_channel(channel_id, "1", "general"))
        }

        async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<Message> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(message(message_id, channel_id, user("2", "bob"), "late"))
        }
    }

    fn raw_delete(id: &str) -> Event {
        Event::RawMessageDelete(crate::types::MessageDelete {
            id: id.into(),
            channel_id: "20".into(),
            guild_id: None,
        })
    }

    #[tokio::test]
    async fn events_without_lookups_are_handled_before_dispatch_returns() {
        let (logger, captured) = capture::logger("42");
        let handler = Arc::new(EventLogger::new(logger, Unreachable));
        let mut pending = JoinSet::new();

        dispatch(
            &handler,
            "42",
            Event::Message(message("10", "20", user("2", "bob"), "hi")),
            &mut pending,
        )
        .await;

        assert!(pending.is_empty());
        assert!(captured.only_line().contains("was sent with content \"hi\"."));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn records_keep_event_order() {
        let (logger, captured) = capture::logger("42");
        let handler = Arc::new(EventLogger::new(logger, Unreachable));
        let mut pending = JoinSet::new();

        for i in 0..500 {
            let content = format!("m{}", i);
            let event = Event::Message(message(&i.to_string(), "20", user("2", "bob"), &content));
            dispatch(&handler, "42", event, &mut pending).await;
        }
        drain("42", &mut pending).await;

        let lines = captured.lines();
        assert_eq!(lines.len(), 500);
        for (i, line) in lines.iter().enumerate() {
            assert!(
                line.contains(&format!("content \"m{}\".", i)),
                "record {} out of order: {}",
                i,
                line
            );
        }
    }

    #[tokio::test]
    async fn lookup_handlers_are_tracked_until_drained() {
        let (logger, captured) = capture::logger("42");
        let handler = Arc::new(EventLogger::new(logger, Slow));
        let mut pending = JoinSet::new();

        dispatch(&handler, "42", raw_delete("10"), &mut pending).await;
        assert_eq!(pending.len(), 1);
        assert!(captured.lines().is_empty());

        drain("42", &mut pending).await;
        assert!(pending.is_empty());
        assert!(captured
            .only_line()
            .contains("Message 10 was deleted from <Channel id=20"));
    }

    #[tokio::test]
    async fn handler_errors_do_not_produce_records() {
        let (logger, captured) = capture::logger("42");
        let handler = Arc::new(EventLogger::new(logger, Unreachable));
        let mut pending = JoinSet::new();

        dispatch(&handler, "42", raw_delete("10"), &mut pending).await;
        drain("42", &mut pending).await;

        assert!(captured.lines().is_empty());
    }
}
