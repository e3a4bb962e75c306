//! Per-user live push channel over server-sent events.
//!
//! Each connected client owns exactly one bounded mpsc channel registered
//! under its username; the delivery router pushes into it, this handler
//! drains it into the SSE response. Opening a second channel for the same
//! user supersedes the first (last-connect-wins).

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use shared::{config::server::Config, models::StreamEvent};
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::info;

use crate::{
    http::error::ApiError,
    middleware::request_context::RequestContext,
    services::connection_registry::ConnectionRegistry,
};

pub type SharedRegistry = Arc<ConnectionRegistry>;

/// Establishes the caller's live channel and streams push events until the
/// client disconnects or is superseded by a newer connection.
#[utoipa::path(
    get,
    path = "/stream",
    responses(
        (status = 200, description = "SSE stream of push events"),
        (status = 401, description = "Credential missing or unresolvable")
    ),
    tag = "Chat"
)]
pub async fn sse_handler(
    Extension(config): Extension<Arc<Config>>,
    Extension(registry): Extension<SharedRegistry>,
    Extension(context): Extension<RequestContext>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let username = context
        .username
        .clone()
        .ok_or_else(|| ApiError::unauthorized("credential required to open a channel"))?;

    info!(username, "establishing live channel");

    let (sender, receiver) = mpsc::channel(config.stream.channel_capacity);
    let epoch = registry.register(&username, sender.clone()).await;

    // Connection acknowledgement; the channel is freshly created so this
    // cannot fail on capacity.
    let _ = sender.try_send(StreamEvent::Connected {
        username: username.clone(),
    });

    spawn_heartbeat(sender.clone(), config.stream.heartbeat_seconds);
    spawn_deregistration_watch(Arc::clone(&registry), username, epoch, sender);

    let stream = ReceiverStream::new(receiver).map(|event| {
        let data = serde_json::to_string(&event)
            .unwrap_or_else(|_| "{\"type\":\"ping\"}".to_string());
        Ok::<_, Infallible>(Event::default().event(event.event_name()).data(data))
    });

    let keepalive = KeepAlive::new()
        .interval(Duration::from_secs(config.stream.heartbeat_seconds.max(5)))
        .text("keep-alive");

    Ok(Sse::new(stream).keep_alive(keepalive))
}

/// Emits pings on a fixed cadence until the channel's receiver goes away.
/// A full buffer drops the ping silently.
fn spawn_heartbeat(sender: mpsc::Sender<StreamEvent>, heartbeat_seconds: u64) {
    let cadence = heartbeat_seconds.max(5);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cadence));
        loop {
            interval.tick().await;
            if sender.is_closed() {
                break;
            }
            if let Err(mpsc::error::TrySendError::Closed(_)) =
                sender.try_send(StreamEvent::Ping)
            {
                break;
            }
        }
    });
}

/// Removes the registry mapping once the receiving side of the channel is
/// gone, i.e. the SSE response stream was torn down. The epoch guard makes
/// this a no-op when a newer connection has already taken over the username.
fn spawn_deregistration_watch(
    registry: SharedRegistry,
    username: String,
    epoch: u64,
    sender: mpsc::Sender<StreamEvent>,
) {
    tokio::spawn(async move {
        sender.closed().await;
        registry.unregister(&username, epoch).await;
    });
}
