//! WebSocket live feed.
//!
//! # Design
//! - Authentication rides on the `token` query parameter because browsers cannot
//!   set headers on a WebSocket handshake. A bad token still upgrades, then
//!   closes with 1008 so clients see a protocol-level reason.
//! - Each connection owns one [`ChannelSubscriber`]; the registry holds the only
//!   strong reference, so eviction closes the frame channel and ends the pump.
//! - The pump is generic over sink and stream halves for testability.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tormeta_events::{ChannelSubscriber, Frame};
use tracing::{debug, info};

use crate::http::auth::{AuthContext, authenticate};
use crate::http::constants::{WS_GOING_AWAY, WS_POLICY_VIOLATION};
use crate::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LiveQuery {
    #[serde(default)]
    pub(crate) token: Option<String>,
}

/// Why a live connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disconnect {
    ClientClosed,
    SendFailed,
    Evicted,
    Shutdown,
}

pub(crate) async fn live_feed(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<LiveQuery>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let caller = match query.token.as_deref() {
        Some(token) => authenticate(&state, token).await.ok(),
        None => None,
    };
    upgrade.on_upgrade(move |socket| async move {
        match caller {
            Some(context) => serve_connection(state, socket, context).await,
            None => reject(socket).await,
        }
    })
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

async fn reject(mut socket: WebSocket) {
    debug!("rejecting live feed connection with an invalid token");
    let _ = socket
        .send(close_message(WS_POLICY_VIOLATION, "invalid token"))
        .await;
}

async fn serve_connection(state: Arc<ApiState>, socket: WebSocket, context: AuthContext) {
    let settings = state.live_feed;
    let (subscriber, frames) =
        ChannelSubscriber::channel(settings.queue_capacity, settings.send_timeout);
    let seeder = Arc::clone(&subscriber);
    let id = state.registry.add_seeded(subscriber, move |latest| {
        let _ = seeder.try_deliver(latest.clone());
    });
    state.telemetry.set_live_subscribers(state.registry.len());
    info!(subscriber_id = id, user_id = context.user_id, "live feed connected");

    let (sink, stream) = socket.split();
    let reason = pump(
        sink,
        stream,
        frames,
        settings.ping_interval,
        state.shutdown.clone(),
    )
    .await;

    state.registry.remove(id);
    state.telemetry.set_live_subscribers(state.registry.len());
    info!(subscriber_id = id, reason = ?reason, "live feed disconnected");
}

/// Forward frames and keepalives to `sink` until the client, the registry, or
/// the server ends the connection.
pub(crate) async fn pump<S, R, E>(
    mut sink: S,
    mut incoming: R,
    mut frames: mpsc::Receiver<Frame>,
    ping_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Disconnect
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        if *shutdown.borrow_and_update() {
            break Disconnect::Shutdown;
        }
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break Disconnect::Shutdown;
                }
            }
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    break Disconnect::Evicted;
                };
                if sink.send(Message::Text(frame.as_str().into())).await.is_err() {
                    break Disconnect::SendFailed;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Text(Frame::ping().as_str().into())).await.is_err() {
                    break Disconnect::SendFailed;
                }
            }
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break Disconnect::ClientClosed,
                Some(Ok(_)) => {}
            },
        }
    };

    if reason == Disconnect::Shutdown {
        let _ = sink
            .send(close_message(WS_GOING_AWAY, "server shutting down"))
            .await;
    }
    reason
}
