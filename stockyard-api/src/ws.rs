//! Subscription Channel
//!
//! One WebSocket session per client per agent. The session task bridges the
//! socket and the agent's subscription queue: outbound frames stream from
//! the agent, inbound JSON frames are parsed and submitted to the agent's
//! mailbox (FIFO per subscription). Liveness is enforced here: the server
//! pings on idle and terminates channels silent past the idle cutoff.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use stockyard_core::{ClientFrame, OwnerKey, ServerFrame, SUBSCRIPTION_BUFFER};
use stockyard_agent::SubscriptionId;

use crate::state::AppState;

/// Run one subscription session to completion.
pub async fn serve_socket(socket: WebSocket, state: AppState, key: OwnerKey) {
    let id = SubscriptionId::generate();
    info!(owner_key = %key.canonical(), subscription = %id, "subscription opened");

    let (frames_tx, mut frames_rx) = mpsc::channel::<ServerFrame>(SUBSCRIPTION_BUFFER);
    let handle = state.registry.handle(&key).await;
    if let Err(e) = handle.subscribe(id, frames_tx).await {
        warn!(owner_key = %key.canonical(), error = %e, "subscription attach failed");
        return;
    }

    let (mut sink, mut stream) = socket.split();
    let mut last_traffic = Instant::now();
    let mut heartbeat = interval(state.fleet_config.ping_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let idle_max = state.fleet_config.idle_max;

    loop {
        tokio::select! {
            // Outbound: frames published by the agent.
            frame = frames_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let payload = match serde_json::to_string(&frame) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(subscription = %id, error = %e, "frame serialization failed");
                                continue;
                            }
                        };
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    // The agent dropped this subscription (overflow or
                    // termination); close the session.
                    None => break,
                }
            }

            // Inbound: client frames.
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        last_traffic = Instant::now();
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                if handle.submit_frame(frame, id).await.is_err() {
                                    break;
                                }
                            }
                            Err(_) => {
                                // Unknown or malformed frame: answer in-band,
                                // keep the session.
                                let error = ServerFrame::Error {
                                    message: "Unknown message type".to_string(),
                                };
                                let payload = serde_json::to_string(&error)
                                    .unwrap_or_else(|_| String::from("{\"type\":\"error\"}"));
                                if sink.send(Message::Text(payload)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        last_traffic = Instant::now();
                    }
                    Some(Ok(Message::Binary(_))) => {
                        last_traffic = Instant::now();
                        debug!(subscription = %id, "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(subscription = %id, error = %e, "socket receive error");
                        break;
                    }
                }
            }

            // Liveness: ping on idle, terminate past the cutoff.
            _ = heartbeat.tick() => {
                let idle = last_traffic.elapsed();
                if idle > idle_max {
                    info!(subscription = %id, idle_secs = idle.as_secs(), "closing idle subscription");
                    break;
                }
                if idle >= state.fleet_config.ping_interval
                    && sink.send(Message::Ping(Vec::new())).await.is_err()
                {
                    break;
                }
            }
        }
    }

    handle.unsubscribe(id).await;
    info!(owner_key = %key.canonical(), subscription = %id, "subscription closed");
}
