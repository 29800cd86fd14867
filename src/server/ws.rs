//! WebSocket transport for the host bridge.
//!
//! One shell connection at a time: directive frames are serialized out as
//! JSON text messages, incoming event frames are routed back through the
//! bridge. A newer connection displaces the previous one (its directive
//! channel is dropped and its dispatches fail over to `EngineGone`).

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use warp::ws::{Message, WebSocket};
use warp::Filter;

use super::routes::ApiContext;
use crate::speech::{EventFrame, HostBridge};

pub fn ws_route(
    ctx: ApiContext,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("api" / "speech")
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let bridge = ctx.bridge.clone();
            ws.on_upgrade(move |socket| handle_shell(socket, bridge))
        })
}

async fn handle_shell(socket: WebSocket, bridge: Arc<HostBridge>) {
    let (mut outbound, mut inbound) = socket.split();
    let (generation, mut directives) = bridge.attach();

    loop {
        tokio::select! {
            directive = directives.recv() => {
                let Some(directive) = directive else {
                    // A newer shell replaced this connection.
                    break;
                };
                let frame = match serde_json::to_string(&directive) {
                    Ok(frame) => frame,
                    Err(e) => {
                        eprintln!("[Bridge] Failed to encode directive: {}", e);
                        continue;
                    }
                };
                if outbound.send(Message::text(frame)).await.is_err() {
                    break;
                }
            }
            message = inbound.next() => {
                match message {
                    Some(Ok(message)) if message.is_text() => {
                        let Ok(text) = message.to_str() else { continue };
                        match serde_json::from_str::<EventFrame>(text) {
                            Ok(event) => bridge.handle_event(event).await,
                            Err(e) => {
                                eprintln!("[Bridge] Unintelligible event frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(message)) if message.is_close() => break,
                    Some(Ok(_)) => {} // ping/pong/binary: ignored
                    Some(Err(e)) => {
                        eprintln!("[Bridge] WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    bridge.detach(generation).await;
}
