use std::time::Duration;

use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use warp::ws::{Message, WebSocket};

use crate::core::client::{Client, ClientId, ClientKind};
use crate::core::message_handler::MessageHandler;
use crate::handlers::RelayContext;

// Handle a WebSocket connection
pub async fn handle_ws_client(ws: WebSocket, ctx: RelayContext) {
    let (ws_tx, mut ws_rx) = ws.split();

    let (client, outbound) = Client::new(ClientKind::Standard, ctx.config.queue_capacity);
    let client_id = client.id;
    ctx.hub.register(client);

    // Write pump: drains the client's queue and probes liveness
    let mut writer = tokio::task::spawn(write_pump(
        ws_tx,
        outbound,
        client_id,
        ctx.config.ping_interval,
        ctx.config.write_timeout,
    ));

    let mut handler = MessageHandler::new(client_id, ctx.hub.clone(), ctx.service.clone());
    let read_deadline = ctx.config.connection_timeout;

    // Read pump
    loop {
        tokio::select! {
            frame = timeout(read_deadline, ws_rx.next()) => {
                let msg = match frame {
                    Ok(Some(Ok(msg))) => msg,
                    Ok(Some(Err(e))) => {
                        warn!("WebSocket error for client {}: {}", client_id, e);
                        break;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        info!("Client {} idle for {:?}, closing", client_id, read_deadline);
                        break;
                    }
                };

                if msg.is_close() {
                    break;
                }
                if msg.is_text() || msg.is_binary() {
                    match std::str::from_utf8(msg.as_bytes()) {
                        Ok(text) => handler.handle_text(text).await,
                        Err(e) => warn!("Dropping non UTF-8 frame from {}: {}", client_id, e),
                    }
                }
                // Pings and pongs only refresh the read deadline
            }
            _ = &mut writer => {
                debug!("Write pump for client {} ended", client_id);
                break;
            }
        }
    }

    ctx.hub.unregister(client_id);
    writer.abort();
}

async fn write_pump(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    client_id: ClientId,
    ping_every: Duration,
    write_timeout: Duration,
) {
    let mut ping = interval(ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ping.tick().await;

    loop {
        let frame = tokio::select! {
            queued = outbound.recv() => match queued {
                Some(text) => Message::text(text),
                None => {
                    // Hub dropped the client: unregistered or evicted
                    let _ = timeout(write_timeout, ws_tx.send(Message::close())).await;
                    break;
                }
            },
            _ = ping.tick() => Message::ping(Vec::new()),
        };

        match timeout(write_timeout, ws_tx.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Failed to send WebSocket message to {}: {}", client_id, e);
                break;
            }
            Err(_) => {
                warn!("Write to client {} timed out", client_id);
                break;
            }
        }
    }
}
