use crate::frameworks::config::{LOG_THROTTLE, MAX_INVALID_JSON};
use crate::interface_adapters::protocol::{
    ClientMessage, ProtocolError, ServerMessage, decode_client_message, encode_server_message,
};
use crate::interface_adapters::state::{AppState, Outbound};
use crate::interface_adapters::utils::ids::next_conn_id;
use crate::use_cases::{ConnId, Dispatch, GameEvent};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{sync::Arc, time::Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Protocol(ProtocolError),
    InputClosed,
    OutboundClosed,
}

/// Serializes every world dispatch once and fans the bytes out to all connections.
pub async fn dispatch_serializer(
    mut dispatch_rx: broadcast::Receiver<Dispatch>,
    outbound_tx: broadcast::Sender<Outbound>,
) {
    loop {
        match dispatch_rx.recv().await {
            Ok(Dispatch { audience, event }) => {
                let msg = ServerMessage::from(&event);
                let txt = match encode_server_message(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = %e, "failed to serialize world event");
                        continue;
                    }
                };
                // No receivers just means nobody is connected.
                let _ = outbound_tx.send(Outbound {
                    audience,
                    frame: Utf8Bytes::from(txt),
                });
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "dispatch serializer lagged; world events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("dispatch channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let conn_id = next_conn_id();
        handle_socket(socket, state, conn_id).instrument(info_span!("conn", conn_id))
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, conn_id: ConnId) {
    let mut ctx = match bootstrap_connection(&mut socket, &state, conn_id).await {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(error = ?e, "failed to bootstrap connection");
            let _ = socket.close().await;
            return;
        }
    };

    info!("client connected");

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = encode_server_message(msg).map_err(NetError::Protocol)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub conn_id: ConnId,
    pub input_tx: mpsc::Sender<GameEvent>,
    pub outbound_rx: broadcast::Receiver<Outbound>,
    // Set once the client asked for its first snapshot.
    pub joined: bool,
    pub join_deadline: tokio::time::Instant,
    // Count lag recovery snapshots requested for this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,
    // Consecutive undecodable frames; reset by any valid one.
    pub invalid_streak: u32,

    pub last_input_full_log: Instant,
    pub last_outbound_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
    conn_id: ConnId,
) -> Result<ConnCtx, NetError> {
    // Subscribe before the world hears about us so no addressed frame is missed.
    let outbound_rx = state.outbound_tx.subscribe();

    state
        .input_tx
        .send(GameEvent::Connected { conn_id })
        .await
        .map_err(|_| NetError::InputClosed)?;

    // Send Identity Packet
    // The client uses its connection id as its tank id.
    let identity = ServerMessage::Identity {
        connid: conn_id.to_string(),
    };
    let bytes_out = match send_message(socket, &identity).await {
        Ok(bytes) => bytes as u64,
        Err(err) => {
            // Close the session we just opened.
            let _ = state.input_tx.send(GameEvent::Disconnect { conn_id }).await;
            return Err(err);
        }
    };

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        conn_id,
        input_tx: state.input_tx.clone(),
        outbound_rx,
        joined: false,
        join_deadline: tokio::time::Instant::now() + state.join_timeout,
        lag_recovery_count: 0,

        msgs_in: 0,
        msgs_out: 1,
        bytes_in: 0,
        bytes_out,

        invalid_json: 0,
        invalid_streak: 0,

        last_input_full_log: now,
        last_outbound_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

// Position updates are superseded by the next one, so they may be shed under load.
fn is_sheddable(event: &GameEvent) -> bool {
    matches!(
        event,
        GameEvent::MoveTank { .. } | GameEvent::MoveShot { .. }
    )
}

async fn forward_event(
    input_tx: &mpsc::Sender<GameEvent>,
    event: GameEvent,
    last_input_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(event)) if is_sheddable(&event) => {
            if should_log(last_input_full_log) {
                warn!("input channel full; dropping position update");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Full(event)) => {
            input_tx
                .send(event)
                .await
                .map_err(|_| NetError::InputClosed)?;
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_event)) => Err(NetError::InputClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let conn_id = ctx.conn_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        input_tx,
        outbound_rx,
        joined,
        join_deadline,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        invalid_streak,
        last_input_full_log,
        last_outbound_lag_log,
        last_invalid_input_log,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    conn_id,
                    input_tx,
                    joined,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    invalid_streak,
                    last_input_full_log,
                    last_invalid_input_log,
                    close_frame,
                ).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing World Event
            outbound = outbound_rx.recv() => {
                match outbound {
                    Ok(out) if out.audience.includes(conn_id) => {
                        match forward_frame(out.frame, socket, msgs_out, bytes_out).await {
                            LoopControl::Continue => false,
                            LoopControl::Disconnect => true,
                        }
                    }
                    Ok(_) => false,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        match request_resync(
                            conn_id,
                            n,
                            input_tx,
                            lag_recovery_count,
                            last_outbound_lag_log,
                            last_input_full_log,
                        ).await {
                            Ok(_) => false,
                            Err(e) => {
                                fatal = Some(e);
                                true
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::OutboundClosed);
                        true
                    }
                }
            }

            // Clients that never ask for a snapshot are dropped.
            _ = tokio::time::sleep_until(*join_deadline), if !*joined => {
                *close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "join timeout".into(),
                });
                info!("no join received in time");
                true
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(
        conn_id,
        input_tx,
        *msgs_in,
        *msgs_out,
        *bytes_in,
        *bytes_out,
        *invalid_json,
        *lag_recovery_count,
    )
    .await
    {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    if let Some(err) = fatal {
        Err(err)
    } else {
        Ok(())
    }
}

// Resync strategy: a lagged connection asks the world for a fresh snapshot.
async fn request_resync(
    conn_id: ConnId,
    missed: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    lag_recovery_count: &mut u64,
    last_outbound_lag_log: &mut Instant,
    last_input_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    if should_log(last_outbound_lag_log) {
        warn!(missed, "outbound frames lagged; requesting snapshot");
    }

    *lag_recovery_count += 1;
    let resync = GameEvent::Join {
        conn_id,
        player: conn_id.to_string(),
    };
    forward_event(input_tx, resync, last_input_full_log).await
}

#[allow(clippy::too_many_arguments)]
async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    conn_id: ConnId,
    input_tx: &mpsc::Sender<GameEvent>,
    joined: &mut bool,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    invalid_streak: &mut u32,
    last_input_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                match decode_client_message(&text) {
                    Ok(message) => {
                        *invalid_streak = 0;
                        if matches!(message, ClientMessage::Join(_)) {
                            *joined = true;
                        }
                        forward_event(input_tx, message.into_event(conn_id), last_input_full_log)
                            .await
                    }
                    Err(err) => {
                        *invalid_json += 1;
                        *invalid_streak += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(
                                bytes = text.len(),
                                error = %err,
                                "failed to parse client message"
                            );
                        }

                        if *invalid_streak > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_frame(
    frame: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = frame.len();
    match socket
        .send(Message::Text(frame))
        .await
        .map_err(NetError::Ws)
    {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send world event");
            LoopControl::Disconnect
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn disconnect_cleanup(
    conn_id: ConnId,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    lag_recovery_count: u64,
) -> Result<(), NetError> {
    // The world marks the tank offline and tells everyone else.
    input_tx
        .send(GameEvent::Disconnect { conn_id })
        .await
        .map_err(|_| NetError::InputClosed)?;

    debug!(
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        lag_recovery_count,
        "connection stats"
    );
    info!("client disconnected");
    Ok(())
}
