//! WebSocket handler for `/ws/{device_id}/{toy_id}` (§4.2, §6).
//!
//! One task reads the socket and dispatches by frame type (I1's single
//! reader); a second task owns the write half and drains the session's
//! outbound channel, so background tasks (AI dispatch, status heartbeat)
//! never touch the socket directly.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use toygateway_protocol::{self as protocol, Frame, HandshakeStatus};

use crate::audio::IngressFormat;
use crate::session::SessionHandle;

use super::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((device_id, toy_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, device_id, toy_id, state))
}

async fn handle_socket(socket: WebSocket, device_id: String, toy_id: String, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (session, guard, mut outbound_rx) = state.sessions.register(device_id, toy_id);

    log::info!("[ws] session {} accepted", session.id);

    let writer_id = session.id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            match protocol::encode(&frame) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("[ws] session {writer_id}: failed to encode outbound frame: {e}");
                }
            }
        }
    });

    let cancel = session.cancel_token.clone();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = &mut writer => break,
            maybe_msg = ws_rx.next() => {
                match maybe_msg {
                    Some(Ok(Message::Text(text))) => {
                        session.record_activity();
                        handle_frame(&state, &session, text.as_bytes()).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        // The wire protocol is JSON-only; binary frames never occur.
                        session.record_activity();
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        session.record_activity();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        log::warn!("[ws] session {}: read error: {e}", session.id);
                        break;
                    }
                }
            }
        }
    }

    writer.abort();
    drop(guard);
    log::info!("[ws] session closed");
}

async fn handle_frame(state: &AppState, session: &Arc<SessionHandle>, raw: &[u8]) {
    let frame = match protocol::decode(raw) {
        Ok(frame) => frame,
        Err(e) => {
            log::warn!("[ws] session {}: {e}", session.id);
            session.send(e.to_frame());
            return;
        }
    };

    state
        .metrics
        .messages_total
        .with_label_values(&[frame_label(&frame)])
        .inc();

    match frame {
        Frame::Handshake { .. } => {
            session.send(Frame::HandshakeAck {
                status: HandshakeStatus::Connected,
                session_id: session.id.clone(),
            });
        }
        Frame::Ping {} => session.send(Frame::Pong {}),
        Frame::Control { command } => {
            session.send(Frame::ControlAck { ok: true, command });
        }
        Frame::AudioChunk { data, metadata } => {
            match protocol::decode_audio(&data) {
                Ok(bytes) => {
                    state.metrics.audio_bytes_in_total.inc_by(bytes.len() as u64);
                    session.push_ingress(&bytes);
                }
                Err(e) => {
                    log::warn!(
                        "[ws] session {}: invalid hex audio_chunk payload: {e}",
                        session.id
                    );
                }
            }

            if metadata.is_final {
                let buffer = session.take_ingress();
                let format = IngressFormat::parse(&metadata.format);
                state.dispatcher.dispatch(
                    Arc::clone(session),
                    &state.spawner,
                    buffer,
                    format,
                    metadata.sample_rate,
                    metadata.duration,
                );
            }
        }
        Frame::Error { error, message } => {
            log::info!(
                "[ws] session {}: client reported error {error}: {message:?}",
                session.id
            );
        }
        // Every remaining variant is server→client only; a client sending
        // one is a protocol violation (§4.1's decode contract covers
        // unrecognized *types*, this covers recognized-but-misdirected ones).
        other => {
            let type_name = frame_label(&other);
            session.send(Frame::unknown_message_type_error(type_name));
        }
    }
}

fn frame_label(frame: &Frame) -> &'static str {
    match frame {
        Frame::Handshake { .. } => "handshake",
        Frame::HandshakeAck { .. } => "handshake_ack",
        Frame::Ping {} => "ping",
        Frame::Pong {} => "pong",
        Frame::Control { .. } => "control",
        Frame::ControlAck { .. } => "control_ack",
        Frame::AudioChunk { .. } => "audio_chunk",
        Frame::Status { .. } => "status",
        Frame::TextResponse { .. } => "text_response",
        Frame::AudioResponse { .. } => "audio_response",
        Frame::ConfigUpdate { .. } => "config_update",
        Frame::ToyState { .. } => "toy_state",
        Frame::Error { .. } => "error",
    }
}
