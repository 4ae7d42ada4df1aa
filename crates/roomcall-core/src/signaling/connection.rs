//! Background WebSocket connection loop with auto-reconnect.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::protocol::{decode_inbound, encode_outbound, OutboundSignal};
use super::types::{SignalEvent, SignalingCommand, SignalingConfig};

/// Room membership announced on every (re)connect.
#[derive(Debug, Clone)]
pub(crate) struct RoomJoin {
    pub(crate) room_id: String,
    pub(crate) display_name: String,
    pub(crate) local_id: Option<String>,
}

impl RoomJoin {
    fn join_signal(&self) -> Option<OutboundSignal> {
        self.local_id.as_ref().map(|local_id| OutboundSignal::JoinRoom {
            room_id: self.room_id.clone(),
            user_id: local_id.clone(),
            user_name: self.display_name.clone(),
        })
    }
}

enum SessionEnd {
    /// Disconnect was requested or the client handle was dropped.
    Closed,
    Lost,
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task managing the WebSocket connection with auto-reconnect.
pub(crate) async fn connection_loop(
    config: SignalingConfig,
    mut room: RoomJoin,
    event_tx: mpsc::Sender<SignalEvent>,
    mut command_rx: mpsc::Receiver<SignalingCommand>,
) {
    // Frames issued while offline, flushed after the next join.
    let mut outbox: VecDeque<OutboundSignal> = VecDeque::new();
    let mut ever_connected = false;
    let mut failures: u32 = 0;

    loop {
        info!(url = %config.server_url, room = %room.room_id, "Connecting to signaling server");

        match tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(config.server_url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => {
                ever_connected = true;
                let _ = event_tx.send(SignalEvent::Connected).await;

                let (ws_write, ws_read) = ws_stream.split();
                let ws_write = Arc::new(Mutex::new(ws_write));

                // Re-announce before anything else so the server knows who we are.
                if let Some(join) = room.join_signal() {
                    send_frame(&ws_write, &join).await;
                }
                while let Some(signal) = outbox.pop_front() {
                    send_frame(&ws_write, &signal).await;
                }

                let heartbeat_handle = tokio::spawn(heartbeat_task(
                    Arc::clone(&ws_write),
                    config.heartbeat_interval,
                ));

                let end = session_loop(
                    ws_read,
                    &ws_write,
                    &mut room,
                    &mut command_rx,
                    &event_tx,
                )
                .await;

                heartbeat_handle.abort();
                let _ = event_tx.send(SignalEvent::Disconnected).await;

                if matches!(end, SessionEnd::Closed) {
                    info!("Signaling connection closed");
                    return;
                }
                failures = 1;
            }
            Ok(Err(e)) => {
                failures += 1;
                error!(error = %e, failures, "Failed to connect to signaling server");
            }
            Err(_elapsed) => {
                failures += 1;
                error!(
                    timeout_secs = config.connect_timeout.as_secs(),
                    failures, "Signaling connection timed out"
                );
            }
        }

        if !ever_connected && failures >= config.initial_connect_attempts {
            error!(attempts = failures, "Signaling server unreachable, giving up");
            let _ = event_tx
                .send(SignalEvent::Unreachable { attempts: failures })
                .await;
            return;
        }

        let delay = jittered(config.backoff(failures));
        info!(delay_ms = delay.as_millis() as u64, "Reconnecting to signaling server");
        let _ = event_tx
            .send(SignalEvent::Reconnecting {
                attempt: failures + 1,
                delay,
            })
            .await;

        if !wait_backoff(delay, &mut room, &mut outbox, &mut command_rx).await {
            info!("Signaling disconnected during backoff");
            return;
        }
    }
}

/// Pump one live connection until it drops or a disconnect is requested.
async fn session_loop<R, S>(
    mut ws_read: R,
    ws_write: &Arc<Mutex<S>>,
    room: &mut RoomJoin,
    command_rx: &mut mpsc::Receiver<SignalingCommand>,
    event_tx: &mpsc::Sender<SignalEvent>,
) -> SessionEnd
where
    R: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
    S: futures_util::Sink<WsMessage> + Unpin,
{
    loop {
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(SignalingCommand::Announce { local_id }) => {
                    room.local_id = Some(local_id);
                    if let Some(join) = room.join_signal() {
                        send_frame(ws_write, &join).await;
                    }
                }
                Some(SignalingCommand::Send(signal)) => {
                    send_frame(ws_write, &signal).await;
                }
                Some(SignalingCommand::Disconnect) | None => {
                    let mut writer = ws_write.lock().await;
                    let _ = writer.send(WsMessage::Close(None)).await;
                    return SessionEnd::Closed;
                }
            },
            msg = ws_read.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => match decode_inbound(&text) {
                    Ok(signal) => {
                        let _ = event_tx.send(SignalEvent::Message(signal)).await;
                    }
                    Err(e) => {
                        debug!(error = %e, text = %text.as_str(), "Unrecognized signaling frame");
                    }
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Signaling server closed connection");
                    return SessionEnd::Lost;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return SessionEnd::Lost;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Sleep through a backoff delay while still servicing commands.
/// Returns `false` if a disconnect arrived.
async fn wait_backoff(
    delay: Duration,
    room: &mut RoomJoin,
    outbox: &mut VecDeque<OutboundSignal>,
    command_rx: &mut mpsc::Receiver<SignalingCommand>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = command_rx.recv() => match cmd {
                Some(SignalingCommand::Announce { local_id }) => room.local_id = Some(local_id),
                Some(SignalingCommand::Send(signal)) => outbox.push_back(signal),
                Some(SignalingCommand::Disconnect) | None => return false,
            },
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.8..=1.2);
    delay.mul_f64(factor)
}

async fn send_frame<S>(ws_write: &Arc<Mutex<S>>, signal: &OutboundSignal)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    match encode_outbound(signal) {
        Ok(json) => {
            let mut writer = ws_write.lock().await;
            if writer.send(WsMessage::Text(json.into())).await.is_err() {
                warn!("Failed to write signaling frame");
            }
        }
        Err(e) => error!(error = %e, "Failed to encode signaling frame"),
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

async fn heartbeat_task<S>(ws_write: Arc<Mutex<S>>, interval: Duration)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let mut writer = ws_write.lock().await;
        if writer.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
            break;
        }
    }
}
