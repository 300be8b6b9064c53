//! Background tasks that own the socket.
//!
//! Each connection is a *generation* with exactly one write loop and one read
//! loop. The supervisor waits for either loop to report a failure (or for the
//! client to shut down), stops the generation, joins both loops, and only
//! then redials. The outbound queue receiver travels from one write loop to
//! the next through its join handle.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, Interval};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use tmrpc_core::backoff::Backoff;
use tmrpc_core::error::TransportError;
use tmrpc_core::id::CorrelationKey;
use tmrpc_core::request::parse_responses;

use crate::config::{ConnectionState, WsClientConfig};
use crate::connector::{Connector, WsSink, WsStream};
use crate::pending::{Frame, Table};

/// Why a generation is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Running,
    Reconnect,
    Shutdown,
}

/// How a loop saw its connection end.
#[derive(Debug)]
enum Ended {
    Failed(String),
    /// The server sent a close frame with the normal status code.
    ClosedByServer,
}

/// Bound on the goodbye `Close` frame when no `write_wait` is configured.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

pub(crate) struct Supervisor {
    pub url: String,
    pub connector: Arc<dyn Connector>,
    pub table: Table,
    pub config: WsClientConfig,
    pub state: watch::Sender<ConnectionState>,
    pub shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    pub async fn run(mut self, sink: WsSink, stream: WsStream, mut queue: mpsc::Receiver<Frame>) {
        let mut conn = (sink, stream);
        loop {
            let (sink, stream) = conn;
            let (stop_tx, stop_rx) = watch::channel(Stop::Running);
            let (fail_tx, mut fail_rx) = mpsc::channel::<Ended>(2);

            let writer = tokio::spawn(write_loop(
                sink,
                queue,
                self.table.clone(),
                self.config.ping_period,
                self.config.write_wait,
                stop_rx.clone(),
                fail_tx.clone(),
            ));
            let reader = tokio::spawn(read_loop(
                stream,
                self.table.clone(),
                self.config.read_wait,
                stop_rx,
                fail_tx,
            ));

            let stop = tokio::select! {
                ended = fail_rx.recv() => match ended {
                    Some(Ended::Failed(reason)) => {
                        tracing::warn!(url = %self.url, reason = %reason, "WS connection lost");
                        Stop::Reconnect
                    }
                    Some(Ended::ClosedByServer) => {
                        tracing::info!(url = %self.url, "WS server closed the connection normally");
                        Stop::Shutdown
                    }
                    None => Stop::Shutdown,
                },
                _ = self.shutdown.changed() => Stop::Shutdown,
            };
            let _ = stop_tx.send(stop);

            let (written, read) = tokio::join!(writer, reader);
            queue = match written {
                Ok(queue) => queue,
                Err(e) => {
                    tracing::error!(url = %self.url, error = %e, "WS write loop died");
                    return self.finish();
                }
            };
            if let Err(e) = read {
                tracing::error!(url = %self.url, error = %e, "WS read loop died");
                return self.finish();
            }
            if stop == Stop::Shutdown || *self.shutdown.borrow() {
                return self.finish();
            }

            self.state.send_replace(ConnectionState::Reconnecting);
            conn = match self.redial().await {
                Some(conn) => conn,
                None => return self.finish(),
            };
            self.state.send_replace(ConnectionState::Connected);
            tracing::info!(url = %self.url, "WS reconnected");
            if let Some(callback) = &self.config.on_reconnect {
                callback();
            }
        }
    }

    /// Redial up to `max_reconnect_attempts` times. `None` when the attempts
    /// run out or the client shuts down meanwhile.
    async fn redial(&mut self) -> Option<(WsSink, WsStream)> {
        let backoff = Backoff::new(self.config.backoff.clone());
        let attempts = self.config.max_reconnect_attempts;
        for attempt in 0..attempts {
            let delay = backoff.delay(attempt);
            tracing::debug!(url = %self.url, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "waiting to redial");
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = self.shutdown.changed() => return None,
            }
            let dialed = tokio::select! {
                dialed = self.connector.connect(&self.url) => dialed,
                _ = self.shutdown.changed() => return None,
            };
            match dialed {
                Ok(conn) => return Some(conn),
                Err(e) => tracing::warn!(
                    url = %self.url,
                    attempt = attempt + 1,
                    max = attempts,
                    error = %e,
                    "WS redial failed"
                ),
            }
        }
        tracing::error!(url = %self.url, attempts, "WS reconnect attempts exhausted, closing client");
        None
    }

    fn finish(self) {
        self.state.send_replace(ConnectionState::Closed);
        let failed = self.table.close();
        tracing::info!(url = %self.url, failed_calls = failed, "WS client closed");
    }
}

async fn write_frame(
    sink: &mut WsSink,
    msg: Message,
    wait: Option<Duration>,
) -> Result<(), TransportError> {
    match wait {
        Some(wait) => time::timeout(wait, sink.send(msg)).await.unwrap_or_else(|_| {
            Err(TransportError::WebSocket(format!(
                "write timed out after {}ms",
                wait.as_millis()
            )))
        }),
        None => sink.send(msg).await,
    }
}

async fn tick(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Outcome of a write raced against the generation's stop signal.
enum Write {
    Done(Result<(), TransportError>),
    Stopped(Stop),
}

/// Write `msg` unless the generation is stopped first. A peer that stops
/// reading can leave `poll_ready` pending forever.
async fn write_or_stop(
    sink: &mut WsSink,
    msg: Message,
    wait: Option<Duration>,
    stop: &mut watch::Receiver<Stop>,
) -> Write {
    tokio::select! {
        done = write_frame(sink, msg, wait) => Write::Done(done),
        changed = stop.changed() => match changed {
            Ok(()) => Write::Stopped(*stop.borrow()),
            Err(_) => Write::Stopped(Stop::Shutdown),
        },
    }
}

/// Write one queued frame. `false` ends the generation; a frame that did
/// not make it out is parked in the backlog unless the client is closing.
async fn send_frame(
    sink: &mut WsSink,
    frame: Frame,
    table: &Table,
    write_wait: Option<Duration>,
    stop: &mut watch::Receiver<Stop>,
    failed: &mpsc::Sender<Ended>,
) -> bool {
    let msg = Message::Text(frame.payload.clone());
    match write_or_stop(sink, msg, write_wait, stop).await {
        Write::Done(Ok(())) => true,
        Write::Done(Err(e)) => {
            table.set_backlog(frame);
            let _ = failed.try_send(Ended::Failed(e.to_string()));
            false
        }
        Write::Stopped(Stop::Shutdown) => {
            tracing::debug!(key = %frame.key, "dropping unwritten frame on shutdown");
            false
        }
        Write::Stopped(_) => {
            tracing::debug!(key = %frame.key, "write interrupted, keeping frame for the next connection");
            table.set_backlog(frame);
            false
        }
    }
}

async fn write_loop(
    mut sink: WsSink,
    mut queue: mpsc::Receiver<Frame>,
    table: Table,
    ping_period: Option<Duration>,
    write_wait: Option<Duration>,
    mut stop: watch::Receiver<Stop>,
    failed: mpsc::Sender<Ended>,
) -> mpsc::Receiver<Frame> {
    // the frame that failed on the previous connection goes out first
    if let Some(frame) = table.take_backlog() {
        if table.is_live(&frame.key) {
            tracing::debug!(key = %frame.key, "replaying backlog frame");
            if !send_frame(&mut sink, frame, &table, write_wait, &mut stop, &failed).await {
                return queue;
            }
        }
    }

    let mut ping = ping_period.map(|period| time::interval_at(Instant::now() + period, period));
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => {
                if *stop.borrow() == Stop::Shutdown {
                    let close = Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client closing".into(),
                    }));
                    let wait = write_wait.unwrap_or(CLOSE_GRACE);
                    if let Err(e) = write_frame(&mut sink, close, Some(wait)).await {
                        tracing::debug!(error = %e, "failed to write close frame");
                    }
                }
                return queue;
            }
            frame = queue.recv() => {
                let Some(frame) = frame else { return queue };
                if !table.is_live(&frame.key) {
                    tracing::debug!(key = %frame.key, "skipping abandoned request");
                    continue;
                }
                if !send_frame(&mut sink, frame, &table, write_wait, &mut stop, &failed).await {
                    return queue;
                }
            }
            _ = tick(&mut ping) => {
                tracing::debug!("sending ping");
                match write_or_stop(&mut sink, Message::Ping(Vec::new()), write_wait, &mut stop).await {
                    Write::Done(Ok(())) => {}
                    Write::Done(Err(e)) => {
                        let _ = failed.try_send(Ended::Failed(e.to_string()));
                        return queue;
                    }
                    Write::Stopped(_) => return queue,
                }
            }
        }
    }
}

async fn next_message(
    stream: &mut WsStream,
    wait: Option<Duration>,
) -> Result<Option<Message>, TransportError> {
    match wait {
        Some(wait) => match time::timeout(wait, stream.next()).await {
            Ok(next) => next.transpose(),
            Err(_) => Err(TransportError::WebSocket(format!(
                "no message for {}ms",
                wait.as_millis()
            ))),
        },
        None => stream.next().await.transpose(),
    }
}

async fn read_loop(
    mut stream: WsStream,
    table: Table,
    read_wait: Option<Duration>,
    mut stop: watch::Receiver<Stop>,
    failed: mpsc::Sender<Ended>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.changed() => return,
            next = next_message(&mut stream, read_wait) => next,
        };
        match next {
            Ok(Some(Message::Text(text))) => route(&table, text.as_bytes()),
            Ok(Some(Message::Binary(data))) => route(&table, &data),
            Ok(Some(Message::Pong(_))) => {
                tracing::debug!("received pong");
                table.record_pong();
            }
            Ok(Some(Message::Close(Some(frame)))) if frame.code == CloseCode::Normal => {
                let _ = failed.try_send(Ended::ClosedByServer);
                return;
            }
            Ok(Some(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| format!("server closed connection: {} {}", f.code, f.reason))
                    .unwrap_or_else(|| "server closed connection".to_string());
                let _ = failed.try_send(Ended::Failed(reason));
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                let _ = failed.try_send(Ended::Failed("connection ended".to_string()));
                return;
            }
            Err(e) => {
                let _ = failed.try_send(Ended::Failed(e.to_string()));
                return;
            }
        }
    }
}

/// Hand an incoming frame to its waiting caller, or drop it with a warning.
fn route(table: &Table, data: &[u8]) {
    let responses = match parse_responses(data) {
        Ok(responses) if !responses.is_empty() => responses,
        Ok(_) => {
            tracing::warn!("dropping empty response batch");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable frame");
            return;
        }
    };
    if responses.iter().any(|r| r.id.is_null()) {
        tracing::warn!(count = responses.len(), "dropping response without id");
        return;
    }
    let key = CorrelationKey::for_responses(&responses);
    if !table.resolve(&key, responses) {
        tracing::warn!(key = %key, "no caller waiting for response, dropping");
    }
}
