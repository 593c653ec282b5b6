use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::control::{ControlCommand, InboundMessage};
use crate::core::{Error, Result};

/// Longest inbound line accepted from the display
pub const MAX_LINE_LENGTH: usize = 4096;

/// Snapshots queued for a slow client before new ones are dropped
const OUTBOUND_QUEUE: usize = 4;

/// Newline-delimited text codec that skips lines it cannot deliver.
///
/// Overlong lines are discarded up to their newline and lines that are not
/// valid UTF-8 are dropped; both are logged and decoding carries on with the
/// next line. Only I/O failures reach the connection.
#[derive(Debug, Clone)]
pub struct DisplayLineCodec {
    lines: LinesCodec,
}

impl DisplayLineCodec {
    pub fn new(max_length: usize) -> Self {
        DisplayLineCodec {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }

    fn skip_malformed(
        &mut self,
        buf: &mut BytesMut,
        mut decode: impl FnMut(&mut LinesCodec, &mut BytesMut) -> std::result::Result<Option<String>, LinesCodecError>,
    ) -> std::result::Result<Option<String>, LinesCodecError> {
        loop {
            match decode(&mut self.lines, buf) {
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    debug!(max = self.lines.max_length(), "discarding overlong client line");
                }
                Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    debug!(error = %e, "discarding client line that is not UTF-8");
                }
                other => return other,
            }
        }
    }
}

impl Decoder for DisplayLineCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> std::result::Result<Option<String>, LinesCodecError> {
        self.skip_malformed(buf, |lines, buf| lines.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> std::result::Result<Option<String>, LinesCodecError> {
        self.skip_malformed(buf, |lines, buf| lines.decode_eof(buf))
    }
}

impl Encoder<String> for DisplayLineCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> std::result::Result<(), LinesCodecError> {
        self.lines.encode(line, dst)
    }
}

/// The one interactive display connection
pub trait ClientChannel: Send + Sync + 'static {
    /// Whether a client is attached and its connection is still open
    fn is_open(&self) -> bool;

    /// Pushes one JSON document to the client
    fn push_json(&self, value: Value) -> impl Future<Output = Result<()>> + Send;
}

struct Connection {
    id: u64,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
}

/// Holds whichever client connected most recently.
///
/// A new connection replaces and closes the previous one, so there is never
/// more than one consumer of snapshots.
#[derive(Default)]
pub struct ClientSlot {
    current: Mutex<Option<Connection>>,
    next_id: AtomicU64,
}

impl ClientSlot {
    /// Creates an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&self, outbound: mpsc::Sender<String>, cancel: CancellationToken) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Connection { id, outbound, cancel });
        if let Some(previous) = previous {
            debug!(connection = previous.id, "replacing previous display client");
            previous.cancel.cancel();
        }
        id
    }

    fn detach(&self, id: u64) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().map_or(false, |c| c.id == id) {
            *current = None;
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.outbound.clone())
    }
}

impl ClientChannel for ClientSlot {
    fn is_open(&self) -> bool {
        self.sender().map_or(false, |tx| !tx.is_closed())
    }

    async fn push_json(&self, value: Value) -> Result<()> {
        let tx = self
            .sender()
            .ok_or_else(|| Error::transport_send("no display client connected"))?;
        let line = serde_json::to_string(&value)?;
        tx.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::transport_send("display client is not keeping up, snapshot dropped")
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::transport_send("display client connection closed")
            }
        })
    }
}

/// Binds the client listener with address reuse so restarts do not wait on TIME_WAIT
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(16)?;
    let listener = TcpListener::from_std(socket.into())?;
    Ok(listener)
}

/// Accepts display clients until cancelled.
///
/// Each line a client sends is parsed as an inbound message; control commands
/// are forwarded on `commands`.
pub async fn serve_clients(
    listener: TcpListener,
    slot: Arc<ClientSlot>,
    commands: mpsc::Sender<ControlCommand>,
    cancel: CancellationToken,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening for display clients");
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let conn_cancel = cancel.child_token();
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        slot.clone(),
                        commands.clone(),
                        conn_cancel,
                    ));
                }
                Err(e) => warn!(error = %e, "failed to accept display client"),
            }
        }
    }

    debug!("client listener stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    slot: Arc<ClientSlot>,
    commands: mpsc::Sender<ControlCommand>,
    cancel: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "could not disable Nagle");
    }
    let (mut sink, mut lines) =
        Framed::new(stream, DisplayLineCodec::new(MAX_LINE_LENGTH)).split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let id = slot.attach(tx, cancel.clone());
    info!(%peer, connection = id, "display client connected");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(line) = rx.recv() => {
                if let Err(e) = sink.send(line).await {
                    warn!(%peer, error = %e, "failed to write snapshot");
                    break;
                }
            }
            next = lines.next() => match next {
                Some(Ok(line)) => match InboundMessage::parse(&line) {
                    Some(InboundMessage::Command(command)) if command.is_empty() => {
                        debug!(%peer, "command without known fields ignored");
                    }
                    Some(InboundMessage::Command(command)) => {
                        if commands.send(command).await.is_err() {
                            debug!("control handler gone, dropping command");
                        }
                    }
                    Some(InboundMessage::Close) => {
                        debug!(%peer, "client requested close");
                        break;
                    }
                    Some(InboundMessage::Ready) => debug!(%peer, "client ready"),
                    None => debug!(%peer, line = %line, "ignoring unrecognised client message"),
                },
                Some(Err(e)) => {
                    warn!(%peer, error = %e, "client read failed");
                    break;
                }
                None => break,
            }
        }
    }

    slot.detach(id);
    if let Err(e) = sink.close().await {
        debug!(%peer, error = %e, "error closing client connection");
    }
    info!(%peer, connection = id, "display client disconnected");
}
