use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::signaling::transport::{SignalConnection, SignalTransport};
use stagecast_core::{ClientCommand, Invocation, ServerEvent};

/// Upper bound on the random delay before one reconnect attempt.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(10);
/// Cumulative downtime after which reconnection is abandoned for good.
pub const RECONNECT_WINDOW: Duration = Duration::from_secs(60);
/// How long an invoked command may wait for its acknowledgement.
pub const INVOKE_TIMEOUT: Duration = Duration::from_secs(10);

/// What the channel reports upward, in arrival order.
#[derive(Debug)]
pub enum ChannelEvent {
    Event(ServerEvent),
    /// The connection dropped; any active room session is stale from here on.
    Reconnecting,
    Reconnected,
    /// Terminal. The reconnect window elapsed without a successful dial.
    Disconnected,
}

type PendingMap = DashMap<u64, oneshot::Sender<Result<(), String>>>;

/// Persistent bidirectional connection to the hub.
///
/// Commands go out as numbered invocations; the matching `Ack` resolves the
/// caller. Unsolicited events are forwarded as `ChannelEvent`s in arrival
/// order. An unexpected disconnect triggers jittered redialing for up to
/// [`RECONNECT_WINDOW`]; reconnection never resumes in-flight negotiations.
pub struct SignalingChannel {
    out_tx: mpsc::UnboundedSender<String>,
    pending: Arc<PendingMap>,
    next_id: AtomicU64,
}

impl SignalingChannel {
    /// Dial the transport and spawn the channel worker. Fails with
    /// `Error::Connection` if the initial handshake does not complete.
    pub async fn connect(
        transport: Arc<dyn SignalTransport>,
        event_tx: mpsc::Sender<ChannelEvent>,
    ) -> Result<Self, Error> {
        let conn = transport
            .dial()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        info!("signaling channel connected");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());

        tokio::spawn(run_loop(
            transport,
            conn,
            out_rx,
            Arc::clone(&pending),
            event_tx,
        ));

        Ok(Self {
            out_tx,
            pending,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send a command and wait for the hub's acknowledgement.
    pub async fn invoke(&self, command: ClientCommand) -> Result<(), Error> {
        let name = command.name();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending.insert(id, ack_tx);

        let text = serde_json::to_string(&Invocation {
            id: Some(id),
            command,
        })
        .map_err(|e| Error::Command {
            command: name,
            reason: e.to_string(),
        })?;

        if self.out_tx.send(text).is_err() {
            self.pending.remove(&id);
            return Err(Error::Closed);
        }

        match tokio::time::timeout(INVOKE_TIMEOUT, ack_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(Error::Command {
                command: name,
                reason,
            }),
            Ok(Err(_)) => Err(Error::Command {
                command: name,
                reason: "connection lost before acknowledgement".to_string(),
            }),
            Err(_) => {
                self.pending.remove(&id);
                Err(Error::Command {
                    command: name,
                    reason: "acknowledgement timed out".to_string(),
                })
            }
        }
    }

    /// Send a command without waiting for an acknowledgement. Used for the
    /// offer/answer/candidate relay where per-message acks add nothing.
    pub fn notify(&self, command: ClientCommand) -> Result<(), Error> {
        let name = command.name();
        let text =
            serde_json::to_string(&Invocation { id: None, command }).map_err(|e| Error::Command {
                command: name,
                reason: e.to_string(),
            })?;
        self.out_tx.send(text).map_err(|_| Error::Closed)
    }
}

async fn run_loop(
    transport: Arc<dyn SignalTransport>,
    mut conn: Box<dyn SignalConnection>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    pending: Arc<PendingMap>,
    event_tx: mpsc::Sender<ChannelEvent>,
) {
    loop {
        tokio::select! {
            out = out_rx.recv() => match out {
                Some(text) => {
                    if let Err(e) = conn.send(text).await {
                        warn!("signaling send failed: {e}");
                        match reconnect(&transport, &pending, &event_tx).await {
                            Some(fresh) => conn = fresh,
                            None => return,
                        }
                    }
                }
                None => {
                    debug!("channel handle dropped, stopping worker");
                    return;
                }
            },

            inbound = conn.recv() => match inbound {
                Some(Ok(text)) => dispatch(&pending, &event_tx, &text).await,
                Some(Err(e)) => {
                    warn!("signaling receive failed: {e}");
                    match reconnect(&transport, &pending, &event_tx).await {
                        Some(fresh) => conn = fresh,
                        None => return,
                    }
                }
                None => {
                    info!("signaling connection closed by remote");
                    match reconnect(&transport, &pending, &event_tx).await {
                        Some(fresh) => conn = fresh,
                        None => return,
                    }
                }
            },
        }
    }
}

async fn dispatch(pending: &PendingMap, event_tx: &mpsc::Sender<ChannelEvent>, text: &str) {
    let event: ServerEvent = match serde_json::from_str(text) {
        Ok(ev) => ev,
        Err(e) => {
            warn!("invalid hub message: {e}. Text: {text}");
            return;
        }
    };

    if let ServerEvent::Ack { id, error } = event {
        match pending.remove(&id) {
            Some((_, ack_tx)) => {
                let _ = ack_tx.send(match error {
                    None => Ok(()),
                    Some(reason) => Err(reason),
                });
            }
            None => warn!("ack for unknown invocation {id}"),
        }
        return;
    }

    let _ = event_tx.send(ChannelEvent::Event(event)).await;
}

/// Redial with a uniform random delay per attempt until the cumulative
/// downtime exceeds [`RECONNECT_WINDOW`]. Returns the fresh connection, or
/// `None` once the channel is terminally disconnected.
async fn reconnect(
    transport: &Arc<dyn SignalTransport>,
    pending: &PendingMap,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> Option<Box<dyn SignalConnection>> {
    fail_pending(pending);
    let _ = event_tx.send(ChannelEvent::Reconnecting).await;

    let lost_at = Instant::now();
    loop {
        if lost_at.elapsed() >= RECONNECT_WINDOW {
            break;
        }

        let delay_ms = rand::thread_rng().gen_range(0..MAX_RECONNECT_DELAY.as_millis() as u64);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        if lost_at.elapsed() >= RECONNECT_WINDOW {
            break;
        }

        match transport.dial().await {
            Ok(conn) => {
                info!("signaling channel reconnected");
                let _ = event_tx.send(ChannelEvent::Reconnected).await;
                return Some(conn);
            }
            Err(e) => debug!("reconnect attempt failed: {e}"),
        }
    }

    warn!("reconnect window elapsed, giving up");
    let _ = event_tx.send(ChannelEvent::Disconnected).await;
    None
}

fn fail_pending(pending: &PendingMap) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, ack_tx)) = pending.remove(&id) {
            let _ = ack_tx.send(Err("connection lost".to_string()));
        }
    }
}
