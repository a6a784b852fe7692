use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::mpsc;

use stagecast_client::signaling::{SignalConnection, SignalTransport};
use stagecast_core::{ClientCommand, Invocation, ServerEvent};

/// In-memory hub double. Every command the client sends is captured on the
/// command receiver and acknowledged automatically unless a rejection was
/// scripted; tests push hub events back with [`MockHub::send_event`].
pub struct MockHub {
    to_client: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reject: Mutex<HashMap<String, String>>,
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
    refuse_dials: AtomicBool,
}

impl MockHub {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ClientCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let hub = Arc::new(Self {
            to_client: Mutex::new(None),
            reject: Mutex::new(HashMap::new()),
            cmd_tx,
            refuse_dials: AtomicBool::new(false),
        });
        (hub, cmd_rx)
    }

    pub fn transport(self: &Arc<Self>) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport {
            hub: Arc::clone(self),
        })
    }

    /// Deliver one hub event to the currently connected client.
    pub fn send_event(&self, event: ServerEvent) {
        let text = serde_json::to_string(&event).expect("event serialization");
        if let Some(tx) = self.to_client.lock().unwrap().as_ref() {
            let _ = tx.send(text);
        }
    }

    /// Make every future invocation of `op` fail with `reason`.
    pub fn reject_command(&self, op: &str, reason: &str) {
        self.reject
            .lock()
            .unwrap()
            .insert(op.to_string(), reason.to_string());
    }

    /// Kill the current connection, as a network outage would.
    pub fn drop_connection(&self) {
        *self.to_client.lock().unwrap() = None;
    }

    pub fn refuse_dials(&self, refuse: bool) {
        self.refuse_dials.store(refuse, Ordering::SeqCst);
    }
}

pub struct MemoryTransport {
    hub: Arc<MockHub>,
}

#[async_trait]
impl SignalTransport for MemoryTransport {
    async fn dial(&self) -> Result<Box<dyn SignalConnection>> {
        if self.hub.refuse_dials.load(Ordering::SeqCst) {
            bail!("hub unreachable");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.hub.to_client.lock().unwrap() = Some(tx);
        Ok(Box::new(MemoryConnection {
            hub: Arc::clone(&self.hub),
            rx,
        }))
    }
}

struct MemoryConnection {
    hub: Arc<MockHub>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl SignalConnection for MemoryConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        let invocation: Invocation = serde_json::from_str(&text)?;
        let error = self
            .hub
            .reject
            .lock()
            .unwrap()
            .get(invocation.command.name())
            .cloned();

        let id = invocation.id;
        let _ = self.hub.cmd_tx.send(invocation.command);
        if let Some(id) = id {
            self.hub.send_event(ServerEvent::Ack { id, error });
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        self.rx.recv().await.map(Ok)
    }
}
