//! Coordinator module - the per-link transaction state machine.
//!
//! A [`Coordinator`] owns the transport and at most one outstanding
//! transaction. It can be driven directly, or spawned as a tokio task and
//! talked to through a cloneable [`LinkHandle`].
//!
//! ```text
//! LinkHandle ─┐                      ┌─► Transport.write
//! LinkHandle ─┼─► mpsc<Command> ─► Coordinator task
//!             │                      ├─◄ InboundRx (raw chunks)
//!             │                      ├─► PendingTransaction (one outcome each)
//!             │                      └─► EventRx (LinkEvent)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use zwave_serial::coordinator::{Coordinator, LinkEvent, TransactionOutcome};
//! use zwave_serial::transport::{SerialSettings, SerialTransport};
//!
//! let (link, mut events) = Coordinator::builder()
//!     .max_retries(3)
//!     .spawn(SerialTransport::new(SerialSettings::new("/dev/ttyACM0")))?;
//!
//! link.open().await?;
//! let pending = link.request_version().await?;
//!
//! if let TransactionOutcome::Completed(replies) = pending.await? {
//!     println!("{:?}", replies);
//! }
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::message::{Message, MessageParser, MessageRegistry, VersionReply};
use crate::protocol::{ControlByte, FunctionId, ProtocolConstants};
use crate::transport::Transport;

mod machine;
mod transaction;

pub use machine::Coordinator;
pub use transaction::{LinkState, PendingTransaction, TransactionId, TransactionOutcome};

/// Notifications not tied to a particular transaction.
#[derive(Debug)]
pub enum LinkEvent {
    /// The transport opened; submissions are accepted.
    Ready,
    /// The transport closed or was lost.
    Unready,
    /// Opening, closing or writing failed.
    TransportError(String),
    /// A message that matched no outstanding transaction.
    Unsolicited(Message),
    /// An internal inconsistency, e.g. a stale timeout.
    Fatal(LinkError),
}

/// Receiver for [`LinkEvent`]s.
pub type EventRx = mpsc::UnboundedReceiver<LinkEvent>;

/// Snapshot of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: LinkState,
    pub ready: bool,
    pub pending: Option<TransactionId>,
    pub retries: u32,
    /// How the last finished transaction ended: Completed, TimedOut or Error.
    pub last_outcome: Option<LinkState>,
}

/// Requests from handles to the coordinator task.
pub(crate) enum Command {
    Open {
        reply: oneshot::Sender<Result<()>>,
    },
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
    Submit {
        message: Message,
        required: BTreeSet<FunctionId>,
        reply: oneshot::Sender<Result<PendingTransaction>>,
    },
    SendControl {
        control: ControlByte,
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<LinkStatus>,
    },
}

/// Builder for configuring a coordinator.
#[derive(Debug)]
pub struct CoordinatorBuilder {
    config: LinkConfig,
    registry: MessageRegistry,
}

impl CoordinatorBuilder {
    /// Builder with default configuration and the standard registry.
    pub fn new() -> Self {
        Self {
            config: LinkConfig::default(),
            registry: MessageRegistry::standard(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Reply window per attempt.
    ///
    /// Default: 5 seconds
    pub fn tx_timeout(mut self, timeout: Duration) -> Self {
        self.config.tx_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Resends after the first attempt.
    ///
    /// Default: 3
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Command channel capacity.
    ///
    /// Default: 32
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.config.command_capacity = capacity;
        self
    }

    /// Framing constants for the codec and frame buffer.
    ///
    /// Checked when the coordinator is built.
    pub fn constants(mut self, constants: ProtocolConstants) -> Self {
        self.config.constants = constants;
        self
    }

    /// Replace the message registry.
    pub fn registry(mut self, registry: MessageRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register an additional message parser.
    pub fn register<P: MessageParser>(mut self, id: FunctionId, parser: P) -> Self {
        self.registry.register(id, parser);
        self
    }

    /// Build a coordinator to drive directly.
    ///
    /// Closes the transport first so the link starts from a known state.
    /// Fails without touching the transport if the configuration is invalid.
    pub async fn build<T: Transport>(self, transport: T) -> Result<(Coordinator<T>, EventRx)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut coordinator = Coordinator::new(transport, self.config, self.registry, events_tx)?;
        coordinator.reset().await;
        Ok((coordinator, events_rx))
    }

    /// Spawn the coordinator task.
    ///
    /// The task stops, closing the transport, once every handle is dropped.
    pub fn spawn<T: Transport>(self, transport: T) -> Result<(LinkHandle, EventRx)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(self.config.command_capacity.max(1));

        let coordinator = Coordinator::new(transport, self.config, self.registry, events_tx)?;
        tokio::spawn(coordinator.run(rx));

        Ok((LinkHandle { tx }, events_rx))
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to a spawned coordinator.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    tx: mpsc::Sender<Command>,
}

impl LinkHandle {
    async fn request<R>(&self, command: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| LinkError::ConnectionClosed)?;
        rx.await.map_err(|_| LinkError::ConnectionClosed)
    }

    /// Open the transport. Emits [`LinkEvent::Ready`] on success.
    pub async fn open(&self) -> Result<()> {
        self.request(|reply| Command::Open { reply }).await?
    }

    /// Close the transport, discarding any pending transaction.
    pub async fn close(&self) -> Result<()> {
        self.request(|reply| Command::Close { reply }).await?
    }

    /// Submit a message and the function ids that complete it.
    pub async fn submit<M, I>(&self, message: M, required: I) -> Result<PendingTransaction>
    where
        M: Into<Message>,
        I: IntoIterator<Item = FunctionId>,
    {
        let message = message.into();
        let required = required.into_iter().collect();
        self.request(|reply| Command::Submit {
            message,
            required,
            reply,
        })
        .await?
    }

    /// Ask the controller for its library version.
    pub async fn request_version(&self) -> Result<PendingTransaction> {
        self.submit(VersionReply::request(), [FunctionId::GET_VERSION])
            .await
    }

    /// Write a single ACK, NACK or CAN outside any transaction.
    pub async fn send_control(&self, control: ControlByte) -> Result<()> {
        self.request(|reply| Command::SendControl { control, reply })
            .await?
    }

    pub async fn status(&self) -> Result<LinkStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn state(&self) -> Result<LinkState> {
        Ok(self.status().await?.state)
    }

    /// Whether the coordinator task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
pub(crate) mod mock;
