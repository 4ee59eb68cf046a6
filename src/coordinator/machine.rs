//! Transaction state machine.
//!
//! ```text
//! Idle ─► Sending ─► AwaitingReply ─┬─► Completed ─┐
//!  ▲         ▲                      ├─► Retrying ──┼─► Sending
//!  │         └──────────────────────┤              │
//!  │                                ├─► TimedOut ──┤
//!  │                                └─► Error ─────┤
//!  └───────────────────────────────────────────────┘
//! ```
//!
//! Completed, TimedOut and Error are passed through when an outcome is
//! delivered; the coordinator is Idle again right after, and the end state
//! stays visible as [`Coordinator::last_outcome`].
//!
//! Every method runs to completion on `&mut self`; the spawned task in
//! [`CoordinatorBuilder::spawn`](super::CoordinatorBuilder::spawn) only
//! multiplexes commands, inbound chunks and the reply deadline onto them.

use std::collections::BTreeSet;
use std::future;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::transaction::{LinkState, PendingTransaction, Transaction, TransactionId, TransactionOutcome};
use super::{Command, CoordinatorBuilder, LinkEvent, LinkStatus};
use crate::codec::FrameCodec;
use crate::config::LinkConfig;
use crate::error::{BuildError, LinkError, Result};
use crate::message::{Message, MessageRegistry};
use crate::protocol::{ControlByte, FrameBuffer, FunctionId, Inbound};
use crate::transport::{InboundRx, Transport};

/// Send/acknowledge/retry driver for one link.
pub struct Coordinator<T> {
    transport: T,
    codec: FrameCodec,
    registry: MessageRegistry,
    config: LinkConfig,
    buffer: FrameBuffer,
    inbound: Option<InboundRx>,
    pending: Option<Transaction>,
    state: LinkState,
    last_outcome: Option<LinkState>,
    ready: bool,
    next_id: u64,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl Coordinator<()> {
    /// Create a coordinator builder.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }
}

impl<T: Transport> Coordinator<T> {
    pub(crate) fn new(
        transport: T,
        config: LinkConfig,
        registry: MessageRegistry,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            transport,
            codec: FrameCodec::new(config.constants)?,
            registry,
            buffer: FrameBuffer::with_constants(config.constants),
            config,
            inbound: None,
            pending: None,
            state: LinkState::Idle,
            last_outcome: None,
            ready: false,
            next_id: 1,
            events,
        })
    }

    /// Close the transport so the link starts from a known state.
    pub(crate) async fn reset(&mut self) {
        if let Err(e) = self.transport.close().await {
            tracing::warn!("Initial transport close failed: {}", e);
            self.emit(LinkEvent::TransportError(e.to_string()));
        }
    }

    /// Open the transport and start accepting submissions.
    pub async fn open(&mut self) -> Result<()> {
        match self.transport.open().await {
            Ok(inbound) => {
                self.inbound = Some(inbound);
                self.buffer.clear();
                self.ready = true;
                tracing::debug!("Link ready");
                self.emit(LinkEvent::Ready);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Transport open failed: {}", e);
                self.emit(LinkEvent::TransportError(e.to_string()));
                Err(e)
            }
        }
    }

    /// Close the transport. A pending transaction is discarded without an
    /// outcome; its [`PendingTransaction`] reports `ConnectionClosed`.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(transaction) = self.pending.take() {
            tracing::debug!("Discarding transaction {} on close", transaction.id);
        }
        self.inbound = None;
        self.buffer.clear();
        self.ready = false;
        self.state = LinkState::Idle;

        match self.transport.close().await {
            Ok(()) => {
                self.emit(LinkEvent::Unready);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Transport close failed: {}", e);
                self.emit(LinkEvent::TransportError(e.to_string()));
                Err(e)
            }
        }
    }

    /// Start a transaction for `message`, completed by replies carrying
    /// every function id in `required`.
    ///
    /// Rejections leave any pending transaction untouched.
    pub async fn submit<I>(&mut self, message: Message, required: I) -> Result<PendingTransaction>
    where
        I: IntoIterator<Item = FunctionId>,
    {
        if !self.ready {
            return Err(LinkError::NotReady);
        }

        if self.pending.is_some() {
            return Err(LinkError::TransactionPending);
        }

        let envelope = match message {
            Message::Control(_) => return Err(LinkError::NotAProtocolMessage),
            Message::Version(reply) => reply.into_envelope(),
            Message::Opaque(envelope) => envelope,
        };

        let required: BTreeSet<FunctionId> = required.into_iter().collect();
        if required.is_empty() {
            return Err(LinkError::InvalidReplySet);
        }

        let id = TransactionId(self.next_id);
        self.next_id += 1;

        tracing::debug!(
            "Transaction {} sending {} awaiting {:?}",
            id,
            envelope.function_id,
            required
        );

        let (tx, rx) = oneshot::channel();
        self.pending = Some(Transaction::new(id, envelope, required, tx));
        self.send_pending().await;

        Ok(PendingTransaction::new(id, rx))
    }

    /// Write a single control byte outside any transaction.
    pub async fn send_control(&mut self, control: ControlByte) -> Result<()> {
        if !self.ready {
            return Err(LinkError::NotReady);
        }

        let frame = self.codec.encode_control(control);
        self.transport.write(frame).await.map_err(|e| {
            tracing::warn!("Failed to write {:?}: {}", control, e);
            LinkError::Transport(e.to_string())
        })
    }

    /// React to the reply deadline of transaction `id` expiring.
    ///
    /// A timeout for anything but the current transaction is reported as
    /// [`LinkEvent::Fatal`] and leaves the state untouched.
    pub async fn handle_timeout(&mut self, id: TransactionId) -> Result<()> {
        let retries = match self.pending.as_ref() {
            Some(transaction) if transaction.id == id => transaction.retries,
            _ => {
                tracing::error!("Timeout for transaction {} with none outstanding", id);
                self.emit(LinkEvent::Fatal(LinkError::StaleTimeout));
                return Err(LinkError::StaleTimeout);
            }
        };

        if retries >= self.config.max_retries {
            tracing::warn!("Transaction {} timed out after {} retries", id, retries);
            self.finish(TransactionOutcome::TimeoutExhausted, LinkState::TimedOut);
            return Ok(());
        }

        tracing::debug!("Transaction {} timed out, retry {}", id, retries + 1);
        if let Some(transaction) = self.pending.as_mut() {
            transaction.prepare_retry();
        }
        self.buffer.clear();
        self.state = LinkState::Retrying;
        self.send_pending().await;

        Ok(())
    }

    /// Feed raw inbound bytes through framing, decoding and the registry.
    pub fn handle_chunk(&mut self, chunk: &[u8]) {
        for item in self.buffer.push(chunk) {
            match item {
                Inbound::Control(control) => self.handle_message(Message::Control(control)),
                Inbound::Frame(raw) => {
                    if let Some(message) = self.build(&raw) {
                        self.handle_message(message);
                    }
                }
            }
        }
    }

    fn build(&self, raw: &[u8]) -> Option<Message> {
        let envelope = match self.codec.decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {}", e);
                return None;
            }
        };

        match self.registry.build(envelope) {
            Ok(message) => Some(message),
            Err(BuildError::Unsupported(id)) => {
                tracing::debug!("Dropping frame with unsupported function id {}", id);
                None
            }
            Err(BuildError::Payload(e)) => {
                tracing::warn!("Dropping frame with invalid payload: {}", e);
                None
            }
        }
    }

    /// Match a decoded message against the pending transaction.
    pub fn handle_message(&mut self, message: Message) {
        let Some(transaction) = self.pending.as_mut() else {
            self.emit(LinkEvent::Unsolicited(message));
            return;
        };

        if let Err(message) = transaction.accept(message) {
            self.emit(LinkEvent::Unsolicited(message));
            return;
        }

        if transaction.is_complete() {
            let replies = transaction.take_replies();
            tracing::debug!("Transaction {} completed with {} replies", transaction.id, replies.len());
            self.finish(TransactionOutcome::Completed(replies), LinkState::Completed);
        } else {
            // Fresh window for the remaining replies
            transaction.deadline = Some(Instant::now() + self.config.tx_timeout());
            tracing::debug!(
                "Transaction {} waiting for {} more replies",
                transaction.id,
                transaction.outstanding()
            );
        }
    }

    /// The inbound channel closed under us.
    async fn handle_link_lost(&mut self) {
        tracing::warn!("Transport inbound closed, link lost");
        self.inbound = None;
        self.buffer.clear();
        self.ready = false;

        if self.pending.is_some() {
            self.finish(TransactionOutcome::Failed(LinkError::ConnectionClosed), LinkState::Error);
        } else {
            self.state = LinkState::Idle;
        }

        if let Err(e) = self.transport.close().await {
            tracing::debug!("Close after link loss failed: {}", e);
        }
        self.emit(LinkEvent::Unready);
    }

    /// Encode and write the pending envelope, then arm its deadline.
    async fn send_pending(&mut self) {
        let Some(transaction) = self.pending.as_ref() else {
            return;
        };
        self.state = LinkState::Sending;

        let frame = match self.codec.encode(&transaction.envelope) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Transaction {} failed to encode: {}", transaction.id, e);
                self.finish(TransactionOutcome::Failed(e.into()), LinkState::Error);
                return;
            }
        };

        if let Err(e) = self.transport.write(frame).await {
            let reason = e.to_string();
            tracing::warn!("Transport write failed: {}", reason);
            self.finish(
                TransactionOutcome::Failed(LinkError::Transport(reason.clone())),
                LinkState::Error,
            );
            self.emit(LinkEvent::TransportError(reason));
            return;
        }

        let deadline = Instant::now() + self.config.tx_timeout();
        if let Some(transaction) = self.pending.as_mut() {
            transaction.deadline = Some(deadline);
        }
        self.state = LinkState::AwaitingReply;
    }

    /// Clear the transaction, deliver its outcome and go back to Idle.
    fn finish(&mut self, outcome: TransactionOutcome, end: LinkState) {
        if let Some(transaction) = self.pending.take() {
            tracing::trace!("Transaction {} ended in {}", transaction.id, end);
            transaction.resolve(outcome);
        }
        self.last_outcome = Some(end);
        self.state = LinkState::Idle;
    }

    fn emit(&self, event: LinkEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Link event dropped, no receiver");
        }
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// End state of the most recently finished transaction.
    #[inline]
    pub fn last_outcome(&self) -> Option<LinkState> {
        self.last_outcome
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The outstanding transaction, if any.
    pub fn pending(&self) -> Option<TransactionId> {
        self.pending.as_ref().map(|t| t.id)
    }

    /// When the current attempt times out.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().and_then(|t| t.deadline)
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state,
            ready: self.ready,
            pending: self.pending(),
            retries: self.pending.as_ref().map_or(0, |t| t.retries),
            last_outcome: self.last_outcome,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run as a task until every handle is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.reset().await;

        loop {
            let timer = self
                .pending
                .as_ref()
                .and_then(|t| t.deadline.map(|deadline| (t.id, deadline)));

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                chunk = next_chunk(&mut self.inbound) => match chunk {
                    Some(chunk) => self.handle_chunk(&chunk),
                    None => self.handle_link_lost().await,
                },
                id = expire(timer) => {
                    // Stale timeouts are already reported as events
                    let _ = self.handle_timeout(id).await;
                }
            }
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Open { reply } => {
                let _ = reply.send(self.open().await);
            }
            Command::Close { reply } => {
                let _ = reply.send(self.close().await);
            }
            Command::Submit {
                message,
                required,
                reply,
            } => {
                let _ = reply.send(self.submit(message, required).await);
            }
            Command::SendControl { control, reply } => {
                let _ = reply.send(self.send_control(control).await);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    async fn shutdown(&mut self) {
        tracing::debug!("All link handles dropped, shutting down");
        self.inbound = None;
        self.ready = false;

        if let Err(e) = self.transport.close().await {
            tracing::warn!("Transport close on shutdown failed: {}", e);
        }

        // Dropping the sender reports ConnectionClosed to the waiter
        self.pending = None;
        self.state = LinkState::Idle;
    }
}

async fn next_chunk(inbound: &mut Option<InboundRx>) -> Option<Bytes> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn expire(timer: Option<(TransactionId, Instant)>) -> TransactionId {
    match timer {
        Some((id, deadline)) => {
            tokio::time::sleep_until(deadline).await;
            id
        }
        None => future::pending().await,
    }
}
