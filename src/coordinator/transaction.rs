//! The single outstanding exchange and its outcome channel.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{LinkError, Result};
use crate::message::Message;
use crate::protocol::{Envelope, FunctionId};

/// Monotonic identity of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub(crate) u64);

impl TransactionId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal result of one transaction.
#[derive(Debug)]
pub enum TransactionOutcome {
    /// Every required reply arrived; the replies in arrival order.
    Completed(Vec<Message>),
    /// The last retry timed out.
    TimeoutExhausted,
    /// Encoding or writing the request failed.
    Failed(LinkError),
}

impl TransactionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Replies of a completed transaction.
    pub fn into_replies(self) -> Option<Vec<Message>> {
        match self {
            Self::Completed(replies) => Some(replies),
            _ => None,
        }
    }
}

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Idle,
    Sending,
    AwaitingReply,
    Completed,
    Retrying,
    TimedOut,
    Error,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::AwaitingReply => "awaiting_reply",
            Self::Completed => "completed",
            Self::Retrying => "retrying",
            Self::TimedOut => "timed_out",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a submitted transaction's outcome.
///
/// Resolves to exactly one [`TransactionOutcome`], or to
/// [`LinkError::ConnectionClosed`] if the transaction was discarded by a
/// close or the coordinator went away.
#[derive(Debug)]
pub struct PendingTransaction {
    id: TransactionId,
    rx: oneshot::Receiver<TransactionOutcome>,
}

impl PendingTransaction {
    pub(crate) fn new(id: TransactionId, rx: oneshot::Receiver<TransactionOutcome>) -> Self {
        Self { id, rx }
    }

    #[inline]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Check for an outcome without waiting.
    pub fn try_outcome(&mut self) -> Option<Result<TransactionOutcome>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(Ok(outcome)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(LinkError::ConnectionClosed)),
        }
    }
}

impl Future for PendingTransaction {
    type Output = Result<TransactionOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| LinkError::ConnectionClosed))
    }
}

/// Coordinator-owned record of the outstanding exchange.
pub(crate) struct Transaction {
    pub(crate) id: TransactionId,
    pub(crate) envelope: Envelope,
    required: BTreeSet<FunctionId>,
    seen: BTreeSet<FunctionId>,
    collected: Vec<Message>,
    pub(crate) retries: u32,
    /// Reply window for the current attempt; `None` while not armed.
    pub(crate) deadline: Option<Instant>,
    outcome: oneshot::Sender<TransactionOutcome>,
}

impl Transaction {
    pub(crate) fn new(
        id: TransactionId,
        envelope: Envelope,
        required: BTreeSet<FunctionId>,
        outcome: oneshot::Sender<TransactionOutcome>,
    ) -> Self {
        Self {
            id,
            envelope,
            required,
            seen: BTreeSet::new(),
            collected: Vec::new(),
            retries: 0,
            deadline: None,
            outcome,
        }
    }

    /// Collect `message` if it is one of the required replies.
    ///
    /// Hands the message back when it does not belong to this transaction.
    pub(crate) fn accept(&mut self, message: Message) -> std::result::Result<(), Message> {
        match message.function_id() {
            Some(id) if self.required.contains(&id) => {
                self.seen.insert(id);
                self.collected.push(message);
                Ok(())
            }
            _ => Err(message),
        }
    }

    /// Every required function id has been seen this attempt.
    pub(crate) fn is_complete(&self) -> bool {
        self.seen.len() == self.required.len()
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.required.len() - self.seen.len()
    }

    /// Drop replies from the failed attempt and count the retry.
    pub(crate) fn prepare_retry(&mut self) {
        self.seen.clear();
        self.collected.clear();
        self.deadline = None;
        self.retries += 1;
    }

    pub(crate) fn take_replies(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.collected)
    }

    /// Deliver the outcome. A dropped receiver is not an error.
    pub(crate) fn resolve(self, outcome: TransactionOutcome) {
        if self.outcome.send(outcome).is_err() {
            tracing::debug!("Outcome of transaction {} had no receiver", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::VersionReply;
    use crate::protocol::MessageType;

    fn transaction(required: &[FunctionId]) -> (Transaction, PendingTransaction) {
        let (tx, rx) = oneshot::channel();
        let id = TransactionId(7);
        let transaction = Transaction::new(id, VersionReply::request(), required.iter().copied().collect(), tx);
        (transaction, PendingTransaction::new(id, rx))
    }

    fn reply(id: FunctionId) -> Message {
        Message::Opaque(Envelope::from_parts(MessageType::Response, id, &[0x01]))
    }

    #[test]
    fn test_accept_only_required() {
        let (mut transaction, _pending) = transaction(&[FunctionId::GET_VERSION]);

        assert!(transaction.accept(Message::ack()).is_err());
        assert!(transaction.accept(reply(FunctionId::SEND_DATA)).is_err());
        assert!(!transaction.is_complete());

        assert!(transaction.accept(reply(FunctionId::GET_VERSION)).is_ok());
        assert!(transaction.is_complete());
    }

    #[test]
    fn test_multi_id_completion() {
        let (mut transaction, _pending) = transaction(&[FunctionId::SEND_DATA, FunctionId::APPLICATION_UPDATE]);

        transaction.accept(reply(FunctionId::SEND_DATA)).unwrap();
        transaction.accept(reply(FunctionId::SEND_DATA)).unwrap();
        assert_eq!(transaction.outstanding(), 1);
        assert!(!transaction.is_complete());

        transaction.accept(reply(FunctionId::APPLICATION_UPDATE)).unwrap();
        assert!(transaction.is_complete());
        assert_eq!(transaction.take_replies().len(), 3);
    }

    #[test]
    fn test_prepare_retry_clears_replies() {
        let (mut transaction, _pending) = transaction(&[FunctionId::SEND_DATA, FunctionId::APPLICATION_UPDATE]);

        transaction.accept(reply(FunctionId::SEND_DATA)).unwrap();
        transaction.deadline = Some(Instant::now());
        transaction.prepare_retry();

        assert_eq!(transaction.retries, 1);
        assert_eq!(transaction.outstanding(), 2);
        assert!(transaction.deadline.is_none());
        assert!(transaction.take_replies().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_delivers_once() {
        let (transaction, pending) = transaction(&[FunctionId::GET_VERSION]);
        assert_eq!(pending.id(), TransactionId(7));

        transaction.resolve(TransactionOutcome::TimeoutExhausted);
        assert!(matches!(pending.await, Ok(TransactionOutcome::TimeoutExhausted)));
    }

    #[tokio::test]
    async fn test_discarded_transaction_reports_closed() {
        let (transaction, mut pending) = transaction(&[FunctionId::GET_VERSION]);
        assert!(pending.try_outcome().is_none());

        drop(transaction);
        assert!(matches!(pending.await, Err(LinkError::ConnectionClosed)));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(LinkState::AwaitingReply.to_string(), "awaiting_reply");
        assert_eq!(TransactionId(3).to_string(), "#3");
    }
}
