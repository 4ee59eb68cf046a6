//! Message registry for interpreting envelopes by function id.
//!
//! The registry maps function ids to parsers. A function id with no parser
//! is unsupported: the caller gets [`BuildError::Unsupported`] and treats it
//! as "no message produced".
//!
//! # Example
//!
//! ```
//! use zwave_serial::message::{Message, MessageRegistry, VersionReply};
//! use zwave_serial::protocol::{Envelope, FunctionId};
//!
//! let mut registry = MessageRegistry::new();
//! registry.register_typed::<VersionReply>(FunctionId::GET_VERSION);
//! registry.register_opaque(FunctionId::SEND_DATA);
//!
//! assert!(registry.is_supported(FunctionId::SEND_DATA));
//! assert!(registry.build(Envelope::request(FunctionId(0x99))).is_err());
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;

use super::{FromEnvelope, Message, VersionReply};
use crate::error::{BuildError, PayloadError};
use crate::protocol::{ControlByte, Envelope, FunctionId};

/// Trait for message constructors.
pub trait MessageParser: Send + Sync + 'static {
    /// Interpret the envelope payload.
    fn parse(&self, envelope: Envelope) -> Result<Message, PayloadError>;
}

impl<F> MessageParser for F
where
    F: Fn(Envelope) -> Result<Message, PayloadError> + Send + Sync + 'static,
{
    fn parse(&self, envelope: Envelope) -> Result<Message, PayloadError> {
        self(envelope)
    }
}

/// Wrapper that builds a concrete message type before widening to [`Message`].
pub struct TypedParser<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> TypedParser<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for TypedParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MessageParser for TypedParser<T>
where
    T: FromEnvelope + Into<Message> + 'static,
{
    fn parse(&self, envelope: Envelope) -> Result<Message, PayloadError> {
        T::from_envelope(envelope).map(Into::into)
    }
}

/// Accepts the envelope as-is, without payload interpretation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueParser;

impl MessageParser for OpaqueParser {
    fn parse(&self, envelope: Envelope) -> Result<Message, PayloadError> {
        Ok(Message::Opaque(envelope))
    }
}

/// Registry mapping function ids to parsers.
pub struct MessageRegistry {
    parsers: HashMap<FunctionId, Box<dyn MessageParser>>,
}

impl MessageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry for the standard function id table.
    ///
    /// GET_VERSION is fully interpreted; every other known id is opaque.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for id in FunctionId::KNOWN {
            registry.register_opaque(id);
        }
        registry.register_typed::<VersionReply>(FunctionId::GET_VERSION);
        registry
    }

    /// Register a parser, replacing any previous one for this id.
    pub fn register<P: MessageParser>(&mut self, id: FunctionId, parser: P) {
        if self.parsers.insert(id, Box::new(parser)).is_some() {
            tracing::debug!("Replaced parser for function id {}", id);
        }
    }

    /// Register a concrete message type.
    pub fn register_typed<T>(&mut self, id: FunctionId)
    where
        T: FromEnvelope + Into<Message> + 'static,
    {
        self.register(id, TypedParser::<T>::new());
    }

    /// Register an id whose envelopes pass through uninterpreted.
    pub fn register_opaque(&mut self, id: FunctionId) {
        self.register(id, OpaqueParser);
    }

    /// Forget a function id.
    pub fn unregister(&mut self, id: FunctionId) -> bool {
        self.parsers.remove(&id).is_some()
    }

    pub fn is_supported(&self, id: FunctionId) -> bool {
        self.parsers.contains_key(&id)
    }

    /// Registered ids in ascending order.
    pub fn supported_ids(&self) -> Vec<FunctionId> {
        let mut ids: Vec<_> = self.parsers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Build a message from a decoded envelope.
    pub fn build(&self, envelope: Envelope) -> Result<Message, BuildError> {
        let id = envelope.function_id;
        let parser = self.parsers.get(&id).ok_or(BuildError::Unsupported(id))?;

        Ok(parser.parse(envelope)?)
    }

    /// Build a control message. These never go through a parser.
    pub fn control(&self, control: ControlByte) -> Message {
        Message::Control(control)
    }

    pub fn ack(&self) -> Message {
        self.control(ControlByte::Ack)
    }

    pub fn nack(&self) -> Message {
        self.control(ControlByte::Nack)
    }

    pub fn can(&self) -> Message {
        self.control(ControlByte::Can)
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRegistry")
            .field("supported", &self.supported_ids())
            .finish()
    }
}
