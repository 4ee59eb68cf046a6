//! Transport module - the byte pipe under the coordinator.
//!
//! A [`Transport`] opens, closes and writes. Opening hands back an
//! [`InboundRx`] that yields raw chunks as they arrive; the channel closing
//! means the link was lost.
//!
//! Provides:
//! - [`StreamTransport`] - any tokio `AsyncRead + AsyncWrite` (TCP bridges,
//!   pseudo terminals, in-memory duplex pipes)
//! - `SerialTransport` - a local serial port (`serial` feature)

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

mod stream;

#[cfg(feature = "serial")]
mod serial;

pub use stream::StreamTransport;

#[cfg(feature = "serial")]
pub use serial::{SerialSettings, SerialTransport};

/// Boxed future returned by transport operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw inbound chunks from an open transport.
pub type InboundRx = mpsc::Receiver<Bytes>;

/// Byte-level link to the controller.
pub trait Transport: Send + 'static {
    /// Open the link. Opening an already open transport reopens it.
    fn open(&mut self) -> BoxFuture<'_, Result<InboundRx>>;

    /// Close the link. Closing a closed transport succeeds.
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Write bytes in full.
    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> BoxFuture<'_, Result<InboundRx>> {
        (**self).open()
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        (**self).close()
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        (**self).write(data)
    }
}
