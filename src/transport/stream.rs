//! Transport over any tokio byte stream.
//!
//! The stream is produced by a connector closure each time the link opens,
//! split into halves, and the read half is pumped into an [`InboundRx`] by a
//! spawned task.
//!
//! # Example
//!
//! ```ignore
//! use tokio::net::TcpStream;
//! use zwave_serial::transport::StreamTransport;
//!
//! // ser2net style bridge in front of the controller
//! let transport = StreamTransport::new(|| TcpStream::connect("192.168.1.20:4001"));
//! ```

use std::future::Future;
use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{BoxFuture, InboundRx, Transport};
use crate::config::{LinkConfig, DEFAULT_INBOUND_CAPACITY, DEFAULT_READ_CHUNK_SIZE};
use crate::error::{LinkError, Result};

type Connector<S> = Box<dyn FnMut() -> BoxFuture<'static, io::Result<S>> + Send>;

/// [`Transport`] over an `AsyncRead + AsyncWrite` stream.
pub struct StreamTransport<S> {
    connect: Connector<S>,
    writer: Option<WriteHalf<S>>,
    reader: Option<JoinHandle<()>>,
    read_chunk_size: usize,
    inbound_capacity: usize,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a transport that calls `connect` on every open.
    pub fn new<F, Fut>(mut connect: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<S>> + Send + 'static,
    {
        Self {
            connect: Box::new(move || Box::pin(connect())),
            writer: None,
            reader: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }

    /// Wrap an already connected stream. Only the first open succeeds.
    pub fn once(stream: S) -> Self {
        let mut slot = Some(stream);
        Self::new(move || {
            let stream = slot.take();
            async move {
                stream.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream already used"))
            }
        })
    }

    /// Set the read buffer size.
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    /// Set the inbound channel capacity.
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    /// Take buffer sizes from a link configuration.
    pub fn with_link_config(self, config: &LinkConfig) -> Self {
        self.read_chunk_size(config.read_chunk_size)
            .inbound_capacity(config.inbound_capacity)
    }

    /// Whether a stream is currently connected.
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn open(&mut self) -> BoxFuture<'_, Result<InboundRx>> {
        Box::pin(async move {
            if let Err(e) = self.shutdown().await {
                tracing::debug!("Ignoring shutdown error on reopen: {}", e);
            }

            let stream = (self.connect)().await?;
            let (reader, writer) = tokio::io::split(stream);
            let (tx, rx) = mpsc::channel(self.inbound_capacity);

            self.reader = Some(tokio::spawn(read_loop(reader, tx, self.read_chunk_size)));
            self.writer = Some(writer);

            Ok(rx)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.shutdown())
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let writer = self
                .writer
                .as_mut()
                .ok_or_else(|| LinkError::Transport("stream not open".to_string()))?;

            writer.write_all(&data).await?;
            writer.flush().await?;
            Ok(())
        })
    }
}

impl<S> Drop for StreamTransport<S> {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Pump raw chunks from the read half into the inbound channel.
async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<Bytes>, chunk_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Stream closed by peer");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Stream read error: {}", e);
                return;
            }
        };

        if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
            // Receiver gone, nobody is listening
            return;
        }
    }
}
