//! Local serial port transport.
//!
//! The port is blocking, so reads run on a dedicated thread and writes on the
//! blocking pool. The reader polls with the port timeout and exits when the
//! transport closes or the inbound receiver is dropped. Closing waits for the
//! reader to exit, so the device is free to reopen once `close` returns.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tokio::sync::mpsc;

use super::{BoxFuture, InboundRx, Transport};
use crate::config::{DEFAULT_INBOUND_CAPACITY, DEFAULT_READ_CHUNK_SIZE};
use crate::error::{LinkError, Result};

/// Serial line settings. The controller runs 8N1 without flow control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub path: String,
    pub baud_rate: u32,
    /// Read poll interval in milliseconds.
    pub read_timeout_ms: u64,
    pub read_chunk_size: usize,
    pub inbound_capacity: usize,
}

impl SerialSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 100,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Reader thread holding its own clone of the port.
struct SerialReader {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl SerialReader {
    fn spawn<R>(port: R, tx: mpsc::Sender<Bytes>, chunk_size: usize) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let thread = std::thread::Builder::new()
            .name("zwave-serial-reader".to_string())
            .spawn(move || read_loop(port, tx, flag, chunk_size))?;

        Ok(Self { stop, thread })
    }

    fn signal(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop the thread and wait until it has dropped its port handle.
    ///
    /// Takes up to one read timeout.
    async fn stop(self) -> Result<()> {
        self.signal();
        let thread = self.thread;

        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|e| LinkError::Transport(e.to_string()))?
            .map_err(|_| LinkError::Transport("serial reader panicked".to_string()))
    }
}

/// [`Transport`] over a local serial device.
pub struct SerialTransport {
    settings: SerialSettings,
    port: Option<SharedPort>,
    reader: Option<SerialReader>,
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: None,
            reader: None,
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Release both port handles.
    async fn release(&mut self) -> Result<()> {
        self.port = None;
        match self.reader.take() {
            Some(reader) => reader.stop().await,
            None => Ok(()),
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> BoxFuture<'_, Result<InboundRx>> {
        Box::pin(async move {
            self.release().await?;

            let settings = self.settings.clone();
            let port = tokio::task::spawn_blocking(move || open_port(&settings))
                .await
                .map_err(|e| LinkError::Transport(e.to_string()))??;
            let reader = port.try_clone().map_err(serial_error)?;

            let (tx, rx) = mpsc::channel(self.settings.inbound_capacity.max(1));
            let chunk_size = self.settings.read_chunk_size.max(1);
            let reader = SerialReader::spawn(reader, tx, chunk_size)?;

            tracing::debug!("Opened serial port {}", self.settings.path);
            self.port = Some(Arc::new(Mutex::new(port)));
            self.reader = Some(reader);

            Ok(rx)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.is_open() {
                tracing::debug!("Closing serial port {}", self.settings.path);
            }
            self.release().await
        })
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let port = self
                .port
                .clone()
                .ok_or_else(|| LinkError::Transport("serial port not open".to_string()))?;

            tokio::task::spawn_blocking(move || -> Result<()> {
                let mut port = port
                    .lock()
                    .map_err(|_| LinkError::Transport("serial port lock poisoned".to_string()))?;
                port.write_all(&data)?;
                port.flush()?;
                Ok(())
            })
            .await
            .map_err(|e| LinkError::Transport(e.to_string()))?
        })
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        // Cannot wait here; the thread exits within one read timeout
        if let Some(reader) = &self.reader {
            reader.signal();
        }
    }
}

fn serial_error(e: serialport::Error) -> LinkError {
    LinkError::Transport(e.to_string())
}

fn open_port(settings: &SerialSettings) -> Result<Box<dyn SerialPort>> {
    serialport::new(&settings.path, settings.baud_rate)
        .timeout(Duration::from_millis(settings.read_timeout_ms))
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open()
        .map_err(|e| LinkError::Transport(format!("open {}: {}", settings.path, e)))
}

fn read_loop<R: Read>(
    mut port: R,
    tx: mpsc::Sender<Bytes>,
    stop: Arc<AtomicBool>,
    chunk_size: usize,
) {
    let mut buf = vec![0u8; chunk_size];

    while !stop.load(Ordering::Acquire) {
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Serial read error: {}", e);
                break;
            }
        }
    }

    tracing::debug!("Serial reader stopped");
}
