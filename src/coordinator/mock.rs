//! Scriptable in-memory transport for coordinator tests.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{LinkError, Result};
use crate::transport::{BoxFuture, InboundRx, Transport};

#[derive(Default)]
struct Shared {
    writes: Vec<Bytes>,
    opens: usize,
    closes: usize,
    fail_open: bool,
    fail_close: bool,
    fail_write: bool,
    inbound: Option<mpsc::Sender<Bytes>>,
}

/// Records writes and lets tests inject inbound bytes.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        let mut shared = self.shared.lock().unwrap();
        f(&mut shared)
    }

    pub(crate) fn writes(&self) -> Vec<Bytes> {
        self.with(|s| s.writes.clone())
    }

    pub(crate) fn opens(&self) -> usize {
        self.with(|s| s.opens)
    }

    pub(crate) fn closes(&self) -> usize {
        self.with(|s| s.closes)
    }

    pub(crate) fn fail_open(&self, fail: bool) {
        self.with(|s| s.fail_open = fail);
    }

    pub(crate) fn fail_close(&self, fail: bool) {
        self.with(|s| s.fail_close = fail);
    }

    pub(crate) fn fail_write(&self, fail: bool) {
        self.with(|s| s.fail_write = fail);
    }

    /// Deliver bytes as if the controller sent them.
    pub(crate) async fn inject(&self, data: &[u8]) {
        let tx = self.with(|s| s.inbound.clone()).expect("transport not open");
        tx.send(Bytes::copy_from_slice(data)).await.expect("coordinator gone");
    }

    /// Simulate losing the link.
    pub(crate) fn drop_inbound(&self) {
        self.with(|s| s.inbound = None);
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> BoxFuture<'_, Result<InboundRx>> {
        let result = self.with(|s| {
            s.opens += 1;
            if s.fail_open {
                return Err(LinkError::Transport("open fail".to_string()));
            }
            let (tx, rx) = mpsc::channel(16);
            s.inbound = Some(tx);
            Ok(rx)
        });
        Box::pin(async move { result })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        let result = self.with(|s| {
            s.closes += 1;
            if s.fail_close {
                return Err(LinkError::Transport("close fail".to_string()));
            }
            s.inbound = None;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        let result = self.with(|s| {
            if s.fail_write {
                return Err(LinkError::Transport("write fail".to_string()));
            }
            s.writes.push(data);
            Ok(())
        });
        Box::pin(async move { result })
    }
}
