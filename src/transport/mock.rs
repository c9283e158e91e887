//! Instrumented transport stub for tests.
//!
//! Records the order of every connect and write it receives so tests can
//! assert serialization and duplicate-connect properties, and lets tests
//! inject transport events and failures.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{BleTransport, TransportEvent};

pub(crate) struct MockTransport {
    ops: Mutex<Vec<String>>,
    connected: Mutex<HashSet<String>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    fail_connects: AtomicBool,
    fail_writes: AtomicBool,
    connect_delay: Duration,
    write_delay: Duration,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            ops: Mutex::new(Vec::new()),
            connected: Mutex::new(HashSet::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            fail_connects: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            connect_delay: Duration::from_millis(50),
            write_delay: Duration::from_millis(10),
        })
    }

    /// The ordered log of operations seen so far.
    pub(crate) fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| op.starts_with("connect "))
            .count()
    }

    pub(crate) fn set_fail_connects(&self, fail: bool) {
        self.fail_connects.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Injects an advertisement event.
    pub(crate) fn advertise(&self, device: crate::types::BedDevice) {
        self.events_tx
            .send(TransportEvent::Discovered(device))
            .unwrap();
    }

    /// Drops an established link and reports the disconnect, as the
    /// platform stack would for an out-of-range or powered-off bed.
    pub(crate) fn drop_link(&self, address: &str) {
        self.connected.lock().unwrap().remove(address);
        self.events_tx
            .send(TransportEvent::Disconnected {
                address: address.to_owned(),
            })
            .unwrap();
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

impl BleTransport for MockTransport {
    fn start_scan(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.record("start-scan".into());
            Ok(())
        })
    }

    fn stop_scan(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.record("stop-scan".into());
            Ok(())
        })
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    fn connect<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.record(format!("connect {address}"));
            tokio::time::sleep(self.connect_delay).await;
            if self.fail_connects.load(Ordering::SeqCst) {
                return Err(Error::ConnectionFailed {
                    address: address.to_owned(),
                    reason: "mock refused connect".into(),
                });
            }
            self.connected.lock().unwrap().insert(address.to_owned());
            Ok(())
        })
    }

    fn disconnect<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.record(format!("disconnect {address}"));
            self.connected.lock().unwrap().remove(address);
            Ok(())
        })
    }

    fn write<'a>(
        &'a self,
        address: &'a str,
        characteristic: Uuid,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let encoded = hex::encode(&payload);
            self.record(format!("write-start {encoded} {characteristic}"));
            tokio::time::sleep(self.write_delay).await;
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::ConnectionFailed {
                    address: address.to_owned(),
                    reason: "mock refused write".into(),
                });
            }
            if !self.connected.lock().unwrap().contains(address) {
                return Err(Error::ConnectionFailed {
                    address: address.to_owned(),
                    reason: "mock write while not connected".into(),
                });
            }
            self.record(format!("write-end {encoded}"));
            Ok(())
        })
    }

    fn is_connected<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        let connected = self.connected.lock().unwrap().contains(address);
        Box::pin(async move { connected })
    }
}
