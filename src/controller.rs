//! Process-wide controller: scan lifecycle, discovery publishing, and
//! the session registry.
//!
//! The controller owns a background task that consumes transport events.
//! Advertisement handling is dispatched onto a task set so the event feed
//! is never blocked; disconnect reports are routed to the owning session
//! through a registry keyed by address, which keeps sessions free of
//! back-pointers into the controller.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use crate::discovery::{DeviceStream, is_supported_bed};
use crate::error::{Error, Result};
use crate::session::BedSession;
use crate::transport::{BleTransport, TransportEvent};
use crate::types::BedDevice;

type SessionRegistry = Arc<RwLock<HashMap<String, BedSession>>>;

/// Owns the discovery scan and hands out bed sessions.
pub struct BedController {
    transport: Arc<dyn BleTransport>,
    registry: SessionRegistry,
    scan_active: Arc<AtomicBool>,
    devices: Option<DeviceStream>,
    event_task: Option<JoinHandle<()>>,
}

impl BedController {
    /// Creates a controller over the given transport.
    ///
    /// Nothing happens until [`start`](Self::start) is called.
    #[must_use]
    pub fn new(transport: Arc<dyn BleTransport>) -> Self {
        Self {
            transport,
            registry: Arc::new(RwLock::new(HashMap::new())),
            scan_active: Arc::new(AtomicBool::new(false)),
            devices: None,
            event_task: None,
        }
    }

    /// Starts scanning and discovery publishing.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot start scanning or its
    /// event feed was already consumed.
    pub async fn start(&mut self) -> Result<()> {
        let events = self.transport.take_events().ok_or(Error::ChannelClosed)?;
        self.transport.start_scan().await?;
        self.scan_active.store(true, Ordering::SeqCst);

        let (discovered_tx, discovered_rx) = mpsc::unbounded_channel();
        self.devices = Some(DeviceStream::new(discovered_rx));
        self.event_task = Some(tokio::spawn(run_event_loop(
            events,
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            Arc::clone(&self.scan_active),
            discovered_tx,
        )));
        Ok(())
    }

    /// Takes the discovery stream.
    ///
    /// The stream can only be taken once.
    pub fn devices(&mut self) -> Option<DeviceStream> {
        self.devices.take()
    }

    /// Returns true while the discovery scan is active.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.scan_active.load(Ordering::SeqCst)
    }

    /// Stops scanning and discovery publishing.
    ///
    /// Safe to call even if no bed was ever discovered or connected.
    pub async fn stop(&mut self) -> Result<()> {
        self.scan_active.store(false, Ordering::SeqCst);
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        self.transport.stop_scan().await?;
        Ok(())
    }
}

impl Drop for BedController {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        // Best-effort scan stop when dropped without an explicit stop().
        if !self.scan_active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let transport = Arc::clone(&self.transport);
            handle.spawn(async move {
                let _ = transport.stop_scan().await;
            });
        }
    }
}

/// Consumes transport events until the controller stops.
async fn run_event_loop(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    transport: Arc<dyn BleTransport>,
    registry: SessionRegistry,
    scan_active: Arc<AtomicBool>,
    discovered_tx: mpsc::UnboundedSender<BedSession>,
) {
    let mut handlers: JoinSet<()> = JoinSet::new();

    while let Some(event) = events.recv().await {
        // Reap handlers that have finished since the last event.
        while handlers.try_join_next().is_some() {}

        match event {
            TransportEvent::Discovered(device) => {
                handlers.spawn(handle_advertisement(
                    device,
                    Arc::clone(&transport),
                    Arc::clone(&registry),
                    Arc::clone(&scan_active),
                    discovered_tx.clone(),
                ));
            }
            TransportEvent::Disconnected { address } => {
                if let Some(session) = registry.read().await.get(&address) {
                    session.handle_disconnect();
                } else {
                    tracing::debug!("disconnect report for unknown device {address}");
                }
            }
        }
    }

    tracing::debug!("transport event stream ended");
}

/// Filters one advertisement and publishes a session on first match.
async fn handle_advertisement(
    device: BedDevice,
    transport: Arc<dyn BleTransport>,
    registry: SessionRegistry,
    scan_active: Arc<AtomicBool>,
    discovered_tx: mpsc::UnboundedSender<BedSession>,
) {
    if !is_supported_bed(device.local_name.as_deref()) {
        return;
    }

    let mut registry = registry.write().await;
    if registry.contains_key(&device.address) {
        return;
    }

    tracing::info!("discovered bed {device}");
    let session = BedSession::new(device.clone(), transport, scan_active);
    registry.insert(device.address, session.clone());
    let _ = discovered_tx.send(session);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::protocol::BED_LOCAL_NAME;
    use crate::transport::mock::MockTransport;

    const BED_A: &str = "AA:BB:CC:DD:EE:FF";
    const BED_B: &str = "11:22:33:44:55:66";

    fn bed(address: &str) -> BedDevice {
        BedDevice::new(address, Some(BED_LOCAL_NAME.into()))
    }

    async fn settle() {
        // Let the event loop and its handlers run.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_filters_and_preserves_order() {
        let transport = MockTransport::new();
        let mut controller = BedController::new(Arc::clone(&transport) as Arc<dyn BleTransport>);
        controller.start().await.unwrap();
        let mut devices = controller.devices().unwrap();

        transport.advertise(bed(BED_A));
        transport.advertise(BedDevice::new("77:88:99:AA:BB:CC", Some("NotABed".into())));
        transport.advertise(bed(BED_B));
        settle().await;

        assert_eq!(devices.next().await.unwrap().device().address, BED_A);
        assert_eq!(devices.next().await.unwrap().device().address, BED_B);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_advertisements_publish_once() {
        let transport = MockTransport::new();
        let mut controller = BedController::new(Arc::clone(&transport) as Arc<dyn BleTransport>);
        controller.start().await.unwrap();
        let mut devices = controller.devices().unwrap();

        transport.advertise(bed(BED_A));
        transport.advertise(bed(BED_A));
        transport.advertise(bed(BED_B));
        settle().await;

        assert_eq!(devices.next().await.unwrap().device().address, BED_A);
        assert_eq!(devices.next().await.unwrap().device().address, BED_B);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_by_address_yields_only_match() {
        let transport = MockTransport::new();
        let mut controller = BedController::new(Arc::clone(&transport) as Arc<dyn BleTransport>);
        controller.start().await.unwrap();
        let mut devices = controller.devices().unwrap();

        transport.advertise(bed(BED_A));
        transport.advertise(bed(BED_B));
        settle().await;

        let selected = devices
            .select(Some(BED_A), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(selected.device().address, BED_A);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_unaddressed_requires_exactly_one() {
        let transport = MockTransport::new();
        let mut controller = BedController::new(Arc::clone(&transport) as Arc<dyn BleTransport>);
        controller.start().await.unwrap();
        let mut devices = controller.devices().unwrap();

        transport.advertise(bed(BED_A));
        transport.advertise(bed(BED_B));
        settle().await;

        let err = devices
            .select(None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousSelection { count: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_with_no_discoveries_fails() {
        let transport = MockTransport::new();
        let mut controller = BedController::new(Arc::clone(&transport) as Arc<dyn BleTransport>);
        controller.start().await.unwrap();
        let mut devices = controller.devices().unwrap();

        let err = devices
            .select(None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousSelection { count: 0 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_disconnect_is_absorbed() {
        let transport = MockTransport::new();
        let mut controller = BedController::new(Arc::clone(&transport) as Arc<dyn BleTransport>);
        controller.start().await.unwrap();
        let mut devices = controller.devices().unwrap();

        transport.advertise(bed(BED_A));
        settle().await;
        let session = devices.next().await.unwrap();

        session.raise_head().await.unwrap();
        transport.drop_link(BED_A);
        settle().await;

        // No caller saw an error; the next command reconnects.
        session.raise_head().await.unwrap();
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_safe_without_connections() {
        let transport = MockTransport::new();
        let mut controller = BedController::new(Arc::clone(&transport) as Arc<dyn BleTransport>);
        controller.start().await.unwrap();
        controller.stop().await.unwrap();

        assert!(!controller.is_scanning());
        assert!(transport.ops().contains(&"stop-scan".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_refused_after_stop() {
        let transport = MockTransport::new();
        let mut controller = BedController::new(Arc::clone(&transport) as Arc<dyn BleTransport>);
        controller.start().await.unwrap();
        let mut devices = controller.devices().unwrap();

        transport.advertise(bed(BED_A));
        settle().await;
        let session = devices.next().await.unwrap();

        controller.stop().await.unwrap();

        let err = session.raise_head().await.unwrap_err();
        assert!(matches!(err, Error::ScanInactive));
    }
}
