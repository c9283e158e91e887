//! btleplug-backed transport implementation.
//!
//! Binds the [`BleTransport`] seam to the cross-platform `btleplug` BLE
//! stack: adapter selection, the scan event pump, and per-peripheral
//! connect/write primitives. Peripherals seen during the scan are cached
//! by address so the rest of the library never holds a platform handle.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{BleTransport, TransportEvent};
use crate::types::BedDevice;

/// Default number of connect attempts before giving up.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Default delay between connect attempts.
pub const DEFAULT_CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default timeout for a single connect attempt.
///
/// BlueZ's Connect call can block indefinitely when the peripheral is out
/// of range; a hard timeout keeps command callers from stalling.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the btleplug transport.
#[derive(Debug, Clone)]
pub struct BtleplugConfig {
    /// Adapter to use, matched against the platform adapter info
    /// (e.g. "hci0"). The first adapter is used when unset.
    pub adapter: Option<String>,
    /// Number of connect attempts before giving up.
    pub connect_attempts: u32,
    /// Delay between connect attempts.
    pub connect_retry_delay: Duration,
    /// Timeout for a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for BtleplugConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_retry_delay: DEFAULT_CONNECT_RETRY_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl BtleplugConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the adapter to use, matched against the platform adapter info.
    #[must_use]
    pub fn adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Sets the number of connect attempts.
    #[must_use]
    pub const fn connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts;
        self
    }

    /// Sets the delay between connect attempts.
    #[must_use]
    pub const fn connect_retry_delay(mut self, delay: Duration) -> Self {
        self.connect_retry_delay = delay;
        self
    }

    /// Sets the timeout for a single connect attempt.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// BLE transport built on btleplug.
pub struct BtleplugTransport {
    config: BtleplugConfig,
    adapter: Adapter,
    peripherals: Arc<RwLock<HashMap<String, Peripheral>>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    pump_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugTransport {
    /// Creates a transport bound to a Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoAdapter`] if no adapter matches the
    /// configuration, or a [`Error::Bluetooth`] error from the stack.
    pub async fn new(config: BtleplugConfig) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;

        let adapter = if let Some(wanted) = &config.adapter {
            let mut selected = None;
            for adapter in adapters {
                let info = adapter.adapter_info().await.unwrap_or_default();
                if info.contains(wanted.as_str()) {
                    selected = Some(adapter);
                    break;
                }
            }
            selected.ok_or(Error::NoAdapter)?
        } else {
            adapters.into_iter().next().ok_or(Error::NoAdapter)?
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            adapter,
            peripherals: Arc::new(RwLock::new(HashMap::new())),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            pump_task: Mutex::new(None),
        })
    }

    /// Creates a transport with default configuration.
    pub async fn with_defaults() -> Result<Self> {
        Self::new(BtleplugConfig::default()).await
    }

    async fn peripheral(&self, address: &str) -> Result<Peripheral> {
        self.peripherals
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| Error::ConnectionFailed {
                address: address.to_owned(),
                reason: "device was not seen during the scan".into(),
            })
    }

    /// Forwards adapter events into the transport event channel.
    async fn pump_events(
        mut events: Pin<Box<dyn futures::Stream<Item = CentralEvent> + Send>>,
        adapter: Adapter,
        peripherals: Arc<RwLock<HashMap<String, Peripheral>>>,
        tx: mpsc::UnboundedSender<TransportEvent>,
    ) {
        while let Some(event) = events.next().await {
            match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                    let Ok(peripheral) = adapter.peripheral(&id).await else {
                        continue;
                    };
                    let address = peripheral.address().to_string();
                    let local_name = match peripheral.properties().await {
                        Ok(Some(props)) => props.local_name,
                        _ => None,
                    };
                    peripherals.write().await.insert(address.clone(), peripheral);
                    if tx
                        .send(TransportEvent::Discovered(BedDevice::new(
                            address, local_name,
                        )))
                        .is_err()
                    {
                        break;
                    }
                }
                CentralEvent::DeviceDisconnected(id) => {
                    let Ok(peripheral) = adapter.peripheral(&id).await else {
                        continue;
                    };
                    let address = peripheral.address().to_string();
                    if tx.send(TransportEvent::Disconnected { address }).is_err() {
                        break;
                    }
                }
                _ => {}
            }
        }

        tracing::debug!("adapter event stream ended");
    }
}

impl BleTransport for BtleplugTransport {
    fn start_scan(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            // Subscribe before the scan starts so no advertisement is lost.
            let events = self.adapter.events().await?;
            let pump = tokio::spawn(Self::pump_events(
                events,
                self.adapter.clone(),
                Arc::clone(&self.peripherals),
                self.events_tx.clone(),
            ));
            *self.pump_task.lock().await = Some(pump);

            self.adapter.start_scan(ScanFilter::default()).await?;
            tracing::info!("scanning for advertisements");
            Ok(())
        })
    }

    fn stop_scan(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.adapter.stop_scan().await?;
            if let Some(task) = self.pump_task.lock().await.take() {
                task.abort();
            }
            tracing::info!("stopped scanning");
            Ok(())
        })
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx
            .try_lock()
            .ok()
            .and_then(|mut receiver| receiver.take())
    }

    fn connect<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let peripheral = self.peripheral(address).await?;
            if peripheral.is_connected().await.unwrap_or(false) {
                return Ok(());
            }

            let mut last_error = None;
            for attempt in 1..=self.config.connect_attempts {
                tracing::debug!("connect attempt {attempt} to {address}");
                match tokio::time::timeout(self.config.connect_timeout, peripheral.connect()).await
                {
                    Ok(Ok(())) => {
                        peripheral.discover_services().await?;
                        tracing::info!("connected to {address}");
                        return Ok(());
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("connect attempt {attempt} to {address} failed: {e}");
                        last_error = Some(Error::Bluetooth(e));
                    }
                    Err(_) => {
                        tracing::warn!(
                            "connect attempt {attempt} to {address} timed out after {:?}",
                            self.config.connect_timeout
                        );
                        last_error = Some(Error::ConnectionFailed {
                            address: address.to_owned(),
                            reason: format!("timed out after {:?}", self.config.connect_timeout),
                        });
                    }
                }
                if attempt < self.config.connect_attempts {
                    tokio::time::sleep(self.config.connect_retry_delay).await;
                }
            }

            Err(last_error.unwrap_or_else(|| Error::ConnectionFailed {
                address: address.to_owned(),
                reason: "no connect attempts were made".into(),
            }))
        })
    }

    fn disconnect<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(peripheral) = self.peripherals.read().await.get(address).cloned() {
                peripheral.disconnect().await?;
                tracing::debug!("disconnected from {address}");
            }
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
            let peripheral = self.peripheral(address).await?;
            let target = peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.uuid == characteristic)
                .ok_or(Error::CharacteristicNotFound {
                    uuid: characteristic,
                })?;
            peripheral
                .write(&target, &payload, WriteType::WithResponse)
                .await?;
            Ok(())
        })
    }

    fn is_connected<'a>(
        &'a self,
        address: &'a str,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            match self.peripherals.read().await.get(address) {
                Some(peripheral) => peripheral.is_connected().await.unwrap_or(false),
                None => false,
            }
        })
    }
}
