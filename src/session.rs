//! Per-bed session: the command API and connection management.
//!
//! A [`BedSession`] is created by the controller when a bed first shows
//! up in the scan. Commands serialize on a per-session operation permit
//! and lazily establish the connection on first use; an unexpected
//! disconnect simply means the next command reconnects.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::protocol::{BedCommand, CONTROL_COMMAND_CHARACTERISTIC};
use crate::transport::BleTransport;
use crate::types::BedDevice;

pub(crate) struct SessionInner {
    pub(crate) device: BedDevice,
    pub(crate) transport: Arc<dyn BleTransport>,
    /// Shared with the controller; connecting requires an active scan.
    pub(crate) scan_active: Arc<AtomicBool>,
    pub(crate) connected: AtomicBool,
    pub(crate) expected_disconnect: AtomicBool,
    connect_lock: Mutex<()>,
    op_lock: Mutex<()>,
}

/// Handle to one discovered bed.
///
/// Cheap to clone; clones share connection state and the per-session
/// permits, so commands issued through any clone are serialized.
#[derive(Clone)]
pub struct BedSession {
    inner: Arc<SessionInner>,
}

impl BedSession {
    pub(crate) fn new(
        device: BedDevice,
        transport: Arc<dyn BleTransport>,
        scan_active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                device,
                transport,
                scan_active,
                connected: AtomicBool::new(false),
                expected_disconnect: AtomicBool::new(false),
                connect_lock: Mutex::new(()),
                op_lock: Mutex::new(()),
            }),
        }
    }

    /// The immutable identity of this bed.
    #[must_use]
    pub fn device(&self) -> &BedDevice {
        &self.inner.device
    }

    /// Returns true while the transport reports the bed connected.
    pub async fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
            && self
                .inner
                .transport
                .is_connected(&self.inner.device.address)
                .await
    }

    /// Raise the head a notch.
    pub async fn raise_head(&self) -> Result<()> {
        self.execute(BedCommand::HeadUp).await
    }

    /// Lower the head a notch.
    pub async fn lower_head(&self) -> Result<()> {
        self.execute(BedCommand::HeadDown).await
    }

    /// Raise the feet a notch.
    pub async fn raise_feet(&self) -> Result<()> {
        self.execute(BedCommand::FeetUp).await
    }

    /// Lower the feet a notch.
    pub async fn lower_feet(&self) -> Result<()> {
        self.execute(BedCommand::FeetDown).await
    }

    /// Raise head and feet together.
    pub async fn raise_head_and_feet(&self) -> Result<()> {
        self.execute(BedCommand::HeadAndFeetUp).await
    }

    /// Lower head and feet together.
    pub async fn lower_head_and_feet(&self) -> Result<()> {
        self.execute(BedCommand::HeadAndFeetDown).await
    }

    /// Return the bed to flat.
    pub async fn flat(&self) -> Result<()> {
        self.execute(BedCommand::Flat).await
    }

    /// Move to the lounge preset.
    pub async fn lounge(&self) -> Result<()> {
        self.execute(BedCommand::Lounge).await
    }

    /// Move to the zero-gravity preset.
    pub async fn zero_gravity(&self) -> Result<()> {
        self.execute(BedCommand::ZeroGravity).await
    }

    /// Run the head vibration motor.
    pub async fn vibrate_head(&self) -> Result<()> {
        self.execute(BedCommand::VibrateHead).await
    }

    /// Run the feet vibration motor.
    pub async fn vibrate_feet(&self) -> Result<()> {
        self.execute(BedCommand::VibrateFeet).await
    }

    /// Toggle the under-bed light.
    pub async fn toggle_light(&self) -> Result<()> {
        self.execute(BedCommand::Light).await
    }

    /// Executes one command from the table.
    ///
    /// At most one write is in flight per session; a second command
    /// issued while one is outstanding queues behind it. Each successful
    /// write moves the actuators one notch, so repeated calls accumulate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] when the write fails; the write
    /// is not retried here.
    pub async fn execute(&self, command: BedCommand) -> Result<()> {
        if self.inner.op_lock.try_lock().is_err() {
            tracing::debug!(
                "operation already in progress on {}, waiting",
                self.inner.device
            );
        }
        let _op = self.inner.op_lock.lock().await;

        self.ensure_connected().await?;

        let opcode = command.opcode();
        let payload = Bytes::copy_from_slice(&opcode);
        match self
            .inner
            .transport
            .write(
                &self.inner.device.address,
                CONTROL_COMMAND_CHARACTERISTIC,
                payload,
            )
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    "wrote {} ({}) to {}",
                    hex::encode(opcode),
                    command.name(),
                    self.inner.device
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("failed to write {} to {}: {e}", command.name(), self.inner.device);
                Err(Error::CommandFailed {
                    command: command.name().to_owned(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Ensures a live connection, connecting at most once at a time.
    ///
    /// A caller arriving while a connect is in flight waits for it and
    /// re-checks the connection state instead of starting its own
    /// attempt. Retry and timeout policy belong to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanInactive`] when the discovery scan is
    /// stopped, or [`Error::ConnectionFailed`] when the transport gives
    /// up.
    pub async fn ensure_connected(&self) -> Result<()> {
        if self.is_connected().await {
            return Ok(());
        }

        if self.inner.connect_lock.try_lock().is_err() {
            tracing::debug!(
                "connection to {} already in progress, waiting",
                self.inner.device
            );
        }
        let _guard = self.inner.connect_lock.lock().await;

        if self.is_connected().await {
            return Ok(());
        }

        // Some stacks cannot open a connection while passive scanning is
        // stopped; an active scan is a connect precondition.
        if !self.inner.scan_active.load(Ordering::SeqCst) {
            return Err(Error::ScanInactive);
        }

        tracing::debug!("connecting to {}", self.inner.device);
        match self
            .inner
            .transport
            .connect(&self.inner.device.address)
            .await
        {
            Ok(()) => {
                self.inner.connected.store(true, Ordering::SeqCst);
                self.inner.expected_disconnect.store(false, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                tracing::error!("failed to connect to {}: {e}", self.inner.device);
                Err(match e {
                    Error::ConnectionFailed { .. } => e,
                    other => Error::ConnectionFailed {
                        address: self.inner.device.address.clone(),
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Requests a disconnect.
    ///
    /// The transport's subsequent disconnect report is then treated as
    /// expected. The session stays usable; the next command reconnects.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner
            .expected_disconnect
            .store(true, Ordering::SeqCst);
        self.inner
            .transport
            .disconnect(&self.inner.device.address)
            .await?;
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Classifies a transport disconnect report for this session.
    pub(crate) fn handle_disconnect(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        if self.inner.expected_disconnect.load(Ordering::SeqCst) {
            tracing::debug!("disconnected from {} as requested", self.inner.device);
        } else {
            tracing::warn!("unexpectedly disconnected from {}", self.inner.device);
        }
    }
}

impl fmt::Debug for BedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BedSession")
            .field("device", &self.inner.device)
            .finish_non_exhaustive()
    }
}
