//! Bed discovery: the advertisement filter and the discovery stream.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::BED_LOCAL_NAME;
use crate::session::BedSession;

/// Returns true if an advertised local name identifies a supported bed.
///
/// The bed advertises no usable service UUID, so the local name is the
/// only discriminator. Matching is exact; prefix or substring matching
/// would false-positive on unrelated devices.
#[must_use]
pub fn is_supported_bed(local_name: Option<&str>) -> bool {
    local_name == Some(BED_LOCAL_NAME)
}

/// Stream of beds found by the discovery scan, in discovery order.
///
/// The stream keeps producing for as long as the controller scans and
/// ends once it stops. Each discovered bed is yielded exactly once.
pub struct DeviceStream {
    receiver: mpsc::UnboundedReceiver<BedSession>,
}

impl DeviceStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<BedSession>) -> Self {
        Self { receiver }
    }

    /// Waits for the next discovered bed.
    ///
    /// Returns `None` after the controller stops scanning.
    pub async fn next(&mut self) -> Option<BedSession> {
        self.receiver.recv().await
    }

    /// Picks exactly one bed from the stream within a bounded window.
    ///
    /// With an address, the first bed whose address matches exactly is
    /// returned as soon as it appears. Without one, discoveries are
    /// collected for the whole window and exactly one candidate is
    /// required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousSelection`] when the window closes with
    /// zero candidates (or, unaddressed, with more than one), and
    /// [`Error::ChannelClosed`] if the controller stopped scanning.
    pub async fn select(
        &mut self,
        address: Option<&str>,
        window: Duration,
    ) -> Result<BedSession> {
        let deadline = tokio::time::Instant::now() + window;

        if let Some(wanted) = address {
            loop {
                match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                    Ok(Some(session)) if session.device().address == wanted => {
                        return Ok(session);
                    }
                    Ok(Some(session)) => {
                        tracing::debug!("skipping {}: address does not match", session.device());
                    }
                    Ok(None) => return Err(Error::ChannelClosed),
                    Err(_) => return Err(Error::AmbiguousSelection { count: 0 }),
                }
            }
        }

        let mut found = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                Ok(Some(session)) => found.push(session),
                Ok(None) | Err(_) => break,
            }
        }
        if found.len() == 1 {
            Ok(found.remove(0))
        } else {
            Err(Error::AmbiguousSelection { count: found.len() })
        }
    }
}

impl Stream for DeviceStream {
    type Item = BedSession;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
