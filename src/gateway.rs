//! The vendor-agnostic gateway facade.
//!
//! [`GatewayClient`] runs the same fetch cycle for every vendor:
//!
//! 1. resolve the meter identity, discovering it on first use,
//! 2. fetch device metadata,
//! 3. fetch the raw entries for the identity,
//! 4. assemble them into readings.
//!
//! What differs per vendor lives behind [`Backend`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::assembler::{assemble, capture_entry, CaptureRules};
use crate::discovery::{select_identity, Candidate};
use crate::error::GatewayError;
use crate::reading::{Information, MeterIdentity, RawEntry};
use crate::transport::{HttpTransport, Transport};

/// Operations every gateway supports.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Fetches device metadata and all current readings, discovering the meter
    /// identity first if none is set.
    async fn get_readings(&self, cancel: &CancellationToken) -> Result<Information, GatewayError>;

    /// Runs discovery unconditionally and stores the result.
    async fn discover_identity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MeterIdentity, GatewayError>;
}

/// Gateways whose target meter can be inspected and replaced.
#[async_trait]
pub trait MeterIdentityProvider: Gateway {
    /// An empty identity resets the gateway to discover again on the next fetch.
    async fn set_identity(&self, identity: MeterIdentity);

    /// Convenience accessor: returns the current identity, discovering it if needed.
    ///
    /// Discovery errors are swallowed and an empty identity is returned instead. Use
    /// [`Gateway::discover_identity`] when the failure matters.
    async fn current_identity(&self) -> MeterIdentity;
}

/// Gateways reachable through tunnels that need a fixed Host header.
pub trait HostConfigurer {
    fn set_host_header(&self, host: &str);
}

/// Static or fetched device metadata. Empty strings mean the device does not say.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub manufacturer: String,
    pub firmware_version: String,
}

/// Vendor-specific half of a gateway: endpoints, payload shapes and capture rules.
#[async_trait]
pub trait Backend: Send + Sync {
    type Candidate: Candidate + Send + Sync;

    /// Candidates in listing order. A backend may stop after the first preferred one.
    async fn list_candidates(
        &self,
        transport: &dyn Transport,
    ) -> Result<Vec<Self::Candidate>, GatewayError>;

    async fn device_info(&self, transport: &dyn Transport) -> Result<DeviceInfo, GatewayError>;

    async fn fetch_entries(
        &self,
        transport: &dyn Transport,
        identity: &MeterIdentity,
    ) -> Result<Vec<RawEntry>, GatewayError>;

    fn capture_rules(&self) -> CaptureRules;
}

const DEFAULT_ACCESSOR_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GatewayClient<B, T = HttpTransport> {
    backend: B,
    transport: T,
    // Held across discovery so concurrent callers cannot race the unset -> set transition
    identity: Mutex<Option<MeterIdentity>>,
    accessor_timeout: Duration,
}

impl<B: Backend, T: Transport> GatewayClient<B, T> {
    pub fn new(backend: B, transport: T) -> Self {
        Self {
            backend,
            transport,
            identity: Mutex::new(None),
            accessor_timeout: DEFAULT_ACCESSOR_TIMEOUT,
        }
    }

    /// Starts with a known identity instead of discovering one.
    pub fn with_identity(mut self, identity: Option<MeterIdentity>) -> Self {
        self.identity = Mutex::new(identity.filter(|id| !id.is_empty()));
        self
    }

    /// Bounds the discovery run by [`MeterIdentityProvider::current_identity`].
    pub fn with_accessor_timeout(mut self, timeout: Duration) -> Self {
        self.accessor_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn discover(&self, cancel: &CancellationToken) -> Result<MeterIdentity, GatewayError> {
        let candidates = cancellable(cancel, self.backend.list_candidates(&self.transport)).await?;
        tracing::debug!("Discovery found {} candidates", candidates.len());
        Ok(select_identity(&candidates)?)
    }

    /// Waits for the identity slot unless `cancel` fires first.
    async fn lock_identity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, Option<MeterIdentity>>, GatewayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            slot = self.identity.lock() => Ok(slot),
        }
    }

    async fn ensure_identity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MeterIdentity, GatewayError> {
        let mut slot = self.lock_identity(cancel).await?;
        if let Some(identity) = slot.as_ref() {
            return Ok(identity.clone());
        }

        let identity = self
            .discover(cancel)
            .await
            .map_err(GatewayError::discovery_failed)?;
        *slot = Some(identity.clone());
        Ok(identity)
    }
}

/// Runs `operation` unless `cancel` fires first; the in-flight request is dropped then.
async fn cancellable<F, R>(cancel: &CancellationToken, operation: F) -> Result<R, GatewayError>
where
    F: Future<Output = Result<R, GatewayError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        result = operation => result,
    }
}

#[async_trait]
impl<B: Backend, T: Transport> Gateway for GatewayClient<B, T> {
    async fn get_readings(&self, cancel: &CancellationToken) -> Result<Information, GatewayError> {
        let identity = self.ensure_identity(cancel).await?;

        let device = cancellable(cancel, self.backend.device_info(&self.transport)).await?;
        let entries = cancellable(
            cancel,
            self.backend.fetch_entries(&self.transport, &identity),
        )
        .await?;

        let now = Utc::now();
        let rules = self.backend.capture_rules();
        let readings = assemble(&entries, |entry| capture_entry(entry, &rules, now));
        tracing::debug!(
            "Assembled {} readings from {} entries for {identity}",
            readings.len(),
            entries.len()
        );

        if readings.is_empty() {
            return Err(GatewayError::NoReadingsFound);
        }

        Ok(Information {
            name: identity.to_string(),
            model: device.model,
            manufacturer: device.manufacturer,
            firmware_version: device.firmware_version,
            last_update: now,
            readings,
        })
    }

    async fn discover_identity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MeterIdentity, GatewayError> {
        let mut slot = self.lock_identity(cancel).await?;
        let identity = self.discover(cancel).await?;
        *slot = Some(identity.clone());
        Ok(identity)
    }
}

#[async_trait]
impl<B: Backend, T: Transport> MeterIdentityProvider for GatewayClient<B, T> {
    async fn set_identity(&self, identity: MeterIdentity) {
        *self.identity.lock().await = Some(identity).filter(|id| !id.is_empty());
    }

    async fn current_identity(&self) -> MeterIdentity {
        let cancel = CancellationToken::new();
        match tokio::time::timeout(self.accessor_timeout, self.ensure_identity(&cancel)).await {
            Ok(Ok(identity)) => identity,
            Ok(Err(e)) => {
                tracing::debug!("Meter identity unavailable: {e}");
                MeterIdentity::default()
            }
            Err(_) => {
                tracing::debug!(
                    "Meter identity discovery timed out after {:?}",
                    self.accessor_timeout
                );
                MeterIdentity::default()
            }
        }
    }
}
