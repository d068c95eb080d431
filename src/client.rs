//! Builds the right gateway client for a [`GatewayConfig`].

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{GatewayConfig, Vendor};
use crate::discover::{discover_gateway_uri, DISCOVERY_TIMEOUT};
use crate::emh_casa::{CasaGateway, EmhCasa};
use crate::error::GatewayError;
use crate::gateway::{Gateway, GatewayClient, HostConfigurer, MeterIdentityProvider};
use crate::ppc::{Ppc, PpcGateway};
use crate::reading::{Information, MeterIdentity};
use crate::theben_conexa::{ConexaGateway, ThebenConexa};
use crate::transport::HttpTransport;

pub enum AnyGateway {
    EmhCasa(CasaGateway),
    ThebenConexa(ConexaGateway),
    Ppc(PpcGateway),
}

impl AnyGateway {
    /// Creates the client. A CASA config without a base URI looks for the gateway on
    /// the local network first.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut transport_config = config.transport.clone();
        if transport_config.username.is_empty() || transport_config.password.is_empty() {
            return Err(GatewayError::Config("credentials are required".to_string()));
        }
        if transport_config.base_uri.is_empty() {
            if config.vendor != Vendor::EmhCasa {
                return Err(GatewayError::Config("base URL is required".to_string()));
            }
            transport_config.base_uri = discover_gateway_uri(DISCOVERY_TIMEOUT).await?;
        }

        let transport = HttpTransport::new(transport_config)
            .map_err(|e| GatewayError::Config(format!("cannot build HTTP client: {e}")))?;
        let meter_id = config.meter_id.clone();
        let accessor_timeout = config.transport.timeout;

        tracing::info!("Connecting to {} gateway at {}", config.vendor, transport.base_uri());
        Ok(match config.vendor {
            Vendor::EmhCasa => AnyGateway::EmhCasa(
                GatewayClient::new(EmhCasa, transport)
                    .with_identity(meter_id)
                    .with_accessor_timeout(accessor_timeout),
            ),
            Vendor::ThebenConexa => AnyGateway::ThebenConexa(
                GatewayClient::new(ThebenConexa, transport)
                    .with_identity(meter_id)
                    .with_accessor_timeout(accessor_timeout),
            ),
            Vendor::Ppc => AnyGateway::Ppc(
                GatewayClient::new(Ppc, transport)
                    .with_identity(meter_id)
                    .with_accessor_timeout(accessor_timeout),
            ),
        })
    }

    pub fn vendor(&self) -> Vendor {
        match self {
            AnyGateway::EmhCasa(_) => Vendor::EmhCasa,
            AnyGateway::ThebenConexa(_) => Vendor::ThebenConexa,
            AnyGateway::Ppc(_) => Vendor::Ppc,
        }
    }

    /// Only CASA gateways support a Host header override.
    pub fn host_configurer(&self) -> Option<&dyn HostConfigurer> {
        match self {
            AnyGateway::EmhCasa(gateway) => Some(gateway),
            _ => None,
        }
    }

    fn as_provider(&self) -> &dyn MeterIdentityProvider {
        match self {
            AnyGateway::EmhCasa(gateway) => gateway,
            AnyGateway::ThebenConexa(gateway) => gateway,
            AnyGateway::Ppc(gateway) => gateway,
        }
    }
}

#[async_trait]
impl Gateway for AnyGateway {
    async fn get_readings(&self, cancel: &CancellationToken) -> Result<Information, GatewayError> {
        self.as_provider().get_readings(cancel).await
    }

    async fn discover_identity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MeterIdentity, GatewayError> {
        self.as_provider().discover_identity(cancel).await
    }
}

#[async_trait]
impl MeterIdentityProvider for AnyGateway {
    async fn set_identity(&self, identity: MeterIdentity) {
        self.as_provider().set_identity(identity).await
    }

    async fn current_identity(&self) -> MeterIdentity {
        self.as_provider().current_identity().await
    }
}
