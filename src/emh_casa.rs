//! EMH CASA 1.1 gateways: JSON over GET, values identified by hex logical names.
//!
//! Endpoints:
//! - `/json/metering/derived` lists contract ids
//! - `/json/metering/derived/<id>` describes one contract and its sensor domains
//! - `/json/metering/origin/<sensor domain>/extended` returns the current values

use async_trait::async_trait;
use serde_derive::Deserialize;

use crate::assembler::{CaptureRules, TimestampFormat};
use crate::code_converter::CodeFormat;
use crate::discovery::Candidate;
use crate::error::{GatewayError, Step};
use crate::gateway::{Backend, DeviceInfo, GatewayClient, HostConfigurer};
use crate::normalizer::Scale;
use crate::reading::{MeterIdentity, RawEntry};
use crate::transport::{decode_json, HttpTransport, Transport};
use crate::unit_resolver::UnitStrategy;

pub const MODEL: &str = "EMH CASA 1.1";
pub const MANUFACTURER: &str = "EMH";

pub type CasaGateway = GatewayClient<EmhCasa, HttpTransport>;

/// A metering contract (TAF) configured on the gateway.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DerivedContract {
    #[serde(default)]
    pub taf_type: String,
    #[serde(default)]
    pub sensor_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractCandidate {
    pub contract_id: String,
    pub contract: DerivedContract,
}

impl Candidate for ContractCandidate {
    fn is_preferred(&self) -> bool {
        !self.contract.sensor_domains.is_empty()
    }

    fn identity(&self) -> &str {
        self.contract
            .sensor_domains
            .first()
            .unwrap_or(&self.contract_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeterValue {
    pub value: String,
    /// DLMS unit tag: 27 = W, 30 = Wh, 33 = A, 35 = V, 44 = Hz
    #[serde(default)]
    pub unit: i64,
    /// Power-of-ten exponent
    #[serde(default)]
    pub scaler: i32,
    pub logical_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeterReading {
    #[serde(default)]
    pub values: Vec<MeterValue>,
}

impl From<MeterValue> for RawEntry {
    fn from(value: MeterValue) -> Self {
        RawEntry {
            raw_code: value.logical_name,
            raw_value: value.value,
            raw_unit_tag: Some(value.unit),
            raw_scale: Some(value.scaler),
            raw_timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmhCasa;

#[async_trait]
impl Backend for EmhCasa {
    type Candidate = ContractCandidate;

    /// Fetches contract details in listing order and stops at the first contract
    /// with a sensor domain.
    async fn list_candidates(
        &self,
        transport: &dyn Transport,
    ) -> Result<Vec<ContractCandidate>, GatewayError> {
        let bytes = transport
            .fetch_json("/json/metering/derived", None)
            .await
            .map_err(GatewayError::transport(Step::ListCandidates))?;
        let contract_ids: Vec<String> =
            decode_json(&bytes).map_err(GatewayError::transport(Step::ListCandidates))?;

        let mut candidates = Vec::with_capacity(contract_ids.len());
        for contract_id in contract_ids {
            let step = Step::CandidateDetails(contract_id.clone());
            let bytes = transport
                .fetch_json(&format!("/json/metering/derived/{contract_id}"), None)
                .await
                .map_err(GatewayError::transport(step.clone()))?;
            let contract: DerivedContract =
                decode_json(&bytes).map_err(GatewayError::transport(step))?;
            tracing::debug!(
                "Contract {contract_id} ({}) has {} sensor domains",
                contract.taf_type,
                contract.sensor_domains.len()
            );
            let candidate = ContractCandidate {
                contract_id,
                contract,
            };
            let preferred = candidate.is_preferred();
            candidates.push(candidate);
            if preferred {
                // Later contracts cannot win the selection anymore
                break;
            }
        }
        Ok(candidates)
    }

    async fn device_info(&self, _transport: &dyn Transport) -> Result<DeviceInfo, GatewayError> {
        // The CASA API does not expose a firmware version
        Ok(DeviceInfo {
            model: MODEL.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            firmware_version: String::new(),
        })
    }

    async fn fetch_entries(
        &self,
        transport: &dyn Transport,
        identity: &MeterIdentity,
    ) -> Result<Vec<RawEntry>, GatewayError> {
        let bytes = transport
            .fetch_json(&format!("/json/metering/origin/{identity}/extended"), None)
            .await
            .map_err(GatewayError::transport(Step::Readings))?;
        let reading: MeterReading =
            decode_json(&bytes).map_err(GatewayError::transport(Step::Readings))?;
        Ok(reading.values.into_iter().map(RawEntry::from).collect())
    }

    fn capture_rules(&self) -> CaptureRules {
        CaptureRules {
            code_format: CodeFormat::LogicalName,
            unit_strategy: UnitStrategy::Tag,
            scale: Scale::Exponent(0),
            timestamp_format: TimestampFormat::None,
        }
    }
}

impl HostConfigurer for CasaGateway {
    fn set_host_header(&self, host: &str) {
        self.transport().set_host_header(host);
    }
}
