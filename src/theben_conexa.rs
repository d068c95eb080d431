//! Theben Conexa gateways: JSON-RPC style POSTs to the base URI.
//!
//! Instantaneous values arrive pre-scaled by 10^4, energy in Wh. Codes are hex device
//! codes (`0100010800ff`) looked up in a fixed table.

use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};

use crate::assembler::{CaptureRules, TimestampFormat};
use crate::code_converter::CodeFormat;
use crate::discovery::Candidate;
use crate::error::{GatewayError, Step, TransportError};
use crate::gateway::{Backend, DeviceInfo, GatewayClient};
use crate::normalizer::Scale;
use crate::reading::{MeterIdentity, RawEntry};
use crate::transport::{decode_json, HttpTransport, Transport};
use crate::unit_resolver::UnitStrategy;

pub type ConexaGateway = GatewayClient<ThebenConexa, HttpTransport>;

const RPC_ENDPOINT: &str = "";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    #[serde(rename = "usage-point-id", skip_serializing_if = "Option::is_none")]
    usage_point_id: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct UserInfoResponse {
    #[serde(rename = "user-info", default)]
    user_info: UserInfo,
}

#[derive(Debug, Default, Deserialize)]
struct UserInfo {
    #[serde(rename = "usage-points", default)]
    usage_points: Vec<UsagePoint>,
}

/// A metering point the logged-in user may read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UsagePoint {
    pub id: String,
    #[serde(rename = "taf-state", default)]
    pub taf_state: String,
    #[serde(rename = "taf-number", default)]
    pub taf_number: String,
}

impl Candidate for UsagePoint {
    /// A running TAF-7 (consumption-dependent tariff) carries the live values.
    fn is_preferred(&self) -> bool {
        self.taf_state == "running" && self.taf_number == "7"
    }

    fn identity(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReadingsResponse {
    #[serde(default)]
    readings: Readings,
}

#[derive(Debug, Default, Deserialize)]
struct Readings {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Default, Deserialize)]
struct Channel {
    #[serde(default)]
    readings: Vec<ChannelReading>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelReading {
    obis: String,
    value: String,
    #[serde(rename = "capture-time", default)]
    capture_time: String,
}

#[derive(Debug, Default, Deserialize)]
struct SmgwInfoResponse {
    #[serde(rename = "smgw-info", default)]
    smgw_info: SmgwInfo,
}

#[derive(Debug, Default, Deserialize)]
struct SmgwInfo {
    #[serde(rename = "firmware-version", default)]
    firmware_version: String,
    #[serde(default)]
    manufacturer: String,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThebenConexa;

impl ThebenConexa {
    async fn call<T: serde::de::DeserializeOwned>(
        transport: &dyn Transport,
        request: RpcRequest<'_>,
    ) -> Result<T, TransportError> {
        let body = serde_json::to_value(&request)?;
        let bytes = transport.fetch_json(RPC_ENDPOINT, Some(&body)).await?;
        decode_json(&bytes)
    }
}

#[async_trait]
impl Backend for ThebenConexa {
    type Candidate = UsagePoint;

    async fn list_candidates(
        &self,
        transport: &dyn Transport,
    ) -> Result<Vec<UsagePoint>, GatewayError> {
        let request = RpcRequest {
            method: "user-info",
            usage_point_id: None,
        };
        let response: UserInfoResponse = Self::call(transport, request)
            .await
            .map_err(GatewayError::transport(Step::ListCandidates))?;
        Ok(response.user_info.usage_points)
    }

    async fn device_info(&self, transport: &dyn Transport) -> Result<DeviceInfo, GatewayError> {
        let request = RpcRequest {
            method: "smgw-info",
            usage_point_id: None,
        };
        let response: SmgwInfoResponse = Self::call(transport, request)
            .await
            .map_err(GatewayError::transport(Step::DeviceInfo))?;
        let info = response.smgw_info;
        Ok(DeviceInfo {
            model: info.model,
            manufacturer: info.manufacturer,
            firmware_version: info.firmware_version,
        })
    }

    async fn fetch_entries(
        &self,
        transport: &dyn Transport,
        identity: &MeterIdentity,
    ) -> Result<Vec<RawEntry>, GatewayError> {
        let request = RpcRequest {
            method: "readings",
            usage_point_id: Some(identity.as_str()),
        };
        let response: ReadingsResponse = Self::call(transport, request)
            .await
            .map_err(GatewayError::transport(Step::Readings))?;

        Ok(response
            .readings
            .channels
            .into_iter()
            .flat_map(|channel| channel.readings)
            .map(|reading| RawEntry {
                raw_code: reading.obis,
                raw_value: reading.value,
                raw_timestamp: Some(reading.capture_time).filter(|t| !t.is_empty()),
                ..Default::default()
            })
            .collect())
    }

    fn capture_rules(&self) -> CaptureRules {
        CaptureRules {
            code_format: CodeFormat::DeviceTable,
            unit_strategy: UnitStrategy::CodePattern,
            scale: Scale::CONEXA,
            timestamp_format: TimestampFormat::Rfc3339,
        }
    }
}
