//! PPC gateways: HTML forms POSTed to the base URI.
//!
//! `action=meterform` lists the meters, `action=showMeterProfile` renders the values of
//! one meter as a table. Values are already in display units.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::assembler::{CaptureRules, TimestampFormat};
use crate::code_converter::CodeFormat;
use crate::discovery::Candidate;
use crate::error::{GatewayError, Step, TransportError};
use crate::gateway::{Backend, DeviceInfo, GatewayClient};
use crate::normalizer::Scale;
use crate::reading::{MeterIdentity, RawEntry};
use crate::transport::{HttpTransport, Transport};
use crate::unit_resolver::UnitStrategy;

pub const MODEL: &str = "PPC SMGW";
pub const MANUFACTURER: &str = "PPC";

pub type PpcGateway = GatewayClient<Ppc, HttpTransport>;

const FORM_ENDPOINT: &str = "";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A meter offered by the meter form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterOption {
    pub id: String,
    pub selected: bool,
}

impl Candidate for MeterOption {
    fn is_preferred(&self) -> bool {
        self.selected
    }

    fn identity(&self) -> &str {
        &self.id
    }
}

fn selector(css: &str) -> Result<Selector, TransportError> {
    Selector::parse(css).map_err(|e| TransportError::Markup(format!("{css}: {e}")))
}

fn cell_text(row: &ElementRef, cell: &Selector) -> Option<String> {
    row.select(cell)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Extracts meter ids from the meter form: named inputs carry the active meter, select
/// options list all of them.
pub fn parse_meter_form(markup: &str) -> Result<Vec<MeterOption>, TransportError> {
    let document = Html::parse_document(markup);
    let inputs = selector("input[name*='meter']")?;
    let options = selector("select[name*='meter'] option")?;

    let mut meters = Vec::new();
    for input in document.select(&inputs) {
        let kind = input.value().attr("type").unwrap_or("text");
        if kind.eq_ignore_ascii_case("submit") || kind.eq_ignore_ascii_case("button") {
            continue;
        }
        if let Some(value) = input.value().attr("value").map(str::trim) {
            if !value.is_empty() {
                meters.push(MeterOption {
                    id: value.to_string(),
                    selected: true,
                });
            }
        }
    }

    for option in document.select(&options) {
        let id = match option.value().attr("value") {
            Some(value) => value.trim().to_string(),
            None => option.text().collect::<String>().trim().to_string(),
        };
        if id.is_empty() {
            continue;
        }
        meters.push(MeterOption {
            id,
            selected: option.value().attr("selected").is_some(),
        });
    }

    Ok(meters)
}

/// Reads the rows of the `#metervalue` table. Rows without a code or value are skipped;
/// a missing table yields no entries.
pub fn parse_meter_profile(markup: &str) -> Result<Vec<RawEntry>, TransportError> {
    let document = Html::parse_document(markup);
    let rows = selector("#metervalue tr")?;
    let code_cell = selector("#table_metervalues_col_obis")?;
    let value_cell = selector("#table_metervalues_col_wert")?;
    let timestamp_cell = selector("#table_metervalues_col_timestamp")?;

    Ok(document
        .select(&rows)
        .filter_map(|row| {
            let code = cell_text(&row, &code_cell).filter(|c| !c.is_empty())?;
            let value = cell_text(&row, &value_cell).filter(|v| !v.is_empty())?;
            Some(RawEntry {
                raw_code: code,
                raw_value: value,
                raw_timestamp: cell_text(&row, &timestamp_cell).filter(|t| !t.is_empty()),
                ..Default::default()
            })
        })
        .collect())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ppc;

#[async_trait]
impl Backend for Ppc {
    type Candidate = MeterOption;

    async fn list_candidates(
        &self,
        transport: &dyn Transport,
    ) -> Result<Vec<MeterOption>, GatewayError> {
        let markup = transport
            .fetch_html(FORM_ENDPOINT, &[("action", "meterform")])
            .await
            .map_err(GatewayError::transport(Step::ListCandidates))?;
        parse_meter_form(&markup).map_err(GatewayError::transport(Step::ListCandidates))
    }

    async fn device_info(&self, _transport: &dyn Transport) -> Result<DeviceInfo, GatewayError> {
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
        let markup = transport
            .fetch_html(
                FORM_ENDPOINT,
                &[("action", "showMeterProfile"), ("meter_id", identity.as_str())],
            )
            .await
            .map_err(GatewayError::transport(Step::Readings))?;
        parse_meter_profile(&markup).map_err(GatewayError::transport(Step::Readings))
    }

    fn capture_rules(&self) -> CaptureRules {
        CaptureRules {
            code_format: CodeFormat::Formatted,
            unit_strategy: UnitStrategy::CodePattern,
            scale: Scale::AsReported,
            timestamp_format: TimestampFormat::Naive(TIMESTAMP_FORMAT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Gateway, MeterIdentityProvider};
    use crate::reading::Unit;
    use crate::transport::TransportConfig;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use tokio_util::sync::CancellationToken;

    const METER_FORM: &str = r#"
        <html><body>
          <form method="post">
            <input type="hidden" name="action" value="showMeterProfile">
            <select name="meter_id">
              <option value="1EMH0011111111">Zähler 1</option>
              <option value="1EMH0022222222" selected>Zähler 2</option>
              <option>1EMH0033333333</option>
            </select>
            <input type="submit" name="meter_submit" value="Anzeigen">
          </form>
        </body></html>
    "#;

    const METER_PROFILE: &str = r#"
        <html><body>
          <table id="metervalue">
            <tr><th>OBIS</th><th>Wert</th><th>Zeitstempel</th></tr>
            <tr>
              <td id="table_metervalues_col_obis">1-0:1.8.0</td>
              <td id="table_metervalues_col_wert"> 12345.678 </td>
              <td id="table_metervalues_col_timestamp">2024-05-01 12:00:00</td>
            </tr>
            <tr>
              <td id="table_metervalues_col_obis">1-0:2.8.0</td>
              <td id="table_metervalues_col_wert">42.5</td>
              <td id="table_metervalues_col_timestamp"></td>
            </tr>
            <tr>
              <td id="table_metervalues_col_obis">1-0:16.7.0</td>
              <td id="table_metervalues_col_wert">-</td>
              <td id="table_metervalues_col_timestamp">2024-05-01 12:00:00</td>
            </tr>
            <tr>
              <td id="table_metervalues_col_obis">Status</td>
              <td id="table_metervalues_col_wert">OK</td>
            </tr>
          </table>
          <table id="other">
            <tr>
              <td id="table_metervalues_col_obis">1-0:32.7.0</td>
              <td id="table_metervalues_col_wert">230.0</td>
            </tr>
          </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_meter_form_options() {
        let meters = parse_meter_form(METER_FORM).unwrap();
        assert_eq!(
            meters,
            vec![
                MeterOption {
                    id: "1EMH0011111111".to_string(),
                    selected: false
                },
                MeterOption {
                    id: "1EMH0022222222".to_string(),
                    selected: true
                },
                MeterOption {
                    id: "1EMH0033333333".to_string(),
                    selected: false
                },
            ]
        );
    }

    #[test]
    fn test_parse_meter_form_hidden_input() {
        let markup = r#"<form><input type="hidden" name="meter_id" value="1PPC0099999999"></form>"#;
        let meters = parse_meter_form(markup).unwrap();
        assert_eq!(meters.len(), 1);
        assert_eq!(meters[0].id, "1PPC0099999999");
        assert!(meters[0].is_preferred());
    }

    #[test]
    fn test_parse_meter_form_without_meters() {
        assert!(parse_meter_form("<html><body>Login</body></html>")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_meter_profile() {
        let entries = parse_meter_profile(METER_PROFILE).unwrap();

        // Header row has no cells; the unrelated table is ignored
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].raw_code, "1-0:1.8.0");
        assert_eq!(entries[0].raw_value, "12345.678");
        assert_eq!(
            entries[0].raw_timestamp.as_deref(),
            Some("2024-05-01 12:00:00")
        );
        assert_eq!(entries[1].raw_timestamp, None);
        assert_eq!(entries[3].raw_code, "Status");
    }

    #[test]
    fn test_parse_meter_profile_without_table() {
        assert!(parse_meter_profile("<html><body><p>Keine Daten</p></body></html>")
            .unwrap()
            .is_empty());
    }

    fn gateway_for(server: &mockito::ServerGuard) -> PpcGateway {
        let transport =
            HttpTransport::new(TransportConfig::new(&server.url(), "admin", "secret")).unwrap();
        GatewayClient::new(Ppc, transport)
    }

    #[tokio::test]
    async fn test_get_readings() {
        let mut server = mockito::Server::new_async().await;
        let form = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded("action".into(), "meterform".into()))
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(METER_FORM)
            .create();
        let profile = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "showMeterProfile".into()),
                Matcher::UrlEncoded("meter_id".into(), "1EMH0022222222".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(METER_PROFILE)
            .create();

        let gateway = gateway_for(&server);
        let info = gateway
            .get_readings(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(info.name, "1EMH0022222222");
        assert_eq!(info.model, MODEL);
        assert_eq!(info.manufacturer, MANUFACTURER);
        assert_eq!(info.readings.len(), 2);

        let import = info.reading("1.8.0").unwrap();
        assert_eq!(import.value, 12345.678);
        assert_eq!(import.unit, Unit::WattHour);
        assert_eq!(
            import.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );
        let export = info.reading("2.8.0").unwrap();
        assert_eq!(export.value, 42.5);
        assert_eq!(export.timestamp, info.last_update);

        form.assert();
        profile.assert();
    }

    #[tokio::test]
    async fn test_empty_profile_is_no_readings() {
        let mut server = mockito::Server::new_async().await;
        let _profile = server
            .mock("POST", "/")
            .match_body(Matcher::UrlEncoded(
                "action".into(),
                "showMeterProfile".into(),
            ))
            .with_status(200)
            .with_body("<html><body></body></html>")
            .create();

        let gateway = gateway_for(&server).with_identity(Some(MeterIdentity::new("1EMH0011111111")));
        let err = gateway
            .get_readings(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::NoReadingsFound));
    }

    #[tokio::test]
    async fn test_meter_form_without_meters_fails_discovery() {
        let mut server = mockito::Server::new_async().await;
        let _form = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<html><body>Login</body></html>")
            .create();

        let gateway = gateway_for(&server);
        assert!(gateway.current_identity().await.is_empty());

        let err = gateway
            .discover_identity(&CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "discovery error: no usable candidate");
    }
}
