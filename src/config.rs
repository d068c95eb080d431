use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::GatewayError;
use crate::reading::MeterIdentity;
use crate::transport::TransportConfig;

/// Supported gateway families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vendor {
    #[default]
    EmhCasa,
    ThebenConexa,
    Ppc,
}

impl Vendor {
    pub fn default_timeout(self) -> Duration {
        match self {
            Vendor::EmhCasa => Duration::from_secs(5),
            Vendor::ThebenConexa => Duration::from_secs(10),
            Vendor::Ppc => Duration::from_secs(30),
        }
    }

    /// CASA gateways misbehave when HTTP/2 is negotiated.
    fn default_http1_only(self) -> bool {
        self == Vendor::EmhCasa
    }
}

impl FromStr for Vendor {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "casa" | "emh" | "emhcasa" => Ok(Vendor::EmhCasa),
            "conexa" | "theben" => Ok(Vendor::ThebenConexa),
            "ppc" => Ok(Vendor::Ppc),
            other => Err(GatewayError::Config(format!("unknown vendor '{other}'"))),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::EmhCasa => write!(f, "EMH CASA"),
            Vendor::ThebenConexa => write!(f, "Theben Conexa"),
            Vendor::Ppc => write!(f, "PPC"),
        }
    }
}

/// Everything needed to build and poll one gateway client.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub vendor: Vendor,
    /// An empty `base_uri` asks for gateway discovery (CASA only)
    pub transport: TransportConfig,
    pub meter_id: Option<MeterIdentity>,
    /// Zero means fetch once and exit
    pub poll_interval: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns the value of an environment key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let vendor = match get("SMGW_VENDOR") {
            Some(name) => name.parse()?,
            None => Vendor::default(),
        };

        let username = get("SMGW_USER").unwrap_or_default();
        let password = get("SMGW_PASSWORD").unwrap_or_default();
        if username.is_empty() || password.is_empty() {
            return Err(GatewayError::Config("credentials are required".to_string()));
        }

        let base_uri = match get("SMGW_URI") {
            Some(uri) => default_scheme(&uri, "https"),
            None if vendor == Vendor::EmhCasa => String::new(),
            None => return Err(GatewayError::Config("base URL is required".to_string())),
        };

        let timeout = match get("SMGW_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(parse_secs("SMGW_TIMEOUT_SECS", &secs)?),
            None => vendor.default_timeout(),
        };
        let poll_interval = match get("SMGW_POLL_INTERVAL_SECS") {
            Some(secs) => Duration::from_secs(parse_secs("SMGW_POLL_INTERVAL_SECS", &secs)?),
            None => Duration::from_secs(10),
        };

        let transport = TransportConfig {
            base_uri,
            username,
            password,
            accept_invalid_certs: parse_bool_safe(get("SMGW_INSECURE_TLS"), true),
            http1_only: parse_bool_safe(get("SMGW_HTTP1_ONLY"), vendor.default_http1_only()),
            timeout,
            host_header: get("SMGW_HOST_HEADER"),
        };

        Ok(Self {
            vendor,
            transport,
            meter_id: get("SMGW_METER_ID").map(MeterIdentity::new),
            poll_interval,
        })
    }

    pub fn print_summary(&self) {
        println!("Gateway Config:");
        println!("  Vendor: {}", self.vendor);
        println!(
            "  URI: {}",
            if self.transport.base_uri.is_empty() {
                "discover"
            } else {
                &self.transport.base_uri
            }
        );
        println!("  User: {}", self.transport.username);
        println!(
            "  Meter: {}",
            self.meter_id
                .as_ref()
                .map_or("discover", |id| id.as_str())
        );
        if let Some(host) = &self.transport.host_header {
            println!("  Host header: {host}");
        }
        println!("  Timeout: {:?}", self.transport.timeout);
        println!("  Poll interval: {:?}", self.poll_interval);
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, GatewayError> {
    value
        .parse()
        .map_err(|_| GatewayError::Config(format!("{key} must be a number of seconds, got '{value}'")))
}

/// Prepends `scheme://` unless the URI already has an http(s) scheme.
pub fn default_scheme(uri: &str, scheme: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        uri.to_string()
    } else {
        format!("{scheme}://{uri}")
    }
}

/// Case-insensitive `true`/`false`; anything else falls back to `default`.
fn parse_bool_safe(val: Option<String>, default: bool) -> bool {
    val.and_then(|v| v.to_ascii_lowercase().parse().ok())
        .unwrap_or(default)
}
