//! Locating a gateway on the local network.

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use mdns_sd::{HostnameResolutionEvent, ServiceDaemon};

use crate::error::GatewayError;

/// Name gateways announce themselves under on the home network.
pub const GATEWAY_HOSTNAME: &str = "smgw.local";

pub const DISCOVERY_TIMEOUT: Duration = Duration::from_millis(300);

/// Resolves [`GATEWAY_HOSTNAME`] over mDNS and returns an `https://` base URI for it.
pub async fn discover_gateway_uri(timeout: Duration) -> Result<String, GatewayError> {
    resolve_gateway_uri(GATEWAY_HOSTNAME, timeout).await
}

/// Resolves `host` with a multicast DNS query, preferring IPv4 answers.
///
/// IP literals are used as they are.
pub async fn resolve_gateway_uri(host: &str, timeout: Duration) -> Result<String, GatewayError> {
    let address = match host.parse::<IpAddr>() {
        Ok(address) => address,
        Err(_) => {
            let addresses = query_addresses(host, timeout).await?;
            pick_address(&addresses)
                .ok_or_else(|| GatewayError::AddressNotFound(format!("{host} has no addresses")))?
        }
    };

    tracing::info!("Found gateway {host} at {address}");
    Ok(format!("https://{}", format_host(address)))
}

async fn query_addresses(host: &str, timeout: Duration) -> Result<HashSet<IpAddr>, GatewayError> {
    let hostname = fully_qualified(host);
    let daemon = ServiceDaemon::new()
        .map_err(|e| GatewayError::AddressNotFound(format!("mDNS unavailable: {e}")))?;

    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    let result = match daemon.resolve_hostname(&hostname, Some(timeout_ms)) {
        Ok(events) => {
            let wait = async {
                while let Ok(event) = events.recv_async().await {
                    match event {
                        HostnameResolutionEvent::AddressesFound(_, addresses)
                            if !addresses.is_empty() =>
                        {
                            return Ok(addresses);
                        }
                        HostnameResolutionEvent::SearchTimeout(_)
                        | HostnameResolutionEvent::SearchStopped(_) => break,
                        other => tracing::debug!("mDNS event for {hostname}: {other:?}"),
                    }
                }
                Err(GatewayError::AddressNotFound(format!(
                    "{host} did not answer within {timeout:?}"
                )))
            };
            tokio::time::timeout(timeout, wait).await.unwrap_or_else(|_| {
                Err(GatewayError::AddressNotFound(format!(
                    "{host} did not resolve within {timeout:?}"
                )))
            })
        }
        Err(e) => Err(GatewayError::AddressNotFound(format!("{host}: {e}"))),
    };

    if let Err(e) = daemon.shutdown() {
        tracing::debug!("Failed to shut down mDNS daemon: {e}");
    }
    result
}

/// mDNS queries need the absolute form of the name.
fn fully_qualified(host: &str) -> String {
    if host.ends_with('.') {
        host.to_string()
    } else {
        format!("{host}.")
    }
}

/// First IPv4 address, else the lowest IPv6 one.
fn pick_address(addresses: &HashSet<IpAddr>) -> Option<IpAddr> {
    addresses
        .iter()
        .filter(|ip| ip.is_ipv4())
        .min()
        .or_else(|| addresses.iter().min())
        .copied()
}

/// IPv6 addresses are bracketed for use in a URI.
pub fn format_host(address: IpAddr) -> String {
    match address {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}
