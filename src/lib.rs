//! Smart Meter Gateway Reader Library
//!
//! Reads the current meter values from German smart meter gateways (EMH CASA,
//! Theben Conexa, PPC) and normalizes them into OBIS-keyed readings with SI units.

pub mod assembler;
pub mod client;
pub mod code_converter;
pub mod config;
pub mod discover;
pub mod discovery;
pub mod emh_casa;
pub mod error;
pub mod gateway;
pub mod normalizer;
pub mod obis;
pub mod ppc;
pub mod reading;
pub mod theben_conexa;
pub mod transport;
pub mod unit_resolver;

// Re-export commonly used types for easier access
pub use client::AnyGateway;
pub use config::{GatewayConfig, Vendor};
pub use error::{GatewayError, TransportError};
pub use gateway::{Gateway, GatewayClient, HostConfigurer, MeterIdentityProvider};
pub use reading::{Information, MeterIdentity, Quality, Reading, StandardCode, Unit};
pub use transport::{HttpTransport, TransportConfig};
