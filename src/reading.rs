use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_derive::Serialize;

use crate::error::ConversionError;

/// A standardized measurement code of the form `C.D.E`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StandardCode(String);

impl StandardCode {
    pub fn from_parts(c: u8, d: u8, e: u8) -> Self {
        Self(format!("{c}.{d}.{e}"))
    }

    /// Parses a bare `C.D.E` code. Segments are rendered without leading zeros.
    pub fn parse(code: &str) -> Result<Self, ConversionError> {
        let malformed = || ConversionError::MalformedInput(code.to_string());
        let segments = code
            .split('.')
            .map(|s| {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed());
                }
                s.parse::<u32>().map_err(|_| malformed())
            })
            .collect::<Result<Vec<_>, _>>()?;
        match segments.as_slice() {
            [c, d, e] => Ok(Self(format!("{c}.{d}.{e}"))),
            _ => Err(malformed()),
        }
    }

    /// Parses either the bare form or the medium-prefixed `A-B:C.D.E` form,
    /// always producing the bare form.
    pub fn parse_lenient(code: &str) -> Result<Self, ConversionError> {
        let code = code.trim();
        match code.split_once(':') {
            Some((_, bare)) => Self::parse(bare),
            None => Self::parse(code),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `C`, `D` and `E` segments.
    pub fn segments(&self) -> (&str, &str, &str) {
        let mut parts = self.0.splitn(3, '.');
        let c = parts.next().unwrap_or_default();
        let d = parts.next().unwrap_or_default();
        let e = parts.next().unwrap_or_default();
        (c, d, e)
    }
}

impl fmt::Display for StandardCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for StandardCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Unit of a normalized reading. Energy is always reported in kWh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    Watt,
    WattHour,
    Ampere,
    Volt,
    Hertz,
    Unknown,
}

impl Unit {
    /// DLMS/COSEM unit tag, when the unit has one.
    pub fn dlms_code(self) -> Option<i64> {
        match self {
            Unit::Watt => Some(27),
            Unit::WattHour => Some(30),
            Unit::Ampere => Some(33),
            Unit::Volt => Some(35),
            Unit::Hertz => Some(44),
            Unit::Unknown => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Unit::Watt => "W",
            Unit::WattHour => "kWh",
            Unit::Ampere => "A",
            Unit::Volt => "V",
            Unit::Hertz => "Hz",
            Unit::Unknown => "?",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Quality {
    #[default]
    Good,
    Stale,
    Invalid,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::Good => "good",
            Quality::Stale => "stale",
            Quality::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// One normalized measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Already scaled and unit-converted
    pub value: f64,
    pub unit: Unit,
    pub timestamp: DateTime<Utc>,
    pub code: StandardCode,
    pub quality: Quality,
}

/// Device metadata plus every reading of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Information {
    pub name: String,
    pub model: String,
    pub manufacturer: String,
    pub firmware_version: String,
    pub last_update: DateTime<Utc>,
    pub readings: BTreeMap<StandardCode, Reading>,
}

impl Information {
    pub fn reading(&self, code: &str) -> Option<&Reading> {
        self.readings.get(&StandardCode(code.to_string()))
    }

    /// Plain `code -> value` pairs, for callers that only need the numbers.
    pub fn meter_values(&self) -> BTreeMap<String, f64> {
        self.readings
            .iter()
            .map(|(code, reading)| (code.to_string(), reading.value))
            .collect()
    }
}

/// A vendor value before conversion. Lives only for one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub raw_code: String,
    pub raw_value: String,
    pub raw_unit_tag: Option<i64>,
    pub raw_scale: Option<i32>,
    pub raw_timestamp: Option<String>,
}

/// Identifies the meter (usage point, sensor domain) a gateway should read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MeterIdentity(String);

impl MeterIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MeterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeterIdentity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
