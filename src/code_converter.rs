//! Turns vendor-native identifiers into [`StandardCode`]s.

use crate::error::ConversionError;
use crate::reading::StandardCode;

/// How a vendor spells its measurement codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeFormat {
    /// 12 hex digits, e.g. `0100100700FF`, optionally followed by `.suffix`
    LogicalName,
    /// Hex device codes looked up in [`DEVICE_CODES`]
    DeviceTable,
    /// Already formatted `C.D.E` (or `A-B:C.D.E`) text
    Formatted,
}

impl CodeFormat {
    /// Converts `raw` to a standardized code. `None` means the entry is skipped.
    pub fn convert(self, raw: &str) -> Option<StandardCode> {
        match self {
            CodeFormat::LogicalName => match convert_logical_name(raw) {
                Ok(code) => Some(code),
                Err(e) => {
                    tracing::debug!("Skipping logical name: {e}");
                    None
                }
            },
            CodeFormat::DeviceTable => lookup_device_code(raw),
            CodeFormat::Formatted => StandardCode::parse_lenient(raw).ok(),
        }
    }
}

/// Device code table for gateways reporting hex codes. Values use the
/// medium-prefixed form and are normalized on lookup.
pub const DEVICE_CODES: &[(&str, &str)] = &[
    ("0100010800ff", "1-0:1.8.0"),  // Active energy import
    ("0100020800ff", "1-0:2.8.0"),  // Active energy export
    ("0100100700ff", "1-0:16.7.0"), // Current active power
    ("01001f0700ff", "1-0:31.7.0"), // Phase 1 current
    ("0100200700ff", "1-0:32.7.0"), // Phase 1 voltage
    ("0100240700ff", "1-0:36.7.0"), // Phase 1 power
    ("0100330700ff", "1-0:51.7.0"), // Phase 2 current
    ("0100340700ff", "1-0:52.7.0"), // Phase 2 voltage
    ("0100380700ff", "1-0:56.7.0"), // Phase 2 power
    ("0100470700ff", "1-0:71.7.0"), // Phase 3 current
    ("0100480700ff", "1-0:72.7.0"), // Phase 3 voltage
    ("01004c0700ff", "1-0:76.7.0"), // Phase 3 power
    ("01000e0700ff", "1-0:14.7.0"), // Frequency
];

/// Converts a logical name such as `0100100700FF` into `16.7.0`.
///
/// Hex layout is `[A][B][C][D][E][F]`, two digits each; only C, D and E are kept.
/// Anything after the first `.` is ignored.
pub fn convert_logical_name(logical_name: &str) -> Result<StandardCode, ConversionError> {
    let hex = logical_name
        .split_once('.')
        .map_or(logical_name, |(hex, _)| hex);

    if hex.len() != 12 || !hex.is_ascii() {
        return Err(ConversionError::MalformedInput(format!(
            "unexpected logical name: {logical_name}"
        )));
    }

    let byte_at = |offset: usize| {
        u8::from_str_radix(&hex[offset..offset + 2], 16).map_err(|_| {
            ConversionError::MalformedInput(format!(
                "invalid hex at offset {offset} in {logical_name}"
            ))
        })
    };

    Ok(StandardCode::from_parts(byte_at(4)?, byte_at(6)?, byte_at(8)?))
}

/// Looks up a hex device code, ignoring case and surrounding whitespace.
pub fn lookup_device_code(device_code: &str) -> Option<StandardCode> {
    let device_code = device_code.trim().to_ascii_lowercase();
    DEVICE_CODES
        .iter()
        .find(|(hex, _)| *hex == device_code)
        .and_then(|(_, prefixed)| StandardCode::parse_lenient(prefixed).ok())
}
