use crate::error::ParseError;
use crate::reading::Unit;

/// Energy values arrive in Wh and are stored in kWh.
const WH_PER_KWH: f64 = 1000.0;

/// How a raw numeric string becomes a measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// Multiply by `10^exponent`, then convert Wh to kWh
    Exponent(i32),
    /// Divide by a fixed factor per quantity; no per-entry exponent
    FixedDivisor { energy: f64, instantaneous: f64 },
    /// The device already reports display units
    AsReported,
}

impl Scale {
    /// Divisors used by gateways that pre-scale instantaneous values by 10^4.
    pub const CONEXA: Scale = Scale::FixedDivisor {
        energy: 1000.0,
        instantaneous: 10000.0,
    };
}

pub fn normalize(raw_value: &str, scale: Scale, unit: Unit) -> Result<f64, ParseError> {
    let raw: f64 = raw_value.trim().parse().map_err(|_| ParseError {
        value: raw_value.to_string(),
    })?;

    let value = match scale {
        Scale::Exponent(exponent) => {
            let scaled = apply_exponent(raw, exponent);
            if unit == Unit::WattHour {
                scaled / WH_PER_KWH
            } else {
                scaled
            }
        }
        Scale::FixedDivisor {
            energy,
            instantaneous,
        } => {
            if unit == Unit::WattHour {
                raw / energy
            } else {
                raw / instantaneous
            }
        }
        Scale::AsReported => raw,
    };
    Ok(value)
}

// Dividing for negative exponents keeps results like 153 * 10^-1 exact at 15.3.
fn apply_exponent(raw: f64, exponent: i32) -> f64 {
    if exponent >= 0 {
        raw * 10f64.powi(exponent)
    } else {
        raw / 10f64.powi(-exponent)
    }
}
