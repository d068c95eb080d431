//! Standardized measurement codes (OBIS `C.D.E`) and their descriptions.
//!
//! Readings in [`crate::Information`] are keyed by these codes, so callers can look up
//! e.g. [`POWER_ACTIVE`] without caring which gateway produced the value.

/// Total imported energy (kWh), consumed from the grid
pub const ENERGY_IMPORT: &str = "1.8.0";
/// Total exported energy (kWh), fed back to the grid
pub const ENERGY_EXPORT: &str = "2.8.0";

/// Current active power (W). Positive: consumption, negative: feed-in
pub const POWER_ACTIVE: &str = "16.7.0";
pub const POWER_L1: &str = "36.7.0";
pub const POWER_L2: &str = "56.7.0";
pub const POWER_L3: &str = "76.7.0";

pub const CURRENT_L1: &str = "31.7.0";
pub const CURRENT_L2: &str = "51.7.0";
pub const CURRENT_L3: &str = "71.7.0";

pub const VOLTAGE_L1: &str = "32.7.0";
pub const VOLTAGE_L2: &str = "52.7.0";
pub const VOLTAGE_L3: &str = "72.7.0";

/// Grid frequency (Hz)
pub const FREQUENCY: &str = "14.7.0";

/// Every code known to the registry, in display order.
pub const KNOWN_CODES: &[&str] = &[
    ENERGY_IMPORT,
    ENERGY_EXPORT,
    POWER_ACTIVE,
    POWER_L1,
    POWER_L2,
    POWER_L3,
    CURRENT_L1,
    CURRENT_L2,
    CURRENT_L3,
    VOLTAGE_L1,
    VOLTAGE_L2,
    VOLTAGE_L3,
    FREQUENCY,
];

/// Returns a human-readable description of `code`.
pub fn describe(code: &str) -> String {
    let description = match code {
        ENERGY_IMPORT => "Total imported energy (kWh)",
        ENERGY_EXPORT => "Total exported energy (kWh)",
        POWER_ACTIVE => "Current active power (W)",
        POWER_L1 => "Phase 1 active power (W)",
        POWER_L2 => "Phase 2 active power (W)",
        POWER_L3 => "Phase 3 active power (W)",
        CURRENT_L1 => "Phase 1 current (A)",
        CURRENT_L2 => "Phase 2 current (A)",
        CURRENT_L3 => "Phase 3 current (A)",
        VOLTAGE_L1 => "Phase 1 voltage (V)",
        VOLTAGE_L2 => "Phase 2 voltage (V)",
        VOLTAGE_L3 => "Phase 3 voltage (V)",
        FREQUENCY => "Grid frequency (Hz)",
        _ => return format!("Unknown code: {code}"),
    };
    description.to_string()
}
