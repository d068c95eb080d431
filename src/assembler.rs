//! Folds raw vendor entries into normalized readings keyed by code.
//!
//! A single bad entry (unknown code, non-numeric value) is skipped and logged; it never
//! aborts the fetch it belongs to.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::code_converter::CodeFormat;
use crate::normalizer::{normalize, Scale};
use crate::reading::{Quality, RawEntry, Reading, StandardCode};
use crate::unit_resolver::UnitStrategy;

/// Textual format of a vendor-supplied capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// The vendor never reports capture times
    None,
    Rfc3339,
    /// A zone-less `chrono` format string, interpreted as UTC
    Naive(&'static str),
}

impl TimestampFormat {
    pub fn parse(self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            TimestampFormat::None => None,
            TimestampFormat::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            TimestampFormat::Naive(format) => NaiveDateTime::parse_from_str(raw, format)
                .ok()
                .map(|ts| ts.and_utc()),
        }
    }
}

/// Everything that differs between vendors when capturing a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRules {
    pub code_format: CodeFormat,
    pub unit_strategy: UnitStrategy,
    /// Used when the entry carries no exponent of its own
    pub scale: Scale,
    pub timestamp_format: TimestampFormat,
}

/// Turns one raw entry into a reading, or `None` when the entry has to be skipped.
/// `now` is used when the entry has no (parsable) capture time.
pub fn capture_entry(entry: &RawEntry, rules: &CaptureRules, now: DateTime<Utc>) -> Option<Reading> {
    let Some(code) = rules.code_format.convert(&entry.raw_code) else {
        tracing::debug!("Skipping entry with unknown code '{}'", entry.raw_code);
        return None;
    };

    let unit = rules.unit_strategy.resolve(&code, entry.raw_unit_tag);

    let scale = match (rules.scale, entry.raw_scale) {
        (Scale::Exponent(_), Some(exponent)) => Scale::Exponent(exponent),
        (scale, _) => scale,
    };
    let value = match normalize(&entry.raw_value, scale, unit) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Skipping {code}: {e}");
            return None;
        }
    };

    let timestamp = entry
        .raw_timestamp
        .as_deref()
        .and_then(|raw| rules.timestamp_format.parse(raw))
        .unwrap_or(now);

    Some(Reading {
        value,
        unit,
        timestamp,
        code,
        quality: Quality::Good,
    })
}

/// Captures every entry; a later entry with the same code replaces an earlier one.
pub fn assemble<F>(entries: &[RawEntry], capture: F) -> BTreeMap<StandardCode, Reading>
where
    F: Fn(&RawEntry) -> Option<Reading>,
{
    let mut readings = BTreeMap::new();
    for reading in entries.iter().filter_map(capture) {
        readings.insert(reading.code.clone(), reading);
    }
    readings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Unit;
    use chrono::TimeZone;

    const CASA_RULES: CaptureRules = CaptureRules {
        code_format: CodeFormat::LogicalName,
        unit_strategy: UnitStrategy::Tag,
        scale: Scale::Exponent(0),
        timestamp_format: TimestampFormat::None,
    };

    const CONEXA_RULES: CaptureRules = CaptureRules {
        code_format: CodeFormat::DeviceTable,
        unit_strategy: UnitStrategy::CodePattern,
        scale: Scale::CONEXA,
        timestamp_format: TimestampFormat::Rfc3339,
    };

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn casa_entry(logical_name: &str, value: &str, unit: i64, scale: i32) -> RawEntry {
        RawEntry {
            raw_code: logical_name.to_string(),
            raw_value: value.to_string(),
            raw_unit_tag: Some(unit),
            raw_scale: Some(scale),
            raw_timestamp: None,
        }
    }

    #[test]
    fn test_capture_entry_with_exponent() {
        let reading =
            capture_entry(&casa_entry("0100010800FF", "123450", 30, 0), &CASA_RULES, fixed_now())
                .unwrap();
        assert_eq!(reading.code, "1.8.0");
        assert_eq!(reading.unit, Unit::WattHour);
        assert_eq!(reading.value, 123.45);
        assert_eq!(reading.timestamp, fixed_now());
        assert_eq!(reading.quality, Quality::Good);
    }

    #[test]
    fn test_capture_entry_skips_bad_entries() {
        assert!(capture_entry(&casa_entry("010010", "1", 27, 0), &CASA_RULES, fixed_now()).is_none());
        assert!(
            capture_entry(&casa_entry("0100100700FF", "abc", 27, 0), &CASA_RULES, fixed_now())
                .is_none()
        );
    }

    #[test]
    fn test_capture_entry_parses_capture_time() {
        let entry = RawEntry {
            raw_code: "0100100700ff".to_string(),
            raw_value: "25000000".to_string(),
            raw_timestamp: Some("2024-04-30T23:15:00+02:00".to_string()),
            ..Default::default()
        };
        let reading = capture_entry(&entry, &CONEXA_RULES, fixed_now()).unwrap();
        assert_eq!(reading.value, 2500.0);
        assert_eq!(reading.unit, Unit::Watt);
        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2024, 4, 30, 21, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_unparsable_capture_time_defaults_to_now() {
        let entry = RawEntry {
            raw_code: "0100010800ff".to_string(),
            raw_value: "1000".to_string(),
            raw_timestamp: Some("yesterday".to_string()),
            ..Default::default()
        };
        let reading = capture_entry(&entry, &CONEXA_RULES, fixed_now()).unwrap();
        assert_eq!(reading.timestamp, fixed_now());
    }

    #[test]
    fn test_naive_timestamp_format() {
        let format = TimestampFormat::Naive("%Y-%m-%d %H:%M:%S");
        assert_eq!(
            format.parse("2024-05-01 08:30:00"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap())
        );
        assert_eq!(format.parse("01.05.2024 08:30"), None);
        assert_eq!(TimestampFormat::None.parse("2024-05-01T08:30:00Z"), None);
    }

    #[test]
    fn test_assemble_skips_and_keeps_the_rest() {
        let entries = vec![
            casa_entry("0100100700FF", "2500", 27, 0),
            casa_entry("0100010800FF", "not-a-number", 30, 0),
            casa_entry("01001F0700FF", "153", 33, -1),
        ];
        let readings = assemble(&entries, |e| capture_entry(e, &CASA_RULES, fixed_now()));
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[&StandardCode::from_parts(16, 7, 0)].value, 2500.0);
        assert_eq!(readings[&StandardCode::from_parts(31, 7, 0)].value, 15.3);
    }

    #[test]
    fn test_assemble_last_duplicate_wins() {
        let entries = vec![
            casa_entry("0100100700FF", "100", 27, 0),
            casa_entry("0100100700FF.1", "200", 27, 0),
        ];
        let readings = assemble(&entries, |e| capture_entry(e, &CASA_RULES, fixed_now()));
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[&StandardCode::from_parts(16, 7, 0)].value, 200.0);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let entries = vec![
            casa_entry("0100100700FF", "2500", 27, 0),
            casa_entry("0100010800FF", "123450", 30, 0),
            casa_entry("0100200700FF", "2301", 35, -1),
        ];
        let first = assemble(&entries, |e| capture_entry(e, &CASA_RULES, fixed_now()));
        let second = assemble(&entries, |e| capture_entry(e, &CASA_RULES, fixed_now()));
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_assemble_empty_input() {
        let readings = assemble(&[], |e| capture_entry(e, &CASA_RULES, fixed_now()));
        assert!(readings.is_empty());
    }
}
