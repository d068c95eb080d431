use crate::reading::{StandardCode, Unit};

/// How a vendor's unit is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStrategy {
    /// The entry carries a DLMS/COSEM unit tag
    Tag,
    /// Inferred from the code's `C` and `D` segments
    CodePattern,
}

impl UnitStrategy {
    pub fn resolve(self, code: &StandardCode, tag: Option<i64>) -> Unit {
        match self {
            UnitStrategy::Tag => tag.map_or(Unit::Unknown, unit_from_tag),
            UnitStrategy::CodePattern => unit_from_code(code),
        }
    }
}

pub fn unit_from_tag(tag: i64) -> Unit {
    match tag {
        27 => Unit::Watt,
        30 => Unit::WattHour,
        33 => Unit::Ampere,
        35 => Unit::Volt,
        44 => Unit::Hertz,
        _ => Unit::Unknown,
    }
}

/// `x.8.x` is energy; for `x.7.x` the quantity follows from `C`. Defaults to watts.
pub fn unit_from_code(code: &StandardCode) -> Unit {
    let (c, d, _) = code.segments();
    match d {
        "8" => Unit::WattHour,
        "7" => match c {
            "16" | "36" | "56" | "76" => Unit::Watt,
            "31" | "51" | "71" => Unit::Ampere,
            "32" | "52" | "72" => Unit::Volt,
            "14" => Unit::Hertz,
            _ => Unit::Watt,
        },
        _ => Unit::Watt,
    }
}
