//! Date and sign-convention conversions at the wire boundary
//!
//! The external system exchanges dates as `YYYYMMDD` and amounts under a
//! credit-positive sign convention; internally dates are ISO `NaiveDate`s and
//! amounts are debit-positive. Every conversion between the two conventions
//! goes through this module so the inversion cannot drift.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::EntryType;

/// Format a date the way the external system expects (`YYYYMMDD`)
pub fn to_tally_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parse an external `YYYYMMDD` date; malformed input yields `None`
pub fn from_tally_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y%m%d").ok()
}

/// Parse an external amount string; malformed input yields zero
pub fn parse_amount(raw: &str) -> BigDecimal {
    raw.trim()
        .replace(',', "")
        .parse::<BigDecimal>()
        .unwrap_or_else(|_| BigDecimal::from(0))
}

/// Convert an external credit-positive amount to the internal debit-positive
/// convention
pub fn from_external_amount(external: BigDecimal) -> BigDecimal {
    -external
}

/// Convert an internal debit-positive amount to the external credit-positive
/// convention
pub fn to_external_amount(internal: BigDecimal) -> BigDecimal {
    -internal
}

/// Split an external signed amount into an internal (positive magnitude,
/// entry side) pair. External negative means debit.
pub fn entry_from_external(external: BigDecimal) -> (BigDecimal, EntryType) {
    if external < BigDecimal::from(0) {
        (-external, EntryType::Debit)
    } else {
        (external, EntryType::Credit)
    }
}

/// Render an internal entry line as an external signed amount
pub fn entry_to_external(amount: &BigDecimal, entry_type: EntryType) -> BigDecimal {
    match entry_type {
        EntryType::Debit => -amount.clone(),
        EntryType::Credit => amount.clone(),
    }
}
