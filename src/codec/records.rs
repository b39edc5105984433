//! Defensive parsing of response fragments into typed records
//!
//! A missing or unparsable field maps to a safe default (empty string, zero,
//! epoch date) rather than aborting the record; the orchestrator relies on
//! this so one malformed element never blocks the rest of a cycle.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::codec::convert::{entry_from_external, from_external_amount, from_tally_date, parse_amount};
use crate::codec::response::{child_text, extract_elements};
use crate::types::{
    CostCategory, CostCentre, Ledger, LedgerGroup, StockItem, SyncDirection, SyncStatus, Voucher,
    VoucherEntry, VoucherType,
};

fn text(fragment: &str, tag: &str) -> String {
    child_text(fragment, tag).unwrap_or_default()
}

fn flag(fragment: &str, tag: &str) -> bool {
    text(fragment, tag).eq_ignore_ascii_case("yes")
}

fn guid(fragment: &str) -> Option<String> {
    let value = text(fragment, "GUID");
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// External amount field converted to the internal sign convention
fn internal_amount(fragment: &str, tag: &str) -> BigDecimal {
    from_external_amount(parse_amount(&text(fragment, tag)))
}

/// Quantities arrive as "10 Nos"; the unit suffix is dropped
fn quantity(fragment: &str, tag: &str) -> BigDecimal {
    let value = text(fragment, tag);
    value
        .split_whitespace()
        .next()
        .map(parse_amount)
        .unwrap_or_else(|| BigDecimal::from(0))
}

/// Parse a `<LEDGER>` fragment
pub fn parse_ledger(fragment: &str) -> Ledger {
    Ledger {
        name: text(fragment, "NAME"),
        guid: guid(fragment),
        parent: text(fragment, "PARENT"),
        opening_balance: internal_amount(fragment, "OPENINGBALANCE"),
        closing_balance: internal_amount(fragment, "CLOSINGBALANCE"),
        address: text(fragment, "ADDRESS"),
        phone: text(fragment, "LEDGERPHONE"),
        email: text(fragment, "EMAIL"),
        gstin: text(fragment, "PARTYGSTIN"),
        pan: text(fragment, "INCOMETAXNUMBER"),
        mapped_entity: None,
        last_synced_at: None,
    }
}

/// Parse a `<GROUP>` fragment
pub fn parse_group(fragment: &str) -> LedgerGroup {
    LedgerGroup {
        name: text(fragment, "NAME"),
        parent: text(fragment, "PARENT"),
        is_revenue: flag(fragment, "ISREVENUE"),
        is_deemed_positive: flag(fragment, "ISDEEMEDPOSITIVE"),
        last_synced_at: None,
    }
}

/// Parse a `<STOCKITEM>` fragment
pub fn parse_stock_item(fragment: &str) -> StockItem {
    StockItem {
        name: text(fragment, "NAME"),
        guid: guid(fragment),
        group: text(fragment, "PARENT"),
        unit: text(fragment, "BASEUNITS"),
        opening_qty: quantity(fragment, "OPENINGBALANCE"),
        closing_qty: quantity(fragment, "CLOSINGBALANCE"),
        opening_value: internal_amount(fragment, "OPENINGVALUE"),
        closing_value: internal_amount(fragment, "CLOSINGVALUE"),
        rate: parse_amount(&text(fragment, "OPENINGRATE")),
        gst_rate: parse_amount(&text(fragment, "GSTRATE")),
        hsn_code: text(fragment, "HSNCODE"),
        last_synced_at: None,
    }
}

/// Parse a `<VOUCHER>` fragment.
///
/// The voucher's `amount` stays zero here; the orchestrator derives it from
/// the debit lines because the external envelope carries no single total.
pub fn parse_voucher(fragment: &str) -> Voucher {
    let mut entry_fragments = extract_elements(fragment, "ALLLEDGERENTRIES.LIST");
    if entry_fragments.is_empty() {
        // Sales/invoice vouchers use the trade entry list
        entry_fragments = extract_elements(fragment, "LEDGERENTRIES.LIST");
    }

    let entries = entry_fragments
        .iter()
        .map(|entry| {
            let external = parse_amount(&text(entry, "AMOUNT"));
            let (amount, entry_type) = entry_from_external(external);
            VoucherEntry::new(text(entry, "LEDGERNAME"), entry_type, amount)
        })
        .collect();

    let now = chrono::Utc::now().naive_utc();
    Voucher {
        id: Uuid::new_v4().to_string(),
        guid: guid(fragment),
        number: text(fragment, "VOUCHERNUMBER"),
        voucher_type: VoucherType::from_name(&text(fragment, "VOUCHERTYPENAME")),
        date: from_tally_date(&text(fragment, "DATE")).unwrap_or_else(NaiveDate::default),
        party_ledger: text(fragment, "PARTYLEDGERNAME"),
        amount: BigDecimal::from(0),
        narration: text(fragment, "NARRATION"),
        is_cancelled: flag(fragment, "ISCANCELLED"),
        entries,
        direction: SyncDirection::FromExternal,
        status: SyncStatus::Synced,
        error: None,
        linked_record: None,
        created_at: now,
        updated_at: now,
    }
}

/// Parse a `<COSTCENTRE>` fragment
pub fn parse_cost_centre(fragment: &str) -> CostCentre {
    let category = match text(fragment, "CATEGORY").to_lowercase().as_str() {
        "ward" => CostCategory::Ward,
        "doctor" => CostCategory::Doctor,
        _ => CostCategory::Department,
    };
    CostCentre {
        name: text(fragment, "NAME"),
        parent: text(fragment, "PARENT"),
        category,
        mapped_business_id: None,
        last_synced_at: None,
    }
}

/// One row of a display report (trial balance, balance sheet, ...)
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReportRow {
    pub name: String,
    pub amount: BigDecimal,
}

/// Best-effort extraction of report rows.
///
/// Display reports pair `DSPDISPNAME` name elements with `DSPCLDRAMTA`
/// amount elements; anything the response does not carry simply yields an
/// empty row set and the raw payload is kept for later re-parsing.
pub fn parse_report_rows(xml: &str) -> Vec<ReportRow> {
    let names = extract_elements(xml, "DSPDISPNAME");
    let amounts = extract_elements(xml, "DSPCLDRAMTA");

    names
        .into_iter()
        .zip(amounts)
        .map(|(name, amount)| ReportRow {
            name: name.trim().to_string(),
            amount: from_external_amount(parse_amount(&amount)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryType;

    const LEDGER_XML: &str = "<GUID>abc-123</GUID>\
                              <NAME>John Doe</NAME>\
                              <PARENT>Sundry Debtors</PARENT>\
                              <OPENINGBALANCE>-2500.00</OPENINGBALANCE>\
                              <PARTYGSTIN>29ABCDE1234F1Z5</PARTYGSTIN>";

    #[test]
    fn ledger_fields_parse_with_sign_inversion() {
        let ledger = parse_ledger(LEDGER_XML);
        assert_eq!(ledger.name, "John Doe");
        assert_eq!(ledger.guid.as_deref(), Some("abc-123"));
        assert_eq!(ledger.parent, "Sundry Debtors");
        // External -2500 (debit) becomes internal +2500
        assert_eq!(ledger.opening_balance, BigDecimal::from(2500));
        assert_eq!(ledger.gstin, "29ABCDE1234F1Z5");
    }

    #[test]
    fn missing_fields_default_instead_of_failing() {
        let ledger = parse_ledger("<NAME>Bare</NAME>");
        assert_eq!(ledger.name, "Bare");
        assert!(ledger.guid.is_none());
        assert_eq!(ledger.opening_balance, BigDecimal::from(0));
        assert!(ledger.parent.is_empty());
    }

    #[test]
    fn voucher_entries_carry_internal_sides() {
        let fragment = "<GUID>v-1</GUID>\
                        <VOUCHERNUMBER>101</VOUCHERNUMBER>\
                        <VOUCHERTYPENAME>Receipt</VOUCHERTYPENAME>\
                        <DATE>20240610</DATE>\
                        <PARTYLEDGERNAME>John Doe</PARTYLEDGERNAME>\
                        <ALLLEDGERENTRIES.LIST>\
                        <LEDGERNAME>HDFC Bank</LEDGERNAME><AMOUNT>-1000</AMOUNT>\
                        </ALLLEDGERENTRIES.LIST>\
                        <ALLLEDGERENTRIES.LIST>\
                        <LEDGERNAME>John Doe</LEDGERNAME><AMOUNT>1000</AMOUNT>\
                        </ALLLEDGERENTRIES.LIST>";

        let voucher = parse_voucher(fragment);
        assert_eq!(voucher.voucher_type, VoucherType::Receipt);
        assert_eq!(voucher.entries.len(), 2);
        assert_eq!(voucher.entries[0].entry_type, EntryType::Debit);
        assert_eq!(voucher.entries[0].amount, BigDecimal::from(1000));
        assert_eq!(voucher.entries[1].entry_type, EntryType::Credit);
        assert_eq!(voucher.total_debits(), voucher.total_credits());
        assert_eq!(voucher.status, SyncStatus::Synced);
        assert_eq!(voucher.direction, SyncDirection::FromExternal);
    }

    #[test]
    fn bad_voucher_date_defaults() {
        let voucher = parse_voucher("<VOUCHERNUMBER>7</VOUCHERNUMBER><DATE>garbage</DATE>");
        assert_eq!(voucher.date, NaiveDate::default());
        assert_eq!(voucher.number, "7");
    }

    #[test]
    fn stock_quantity_drops_unit_suffix() {
        let item = parse_stock_item(
            "<NAME>Paracetamol</NAME><OPENINGBALANCE>120 Nos</OPENINGBALANCE>\
             <BASEUNITS>Nos</BASEUNITS><HSNCODE>3004</HSNCODE>",
        );
        assert_eq!(item.opening_qty, BigDecimal::from(120));
        assert_eq!(item.unit, "Nos");
        assert_eq!(item.hsn_code, "3004");
    }

    #[test]
    fn report_rows_pair_names_with_amounts() {
        let xml = "<ENVELOPE>\
                   <DSPDISPNAME>Cash</DSPDISPNAME><DSPCLDRAMTA>-500</DSPCLDRAMTA>\
                   <DSPDISPNAME>Sales</DSPDISPNAME><DSPCLDRAMTA>500</DSPCLDRAMTA>\
                   </ENVELOPE>";
        let rows = parse_report_rows(xml);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Cash");
        assert_eq!(rows[0].amount, BigDecimal::from(500));
        assert_eq!(rows[1].amount, BigDecimal::from(-500));
    }
}
