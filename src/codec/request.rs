//! Construction of export (pull) and import (push) request envelopes

use quick_xml::escape::escape;

use crate::codec::convert::{entry_to_external, to_tally_date};
use crate::types::{CostCentre, Ledger, Voucher, VoucherType};

/// Report identifier for master imports
const IMPORT_ID_MASTERS: &str = "All Masters";
/// Report identifier for voucher imports
const IMPORT_ID_VOUCHERS: &str = "Vouchers";

/// Import action requested from the external system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportAction {
    Create,
    Alter,
    Cancel,
}

impl ImportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportAction::Create => "Create",
            ImportAction::Alter => "Alter",
            ImportAction::Cancel => "Cancel",
        }
    }
}

fn esc(value: &str) -> String {
    escape(value).into_owned()
}

/// Build an export (pull) request envelope.
///
/// `extra_vars` are additional static variables such as
/// `("SVFROMDATE", "20240601")` for date-bounded reports. Pure string
/// construction; every interpolated value is XML-escaped.
pub fn build_export_request(
    report_id: &str,
    company: &str,
    extra_vars: &[(&str, String)],
) -> String {
    let mut vars = String::new();
    for (name, value) in extra_vars {
        vars.push_str(&format!("<{name}>{}</{name}>", esc(value)));
    }

    format!(
        "<ENVELOPE>\
         <HEADER><VERSION>1</VERSION><TALLYREQUEST>Export</TALLYREQUEST>\
         <TYPE>Data</TYPE><ID>{id}</ID></HEADER>\
         <BODY><DESC><STATICVARIABLES>\
         <SVEXPORTFORMAT>$$SysName:XML</SVEXPORTFORMAT>\
         <SVCURRENTCOMPANY>{company}</SVCURRENTCOMPANY>\
         {vars}\
         </STATICVARIABLES></DESC></BODY>\
         </ENVELOPE>",
        id = esc(report_id),
        company = esc(company),
        vars = vars,
    )
}

fn build_import_envelope(import_id: &str, company: &str, fragment: &str) -> String {
    format!(
        "<ENVELOPE>\
         <HEADER><VERSION>1</VERSION><TALLYREQUEST>Import</TALLYREQUEST>\
         <TYPE>Data</TYPE><ID>{id}</ID></HEADER>\
         <BODY><DESC><STATICVARIABLES>\
         <SVCURRENTCOMPANY>{company}</SVCURRENTCOMPANY>\
         </STATICVARIABLES></DESC>\
         <DATA><TALLYMESSAGE xmlns:UDF=\"TallyUDF\">{fragment}</TALLYMESSAGE></DATA>\
         </BODY>\
         </ENVELOPE>",
        id = import_id,
        company = esc(company),
        fragment = fragment,
    )
}

/// Build an import (push) request for master records (ledgers, cost centres)
pub fn build_import_request(company: &str, entity_fragment: &str) -> String {
    build_import_envelope(IMPORT_ID_MASTERS, company, entity_fragment)
}

/// Build an import (push) request for vouchers.
///
/// Kept separate from [`build_import_request`] because the external system
/// indexes vouchers under a different report identifier than masters.
pub fn build_voucher_import_request(company: &str, voucher_fragment: &str) -> String {
    build_import_envelope(IMPORT_ID_VOUCHERS, company, voucher_fragment)
}

/// Render a ledger master fragment for creation
pub fn ledger_fragment(ledger: &Ledger) -> String {
    format!(
        "<LEDGER NAME=\"{name}\" ACTION=\"Create\">\
         <NAME>{name}</NAME>\
         <PARENT>{parent}</PARENT>\
         <OPENINGBALANCE>{opening}</OPENINGBALANCE>\
         <ADDRESS>{address}</ADDRESS>\
         <LEDGERPHONE>{phone}</LEDGERPHONE>\
         <EMAIL>{email}</EMAIL>\
         <PARTYGSTIN>{gstin}</PARTYGSTIN>\
         <INCOMETAXNUMBER>{pan}</INCOMETAXNUMBER>\
         </LEDGER>",
        name = esc(&ledger.name),
        parent = esc(&ledger.parent),
        opening = crate::codec::convert::to_external_amount(ledger.opening_balance.clone()),
        address = esc(&ledger.address),
        phone = esc(&ledger.phone),
        email = esc(&ledger.email),
        gstin = esc(&ledger.gstin),
        pan = esc(&ledger.pan),
    )
}

/// Render a cost centre master fragment for creation
pub fn cost_centre_fragment(cost_centre: &CostCentre) -> String {
    format!(
        "<COSTCENTRE NAME=\"{name}\" ACTION=\"Create\">\
         <NAME>{name}</NAME>\
         <PARENT>{parent}</PARENT>\
         <CATEGORY>{category}</CATEGORY>\
         </COSTCENTRE>",
        name = esc(&cost_centre.name),
        parent = esc(&cost_centre.parent),
        category = esc(&format!("{:?}", cost_centre.category)),
    )
}

fn entry_lines(voucher: &Voucher, list_tag: &str) -> String {
    let mut lines = String::new();
    for entry in &voucher.entries {
        let external = entry_to_external(&entry.amount, entry.entry_type);
        let deemed_positive = if external < bigdecimal::BigDecimal::from(0) {
            "Yes"
        } else {
            "No"
        };
        lines.push_str(&format!(
            "<{tag}>\
             <LEDGERNAME>{ledger}</LEDGERNAME>\
             <ISDEEMEDPOSITIVE>{deemed}</ISDEEMEDPOSITIVE>\
             <AMOUNT>{amount}</AMOUNT>\
             </{tag}>",
            tag = list_tag,
            ledger = esc(&entry.ledger_name),
            deemed = deemed_positive,
            amount = external,
        ));
    }
    lines
}

/// Render a generic voucher fragment for the requested action.
///
/// `Alter` and `Cancel` are keyed by the original voucher number, matching
/// the external system's non-destructive edit semantics.
pub fn voucher_fragment(voucher: &Voucher, action: ImportAction) -> String {
    format!(
        "<VOUCHER VCHTYPE=\"{vtype}\" ACTION=\"{action}\">\
         <DATE>{date}</DATE>\
         <VOUCHERTYPENAME>{vtype}</VOUCHERTYPENAME>\
         <VOUCHERNUMBER>{number}</VOUCHERNUMBER>\
         <PARTYLEDGERNAME>{party}</PARTYLEDGERNAME>\
         <NARRATION>{narration}</NARRATION>\
         {entries}\
         </VOUCHER>",
        vtype = esc(voucher.voucher_type.as_str()),
        action = action.as_str(),
        date = to_tally_date(voucher.date),
        number = esc(&voucher.number),
        party = esc(&voucher.party_ledger),
        narration = esc(&voucher.narration),
        entries = entry_lines(voucher, "ALLLEDGERENTRIES.LIST"),
    )
}

/// Render a sales voucher fragment.
///
/// Sales vouchers carry the patient as the party and use the trade ledger
/// entry list the external system expects for invoices.
pub fn sales_voucher_fragment(voucher: &Voucher) -> String {
    format!(
        "<VOUCHER VCHTYPE=\"Sales\" ACTION=\"Create\">\
         <DATE>{date}</DATE>\
         <VOUCHERTYPENAME>Sales</VOUCHERTYPENAME>\
         <VOUCHERNUMBER>{number}</VOUCHERNUMBER>\
         <PARTYLEDGERNAME>{party}</PARTYLEDGERNAME>\
         <NARRATION>{narration}</NARRATION>\
         <ISINVOICE>Yes</ISINVOICE>\
         {entries}\
         </VOUCHER>",
        date = to_tally_date(voucher.date),
        number = esc(&voucher.number),
        party = esc(&voucher.party_ledger),
        narration = esc(&voucher.narration),
        entries = entry_lines(voucher, "LEDGERENTRIES.LIST"),
    )
}

/// Pick the right voucher fragment for a creation push
pub fn create_voucher_fragment(voucher: &Voucher) -> String {
    if voucher.voucher_type == VoucherType::Sales {
        sales_voucher_fragment(voucher)
    } else {
        voucher_fragment(voucher, ImportAction::Create)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    use crate::types::{VoucherBuilder, VoucherType};

    #[test]
    fn export_request_escapes_company_name() {
        let request = build_export_request("List of Ledgers", "Smith & Sons <Hospital>", &[]);
        assert!(request.contains("<ID>List of Ledgers</ID>"));
        assert!(request.contains("Smith &amp; Sons &lt;Hospital&gt;"));
        assert!(!request.contains("Smith & Sons"));
    }

    #[test]
    fn export_request_carries_extra_static_vars() {
        let request = build_export_request(
            "Day Book",
            "City Hospital",
            &[
                ("SVFROMDATE", "20240601".to_string()),
                ("SVTODATE", "20240630".to_string()),
            ],
        );
        assert!(request.contains("<SVFROMDATE>20240601</SVFROMDATE>"));
        assert!(request.contains("<SVTODATE>20240630</SVTODATE>"));
    }

    #[test]
    fn import_requests_use_distinct_report_ids() {
        let masters = build_import_request("City Hospital", "<LEDGER/>");
        let vouchers = build_voucher_import_request("City Hospital", "<VOUCHER/>");
        assert!(masters.contains("<ID>All Masters</ID>"));
        assert!(vouchers.contains("<ID>Vouchers</ID>"));
        assert!(masters.contains("<TALLYMESSAGE xmlns:UDF=\"TallyUDF\">"));
    }

    #[test]
    fn voucher_fragment_inverts_signs() {
        let voucher = VoucherBuilder::new(
            "RV-7",
            VoucherType::Receipt,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "John Doe",
        )
        .debit("HDFC Bank", BigDecimal::from(1000))
        .credit("John Doe", BigDecimal::from(1000))
        .build()
        .unwrap();

        let fragment = voucher_fragment(&voucher, ImportAction::Create);
        // Internal debit becomes an external negative amount
        assert!(fragment.contains("<AMOUNT>-1000</AMOUNT>"));
        assert!(fragment.contains("<AMOUNT>1000</AMOUNT>"));
        assert!(fragment.contains("<DATE>20240610</DATE>"));
        assert!(fragment.contains("ACTION=\"Create\""));
    }

    #[test]
    fn sales_fragment_uses_invoice_entry_list() {
        let voucher = VoucherBuilder::new(
            "SV-1",
            VoucherType::Sales,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "John Doe",
        )
        .debit("John Doe", BigDecimal::from(2500))
        .credit("Hospital Services", BigDecimal::from(2500))
        .build()
        .unwrap();

        let fragment = create_voucher_fragment(&voucher);
        assert!(fragment.contains("<LEDGERENTRIES.LIST>"));
        assert!(!fragment.contains("<ALLLEDGERENTRIES.LIST>"));
        assert!(fragment.contains("<ISINVOICE>Yes</ISINVOICE>"));
    }

    #[test]
    fn cancel_action_is_rendered() {
        let voucher = VoucherBuilder::new(
            "RV-9",
            VoucherType::Receipt,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "John Doe",
        )
        .debit("HDFC Bank", BigDecimal::from(10))
        .credit("John Doe", BigDecimal::from(10))
        .build()
        .unwrap();

        let fragment = voucher_fragment(&voucher, ImportAction::Cancel);
        assert!(fragment.contains("ACTION=\"Cancel\""));
        assert!(fragment.contains("<VOUCHERNUMBER>RV-9</VOUCHERNUMBER>"));
    }
}
