//! Bank statement CSV ingestion

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::codec::parse_amount;
use crate::types::*;

/// Outcome of parsing one statement file
#[derive(Debug, Clone, PartialEq)]
pub struct StatementImport {
    pub lines: Vec<BankStatementLine>,
    /// Rows whose date could not be parsed; counted, never fatal
    pub skipped: u32,
}

/// Statement dates arrive in ISO, `DD/MM/YYYY` or `DD-MM-YYYY` form.
pub fn parse_statement_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(value, "%d-%m-%Y"))
        .ok()
}

/// Column roles recognized in a statement header. Banks disagree on
/// wording; deposits may arrive as "credit" and withdrawals as "debit".
#[derive(Debug, Default)]
struct ColumnMap {
    date: Option<usize>,
    description: Option<usize>,
    reference: Option<usize>,
    deposit: Option<usize>,
    withdrawal: Option<usize>,
    balance: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut map = Self::default();
        for (index, header) in headers.iter().enumerate() {
            let name = header.trim().to_lowercase();
            let slot = if name.contains("date") {
                &mut map.date
            } else if name.contains("desc") || name.contains("narration") || name.contains("particular") {
                &mut map.description
            } else if name.contains("ref") || name.contains("cheque") {
                &mut map.reference
            } else if name.contains("deposit") || name.contains("credit") {
                &mut map.deposit
            } else if name.contains("withdraw") || name.contains("debit") {
                &mut map.withdrawal
            } else if name.contains("balance") {
                &mut map.balance
            } else {
                continue;
            };
            // First match wins when a bank repeats a word across columns
            if slot.is_none() {
                *slot = Some(index);
            }
        }
        map
    }

    fn field<'a>(&self, record: &'a csv::StringRecord, slot: Option<usize>) -> &'a str {
        slot.and_then(|index| record.get(index)).unwrap_or("")
    }
}

/// Parse one CSV statement for `bank_ledger`.
///
/// Rows with an unreadable date are skipped and counted; a file without a
/// recognizable date column is rejected outright.
pub fn parse_statement_csv(bank_ledger: &str, csv_text: &str) -> SyncResult<StatementImport> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| SyncError::Validation(format!("unreadable statement header: {err}")))?
        .clone();
    let columns = ColumnMap::from_headers(&headers);
    if columns.date.is_none() {
        return Err(SyncError::Validation(
            "statement has no recognizable date column".to_string(),
        ));
    }

    let mut lines = Vec::new();
    let mut skipped = 0;
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                log::debug!("statement row skipped: {err}");
                skipped += 1;
                continue;
            }
        };
        let date = match parse_statement_date(columns.field(&record, columns.date)) {
            Some(date) => date,
            None => {
                skipped += 1;
                continue;
            }
        };
        lines.push(BankStatementLine {
            id: Uuid::new_v4().to_string(),
            bank_ledger: bank_ledger.to_string(),
            date,
            description: columns.field(&record, columns.description).to_string(),
            reference: columns.field(&record, columns.reference).to_string(),
            deposit: parse_amount(columns.field(&record, columns.deposit)),
            withdrawal: parse_amount(columns.field(&record, columns.withdrawal)),
            balance: parse_amount(columns.field(&record, columns.balance)),
            match_status: MatchStatus::Unmatched,
            matched_voucher_id: None,
        });
    }

    Ok(StatementImport { lines, skipped })
}

/// Build a single statement line entered by hand in the UI.
pub fn manual_statement_line(
    bank_ledger: &str,
    date: NaiveDate,
    description: &str,
    deposit: BigDecimal,
    withdrawal: BigDecimal,
) -> BankStatementLine {
    BankStatementLine {
        id: Uuid::new_v4().to_string(),
        bank_ledger: bank_ledger.to_string(),
        date,
        description: description.to_string(),
        reference: String::new(),
        deposit,
        withdrawal,
        balance: BigDecimal::from(0),
        match_status: MatchStatus::Unmatched,
        matched_voucher_id: None,
    }
}
