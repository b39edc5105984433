//! Core types and data structures for the accounting sync engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types of entries in double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Debit entry - positive under the internal sign convention
    Debit,
    /// Credit entry - positive under the external (Tally) sign convention
    Credit,
}

/// Voucher types understood by the external accounting system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherType {
    Sales,
    Purchase,
    Receipt,
    Payment,
    Journal,
    Contra,
    CreditNote,
    DebitNote,
    /// Any voucher type name this crate does not model explicitly
    Other(String),
}

impl VoucherType {
    /// The type name as the external system spells it
    pub fn as_str(&self) -> &str {
        match self {
            VoucherType::Sales => "Sales",
            VoucherType::Purchase => "Purchase",
            VoucherType::Receipt => "Receipt",
            VoucherType::Payment => "Payment",
            VoucherType::Journal => "Journal",
            VoucherType::Contra => "Contra",
            VoucherType::CreditNote => "Credit Note",
            VoucherType::DebitNote => "Debit Note",
            VoucherType::Other(name) => name,
        }
    }

    /// Parse an external voucher type name; unknown names are preserved verbatim
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Sales" => VoucherType::Sales,
            "Purchase" => VoucherType::Purchase,
            "Receipt" => VoucherType::Receipt,
            "Payment" => VoucherType::Payment,
            "Journal" => VoucherType::Journal,
            "Contra" => VoucherType::Contra,
            "Credit Note" => VoucherType::CreditNote,
            "Debit Note" => VoucherType::DebitNote,
            other => VoucherType::Other(other.to_string()),
        }
    }
}

/// Which side initiated the synchronization of a voucher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Pulled from the external accounting server during an export cycle
    FromExternal,
    /// Created locally and pushed to the external accounting server
    ToExternal,
}

/// Synchronization state of a voucher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
    Conflict,
}

/// Entity kind a sync cycle operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Groups,
    Ledgers,
    Stock,
    Vouchers,
    Reports,
    Full,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Groups => "groups",
            SyncKind::Ledgers => "ledgers",
            SyncKind::Stock => "stock",
            SyncKind::Vouchers => "vouchers",
            SyncKind::Reports => "reports",
            SyncKind::Full => "full",
        }
    }

    /// Parse a sync action name from the UI-facing surface
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "groups" => Some(SyncKind::Groups),
            "ledgers" => Some(SyncKind::Ledgers),
            "stock" => Some(SyncKind::Stock),
            "vouchers" => Some(SyncKind::Vouchers),
            "reports" => Some(SyncKind::Reports),
            "full" => Some(SyncKind::Full),
            _ => None,
        }
    }
}

/// Outcome of one orchestration cycle as recorded in the sync log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    Started,
    Completed,
    Partial,
    Failed,
}

/// Reconciliation state of a bank statement line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Unmatched,
    Matched,
}

/// Financial reports pulled from the external system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    TrialBalance,
    BalanceSheet,
    ProfitAndLoss,
    Receivables,
    Payables,
}

impl ReportKind {
    /// All report kinds fetched during a `reports` cycle, in fetch order
    pub fn all() -> [ReportKind; 5] {
        [
            ReportKind::TrialBalance,
            ReportKind::BalanceSheet,
            ReportKind::ProfitAndLoss,
            ReportKind::Receivables,
            ReportKind::Payables,
        ]
    }

    /// The export report identifier the external system indexes this report under
    pub fn report_id(&self) -> &'static str {
        match self {
            ReportKind::TrialBalance => "Trial Balance",
            ReportKind::BalanceSheet => "Balance Sheet",
            ReportKind::ProfitAndLoss => "Profit and Loss A/c",
            ReportKind::Receivables => "Outstanding Receivables",
            ReportKind::Payables => "Outstanding Payables",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::TrialBalance => "trial_balance",
            ReportKind::BalanceSheet => "balance_sheet",
            ReportKind::ProfitAndLoss => "profit_and_loss",
            ReportKind::Receivables => "receivables",
            ReportKind::Payables => "payables",
        }
    }
}

/// Kind of internal business entity an external record can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Patient,
    Department,
    Doctor,
}

/// Link from an external ledger to an internal business entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedEntity {
    pub entity_type: EntityKind,
    pub entity_id: String,
}

/// Cost centre categories used for departmental attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostCategory {
    Department,
    Ward,
    Doctor,
}

/// An external accounting ledger (account) record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    /// Ledger name - the natural key
    pub name: String,
    /// GUID assigned by the external system - the preferred upsert key
    pub guid: Option<String>,
    /// Parent group name
    pub parent: String,
    /// Opening balance, internal debit-positive convention
    pub opening_balance: BigDecimal,
    /// Closing balance, internal debit-positive convention
    pub closing_balance: BigDecimal,
    pub address: String,
    pub phone: String,
    pub email: String,
    /// GST registration number, carried as data only
    pub gstin: String,
    /// PAN / income tax identifier
    pub pan: String,
    /// Link to an internal business entity, owned by the mapping resolver
    pub mapped_entity: Option<MappedEntity>,
    pub last_synced_at: Option<NaiveDateTime>,
}

impl Ledger {
    /// Create a bare ledger under a parent group
    pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: None,
            parent: parent.into(),
            opening_balance: BigDecimal::from(0),
            closing_balance: BigDecimal::from(0),
            address: String::new(),
            phone: String::new(),
            email: String::new(),
            gstin: String::new(),
            pan: String::new(),
            mapped_entity: None,
            last_synced_at: None,
        }
    }
}

/// An external account group (node in the chart-of-accounts tree)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerGroup {
    pub name: String,
    pub parent: String,
    pub is_revenue: bool,
    pub is_deemed_positive: bool,
    pub last_synced_at: Option<NaiveDateTime>,
}

/// An external stock (inventory) item record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub name: String,
    pub guid: Option<String>,
    pub group: String,
    pub unit: String,
    pub opening_qty: BigDecimal,
    pub closing_qty: BigDecimal,
    pub opening_value: BigDecimal,
    pub closing_value: BigDecimal,
    pub rate: BigDecimal,
    pub gst_rate: BigDecimal,
    pub hsn_code: String,
    pub last_synced_at: Option<NaiveDateTime>,
}

/// One debit or credit line inside a voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherEntry {
    pub ledger_name: String,
    /// Always positive; the side is carried by `entry_type`
    pub amount: BigDecimal,
    pub entry_type: EntryType,
}

impl VoucherEntry {
    pub fn new(ledger_name: impl Into<String>, entry_type: EntryType, amount: BigDecimal) -> Self {
        Self {
            ledger_name: ledger_name.into(),
            amount,
            entry_type,
        }
    }

    /// Create a debit line
    pub fn debit(ledger_name: impl Into<String>, amount: BigDecimal) -> Self {
        Self::new(ledger_name, EntryType::Debit, amount)
    }

    /// Create a credit line
    pub fn credit(ledger_name: impl Into<String>, amount: BigDecimal) -> Self {
        Self::new(ledger_name, EntryType::Credit, amount)
    }

    /// Signed amount under the internal debit-positive convention
    pub fn signed_amount(&self) -> BigDecimal {
        match self.entry_type {
            EntryType::Debit => self.amount.clone(),
            EntryType::Credit => -self.amount.clone(),
        }
    }
}

/// A single accounting transaction, either pulled from or destined for the
/// external system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    /// Local row identifier
    pub id: String,
    /// GUID assigned by the external system; `None` until first synced
    pub guid: Option<String>,
    /// Voucher number - alternate key when no GUID is known
    pub number: String,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    /// Party ledger name (customer / patient / supplier account)
    pub party_ledger: String,
    /// Total amount, derived from the debit lines
    pub amount: BigDecimal,
    pub narration: String,
    /// Non-destructive cancel flag mirroring the external system's semantics
    pub is_cancelled: bool,
    /// Ordered debit/credit lines
    pub entries: Vec<VoucherEntry>,
    pub direction: SyncDirection,
    pub status: SyncStatus,
    /// Message from the last failed push attempt, cleared on success
    pub error: Option<String>,
    /// Optional link back to the business record this voucher was raised from
    pub linked_record: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Voucher {
    /// Sum of all debit lines
    pub fn total_debits(&self) -> BigDecimal {
        self.entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Debit)
            .map(|e| &e.amount)
            .sum()
    }

    /// Sum of all credit lines
    pub fn total_credits(&self) -> BigDecimal {
        self.entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Credit)
            .map(|e| &e.amount)
            .sum()
    }

    /// Check the double-entry invariant (debits = credits)
    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    /// Signed effect of this voucher on one ledger, internal debit-positive
    pub fn ledger_effect(&self, ledger_name: &str) -> BigDecimal {
        self.entries
            .iter()
            .filter(|e| e.ledger_name == ledger_name)
            .map(|e| e.signed_amount())
            .sum()
    }

    /// Whether any entry line touches the given ledger
    pub fn touches_ledger(&self, ledger_name: &str) -> bool {
        self.entries.iter().any(|e| e.ledger_name == ledger_name)
    }

    /// Validate the voucher before pushing it to the external system
    pub fn validate(&self) -> SyncResult<()> {
        if self.entries.len() < 2 {
            return Err(SyncError::Validation(
                "Voucher must have at least two entries for double-entry bookkeeping".to_string(),
            ));
        }

        if !self.is_balanced() {
            return Err(SyncError::Validation(format!(
                "Voucher is not balanced: debits = {}, credits = {}",
                self.total_debits(),
                self.total_credits()
            )));
        }

        for entry in &self.entries {
            if entry.amount <= BigDecimal::from(0) {
                return Err(SyncError::Validation(
                    "Entry amounts must be positive".to_string(),
                ));
            }
            if entry.ledger_name.trim().is_empty() {
                return Err(SyncError::Validation(
                    "Entry ledger name cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for locally created vouchers destined for the external system
#[derive(Debug)]
pub struct VoucherBuilder {
    voucher: Voucher,
}

impl VoucherBuilder {
    pub fn new(
        number: impl Into<String>,
        voucher_type: VoucherType,
        date: NaiveDate,
        party_ledger: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            voucher: Voucher {
                id: Uuid::new_v4().to_string(),
                guid: None,
                number: number.into(),
                voucher_type,
                date,
                party_ledger: party_ledger.into(),
                amount: BigDecimal::from(0),
                narration: String::new(),
                is_cancelled: false,
                entries: Vec::new(),
                direction: SyncDirection::ToExternal,
                status: SyncStatus::Pending,
                error: None,
                linked_record: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn narration(mut self, narration: impl Into<String>) -> Self {
        self.voucher.narration = narration.into();
        self
    }

    /// Link the voucher back to the business record it was raised from
    pub fn linked_record(mut self, record_id: impl Into<String>) -> Self {
        self.voucher.linked_record = Some(record_id.into());
        self
    }

    /// Add a debit line
    pub fn debit(mut self, ledger_name: impl Into<String>, amount: BigDecimal) -> Self {
        self.voucher
            .entries
            .push(VoucherEntry::debit(ledger_name, amount));
        self
    }

    /// Add a credit line
    pub fn credit(mut self, ledger_name: impl Into<String>, amount: BigDecimal) -> Self {
        self.voucher
            .entries
            .push(VoucherEntry::credit(ledger_name, amount));
        self
    }

    pub fn entry(mut self, entry: VoucherEntry) -> Self {
        self.voucher.entries.push(entry);
        self
    }

    /// Validate and build the voucher; its total is derived from the debit lines
    pub fn build(mut self) -> SyncResult<Voucher> {
        self.voucher.validate()?;
        self.voucher.amount = self.voucher.total_debits();
        Ok(self.voucher)
    }
}

/// An external cost centre (department / ward / doctor dimension)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostCentre {
    pub name: String,
    pub parent: String,
    pub category: CostCategory,
    /// Internal department/doctor id, owned by the mapping resolver
    pub mapped_business_id: Option<String>,
    pub last_synced_at: Option<NaiveDateTime>,
}

/// Append-only record of one orchestration cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub kind: SyncKind,
    pub direction: SyncDirection,
    pub status: SyncLogStatus,
    pub records_synced: u32,
    pub records_failed: u32,
    pub errors: Vec<String>,
    pub started_at: NaiveDateTime,
    pub duration_ms: Option<i64>,
}

impl SyncLogEntry {
    /// Open a new log entry with status `started`
    pub fn started(kind: SyncKind, direction: SyncDirection) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            direction,
            status: SyncLogStatus::Started,
            records_synced: 0,
            records_failed: 0,
            errors: Vec::new(),
            started_at: chrono::Utc::now().naive_utc(),
            duration_ms: None,
        }
    }

    /// Close the entry from batch counts, deriving completed/partial/failed
    pub fn finish(&mut self, synced: u32, failed: u32, errors: Vec<String>) {
        self.records_synced = synced;
        self.records_failed = failed;
        self.errors = errors;
        self.status = if failed == 0 && self.errors.is_empty() {
            SyncLogStatus::Completed
        } else if synced > 0 {
            SyncLogStatus::Partial
        } else {
            SyncLogStatus::Failed
        };
        let elapsed = chrono::Utc::now().naive_utc() - self.started_at;
        self.duration_ms = Some(elapsed.num_milliseconds());
    }
}

/// One row of an externally supplied bank statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatementLine {
    pub id: String,
    /// Name of the bank ledger this statement belongs to
    pub bank_ledger: String,
    pub date: NaiveDate,
    pub description: String,
    pub reference: String,
    pub deposit: BigDecimal,
    pub withdrawal: BigDecimal,
    pub balance: BigDecimal,
    pub match_status: MatchStatus,
    /// Local id of the matched voucher, set by the reconciliation matcher
    pub matched_voucher_id: Option<String>,
}

impl BankStatementLine {
    /// Signed amount: deposits positive, withdrawals negative (internal
    /// debit-positive view of the bank ledger)
    pub fn signed_amount(&self) -> BigDecimal {
        if self.deposit > BigDecimal::from(0) {
            self.deposit.clone()
        } else {
            -self.withdrawal.clone()
        }
    }
}

/// Cached copy of a report pulled from the external system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub kind: ReportKind,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Parsed rows; empty when the response could not be interpreted
    pub payload: serde_json::Value,
    /// Raw response, preserved so parsing can be retried without a round-trip
    pub raw_xml: String,
    pub fetched_at: NaiveDateTime,
}

/// A patient known to the hospital system, as seen by the auto-map pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: String,
    pub name: String,
}

/// Aggregated outcome of one sync cycle, always returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub kind: SyncKind,
    pub status: SyncLogStatus,
    pub records_synced: u32,
    pub records_failed: u32,
    pub errors: Vec<String>,
}

impl SyncSummary {
    pub fn empty(kind: SyncKind) -> Self {
        Self {
            kind,
            status: SyncLogStatus::Completed,
            records_synced: 0,
            records_failed: 0,
            errors: Vec::new(),
        }
    }

    /// Fold a sub-cycle result into a `full` summary
    pub fn absorb(&mut self, other: &SyncSummary) {
        self.records_synced += other.records_synced;
        self.records_failed += other.records_failed;
        self.errors.extend(other.errors.iter().cloned());
        self.status = if self.records_failed == 0 && self.errors.is_empty() {
            SyncLogStatus::Completed
        } else if self.records_synced > 0 {
            SyncLogStatus::Partial
        } else {
            SyncLogStatus::Failed
        };
    }
}

/// Errors that can occur in the sync engine
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("import rejected: {}", .0.join("; "))]
    ImportRejected(Vec<String>),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("voucher not found: {0}")]
    VoucherNotFound(String),
    #[error("ledger not found: {0}")]
    LedgerNotFound(String),
    #[error("statement line not found: {0}")]
    StatementLineNotFound(String),
}

impl SyncError {
    /// Create an HTTP error from status and message
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// True for network/server-reachability failures (retried only on
    /// explicit re-trigger, never silently)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::Http { .. }
        )
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voucher_builder_balances_and_derives_amount() {
        let voucher = VoucherBuilder::new(
            "RV-001",
            VoucherType::Receipt,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "John Doe",
        )
        .debit("HDFC Bank", BigDecimal::from(1500))
        .credit("John Doe", BigDecimal::from(1500))
        .narration("Bill payment")
        .build()
        .unwrap();

        assert!(voucher.is_balanced());
        assert_eq!(voucher.amount, BigDecimal::from(1500));
        assert_eq!(voucher.status, SyncStatus::Pending);
        assert_eq!(voucher.direction, SyncDirection::ToExternal);
    }

    #[test]
    fn unbalanced_voucher_is_rejected() {
        let result = VoucherBuilder::new(
            "RV-002",
            VoucherType::Receipt,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "John Doe",
        )
        .debit("HDFC Bank", BigDecimal::from(1500))
        .credit("John Doe", BigDecimal::from(1400))
        .build();

        assert!(matches!(result, Err(SyncError::Validation(_))));
    }

    #[test]
    fn ledger_effect_is_signed_per_entry_side() {
        let voucher = VoucherBuilder::new(
            "PV-001",
            VoucherType::Payment,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "Acme Supplies",
        )
        .debit("Acme Supplies", BigDecimal::from(800))
        .credit("HDFC Bank", BigDecimal::from(800))
        .build()
        .unwrap();

        assert_eq!(voucher.ledger_effect("HDFC Bank"), BigDecimal::from(-800));
        assert_eq!(
            voucher.ledger_effect("Acme Supplies"),
            BigDecimal::from(800)
        );
        assert!(!voucher.touches_ledger("ICICI Bank"));
    }

    #[test]
    fn sync_log_finish_derives_status() {
        let mut log = SyncLogEntry::started(SyncKind::Ledgers, SyncDirection::FromExternal);
        log.finish(10, 0, Vec::new());
        assert_eq!(log.status, SyncLogStatus::Completed);

        let mut log = SyncLogEntry::started(SyncKind::Ledgers, SyncDirection::FromExternal);
        log.finish(7, 3, vec!["bad record".to_string()]);
        assert_eq!(log.status, SyncLogStatus::Partial);

        let mut log = SyncLogEntry::started(SyncKind::Ledgers, SyncDirection::FromExternal);
        log.finish(0, 4, vec!["all bad".to_string()]);
        assert_eq!(log.status, SyncLogStatus::Failed);
        assert!(log.duration_ms.is_some());
    }

    #[test]
    fn statement_line_signed_amount() {
        let mut line = BankStatementLine {
            id: "l1".to_string(),
            bank_ledger: "HDFC Bank".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            description: String::new(),
            reference: String::new(),
            deposit: BigDecimal::from(1000),
            withdrawal: BigDecimal::from(0),
            balance: BigDecimal::from(0),
            match_status: MatchStatus::Unmatched,
            matched_voucher_id: None,
        };
        assert_eq!(line.signed_amount(), BigDecimal::from(1000));

        line.deposit = BigDecimal::from(0);
        line.withdrawal = BigDecimal::from(250);
        assert_eq!(line.signed_amount(), BigDecimal::from(-250));
    }
}
