//! Storage abstraction for the sync engine
//!
//! These traits let the engine work with any relational backend by
//! implementing keyed "insert or update by natural key" semantics. The
//! in-memory implementation under [`crate::utils`] is the reference for the
//! required behavior.

use async_trait::async_trait;

use crate::types::*;

/// Persistence abstraction for synchronized entities.
///
/// Upsert methods key primarily on the external GUID when present and fall
/// back to the natural key (name, or voucher number), so repeated sync cycles
/// are idempotent and never create duplicate rows for the same external
/// record. An upsert of an existing row must preserve locally owned fields:
/// the mapping link on ledgers and cost centres, and the local id,
/// reconciliation link and business-record link on vouchers.
///
/// Each record key is independent; there is no multi-record transaction
/// requirement because every upsert is a complete, self-contained unit.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Insert or update a ledger, keyed by GUID with name fallback
    async fn upsert_ledger(&self, ledger: Ledger) -> SyncResult<()>;

    /// Get a ledger by name
    async fn get_ledger(&self, name: &str) -> SyncResult<Option<Ledger>>;

    /// List all ledgers
    async fn list_ledgers(&self) -> SyncResult<Vec<Ledger>>;

    /// Overwrite an existing ledger (mapping resolver writes)
    async fn update_ledger(&self, ledger: &Ledger) -> SyncResult<()>;

    /// Insert or update a group, keyed by name
    async fn upsert_group(&self, group: LedgerGroup) -> SyncResult<()>;

    /// List all groups
    async fn list_groups(&self) -> SyncResult<Vec<LedgerGroup>>;

    /// Insert or update a stock item, keyed by GUID with name fallback
    async fn upsert_stock_item(&self, item: StockItem) -> SyncResult<()>;

    /// List all stock items
    async fn list_stock_items(&self) -> SyncResult<Vec<StockItem>>;

    /// Insert or update a cost centre, keyed by name
    async fn upsert_cost_centre(&self, cost_centre: CostCentre) -> SyncResult<()>;

    /// Get a cost centre by name
    async fn get_cost_centre(&self, name: &str) -> SyncResult<Option<CostCentre>>;

    /// Overwrite an existing cost centre (mapping resolver writes)
    async fn update_cost_centre(&self, cost_centre: &CostCentre) -> SyncResult<()>;

    /// Insert or update a voucher, keyed by GUID with voucher-number fallback
    async fn upsert_voucher(&self, voucher: Voucher) -> SyncResult<()>;

    /// Overwrite an existing voucher by local id (push pipeline transitions)
    async fn save_voucher(&self, voucher: &Voucher) -> SyncResult<()>;

    /// Get a voucher by local id
    async fn get_voucher(&self, id: &str) -> SyncResult<Option<Voucher>>;

    /// List all vouchers
    async fn list_vouchers(&self) -> SyncResult<Vec<Voucher>>;

    /// List vouchers filtered by direction and status
    async fn list_vouchers_by_status(
        &self,
        direction: SyncDirection,
        status: SyncStatus,
    ) -> SyncResult<Vec<Voucher>>;

    /// Append a sync log entry (append-only)
    async fn append_sync_log(&self, entry: &SyncLogEntry) -> SyncResult<()>;

    /// Update a previously appended sync log entry by id
    async fn update_sync_log(&self, entry: &SyncLogEntry) -> SyncResult<()>;

    /// Most recent sync log entries, newest first
    async fn recent_sync_logs(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>>;

    /// Insert or overwrite a bank statement line by id
    async fn save_statement_line(&self, line: &BankStatementLine) -> SyncResult<()>;

    /// Get a bank statement line by id
    async fn get_statement_line(&self, id: &str) -> SyncResult<Option<BankStatementLine>>;

    /// List statement lines, optionally restricted to one bank ledger
    async fn list_statement_lines(
        &self,
        bank_ledger: Option<&str>,
    ) -> SyncResult<Vec<BankStatementLine>>;

    /// Cache a report snapshot, replacing any previous one of the same kind
    async fn save_report_snapshot(&self, snapshot: &ReportSnapshot) -> SyncResult<()>;

    /// Get the cached snapshot for a report kind
    async fn get_report_snapshot(&self, kind: ReportKind) -> SyncResult<Option<ReportSnapshot>>;
}

/// Read access to the hospital's patient register, used by the auto-map pass
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// All patients eligible for ledger mapping
    async fn list_patients(&self) -> SyncResult<Vec<PatientRef>>;
}
