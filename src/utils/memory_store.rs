//! In-memory storage implementation for testing and development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory [`SyncStore`] and [`PatientDirectory`], the reference for the
/// upsert keying and field-preservation semantics backends must honor
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    ledgers: Arc<RwLock<HashMap<String, Ledger>>>,
    groups: Arc<RwLock<HashMap<String, LedgerGroup>>>,
    stock_items: Arc<RwLock<HashMap<String, StockItem>>>,
    cost_centres: Arc<RwLock<HashMap<String, CostCentre>>>,
    vouchers: Arc<RwLock<HashMap<String, Voucher>>>,
    sync_logs: Arc<RwLock<Vec<SyncLogEntry>>>,
    statement_lines: Arc<RwLock<HashMap<String, BankStatementLine>>>,
    report_snapshots: Arc<RwLock<HashMap<ReportKind, ReportSnapshot>>>,
    patients: Arc<RwLock<Vec<PatientRef>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.ledgers.write().unwrap().clear();
        self.groups.write().unwrap().clear();
        self.stock_items.write().unwrap().clear();
        self.cost_centres.write().unwrap().clear();
        self.vouchers.write().unwrap().clear();
        self.sync_logs.write().unwrap().clear();
        self.statement_lines.write().unwrap().clear();
        self.report_snapshots.write().unwrap().clear();
        self.patients.write().unwrap().clear();
    }

    /// Register a patient for the auto-map pass
    pub fn add_patient(&self, id: impl Into<String>, name: impl Into<String>) {
        self.patients.write().unwrap().push(PatientRef {
            id: id.into(),
            name: name.into(),
        });
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn upsert_ledger(&self, mut ledger: Ledger) -> SyncResult<()> {
        let mut ledgers = self.ledgers.write().unwrap();

        // GUID is the preferred key; the name is the fallback
        let existing_key = ledger
            .guid
            .as_deref()
            .and_then(|guid| {
                ledgers
                    .values()
                    .find(|l| l.guid.as_deref() == Some(guid))
                    .map(|l| l.name.clone())
            })
            .or_else(|| ledgers.contains_key(&ledger.name).then(|| ledger.name.clone()));

        if let Some(key) = existing_key {
            if let Some(existing) = ledgers.remove(&key) {
                // The mapping link is locally owned; a re-sync must not wipe it
                if ledger.mapped_entity.is_none() {
                    ledger.mapped_entity = existing.mapped_entity;
                }
            }
        }

        ledgers.insert(ledger.name.clone(), ledger);
        Ok(())
    }

    async fn get_ledger(&self, name: &str) -> SyncResult<Option<Ledger>> {
        Ok(self.ledgers.read().unwrap().get(name).cloned())
    }

    async fn list_ledgers(&self) -> SyncResult<Vec<Ledger>> {
        Ok(self.ledgers.read().unwrap().values().cloned().collect())
    }

    async fn update_ledger(&self, ledger: &Ledger) -> SyncResult<()> {
        let mut ledgers = self.ledgers.write().unwrap();
        if ledgers.contains_key(&ledger.name) {
            ledgers.insert(ledger.name.clone(), ledger.clone());
            Ok(())
        } else {
            Err(SyncError::LedgerNotFound(ledger.name.clone()))
        }
    }

    async fn upsert_group(&self, group: LedgerGroup) -> SyncResult<()> {
        self.groups
            .write()
            .unwrap()
            .insert(group.name.clone(), group);
        Ok(())
    }

    async fn list_groups(&self) -> SyncResult<Vec<LedgerGroup>> {
        Ok(self.groups.read().unwrap().values().cloned().collect())
    }

    async fn upsert_stock_item(&self, item: StockItem) -> SyncResult<()> {
        let mut items = self.stock_items.write().unwrap();

        let existing_key = item
            .guid
            .as_deref()
            .and_then(|guid| {
                items
                    .values()
                    .find(|i| i.guid.as_deref() == Some(guid))
                    .map(|i| i.name.clone())
            })
            .or_else(|| items.contains_key(&item.name).then(|| item.name.clone()));

        if let Some(key) = existing_key {
            items.remove(&key);
        }
        items.insert(item.name.clone(), item);
        Ok(())
    }

    async fn list_stock_items(&self) -> SyncResult<Vec<StockItem>> {
        Ok(self.stock_items.read().unwrap().values().cloned().collect())
    }

    async fn upsert_cost_centre(&self, mut cost_centre: CostCentre) -> SyncResult<()> {
        let mut cost_centres = self.cost_centres.write().unwrap();
        if let Some(existing) = cost_centres.remove(&cost_centre.name) {
            if cost_centre.mapped_business_id.is_none() {
                cost_centre.mapped_business_id = existing.mapped_business_id;
            }
        }
        cost_centres.insert(cost_centre.name.clone(), cost_centre);
        Ok(())
    }

    async fn get_cost_centre(&self, name: &str) -> SyncResult<Option<CostCentre>> {
        Ok(self.cost_centres.read().unwrap().get(name).cloned())
    }

    async fn update_cost_centre(&self, cost_centre: &CostCentre) -> SyncResult<()> {
        let mut cost_centres = self.cost_centres.write().unwrap();
        if cost_centres.contains_key(&cost_centre.name) {
            cost_centres.insert(cost_centre.name.clone(), cost_centre.clone());
            Ok(())
        } else {
            Err(SyncError::Storage(format!(
                "cost centre '{}' does not exist",
                cost_centre.name
            )))
        }
    }

    async fn upsert_voucher(&self, mut voucher: Voucher) -> SyncResult<()> {
        let mut vouchers = self.vouchers.write().unwrap();

        // GUID first, voucher number as the natural-key fallback
        let existing_id = voucher
            .guid
            .as_deref()
            .and_then(|guid| {
                vouchers
                    .values()
                    .find(|v| v.guid.as_deref() == Some(guid))
                    .map(|v| v.id.clone())
            })
            .or_else(|| {
                if voucher.number.is_empty() {
                    return None;
                }
                vouchers
                    .values()
                    .find(|v| v.number == voucher.number)
                    .map(|v| v.id.clone())
            });

        if let Some(id) = existing_id {
            if let Some(existing) = vouchers.remove(&id) {
                // Locally owned fields survive a refresh from the server
                voucher.id = existing.id;
                voucher.direction = existing.direction;
                if voucher.linked_record.is_none() {
                    voucher.linked_record = existing.linked_record;
                }
                voucher.created_at = existing.created_at;
            }
        }

        vouchers.insert(voucher.id.clone(), voucher);
        Ok(())
    }

    async fn save_voucher(&self, voucher: &Voucher) -> SyncResult<()> {
        self.vouchers
            .write()
            .unwrap()
            .insert(voucher.id.clone(), voucher.clone());
        Ok(())
    }

    async fn get_voucher(&self, id: &str) -> SyncResult<Option<Voucher>> {
        Ok(self.vouchers.read().unwrap().get(id).cloned())
    }

    async fn list_vouchers(&self) -> SyncResult<Vec<Voucher>> {
        Ok(self.vouchers.read().unwrap().values().cloned().collect())
    }

    async fn list_vouchers_by_status(
        &self,
        direction: SyncDirection,
        status: SyncStatus,
    ) -> SyncResult<Vec<Voucher>> {
        Ok(self
            .vouchers
            .read()
            .unwrap()
            .values()
            .filter(|v| v.direction == direction && v.status == status)
            .cloned()
            .collect())
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> SyncResult<()> {
        self.sync_logs.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn update_sync_log(&self, entry: &SyncLogEntry) -> SyncResult<()> {
        let mut logs = self.sync_logs.write().unwrap();
        match logs.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => {
                *slot = entry.clone();
                Ok(())
            }
            None => Err(SyncError::Storage(format!(
                "sync log entry '{}' does not exist",
                entry.id
            ))),
        }
    }

    async fn recent_sync_logs(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        let logs = self.sync_logs.read().unwrap();
        Ok(logs.iter().rev().take(limit).cloned().collect())
    }

    async fn save_statement_line(&self, line: &BankStatementLine) -> SyncResult<()> {
        self.statement_lines
            .write()
            .unwrap()
            .insert(line.id.clone(), line.clone());
        Ok(())
    }

    async fn get_statement_line(&self, id: &str) -> SyncResult<Option<BankStatementLine>> {
        Ok(self.statement_lines.read().unwrap().get(id).cloned())
    }

    async fn list_statement_lines(
        &self,
        bank_ledger: Option<&str>,
    ) -> SyncResult<Vec<BankStatementLine>> {
        Ok(self
            .statement_lines
            .read()
            .unwrap()
            .values()
            .filter(|line| bank_ledger.map_or(true, |name| line.bank_ledger == name))
            .cloned()
            .collect())
    }

    async fn save_report_snapshot(&self, snapshot: &ReportSnapshot) -> SyncResult<()> {
        self.report_snapshots
            .write()
            .unwrap()
            .insert(snapshot.kind, snapshot.clone());
        Ok(())
    }

    async fn get_report_snapshot(&self, kind: ReportKind) -> SyncResult<Option<ReportSnapshot>> {
        Ok(self.report_snapshots.read().unwrap().get(&kind).cloned())
    }
}

#[async_trait]
impl PatientDirectory for MemoryStore {
    async fn list_patients(&self) -> SyncResult<Vec<PatientRef>> {
        Ok(self.patients.read().unwrap().clone())
    }
}
