//! Facade tying the sync engine together for the UI layer
//!
//! The admin UI talks JSON; this module translates its push and sync
//! requests into engine calls and hands back serializable outcomes.

use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::mapping::MappingResolver;
use crate::reconciliation::Reconciler;
use crate::sync::{AutoSyncScheduler, PushPipeline, SchedulerStatus, SyncOrchestrator, SyncTarget};
use crate::traits::{PatientDirectory, SyncStore};
use crate::transport::Transport;
use crate::types::*;

/// Inclusive report/voucher period, ISO dates on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Body of the UI sync endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// One of `groups`, `ledgers`, `stock`, `vouchers`, `reports`, `full`
    pub action: String,
    pub server_url: String,
    pub company_name: String,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

/// Body of the UI push endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub action: String,
    pub server_url: String,
    pub company_name: String,
    pub data: serde_json::Value,
}

/// A voucher as the UI submits it, before local ids and sync state exist
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherDraft {
    pub number: String,
    #[serde(default)]
    pub voucher_type: Option<String>,
    pub date: NaiveDate,
    pub party_ledger: String,
    #[serde(default)]
    pub narration: String,
    pub entries: Vec<EntryDraft>,
    #[serde(default)]
    pub linked_record: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub ledger_name: String,
    pub amount: BigDecimal,
    pub entry_type: EntryType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoucherIdRef {
    voucher_id: String,
}

/// Everything the admin UI needs, behind one handle.
pub struct TallyBridge<S, P, T>
where
    S: SyncStore + Clone + 'static,
    P: PatientDirectory,
    T: Transport + 'static,
{
    store: S,
    orchestrator: Arc<SyncOrchestrator<S, Arc<T>>>,
    pipeline: PushPipeline<S, Arc<T>>,
    reconciler: Reconciler<S>,
    resolver: MappingResolver<S, P>,
    scheduler: AutoSyncScheduler<S, Arc<T>>,
}

impl<S, P, T> TallyBridge<S, P, T>
where
    S: SyncStore + Clone + 'static,
    P: PatientDirectory,
    T: Transport + 'static,
{
    pub fn new(store: S, patients: P, transport: T) -> Self {
        let transport = Arc::new(transport);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            Arc::clone(&transport),
        ));
        Self {
            pipeline: PushPipeline::new(store.clone(), Arc::clone(&transport)),
            reconciler: Reconciler::new(store.clone()),
            resolver: MappingResolver::new(store.clone(), patients),
            scheduler: AutoSyncScheduler::new(Arc::clone(&orchestrator)),
            orchestrator,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    pub fn resolver(&self) -> &MappingResolver<S, P> {
        &self.resolver
    }

    /// Dispatch one sync request from the UI.
    pub async fn handle_sync(&self, request: SyncRequest) -> SyncResult<SyncSummary> {
        let kind = SyncKind::from_action(&request.action).ok_or_else(|| {
            SyncError::Validation(format!("unknown sync action '{}'", request.action))
        })?;
        let target = SyncTarget::new(request.server_url, request.company_name);
        let range = request.date_range.map(|r| (r.from, r.to));
        self.orchestrator.sync(&target, kind, range).await
    }

    /// Dispatch one push request from the UI. The response payload mirrors
    /// what the action produced: the voucher with its new sync state, or the
    /// import counts for a master.
    pub async fn handle_push(&self, request: PushRequest) -> SyncResult<serde_json::Value> {
        let target = SyncTarget::new(request.server_url, request.company_name);
        match request.action.as_str() {
            "create-ledger" => {
                let ledger: Ledger = decode(request.data)?;
                let result = self.pipeline.create_ledger(&target, ledger).await?;
                Ok(serde_json::json!({
                    "created": result.created,
                    "altered": result.altered,
                }))
            }
            "create-cost-centre" => {
                let cost_centre: CostCentre = decode(request.data)?;
                let result = self.pipeline.create_cost_centre(&target, cost_centre).await?;
                Ok(serde_json::json!({
                    "created": result.created,
                    "altered": result.altered,
                }))
            }
            "create-voucher" => {
                let draft: VoucherDraft = decode(request.data)?;
                let voucher_type = draft
                    .voucher_type
                    .as_deref()
                    .map(VoucherType::from_name)
                    .unwrap_or(VoucherType::Journal);
                self.push_draft(&target, draft, voucher_type).await
            }
            "create-sales-voucher" => {
                let draft: VoucherDraft = decode(request.data)?;
                self.push_draft(&target, draft, VoucherType::Sales).await
            }
            "create-receipt-voucher" => {
                let draft: VoucherDraft = decode(request.data)?;
                self.push_draft(&target, draft, VoucherType::Receipt).await
            }
            "alter-voucher" => {
                let id: VoucherIdRef = decode(request.data)?;
                let voucher = self.pipeline.alter(&target, &id.voucher_id).await?;
                encode(&voucher)
            }
            "cancel-voucher" => {
                let id: VoucherIdRef = decode(request.data)?;
                let voucher = self.pipeline.cancel(&target, &id.voucher_id).await?;
                encode(&voucher)
            }
            other => Err(SyncError::Validation(format!(
                "unknown push action '{other}'"
            ))),
        }
    }

    /// Create a pending voucher from a builder and push it immediately.
    pub async fn push_voucher(&self, target: &SyncTarget, voucher: Voucher) -> SyncResult<Voucher> {
        self.store.save_voucher(&voucher).await?;
        self.pipeline.push(target, &voucher.id).await
    }

    /// Re-push every failed outbound voucher.
    pub async fn retry_failed(&self, target: &SyncTarget) -> SyncResult<Vec<Voucher>> {
        self.pipeline.retry_failed(target).await
    }

    /// Most recent sync cycles, newest first.
    pub async fn recent_sync_logs(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        self.store.recent_sync_logs(limit).await
    }

    pub fn last_sync(&self) -> Option<chrono::NaiveDateTime> {
        self.orchestrator.last_sync()
    }

    /// Enable interval-driven full sync against `target`.
    pub fn enable_auto_sync(&self, target: SyncTarget, interval: Duration) {
        self.scheduler.start(target, interval);
    }

    pub fn disable_auto_sync(&self) {
        self.scheduler.stop();
    }

    pub fn auto_sync_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    async fn push_draft(
        &self,
        target: &SyncTarget,
        draft: VoucherDraft,
        voucher_type: VoucherType,
    ) -> SyncResult<serde_json::Value> {
        let mut builder = VoucherBuilder::new(
            draft.number,
            voucher_type,
            draft.date,
            draft.party_ledger,
        )
        .narration(draft.narration);
        if let Some(record) = draft.linked_record {
            builder = builder.linked_record(record);
        }
        for entry in draft.entries {
            builder = match entry.entry_type {
                EntryType::Debit => builder.debit(entry.ledger_name, entry.amount),
                EntryType::Credit => builder.credit(entry.ledger_name, entry.amount),
            };
        }
        let voucher = builder.build()?;
        let pushed = self.push_voucher(target, voucher).await?;
        encode(&pushed)
    }
}

fn decode<D: serde::de::DeserializeOwned>(data: serde_json::Value) -> SyncResult<D> {
    serde_json::from_value(data)
        .map_err(|err| SyncError::Validation(format!("malformed request data: {err}")))
}

fn encode<E: Serialize>(value: &E) -> SyncResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|err| SyncError::Storage(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockTransport {
        replies: Mutex<Vec<SyncResult<String>>>,
    }

    impl MockTransport {
        fn new(mut replies: Vec<SyncResult<String>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, _server_url: &str, _xml_body: String) -> SyncResult<String> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(SyncError::Connection("no scripted reply".to_string())))
        }
    }

    const ACCEPTED: &str =
        "<ENVELOPE><CREATED>1</CREATED><ALTERED>0</ALTERED><ERRORS>0</ERRORS></ENVELOPE>";

    fn bridge(
        replies: Vec<SyncResult<String>>,
    ) -> TallyBridge<MemoryStore, MemoryStore, MockTransport> {
        let store = MemoryStore::new();
        TallyBridge::new(store.clone(), store, MockTransport::new(replies))
    }

    #[tokio::test]
    async fn sync_request_dispatches_by_action() {
        let bridge = bridge(vec![Ok(
            "<ENVELOPE><GROUP><NAME>Sundry Debtors</NAME></GROUP></ENVELOPE>".to_string(),
        )]);
        let summary = bridge
            .handle_sync(SyncRequest {
                action: "groups".to_string(),
                server_url: "http://localhost:9000".to_string(),
                company_name: "Test Hospital".to_string(),
                date_range: None,
            })
            .await
            .unwrap();
        assert_eq!(summary.kind, SyncKind::Groups);
        assert_eq!(summary.records_synced, 1);

        let unknown = bridge
            .handle_sync(SyncRequest {
                action: "everything".to_string(),
                server_url: String::new(),
                company_name: String::new(),
                date_range: None,
            })
            .await;
        assert!(matches!(unknown, Err(SyncError::Validation(_))));
    }

    #[tokio::test]
    async fn receipt_push_round_trips_through_json() {
        let bridge = bridge(vec![Ok(ACCEPTED.to_string())]);
        let request = PushRequest {
            action: "create-receipt-voucher".to_string(),
            server_url: "http://localhost:9000".to_string(),
            company_name: "Test Hospital".to_string(),
            data: serde_json::json!({
                "number": "RV-9",
                "date": "2024-06-10",
                "partyLedger": "John Doe",
                "narration": "Bill settlement",
                "linkedRecord": "invoice-42",
                "entries": [
                    {"ledgerName": "HDFC Bank", "amount": "750", "entryType": "debit"},
                    {"ledgerName": "John Doe", "amount": "750", "entryType": "credit"},
                ],
            }),
        };

        let payload = bridge.handle_push(request).await.unwrap();
        assert_eq!(payload["status"], serde_json::json!("synced"));
        assert_eq!(payload["voucher_type"], serde_json::json!("Receipt"));

        let vouchers = bridge.store().list_vouchers().await.unwrap();
        assert_eq!(vouchers.len(), 1);
        assert_eq!(vouchers[0].linked_record.as_deref(), Some("invoice-42"));
        assert_eq!(vouchers[0].amount, BigDecimal::from(750));
    }

    #[tokio::test]
    async fn unbalanced_draft_is_rejected_before_the_wire() {
        let bridge = bridge(vec![Ok(ACCEPTED.to_string())]);
        let request = PushRequest {
            action: "create-voucher".to_string(),
            server_url: "http://localhost:9000".to_string(),
            company_name: "Test Hospital".to_string(),
            data: serde_json::json!({
                "number": "JV-1",
                "voucherType": "Journal",
                "date": "2024-06-10",
                "partyLedger": "John Doe",
                "entries": [
                    {"ledgerName": "HDFC Bank", "amount": "100", "entryType": "debit"},
                    {"ledgerName": "John Doe", "amount": "90", "entryType": "credit"},
                ],
            }),
        };
        let err = bridge.handle_push(request).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn cancel_action_resolves_a_voucher_reference() {
        let bridge = bridge(vec![Ok(ACCEPTED.to_string()), Ok(ACCEPTED.to_string())]);
        let voucher = VoucherBuilder::new(
            "RV-1",
            VoucherType::Receipt,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "John Doe",
        )
        .debit("HDFC Bank", BigDecimal::from(100))
        .credit("John Doe", BigDecimal::from(100))
        .build()
        .unwrap();
        let target = SyncTarget::new("http://localhost:9000", "Test Hospital");
        bridge.push_voucher(&target, voucher.clone()).await.unwrap();

        let payload = bridge
            .handle_push(PushRequest {
                action: "cancel-voucher".to_string(),
                server_url: "http://localhost:9000".to_string(),
                company_name: "Test Hospital".to_string(),
                data: serde_json::json!({ "voucherId": voucher.id }),
            })
            .await
            .unwrap();
        assert_eq!(payload["is_cancelled"], serde_json::json!(true));
    }
}
