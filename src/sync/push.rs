//! Outbound push of locally created records to the external server

use crate::codec::{
    build_import_request, build_voucher_import_request, cost_centre_fragment,
    create_voucher_fragment, ledger_fragment, parse_import_result, voucher_fragment, ImportAction,
    ImportResult,
};
use crate::sync::SyncTarget;
use crate::traits::SyncStore;
use crate::transport::Transport;
use crate::types::*;

/// Pushes pending vouchers and locally created masters.
///
/// A failed push always leaves the voucher pushable again; retries are
/// explicit and user-initiated, never automatic, so a flaky network cannot
/// create duplicate vouchers on the external server.
pub struct PushPipeline<S, T> {
    store: S,
    transport: T,
}

impl<S: SyncStore, T: Transport> PushPipeline<S, T> {
    pub fn new(store: S, transport: T) -> Self {
        Self { store, transport }
    }

    /// Attempt to create one pending voucher on the external server.
    ///
    /// The returned voucher carries the outcome: `synced` with the error
    /// cleared, or `failed` with the message stored.
    pub async fn push(&self, target: &SyncTarget, voucher_id: &str) -> SyncResult<Voucher> {
        let voucher = self
            .store
            .get_voucher(voucher_id)
            .await?
            .ok_or_else(|| SyncError::VoucherNotFound(voucher_id.to_string()))?;

        if let Err(err) = voucher.validate() {
            return self.record_failure(voucher, err.to_string()).await;
        }

        let request =
            build_voucher_import_request(&target.company, &create_voucher_fragment(&voucher));
        self.send_voucher(target, voucher, request).await
    }

    /// Re-push an already-synced voucher as an `Alter`, keyed by its number.
    pub async fn alter(&self, target: &SyncTarget, voucher_id: &str) -> SyncResult<Voucher> {
        let voucher = self
            .store
            .get_voucher(voucher_id)
            .await?
            .ok_or_else(|| SyncError::VoucherNotFound(voucher_id.to_string()))?;

        let request = build_voucher_import_request(
            &target.company,
            &voucher_fragment(&voucher, ImportAction::Alter),
        );
        self.send_voucher(target, voucher, request).await
    }

    /// Cancel a voucher on the external server. The local record is never
    /// deleted; `is_cancelled` flips only on confirmed success.
    pub async fn cancel(&self, target: &SyncTarget, voucher_id: &str) -> SyncResult<Voucher> {
        let mut voucher = self
            .store
            .get_voucher(voucher_id)
            .await?
            .ok_or_else(|| SyncError::VoucherNotFound(voucher_id.to_string()))?;

        let request = build_voucher_import_request(
            &target.company,
            &voucher_fragment(&voucher, ImportAction::Cancel),
        );
        match self.transport.send(&target.server_url, request).await {
            Ok(response) => {
                let result = parse_import_result(&response);
                if result.is_success() {
                    voucher.is_cancelled = true;
                    self.record_success(voucher).await
                } else {
                    self.record_failure(voucher, result.errors.join("; ")).await
                }
            }
            Err(err) => self.record_failure(voucher, err.to_string()).await,
        }
    }

    /// Reload every failed outbound voucher, reset it to pending and re-push.
    pub async fn retry_failed(&self, target: &SyncTarget) -> SyncResult<Vec<Voucher>> {
        let failed = self
            .store
            .list_vouchers_by_status(SyncDirection::ToExternal, SyncStatus::Failed)
            .await?;

        let mut results = Vec::with_capacity(failed.len());
        for mut voucher in failed {
            voucher.status = SyncStatus::Pending;
            voucher.updated_at = chrono::Utc::now().naive_utc();
            self.store.save_voucher(&voucher).await?;
            results.push(self.push(target, &voucher.id).await?);
        }
        Ok(results)
    }

    /// Create a ledger master on the external server and store it locally.
    pub async fn create_ledger(&self, target: &SyncTarget, ledger: Ledger) -> SyncResult<ImportResult> {
        let request = build_import_request(&target.company, &ledger_fragment(&ledger));
        let result = self.import_master(target, request).await?;
        self.store.upsert_ledger(ledger).await?;
        Ok(result)
    }

    /// Create a cost centre master on the external server and store it locally.
    pub async fn create_cost_centre(
        &self,
        target: &SyncTarget,
        cost_centre: CostCentre,
    ) -> SyncResult<ImportResult> {
        let request = build_import_request(&target.company, &cost_centre_fragment(&cost_centre));
        let result = self.import_master(target, request).await?;
        self.store.upsert_cost_centre(cost_centre).await?;
        Ok(result)
    }

    async fn import_master(&self, target: &SyncTarget, request: String) -> SyncResult<ImportResult> {
        let response = self.transport.send(&target.server_url, request).await?;
        let result = parse_import_result(&response);
        if result.is_success() {
            Ok(result)
        } else if result.errors.is_empty() {
            Err(SyncError::ImportRejected(vec![
                "request was ignored: nothing created or altered".to_string(),
            ]))
        } else {
            Err(SyncError::ImportRejected(result.errors))
        }
    }

    async fn send_voucher(
        &self,
        target: &SyncTarget,
        voucher: Voucher,
        request: String,
    ) -> SyncResult<Voucher> {
        match self.transport.send(&target.server_url, request).await {
            Ok(response) => {
                let result = parse_import_result(&response);
                if result.is_success() {
                    self.record_success(voucher).await
                } else if result.errors.is_empty() {
                    self.record_failure(
                        voucher,
                        "request was ignored: nothing created or altered".to_string(),
                    )
                    .await
                } else {
                    self.record_failure(voucher, result.errors.join("; ")).await
                }
            }
            Err(err) => self.record_failure(voucher, err.to_string()).await,
        }
    }

    async fn record_success(&self, mut voucher: Voucher) -> SyncResult<Voucher> {
        voucher.status = SyncStatus::Synced;
        voucher.error = None;
        voucher.updated_at = chrono::Utc::now().naive_utc();
        log::info!("voucher {} pushed", voucher.number);
        self.store.save_voucher(&voucher).await?;
        Ok(voucher)
    }

    async fn record_failure(&self, mut voucher: Voucher, message: String) -> SyncResult<Voucher> {
        voucher.status = SyncStatus::Failed;
        voucher.error = Some(message);
        voucher.updated_at = chrono::Utc::now().naive_utc();
        log::warn!(
            "voucher {} push failed: {}",
            voucher.number,
            voucher.error.as_deref().unwrap_or_default()
        );
        self.store.save_voucher(&voucher).await?;
        Ok(voucher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryStore;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct MockTransport {
        replies: Mutex<Vec<SyncResult<String>>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(mut replies: Vec<SyncResult<String>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, _server_url: &str, xml_body: String) -> SyncResult<String> {
            self.requests.lock().unwrap().push(xml_body);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(SyncError::Connection("no scripted reply".to_string())))
        }
    }

    const ACCEPTED: &str =
        "<ENVELOPE><CREATED>1</CREATED><ALTERED>0</ALTERED><ERRORS>0</ERRORS></ENVELOPE>";
    const IGNORED: &str =
        "<ENVELOPE><CREATED>0</CREATED><ALTERED>0</ALTERED><ERRORS>0</ERRORS></ENVELOPE>";

    fn target() -> SyncTarget {
        SyncTarget::new("http://localhost:9000", "Test Hospital")
    }

    async fn pending_receipt(store: &MemoryStore) -> Voucher {
        let voucher = VoucherBuilder::new(
            "RV-1",
            VoucherType::Receipt,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "John Doe",
        )
        .debit("HDFC Bank", BigDecimal::from(750))
        .credit("John Doe", BigDecimal::from(750))
        .narration("Bill settlement")
        .build()
        .unwrap();
        store.save_voucher(&voucher).await.unwrap();
        voucher
    }

    #[tokio::test]
    async fn successful_push_marks_voucher_synced() {
        let store = MemoryStore::new();
        let voucher = pending_receipt(&store).await;
        let pipeline =
            PushPipeline::new(store.clone(), MockTransport::new(vec![Ok(ACCEPTED.to_string())]));

        let pushed = pipeline.push(&target(), &voucher.id).await.unwrap();
        assert_eq!(pushed.status, SyncStatus::Synced);
        assert!(pushed.error.is_none());

        let stored = store.get_voucher(&voucher.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn rejected_push_stores_message_and_stays_pushable() {
        let store = MemoryStore::new();
        let voucher = pending_receipt(&store).await;
        let rejection = "<ENVELOPE><CREATED>0</CREATED><ERRORS>1</ERRORS>\
            <LINEERROR>Ledger 'John Doe' does not exist!</LINEERROR></ENVELOPE>";
        let pipeline = PushPipeline::new(
            store.clone(),
            MockTransport::new(vec![
                Err(SyncError::Connection("refused".to_string())),
                Ok(rejection.to_string()),
                Ok(ACCEPTED.to_string()),
            ]),
        );

        // Transport failure first
        let after_first = pipeline.push(&target(), &voucher.id).await.unwrap();
        assert_eq!(after_first.status, SyncStatus::Failed);
        assert!(after_first.error.as_deref().unwrap().contains("refused"));

        // Then an import-level rejection
        let after_second = pipeline.push(&target(), &voucher.id).await.unwrap();
        assert_eq!(after_second.status, SyncStatus::Failed);
        assert!(after_second
            .error
            .as_deref()
            .unwrap()
            .contains("does not exist"));

        // Still pushable, and a good reply finally clears the error
        let after_third = pipeline.push(&target(), &voucher.id).await.unwrap();
        assert_eq!(after_third.status, SyncStatus::Synced);
        assert!(after_third.error.is_none());
    }

    #[tokio::test]
    async fn retry_failed_resets_and_repushes_every_failed_voucher() {
        let store = MemoryStore::new();
        let first = pending_receipt(&store).await;
        let mut second = pending_receipt(&store).await;
        second.number = "RV-2".to_string();
        store.save_voucher(&second).await.unwrap();

        for voucher in [&first, &second] {
            let mut failed = voucher.clone();
            failed.status = SyncStatus::Failed;
            failed.error = Some("server offline".to_string());
            store.save_voucher(&failed).await.unwrap();
        }

        let pipeline = PushPipeline::new(
            store.clone(),
            MockTransport::new(vec![Ok(ACCEPTED.to_string()), Ok(ACCEPTED.to_string())]),
        );
        let results = pipeline.retry_failed(&target()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|v| v.status == SyncStatus::Synced));
    }

    #[tokio::test]
    async fn cancel_flips_flag_only_on_confirmed_success() {
        let store = MemoryStore::new();
        let voucher = pending_receipt(&store).await;
        let pipeline = PushPipeline::new(
            store.clone(),
            MockTransport::new(vec![Ok(IGNORED.to_string()), Ok(ACCEPTED.to_string())]),
        );

        let after_ignore = pipeline.cancel(&target(), &voucher.id).await.unwrap();
        assert!(!after_ignore.is_cancelled);
        assert_eq!(after_ignore.status, SyncStatus::Failed);

        let after_cancel = pipeline.cancel(&target(), &voucher.id).await.unwrap();
        assert!(after_cancel.is_cancelled);
        assert_eq!(after_cancel.status, SyncStatus::Synced);

        let requests = pipeline.transport.requests.lock().unwrap();
        assert!(requests[0].contains("ACTION=\"Cancel\""));
    }

    #[tokio::test]
    async fn create_ledger_surfaces_import_rejection() {
        let store = MemoryStore::new();
        let rejection = "<ENVELOPE><CREATED>0</CREATED><ERRORS>1</ERRORS>\
            <LINEERROR>Group 'Nowhere' does not exist!</LINEERROR></ENVELOPE>";
        let pipeline =
            PushPipeline::new(store.clone(), MockTransport::new(vec![Ok(rejection.to_string())]));

        let err = pipeline
            .create_ledger(&target(), Ledger::new("John Doe", "Nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ImportRejected(_)));
        // Nothing stored locally on rejection
        assert!(store.get_ledger("John Doe").await.unwrap().is_none());
    }
}
