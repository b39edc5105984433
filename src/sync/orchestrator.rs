//! Pull-cycle orchestration against the external accounting server

use chrono::{NaiveDate, NaiveDateTime};
use std::sync::RwLock;

use crate::codec::{
    build_export_request, parse_cost_centre, parse_group, parse_ledger, parse_report_rows,
    parse_stock_item, parse_voucher, to_tally_date,
};
use crate::traits::SyncStore;
use crate::transport::Transport;
use crate::types::*;

/// Address of one external accounting server instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub server_url: String,
    pub company: String,
}

impl SyncTarget {
    pub fn new(server_url: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            company: company.into(),
        }
    }
}

/// Runs pull cycles: request, extract, parse, upsert, log.
///
/// Requests to one target are issued strictly one at a time; the external
/// server does not tolerate interleaved requests.
pub struct SyncOrchestrator<S, T> {
    store: S,
    transport: T,
    last_sync: RwLock<Option<NaiveDateTime>>,
}

impl<S: SyncStore, T: Transport> SyncOrchestrator<S, T> {
    pub fn new(store: S, transport: T) -> Self {
        Self {
            store,
            transport,
            last_sync: RwLock::new(None),
        }
    }

    /// When the most recent cycle (of any kind) finished, if any
    pub fn last_sync(&self) -> Option<NaiveDateTime> {
        *self.last_sync.read().unwrap()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one sync cycle for `kind` against `target`.
    ///
    /// Transport and parse failures are folded into the returned summary
    /// rather than raised; `Err` is reserved for storage faults.
    pub async fn sync(
        &self,
        target: &SyncTarget,
        kind: SyncKind,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> SyncResult<SyncSummary> {
        let summary = match kind {
            SyncKind::Groups | SyncKind::Ledgers | SyncKind::Stock | SyncKind::Vouchers => {
                self.pull_entities(target, kind, date_range).await?
            }
            SyncKind::Reports => self.pull_reports(target, date_range).await?,
            SyncKind::Full => self.pull_full(target, date_range).await?,
        };
        *self.last_sync.write().unwrap() = Some(chrono::Utc::now().naive_utc());
        Ok(summary)
    }

    /// Groups before ledgers: ledger records reference group names.
    /// A sub-step failure is recorded and the remaining steps still run.
    async fn pull_full(
        &self,
        target: &SyncTarget,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> SyncResult<SyncSummary> {
        let mut total = SyncSummary::empty(SyncKind::Full);
        for kind in [
            SyncKind::Groups,
            SyncKind::Ledgers,
            SyncKind::Stock,
            SyncKind::Vouchers,
        ] {
            let summary = self.pull_entities(target, kind, date_range).await?;
            total.absorb(&summary);
        }
        let reports = self.pull_reports(target, date_range).await?;
        total.absorb(&reports);
        Ok(total)
    }

    async fn pull_entities(
        &self,
        target: &SyncTarget,
        kind: SyncKind,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> SyncResult<SyncSummary> {
        let mut log = SyncLogEntry::started(kind, SyncDirection::FromExternal);
        self.store.append_sync_log(&log).await?;
        log::info!("sync {} started from {}", kind.as_str(), target.server_url);

        let request = build_export_request(
            export_report_id(kind),
            &target.company,
            &date_vars(kind, date_range),
        );

        let (synced, failed, errors) = match self.transport.send(&target.server_url, request).await
        {
            Ok(response) => self.ingest(kind, &response).await,
            Err(err) => {
                log::warn!("sync {} transport failure: {}", kind.as_str(), err);
                (0, 0, vec![err.to_string()])
            }
        };

        log.finish(synced, failed, errors);
        self.store.update_sync_log(&log).await?;
        log::info!(
            "sync {} finished: {} synced, {} failed",
            kind.as_str(),
            synced,
            failed
        );
        Ok(summary_of(&log))
    }

    /// Upsert every extracted element independently; one malformed record
    /// never blocks the rest of the batch.
    async fn ingest(&self, kind: SyncKind, response: &str) -> (u32, u32, Vec<String>) {
        let mut synced = 0;
        let mut failed = 0;
        let mut errors = Vec::new();

        let fragments = crate::codec::extract_elements(response, element_tag(kind));
        for fragment in &fragments {
            let result = match kind {
                SyncKind::Groups => self.store.upsert_group(parse_group(fragment)).await,
                SyncKind::Ledgers => self.store.upsert_ledger(parse_ledger(fragment)).await,
                SyncKind::Stock => self.store.upsert_stock_item(parse_stock_item(fragment)).await,
                SyncKind::Vouchers => {
                    let mut voucher = parse_voucher(fragment);
                    // The envelope carries no total; derive it from the debit lines
                    voucher.amount = voucher.total_debits();
                    self.store.upsert_voucher(voucher).await
                }
                SyncKind::Reports | SyncKind::Full => unreachable!("handled by dedicated cycles"),
            };
            match result {
                Ok(()) => synced += 1,
                Err(err) => {
                    failed += 1;
                    errors.push(err.to_string());
                }
            }
        }

        // Cost centres ride along with the masters export
        if kind == SyncKind::Ledgers {
            for fragment in crate::codec::extract_elements(response, "COSTCENTRE") {
                match self
                    .store
                    .upsert_cost_centre(parse_cost_centre(&fragment))
                    .await
                {
                    Ok(()) => synced += 1,
                    Err(err) => {
                        failed += 1;
                        errors.push(err.to_string());
                    }
                }
            }
        }

        (synced, failed, errors)
    }

    /// Five fixed report pulls, each independent. The snapshot keeps the raw
    /// response even when no rows could be parsed so parsing can be retried
    /// without a new round-trip.
    async fn pull_reports(
        &self,
        target: &SyncTarget,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> SyncResult<SyncSummary> {
        let mut log = SyncLogEntry::started(SyncKind::Reports, SyncDirection::FromExternal);
        self.store.append_sync_log(&log).await?;

        let mut synced = 0;
        let mut failed = 0;
        let mut errors = Vec::new();

        for kind in ReportKind::all() {
            let request =
                build_export_request(kind.report_id(), &target.company, &range_vars(date_range));
            match self.transport.send(&target.server_url, request).await {
                Ok(response) => {
                    let rows = parse_report_rows(&response);
                    let snapshot = ReportSnapshot {
                        kind,
                        from_date: date_range.map(|(from, _)| from),
                        to_date: date_range.map(|(_, to)| to),
                        payload: serde_json::json!(rows),
                        raw_xml: response,
                        fetched_at: chrono::Utc::now().naive_utc(),
                    };
                    match self.store.save_report_snapshot(&snapshot).await {
                        Ok(()) => synced += 1,
                        Err(err) => {
                            failed += 1;
                            errors.push(format!("{}: {}", kind.as_str(), err));
                        }
                    }
                }
                Err(err) => {
                    failed += 1;
                    errors.push(format!("{}: {}", kind.as_str(), err));
                }
            }
        }

        log.finish(synced, failed, errors);
        self.store.update_sync_log(&log).await?;
        Ok(summary_of(&log))
    }
}

fn summary_of(log: &SyncLogEntry) -> SyncSummary {
    SyncSummary {
        kind: log.kind,
        status: log.status,
        records_synced: log.records_synced,
        records_failed: log.records_failed,
        errors: log.errors.clone(),
    }
}

fn export_report_id(kind: SyncKind) -> &'static str {
    match kind {
        SyncKind::Groups => "List of Groups",
        SyncKind::Ledgers => "List of Ledgers",
        SyncKind::Stock => "List of Stock Items",
        SyncKind::Vouchers => "Day Book",
        SyncKind::Reports | SyncKind::Full => unreachable!("handled by dedicated cycles"),
    }
}

fn element_tag(kind: SyncKind) -> &'static str {
    match kind {
        SyncKind::Groups => "GROUP",
        SyncKind::Ledgers => "LEDGER",
        SyncKind::Stock => "STOCKITEM",
        SyncKind::Vouchers => "VOUCHER",
        SyncKind::Reports | SyncKind::Full => unreachable!("handled by dedicated cycles"),
    }
}

/// The Day Book export refuses to answer without an explicit period.
fn date_vars(kind: SyncKind, range: Option<(NaiveDate, NaiveDate)>) -> Vec<(&'static str, String)> {
    if kind != SyncKind::Vouchers {
        return Vec::new();
    }
    let (from, to) = range.unwrap_or_else(|| {
        let today = chrono::Utc::now().date_naive();
        (today, today)
    });
    vec![
        ("SVFROMDATE", to_tally_date(from)),
        ("SVTODATE", to_tally_date(to)),
    ]
}

fn range_vars(range: Option<(NaiveDate, NaiveDate)>) -> Vec<(&'static str, String)> {
    match range {
        Some((from, to)) => vec![
            ("SVFROMDATE", to_tally_date(from)),
            ("SVTODATE", to_tally_date(to)),
        ],
        None => Vec::new(),
    }
}
