//! Pairing bank statement lines with bank-ledger vouchers

use bigdecimal::BigDecimal;
use std::collections::HashSet;

use crate::reconciliation::statement::{parse_statement_csv, StatementImport};
use crate::traits::SyncStore;
use crate::types::*;

/// Amounts closer than one paisa are the same transaction.
fn amount_tolerance() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

const MAX_DATE_DRIFT_DAYS: i64 = 3;

/// Outcome of one auto-match pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub matched: u32,
    pub unmatched: u32,
}

/// Links bank statement lines to vouchers touching the same bank ledger.
pub struct Reconciler<S> {
    store: S,
}

impl<S: SyncStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Parse a CSV statement and persist every readable row.
    pub async fn import_csv(
        &self,
        bank_ledger: &str,
        csv_text: &str,
    ) -> SyncResult<StatementImport> {
        let import = parse_statement_csv(bank_ledger, csv_text)?;
        for line in &import.lines {
            self.store.save_statement_line(line).await?;
        }
        log::info!(
            "statement imported for {}: {} rows, {} skipped",
            bank_ledger,
            import.lines.len(),
            import.skipped
        );
        Ok(import)
    }

    /// Persist a single hand-entered statement line.
    pub async fn add_line(&self, line: BankStatementLine) -> SyncResult<BankStatementLine> {
        self.store.save_statement_line(&line).await?;
        Ok(line)
    }

    /// One auto-match pass over every unmatched line of `bank_ledger`.
    ///
    /// A line pairs with the first unconsumed voucher whose effect on the
    /// bank ledger is within a paisa of the line's signed amount and whose
    /// date is at most three calendar days away. Both sides leave the pool
    /// on a hit; lines with no hit stay unmatched for manual review.
    pub async fn auto_match(&self, bank_ledger: &str) -> SyncResult<MatchOutcome> {
        let lines = self.store.list_statement_lines(Some(bank_ledger)).await?;

        // Vouchers already claimed by any line are out of the pool
        let mut consumed: HashSet<String> = lines
            .iter()
            .filter_map(|line| line.matched_voucher_id.clone())
            .collect();

        let candidates: Vec<Voucher> = self
            .store
            .list_vouchers()
            .await?
            .into_iter()
            .filter(|v| !v.is_cancelled && v.touches_ledger(bank_ledger))
            .collect();

        let mut outcome = MatchOutcome {
            matched: 0,
            unmatched: 0,
        };
        for mut line in lines {
            if line.match_status == MatchStatus::Matched {
                continue;
            }
            let hit = candidates.iter().find(|voucher| {
                !consumed.contains(&voucher.id) && is_candidate(&line, voucher, bank_ledger)
            });
            match hit {
                Some(voucher) => {
                    consumed.insert(voucher.id.clone());
                    line.match_status = MatchStatus::Matched;
                    line.matched_voucher_id = Some(voucher.id.clone());
                    self.store.save_statement_line(&line).await?;
                    outcome.matched += 1;
                }
                None => outcome.unmatched += 1,
            }
        }
        log::info!(
            "auto-match for {}: {} matched, {} left unmatched",
            bank_ledger,
            outcome.matched,
            outcome.unmatched
        );
        Ok(outcome)
    }

    /// User-driven override of the link. Matching an already-matched pair is
    /// a no-op.
    pub async fn manual_match(&self, line_id: &str, voucher_id: &str) -> SyncResult<()> {
        let mut line = self
            .store
            .get_statement_line(line_id)
            .await?
            .ok_or_else(|| SyncError::StatementLineNotFound(line_id.to_string()))?;
        if self.store.get_voucher(voucher_id).await?.is_none() {
            return Err(SyncError::VoucherNotFound(voucher_id.to_string()));
        }
        if line.matched_voucher_id.as_deref() == Some(voucher_id) {
            return Ok(());
        }
        line.match_status = MatchStatus::Matched;
        line.matched_voucher_id = Some(voucher_id.to_string());
        self.store.save_statement_line(&line).await
    }

    /// Clear the link. Unmatching an unmatched line is a no-op.
    pub async fn unmatch(&self, line_id: &str) -> SyncResult<()> {
        let mut line = self
            .store
            .get_statement_line(line_id)
            .await?
            .ok_or_else(|| SyncError::StatementLineNotFound(line_id.to_string()))?;
        if line.matched_voucher_id.is_none() && line.match_status == MatchStatus::Unmatched {
            return Ok(());
        }
        line.match_status = MatchStatus::Unmatched;
        line.matched_voucher_id = None;
        self.store.save_statement_line(&line).await
    }
}

fn is_candidate(line: &BankStatementLine, voucher: &Voucher, bank_ledger: &str) -> bool {
    let amount_delta = (line.signed_amount() - voucher.ledger_effect(bank_ledger)).abs();
    if amount_delta >= amount_tolerance() {
        return false;
    }
    let drift = (line.date - voucher.date).num_days().abs();
    drift <= MAX_DATE_DRIFT_DAYS
}
