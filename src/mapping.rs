//! Linking external ledgers and cost centres to internal entities

use crate::traits::{PatientDirectory, SyncStore};
use crate::types::*;

/// Outcome of one auto-map pass over the debtor ledgers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoMapOutcome {
    pub mapped: u32,
    pub unmapped: u32,
}

/// Manual and automatic association of external records with hospital
/// entities (patients, departments, doctors).
pub struct MappingResolver<S, P> {
    store: S,
    patients: P,
}

impl<S: SyncStore, P: PatientDirectory> MappingResolver<S, P> {
    pub fn new(store: S, patients: P) -> Self {
        Self { store, patients }
    }

    /// Set the entity link on a ledger.
    pub async fn map_ledger(
        &self,
        ledger_name: &str,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> SyncResult<()> {
        let mut ledger = self
            .store
            .get_ledger(ledger_name)
            .await?
            .ok_or_else(|| SyncError::LedgerNotFound(ledger_name.to_string()))?;
        ledger.mapped_entity = Some(MappedEntity {
            entity_type,
            entity_id: entity_id.to_string(),
        });
        self.store.update_ledger(&ledger).await
    }

    /// Clear the entity link on a ledger.
    pub async fn unmap_ledger(&self, ledger_name: &str) -> SyncResult<()> {
        let mut ledger = self
            .store
            .get_ledger(ledger_name)
            .await?
            .ok_or_else(|| SyncError::LedgerNotFound(ledger_name.to_string()))?;
        ledger.mapped_entity = None;
        self.store.update_ledger(&ledger).await
    }

    /// Set the category and business link on a cost centre.
    pub async fn map_cost_centre(
        &self,
        name: &str,
        category: CostCategory,
        business_id: &str,
    ) -> SyncResult<()> {
        let mut cost_centre = self
            .store
            .get_cost_centre(name)
            .await?
            .ok_or_else(|| SyncError::Storage(format!("cost centre '{name}' does not exist")))?;
        cost_centre.category = category;
        cost_centre.mapped_business_id = Some(business_id.to_string());
        self.store.update_cost_centre(&cost_centre).await
    }

    /// Clear a cost centre's business link and reset its category to the
    /// department default; unmap leaves neither mapping field behind.
    pub async fn unmap_cost_centre(&self, name: &str) -> SyncResult<()> {
        let mut cost_centre = self
            .store
            .get_cost_centre(name)
            .await?
            .ok_or_else(|| SyncError::Storage(format!("cost centre '{name}' does not exist")))?;
        cost_centre.category = CostCategory::Department;
        cost_centre.mapped_business_id = None;
        self.store.update_cost_centre(&cost_centre).await
    }

    /// Auto-map unmapped debtor ledgers to patients by name.
    ///
    /// Only ledgers under a sundry-debtor group are candidates; matching is
    /// case-insensitive equals, contains, or contained-by. Anything more
    /// ambiguous than that stays unmapped rather than guessed at.
    pub async fn auto_map_patients(&self) -> SyncResult<AutoMapOutcome> {
        let patients = self.patients.list_patients().await?;
        let mut outcome = AutoMapOutcome {
            mapped: 0,
            unmapped: 0,
        };

        for mut ledger in self.store.list_ledgers().await? {
            if ledger.mapped_entity.is_some() || !is_debtor_ledger(&ledger) {
                continue;
            }
            match patients.iter().find(|p| names_align(&p.name, &ledger.name)) {
                Some(patient) => {
                    ledger.mapped_entity = Some(MappedEntity {
                        entity_type: EntityKind::Patient,
                        entity_id: patient.id.clone(),
                    });
                    self.store.update_ledger(&ledger).await?;
                    outcome.mapped += 1;
                }
                None => outcome.unmapped += 1,
            }
        }
        log::info!(
            "auto-map: {} ledgers linked to patients, {} left unmapped",
            outcome.mapped,
            outcome.unmapped
        );
        Ok(outcome)
    }
}

fn is_debtor_ledger(ledger: &Ledger) -> bool {
    ledger.parent.to_lowercase().contains("sundry debtor")
}

fn names_align(patient_name: &str, ledger_name: &str) -> bool {
    let patient = patient_name.trim().to_lowercase();
    let ledger = ledger_name.trim().to_lowercase();
    if patient.is_empty() || ledger.is_empty() {
        return false;
    }
    patient == ledger || ledger.contains(&patient) || patient.contains(&ledger)
}
