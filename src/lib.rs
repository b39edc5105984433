//! # Tally Bridge
//!
//! Sync and reconciliation engine between a hospital information system and
//! a Tally-style accounting server speaking XML over HTTP.
//!
//! The engine pulls masters, vouchers and reports from the external server,
//! pushes locally raised vouchers back, reconciles bank statements against
//! bank-ledger vouchers, and links external records to hospital entities.
//!
//! ## Quick start
//!
//! ```no_run
//! use tally_bridge::{MemoryStore, SyncKind, SyncTarget, TallyBridge, TallyClient};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tally_bridge::SyncError> {
//! let store = MemoryStore::new();
//! let bridge = TallyBridge::new(store.clone(), store, TallyClient::new());
//!
//! let target = SyncTarget::new("http://localhost:9000", "City Hospital");
//! let summary = bridge
//!     .handle_sync(tally_bridge::SyncRequest {
//!         action: "full".to_string(),
//!         server_url: target.server_url.clone(),
//!         company_name: target.company.clone(),
//!         date_range: None,
//!     })
//!     .await?;
//! println!("synced {} records", summary.records_synced);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod codec;
pub mod mapping;
pub mod reconciliation;
pub mod sync;
pub mod traits;
pub mod transport;
pub mod types;
pub mod utils;

pub use bridge::{DateRange, PushRequest, SyncRequest, TallyBridge, VoucherDraft};
pub use mapping::{AutoMapOutcome, MappingResolver};
pub use reconciliation::{MatchOutcome, Reconciler, StatementImport};
pub use sync::{
    AutoSyncScheduler, PushPipeline, SchedulerState, SchedulerStatus, SyncOrchestrator, SyncTarget,
};
pub use traits::{PatientDirectory, SyncStore};
pub use transport::{TallyClient, Transport};
pub use types::*;
pub use utils::MemoryStore;
