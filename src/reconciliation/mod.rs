//! Bank reconciliation: statement ingestion and voucher matching

pub mod matcher;
pub mod statement;

pub use matcher::{MatchOutcome, Reconciler};
pub use statement::{manual_statement_line, parse_statement_csv, parse_statement_date, StatementImport};
