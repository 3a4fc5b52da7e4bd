//! Stress harness module
//!
//! Drives ledgers concurrently and checks conservation, liveness and the
//! consistency guarantees of each strategy.
//!
//! # Components
//!
//! - `config` - Run configuration with defaults and validation
//! - `stress` - Conservation, opposing-transfer and observer workloads
//! - `report` - CSV serialization of run reports and balances

pub mod config;
pub mod report;
pub mod stress;

pub use config::StressConfig;
pub use report::{write_balances_csv, write_reports_csv};
pub use stress::{
    check_conservation, observe_transfers, run_opposing_transfers, run_strategies, run_stress,
    ObservationReport, OperationKind, OpposingTransfersReport, StressReport, Tally,
};
