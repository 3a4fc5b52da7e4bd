//! CSV output for stress reports and account balances
//!
//! Both writers serialize rows through serde so the header row follows the
//! field names of [`StressReport`] and [`Account`].

use crate::harness::stress::StressReport;
use crate::types::{Account, HarnessError};
use csv::Writer;
use std::io::Write;

/// Write one row per stress report
///
/// Reports keep their run order. The header is written even when `reports`
/// is empty.
pub fn write_reports_csv(
    reports: &[StressReport],
    output: &mut dyn Write,
) -> Result<(), HarnessError> {
    let mut writer = Writer::from_writer(output);

    if reports.is_empty() {
        writer.write_record(REPORT_HEADER)?;
    }
    for report in reports {
        writer.serialize(report)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write account balances with columns: account, balance
///
/// Accounts are sorted by id for deterministic output.
pub fn write_balances_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), HarnessError> {
    let mut writer = Writer::from_writer(output);

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.id);

    if sorted_accounts.is_empty() {
        writer.write_record(["account", "balance"])?;
    }
    for account in &sorted_accounts {
        writer.serialize(account)?;
    }

    writer.flush()?;
    Ok(())
}

const REPORT_HEADER: [&str; 15] = [
    "strategy",
    "threads",
    "attempted",
    "successful_deposits",
    "successful_withdrawals",
    "successful_transfers",
    "deposited",
    "withdrawn",
    "transferred",
    "initial_total",
    "expected_total",
    "actual_total",
    "elapsed_ms",
    "ops_per_sec",
    "success_rate",
];
