//! End-to-end stress tests
//!
//! These tests drive every locking strategy through the full harness:
//! 1. Conservation under concurrent deposits, withdrawals and transfers
//! 2. Liveness of opposing transfers on one account pair
//! 3. Transfer atomicity as seen by a concurrent observer
//! 4. CSV reports and balance files written by a multi-strategy run
//!
//! Configurations are small so the suite stays fast; the stall timeout turns a
//! deadlock into a test failure instead of a hung test run.

#[cfg(test)]
mod tests {
    use concurrent_ledger::harness::{
        check_conservation, observe_transfers, run_opposing_transfers, run_strategies,
        write_reports_csv, StressConfig,
    };
    use concurrent_ledger::strategy::{create_ledger, PooledLedger, StrategyType};
    use concurrent_ledger::{Ledger, TotalConsistency, MAX_BALANCE};
    use rstest::rstest;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, NamedTempFile};

    const STALL_TIMEOUT: Duration = Duration::from_secs(30);

    fn config(num_accounts: usize, initial_deposit: i64, repeats: usize) -> StressConfig {
        StressConfig::new(num_accounts, initial_deposit, repeats, 2, STALL_TIMEOUT)
            .expect("valid config")
    }

    #[rstest]
    #[case::default_balances(config(50, 1000, 100))]
    #[case::empty_accounts(config(50, 0, 100))]
    #[case::near_limit(config(50, MAX_BALANCE - 10, 100))]
    #[case::single_account(config(1, 10, 500))]
    fn test_conservation(
        #[values(
            StrategyType::Coarse,
            StrategyType::Fine,
            StrategyType::Pooled,
            StrategyType::Hybrid,
            StrategyType::Concurrent
        )]
        strategy: StrategyType,
        #[case] config: StressConfig,
    ) {
        let ledger = create_ledger(strategy, &config.ledger_config());

        let report = check_conservation(Arc::clone(&ledger), &config)
            .unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(report.strategy, strategy.as_str());
        assert_eq!(report.attempted, config.total_operations());
        assert_eq!(report.actual_total, report.expected_total);
        assert_eq!(
            report.expected_total,
            report.initial_total + report.deposited - report.withdrawn
        );
        assert!(ledger
            .accounts()
            .iter()
            .all(|account| (0..=MAX_BALANCE).contains(&account.balance)));
    }

    #[test]
    fn test_conservation_with_contended_pool() {
        // A pool far smaller than the account count forces unrelated accounts
        // onto shared guards and slot order to disagree with id order.
        let config = config(200, 500, 50);
        let ledger: Arc<dyn Ledger> = Arc::new(PooledLedger::new(200, 500, 1));

        let report = check_conservation(ledger, &config).unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(report.actual_total, report.expected_total);
    }

    #[rstest]
    fn test_opposing_transfers_terminate(
        #[values(
            StrategyType::Coarse,
            StrategyType::Fine,
            StrategyType::Pooled,
            StrategyType::Hybrid,
            StrategyType::Concurrent
        )]
        strategy: StrategyType,
        #[values(3, 8)] threads: usize,
    ) {
        let config = config(10, 1000, 1);
        let ledger = create_ledger(strategy, &config.ledger_config());

        let report = run_opposing_transfers(
            Arc::clone(&ledger),
            (2, 9),
            threads,
            Duration::from_millis(200),
            STALL_TIMEOUT,
        )
        .unwrap_or_else(|e| panic!("{}", e));

        assert!(report.completed > 0);
        assert_eq!(ledger.total(), 10 * 1000);
        assert_eq!(
            ledger.balance(2).unwrap() + ledger.balance(9).unwrap(),
            2000
        );
    }

    #[rstest]
    #[case::coarse(StrategyType::Coarse, TotalConsistency::Linearizable)]
    #[case::fine(StrategyType::Fine, TotalConsistency::Weak)]
    #[case::pooled(StrategyType::Pooled, TotalConsistency::Weak)]
    #[case::hybrid(StrategyType::Hybrid, TotalConsistency::Linearizable)]
    #[case::concurrent(StrategyType::Concurrent, TotalConsistency::Weak)]
    fn test_observer_sees_no_intermediate_state(
        #[case] strategy: StrategyType,
        #[case] consistency: TotalConsistency,
    ) {
        let config = config(20, 100, 200);
        let ledger = create_ledger(strategy, &config.ledger_config());

        let report = observe_transfers(Arc::clone(&ledger), &config)
            .unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(report.consistency, consistency);
        assert!(report.samples >= 1);
        assert_eq!(ledger.total(), 20 * 100);
    }

    #[test]
    fn test_run_all_strategies_writes_csv() {
        let config = config(10, 100, 20);
        let balances_dir = tempdir().expect("Failed to create temp dir");

        let reports = run_strategies(&StrategyType::ALL, &config, Some(balances_dir.path()))
            .unwrap_or_else(|e| panic!("{}", e));

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        write_reports_csv(&reports, &mut temp_output).expect("Failed to write reports");

        let output = fs::read_to_string(temp_output.path()).expect("Failed to read output");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1 + StrategyType::ALL.len());
        assert!(lines[0].starts_with("strategy,threads,attempted,"));
        for (line, strategy) in lines[1..].iter().zip(StrategyType::ALL) {
            assert!(
                line.starts_with(&format!("{},6,", strategy)),
                "unexpected row: {}",
                line
            );
        }

        for (report, strategy) in reports.iter().zip(StrategyType::ALL) {
            let path = balances_dir
                .path()
                .join(format!("{}_balances.csv", strategy));
            let balances = fs::read_to_string(&path).expect("Failed to read balances");
            let rows: Vec<&str> = balances.lines().collect();

            assert_eq!(rows[0], "account,balance");
            assert_eq!(rows.len(), 1 + 10);
            let total: i64 = rows[1..]
                .iter()
                .map(|row| row.split(',').nth(1).unwrap().parse::<i64>().unwrap())
                .sum();
            assert_eq!(total, report.actual_total);
        }
    }
}
