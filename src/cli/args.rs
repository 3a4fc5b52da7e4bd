use crate::harness::StressConfig;
use crate::strategy::StrategyType;
use crate::types::HarnessError;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Stress-test the concurrent ledger under each locking strategy
#[derive(Parser, Debug)]
#[command(name = "concurrent-ledger")]
#[command(about = "Stress-test a concurrent bank ledger under different locking strategies", long_about = None)]
pub struct CliArgs {
    /// Locking strategy to run
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "all",
        help = "Locking strategy: 'coarse', 'fine', 'pooled', 'hybrid', 'concurrent' or 'all'"
    )]
    pub strategy: StrategySelection,

    /// Number of accounts created before the run
    #[arg(
        long = "accounts",
        value_name = "COUNT",
        help = "Number of accounts (default: 100)"
    )]
    pub accounts: Option<usize>,

    /// Opening balance of every account
    #[arg(
        long = "initial-deposit",
        value_name = "AMOUNT",
        allow_negative_numbers = true,
        help = "Opening balance of every account (default: 1000, max: 1048576)"
    )]
    pub initial_deposit: Option<i64>,

    /// Sweeps over all accounts per worker
    #[arg(
        long = "repeats",
        value_name = "COUNT",
        help = "Sweeps over all accounts per worker (default: 1000)"
    )]
    pub repeats: Option<usize>,

    /// Worker threads per operation kind
    #[arg(
        long = "threads-per-op",
        value_name = "COUNT",
        help = "Worker threads per operation kind (default: 2)"
    )]
    pub threads_per_op: Option<usize>,

    /// Seconds the workers may run before the run is declared stalled
    #[arg(
        long = "stall-timeout-secs",
        value_name = "SECONDS",
        help = "Seconds before a run is declared stalled (default: 60)"
    )]
    pub stall_timeout_secs: Option<u64>,

    /// Directory receiving one `<strategy>_balances.csv` per run
    #[arg(
        long = "balances",
        value_name = "DIR",
        help = "Write the final account balances of each run into DIR"
    )]
    pub balances: Option<PathBuf>,
}

/// Strategy selection on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategySelection {
    Coarse,
    Fine,
    Pooled,
    Hybrid,
    Concurrent,
    All,
}

impl StrategySelection {
    /// Strategies to run, in report order
    pub fn strategies(&self) -> Vec<StrategyType> {
        match self {
            StrategySelection::Coarse => vec![StrategyType::Coarse],
            StrategySelection::Fine => vec![StrategyType::Fine],
            StrategySelection::Pooled => vec![StrategyType::Pooled],
            StrategySelection::Hybrid => vec![StrategyType::Hybrid],
            StrategySelection::Concurrent => vec![StrategyType::Concurrent],
            StrategySelection::All => StrategyType::ALL.to_vec(),
        }
    }
}

impl CliArgs {
    /// Create a StressConfig from CLI arguments
    ///
    /// Omitted values take their defaults. Zero values are replaced by
    /// defaults with a warning.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the initial deposit lies outside
    /// `[0, MAX_BALANCE]`.
    pub fn to_stress_config(&self) -> Result<StressConfig, HarnessError> {
        let default = StressConfig::default();
        StressConfig::new(
            self.accounts.unwrap_or(default.num_accounts),
            self.initial_deposit.unwrap_or(default.initial_deposit),
            self.repeats.unwrap_or(default.repeats),
            self.threads_per_op.unwrap_or(default.threads_per_operation),
            self.stall_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default.stall_timeout),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program"], StrategySelection::All)]
    #[case::explicit_fine(&["program", "--strategy", "fine"], StrategySelection::Fine)]
    #[case::explicit_concurrent(&["program", "--strategy", "concurrent"], StrategySelection::Concurrent)]
    #[case::explicit_all(&["program", "--strategy", "all"], StrategySelection::All)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategySelection) {
        let parsed = CliArgs::try_parse_from(args).unwrap();

        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::single(StrategySelection::Pooled, vec![StrategyType::Pooled])]
    #[case::all(StrategySelection::All, StrategyType::ALL.to_vec())]
    fn test_selection_expands(
        #[case] selection: StrategySelection,
        #[case] expected: Vec<StrategyType>,
    ) {
        assert_eq!(selection.strategies(), expected);
    }

    #[rstest]
    #[case::all_defaults(&["program"], 100, 1000, 1000, 2, 60)]
    #[case::custom_accounts(&["program", "--accounts", "10"], 10, 1000, 1000, 2, 60)]
    #[case::all_custom(
        &[
            "program", "--accounts", "10", "--initial-deposit", "5", "--repeats", "3",
            "--threads-per-op", "4", "--stall-timeout-secs", "9",
        ],
        10,
        5,
        3,
        4,
        9
    )]
    #[case::zero_values_fall_back(&["program", "--accounts", "0", "--threads-per-op", "0"], 100, 1000, 1000, 2, 60)]
    fn test_stress_config_conversion(
        #[case] args: &[&str],
        #[case] accounts: usize,
        #[case] initial_deposit: i64,
        #[case] repeats: usize,
        #[case] threads: usize,
        #[case] timeout_secs: u64,
    ) {
        let config = CliArgs::try_parse_from(args)
            .unwrap()
            .to_stress_config()
            .unwrap();

        assert_eq!(config.num_accounts, accounts);
        assert_eq!(config.initial_deposit, initial_deposit);
        assert_eq!(config.repeats, repeats);
        assert_eq!(config.threads_per_operation, threads);
        assert_eq!(config.stall_timeout, Duration::from_secs(timeout_secs));
    }

    #[rstest]
    #[case::negative_deposit(&["program", "--initial-deposit", "-1"])]
    #[case::deposit_above_limit(&["program", "--initial-deposit", "2000000"])]
    fn test_invalid_initial_deposit(#[case] args: &[&str]) {
        let parsed = CliArgs::try_parse_from(args).unwrap();

        assert!(matches!(
            parsed.to_stress_config(),
            Err(HarnessError::InvalidConfig { .. })
        ));
    }

    #[rstest]
    #[case::omitted(&["program"], None)]
    #[case::given(&["program", "--balances", "out"], Some(PathBuf::from("out")))]
    fn test_balances_dir(#[case] args: &[&str], #[case] expected: Option<PathBuf>) {
        let parsed = CliArgs::try_parse_from(args).unwrap();

        assert_eq!(parsed.balances, expected);
    }

    #[rstest]
    #[case::invalid_strategy(&["program", "--strategy", "invalid"])]
    #[case::non_numeric_accounts(&["program", "--accounts", "many"])]
    #[case::unexpected_positional(&["program", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}
