//! Main entry point for the flux aggregator monitor.
//!
//! This binary reads round state, the oracle set and the latest answer from a
//! FluxAggregator contract, or follows its NewRound and AnswerUpdated events
//! until interrupted.

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use flux_config::Config;
use flux_contract::{AlloyCallService, FluxAggregator};
use flux_logs::implementations::alloy::PollingLogSource;
use flux_logs::LogBroadcastService;
use flux_types::RoundState;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Command-line arguments for the monitor.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
	/// Prints the round state as seen by one oracle
	RoundState {
		/// Oracle address
		#[arg(long)]
		oracle: Address,
		/// Round to query; 0 asks for the round the oracle can report on next
		#[arg(long, default_value_t = 0)]
		round: u32,
	},
	/// Prints the current oracle set
	Oracles,
	/// Prints the latest round data
	LatestRound,
	/// Prints aggregator events as they are observed
	Watch,
}

/// Round state plus its derived deadline.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoundStateReport {
	#[serde(flatten)]
	state: RoundState,
	times_out_at: u64,
}

impl From<RoundState> for RoundStateReport {
	fn from(state: RoundState) -> Self {
		Self {
			times_out_at: state.times_out_at(),
			state,
		}
	}
}

/// Main entry point for the monitor.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Connects the aggregator handle
/// 5. Runs the requested command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	// Logs go to stderr so stdout stays clean JSON
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.monitor.id);

	let broadcaster = LogBroadcastService::new();
	let aggregator = build_aggregator(&config, broadcaster.clone())?;

	match args.command {
		Command::RoundState { oracle, round } => {
			let state = aggregator.round_state(oracle, round).await?;
			println!("{}", render(&RoundStateReport::from(state))?);
		},
		Command::Oracles => {
			let oracles = aggregator.get_oracles().await?;
			println!("{}", render(&oracles)?);
		},
		Command::LatestRound => {
			let round = aggregator.latest_round_data().await?;
			println!("{}", render(&round)?);
		},
		Command::Watch => watch(&config, &aggregator, broadcaster).await?,
	}

	Ok(())
}

/// Builds the aggregator handle for the configured contract.
fn build_aggregator(
	config: &Config,
	broadcaster: LogBroadcastService,
) -> Result<FluxAggregator, Box<dyn std::error::Error>> {
	let address = config.aggregator.address()?;
	let call_service = AlloyCallService::new(&config.network.rpc_url)?;

	Ok(FluxAggregator::new(
		address,
		Arc::new(call_service),
		Arc::new(broadcaster),
	)?)
}

fn render<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
	serde_json::to_string_pretty(value)
}

/// Follows aggregator events until Ctrl-C or until the log stream ends.
async fn watch(
	config: &Config,
	aggregator: &FluxAggregator,
	broadcaster: LogBroadcastService,
) -> Result<(), Box<dyn std::error::Error>> {
	let source = PollingLogSource::new(
		&config.network.rpc_url,
		config.logs.start_block,
		Some(config.logs.polling_interval_secs),
		Some(config.logs.max_block_range),
	)?;
	source.start(broadcaster).await?;

	let (tx, mut rx) = mpsc::unbounded_channel();
	let (_, subscription) = aggregator.subscribe_to_logs(Arc::new(tx));
	tracing::info!(contract = %aggregator.address(), "Watching aggregator events");

	loop {
		tokio::select! {
			event = rx.recv() => match event {
				Some(event) => println!("{}", render(&event)?),
				None => break,
			},
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Received shutdown signal");
				break;
			}
		}
	}

	subscription.unsubscribe();
	source.stop().await;

	let counts = aggregator.log_stats();
	tracing::info!(
		delivered = counts.delivered,
		unrecognized = counts.unrecognized,
		decode_failures = counts.decode_failures,
		"Stopped watching"
	);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, I256, U256};
	use std::io::Write;

	const CONFIG: &str = r#"
[monitor]
id = "test-monitor"

[network]
rpc_url = "http://localhost:8545"

[aggregator]
address = "0x79febf6b9f76853edbcbc913e6aae8232cfb9de9"

[logs]
polling_interval_secs = 1
"#;

	#[test]
	fn test_args_default_values() {
		let args = Args::try_parse_from(["flux-monitor", "oracles"]).unwrap();

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		assert_eq!(args.command, Command::Oracles);
	}

	#[test]
	fn test_args_round_state() {
		let args = Args::try_parse_from([
			"flux-monitor",
			"--config",
			"feeds/eth.toml",
			"round-state",
			"--oracle",
			"0x5555555555555555555555555555555555555555",
			"--round",
			"7",
		])
		.unwrap();

		assert_eq!(args.config, PathBuf::from("feeds/eth.toml"));
		assert_eq!(
			args.command,
			Command::RoundState {
				oracle: address!("5555555555555555555555555555555555555555"),
				round: 7,
			}
		);
	}

	#[test]
	fn test_args_round_defaults_to_zero() {
		let args = Args::try_parse_from([
			"flux-monitor",
			"round-state",
			"--oracle",
			"0x5555555555555555555555555555555555555555",
		])
		.unwrap();

		assert!(matches!(args.command, Command::RoundState { round: 0, .. }));
	}

	#[test]
	fn test_args_reject_bad_oracle() {
		let result =
			Args::try_parse_from(["flux-monitor", "round-state", "--oracle", "not-an-address"]);
		assert!(result.is_err());
	}

	#[test]
	fn test_args_require_command() {
		assert!(Args::try_parse_from(["flux-monitor"]).is_err());
	}

	#[test]
	fn test_round_state_report_includes_deadline() {
		let state = RoundState {
			reportable_round_id: 3,
			eligible_to_submit: true,
			latest_submission: Some(I256::try_from(-5i64).unwrap()),
			timeout: 60,
			started_at: 1_000,
			available_funds: Some(U256::from(10u64)),
			payment_amount: Some(U256::from(1u64)),
			oracle_count: 4,
		};

		let json = serde_json::to_value(RoundStateReport::from(state)).unwrap();
		assert_eq!(json["timesOutAt"], 1_060);
		assert_eq!(json["reportableRoundID"], 3);
		assert_eq!(json["eligibleToSubmit"], true);
	}

	#[tokio::test]
	async fn test_build_aggregator_from_file_config() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(CONFIG.as_bytes()).unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		let broadcaster = LogBroadcastService::new();
		let aggregator = build_aggregator(&config, broadcaster.clone()).unwrap();

		assert_eq!(
			aggregator.address(),
			address!("79febf6b9f76853edbcbc913e6aae8232cfb9de9")
		);

		let (connected, subscription) = aggregator.subscribe_to_logs(Arc::new(
			mpsc::unbounded_channel::<flux_types::FluxAggregatorEvent>().0,
		));
		assert!(!connected);
		assert_eq!(broadcaster.addresses(), vec![aggregator.address()]);

		subscription.unsubscribe();
		assert!(broadcaster.addresses().is_empty());
	}
}
