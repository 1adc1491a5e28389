//! Configuration module for the flux aggregator monitor.
//!
//! This module provides structures and utilities for managing monitor
//! configuration. It supports loading configuration from TOML files with
//! environment variable substitution and validates that all required values are
//! properly set.

use alloy_primitives::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to the monitor instance.
	pub monitor: MonitorConfig,
	/// Chain connection settings.
	pub network: NetworkConfig,
	/// The aggregator contract to watch.
	pub aggregator: AggregatorConfig,
	/// Log polling settings.
	#[serde(default)]
	pub logs: LogsConfig,
}

/// Configuration specific to the monitor instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
	/// Identifier used in log output, e.g. the feed name.
	pub id: String,
}

/// Chain connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// HTTP JSON-RPC endpoint.
	pub rpc_url: String,
	/// Expected chain ID, informational.
	pub chain_id: Option<u64>,
}

/// The aggregator contract to watch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
	/// Contract address as a 0x-prefixed hex string.
	pub address: String,
}

impl AggregatorConfig {
	/// Parses the configured address.
	pub fn address(&self) -> Result<Address, ConfigError> {
		self.address.parse().map_err(|e| {
			ConfigError::Validation(format!(
				"Invalid aggregator address '{}': {}",
				self.address, e
			))
		})
	}
}

/// Log polling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogsConfig {
	/// Polling interval in seconds.
	/// Defaults to 3 seconds if not specified.
	#[serde(default = "default_polling_interval_secs")]
	pub polling_interval_secs: u64,
	/// First block to fetch logs from. Defaults to the chain head at startup.
	pub start_block: Option<u64>,
	/// Maximum number of blocks per `eth_getLogs` request.
	/// Defaults to 1000 blocks if not specified.
	#[serde(default = "default_max_block_range")]
	pub max_block_range: u64,
}

impl Default for LogsConfig {
	fn default() -> Self {
		Self {
			polling_interval_secs: default_polling_interval_secs(),
			start_block: None,
			max_block_range: default_max_block_range(),
		}
	}
}

/// Returns the default polling interval in seconds.
fn default_polling_interval_secs() -> u64 {
	3
}

/// Returns the default maximum block range per log request.
fn default_max_block_range() -> u64 {
	1000
}

/// Largest configuration document accepted before placeholder expansion.
const MAX_CONFIG_BYTES: usize = 1024 * 1024;

/// `${NAME}` or `${NAME:-fallback}`.
const PLACEHOLDER: &str = r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}";

/// Expands `${NAME}` and `${NAME:-fallback}` placeholders from the process
/// environment in a single forward pass.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	if input.len() > MAX_CONFIG_BYTES {
		return Err(ConfigError::Validation(format!(
			"Configuration is {} bytes, limit is {}",
			input.len(),
			MAX_CONFIG_BYTES
		)));
	}

	let placeholder =
		Regex::new(PLACEHOLDER).map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut expanded = String::with_capacity(input.len());
	let mut copied_to = 0;
	for captures in placeholder.captures_iter(input) {
		let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
			continue;
		};
		expanded.push_str(&input[copied_to..whole.start()]);
		expanded.push_str(&env_value(name.as_str(), captures.get(2).map(|m| m.as_str()))?);
		copied_to = whole.end();
	}
	expanded.push_str(&input[copied_to..]);

	Ok(expanded)
}

fn env_value(name: &str, fallback: Option<&str>) -> Result<String, ConfigError> {
	match (std::env::var(name), fallback) {
		(Ok(value), _) => Ok(value),
		(Err(_), Some(fallback)) => Ok(fallback.to_string()),
		(Err(_), None) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' is not set and has no default",
			name
		))),
	}
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;
		content.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - Ensures the monitor ID is not empty
	/// - Checks the RPC URL is an HTTP(S) endpoint
	/// - Validates the aggregator address
	/// - Bounds the polling interval and block range
	fn validate(&self) -> Result<(), ConfigError> {
		if self.monitor.id.is_empty() {
			return Err(ConfigError::Validation("Monitor ID cannot be empty".into()));
		}

		let url = &self.network.rpc_url;
		if !(url.starts_with("http://") || url.starts_with("https://")) {
			return Err(ConfigError::Validation(
				"RPC URL must start with http:// or https://".into(),
			));
		}
		if self.network.chain_id == Some(0) {
			return Err(ConfigError::Validation(
				"chain_id must be greater than 0".into(),
			));
		}

		self.aggregator.address()?;

		if self.logs.polling_interval_secs == 0 {
			return Err(ConfigError::Validation(
				"polling_interval_secs must be at least 1".into(),
			));
		}
		if self.logs.polling_interval_secs > 300 {
			return Err(ConfigError::Validation(
				"polling_interval_secs cannot exceed 300 (5 minutes)".into(),
			));
		}
		if self.logs.max_block_range == 0 {
			return Err(ConfigError::Validation(
				"max_block_range must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is validated after
/// parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const VALID: &str = r#"
[monitor]
id = "eth-usd"

[network]
rpc_url = "http://localhost:8545"
chain_id = 1

[aggregator]
address = "0x79febf6b9f76853edbcbc913e6aae8232cfb9de9"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("FLUX_TEST_HOST", "localhost");
		std::env::set_var("FLUX_TEST_PORT", "8545");

		let input = "url = \"http://${FLUX_TEST_HOST}:${FLUX_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("FLUX_TEST_HOST");
		std::env::remove_var("FLUX_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${FLUX_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${FLUX_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.unwrap_err().to_string().contains("FLUX_MISSING_VAR"));
	}

	#[test]
	fn test_env_var_empty_default_and_untouched_text() {
		let input = "a = \"${FLUX_UNSET_EMPTY:-}\"\nb = \"$HOME ${lowercase}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "a = \"\"\nb = \"$HOME ${lowercase}\"");
	}

	#[test]
	fn test_oversized_input_rejected() {
		let input = "#".repeat(MAX_CONFIG_BYTES + 1);
		assert!(matches!(
			resolve_env_vars(&input),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_valid_config_with_defaults() {
		let config: Config = VALID.parse().unwrap();
		assert_eq!(config.monitor.id, "eth-usd");
		assert_eq!(config.network.chain_id, Some(1));
		assert_eq!(config.logs.polling_interval_secs, 3);
		assert_eq!(config.logs.max_block_range, 1000);
		assert_eq!(config.logs.start_block, None);
		assert_eq!(
			config.aggregator.address().unwrap(),
			"0x79febf6b9f76853edbcbc913e6aae8232cfb9de9"
				.parse::<Address>()
				.unwrap()
		);
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("FLUX_TEST_RPC_URL", "https://rpc.example.org");

		let config_str = VALID.replace("http://localhost:8545", "${FLUX_TEST_RPC_URL}");
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.network.rpc_url, "https://rpc.example.org");

		std::env::remove_var("FLUX_TEST_RPC_URL");
	}

	#[test]
	fn test_invalid_address_rejected() {
		let config_str = VALID.replace("0x79febf6b9f76853edbcbc913e6aae8232cfb9de9", "0x1234");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
		assert!(err.to_string().contains("Invalid aggregator address"));
	}

	#[test]
	fn test_invalid_rpc_url_rejected() {
		let config_str = VALID.replace("http://localhost:8545", "ws://localhost:8546");
		let err = config_str.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("RPC URL"));
	}

	#[test]
	fn test_polling_interval_bounds() {
		let zero = format!("{}\n[logs]\npolling_interval_secs = 0\n", VALID);
		assert!(zero.parse::<Config>().is_err());

		let too_long = format!("{}\n[logs]\npolling_interval_secs = 301\n", VALID);
		assert!(too_long.parse::<Config>().is_err());

		let ok = format!(
			"{}\n[logs]\npolling_interval_secs = 12\nstart_block = 100\n",
			VALID
		);
		let config: Config = ok.parse().unwrap();
		assert_eq!(config.logs.polling_interval_secs, 12);
		assert_eq!(config.logs.start_block, Some(100));
		assert_eq!(config.logs.max_block_range, 1000);
	}

	#[test]
	fn test_empty_id_rejected() {
		let config_str = VALID.replace("eth-usd", "");
		assert!(config_str.parse::<Config>().is_err());
	}

	#[test]
	fn test_missing_section_is_parse_error() {
		let err = "[monitor]\nid = \"x\"\n".parse::<Config>().unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}

	#[tokio::test]
	async fn test_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(VALID.as_bytes()).unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		assert_eq!(config.monitor.id, "eth-usd");
	}

	#[tokio::test]
	async fn test_from_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let err = Config::from_file(dir.path().join("missing.toml"))
			.await
			.unwrap_err();
		assert!(matches!(err, ConfigError::Io(_)));
	}
}
