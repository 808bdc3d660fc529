use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::gateway::GenerationParams;
use crate::gateway::params::{DEFAULT_MAX_LENGTH, DEFAULT_TOP_P};
use crate::story::catalog::SeedFormat;

pub const SEEDS_VAR: &str = "CREEPY_GEN_SEEDS";
pub const SEEDS_FORMAT_VAR: &str = "CREEPY_GEN_SEEDS_FORMAT";
pub const ENDPOINT_VAR: &str = "CREEPY_GEN_ENDPOINT";
pub const MAX_LENGTH_VAR: &str = "CREEPY_GEN_MAX_LENGTH";
pub const TOP_P_VAR: &str = "CREEPY_GEN_TOP_P";
pub const TIMEOUT_VAR: &str = "CREEPY_GEN_TIMEOUT_SECS";
pub const BIND_VAR: &str = "CREEPY_GEN_BIND";
pub const PORT_VAR: &str = "CREEPY_GEN_PORT";
pub const SESSION_TTL_VAR: &str = "CREEPY_GEN_SESSION_TTL_SECS";
pub const MAX_SESSIONS_VAR: &str = "CREEPY_GEN_MAX_SESSIONS";

const DEFAULT_SEEDS: &str = "./data/seeds.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BIND: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("Invalid value for {key}: {value:?}")]
	Invalid { key: String, value: String },
}

/// Runtime configuration for the binaries.
///
/// Every field has a default; environment variables override them.
#[derive(Debug, Clone)]
pub struct Config {
	/// Seed file (`.json` array or `.jsonl`).
	pub seeds_path: PathBuf,

	/// Whether the seed file carries intensities or popularity scores.
	pub seeds_format: SeedFormat,

	/// Remote generation endpoint. `None` selects the offline generator.
	pub endpoint: Option<String>,

	pub params: GenerationParams,

	/// Timeout applied to each remote generation request.
	pub timeout: Duration,

	pub bind: String,
	pub port: u16,

	/// Idle time after which a server session is dropped.
	pub session_ttl: Duration,

	/// Upper bound on live server sessions.
	pub max_sessions: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			seeds_path: PathBuf::from(DEFAULT_SEEDS),
			seeds_format: SeedFormat::Records,
			endpoint: None,
			params: GenerationParams::default(),
			timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
			bind: DEFAULT_BIND.to_owned(),
			port: DEFAULT_PORT,
			session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
			max_sessions: DEFAULT_MAX_SESSIONS,
		}
	}
}

impl Config {
	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads the configuration through an arbitrary key lookup.
	///
	/// Empty values are treated as unset.
	///
	/// # Errors
	/// Returns `ConfigError::Invalid` for values that fail to parse, a
	/// `top_p` outside `(0.0, 1.0]` or a zero session cap.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let defaults = Self::default();

		let mut params = GenerationParams::default();
		params.max_length = parse_var(get(MAX_LENGTH_VAR), MAX_LENGTH_VAR, DEFAULT_MAX_LENGTH)?;
		let top_p = parse_var(get(TOP_P_VAR), TOP_P_VAR, DEFAULT_TOP_P)?;
		params.set_top_p(top_p).map_err(|_| invalid(TOP_P_VAR, &top_p.to_string()))?;

		let max_sessions = parse_var(get(MAX_SESSIONS_VAR), MAX_SESSIONS_VAR, DEFAULT_MAX_SESSIONS)?;
		if max_sessions == 0 {
			return Err(invalid(MAX_SESSIONS_VAR, "0"));
		}

		Ok(Self {
			seeds_path: get(SEEDS_VAR).map(PathBuf::from).unwrap_or(defaults.seeds_path),
			seeds_format: parse_var(get(SEEDS_FORMAT_VAR), SEEDS_FORMAT_VAR, defaults.seeds_format)?,
			endpoint: get(ENDPOINT_VAR),
			params,
			timeout: Duration::from_secs(parse_var(get(TIMEOUT_VAR), TIMEOUT_VAR, DEFAULT_TIMEOUT_SECS)?),
			bind: get(BIND_VAR).unwrap_or(defaults.bind),
			port: parse_var(get(PORT_VAR), PORT_VAR, DEFAULT_PORT)?,
			session_ttl: Duration::from_secs(parse_var(get(SESSION_TTL_VAR), SESSION_TTL_VAR, DEFAULT_SESSION_TTL_SECS)?),
			max_sessions,
		})
	}
}

fn invalid(key: &str, value: &str) -> ConfigError {
	ConfigError::Invalid { key: key.to_owned(), value: value.to_owned() }
}

fn parse_var<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
	match value {
		None => Ok(default),
		Some(value) => value.trim().parse().map_err(|_| invalid(key, &value)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |key| map.get(key).cloned()
	}

	#[test]
	fn test_defaults() {
		let config = Config::from_lookup(lookup(&[])).unwrap();
		assert_eq!(config.seeds_path, PathBuf::from("./data/seeds.json"));
		assert_eq!(config.endpoint, None);
		assert_eq!(config.params, GenerationParams::default());
		assert_eq!(config.timeout, Duration::from_secs(30));
		assert_eq!(config.port, 5000);
		assert_eq!(config.seeds_format, SeedFormat::Records);
		assert_eq!(config.session_ttl, Duration::from_secs(1800));
		assert_eq!(config.max_sessions, 1024);
	}

	#[test]
	fn test_overrides() {
		let config = Config::from_lookup(lookup(&[
			(SEEDS_VAR, "/tmp/seeds.jsonl"),
			(ENDPOINT_VAR, "http://localhost:8080"),
			(MAX_LENGTH_VAR, "80"),
			(TOP_P_VAR, "0.5"),
			(PORT_VAR, "8000"),
			(BIND_VAR, ""),
			(SEEDS_FORMAT_VAR, "scored"),
			(SESSION_TTL_VAR, "60"),
			(MAX_SESSIONS_VAR, "8"),
		]))
		.unwrap();
		assert_eq!(config.seeds_path, PathBuf::from("/tmp/seeds.jsonl"));
		assert_eq!(config.endpoint.as_deref(), Some("http://localhost:8080"));
		assert_eq!(config.params.max_length, 80);
		assert_eq!(config.params.top_p(), 0.5);
		assert_eq!(config.port, 8000);
		assert_eq!(config.bind, "127.0.0.1");
		assert_eq!(config.seeds_format, SeedFormat::Scored);
		assert_eq!(config.session_ttl, Duration::from_secs(60));
		assert_eq!(config.max_sessions, 8);
	}

	#[test]
	fn test_invalid_values() {
		let err = Config::from_lookup(lookup(&[(PORT_VAR, "eighty")])).unwrap_err();
		assert_eq!(err, invalid(PORT_VAR, "eighty"));

		assert!(Config::from_lookup(lookup(&[(TOP_P_VAR, "1.5")])).is_err());
		assert!(Config::from_lookup(lookup(&[(MAX_LENGTH_VAR, "-3")])).is_err());
		assert_eq!(
			Config::from_lookup(lookup(&[(SEEDS_FORMAT_VAR, "csv")])).unwrap_err(),
			invalid(SEEDS_FORMAT_VAR, "csv")
		);
		assert_eq!(Config::from_lookup(lookup(&[(MAX_SESSIONS_VAR, "0")])).unwrap_err(), invalid(MAX_SESSIONS_VAR, "0"));
		assert!(Config::from_lookup(lookup(&[(SESSION_TTL_VAR, "soon")])).is_err());
	}
}
