//! Text-completion backends.
//!
//! The session core only knows the `GenerationGateway` trait. Two
//! implementations are provided:
//! - `HttpGateway`: a text-generation inference server reached over HTTP
//! - `MarkovGateway`: an offline character-level n-gram generator

use log::info;
use thiserror::Error;

use crate::config::Config;
use crate::story::catalog::SeedCatalog;

/// Generation settings shared by all gateways.
///
/// Tracks output length, nucleus threshold and sampling switch.
pub mod params;

/// Blocking HTTP client for a remote text-generation endpoint.
pub mod http;

/// Offline n-gram generator trained on seed texts.
pub mod markov;

/// Transition table used by the offline generator.
///
/// Not exposed
mod transitions;

pub use self::http::HttpGateway;
pub use self::markov::MarkovGateway;
pub use self::params::GenerationParams;

/// Errors returned by a gateway.
///
/// These are external failures: callers report them and keep the session
/// usable.
#[derive(Debug, Error)]
pub enum GenerationError {
	#[error("Network error: {0}")]
	Transport(String),

	#[error("Generation endpoint returned status {status}: {message}")]
	Status { status: u16, message: String },

	#[error("Failed to parse generation response: {0}")]
	Parse(String),

	#[error("Generation returned no text")]
	EmptyOutput,

	#[error("Generator unavailable: {0}")]
	Unavailable(String),

	#[error("Invalid generation parameters: {0}")]
	InvalidParams(String),
}

/// Opaque text-completion capability: prompt in, continuation out.
///
/// Implementations must be shareable between independent sessions.
pub trait GenerationGateway: Send + Sync {
	/// Generates a continuation of `prompt`.
	///
	/// Blocks until the text is available or the call fails.
	fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError>;
}

/// Picks the remote gateway when an endpoint is configured, the offline
/// generator trained on the catalog otherwise.
///
/// # Errors
/// Returns `Transport` if the HTTP client cannot be built.
pub fn build_gateway(config: &Config, catalog: &SeedCatalog) -> Result<Box<dyn GenerationGateway>, GenerationError> {
	let gateway: Box<dyn GenerationGateway> = match &config.endpoint {
		Some(endpoint) => {
			info!("Using generation endpoint {endpoint} (timeout {:?})", config.timeout);
			Box::new(HttpGateway::new(endpoint.as_str(), config.timeout)?)
		}
		None => {
			info!("No generation endpoint configured, using the offline generator");
			Box::new(MarkovGateway::from_catalog(catalog, markov::DEFAULT_ORDER))
		}
	};
	Ok(gateway)
}
