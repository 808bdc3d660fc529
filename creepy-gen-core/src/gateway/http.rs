use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{GenerationError, GenerationGateway, GenerationParams};

/// Gateway for a text-generation inference server.
///
/// Sends `POST {endpoint}/generate` and reads `generated_text` back. The
/// server is asked for the continuation only (`return_full_text: false`).
#[derive(Debug, Clone)]
pub struct HttpGateway {
	client: Client,
	endpoint: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
	inputs: &'a str,
	parameters: GenerateParameters,
}

#[derive(Serialize)]
struct GenerateParameters {
	max_new_tokens: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	top_p: Option<f32>,
	do_sample: bool,
	return_full_text: bool,
}

/// Servers answer either with one object or a one-element batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
	Single(Generated),
	Batch(Vec<Generated>),
}

#[derive(Deserialize)]
struct Generated {
	generated_text: String,
}

impl HttpGateway {
	/// Creates a gateway with a request timeout.
	///
	/// A trailing `/` on the endpoint is ignored.
	pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| GenerationError::Transport(e.to_string()))?;

		let endpoint = endpoint.into().trim_end_matches('/').to_owned();
		Ok(Self { client, endpoint })
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

impl GenerationGateway for HttpGateway {
	fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError> {
		let request = build_request(prompt, params);
		debug!("POST {}/generate (max_new_tokens={})", self.endpoint, params.max_length);

		let response = self
			.client
			.post(format!("{}/generate", self.endpoint))
			.json(&request)
			.send()
			.map_err(|e| GenerationError::Transport(e.to_string()))?;

		let status = response.status();
		let body = response
			.text()
			.map_err(|e| GenerationError::Transport(e.to_string()))?;

		if !status.is_success() {
			return Err(GenerationError::Status { status: status.as_u16(), message: body });
		}

		parse_generated(&body)
	}
}

fn build_request<'a>(prompt: &'a str, params: &GenerationParams) -> GenerateRequest<'a> {
	GenerateRequest {
		inputs: prompt,
		parameters: GenerateParameters {
			max_new_tokens: params.max_length,
			top_p: params.do_sample.then(|| params.top_p()),
			do_sample: params.do_sample,
			return_full_text: false,
		},
	}
}

/// Extracts the generated text from a response body.
fn parse_generated(body: &str) -> Result<String, GenerationError> {
	let response: GenerateResponse =
		serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

	let text = match response {
		GenerateResponse::Single(generated) => generated.generated_text,
		GenerateResponse::Batch(batch) => batch
			.into_iter()
			.next()
			.map(|generated| generated.generated_text)
			.ok_or(GenerationError::EmptyOutput)?,
	};

	if text.trim().is_empty() {
		return Err(GenerationError::EmptyOutput);
	}
	Ok(text)
}
