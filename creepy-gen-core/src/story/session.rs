use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{GenerationError, GenerationGateway, GenerationParams};
use super::score::score;

/// Separator placed between history segments in a prompt.
pub const SEGMENT_SEPARATOR: &str = "\n\n";

/// Line asking the model to continue from the accumulated history.
pub const CONTINUE_DIRECTIVE: &str = "Continue the story. Next:";

/// Errors raised by `SessionState` itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
	#[error("Generated segment is empty")]
	EmptySegment,
}

/// Errors from a full generation step (`SessionState::continue_story`).
///
/// Either way, the session history is left untouched.
#[derive(Debug, Error)]
pub enum StoryError {
	#[error("Session error: {0}")]
	Session(#[from] SessionError),

	#[error("Generation failed: {0}")]
	Generation(#[from] GenerationError),
}

/// Lifecycle phase of a session, derived from its history.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
	Empty,
	Active,
}

/// Outcome of one successful generation step.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Turn {
	pub text: String,
	pub score: u8,
}

/// Accumulated history of one user session.
///
/// ## Invariants
/// - History is append-only; only `reset` removes segments (all of them)
/// - Every segment contains at least one non-whitespace character
#[derive(Clone, Debug, Default)]
pub struct SessionState {
	history: Vec<String>,
}

impl SessionState {
	/// Starts a session with an empty history.
	pub fn start_session() -> Self {
		Self::default()
	}

	/// Builds the prompt for the next generation step.
	///
	/// With an empty history the seed is returned verbatim. Otherwise all
	/// segments are joined by a blank line, followed by the continue
	/// directive and the seed:
	///
	/// ```text
	/// <segment 1>
	///
	/// <segment 2>
	///
	/// Continue the story. Next: <seed>
	/// ```
	pub fn build_prompt(&self, seed: &str) -> String {
		if self.history.is_empty() {
			return seed.to_owned();
		}

		format!(
			"{}{SEGMENT_SEPARATOR}{CONTINUE_DIRECTIVE} {seed}",
			self.history.join(SEGMENT_SEPARATOR)
		)
	}

	/// Appends a generated segment to the history.
	///
	/// # Errors
	/// Returns `EmptySegment` if the text is empty or whitespace-only; the
	/// history is unchanged in that case.
	pub fn record_turn(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
		let text = text.into();
		if text.trim().is_empty() {
			return Err(SessionError::EmptySegment);
		}

		self.history.push(text);
		Ok(())
	}

	/// Returns the most recent segment, if any.
	pub fn latest(&self) -> Option<&str> {
		self.history.last().map(String::as_str)
	}

	/// Returns every recorded segment, oldest first.
	pub fn history(&self) -> &[String] {
		&self.history
	}

	pub fn phase(&self) -> SessionPhase {
		if self.history.is_empty() {
			SessionPhase::Empty
		} else {
			SessionPhase::Active
		}
	}

	/// Clears the history (session restart).
	pub fn reset(&mut self) {
		self.history.clear();
	}

	/// Runs one generation step: prompt, generate, record, score.
	///
	/// The gateway call blocks. Its output is recorded only once it has
	/// been obtained successfully, so a failed call leaves the history as
	/// it was and the session can simply be retried.
	///
	/// # Errors
	/// - `StoryError::Generation` if the gateway fails
	/// - `StoryError::Session` if the gateway returned blank text
	pub fn continue_story<G>(&mut self, gateway: &G, seed: &str, params: &GenerationParams) -> Result<Turn, StoryError>
	where
		G: GenerationGateway + ?Sized,
	{
		let prompt = self.build_prompt(seed);
		debug!("Generating from a {}-segment history ({} chars of prompt)", self.history.len(), prompt.chars().count());

		let text = gateway.generate(&prompt, params).inspect_err(|e| {
			warn!("Generation failed, history kept at {} segments: {e}", self.history.len());
		})?;

		let score = score(&text);
		self.record_turn(text.clone())?;
		Ok(Turn { text, score })
	}
}
