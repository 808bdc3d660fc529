use serde::Serialize;

use super::GenerationError;

/// Default maximum output length.
pub const DEFAULT_MAX_LENGTH: usize = 150;

/// Default nucleus (top-p) threshold.
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Parameters for one generation request.
///
/// # Responsibilities
/// - Bound the generated output (`max_length`)
/// - Control randomness (`do_sample`, `top_p`)
///
/// # Invariants
/// - `top_p` is always within `(0.0, 1.0]`
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GenerationParams {
	/// Maximum output length (new tokens for remote models, characters for
	/// the offline generator).
	pub max_length: usize,

	/// Nucleus sampling threshold: candidates are drawn from the smallest
	/// set whose cumulative probability reaches this value.
	top_p: f32,

	/// Whether to sample (true) or always take the most likely candidate.
	pub do_sample: bool,
}

impl Default for GenerationParams {
	fn default() -> Self {
		Self { max_length: DEFAULT_MAX_LENGTH, top_p: DEFAULT_TOP_P, do_sample: true }
	}
}

impl GenerationParams {
	/// Returns the current nucleus threshold.
	pub fn top_p(&self) -> f32 {
		self.top_p
	}

	/// Sets the nucleus threshold.
	///
	/// # Errors
	/// Returns an error if the value is outside `(0.0, 1.0]`.
	pub fn set_top_p(&mut self, top_p: f32) -> Result<(), GenerationError> {
		if !(top_p > 0.0 && top_p <= 1.0) {
			return Err(GenerationError::InvalidParams(format!(
				"top_p must be in (0.0, 1.0], got {top_p}"
			)));
		}
		self.top_p = top_p;
		Ok(())
	}

	pub fn with_max_length(mut self, max_length: usize) -> Self {
		self.max_length = max_length;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let params = GenerationParams::default();
		assert_eq!(params.max_length, 150);
		assert_eq!(params.top_p(), 0.9);
		assert!(params.do_sample);
	}

	#[test]
	fn test_set_top_p_bounds() {
		let mut params = GenerationParams::default();
		assert!(params.set_top_p(1.0).is_ok());
		assert!(params.set_top_p(0.5).is_ok());
		assert_eq!(params.top_p(), 0.5);

		assert!(params.set_top_p(0.0).is_err());
		assert!(params.set_top_p(1.5).is_err());
		assert!(params.set_top_p(f32::NAN).is_err());
		assert_eq!(params.top_p(), 0.5);
	}
}
