use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::story::catalog::SeedCatalog;
use super::transitions::Transitions;
use super::{GenerationError, GenerationGateway, GenerationParams};

/// Default context length of the offline generator.
pub const DEFAULT_ORDER: usize = 4;

/// Offline character-level n-gram generator.
///
/// Every context of length `0..=order` seen in the training texts maps to
/// its observed next characters. Generation continues from the tail of the
/// prompt, backing off to shorter contexts when the longer ones are
/// unknown; the empty context always exists once any text was learned.
///
/// # Invariants
/// - `order >= 1`
/// - Contexts never span two training texts
#[derive(Debug)]
pub struct MarkovGateway {
	order: usize,
	contexts: HashMap<String, Transitions>,
	rng: Mutex<StdRng>,
}

impl MarkovGateway {
	/// Learns a generator from a set of texts.
	///
	/// An `order` of 0 is raised to 1.
	pub fn train<I, S>(texts: I, order: usize) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut gateway = Self {
			order: order.max(1),
			contexts: HashMap::new(),
			rng: Mutex::new(StdRng::from_os_rng()),
		};

		for text in texts {
			gateway.add_text(text.as_ref());
		}

		debug!("Offline generator trained: order {}, {} contexts", gateway.order, gateway.contexts.len());
		gateway
	}

	/// Learns a generator from every seed in a catalog.
	pub fn from_catalog(catalog: &SeedCatalog, order: usize) -> Self {
		Self::train(catalog.records().iter().map(|record| record.text()), order)
	}

	/// Replaces the random source with a seeded one (reproducible output).
	pub fn with_seed(mut self, seed: u64) -> Self {
		self.rng = Mutex::new(StdRng::seed_from_u64(seed));
		self
	}

	fn add_text(&mut self, text: &str) {
		let chars: Vec<char> = text.chars().collect();
		for (i, next_char) in chars.iter().enumerate() {
			for length in 0..=self.order.min(i) {
				let context: String = chars[i - length..i].iter().collect();
				self.contexts.entry(context).or_default().add(*next_char);
			}
		}
	}

	/// Finds the longest known context ending the given text.
	fn lookup(&self, tail: &[char]) -> Option<&Transitions> {
		(0..=self.order.min(tail.len())).rev().find_map(|length| {
			let context: String = tail[tail.len() - length..].iter().collect();
			self.contexts.get(&context)
		})
	}
}

impl GenerationGateway for MarkovGateway {
	fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, GenerationError> {
		if self.contexts.is_empty() {
			return Err(GenerationError::Unavailable("offline generator has no training data".to_owned()));
		}

		let mut rng = self
			.rng
			.lock()
			.map_err(|_| GenerationError::Unavailable("generator lock poisoned".to_owned()))?;

		let mut window: Vec<char> = prompt.chars().collect();
		let mut output = String::new();

		for _ in 0..params.max_length {
			let Some(transitions) = self.lookup(&window) else { break };

			let next_char = if params.do_sample {
				transitions.sample_nucleus(params.top_p(), &mut *rng)
			} else {
				transitions.most_likely()
			};
			let Some(next_char) = next_char else { break };

			output.push(next_char);
			window.push(next_char);
		}

		if output.trim().is_empty() {
			return Err(GenerationError::EmptyOutput);
		}
		Ok(output)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn trained() -> MarkovGateway {
		MarkovGateway::train(
			[
				"The shadow in the hallway whispered my name.",
				"The corpse in the basement opened its eyes.",
				"The ghost in the mirror did not copy my smile.",
			],
			DEFAULT_ORDER,
		)
	}

	#[test]
	fn test_untrained_is_unavailable() {
		let gateway = MarkovGateway::train(Vec::<String>::new(), DEFAULT_ORDER);
		let result = gateway.generate("Hello", &GenerationParams::default());
		assert!(matches!(result, Err(GenerationError::Unavailable(_))));
	}

	#[test]
	fn test_respects_max_length() {
		let gateway = trained().with_seed(11);
		let params = GenerationParams::default().with_max_length(40);
		let text = gateway.generate("The ", &params).unwrap();
		assert!(text.chars().count() <= 40);
		assert!(!text.trim().is_empty());
	}

	#[test]
	fn test_seeded_output_is_reproducible() {
		let params = GenerationParams::default();
		let first = trained().with_seed(5).generate("The ghost", &params).unwrap();
		let second = trained().with_seed(5).generate("The ghost", &params).unwrap();
		assert_eq!(first, second);
	}

	#[test]
	fn test_greedy_follows_known_context() {
		let gateway = MarkovGateway::train(["abcabcabc"], 2);
		let mut params = GenerationParams::default().with_max_length(4);
		params.do_sample = false;
		assert_eq!(gateway.generate("ab", &params).unwrap(), "cabc");
	}

	#[test]
	fn test_unknown_prompt_backs_off() {
		let gateway = trained().with_seed(2);
		let params = GenerationParams::default().with_max_length(20);
		assert!(gateway.generate("zzzz###", &params).is_ok());
	}

	#[test]
	fn test_zero_length_is_empty_output() {
		let gateway = trained();
		let params = GenerationParams::default().with_max_length(0);
		assert!(matches!(gateway.generate("The", &params), Err(GenerationError::EmptyOutput)));
	}
}
