use std::collections::HashMap;

use rand::Rng;

/// Observed next characters after one context.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Invariants
/// - Each occurrence count is strictly positive
#[derive(Clone, Debug, Default)]
pub(crate) struct Transitions {
	/// Example: { 'e' => 42, 'a' => 3 }
	counts: HashMap<char, usize>,
}

impl Transitions {
	/// Records one occurrence of `next_char`.
	pub(crate) fn add(&mut self, next_char: char) {
		*self.counts.entry(next_char).or_insert(0) += 1;
	}

	/// Returns the most frequent character (ties broken by char order).
	pub(crate) fn most_likely(&self) -> Option<char> {
		self.ranked().first().map(|(c, _)| *c)
	}

	/// Picks a character by weighted sampling restricted to the nucleus.
	///
	/// Candidates are ranked by count; the nucleus is the shortest prefix
	/// of that ranking whose share of the total reaches `top_p`. Sampling
	/// within the nucleus is proportional to count.
	///
	/// Returns `None` if no transitions were observed.
	pub(crate) fn sample_nucleus<R: Rng + ?Sized>(&self, top_p: f32, rng: &mut R) -> Option<char> {
		let ranked = self.ranked();
		let total: usize = ranked.iter().map(|(_, count)| count).sum();
		if total == 0 {
			return None;
		}

		let mut kept = 0;
		let mut mass = 0;
		for (_, count) in &ranked {
			kept += 1;
			mass += count;
			if mass as f32 / total as f32 >= top_p {
				break;
			}
		}
		let nucleus = &ranked[..kept];

		let mut r = rng.random_range(0..mass);
		for (next_char, count) in nucleus {
			if r < *count {
				return Some(*next_char);
			}
			r -= count;
		}

		nucleus.last().map(|(c, _)| *c)
	}

	/// Transitions sorted by decreasing count, then by character, so that
	/// a seeded rng always sees the same order.
	fn ranked(&self) -> Vec<(char, usize)> {
		let mut ranked: Vec<(char, usize)> = self.counts.iter().map(|(c, n)| (*c, *n)).collect();
		ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
		ranked
	}
}
