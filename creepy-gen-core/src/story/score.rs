/// Terms that make a passage scary.
pub const LEXICON: [&str; 8] = ["blood", "death", "ghost", "corpse", "dark", "scream", "shadow", "fear"];

/// Upper bound of the scare score.
pub const MAX_SCORE: u8 = 100;

const POINTS_PER_MATCH: usize = 10;

/// Computes the scare score of a passage, in `0..=100`.
///
/// Each lexicon term is counted case-insensitively as a plain substring,
/// scanning left to right without overlap, so "darkness" counts as one
/// "dark". Every match is worth 10 points and the total is capped at 100.
pub fn score(text: &str) -> u8 {
	let lowered = text.to_lowercase();
	let matches: usize = LEXICON.iter().map(|term| lowered.matches(term).count()).sum();

	matches.saturating_mul(POINTS_PER_MATCH).min(usize::from(MAX_SCORE)) as u8
}
