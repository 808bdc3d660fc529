use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::io;

/// Reads a text file into a single `String`.
pub(crate) fn read_to_string<P: AsRef<Path>>(filename: P) -> io::Result<String> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents)
}

/// Splits text into its non-blank lines, keeping the 1-based line number.
///
/// - Splits on `\n` / `\r\n`
/// - Blank and whitespace-only lines are skipped
pub(crate) fn non_blank_lines(contents: &str) -> impl Iterator<Item=(usize, &str)> {
	contents
		.lines()
		.enumerate()
		.filter(|(_, line)| !line.trim().is_empty())
		.map(|(index, line)| (index + 1, line))
}

/// Returns the lowercase extension of a path.
///
/// Examples:
/// - `"./data/seeds.JSONL"` → `"jsonl"`
/// - `"seeds"` → error
pub(crate) fn get_extension<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let extension = input_path
		.as_ref()
		.extension()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no extension"))?;

	Ok(extension.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_non_blank_lines_keeps_line_numbers() {
		let lines: Vec<_> = non_blank_lines("a\n\n  \r\nb\r\n").collect();
		assert_eq!(lines, vec![(1, "a"), (4, "b")]);
	}

	#[test]
	fn test_get_extension() {
		assert_eq!(get_extension("./data/seeds.JSONL").unwrap(), "jsonl");
		assert_eq!(get_extension("seeds.json").unwrap(), "json");
		assert!(get_extension("seeds").is_err());
	}
}
