use std::path::Path;
use std::str::FromStr;

use log::{debug, info};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::io::{get_extension, non_blank_lines, read_to_string};

/// Lowest intensity level a seed can carry.
pub const MIN_INTENSITY: u8 = 1;

/// Highest intensity level a seed can carry.
pub const MAX_INTENSITY: u8 = 5;

/// Intensity assigned to records that do not specify one.
pub const DEFAULT_INTENSITY: u8 = 3;

/// Number of seeds offered to the user at once.
pub const SAMPLE_SIZE: usize = 10;

/// Errors raised while loading or querying a `SeedCatalog`.
#[derive(Debug, Error)]
pub enum CatalogError {
	#[error("Malformed seed data (record {index}): {reason}")]
	MalformedSeedData { index: usize, reason: String },

	#[error("Seed text cannot be empty")]
	EmptyText,

	#[error("Intensity must be between 1 and 5, got {0}")]
	InvalidIntensity(i64),

	#[error("Unsupported seed file format: {0}")]
	UnsupportedFormat(String),

	#[error("Unknown seed dataset kind: {0} (expected `records` or `scored`)")]
	UnknownSeedFormat(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// A single seed: a short text fragment and its content-strength level.
///
/// ## Invariants
/// - `text` is never empty
/// - `intensity` is within `MIN_INTENSITY..=MAX_INTENSITY`
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SeedRecord {
	text: String,
	intensity: u8,
}

impl SeedRecord {
	/// Creates a record, validating both fields.
	///
	/// # Errors
	/// Returns `InvalidIntensity` if `intensity` is out of range and
	/// `EmptyText` if `text` is empty.
	pub fn new(text: impl Into<String>, intensity: u8) -> Result<Self, CatalogError> {
		let text = text.into();
		if text.is_empty() {
			return Err(CatalogError::EmptyText);
		}
		let intensity = check_intensity(i64::from(intensity))?;
		Ok(Self { text, intensity })
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn intensity(&self) -> u8 {
		self.intensity
	}
}

/// A seed formatted for display next to the raw text it stands for.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SeedChoice {
	pub label: String,
	pub text: String,
	pub intensity: u8,
}

/// A record from a popularity-ranked dataset, before intensity binning.
///
/// A missing `score` counts as zero. Datasets exported with an `upvotes`
/// column are accepted as-is.
#[derive(Deserialize, Clone, Debug)]
pub struct ScoredSeed {
	pub text: String,
	#[serde(default, alias = "upvotes")]
	pub score: Option<f64>,
}

/// How the records of a seed file carry their intensity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeedFormat {
	/// Explicit `intensity` per record (see `SeedCatalog::load`).
	#[default]
	Records,
	/// Popularity `score` per record, binned into quintiles (see
	/// `SeedCatalog::from_scored`).
	Scored,
}

impl FromStr for SeedFormat {
	type Err = CatalogError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value.trim().to_lowercase().as_str() {
			"records" => Ok(Self::Records),
			"scored" => Ok(Self::Scored),
			other => Err(CatalogError::UnknownSeedFormat(other.to_owned())),
		}
	}
}

/// Read-only, ordered collection of seed records.
///
/// The catalog is loaded once (fail-fast: any malformed record aborts the
/// whole load) and then only queried.
#[derive(Clone, Debug, Default)]
pub struct SeedCatalog {
	records: Vec<SeedRecord>,
}

impl SeedCatalog {
	/// Builds a catalog from raw JSON records.
	///
	/// Each record needs a string `text`; `intensity` is optional and
	/// defaults to `DEFAULT_INTENSITY`.
	///
	/// # Errors
	/// - `MalformedSeedData` if a record is not an object, `text` is missing,
	///   not a string or empty, or `intensity` is not an integer
	/// - `MalformedSeedData` if `intensity` is outside `1..=5` (out-of-range
	///   values are rejected, never clamped)
	/// - `MalformedSeedData` if a record has a `score` or `upvotes` but no
	///   `intensity` (see `from_scored`)
	pub fn load(source: &[Value]) -> Result<Self, CatalogError> {
		let records = source
			.iter()
			.enumerate()
			.map(|(index, value)| parse_record(index, value))
			.collect::<Result<Vec<_>, _>>()?;

		debug!("Loaded {} seed records", records.len());
		Ok(Self { records })
	}

	/// Parses a JSON array of records.
	pub fn from_json_str(contents: &str) -> Result<Self, CatalogError> {
		let values: Vec<Value> = serde_json::from_str(contents)?;
		Self::load(&values)
	}

	/// Parses JSON Lines: one record per non-blank line.
	///
	/// Reported record indices are line numbers.
	pub fn from_json_lines(contents: &str) -> Result<Self, CatalogError> {
		let records = non_blank_lines(contents)
			.map(|(line_number, line)| {
				let value: Value = serde_json::from_str(line)
					.map_err(|e| malformed(line_number, &e.to_string()))?;
				parse_record(line_number, &value)
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self { records })
	}

	/// Loads a catalog from a `.json` or `.jsonl` file.
	///
	/// # Errors
	/// Returns an error if the file cannot be read, the extension is not
	/// recognized, or any record is malformed.
	pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
		Self::open(path, SeedFormat::Records)
	}

	/// Loads a popularity-ranked `.json` or `.jsonl` file and bins its
	/// scores into intensities.
	pub fn from_scored_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
		Self::open(path, SeedFormat::Scored)
	}

	/// Loads a seed file of the given kind; the extension picks JSON array
	/// or JSON Lines.
	pub fn open<P: AsRef<Path>>(path: P, format: SeedFormat) -> Result<Self, CatalogError> {
		let path = path.as_ref();
		let contents = read_to_string(path)?;
		let catalog = match (get_extension(path)?.as_str(), format) {
			("json", SeedFormat::Records) => Self::from_json_str(&contents)?,
			("jsonl" | "ndjson", SeedFormat::Records) => Self::from_json_lines(&contents)?,
			("json", SeedFormat::Scored) => Self::from_scored_json_str(&contents)?,
			("jsonl" | "ndjson", SeedFormat::Scored) => Self::from_scored_json_lines(&contents)?,
			(other, _) => return Err(CatalogError::UnsupportedFormat(other.to_owned())),
		};

		info!("Seed catalog loaded from {} ({format:?}): {} records", path.display(), catalog.len());
		Ok(catalog)
	}

	/// Parses a JSON array of scored records and bins it.
	pub fn from_scored_json_str(contents: &str) -> Result<Self, CatalogError> {
		Self::from_scored(serde_json::from_str(contents)?)
	}

	/// Parses JSON Lines of scored records and bins them.
	///
	/// Reported record indices are line numbers.
	pub fn from_scored_json_lines(contents: &str) -> Result<Self, CatalogError> {
		let source = non_blank_lines(contents)
			.map(|(line_number, line)| {
				let seed: ScoredSeed = serde_json::from_str(line)
					.map_err(|e| malformed(line_number, &e.to_string()))?;
				if seed.text.is_empty() {
					return Err(malformed(line_number, "`text` is empty"));
				}
				Ok(seed)
			})
			.collect::<Result<Vec<_>, _>>()?;

		Self::from_scored(source)
	}

	/// Builds a catalog from a popularity-ranked dataset.
	///
	/// Scores are binned into five quantile groups: the lowest fifth gets
	/// intensity 1, the highest fifth intensity 5. Quantile edges are
	/// linearly interpolated over the sorted scores and a record falls into
	/// the first group whose upper edge is >= its score.
	///
	/// # Errors
	/// Returns `MalformedSeedData` if any text is empty.
	pub fn from_scored(source: Vec<ScoredSeed>) -> Result<Self, CatalogError> {
		let scores: Vec<f64> = source.iter().map(|seed| sanitize_score(seed.score)).collect();
		let edges = quintile_edges(&scores);

		let records = source
			.into_iter()
			.zip(scores)
			.enumerate()
			.map(|(index, (seed, score))| {
				if seed.text.is_empty() {
					return Err(malformed(index, "`text` is empty"));
				}
				let above = edges.iter().filter(|edge| score > **edge).count() as u8;
				Ok(SeedRecord { text: seed.text, intensity: (MIN_INTENSITY + above).min(MAX_INTENSITY) })
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self { records })
	}

	pub fn records(&self) -> &[SeedRecord] {
		&self.records
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Returns every record with `intensity <= level`, in catalog order.
	///
	/// # Errors
	/// Returns `InvalidIntensity` if `level` is outside `1..=5`.
	pub fn filter_by_max_intensity(&self, level: u8) -> Result<Vec<SeedRecord>, CatalogError> {
		let level = check_intensity(i64::from(level))?;
		Ok(self
			.records
			.iter()
			.filter(|record| record.intensity <= level)
			.cloned()
			.collect())
	}
}

/// Returns a random permutation of at most `k` records, drawn without
/// replacement.
///
/// If fewer than `k` records are given, all of them are returned shuffled.
pub fn sample<T, R: Rng + ?Sized>(mut records: Vec<T>, k: usize, rng: &mut R) -> Vec<T> {
	records.shuffle(rng);
	records.truncate(k);
	records
}

/// Formats records as labelled choices (`"<text>  —  level <n>"`).
pub fn choices(records: &[SeedRecord]) -> Vec<SeedChoice> {
	records
		.iter()
		.map(|record| SeedChoice {
			label: format!("{}  —  level {}", record.text, record.intensity),
			text: record.text.clone(),
			intensity: record.intensity,
		})
		.collect()
}

fn malformed(index: usize, reason: &str) -> CatalogError {
	CatalogError::MalformedSeedData { index, reason: reason.to_owned() }
}

fn check_intensity(level: i64) -> Result<u8, CatalogError> {
	if (i64::from(MIN_INTENSITY)..=i64::from(MAX_INTENSITY)).contains(&level) {
		Ok(level as u8)
	} else {
		Err(CatalogError::InvalidIntensity(level))
	}
}

fn parse_record(index: usize, value: &Value) -> Result<SeedRecord, CatalogError> {
	let object = value
		.as_object()
		.ok_or_else(|| malformed(index, "record is not an object"))?;

	let text = match object.get("text") {
		Some(Value::String(text)) if !text.is_empty() => text.clone(),
		Some(Value::String(_)) => return Err(malformed(index, "`text` is empty")),
		Some(_) => return Err(malformed(index, "`text` is not a string")),
		None => return Err(malformed(index, "missing `text`")),
	};

	let intensity = match object.get("intensity") {
		None | Some(Value::Null) if object.contains_key("score") || object.contains_key("upvotes") => {
			return Err(malformed(index, "record has a popularity score but no `intensity`; load it as a scored dataset"));
		}
		None | Some(Value::Null) => DEFAULT_INTENSITY,
		Some(value) => {
			let level = value
				.as_i64()
				.ok_or_else(|| malformed(index, "`intensity` is not an integer"))?;
			check_intensity(level).map_err(|e| malformed(index, &e.to_string()))?
		}
	};

	Ok(SeedRecord { text, intensity })
}

fn sanitize_score(score: Option<f64>) -> f64 {
	match score {
		Some(value) if value.is_finite() => value,
		_ => 0.0,
	}
}

/// Upper edges of the first four quintiles (the fifth is unbounded).
fn quintile_edges(scores: &[f64]) -> Vec<f64> {
	if scores.is_empty() {
		return Vec::new();
	}

	let mut sorted = scores.to_vec();
	sorted.sort_by(f64::total_cmp);
	let last = (sorted.len() - 1) as f64;

	(1..MAX_INTENSITY)
		.map(|group| {
			let position = last * f64::from(group) / f64::from(MAX_INTENSITY);
			let low = position.floor() as usize;
			let high = position.ceil() as usize;
			sorted[low] + (sorted[high] - sorted[low]) * (position - low as f64)
		})
		.collect()
}
