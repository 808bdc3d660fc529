//! End-to-end session flow: catalog → choice → generation → history → score.
//!
//! Run with: `cargo test -p creepy-gen-core --test session_flow`

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use creepy_gen_core::gateway::{GenerationError, GenerationGateway, GenerationParams, MarkovGateway};
use creepy_gen_core::gateway::markov::DEFAULT_ORDER;
use creepy_gen_core::config::{Config, SEEDS_FORMAT_VAR, SEEDS_VAR};
use creepy_gen_core::story::catalog::{CatalogError, SAMPLE_SIZE, SeedCatalog, SeedFormat, SeedRecord, choices, sample};
use creepy_gen_core::story::score::score;
use creepy_gen_core::story::session::{SessionPhase, SessionState, StoryError};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Gateway returning scripted answers and remembering the prompts it saw.
struct ScriptedGateway {
	answers: Mutex<Vec<Result<String, GenerationError>>>,
	prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
	fn new(mut answers: Vec<Result<String, GenerationError>>) -> Self {
		answers.reverse();
		Self { answers: Mutex::new(answers), prompts: Mutex::new(Vec::new()) }
	}

	fn prompts(&self) -> Vec<String> {
		self.prompts.lock().unwrap().clone()
	}
}

impl GenerationGateway for ScriptedGateway {
	fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, GenerationError> {
		self.prompts.lock().unwrap().push(prompt.to_owned());
		self.answers
			.lock()
			.unwrap()
			.pop()
			.unwrap_or(Err(GenerationError::Unavailable("script exhausted".to_owned())))
	}
}

fn write_seed_file(extension: &str, contents: &str) -> tempfile::NamedTempFile {
	let mut file = tempfile::Builder::new().suffix(extension).tempfile().expect("Failed to create temp file");
	file.write_all(contents.as_bytes()).expect("Failed to write seeds");
	file
}

#[test]
fn test_multi_turn_prompts_accumulate() {
	let gateway = ScriptedGateway::new(vec![
		Ok("The door creaked open.".to_owned()),
		Ok("A shadow slid across the dark floor.".to_owned()),
	]);
	let params = GenerationParams::default();
	let mut session = SessionState::start_session();

	let first = session.continue_story(&gateway, "I was alone.", &params).unwrap();
	assert_eq!(first.score, 0);

	let second = session.continue_story(&gateway, "Then it moved.", &params).unwrap();
	assert_eq!(second.text, "A shadow slid across the dark floor.");
	assert_eq!(second.score, 20);
	assert_eq!(second.score, score(session.latest().unwrap()));

	assert_eq!(
		gateway.prompts(),
		vec![
			"I was alone.".to_owned(),
			"The door creaked open.\n\nContinue the story. Next: Then it moved.".to_owned(),
		]
	);
	assert_eq!(session.history().len(), 2);
}

#[test]
fn test_failed_generation_leaves_history_intact() {
	let gateway = ScriptedGateway::new(vec![
		Ok("The door creaked open.".to_owned()),
		Err(GenerationError::Transport("connection reset".to_owned())),
		Ok("Nobody was there.".to_owned()),
	]);
	let params = GenerationParams::default();
	let mut session = SessionState::start_session();

	session.continue_story(&gateway, "seed", &params).unwrap();
	let before = session.history().to_vec();

	let failure = session.continue_story(&gateway, "seed", &params);
	assert!(matches!(failure, Err(StoryError::Generation(GenerationError::Transport(_)))));
	assert_eq!(session.history(), before.as_slice());

	// Still usable afterwards.
	session.continue_story(&gateway, "seed", &params).unwrap();
	assert_eq!(session.latest(), Some("Nobody was there."));
}

#[test]
fn test_blank_generation_is_not_recorded() {
	let gateway = ScriptedGateway::new(vec![Ok("   ".to_owned())]);
	let mut session = SessionState::start_session();

	let result = session.continue_story(&gateway, "seed", &GenerationParams::default());
	assert!(matches!(result, Err(StoryError::Session(_))));
	assert_eq!(session.phase(), SessionPhase::Empty);
}

#[test]
fn test_sessions_are_independent() {
	let gateway = ScriptedGateway::new(vec![Ok("one".to_owned()), Ok("two".to_owned())]);
	let params = GenerationParams::default();
	let mut alice = SessionState::start_session();
	let mut bob = SessionState::start_session();

	alice.continue_story(&gateway, "a", &params).unwrap();
	bob.continue_story(&gateway, "b", &params).unwrap();

	assert_eq!(alice.history(), ["one"]);
	assert_eq!(bob.history(), ["two"]);
}

#[test]
fn test_catalog_files_feed_offline_session() {
	let json = write_seed_file(
		".json",
		r#"[{"text":"The ghost knocked.","intensity":2},{"text":"Blood on the stairs.","intensity":5},{"text":"Dark water rose."}]"#,
	);
	let jsonl = write_seed_file(
		".jsonl",
		"{\"text\":\"The ghost knocked.\",\"intensity\":2}\n{\"text\":\"Blood on the stairs.\",\"intensity\":5}\n{\"text\":\"Dark water rose.\"}\n",
	);

	let catalog = SeedCatalog::from_path(json.path()).unwrap();
	assert_eq!(catalog.records(), SeedCatalog::from_path(jsonl.path()).unwrap().records());

	let mut rng = StdRng::seed_from_u64(9);
	let offered = choices(&sample(catalog.filter_by_max_intensity(3).unwrap(), SAMPLE_SIZE, &mut rng));
	assert_eq!(offered.len(), 2);
	assert!(offered.iter().all(|choice| choice.intensity <= 3));

	let gateway = MarkovGateway::from_catalog(&catalog, DEFAULT_ORDER).with_seed(1);
	let mut session = SessionState::start_session();
	let turn = session
		.continue_story(&gateway, &offered[0].text, &GenerationParams::default().with_max_length(60))
		.unwrap();
	assert!(turn.score <= 100);
	assert_eq!(session.latest(), Some(turn.text.as_str()));
}

#[test]
fn test_unknown_extension_is_rejected() {
	let file = write_seed_file(".csv", "text,intensity\nA,1\n");
	assert!(SeedCatalog::from_path(file.path()).is_err());
}

#[test]
fn test_scored_files_bin_into_levels() {
	let json = write_seed_file(
		".json",
		r#"[{"text":"a","score":1},{"text":"b","score":50},{"text":"c","score":900}]"#,
	);
	let jsonl = write_seed_file(
		".jsonl",
		"{\"text\":\"a\",\"upvotes\":1}\n{\"text\":\"b\",\"upvotes\":50}\n{\"text\":\"c\",\"upvotes\":900}\n",
	);

	let path = json.path().to_string_lossy().into_owned();
	let config = Config::from_lookup(|key| match key {
		SEEDS_VAR => Some(path.clone()),
		SEEDS_FORMAT_VAR => Some("scored".to_owned()),
		_ => None,
	})
	.unwrap();

	let catalog = SeedCatalog::open(&config.seeds_path, config.seeds_format).unwrap();
	let levels: Vec<u8> = catalog.records().iter().map(SeedRecord::intensity).collect();
	assert_eq!(levels, vec![1, 3, 5]);
	assert_eq!(catalog.records(), SeedCatalog::from_scored_path(jsonl.path()).unwrap().records());

	let mild = catalog.filter_by_max_intensity(2).unwrap();
	assert_eq!(mild, vec![SeedRecord::new("a", 1).unwrap()]);
}

#[test]
fn test_scored_file_is_not_loaded_as_records() {
	let file = write_seed_file(".json", r#"[{"text":"a","score":1},{"text":"b","score":50}]"#);
	assert!(matches!(
		SeedCatalog::open(file.path(), SeedFormat::Records),
		Err(CatalogError::MalformedSeedData { index: 0, .. })
	));
}

#[test]
fn test_gateway_called_once_per_turn() {
	struct Counting(AtomicU32);
	impl GenerationGateway for Counting {
		fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, GenerationError> {
			self.0.fetch_add(1, Ordering::SeqCst);
			Ok("fear".to_owned())
		}
	}

	let gateway = Counting(AtomicU32::new(0));
	let mut session = SessionState::start_session();
	let turn = session.continue_story(&gateway, "seed", &GenerationParams::default()).unwrap();
	assert_eq!(turn.score, 10);
	assert_eq!(gateway.0.load(Ordering::SeqCst), 1);
}
