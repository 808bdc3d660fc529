use std::io::{self, BufRead, Write};

use creepy_gen_core::config::Config;
use creepy_gen_core::gateway::build_gateway;
use creepy_gen_core::story::catalog::{DEFAULT_INTENSITY, SAMPLE_SIZE, SeedCatalog, SeedChoice, choices, sample};
use creepy_gen_core::story::session::SessionState;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Seed file location and generation settings come from CREEPY_GEN_* variables
    let config = Config::from_env()?;

    // Load the seed catalog (.json array or .jsonl, chosen by extension)
    // CREEPY_GEN_SEEDS_FORMAT=scored bins popularity scores into levels
    // Any malformed record aborts the load
    let catalog = SeedCatalog::open(&config.seeds_path, config.seeds_format)?;

    // Remote model when CREEPY_GEN_ENDPOINT is set, otherwise an offline
    // generator trained on the seeds themselves
    let gateway = build_gateway(&config, &catalog)?;

    // One session for the whole run, the history grows with each turn
    let mut session = SessionState::start_session();
    let mut rng = rand::rng();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("Creepy GPT - branching horror story generator");

    loop {
        // Max horror level (1=mild … 5=extreme), empty line keeps the default
        let Some(level) = ask(&mut lines, &format!("Max horror level 1-5 [{DEFAULT_INTENSITY}] (q to quit): "))? else {
            break;
        };
        if level == "q" {
            break;
        }
        let level = if level.is_empty() {
            DEFAULT_INTENSITY
        } else {
            match level.parse::<u8>() {
                Ok(level) => level,
                Err(_) => {
                    println!("Please enter a number between 1 and 5");
                    continue;
                }
            }
        };

        // Filter & randomize a small subset for this round
        let filtered = match catalog.filter_by_max_intensity(level) {
            Ok(records) => records,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        let offered = choices(&sample(filtered, SAMPLE_SIZE, &mut rng));
        if offered.is_empty() {
            println!("No seeds at or below level {level}");
            continue;
        }

        for (i, choice) in offered.iter().enumerate() {
            println!("  {}) {}", i + 1, choice.label);
        }

        let Some(answer) = ask(&mut lines, "Pick your scary seed (r to reset the story): ")? else {
            break;
        };
        if answer == "r" {
            session.reset();
            println!("Story reset");
            continue;
        }
        let Some(seed) = pick(&offered, &answer) else {
            println!("Unknown choice '{answer}'");
            continue;
        };

        // Generate and display snippet + score
        // A failed generation is reported and the story stays as it was
        match session.continue_story(gateway.as_ref(), &seed.text, &config.params) {
            Ok(turn) => {
                println!("\n{}\n", turn.text);
                println!("Scare score: {}/100 ({} part(s) so far)\n", turn.score, session.history().len());
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    Ok(())
}

/// Prints a prompt and reads one trimmed line; `None` on end of input.
fn ask<B: BufRead>(lines: &mut io::Lines<B>, prompt: &str) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    lines.next().transpose().map(|line| line.map(|l| l.trim().to_owned()))
}

/// Resolves a 1-based menu answer to a choice.
fn pick<'a>(offered: &'a [SeedChoice], answer: &str) -> Option<&'a SeedChoice> {
    let index = answer.parse::<usize>().ok()?;
    offered.get(index.checked_sub(1)?)
}
