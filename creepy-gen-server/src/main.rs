use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{delete, get, post, web, App, HttpResponse, HttpServer, Responder};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use creepy_gen_core::config::Config;
use creepy_gen_core::gateway::{GenerationGateway, GenerationParams, build_gateway};
use creepy_gen_core::story::catalog::{DEFAULT_INTENSITY, SAMPLE_SIZE, SeedCatalog, choices, sample};
use creepy_gen_core::story::score::score;
use creepy_gen_core::story::session::{SessionPhase, SessionState, StoryError, Turn};

/// Query parameters for the `/v1/seeds` endpoint
#[derive(Deserialize)]
struct SeedQuery {
	max_intensity: Option<u8>,
}

/// Body of `POST /v1/sessions/{id}/turns`
#[derive(Deserialize)]
struct TurnRequest {
	seed: String,
}

#[derive(Serialize, Deserialize)]
struct SessionCreated {
	id: Uuid,
}

/// Display view of one session.
#[derive(Serialize, Deserialize)]
struct SessionView {
	history: Vec<String>,
	latest: Option<String>,
	score: Option<u8>,
	phase: SessionPhase,
}

/// Catalog and gateway are loaded once and shared read-only; each session
/// has its own lock so sessions never wait on each other.
///
/// Sessions idle for longer than `session_ttl` are dropped the next time
/// the registry is touched, and at most `max_sessions` are kept alive.
struct SharedData {
	catalog: SeedCatalog,
	gateway: Box<dyn GenerationGateway>,
	params: GenerationParams,
	session_ttl: Duration,
	max_sessions: usize,
	sessions: Mutex<HashMap<Uuid, SessionSlot>>,
}

struct SessionSlot {
	state: Arc<Mutex<SessionState>>,
	last_used: Instant,
}

enum TurnFailure {
	Lock,
	Story(StoryError),
}

impl SharedData {
	fn new(catalog: SeedCatalog, gateway: Box<dyn GenerationGateway>, config: &Config) -> Self {
		Self {
			catalog,
			gateway,
			params: config.params.clone(),
			session_ttl: config.session_ttl,
			max_sessions: config.max_sessions,
			sessions: Mutex::new(HashMap::new()),
		}
	}

	/// Looks a session up and marks it as used.
	fn session(&self, id: &Uuid) -> Option<Arc<Mutex<SessionState>>> {
		let mut sessions = self.sessions.lock().ok()?;
		self.evict_idle(&mut sessions);

		let slot = sessions.get_mut(id)?;
		slot.last_used = Instant::now();
		Some(slot.state.clone())
	}

	fn evict_idle(&self, sessions: &mut HashMap<Uuid, SessionSlot>) {
		let before = sessions.len();
		sessions.retain(|_, slot| slot.last_used.elapsed() < self.session_ttl);

		let evicted = before - sessions.len();
		if evicted > 0 {
			debug!("Evicted {evicted} idle session(s), {} left", sessions.len());
		}
	}
}

impl SessionView {
	fn of(session: &SessionState) -> Self {
		let latest = session.latest().map(str::to_owned);
		Self {
			history: session.history().to_vec(),
			score: latest.as_deref().map(score),
			latest,
			phase: session.phase(),
		}
	}
}

/// HTTP GET endpoint `/v1/seeds`
///
/// Returns up to ten random seeds at or below `max_intensity` (default 3),
/// labelled for display.
#[get("/v1/seeds")]
async fn get_seeds(data: web::Data<SharedData>, query: web::Query<SeedQuery>) -> impl Responder {
	let level = query.max_intensity.unwrap_or(DEFAULT_INTENSITY);

	let filtered = match data.catalog.filter_by_max_intensity(level) {
		Ok(records) => records,
		Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
	};

	let sampled = sample(filtered, SAMPLE_SIZE, &mut rand::rng());
	HttpResponse::Ok().json(choices(&sampled))
}

/// HTTP POST endpoint `/v1/sessions`
///
/// Answers 503 once `max_sessions` sessions are alive.
#[post("/v1/sessions")]
async fn post_session(data: web::Data<SharedData>) -> impl Responder {
	let mut sessions = match data.sessions.lock() {
		Ok(s) => s,
		Err(_) => return HttpResponse::InternalServerError().body("Session lock failed"),
	};

	data.evict_idle(&mut sessions);
	if sessions.len() >= data.max_sessions {
		warn!("Session limit reached ({})", data.max_sessions);
		return HttpResponse::ServiceUnavailable().body("Too many active sessions, try again later");
	}

	let id = Uuid::new_v4();
	let slot = SessionSlot { state: Arc::new(Mutex::new(SessionState::start_session())), last_used: Instant::now() };
	sessions.insert(id, slot);
	info!("Session {id} started ({} active)", sessions.len());
	HttpResponse::Created().json(SessionCreated { id })
}

#[get("/v1/sessions/{id}")]
async fn get_session(data: web::Data<SharedData>, path: web::Path<Uuid>) -> impl Responder {
	let Some(session) = data.session(&path) else {
		return HttpResponse::NotFound().body("Unknown session");
	};

	match session.lock() {
		Ok(session) => HttpResponse::Ok().json(SessionView::of(&session)),
		Err(_) => HttpResponse::InternalServerError().body("Session lock failed"),
	}
}

/// HTTP POST endpoint `/v1/sessions/{id}/turns`
///
/// Runs one generation step for the session. The gateway call blocks, so
/// it runs on the blocking thread pool. A gateway failure answers 502 and
/// leaves the history untouched; the client may retry.
#[post("/v1/sessions/{id}/turns")]
async fn post_turn(
	data: web::Data<SharedData>,
	path: web::Path<Uuid>,
	body: web::Json<TurnRequest>,
) -> impl Responder {
	let seed = body.into_inner().seed;
	if seed.trim().is_empty() {
		return HttpResponse::BadRequest().body("Seed cannot be empty");
	}

	let id = path.into_inner();
	let Some(session) = data.session(&id) else {
		return HttpResponse::NotFound().body("Unknown session");
	};

	let shared = data.clone();
	let result = web::block(move || -> Result<Turn, TurnFailure> {
		let mut session = session.lock().map_err(|_| TurnFailure::Lock)?;
		session
			.continue_story(shared.gateway.as_ref(), &seed, &shared.params)
			.map_err(TurnFailure::Story)
	})
	.await;

	match result {
		Ok(Ok(turn)) => HttpResponse::Ok().json(turn),
		Ok(Err(TurnFailure::Story(e))) => {
			warn!("Session {id}: {e}");
			HttpResponse::BadGateway().body(e.to_string())
		}
		Ok(Err(TurnFailure::Lock)) => HttpResponse::InternalServerError().body("Session lock failed"),
		Err(e) => HttpResponse::InternalServerError().body(format!("Generation task failed: {e}")),
	}
}

#[delete("/v1/sessions/{id}/history")]
async fn delete_history(data: web::Data<SharedData>, path: web::Path<Uuid>) -> impl Responder {
	let Some(session) = data.session(&path) else {
		return HttpResponse::NotFound().body("Unknown session");
	};

	match session.lock() {
		Ok(mut session) => {
			session.reset();
			HttpResponse::Ok().json(SessionView::of(&session))
		}
		Err(_) => HttpResponse::InternalServerError().body("Session lock failed"),
	}
}

#[delete("/v1/sessions/{id}")]
async fn delete_session(data: web::Data<SharedData>, path: web::Path<Uuid>) -> impl Responder {
	let mut sessions = match data.sessions.lock() {
		Ok(s) => s,
		Err(_) => return HttpResponse::InternalServerError().body("Session lock failed"),
	};

	data.evict_idle(&mut sessions);
	match sessions.remove(&path.into_inner()) {
		Some(_) => HttpResponse::NoContent().finish(),
		None => HttpResponse::NotFound().body("Unknown session"),
	}
}

fn routes(cfg: &mut web::ServiceConfig) {
	cfg.service(get_seeds)
		.service(post_session)
		.service(get_session)
		.service(post_turn)
		.service(delete_history)
		.service(delete_session);
}

/// Main entry point for the server.
///
/// Loads the configuration, the seed catalog and the gateway before the
/// async runtime starts (the blocking HTTP client must not be built inside
/// it), then serves the API.
///
/// # Notes
/// - Binds to `CREEPY_GEN_BIND:CREEPY_GEN_PORT` (127.0.0.1:5000 by default).
/// - `CREEPY_GEN_SEEDS_FORMAT=scored` loads a popularity-ranked seed file.
fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = Config::from_env()?;
	let catalog = SeedCatalog::open(&config.seeds_path, config.seeds_format)?;
	let gateway = build_gateway(&config, &catalog)?;
	let shared_data = web::Data::new(SharedData::new(catalog, gateway, &config));

	let address = (config.bind.clone(), config.port);
	info!("Listening on {}:{}", address.0, address.1);

	actix_web::rt::System::new().block_on(async move {
		HttpServer::new(move || {
			App::new()
				.wrap(Logger::default())
				.wrap(Cors::permissive())
				.app_data(shared_data.clone())
				.configure(routes)
		})
			.bind(address)?
			.run()
			.await
	})?;

	Ok(())
}
