use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use music_machine_core::{
    InstrumentCategory, Lenient, MAX_STEPS, Sequence, SequenceId, SequencePatch, SequenceStore,
    SoundDefinition, StoreError,
    catalog::{Instruments, instruments},
    get_sound_config,
    sequence::{DEFAULT_BPM, DEFAULT_NAME, DEFAULT_STEPS},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::session::{CurrentSession, ensure_session};

const EDITOR_PAGE: &str = include_str!("../static/index.html");

// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SequenceStore>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(store: Arc<SequenceStore>, cookie_key: Key) -> Self {
        Self { store, cookie_key }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

// REST API request/response types
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateSequenceRequest {
    name: Option<Lenient<String>>,
    bpm: Option<Lenient<u32>>,
    steps: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SequencesResponse {
    sequences: Vec<Sequence>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    sequence_id: SequenceId,
    message: String,
}

#[derive(Debug, Serialize)]
pub struct SequenceResponse {
    sequence: Sequence,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    message: String,
    sequence: Sequence,
}

#[derive(Debug, Serialize)]
pub struct InstrumentsResponse {
    instruments: Instruments,
}

#[derive(Debug, Serialize)]
pub struct InstrumentResponse {
    instrument: &'static SoundDefinition,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    app: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    error: String,
}

// Build the Axum router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Editor pages, which also hand out session cookies
        .route("/", get(editor_page))
        .route("/sequencer", get(editor_page))
        // Sequence CRUD
        .route("/api/sequences", get(list_sequences).post(create_sequence))
        .route(
            "/api/sequences/:id",
            get(get_sequence).put(update_sequence).delete(delete_sequence),
        )
        .route("/api/play/:id", post(play_sequence))
        // Instrument catalog
        .route("/api/instruments", get(get_instruments))
        .route("/api/instruments/:category/:name", get(get_instrument))
        // Health check
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        app: "music-machine",
    })
}

// GET / and /sequencer - Serve the editor shell, starting a session if needed
async fn editor_page(jar: SignedCookieJar) -> (SignedCookieJar, Html<&'static str>) {
    let (jar, session_id, created) = ensure_session(jar);
    if created {
        info!("Started session {}", session_id);
    }
    (jar, Html(EDITOR_PAGE))
}

// GET /api/sequences - List the session's sequences
async fn list_sequences(
    State(state): State<AppState>,
    CurrentSession(session_id): CurrentSession,
) -> Json<SequencesResponse> {
    let sequences = state.store.get_session_sequences(&session_id);
    debug!("Listing {} sequences for session {}", sequences.len(), session_id);
    Json(SequencesResponse { sequences })
}

// POST /api/sequences - Create a sequence in the caller's session
async fn create_sequence(
    State(state): State<AppState>,
    CurrentSession(session_id): CurrentSession,
    body: Bytes,
) -> Result<Json<CreatedResponse>, AppError> {
    let request: CreateSequenceRequest = parse_body(&body)?;

    let steps = request.steps.unwrap_or(DEFAULT_STEPS);
    if steps > MAX_STEPS {
        return Err(AppError::BadRequest(format!(
            "steps must be at most {}",
            MAX_STEPS
        )));
    }

    let sequence_id = state.store.create_sequence(
        &session_id,
        request.name.unwrap_or_else(|| DEFAULT_NAME.into()),
        request.bpm.unwrap_or(Lenient::Typed(DEFAULT_BPM)),
        steps,
    );
    info!("Created sequence {} for session {}", sequence_id, session_id);

    Ok(Json(CreatedResponse {
        sequence_id,
        message: "Sequence created successfully".into(),
    }))
}

// GET /api/sequences/:id - Fetch one sequence
async fn get_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SequenceResponse>, AppError> {
    let sequence = find_sequence(&state, &id)?;
    Ok(Json(SequenceResponse { sequence }))
}

// PUT /api/sequences/:id - Replace whitelisted fields
async fn update_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_sequence_id(&id)?;
    let patch: SequencePatch = parse_body(&body)?;
    if patch.is_empty() {
        debug!("Empty update for sequence {}, refreshing timestamp only", id);
    }

    state.store.update_sequence(&id, patch)?;
    debug!("Updated sequence {}", id);

    Ok(Json(MessageResponse {
        message: "Sequence updated successfully".into(),
    }))
}

// DELETE /api/sequences/:id - Remove a sequence
async fn delete_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_sequence_id(&id)?;
    state.store.delete_sequence(&id)?;
    info!("Deleted sequence {}", id);

    Ok(Json(MessageResponse {
        message: "Sequence deleted successfully".into(),
    }))
}

// POST /api/play/:id - Acknowledge playback; audio is rendered client-side
async fn play_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlayResponse>, AppError> {
    let sequence = find_sequence(&state, &id)?;
    match sequence.bpm.typed() {
        Some(bpm) => debug!("Play requested for sequence {} at {} bpm", sequence.id, bpm),
        None => debug!("Play requested for sequence {} with a non-numeric bpm", sequence.id),
    }

    Ok(Json(PlayResponse {
        message: format!("Playing sequence {}", sequence.id),
        sequence,
    }))
}

// GET /api/instruments - The full catalog
async fn get_instruments() -> Json<InstrumentsResponse> {
    Json(InstrumentsResponse {
        instruments: instruments(),
    })
}

// GET /api/instruments/:category/:name - One sound definition
async fn get_instrument(
    Path((category, name)): Path<(String, String)>,
) -> Result<Json<InstrumentResponse>, AppError> {
    let instrument = category
        .parse::<InstrumentCategory>()
        .ok()
        .and_then(|category| get_sound_config(category, &name))
        .ok_or_else(|| AppError::NotFound("Instrument not found".into()))?;

    Ok(Json(InstrumentResponse { instrument }))
}

fn find_sequence(state: &AppState, id: &str) -> Result<Sequence, AppError> {
    let id = parse_sequence_id(id)?;
    state
        .store
        .get_sequence(&id)
        .ok_or(AppError::from(StoreError::NotFound(id)))
}

// Ids that are not UUIDs cannot name a stored sequence
fn parse_sequence_id(id: &str) -> Result<SequenceId, AppError> {
    id.parse()
        .map_err(|_| AppError::NotFound("Sequence not found".into()))
}

// An empty body counts as `{}`
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
}

// Error handling
#[derive(Debug)]
pub enum AppError {
    MissingSession,
    NotFound(String),
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound("Sequence not found".into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::MissingSession => (StatusCode::BAD_REQUEST, "No session found".to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}
