use crate::session::{ActiveRound, PlayerSession, SessionStore};
use crate::{
    BundledData, Dataset, DifficultySettings, GameError, GameMode, PageScope, Round, Scoreboard,
    SearchConfig, SearchPage, build_round, choose_thumbnail,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info};

type SharedState = Arc<AppState>;
pub const SESSION_COOKIE: &str = "detective_session";

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub difficulty: DifficultySettings,
    pub search: SearchConfig,
}

impl AppState {
    fn from_config(config: &WebConfig) -> Self {
        Self {
            sessions: SessionStore::with_capacity(config.max_sessions),
            difficulty: config.difficulty.clone(),
            search: config.search.clone(),
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub difficulty: DifficultySettings,
    pub search: SearchConfig,
    pub max_sessions: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            difficulty: DifficultySettings::default(),
            search: SearchConfig::default(),
            max_sessions: crate::session::MAX_SESSION_COUNT,
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState::from_config(&config));
    let router = build_router(state);
    info!(
        %config.addr,
        max_sessions = config.max_sessions,
        char_budget = config.search.char_budget,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::UnknownDataset(_) => ApiError::not_found(err.to_string()),
            _ => ApiError::bad_request(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/datasets", get(api_datasets))
        .route("/api/round", get(api_round))
        .route("/api/answer", get(api_answer))
        .route("/api/skip", get(api_skip))
        .route("/api/example", get(api_example))
        .route("/api/search", get(api_search))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "detective-web" }))
}

async fn api_datasets() -> Json<Vec<DatasetPayload>> {
    let payload = BundledData::datasets()
        .iter()
        .map(|dataset| DatasetPayload {
            name: dataset.name().to_string(),
            creatures: dataset.catalog().len(),
        })
        .collect();
    Json(payload)
}

async fn api_round(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<RoundParams>,
) -> Result<Response, ApiError> {
    let mode = match params.mode.as_deref() {
        Some(value) => value.parse::<GameMode>().map_err(ApiError::bad_request)?,
        None => GameMode::default(),
    };
    let level = params.difficulty.unwrap_or(0);
    let player = Player::resolve(&state.sessions, &headers);
    let payload = state.sessions.with_session(&player.id, |session| {
        next_round(&state, session, params.dataset.as_deref(), mode, level)
    })?;
    Ok(player.respond(Json(payload)))
}

async fn api_skip(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let player = Player::resolve(&state.sessions, &headers);
    let payload = state.sessions.with_session(&player.id, |session| {
        let Some(active) = session.round.take() else {
            return Err(ApiError::conflict("no round in progress"));
        };
        debug!(dataset = %active.dataset, level = active.round.level, "skipping round");
        next_round(
            &state,
            session,
            Some(&active.dataset),
            active.round.mode,
            active.round.level,
        )
    })?;
    Ok(player.respond(Json(payload)))
}

async fn api_answer(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<AnswerParams>,
) -> Result<Response, ApiError> {
    let choice = params
        .choice
        .ok_or_else(|| ApiError::bad_request("missing choice"))?;
    let player = Player::resolve(&state.sessions, &headers);
    let payload = state.sessions.with_session(&player.id, |session| {
        let Some(active) = session.round.as_ref() else {
            return Err(ApiError::conflict("no round in progress"));
        };
        let round = &active.round;
        if choice >= round.option_count() {
            return Err(ApiError::bad_request(format!(
                "choice {choice} is out of range (0..{})",
                round.option_count()
            )));
        }
        let payload = if round.is_correct(choice) {
            let level = round.level;
            let points = session.scoreboard.record_success(level);
            session.round = None;
            AnswerPayload {
                correct: true,
                points,
                score: ScorePayload::from(&session.scoreboard),
            }
        } else {
            session.scoreboard.record_failure();
            AnswerPayload {
                correct: false,
                points: 0,
                score: ScorePayload::from(&session.scoreboard),
            }
        };
        Ok(payload)
    })?;
    Ok(player.respond(Json(payload)))
}

async fn api_example(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<ExampleParams>,
) -> Result<Response, ApiError> {
    let player = Player::resolve(&state.sessions, &headers);
    let payload = state.sessions.with_session(&player.id, |session| {
        let Some(active) = session.round.as_ref() else {
            return Err(ApiError::conflict("no round in progress"));
        };
        if !active.round.mode.shows_pictures() {
            return Err(ApiError::bad_request("image rounds have no example picture"));
        }
        let dataset = BundledData::dataset(&active.dataset)?;
        let item = dataset
            .catalog()
            .get(active.round.target)
            .ok_or_else(|| ApiError::not_found("round target is gone"))?;
        let thumbnail = choose_thumbnail(&mut session.rng, item, params.previous.as_deref())
            .map(str::to_string);
        Ok(ExamplePayload { thumbnail })
    })?;
    Ok(player.respond(Json(payload)))
}

async fn api_search(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let requested = params
        .scope
        .as_deref()
        .map(str::parse::<PageScope>)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let player = Player::resolve(&state.sessions, &headers);
    let payload = state.sessions.with_session(&player.id, |session| {
        let search = &mut session.search;
        match params.page.unwrap_or_default() {
            PageParam::First => {
                let query = params
                    .q
                    .as_deref()
                    .ok_or_else(|| ApiError::bad_request("missing q"))?;
                search.submit(requested.unwrap_or_default(), query);
            }
            // A different scope on next/back restarts the query in that list.
            _ if requested.is_some_and(|scope| scope != search.scope()) => {
                let query = search.query().to_string();
                search.submit(requested.unwrap_or_default(), query);
            }
            PageParam::Next => {
                let current = search.page(BundledData::search_index(search.scope()), &state.search);
                if current.truncated {
                    search.forward(current.results.len());
                }
            }
            PageParam::Back => {
                search.back();
            }
        }
        let scope = search.scope();
        Ok::<_, ApiError>(SearchResponsePayload {
            query: search.query().to_string(),
            scope,
            can_go_back: search.can_go_back(),
            page: search.page(BundledData::search_index(scope), &state.search),
        })
    })?;
    Ok(player.respond(Json(payload)))
}

/// Builds a round and makes it the session's current one.
fn next_round(
    state: &AppState,
    session: &mut PlayerSession,
    dataset: Option<&str>,
    mode: GameMode,
    level: u8,
) -> Result<RoundPayload, ApiError> {
    let dataset = match (mode, dataset) {
        (GameMode::Reef, _) | (_, None) => BundledData::dataset_for(mode)?,
        (_, Some(name)) => BundledData::dataset(name)?,
    };
    let round = build_round(&mut session.rng, dataset, mode, level, &state.difficulty)?;
    session.scoreboard.start_round();
    let label = state
        .difficulty
        .level(round.level)
        .map(|settings| settings.label)
        .unwrap_or_default();
    let payload = RoundPayload::new(dataset, label, &round, &session.scoreboard);
    session.round = Some(ActiveRound {
        dataset: dataset.name().to_string(),
        round,
    });
    Ok(payload)
}

/// The caller's session id and whether it was just issued.
struct Player {
    id: String,
    fresh: bool,
}

impl Player {
    fn resolve(sessions: &SessionStore, headers: &HeaderMap) -> Self {
        let cookie = session_cookie(headers);
        let (id, fresh) = sessions.resolve(cookie.as_deref());
        if fresh {
            debug!(session = %id, "issuing session cookie");
        }
        Self { id, fresh }
    }

    fn respond(self, body: impl IntoResponse) -> Response {
        if !self.fresh {
            return body.into_response();
        }
        let cookie = Cookie::build((SESSION_COOKIE, self.id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        ([(header::SET_COOKIE, cookie.to_string())], body).into_response()
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[derive(Debug, Deserialize)]
struct RoundParams {
    dataset: Option<String>,
    mode: Option<String>,
    difficulty: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct AnswerParams {
    choice: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ExampleParams {
    previous: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    scope: Option<String>,
    page: Option<PageParam>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
enum PageParam {
    #[default]
    First,
    Next,
    Back,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetPayload {
    name: String,
    creatures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScorePayload {
    correct: u32,
    incorrect: u32,
    points: u64,
    percent: u32,
}

impl From<&Scoreboard> for ScorePayload {
    fn from(board: &Scoreboard) -> Self {
        Self {
            correct: board.correct,
            incorrect: board.incorrect,
            points: board.points,
            percent: board.percent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OptionPayload {
    position: usize,
    name: Option<String>,
    thumbnail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoundPayload {
    dataset: String,
    mode: GameMode,
    level: u8,
    label: String,
    /// Creature to find in image rounds.
    prompt: Option<String>,
    prompt_thumbnails: Vec<String>,
    options: Vec<OptionPayload>,
    complete: bool,
    score: ScorePayload,
}

impl RoundPayload {
    fn new(dataset: &Dataset, label: &str, round: &Round, board: &Scoreboard) -> Self {
        let catalog = dataset.catalog();
        let names_shown = round.mode.shows_pictures();
        let options = round
            .options()
            .into_iter()
            .enumerate()
            .map(|(position, index)| OptionPayload {
                position,
                name: names_shown.then(|| catalog.name(index).to_string()),
                thumbnail: round.option_thumbnails.get(position).cloned().flatten(),
            })
            .collect();
        Self {
            dataset: dataset.name().to_string(),
            mode: round.mode,
            level: round.level,
            label: label.to_string(),
            prompt: (!names_shown).then(|| catalog.name(round.target).to_string()),
            prompt_thumbnails: round.prompt_thumbnails.clone(),
            options,
            complete: round.complete,
            score: ScorePayload::from(board),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnswerPayload {
    correct: bool,
    points: u64,
    score: ScorePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExamplePayload {
    thumbnail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct SearchResponsePayload {
    query: String,
    scope: PageScope,
    can_go_back: bool,
    page: SearchPage,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let state = Arc::new(AppState {
            sessions: SessionStore::new(),
            difficulty: DifficultySettings::default(),
            search: SearchConfig::default(),
        });
        build_router(state)
    }

    async fn get_json(
        router: &Router,
        uri: &str,
        cookie: Option<&str>,
    ) -> (StatusCode, Option<String>, serde_json::Value) {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, format!("{SESSION_COOKIE}={cookie}"));
        }
        let response = router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let issued = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .and_then(|pair| pair.split_once('='))
            .map(|(_, id)| id.to_string());
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, issued, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = test_router();
        let (status, _, payload) = get_json(&router, "/healthz", None).await;
        assert!(status.is_success());
        assert_eq!(payload["status"], "ok");
    }

    #[tokio::test]
    async fn datasets_are_listed() {
        let router = test_router();
        let (status, _, payload) = get_json(&router, "/api/datasets", None).await;
        assert!(status.is_success());
        let datasets: Vec<DatasetPayload> = serde_json::from_value(payload).unwrap();
        assert!(datasets.iter().any(|d| d.name == "main" && d.creatures > 0));
        assert!(datasets.iter().any(|d| d.name == "reef"));
    }

    #[tokio::test]
    async fn round_issues_a_cookie_and_hides_names_in_image_mode() {
        let router = test_router();
        let (status, cookie, payload) =
            get_json(&router, "/api/round?mode=images&difficulty=2", None).await;
        assert!(status.is_success());
        assert!(cookie.is_some());
        let round: RoundPayload = serde_json::from_value(payload).unwrap();
        assert_eq!(round.options.len(), 4);
        assert!(round.prompt.is_some());
        assert!(round.options.iter().all(|option| option.name.is_none()));
        assert!(round.options.iter().all(|option| option.thumbnail.is_some()));
    }

    #[tokio::test]
    async fn answering_every_option_finds_the_target() {
        let router = test_router();
        let (_, cookie, payload) =
            get_json(&router, "/api/round?mode=names&difficulty=1", None).await;
        let cookie = cookie.expect("session cookie");
        let round: RoundPayload = serde_json::from_value(payload).unwrap();
        assert_eq!(round.prompt_thumbnails.len(), 2);

        let mut answer = None;
        for choice in 0..round.options.len() {
            let uri = format!("/api/answer?choice={choice}");
            let (status, reissued, payload) = get_json(&router, &uri, Some(&cookie)).await;
            assert!(status.is_success());
            assert!(reissued.is_none());
            let parsed: AnswerPayload = serde_json::from_value(payload).unwrap();
            if parsed.correct {
                answer = Some(parsed);
                break;
            }
        }
        let answer = answer.expect("one option is correct");
        assert_eq!(answer.score.correct, 1);
        assert!(answer.score.incorrect <= 1);
        if answer.score.incorrect == 0 {
            assert_eq!(answer.points, 100);
        }

        let (status, _, _) = get_json(&router, "/api/answer?choice=0", Some(&cookie)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn skip_keeps_the_round_settings() {
        let router = test_router();
        let (_, cookie, _) = get_json(&router, "/api/round?mode=reef", None).await;
        let cookie = cookie.expect("session cookie");
        let (status, _, payload) = get_json(&router, "/api/skip", Some(&cookie)).await;
        assert!(status.is_success());
        let round: RoundPayload = serde_json::from_value(payload).unwrap();
        assert_eq!(round.dataset, "reef");
        assert_eq!(round.level, 4);
        assert_eq!(round.mode, GameMode::Reef);

        let (status, _, payload) = get_json(&router, "/api/example", Some(&cookie)).await;
        assert!(status.is_success());
        let example: ExamplePayload = serde_json::from_value(payload).unwrap();
        assert!(example.thumbnail.is_some());
    }

    #[tokio::test]
    async fn bad_parameters_are_json_errors() {
        let router = test_router();
        let (status, _, payload) = get_json(&router, "/api/round?mode=snorkel", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"].as_str().unwrap().contains("snorkel"));

        let (status, _, _) = get_json(&router, "/api/round?difficulty=7", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get_json(&router, "/api/round?dataset=kelp", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = get_json(&router, "/api/skip", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, _) = get_json(&router, "/api/search?scope=blog&q=ray", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_pages_forward_and_back_per_session() {
        let router = test_router();
        let (status, cookie, first) = get_json(&router, "/api/search?q=fish", None).await;
        assert!(status.is_success());
        let cookie = cookie.expect("session cookie");
        assert_eq!(first["page"]["skip"], 0);
        assert_eq!(first["can_go_back"], false);
        assert_eq!(first["page"]["truncated"], true);
        let shown = first["page"]["results"].as_array().unwrap().len();
        assert!(shown > 0);

        let (_, _, next) = get_json(&router, "/api/search?page=next", Some(&cookie)).await;
        assert_eq!(next["page"]["skip"], shown);
        assert_eq!(next["can_go_back"], true);
        assert_eq!(next["query"], "fish");

        let (_, _, back) = get_json(&router, "/api/search?page=back", Some(&cookie)).await;
        assert_eq!(back["page"]["skip"], 0);
        assert_eq!(back["page"]["results"], first["page"]["results"]);
    }

    #[tokio::test]
    async fn search_paging_stays_in_the_submitted_scope() {
        let router = test_router();
        let (_, cookie, first) = get_json(&router, "/api/search?q=a&scope=sites", None).await;
        let cookie = cookie.expect("session cookie");
        assert_eq!(first["scope"], "sites");
        assert_eq!(first["page"]["truncated"], true);
        let shown = first["page"]["results"].as_array().unwrap().len();

        let (status, _, next) = get_json(&router, "/api/search?page=next", Some(&cookie)).await;
        assert!(status.is_success());
        assert_eq!(next["scope"], "sites");
        assert_eq!(next["query"], "a");
        assert_eq!(next["page"]["skip"], shown);
        let results = next["page"]["results"].as_array().unwrap();
        assert!(!results.is_empty());
        assert!(
            results
                .iter()
                .all(|result| result["url"].as_str().unwrap().starts_with("/sites/"))
        );

        let (_, _, back) = get_json(&router, "/api/search?page=back", Some(&cookie)).await;
        assert_eq!(back["scope"], "sites");
        assert_eq!(back["page"]["results"], first["page"]["results"]);

        let (_, _, switched) =
            get_json(&router, "/api/search?page=next&scope=gallery", Some(&cookie)).await;
        assert_eq!(switched["scope"], "gallery");
        assert_eq!(switched["query"], "a");
        assert_eq!(switched["page"]["skip"], 0);
        assert_eq!(switched["can_go_back"], false);
    }

    #[tokio::test]
    async fn search_other_scopes() {
        let router = test_router();
        let (status, _, payload) =
            get_json(&router, "/api/search?q=breakwater&scope=sites", None).await;
        assert!(status.is_success());
        let url = payload["page"]["results"][0]["url"].as_str().unwrap();
        assert!(url.starts_with("/sites/"));
    }
}
