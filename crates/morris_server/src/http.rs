//! HTTP adapter over the match registry.
//!
//! Handlers parse the request, hand the call to a blocking task (registry
//! commands may touch SQLite) and map errors to status codes. Event
//! subscriptions are served as server-sent events.

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::Stream;
use morris_rules::{MatchId, Position, Transition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{debug, error, info, instrument};

use crate::accounts::{AccountError, AccountService};
use crate::db::{Account, Ranking};
use crate::events::{MatchEvent, Subscription, Topic};
use crate::registry::{MatchRegistry, RegistryError};
use crate::snapshot::{MatchHandle, MatchSnapshot, MatchSummary};

/// Shared state behind every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    registry: Arc<MatchRegistry>,
    accounts: AccountService,
}

impl AppState {
    /// Bundles the registry and the account service.
    pub fn new(registry: Arc<MatchRegistry>, accounts: AccountService) -> Self {
        Self { registry, accounts }
    }
}

/// Error body returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub error: String,
}

/// An error with the status it maps to.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl ToString) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            debug!(status = %self.status, error = %self.message, "Request refused");
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match &err {
            RegistryError::MatchNotFound(_) | RegistryError::UnknownPosition(_) => {
                StatusCode::NOT_FOUND
            }
            RegistryError::Rejected(_) => StatusCode::CONFLICT,
            RegistryError::InvalidName => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err)
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        let status = match &err {
            AccountError::NameTaken(_) => StatusCode::CONFLICT,
            AccountError::UnknownPlayer(_) | AccountError::WrongPassword => {
                StatusCode::UNAUTHORIZED
            }
            AccountError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AccountError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

/// Runs `call` on the blocking pool.
async fn blocking<T, E, F>(call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(call).await?.map_err(Into::into)
}

fn position(code: &str) -> Result<Position, ApiError> {
    Position::parse(code).map_err(|e| RegistryError::from(e).into())
}

// ─────────────────────────────────────────────────────────────
//  Request and response bodies
// ─────────────────────────────────────────────────────────────

/// Body naming the acting player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRequest {
    /// Player name.
    pub player: String,
}

/// Body of a placement or capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRequest {
    /// Position code such as `"D5"`.
    pub position: String,
}

/// Body of a move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Origin code.
    pub from: String,
    /// Destination code.
    pub to: String,
}

/// Registration or login body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    /// Player name.
    pub name: String,
    /// Plain password.
    pub password: String,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    /// Account id.
    pub id: i32,
    /// Player name.
    pub name: String,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: *account.id(),
            name: account.name().clone(),
        }
    }
}

/// Query of `GET /matches/{id}/events`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    /// Return events with a greater sequence number.
    #[serde(default)]
    pub after: u64,
}

// ─────────────────────────────────────────────────────────────
//  Router
// ─────────────────────────────────────────────────────────────

/// Builds the application router.
#[instrument(skip(state))]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/matches", get(list_matches).post(create_match))
        .route("/matches/quick", post(quick_match))
        .route("/matches/{id}", get(match_state))
        .route("/matches/{id}/join", post(join_match))
        .route("/matches/{id}/place", post(place_piece))
        .route("/matches/{id}/move", post(move_piece))
        .route("/matches/{id}/capture", post(capture_piece))
        .route("/matches/{id}/disconnect", post(disconnect))
        .route("/matches/{id}/reconnect", post(reconnect))
        .route("/matches/{id}/events", get(events_since))
        .route("/matches/{id}/stream", get(match_stream))
        .route("/players/{name}/matches", get(saved_matches))
        .route("/events", get(global_stream))
        .route("/ranking", get(ranking))
        .route("/accounts", post(register))
        .route("/sessions", post(login))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(state)
}

async fn quick_match(
    State(state): State<AppState>,
    Json(body): Json<PlayerRequest>,
) -> Result<Json<MatchHandle>, ApiError> {
    let registry = state.registry;
    Ok(Json(blocking(move || registry.create_or_join(&body.player)).await?))
}

async fn create_match(
    State(state): State<AppState>,
    Json(body): Json<PlayerRequest>,
) -> Result<Json<MatchHandle>, ApiError> {
    let registry = state.registry;
    Ok(Json(blocking(move || registry.create_match(&body.player)).await?))
}

async fn list_matches(State(state): State<AppState>) -> Result<Json<Vec<MatchSummary>>, ApiError> {
    let registry = state.registry;
    let open = blocking(move || Ok::<_, RegistryError>(registry.list_open_matches())).await?;
    Ok(Json(open))
}

async fn join_match(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(body): Json<PlayerRequest>,
) -> Result<Json<MatchHandle>, ApiError> {
    let registry = state.registry;
    Ok(Json(blocking(move || registry.join_match(id, &body.player)).await?))
}

async fn match_state(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
) -> Result<Json<MatchSnapshot>, ApiError> {
    let registry = state.registry;
    Ok(Json(blocking(move || registry.match_state(id)).await?))
}

async fn place_piece(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(body): Json<PositionRequest>,
) -> Result<Json<Transition>, ApiError> {
    let at = position(&body.position)?;
    let registry = state.registry;
    Ok(Json(blocking(move || registry.place_piece(id, at)).await?))
}

async fn move_piece(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(body): Json<MoveRequest>,
) -> Result<Json<Transition>, ApiError> {
    let from = position(&body.from)?;
    let to = position(&body.to)?;
    let registry = state.registry;
    Ok(Json(blocking(move || registry.move_piece(id, from, to)).await?))
}

async fn capture_piece(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(body): Json<PositionRequest>,
) -> Result<Json<Transition>, ApiError> {
    let at = position(&body.position)?;
    let registry = state.registry;
    Ok(Json(
        blocking(move || registry.capture_opponent_piece(id, at)).await?,
    ))
}

async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(body): Json<PlayerRequest>,
) -> Result<StatusCode, ApiError> {
    let registry = state.registry;
    blocking(move || registry.disconnect(&body.player, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reconnect(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(body): Json<PlayerRequest>,
) -> Result<StatusCode, ApiError> {
    let registry = state.registry;
    blocking(move || registry.reconnect(&body.player, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn events_since(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<MatchEvent>>, ApiError> {
    Ok(Json(state.registry.events_since(id, query.after)?))
}

async fn saved_matches(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<MatchSummary>>, ApiError> {
    let registry = state.registry;
    let saved =
        blocking(move || Ok::<_, RegistryError>(registry.saved_matches_for(&name))).await?;
    Ok(Json(saved))
}

async fn ranking(State(state): State<AppState>) -> Json<Ranking> {
    Json(state.registry.ranking())
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let accounts = state.accounts;
    let account = blocking(move || accounts.register(&body.name, &body.password)).await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<AccountView>, ApiError> {
    let accounts = state.accounts;
    let account = blocking(move || accounts.login(&body.name, &body.password)).await?;
    Ok(Json(account.into()))
}

// ─────────────────────────────────────────────────────────────
//  Server-sent events
// ─────────────────────────────────────────────────────────────

fn sse_stream(subscription: Subscription) -> impl Stream<Item = Result<Event, axum::Error>> {
    futures::stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next().await?;
        let sse = Event::default()
            .event(event.kind.to_string())
            .id(event.sequence.to_string())
            .json_data(&event);
        Some((sse, subscription))
    })
}

async fn match_stream(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    // Subscribe first so nothing published after the check is missed
    let subscription = state.registry.subscribe(Topic::Match(id));
    if !state.registry.contains(id) {
        return Err(RegistryError::MatchNotFound(id).into());
    }
    info!(id, subscriber = subscription.id(), "Match stream opened");
    Ok(Sse::new(sse_stream(subscription)).keep_alive(KeepAlive::default()))
}

async fn global_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.registry.subscribe(Topic::Global);
    info!(subscriber = subscription.id(), "Global stream opened");
    Sse::new(sse_stream(subscription)).keep_alive(KeepAlive::default())
}
