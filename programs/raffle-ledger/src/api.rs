use std::sync::Arc;

use anchor_lang::error::Error;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::{classify, error_code, error_message, ErrorKind};
use crate::instructions::*;
use crate::state::*;
use crate::RaffleLedger;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<RaffleLedger>,
    admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(ledger: Arc<RaffleLedger>) -> Self {
        let admin_token = ledger.config().admin_token.as_deref().map(Arc::from);
        Self { ledger, admin_token }
    }
}

/// A ledger error on its way out as an HTTP response.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ProtocolViolation | ErrorKind::ConcurrencyConflict => StatusCode::CONFLICT,
        ErrorKind::IntegrityViolation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = classify(&self.0);
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, ?kind, "request rejected");
        }
        let body = json!({
            "error": error_message(&self.0),
            "code": error_code(&self.0),
            "kind": format!("{kind:?}"),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn tokens_match(expected: &[u8], presented: &[u8]) -> bool {
    expected.len() == presented.len()
        && expected
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Admin routes need `Authorization: Bearer <admin token>`. Without a
/// configured token they refuse everyone.
async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match (state.admin_token.as_deref(), presented) {
        (Some(expected), Some(token)) if tokens_match(expected.as_bytes(), token.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!(path = %request.uri().path(), "admin request refused");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Admin token required" })),
            )
                .into_response()
        }
    }
}

pub fn router(ledger: Arc<RaffleLedger>) -> Router {
    let state = AppState::new(ledger);

    let admin = Router::new()
        .route("/api/draws/commit-seed", post(commit_seed))
        .route("/api/draws/reveal-seed", post(reveal_seed))
        .route("/api/draws/execute", post(execute_draw))
        .route("/api/draws/validate/:competition_id", get(validate_draw))
        .route("/api/verify/report", get(report))
        .route("/api/verify/checkpoints/:checkpoint_id/publish", post(publish_checkpoint))
        .route("/api/competitions", post(upsert_competition))
        .route("/api/competitions/:competition_id/status", post(set_competition_status))
        .route("/api/competitions/:competition_id/instant-wins", post(generate_instant_wins))
        .route("/api/prizes", post(upsert_prize))
        .route("/api/tickets", post(record_ticket))
        .route("/api/instant-wins/check", get(check_instant_win))
        .route("/api/instant-wins/:instant_win_id/claim", post(claim_instant_win))
        .route("/api/winners/:winner_id/claim", post(claim_prize))
        .route("/api/winners/:winner_id/notify", post(mark_notified))
        .route("/api/winners/:winner_id/paid", post(mark_paid))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let public = Router::new()
        .route("/api/draws/status/:competition_id", get(draw_status))
        .route("/api/draws/upcoming", get(upcoming_draws))
        .route("/api/verify/ticket/:ticket_id", get(verify_ticket))
        .route("/api/verify/chain/integrity", get(verify_chain))
        .route("/api/verify/checkpoints/latest", get(latest_checkpoint))
        .route("/api/verify/checkpoints/:checkpoint_id", get(verify_checkpoint))
        .route(
            "/api/verify/competition/:competition_id/draw-results",
            get(draw_results),
        );

    public
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedBody {
    competition_id: CompetitionId,
    seed: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompetitionBody {
    competition_id: CompetitionId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: CompetitionStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstantWinBody {
    total_tickets: u64,
    /// Percent, e.g. `2.5`.
    win_percentage: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishBody {
    published_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimBody {
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstantWinClaimBody {
    ticket_id: TicketId,
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckQuery {
    competition_id: CompetitionId,
    ticket_number: String,
}

#[derive(Deserialize)]
struct RangeQuery {
    start: Option<u64>,
    end: Option<u64>,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn commit_seed(State(state): State<AppState>, Json(body): Json<SeedBody>) -> ApiResult<SeedCommitment> {
    let commitment = state.ledger.commit_seed(&body.competition_id, &body.seed)?;
    tracing::info!(competition_id = %body.competition_id, commit = %commitment.commit_hash, "seed committed");
    Ok(Json(commitment))
}

async fn reveal_seed(State(state): State<AppState>, Json(body): Json<SeedBody>) -> ApiResult<SeedRevelation> {
    let revelation = state.ledger.reveal_seed(&body.competition_id, &body.seed)?;
    tracing::info!(competition_id = %body.competition_id, "seed revealed");
    Ok(Json(revelation))
}

async fn execute_draw(
    State(state): State<AppState>,
    Json(body): Json<CompetitionBody>,
) -> ApiResult<DrawExecution> {
    let execution = state.ledger.execute_draw(&body.competition_id)?;
    tracing::info!(
        competition_id = %body.competition_id,
        winners = execution.winners_count,
        "draw executed"
    );
    Ok(Json(execution))
}

async fn validate_draw(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
) -> ApiResult<DrawValidation> {
    Ok(Json(state.ledger.validate_draw(&competition_id)?))
}

async fn report(State(state): State<AppState>) -> Json<AuditReport> {
    Json(state.ledger.report())
}

async fn publish_checkpoint(
    State(state): State<AppState>,
    Path(checkpoint_id): Path<u64>,
    Json(body): Json<PublishBody>,
) -> ApiResult<Checkpoint> {
    Ok(Json(
        state
            .ledger
            .publish_checkpoint(checkpoint_id, &body.published_hash)?,
    ))
}

async fn upsert_competition(
    State(state): State<AppState>,
    Json(competition): Json<Competition>,
) -> ApiResult<Competition> {
    Ok(Json(state.ledger.upsert_competition(competition)?))
}

async fn set_competition_status(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Competition> {
    Ok(Json(
        state
            .ledger
            .set_competition_status(&competition_id, body.status)?,
    ))
}

async fn generate_instant_wins(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
    Json(body): Json<InstantWinBody>,
) -> ApiResult<InstantWinGeneration> {
    let generation = state.ledger.generate_instant_wins(InstantWinRequest {
        competition_id,
        total_tickets: body.total_tickets,
        win_percentage_bp: percentage_to_basis_points(body.win_percentage)?,
    })?;
    tracing::info!(
        competition_id = %generation.competition_id,
        count = generation.count,
        "instant wins generated"
    );
    Ok(Json(generation))
}

async fn upsert_prize(State(state): State<AppState>, Json(prize): Json<Prize>) -> ApiResult<Prize> {
    Ok(Json(state.ledger.upsert_prize(prize)?))
}

async fn record_ticket(
    State(state): State<AppState>,
    Json(purchase): Json<TicketPurchase>,
) -> ApiResult<Ticket> {
    Ok(Json(state.ledger.record_ticket_purchase(purchase)?))
}

async fn check_instant_win(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
) -> ApiResult<InstantWinCheck> {
    Ok(Json(
        state
            .ledger
            .check_instant_win(&query.competition_id, &query.ticket_number)?,
    ))
}

async fn claim_instant_win(
    State(state): State<AppState>,
    Path(instant_win_id): Path<String>,
    Json(body): Json<InstantWinClaimBody>,
) -> ApiResult<InstantWinClaim> {
    Ok(Json(state.ledger.claim_instant_win(
        &instant_win_id,
        &body.ticket_id,
        &body.user_id,
    )?))
}

async fn claim_prize(
    State(state): State<AppState>,
    Path(winner_id): Path<String>,
    Json(body): Json<ClaimBody>,
) -> ApiResult<Winner> {
    Ok(Json(state.ledger.claim_prize(&winner_id, &body.user_id)?))
}

async fn mark_notified(State(state): State<AppState>, Path(winner_id): Path<String>) -> ApiResult<Winner> {
    Ok(Json(state.ledger.advance_winner(&winner_id, WinnerStatus::Notified)?))
}

async fn mark_paid(State(state): State<AppState>, Path(winner_id): Path<String>) -> ApiResult<Winner> {
    Ok(Json(state.ledger.advance_winner(&winner_id, WinnerStatus::Paid)?))
}

async fn draw_status(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
) -> ApiResult<DrawStatus> {
    Ok(Json(state.ledger.draw_status(&competition_id)?))
}

async fn upcoming_draws(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<UpcomingDraw>> {
    Json(state.ledger.upcoming_draws(query.limit))
}

async fn verify_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> ApiResult<TicketVerification> {
    Ok(Json(state.ledger.verify_ticket(&ticket_id)?))
}

async fn verify_chain(State(state): State<AppState>, Query(query): Query<RangeQuery>) -> Json<ChainIntegrity> {
    Json(state.ledger.verify_chain_integrity(query.start, query.end))
}

async fn latest_checkpoint(State(state): State<AppState>) -> ApiResult<LatestCheckpoint> {
    Ok(Json(state.ledger.verify_latest_checkpoint()?))
}

async fn verify_checkpoint(
    State(state): State<AppState>,
    Path(checkpoint_id): Path<u64>,
) -> ApiResult<CheckpointVerification> {
    Ok(Json(state.ledger.verify_checkpoint(checkpoint_id)?))
}

async fn draw_results(
    State(state): State<AppState>,
    Path(competition_id): Path<String>,
) -> ApiResult<DrawResults> {
    Ok(Json(state.ledger.draw_results(&competition_id)?))
}
