// crates/makerboard/src/api/mod.rs
use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::api::actor::Actor;
use crate::api::models::{
    ActionResponse, Catalog, CompleteRequest, ListJobsQuery, ListOffersQuery, Listing,
};
use crate::error::{ErrorKind, MarketError};
use crate::jobs::repo::MAX_LIST_LIMIT;
use crate::jobs::stats::{BoardStats, MemberStats, StatsSnapshot};
use crate::jobs::timeline::{build_timeline, JobTimeline};
use crate::jobs::{Job, JobsRepo, NewJob, StatsRepo};
use crate::offers::{Acceptance, CounterOffer, NewOffer, Offer, OfferFilter, OffersRepo};
use crate::sync::{FallbackSource, LiveMarket, Notice};

pub mod actor;
pub mod live;
pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub jobs: JobsRepo,
    pub offers: OffersRepo,
    pub stats: StatsRepo,
    pub source: FallbackSource,
    /// Absent when the server runs without the live view.
    pub live: Option<Arc<LiveMarket>>,
    pub list_limit: i64,
}

impl ApiState {
    fn limit(&self, requested: Option<i64>) -> i64 {
        requested.unwrap_or(self.list_limit).clamp(1, MAX_LIST_LIMIT)
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Catalog / board
        .route("/rates", get(get_rates))
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:id", get(get_job).delete(delete_job))
        .route("/jobs/:id/claim", post(claim_job))
        .route("/jobs/:id/complete", post(complete_job))
        .route("/jobs/:id/cancel", post(cancel_job))
        .route("/jobs/:id/release", post(release_job))
        .route("/jobs/:id/timeline", get(get_timeline))
        // Offers
        .route("/jobs/:id/offers", get(list_job_offers).post(submit_offer))
        .route("/offers", get(list_offers))
        .route("/offers/:id/accept", post(accept_offer))
        .route("/offers/:id/reject", post(reject_offer))
        .route("/offers/:id/withdraw", post(withdraw_offer))
        .route("/offers/:id/counter", post(counter_offer))
        // Dashboard
        .route("/stats", get(board_stats))
        .route("/members/:id/stats", get(member_stats))
        // Live view
        .route("/live/jobs", get(live::live_jobs))
        .route("/live/offers", get(live::live_offers))
        .route("/live/filter", post(live::set_live_filter))
        .route("/live/reload", post(live::reload_live))
        .route("/live/ws", get(live::handler_ws))
        // Health
        .route("/health", get(health))
        .layer(CatchPanicLayer::custom(recover_from_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ----------------------------
// Errors
// ----------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Market(MarketError),
    /// No member identity on a request that needs one.
    MissingIdentity,
    LiveDisabled,
    Internal(String),
}

impl From<MarketError> for ApiError {
    fn from(e: MarketError) -> Self {
        ApiError::Market(e)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Backend => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Market(e) => {
                let kind = e.kind();
                if kind == ErrorKind::Backend {
                    tracing::error!(error = %e, "request failed on the backend");
                }
                (
                    status_for(kind),
                    ErrorBody {
                        kind: kind.as_str(),
                        error: e.to_string(),
                        message: e.user_message(),
                    },
                )
            }
            ApiError::MissingIdentity => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    kind: ErrorKind::Unauthorized.as_str(),
                    error: format!("missing {} header", actor::MEMBER_ID_HEADER),
                    message: "Sign in to continue.".into(),
                },
            ),
            ApiError::LiveDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    kind: ErrorKind::Backend.as_str(),
                    error: "live view is not running".into(),
                    message: "Live updates are unavailable right now.".into(),
                },
            ),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        kind: ErrorKind::Backend.as_str(),
                        error: format!("internal error: {detail}"),
                        message: "Please try again later.".into(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn recover_from_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            kind: ErrorKind::Backend.as_str(),
            error: "handler panicked".into(),
            message: "Something went wrong. Reload and try again.".into(),
        }),
    )
        .into_response()
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn done<T>(data: T, notice: Notice) -> ApiResult<ActionResponse<T>> {
    Ok(Json(ActionResponse { data, notice }))
}

// ----------------------------
// Catalog / board
// ----------------------------

pub async fn get_rates() -> Json<Catalog> {
    Json(Catalog::current())
}

pub async fn list_jobs(
    State(state): State<ApiState>,
    Query(q): Query<ListJobsQuery>,
) -> ApiResult<Listing<Job>> {
    let fetched = state.source.jobs(&q.filter(), state.limit(q.limit)).await?;
    Ok(Json(fetched.into()))
}

pub async fn get_job(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult<Job> {
    Ok(Json(state.jobs.require_job(id).await?))
}

pub async fn create_job(
    State(state): State<ApiState>,
    actor: Actor,
    Json(mut body): Json<NewJob>,
) -> Result<(StatusCode, Json<ActionResponse<Job>>), ApiError> {
    body.posted_by_email = actor.contact(body.posted_by_email.take());
    let job = state.jobs.create(&actor.id, body).await?;
    let notice = Notice::success(
        "Job posted successfully!",
        format!("\"{}\" is now on the board.", job.title),
    );
    Ok((StatusCode::CREATED, Json(ActionResponse { data: job, notice })))
}

pub async fn delete_job(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ActionResponse<Job>> {
    let job = state.jobs.delete(id, &actor.id).await?;
    let notice = Notice::success("Job deleted", format!("\"{}\" was removed.", job.title));
    done(job, notice)
}

pub async fn claim_job(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ActionResponse<Job>> {
    let job = state.jobs.claim(id, &actor.id).await?;
    let notice = Notice::success(
        "Job claimed successfully!",
        format!("You're now working on \"{}\".", job.title),
    );
    done(job, notice)
}

pub async fn complete_job(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteRequest>>,
) -> ApiResult<ActionResponse<Job>> {
    let deliverable_url = body.and_then(|Json(b)| b.deliverable_url);
    let job = state.jobs.complete(id, &actor.id, deliverable_url).await?;
    let notice = Notice::success(
        "Job marked as complete!",
        format!("\"{}\" is done. The poster can review the result.", job.title),
    );
    done(job, notice)
}

pub async fn cancel_job(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ActionResponse<Job>> {
    let job = state.jobs.cancel(id, &actor.id).await?;
    let notice = Notice::success(
        "Bounty cancelled",
        format!("\"{}\" is no longer accepting claims.", job.title),
    );
    done(job, notice)
}

pub async fn release_job(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ActionResponse<Job>> {
    let job = state.jobs.release(id, &actor.id).await?;
    let notice = Notice::success(
        "Claim cancelled",
        format!("\"{}\" is open for other makers again.", job.title),
    );
    done(job, notice)
}

pub async fn get_timeline(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<JobTimeline> {
    match build_timeline(&state.jobs, &state.offers, id).await? {
        Some(tl) => Ok(Json(tl)),
        None => Err(MarketError::job_not_found(id).into()),
    }
}

// ----------------------------
// Offers
// ----------------------------

pub async fn list_job_offers(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Listing<Offer>> {
    let fetched = state
        .source
        .offers(&OfferFilter::for_job(id), MAX_LIST_LIMIT)
        .await?;
    Ok(Json(fetched.into()))
}

pub async fn list_offers(
    State(state): State<ApiState>,
    Query(q): Query<ListOffersQuery>,
) -> ApiResult<Listing<Offer>> {
    let fetched = state.source.offers(&q.filter(), state.limit(q.limit)).await?;
    Ok(Json(fetched.into()))
}

pub async fn submit_offer(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(mut body): Json<NewOffer>,
) -> Result<(StatusCode, Json<ActionResponse<Offer>>), ApiError> {
    body.offered_by_email = actor.contact(body.offered_by_email.take());
    let offer = state.offers.submit(id, &actor.id, body).await?;
    let notice = Notice::success(
        "Offer submitted!",
        format!("You offered {}. The poster will review it.", offer.terms().summary()),
    );
    Ok((StatusCode::CREATED, Json(ActionResponse { data: offer, notice })))
}

pub async fn accept_offer(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ActionResponse<Acceptance>> {
    let accepted = state.offers.accept(id, &actor.id).await?;
    let mut description = format!("\"{}\" is now in progress.", accepted.job.title);
    if !accepted.rejected_offer_ids.is_empty() {
        description.push_str(&format!(
            " {} other offer(s) were declined.",
            accepted.rejected_offer_ids.len()
        ));
    }
    done(accepted, Notice::success("Offer accepted!", description))
}

pub async fn reject_offer(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ActionResponse<Offer>> {
    let offer = state.offers.reject(id, &actor.id).await?;
    let notice = Notice::success("Offer rejected", "The offer has been declined.");
    done(offer, notice)
}

pub async fn withdraw_offer(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<ActionResponse<Offer>> {
    let offer = state.offers.withdraw(id, &actor.id).await?;
    let notice = Notice::success("Offer withdrawn", "Your offer has been withdrawn.");
    done(offer, notice)
}

pub async fn counter_offer(
    State(state): State<ApiState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(mut body): Json<NewOffer>,
) -> ApiResult<ActionResponse<CounterOffer>> {
    body.offered_by_email = actor.contact(body.offered_by_email.take());
    let countered = state.offers.counter(id, &actor.id, body).await?;
    let notice = Notice::success(
        "Counter-offer sent!",
        format!(
            "Your counter-offer was sent to {}.",
            countered.original.proposer_contact()
        ),
    );
    done(countered, notice)
}

// ----------------------------
// Dashboard
// ----------------------------

pub async fn board_stats(State(state): State<ApiState>) -> ApiResult<StatsSnapshot<BoardStats>> {
    Ok(Json(state.stats.board().await?))
}

pub async fn member_stats(
    State(state): State<ApiState>,
    Path(member_id): Path<String>,
) -> ApiResult<StatsSnapshot<MemberStats>> {
    Ok(Json(state.stats.member(&member_id).await?))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn market_errors_map_to_http_statuses() {
        let cases = [
            (MarketError::from(ValidationError::missing("title")), StatusCode::BAD_REQUEST),
            (MarketError::Unauthorized("not yours".into()), StatusCode::FORBIDDEN),
            (
                MarketError::InvalidState {
                    entity: "job",
                    id: Uuid::nil(),
                    status: "COMPLETED",
                    action: "claim",
                },
                StatusCode::CONFLICT,
            ),
            (MarketError::NotFound { entity: "job", id: Uuid::nil() }, StatusCode::NOT_FOUND),
            (MarketError::Backend(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn missing_identity_is_401() {
        assert_eq!(
            ApiError::MissingIdentity.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
