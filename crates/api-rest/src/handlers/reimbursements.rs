//! `/api/remboursements`: reimbursement lifecycle and reporting.
//!
//! State changes are PUTs on the reimbursement (`traiter`, `refuser`, `annuler`, `methode`,
//! `recalculer`); an illegal transition answers 409 `INVALID_STATE`.

use super::{collect, parse_enum, parse_id, PeriodQuery};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::dto::{BreakdownRes, ReimbursementReq, ReimbursementRes, ReimbursementStatsRes};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use secu_core::models::PaymentMethod;
use secu_core::ReimbursementStatus;
use serde::Deserialize;
use utoipa::IntoParams;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/remboursements", get(list).post(create))
        .route("/api/remboursements/:id", get(get_one).delete(delete))
        .route("/api/remboursements/:id/traiter", put(process))
        .route("/api/remboursements/:id/refuser", put(refuse))
        .route("/api/remboursements/:id/annuler", put(revert_processing))
        .route("/api/remboursements/:id/methode", put(change_method))
        .route("/api/remboursements/:id/recalculer", put(recalculate))
        .route("/api/remboursements/:id/detail", get(breakdown))
        .route("/api/remboursements/statut/:statut", get(by_status))
        .route("/api/remboursements/en-attente", get(pending))
        .route("/api/remboursements/traites", get(processed))
        .route("/api/remboursements/refuses", get(refused))
        .route("/api/remboursements/assure/:assureId", get(by_insured))
        .route("/api/remboursements/methode/:methode", get(by_method))
        .route("/api/remboursements/periode", get(processed_between))
        .route(
            "/api/remboursements/consultation/:consultationId",
            get(by_consultation),
        )
        .route("/api/remboursements/traiter-tous", put(process_all_pending))
        .route("/api/remboursements/stats", get(stats))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReasonQuery {
    /// Recorded on the refused reimbursement.
    pub motif: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MethodQuery {
    /// BANK_TRANSFER or CASH.
    pub methode: String,
}

#[utoipa::path(
    post,
    path = "/api/remboursements",
    request_body = ReimbursementReq,
    responses(
        (status = 201, description = "Pending reimbursement created", body = ReimbursementRes),
        (status = 404, description = "Unknown consultation"),
        (status = 409, description = "Consultation already has a reimbursement")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<ReimbursementReq>,
) -> ApiResult<(StatusCode, Json<ReimbursementRes>)> {
    let reimbursement = state
        .services
        .reimbursements
        .create(&req.consultation_id, req.payment_method)?;
    Ok((StatusCode::CREATED, Json(reimbursement.into())))
}

#[utoipa::path(
    get,
    path = "/api/remboursements",
    responses((status = 200, description = "All reimbursements", body = [ReimbursementRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    Ok(Json(collect(state.services.reimbursements.list()?)))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/{id}",
    params(("id" = String, Path, description = "Reimbursement id")),
    responses(
        (status = 200, description = "The reimbursement", body = ReimbursementRes),
        (status = 404, description = "Unknown reimbursement")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReimbursementRes>> {
    Ok(Json(
        state.services.reimbursements.get(&parse_id(&id)?)?.into(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/statut/{statut}",
    params(("statut" = String, Path, description = "PENDING, PROCESSED or REFUSED")),
    responses(
        (status = 200, description = "Reimbursements in this state", body = [ReimbursementRes]),
        (status = 400, description = "Unknown status")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_status(
    State(state): State<AppState>,
    Path(statut): Path<String>,
) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    let status: ReimbursementStatus = parse_enum(&statut)?;
    Ok(Json(collect(state.services.reimbursements.by_status(status)?)))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/en-attente",
    responses((status = 200, description = "Pending reimbursements", body = [ReimbursementRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn pending(State(state): State<AppState>) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    Ok(Json(collect(state.services.reimbursements.pending()?)))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/traites",
    responses((status = 200, description = "Processed reimbursements", body = [ReimbursementRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn processed(State(state): State<AppState>) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    Ok(Json(collect(state.services.reimbursements.processed()?)))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/refuses",
    responses((status = 200, description = "Refused reimbursements", body = [ReimbursementRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn refused(State(state): State<AppState>) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    Ok(Json(collect(state.services.reimbursements.refused()?)))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/assure/{assureId}",
    params(("assureId" = String, Path, description = "Insured id")),
    responses(
        (status = 200, description = "The insured's reimbursements", body = [ReimbursementRes]),
        (status = 404, description = "Unknown insured")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_insured(
    State(state): State<AppState>,
    Path(assure_id): Path<String>,
) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    Ok(Json(collect(
        state
            .services
            .reimbursements
            .by_insured(&parse_id(&assure_id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/methode/{methode}",
    params(("methode" = String, Path, description = "BANK_TRANSFER or CASH")),
    responses(
        (status = 200, description = "Reimbursements paid by this method", body = [ReimbursementRes]),
        (status = 400, description = "Unknown payment method")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_method(
    State(state): State<AppState>,
    Path(methode): Path<String>,
) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    let method: PaymentMethod = parse_enum(&methode)?;
    Ok(Json(collect(state.services.reimbursements.by_method(method)?)))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/periode",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Reimbursements processed within the period", body = [ReimbursementRes]),
        (status = 400, description = "Start after end")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn processed_between(
    State(state): State<AppState>,
    Query(q): Query<PeriodQuery>,
) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    Ok(Json(collect(
        state
            .services
            .reimbursements
            .processed_between(q.date_debut, q.date_fin)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/consultation/{consultationId}",
    params(("consultationId" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "The consultation's reimbursement", body = ReimbursementRes),
        (status = 404, description = "Unknown consultation or no reimbursement")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_consultation(
    State(state): State<AppState>,
    Path(consultation_id): Path<String>,
) -> ApiResult<Json<ReimbursementRes>> {
    let consultation_id = parse_id(&consultation_id)?;
    let reimbursement = state
        .services
        .reimbursements
        .for_consultation(&consultation_id)?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "consultation {consultation_id} has no reimbursement"
            ))
        })?;
    Ok(Json(reimbursement.into()))
}

#[utoipa::path(
    put,
    path = "/api/remboursements/{id}/traiter",
    params(("id" = String, Path, description = "Reimbursement id")),
    responses(
        (status = 200, description = "Reimbursement processed", body = ReimbursementRes),
        (status = 404, description = "Unknown reimbursement"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn process(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReimbursementRes>> {
    Ok(Json(
        state.services.reimbursements.process(&parse_id(&id)?)?.into(),
    ))
}

#[utoipa::path(
    put,
    path = "/api/remboursements/{id}/refuser",
    params(("id" = String, Path, description = "Reimbursement id"), ReasonQuery),
    responses(
        (status = 200, description = "Reimbursement refused", body = ReimbursementRes),
        (status = 404, description = "Unknown reimbursement"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn refuse(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ReasonQuery>,
) -> ApiResult<Json<ReimbursementRes>> {
    let reimbursement = state
        .services
        .reimbursements
        .refuse(&parse_id(&id)?, q.motif.as_deref())?;
    Ok(Json(reimbursement.into()))
}

#[utoipa::path(
    put,
    path = "/api/remboursements/{id}/annuler",
    params(("id" = String, Path, description = "Reimbursement id")),
    responses(
        (status = 200, description = "Processing reverted; back to pending", body = ReimbursementRes),
        (status = 409, description = "Not processed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn revert_processing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReimbursementRes>> {
    Ok(Json(
        state
            .services
            .reimbursements
            .revert_processing(&parse_id(&id)?)?
            .into(),
    ))
}

#[utoipa::path(
    put,
    path = "/api/remboursements/{id}/methode",
    params(("id" = String, Path, description = "Reimbursement id"), MethodQuery),
    responses(
        (status = 200, description = "Payment method changed", body = ReimbursementRes),
        (status = 400, description = "Unknown payment method"),
        (status = 409, description = "Already processed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn change_method(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<MethodQuery>,
) -> ApiResult<Json<ReimbursementRes>> {
    let method: PaymentMethod = parse_enum(&q.methode)?;
    let reimbursement = state
        .services
        .reimbursements
        .change_method(&parse_id(&id)?, method)?;
    Ok(Json(reimbursement.into()))
}

#[utoipa::path(
    put,
    path = "/api/remboursements/{id}/recalculer",
    params(("id" = String, Path, description = "Reimbursement id")),
    responses(
        (status = 200, description = "Amount recomputed from the consultation", body = ReimbursementRes),
        (status = 409, description = "Already processed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn recalculate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReimbursementRes>> {
    Ok(Json(
        state
            .services
            .reimbursements
            .recalculate(&parse_id(&id)?)?
            .into(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/{id}/detail",
    params(("id" = String, Path, description = "Reimbursement id")),
    responses(
        (status = 200, description = "Cost, rate, amount and out-of-pocket share", body = BreakdownRes),
        (status = 404, description = "Unknown reimbursement")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn breakdown(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BreakdownRes>> {
    Ok(Json(
        state
            .services
            .reimbursements
            .breakdown(&parse_id(&id)?)?
            .into(),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/remboursements/{id}",
    params(("id" = String, Path, description = "Reimbursement id")),
    responses(
        (status = 204, description = "Reimbursement deleted"),
        (status = 404, description = "Unknown reimbursement"),
        (status = 409, description = "Only pending reimbursements can be deleted")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.services.reimbursements.delete(&parse_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/remboursements/traiter-tous",
    responses((status = 200, description = "Reimbursements processed by this batch", body = [ReimbursementRes])),
    security(("bearer" = []))
)]
/// Processes every pending reimbursement; ones that fail are skipped and logged.
#[axum::debug_handler]
pub async fn process_all_pending(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ReimbursementRes>>> {
    Ok(Json(collect(
        state.services.reimbursements.process_all_pending()?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/remboursements/stats",
    responses((status = 200, description = "Counts per state and amounts", body = ReimbursementStatsRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<ReimbursementStatsRes>> {
    Ok(Json(state.services.reimbursements.stats()?.into()))
}
