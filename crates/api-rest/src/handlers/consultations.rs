//! `/api/consultations`: visits, with their prescriptions and reimbursement.

use super::{collect, parse_id, PeriodQuery};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::dto::{
    ConsultationCreatedRes, ConsultationReq, ConsultationRes, ConsultationStatsRes,
    ConsultationUpdateReq, PrescriptionReq, PrescriptionRes, ReimbursementRes,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/consultations", get(list).post(create))
        .route("/api/consultations/:id", get(get_one).put(update).delete(delete))
        .route(
            "/api/consultations/:id/prescriptions",
            get(prescriptions).post(add_prescription),
        )
        .route("/api/consultations/:id/remboursement", get(reimbursement))
        .route("/api/consultations/assure/:assureId", get(by_insured))
        .route("/api/consultations/medecin/:medecinId", get(by_doctor))
        .route("/api/consultations/periode", get(by_period))
        .route("/api/consultations/generalistes", get(with_generalists))
        .route("/api/consultations/specialistes", get(with_specialists))
        .route("/api/consultations/stats", get(stats))
}

#[utoipa::path(
    post,
    path = "/api/consultations",
    request_body = ConsultationReq,
    responses(
        (status = 201, description = "Consultation recorded with its pending reimbursement", body = ConsultationCreatedRes),
        (status = 400, description = "Missing or non-positive cost, invalid prescription"),
        (status = 403, description = "A specialist cannot prescribe"),
        (status = 404, description = "Unknown insured or doctor")
    ),
    security(("bearer" = []))
)]
/// Records a consultation, its prescriptions and a PENDING reimbursement in one call.
#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<ConsultationReq>,
) -> ApiResult<(StatusCode, Json<ConsultationCreatedRes>)> {
    let (input, prescriptions) = req.into_parts();
    let (consultation, prescriptions) = state
        .services
        .consultations
        .create_with_prescriptions(input, prescriptions)?;
    let reimbursement = state
        .services
        .reimbursements
        .by_consultation(&consultation.id)?
        .map(ReimbursementRes::from);
    Ok((
        StatusCode::CREATED,
        Json(ConsultationCreatedRes {
            consultation: consultation.into(),
            prescriptions: collect(prescriptions),
            reimbursement,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/consultations",
    responses((status = 200, description = "All consultations", body = [ConsultationRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<ConsultationRes>>> {
    Ok(Json(collect(state.services.consultations.list()?)))
}

#[utoipa::path(
    get,
    path = "/api/consultations/{id}",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "The consultation", body = ConsultationRes),
        (status = 404, description = "Unknown consultation")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConsultationRes>> {
    Ok(Json(
        state.services.consultations.get(&parse_id(&id)?)?.into(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/consultations/assure/{assureId}",
    params(("assureId" = String, Path, description = "Insured id")),
    responses(
        (status = 200, description = "The insured's consultations", body = [ConsultationRes]),
        (status = 404, description = "Unknown insured")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_insured(
    State(state): State<AppState>,
    Path(assure_id): Path<String>,
) -> ApiResult<Json<Vec<ConsultationRes>>> {
    Ok(Json(collect(
        state
            .services
            .consultations
            .by_insured(&parse_id(&assure_id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/consultations/medecin/{medecinId}",
    params(("medecinId" = String, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "The doctor's consultations", body = [ConsultationRes]),
        (status = 404, description = "Unknown doctor")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_doctor(
    State(state): State<AppState>,
    Path(medecin_id): Path<String>,
) -> ApiResult<Json<Vec<ConsultationRes>>> {
    Ok(Json(collect(
        state
            .services
            .consultations
            .by_doctor(&parse_id(&medecin_id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/consultations/periode",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Consultations dated within the period", body = [ConsultationRes]),
        (status = 400, description = "Start after end")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_period(
    State(state): State<AppState>,
    Query(q): Query<PeriodQuery>,
) -> ApiResult<Json<Vec<ConsultationRes>>> {
    Ok(Json(collect(
        state
            .services
            .consultations
            .by_period(q.date_debut, q.date_fin)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/consultations/generalistes",
    responses((status = 200, description = "Consultations with generalists", body = [ConsultationRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn with_generalists(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ConsultationRes>>> {
    Ok(Json(collect(
        state.services.consultations.with_generalists()?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/consultations/specialistes",
    responses((status = 200, description = "Consultations with specialists", body = [ConsultationRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn with_specialists(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ConsultationRes>>> {
    Ok(Json(collect(
        state.services.consultations.with_specialists()?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/consultations/{id}",
    params(("id" = String, Path, description = "Consultation id")),
    request_body = ConsultationUpdateReq,
    responses(
        (status = 200, description = "Consultation updated; pending reimbursement recalculated", body = ConsultationRes),
        (status = 400, description = "Non-positive cost"),
        (status = 409, description = "Reimbursement already processed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ConsultationUpdateReq>,
) -> ApiResult<Json<ConsultationRes>> {
    let consultation = state
        .services
        .consultations
        .update(&parse_id(&id)?, req.into())?;
    Ok(Json(consultation.into()))
}

#[utoipa::path(
    delete,
    path = "/api/consultations/{id}",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 204, description = "Consultation, prescriptions and reimbursement deleted"),
        (status = 404, description = "Unknown consultation"),
        (status = 409, description = "Reimbursement already processed")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.services.consultations.delete(&parse_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/consultations/{id}/prescriptions",
    params(("id" = String, Path, description = "Consultation id")),
    request_body = PrescriptionReq,
    responses(
        (status = 201, description = "Prescription issued", body = PrescriptionRes),
        (status = 400, description = "Invalid prescription"),
        (status = 403, description = "A specialist cannot prescribe"),
        (status = 404, description = "Unknown consultation or referral target")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn add_prescription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PrescriptionReq>,
) -> ApiResult<(StatusCode, Json<PrescriptionRes>)> {
    let prescription = state
        .services
        .prescriptions
        .create(&parse_id(&id)?, req.into())?;
    Ok((StatusCode::CREATED, Json(prescription.into())))
}

#[utoipa::path(
    get,
    path = "/api/consultations/{id}/prescriptions",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Prescriptions issued in this consultation", body = [PrescriptionRes]),
        (status = 404, description = "Unknown consultation")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn prescriptions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    Ok(Json(collect(
        state.services.consultations.prescriptions(&parse_id(&id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/consultations/{id}/remboursement",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "The consultation's reimbursement", body = ReimbursementRes),
        (status = 404, description = "Unknown consultation or no reimbursement")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn reimbursement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReimbursementRes>> {
    let id = parse_id(&id)?;
    let reimbursement = state
        .services
        .consultations
        .reimbursement(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("consultation {id} has no reimbursement")))?;
    Ok(Json(reimbursement.into()))
}

#[utoipa::path(
    get,
    path = "/api/consultations/stats",
    responses((status = 200, description = "Consultation counts by doctor category", body = ConsultationStatsRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<ConsultationStatsRes>> {
    Ok(Json(state.services.consultations.stats()?.into()))
}
