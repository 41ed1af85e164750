//! `/api/prescriptions`: medications and specialist referrals.

use super::{collect, parse_enum, parse_id, PeriodQuery};
use crate::error::ApiResult;
use crate::AppState;
use api_shared::dto::{CountRes, CreatePrescriptionReq, PrescriptionReq, PrescriptionRes};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use secu_core::models::PrescriptionKind;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/prescriptions", get(list).post(create))
        .route("/api/prescriptions/:id", get(get_one).put(update).delete(delete))
        .route(
            "/api/prescriptions/consultation/:consultationId",
            get(by_consultation),
        )
        .route("/api/prescriptions/type/:type", get(by_kind))
        .route("/api/prescriptions/medicaments", get(medications))
        .route("/api/prescriptions/assure/:assureId", get(by_insured))
        .route(
            "/api/prescriptions/assure/:assureId/type/:type",
            get(by_insured_and_kind),
        )
        .route(
            "/api/prescriptions/assure/:assureId/medicaments/count",
            get(count_medications),
        )
        .route(
            "/api/prescriptions/assure/:assureId/consultations/count",
            get(count_referrals),
        )
        .route("/api/prescriptions/medecin/:medecinId", get(by_doctor))
        .route(
            "/api/prescriptions/specialiste/:specialisteId",
            get(for_specialist),
        )
        .route("/api/prescriptions/periode", get(by_period))
}

#[utoipa::path(
    post,
    path = "/api/prescriptions",
    request_body = CreatePrescriptionReq,
    responses(
        (status = 201, description = "Prescription issued", body = PrescriptionRes),
        (status = 400, description = "Invalid prescription"),
        (status = 403, description = "A specialist cannot prescribe"),
        (status = 404, description = "Unknown consultation or referral target")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreatePrescriptionReq>,
) -> ApiResult<(StatusCode, Json<PrescriptionRes>)> {
    let prescription = state
        .services
        .prescriptions
        .create(&req.consultation_id, req.prescription.into())?;
    Ok((StatusCode::CREATED, Json(prescription.into())))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions",
    responses((status = 200, description = "All prescriptions", body = [PrescriptionRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    Ok(Json(collect(state.services.prescriptions.list()?)))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/{id}",
    params(("id" = String, Path, description = "Prescription id")),
    responses(
        (status = 200, description = "The prescription", body = PrescriptionRes),
        (status = 404, description = "Unknown prescription")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PrescriptionRes>> {
    Ok(Json(
        state.services.prescriptions.get(&parse_id(&id)?)?.into(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/consultation/{consultationId}",
    params(("consultationId" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Prescriptions of this consultation", body = [PrescriptionRes]),
        (status = 404, description = "Unknown consultation")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_consultation(
    State(state): State<AppState>,
    Path(consultation_id): Path<String>,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    Ok(Json(collect(
        state
            .services
            .prescriptions
            .by_consultation(&parse_id(&consultation_id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/type/{type}",
    params(("type" = String, Path, description = "MEDICATION or SPECIALIST_REFERRAL")),
    responses(
        (status = 200, description = "Prescriptions of this kind", body = [PrescriptionRes]),
        (status = 400, description = "Unknown kind")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    let kind: PrescriptionKind = parse_enum(&kind)?;
    Ok(Json(collect(state.services.prescriptions.by_kind(kind)?)))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/medicaments",
    responses((status = 200, description = "Medication prescriptions", body = [PrescriptionRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn medications(State(state): State<AppState>) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    Ok(Json(collect(state.services.prescriptions.medications()?)))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/assure/{assureId}",
    params(("assureId" = String, Path, description = "Insured id")),
    responses(
        (status = 200, description = "Prescriptions issued to the insured", body = [PrescriptionRes]),
        (status = 404, description = "Unknown insured")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_insured(
    State(state): State<AppState>,
    Path(assure_id): Path<String>,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    Ok(Json(collect(
        state
            .services
            .prescriptions
            .by_insured(&parse_id(&assure_id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/assure/{assureId}/type/{type}",
    params(
        ("assureId" = String, Path, description = "Insured id"),
        ("type" = String, Path, description = "MEDICATION or SPECIALIST_REFERRAL")
    ),
    responses(
        (status = 200, description = "The insured's prescriptions of this kind", body = [PrescriptionRes]),
        (status = 404, description = "Unknown insured")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_insured_and_kind(
    State(state): State<AppState>,
    Path((assure_id, kind)): Path<(String, String)>,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    let kind: PrescriptionKind = parse_enum(&kind)?;
    Ok(Json(collect(
        state
            .services
            .prescriptions
            .by_insured_and_kind(&parse_id(&assure_id)?, kind)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/medecin/{medecinId}",
    params(("medecinId" = String, Path, description = "Prescribing doctor id")),
    responses(
        (status = 200, description = "Prescriptions issued by this doctor", body = [PrescriptionRes]),
        (status = 404, description = "Unknown doctor")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_doctor(
    State(state): State<AppState>,
    Path(medecin_id): Path<String>,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    Ok(Json(collect(
        state
            .services
            .prescriptions
            .by_doctor(&parse_id(&medecin_id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/specialiste/{specialisteId}",
    params(("specialisteId" = String, Path, description = "Specialist id")),
    responses(
        (status = 200, description = "Referrals addressed to this specialist", body = [PrescriptionRes]),
        (status = 404, description = "Unknown doctor")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn for_specialist(
    State(state): State<AppState>,
    Path(specialiste_id): Path<String>,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    Ok(Json(collect(
        state
            .services
            .prescriptions
            .for_specialist(&parse_id(&specialiste_id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/periode",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Prescriptions from consultations in the period", body = [PrescriptionRes]),
        (status = 400, description = "Start after end")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_period(
    State(state): State<AppState>,
    Query(q): Query<PeriodQuery>,
) -> ApiResult<Json<Vec<PrescriptionRes>>> {
    Ok(Json(collect(
        state
            .services
            .prescriptions
            .by_period(q.date_debut, q.date_fin)?,
    )))
}

#[utoipa::path(
    put,
    path = "/api/prescriptions/{id}",
    params(("id" = String, Path, description = "Prescription id")),
    request_body = PrescriptionReq,
    responses(
        (status = 200, description = "Prescription updated", body = PrescriptionRes),
        (status = 400, description = "Invalid prescription"),
        (status = 404, description = "Unknown prescription or referral target")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PrescriptionReq>,
) -> ApiResult<Json<PrescriptionRes>> {
    let prescription = state
        .services
        .prescriptions
        .update(&parse_id(&id)?, req.into())?;
    Ok(Json(prescription.into()))
}

#[utoipa::path(
    delete,
    path = "/api/prescriptions/{id}",
    params(("id" = String, Path, description = "Prescription id")),
    responses(
        (status = 204, description = "Prescription deleted"),
        (status = 404, description = "Unknown prescription")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.services.prescriptions.delete(&parse_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/assure/{assureId}/medicaments/count",
    params(("assureId" = String, Path, description = "Insured id")),
    responses((status = 200, description = "Medications prescribed to the insured", body = CountRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn count_medications(
    State(state): State<AppState>,
    Path(assure_id): Path<String>,
) -> ApiResult<Json<CountRes>> {
    let count = state
        .services
        .prescriptions
        .count_medications_for_insured(&parse_id(&assure_id)?)?;
    Ok(Json(CountRes { count }))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/assure/{assureId}/consultations/count",
    params(("assureId" = String, Path, description = "Insured id")),
    responses((status = 200, description = "Specialist referrals issued to the insured", body = CountRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn count_referrals(
    State(state): State<AppState>,
    Path(assure_id): Path<String>,
) -> ApiResult<Json<CountRes>> {
    let count = state
        .services
        .prescriptions
        .count_referrals_for_insured(&parse_id(&assure_id)?)?;
    Ok(Json(CountRes { count }))
}
