//! `/api/assures`: insured persons and their referring doctor.

use super::{collect, parse_enum, parse_id, NameQuery};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::dto::{CountRes, ExistsRes, InsuredReq, InsuredRes, InsuredUpdateReq};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, patch};
use axum::Router;
use secu_core::models::PaymentMethod;
use serde::Deserialize;
use utoipa::IntoParams;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/assures", get(list).post(register))
        .route("/api/assures/:id", get(get_one).put(update).delete(delete))
        .route("/api/assures/:id/exists", get(exists))
        .route("/api/assures/:id/medecin-traitant", patch(set_referring_doctor))
        .route("/api/assures/numero/:numero", get(by_insurance_number))
        .route("/api/assures/search", get(search_by_name))
        .route("/api/assures/sans-medecin", get(without_referring_doctor))
        .route("/api/assures/methode-paiement/:methode", get(by_payment_method))
        .route("/api/assures/medecin-traitant/:medecinId", get(by_referring_doctor))
        .route("/api/assures/count", get(count))
        .route("/api/assures/count/avec-medecin", get(count_with_referring_doctor))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReferringDoctorQuery {
    /// Generalist to assign; absent clears the referring doctor.
    #[serde(rename = "medecinId")]
    pub medecin_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/assures",
    request_body = InsuredReq,
    responses(
        (status = 201, description = "Insured registered", body = InsuredRes),
        (status = 400, description = "Invalid field"),
        (status = 409, description = "Insurance number or email already registered")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<InsuredReq>,
) -> ApiResult<(StatusCode, Json<InsuredRes>)> {
    let profile = state.services.insured.register(req.into())?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

#[utoipa::path(
    get,
    path = "/api/assures",
    responses((status = 200, description = "All insured", body = [InsuredRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<InsuredRes>>> {
    Ok(Json(collect(state.services.insured.list()?)))
}

#[utoipa::path(
    get,
    path = "/api/assures/{id}",
    params(("id" = String, Path, description = "Insured id")),
    responses(
        (status = 200, description = "The insured", body = InsuredRes),
        (status = 404, description = "Unknown insured")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<InsuredRes>> {
    Ok(Json(state.services.insured.get(&parse_id(&id)?)?.into()))
}

#[utoipa::path(
    get,
    path = "/api/assures/numero/{numero}",
    params(("numero" = String, Path, description = "Insurance number")),
    responses(
        (status = 200, description = "The insured", body = InsuredRes),
        (status = 404, description = "No insured with this number")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_insurance_number(
    State(state): State<AppState>,
    Path(numero): Path<String>,
) -> ApiResult<Json<InsuredRes>> {
    let profile = state
        .services
        .insured
        .find_by_insurance_number(&numero)?
        .ok_or_else(|| ApiError::NotFound(format!("no insured with number '{numero}'")))?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    put,
    path = "/api/assures/{id}",
    params(("id" = String, Path, description = "Insured id")),
    request_body = InsuredUpdateReq,
    responses(
        (status = 200, description = "Insured updated", body = InsuredRes),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Unknown insured")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InsuredUpdateReq>,
) -> ApiResult<Json<InsuredRes>> {
    let profile =
        state
            .services
            .insured
            .update(&parse_id(&id)?, req.person.into(), req.payment_method)?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    delete,
    path = "/api/assures/{id}",
    params(("id" = String, Path, description = "Insured id")),
    responses(
        (status = 204, description = "Insured and identity deleted"),
        (status = 404, description = "Unknown insured"),
        (status = 409, description = "Insured has consultations")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.services.insured.delete(&parse_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/assures/search",
    params(NameQuery),
    responses((status = 200, description = "Matching insured", body = [InsuredRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn search_by_name(
    State(state): State<AppState>,
    Query(q): Query<NameQuery>,
) -> ApiResult<Json<Vec<InsuredRes>>> {
    Ok(Json(collect(state.services.insured.search_by_name(&q.nom)?)))
}

#[utoipa::path(
    get,
    path = "/api/assures/sans-medecin",
    responses((status = 200, description = "Insured without a referring doctor", body = [InsuredRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn without_referring_doctor(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<InsuredRes>>> {
    Ok(Json(collect(
        state.services.insured.without_referring_doctor()?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/assures/methode-paiement/{methode}",
    params(("methode" = String, Path, description = "BANK_TRANSFER or CASH")),
    responses(
        (status = 200, description = "Insured paid by this method", body = [InsuredRes]),
        (status = 400, description = "Unknown payment method")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_payment_method(
    State(state): State<AppState>,
    Path(methode): Path<String>,
) -> ApiResult<Json<Vec<InsuredRes>>> {
    let method: PaymentMethod = parse_enum(&methode)?;
    Ok(Json(collect(state.services.insured.by_payment_method(method)?)))
}

#[utoipa::path(
    patch,
    path = "/api/assures/{id}/medecin-traitant",
    params(("id" = String, Path, description = "Insured id"), ReferringDoctorQuery),
    responses(
        (status = 200, description = "Referring doctor set or cleared", body = InsuredRes),
        (status = 403, description = "Doctor is a specialist"),
        (status = 404, description = "Unknown insured or doctor")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn set_referring_doctor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ReferringDoctorQuery>,
) -> ApiResult<Json<InsuredRes>> {
    let doctor_id = q.medecin_id.as_deref().map(parse_id).transpose()?;
    let profile = state
        .services
        .insured
        .set_referring_doctor(&parse_id(&id)?, doctor_id.as_ref())?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    get,
    path = "/api/assures/medecin-traitant/{medecinId}",
    params(("medecinId" = String, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Patients of this referring doctor", body = [InsuredRes]),
        (status = 404, description = "Unknown doctor")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_referring_doctor(
    State(state): State<AppState>,
    Path(medecin_id): Path<String>,
) -> ApiResult<Json<Vec<InsuredRes>>> {
    Ok(Json(collect(
        state
            .services
            .insured
            .by_referring_doctor(&parse_id(&medecin_id)?)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/assures/count",
    responses((status = 200, description = "Number of insured", body = CountRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn count(State(state): State<AppState>) -> ApiResult<Json<CountRes>> {
    Ok(Json(CountRes {
        count: state.services.insured.count()?,
    }))
}

#[utoipa::path(
    get,
    path = "/api/assures/count/avec-medecin",
    responses((status = 200, description = "Number of insured with a referring doctor", body = CountRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn count_with_referring_doctor(
    State(state): State<AppState>,
) -> ApiResult<Json<CountRes>> {
    Ok(Json(CountRes {
        count: state.services.insured.count_with_referring_doctor()?,
    }))
}

#[utoipa::path(
    get,
    path = "/api/assures/{id}/exists",
    params(("id" = String, Path, description = "Insured id")),
    responses((status = 200, description = "Whether the insured exists", body = ExistsRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn exists(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExistsRes>> {
    let id = parse_id(&id)?;
    let exists = match state.services.insured.get(&id) {
        Ok(_) => true,
        Err(secu_core::CoreError::NotFound(_)) => false,
        Err(e) => return Err(e.into()),
    };
    Ok(Json(ExistsRes { exists }))
}
