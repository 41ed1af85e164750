//! `/api/medecins`: generalists and specialists.

use super::{collect, parse_id, NameQuery};
use crate::error::ApiResult;
use crate::AppState;
use api_shared::dto::{DoctorReq, DoctorRes, ExistsRes, FlagRes, SpecializationReq};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/medecins", get(list).post(register))
        .route("/api/medecins/:id", get(get_one).put(update).delete(delete))
        .route("/api/medecins/:id/generaliste", get(is_generalist))
        .route("/api/medecins/:id/specialiste", get(is_specialist))
        .route("/api/medecins/:id/specialisation", put(update_specialization))
        .route(
            "/api/medecins/personne/:personneId",
            get(by_person).post(register_existing_person),
        )
        .route("/api/medecins/exists/personne/:personneId", get(exists_for_person))
        .route("/api/medecins/generalistes", get(generalists))
        .route("/api/medecins/specialistes", get(specialists))
        .route(
            "/api/medecins/specialistes/:specialisation",
            get(by_specialization),
        )
        .route("/api/medecins/search", get(search_by_name))
        .route("/api/medecins/specialisations", get(specializations))
}

#[utoipa::path(
    post,
    path = "/api/medecins",
    request_body = DoctorReq,
    responses(
        (status = 201, description = "Doctor registered", body = DoctorRes),
        (status = 400, description = "Invalid field"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<DoctorReq>,
) -> ApiResult<(StatusCode, Json<DoctorRes>)> {
    let profile = state.services.doctors.register(req.into())?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

#[utoipa::path(
    post,
    path = "/api/medecins/personne/{personneId}",
    params(("personneId" = String, Path, description = "Existing person id")),
    request_body = SpecializationReq,
    responses(
        (status = 201, description = "Person registered as a doctor", body = DoctorRes),
        (status = 404, description = "Unknown person"),
        (status = 409, description = "Person is already a doctor")
    ),
    security(("bearer" = []))
)]
/// Makes an existing person a doctor, keeping their identity.
#[axum::debug_handler]
pub async fn register_existing_person(
    State(state): State<AppState>,
    Path(personne_id): Path<String>,
    Json(req): Json<SpecializationReq>,
) -> ApiResult<(StatusCode, Json<DoctorRes>)> {
    let profile = state
        .services
        .doctors
        .register_existing_person(&parse_id(&personne_id)?, req.specialization.as_deref())?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

#[utoipa::path(
    get,
    path = "/api/medecins",
    responses((status = 200, description = "All doctors", body = [DoctorRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<DoctorRes>>> {
    Ok(Json(collect(state.services.doctors.list()?)))
}

#[utoipa::path(
    get,
    path = "/api/medecins/{id}",
    params(("id" = String, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "The doctor", body = DoctorRes),
        (status = 404, description = "Unknown doctor")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DoctorRes>> {
    Ok(Json(state.services.doctors.get(&parse_id(&id)?)?.into()))
}

#[utoipa::path(
    get,
    path = "/api/medecins/personne/{personneId}",
    params(("personneId" = String, Path, description = "Person id")),
    responses(
        (status = 200, description = "The doctor sharing this identity", body = DoctorRes),
        (status = 404, description = "Person is not a doctor")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_person(
    State(state): State<AppState>,
    Path(personne_id): Path<String>,
) -> ApiResult<Json<DoctorRes>> {
    Ok(Json(
        state.services.doctors.get(&parse_id(&personne_id)?)?.into(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/medecins/exists/personne/{personneId}",
    params(("personneId" = String, Path, description = "Person id")),
    responses((status = 200, description = "Whether the person is a doctor", body = ExistsRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn exists_for_person(
    State(state): State<AppState>,
    Path(personne_id): Path<String>,
) -> ApiResult<Json<ExistsRes>> {
    let exists = match state.services.doctors.get(&parse_id(&personne_id)?) {
        Ok(_) => true,
        Err(secu_core::CoreError::NotFound(_)) => false,
        Err(e) => return Err(e.into()),
    };
    Ok(Json(ExistsRes { exists }))
}

#[utoipa::path(
    get,
    path = "/api/medecins/generalistes",
    responses((status = 200, description = "Generalists", body = [DoctorRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn generalists(State(state): State<AppState>) -> ApiResult<Json<Vec<DoctorRes>>> {
    Ok(Json(collect(state.services.doctors.generalists()?)))
}

#[utoipa::path(
    get,
    path = "/api/medecins/specialistes",
    responses((status = 200, description = "Specialists", body = [DoctorRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn specialists(State(state): State<AppState>) -> ApiResult<Json<Vec<DoctorRes>>> {
    Ok(Json(collect(state.services.doctors.specialists()?)))
}

#[utoipa::path(
    get,
    path = "/api/medecins/specialistes/{specialisation}",
    params(("specialisation" = String, Path, description = "Specialization, case-insensitive")),
    responses((status = 200, description = "Specialists in this field", body = [DoctorRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn by_specialization(
    State(state): State<AppState>,
    Path(specialisation): Path<String>,
) -> ApiResult<Json<Vec<DoctorRes>>> {
    Ok(Json(collect(
        state.services.doctors.by_specialization(&specialisation)?,
    )))
}

#[utoipa::path(
    get,
    path = "/api/medecins/search",
    params(NameQuery),
    responses((status = 200, description = "Matching doctors", body = [DoctorRes])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn search_by_name(
    State(state): State<AppState>,
    Query(q): Query<NameQuery>,
) -> ApiResult<Json<Vec<DoctorRes>>> {
    Ok(Json(collect(state.services.doctors.search_by_name(&q.nom)?)))
}

#[utoipa::path(
    put,
    path = "/api/medecins/{id}",
    params(("id" = String, Path, description = "Doctor id")),
    request_body = DoctorReq,
    responses(
        (status = 200, description = "Doctor updated", body = DoctorRes),
        (status = 404, description = "Unknown doctor"),
        (status = 409, description = "Generalist with patients cannot become a specialist")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DoctorReq>,
) -> ApiResult<Json<DoctorRes>> {
    let profile = state.services.doctors.update(
        &parse_id(&id)?,
        req.person.into(),
        req.specialization.as_deref(),
    )?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    put,
    path = "/api/medecins/{id}/specialisation",
    params(("id" = String, Path, description = "Doctor id")),
    request_body = SpecializationReq,
    responses(
        (status = 200, description = "Specialization changed", body = DoctorRes),
        (status = 409, description = "Generalist with patients cannot become a specialist")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_specialization(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SpecializationReq>,
) -> ApiResult<Json<DoctorRes>> {
    let profile = state
        .services
        .doctors
        .update_specialization(&parse_id(&id)?, req.specialization.as_deref())?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    delete,
    path = "/api/medecins/{id}",
    params(("id" = String, Path, description = "Doctor id")),
    responses(
        (status = 204, description = "Doctor and identity deleted"),
        (status = 404, description = "Unknown doctor"),
        (status = 409, description = "Doctor has consultations, patients or referrals")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.services.doctors.delete(&parse_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/medecins/{id}/generaliste",
    params(("id" = String, Path, description = "Doctor id")),
    responses((status = 200, description = "Whether the doctor is a generalist", body = FlagRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn is_generalist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FlagRes>> {
    let value = state.services.doctors.is_generalist(&parse_id(&id)?)?;
    Ok(Json(FlagRes { value }))
}

#[utoipa::path(
    get,
    path = "/api/medecins/{id}/specialiste",
    params(("id" = String, Path, description = "Doctor id")),
    responses((status = 200, description = "Whether the doctor is a specialist", body = FlagRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn is_specialist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FlagRes>> {
    let value = !state.services.doctors.is_generalist(&parse_id(&id)?)?;
    Ok(Json(FlagRes { value }))
}

#[utoipa::path(
    get,
    path = "/api/medecins/specialisations",
    responses((status = 200, description = "Distinct specializations, sorted", body = [String])),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn specializations(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.services.doctors.specializations()?))
}
