//! `/api/personnes`: bare identities and profile photos.
//!
//! Writes and the full listing need ADMIN; reads and searches need ADMIN or USER.

use super::{collect, parse_id, NameQuery};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::AppState;
use api_shared::dto::{ExistsRes, PersonReq, PersonRes, PhotoRes};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::{Extension, Router};
use secu_core::constants::MAX_PHOTO_BYTES;
use secu_core::models::Role;
use serde::Deserialize;
use utoipa::IntoParams;

const ADMIN: &[Role] = &[Role::Admin];
const READERS: &[Role] = &[Role::Admin, Role::User];

/// Multipart overhead allowed on top of the photo itself.
const MULTIPART_SLACK: usize = 64 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/personnes", get(list).post(create))
        .route("/api/personnes/:id", get(get_one).put(update).delete(delete))
        .route("/api/personnes/search/nom", get(search_by_name))
        .route("/api/personnes/search/email", get(search_by_email))
        .route("/api/personnes/search/telephone", get(search_by_phone))
        .route("/api/personnes/exists/:id", get(exists))
        .route(
            "/api/personnes/:id/photo",
            get(photo)
                .post(upload_photo)
                .delete(delete_photo)
                .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + MULTIPART_SLACK)),
        )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PhoneQuery {
    pub telephone: String,
}

#[utoipa::path(
    post,
    path = "/api/personnes",
    request_body = PersonReq,
    responses(
        (status = 201, description = "Person created", body = PersonRes),
        (status = 400, description = "Invalid field"),
        (status = 403, description = "Requires ADMIN"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PersonReq>,
) -> ApiResult<(StatusCode, Json<PersonRes>)> {
    user.require_any(ADMIN)?;
    let person = state.services.persons.create(req.into())?;
    Ok((StatusCode::CREATED, Json(person.into())))
}

#[utoipa::path(
    get,
    path = "/api/personnes",
    responses(
        (status = 200, description = "All persons", body = [PersonRes]),
        (status = 403, description = "Requires ADMIN")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<PersonRes>>> {
    user.require_any(ADMIN)?;
    Ok(Json(collect(state.services.persons.list()?)))
}

#[utoipa::path(
    get,
    path = "/api/personnes/{id}",
    params(("id" = String, Path, description = "Person id")),
    responses(
        (status = 200, description = "The person", body = PersonRes),
        (status = 404, description = "Unknown person")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<PersonRes>> {
    user.require_any(READERS)?;
    let person = state.services.persons.get(&parse_id(&id)?)?;
    Ok(Json(person.into()))
}

#[utoipa::path(
    get,
    path = "/api/personnes/search/nom",
    params(NameQuery),
    responses(
        (status = 200, description = "Matching persons", body = [PersonRes]),
        (status = 400, description = "Empty query")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn search_by_name(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<NameQuery>,
) -> ApiResult<Json<Vec<PersonRes>>> {
    user.require_any(READERS)?;
    Ok(Json(collect(state.services.persons.search_by_name(&q.nom)?)))
}

#[utoipa::path(
    get,
    path = "/api/personnes/search/email",
    params(EmailQuery),
    responses(
        (status = 200, description = "The person with this email", body = PersonRes),
        (status = 404, description = "No such email")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn search_by_email(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<EmailQuery>,
) -> ApiResult<Json<PersonRes>> {
    user.require_any(READERS)?;
    let person = state
        .services
        .persons
        .find_by_email(&q.email)?
        .ok_or_else(|| ApiError::NotFound(format!("no person with email '{}'", q.email)))?;
    Ok(Json(person.into()))
}

#[utoipa::path(
    get,
    path = "/api/personnes/search/telephone",
    params(PhoneQuery),
    responses(
        (status = 200, description = "The person with this phone number", body = PersonRes),
        (status = 404, description = "No such phone number")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn search_by_phone(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<PhoneQuery>,
) -> ApiResult<Json<PersonRes>> {
    user.require_any(READERS)?;
    let person = state
        .services
        .persons
        .find_by_phone(&q.telephone)?
        .ok_or_else(|| ApiError::NotFound(format!("no person with phone '{}'", q.telephone)))?;
    Ok(Json(person.into()))
}

#[utoipa::path(
    put,
    path = "/api/personnes/{id}",
    params(("id" = String, Path, description = "Person id")),
    request_body = PersonReq,
    responses(
        (status = 200, description = "Person updated", body = PersonRes),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Unknown person")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<PersonReq>,
) -> ApiResult<Json<PersonRes>> {
    user.require_any(ADMIN)?;
    let person = state.services.persons.update(&parse_id(&id)?, req.into())?;
    Ok(Json(person.into()))
}

#[utoipa::path(
    delete,
    path = "/api/personnes/{id}",
    params(("id" = String, Path, description = "Person id")),
    responses(
        (status = 204, description = "Person deleted"),
        (status = 404, description = "Unknown person"),
        (status = 409, description = "Person is an insured or a doctor")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    user.require_any(ADMIN)?;
    state.services.persons.delete(&parse_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/personnes/exists/{id}",
    params(("id" = String, Path, description = "Person id")),
    responses((status = 200, description = "Whether the person exists", body = ExistsRes)),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn exists(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExistsRes>> {
    user.require_any(READERS)?;
    let exists = state.services.persons.exists(&parse_id(&id)?)?;
    Ok(Json(ExistsRes { exists }))
}

#[utoipa::path(
    post,
    path = "/api/personnes/{id}/photo",
    params(("id" = String, Path, description = "Person id")),
    request_body(content = Vec<u8>, description = "Multipart form with a `file` field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Photo stored", body = PersonRes),
        (status = 400, description = "Missing, empty, oversized or non-image file"),
        (status = 404, description = "Unknown person")
    ),
    security(("bearer" = []))
)]
/// Replaces the person's profile photo with the multipart `file` field.
#[axum::debug_handler]
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<PersonRes>> {
    user.require_any(READERS)?;
    let id = parse_id(&id)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("photo").to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }
    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".into()))?;

    let person = state
        .services
        .persons
        .upload_photo(&id, &bytes, &filename)?;
    Ok(Json(person.into()))
}

#[utoipa::path(
    get,
    path = "/api/personnes/{id}/photo",
    params(("id" = String, Path, description = "Person id")),
    responses(
        (status = 200, description = "Photo bytes with their detected content type"),
        (status = 404, description = "Unknown person or no photo")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn photo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    user.require_any(READERS)?;
    let (media, bytes) = state.services.persons.photo(&parse_id(&id)?)?;
    let info = PhotoRes::from(media);
    let content_type = info
        .media_type
        .unwrap_or_else(|| "application/octet-stream".to_owned());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/personnes/{id}/photo",
    params(("id" = String, Path, description = "Person id")),
    responses(
        (status = 204, description = "Photo removed"),
        (status = 404, description = "Unknown person or no photo")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn delete_photo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    user.require_any(READERS)?;
    let id = parse_id(&id)?;
    if !state.services.persons.delete_photo(&id)? {
        return Err(ApiError::NotFound(format!("person {id} has no photo")));
    }
    Ok(StatusCode::NO_CONTENT)
}
