use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::auth::issue_token;
use api_shared::dto::{LoginReq, RegisterReq, TokenRes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use secu_core::models::Role;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account created; token issued", body = TokenRes),
        (status = 400, description = "Invalid username, password or role"),
        (status = 403, description = "ADMIN cannot be self-assigned"),
        (status = 409, description = "Username taken")
    )
)]
/// Opens an account and logs it in.
///
/// Administrators are created by the bootstrap settings or the CLI, never through this endpoint.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> ApiResult<(StatusCode, Json<TokenRes>)> {
    let input = req.into_input()?;
    if input.roles.contains(&Role::Admin) {
        return Err(ApiError::AccessDenied(
            "the ADMIN role cannot be self-assigned".into(),
        ));
    }
    let account = state.services.accounts.register(input)?;
    let token = issue_token(&state.auth, &account)?;
    Ok((
        StatusCode::CREATED,
        Json(TokenRes::bearer(token, state.auth.expiration_secs(), &account)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Token issued", body = TokenRes),
        (status = 401, description = "Invalid username or password")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<TokenRes>> {
    let account = state
        .services
        .accounts
        .authenticate(&req.username, &req.password)?;
    let token = issue_token(&state.auth, &account)?;
    tracing::info!("'{}' logged in", account.username);
    Ok(Json(TokenRes::bearer(
        token,
        state.auth.expiration_secs(),
        &account,
    )))
}
