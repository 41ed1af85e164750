//! # API REST
//!
//! HTTP surface of the social-security backend.
//!
//! Exposes an axum [`Router`] with:
//! - `/api/{personnes, assures, medecins, consultations, prescriptions, remboursements}`
//!   behind bearer-token authentication
//! - public `/api/auth/register`, `/api/auth/login` and `/health`
//! - Swagger UI at `/swagger-ui` and the OpenAPI document at `/api-docs/openapi.json`
//!
//! Handlers translate wire DTOs into core inputs, call the core services and map
//! [`secu_core::CoreError`] onto statuses through [`error::ApiError`]. The binary that serves
//! this router lives in the workspace root.

pub mod error;
pub mod handlers;
pub mod middleware;

use api_shared::dto;
use api_shared::{AuthConfig, HealthRes};
use axum::routing::get;
use axum::Router;
use handlers::{auth, consultations, doctors, health, insured, persons, prescriptions, reimbursements};
use secu_core::Services;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(services: Services, auth: AuthConfig) -> Self {
        Self {
            services,
            auth: Arc::new(auth),
        }
    }
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::register,
        auth::login,
        persons::create,
        persons::list,
        persons::get_one,
        persons::search_by_name,
        persons::search_by_email,
        persons::search_by_phone,
        persons::update,
        persons::delete,
        persons::exists,
        persons::upload_photo,
        persons::photo,
        persons::delete_photo,
        insured::register,
        insured::list,
        insured::get_one,
        insured::by_insurance_number,
        insured::update,
        insured::delete,
        insured::search_by_name,
        insured::without_referring_doctor,
        insured::by_payment_method,
        insured::set_referring_doctor,
        insured::by_referring_doctor,
        insured::count,
        insured::count_with_referring_doctor,
        insured::exists,
        doctors::register,
        doctors::register_existing_person,
        doctors::list,
        doctors::get_one,
        doctors::by_person,
        doctors::exists_for_person,
        doctors::generalists,
        doctors::specialists,
        doctors::by_specialization,
        doctors::search_by_name,
        doctors::update,
        doctors::update_specialization,
        doctors::delete,
        doctors::is_generalist,
        doctors::is_specialist,
        doctors::specializations,
        consultations::create,
        consultations::list,
        consultations::get_one,
        consultations::by_insured,
        consultations::by_doctor,
        consultations::by_period,
        consultations::with_generalists,
        consultations::with_specialists,
        consultations::update,
        consultations::delete,
        consultations::add_prescription,
        consultations::prescriptions,
        consultations::reimbursement,
        consultations::stats,
        prescriptions::create,
        prescriptions::list,
        prescriptions::get_one,
        prescriptions::by_consultation,
        prescriptions::by_kind,
        prescriptions::medications,
        prescriptions::by_insured,
        prescriptions::by_insured_and_kind,
        prescriptions::by_doctor,
        prescriptions::for_specialist,
        prescriptions::by_period,
        prescriptions::update,
        prescriptions::delete,
        prescriptions::count_medications,
        prescriptions::count_referrals,
        reimbursements::create,
        reimbursements::list,
        reimbursements::get_one,
        reimbursements::by_status,
        reimbursements::pending,
        reimbursements::processed,
        reimbursements::refused,
        reimbursements::by_insured,
        reimbursements::by_method,
        reimbursements::processed_between,
        reimbursements::by_consultation,
        reimbursements::process,
        reimbursements::refuse,
        reimbursements::revert_processing,
        reimbursements::change_method,
        reimbursements::recalculate,
        reimbursements::breakdown,
        reimbursements::delete,
        reimbursements::process_all_pending,
        reimbursements::stats,
    ),
    components(schemas(
        HealthRes,
        dto::PersonReq,
        dto::PersonRes,
        dto::PhotoRes,
        dto::InsuredReq,
        dto::InsuredUpdateReq,
        dto::InsuredRes,
        dto::DoctorReq,
        dto::SpecializationReq,
        dto::DoctorRes,
        dto::PrescriptionReq,
        dto::CreatePrescriptionReq,
        dto::PrescriptionRes,
        dto::ConsultationReq,
        dto::ConsultationUpdateReq,
        dto::ConsultationRes,
        dto::ConsultationCreatedRes,
        dto::ConsultationStatsRes,
        dto::ReimbursementReq,
        dto::ReimbursementRes,
        dto::ReimbursementStatsRes,
        dto::BreakdownRes,
        dto::RegisterReq,
        dto::LoginReq,
        dto::TokenRes,
        dto::CountRes,
        dto::ExistsRes,
        dto::FlagRes,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Builds the complete application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(persons::routes())
        .merge(insured::routes())
        .merge(doctors::routes())
        .merge(consultations::routes())
        .merge(prescriptions::routes())
        .merge(reimbursements::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let public = Router::new()
        .route("/health", get(health::health))
        .merge(auth::routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_shared::auth::issue_token;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use secu_core::models::Role;
    use secu_core::repositories::RegisterInput;
    use secu_core::{CoreConfig, StorageKind};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "router-test-secret-that-is-long-enough-for-hs256";

    struct TestApp {
        app: Router,
        state: AppState,
        _dir: TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let cfg = CoreConfig::new(dir.path().to_path_buf(), StorageKind::Memory, 1_000).unwrap();
            let services = Services::open(Arc::new(cfg)).unwrap();
            let state = AppState::new(services, AuthConfig::new(SECRET, 3_600).unwrap());
            Self {
                app: router(state.clone()),
                state,
                _dir: dir,
            }
        }

        fn token_for(&self, username: &str, roles: Vec<Role>) -> String {
            let account = self
                .state
                .services
                .accounts
                .register(RegisterInput {
                    username: username.into(),
                    password: "password123".into(),
                    roles,
                    person_id: None,
                })
                .unwrap();
            issue_token(&self.state.auth, &account).unwrap()
        }

        fn admin(&self) -> String {
            self.token_for("admin", vec![Role::Admin, Role::User])
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let req = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let response = self.app.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json)
        }
    }

    fn person(last_name: &str, n: u32) -> Value {
        json!({
            "last_name": last_name,
            "first_name": "Sam",
            "birth_date": "1980-06-15",
            "gender": "OTHER",
            "address": "12 rue Victor Hugo, Lille",
            "phone": format!("+3361234{n:04}"),
            "email": format!("{}.{n}@example.fr", last_name.to_lowercase()),
        })
    }

    fn with(mut base: Value, extra: Value) -> Value {
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        base
    }

    #[tokio::test]
    async fn health_is_public() {
        let t = TestApp::new();
        let (status, json) = t.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let t = TestApp::new();
        let (status, json) = t.send("GET", "/api/assures", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = t
            .send("GET", "/api/assures", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_then_login() {
        let t = TestApp::new();
        let creds = json!({"username": "camille", "password": "long-password", "roles": ["ROLE_USER"]});
        let (status, json) = t
            .send("POST", "/api/auth/register", None, Some(creds))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["token_type"], "Bearer");
        assert_eq!(json["roles"], json!(["USER"]));

        let (status, json) = t
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"username": "camille", "password": "long-password"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = json["token"].as_str().unwrap().to_owned();

        let (status, _) = t.send("GET", "/api/assures", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = t
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"username": "camille", "password": "wrong-password"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn admin_role_cannot_be_self_assigned() {
        let t = TestApp::new();
        let creds = json!({"username": "mallory", "password": "long-password", "roles": ["ADMIN"]});
        let (status, json) = t
            .send("POST", "/api/auth/register", None, Some(creds))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "ACCESS_DENIED");
    }

    #[tokio::test]
    async fn person_writes_need_admin() {
        let t = TestApp::new();
        let user = t.token_for("reader", vec![Role::User]);
        let admin = t.admin();

        let (status, json) = t
            .send("POST", "/api/personnes", Some(&user), Some(person("Petit", 1)))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "ACCESS_DENIED");

        let (status, created) = t
            .send("POST", "/api/personnes", Some(&admin), Some(person("Petit", 1)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap();

        let (status, json) = t
            .send("GET", &format!("/api/personnes/{id}"), Some(&user), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["last_name"], "Petit");

        let (status, _) = t.send("GET", "/api/personnes", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = t
            .send("GET", "/api/personnes/search/nom?nom=pet", Some(&user), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let t = TestApp::new();
        let admin = t.admin();
        let (status, json) = t
            .send("GET", "/api/assures/not-a-record-id", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn consultation_to_processed_reimbursement() {
        let t = TestApp::new();
        let token = t.admin();

        let (status, insured) = t
            .send(
                "POST",
                "/api/assures",
                Some(&token),
                Some(with(
                    person("Martin", 2),
                    json!({"insurance_number": "1850675123456", "payment_method": "BANK_TRANSFER"}),
                )),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, specialist) = t
            .send(
                "POST",
                "/api/medecins",
                Some(&token),
                Some(with(person("Dubois", 3), json!({"specialization": "Cardiology"}))),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(specialist["generalist"], false);

        let (status, created) = t
            .send(
                "POST",
                "/api/consultations",
                Some(&token),
                Some(json!({
                    "insured_id": insured["id"],
                    "doctor_id": specialist["id"],
                    "cost": "50.00",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let reimbursement = &created["reimbursement"];
        assert_eq!(reimbursement["amount"], "40.00");
        assert_eq!(reimbursement["status"], "PENDING");
        let id = reimbursement["id"].as_str().unwrap().to_owned();

        let (status, detail) = t
            .send("GET", &format!("/api/remboursements/{id}/detail"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["out_of_pocket"], "10.00");

        let (status, processed) = t
            .send("PUT", &format!("/api/remboursements/{id}/traiter"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(processed["status"], "PROCESSED");
        assert!(processed["processed_at"].is_string());

        let (status, json) = t
            .send("PUT", &format!("/api/remboursements/{id}/traiter"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "INVALID_STATE");

        let (status, _) = t
            .send(
                "PUT",
                &format!("/api/remboursements/{id}/methode?methode=CASH"),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, stats) = t
            .send("GET", "/api/remboursements/stats", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["processed"], 1);
        assert_eq!(stats["processed_amount"], "40.00");
    }

    #[tokio::test]
    async fn specialist_cannot_be_referring_doctor() {
        let t = TestApp::new();
        let token = t.admin();
        let (_, insured) = t
            .send(
                "POST",
                "/api/assures",
                Some(&token),
                Some(with(
                    person("Leroy", 4),
                    json!({"insurance_number": "2900112345678", "payment_method": "CASH"}),
                )),
            )
            .await;
        let (_, specialist) = t
            .send(
                "POST",
                "/api/medecins",
                Some(&token),
                Some(with(person("Moreau", 5), json!({"specialization": "Dermatology"}))),
            )
            .await;
        let (_, generalist) = t
            .send("POST", "/api/medecins", Some(&token), Some(person("Simon", 6)))
            .await;

        let insured_id = insured["id"].as_str().unwrap();
        let uri = |doctor: &Value| {
            format!(
                "/api/assures/{insured_id}/medecin-traitant?medecinId={}",
                doctor["id"].as_str().unwrap()
            )
        };

        let (status, json) = t.send("PATCH", &uri(&specialist), Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["code"], "BUSINESS_RULE");

        let (status, json) = t.send("PATCH", &uri(&generalist), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["referring_doctor_id"], generalist["id"]);

        let (status, json) = t.send("GET", "/api/assures/count/avec-medecin", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let t = TestApp::new();
        let (status, json) = t.send("GET", "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["paths"]["/api/remboursements/{id}/traiter"].is_object());
        assert!(json["components"]["securitySchemes"]["bearer"].is_object());
    }
}
