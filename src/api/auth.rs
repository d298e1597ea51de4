use crate::{
    api::{user_agent, viewer_id},
    config::AppConfig,
    database::MongoDB,
    models::{User, UserSummary},
    services::{
        auth_service::{self, LoginRequest, SignupRequest, ValidateSignupRequest},
        session_service, SessionClaims,
    },
    utils::{envelope, AppError},
};
use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    http::header::LOCATION,
    web, HttpRequest, HttpResponse, ResponseError,
};
use serde::Deserialize;
use serde_json::json;

const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Opens a session for `user` and answers with the cookie set.
async fn signed_in_response(
    db: &MongoDB,
    config: &AppConfig,
    req: &HttpRequest,
    user: &User,
) -> Result<HttpResponse, AppError> {
    let token = session_service::open_session(db, config, user, user_agent(req)).await?;
    Ok(HttpResponse::Ok()
        .cookie(session_service::session_cookie(config, token))
        .json(envelope::success(json!({ "user": UserSummary::from(user) }))))
}

#[utoipa::path(
    post,
    path = "/api/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created and session cookie set, or status 0 with the first validation problem")
    )
)]
pub async fn signup(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    req: HttpRequest,
    request: web::Json<SignupRequest>,
) -> HttpResponse {
    log::info!("📝 POST /api/signup - username: {}", request.username);

    let result = match auth_service::signup(&db, &request).await {
        Ok(user) => signed_in_response(&db, &config, &req, &user).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            log::warn!("❌ Signup failed: {} - {}", request.username, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session cookie set, or status 0 with \"Invalid credentials\"")
    )
)]
pub async fn login(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    req: HttpRequest,
    request: web::Json<LoginRequest>,
) -> HttpResponse {
    log::info!("🔐 POST /api/login - identifier: {}", request.identifier);

    let result = match auth_service::login(&db, &request).await {
        Ok(user) => signed_in_response(&db, &config, &req, &user).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.identifier);
            response
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.identifier, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session ended and cookie cleared; succeeds without a session too")
    )
)]
pub async fn logout(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    claims: Option<web::ReqData<SessionClaims>>,
) -> HttpResponse {
    log::info!("👋 POST /api/logout - user: {}", viewer_id(&claims).unwrap_or("anonymous"));

    if let Some(claims) = &claims {
        if let Err(e) = session_service::close_session(&db, &claims.sid).await {
            log::warn!("⚠️  Could not delete session {}: {}", claims.sid, e);
        }
    }

    HttpResponse::Ok()
        .cookie(session_service::removal_cookie(&config))
        .json(envelope::success(json!({})))
}

#[utoipa::path(
    post,
    path = "/api/validate/signup",
    tag = "Auth",
    request_body = ValidateSignupRequest,
    responses(
        (status = 200, description = "status 1 when every given field is acceptable, else status 0 with per-field errors")
    )
)]
pub async fn validate_signup(
    db: web::Data<MongoDB>,
    request: web::Json<ValidateSignupRequest>,
) -> HttpResponse {
    match auth_service::validate_signup(&db, &request).await {
        Ok(errors) if errors.is_empty() => envelope::ok_empty(),
        Ok(errors) => HttpResponse::Ok().json(json!({
            "status": 0,
            "error": "Some fields need attention",
            "errors": errors
        })),
        Err(e) => {
            log::warn!("❌ Signup validation failed: {}", e);
            e.error_response()
        }
    }
}

fn state_cookie(config: &AppConfig, state: String) -> Cookie<'static> {
    Cookie::build(OAUTH_STATE_COOKIE, state)
        .path("/api/auth")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::minutes(10))
        .finish()
}

#[utoipa::path(
    get,
    path = "/api/auth/google",
    tag = "Auth",
    responses(
        (status = 302, description = "Redirect to the Google consent screen"),
        (status = 200, description = "status 0 when Google login is not configured")
    )
)]
pub async fn google_login(config: web::Data<AppConfig>) -> HttpResponse {
    log::info!("🔐 GET /api/auth/google");

    let google = match auth_service::google_config(&config) {
        Ok(google) => google,
        Err(e) => return e.error_response(),
    };

    let state = uuid::Uuid::new_v4().simple().to_string();
    let url = auth_service::google_authorize_url(google, &state);

    HttpResponse::Found()
        .cookie(state_cookie(&config, state))
        .insert_header((LOCATION, url))
        .finish()
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

async fn complete_google_login(
    db: &MongoDB,
    config: &AppConfig,
    req: &HttpRequest,
    query: &GoogleCallbackQuery,
) -> Result<String, AppError> {
    if let Some(error) = &query.error {
        return Err(AppError::Unauthorized(format!("Google login was cancelled: {}", error)));
    }

    let expected = req.cookie(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    match (&query.state, expected) {
        (Some(state), Some(expected)) if !state.is_empty() && *state == expected => {}
        _ => return Err(AppError::Unauthorized("OAuth state mismatch".to_string())),
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("Missing authorization code".to_string()))?;

    let google = auth_service::google_config(config)?;
    let user = auth_service::handle_google_callback(db, google, code).await?;
    session_service::open_session(db, config, &user, user_agent(req)).await
}

#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    tag = "Auth",
    params(GoogleCallbackQuery),
    responses(
        (status = 302, description = "Redirect back to the frontend, with the session cookie on success")
    )
)]
pub async fn google_callback(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    req: HttpRequest,
    query: web::Query<GoogleCallbackQuery>,
) -> HttpResponse {
    log::info!("🔄 GET /api/auth/google/callback");

    let mut clear_state = state_cookie(&config, String::new());
    clear_state.make_removal();

    match complete_google_login(&db, &config, &req, &query).await {
        Ok(token) => {
            log::info!("✅ Google login completed");
            HttpResponse::Found()
                .cookie(session_service::session_cookie(&config, token))
                .cookie(clear_state)
                .insert_header((LOCATION, config.frontend_url.clone()))
                .finish()
        }
        Err(e) => {
            log::warn!("❌ Google login failed: {}", e);
            let target = format!("{}/login?error=oauth_failed", config.frontend_url.trim_end_matches('/'));
            HttpResponse::Found()
                .cookie(clear_state)
                .insert_header((LOCATION, target))
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_google_login_without_config_reports_error() {
        let config = web::Data::new(AppConfig::from_lookup(|_| None));
        let app = test::init_service(
            App::new().app_data(config).route("/api/auth/google", web::get().to(google_login)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/api/auth/google").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["status"], 0);
    }

    #[actix_web::test]
    async fn test_google_login_redirects_with_state_cookie() {
        let config = web::Data::new(AppConfig::from_lookup(|key| match key {
            "GOOGLE_CLIENT_ID" => Some("client-id".to_string()),
            "GOOGLE_CLIENT_SECRET" => Some("client-secret".to_string()),
            _ => None,
        }));
        let app = test::init_service(
            App::new().app_data(config).route("/api/auth/google", web::get().to(google_login)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/api/auth/google").to_request()).await;
        assert_eq!(res.status(), StatusCode::FOUND);

        let location = res.headers().get(LOCATION).unwrap().to_str().unwrap().to_string();
        let state = res
            .response()
            .cookies()
            .find(|c| c.name() == OAUTH_STATE_COOKIE)
            .map(|c| c.value().to_string())
            .unwrap();
        assert!(location.starts_with("https://accounts.google.com/"));
        assert!(location.contains(&format!("state={}", state)));
    }
}
