use crate::{
    config::AppConfig,
    database::MongoDB,
    models::{UpdateSettingsRequest, UpdateStudySetRequest},
    services::{
        account_service::{self, AccountSearchQuery},
        session_service, SessionClaims,
    },
    utils::{envelope, AppError},
};
use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

fn failed(route: &str, user_id: &str, e: AppError) -> HttpResponse {
    log::warn!("❌ {} failed for {}: {}", route, user_id, e);
    e.error_response()
}

#[utoipa::path(
    get,
    path = "/api/account/{user_id}",
    tag = "Account",
    params(("user_id" = String, Path, description = "Must be the signed-in user")),
    responses(
        (status = 200, description = "Owned study sets, visible favorites and counts"),
        (status = 401, description = "No session")
    )
)]
pub async fn get_account(
    db: web::Data<MongoDB>,
    claims: web::ReqData<SessionClaims>,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("👤 GET /api/account/{}", user_id);

    let result = match account_service::authorize(&claims.sub, &user_id) {
        Ok(()) => account_service::get_account(&db, &user_id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(overview) => envelope::ok(json!(overview)),
        Err(e) => failed("GET /api/account", &user_id, e),
    }
}

#[utoipa::path(
    post,
    path = "/api/account/{user_id}/favorite/{study_set_id}",
    tag = "Account",
    params(
        ("user_id" = String, Path, description = "Must be the signed-in user"),
        ("study_set_id" = String, Path, description = "Study set to favorite or unfavorite")
    ),
    responses(
        (status = 200, description = "New favorite state and count")
    )
)]
pub async fn toggle_favorite(
    db: web::Data<MongoDB>,
    claims: web::ReqData<SessionClaims>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (user_id, study_set_id) = path.into_inner();
    log::info!("⭐ POST /api/account/{}/favorite/{}", user_id, study_set_id);

    let result = match account_service::authorize(&claims.sub, &user_id) {
        Ok(()) => account_service::toggle_favorite(&db, &user_id, &study_set_id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => envelope::ok(json!(outcome)),
        Err(e) => failed("POST /api/account/favorite", &user_id, e),
    }
}

#[utoipa::path(
    put,
    path = "/api/account/{user_id}/edit/{study_set_id}",
    tag = "Account",
    params(
        ("user_id" = String, Path, description = "Must be the signed-in user"),
        ("study_set_id" = String, Path, description = "Owned study set")
    ),
    request_body = UpdateStudySetRequest,
    responses(
        (status = 200, description = "Updated study set summary")
    )
)]
pub async fn edit_study_set(
    db: web::Data<MongoDB>,
    claims: web::ReqData<SessionClaims>,
    path: web::Path<(String, String)>,
    request: web::Json<UpdateStudySetRequest>,
) -> HttpResponse {
    let (user_id, study_set_id) = path.into_inner();
    log::info!("✏️  PUT /api/account/{}/edit/{}", user_id, study_set_id);

    let result = match account_service::authorize(&claims.sub, &user_id) {
        Ok(()) => account_service::edit_study_set(&db, &user_id, &study_set_id, &request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(summary) => envelope::ok(json!({ "study_set": summary })),
        Err(e) => failed("PUT /api/account/edit", &user_id, e),
    }
}

#[utoipa::path(
    get,
    path = "/api/account/{user_id}/search",
    tag = "Account",
    params(
        ("user_id" = String, Path, description = "Must be the signed-in user"),
        AccountSearchQuery
    ),
    responses(
        (status = 200, description = "Matching owned and/or favorited study sets")
    )
)]
pub async fn search_account(
    db: web::Data<MongoDB>,
    claims: web::ReqData<SessionClaims>,
    path: web::Path<String>,
    query: web::Query<AccountSearchQuery>,
) -> HttpResponse {
    let user_id = path.into_inner();
    let q = query.q.clone().unwrap_or_default();
    let scope = query.scope.unwrap_or_default();
    log::info!("🔍 GET /api/account/{}/search?q={} ({:?})", user_id, q, scope);

    let result = match account_service::authorize(&claims.sub, &user_id) {
        Ok(()) => account_service::search_account(&db, &user_id, &q, scope).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(study_sets) => envelope::ok(json!({ "study_sets": study_sets, "total": study_sets.len() })),
        Err(e) => failed("GET /api/account/search", &user_id, e),
    }
}

#[utoipa::path(
    get,
    path = "/api/account/{user_id}/settings",
    tag = "Account",
    params(("user_id" = String, Path, description = "Must be the signed-in user")),
    responses(
        (status = 200, description = "Account settings")
    )
)]
pub async fn get_settings(
    db: web::Data<MongoDB>,
    claims: web::ReqData<SessionClaims>,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();

    let result = match account_service::authorize(&claims.sub, &user_id) {
        Ok(()) => account_service::get_settings(&db, &user_id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(settings) => envelope::ok(json!({ "settings": settings })),
        Err(e) => failed("GET /api/account/settings", &user_id, e),
    }
}

#[utoipa::path(
    put,
    path = "/api/account/{user_id}/settings",
    tag = "Account",
    params(("user_id" = String, Path, description = "Must be the signed-in user")),
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Updated settings")
    )
)]
pub async fn update_settings(
    db: web::Data<MongoDB>,
    claims: web::ReqData<SessionClaims>,
    path: web::Path<String>,
    request: web::Json<UpdateSettingsRequest>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("⚙️  PUT /api/account/{}/settings", user_id);

    let result = match account_service::authorize(&claims.sub, &user_id) {
        Ok(()) => account_service::update_settings(&db, &user_id, &request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(settings) => envelope::ok(json!({ "settings": settings })),
        Err(e) => failed("PUT /api/account/settings", &user_id, e),
    }
}

#[utoipa::path(
    post,
    path = "/api/account/{user_id}/reset",
    tag = "Account",
    params(("user_id" = String, Path, description = "Must be the signed-in user")),
    responses(
        (status = 200, description = "Study sets, attempts and favorites removed; the account stays")
    )
)]
pub async fn reset_account(
    db: web::Data<MongoDB>,
    claims: web::ReqData<SessionClaims>,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("🧹 POST /api/account/{}/reset", user_id);

    let result = match account_service::authorize(&claims.sub, &user_id) {
        Ok(()) => account_service::reset_account(&db, &user_id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(summary) => envelope::ok(json!(summary)),
        Err(e) => failed("POST /api/account/reset", &user_id, e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/account/{user_id}",
    tag = "Account",
    params(("user_id" = String, Path, description = "Must be the signed-in user")),
    responses(
        (status = 200, description = "Account and everything it owns deleted; cookie cleared")
    )
)]
pub async fn delete_account(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    claims: web::ReqData<SessionClaims>,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("🗑️  DELETE /api/account/{}", user_id);

    let result = match account_service::authorize(&claims.sub, &user_id) {
        Ok(()) => account_service::delete_account(&db, &user_id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(summary) => HttpResponse::Ok()
            .cookie(session_service::removal_cookie(&config))
            .json(envelope::success(json!(summary))),
        Err(e) => failed("DELETE /api/account", &user_id, e),
    }
}
