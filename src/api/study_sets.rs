use crate::{
    api::{signed_in, viewer_id},
    database::MongoDB,
    models::RecordAttemptRequest,
    services::{study_set_service, SessionClaims},
    utils::envelope,
};
use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/study-set/{study_set_id}",
    tag = "Study Sets",
    params(("study_set_id" = String, Path, description = "Study set id")),
    responses(
        (status = 200, description = "Deck, quiz, owner and the viewer's attempts; private sets of others read as not found")
    )
)]
pub async fn get_study_set(
    db: web::Data<MongoDB>,
    claims: Option<web::ReqData<SessionClaims>>,
    path: web::Path<String>,
) -> HttpResponse {
    let study_set_id = path.into_inner();
    log::info!("📚 GET /api/study-set/{}", study_set_id);

    match study_set_service::get_study_set(&db, &study_set_id, viewer_id(&claims)).await {
        Ok(view) => envelope::ok(json!(view)),
        Err(e) => {
            log::warn!("❌ Study set {} failed: {}", study_set_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/study-set/{study_set_id}",
    tag = "Study Sets",
    params(("study_set_id" = String, Path, description = "Study set id")),
    request_body = RecordAttemptRequest,
    responses(
        (status = 200, description = "Current high score and whether this attempt set it"),
        (status = 401, description = "No session")
    )
)]
pub async fn record_attempt(
    db: web::Data<MongoDB>,
    claims: Option<web::ReqData<SessionClaims>>,
    path: web::Path<String>,
    request: web::Json<RecordAttemptRequest>,
) -> HttpResponse {
    let study_set_id = path.into_inner();

    let claims = match signed_in(claims) {
        Ok(claims) => claims,
        Err(e) => return e.error_response(),
    };
    log::info!("📝 PUT /api/study-set/{} - score {} by {}", study_set_id, request.score, claims.sub);

    match study_set_service::record_attempt(&db, &study_set_id, &claims.sub, request.score).await {
        Ok(outcome) => envelope::ok(json!(outcome)),
        Err(e) => {
            log::warn!("❌ Attempt on {} failed: {}", study_set_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/study-set/{study_set_id}",
    tag = "Study Sets",
    params(("study_set_id" = String, Path, description = "Study set id")),
    responses(
        (status = 200, description = "Set, its attempts and its favorites removed"),
        (status = 401, description = "No session")
    )
)]
pub async fn delete_study_set(
    db: web::Data<MongoDB>,
    claims: Option<web::ReqData<SessionClaims>>,
    path: web::Path<String>,
) -> HttpResponse {
    let study_set_id = path.into_inner();

    let claims = match signed_in(claims) {
        Ok(claims) => claims,
        Err(e) => return e.error_response(),
    };
    log::info!("🗑️  DELETE /api/study-set/{} by {}", study_set_id, claims.sub);

    match study_set_service::delete_study_set(&db, &study_set_id, &claims.sub).await {
        Ok(removed) => envelope::ok(json!({ "deleted": removed })),
        Err(e) => {
            log::warn!("❌ Delete of {} failed: {}", study_set_id, e);
            e.error_response()
        }
    }
}
