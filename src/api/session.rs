use crate::{
    database::MongoDB,
    models::UserSummary,
    services::{auth_service, SessionClaims},
    utils::envelope,
};
use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api",
    tag = "Session",
    responses(
        (status = 200, description = "Whether the caller has a live session, and who they are")
    )
)]
pub async fn session_status(
    db: web::Data<MongoDB>,
    claims: Option<web::ReqData<SessionClaims>>,
) -> HttpResponse {
    let Some(claims) = claims else {
        return envelope::ok(json!({ "authenticated": false }));
    };

    match auth_service::find_user(&db, &claims.sub).await {
        Ok(Some(user)) => envelope::ok(json!({
            "authenticated": true,
            "user": UserSummary::from(&user)
        })),
        // The account was deleted under a live cookie
        Ok(None) => envelope::ok(json!({ "authenticated": false })),
        Err(e) => {
            log::warn!("❌ GET /api - session lookup failed: {}", e);
            e.error_response()
        }
    }
}
