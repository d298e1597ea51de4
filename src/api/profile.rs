use crate::{
    api::{signed_in, viewer_id},
    database::MongoDB,
    services::{
        profile_service::{self, ProfileSearchQuery},
        SessionClaims,
    },
    utils::envelope,
};
use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/profile/search",
    tag = "Profile",
    params(ProfileSearchQuery),
    responses(
        (status = 200, description = "Up to 20 users whose username or display name matches")
    )
)]
pub async fn search_profiles(db: web::Data<MongoDB>, query: web::Query<ProfileSearchQuery>) -> HttpResponse {
    let q = query.q.clone().unwrap_or_default();
    log::info!("🔍 GET /api/profile/search?q={}", q);

    match profile_service::search_profiles(&db, &q).await {
        Ok(users) => envelope::ok(json!({ "users": users, "total": users.len() })),
        Err(e) => {
            log::warn!("❌ Profile search failed: {}", e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/profile/{user_id}",
    tag = "Profile",
    params(("user_id" = String, Path, description = "Profile owner")),
    responses(
        (status = 200, description = "Public profile with study sets and follow counts")
    )
)]
pub async fn get_profile(
    db: web::Data<MongoDB>,
    claims: Option<web::ReqData<SessionClaims>>,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("👤 GET /api/profile/{}", user_id);

    match profile_service::get_profile(&db, &user_id, viewer_id(&claims)).await {
        Ok(profile) => envelope::ok(json!(profile)),
        Err(e) => {
            log::warn!("❌ Profile {} failed: {}", user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/profile/{user_id}/follow",
    tag = "Profile",
    params(("user_id" = String, Path, description = "User to follow or unfollow")),
    responses(
        (status = 200, description = "New follow state and follower count"),
        (status = 401, description = "No session")
    )
)]
pub async fn toggle_follow(
    db: web::Data<MongoDB>,
    claims: Option<web::ReqData<SessionClaims>>,
    path: web::Path<String>,
) -> HttpResponse {
    let target_id = path.into_inner();

    let claims = match signed_in(claims) {
        Ok(claims) => claims,
        Err(e) => return e.error_response(),
    };
    log::info!("🤝 POST /api/profile/{}/follow - by {}", target_id, claims.sub);

    match profile_service::toggle_follow(&db, &claims.sub, &target_id).await {
        Ok(outcome) => envelope::ok(json!(outcome)),
        Err(e) => {
            log::warn!("❌ Follow {} -> {} failed: {}", claims.sub, target_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/profile/{user_id}/followers",
    tag = "Profile",
    params(("user_id" = String, Path, description = "Profile owner")),
    responses(
        (status = 200, description = "Users following this user, newest first")
    )
)]
pub async fn list_followers(db: web::Data<MongoDB>, path: web::Path<String>) -> HttpResponse {
    let user_id = path.into_inner();

    match profile_service::list_followers(&db, &user_id).await {
        Ok(users) => envelope::ok(json!({ "users": users, "total": users.len() })),
        Err(e) => {
            log::warn!("❌ Followers of {} failed: {}", user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/profile/{user_id}/following",
    tag = "Profile",
    params(("user_id" = String, Path, description = "Profile owner")),
    responses(
        (status = 200, description = "Users this user follows, newest first")
    )
)]
pub async fn list_following(db: web::Data<MongoDB>, path: web::Path<String>) -> HttpResponse {
    let user_id = path.into_inner();

    match profile_service::list_following(&db, &user_id).await {
        Ok(users) => envelope::ok(json!({ "users": users, "total": users.len() })),
        Err(e) => {
            log::warn!("❌ Following of {} failed: {}", user_id, e);
            e.error_response()
        }
    }
}
