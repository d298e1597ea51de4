use crate::{
    database::MongoDB,
    services::explore_service::{self, ExploreQuery},
    utils::envelope,
};
use actix_web::{web, HttpResponse, ResponseError};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/explore",
    tag = "Explore",
    params(ExploreQuery),
    responses(
        (status = 200, description = "A page of public study sets with total and has_more")
    )
)]
pub async fn explore(db: web::Data<MongoDB>, query: web::Query<ExploreQuery>) -> HttpResponse {
    log::info!(
        "🧭 GET /api/explore - q: {:?}, category: {:?}, page: {:?}",
        query.q,
        query.category,
        query.page
    );

    match explore_service::explore(&db, &query).await {
        Ok(page) => {
            log::info!("✅ Explore returned {} of {} sets", page.study_sets.len(), page.total);
            envelope::ok(json!(page))
        }
        Err(e) => {
            log::warn!("❌ Explore failed: {}", e);
            e.error_response()
        }
    }
}
