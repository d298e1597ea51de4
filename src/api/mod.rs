pub mod account;
pub mod auth;
pub mod explore;
pub mod generate;
pub mod health;
pub mod profile;
pub mod session;
pub mod study_sets;
pub mod swagger;

use crate::{services::SessionClaims, utils::AppError};
use actix_web::{http::header::USER_AGENT, web, HttpRequest};

/// Claims of the caller on routes behind the optional gate that still need a
/// signed-in user.
pub fn signed_in(claims: Option<web::ReqData<SessionClaims>>) -> Result<SessionClaims, AppError> {
    claims
        .map(web::ReqData::into_inner)
        .ok_or_else(|| AppError::Unauthorized("Please log in to continue".to_string()))
}

pub fn viewer_id(claims: &Option<web::ReqData<SessionClaims>>) -> Option<&str> {
    claims.as_ref().map(|c| c.sub.as_str())
}

pub fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

// Extractor failures answer with the same `{status:0,error}` envelope as the
// services.

pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| AppError::InvalidRequest(format!("Invalid request body: {}", err)).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::InvalidRequest(format!("Invalid query: {}", err)).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::InvalidRequest(format!("Invalid path: {}", err)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::explore_service::ExploreQuery;
    use actix_web::{http::StatusCode, test, App, HttpResponse};
    use serde_json::Value;

    async fn echo_page(query: web::Query<ExploreQuery>) -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({ "status": 1, "page": query.page }))
    }

    async fn echo_body(body: web::Json<Value>) -> HttpResponse {
        HttpResponse::Ok().json(body.into_inner())
    }

    #[actix_web::test]
    async fn test_bad_query_answers_with_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(query_config())
                .route("/explore", web::get().to(echo_page)),
        )
        .await;

        for uri in ["/explore?page=abc", "/explore?difficulty=extreme", "/explore?sort=oldest"] {
            let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(res.status(), StatusCode::OK, "{}", uri);
            let body: Value = test::read_body_json(res).await;
            assert_eq!(body["status"], 0, "{}", uri);
            assert!(body["error"].as_str().unwrap().starts_with("Invalid query"), "{}", uri);
        }

        let res = test::call_service(&app, test::TestRequest::get().uri("/explore?page=2").to_request()).await;
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["status"], 1);
        assert_eq!(body["page"], 2);
    }

    #[actix_web::test]
    async fn test_bad_json_answers_with_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(json_config(64))
                .route("/echo", web::post().to(echo_body)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/echo")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["status"], 0);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }
}
