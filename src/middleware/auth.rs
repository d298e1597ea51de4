use crate::{
    config::AppConfig,
    database::MongoDB,
    services::session_service::{self, SessionClaims},
    utils::AppError,
};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

/// Resolves the session cookie and stores its `SessionClaims` in the request
/// extensions.
///
/// `required()` rejects requests without a live session with 401;
/// `optional()` lets them through without claims.
pub struct SessionGate {
    required: bool,
}

impl SessionGate {
    pub fn required() -> Self {
        Self { required: true }
    }

    pub fn optional() -> Self {
        Self { required: false }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionGateService {
            service: Rc::new(service),
            required: self.required,
        }))
    }
}

pub struct SessionGateService<S> {
    service: Rc<S>,
    required: bool,
}

async fn claims_for(req: &ServiceRequest) -> Result<SessionClaims, AppError> {
    let config = req
        .app_data::<web::Data<AppConfig>>()
        .ok_or_else(|| AppError::Internal("AppConfig not registered".to_string()))?;

    let token = req
        .cookie(&config.session_cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Please log in to continue".to_string()))?;

    let db = req
        .app_data::<web::Data<MongoDB>>()
        .ok_or_else(|| AppError::Internal("MongoDB not registered".to_string()))?;

    session_service::resolve_session(db, config, &token).await
}

impl<S, B> Service<ServiceRequest> for SessionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required = self.required;

        Box::pin(async move {
            match claims_for(&req).await {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                }
                Err(e @ AppError::Unauthorized(_)) if required => {
                    log::warn!("🔒 {} {} rejected: {}", req.method(), req.path(), e);
                    return Err(e.into());
                }
                Err(AppError::Unauthorized(_)) => {}
                // Infrastructure failures surface on both kinds of route
                Err(e) => return Err(e.into()),
            }

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App, HttpResponse};

    async fn whoami(claims: Option<web::ReqData<SessionClaims>>) -> HttpResponse {
        match claims {
            Some(claims) => HttpResponse::Ok().body(claims.sub.clone()),
            None => HttpResponse::Ok().body("anonymous"),
        }
    }

    fn config() -> web::Data<AppConfig> {
        web::Data::new(AppConfig::from_lookup(|_| None))
    }

    #[actix_web::test]
    async fn test_optional_gate_passes_anonymous_requests() {
        let app = test::init_service(
            App::new()
                .app_data(config())
                .service(web::scope("/open").wrap(SessionGate::optional()).route("", web::get().to(whoami))),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/open").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test::read_body(res).await, web::Bytes::from_static(b"anonymous"));
    }

    #[actix_web::test]
    async fn test_required_gate_rejects_missing_cookie() {
        let app = test::init_service(
            App::new()
                .app_data(config())
                .service(web::scope("/private").wrap(SessionGate::required()).route("", web::get().to(whoami))),
        )
        .await;

        let err = match app.call(test::TestRequest::get().uri("/private").to_request()).await {
            Ok(_) => panic!("request without a session must be rejected"),
            Err(err) => err,
        };
        let res = err.error_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_required_gate_treats_empty_cookie_as_missing() {
        let app = test::init_service(
            App::new()
                .app_data(config())
                .service(web::scope("/private").wrap(SessionGate::required()).route("", web::get().to(whoami))),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/private")
            .cookie(actix_web::cookie::Cookie::new("sid", ""))
            .to_request();
        let result = app.call(req).await;
        assert!(matches!(result, Err(e) if e.error_response().status() == StatusCode::UNAUTHORIZED));
    }
}
