use crate::{
    config::AppConfig,
    database::{MongoDB, SESSIONS},
    models::{Session, User},
    utils::AppError,
};
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Payload of the signed session cookie.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionClaims {
    pub sub: String,      // user_id
    pub sid: String,      // session_id
    pub username: String,
    pub iat: usize,
    pub exp: usize,
    pub aud: String,
    pub iss: String,
}

pub fn sign_session_token(
    config: &AppConfig,
    user_id: &str,
    username: &str,
    session_id: &str,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        sid: session_id.to_string(),
        username: username.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(config.session_ttl_days)).timestamp() as usize,
        aud: config.jwt_audience.clone(),
        iss: config.jwt_issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign session token: {}", e)))
}

pub fn verify_session_token(config: &AppConfig, token: &str) -> Result<SessionClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.as_str()]);

    let mut issuers = HashSet::new();
    issuers.insert(config.jwt_issuer.clone());
    validation.iss = Some(issuers);

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid session: {}", e)))
}

/// Persists a new session for `user` and returns the signed cookie value.
pub async fn open_session(
    db: &MongoDB,
    config: &AppConfig,
    user: &User,
    user_agent: Option<String>,
) -> Result<String, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(config.session_ttl_days);

    let session = Session {
        id: None,
        session_id: session_id.clone(),
        user_id: user.user_id.clone(),
        user_agent,
        created_at: BsonDateTime::now(),
        expires_at: BsonDateTime::from_millis(expires_at.timestamp_millis()),
    };

    db.collection::<Session>(SESSIONS).insert_one(&session).await?;

    log::info!("🔑 Session opened for user {}", user.user_id);
    sign_session_token(config, &user.user_id, &user.username, &session_id)
}

/// Claims of a token whose session record still exists and has not expired.
pub async fn resolve_session(
    db: &MongoDB,
    config: &AppConfig,
    token: &str,
) -> Result<SessionClaims, AppError> {
    let claims = verify_session_token(config, token)?;

    let session = db
        .collection::<Session>(SESSIONS)
        .find_one(doc! { "session_id": &claims.sid, "user_id": &claims.sub })
        .await?
        .ok_or_else(|| AppError::Unauthorized("Session has ended".to_string()))?;

    if session.is_expired() {
        return Err(AppError::Unauthorized("Session has expired".to_string()));
    }

    Ok(claims)
}

pub async fn close_session(db: &MongoDB, session_id: &str) -> Result<(), AppError> {
    db.collection::<Session>(SESSIONS)
        .delete_one(doc! { "session_id": session_id })
        .await?;
    Ok(())
}

pub fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build(config.session_cookie_name.clone(), token)
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(config.session_ttl_days))
        .finish()
}

pub fn removal_cookie(config: &AppConfig) -> Cookie<'static> {
    let mut cookie = Cookie::build(config.session_cookie_name.clone(), "")
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some("unit-test-secret".to_string()),
            _ => None,
        })
    }

    #[test]
    fn test_token_round_trip() {
        let config = test_config();
        let token = sign_session_token(&config, "u1", "ada", "s1").unwrap();
        let claims = verify_session_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.sid, "s1");
        assert_eq!(claims.username, "ada");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_secret = "another-secret".to_string();

        let token = sign_session_token(&other, "u1", "ada", "s1").unwrap();
        assert!(matches!(verify_session_token(&config, &token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_token_for_other_audience_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_audience = "mobile-app".to_string();

        let token = sign_session_token(&other, "u1", "ada", "s1").unwrap();
        assert!(verify_session_token(&config, &token).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let config = test_config();
        let mut token = sign_session_token(&config, "u1", "ada", "s1").unwrap();
        token.push('x');
        assert!(verify_session_token(&config, &token).is_err());
    }

    #[test]
    fn test_cookie_attributes() {
        let config = test_config();
        let cookie = session_cookie(&config, "tok".to_string());
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(CookieDuration::days(7)));

        let removal = removal_cookie(&config);
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(CookieDuration::ZERO));
    }

    #[test]
    fn test_longest_configured_ttl_still_signs() {
        let config = AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some("unit-test-secret".to_string()),
            "SESSION_TTL_DAYS" => Some(i64::MAX.to_string()),
            _ => None,
        });
        let token = sign_session_token(&config, "u1", "ada", "s1").unwrap();
        assert!(verify_session_token(&config, &token).is_ok());
        let cookie = session_cookie(&config, token);
        assert_eq!(cookie.max_age(), Some(CookieDuration::days(crate::config::MAX_SESSION_TTL_DAYS)));
    }
}
