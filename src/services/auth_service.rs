use crate::{
    config::{AppConfig, GoogleOAuthConfig},
    database::{MongoDB, USERS},
    models::{User, PROVIDER_GOOGLE},
    utils::{http, is_duplicate_key, AppError},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use mongodb::bson::{doc, oid::ObjectId};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// Username or email
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Default, utoipa::ToSchema)]
pub struct ValidateSignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Field name -> human readable problem.
pub type FieldErrors = BTreeMap<&'static str, String>;

// ==================== FIELD VALIDATION ====================

pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if !(3..=24).contains(&len) {
        return Err("Username must be between 3 and 24 characters".to_string());
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Username may only contain letters, numbers and underscores".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let invalid = || Err("Email address is not valid".to_string());
    let email = email.trim();

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return invalid(),
    };
    if local.is_empty() || email.chars().any(char::is_whitespace) {
        return invalid();
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return invalid();
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(format!("Password must be at least {} characters", MIN_PASSWORD_CHARS));
    }
    Ok(())
}

pub fn validate_display_name(display_name: &str) -> Result<(), String> {
    if display_name.trim().chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(format!("Display name must be at most {} characters", MAX_DISPLAY_NAME_CHARS));
    }
    Ok(())
}

/// Format checks only; availability is checked against the database separately.
pub fn signup_format_errors(request: &ValidateSignupRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Some(username) = &request.username {
        if let Err(e) = validate_username(username.trim()) {
            errors.insert("username", e);
        }
    }
    if let Some(email) = &request.email {
        if let Err(e) = validate_email(email) {
            errors.insert("email", e);
        }
    }
    if let Some(password) = &request.password {
        if let Err(e) = validate_password(password) {
            errors.insert("password", e);
        }
    }
    errors
}

// ==================== LOOKUPS ====================

pub async fn find_user(db: &MongoDB, user_id: &str) -> Result<Option<User>, AppError> {
    Ok(db.collection::<User>(USERS).find_one(doc! { "user_id": user_id }).await?)
}

pub async fn require_user(db: &MongoDB, user_id: &str) -> Result<User, AppError> {
    find_user(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn username_taken(db: &MongoDB, username: &str) -> Result<bool, AppError> {
    let count = db
        .collection::<User>(USERS)
        .count_documents(doc! { "username": username })
        .await?;
    Ok(count > 0)
}

pub async fn email_taken(db: &MongoDB, email: &str) -> Result<bool, AppError> {
    let count = db
        .collection::<User>(USERS)
        .count_documents(doc! { "email": email.trim().to_lowercase() })
        .await?;
    Ok(count > 0)
}

/// Format errors plus taken username/email.
pub async fn validate_signup(db: &MongoDB, request: &ValidateSignupRequest) -> Result<FieldErrors, AppError> {
    let mut errors = signup_format_errors(request);

    if let Some(username) = &request.username {
        if !errors.contains_key("username") && username_taken(db, username.trim()).await? {
            errors.insert("username", "Username is already taken".to_string());
        }
    }
    if let Some(email) = &request.email {
        if !errors.contains_key("email") && email_taken(db, email).await? {
            errors.insert("email", "An account with this email already exists".to_string());
        }
    }

    Ok(errors)
}

fn first_error(errors: FieldErrors) -> Option<String> {
    errors.into_values().next()
}

// ==================== SIGNUP / LOGIN ====================

pub async fn signup(db: &MongoDB, request: &SignupRequest) -> Result<User, AppError> {
    let username = request.username.trim();
    let validation = ValidateSignupRequest {
        username: Some(username.to_string()),
        email: Some(request.email.clone()),
        password: Some(request.password.clone()),
    };

    if let Some(message) = first_error(validate_signup(db, &validation).await?) {
        return Err(AppError::InvalidRequest(message));
    }
    if let Some(display_name) = &request.display_name {
        validate_display_name(display_name).map_err(AppError::InvalidRequest)?;
    }

    let password_hash = hash(&request.password, DEFAULT_COST)?;
    let user = User::new_local(username, request.email.trim(), password_hash, request.display_name.as_deref());

    match db.collection::<User>(USERS).insert_one(&user).await {
        Ok(_) => {}
        // Lost a race with a concurrent signup for the same name/email
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::Conflict("Username or email is already taken".to_string()))
        }
        Err(e) => return Err(e.into()),
    }

    log::info!("✅ User registered: {} ({})", user.username, user.user_id);
    Ok(user)
}

pub async fn login(db: &MongoDB, request: &LoginRequest) -> Result<User, AppError> {
    let identifier = request.identifier.trim();
    let filter = if identifier.contains('@') {
        doc! { "email": identifier.to_lowercase() }
    } else {
        doc! { "username": identifier }
    };

    let invalid = || AppError::InvalidRequest("Invalid credentials".to_string());

    let user = db
        .collection::<User>(USERS)
        .find_one(filter)
        .await?
        .ok_or_else(invalid)?;

    let stored_password = user.password.as_ref().ok_or_else(|| {
        AppError::InvalidRequest("This account uses Google login. Please sign in with Google.".to_string())
    })?;

    if !verify(&request.password, stored_password)? {
        return Err(invalid());
    }

    touch_last_login(db, &user.user_id).await?;
    Ok(user)
}

async fn touch_last_login(db: &MongoDB, user_id: &str) -> Result<(), AppError> {
    let now = chrono::Utc::now().timestamp();
    db.collection::<User>(USERS)
        .update_one(doc! { "user_id": user_id }, doc! { "$set": { "last_login": now } })
        .await?;
    Ok(())
}

// ==================== GOOGLE OAUTH ====================

pub fn google_config(config: &AppConfig) -> Result<&GoogleOAuthConfig, AppError> {
    config
        .google
        .as_ref()
        .ok_or_else(|| AppError::InvalidRequest("Google login is not configured".to_string()))
}

pub fn google_authorize_url(google: &GoogleOAuthConfig, state: &str) -> String {
    let params = [
        ("client_id", google.client_id.as_str()),
        ("redirect_uri", google.redirect_uri.as_str()),
        ("response_type", "code"),
        ("scope", "openid email profile"),
        ("state", state),
        ("prompt", "select_account"),
    ];

    let query_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("https://accounts.google.com/o/oauth2/v2/auth?{}", query_string)
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
    picture: Option<String>,
}

/// Exchanges the authorization code and finds, links or creates the user.
pub async fn handle_google_callback(db: &MongoDB, google: &GoogleOAuthConfig, code: &str) -> Result<User, AppError> {
    let client = http::client();

    let token_response = client
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("code", code),
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("redirect_uri", google.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| AppError::Unauthorized(format!("Failed to exchange code: {}", e)))?;

    if !token_response.status().is_success() {
        return Err(AppError::Unauthorized("Failed to exchange authorization code".to_string()));
    }

    let tokens: GoogleTokenResponse = token_response
        .json()
        .await
        .map_err(|e| AppError::Unauthorized(format!("Failed to parse token response: {}", e)))?;

    let info: GoogleUserInfo = client
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(&tokens.access_token)
        .send()
        .await
        .map_err(|e| AppError::Unauthorized(format!("Failed to get user info: {}", e)))?
        .json()
        .await
        .map_err(|e| AppError::Unauthorized(format!("Failed to parse user info: {}", e)))?;

    let users = db.collection::<User>(USERS);
    let email = info.email.to_lowercase();
    let now = chrono::Utc::now().timestamp();

    if let Some(user) = users.find_one(doc! { "google_id": &info.id }).await? {
        log::info!("✅ Found existing user by google_id: {}", user.user_id);
        touch_last_login(db, &user.user_id).await?;
        return Ok(user);
    }

    if let Some(mut user) = users.find_one(doc! { "email": &email }).await? {
        if !info.verified_email {
            log::warn!("⚠️  Refused to link unverified Google email to user {}", user.user_id);
            return Err(AppError::Unauthorized(
                "This Google email is not verified; log in with your password instead".to_string(),
            ));
        }
        log::info!("🔗 Linking Google identity to existing user: {}", user.user_id);
        users
            .update_one(
                doc! { "user_id": &user.user_id },
                doc! { "$set": {
                    "google_id": &info.id,
                    "picture": info.picture.clone(),
                    "last_login": now,
                    "updated_at": now,
                } },
            )
            .await?;
        user.google_id = Some(info.id);
        user.picture = info.picture.or(user.picture);
        return Ok(user);
    }

    let username = unique_username(db, &email).await?;
    let user = User {
        id: None,
        user_id: ObjectId::new().to_hex(),
        display_name: info
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| username.clone()),
        username,
        email,
        password: None,
        picture: info.picture,
        google_id: Some(info.id),
        provider: PROVIDER_GOOGLE.to_string(),
        favorites: Vec::new(),
        created_at: now,
        updated_at: now,
        last_login: Some(now),
    };

    users.insert_one(&user).await?;
    log::info!("✅ Created user from Google login: {}", user.user_id);
    Ok(user)
}

/// Valid username derived from an email local part ("ada.l+x@..." -> "ada_l_x").
pub fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .take(18)
        .collect();
    while base.chars().count() < 3 {
        base.push('_');
    }
    base
}

async fn unique_username(db: &MongoDB, email: &str) -> Result<String, AppError> {
    let base = username_base(email);
    if !username_taken(db, &base).await? {
        return Ok(base);
    }
    for _ in 0..10 {
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..5];
        let candidate = format!("{}_{}", base, suffix);
        if !username_taken(db, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal("Could not derive a free username".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_email_unverified_unless_stated() {
        let info: GoogleUserInfo =
            serde_json::from_str(r#"{"id":"g1","email":"ada@example.com"}"#).unwrap();
        assert!(!info.verified_email);

        let info: GoogleUserInfo =
            serde_json::from_str(r#"{"id":"g1","email":"ada@example.com","verified_email":true}"#).unwrap();
        assert!(info.verified_email);
    }
    #[test]
    fn test_username_rules() {
        assert!(validate_username("ada_99").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(25)).is_err());
        assert!(validate_username("ada lovelace").is_err());
        assert!(validate_username("ada-l").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada@mail.example.co").is_ok());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@@example.com").is_err());
        assert!(validate_email("ada@example..com").is_err());
        assert!(validate_email("a da@example.com").is_err());
    }

    #[test]
    fn test_password_rule() {
        assert!(validate_password("hunter22").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_format_errors_only_for_present_fields() {
        let errors = signup_format_errors(&ValidateSignupRequest {
            username: Some("x".to_string()),
            email: None,
            password: Some("12345678".to_string()),
        });
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("username"));

        assert!(signup_format_errors(&ValidateSignupRequest::default()).is_empty());
    }

    #[test]
    fn test_username_base() {
        assert_eq!(username_base("Ada.L+x@example.com"), "ada_l_x");
        assert_eq!(username_base("jo@example.com"), "jo_");
        let base = username_base("averyveryverylongemailname@example.com");
        assert_eq!(base.len(), 18);
        assert!(validate_username(&base).is_ok());
    }

    #[test]
    fn test_authorize_url_is_encoded() {
        let google = GoogleOAuthConfig {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3001/api/auth/google/callback".to_string(),
        };
        let url = google_authorize_url(&google, "abc");
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3001%2Fapi%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("state=abc"));
        assert!(!url.contains("secret"));
    }
}
