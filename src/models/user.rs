use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub const PROVIDER_LOCAL: &str = "local";
pub const PROVIDER_GOOGLE: &str = "google";

/// Document in the "users" collection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub username: String,
    pub email: String,
    /// bcrypt hash; absent for OAuth-only accounts
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub google_id: Option<String>,
    pub provider: String,
    /// study_set_id values
    #[serde(default)]
    pub favorites: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub last_login: Option<i64>,
}

impl User {
    pub fn new_local(username: &str, email: &str, password_hash: String, display_name: Option<&str>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            user_id: ObjectId::new().to_hex(),
            username: username.to_string(),
            email: email.to_lowercase(),
            password: Some(password_hash),
            display_name: display_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(username)
                .to_string(),
            picture: None,
            google_id: None,
            provider: PROVIDER_LOCAL.to_string(),
            favorites: Vec::new(),
            created_at: now,
            updated_at: now,
            last_login: Some(now),
        }
    }
}

/// Public view of a user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub picture: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.user_id.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            picture: user.picture.clone(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AccountSettings {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub provider: String,
    pub has_password: bool,
}

impl From<&User> for AccountSettings {
    fn from(user: &User) -> Self {
        AccountSettings {
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            provider: user.provider.clone(),
            has_password: user.password.is_some(),
        }
    }
}

#[derive(Debug, Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateSettingsRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_local_defaults_display_name() {
        let user = User::new_local("ada", "Ada@Example.com", "hash".into(), Some("  "));
        assert_eq!(user.display_name, "ada");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.provider, PROVIDER_LOCAL);
        assert_eq!(user.user_id.len(), 24);
    }

    #[test]
    fn test_password_hash_never_leaves_through_settings() {
        let user = User::new_local("ada", "ada@example.com", "hash".into(), Some("Ada L."));
        let settings = serde_json::to_value(AccountSettings::from(&user)).unwrap();
        assert_eq!(settings["has_password"], true);
        assert!(settings.get("password").is_none());
        assert_eq!(settings["display_name"], "Ada L.");
    }
}
