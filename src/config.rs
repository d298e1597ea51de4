use std::fmt::Display;
use std::str::FromStr;

/// Longest session a cookie may carry, in days.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// Runtime settings, read once at startup from the environment (`.env` allowed).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_transactions: bool,
    pub frontend_url: String,

    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub session_cookie_name: String,
    pub session_ttl_days: i64,
    pub cookie_secure: bool,

    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub gemini_poll_interval_secs: u64,
    pub gemini_poll_max_attempts: u32,

    pub max_text_chars: usize,
    pub max_pdf_bytes: usize,

    pub google: Option<GoogleOAuthConfig>,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

const DEFAULT_JWT_SECRET: &str = "default-secret-change-me";

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            log::warn!("⚠️  JWT_SECRET not set, using an insecure development secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        let gemini_api_key = lookup("GEMINI_API_KEY").unwrap_or_else(|| {
            log::warn!("⚠️  GEMINI_API_KEY not set, generation requests will fail");
            String::new()
        });

        let google = match (
            lookup("GOOGLE_CLIENT_ID"),
            lookup("GOOGLE_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_uri: lookup("GOOGLE_REDIRECT_URI").unwrap_or_else(|| {
                    "http://localhost:3001/api/auth/google/callback".to_string()
                }),
            }),
            _ => None,
        };

        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3001),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "mongodb://localhost:27017/studysets".to_string()),
            db_transactions: parse_or(&lookup, "DB_TRANSACTIONS", false),
            frontend_url: lookup("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),

            jwt_secret,
            jwt_issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "study-set-service".to_string()),
            jwt_audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "study-set-web".to_string()),
            session_cookie_name: lookup("SESSION_COOKIE_NAME").unwrap_or_else(|| "sid".to_string()),
            session_ttl_days: parse_or(&lookup, "SESSION_TTL_DAYS", 7).clamp(1, MAX_SESSION_TTL_DAYS),
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false),

            gemini_api_key,
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            gemini_api_base: lookup("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            gemini_poll_interval_secs: parse_or(&lookup, "GEMINI_POLL_INTERVAL_SECS", 5),
            gemini_poll_max_attempts: parse_or(&lookup, "GEMINI_POLL_MAX_ATTEMPTS", 60),

            max_text_chars: parse_or(&lookup, "MAX_TEXT_CHARS", 100_000),
            max_pdf_bytes: parse_or(&lookup, "MAX_PDF_BYTES", 20 * 1024 * 1024),

            google,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("⚠️  Invalid {} value '{}' ({}), using default: {}", key, raw, e, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.session_cookie_name, "sid");
        assert_eq!(config.gemini_poll_interval_secs, 5);
        assert_eq!(config.gemini_poll_max_attempts, 60);
        assert!(!config.db_transactions);
        assert!(config.google.is_none());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("DB_TRANSACTIONS", "true"),
            ("SESSION_TTL_DAYS", "not-a-number"),
            ("GEMINI_API_BASE", "http://localhost:9999/"),
        ]);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.db_transactions);
        assert_eq!(config.session_ttl_days, 7);
        assert_eq!(config.gemini_api_base, "http://localhost:9999");
    }

    #[test]
    fn test_session_ttl_is_clamped() {
        assert_eq!(config_from(&[("SESSION_TTL_DAYS", "99999999999999")]).session_ttl_days, MAX_SESSION_TTL_DAYS);
        assert_eq!(config_from(&[("SESSION_TTL_DAYS", "0")]).session_ttl_days, 1);
        assert_eq!(config_from(&[("SESSION_TTL_DAYS", "30")]).session_ttl_days, 30);
    }

    #[test]
    fn test_google_requires_id_and_secret() {
        let partial = config_from(&[("GOOGLE_CLIENT_ID", "abc")]);
        assert!(partial.google.is_none());

        let full = config_from(&[("GOOGLE_CLIENT_ID", "abc"), ("GOOGLE_CLIENT_SECRET", "shh")]);
        let google = full.google.expect("google config");
        assert_eq!(google.client_id, "abc");
        assert!(google.redirect_uri.ends_with("/api/auth/google/callback"));
    }
}
