use lazy_static::lazy_static;
use std::time::Duration;

lazy_static! {
    /// Shared outbound client (Gemini and Google OAuth).
    ///
    /// Generation calls on long notes can take a while, so the timeout is
    /// generous.
    pub static ref HTTP_CLIENT: reqwest::Client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("study-set-service/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
}

pub fn client() -> &'static reqwest::Client {
    &HTTP_CLIENT
}
