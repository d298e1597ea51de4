pub mod account_service;
pub mod auth_service;
pub mod explore_service;
pub mod gemini_service;
pub mod generation_service;
pub mod profile_service;
pub mod session_service;
pub mod study_set_service;

pub use gemini_service::GeminiClient;
pub use generation_service::StudyMaterialGenerator;
pub use session_service::SessionClaims;
