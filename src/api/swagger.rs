use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Study Set Service API",
        version = "1.0.0",
        description = "Turns notes (text or PDF) into study sets: a flashcard deck plus a multiple-choice quiz.\n\n**Authentication:** a signed session cookie set by signup, login or Google login.\n\n**Envelope:** every answer carries `status` (1 success, 0 failure) and failures an `error` message. Application failures use HTTP 200; a missing session is 401, an oversized PDF 413."
    ),
    paths(
        // Session & Auth
        crate::api::session::session_status,
        crate::api::auth::signup,
        crate::api::auth::login,
        crate::api::auth::logout,
        crate::api::auth::validate_signup,
        crate::api::auth::google_login,
        crate::api::auth::google_callback,

        // Account
        crate::api::account::get_account,
        crate::api::account::toggle_favorite,
        crate::api::account::edit_study_set,
        crate::api::account::search_account,
        crate::api::account::get_settings,
        crate::api::account::update_settings,
        crate::api::account::reset_account,
        crate::api::account::delete_account,

        // Profile
        crate::api::profile::search_profiles,
        crate::api::profile::get_profile,
        crate::api::profile::toggle_follow,
        crate::api::profile::list_followers,
        crate::api::profile::list_following,

        // Explore, Generate, Study Sets
        crate::api::explore::explore,
        crate::api::generate::generate_from_text,
        crate::api::generate::generate_from_pdf,
        crate::api::study_sets::get_study_set,
        crate::api::study_sets::record_attempt,
        crate::api::study_sets::delete_study_set,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::services::auth_service::SignupRequest,
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::ValidateSignupRequest,
            crate::models::UserSummary,
            crate::models::AccountSettings,
            crate::models::UpdateSettingsRequest,

            crate::models::Difficulty,
            crate::models::Flashcard,
            crate::models::Deck,
            crate::models::ChoiceLabel,
            crate::models::Choice,
            crate::models::QuizQuestion,
            crate::models::Quiz,
            crate::models::StudySetSummary,
            crate::models::StudySetDetail,
            crate::models::UpdateStudySetRequest,
            crate::models::RecordAttemptRequest,
            crate::models::AttemptView,

            crate::services::account_service::AccountOverview,
            crate::services::account_service::FavoriteOutcome,
            crate::services::account_service::SearchScope,
            crate::services::account_service::ResetSummary,
            crate::services::account_service::DeleteSummary,
            crate::services::profile_service::ProfileView,
            crate::services::profile_service::FollowOutcome,
            crate::services::explore_service::ExploreSort,
            crate::services::explore_service::ExplorePage,
            crate::services::study_set_service::StudySetView,
            crate::services::study_set_service::AttemptOutcome,
            crate::api::generate::GenerateTextRequest,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Session", description = "Who is signed in."),
        (name = "Auth", description = "Signup, login, logout, field validation and Google login."),
        (name = "Account", description = "The signed-in user's study sets, favorites, settings, reset and deletion."),
        (name = "Profile", description = "Public profiles, follows and user search."),
        (name = "Explore", description = "Browse public study sets."),
        (name = "Generate", description = "Create a study set from text or a PDF."),
        (name = "Study Sets", description = "View a study set, record quiz attempts, delete."),
        (name = "Health", description = "Liveness and database reachability."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "sid",
                    "Signed session cookie (name set by SESSION_COOKIE_NAME)",
                ))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_core_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/generate/pdf"));
        assert!(paths.contains_key("/api/study-set/{study_set_id}"));
        assert!(paths.contains_key("/api/account/{user_id}/favorite/{study_set_id}"));
        assert!(paths.contains_key("/health"));
    }
}
