mod api;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use dotenv::dotenv;
use services::{GeminiClient, StudyMaterialGenerator};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::AppConfig::from_env();
    let bind_address = config.bind_address();

    log::info!("🚀 Starting Study Set Service...");
    log::info!("📊 Database: {}", config.database_url);
    log::info!("🤖 Gemini model: {}", config.gemini_model);
    if config.db_transactions {
        log::info!("🔒 Multi-document transactions enabled for cascades");
    }

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&config.database_url, config.db_transactions)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to MongoDB: {}", e)))?;

    log::info!("✅ MongoDB connected successfully");

    let generator: Arc<dyn StudyMaterialGenerator> = Arc::new(GeminiClient::from_config(&config));
    let generator_data: web::Data<dyn StudyMaterialGenerator> = web::Data::from(generator);
    let db_data = web::Data::new(db);

    // Text notes arrive as JSON; leave room for multi-byte characters
    let json_limit = config.max_text_chars * 4 + 4096;
    let frontend_url = config.frontend_url.clone();
    let config_data = web::Data::new(config);

    log::info!("🌐 Server starting on {}", bind_address);
    log::info!("📚 Swagger UI available at: http://{}/swagger-ui/", bind_address);
    log::info!("📄 OpenAPI spec at: http://{}/api-docs/openapi.json", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CACHE_CONTROL,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .app_data(config_data.clone())
            .app_data(generator_data.clone())
            .app_data(api::json_config(json_limit))
            .app_data(api::query_config())
            .app_data(api::path_config())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Compress::default())
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // ==================== SESSION REQUIRED ====================
            .service(
                web::scope("/api/account")
                    .wrap(middleware::SessionGate::required())
                    .route("/{user_id}", web::get().to(api::account::get_account))
                    .route("/{user_id}", web::delete().to(api::account::delete_account))
                    .route("/{user_id}/favorite/{study_set_id}", web::post().to(api::account::toggle_favorite))
                    .route("/{user_id}/edit/{study_set_id}", web::put().to(api::account::edit_study_set))
                    .route("/{user_id}/search", web::get().to(api::account::search_account))
                    .route("/{user_id}/settings", web::get().to(api::account::get_settings))
                    .route("/{user_id}/settings", web::put().to(api::account::update_settings))
                    .route("/{user_id}/reset", web::post().to(api::account::reset_account)),
            )
            .service(
                web::scope("/api/generate")
                    .wrap(middleware::SessionGate::required())
                    .route("/text", web::post().to(api::generate::generate_from_text))
                    .route("/pdf", web::post().to(api::generate::generate_from_pdf)),
            )
            // ==================== SESSION OPTIONAL ====================
            .service(
                web::scope("/api")
                    .wrap(middleware::SessionGate::optional())
                    .route("", web::get().to(api::session::session_status))
                    .route("/signup", web::post().to(api::auth::signup))
                    .route("/login", web::post().to(api::auth::login))
                    .route("/logout", web::post().to(api::auth::logout))
                    .route("/validate/signup", web::post().to(api::auth::validate_signup))
                    .route("/auth/google", web::get().to(api::auth::google_login))
                    .route("/auth/google/callback", web::get().to(api::auth::google_callback))
                    // "search" must be registered before the {user_id} catch-all
                    .route("/profile/search", web::get().to(api::profile::search_profiles))
                    .route("/profile/{user_id}", web::get().to(api::profile::get_profile))
                    .route("/profile/{user_id}/follow", web::post().to(api::profile::toggle_follow))
                    .route("/profile/{user_id}/followers", web::get().to(api::profile::list_followers))
                    .route("/profile/{user_id}/following", web::get().to(api::profile::list_following))
                    .route("/explore", web::get().to(api::explore::explore))
                    .route("/study-set/{study_set_id}", web::get().to(api::study_sets::get_study_set))
                    .route("/study-set/{study_set_id}", web::put().to(api::study_sets::record_attempt))
                    .route("/study-set/{study_set_id}", web::delete().to(api::study_sets::delete_study_set)),
            )
    })
    .bind(bind_address)?
    .run()
    .await
}
