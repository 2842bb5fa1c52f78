// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{admin, attempt, auth, health, quiz, ranking},
    state::AppState,
    storage::IMAGE_ROUTE,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Upper bound for a single image upload.
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Assembles the main application router.
///
/// * Learner routes (quizzes, attempts) require a valid token.
/// * Admin routes additionally require the `admin` role.
/// * Uploaded images are served statically from the upload directory.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let learner_routes = Router::new()
        .route("/quizzes", get(quiz::list_published_quizzes))
        .route("/quizzes/{id}", get(quiz::get_quiz_session))
        .route("/quizzes/{id}/attempts", post(attempt::start_attempt))
        .route("/attempts", get(attempt::list_my_attempts))
        .route("/attempts/{id}", get(attempt::get_attempt_detail))
        .route("/attempts/{id}/submit", post(attempt::submit_attempt))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/quizzes", get(admin::list_quizzes).post(admin::create_quiz))
        .route("/quizzes/import", post(admin::import_quiz))
        .route(
            "/quizzes/{id}",
            get(admin::get_quiz)
                .put(admin::update_quiz)
                .delete(admin::delete_quiz),
        )
        .route("/quizzes/{id}/publish", post(admin::publish_quiz))
        .route("/quizzes/{id}/unpublish", post(admin::unpublish_quiz))
        .route(
            "/quizzes/{id}/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/quizzes/{id}/questions/order", put(admin::reorder_questions))
        .route(
            "/quizzes/{id}/images",
            post(admin::upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/images", delete(admin::delete_image))
        .route("/rankings", get(ranking::get_rankings))
        // Auth runs first, then the admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", learner_routes)
        .nest("/api/admin", admin_routes)
        .nest_service(IMAGE_ROUTE, ServeDir::new(&state.config.upload_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
