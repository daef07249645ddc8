use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod applications;
pub mod auth;
pub mod company;
pub mod health;
pub mod listings;
pub mod reference;
pub mod school;
pub mod student;
pub mod uploads;

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

fn cors_layer(allowed: Option<&String>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = %value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_ref());
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    // Reads are public; writes authenticate through their role extractors.
    let listings_routes = Router::new()
        .route(
            "/",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route(
            "/:id",
            get(listings::get_listing).patch(listings::update_listing),
        )
        .route("/:id/active", patch(listings::set_listing_active))
        .route("/:id/eligibility", get(listings::listing_eligibility));

    let schools_routes = Router::new()
        .route("/", get(school::search_schools))
        .route("/:id/majors", get(school::list_school_majors));

    let applications_routes = Router::new().route(
        "/",
        get(applications::list_my_applications).post(applications::submit_application),
    );

    let student_routes = Router::new()
        .route(
            "/profile",
            get(student::get_profile).patch(student::update_profile),
        )
        .route("/profile/cv", post(student::upload_cv))
        .route("/profile/cv-url", put(student::set_cv_url));

    let school_admin_routes = Router::new()
        .route(
            "/profile",
            get(school::get_profile).patch(school::update_profile),
        )
        .route("/profile/logo", post(school::upload_logo))
        .route(
            "/majors",
            get(school::list_majors).post(school::create_major),
        )
        .route(
            "/majors/:id",
            patch(school::update_major).delete(school::delete_major),
        )
        .route("/stats", get(school::school_stats))
        .route("/students", get(school::list_students))
        .route(
            "/students/:id/verification",
            patch(school::set_verification),
        );

    let company_routes = Router::new()
        .route(
            "/profile",
            get(company::get_profile).patch(company::update_profile),
        )
        .route("/profile/logo", post(company::upload_logo))
        .route("/listings", get(company::list_own_listings))
        .route(
            "/listings/:id/applications",
            get(company::list_listing_applicants),
        )
        .route(
            "/applications/:id",
            get(applications::get_company_application),
        )
        .route(
            "/applications/:id/status",
            patch(applications::update_application_status),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/applications", applications_routes)
        .nest("/api/student", student_routes)
        .nest("/api/school", school_admin_routes)
        .nest("/api/company", company_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/listings", listings_routes)
        .nest("/api/schools", schools_routes)
        .route("/api/categories", get(reference::list_categories))
        .route("/api/search-sekolah", get(reference::search_directory))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
}
