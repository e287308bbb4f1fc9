/// Application state and router builder
///
/// Defines the shared application state and builds the Axum router with all
/// routes and middleware.

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use ecard_shared::{auth::jwt, contact::CountryCodes};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor. Uses Arc
/// internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Country-code table for phone/WhatsApp normalization
    pub country_codes: Arc<CountryCodes>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            country_codes: Arc::new(CountryCodes::standard()),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Public hostname used when building card URLs
    pub fn public_host(&self) -> &str {
        &self.config.cards.public_host
    }
}

/// Authenticated requester, injected into request extensions by
/// [`jwt_auth_layer`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                            # Health check (public)
/// ├── /v1/
/// │   ├── /auth/
/// │   │   ├── POST /register
/// │   │   ├── POST /login
/// │   │   ├── POST /refresh
/// │   │   └── /password-reset/
/// │   │       ├── POST /request-otp
/// │   │       └── POST /verify-otp
/// │   ├── /cards/
/// │   │   ├── GET  /                     # Owner dashboard (authenticated)
/// │   │   ├── POST /                     # Create (authenticated)
/// │   │   ├── GET  /:slug                # Public view
/// │   │   ├── PUT  /:slug                # Owner edit (authenticated)
/// │   │   └── GET  /:slug/qr.png         # Stored QR artifact (public)
/// │   ├── /upgrade-requests/
/// │   │   └── POST /                     # Ask for a limit raise (authenticated)
/// │   ├── GET /plans                     # Active billing plans (public)
/// │   ├── GET /subscriptions             # Own subscriptions (authenticated)
/// │   └── /admin/                        # Admin surface (JWT + is_admin)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
/// 4. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route(
            "/password-reset/request-otp",
            post(routes::auth::request_password_reset_otp),
        )
        .route(
            "/password-reset/verify-otp",
            post(routes::auth::verify_password_reset_otp),
        );

    // Owner card routes (require JWT authentication)
    let owner_card_routes = Router::new()
        .route("/", get(routes::cards::list_cards))
        .route("/", post(routes::cards::create_card))
        .route("/:slug", put(routes::cards::update_card))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Public card routes (optional auth handled inside the handlers)
    let public_card_routes = Router::new()
        .route("/:slug", get(routes::cards::view_card))
        .route("/:slug/qr.png", get(routes::cards::card_qr_png));

    let upgrade_routes = Router::new()
        .route("/", post(routes::cards::create_upgrade_request))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let plan_routes = Router::new().route("/plans", get(routes::plans::list_plans));

    let subscription_routes = Router::new()
        .route("/subscriptions", get(routes::plans::my_subscriptions))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Admin routes (require JWT + admin role)
    let admin_routes = Router::new()
        .route("/stats", get(routes::admin::stats))
        .route("/users", get(routes::admin::list_users))
        .route("/cards", get(routes::admin::list_cards))
        .route("/users/:id/card-limit", put(routes::admin::set_card_limit))
        .route(
            "/cards/:slug/deactivate",
            post(routes::admin::deactivate_card),
        )
        .route(
            "/cards/:slug/reactivate",
            post(routes::admin::reactivate_card),
        )
        .route("/cards/:slug", delete(routes::admin::delete_card))
        .route(
            "/upgrade-requests",
            get(routes::admin::list_upgrade_requests),
        )
        .route(
            "/upgrade-requests/:id/decide",
            post(routes::admin::decide_upgrade_request),
        )
        .route("/export", get(routes::admin::export))
        .layer(axum::middleware::from_fn(admin_guard_layer))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Build complete v1 API
    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/cards", owner_card_routes.merge(public_card_routes))
        .nest("/upgrade-requests", upgrade_routes)
        .merge(plan_routes)
        .merge(subscription_routes)
        .nest("/admin", admin_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Extracts and validates the Bearer token from the Authorization header,
/// then injects [`CurrentUser`] into request extensions.
async fn jwt_auth_layer(
    state: axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current_user = authenticate(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}

/// Rejects non-admin requesters. Must run after [`jwt_auth_layer`].
async fn admin_guard_layer(req: Request, next: Next) -> Result<Response, ApiError> {
    let current_user = req
        .extensions()
        .get::<CurrentUser>()
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("Missing credentials".to_string()))?;

    if !current_user.is_admin {
        return Err(ApiError::Forbidden(
            "Admin privileges required".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Validates the Authorization header into a [`CurrentUser`].
fn authenticate(headers: &HeaderMap, secret: &str) -> Result<CurrentUser, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_access_token(token, secret)?;

    Ok(CurrentUser {
        user_id: claims.sub,
        is_admin: claims.is_admin,
    })
}

/// Best-effort authentication for public routes: a valid token identifies
/// the requester, anything else is an anonymous visitor.
pub fn maybe_authenticate(headers: &HeaderMap, secret: &str) -> Option<CurrentUser> {
    authenticate(headers, secret).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecard_shared::auth::jwt::{create_token, Claims, TokenType};

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn headers_with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_authenticate_valid_token() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, true, TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        let current = authenticate(&headers_with_token(&token), SECRET).unwrap();
        assert_eq!(current.user_id, user_id);
        assert!(current.is_admin);
    }

    #[test]
    fn test_authenticate_rejects_refresh_token() {
        let claims = Claims::new(Uuid::new_v4(), false, TokenType::Refresh);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(authenticate(&headers_with_token(&token), SECRET).is_err());
    }

    #[test]
    fn test_authenticate_missing_header() {
        assert!(authenticate(&HeaderMap::new(), SECRET).is_err());
        assert!(maybe_authenticate(&HeaderMap::new(), SECRET).is_none());
    }
}
