//! HTTP surface: handlers plus the router that wires them to the services

pub mod images;
pub mod payments;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{SecurityConfig, ServerConfig};
use crate::health::{HealthChecker, HealthStatus};
use crate::middleware::internal_auth::{require_internal_token, INTERNAL_TOKEN_HEADER};
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::{ImageProxyService, PaymentFlowService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentFlowService>,
    pub images: Arc<ImageProxyService>,
    pub health_checker: HealthChecker,
    pub security: SecurityConfig,
}

/// `*` allows any origin; otherwise only the listed ones.
pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(INTERNAL_TOKEN_HEADER),
        ]);

    if server.cors_allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let internal_only =
        middleware::from_fn_with_state(state.security.clone(), require_internal_token);

    let payment_routes = Router::new()
        .route(
            "/initiate",
            post(payments::initiate).route_layer(internal_only.clone()),
        )
        .route("/ipn", post(payments::ipn))
        .route(
            "/success",
            get(payments::success_query).post(payments::success_form),
        )
        .route("/fail", get(payments::fail_query).post(payments::fail_form))
        .route(
            "/cancel",
            get(payments::cancel_query).post(payments::cancel_form),
        )
        .route("/order/{tran_id}", get(payments::get_order))
        .route(
            "/orders",
            get(payments::list_orders).route_layer(internal_only),
        );

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/images", get(images::generate_images))
        .nest("/api/payments", payment_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(server))
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn root() -> &'static str {
    info!("📍 Root endpoint accessed");
    "SSLCommerz relay is running"
}

async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<HealthStatus>)> {
    let health_status = state.health_checker.check_health().await;
    if health_status.is_healthy() {
        Ok(Json(health_status))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(health_status)))
    }
}
