use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{CheckInTracker, EventService, RegistrationService, WaitlistPromoter};
use domain::store::AdmissionStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{Config, StorageBackend};
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, trace_id, RateLimiterState,
};
use crate::routes::{check_ins, events, health, registrations};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn AdmissionStore>,
    pub events: Arc<EventService>,
    pub registrations: Arc<RegistrationService>,
    pub check_ins: Arc<CheckInTracker>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Wires the admission services around one store.
    pub fn new(config: Config, store: Arc<dyn AdmissionStore>) -> Self {
        let retry = config.admission.retry_policy();
        let promoter = WaitlistPromoter::new(store.clone(), retry);

        // Rate limiting is enabled when rsvp_rate_limit_per_hour > 0
        let rate_limiter = if config.security.rsvp_rate_limit_per_hour > 0 {
            Some(Arc::new(RateLimiterState::new(
                config.security.rsvp_rate_limit_per_hour,
            )))
        } else {
            None
        };

        Self {
            events: Arc::new(EventService::new(store.clone(), promoter.clone(), retry)),
            registrations: Arc::new(RegistrationService::new(store.clone(), promoter, retry)),
            check_ins: Arc::new(CheckInTracker::new(store.clone(), retry)),
            config: Arc::new(config),
            store,
            rate_limiter,
        }
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.config.storage.backend
    }
}

pub fn create_app(config: Config, store: Arc<dyn AdmissionStore>) -> Router {
    let state = AppState::new(config, store);
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // All event routes authenticate through the TelegramAuth extractor
    let event_routes = Router::new()
        .route(
            "/api/v1/events",
            post(events::create_event).get(events::list_events),
        )
        .route(
            "/api/v1/events/:event_id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/api/v1/events/:event_id/status", post(events::change_status))
        .route("/api/v1/events/:event_id/staff", post(events::add_staff))
        .route("/api/v1/events/:event_id/attendees", get(events::attendees))
        .route("/api/v1/events/:event_id/summary", get(events::summary))
        .route("/api/v1/events/:event_id/promote", post(events::promote));

    let rsvp_routes = Router::new()
        .route(
            "/api/v1/events/:event_id/rsvp",
            post(registrations::register)
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    rate_limit_middleware,
                ))
                .delete(registrations::cancel),
        )
        .route(
            "/api/v1/events/:event_id/rsvp/me",
            get(registrations::my_registration),
        )
        .route("/api/v1/events/:event_id/checkin", post(check_ins::check_in));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(event_routes)
        .merge(rsvp_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
