//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire the defense middleware in order: security headers outermost,
//!   then rate limiting (cheapest, most universal), then CSRF
//!   validation for state-changing requests
//! - Spawn the background store sweep
//! - Serve plain or TLS, with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::fingerprint::{FingerprintRegistry, InMemorySessionStore};
use crate::http::handlers;
use crate::observability::metrics;
use crate::security::csrf::{csrf_middleware, CsrfGuard};
use crate::security::headers::security_headers_middleware;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter, RatePolicySet};
use crate::security::{StaticTokenVerifier, SubjectVerifier};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub limiter: Arc<RateLimiter>,
    pub policies: Arc<RatePolicySet>,
    pub csrf: Arc<CsrfGuard>,
    pub verifier: Arc<dyn SubjectVerifier>,
    pub registry: Arc<FingerprintRegistry>,
    pub started_at: Instant,
    pub tls_enabled: bool,
}

/// HTTP server for the request defense gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let store = match &config.fingerprint.persistence_path {
            Some(path) => InMemorySessionStore::load_from_file(path).unwrap_or_else(|e| {
                tracing::error!(path = %path, error = %e, "Failed to load session snapshot");
                InMemorySessionStore::new(Some(path.clone()))
            }),
            None => InMemorySessionStore::new(None),
        };
        let registry = Arc::new(FingerprintRegistry::new(
            Arc::new(store),
            config.fingerprint.clone(),
        ));

        let state = AppState {
            limiter: Arc::new(RateLimiter::new()),
            policies: Arc::new(RatePolicySet::from_config(&config.rate_limit)),
            csrf: Arc::new(CsrfGuard::new(Duration::from_secs(config.csrf.token_ttl_secs))),
            verifier: Arc::new(StaticTokenVerifier::from_config(&config.auth)),
            registry,
            started_at: Instant::now(),
            tls_enabled: config.listener.tls.is_some(),
            config: Arc::new(config.clone()),
        };

        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/api/csrf-token",
                get(handlers::issue_csrf_token).delete(handlers::revoke_csrf_token),
            )
            .route("/api/ip", get(handlers::ip))
            .route("/api/messages", post(handlers::submit_message))
            .route("/api/device-tracking/session", post(handlers::start_session))
            .route("/api/device-tracking/activity", post(handlers::record_activity))
            .route("/api/device-tracking/end-session", post(handlers::end_session))
            .route(
                "/api/device-tracking/check-returning",
                post(handlers::check_returning),
            )
            .route(
                "/api/device-tracking/footprint/{user_id}",
                get(handlers::footprint),
            )
            .route("/admin/status", get(handlers::admin_status))
            .layer(middleware::from_fn_with_state(state.clone(), csrf_middleware))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                security_headers_middleware,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, tls = self.state.tls_enabled, "HTTP server starting");

        self.spawn_store_sweep();

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.listener.tls {
            Some(tls) => {
                let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    shutdown_signal().await;
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
                });
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
            }
        }

        if let Err(e) = self.state.registry.persist() {
            tracing::error!(error = %e, "Failed to save session snapshot");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Periodically drop expired rate windows and CSRF tokens, and
    /// publish store sizes.
    fn spawn_store_sweep(&self) {
        let interval_secs = self.config.rate_limit.sweep_interval_secs;
        if interval_secs == 0 {
            return;
        }
        let limiter = self.state.limiter.clone();
        let csrf = self.state.csrf.clone();
        let registry = self.state.registry.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                limiter.purge_expired();
                csrf.purge_expired();
                metrics::record_store_sizes(
                    limiter.window_count(),
                    csrf.subject_count(),
                    registry.session_count(),
                );
            }
        });
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
