//! # HTTP Server
//!
//! Axum server exposing the engine under `/api/v1`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::config::HttpServerConfig;
use super::observability_routes::health_routes;
use super::rate_limit::RateLimiter;
use super::table_routes::{table_routes, TableState};
use crate::core::Engine;

/// HTTP server for the engine
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server around an engine
    pub fn new(config: HttpServerConfig, engine: Arc<Engine>) -> Self {
        let router = Self::build_router(&config, engine);
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    fn build_router(config: &HttpServerConfig, engine: Arc<Engine>) -> Router {
        let table_state = Arc::new(TableState::new(engine.clone()));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        if limiter.is_unlimited() {
            info!("request rate limiting disabled");
        }

        Router::new()
            .merge(health_routes(engine))
            .nest("/api/v1", table_routes(table_state, limiter))
            .layer(TraceLayer::new_for_http())
            .layer(config.cors_layer())
    }

    /// Address the server will bind
    pub fn bind_addr(&self) -> io::Result<SocketAddr> {
        self.config.bind_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the process exits
    pub async fn start(self) -> Result<(), io::Error> {
        let addr = self.config.bind_addr()?;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "serving table API under /api/v1");

        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service).await?;
        Ok(())
    }
}
