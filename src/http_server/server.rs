//! # HTTP Server
//!
//! Combines the resource routers under `/api/v1` with the health and
//! metrics endpoints at the root.

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::config::HttpServerConfig;
use super::functions_routes::functions_routes;
use super::objects_routes::objects_routes;
use super::observability_routes::observability_routes;
use super::state::AppState;
use super::tables_routes::tables_routes;
use super::test_cases_routes::test_cases_routes;
use crate::observability::{Event, Logger};

/// API prefix for resource routes
pub const API_PREFIX: &str = "/api/v1";

/// HTTP server for the tabula API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, Arc::new(state));
        Self { config, router }
    }

    fn build_router(config: &HttpServerConfig, state: Arc<AppState>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let api = Router::new()
            .nest("/objects", objects_routes(state.clone()))
            .nest("/tables", tables_routes(state.clone()))
            .nest("/functions", functions_routes(state.clone()))
            .nest("/test-cases", test_cases_routes(state.clone()));

        Router::new()
            .merge(observability_routes(state))
            .nest(API_PREFIX, api)
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` resolves
    pub async fn start(self, shutdown: impl Future<Output = ()> + Send + 'static) -> io::Result<()> {
        let addr = self
            .config
            .bind_addr()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?.to_string();
        Logger::info(Event::Serving.as_str(), &[("addr", local.as_str())]);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
