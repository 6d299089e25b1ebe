//! # HTTP Server Module
//!
//! HTTP surface over the engine.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/api/v1/*` - One route per table, column and row operation, rate
//!   limited per client and route

pub mod config;
pub mod observability_routes;
pub mod rate_limit;
pub mod server;
pub mod table_routes;

pub use config::HttpServerConfig;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use server::HttpServer;
pub use table_routes::API_KEY_HEADER;
