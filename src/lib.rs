//! tablegate - remote table, column and row management for PostgreSQL
//!
//! Every operation runs through [`core::Engine`]: an API key check,
//! identifier normalization, and one transaction against a [`store::Store`].

pub mod auth;
pub mod cli;
pub mod config;
pub mod core;
pub mod http_server;
pub mod observability;
pub mod sql;
pub mod store;
