//! # EstateHub API Server Library
//!
//! HTTP API for the EstateHub listing backend.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `client`: Client IP and user-agent extraction
//! - `clients`: Outbound integrations (geocoder, Facebook)
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod client;
pub mod clients;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
