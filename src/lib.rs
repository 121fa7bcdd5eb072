//! Social Cards Library
//!
//! Scores social accounts and mints trading-card snapshots: metric
//! providers, the v1 scoring formula, provenance tagging, persistence and
//! the HTTP handlers that tie them together.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Scoring, tagging and domain workflows.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `auth`: Bearer token resolution.
//! - `capture`: Snapshot capture workflow.
//! - `circuit_breaker`: Circuit breaker for the metrics provider.
//! - `config`: Configuration management.
//! - `db`: Database connection, pool and migrations.
//! - `db_storage`: Database storage operations.
//! - `display`: Number formatting, short ids, tier styling.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `leaderboard`: Leaderboard ranking.
//! - `metrics_cache`: Checksum-validated provider cache.
//! - `metrics_provider`: X API client and mock generator.
//! - `models`: Persisted records and API shapes.
//! - `openapi`: OpenAPI document.
//! - `render_client`: Card render service client.
//! - `score`: Social score formula v1.
//! - `tags`: Provenance tags.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;

pub mod auth;
pub mod capture;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod display;
pub mod errors;
pub mod handlers;
pub mod leaderboard;
pub mod metrics_cache;
pub mod metrics_provider;
pub mod models;
pub mod openapi;
pub mod render_client;
pub mod score;
pub mod tags;
