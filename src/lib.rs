//! Translation gateway core: request normalization, popularity-driven
//! caching, credential resolution and multi-provider fallback.

pub mod cache;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod languages;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod security;
pub mod server;

pub use error::TranslateError;
pub use orchestrator::{Orchestrator, TranslationRequest, TranslationResponse};
