//! HTTP handler definitions for the Lizmap server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod health;
pub mod ows;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use ows::ows_handler;

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::LizmapService;
use crate::traits::ProjectProvider;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The LIZMAP service entry point.
    pub service: Arc<LizmapService>,
    /// Resolves the `MAP` parameter.
    pub projects: Arc<dyn ProjectProvider>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
