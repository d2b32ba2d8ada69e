//! The LIZMAP OWS service: single entry point and error boundary.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tower::ServiceExt;
use tracing::debug;

use super::classify::{LizmapRequest, OperationService};
use super::config::ServerConfig;
use super::domain::{ServerSettingsService, SubsetStringService};
use super::middleware::{build_operation_pipeline, OperationPipeline};
use super::operation::{service_names, OperationResponse};
use super::response::{write_json_response, ServiceError};
use super::router::OperationRouter;

/// Classifies LIZMAP requests and runs them through the operation pipeline.
pub struct LizmapService {
    classifier: OperationService,
    pipeline: OperationPipeline,
}

impl LizmapService {
    #[must_use]
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let mut router = OperationRouter::new();
        router.register(
            service_names::SERVER_SETTINGS,
            Arc::new(ServerSettingsService::new(config)),
        );
        router.register(
            service_names::SUBSET_STRING,
            Arc::new(SubsetStringService::new()),
        );

        Self {
            classifier: OperationService::new(),
            pipeline: build_operation_pipeline(router),
        }
    }

    /// Runs a request and writes its JSON response.
    ///
    /// Every failure becomes a [`ServiceError`] body; this never returns an
    /// error to the caller.
    pub async fn execute(&self, request: LizmapRequest) -> Response {
        match self.dispatch(request).await {
            Ok(body) => write_json_response(&body, StatusCode::OK),
            Err(e) => {
                debug!(status = e.status, message = %e.message, "LIZMAP request rejected");
                e.into_response()
            }
        }
    }

    /// Runs a request and returns the JSON body of a successful response.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] carrying the status and body to answer with.
    pub async fn dispatch(&self, request: LizmapRequest) -> Result<Value, ServiceError> {
        let op = self.classifier.classify(request)?;
        let OperationResponse::Json(body) = self.pipeline.clone().oneshot(op).await?;
        Ok(body)
    }
}

impl std::fmt::Debug for LizmapService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LizmapService").finish_non_exhaustive()
    }
}
