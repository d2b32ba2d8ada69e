//! Operation types flowing through the LIZMAP service pipeline.

use std::sync::Arc;

use lizmap_core::{OwsParams, RequestContext};
use serde_json::Value;

use crate::storage::LoadedProject;

/// Domain service names used for routing.
pub mod service_names {
    pub const SERVER_SETTINGS: &str = "server_settings";
    pub const SUBSET_STRING: &str = "subset_string";
}

/// `REQUEST` values understood by the LIZMAP service, upper-cased.
pub mod request_names {
    pub const GET_SERVER_SETTINGS: &str = "GETSERVERSETTINGS";
    pub const GET_SUBSET_STRING: &str = "GETSUBSETSTRING";
}

/// Context carried with every operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub call_id: u64,
    pub service_name: &'static str,
    /// Identity of the caller.
    pub request: RequestContext,
    pub params: OwsParams,
    /// Project named by `MAP`, when one was given and loaded.
    pub project: Option<Arc<LoadedProject>>,
}

impl OperationContext {
    #[must_use]
    pub fn new(call_id: u64, service_name: &'static str) -> Self {
        Self {
            call_id,
            service_name,
            request: RequestContext::anonymous(),
            params: OwsParams::new(),
            project: None,
        }
    }
}

/// Typed LIZMAP requests.
#[derive(Debug)]
pub enum Operation {
    GetServerSettings { ctx: OperationContext },
    GetSubsetString { ctx: OperationContext },
}

impl Operation {
    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        match self {
            Self::GetServerSettings { ctx } | Self::GetSubsetString { ctx } => ctx,
        }
    }

    /// Upper-cased `REQUEST` value of this operation.
    #[must_use]
    pub fn request_name(&self) -> &'static str {
        match self {
            Self::GetServerSettings { .. } => request_names::GET_SERVER_SETTINGS,
            Self::GetSubsetString { .. } => request_names::GET_SUBSET_STRING,
        }
    }
}

/// Successful response from an operation handler.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResponse {
    /// JSON document written with status 200.
    Json(Value),
}

/// Errors returned by operation handlers.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// Caused by the request; the message is returned to the client.
    #[error("{message}")]
    BadRequest { message: String },
    #[error("unknown service: {name}")]
    UnknownService { name: String },
    #[error("wrong service for operation")]
    WrongService,
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl OperationError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }
}

/// Errors from classifying a raw request into an [`Operation`].
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The body is not valid UTF-8.
    #[error("Invalid POST DATA for '{request}'")]
    InvalidBody { request: String },
    #[error(
        "Invalid REQUEST parameter: must be one of GETSERVERSETTINGS, GETSUBSETSTRING, found '{found}'"
    )]
    UnknownRequest { found: String },
}
