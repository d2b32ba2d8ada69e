//! Request classification: converts a raw LIZMAP request into a typed `Operation`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use lizmap_core::{OwsParams, RequestContext};

use super::operation::{
    request_names, service_names, ClassifyError, Operation, OperationContext,
};
use crate::storage::LoadedProject;

/// Name of the parameter selecting the LIZMAP operation.
pub const REQUEST_PARAM: &str = "REQUEST";

/// A LIZMAP request as received by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct LizmapRequest {
    pub params: OwsParams,
    /// Raw POST body, if any.
    pub body: Option<Bytes>,
    pub request: RequestContext,
    pub project: Option<Arc<LoadedProject>>,
}

/// Classifies incoming requests into typed `Operation` variants, giving
/// each one a unique call ID.
#[derive(Debug)]
pub struct OperationService {
    call_id_counter: AtomicU64,
}

impl OperationService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            call_id_counter: AtomicU64::new(1),
        }
    }

    fn next_call_id(&self) -> u64 {
        self.call_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Classify a request by its `REQUEST` parameter (case-insensitive).
    ///
    /// # Errors
    ///
    /// - `ClassifyError::InvalidBody` when a body is present and is not UTF-8;
    ///   checked before anything else
    /// - `ClassifyError::UnknownRequest` for a missing or unsupported `REQUEST`
    pub fn classify(&self, req: LizmapRequest) -> Result<Operation, ClassifyError> {
        let name = req
            .params
            .get(REQUEST_PARAM)
            .unwrap_or_default()
            .to_uppercase();

        if let Some(body) = &req.body {
            if std::str::from_utf8(body).is_err() {
                return Err(ClassifyError::InvalidBody { request: name });
            }
        }

        let service_name = match name.as_str() {
            request_names::GET_SERVER_SETTINGS => service_names::SERVER_SETTINGS,
            request_names::GET_SUBSET_STRING => service_names::SUBSET_STRING,
            _ => return Err(ClassifyError::UnknownRequest { found: name }),
        };

        let ctx = OperationContext {
            call_id: self.next_call_id(),
            service_name,
            request: req.request,
            params: req.params,
            project: req.project,
        };

        Ok(if service_name == service_names::SERVER_SETTINGS {
            Operation::GetServerSettings { ctx }
        } else {
            Operation::GetSubsetString { ctx }
        })
    }
}

impl Default for OperationService {
    fn default() -> Self {
        Self::new()
    }
}
