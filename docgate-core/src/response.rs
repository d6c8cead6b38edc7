//! Results handed back across the request boundary.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{DocumentStoreError, DocumentStoreResult, ErrorKind};

/// Outcome of a request: data or a fault, told apart by the `kind` tag rather than by a
/// transport status.
///
/// Serializes as `{ "kind": "data", "result": ... }` or
/// `{ "kind": "fault", "code": "not_found", "message": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiResult {
    /// The request succeeded.
    Data {
        /// Payload.
        result: Value,
    },
    /// The request failed.
    Fault {
        /// What kind of failure.
        code: ErrorKind,
        /// Human-readable description.
        message: String,
    },
}

impl ApiResult {
    /// Wraps a successful payload.
    pub fn data(result: Value) -> Self {
        ApiResult::Data { result }
    }

    /// Wraps an error, logging it at a level that matches its kind.
    pub fn fault(err: &DocumentStoreError) -> Self {
        let code = err.kind();
        match code {
            ErrorKind::NotFound => debug!("request fault: {}", err),
            ErrorKind::Validation => warn!("rejected request: {}", err),
            ErrorKind::Storage | ErrorKind::Audit | ErrorKind::Internal => error!("request failed: {}", err),
        }

        ApiResult::Fault {
            code,
            message: err.to_string(),
        }
    }

    /// Returns `true` for [`ApiResult::Data`].
    pub fn is_data(&self) -> bool {
        matches!(self, ApiResult::Data { .. })
    }

    /// Returns the payload of a successful result.
    pub fn result(&self) -> Option<&Value> {
        match self {
            ApiResult::Data { result } => Some(result),
            ApiResult::Fault { .. } => None,
        }
    }

    /// Returns the fault kind of a failed result.
    pub fn fault_kind(&self) -> Option<ErrorKind> {
        match self {
            ApiResult::Data { .. } => None,
            ApiResult::Fault { code, .. } => Some(*code),
        }
    }
}

impl From<DocumentStoreResult<Value>> for ApiResult {
    fn from(result: DocumentStoreResult<Value>) -> Self {
        match result {
            Ok(value) => ApiResult::data(value),
            Err(err) => ApiResult::fault(&err),
        }
    }
}
