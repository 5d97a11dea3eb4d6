// Errors surfaced by a client stream

use prost::Message;
use prost_types::Any;
use std::collections::HashMap;
use thiserror::Error;
use tonic::Code;
use tonic::metadata::MetadataMap;

use crate::rpc::{self, ERROR_INFO_TYPE_URL, ErrorInfo};
use crate::status::CallStatus;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Message used when a call ends with OK but produced no response
pub const MISSING_RESPONSE_MESSAGE: &str = "missing response message";

/// A call that finished with a non-OK status
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    code: Code,
    status: &'static str,
    message: String,
    metadata: MetadataMap,
    details: Vec<Any>,
    error_info: Option<ErrorInfo>,
}

impl ApiError {
    /// Translate a final call status into an error
    ///
    /// Details are decoded from the `google.rpc.Status` payload when present. A
    /// payload that fails to decode is ignored and the error carries no details.
    pub fn from_status(status: CallStatus) -> Self {
        let details = if status.details.is_empty() {
            Vec::new()
        } else {
            match rpc::Status::decode(status.details.clone()) {
                Ok(decoded) => decoded.details,
                Err(e) => {
                    tracing::debug!("Ignoring undecodable status details: {}", e);
                    Vec::new()
                }
            }
        };

        let error_info = details
            .iter()
            .find(|any| any.type_url == ERROR_INFO_TYPE_URL)
            .and_then(|any| ErrorInfo::decode(any.value.as_slice()).ok());

        Self {
            code: status.code,
            status: status_name(status.code),
            message: status.message,
            metadata: status.metadata,
            details,
            error_info,
        }
    }

    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self::from_status(CallStatus::new(code, message))
    }

    pub fn code(&self) -> Code {
        self.code
    }

    /// Canonical status name, e.g. `INTERNAL`
    pub fn status(&self) -> &'static str {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn details(&self) -> &[Any] {
        &self.details
    }

    pub fn reason(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.reason.as_str())
    }

    pub fn domain(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.domain.as_str())
    }

    pub fn error_info_metadata(&self) -> Option<&HashMap<String, String>> {
        self.error_info.as_ref().map(|info| &info.metadata)
    }
}

impl From<tonic::Status> for ApiError {
    fn from(status: tonic::Status) -> Self {
        Self::from_status(CallStatus::from(status))
    }
}

/// Failure returned by `ClientStream::read_response`
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The call succeeded but the response payload was rejected by the decoder
    #[error("failed to decode response: {0}")]
    Decode(#[source] BoxError),
}

impl Error {
    pub fn code(&self) -> Code {
        match self {
            Self::Api(e) => e.code(),
            Self::Decode(_) => Code::Internal,
        }
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            Self::Decode(_) => None,
        }
    }
}

/// Get the canonical status name for a gRPC code
pub fn status_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}
