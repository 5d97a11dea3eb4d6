// Final status of a client-streaming call

use prost::bytes::Bytes;
use tonic::Code;
use tonic::metadata::MetadataMap;

/// Status reported by a call handle once its write side is closed
#[derive(Debug, Clone)]
pub struct CallStatus {
    pub code: Code,
    pub message: String,
    pub metadata: MetadataMap,
    /// Raw `grpc-status-details-bin` payload, empty when absent
    pub details: Bytes,
}

impl CallStatus {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            metadata: MetadataMap::new(),
            details: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_details(mut self, details: impl Into<Bytes>) -> Self {
        self.details = details.into();
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

impl Default for CallStatus {
    fn default() -> Self {
        Self::ok()
    }
}

impl From<tonic::Status> for CallStatus {
    fn from(status: tonic::Status) -> Self {
        Self {
            code: status.code(),
            message: status.message().to_string(),
            details: status.details().to_vec().into(),
            metadata: status.metadata().clone(),
        }
    }
}
