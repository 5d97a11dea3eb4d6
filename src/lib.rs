//! Write-many, read-once helper for gRPC client-streaming calls.
//!
//! [`ClientStream`] wraps a [`ClientStreamingCall`] handle: callers write any
//! number of requests, then read exactly one response. The final call status is
//! fetched after the write side closes and a non-OK status is reported as an
//! [`ApiError`].

pub mod config;
pub mod error;
pub mod grpc;
pub mod logging;
pub mod rpc;
pub mod status;
pub mod stream;
pub mod testing;

pub use error::{ApiError, BoxError, Error};
pub use logging::{NoopLogger, RpcLogEvent, RpcLogger, TracingLogger};
pub use status::CallStatus;
pub use stream::{ClientStream, ClientStreamingCall};
