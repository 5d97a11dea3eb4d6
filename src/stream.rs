//! Client-streaming call wrapper.
//!
//! A [`ClientStream`] owns one call handle and sequences it as
//! `write* -> close write side -> read raw result -> fetch status`. The final
//! status decides the outcome: a non-OK status always becomes an
//! [`ApiError`], even when the handle also produced a raw result.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use prost::bytes::Bytes;
use tonic::Code;

use crate::error::{ApiError, BoxError, Error, MISSING_RESPONSE_MESSAGE};
use crate::logging::{Direction, NoopLogger, RpcLogEvent, RpcLogger};
use crate::status::CallStatus;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Raw send/receive primitives of an open client-streaming call
pub trait ClientStreamingCall {
    type Request;
    type Response;

    /// Queue one request. Transport failures are reported by [`status`](Self::status).
    fn write(&mut self, request: Self::Request) -> impl Future<Output = ()> + Send;

    /// Close the write side and wait for the raw response, if any
    fn close_write_and_read_response(
        &mut self,
    ) -> impl Future<Output = Option<Self::Response>> + Send;

    /// Final status; only meaningful after the write side is closed
    fn status(&mut self) -> CallStatus;

    /// Fully qualified method name, used for logging
    fn rpc_name(&self) -> Option<&str> {
        None
    }
}

type Decoder<R, T> = Box<dyn Fn(R) -> Result<T, BoxError> + Send + Sync>;

/// Write-many, read-once wrapper around a [`ClientStreamingCall`]
///
/// Reading consumes the stream, so no write can follow it.
pub struct ClientStream<C: ClientStreamingCall, T = <C as ClientStreamingCall>::Response> {
    call: C,
    decoder: Decoder<C::Response, T>,
    logger: Arc<dyn RpcLogger>,
    request_id: u64,
    started: Instant,
}

impl<C: ClientStreamingCall> ClientStream<C> {
    /// Wrap `call`; the raw response is returned as is
    pub fn new(call: C) -> Self {
        Self {
            call,
            decoder: Box::new(|raw: C::Response| Ok::<_, BoxError>(raw)),
            logger: Arc::new(NoopLogger),
            request_id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            started: Instant::now(),
        }
    }

    /// Convert the raw response with `decoder` once the call succeeds
    pub fn decode_with<U, F>(self, decoder: F) -> ClientStream<C, U>
    where
        F: Fn(C::Response) -> Result<U, BoxError> + Send + Sync + 'static,
    {
        ClientStream {
            call: self.call,
            decoder: Box::new(decoder),
            logger: self.logger,
            request_id: self.request_id,
            started: self.started,
        }
    }
}

impl<C> ClientStream<C>
where
    C: ClientStreamingCall<Response = Bytes>,
{
    /// Decode the raw response bytes as a protobuf message
    pub fn decode_as<M>(self) -> ClientStream<C, M>
    where
        M: prost::Message + Default,
    {
        self.decode_with(|raw: Bytes| M::decode(raw).map_err(BoxError::from))
    }
}

impl<C: ClientStreamingCall, T> ClientStream<C, T> {
    pub fn with_logger(mut self, logger: Arc<dyn RpcLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn client_streaming_call(&self) -> &C {
        &self.call
    }

    pub fn into_client_streaming_call(self) -> C {
        self.call
    }
}

impl<C, T> ClientStream<C, T>
where
    C: ClientStreamingCall,
    C::Request: fmt::Debug,
    T: fmt::Debug,
{
    /// Send one request on the stream
    pub async fn write(&mut self, request: C::Request) {
        if self.logger.enabled() {
            let mut event = self.event(Direction::Request);
            event.payload = Some(format!("{:?}", request));
            self.logger.debug(&event);
        }

        self.call.write(request).await;
    }

    /// Close the write side and wait for the single response
    pub async fn read_response(mut self) -> Result<T, Error> {
        let raw = self.call.close_write_and_read_response().await;
        // Status is only final once the write side is closed.
        let status = self.call.status();
        let code = status.code;

        let result = if !status.is_ok() {
            Err(Error::Api(ApiError::from_status(status)))
        } else {
            match raw {
                Some(raw) => (self.decoder)(raw).map_err(Error::Decode),
                None => Err(Error::Api(ApiError::new(Code::Internal, MISSING_RESPONSE_MESSAGE))),
            }
        };

        if self.logger.enabled() {
            self.log_response(code, &result);
        }

        result
    }

    /// Write every request in order, then read the response
    pub async fn write_all_and_read_response<I>(mut self, requests: I) -> Result<T, Error>
    where
        I: IntoIterator<Item = C::Request>,
    {
        for request in requests {
            self.write(request).await;
        }
        self.read_response().await
    }

    fn event(&self, direction: Direction) -> RpcLogEvent {
        let mut event = RpcLogEvent::new(direction, self.request_id);
        event.rpc_name = self.call.rpc_name().map(str::to_string);
        event
    }

    fn log_response(&self, code: Code, result: &Result<T, Error>) {
        let mut event = self.event(Direction::Response);
        event.status = Some(code as i32);
        event.latency_ms = Some(self.started.elapsed().as_millis() as u64);
        event.payload = Some(match result {
            Ok(response) => format!("{:?}", response),
            Err(e) => e.to_string(),
        });
        self.logger.debug(&event);
    }
}

impl<C: ClientStreamingCall + fmt::Debug, T> fmt::Debug for ClientStream<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStream")
            .field("call", &self.call)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}
