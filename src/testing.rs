// In-memory call handle for exercising client streams without a transport

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::status::CallStatus;
use crate::stream::ClientStreamingCall;

/// Primitive invoked on a [`MockClientStreamingCall`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOp {
    Write,
    CloseWrite,
    Status,
}

struct MockState<Req, Resp> {
    received: Vec<Req>,
    response: Option<Resp>,
    status: CallStatus,
    operations: Vec<CallOp>,
}

/// Recording call handle with a canned response and status
///
/// Clones share state, so a clone kept by the test still observes the calls
/// made through a stream that took ownership of the original.
pub struct MockClientStreamingCall<Req, Resp> {
    state: Arc<Mutex<MockState<Req, Resp>>>,
    rpc_name: Option<String>,
}

impl<Req, Resp> MockClientStreamingCall<Req, Resp> {
    /// Call that answers `response` with an OK status
    pub fn new(response: Resp) -> Self {
        Self::build(Some(response))
    }

    /// Call that closes with an OK status but no response message
    pub fn without_response() -> Self {
        Self::build(None)
    }

    fn build(response: Option<Resp>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                received: Vec::new(),
                response,
                status: CallStatus::ok(),
                operations: Vec::new(),
            })),
            rpc_name: None,
        }
    }

    pub fn with_status(self, status: CallStatus) -> Self {
        self.lock().status = status;
        self
    }

    pub fn with_rpc_name(mut self, name: impl Into<String>) -> Self {
        self.rpc_name = Some(name.into());
        self
    }

    /// Take the requests written so far
    pub fn pop_received_calls(&self) -> Vec<Req> {
        std::mem::take(&mut self.lock().received)
    }

    pub fn operations(&self) -> Vec<CallOp> {
        self.lock().operations.clone()
    }

    pub fn shares_state_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn lock(&self) -> MutexGuard<'_, MockState<Req, Resp>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<Req, Resp> Clone for MockClientStreamingCall<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            rpc_name: self.rpc_name.clone(),
        }
    }
}

impl<Req, Resp> ClientStreamingCall for MockClientStreamingCall<Req, Resp>
where
    Req: Send,
    Resp: Send,
{
    type Request = Req;
    type Response = Resp;

    async fn write(&mut self, request: Req) {
        let mut state = self.lock();
        state.operations.push(CallOp::Write);
        state.received.push(request);
    }

    async fn close_write_and_read_response(&mut self) -> Option<Resp> {
        let mut state = self.lock();
        state.operations.push(CallOp::CloseWrite);
        state.response.take()
    }

    fn status(&mut self) -> CallStatus {
        let mut state = self.lock();
        state.operations.push(CallOp::Status);
        state.status.clone()
    }

    fn rpc_name(&self) -> Option<&str> {
        self.rpc_name.as_deref()
    }
}
