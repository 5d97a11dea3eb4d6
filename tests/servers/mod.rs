// Test gRPC server for integration testing

use std::convert::Infallible;
use std::net::SocketAddr;
use std::task::{Context, Poll};

use grpc_client_stream::rpc::{self, ErrorInfo};
use prost::Message;
use prost::bytes::Bytes;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::body::Body;
use tonic::codec::CompressionEncoding;
use tonic::codegen::{BoxFuture, Service};
use tonic::server::{ClientStreamingService, Grpc, NamedService};
use tonic::transport::Server;
use tonic::{Code, Request, Response, Status, Streaming};

pub const COLLECT_PATH: &str = "/google.rpc.Echo/Collect";
pub const REJECTED_REASON: &str = "COLLECT_REJECTED";
pub const REJECTED_DOMAIN: &str = "echo.test";

/// Joins the messages of every streamed `google.rpc.Status`
///
/// The response `code` is the number of messages received. A request with
/// message `fail` aborts the call with an `Internal` status carrying an
/// `ErrorInfo` detail. An `x-team` metadata value prefixes the joined text.
#[derive(Debug, Clone, Default)]
pub struct EchoServer;

impl NamedService for EchoServer {
    const NAME: &'static str = "google.rpc.Echo";
}

struct CollectSvc;

impl ClientStreamingService<rpc::Status> for CollectSvc {
    type Response = rpc::Status;
    type Future = BoxFuture<Response<rpc::Status>, Status>;

    fn call(&mut self, request: Request<Streaming<rpc::Status>>) -> Self::Future {
        Box::pin(collect(request))
    }
}

async fn collect(request: Request<Streaming<rpc::Status>>) -> Result<Response<rpc::Status>, Status> {
    let team = request
        .metadata()
        .get("x-team")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut stream = request.into_inner();
    let mut messages = Vec::new();
    while let Some(item) = stream.message().await? {
        if item.message == "fail" {
            return Err(rejected());
        }
        messages.push(item.message);
    }

    let joined = messages.join(" ");
    let message = match team {
        Some(team) => format!("{}: {}", team, joined),
        None => joined,
    };

    Ok(Response::new(rpc::Status {
        code: messages.len() as i32,
        message,
        details: Vec::new(),
    }))
}

fn rejected() -> Status {
    let info = ErrorInfo {
        reason: REJECTED_REASON.to_string(),
        domain: REJECTED_DOMAIN.to_string(),
        ..Default::default()
    };
    let mut details = rpc::Status::new(Code::Internal, "collect failed");
    details.details.push(info.to_any());

    Status::with_details(
        Code::Internal,
        "collect failed",
        Bytes::from(details.encode_to_vec()),
    )
}

impl Service<http::Request<Body>> for EchoServer {
    type Response = http::Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Body>) -> Self::Future {
        match req.uri().path() {
            COLLECT_PATH => Box::pin(async move {
                let codec = tonic_prost::ProstCodec::<rpc::Status, rpc::Status>::default();
                let mut grpc = Grpc::new(codec)
                    .accept_compressed(CompressionEncoding::Gzip)
                    .send_compressed(CompressionEncoding::Gzip);
                Ok(grpc.client_streaming(CollectSvc, req).await)
            }),
            _ => Box::pin(async move { Ok(Status::unimplemented("unknown method").into_http()) }),
        }
    }
}

/// Running test server handle
pub struct TestServerHandle {
    pub handle: JoinHandle<Result<(), tonic::transport::Error>>,
    pub address: SocketAddr,
}

impl TestServerHandle {
    pub fn uri(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Stop the test server
    pub fn stop(self) {
        self.handle.abort();
    }
}

/// Start the echo server on an ephemeral local port
pub async fn start_echo_server() -> TestServerHandle {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let address = listener.local_addr().expect("failed to read local address");

    let handle = tokio::spawn(
        Server::builder()
            .add_service(EchoServer)
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );

    TestServerHandle { handle, address }
}
