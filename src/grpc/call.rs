use http::uri::PathAndQuery;
use prost::bytes::Bytes;
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::CompressionEncoding;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tonic::transport::Channel;
use tonic::{Code, Request, Response, Status};

use super::codec::StreamCodec;
use crate::config::{CallConfig, CompressionMode};
use crate::error::ApiError;
use crate::status::CallStatus;
use crate::stream::ClientStreamingCall;

/// Client-streaming call running over a tonic channel
///
/// Requests flow through a bounded channel into a spawned
/// `Grpc::client_streaming` task. Dropping the handle before the response is
/// read cancels the call.
pub struct GrpcClientStreamingCall<Req> {
    path: PathAndQuery,
    sender: Option<mpsc::Sender<Req>>,
    response: Option<JoinHandle<Result<Response<Bytes>, Status>>>,
    status: Option<CallStatus>,
}

impl<Req> GrpcClientStreamingCall<Req>
where
    Req: prost::Message + 'static,
{
    /// Open a call to `path` (`/package.Service/Method`)
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(channel: Channel, path: &str, config: &CallConfig) -> Result<Self, ApiError> {
        let path = parse_method_path(path)?;

        let (sender, receiver) = mpsc::channel(config.buffer.max(1));
        let mut request = Request::new(ReceiverStream::new(receiver));
        insert_request_metadata(request.metadata_mut(), &config.metadata);
        if let Some(timeout) = config.timeout() {
            request.set_timeout(timeout);
        }

        let mut client = tonic::client::Grpc::new(channel);
        if config.compression == CompressionMode::Gzip {
            client = client.send_compressed(CompressionEncoding::Gzip);
            client = client.accept_compressed(CompressionEncoding::Gzip);
        }

        tracing::debug!("Starting client streaming call to {}", path);
        let call_path = path.clone();
        let response = tokio::spawn(async move {
            if let Err(e) = client.ready().await {
                tracing::warn!("Client readiness check failed: {}", e);
                return Err(Status::unavailable(format!("client not ready: {}", e)));
            }
            client
                .client_streaming(request, call_path, StreamCodec::<Req>::default())
                .await
        });

        Ok(Self {
            path,
            sender: Some(sender),
            response: Some(response),
            status: None,
        })
    }
}

impl<Req> ClientStreamingCall for GrpcClientStreamingCall<Req>
where
    Req: prost::Message + 'static,
{
    type Request = Req;
    type Response = Bytes;

    async fn write(&mut self, request: Req) {
        let Some(sender) = self.sender.as_ref() else {
            tracing::warn!("Dropping request written after {} was closed", self.path);
            return;
        };
        if sender.send(request).await.is_err() {
            tracing::debug!("Call to {} already finished, request dropped", self.path);
        }
    }

    async fn close_write_and_read_response(&mut self) -> Option<Bytes> {
        self.sender.take();
        let handle = self.response.take()?;

        let (raw, status) = match handle.await {
            Ok(Ok(response)) => {
                let (metadata, body, _) = response.into_parts();
                (Some(body), CallStatus::ok().with_metadata(metadata))
            }
            Ok(Err(status)) => {
                tracing::debug!("Call to {} failed: {}", self.path, status);
                (None, CallStatus::from(status))
            }
            Err(e) => {
                tracing::warn!("Call task for {} failed: {}", self.path, e);
                (None, CallStatus::new(Code::Internal, format!("call task failed: {}", e)))
            }
        };

        self.status = Some(status);
        raw
    }

    fn status(&mut self) -> CallStatus {
        self.status.take().unwrap_or_else(|| {
            CallStatus::new(
                Code::Unknown,
                "status requested before the write side was closed",
            )
        })
    }

    fn rpc_name(&self) -> Option<&str> {
        Some(self.path.path().trim_start_matches('/'))
    }
}

impl<Req> Drop for GrpcClientStreamingCall<Req> {
    fn drop(&mut self) {
        if let Some(handle) = self.response.take() {
            handle.abort();
        }
    }
}

fn parse_method_path(path: &str) -> Result<PathAndQuery, ApiError> {
    let invalid = |reason: &str| {
        ApiError::new(
            Code::InvalidArgument,
            format!("invalid method path {:?}: {}", path, reason),
        )
    };

    let Some(rest) = path.strip_prefix('/') else {
        return Err(invalid("must start with '/'"));
    };
    match rest.split_once('/') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => {}
        _ => return Err(invalid("expected /package.Service/Method")),
    }

    PathAndQuery::from_str(path).map_err(|e| invalid(&e.to_string()))
}

fn insert_request_metadata(meta: &mut MetadataMap, custom_metadata: &HashMap<String, String>) {
    for (k, v) in custom_metadata {
        let normalized_key = k.to_ascii_lowercase();
        match (
            MetadataKey::from_str(&normalized_key),
            MetadataValue::from_str(v),
        ) {
            (Ok(key), Ok(val)) => {
                meta.insert(key, val);
            }
            _ => tracing::warn!("Skipping invalid metadata entry: {}", k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_path() {
        let path = parse_method_path("/google.rpc.Echo/Collect").unwrap();
        assert_eq!(path.path(), "/google.rpc.Echo/Collect");

        for bad in ["google.rpc.Echo/Collect", "/Collect", "//Collect", "/svc/"] {
            let err = parse_method_path(bad).unwrap_err();
            assert_eq!(err.code(), Code::InvalidArgument, "path {:?}", bad);
        }
    }

    #[test]
    fn test_insert_request_metadata_skips_invalid_entries() {
        let mut meta = MetadataMap::new();
        let custom = HashMap::from([
            ("X-Team".to_string(), "storage".to_string()),
            ("bad key".to_string(), "value".to_string()),
        ]);

        insert_request_metadata(&mut meta, &custom);

        assert_eq!(meta.len(), 1);
        assert_eq!(meta.get("x-team").unwrap().to_str().unwrap(), "storage");
    }

    #[tokio::test]
    async fn test_status_before_close_is_unknown() {
        let channel = Channel::from_static("http://127.0.0.1:1").connect_lazy();
        let mut call = GrpcClientStreamingCall::<crate::rpc::Status>::start(
            channel,
            "/google.rpc.Echo/Collect",
            &CallConfig::default(),
        )
        .unwrap();

        assert_eq!(call.rpc_name(), Some("google.rpc.Echo/Collect"));
        assert_eq!(call.status().code, Code::Unknown);
    }

    #[tokio::test]
    async fn test_invalid_path_is_rejected_before_spawning() {
        let channel = Channel::from_static("http://127.0.0.1:1").connect_lazy();
        let err = GrpcClientStreamingCall::<crate::rpc::Status>::start(
            channel,
            "Collect",
            &CallConfig::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.code(), Code::InvalidArgument);
    }
}
