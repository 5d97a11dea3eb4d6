// Structured debug logging for client streams

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Tag carried by every event emitted from a client stream
pub const STREAM_KIND: &str = "client_streaming";

/// Target used by `TracingLogger`
pub const RPC_LOG_TARGET: &str = "grpc_client_stream::rpc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
}

/// One debug event for a write or for the terminal read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcLogEvent {
    pub timestamp: String,
    pub kind: &'static str,
    pub direction: Direction,
    pub process_id: u32,
    pub request_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl RpcLogEvent {
    pub fn new(direction: Direction, request_id: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind: STREAM_KIND,
            direction,
            process_id: std::process::id(),
            request_id,
            rpc_name: None,
            payload: None,
            status: None,
            latency_ms: None,
        }
    }
}

/// Sink for stream debug events
pub trait RpcLogger: Send + Sync {
    /// Streams skip building events when this returns false
    fn enabled(&self) -> bool {
        true
    }

    fn debug(&self, event: &RpcLogEvent);
}

/// Logger that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl RpcLogger for NoopLogger {
    fn enabled(&self) -> bool {
        false
    }

    fn debug(&self, _event: &RpcLogEvent) {}
}

/// Forwards events to `tracing` as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RpcLogger for TracingLogger {
    fn enabled(&self) -> bool {
        tracing::enabled!(target: RPC_LOG_TARGET, tracing::Level::DEBUG)
    }

    fn debug(&self, event: &RpcLogEvent) {
        match serde_json::to_string(event) {
            Ok(json) => tracing::debug!(target: RPC_LOG_TARGET, "{}", json),
            Err(e) => tracing::warn!("Failed to serialize rpc log event: {}", e),
        }
    }
}

/// Install the stream formatter as the global subscriber
///
/// `RUST_LOG` wins over `filter`. Returns false if a subscriber was already set.
pub fn init_tracing(filter: &str) -> bool {
    tracing_subscriber::fmt()
        .event_format(CustomFormatter)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .try_init()
        .is_ok()
}

pub struct CustomFormatter;

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let timestamp = Local::now().format("%H:%M:%S");

        let (emoji, level_str) = match *metadata.level() {
            tracing::Level::TRACE => ("🔬", "TRACE"),
            tracing::Level::DEBUG => ("🐛", "DEBUG"),
            tracing::Level::INFO => ("ℹ️ ", "INFO"),
            tracing::Level::WARN => ("⚠️ ", "WARN"),
            tracing::Level::ERROR => ("❌", "ERROR"),
        };

        write!(writer, "{} {} [{}] {}: ", emoji, level_str, timestamp, metadata.target())?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_event_serialization_skips_empty_fields() {
        let mut event = RpcLogEvent::new(Direction::Request, 42);
        event.payload = Some("Status { code: 0 }".to_string());

        let value: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "client_streaming");
        assert_eq!(value["direction"], "request");
        assert_eq!(value["request_id"], 42);
        assert_eq!(value["payload"], "Status { code: 0 }");
        assert!(value.get("status").is_none());
        assert!(value.get("latency_ms").is_none());
        assert!(value.get("rpc_name").is_none());
    }

    #[test]
    fn test_response_event_carries_status() {
        let mut event = RpcLogEvent::new(Direction::Response, 7);
        event.status = Some(13);
        event.latency_ms = Some(5);

        let value: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["direction"], "response");
        assert_eq!(value["status"], 13);
        assert_eq!(value["latency_ms"], 5);
        assert_eq!(value["process_id"], std::process::id());
    }

    #[test]
    fn test_noop_logger_is_disabled() {
        assert!(!NoopLogger.enabled());
    }

    #[test]
    fn test_init_tracing_only_installs_once() {
        let _ = init_tracing("grpc_client_stream=debug");
        assert!(!init_tracing("grpc_client_stream=debug"));

        TracingLogger.debug(&RpcLogEvent::new(Direction::Request, 1));
    }
}
