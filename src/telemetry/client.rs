//! Telemetry client implementations.
//!
//! The crate never talks to an ingestion endpoint itself. A `TelemetryClient`
//! receives one `Envelope` per record and owns whatever happens next.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::telemetry::types::{
    Envelope, ExceptionTelemetry, RemoteDependencyTelemetry, RequestTelemetry, Telemetry,
};

/// Submission sink for telemetry records.
///
/// Implementations must be safe to call from many requests at once and must
/// not block for long; `track` has no way to report failure.
pub trait TelemetryClient: Send + Sync {
    fn track(&self, envelope: Envelope);
}

/// Emits every envelope as a structured log event.
#[derive(Debug, Clone, Default)]
pub struct LoggingClient;

impl LoggingClient {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetryClient for LoggingClient {
    fn track(&self, envelope: Envelope) {
        match serde_json::to_string(&envelope.item) {
            Ok(payload) => tracing::info!(
                target: "request_insights::telemetry",
                ikey = %envelope.instrumentation_key,
                kind = envelope.item.kind(),
                payload = %payload,
                "Telemetry tracked"
            ),
            Err(e) => tracing::warn!(
                kind = envelope.item.kind(),
                error = %e,
                "Failed to serialize telemetry, dropping"
            ),
        }
    }
}

/// Hands envelopes to an external transport task over a bounded channel.
///
/// When the transport falls behind and the channel is full, new records are
/// dropped and logged rather than queued.
#[derive(Debug, Clone)]
pub struct ChannelClient {
    tx: mpsc::Sender<Envelope>,
}

impl ChannelClient {
    /// Create a client holding at most `capacity` undelivered records, and
    /// the receiver the transport should drain.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl TelemetryClient for ChannelClient {
    fn track(&self, envelope: Envelope) {
        match self.tx.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => tracing::warn!(
                kind = envelope.item.kind(),
                "Telemetry channel full, dropping record"
            ),
            Err(TrySendError::Closed(envelope)) => tracing::warn!(
                kind = envelope.item.kind(),
                "Telemetry receiver closed, dropping record"
            ),
        }
    }
}

/// Keeps every envelope in memory. Meant for tests.
#[derive(Debug, Default)]
pub struct MemoryClient {
    tracked: Mutex<Vec<Envelope>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Envelope>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All envelopes in submission order.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn requests(&self) -> Vec<RequestTelemetry> {
        self.lock()
            .iter()
            .filter_map(|e| match &e.item {
                Telemetry::Request(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn dependencies(&self) -> Vec<RemoteDependencyTelemetry> {
        self.lock()
            .iter()
            .filter_map(|e| match &e.item {
                Telemetry::Dependency(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn exceptions(&self) -> Vec<ExceptionTelemetry> {
        self.lock()
            .iter()
            .filter_map(|e| match &e.item {
                Telemetry::Exception(x) => Some(x.clone()),
                _ => None,
            })
            .collect()
    }
}

impl TelemetryClient for MemoryClient {
    fn track(&self, envelope: Envelope) {
        self.lock().push(envelope);
    }
}
