//! Per-request correlation context.
//!
//! A `RequestContext` is created when a request enters the middleware, lives
//! in the request extensions while the handler runs, and is dropped once its
//! telemetry has been submitted. Handler code records dependencies and
//! exceptions into it; nothing is submitted until the request completes.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderName, Request, StatusCode},
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::telemetry::{
    ExceptionTelemetry, RemoteDependencyTelemetry, RequestTelemetry, SeverityLevel,
};

/// Default header carrying the caller's transaction id.
pub const TRANSACTION_ID_HEADER: &str = "transactionId";

/// `TRANSACTION_ID_HEADER` as a header name. Header names are
/// case-insensitive and stored lowercase.
pub fn transaction_id_header() -> HeaderName {
    HeaderName::from_static("transactionid")
}

/// The parts of an inbound request the context is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    /// Value of the correlation header, if present and non-empty.
    pub transaction_id: Option<String>,
    pub path: String,
    pub method: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
}

impl RequestInfo {
    /// Extract request info, reading the transaction id from `header`.
    pub fn from_request<B>(request: &Request<B>, header: &HeaderName) -> Self {
        let transaction_id = request
            .headers()
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Self {
            transaction_id,
            path: request.uri().path().to_string(),
            method: request.method().to_string(),
            query: request.uri().query().map(str::to_string),
        }
    }
}

/// Handle to a dependency recorded on a context.
#[derive(Debug, Clone)]
pub struct DependencyHandle {
    index: usize,
    id: String,
    started: Instant,
}

impl DependencyHandle {
    /// Unique id of the dependency record.
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug)]
struct ContextState {
    request_trace: RequestTelemetry,
    dependencies: Vec<RemoteDependencyTelemetry>,
    exceptions: Vec<ExceptionTelemetry>,
    last_error: Option<String>,
}

#[derive(Debug)]
struct ContextInner {
    transaction_id: String,
    path: String,
    method: String,
    query: Option<String>,
    instrumentation_key: String,
    start_time: Instant,
    state: Mutex<ContextState>,
}

/// Correlation context for a single request.
///
/// Cloning yields another handle to the same context; the middleware and the
/// handler both hold one while the request is in flight.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

impl RequestContext {
    /// Create a context for `info`. A missing transaction id becomes the
    /// empty string; callers that want a generated id resolve it beforehand.
    pub fn new(info: RequestInfo, instrumentation_key: impl Into<String>) -> Self {
        let request_trace = RequestTelemetry::new(&info.method, &info.path);
        Self {
            inner: Arc::new(ContextInner {
                transaction_id: info.transaction_id.unwrap_or_default(),
                path: info.path,
                method: info.method,
                query: info.query,
                instrumentation_key: instrumentation_key.into(),
                start_time: Instant::now(),
                state: Mutex::new(ContextState {
                    request_trace,
                    dependencies: Vec::new(),
                    exceptions: Vec::new(),
                    last_error: None,
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transaction_id(&self) -> &str {
        &self.inner.transaction_id
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    pub fn query(&self) -> Option<&str> {
        self.inner.query.as_deref()
    }

    pub fn instrumentation_key(&self) -> &str {
        &self.inner.instrumentation_key
    }

    pub fn start_time(&self) -> Instant {
        self.inner.start_time
    }

    /// Snapshot of the request trace as it stands.
    pub fn request_trace(&self) -> RequestTelemetry {
        self.state().request_trace.clone()
    }

    pub fn dependencies(&self) -> Vec<RemoteDependencyTelemetry> {
        self.state().dependencies.clone()
    }

    pub fn exceptions(&self) -> Vec<ExceptionTelemetry> {
        self.state().exceptions.clone()
    }

    /// The most recently attached error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    /// Start recording an outbound call.
    pub fn add_dependency(&self, name: &str, dependency_type: &str, target: &str) -> DependencyHandle {
        let dependency = RemoteDependencyTelemetry::new(name, dependency_type, target);
        let id = dependency.id.clone();
        let mut state = self.state();
        state.dependencies.push(dependency);
        DependencyHandle {
            index: state.dependencies.len() - 1,
            id,
            started: Instant::now(),
        }
    }

    /// Record completion of a dependency started with `add_dependency`.
    ///
    /// Calling this twice overwrites the duration with the later measurement.
    pub fn complete_dependency(&self, handle: &DependencyHandle, success: bool) {
        let mut state = self.state();
        match state.dependencies.get_mut(handle.index) {
            Some(dep) if dep.id == handle.id => {
                dep.duration = handle.started.elapsed();
                dep.success = success;
            }
            _ => tracing::debug!(
                transaction_id = %self.inner.transaction_id,
                dependency_id = %handle.id,
                "Dependency handle does not belong to this context"
            ),
        }
    }

    /// Record a failure with `Critical` severity.
    pub fn log_failure<E: fmt::Display + ?Sized>(&self, error: &E) {
        self.push_exception(error.to_string(), SeverityLevel::Critical);
    }

    /// Record a failure with `Warning` severity.
    pub fn log_warning<E: fmt::Display + ?Sized>(&self, error: &E) {
        self.push_exception(error.to_string(), SeverityLevel::Warning);
    }

    fn push_exception(&self, message: String, severity: SeverityLevel) {
        self.state()
            .exceptions
            .push(ExceptionTelemetry::new(message, severity));
    }

    /// Attach the error explaining a failed response. The last one wins.
    pub fn attach_error<E: fmt::Display + ?Sized>(&self, error: &E) {
        self.state().last_error = Some(error.to_string());
    }

    /// Log at info level, tagged with the transaction id.
    pub fn info(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        tracing::info!(
            transaction_id = %self.inner.transaction_id,
            fields = %Fields(fields),
            "{}",
            message
        );
    }

    /// Log at debug level, tagged with the transaction id.
    pub fn debug(&self, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        tracing::debug!(
            transaction_id = %self.inner.transaction_id,
            fields = %Fields(fields),
            "{}",
            message
        );
    }

    pub(crate) fn update_trace(&self, f: impl FnOnce(&mut RequestTelemetry)) {
        f(&mut self.state().request_trace);
    }

    /// Apply `f` to the trace and return snapshots of every record.
    pub(crate) fn finalize(
        &self,
        f: impl FnOnce(&mut RequestTelemetry),
    ) -> (
        RequestTelemetry,
        Vec<RemoteDependencyTelemetry>,
        Vec<ExceptionTelemetry>,
    ) {
        let mut state = self.state();
        f(&mut state.request_trace);
        (
            state.request_trace.clone(),
            state.dependencies.clone(),
            state.exceptions.clone(),
        )
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Request insights middleware is not installed",
            ))
    }
}

struct Fields<'a>(&'a [(&'a str, &'a dyn fmt::Display)]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::types::PROPERTY_ERROR_MESSAGE;
    use std::time::Duration;

    fn info(tid: Option<&str>) -> RequestInfo {
        RequestInfo {
            transaction_id: tid.map(str::to_string),
            path: "/orders".into(),
            method: "GET".into(),
            query: None,
        }
    }

    #[test]
    fn test_request_info_reads_header_and_query() {
        let request = Request::builder()
            .method("POST")
            .uri("/orders?limit=5&page=2")
            .header(TRANSACTION_ID_HEADER, "abc123")
            .body(())
            .unwrap();

        let info = RequestInfo::from_request(&request, &transaction_id_header());
        assert_eq!(info.transaction_id.as_deref(), Some("abc123"));
        assert_eq!(info.path, "/orders");
        assert_eq!(info.method, "POST");
        assert_eq!(info.query.as_deref(), Some("limit=5&page=2"));
    }

    #[test]
    fn test_request_info_treats_blank_header_as_missing() {
        let request = Request::builder()
            .uri("/")
            .header(TRANSACTION_ID_HEADER, "  ")
            .body(())
            .unwrap();

        let info = RequestInfo::from_request(&request, &transaction_id_header());
        assert_eq!(info.transaction_id, None);
        assert_eq!(info.query, None);
    }

    #[test]
    fn test_new_context_without_id_is_empty() {
        let ctx = RequestContext::new(info(None), "ikey");
        assert_eq!(ctx.transaction_id(), "");
        assert_eq!(ctx.instrumentation_key(), "ikey");
        assert_eq!(ctx.request_trace().name, "GET /orders");
        assert!(ctx.dependencies().is_empty());
        assert!(ctx.exceptions().is_empty());
    }

    #[test]
    fn test_complete_dependency_sets_duration_and_success() {
        let ctx = RequestContext::new(info(Some("abc123")), "ikey");
        let handle = ctx.add_dependency("db", "sql", "orders-db");
        std::thread::sleep(Duration::from_millis(2));
        ctx.complete_dependency(&handle, true);

        let deps = ctx.dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].id, handle.id());
        assert_eq!(deps[0].name, "db");
        assert_eq!(deps[0].dependency_type, "sql");
        assert_eq!(deps[0].target, "orders-db");
        assert!(deps[0].success);
        assert!(deps[0].duration >= Duration::from_millis(2));
    }

    #[test]
    fn test_complete_dependency_twice_overwrites() {
        let ctx = RequestContext::new(info(Some("abc123")), "ikey");
        let handle = ctx.add_dependency("cache", "redis", "cache-1");
        ctx.complete_dependency(&handle, true);
        let first = ctx.dependencies()[0].duration;
        std::thread::sleep(Duration::from_millis(2));
        ctx.complete_dependency(&handle, false);

        let dep = &ctx.dependencies()[0];
        assert!(!dep.success);
        assert!(dep.duration > first);
    }

    #[test]
    fn test_foreign_handle_is_ignored() {
        let a = RequestContext::new(info(Some("a")), "ikey");
        let b = RequestContext::new(info(Some("b")), "ikey");
        let handle = a.add_dependency("db", "sql", "x");
        b.add_dependency("db", "sql", "y");

        b.complete_dependency(&handle, true);
        assert!(!b.dependencies()[0].success);
        assert!(!a.dependencies()[0].success);
    }

    #[test]
    fn test_log_failure_and_warning_severities() {
        let ctx = RequestContext::new(info(Some("abc123")), "ikey");
        ctx.log_failure("db down");
        ctx.log_warning(&std::io::Error::new(std::io::ErrorKind::Other, "slow"));

        let exceptions = ctx.exceptions();
        assert_eq!(exceptions.len(), 2);
        assert_eq!(exceptions[0].severity, SeverityLevel::Critical);
        assert_eq!(exceptions[0].message, "db down");
        assert_eq!(exceptions[1].severity, SeverityLevel::Warning);
        assert_eq!(
            exceptions[1].properties.get(PROPERTY_ERROR_MESSAGE).map(String::as_str),
            Some("slow")
        );
    }

    #[test]
    fn test_attach_error_keeps_last() {
        let ctx = RequestContext::new(info(Some("abc123")), "ikey");
        assert_eq!(ctx.last_error(), None);
        ctx.attach_error("first");
        ctx.attach_error("timeout");
        assert_eq!(ctx.last_error().as_deref(), Some("timeout"));
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = RequestContext::new(info(Some("abc123")), "ikey");
        let handler_view = ctx.clone();
        handler_view.add_dependency("svc", "http", "billing");
        assert_eq!(ctx.dependencies().len(), 1);
    }

    #[test]
    fn test_fields_render_as_key_values() {
        let count = 3;
        let fields: [(&str, &dyn fmt::Display); 2] = [("count", &count), ("table", &"orders")];
        assert_eq!(Fields(&fields).to_string(), "count=3 table=orders");
    }

    #[test]
    fn test_header_name_matches_constant() {
        let parsed = HeaderName::from_bytes(TRANSACTION_ID_HEADER.as_bytes()).unwrap();
        assert_eq!(transaction_id_header(), parsed);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_info_and_debug_carry_transaction_id() {
        let ctx = RequestContext::new(info(Some("abc123")), "ikey");
        let output = capture(|| {
            ctx.info("Listed orders", &[("count", &3)]);
            ctx.debug("Looked up order", &[("order_id", &42)]);
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2, "unexpected log output: {}", output);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("transaction_id=abc123"));
        assert!(lines[0].contains("fields=count=3"));
        assert!(lines[0].contains("Listed orders"));
        assert!(lines[1].contains("DEBUG"));
        assert!(lines[1].contains("transaction_id=abc123"));
        assert!(lines[1].contains("order_id=42"));
    }
}
