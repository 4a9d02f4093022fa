//! Request tracking middleware.
//!
//! Wraps every request in a `RequestContext`, runs the inner service, and
//! reports the outcome: 2xx responses complete successfully, anything else
//! completes as a failure carrying the last attached error.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    response::{IntoResponseParts, Response, ResponseParts},
};
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

use crate::tracking::{transaction_id_header, Insights, RequestContext, RequestInfo};

/// Error explaining a failed response, carried in the response extensions.
///
/// Takes precedence over an error attached to the `RequestContext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedError(pub String);

impl AttachedError {
    pub fn new<E: fmt::Display + ?Sized>(error: &E) -> Self {
        Self(error.to_string())
    }
}

impl IntoResponseParts for AttachedError {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

/// Attach `error` to an already built response.
pub fn with_error<E: fmt::Display + ?Sized>(mut response: Response, error: &E) -> Response {
    response.extensions_mut().insert(AttachedError::new(error));
    response
}

/// Build the tracking layer for `insights`, addressing records to
/// `instrumentation_key`.
pub fn insights_tracker(
    insights: Arc<dyn Insights>,
    instrumentation_key: impl Into<String>,
) -> InsightsLayer {
    InsightsLayer::new(insights, instrumentation_key)
}

/// Layer that tracks every request passing through it.
#[derive(Clone)]
pub struct InsightsLayer {
    insights: Arc<dyn Insights>,
    instrumentation_key: Arc<str>,
    header: HeaderName,
}

impl InsightsLayer {
    pub fn new(insights: Arc<dyn Insights>, instrumentation_key: impl Into<String>) -> Self {
        Self {
            insights,
            instrumentation_key: Arc::from(instrumentation_key.into()),
            header: transaction_id_header(),
        }
    }

    /// Read the transaction id from `header` instead of `transactionId`.
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }
}

impl fmt::Debug for InsightsLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightsLayer")
            .field("instrumentation_key", &self.instrumentation_key)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for InsightsLayer {
    type Service = InsightsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InsightsService {
            inner,
            insights: self.insights.clone(),
            instrumentation_key: self.instrumentation_key.clone(),
            header: self.header.clone(),
        }
    }
}

/// Service produced by `InsightsLayer`.
#[derive(Clone)]
pub struct InsightsService<S> {
    inner: S,
    insights: Arc<dyn Insights>,
    instrumentation_key: Arc<str>,
    header: HeaderName,
}

impl<S> Service<Request<Body>> for InsightsService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let info = RequestInfo::from_request(&request, &self.header);
        let ctx = self.insights.start_request(info, &self.instrumentation_key);
        request.extensions_mut().insert(ctx.clone());

        let span = tracing::info_span!(
            "tracked_request",
            transaction_id = %ctx.transaction_id(),
            method = %ctx.method(),
            path = %ctx.path(),
        );

        let guard = CompletionGuard {
            insights: self.insights.clone(),
            ctx: ctx.clone(),
            armed: true,
        };
        let header = self.header.clone();
        // The clone that was polled ready is the one that must be called.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let mut guard = guard;
                let mut response = match inner.call(request).await {
                    Ok(response) => response,
                    Err(e) => {
                        guard.fail(STATUS_SERVICE_ERROR, "inner service error");
                        return Err(e);
                    }
                };
                guard.disarm();
                complete(&*guard.insights, &ctx, &response);

                if !ctx.transaction_id().is_empty() {
                    if let Ok(value) = HeaderValue::from_str(ctx.transaction_id()) {
                        response.headers_mut().insert(header, value);
                    }
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// Status reported when the request future is dropped before a response
/// exists, e.g. the client disconnected.
pub const STATUS_CANCELLED: &str = "499";

/// Status reported when the wrapped service returns an error.
pub const STATUS_SERVICE_ERROR: &str = "500";

/// Completes the request as failed if the future is dropped before the
/// response is seen.
struct CompletionGuard {
    insights: Arc<dyn Insights>,
    ctx: RequestContext,
    armed: bool,
}

impl CompletionGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }

    fn fail(&mut self, status_code: &str, error: &str) {
        if !self.armed {
            return;
        }
        self.armed = false;
        let error = self.ctx.last_error().unwrap_or_else(|| error.to_string());
        tracing::debug!(status = %status_code, error = %error, "Request did not complete");
        self.insights
            .complete_failed_request(&self.ctx, status_code, Some(error));
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.fail(STATUS_CANCELLED, "request cancelled");
    }
}

fn complete(insights: &dyn Insights, ctx: &RequestContext, response: &Response) {
    let status = response.status();
    let code = status.as_u16().to_string();

    if status.is_success() {
        insights.complete_successful_request(ctx, &code);
    } else {
        let error = response
            .extensions()
            .get::<AttachedError>()
            .map(|e| e.0.clone())
            .or_else(|| ctx.last_error());
        tracing::debug!(status = %code, error = ?error, "Request failed");
        insights.complete_failed_request(ctx, &code, error);
    }
}
