//! Telemetry record definitions.
//!
//! All types derive Serde traits so sinks can serialize them as-is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Property key carrying the raw query string of a request.
pub const PROPERTY_QUERY: &str = "Query";

/// Property key carrying the error of a failed request.
pub const PROPERTY_ERROR: &str = "error";

/// Property key carrying the message of an exception record.
pub const PROPERTY_ERROR_MESSAGE: &str = "errorMessage";

/// Correlation tags shared by every record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryTags {
    /// Operation the record belongs to (set on request traces).
    pub operation_id: Option<String>,

    /// Parent operation (set on dependencies and exceptions).
    pub operation_parent_id: Option<String>,
}

/// Trace of a single inbound HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTelemetry {
    pub id: String,
    /// `"METHOD path"`.
    pub name: String,
    pub url: String,
    pub timestamp: SystemTime,
    pub duration: Duration,
    /// Status code rendered as a string, e.g. `"200"`.
    pub response_code: String,
    pub success: bool,
    pub properties: BTreeMap<String, String>,
    pub tags: TelemetryTags,
}

impl RequestTelemetry {
    /// Create an empty trace for the given method and path.
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            id: String::new(),
            name: format!("{} {}", method, path),
            url: path.to_string(),
            timestamp: SystemTime::now(),
            duration: Duration::ZERO,
            response_code: String::new(),
            success: false,
            properties: BTreeMap::new(),
            tags: TelemetryTags::default(),
        }
    }
}

/// An outbound call made while handling a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDependencyTelemetry {
    pub id: String,
    pub name: String,
    /// Kind of dependency, e.g. `"sql"` or `"http"`.
    pub dependency_type: String,
    pub target: String,
    pub timestamp: SystemTime,
    pub duration: Duration,
    pub success: bool,
    pub properties: BTreeMap<String, String>,
    pub tags: TelemetryTags,
}

impl RemoteDependencyTelemetry {
    /// Create a pending dependency with a fresh id, stamped now.
    pub fn new(name: &str, dependency_type: &str, target: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            dependency_type: dependency_type.to_string(),
            target: target.to_string(),
            timestamp: SystemTime::now(),
            duration: Duration::ZERO,
            success: false,
            properties: BTreeMap::new(),
            tags: TelemetryTags::default(),
        }
    }
}

/// Severity of a logged failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Warning,
    Critical,
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityLevel::Warning => write!(f, "warning"),
            SeverityLevel::Critical => write!(f, "critical"),
        }
    }
}

/// A failure or warning logged by handler code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionTelemetry {
    pub timestamp: SystemTime,
    pub message: String,
    pub severity: SeverityLevel,
    pub properties: BTreeMap<String, String>,
    pub tags: TelemetryTags,
}

impl ExceptionTelemetry {
    pub fn new(message: impl Into<String>, severity: SeverityLevel) -> Self {
        let message = message.into();
        let mut properties = BTreeMap::new();
        properties.insert(PROPERTY_ERROR_MESSAGE.to_string(), message.clone());
        Self {
            timestamp: SystemTime::now(),
            message,
            severity,
            properties,
            tags: TelemetryTags::default(),
        }
    }
}

/// One record submitted to a telemetry client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Telemetry {
    Request(RequestTelemetry),
    Dependency(RemoteDependencyTelemetry),
    Exception(ExceptionTelemetry),
}

impl Telemetry {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Telemetry::Request(_) => "request",
            Telemetry::Dependency(_) => "dependency",
            Telemetry::Exception(_) => "exception",
        }
    }

    pub fn tags(&self) -> &TelemetryTags {
        match self {
            Telemetry::Request(r) => &r.tags,
            Telemetry::Dependency(d) => &d.tags,
            Telemetry::Exception(e) => &e.tags,
        }
    }
}

/// A record addressed to a telemetry tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub instrumentation_key: String,
    pub item: Telemetry,
}

impl Envelope {
    pub fn new(instrumentation_key: impl Into<String>, item: Telemetry) -> Self {
        Self {
            instrumentation_key: instrumentation_key.into(),
            item,
        }
    }
}
