//! Actor and request provenance attached to audit events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The user responsible for an audited change.
///
/// Both fields are optional because system-initiated changes have no actor.
///
/// # Examples
///
/// ```
/// use tasktrail::audit::domain::AuditActor;
///
/// let actor = AuditActor::new(7, "alice");
/// assert_eq!(actor.id, Some(7));
/// assert!(AuditActor::anonymous().is_anonymous());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    /// Numeric user identifier.
    pub id: Option<i64>,
    /// Display name captured at the time of the change.
    pub name: Option<String>,
}

impl AuditActor {
    /// Creates an actor with both identifier and name.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
        }
    }

    /// Creates an actor for system-initiated changes.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            id: None,
            name: None,
        }
    }

    /// Returns `true` if neither identifier nor name is known.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

/// HTTP request details captured alongside an audit event.
///
/// The HTTP layer fills these in; the audit subsystem only stores them.
///
/// # Examples
///
/// ```
/// use tasktrail::audit::domain::RequestContext;
///
/// let context = RequestContext::empty()
///     .with_ip("10.0.0.1")
///     .with_method("POST");
///
/// assert_eq!(context.ip.as_deref(), Some("10.0.0.1"));
/// assert!(!context.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Client IP address.
    pub ip: Option<String>,
    /// Client user agent string.
    pub user_agent: Option<String>,
    /// Request correlation identifier.
    pub request_id: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Full request URL.
    pub url: Option<String>,
}

impl RequestContext {
    /// Creates a context with no fields set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            ip: None,
            user_agent: None,
            request_id: None,
            method: None,
            url: None,
        }
    }

    /// Sets the client IP address.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the request URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns `true` if all fields are `None`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ip.is_none()
            && self.user_agent.is_none()
            && self.request_id.is_none()
            && self.method.is_none()
            && self.url.is_none()
    }

    /// Returns the populated fields as a JSON map.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let fields = [
            ("ip", &self.ip),
            ("user_agent", &self.user_agent),
            ("request_id", &self.request_id),
            ("method", &self.method),
            ("url", &self.url),
        ];
        fields
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|text| (key.to_owned(), Value::String(text.clone())))
            })
            .collect()
    }
}
