//! Per-request data the mapping reads from.
//!
//! - [`RequestContext`] - Immutable snapshot of one tracking request
//! - [`Envelope`] - Collector-derived identifiers, flags and measurements
//! - [`UserAgent`] - Output of the (external) user-agent classifier
//! - [`ContextField`] - Names of the attributes the `field` producer can read
//!
//! A context is built once per request, handed to the record builder by
//! shared reference, and dropped when the record is finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::transform::dsl::Value;

// =============================================================================
// Envelope
// =============================================================================

/// Values attached to the request by the collector before mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// First event of a new session.
    pub first_in_session: bool,
    /// Set when the event could not be fully trusted (e.g. identifiers were missing).
    pub unreliable: bool,
    /// Set when the event was seen before.
    pub duplicate: bool,
    /// Time the collector accepted the request.
    pub timestamp: DateTime<Utc>,
    /// Time reported by the client, if any.
    pub client_timestamp: Option<DateTime<Utc>>,
    pub location: String,
    pub referer: Option<String>,
    pub remote_host: Option<String>,
    pub party_id: String,
    pub session_id: String,
    pub page_view_id: String,
    pub event_id: String,
    pub viewport_width: Option<i64>,
    pub viewport_height: Option<i64>,
    pub screen_width: Option<i64>,
    pub screen_height: Option<i64>,
    pub pixel_ratio: Option<f64>,
    pub event_type: Option<String>,
}

impl Envelope {
    /// Envelope for a location, stamped now, with empty identifiers.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            first_in_session: false,
            unreliable: false,
            duplicate: false,
            timestamp: Utc::now(),
            client_timestamp: None,
            location: location.into(),
            referer: None,
            remote_host: None,
            party_id: String::new(),
            session_id: String::new(),
            page_view_id: String::new(),
            event_id: String::new(),
            viewport_width: None,
            viewport_height: None,
            screen_width: None,
            screen_height: None,
            pixel_ratio: None,
            event_type: None,
        }
    }
}

// =============================================================================
// User Agent
// =============================================================================

/// User-agent classification. Every attribute is absent when the classifier
/// could not identify the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAgent {
    pub name: Option<String>,
    pub family: Option<String>,
    pub vendor: Option<String>,
    #[serde(rename = "type")]
    pub agent_type: Option<String>,
    pub version: Option<String>,
    pub device_category: Option<String>,
    pub os_family: Option<String>,
    pub os_version: Option<String>,
    pub os_vendor: Option<String>,
}

// =============================================================================
// Context Fields
// =============================================================================

/// Attributes readable through the `field` producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    FirstInSession,
    Unreliable,
    Duplicate,
    /// Milliseconds since the epoch.
    Timestamp,
    ClientTimestamp,
    Location,
    Referer,
    RemoteHost,
    PartyId,
    SessionId,
    PageViewId,
    EventId,
    ViewportWidth,
    ViewportHeight,
    ScreenWidth,
    ScreenHeight,
    PixelRatio,
    EventType,
    UserAgentString,
    UserAgentName,
    UserAgentFamily,
    UserAgentVendor,
    UserAgentType,
    UserAgentVersion,
    UserAgentDeviceCategory,
    UserAgentOsFamily,
    UserAgentOsVersion,
    UserAgentOsVendor,
}

impl ContextField {
    /// Every readable attribute, in documentation order.
    pub const ALL: [ContextField; 28] = [
        ContextField::FirstInSession,
        ContextField::Unreliable,
        ContextField::Duplicate,
        ContextField::Timestamp,
        ContextField::ClientTimestamp,
        ContextField::Location,
        ContextField::Referer,
        ContextField::RemoteHost,
        ContextField::PartyId,
        ContextField::SessionId,
        ContextField::PageViewId,
        ContextField::EventId,
        ContextField::ViewportWidth,
        ContextField::ViewportHeight,
        ContextField::ScreenWidth,
        ContextField::ScreenHeight,
        ContextField::PixelRatio,
        ContextField::EventType,
        ContextField::UserAgentString,
        ContextField::UserAgentName,
        ContextField::UserAgentFamily,
        ContextField::UserAgentVendor,
        ContextField::UserAgentType,
        ContextField::UserAgentVersion,
        ContextField::UserAgentDeviceCategory,
        ContextField::UserAgentOsFamily,
        ContextField::UserAgentOsVersion,
        ContextField::UserAgentOsVendor,
    ];

    /// Name used in mapping scripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextField::FirstInSession => "first_in_session",
            ContextField::Unreliable => "unreliable",
            ContextField::Duplicate => "duplicate",
            ContextField::Timestamp => "timestamp",
            ContextField::ClientTimestamp => "client_timestamp",
            ContextField::Location => "location",
            ContextField::Referer => "referer",
            ContextField::RemoteHost => "remote_host",
            ContextField::PartyId => "party_id",
            ContextField::SessionId => "session_id",
            ContextField::PageViewId => "page_view_id",
            ContextField::EventId => "event_id",
            ContextField::ViewportWidth => "viewport_width",
            ContextField::ViewportHeight => "viewport_height",
            ContextField::ScreenWidth => "screen_width",
            ContextField::ScreenHeight => "screen_height",
            ContextField::PixelRatio => "pixel_ratio",
            ContextField::EventType => "event_type",
            ContextField::UserAgentString => "user_agent_string",
            ContextField::UserAgentName => "user_agent_name",
            ContextField::UserAgentFamily => "user_agent_family",
            ContextField::UserAgentVendor => "user_agent_vendor",
            ContextField::UserAgentType => "user_agent_type",
            ContextField::UserAgentVersion => "user_agent_version",
            ContextField::UserAgentDeviceCategory => "user_agent_device_category",
            ContextField::UserAgentOsFamily => "user_agent_os_family",
            ContextField::UserAgentOsVersion => "user_agent_os_version",
            ContextField::UserAgentOsVendor => "user_agent_os_vendor",
        }
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// Immutable view of one tracking request.
///
/// Header names are case-insensitive; a header that was sent several times
/// keeps every value in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    envelope: Envelope,
    user_agent: UserAgent,
    user_agent_string: Option<String>,
    cookies: HashMap<String, String>,
    headers: HashMap<String, Vec<String>>,
}

impl RequestContext {
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            user_agent: UserAgent::default(),
            user_agent_string: None,
            cookies: HashMap::new(),
            headers: HashMap::new(),
        }
    }

    pub fn with_user_agent(mut self, raw: Option<String>, classified: UserAgent) -> Self {
        self.user_agent_string = raw;
        self.user_agent = classified;
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Append one header value; repeated calls for the same name keep order.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.user_agent
    }

    pub fn location(&self) -> &str {
        &self.envelope.location
    }

    pub fn referer(&self) -> Option<&str> {
        self.envelope.referer.as_deref()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// All values of a header, in the order they were received.
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .filter(|values| !values.is_empty())
    }

    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.header_values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Read a named attribute; `None` when the request does not carry it.
    pub fn field(&self, field: ContextField) -> Option<Value> {
        let env = &self.envelope;
        let ua = &self.user_agent;
        let text = |s: &Option<String>| s.clone().map(Value::String);
        let id = |s: &String| Some(s.clone()).filter(|s| !s.is_empty()).map(Value::String);

        match field {
            ContextField::FirstInSession => Some(Value::Bool(env.first_in_session)),
            ContextField::Unreliable => Some(Value::Bool(env.unreliable)),
            ContextField::Duplicate => Some(Value::Bool(env.duplicate)),
            ContextField::Timestamp => Some(Value::Int(env.timestamp.timestamp_millis())),
            ContextField::ClientTimestamp => {
                env.client_timestamp.map(|t| Value::Int(t.timestamp_millis()))
            }
            ContextField::Location => Some(Value::String(env.location.clone())),
            ContextField::Referer => text(&env.referer),
            ContextField::RemoteHost => text(&env.remote_host),
            ContextField::PartyId => id(&env.party_id),
            ContextField::SessionId => id(&env.session_id),
            ContextField::PageViewId => id(&env.page_view_id),
            ContextField::EventId => id(&env.event_id),
            ContextField::ViewportWidth => env.viewport_width.map(Value::Int),
            ContextField::ViewportHeight => env.viewport_height.map(Value::Int),
            ContextField::ScreenWidth => env.screen_width.map(Value::Int),
            ContextField::ScreenHeight => env.screen_height.map(Value::Int),
            ContextField::PixelRatio => env.pixel_ratio.map(Value::Double),
            ContextField::EventType => text(&env.event_type),
            ContextField::UserAgentString => text(&self.user_agent_string),
            ContextField::UserAgentName => text(&ua.name),
            ContextField::UserAgentFamily => text(&ua.family),
            ContextField::UserAgentVendor => text(&ua.vendor),
            ContextField::UserAgentType => text(&ua.agent_type),
            ContextField::UserAgentVersion => text(&ua.version),
            ContextField::UserAgentDeviceCategory => text(&ua.device_category),
            ContextField::UserAgentOsFamily => text(&ua.os_family),
            ContextField::UserAgentOsVersion => text(&ua.os_version),
            ContextField::UserAgentOsVendor => text(&ua.os_vendor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive_and_ordered() {
        let ctx = RequestContext::new(Envelope::new("http://www.example.com/"))
            .with_header("X-Clickmap-Test", "first")
            .with_header("x-clickmap-test", "second")
            .with_header("X-CLICKMAP-TEST", "last");

        assert_eq!(
            ctx.header_values("X-Clickmap-Test").unwrap(),
            &["first".to_string(), "second".to_string(), "last".to_string()]
        );
        assert_eq!(ctx.first_header("x-clickmap-test"), Some("first"));
        assert_eq!(ctx.first_header("X-Other"), None);
    }

    #[test]
    fn test_field_absence() {
        let ctx = RequestContext::new(Envelope::new("http://www.example.com/"));
        assert_eq!(ctx.field(ContextField::Referer), None);
        assert_eq!(ctx.field(ContextField::PartyId), None);
        assert_eq!(ctx.field(ContextField::UserAgentFamily), None);
        assert_eq!(ctx.field(ContextField::Duplicate), Some(Value::Bool(false)));
        assert_eq!(
            ctx.field(ContextField::Location),
            Some(Value::from("http://www.example.com/"))
        );
    }

    #[test]
    fn test_user_agent_fields() {
        let ua = UserAgent {
            family: Some("Chrome".into()),
            os_version: Some("10.10.1".into()),
            ..Default::default()
        };
        let ctx = RequestContext::new(Envelope::new("/"))
            .with_user_agent(Some("Mozilla/5.0".into()), ua);
        assert_eq!(ctx.field(ContextField::UserAgentFamily), Some(Value::from("Chrome")));
        assert_eq!(ctx.field(ContextField::UserAgentOsVersion), Some(Value::from("10.10.1")));
        assert_eq!(ctx.field(ContextField::UserAgentString), Some(Value::from("Mozilla/5.0")));
    }

    #[test]
    fn test_field_names_round_trip_through_serde() {
        for field in ContextField::ALL {
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
    }
}
