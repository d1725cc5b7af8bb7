//! Request context assembly for the `/csc-event` endpoint.
//!
//! The browser tag sends one GET per event with short query parameters:
//!
//! | Param | Meaning |
//! |-------|---------|
//! | `p` | party id |
//! | `s` | session id |
//! | `v` | page view id |
//! | `e` | event id |
//! | `c` | client timestamp, base 36 millis |
//! | `n` | new party (`t`) |
//! | `f` | first in session (`t`) |
//! | `t` | event type |
//! | `l` | location |
//! | `r` | referer |
//! | `w`, `h` | viewport width and height, base 36 |
//! | `i`, `j` | screen width and height, base 36 |
//! | `k` | device pixel ratio |

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::models::{Envelope, RequestContext, UserAgent};
use crate::transform::dsl::QueryMap;
use crate::transform::uri::parse_query;

/// Decoded browser event parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventParams {
    pub party_id: Option<String>,
    pub session_id: Option<String>,
    pub page_view_id: Option<String>,
    pub event_id: Option<String>,
    pub client_timestamp: Option<DateTime<Utc>>,
    pub new_party: bool,
    pub first_in_session: bool,
    pub event_type: Option<String>,
    pub location: Option<String>,
    pub referer: Option<String>,
    pub viewport_width: Option<i64>,
    pub viewport_height: Option<i64>,
    pub screen_width: Option<i64>,
    pub screen_height: Option<i64>,
    pub pixel_ratio: Option<f64>,
}

impl EventParams {
    /// Decode from a raw query string
    pub fn from_query(raw: &str) -> Self {
        Self::from_map(&parse_query(raw))
    }

    pub fn from_map(query: &QueryMap) -> Self {
        let text = |name: &str| {
            query
                .get(name)
                .and_then(|values| values.first())
                .filter(|v| !v.is_empty())
                .cloned()
        };
        let base36 = |name: &str| text(name).and_then(|v| i64::from_str_radix(&v, 36).ok());
        let flag = |name: &str| text(name).as_deref() == Some("t");

        Self {
            party_id: text("p"),
            session_id: text("s"),
            page_view_id: text("v"),
            event_id: text("e"),
            client_timestamp: base36("c").and_then(DateTime::<Utc>::from_timestamp_millis),
            new_party: flag("n"),
            first_in_session: flag("f"),
            event_type: text("t"),
            location: text("l"),
            referer: text("r"),
            viewport_width: base36("w"),
            viewport_height: base36("h"),
            screen_width: base36("i"),
            screen_height: base36("j"),
            pixel_ratio: text("k").and_then(|v| v.parse().ok()),
        }
    }
}

/// All `name=value` pairs of every `Cookie` header, in order.
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Build the context for one event.
///
/// Returns `None` when the event carries no location. Missing identifiers
/// are generated and the event is marked unreliable.
pub fn build_context(
    params: EventParams,
    headers: &HeaderMap,
    remote: Option<SocketAddr>,
) -> Option<RequestContext> {
    let location = params.location?;
    let mut envelope = Envelope::new(location);

    let mut generated = false;
    let mut id = |given: Option<String>| {
        given.unwrap_or_else(|| {
            generated = true;
            Uuid::new_v4().to_string()
        })
    };
    envelope.party_id = id(params.party_id);
    envelope.session_id = id(params.session_id);
    envelope.page_view_id = id(params.page_view_id);
    envelope.event_id = id(params.event_id);

    envelope.unreliable = generated;
    envelope.first_in_session = params.first_in_session || params.new_party;
    envelope.client_timestamp = params.client_timestamp;
    envelope.referer = params.referer;
    envelope.remote_host = remote.map(|addr| addr.ip().to_string());
    envelope.event_type = params.event_type;
    envelope.viewport_width = params.viewport_width;
    envelope.viewport_height = params.viewport_height;
    envelope.screen_width = params.screen_width;
    envelope.screen_height = params.screen_height;
    envelope.pixel_ratio = params.pixel_ratio;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut ctx = RequestContext::new(envelope).with_user_agent(user_agent, UserAgent::default());
    for (name, value) in parse_cookies(headers) {
        ctx = ctx.with_cookie(name, value);
    }
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    Some(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContextField;
    use crate::transform::dsl::Value;
    use axum::http::HeaderValue;

    #[test]
    fn test_decode_event_params() {
        let params = EventParams::from_query(
            "p=0%3Aabc&s=0%3Adef&v=0%3Aghi&e=0%3Aghi0&c=i1w3s0sg&n=t&f=t&t=pageView\
             &l=https%3A%2F%2Fexample.com%2F&r=http%3A%2F%2Fexample.com%2F&w=sa&h=sa&i=sg&j=sg&k=2",
        );
        assert_eq!(params.party_id.as_deref(), Some("0:abc"));
        assert_eq!(params.event_id.as_deref(), Some("0:ghi0"));
        assert!(params.new_party);
        assert!(params.first_in_session);
        assert_eq!(params.location.as_deref(), Some("https://example.com/"));
        assert_eq!(params.viewport_width, Some(1018));
        assert_eq!(params.screen_height, Some(1024));
        assert_eq!(params.pixel_ratio, Some(2.0));
        assert_eq!(
            params.client_timestamp.map(|t| t.timestamp_millis()),
            Some(i64::from_str_radix("i1w3s0sg", 36).unwrap())
        );
    }

    #[test]
    fn test_decode_empty_query() {
        assert_eq!(EventParams::from_query(""), EventParams::default());
        let params = EventParams::from_query("w=not*base36&l=");
        assert_eq!(params.viewport_width, None);
        assert_eq!(params.location, None);
    }

    #[test]
    fn test_parse_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("_dvp=0:abc; custom_cookie=custom_cookie_value"));
        headers.append(header::COOKIE, HeaderValue::from_static("quoted=\"x y\";;broken"));
        let cookies = parse_cookies(&headers);
        assert_eq!(
            cookies,
            vec![
                ("_dvp".to_string(), "0:abc".to_string()),
                ("custom_cookie".to_string(), "custom_cookie_value".to_string()),
                ("quoted".to_string(), "x y".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_context() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.append("X-Clickmap-Test", HeaderValue::from_static("first"));
        headers.append("X-Clickmap-Test", HeaderValue::from_static("second"));
        headers.append("X-Clickmap-Test", HeaderValue::from_static("last"));
        headers.insert(header::COOKIE, HeaderValue::from_static("custom_cookie=custom_cookie_value"));

        let params = EventParams::from_query("p=a&s=b&v=c&e=d&l=https%3A%2F%2Fexample.com%2F&t=pageView");
        let remote: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let ctx = build_context(params, &headers, Some(remote)).unwrap();

        assert_eq!(ctx.location(), "https://example.com/");
        assert!(!ctx.envelope().unreliable);
        assert_eq!(ctx.cookie("custom_cookie"), Some("custom_cookie_value"));
        assert_eq!(ctx.first_header("x-clickmap-test"), Some("first"));
        assert_eq!(ctx.header_values("X-Clickmap-Test").map(|v| v.len()), Some(3));
        assert_eq!(
            ctx.field(ContextField::UserAgentString),
            Some(Value::from("Mozilla/5.0"))
        );
        assert_eq!(ctx.field(ContextField::RemoteHost), Some(Value::from("10.0.0.1")));
        assert_eq!(ctx.field(ContextField::EventType), Some(Value::from("pageView")));
    }

    #[test]
    fn test_missing_ids_are_generated() {
        let params = EventParams::from_query("l=https%3A%2F%2Fexample.com%2F");
        let ctx = build_context(params, &HeaderMap::new(), None).unwrap();
        assert!(ctx.envelope().unreliable);
        assert!(Uuid::parse_str(&ctx.envelope().party_id).is_ok());
        assert_ne!(ctx.envelope().party_id, ctx.envelope().event_id);
    }

    #[test]
    fn test_missing_location() {
        assert!(build_context(EventParams::default(), &HeaderMap::new(), None).is_none());
    }
}
