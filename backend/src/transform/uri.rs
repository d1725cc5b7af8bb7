//! URI decomposition for location, referer and fragment URIs.
//!
//! Parsing follows the generic RFC 3986 split
//! (`scheme ":" "//" authority path "?" query "#" fragment`), so relative
//! references such as `/client/side/path?x=value` parse as well. Components
//! are kept exactly as received; decoding happens on access:
//!
//! | Access | Decoded form | Raw form |
//! |--------|--------------|----------|
//! | path, query string, fragment | percent-decoded, `+` kept | byte-for-byte |
//! | query parameter values | form-decoded (`+` is a space) | - |
//!
//! A string that is not a URI yields `None` from [`Uri::parse`], which the
//! producers turn into absence for every component.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use super::dsl::{QueryMap, Value, ValueKind};

static URI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([^:/?#]+):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$")
        .expect("URI pattern is valid")
});

static SCHEME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("scheme pattern is valid"));

/// Characters that may never appear unescaped in a URI.
const ILLEGAL: &[char] = &['"', '<', '>', '\\', '^', '`', '{', '|', '}'];

/// A parsed URI. Components are stored undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Uri {
    /// Parse a URI or relative reference. `None` if the input is malformed.
    pub fn parse(input: &str) -> Option<Self> {
        if input.is_empty() || !is_well_formed(input) {
            return None;
        }

        let caps = URI_PATTERN.captures(input)?;
        let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string());

        let scheme = group(1);
        if let Some(ref s) = scheme {
            if !SCHEME_PATTERN.is_match(s) {
                return None;
            }
        }

        let (host, port) = match caps.get(2) {
            Some(authority) => parse_authority(authority.as_str())?,
            None => (None, None),
        };

        let fragment = group(5);
        if fragment.as_deref().is_some_and(|f| f.contains('#')) {
            return None;
        }

        Some(Self {
            scheme,
            host,
            port,
            path: group(3).unwrap_or_default(),
            query: group(4),
            fragment,
        })
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Only an explicit port; no scheme defaults are applied.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self, raw: bool) -> Option<String> {
        Some(decode(&self.path, raw)).filter(|p| !p.is_empty())
    }

    /// Query string with percent-escapes decoded and `+` left as is.
    pub fn query_string(&self, raw: bool) -> Option<String> {
        self.query.as_deref().map(|q| decode(q, raw))
    }

    pub fn fragment(&self, raw: bool) -> Option<String> {
        self.fragment.as_deref().map(|f| decode(f, raw))
    }

    /// All query parameters. Empty when there is no query.
    pub fn query(&self) -> QueryMap {
        self.query.as_deref().map(parse_query).unwrap_or_default()
    }

    /// First value of a query parameter.
    pub fn query_value(&self, name: &str) -> Option<String> {
        self.query_values(name).and_then(|values| values.into_iter().next())
    }

    /// All values of a query parameter, in source order.
    pub fn query_values(&self, name: &str) -> Option<Vec<String>> {
        self.query().shift_remove(name)
    }
}

/// Form-decode a query string into name → values, keyed in order of first occurrence.
pub fn parse_query(raw: &str) -> QueryMap {
    let mut params = QueryMap::new();
    for (name, value) in form_urlencoded::parse(raw.as_bytes()) {
        params
            .entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}

fn decode(component: &str, raw: bool) -> String {
    if raw {
        component.to_string()
    } else {
        percent_decode_str(component).decode_utf8_lossy().into_owned()
    }
}

/// Reject whitespace, control and reserved-illegal characters, and `%` not
/// followed by two hex digits.
fn is_well_formed(input: &str) -> bool {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    !input
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || ILLEGAL.contains(&c))
}

/// Split `[userinfo@]host[:port]`. The outer `None` marks a malformed authority.
fn parse_authority(authority: &str) -> Option<(Option<String>, Option<u16>)> {
    let host_port = match authority.rsplit_once('@') {
        Some((_, hp)) => hp,
        None => authority,
    };

    let (host, port) = if let Some(rest) = host_port.strip_prefix('[') {
        let (ipv6, after) = rest.split_once(']')?;
        let port = match after {
            "" => None,
            p => Some(p.strip_prefix(':')?),
        };
        (format!("[{}]", ipv6), port)
    } else {
        match host_port.rsplit_once(':') {
            Some((h, p)) => (h.to_string(), Some(p)),
            None => (host_port.to_string(), None),
        }
    };

    let port = match port {
        None | Some("") => None,
        Some(p) => Some(p.parse::<u16>().ok()?),
    };
    let host = Some(host).filter(|h| !h.is_empty());
    Some((host, port))
}

// =============================================================================
// Components
// =============================================================================

/// A component extractable by the `uri` producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UriComponent {
    Scheme,
    Host,
    Port,
    Path,
    QueryString,
    Fragment,
    /// Whole query as a parameter map.
    Query,
}

impl UriComponent {
    pub fn extract(&self, uri: &Uri, raw: bool) -> Option<Value> {
        match self {
            UriComponent::Scheme => uri.scheme().map(Value::from),
            UriComponent::Host => uri.host().map(Value::from),
            UriComponent::Port => uri.port().map(|p| Value::Int(i64::from(p))),
            UriComponent::Path => uri.path(raw).map(Value::String),
            UriComponent::QueryString => uri.query_string(raw).map(Value::String),
            UriComponent::Fragment => uri.fragment(raw).map(Value::String),
            UriComponent::Query => Some(Value::Map(uri.query())),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            UriComponent::Port => ValueKind::Int,
            UriComponent::Query => ValueKind::Map,
            _ => ValueKind::String,
        }
    }
}
