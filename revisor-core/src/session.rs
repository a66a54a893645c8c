//! Cookie-based session state shared by every outbound request.

use std::collections::BTreeMap;

/// Cookie name to value. Ordered so that header and config output is stable.
pub type CookieMap = BTreeMap<String, String>;

/// The cookies that authenticate the bot against the platform.
///
/// One instance exists per monitor run. Requests only read it; the only
/// writer is the cookie refresh path, which merges freshly issued cookies in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    cookies: CookieMap,
}

impl SessionState {
    pub fn new(cookies: CookieMap) -> Self {
        Self { cookies }
    }

    pub fn from_cookie_string(cookie_string: &str) -> Self {
        Self::new(parse_cookie_string(cookie_string))
    }

    pub fn cookies(&self) -> &CookieMap {
        &self.cookies
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Merge refreshed cookies into the session. Existing cookies that the
    /// server did not reissue are kept.
    pub fn apply(&mut self, refreshed: &CookieMap) {
        for (name, value) in refreshed {
            self.cookies.insert(name.clone(), value.clone());
        }
    }

    /// Value for the `Cookie` request header, or `None` without cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            None
        } else {
            Some(to_cookie_string(&self.cookies))
        }
    }
}

/// Parse a `name=value; name2=value2` string as stored in the config file.
///
/// Segments without `=` or with an empty name are skipped. Double quotes
/// around a value are removed.
pub fn parse_cookie_string(cookie_string: &str) -> CookieMap {
    cookie_string
        .split(';')
        .filter_map(parse_pair)
        .collect()
}

/// Parse one `Set-Cookie` header value into its name and value.
///
/// Attributes after the first `;` (`Path`, `Expires`, `HttpOnly`, ...) are
/// ignored.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    header.split(';').next().and_then(parse_pair)
}

/// Merge every `Set-Cookie` header of one response into a single map.
/// Later headers win when a name repeats.
pub fn merge_set_cookie_headers<'a, I>(headers: I) -> CookieMap
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = CookieMap::new();
    for header in headers {
        if let Some((name, value)) = parse_set_cookie(header) {
            merged.insert(name, value);
        }
    }
    merged
}

/// Serialize cookies as `name=value; name2=value2`.
pub fn to_cookie_string(cookies: &CookieMap) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_pair(segment: &str) -> Option<(String, String)> {
    let (name, value) = segment.trim().split_once('=')?;
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
}
