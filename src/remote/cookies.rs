//! Session cookies for a single remote login session.
//!
//! The store is the only source of cookies for remote requests: callers build
//! the `Cookie` header from it explicitly instead of relying on a transport
//! cookie jar, which some wiki deployments mishandle between the token request
//! and the authenticated request. Every response that sets cookies replaces the
//! whole store.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::net::IpAddr;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
}

impl Cookie {
    /// Parse one `Set-Cookie` value received for `request_url`.
    ///
    /// Returns `None` for malformed cookies, cookies for a foreign domain and
    /// cookies that are already expired (deletions).
    fn parse(header: &str, request_url: &Url, now: DateTime<Utc>) -> Option<Self> {
        let request_host = request_url.host_str()?.to_ascii_lowercase();
        let mut parts = header.split(';');

        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim().trim_matches('"');

        let mut domain = None;
        let mut path = None;
        let mut max_age = None;
        let mut expires = None;

        for attribute in parts {
            let (key, val) = attribute
                .split_once('=')
                .map_or((attribute.trim(), ""), |(k, v)| (k.trim(), v.trim()));

            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    domain = Some(val.trim_start_matches('.').to_ascii_lowercase());
                }
                "path" if val.starts_with('/') => path = Some(val.to_string()),
                "max-age" => max_age = val.parse::<i64>().ok(),
                "expires" => expires = parse_expires(val),
                _ => {}
            }
        }

        let expired = match (max_age, expires) {
            (Some(seconds), _) => seconds <= 0,
            (None, Some(at)) => at <= now,
            (None, None) => false,
        };
        if expired {
            return None;
        }

        let (domain, host_only) = match domain {
            Some(domain) if domain_match(&request_host, &domain) => (domain, false),
            Some(_) => return None,
            None => (request_host, true),
        };

        Some(Self {
            name: name.to_string(),
            value: value.to_string(),
            domain,
            host_only,
            path: path.unwrap_or_else(|| default_path(request_url.path())),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn matches(&self, host: &str, path: &str) -> bool {
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(host, &self.domain)
        };

        domain_ok && path_match(path, &self.path)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CookieStore {
    cookies: Vec<Cookie>,
}

impl CookieStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Replace the stored cookies with the ones set by a response.
    ///
    /// Responses without any `Set-Cookie` header leave the store untouched.
    /// Returns `true` when the store was replaced.
    pub fn replace_from_response<'a, I>(&mut self, request_url: &Url, set_cookie: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.replace_from_response_at(request_url, set_cookie, Utc::now())
    }

    fn replace_from_response_at<'a, I>(
        &mut self,
        request_url: &Url,
        set_cookie: I,
        now: DateTime<Utc>,
    ) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen_header = false;
        let mut cookies: Vec<Cookie> = Vec::new();

        for header in set_cookie {
            seen_header = true;
            let Some(cookie) = Cookie::parse(header, request_url, now) else {
                continue;
            };
            cookies.retain(|existing| {
                !(existing.name == cookie.name
                    && existing.domain == cookie.domain
                    && existing.path == cookie.path)
            });
            cookies.push(cookie);
        }

        if seen_header {
            self.cookies = cookies;
        }
        seen_header
    }

    /// Serialize the cookies in scope for `url` into a `Cookie` header value.
    #[must_use]
    pub fn header_value(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        self.header_value_for(host, url.path())
    }

    /// Serialize the cookies whose domain and path scope cover `host` + `path`.
    #[must_use]
    pub fn header_value_for(&self, host: &str, path: &str) -> Option<String> {
        let host = host.to_ascii_lowercase();
        let mut in_scope: Vec<&Cookie> = self
            .cookies
            .iter()
            .filter(|cookie| cookie.matches(&host, path))
            .collect();

        if in_scope.is_empty() {
            return None;
        }

        // more specific paths first
        in_scope.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        Some(
            in_scope
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// IP literal hosts only match themselves.
fn domain_match(host: &str, domain: &str) -> bool {
    host == domain
        || (host.parse::<IpAddr>().is_err()
            && host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes().get(host.len() - domain.len() - 1) == Some(&b'.'))
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

/// RFC 6265 default-path: the request path up to, but excluding, its last `/`.
fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => request_path[..index].to_string(),
    }
}

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Netscape style: "Sat, 19-Oct-2026 10:00:00 GMT"
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}
