//! HTTP transport types shared by the request builder and the transport.
//!
//! # Design
//! Requests and responses are plain data. `TaskClient` builds `HttpRequest`
//! values and parses `HttpResponse` values without touching the network; a
//! `Transport` implementation performs the actual round-trip. Keeping the
//! builder/parser pure makes every status-mapping rule testable with
//! hand-written responses.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// Built by `TaskClient::build_*` methods and executed by a `Transport`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/api/tasks".to_string(),
            headers: vec![("authorization".to_string(), "Bearer abc".to_string())],
            body: None,
        };
        assert_eq!(req.header("Authorization"), Some("Bearer abc"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn any_2xx_is_success() {
        for status in [200, 201, 204] {
            let resp = HttpResponse { status, headers: Vec::new(), body: String::new() };
            assert!(resp.is_success(), "{status}");
        }
        let resp = HttpResponse { status: 302, headers: Vec::new(), body: String::new() };
        assert!(!resp.is_success());
    }
}
