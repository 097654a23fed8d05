//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, the two
//! routes (root index and everything-else file lookup), and access logging.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Request, Response};

use crate::config::Config;
use crate::handler::static_files;
use crate::http;
use crate::logger;
use crate::logger::AccessLogEntry;

/// Request context encapsulating what the file-serving path needs
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub range_header: Option<String>,
}

/// Main entry point for HTTP request handling
///
/// Every failure becomes an HTTP response; nothing propagates past here.
/// The body is never read, so it is dropped before dispatch.
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    peer_addr: SocketAddr,
    config: Arc<Config>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, _body) = req.into_parts();

    let response = dispatch(&parts, &config).await;

    if config.logging.access_log {
        let mut entry = AccessLogEntry::new(
            peer_addr.to_string(),
            parts.method.to_string(),
            parts.uri.path().to_string(),
        );
        entry.query = parts.uri.query().map(ToString::to_string);
        entry.http_version = http_version_label(parts.version).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = body_len(&response);
        entry.referer = header_string(&parts.headers, "referer");
        entry.user_agent = header_string(&parts.headers, "user-agent");
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and configuration
async fn dispatch(parts: &Parts, config: &Config) -> Response<Full<Bytes>> {
    let path = parts.uri.path();

    // 1. This server only reads files
    if let Some(resp) = check_http_method(&parts.method, config.http.enable_cors) {
        return resp;
    }

    // 2. Reject oversized request bodies up front
    if let Some(resp) = check_body_size(&parts.headers, config.http.max_body_size) {
        return resp;
    }

    // 3. Optional health probes (exact match, ahead of file lookup)
    if config.health.enabled
        && (path == config.health.liveness_path || path == config.health.readiness_path)
    {
        return http::build_health_response("ok");
    }

    // 4. Everything else is a file lookup under the static root;
    //    "/" falls through to the index files
    let ctx = RequestContext {
        path,
        is_head: parts.method == Method::HEAD,
        if_none_match: header_string(&parts.headers, "if-none-match"),
        range_header: header_string(&parts.headers, "range"),
    };

    static_files::serve(&ctx, config).await
}

/// Check HTTP method and answer non-GET/HEAD methods directly
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match method {
        &Method::GET | &Method::HEAD => None,
        &Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Validate the Content-Length header and answer 413 when exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get("content-length")?;
    let size_str = content_length.to_str().ok()?;
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_error(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
        _ => None,
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn http_version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

fn body_len(response: &Response<Full<Bytes>>) -> usize {
    use hyper::body::Body as _;
    usize::try_from(response.body().size_hint().exact().unwrap_or(0)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers_with_length(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("content-length", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn get_and_head_pass_the_method_gate() {
        assert!(check_http_method(&Method::GET, false).is_none());
        assert!(check_http_method(&Method::HEAD, false).is_none());
    }

    #[test]
    fn options_answered_directly() {
        let resp = check_http_method(&Method::OPTIONS, false).unwrap();
        assert_eq!(resp.status(), 204);
    }

    #[test]
    fn writes_are_rejected() {
        for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
            let resp = check_http_method(&method, false).unwrap();
            assert_eq!(resp.status(), 405);
        }
    }

    #[test]
    fn oversized_body_rejected() {
        let resp = check_body_size(&headers_with_length("2048"), 1024).unwrap();
        assert_eq!(resp.status(), 413);
    }

    #[test]
    fn small_or_absent_body_passes() {
        assert!(check_body_size(&headers_with_length("10"), 1024).is_none());
        assert!(check_body_size(&HeaderMap::new(), 1024).is_none());
    }

    #[test]
    fn malformed_content_length_is_ignored() {
        assert!(check_body_size(&headers_with_length("not-a-number"), 1024).is_none());
    }
}
