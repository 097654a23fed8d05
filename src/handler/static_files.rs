//! Static file serving module
//!
//! Resolves request paths against the static root and builds file responses.
//! The one correctness property that matters here is containment: no request
//! may read a file outside the configured root.

use std::path::{Component, Path, PathBuf};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use tokio::fs;

use crate::config::Config;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, range::RangeParseResult};
use crate::logger;

/// Serve the request path from the static root
///
/// `/` and directory paths fall back to the configured index files. Anything
/// that does not resolve to a regular file inside the root is a 404, with no
/// distinction between missing and unreadable.
pub async fn serve(ctx: &RequestContext<'_>, config: &Config) -> Response<Full<Bytes>> {
    let loaded = load(
        &config.static_files.root,
        ctx.path,
        &config.static_files.index_files,
    )
    .await;

    match loaded {
        Some((content, content_type)) => build_file_response(
            &content,
            content_type,
            ctx.if_none_match.as_deref(),
            ctx.is_head,
            ctx.range_header.as_deref(),
        ),
        None => http::build_404_response(),
    }
}

/// Load a file from the static root, enforcing containment
pub async fn load(
    static_root: &str,
    request_path: &str,
    index_files: &[String],
) -> Option<(Vec<u8>, &'static str)> {
    let relative = sanitize_path(request_path)?;

    // A missing or unreadable root fails the request, not the process
    let root = match Path::new(static_root).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static root not found or inaccessible '{static_root}': {e}"
            ));
            return None;
        }
    };

    let mut file_path = root.join(relative);

    // Directory requests (including "/") try the index files
    if file_path.is_dir() {
        file_path = find_index(&file_path, index_files)?;
    }

    // Canonicalize the candidate so symlinks cannot step outside the root
    let canonical = file_path.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        logger::log_warning(&format!(
            "Path escape blocked: {request_path} -> {}",
            canonical.display()
        ));
        return None;
    }
    if !canonical.is_file() {
        return None;
    }

    let content = match fs::read(&canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {e}",
                canonical.display()
            ));
            return None;
        }
    };

    let content_type = mime::content_type_for(canonical.extension().and_then(|e| e.to_str()));
    Some((content, content_type))
}

/// Turn a request path into a relative filesystem path
///
/// Parent segments, a second root, and prefix components are rejected before
/// the filesystem is consulted, so traversal attempts never touch disk.
fn sanitize_path(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    let mut clean = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(clean)
}

/// First existing index file under a directory
fn find_index(dir: &Path, index_files: &[String]) -> Option<PathBuf> {
    index_files
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Build the file response: conditional GET, then Range, then full content
fn build_file_response(
    data: &[u8],
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
    range_header: Option<&str>,
) -> Response<Full<Bytes>> {
    let etag = cache::make_etag(data);
    let total_size = data.len();

    if cache::etag_matches(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    match http::parse_range_header(range_header, total_size) {
        RangeParseResult::Valid(range) => {
            let start = range.start;
            let end = range.end_position(total_size);

            return http::response::build_partial_response(
                Bytes::from(data[start..=end].to_vec()),
                content_type,
                &etag,
                start,
                end,
                total_size,
                is_head,
            );
        }
        RangeParseResult::NotSatisfiable => {
            return http::build_416_response(total_size);
        }
        RangeParseResult::None => {}
    }

    http::response::build_file_ok_response(Bytes::from(data.to_owned()), content_type, &etag, is_head)
}
