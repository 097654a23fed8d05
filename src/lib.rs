//! staticd — a minimal static-file HTTP server.
//!
//! Serves a pre-built directory of assets over HTTP/1.1: `GET /` maps to the
//! root `index.html`, every other path is a file lookup under the configured
//! static root. Paths that do not resolve to a regular file inside the root
//! answer 404.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
